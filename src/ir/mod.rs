//! Canonical annotation records and the format readers/writers built on them.
//!
//! Every importer produces an [`AnnotationMap`] keyed by media path, every
//! exporter consumes a slice of [`Task`]s. Geometry in the canonical model
//! is always in pixels with the origin at the top-left corner; typed boxes
//! ([`BBoxXYXY<Pixel>`] and [`BBoxXYXY<Normalized>`]) keep pixel and ratio
//! coordinates apart at format boundaries.
//!
//! # Example
//!
//! ```
//! use labelkit::ir::{Annotation, Task};
//! use labelkit::ir::io_coco_json::{tasks_to_coco, CocoExportOptions};
//!
//! let tasks = vec![Task::new("image.jpg", 640, 480)
//!     .with_annotation(Annotation::bbox("person", 10.0, 20.0, 100.0, 200.0))];
//! let (coco, report) = tasks_to_coco(&tasks, &CocoExportOptions::default()).unwrap();
//! assert_eq!(coco.annotations[0].bbox, Some([10.0, 20.0, 90.0, 180.0]));
//! assert!(!report.is_lossy());
//! ```

mod bbox;
mod coord;
pub mod io_coco_json;
pub mod io_index_png;
pub mod io_json;
pub mod io_labelme_json;
pub mod io_visual_inspection;
pub mod io_voc_xml;
pub mod io_yolo;
mod model;
pub mod pixel;
mod space;
pub(crate) mod walk;

pub use bbox::BBoxXYXY;
pub use coord::Coord;
pub use model::{
    Annotation, AnnotationDefinition, AnnotationMap, AnnotationType, Attribute,
    KeypointDefinition, KeypointValue, Points, PoseKeypoint, Region, Ring, Task,
};
pub use pixel::to_pixel_coordinates;
pub use space::{Normalized, Pixel, Space};
