//! Labelkit: annotation format conversion.
//!
//! Labelkit translates a vendor-neutral task/annotation model (boxes,
//! polygons, segmentation regions with holes, keypoints and pose skeletons)
//! into and out of COCO, YOLO, Pascal VOC and LabelMe, and renders tasks as
//! indexed-color instance or semantic segmentation PNGs.
//!
//! # Modules
//!
//! - [`ir`]: canonical records and every format reader/writer
//! - [`geometry`]: ring primitives (area, winding, staircase snapping)
//! - [`mask`]: binary mask to polygon tracing and back
//! - [`overlay`]: drawing annotations on their images
//! - [`parallel`]: the bounded, order-preserving worker pool
//! - [`conversion`]: skip-and-continue reporting
//! - [`error`]: error types for labelkit operations

pub mod conversion;
pub mod error;
pub mod geometry;
pub mod ir;
pub mod mask;
pub mod overlay;
pub mod parallel;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};

use conversion::ConversionReport;
pub use error::LabelkitError;
use ir::io_coco_json::CocoExportOptions;
use ir::io_index_png::SegmentationOptions;
use ir::io_visual_inspection::VisualInspectionOptions;
use ir::io_yolo::YoloExportOptions;
use ir::{Annotation, Task};

/// The labelkit CLI application.
#[derive(Parser)]
#[command(name = "labelkit")]
#[command(version, about)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Read a dataset in some format into a task JSON file.
    Import(ImportArgs),
    /// Write a task JSON file out in some format.
    Export(ExportArgs),
    /// Trace a binary mask image into a segmentation annotation.
    Trace(TraceArgs),
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ImportFormat {
    Coco,
    Yolo,
    Voc,
    Labelme,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ExportFormat {
    Coco,
    Yolo,
    Voc,
    Labelme,
    InstancePng,
    SemanticPng,
    VisualInspection,
    Overlay,
}

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
enum ReportFormat {
    #[default]
    Text,
    Json,
}

#[derive(clap::Args)]
struct ImportArgs {
    /// COCO JSON file, or the dataset directory for the other formats.
    input: PathBuf,

    #[arg(long, value_enum)]
    from: ImportFormat,

    /// Task JSON file to write.
    #[arg(short, long)]
    output: PathBuf,

    /// `classes.txt` for YOLO (defaults to `<input>/classes.txt`).
    #[arg(long)]
    classes_file: Option<PathBuf>,
}

#[derive(clap::Args)]
struct ExportArgs {
    /// Task JSON file to read.
    input: PathBuf,

    #[arg(long, value_enum)]
    to: ExportFormat,

    /// Output file (coco, visual-inspection) or directory (everything else).
    #[arg(short, long)]
    output: PathBuf,

    /// Class names, in order. Filters YOLO output; orders semantic PNG indices.
    #[arg(long, value_delimiter = ',')]
    classes: Vec<String>,

    /// Annotation catalog JSON used for COCO categories and pose skeletons.
    #[arg(long)]
    definitions: Option<PathBuf>,

    /// First palette index for PNG exports.
    #[arg(long, default_value_t = 1)]
    start_index: u8,

    /// Directory holding the images, required for `overlay`.
    #[arg(long)]
    image_dir: Option<PathBuf>,

    /// Prefix for `image_gcs_uri` in visual-inspection output.
    #[arg(long, default_value = "")]
    image_uri_prefix: String,

    /// `goog_vi_ml_use` label for visual-inspection output.
    #[arg(long, default_value = "test")]
    ml_use: String,

    /// How to print the conversion report.
    #[arg(long, value_enum, default_value_t)]
    report: ReportFormat,
}

#[derive(clap::Args)]
struct TraceArgs {
    /// Mask image; any non-zero pixel is foreground.
    mask: PathBuf,

    /// Value of the resulting segmentation annotation.
    #[arg(long, default_value = "mask")]
    value: String,
}

/// Run the labelkit CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), LabelkitError> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Import(args)) => run_import(args),
        Some(Commands::Export(args)) => run_export(args),
        Some(Commands::Trace(args)) => run_trace(args),
        None => {
            println!("labelkit {}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("Annotation format conversion.");
            println!();
            println!("Run 'labelkit --help' for usage information.");
            Ok(())
        }
    }
}

fn run_import(args: ImportArgs) -> Result<(), LabelkitError> {
    let map = match args.from {
        ImportFormat::Coco => ir::io_coco_json::read_coco_json(&args.input)?,
        ImportFormat::Yolo => {
            let classes = args
                .classes_file
                .unwrap_or_else(|| args.input.join("classes.txt"));
            ir::io_yolo::read_yolo_dir(&classes, &args.input)?
        }
        ImportFormat::Voc => ir::io_voc_xml::read_voc_dir(&args.input)?,
        ImportFormat::Labelme => ir::io_labelme_json::read_labelme_dir(&args.input)?,
    };

    let tasks = ir::io_json::tasks_from_annotation_map(map);
    ir::io_json::write_tasks_json(&args.output, &tasks)?;
    println!(
        "Imported {} images, {} annotations into {}",
        tasks.len(),
        tasks.iter().map(|t| t.annotations.len()).sum::<usize>(),
        args.output.display()
    );
    Ok(())
}

fn run_export(args: ExportArgs) -> Result<(), LabelkitError> {
    let tasks = ir::io_json::read_tasks_json(&args.input)?;
    let output = args.output.as_path();

    let report = match args.to {
        ExportFormat::Coco => {
            let definitions = match &args.definitions {
                Some(path) => ir::io_json::read_definitions_json(path)?,
                None => Vec::new(),
            };
            ir::io_coco_json::write_coco_json(output, &tasks, &CocoExportOptions { definitions })?
        }
        ExportFormat::Yolo => ir::io_yolo::write_yolo_dir(
            output,
            &tasks,
            &YoloExportOptions {
                classes: args.classes.clone(),
            },
        )?,
        ExportFormat::Voc => ir::io_voc_xml::write_voc_dir(output, &tasks)?,
        ExportFormat::Labelme => ir::io_labelme_json::write_labelme_dir(output, &tasks)?,
        ExportFormat::InstancePng => ir::io_index_png::write_instance_segmentation(
            output,
            &tasks,
            &segmentation_options(&args),
        )?,
        ExportFormat::SemanticPng => ir::io_index_png::write_semantic_segmentation(
            output,
            &tasks,
            &segmentation_options(&args),
        )?,
        ExportFormat::VisualInspection => {
            ir::io_visual_inspection::write_visual_inspection_jsonl(
                output,
                &tasks,
                &VisualInspectionOptions {
                    image_uri_prefix: args.image_uri_prefix.clone(),
                    ml_use: args.ml_use.clone(),
                },
            )?
        }
        ExportFormat::Overlay => {
            let image_dir = args.image_dir.as_deref().ok_or_else(|| {
                LabelkitError::UnsupportedFormat(
                    "'overlay' export needs --image-dir".to_string(),
                )
            })?;
            overlay::export_image_with_annotations(&tasks, image_dir, output)?
        }
    };

    print_report(&report, args.report);
    Ok(())
}

fn segmentation_options(args: &ExportArgs) -> SegmentationOptions {
    SegmentationOptions {
        start_index: args.start_index,
        classes: args.classes.clone(),
        ..Default::default()
    }
}

fn print_report(report: &ConversionReport, format: ReportFormat) {
    match format {
        ReportFormat::Json => match serde_json::to_string_pretty(report) {
            Ok(json) => println!("{json}"),
            Err(e) => log::warn!("could not serialize report: {e}"),
        },
        ReportFormat::Text => print!("{report}"),
    }
}

fn run_trace(args: TraceArgs) -> Result<(), LabelkitError> {
    let regions = mask::mask_to_segmentation_from_path(&args.mask)?;
    let (width, height) = ir::walk::read_image_dimensions(&args.mask)?;
    let name = file_name(&args.mask);

    let task = Task::new(name, width, height)
        .with_annotation(Annotation::segmentation(args.value, regions));
    let json = ir::io_json::to_json_string(&[task]).map_err(|source| LabelkitError::JsonWrite {
        path: "<stdout>".into(),
        source,
    })?;
    println!("{json}");
    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
