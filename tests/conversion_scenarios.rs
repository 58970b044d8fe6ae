mod common;

use std::fs;

use labelkit::conversion::SkipReason;
use labelkit::ir::io_coco_json::{coco_to_annotations, tasks_to_coco, CocoDataset, CocoExportOptions};
use labelkit::ir::io_index_png::{write_instance_segmentation, SegmentationOptions};
use labelkit::ir::io_voc_xml::{read_voc_dir, tasks_to_voc, write_voc_dir};
use labelkit::ir::io_yolo::{read_yolo_dir, tasks_to_yolo, write_yolo_dir, YoloExportOptions};
use labelkit::ir::io_json::from_json_str;
use labelkit::ir::{Annotation, AnnotationType, Task};
use labelkit::LabelkitError;

#[test]
fn coco_export_keeps_zero_sized_images() {
    let tasks = from_json_str(
        r#"[{"name":"a.jpg","width":100,"height":100,"annotations":[{"type":"bbox","value":"cat","points":[10,10,50,50]}]},
            {"name":"b.jpg","width":0,"height":0,"annotations":[]}]"#,
    )
    .unwrap();

    let (coco, report) = tasks_to_coco(&tasks, &CocoExportOptions::default()).unwrap();

    let heights: Vec<u32> = coco.images.iter().map(|img| img.height).collect();
    assert_eq!(heights, vec![100, 0]);
    assert_eq!(coco.categories.len(), 1);
    assert_eq!(coco.categories[0].name, "cat");
    assert_eq!(coco.categories[0].id, 1);
    assert_eq!(coco.annotations.len(), 1);
    assert_eq!(coco.annotations[0].bbox, Some([10.0, 10.0, 40.0, 40.0]));
    assert_eq!(coco.annotations[0].area, 1600.0);
    assert!(!report.is_lossy());
}

#[test]
fn zero_width_bbox_is_dropped_by_every_box_format() {
    let tasks = vec![Task::new("a.jpg", 100, 100)
        .with_annotation(Annotation::bbox("cat", 5.0, 5.0, 5.0, 20.0))
        .with_annotation(Annotation::bbox("cat", 10.0, 10.0, 30.0, 30.0))];

    let (coco, coco_report) = tasks_to_coco(&tasks, &CocoExportOptions::default()).unwrap();
    assert_eq!(coco.annotations.len(), 1);
    assert_eq!(coco_report.skip_counts()["degenerate_box"], 1);

    let yolo = tasks_to_yolo(&tasks, &YoloExportOptions::default()).unwrap();
    assert_eq!(yolo.labels[0].lines.len(), 1);

    let (voc, _) = tasks_to_voc(&tasks).unwrap();
    assert_eq!(voc[0].objects.len(), 1);
    assert_eq!(voc[0].objects[0].xmin, 10);
}

#[test]
fn truncated_coordinates_decide_degeneracy() {
    let tasks = vec![
        Task::new("a.jpg", 100, 100).with_annotation(Annotation::bbox("cat", 5.0, 5.9, 5.4, 20.0))
    ];

    let (coco, report) = tasks_to_coco(&tasks, &CocoExportOptions::default()).unwrap();
    assert!(coco.annotations.is_empty());
    assert_eq!(report.skipped[0].reason, SkipReason::DegenerateBox);
}

#[test]
fn explicit_yolo_classes_filter_and_index() {
    let tasks = vec![Task::new("a.jpg", 128, 128)
        .with_annotation(Annotation::bbox("cat", 0.0, 0.0, 10.0, 10.0))
        .with_annotation(Annotation::bbox("dog", 32.0, 0.0, 96.0, 64.0))];
    let options = YoloExportOptions {
        classes: vec!["dog".to_string()],
    };

    let export = tasks_to_yolo(&tasks, &options).unwrap();

    assert_eq!(export.classes, vec!["dog"]);
    assert_eq!(export.labels[0].lines, vec!["0 0.5 0.25 0.5 0.5"]);
    assert_eq!(export.report.skip_counts()["excluded_class"], 1);
}

#[test]
fn instance_png_numbers_annotations_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let tasks = vec![Task::new("scene.jpg", 10, 10)
        .with_annotation(Annotation::bbox("cat", 1.0, 1.0, 4.0, 4.0))
        .with_annotation(Annotation::bbox("dog", 6.0, 6.0, 9.0, 9.0))];

    write_instance_segmentation(dir.path(), &tasks, &SegmentationOptions::default()).unwrap();

    let (width, height, pixels) = common::read_index_png(&dir.path().join("scene.png"));
    assert_eq!((width, height), (10, 10));
    let at = |x: usize, y: usize| pixels[y * 10 + x];
    assert_eq!(at(2, 2), 1);
    assert_eq!(at(7, 7), 2);
    assert_eq!(at(0, 0), 0);
    assert_eq!(at(5, 5), 0);
    assert_eq!(at(9, 0), 0);
}

#[test]
fn eight_number_coco_segmentation_is_a_polygon() {
    let coco: CocoDataset = serde_json::from_str(
        r#"{"images":[{"id":1,"file_name":"x.jpg"}],
            "categories":[{"id":1,"name":"cat"}],
            "annotations":[{"image_id":1,"category_id":1,"segmentation":[[1,1,2,1,2,2,1,2]]}]}"#,
    )
    .unwrap();

    let map = coco_to_annotations(&coco).unwrap();

    let annotations = &map["x.jpg"];
    assert_eq!(annotations.len(), 1);
    assert_eq!(annotations[0].kind, AnnotationType::Polygon);
    assert_eq!(annotations[0].value, "cat");
}

#[test]
fn bad_pose_visibility_aborts_coco_import() {
    let coco: CocoDataset = serde_json::from_str(
        r#"{"images":[{"id":1,"file_name":"x.jpg","width":10,"height":10}],
            "categories":[{"id":1,"name":"person","keypoints":["head","neck"]}],
            "annotations":[{"id":7,"image_id":1,"category_id":1,"keypoints":[1,1,2,3,3,5]}]}"#,
    )
    .unwrap();

    let err = coco_to_annotations(&coco).unwrap_err();
    assert!(matches!(
        err,
        LabelkitError::InvalidKeypointVisibility {
            annotation_id: 7,
            ..
        }
    ));
}

#[test]
fn nested_task_names_keep_their_directories() {
    let dir = tempfile::tempdir().unwrap();
    let tasks = common::sample_tasks();

    write_voc_dir(&dir.path().join("voc"), &tasks).unwrap();
    write_yolo_dir(&dir.path().join("yolo"), &tasks, &YoloExportOptions::default()).unwrap();

    assert!(dir.path().join("voc/pets/cat.xml").is_file());
    assert!(dir.path().join("voc/empty.xml").is_file());
    assert!(dir.path().join("yolo/annotations/pets/cat.txt").is_file());
    assert_eq!(
        fs::read_to_string(dir.path().join("yolo/classes.txt")).unwrap(),
        "cat\ndog\n"
    );
}

#[test]
fn voc_directory_reads_back_boxes() {
    let dir = tempfile::tempdir().unwrap();
    write_voc_dir(dir.path(), &common::sample_tasks()).unwrap();

    let map = read_voc_dir(dir.path()).unwrap();

    let boxes = &map["pets/cat.jpg"];
    assert_eq!(boxes.len(), 2);
    assert_eq!(boxes[0].points.flat(), &[1.0, 1.0, 4.0, 4.0]);
    assert_eq!(boxes[1].value, "dog");
    assert_eq!(boxes[1].points.flat(), &[5.0, 5.0, 9.0, 9.0]);
    assert!(map["empty.jpg"].is_empty());
}

#[test]
fn yolo_directory_reads_back_pixel_boxes() {
    let dir = tempfile::tempdir().unwrap();
    common::write_bmp(&dir.path().join("images/a.bmp"), 200, 100);
    fs::write(dir.path().join("classes.txt"), "cat\ndog\n").unwrap();
    fs::write(dir.path().join("images/a.txt"), "1 0.5 0.5 0.5 0.5\n9 0.5 0.5 0.1 0.1\n").unwrap();

    let map = read_yolo_dir(&dir.path().join("classes.txt"), dir.path()).unwrap();

    let annotations = &map["images/a.bmp"];
    assert_eq!(annotations.len(), 1);
    assert_eq!(annotations[0].value, "dog");
    assert_eq!(annotations[0].points.flat(), &[50.0, 25.0, 150.0, 75.0]);
}
