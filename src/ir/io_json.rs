//! JSON serialization for the canonical task list.
//!
//! A task file is a JSON array of [`Task`] records. The CLI uses it as the
//! hand-off between importers and exporters.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use super::model::{AnnotationDefinition, AnnotationMap, Task};
use crate::error::LabelkitError;

/// Reads a task list from a JSON file.
pub fn read_tasks_json(path: &Path) -> Result<Vec<Task>, LabelkitError> {
    let file = File::open(path).map_err(LabelkitError::Io)?;
    let reader = BufReader::new(file);

    serde_json::from_reader(reader).map_err(|source| LabelkitError::TaskJsonParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes a task list to a JSON file, pretty-printed.
pub fn write_tasks_json(path: &Path, tasks: &[Task]) -> Result<(), LabelkitError> {
    let file = File::create(path).map_err(LabelkitError::Io)?;
    let writer = BufWriter::new(file);

    serde_json::to_writer_pretty(writer, tasks).map_err(|source| LabelkitError::TaskJsonWrite {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads an annotation catalog (a JSON array of definitions).
pub fn read_definitions_json(path: &Path) -> Result<Vec<AnnotationDefinition>, LabelkitError> {
    let file = File::open(path).map_err(LabelkitError::Io)?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| LabelkitError::TaskJsonParse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn from_json_str(json: &str) -> Result<Vec<Task>, serde_json::Error> {
    serde_json::from_str(json)
}

pub fn to_json_string(tasks: &[Task]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(tasks)
}

/// Turns importer output into tasks with unknown (zero) dimensions.
///
/// Keys become task names; the map's ordering is kept.
pub fn tasks_from_annotation_map(map: AnnotationMap) -> Vec<Task> {
    map.into_iter()
        .map(|(name, annotations)| Task {
            name,
            width: 0,
            height: 0,
            annotations,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Annotation, Attribute};

    fn sample_tasks() -> Vec<Task> {
        vec![
            Task::new("images/a.jpg", 640, 480)
                .with_annotation(
                    Annotation::bbox("person", 10.0, 20.0, 100.0, 200.0)
                        .with_color("#ff0000")
                        .with_attribute(Attribute::switch("occluded", true)),
                )
                .with_annotation(Annotation::segmentation(
                    "road",
                    vec![vec![vec![0.0, 0.0, 10.0, 0.0, 10.0, 10.0, 0.0, 10.0, 0.0, 0.0]]],
                )),
            Task::new("images/b.jpg", 0, 0),
        ]
    }

    #[test]
    fn test_json_roundtrip() {
        let original = sample_tasks();
        let json = to_json_string(&original).expect("serialization failed");
        let restored = from_json_str(&json).expect("deserialization failed");
        assert_eq!(original, restored);
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.json");
        write_tasks_json(&path, &sample_tasks()).unwrap();
        assert_eq!(read_tasks_json(&path).unwrap(), sample_tasks());
    }

    #[test]
    fn test_parse_error_carries_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = read_tasks_json(&path).unwrap_err();
        assert!(err.to_string().contains("broken.json"));
    }

    #[test]
    fn test_read_definitions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("definitions.json");
        std::fs::write(
            &path,
            r#"[{"value": "person", "type": "pose_estimation",
                 "keypoints": [{"key": "head", "name": "Head", "edges": ["neck"]},
                               {"key": "neck", "edges": []}]}]"#,
        )
        .unwrap();
        let definitions = read_definitions_json(&path).unwrap();
        assert_eq!(definitions[0].keypoints.len(), 2);
        assert_eq!(definitions[0].keypoints[0].edges, vec!["neck"]);
    }

    #[test]
    fn test_annotation_map_to_tasks() {
        let mut map = AnnotationMap::new();
        map.insert("b.jpg".into(), vec![]);
        map.insert("a.jpg".into(), vec![Annotation::keypoint("eye", 1.0, 2.0)]);
        let tasks = tasks_from_annotation_map(map);
        assert_eq!(tasks[0].name, "a.jpg");
        assert_eq!(tasks[0].annotations.len(), 1);
        assert_eq!(tasks[1].width, 0);
    }
}
