//! Pascal VOC XML import and export.
//!
//! One XML document per image. Only boxes travel through VOC: export writes
//! bbox and polygon annotations as `<bndbox>` hulls, import produces bbox
//! annotations.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use roxmltree::Node;

use super::io_coco_json::export_box;
use super::model::{Annotation, AnnotationMap, AnnotationType, Attribute, Task};
use super::walk::{collect_files_with_extensions, ensure_parent_dir, rel_string};
use crate::conversion::{ConversionReport, SkipReason};
use crate::error::LabelkitError;
use crate::parallel::WorkerPool;

const VOC_XML_EXTENSION: &str = "xml";
const SWITCH_KEYS: [&str; 3] = ["truncated", "occluded", "difficult"];

/// One `<object>` entry.
#[derive(Clone, Debug, PartialEq)]
pub struct VocObject {
    pub name: String,
    pub truncated: bool,
    pub occluded: bool,
    pub difficult: bool,
    pub xmin: i64,
    pub ymin: i64,
    pub xmax: i64,
    pub ymax: i64,
}

/// One VOC document.
#[derive(Clone, Debug, PartialEq)]
pub struct VocDocument {
    pub filename: String,
    pub width: u32,
    pub height: u32,
    pub objects: Vec<VocObject>,
}

// ============================================================================
// Export
// ============================================================================

/// Converts every task into a VOC document, including tasks with zero
/// width or height.
pub fn tasks_to_voc(tasks: &[Task]) -> Result<(Vec<VocDocument>, ConversionReport), LabelkitError> {
    let pool = WorkerPool::for_annotations()?;
    let mut report = ConversionReport::new("voc");
    let mut documents = Vec::with_capacity(tasks.len());

    for task in tasks {
        let results = pool.map_ordered(&task.annotations, to_voc_object);
        documents.push(VocDocument {
            filename: task.name.rsplit('/').next().unwrap_or(&task.name).to_string(),
            width: task.width,
            height: task.height,
            objects: report.gather(&task.name, results),
        });
    }
    Ok((documents, report))
}

/// Writes `<output stem>.xml` for every task under `output_dir`.
pub fn write_voc_dir(output_dir: &Path, tasks: &[Task]) -> Result<ConversionReport, LabelkitError> {
    let (documents, report) = tasks_to_voc(tasks)?;
    fs::create_dir_all(output_dir).map_err(LabelkitError::Io)?;

    for (task, document) in tasks.iter().zip(&documents) {
        let xml_path = task.output_path(output_dir, VOC_XML_EXTENSION);
        ensure_parent_dir(&xml_path)?;
        fs::write(&xml_path, to_voc_xml_string(document)).map_err(LabelkitError::Io)?;
    }

    log::info!("wrote {} VOC documents to {}", documents.len(), output_dir.display());
    Ok(report)
}

fn to_voc_object(annotation: &Annotation) -> Result<VocObject, SkipReason> {
    if !matches!(
        annotation.kind,
        AnnotationType::Bbox | AnnotationType::Polygon
    ) {
        return Err(SkipReason::UnsupportedType {
            kind: annotation.kind,
        });
    }
    let bbox = export_box(annotation)?;
    let flag = |key: &str| annotation.switch(key).unwrap_or(false);
    Ok(VocObject {
        name: annotation.value.clone(),
        truncated: flag("truncated"),
        occluded: flag("occluded"),
        difficult: flag("difficult"),
        xmin: bbox.xmin().floor() as i64,
        ymin: bbox.ymin().floor() as i64,
        xmax: bbox.xmax().floor() as i64,
        ymax: bbox.ymax().floor() as i64,
    })
}

/// Renders a document as indented XML without a declaration.
pub fn to_voc_xml_string(document: &VocDocument) -> String {
    let mut xml = String::new();

    writeln!(xml, "<annotation>").expect("write to string");
    writeln!(
        xml,
        "    <filename>{}</filename>",
        xml_escape(&document.filename)
    )
    .expect("write to string");
    writeln!(xml, "    <size>").expect("write to string");
    writeln!(xml, "        <width>{}</width>", document.width).expect("write to string");
    writeln!(xml, "        <height>{}</height>", document.height).expect("write to string");
    writeln!(xml, "        <depth>3</depth>").expect("write to string");
    writeln!(xml, "    </size>").expect("write to string");
    writeln!(xml, "    <segmented>0</segmented>").expect("write to string");

    for object in &document.objects {
        writeln!(xml, "    <object>").expect("write to string");
        writeln!(xml, "        <name>{}</name>", xml_escape(&object.name)).expect("write to string");
        writeln!(xml, "        <pose>Unspecified</pose>").expect("write to string");
        for (key, on) in SWITCH_KEYS
            .iter()
            .zip([object.truncated, object.occluded, object.difficult])
        {
            writeln!(xml, "        <{0}>{1}</{0}>", key, u8::from(on)).expect("write to string");
        }
        writeln!(xml, "        <bndbox>").expect("write to string");
        writeln!(xml, "            <xmin>{}</xmin>", object.xmin).expect("write to string");
        writeln!(xml, "            <ymin>{}</ymin>", object.ymin).expect("write to string");
        writeln!(xml, "            <xmax>{}</xmax>", object.xmax).expect("write to string");
        writeln!(xml, "            <ymax>{}</ymax>", object.ymax).expect("write to string");
        writeln!(xml, "        </bndbox>").expect("write to string");
        writeln!(xml, "    </object>").expect("write to string");
    }

    writeln!(xml, "</annotation>").expect("write to string");
    xml
}

fn xml_escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

// ============================================================================
// Import
// ============================================================================

/// Reads every `.xml` file under `folder` into bbox annotations.
///
/// The key is the XML file's directory relative to `folder` joined with the
/// document's `<filename>`, e.g. `sample_dir/sample2.jpg`.
pub fn read_voc_dir(folder: &Path) -> Result<AnnotationMap, LabelkitError> {
    let mut map = AnnotationMap::new();
    for xml_path in collect_files_with_extensions(folder, &[VOC_XML_EXTENSION])? {
        let xml = fs::read_to_string(&xml_path).map_err(LabelkitError::Io)?;
        let (filename, annotations) = parse_voc_xml_str(&xml, &xml_path)?;

        let rel = rel_string(folder, &xml_path);
        let key = match rel.rsplit_once('/') {
            Some((dir, _)) => format!("{dir}/{filename}"),
            None => filename,
        };
        map.insert(key, annotations);
    }
    Ok(map)
}

/// Parses one VOC document into its `<filename>` and bbox annotations.
pub fn from_voc_xml_str(xml: &str) -> Result<(String, Vec<Annotation>), LabelkitError> {
    parse_voc_xml_str(xml, Path::new("<string>"))
}

fn parse_voc_xml_str(xml: &str, path: &Path) -> Result<(String, Vec<Annotation>), LabelkitError> {
    let document =
        roxmltree::Document::parse(xml).map_err(|source| LabelkitError::VocXmlParse {
            path: path.to_path_buf(),
            message: source.to_string(),
        })?;

    let annotation = document.root_element();
    if annotation.tag_name().name() != "annotation" {
        return Err(LabelkitError::VocXmlParse {
            path: path.to_path_buf(),
            message: "missing <annotation> root element".to_string(),
        });
    }

    let filename = required_child_text(annotation, "filename", path, "<annotation>")?;

    let mut annotations = Vec::new();
    for object in annotation
        .children()
        .filter(|node| node.is_element() && node.tag_name().name() == "object")
    {
        let name = required_child_text(object, "name", path, "<object>")?;
        let bndbox = child_element(object, "bndbox").ok_or_else(|| LabelkitError::VocXmlParse {
            path: path.to_path_buf(),
            message: "missing <bndbox> in <object>".to_string(),
        })?;

        let mut coords = [0.0; 4];
        for (slot, tag) in coords.iter_mut().zip(["xmin", "ymin", "xmax", "ymax"]) {
            *slot = parse_required_int(bndbox, tag, path)?;
        }

        let mut bbox = Annotation::bbox(name, coords[0], coords[1], coords[2], coords[3]);
        for key in SWITCH_KEYS {
            if let Some(on) = optional_child_text(object, key).and_then(|raw| parse_flag(&raw)) {
                bbox = bbox.with_attribute(Attribute::switch(key, on));
            }
        }
        annotations.push(bbox);
    }

    Ok((filename, annotations))
}

fn required_child_text(
    node: Node<'_, '_>,
    tag: &str,
    path: &Path,
    context: &str,
) -> Result<String, LabelkitError> {
    optional_child_text(node, tag).ok_or_else(|| LabelkitError::VocXmlParse {
        path: path.to_path_buf(),
        message: format!("missing <{tag}> in {context}"),
    })
}

/// Coordinates are integers in VOC; fractional values are floored.
fn parse_required_int(node: Node<'_, '_>, tag: &str, path: &Path) -> Result<f64, LabelkitError> {
    let raw = required_child_text(node, tag, path, "<bndbox>")?;
    raw.parse::<f64>()
        .map(f64::floor)
        .map_err(|_| LabelkitError::VocXmlParse {
            path: path.to_path_buf(),
            message: format!("invalid <{tag}> value '{raw}' in <bndbox>; expected a number"),
        })
}

fn child_element<'a, 'input>(node: Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|child| child.is_element() && child.tag_name().name() == tag)
}

fn optional_child_text(node: Node<'_, '_>, tag: &str) -> Option<String> {
    child_element(node, tag)
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(ToOwned::to_owned)
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}
