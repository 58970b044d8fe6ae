#![allow(dead_code)]

use std::fs;
use std::path::Path;

use image::{GrayImage, Luma};
use labelkit::ir::{Annotation, Task};

pub fn bmp_bytes(width: u32, height: u32) -> Vec<u8> {
    let row_stride = (width * 3).div_ceil(4) * 4;
    let pixel_array_size = row_stride * height;
    let file_size = 54 + pixel_array_size;

    let mut bytes = Vec::with_capacity(file_size as usize);
    bytes.extend_from_slice(b"BM");
    bytes.extend_from_slice(&file_size.to_le_bytes());
    bytes.extend_from_slice(&[0, 0, 0, 0]);
    bytes.extend_from_slice(&54u32.to_le_bytes());

    bytes.extend_from_slice(&40u32.to_le_bytes());
    bytes.extend_from_slice(&(width as i32).to_le_bytes());
    bytes.extend_from_slice(&(height as i32).to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&24u16.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());
    bytes.extend_from_slice(&pixel_array_size.to_le_bytes());
    bytes.extend_from_slice(&2835u32.to_le_bytes());
    bytes.extend_from_slice(&2835u32.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());

    bytes.resize(file_size as usize, 0);
    bytes
}

pub fn write_bmp(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dir");
    }
    fs::write(path, bmp_bytes(width, height)).expect("write bmp file");
}

/// Writes a PNG mask with the given rectangles (`x, y, w, h`) set to 255.
pub fn write_mask_png(path: &Path, width: u32, height: u32, rects: &[(u32, u32, u32, u32)]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dir");
    }
    let mut mask = GrayImage::new(width, height);
    for &(x0, y0, w, h) in rects {
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
    }
    mask.save(path).expect("write mask png");
}

/// Reads back an indexed PNG as raw palette indices.
pub fn read_index_png(path: &Path) -> (u32, u32, Vec<u8>) {
    let mut decoder = png::Decoder::new(fs::File::open(path).expect("open png"));
    decoder.set_transformations(png::Transformations::IDENTITY);
    let mut reader = decoder.read_info().expect("png header");
    let mut buf = vec![0; reader.output_buffer_size()];
    let frame = reader.next_frame(&mut buf).expect("png frame");
    buf.truncate(frame.buffer_size());
    (frame.width, frame.height, buf)
}

/// Two 10x10 images: a cat box plus a dog triangle, then a zero-area box.
pub fn sample_tasks() -> Vec<Task> {
    vec![
        Task::new("pets/cat.jpg", 10, 10)
            .with_annotation(Annotation::bbox("cat", 1.0, 1.0, 4.0, 4.0))
            .with_annotation(Annotation::polygon(
                "dog",
                vec![5.0, 5.0, 9.0, 5.0, 9.0, 9.0],
            )),
        Task::new("empty.jpg", 10, 10)
            .with_annotation(Annotation::bbox("cat", 3.0, 3.0, 3.0, 8.0)),
    ]
}

pub fn write_tasks(path: &Path, tasks: &[Task]) {
    labelkit::ir::io_json::write_tasks_json(path, tasks).expect("write task json");
}
