use image::{DynamicImage, ImageBuffer, Rgb, RgbImage};
use phenoscan::segmentation::{Channel, MaskRecipe, Polarity};
use phenoscan::{DebugSink, Mask};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Color constants for synthetic scenes
pub const PLANT: Rgb<u8> = Rgb([40, 200, 40]);
pub const SOIL: Rgb<u8> = Rgb([30, 30, 30]);
pub const MARKER: Rgb<u8> = Rgb([250, 250, 250]);

/// Uniform image filled with `color`
pub fn blank(width: u32, height: u32, color: Rgb<u8>) -> RgbImage {
    ImageBuffer::from_fn(width, height, |_, _| color)
}

pub fn paint_rect(image: &mut RgbImage, x: u32, y: u32, w: u32, h: u32, color: Rgb<u8>) {
    for py in y..y + h {
        for px in x..x + w {
            image.put_pixel(px, py, color);
        }
    }
}

/// 100x100 soil with a 20x20 plant square at (40, 40)
pub fn square_plant() -> RgbImage {
    let mut image = blank(100, 100, SOIL);
    paint_rect(&mut image, 40, 40, 20, 20, PLANT);
    image
}

/// Keeps bright-green pixels: green channel >= 128
pub fn green_recipe() -> MaskRecipe {
    MaskRecipe::threshold(Channel::Green, 128, Polarity::Light)
}

/// Mask drawn with '#' for foreground, anything else for background
pub fn mask_from_rows(rows: &[&str]) -> Mask {
    let height = rows.len() as u32;
    let width = rows.first().map_or(0, |r| r.len()) as u32;
    Mask::from_fn(width, height, |x, y| {
        rows[y as usize].as_bytes()[x as usize] == b'#'
    })
}

/// Mask with every `(x, y, w, h)` rectangle set
pub fn rect_mask(width: u32, height: u32, rects: &[(u32, u32, u32, u32)]) -> Mask {
    Mask::from_fn(width, height, |x, y| {
        rects
            .iter()
            .any(|&(rx, ry, rw, rh)| x >= rx && x < rx + rw && y >= ry && y < ry + rh)
    })
}

/// 30x30 mask: a ring (outer 20x20 at (5,5), hole 10x10 at (10,10)) with
/// a 4x4 island in the hole
pub fn ring_with_island() -> Mask {
    Mask::from_fn(30, 30, |x, y| {
        let in_outer = (5..25).contains(&x) && (5..25).contains(&y);
        let in_hole = (10..20).contains(&x) && (10..20).contains(&y);
        let in_island = (13..17).contains(&x) && (13..17).contains(&y);
        (in_outer && !in_hole) || in_island
    })
}

pub fn save_png(dir: &Path, name: &str, image: &RgbImage) -> PathBuf {
    let path = dir.join(name);
    image
        .save_with_format(&path, image::ImageFormat::Png)
        .expect("Failed to save test image");
    path
}

/// A `.png` file that is not an image
pub fn write_corrupt(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"definitely not a png").expect("Failed to write corrupt file");
    path
}

/// Debug sink that remembers the stage names it was handed
#[derive(Default)]
pub struct RecordingSink {
    pub stages: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn stages(&self) -> Vec<String> {
        self.stages.lock().expect("sink lock poisoned").clone()
    }
}

impl DebugSink for RecordingSink {
    fn record(&self, stage: &str, _image: &DynamicImage) {
        self.stages
            .lock()
            .expect("sink lock poisoned")
            .push(stage.to_string());
    }
}
