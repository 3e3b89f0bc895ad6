use image::Luma;
use imageproc::distance_transform::Norm;
use imageproc::filter::median_filter;
use imageproc::morphology;
use imageproc::region_labelling::{connected_components, Connectivity};
use std::collections::HashMap;

use crate::mask::Mask;

/// Erase 8-connected foreground components smaller than `min_size` pixels
pub fn fill(mask: &Mask, min_size: u32) -> Mask {
    if min_size <= 1 {
        return mask.clone();
    }
    let labeled = connected_components(mask.as_gray(), Connectivity::Eight, Luma([0u8]));

    let mut sizes: HashMap<u32, u32> = HashMap::new();
    for label in labeled.pixels() {
        if label[0] != 0 {
            *sizes.entry(label[0]).or_insert(0) += 1;
        }
    }

    let (width, height) = mask.dimensions();
    Mask::from_fn(width, height, |x, y| {
        let label = labeled.get_pixel(x, y)[0];
        label != 0 && sizes.get(&label).copied().unwrap_or(0) >= min_size
    })
}

/// Square-element dilation, `kernel × kernel`, repeated `iterations` times.
///
/// The element is centred, so an even `kernel` acts as `kernel + 1`.
pub fn dilate(mask: &Mask, kernel: u32, iterations: u32) -> Mask {
    let radius = kernel_radius(kernel);
    let mut gray = mask.as_gray().clone();
    for _ in 0..iterations {
        gray = morphology::dilate(&gray, Norm::LInf, radius);
    }
    Mask::from_gray(&gray)
}

/// Square-element erosion, `kernel × kernel`, repeated `iterations` times.
///
/// The element is centred, so an even `kernel` acts as `kernel + 1`.
pub fn erode(mask: &Mask, kernel: u32, iterations: u32) -> Mask {
    let radius = kernel_radius(kernel);
    let mut gray = mask.as_gray().clone();
    for _ in 0..iterations {
        gray = morphology::erode(&gray, Norm::LInf, radius);
    }
    Mask::from_gray(&gray)
}

fn kernel_radius(kernel: u32) -> u8 {
    (kernel / 2).min(u8::MAX as u32) as u8
}

/// Median filter over a `(2r+1)²` window, re-binarized
pub fn median_blur(mask: &Mask, radius: u32) -> Mask {
    if radius == 0 {
        return mask.clone();
    }
    let filtered = median_filter(mask.as_gray(), radius, radius);
    Mask::from_fn(filtered.width(), filtered.height(), |x, y| {
        filtered.get_pixel(x, y)[0] >= 128
    })
}
