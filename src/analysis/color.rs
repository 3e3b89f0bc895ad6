use image::{Rgb, RgbImage};

use crate::error::{PhenoError, Result};
use crate::mask::Mask;
use crate::models::{FieldValue, MeasurementRecord, RecordGroup};
use crate::segmentation::channels::{Background, Channel};

pub const DEFAULT_BINS: u32 = 256;

/// Per-channel histogram of the pixels under `mask`
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelHistogram {
    pub channel: Channel,
    pub counts: Vec<u64>,
    pub mean: f64,
    /// lowest bin holding the maximum count
    pub peak_bin: usize,
}

pub fn channel_histogram(
    image: &RgbImage,
    mask: &Mask,
    bins: u32,
    channel: Channel,
) -> ChannelHistogram {
    let mut counts = vec![0u64; bins as usize];
    let (mut sum, mut n) = (0u64, 0u64);
    for (x, y, pixel) in image.enumerate_pixels() {
        if !mask.is_foreground(x, y) {
            continue;
        }
        let v = channel.sample(pixel) as usize;
        counts[v * bins as usize / 256] += 1;
        sum += v as u64;
        n += 1;
    }
    let peak_bin = counts
        .iter()
        .enumerate()
        .fold((0usize, 0u64), |best, (i, &c)| if c > best.1 { (i, c) } else { best })
        .0;
    ChannelHistogram {
        channel,
        counts,
        mean: if n > 0 { sum as f64 / n as f64 } else { 0.0 },
        peak_bin,
    }
}

/// Color distribution of the masked pixels.
///
/// Fields: `pixel_count`, then for every requested channel
/// `<channel>_mean`, `<channel>_peak_bin`, `<channel>_histogram`.
pub fn analyze_color(
    image: &RgbImage,
    mask: &Mask,
    bins: u32,
    channels: &[Channel],
) -> Result<MeasurementRecord> {
    if bins == 0 || bins > 256 {
        return Err(PhenoError::config(format!(
            "histogram bins must be in 1..=256, got {}",
            bins
        )));
    }
    if channels.is_empty() {
        return Err(PhenoError::config("color analysis needs at least one channel"));
    }
    mask.ensure_same_dimensions(image.dimensions())?;
    let pixel_count = mask.foreground_count();
    if pixel_count == 0 {
        return Err(PhenoError::EmptyObject);
    }

    let mut record = MeasurementRecord::new(RecordGroup::Color)
        .with("pixel_count", FieldValue::Int(pixel_count as i64));
    for &channel in channels {
        let hist = channel_histogram(image, mask, bins, channel);
        let label = channel.label();
        record.push(format!("{}_mean", label), FieldValue::Float(hist.mean));
        record.push(format!("{}_peak_bin", label), FieldValue::Int(hist.peak_bin as i64));
        record.push(format!("{}_histogram", label), FieldValue::Series(hist.counts));
    }
    Ok(record)
}

/// Blue → cyan → green → yellow → red ramp over 0-255
fn ramp(v: u8) -> Rgb<u8> {
    let t = v as f32 / 255.0 * 4.0;
    let (r, g, b) = match t {
        t if t < 1.0 => (0.0, t, 1.0),
        t if t < 2.0 => (0.0, 1.0, 2.0 - t),
        t if t < 3.0 => (t - 2.0, 1.0, 0.0),
        t => (1.0, (4.0 - t).max(0.0), 0.0),
    };
    Rgb([(r * 255.0) as u8, (g * 255.0) as u8, (b * 255.0) as u8])
}

/// Visualize one channel of the masked pixels; the rest is painted `background`
pub fn pseudocolor(
    image: &RgbImage,
    mask: &Mask,
    channel: Channel,
    background: Background,
) -> Result<RgbImage> {
    mask.ensure_same_dimensions(image.dimensions())?;
    let fill = background.rgb();
    let (width, height) = image.dimensions();
    Ok(RgbImage::from_fn(width, height, |x, y| {
        if mask.is_foreground(x, y) {
            ramp(channel.sample(image.get_pixel(x, y)))
        } else {
            fill
        }
    }))
}
