use image::{GrayImage, Luma, Rgb, RgbImage};
use palette::{FromColor, Hsv, Lab, Srgb};
use serde::{Deserialize, Serialize};

use crate::mask::Mask;

/// Single color-space component that can be pulled out of an RGB image.
///
/// All components are encoded on 0-255: hue is degrees / 2 (0-179),
/// `l` is L*·255/100, `a` and `b` are offset by 128.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    #[serde(rename = "red")]
    Red,
    #[serde(rename = "green")]
    Green,
    #[serde(rename = "blue")]
    Blue,
    #[serde(rename = "h")]
    Hue,
    #[serde(rename = "s")]
    Saturation,
    #[serde(rename = "v")]
    Value,
    #[serde(rename = "l")]
    Lightness,
    #[serde(rename = "a")]
    GreenMagenta,
    #[serde(rename = "b")]
    BlueYellow,
}

impl Channel {
    pub const ALL: [Channel; 9] = [
        Channel::Blue,
        Channel::Green,
        Channel::Red,
        Channel::Lightness,
        Channel::GreenMagenta,
        Channel::BlueYellow,
        Channel::Hue,
        Channel::Saturation,
        Channel::Value,
    ];

    /// Field-name prefix used in measurement records
    pub fn label(&self) -> &'static str {
        match self {
            Channel::Red => "red",
            Channel::Green => "green",
            Channel::Blue => "blue",
            Channel::Hue => "hue",
            Channel::Saturation => "saturation",
            Channel::Value => "value",
            Channel::Lightness => "lightness",
            Channel::GreenMagenta => "green_magenta",
            Channel::BlueYellow => "blue_yellow",
        }
    }

    /// 8-bit value of this component for one pixel
    pub fn sample(&self, pixel: &Rgb<u8>) -> u8 {
        let [r, g, b] = pixel.0;
        match self {
            Channel::Red => r,
            Channel::Green => g,
            Channel::Blue => b,
            Channel::Hue | Channel::Saturation | Channel::Value => {
                let hsv = Hsv::from_color(to_srgb(pixel));
                match self {
                    Channel::Hue => {
                        let degrees = hsv.hue.into_positive_degrees();
                        ((degrees / 2.0).round() as u32 % 180) as u8
                    }
                    Channel::Saturation => unit_to_u8(hsv.saturation),
                    _ => unit_to_u8(hsv.value),
                }
            }
            Channel::Lightness | Channel::GreenMagenta | Channel::BlueYellow => {
                let lab = Lab::from_color(to_srgb(pixel));
                match self {
                    Channel::Lightness => clamp_u8(lab.l * 255.0 / 100.0),
                    Channel::GreenMagenta => clamp_u8(lab.a + 128.0),
                    _ => clamp_u8(lab.b + 128.0),
                }
            }
        }
    }
}

fn to_srgb(pixel: &Rgb<u8>) -> Srgb<f32> {
    Srgb::new(pixel[0], pixel[1], pixel[2]).into_format::<f32>()
}

fn unit_to_u8(v: f32) -> u8 {
    clamp_u8(v * 255.0)
}

fn clamp_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// Convert an RGB image into one grayscale component
pub fn extract_channel(image: &RgbImage, channel: Channel) -> GrayImage {
    let (width, height) = image.dimensions();
    GrayImage::from_fn(width, height, |x, y| {
        Luma([channel.sample(image.get_pixel(x, y))])
    })
}

/// Tonal corrections applied to a channel before it is thresholded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelAdjustment {
    /// `255 - v`
    Invert,
    /// Stretch values at or below the histogram peak to full range,
    /// saturate everything above it
    PeakStretch,
}

pub fn apply_adjustments(gray: &GrayImage, adjustments: &[ChannelAdjustment]) -> GrayImage {
    let mut out = gray.clone();
    for adjustment in adjustments {
        match adjustment {
            ChannelAdjustment::Invert => {
                for p in out.pixels_mut() {
                    p[0] = 255 - p[0];
                }
            }
            ChannelAdjustment::PeakStretch => peak_stretch(&mut out),
        }
    }
    out
}

fn peak_stretch(gray: &mut GrayImage) {
    let mut hist = [0u64; 256];
    for p in gray.pixels() {
        hist[p[0] as usize] += 1;
    }
    // first maximum wins on ties
    let peak = hist
        .iter()
        .enumerate()
        .fold((0usize, 0u64), |best, (i, &c)| if c > best.1 { (i, c) } else { best })
        .0;
    if peak == 0 {
        return;
    }
    let alpha = 255.0 / peak as f32;
    for p in gray.pixels_mut() {
        p[0] = if (p[0] as usize) <= peak {
            clamp_u8(p[0] as f32 * alpha)
        } else {
            255
        };
    }
}

/// Fill painted outside the mask by `apply_mask`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Background {
    #[default]
    White,
    Black,
}

impl Background {
    pub fn rgb(&self) -> Rgb<u8> {
        match self {
            Background::White => Rgb([255, 255, 255]),
            Background::Black => Rgb([0, 0, 0]),
        }
    }
}

/// Keep the image under the mask, paint everything else with `background`
pub fn apply_mask(
    image: &RgbImage,
    mask: &Mask,
    background: Background,
) -> crate::Result<RgbImage> {
    mask.ensure_same_dimensions(image.dimensions())?;
    let fill = background.rgb();
    let (width, height) = image.dimensions();
    Ok(RgbImage::from_fn(width, height, |x, y| {
        if mask.is_foreground(x, y) {
            *image.get_pixel(x, y)
        } else {
            fill
        }
    }))
}
