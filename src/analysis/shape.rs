use imageproc::geometry::convex_hull;
use imageproc::point::Point;

use crate::error::{PhenoError, Result};
use crate::mask::Mask;
use crate::models::{CompositeObject, FieldValue, MeasurementRecord, RecordGroup};

/// Raw and central moments of a mask's foreground, treating each pixel as a
/// unit square centered on `(x + 0.5, y + 0.5)`
#[derive(Debug, Clone, Copy)]
pub struct PixelMoments {
    pub count: u64,
    pub centroid_x: f64,
    pub centroid_y: f64,
    /// normalized second central moments
    pub mu20: f64,
    pub mu02: f64,
    pub mu11: f64,
    /// inclusive pixel bounds `(min_x, min_y, max_x, max_y)`
    pub bounds: (u32, u32, u32, u32),
}

/// Equivalent ellipse with the same second moments as the object
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipse {
    pub major_axis: f64,
    pub minor_axis: f64,
    /// degrees, counter-clockwise from the x axis in image coordinates
    pub angle: f64,
    pub eccentricity: f64,
}

impl PixelMoments {
    /// `None` for an all-background mask
    pub fn from_mask(mask: &Mask) -> Option<Self> {
        let (mut n, mut sx, mut sy) = (0u64, 0f64, 0f64);
        let (mut sxx, mut syy, mut sxy) = (0f64, 0f64, 0f64);
        let mut bounds = (u32::MAX, u32::MAX, 0u32, 0u32);

        for (x, y, p) in mask.as_gray().enumerate_pixels() {
            if p[0] == 0 {
                continue;
            }
            let (fx, fy) = (x as f64 + 0.5, y as f64 + 0.5);
            n += 1;
            sx += fx;
            sy += fy;
            sxx += fx * fx;
            syy += fy * fy;
            sxy += fx * fy;
            bounds = (
                bounds.0.min(x),
                bounds.1.min(y),
                bounds.2.max(x),
                bounds.3.max(y),
            );
        }
        if n == 0 {
            return None;
        }

        let m = n as f64;
        let (cx, cy) = (sx / m, sy / m);
        Some(Self {
            count: n,
            centroid_x: cx,
            centroid_y: cy,
            mu20: sxx / m - cx * cx,
            mu02: syy / m - cy * cy,
            mu11: sxy / m - cx * cy,
            bounds,
        })
    }

    pub fn width(&self) -> u32 {
        self.bounds.2 - self.bounds.0 + 1
    }

    pub fn height(&self) -> u32 {
        self.bounds.3 - self.bounds.1 + 1
    }

    pub fn ellipse(&self) -> Ellipse {
        let half_trace = (self.mu20 + self.mu02) / 2.0;
        let spread = (((self.mu20 - self.mu02) / 2.0).powi(2) + self.mu11.powi(2)).sqrt();
        let major = (half_trace + spread).max(0.0);
        let minor = (half_trace - spread).max(0.0);
        let eccentricity = if major > 0.0 {
            (1.0 - minor / major).max(0.0).sqrt()
        } else {
            0.0
        };
        Ellipse {
            major_axis: 4.0 * major.sqrt(),
            minor_axis: 4.0 * minor.sqrt(),
            angle: (0.5 * (2.0 * self.mu11).atan2(self.mu20 - self.mu02)).to_degrees(),
            eccentricity,
        }
    }
}

fn polygon_area(points: &[Point<i32>]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let twice: i64 = (0..n)
        .map(|i| {
            let (a, b) = (points[i], points[(i + 1) % n]);
            a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64
        })
        .sum();
    twice.abs() as f64 / 2.0
}

/// Geometric descriptors of a composite object.
///
/// Fields, in order: area, hull_area, solidity, perimeter, width, height,
/// extent, centroid_x, centroid_y, hull_vertices, in_bounds,
/// ellipse_major_axis, ellipse_minor_axis, ellipse_angle, eccentricity.
pub fn analyze_shape(
    image_dims: (u32, u32),
    object: &CompositeObject,
) -> Result<MeasurementRecord> {
    object.mask.ensure_same_dimensions(image_dims)?;
    let moments = PixelMoments::from_mask(&object.mask).ok_or(PhenoError::EmptyObject)?;

    let area = moments.count as f64;
    let hull = convex_hull(object.outer_points().as_slice());
    let hull_area = polygon_area(&hull);
    let solidity = if hull_area > 0.0 { area / hull_area } else { 1.0 };

    let (width, height) = (moments.width(), moments.height());
    let extent = area / (width as f64 * height as f64);

    let (img_w, img_h) = image_dims;
    let (x0, y0, x1, y1) = moments.bounds;
    let in_bounds = x0 > 0 && y0 > 0 && x1 + 1 < img_w && y1 + 1 < img_h;

    let ellipse = moments.ellipse();

    Ok(MeasurementRecord::new(RecordGroup::Shape)
        .with("area", FieldValue::Int(moments.count as i64))
        .with("hull_area", FieldValue::Float(hull_area))
        .with("solidity", FieldValue::Float(solidity))
        .with("perimeter", FieldValue::Float(object.perimeter()))
        .with("width", FieldValue::Int(width as i64))
        .with("height", FieldValue::Int(height as i64))
        .with("extent", FieldValue::Float(extent))
        .with("centroid_x", FieldValue::Float(moments.centroid_x))
        .with("centroid_y", FieldValue::Float(moments.centroid_y))
        .with("hull_vertices", FieldValue::Int(hull.len() as i64))
        .with("in_bounds", FieldValue::Bool(in_bounds))
        .with("ellipse_major_axis", FieldValue::Float(ellipse.major_axis))
        .with("ellipse_minor_axis", FieldValue::Float(ellipse.minor_axis))
        .with("ellipse_angle", FieldValue::Float(ellipse.angle))
        .with("eccentricity", FieldValue::Float(ellipse.eccentricity)))
}
