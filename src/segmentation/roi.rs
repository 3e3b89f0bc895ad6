use serde::{Deserialize, Serialize};

use crate::error::{PhenoError, Result};
use crate::mask::Mask;
use crate::models::{RegionKind, RegionSet};

/// Region of interest as written in the configuration.
///
/// `Adjusted` starts from the full image and moves each edge: `x_adj`/`y_adj`
/// push the left/top edges in, a negative `w_adj`/`h_adj` pulls the right/bottom
/// edges in from the far side. The same definition therefore fits images whose
/// capture size varies slightly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum RoiShape {
    Rectangle {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },
    Adjusted {
        #[serde(default)]
        x_adj: i64,
        #[serde(default)]
        y_adj: i64,
        #[serde(default)]
        w_adj: i64,
        #[serde(default)]
        h_adj: i64,
    },
    Polygon {
        points: Vec<[i32; 2]>,
    },
}

impl Default for RoiShape {
    fn default() -> Self {
        RoiShape::Adjusted {
            x_adj: 0,
            y_adj: 0,
            w_adj: 0,
            h_adj: 0,
        }
    }
}

impl RoiShape {
    /// Checks that do not depend on the image size
    pub fn validate(&self) -> Result<()> {
        match self {
            RoiShape::Rectangle { width, height, .. } => {
                if *width == 0 || *height == 0 {
                    return Err(PhenoError::config("ROI rectangle must have a nonzero size"));
                }
            }
            RoiShape::Adjusted {
                x_adj,
                y_adj,
                w_adj,
                h_adj,
            } => {
                if *x_adj < 0 || *y_adj < 0 {
                    return Err(PhenoError::config("ROI x_adj and y_adj cannot be negative"));
                }
                if *x_adj > 0 && *w_adj > 0 {
                    return Err(PhenoError::config(
                        "ROI x_adj and w_adj cannot both be positive, the ROI would leave the frame",
                    ));
                }
                if *y_adj > 0 && *h_adj > 0 {
                    return Err(PhenoError::config(
                        "ROI y_adj and h_adj cannot both be positive, the ROI would leave the frame",
                    ));
                }
            }
            RoiShape::Polygon { points } => {
                if points.len() < 3 {
                    return Err(PhenoError::config("ROI polygon needs at least 3 points"));
                }
            }
        }
        Ok(())
    }

    /// Pin the ROI to concrete pixel coordinates for an image of this size
    pub fn resolve(&self, width: u32, height: u32) -> Result<ResolvedRoi> {
        self.validate()?;
        let (w, h) = (width as i64, height as i64);
        let (x0, y0, x1, y1) = match self {
            RoiShape::Rectangle {
                x,
                y,
                width: rw,
                height: rh,
            } => (*x as i64, *y as i64, *x as i64 + *rw as i64, *y as i64 + *rh as i64),
            RoiShape::Adjusted {
                x_adj,
                y_adj,
                w_adj,
                h_adj,
            } => (*x_adj, *y_adj, w + w_adj, h + h_adj),
            RoiShape::Polygon { points } => {
                let vertices = points
                    .iter()
                    .map(|[x, y]| (*x as f64, *y as f64))
                    .collect();
                return Ok(ResolvedRoi::Polygon(vertices));
            }
        };

        let (x1, y1) = (x1.min(w), y1.min(h));
        if x0 >= x1 || y0 >= y1 {
            return Err(PhenoError::config(format!(
                "ROI ({}, {})-({}, {}) does not overlap the {}x{} image",
                x0, y0, x1, y1, width, height
            )));
        }
        Ok(ResolvedRoi::Rect {
            x0: x0 as i32,
            y0: y0 as i32,
            x1: x1 as i32,
            y1: y1 as i32,
        })
    }
}

/// ROI in pixel space, used purely as a predicate
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedRoi {
    /// Half-open pixel range `[x0, x1) × [y0, y1)`
    Rect { x0: i32, y0: i32, x1: i32, y1: i32 },
    /// Vertices in corner coordinates; a pixel is inside when its center is
    Polygon(Vec<(f64, f64)>),
}

impl ResolvedRoi {
    pub fn contains_pixel(&self, px: i32, py: i32) -> bool {
        match self {
            ResolvedRoi::Rect { x0, y0, x1, y1 } => px >= *x0 && px < *x1 && py >= *y0 && py < *y1,
            ResolvedRoi::Polygon(vertices) => {
                point_in_polygon(vertices, px as f64 + 0.5, py as f64 + 0.5)
            }
        }
    }

    /// Rasterized ROI clipped to the image
    pub fn to_mask(&self, width: u32, height: u32) -> Mask {
        Mask::from_fn(width, height, |x, y| self.contains_pixel(x as i32, y as i32))
    }
}

/// Even-odd ray casting
fn point_in_polygon(vertices: &[(f64, f64)], x: f64, y: f64) -> bool {
    let n = vertices.len();
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = vertices[i];
        let (xj, yj) = vertices[j];
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// How much of a region must fall inside the ROI for it to be kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Containment {
    /// any boundary pixel inside
    #[default]
    Partial,
    /// every boundary pixel inside
    Complete,
}

/// Outcome of filtering regions against an ROI
#[derive(Debug, Clone)]
pub struct RoiSelection {
    /// Retained regions with their re-indexed sub-hierarchy
    pub regions: RegionSet,
    /// Raster of the retained regions, holes subtracted
    pub kept_mask: Mask,
    pub kept_area: u64,
}

impl RoiSelection {
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

/// Keep outer regions that satisfy `policy`, plus the holes of kept regions.
///
/// Zero survivors is a valid outcome: the selection is empty and its mask
/// all background.
pub fn filter_regions(regions: &RegionSet, roi: &ResolvedRoi, policy: Containment) -> RoiSelection {
    let mut keep = vec![false; regions.len()];
    for (i, region) in regions.iter().enumerate() {
        keep[i] = match region.kind {
            RegionKind::Outer => {
                let mut pixels = region.boundary_pixels().into_iter();
                match policy {
                    Containment::Partial => pixels.any(|(x, y)| roi.contains_pixel(x, y)),
                    Containment::Complete => pixels.all(|(x, y)| roi.contains_pixel(x, y)),
                }
            }
            RegionKind::Hole => region.parent.is_some_and(|p| keep[p]),
        };
    }

    let indices: Vec<usize> = (0..regions.len()).filter(|&i| keep[i]).collect();
    let retained = regions.subset(&indices);
    let kept_mask = retained.rasterize();
    let kept_area = kept_mask.foreground_count();

    RoiSelection {
        regions: retained,
        kept_mask,
        kept_area,
    }
}
