use image::{GrayImage, Luma};
use imageproc::geometry::arc_length;
use imageproc::point::Point;
use std::fmt;

use crate::mask::{Mask, BACKGROUND, FOREGROUND};

/// Whether a traced boundary encloses foreground or a hole in it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
    Outer,
    Hole,
}

impl RegionKind {
    pub fn opposite(self) -> Self {
        match self {
            RegionKind::Outer => RegionKind::Hole,
            RegionKind::Hole => RegionKind::Outer,
        }
    }
}

/// Closed crack boundary of one connected component.
///
/// Vertices sit on pixel corners, so pixel `(x, y)` spans `[x, x+1) × [y, y+1)`.
/// Only turning points are stored; the polygon closes back to the first vertex.
#[derive(Debug, Clone)]
pub struct Region {
    pub boundary: Vec<Point<i32>>,
    pub kind: RegionKind,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    area: u64,
}

impl Region {
    pub fn new(boundary: Vec<Point<i32>>, kind: RegionKind) -> Self {
        let area = shoelace_area(&boundary);
        Self {
            boundary,
            kind,
            parent: None,
            children: Vec::new(),
            area,
        }
    }

    /// Number of pixels enclosed by the boundary (nested holes included)
    pub fn area(&self) -> u64 {
        self.area
    }

    pub fn perimeter(&self) -> f64 {
        arc_length(&self.boundary, true)
    }

    /// Corner-coordinate bounds `(min_x, min_y, max_x, max_y)`
    pub fn bounds(&self) -> (i32, i32, i32, i32) {
        self.boundary.iter().fold(
            (i32::MAX, i32::MAX, i32::MIN, i32::MIN),
            |(x0, y0, x1, y1), p| (x0.min(p.x), y0.min(p.y), x1.max(p.x), y1.max(p.y)),
        )
    }

    /// Pixels lying just inside the boundary, one per unit crack edge
    pub fn boundary_pixels(&self) -> Vec<(i32, i32)> {
        let mut pixels = Vec::new();
        let n = self.boundary.len();
        for i in 0..n {
            let a = self.boundary[i];
            let b = self.boundary[(i + 1) % n];
            let dx = (b.x - a.x).signum();
            let dy = (b.y - a.y).signum();
            let steps = (b.x - a.x).abs() + (b.y - a.y).abs();
            // the enclosed side is on the right of the walking direction
            let (nx, ny) = (-dy, dx);
            let off_x = if dx + nx > 0 { 0 } else { -1 };
            let off_y = if dy + ny > 0 { 0 } else { -1 };
            for s in 0..steps {
                pixels.push((a.x + dx * s + off_x, a.y + dy * s + off_y));
            }
        }
        pixels
    }

    /// Paint every pixel whose center falls inside the boundary with `value`
    pub fn rasterize_into(&self, canvas: &mut GrayImage, value: u8) {
        let (width, height) = canvas.dimensions();
        let (_, min_y, _, max_y) = self.bounds();
        let n = self.boundary.len();
        let mut crossings = Vec::new();

        for py in min_y.max(0)..max_y.min(height as i32) {
            crossings.clear();
            for i in 0..n {
                let a = self.boundary[i];
                let b = self.boundary[(i + 1) % n];
                if a.x != b.x {
                    continue;
                }
                let (lo, hi) = (a.y.min(b.y), a.y.max(b.y));
                if lo <= py && py < hi {
                    crossings.push(a.x);
                }
            }
            crossings.sort_unstable();
            for span in crossings.chunks_exact(2) {
                let start = span[0].max(0);
                let end = span[1].min(width as i32);
                for px in start..end {
                    canvas.put_pixel(px as u32, py as u32, Luma([value]));
                }
            }
        }
    }
}

fn shoelace_area(points: &[Point<i32>]) -> u64 {
    let n = points.len();
    if n < 3 {
        return 0;
    }
    let twice: i64 = (0..n)
        .map(|i| {
            let a = points[i];
            let b = points[(i + 1) % n];
            a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64
        })
        .sum();
    (twice.abs() / 2) as u64
}

/// Regions of one mask plus their containment forest.
///
/// Indices are ordered so that every parent precedes its children.
#[derive(Debug, Clone)]
pub struct RegionSet {
    regions: Vec<Region>,
    width: u32,
    height: u32,
}

impl RegionSet {
    pub fn new(regions: Vec<Region>, width: u32, height: u32) -> Self {
        Self {
            regions,
            width,
            height,
        }
    }

    pub fn empty(width: u32, height: u32) -> Self {
        Self::new(Vec::new(), width, height)
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn get(&self, index: usize) -> Option<&Region> {
        self.regions.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Region> {
        self.regions.iter()
    }

    /// Indices of regions without a parent
    pub fn roots(&self) -> Vec<usize> {
        (0..self.regions.len())
            .filter(|&i| self.regions[i].parent.is_none())
            .collect()
    }

    /// `index` followed by all of its descendants, in index order
    pub fn subtree(&self, index: usize) -> Vec<usize> {
        let mut keep = vec![false; self.regions.len()];
        let mut stack = vec![index];
        while let Some(i) = stack.pop() {
            keep[i] = true;
            stack.extend(self.regions[i].children.iter().copied());
        }
        (0..self.regions.len()).filter(|&i| keep[i]).collect()
    }

    /// Re-indexed copy holding only `indices`; hierarchy edges survive only
    /// when both ends are retained
    pub fn subset(&self, indices: &[usize]) -> RegionSet {
        let mut sorted = indices.to_vec();
        sorted.sort_unstable();
        sorted.dedup();

        let mut remap = vec![None; self.regions.len()];
        for (new_idx, &old_idx) in sorted.iter().enumerate() {
            remap[old_idx] = Some(new_idx);
        }

        let regions = sorted
            .iter()
            .map(|&old_idx| {
                let old = &self.regions[old_idx];
                let mut region = old.clone();
                region.parent = old.parent.and_then(|p| remap[p]);
                region.children = old.children.iter().filter_map(|&c| remap[c]).collect();
                region
            })
            .collect();

        RegionSet::new(regions, self.width, self.height)
    }

    /// Paint all regions in index order: outers as foreground, holes as background
    pub fn rasterize(&self) -> Mask {
        let mut canvas = GrayImage::new(self.width, self.height);
        for region in &self.regions {
            let value = match region.kind {
                RegionKind::Outer => FOREGROUND,
                RegionKind::Hole => BACKGROUND,
            };
            region.rasterize_into(&mut canvas, value);
        }
        Mask::from_gray(&canvas)
    }

    pub fn outer_area(&self) -> u64 {
        self.sum_area(RegionKind::Outer)
    }

    pub fn hole_area(&self) -> u64 {
        self.sum_area(RegionKind::Hole)
    }

    fn sum_area(&self, kind: RegionKind) -> u64 {
        self.regions
            .iter()
            .filter(|r| r.kind == kind)
            .map(Region::area)
            .sum()
    }
}

/// Kept regions merged into a single subject, with its raster
#[derive(Debug, Clone)]
pub struct CompositeObject {
    pub regions: RegionSet,
    pub mask: Mask,
}

impl CompositeObject {
    pub fn area(&self) -> u64 {
        self.mask.foreground_count()
    }

    /// Vertices of every outer boundary
    pub fn outer_points(&self) -> Vec<Point<i32>> {
        self.regions
            .iter()
            .filter(|r| r.kind == RegionKind::Outer)
            .flat_map(|r| r.boundary.iter().copied())
            .collect()
    }

    /// Total boundary length, holes included
    pub fn perimeter(&self) -> f64 {
        self.regions.iter().map(Region::perimeter).sum()
    }
}

/// Which analyzer produced a record; also the order groups are written in
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RecordGroup {
    Shape,
    Color,
    Marker,
}

impl RecordGroup {
    pub fn label(&self) -> &'static str {
        match self {
            RecordGroup::Shape => "shape",
            RecordGroup::Color => "color",
            RecordGroup::Marker => "marker",
        }
    }
}

/// Measurement value types
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    Series(Vec<u64>),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Int(v) => write!(f, "{}", v),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Bool(v) => write!(f, "{}", v),
            FieldValue::Text(v) => write!(f, "{}", v),
            FieldValue::Series(values) => {
                let joined: Vec<String> = values.iter().map(u64::to_string).collect();
                write!(f, "{}", joined.join(","))
            }
        }
    }
}

/// Ordered field → value mapping produced by one analyzer
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementRecord {
    pub group: RecordGroup,
    fields: Vec<(String, FieldValue)>,
}

impl MeasurementRecord {
    pub fn new(group: RecordGroup) -> Self {
        Self {
            group,
            fields: Vec::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: FieldValue) -> Self {
        self.push(key, value);
        self
    }

    pub fn push(&mut self, key: impl Into<String>, value: FieldValue) {
        self.fields.push((key.into(), value));
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_float(&self, key: &str) -> Option<f64> {
        match self.get(key) {
            Some(FieldValue::Float(v)) => Some(*v),
            Some(FieldValue::Int(v)) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.get(key) {
            Some(FieldValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get(key) {
            Some(FieldValue::Bool(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_series(&self, key: &str) -> Option<&[u64]> {
        match self.get(key) {
            Some(FieldValue::Series(v)) => Some(v.as_slice()),
            _ => None,
        }
    }

    pub fn header(&self) -> Vec<&str> {
        self.fields.iter().map(|(k, _)| k.as_str()).collect()
    }

    pub fn values(&self) -> Vec<String> {
        self.fields.iter().map(|(_, v)| v.to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
