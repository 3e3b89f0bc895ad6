use image::{ImageBuffer, Luma};
use imageproc::point::Point;
use imageproc::region_labelling::{connected_components, Connectivity};

use crate::mask::{Mask, FOREGROUND};
use crate::models::{Region, RegionKind, RegionSet};

type Labels = ImageBuffer<Luma<u32>, Vec<u32>>;

/// One component found during the raster scan, before tracing
struct Seed {
    kind: RegionKind,
    label: u32,
    x: u32,
    y: u32,
    pixels: u64,
}

/// Find every foreground component (8-connected) and every hole (4-connected
/// background not touching the image border), trace their boundaries and
/// link them into a containment forest.
///
/// Regions come out in raster order of their first pixel, which puts every
/// parent before its children. Single-pixel foreground components have no
/// enclosed area and are dropped; one-pixel holes are kept.
pub fn extract_regions(mask: &Mask) -> RegionSet {
    let (width, height) = mask.dimensions();
    if mask.is_empty() {
        return RegionSet::empty(width, height);
    }

    let fg = connected_components(mask.as_gray(), Connectivity::Eight, Luma([0u8]));
    let bg = connected_components(mask.inverted().as_gray(), Connectivity::Four, Luma([0u8]));

    let fg_count = max_label(&fg) as usize;
    let bg_count = max_label(&bg) as usize;

    // background components touching the border are "outside", not holes
    let mut outside = vec![false; bg_count + 1];
    for (x, y, label) in bg.enumerate_pixels() {
        if x == 0 || y == 0 || x == width - 1 || y == height - 1 {
            outside[label[0] as usize] = true;
        }
    }

    let mut fg_seed: Vec<Option<usize>> = vec![None; fg_count + 1];
    let mut bg_seed: Vec<Option<usize>> = vec![None; bg_count + 1];
    let mut seeds: Vec<Seed> = Vec::new();

    for (x, y, p) in mask.as_gray().enumerate_pixels() {
        let (kind, label, slot) = if p[0] == FOREGROUND {
            let label = fg.get_pixel(x, y)[0];
            (RegionKind::Outer, label, &mut fg_seed[label as usize])
        } else {
            let label = bg.get_pixel(x, y)[0];
            if outside[label as usize] {
                continue;
            }
            (RegionKind::Hole, label, &mut bg_seed[label as usize])
        };
        match *slot {
            Some(i) => seeds[i].pixels += 1,
            None => {
                *slot = Some(seeds.len());
                seeds.push(Seed { kind, label, x, y, pixels: 1 });
            }
        }
    }

    // Parent of a component is whatever encloses its first pixel: for a
    // foreground component the pixel to its left, for a hole the pixel above.
    let parents: Vec<Option<usize>> = seeds
        .iter()
        .map(|seed| match seed.kind {
            RegionKind::Outer => {
                if seed.x == 0 {
                    return None;
                }
                let left = bg.get_pixel(seed.x - 1, seed.y)[0] as usize;
                if outside[left] { None } else { bg_seed[left] }
            }
            RegionKind::Hole => {
                let above = fg.get_pixel(seed.x, seed.y - 1)[0] as usize;
                fg_seed[above]
            }
        })
        .collect();

    let mut regions: Vec<Region> = seeds
        .iter()
        .map(|seed| {
            let labels = match seed.kind {
                RegionKind::Outer => &fg,
                RegionKind::Hole => &bg,
            };
            let boundary = trace_boundary(labels, seed.label, seed.x, seed.y, seed.kind);
            Region::new(boundary, seed.kind)
        })
        .collect();

    for (i, parent) in parents.iter().enumerate() {
        regions[i].parent = *parent;
        if let Some(p) = parent {
            regions[*p].children.push(i);
        }
    }

    let all = RegionSet::new(regions, width, height);
    let kept: Vec<usize> = (0..seeds.len())
        .filter(|&i| seeds[i].kind == RegionKind::Hole || seeds[i].pixels > 1)
        .collect();
    if kept.len() == seeds.len() {
        all
    } else {
        all.subset(&kept)
    }
}

fn max_label(labels: &Labels) -> u32 {
    labels.pixels().map(|p| p[0]).max().unwrap_or(0)
}

/// Follow the pixel-edge boundary of the component holding `label`, starting
/// at the top-left corner of its first pixel and keeping the component on
/// the right. Foreground uses 8-connectivity, holes 4-connectivity.
fn trace_boundary(
    labels: &Labels,
    label: u32,
    x0: u32,
    y0: u32,
    kind: RegionKind,
) -> Vec<Point<i32>> {
    let (width, height) = labels.dimensions();
    let member = |px: i32, py: i32| {
        px >= 0
            && py >= 0
            && (px as u32) < width
            && (py as u32) < height
            && labels.get_pixel(px as u32, py as u32)[0] == label
    };
    // pixel diagonally ahead of vertex (vx, vy) on the side of normal (nx, ny)
    let ahead = |vx: i32, vy: i32, dx: i32, dy: i32, nx: i32, ny: i32| {
        let px = vx + if dx + nx > 0 { 0 } else { -1 };
        let py = vy + if dy + ny > 0 { 0 } else { -1 };
        member(px, py)
    };

    let start = (x0 as i32, y0 as i32);
    let start_dir = (1, 0);
    let mut points = vec![Point::new(start.0, start.1)];
    let (mut vx, mut vy) = start;
    let (mut dx, mut dy) = start_dir;

    loop {
        vx += dx;
        vy += dy;

        let right = (-dy, dx);
        let left = (dy, -dx);
        let ahead_right = ahead(vx, vy, dx, dy, right.0, right.1);
        let ahead_left = ahead(vx, vy, dx, dy, left.0, left.1);

        let next = match kind {
            RegionKind::Outer => {
                if ahead_left {
                    left
                } else if ahead_right {
                    (dx, dy)
                } else {
                    right
                }
            }
            RegionKind::Hole => {
                if !ahead_right {
                    right
                } else if ahead_left {
                    left
                } else {
                    (dx, dy)
                }
            }
        };

        if (vx, vy) == start && next == start_dir {
            break;
        }
        if next != (dx, dy) {
            points.push(Point::new(vx, vy));
        }
        (dx, dy) = next;
    }

    points
}
