use std::collections::VecDeque;
use std::path::Path;

use clarity_core::errors::{ClarityError, ErrorInfo};
use image::{DynamicImage, GrayImage};

use crate::regions::{Bounds, Region, RegionMask};

/// Single-channel saliency map aligned with the baseline image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvidenceMap {
    width: u32,
    height: u32,
    values: Vec<u8>,
}

impl EvidenceMap {
    pub fn new(width: u32, height: u32, values: Vec<u8>) -> Result<Self, ClarityError> {
        if values.len() as u64 != width as u64 * height as u64 || values.is_empty() {
            return Err(ClarityError::Validation(
                ErrorInfo::new(
                    "probe.evidence_len",
                    "evidence buffer does not match dimensions",
                )
                .with_context("width", width.to_string())
                .with_context("height", height.to_string())
                .with_context("len", values.len().to_string()),
            ));
        }
        Ok(Self {
            width,
            height,
            values,
        })
    }

    pub fn from_luma(image: GrayImage) -> Result<Self, ClarityError> {
        let (width, height) = image.dimensions();
        Self::new(width, height, image.into_raw())
    }

    /// Loads any image file, converting it to 8-bit luminance.
    pub fn load(path: &Path) -> Result<Self, ClarityError> {
        let decoded: DynamicImage = image::open(path).map_err(|err| {
            ClarityError::Image(
                ErrorInfo::new("probe.evidence_open", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        Self::from_luma(decoded.to_luma8())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    fn value(&self, x: u32, y: u32) -> u8 {
        self.values[index(self.width, x, y)]
    }
}

/// Row-major offset, widened before multiplying so large maps cannot wrap.
fn index(width: u32, x: u32, y: u32) -> usize {
    y as usize * width as usize + x as usize
}

/// Extracts 4-connected components of pixels with value `>= threshold`.
///
/// Components are discovered in row-major order of their first pixel; those
/// smaller than `min_pixels` are dropped and the survivors are numbered
/// consecutively as `ev_t{threshold}_m{min_pixels}_{index}`.
pub fn evidence_regions(
    map: &EvidenceMap,
    threshold: u8,
    min_pixels: usize,
) -> Result<Vec<Region>, ClarityError> {
    if threshold == 0 {
        return Err(ClarityError::validation(
            "probe.evidence_threshold",
            "threshold 0 would select the whole image",
        ));
    }
    let (width, height) = (map.width, map.height);
    let mut visited = vec![false; map.values.len()];
    let mut regions = Vec::new();
    for y in 0..height {
        for x in 0..width {
            let start = index(width, x, y);
            if visited[start] || map.value(x, y) < threshold {
                continue;
            }
            let mut component = flood(map, threshold, x, y, &mut visited);
            if component.len() < min_pixels.max(1) {
                continue;
            }
            component.sort_by_key(|p| (p[1], p[0]));
            let bounds = bounding_box(&component);
            regions.push(Region {
                id: format!("ev_t{threshold}_m{min_pixels}_{}", regions.len()),
                bounds,
                mask: RegionMask::Pixels { pixels: component },
            });
        }
    }
    Ok(regions)
}

fn flood(
    map: &EvidenceMap,
    threshold: u8,
    x: u32,
    y: u32,
    visited: &mut [bool],
) -> Vec<[u32; 2]> {
    let width = map.width;
    let mut component = Vec::new();
    let mut queue = VecDeque::from([(x, y)]);
    visited[index(width, x, y)] = true;
    while let Some((cx, cy)) = queue.pop_front() {
        component.push([cx, cy]);
        let mut neighbours = Vec::with_capacity(4);
        if cx > 0 {
            neighbours.push((cx - 1, cy));
        }
        if cx + 1 < width {
            neighbours.push((cx + 1, cy));
        }
        if cy > 0 {
            neighbours.push((cx, cy - 1));
        }
        if cy + 1 < map.height {
            neighbours.push((cx, cy + 1));
        }
        for (nx, ny) in neighbours {
            let idx = index(width, nx, ny);
            if !visited[idx] && map.value(nx, ny) >= threshold {
                visited[idx] = true;
                queue.push_back((nx, ny));
            }
        }
    }
    component
}

fn bounding_box(pixels: &[[u32; 2]]) -> Bounds {
    let min_x = pixels.iter().map(|p| p[0]).min().unwrap_or(0);
    let max_x = pixels.iter().map(|p| p[0]).max().unwrap_or(0);
    let min_y = pixels.iter().map(|p| p[1]).min().unwrap_or(0);
    let max_y = pixels.iter().map(|p| p[1]).max().unwrap_or(0);
    Bounds {
        x: min_x,
        y: min_y,
        width: max_x - min_x + 1,
        height: max_y - min_y + 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn index_does_not_wrap_on_wide_maps() {
        assert_eq!(index(4, 3, 2), 11);
        let width = 70_000u32;
        assert_eq!(index(width, 5, 70_000), 70_000usize * 70_000 + 5);
    }
}
