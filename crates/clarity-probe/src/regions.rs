use std::collections::BTreeSet;

use clarity_core::errors::{ClarityError, ErrorInfo};
use serde::{Deserialize, Serialize};

/// Directory of the unmasked run; no region may use this id.
pub(crate) const BASELINE_DIR: &str = "baseline";

/// Axis-aligned rectangle in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Bounds {
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && y >= self.y && x - self.x < self.width && y - self.y < self.height
    }

    /// Exclusive right edge.
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }
}

/// Pixels covered by a region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RegionMask {
    /// Every pixel inside the bounds.
    Rect,
    /// Explicit `[x, y]` pixels, sorted row-major.
    Pixels { pixels: Vec<[u32; 2]> },
}

/// A maskable region with a stable identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub id: String,
    pub bounds: Bounds,
    pub mask: RegionMask,
}

impl Region {
    pub fn contains(&self, x: u32, y: u32) -> bool {
        match &self.mask {
            RegionMask::Rect => self.bounds.contains(x, y),
            RegionMask::Pixels { pixels } => pixels
                .binary_search_by(|p| (p[1], p[0]).cmp(&(y, x)))
                .is_ok(),
        }
    }

    pub fn pixel_count(&self) -> usize {
        match &self.mask {
            RegionMask::Rect => self.bounds.width as usize * self.bounds.height as usize,
            RegionMask::Pixels { pixels } => pixels.len(),
        }
    }
}

/// Partitions a `width x height` image into `k x k` regions, row-major.
///
/// Region `(row, col)` spans `[col*w/k, (col+1)*w/k)` horizontally (likewise
/// vertically) and is named `g{k}_r{row}_c{col}`, so ids from different grid
/// sizes never collide.
pub fn grid_regions(width: u32, height: u32, k: u32) -> Result<Vec<Region>, ClarityError> {
    if k == 0 || k > width.min(height) {
        return Err(ClarityError::Validation(
            ErrorInfo::new(
                "probe.grid_size",
                "grid size must be between 1 and min(width, height)",
            )
            .with_context("grid", k.to_string())
            .with_context("width", width.to_string())
            .with_context("height", height.to_string()),
        ));
    }
    let edge = |index: u32, extent: u32| ((index as u64 * extent as u64) / k as u64) as u32;
    let mut regions = Vec::with_capacity((k * k) as usize);
    for row in 0..k {
        let (y0, y1) = (edge(row, height), edge(row + 1, height));
        for col in 0..k {
            let (x0, x1) = (edge(col, width), edge(col + 1, width));
            regions.push(Region {
                id: format!("g{k}_r{row}_c{col}"),
                bounds: Bounds {
                    x: x0,
                    y: y0,
                    width: x1 - x0,
                    height: y1 - y0,
                },
                mask: RegionMask::Rect,
            });
        }
    }
    Ok(regions)
}

/// Rejects empty region lists, duplicate ids and regions outside the image.
pub(crate) fn validate_regions(
    regions: &[Region],
    width: u32,
    height: u32,
) -> Result<(), ClarityError> {
    if regions.is_empty() {
        return Err(ClarityError::validation("probe.no_regions", "no regions to probe"));
    }
    let mut ids = BTreeSet::new();
    for region in regions {
        let safe = !region.id.is_empty()
            && region
                .id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !safe || region.id == BASELINE_DIR {
            return Err(ClarityError::Validation(
                ErrorInfo::new("probe.region_id", "region id must be a plain directory name")
                    .with_context("region", region.id.clone()),
            ));
        }
        if !ids.insert(region.id.as_str()) {
            return Err(ClarityError::Validation(
                ErrorInfo::new("probe.duplicate_region", "region ids must be unique")
                    .with_context("region", region.id.clone()),
            ));
        }
        let outside = region.bounds.right() > width || region.bounds.bottom() > height;
        if region.pixel_count() == 0 || outside {
            return Err(ClarityError::Validation(
                ErrorInfo::new("probe.region_bounds", "region is empty or outside the image")
                    .with_context("region", region.id.clone()),
            ));
        }
    }
    Ok(())
}
