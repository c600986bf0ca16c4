use clarity_core::errors::ClarityError;
use clarity_perturb::CanonicalImage;

use crate::regions::{Region, RegionMask};

/// Constant mid-grey used for every masked pixel.
pub const MASK_FILL: [u8; 3] = [128, 128, 128];

/// Returns a copy of `image` with `region` painted in `fill`.
pub fn apply_mask(
    image: &CanonicalImage,
    region: &Region,
    fill: [u8; 3],
) -> Result<CanonicalImage, ClarityError> {
    let width = image.width() as usize;
    let mut pixels = image.pixels().to_vec();
    let mut paint = |x: u32, y: u32| {
        let offset = (y as usize * width + x as usize) * 3;
        if let Some(slot) = pixels.get_mut(offset..offset + 3) {
            slot.copy_from_slice(&fill);
        }
    };
    match &region.mask {
        RegionMask::Rect => {
            let bounds = region.bounds;
            for y in bounds.y..bounds.bottom().min(image.height()) {
                for x in bounds.x..bounds.right().min(image.width()) {
                    paint(x, y);
                }
            }
        }
        RegionMask::Pixels { pixels: coords } => {
            for &[x, y] in coords {
                if x < image.width() && y < image.height() {
                    paint(x, y);
                }
            }
        }
    }
    CanonicalImage::new(image.width(), image.height(), pixels)
}
