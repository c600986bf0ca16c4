use clarity_probe::{evidence_regions, grid_regions, EvidenceMap, RegionMask};
use image::{GrayImage, Luma};
use proptest::prelude::*;

fn map(rows: &[&str]) -> EvidenceMap {
    let height = rows.len() as u32;
    let width = rows[0].len() as u32;
    let values = rows
        .iter()
        .flat_map(|row| row.bytes().map(|b| if b == b'#' { 255 } else { 0 }))
        .collect();
    EvidenceMap::new(width, height, values).unwrap()
}

#[test]
fn components_are_found_in_row_major_order() {
    let evidence = map(&[
        "..##..", //
        "..#...", //
        "......", //
        "#....#", //
        "#....#", //
    ]);
    let regions = evidence_regions(&evidence, 128, 1).unwrap();
    let ids: Vec<&str> = regions.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, ["ev_t128_m1_0", "ev_t128_m1_1", "ev_t128_m1_2"]);
    assert_eq!(regions[0].pixel_count(), 3);
    assert_eq!((regions[0].bounds.x, regions[0].bounds.y), (2, 0));
    assert_eq!((regions[1].bounds.x, regions[1].bounds.y), (0, 3));
    assert_eq!((regions[2].bounds.x, regions[2].bounds.height), (5, 2));
    assert!(regions[0].contains(2, 1));
    assert!(!regions[0].contains(3, 1));
}

#[test]
fn diagonal_pixels_are_separate_components() {
    let evidence = map(&["#.", ".#"]);
    assert_eq!(evidence_regions(&evidence, 1, 1).unwrap().len(), 2);
}

#[test]
fn small_components_are_dropped_and_numbering_stays_dense() {
    let evidence = map(&["#..##", "...##"]);
    let regions = evidence_regions(&evidence, 200, 2).unwrap();
    assert_eq!(regions.len(), 1);
    assert_eq!(regions[0].id, "ev_t200_m2_0");
    assert!(matches!(&regions[0].mask, RegionMask::Pixels { pixels } if pixels.len() == 4));
}

#[test]
fn luma_images_convert_to_evidence() {
    let mut gray = GrayImage::new(3, 2);
    gray.put_pixel(1, 1, Luma([240]));
    let evidence = EvidenceMap::from_luma(gray).unwrap();
    assert_eq!((evidence.width(), evidence.height()), (3, 2));
    let regions = evidence_regions(&evidence, 128, 1).unwrap();
    assert_eq!(regions.len(), 1);
    assert!(regions[0].contains(1, 1));
    assert!(evidence_regions(&evidence, 0, 1).is_err());
    assert!(EvidenceMap::new(2, 2, vec![0; 3]).is_err());
}

proptest! {
    #[test]
    fn grid_regions_partition_the_image(width in 1u32..40, height in 1u32..40, k in 1u32..8) {
        prop_assume!(k <= width.min(height));
        let regions = grid_regions(width, height, k).unwrap();
        prop_assert_eq!(regions.len() as u32, k * k);
        let covered: usize = regions.iter().map(|r| r.pixel_count()).sum();
        prop_assert_eq!(covered, (width * height) as usize);
        for y in 0..height {
            for x in 0..width {
                let owners = regions.iter().filter(|r| r.contains(x, y)).count();
                prop_assert_eq!(owners, 1);
            }
        }
    }
}
