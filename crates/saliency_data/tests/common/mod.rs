use anyhow::Result;
use image::{GrayImage, Luma, Rgb, RgbImage};
use saliency_data::config::{EDGE_DIR, EDGE_SUFFIX, IMAGE_DIR, MASK_DIR};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// One raster triple to write into a fixture dataset.
pub struct FixtureSample {
    pub name: &'static str,
    pub height: u32,
    pub width: u32,
}

/// Writes a DUTS-style dataset into a fresh temp directory:
/// `image/<id>.jpg`, `DUTS-TR-Mask/<id>.png`,
/// `DUTS-TR-Mask-Edge-Thick/<id>_edgedilate.png`, and one manifest per
/// entry of `splits` (`<split>.txt`, listing every sample).
///
/// The mask is white on the left half and black on the right, and the
/// edge is a white column at the boundary, so flips are visible.
pub fn write_dataset(samples: &[FixtureSample], splits: &[&str]) -> Result<TempDir> {
    let dir = tempfile::tempdir()?;
    let root = dir.path();
    for sub in [IMAGE_DIR, MASK_DIR, EDGE_DIR] {
        fs::create_dir_all(root.join(sub))?;
    }

    for sample in samples {
        write_triple(root, sample)?;
    }

    let listing: String = samples
        .iter()
        .map(|s| format!("{}.jpg\n", s.name))
        .collect();
    for split in splits {
        fs::write(root.join(format!("{split}.txt")), &listing)?;
    }
    Ok(dir)
}

fn write_triple(root: &Path, sample: &FixtureSample) -> Result<()> {
    let (w, h) = (sample.width, sample.height);
    let half = w / 2;

    let image = RgbImage::from_fn(w, h, |x, y| {
        Rgb([(x * 255 / w) as u8, (y * 255 / h) as u8, 128])
    });
    image.save(root.join(IMAGE_DIR).join(format!("{}.jpg", sample.name)))?;

    let mask = GrayImage::from_fn(w, h, |x, _| Luma([if x < half { 255 } else { 0 }]));
    mask.save(root.join(MASK_DIR).join(format!("{}.png", sample.name)))?;

    let edge = GrayImage::from_fn(w, h, |x, _| Luma([if x == half { 255 } else { 0 }]));
    edge.save(
        root.join(EDGE_DIR)
            .join(format!("{}{}.png", sample.name, EDGE_SUFFIX)),
    )?;
    Ok(())
}

/// The fixture set most tests use: three samples with different shapes.
pub fn standard_samples() -> Vec<FixtureSample> {
    vec![
        FixtureSample {
            name: "sun_aaa",
            height: 300,
            width: 400,
        },
        FixtureSample {
            name: "ILSVRC2012_test_00000004",
            height: 120,
            width: 96,
        },
        FixtureSample {
            name: "sun_bbb",
            height: 64,
            width: 64,
        },
    ]
}
