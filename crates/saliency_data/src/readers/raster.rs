use crate::error::SaliencyError;
use anyhow::{Context, Result};
use image::{DynamicImage, ImageReader};
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read};
use std::path::Path;
use tch::{Kind, Tensor};

/// Decodes rasters from disk into float tensors.
///
/// This is the seam between the pipeline and file decoding. Implementations
/// must return:
/// - `load_rgb`: `[H, W, 3]` `Kind::Float`, RGB channel order, values 0-255
/// - `load_gray`: `[H, W]` `Kind::Float`, values 0-255
///
/// and report an absent file as [`SaliencyError::SampleNotFound`].
pub trait RasterLoader: Send + Sync {
    fn load_rgb(&self, path: &Path) -> Result<Tensor>;
    fn load_gray(&self, path: &Path) -> Result<Tensor>;
}

/// [`RasterLoader`] backed by the `image` crate.
///
/// Reads the whole file through an 8KB buffered reader, guesses the format
/// from the content, and converts to RGB or single-channel luma.
#[derive(Debug, Clone)]
pub struct ImageRasterLoader {
    buffer_size: usize,
}

impl Default for ImageRasterLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageRasterLoader {
    pub fn new() -> Self {
        Self { buffer_size: 8192 }
    }

    fn decode(&self, path: &Path) -> Result<DynamicImage> {
        let file = File::open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => anyhow::Error::new(SaliencyError::SampleNotFound {
                path: path.to_path_buf(),
            }),
            _ => anyhow::Error::new(e).context(format!("Failed to open raster: {}", path.display())),
        })?;

        let file_size = file.metadata().map(|m| m.len() as usize).unwrap_or(0);
        let mut reader = BufReader::with_capacity(self.buffer_size, file);
        let mut buffer = Vec::with_capacity(file_size);
        reader
            .read_to_end(&mut buffer)
            .with_context(|| format!("Failed to read raster: {}", path.display()))?;

        ImageReader::new(Cursor::new(buffer))
            .with_guessed_format()
            .with_context(|| format!("Failed to detect raster format: {}", path.display()))?
            .decode()
            .with_context(|| format!("Failed to decode raster: {}", path.display()))
    }
}

impl RasterLoader for ImageRasterLoader {
    fn load_rgb(&self, path: &Path) -> Result<Tensor> {
        let rgb = self.decode(path)?.to_rgb8();
        let (width, height) = rgb.dimensions();
        Ok(Tensor::from_slice(rgb.as_raw())
            .reshape([height as i64, width as i64, 3])
            .to_kind(Kind::Float))
    }

    fn load_gray(&self, path: &Path) -> Result<Tensor> {
        let luma = self.decode(path)?.to_luma8();
        let (width, height) = luma.dimensions();
        Ok(Tensor::from_slice(luma.as_raw())
            .reshape([height as i64, width as i64])
            .to_kind(Kind::Float))
    }
}
