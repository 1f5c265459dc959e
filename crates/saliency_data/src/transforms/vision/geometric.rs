use crate::error::SaliencyError;
use crate::sample::SalientSample;
use crate::transforms::{RandomTransform, Transform};
use anyhow::{ensure, Context, Result};
use rand::Rng;
use tch::Tensor;
use tracing::trace;

// ============================================================================
// Resize
// ============================================================================

/// Resamples to exactly `height x width` with bilinear interpolation.
///
/// Sampling uses half-pixel centers (`align_corners = false`), the same
/// convention as OpenCV's `INTER_LINEAR`. Image, mask and edge all go
/// through the same kernel, so labels stay co-registered with the image;
/// the smoothing this introduces at mask borders is intended.
///
/// # Examples
/// ```ignore
/// let resize = Resize::new(352, 352)?;
/// let image = resize.apply(image)?;     // [H, W, 3] -> [352, 352, 3]
/// let sample = resize.apply(sample)?;   // all three planes resized
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Resize {
    height: i64,
    width: i64,
}

impl Resize {
    /// Creates a new Resize transform.
    pub fn new(height: i64, width: i64) -> Result<Self> {
        ensure!(
            height > 0 && width > 0,
            SaliencyError::configuration(format!(
                "Resize target must be positive (got {}x{})",
                height, width
            ))
        );
        Ok(Self { height, width })
    }

    pub fn square(size: i64) -> Result<Self> {
        Self::new(size, size)
    }

    /// Returns `(height, width)`.
    pub fn target(&self) -> (i64, i64) {
        (self.height, self.width)
    }

    /// Resizes a `[N, C, H, W]` tensor.
    fn resample(&self, batched: &Tensor) -> Result<Tensor> {
        batched
            .f_upsample_bilinear2d([self.height, self.width], false, None::<f64>, None::<f64>)
            .with_context(|| format!("Bilinear resize to {}x{} failed", self.height, self.width))
    }

    /// `[H, W]` plane.
    fn resize_plane(&self, plane: &Tensor) -> Result<Tensor> {
        let (height, width) = plane
            .size2()
            .context("Label map must be a 2D tensor [H, W]")?;
        let resized = self.resample(&plane.reshape([1, 1, height, width]))?;
        Ok(resized.reshape([self.height, self.width]))
    }
}

impl Transform<Tensor, Tensor> for Resize {
    fn apply(&self, image: Tensor) -> Result<Tensor> {
        image
            .size3()
            .context("Image must be a 3D tensor [H, W, C]")?;
        let chw = image.permute([2, 0, 1]).unsqueeze(0);
        let resized = self.resample(&chw)?;
        Ok(resized.squeeze_dim(0).permute([1, 2, 0]).contiguous())
    }
}

impl Transform<SalientSample, SalientSample> for Resize {
    fn apply(&self, sample: SalientSample) -> Result<SalientSample> {
        sample.validate()?;
        Ok(SalientSample {
            image: self.apply(sample.image)?,
            mask: self.resize_plane(&sample.mask)?,
            edge: self.resize_plane(&sample.edge)?,
        })
    }
}

// ============================================================================
// RandomCrop
// ============================================================================

/// Each axis loses strictly less than `1 / MAX_SHRINK_DIVISOR` of its extent.
pub const MAX_SHRINK_DIVISOR: i64 = 8;

/// A crop rectangle as half-open row and column ranges
/// (`[top, bottom) x [left, right)`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropWindow {
    pub top: i64,
    pub bottom: i64,
    pub left: i64,
    pub right: i64,
}

impl CropWindow {
    /// The no-op window covering a whole `height x width` array.
    pub fn full(height: i64, width: i64) -> Self {
        Self {
            top: 0,
            bottom: height,
            left: 0,
            right: width,
        }
    }

    pub fn height(&self) -> i64 {
        self.bottom - self.top
    }

    pub fn width(&self) -> i64 {
        self.right - self.left
    }

    fn check_fits(&self, height: i64, width: i64) -> Result<()> {
        ensure!(
            0 <= self.top
                && self.top < self.bottom
                && self.bottom <= height
                && 0 <= self.left
                && self.left < self.right
                && self.right <= width,
            "Crop window {:?} does not fit inside {}x{}",
            self,
            height,
            width
        );
        Ok(())
    }

    /// Copies the window out of the two leading (row, column) axes.
    fn crop(&self, tensor: &Tensor) -> Tensor {
        tensor
            .narrow(0, self.top, self.height())
            .narrow(1, self.left, self.width())
            .copy()
    }

    /// Crops image, mask and edge with the same four bounds.
    pub fn apply(&self, sample: SalientSample) -> Result<SalientSample> {
        let (height, width) = sample.dims()?;
        sample.validate()?;
        self.check_fits(height, width)?;
        sample.try_map(|t| Ok(self.crop(&t)))
    }

    /// Crops an `[H, W, C]` image on its own.
    pub fn apply_image(&self, image: &Tensor) -> Result<Tensor> {
        let (height, width, _) = image
            .size3()
            .context("Image must be a 3D tensor [H, W, C]")?;
        self.check_fits(height, width)?;
        Ok(self.crop(image))
    }
}

/// Trims a random margin from the image borders.
///
/// For an `H x W` input:
/// - `randw` is drawn from `[0, W/8)`, `randh` from `[0, H/8)`
/// - `offsetw` from `[0, randw)` (0 if `randw == 0`), likewise `offseth`
/// - the window is `[offseth, H - randh + offseth) x [offsetw, W - randw + offsetw)`
///
/// The output keeps more than 7/8 of each axis and is never empty. An axis
/// shorter than 8 pixels is left untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomCrop;

impl RandomCrop {
    /// Draws a window for a `height x width` input.
    pub fn sample_window<R: Rng + ?Sized>(&self, height: i64, width: i64, rng: &mut R) -> CropWindow {
        let randw = draw_below(rng, width / MAX_SHRINK_DIVISOR);
        let randh = draw_below(rng, height / MAX_SHRINK_DIVISOR);
        let offseth = draw_below(rng, randh);
        let offsetw = draw_below(rng, randw);
        CropWindow {
            top: offseth,
            bottom: height - randh + offseth,
            left: offsetw,
            right: width - randw + offsetw,
        }
    }
}

/// Uniform draw from `[0, upper)`, or 0 when the range is empty.
fn draw_below<R: Rng + ?Sized>(rng: &mut R, upper: i64) -> i64 {
    if upper > 0 {
        rng.random_range(0..upper)
    } else {
        0
    }
}

impl RandomTransform<SalientSample, SalientSample> for RandomCrop {
    fn apply_with<R: Rng + ?Sized>(&self, sample: SalientSample, rng: &mut R) -> Result<SalientSample> {
        sample.validate()?;
        let (height, width) = sample.dims()?;
        let window = self.sample_window(height, width, rng);
        trace!(?window, height, width, "random crop");
        window.apply(sample)
    }
}

impl RandomTransform<Tensor, Tensor> for RandomCrop {
    fn apply_with<R: Rng + ?Sized>(&self, image: Tensor, rng: &mut R) -> Result<Tensor> {
        let (height, width, _) = image
            .size3()
            .context("Image must be a 3D tensor [H, W, C]")?;
        let window = self.sample_window(height, width, rng);
        window.apply_image(&image)
    }
}
