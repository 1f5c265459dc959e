use crate::error::SaliencyError;
use crate::sample::SalientSample;
use crate::transforms::Transform;
use anyhow::{ensure, Context, Result};
use tch::{Kind, Tensor};

/// Upper end of the raw mask/edge value range.
pub const LABEL_SCALE: f64 = 255.0;

// ============================================================================
// Normalize
// ============================================================================

/// Standardizes color values with channel-wise statistics.
///
/// Images are channel-last (`[H, W, C]`), so mean and std broadcast along
/// the last axis:
/// ```text
/// output[h, w, c] = (input[h, w, c] - mean[c]) / std[c]
/// ```
/// On a [`SalientSample`] the mask and edge are additionally rescaled from
/// `[0, 255]` to `[0, 1]`.
///
/// # Example
/// ```ignore
/// let norm = Normalize::duts();
/// let sample = norm.apply(sample)?;
/// ```
#[derive(Debug, Clone)]
pub struct Normalize {
    mean: Vec<f32>,
    std: Vec<f32>,
}

impl Normalize {
    /// Creates new normalization parameters.
    pub fn new(mean: &[f32], std: &[f32]) -> Result<Self> {
        ensure!(
            !mean.is_empty(),
            SaliencyError::configuration("normalization mean cannot be empty")
        );
        ensure!(
            mean.len() == std.len(),
            SaliencyError::configuration(format!(
                "mean and std must have the same length (got {} and {})",
                mean.len(),
                std.len()
            ))
        );
        ensure!(
            std.iter().all(|s| *s > 0.0),
            SaliencyError::configuration(format!("std must be positive (got {:?})", std))
        );
        Ok(Self {
            mean: mean.to_vec(),
            std: std.to_vec(),
        })
    }

    /// DUTS training-set statistics (RGB, 0-255 range).
    pub fn duts() -> Self {
        Self {
            mean: crate::config::DEFAULT_MEAN.to_vec(),
            std: crate::config::DEFAULT_STD.to_vec(),
        }
    }

    /// The transform that undoes this one.
    pub fn inverse(&self) -> Denormalize {
        Denormalize {
            mean: self.mean.clone(),
            std: self.std.clone(),
        }
    }

    fn channel_stats(&self, image: &Tensor) -> Result<(Tensor, Tensor)> {
        channel_stats(&self.mean, &self.std, image)
    }
}

/// Builds broadcastable `[C]` mean/std tensors after checking the image is `[H, W, C]`.
fn channel_stats(mean: &[f32], std: &[f32], image: &Tensor) -> Result<(Tensor, Tensor)> {
    let size = image.size();
    let channels = match size.as_slice() {
        [_, _, c] => *c,
        _ => {
            return Err(SaliencyError::shape_mismatch(
                "image (expected [H, W, C])",
                &[-1, -1, mean.len() as i64],
                &size,
            )
            .into())
        }
    };
    if channels as usize != mean.len() {
        return Err(SaliencyError::shape_mismatch(
            "image channels vs normalization constants",
            &[mean.len() as i64],
            &[channels],
        )
        .into());
    }

    let options = (image.kind(), image.device());
    let mean_t = Tensor::from_slice(mean).to_kind(options.0).to_device(options.1);
    let std_t = Tensor::from_slice(std).to_kind(options.0).to_device(options.1);
    Ok((mean_t, std_t))
}

/// Integer rasters are promoted to `Kind::Float` so the constants are not
/// truncated and the subtraction cannot wrap.
fn to_floating(image: Tensor) -> Tensor {
    match image.kind() {
        Kind::Float | Kind::Double | Kind::Half | Kind::BFloat16 => image,
        _ => image.to_kind(Kind::Float),
    }
}

impl Transform<Tensor, Tensor> for Normalize {
    fn apply(&self, image: Tensor) -> Result<Tensor> {
        let image = to_floating(image);
        let (mean_t, std_t) = self.channel_stats(&image)?;
        Ok((image - mean_t) / std_t)
    }
}

impl Transform<SalientSample, SalientSample> for Normalize {
    fn apply(&self, sample: SalientSample) -> Result<SalientSample> {
        sample.validate()?;
        let image: Tensor = self.apply(sample.image)?;
        let mask = to_floating(sample.mask)
            .f_div_scalar(LABEL_SCALE)
            .context("Failed to rescale mask")?;
        let edge = to_floating(sample.edge)
            .f_div_scalar(LABEL_SCALE)
            .context("Failed to rescale edge")?;
        Ok(SalientSample { image, mask, edge })
    }
}

// ============================================================================
// Denormalize
// ============================================================================

/// Maps standardized values back to the raw color range: `x * std + mean`.
/// Obtain one from [`Normalize::inverse`].
#[derive(Debug, Clone)]
pub struct Denormalize {
    mean: Vec<f32>,
    std: Vec<f32>,
}

impl Transform<Tensor, Tensor> for Denormalize {
    fn apply(&self, image: Tensor) -> Result<Tensor> {
        let image = to_floating(image);
        let (mean_t, std_t) = channel_stats(&self.mean, &self.std, &image)?;
        Ok(image * std_t + mean_t)
    }
}
