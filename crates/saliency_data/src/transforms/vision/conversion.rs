use crate::sample::{PackedSample, SalientSample};
use crate::transforms::Transform;
use anyhow::{Context, Result};
use tch::Tensor;

// ============================================================================
// ToTensor
// ============================================================================

/// Reorders a channel-last image into channel-first layout.
///
/// | Input             | Output                          |
/// |-------------------|---------------------------------|
/// | image `[H, W, C]` | `[C, H, W]`                     |
/// | `SalientSample`   | `PackedSample`, labels `[H, W]` |
///
/// Values are left untouched. The output is contiguous and owned.
///
/// # Example
/// ```ignore
/// let tensor = ToTensor.apply(image)?;
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ToTensor;

impl Transform<Tensor, Tensor> for ToTensor {
    fn apply(&self, image: Tensor) -> Result<Tensor> {
        image
            .size3()
            .context("Image must be a 3D tensor [H, W, C]")?;
        Ok(image.permute([2, 0, 1]).contiguous())
    }
}

impl Transform<SalientSample, PackedSample> for ToTensor {
    fn apply(&self, sample: SalientSample) -> Result<PackedSample> {
        sample.validate()?;
        Ok(PackedSample {
            image: self.apply(sample.image)?,
            mask: sample.mask,
            edge: sample.edge,
        })
    }
}
