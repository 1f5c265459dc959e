use crate::error::SaliencyError;
use anyhow::{anyhow, Result};
use tch::Tensor;

/// A training triple: an image and its co-registered label maps.
///
/// - `image`: `[H, W, 3]` float tensor, channel-last, RGB order
/// - `mask`:  `[H, W]` float tensor, saliency ground truth
/// - `edge`:  `[H, W]` float tensor, dilated boundary of the mask
///
/// The three arrays describe the same physical pixels, so every joint
/// transform must keep `mask` and `edge` at the image's spatial size.
/// [`SalientSample::new`] refuses to build a triple that breaks this.
#[derive(Debug)]
pub struct SalientSample {
    pub image: Tensor,
    pub mask: Tensor,
    pub edge: Tensor,
}

/// Creates a shallow clone of the `SalientSample`.
///
/// Stages never write into their inputs, so sharing storage with the
/// clone is not observable through this crate.
impl Clone for SalientSample {
    fn clone(&self) -> Self {
        Self {
            image: self.image.shallow_clone(),
            mask: self.mask.shallow_clone(),
            edge: self.edge.shallow_clone(),
        }
    }
}

impl SalientSample {
    /// Creates a triple, checking that mask and edge match the image's `H x W`.
    pub fn new(image: Tensor, mask: Tensor, edge: Tensor) -> Result<Self> {
        let sample = Self { image, mask, edge };
        sample.validate()?;
        Ok(sample)
    }

    /// Returns `(height, width)` of the image.
    pub fn dims(&self) -> Result<(i64, i64)> {
        let (height, width, _) = self.image.size3().map_err(|_| {
            anyhow!(SaliencyError::shape_mismatch(
                "image (expected [H, W, C])",
                &[-1, -1, 3],
                &self.image.size()
            ))
        })?;
        Ok((height, width))
    }

    /// Checks the pixel-correspondence invariant.
    pub fn validate(&self) -> Result<()> {
        let (height, width) = self.dims()?;
        for (name, plane) in [("mask", &self.mask), ("edge", &self.edge)] {
            let size = plane.size();
            if size != [height, width] {
                return Err(SaliencyError::shape_mismatch(name, &[height, width], &size).into());
            }
        }
        Ok(())
    }

    /// Applies `f` to each of image, mask and edge, in that order.
    pub(crate) fn try_map(self, mut f: impl FnMut(Tensor) -> Result<Tensor>) -> Result<Self> {
        Ok(Self {
            image: f(self.image)?,
            mask: f(self.mask)?,
            edge: f(self.edge)?,
        })
    }
}

/// A training triple after tensor packing: the image is channel-first.
///
/// - `image`: `[3, H, W]`
/// - `mask`, `edge`: `[H, W]` (batch stacking adds the channel axis)
#[derive(Debug)]
pub struct PackedSample {
    pub image: Tensor,
    pub mask: Tensor,
    pub edge: Tensor,
}

/// One inference item.
///
/// - `image`: `[3, H', W']` packed tensor at the eval size
/// - `shape`: `(H, W)` of the raster before any resize, so predictions can
///   be scaled back to it
/// - `name`: the sample identifier
#[derive(Debug)]
pub struct EvalItem {
    pub image: Tensor,
    pub shape: (i64, i64),
    pub name: String,
}

impl Clone for EvalItem {
    fn clone(&self) -> Self {
        Self {
            image: self.image.shallow_clone(),
            shape: self.shape,
            name: self.name.clone(),
        }
    }
}

/// Either kind of item. One dataset only ever yields one variant.
#[derive(Debug, Clone)]
pub enum SaliencyItem {
    Train(SalientSample),
    Eval(EvalItem),
}

impl SaliencyItem {
    pub fn into_train(self) -> Result<SalientSample> {
        match self {
            SaliencyItem::Train(sample) => Ok(sample),
            SaliencyItem::Eval(item) => Err(anyhow!(
                "Expected a training sample but got eval item '{}'",
                item.name
            )),
        }
    }

    pub fn into_eval(self) -> Result<EvalItem> {
        match self {
            SaliencyItem::Eval(item) => Ok(item),
            SaliencyItem::Train(_) => Err(anyhow!("Expected an eval item but got a training sample")),
        }
    }
}
