use crate::collator::Collator;
use crate::sample::{EvalItem, SalientSample};
use anyhow::Result;
use tch::{Device, Tensor};

/// A training batch: `N` samples resized to one common `S x S` and stacked
/// along the batch dimension (dim 0).
///
/// - `image`: `[N, 3, S, S]`
/// - `mask`:  `[N, 1, S, S]`
/// - `edge`:  `[N, 1, S, S]`
///
/// `S` is chosen once per batch, so different batches may have different
/// resolutions, but every tensor within one batch shares it.
#[derive(Debug)]
pub struct SaliencyBatch {
    pub image: Tensor,
    pub mask: Tensor,
    pub edge: Tensor,
    /// Side length `S` the batch was collated at.
    pub size: i64,
}

impl SaliencyBatch {
    /// Builds a batch by handing `samples` to the given [`Collator`].
    ///
    /// Example:
    /// ```ignore
    /// let batch = SaliencyBatch::collate(samples, MultiScaleCollator::default())?;
    /// ```
    pub fn collate(
        samples: Vec<SalientSample>,
        collator: impl Collator<SalientSample, Batch = Self>,
    ) -> Result<Self> {
        collator.collate(&samples)
    }

    /// Returns the number of samples in the batch.
    pub fn batch_size(&self) -> i64 {
        self.image.size()[0]
    }

    /// Splits the batch into `(image, mask, edge)`.
    pub fn into_parts(self) -> (Tensor, Tensor, Tensor) {
        (self.image, self.mask, self.edge)
    }

    /// Transfers all tensors to the target device (CPU/GPU)
    pub fn to_device(&self, device: Device) -> Self {
        Self {
            image: self.image.to_device(device),
            mask: self.mask.to_device(device),
            edge: self.edge.to_device(device),
            size: self.size,
        }
    }
}

/// A batch of eval items at the fixed eval size.
///
/// - `image`: `[N, 3, H', W']`
/// - `shapes`: original `(H, W)` of each item, in batch order
/// - `names`: identifier of each item, in batch order
#[derive(Debug)]
pub struct EvalBatch {
    pub image: Tensor,
    pub shapes: Vec<(i64, i64)>,
    pub names: Vec<String>,
}

impl EvalBatch {
    pub fn collate(
        items: Vec<EvalItem>,
        collator: impl Collator<EvalItem, Batch = Self>,
    ) -> Result<Self> {
        collator.collate(&items)
    }

    pub fn batch_size(&self) -> usize {
        self.names.len()
    }

    /// Transfers the image tensor to the target device (CPU/GPU)
    pub fn to_device(&self, device: Device) -> Self {
        Self {
            image: self.image.to_device(device),
            shapes: self.shapes.clone(),
            names: self.names.clone(),
        }
    }
}
