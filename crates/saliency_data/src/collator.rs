use crate::config::DEFAULT_SCALES;
use crate::error::SaliencyError;
use crate::minibatch::{EvalBatch, SaliencyBatch};
use crate::rng::with_worker_rng;
use crate::sample::{EvalItem, PackedSample, SalientSample};
use crate::transforms::vision::{Resize, ToTensor};
use crate::transforms::Transform;
use anyhow::{bail, ensure, Context, Result};
use rand::Rng;
use tch::Tensor;
use tracing::debug;

/// A `Collator` defines how to combine multiple items into one batch.
pub trait Collator<S> {
    type Batch;

    fn collate(&self, samples: &[S]) -> Result<Self::Batch>;
}

//=======================================================================================================
/// Multi-scale collation for training batches.
///
/// For every batch one side length `S` is drawn uniformly from `scales`.
/// Each sample's image, mask and edge is bilinearly resized to `S x S`,
/// the image is packed channel-first, and everything is stacked:
///
/// - image: `[N, 3, S, S]`
/// - mask, edge: `[N, 1, S, S]` (explicit channel axis)
///
/// Different batches see different resolutions; inside one batch every
/// sample is the same size, whatever its input aspect ratio.
///
/// # Example
/// ```ignore
/// let collator = MultiScaleCollator::default(); // {224, 256, 288, 320, 352}
/// let batch = collator.collate_with(&samples, &mut rng)?;
/// ```
#[derive(Debug, Clone)]
pub struct MultiScaleCollator {
    scales: Vec<i64>,
}

impl Default for MultiScaleCollator {
    fn default() -> Self {
        Self {
            scales: DEFAULT_SCALES.to_vec(),
        }
    }
}

impl MultiScaleCollator {
    /// Creates a collator drawing from `scales` (non-empty, all positive).
    pub fn new(scales: &[i64]) -> Result<Self> {
        ensure!(
            !scales.is_empty(),
            SaliencyError::configuration("scale set cannot be empty")
        );
        ensure!(
            scales.iter().all(|s| *s > 0),
            SaliencyError::configuration(format!("scales must be positive (got {:?})", scales))
        );
        Ok(Self {
            scales: scales.to_vec(),
        })
    }

    pub fn scales(&self) -> &[i64] {
        &self.scales
    }

    /// Draws the side length for one batch.
    pub fn draw_size<R: Rng + ?Sized>(&self, rng: &mut R) -> i64 {
        self.scales[rng.random_range(0..self.scales.len())]
    }

    /// Collates at a size drawn from `rng`.
    pub fn collate_with<R: Rng + ?Sized>(
        &self,
        samples: &[SalientSample],
        rng: &mut R,
    ) -> Result<SaliencyBatch> {
        let size = self.draw_size(rng);
        self.collate_at(samples, size)
    }

    /// Collates at a fixed side length `size`.
    pub fn collate_at(&self, samples: &[SalientSample], size: i64) -> Result<SaliencyBatch> {
        if samples.is_empty() {
            bail!("Cannot collate empty sample list");
        }
        let resize = Resize::square(size)?;

        let mut images = Vec::with_capacity(samples.len());
        let mut masks = Vec::with_capacity(samples.len());
        let mut edges = Vec::with_capacity(samples.len());
        for (i, sample) in samples.iter().enumerate() {
            let packed: PackedSample = resize
                .apply(sample.clone())
                .and_then(|resized: SalientSample| ToTensor.apply(resized))
                .with_context(|| format!("Failed to collate sample #{} at {}x{}", i, size, size))?;
            images.push(packed.image);
            masks.push(packed.mask);
            edges.push(packed.edge);
        }

        let image = Tensor::f_stack(&images, 0).context("Failed to stack images")?;
        let mask = Tensor::f_stack(&masks, 0)
            .context("Failed to stack masks")?
            .unsqueeze(1);
        let edge = Tensor::f_stack(&edges, 0)
            .context("Failed to stack edges")?
            .unsqueeze(1);

        debug!(batch_size = samples.len(), size, "collated saliency batch");
        Ok(SaliencyBatch {
            image,
            mask,
            edge,
            size,
        })
    }
}

/// Collates with the calling worker's RNG (see [`crate::rng`]).
impl Collator<SalientSample> for MultiScaleCollator {
    type Batch = SaliencyBatch;

    fn collate(&self, samples: &[SalientSample]) -> Result<SaliencyBatch> {
        with_worker_rng(|rng| self.collate_with(samples, rng))
    }
}

//=======================================================================================================
/// A `Collator` that stacks eval items, which all share the fixed eval size.
/// It does not resize, so any item with a different shape is an error.
#[derive(Debug, Clone, Copy, Default)]
pub struct StackCollator;

impl Collator<EvalItem> for StackCollator {
    type Batch = EvalBatch;

    fn collate(&self, items: &[EvalItem]) -> Result<EvalBatch> {
        if items.is_empty() {
            bail!("Cannot collate empty item list");
        }

        // Validate that tensor shapes are compatible for stacking
        let reference_shape = items[0].image.size();
        for (i, item) in items.iter().enumerate() {
            let shape = item.image.size();
            if shape != reference_shape {
                return Err(SaliencyError::shape_mismatch(
                    format!("eval item #{} ('{}')", i, item.name),
                    &reference_shape,
                    &shape,
                )
                .into());
            }
        }

        let images: Vec<&Tensor> = items.iter().map(|item| &item.image).collect();
        Ok(EvalBatch {
            image: Tensor::f_stack(&images, 0).context("Failed to stack eval images")?,
            shapes: items.iter().map(|item| item.shape).collect(),
            names: items.iter().map(|item| item.name.clone()).collect(),
        })
    }
}
