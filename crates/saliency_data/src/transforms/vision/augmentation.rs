use crate::error::SaliencyError;
use crate::sample::SalientSample;
use crate::transforms::RandomTransform;
use anyhow::{ensure, Context, Result};
use rand::Rng;
use tch::Tensor;
use tracing::trace;

/// Width is the second axis for both `[H, W, C]` images and `[H, W]` labels.
const WIDTH_DIM: i64 = 1;

// ============================================================================
// RandomFlip
// ============================================================================

/// Randomly mirrors image, mask and edge left-to-right, all or none.
///
/// A flip materializes new tensors, so the result never aliases the input.
/// `p = 0.0` and `p = 1.0` are deterministic and draw nothing from the RNG.
///
/// # Example
/// ```ignore
/// let flip = RandomFlip::new(0.5)?; // 50% flip chance
/// let sample = flip.apply_with(sample, &mut rng)?;
/// ```
#[derive(Debug, Clone, Copy)]
pub struct RandomFlip {
    p: f64,
}

impl Default for RandomFlip {
    fn default() -> Self {
        Self { p: 0.5 }
    }
}

impl RandomFlip {
    pub fn new(p: f64) -> Result<Self> {
        ensure!(
            (0.0..=1.0).contains(&p),
            SaliencyError::configuration(format!(
                "Flip probability must be in [0.0, 1.0] range (got {})",
                p
            ))
        );
        Ok(Self { p })
    }

    /// Always flips.
    pub fn always() -> Self {
        Self { p: 1.0 }
    }

    /// Never flips.
    pub fn never() -> Self {
        Self { p: 0.0 }
    }

    pub fn probability(&self) -> f64 {
        self.p
    }

    /// Bernoulli(p) coin; the fixed probabilities short-circuit.
    pub fn coin<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        if self.p <= 0.0 {
            false
        } else if self.p >= 1.0 {
            true
        } else {
            rng.random_bool(self.p)
        }
    }
}

/// Reverses the width axis into a fresh tensor.
pub fn flip_horizontal(tensor: &Tensor) -> Result<Tensor> {
    tensor
        .f_flip([WIDTH_DIM])
        .context("Failed to flip tensor along width")
}

impl RandomTransform<SalientSample, SalientSample> for RandomFlip {
    fn apply_with<R: Rng + ?Sized>(&self, sample: SalientSample, rng: &mut R) -> Result<SalientSample> {
        sample.validate()?;
        let flip = self.coin(rng);
        trace!(flip, "random flip");
        if flip {
            sample.try_map(|t| flip_horizontal(&t))
        } else {
            Ok(sample)
        }
    }
}

impl RandomTransform<Tensor, Tensor> for RandomFlip {
    fn apply_with<R: Rng + ?Sized>(&self, image: Tensor, rng: &mut R) -> Result<Tensor> {
        if self.coin(rng) {
            flip_horizontal(&image)
        } else {
            Ok(image)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};
    use tch::{Device, Kind};

    // 2x3 sample whose columns are distinguishable in every plane
    fn column_sample() -> SalientSample {
        let mask = Tensor::from_slice(&[0.0f32, 1.0, 2.0, 3.0, 4.0, 5.0]).reshape([2, 3]);
        let image = Tensor::stack(&[&mask, &(&mask * 10.0), &(&mask * 100.0)], 2);
        let edge = &mask + 0.5;
        SalientSample::new(image, mask, edge).unwrap()
    }

    #[test]
    fn test_forced_flip_reverses_columns() -> Result<()> {
        let mut rng = StdRng::seed_from_u64(0);
        let out = RandomFlip::always().apply_with(column_sample(), &mut rng)?;

        let mask: Vec<f32> = out.mask.flatten(0, -1).try_into()?;
        assert_eq!(mask, vec![2.0, 1.0, 0.0, 5.0, 4.0, 3.0]);
        let edge: Vec<f32> = out.edge.flatten(0, -1).try_into()?;
        assert_eq!(edge, vec![2.5, 1.5, 0.5, 5.5, 4.5, 3.5]);
        // channels are not reordered, only columns
        assert_eq!(out.image.double_value(&[0, 0, 1]), 20.0);
        assert_eq!(out.image.double_value(&[1, 2, 2]), 300.0);
        Ok(())
    }

    #[test]
    fn test_double_flip_is_identity() -> Result<()> {
        let mut rng = StdRng::seed_from_u64(0);
        let original = column_sample();
        let flip = RandomFlip::always();

        let once = flip.apply_with(original.clone(), &mut rng)?;
        let twice = flip.apply_with(once, &mut rng)?;
        assert!(twice.image.equal(&original.image));
        assert!(twice.mask.equal(&original.mask));
        assert!(twice.edge.equal(&original.edge));
        Ok(())
    }

    #[test]
    fn test_forced_no_flip_is_unchanged() -> Result<()> {
        let mut rng = StdRng::seed_from_u64(0);
        let original = column_sample();
        let out = RandomFlip::never().apply_with(original.clone(), &mut rng)?;
        assert!(out.image.equal(&original.image));
        assert!(out.mask.equal(&original.mask));
        Ok(())
    }

    #[test]
    fn test_flip_result_does_not_alias_input() -> Result<()> {
        let original = column_sample();
        let mut out = RandomFlip::always().apply_with(original.clone(), &mut StdRng::seed_from_u64(0))?;
        let _ = out.image.fill_(0.0);
        assert_eq!(original.image.double_value(&[1, 2, 2]), 500.0);
        Ok(())
    }

    #[test]
    fn test_fair_coin_takes_both_branches() {
        let flip = RandomFlip::default();
        let mut rng = StdRng::seed_from_u64(11);
        let flips = (0..1000).filter(|_| flip.coin(&mut rng)).count();
        assert!((350..650).contains(&flips), "flips = {}", flips);
    }

    #[test]
    fn test_image_only_flip() -> Result<()> {
        let image = Tensor::arange(6, (Kind::Float, Device::Cpu)).reshape([1, 2, 3]);
        let out = RandomFlip::always().apply_with(image, &mut StdRng::seed_from_u64(0))?;
        let values: Vec<f32> = out.flatten(0, -1).try_into()?;
        assert_eq!(values, vec![3.0, 4.0, 5.0, 0.0, 1.0, 2.0]);
        Ok(())
    }

    #[test]
    fn test_invalid_probability() {
        assert!(RandomFlip::new(-0.1).is_err());
        assert!(RandomFlip::new(1.1).is_err());
        assert!(RandomFlip::new(f64::NAN).is_err());
    }
}
