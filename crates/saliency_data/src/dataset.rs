use crate::collator::MultiScaleCollator;
use crate::config::{DatasetConfig, Mode};
use crate::error::SaliencyError;
use crate::readers::{ImageRasterLoader, Manifest, RasterLoader};
use crate::rng::{init_worker_rng, with_worker_rng};
use crate::sample::{EvalItem, SaliencyItem, SalientSample};
use crate::transforms::vision::{Normalize, RandomCrop, RandomFlip, Resize, ToTensor};
use crate::transforms::{Chain, RandomTransform, Transform};
use anyhow::{ensure, Context, Result};
use rand::Rng;
use std::sync::Arc;
use tch::Tensor;
use tracing::info;

/// A `SampleSource` maps an index into the identifier list to one fully
/// preprocessed item.
///
/// Lookups are independent of each other: no state carries over between
/// calls except what the caller's generator holds, so a source can be
/// shared across worker threads (`Send + Sync`) and queried in any order.
pub trait SampleSource: Send + Sync {
    type Item: Send;

    /// Number of identifiers in the manifest.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Produces the item at `index`, drawing any randomness from `rng`.
    fn get_item_with<R: Rng + ?Sized>(&self, index: usize, rng: &mut R) -> Result<Self::Item>;

    /// Produces the item at `index` with the calling worker's RNG.
    fn get_item(&self, index: usize) -> Result<Self::Item> {
        with_worker_rng(|rng| self.get_item_with(index, rng))
    }
}

fn name_at(manifest: &Manifest, index: usize) -> Result<&str, SaliencyError> {
    manifest.get(index).ok_or(SaliencyError::IndexOutOfRange {
        index,
        len: manifest.len(),
    })
}

fn expect_mode(config: &DatasetConfig, expected: Mode) -> Result<()> {
    ensure!(
        config.mode == expected,
        SaliencyError::configuration(format!(
            "{} source built from a '{}' config",
            expected, config.mode
        ))
    );
    Ok(())
}

//=======================================================================================================
/// Training branch: load image, mask and edge, then
/// `Normalize -> RandomCrop -> RandomFlip`.
///
/// Items stay channel-last (`[H, W, 3]`, `[H, W]`, `[H, W]`) at their
/// cropped size; resizing and packing happen per batch in
/// [`MultiScaleCollator`].
///
/// # Example
/// ```ignore
/// let source = TrainSource::new(config)?;
/// let sample = source.get_item_with(0, &mut rng)?;
/// ```
pub struct TrainSource<L = ImageRasterLoader> {
    config: Arc<DatasetConfig>,
    manifest: Manifest,
    loader: L,
    normalize: Normalize,
    crop: RandomCrop,
    flip: RandomFlip,
}

impl TrainSource<ImageRasterLoader> {
    /// Reads the manifest named by `config` and decodes rasters from disk.
    pub fn new(config: DatasetConfig) -> Result<Self> {
        Self::with_loader(config, ImageRasterLoader::new())
    }
}

impl<L: RasterLoader> TrainSource<L> {
    pub fn with_loader(config: DatasetConfig, loader: L) -> Result<Self> {
        let manifest = Manifest::load(config.manifest_path())?;
        Self::from_parts(config, manifest, loader)
    }

    /// Builds a source from an already loaded identifier list.
    pub fn from_parts(config: DatasetConfig, manifest: Manifest, loader: L) -> Result<Self> {
        config.validate()?;
        expect_mode(&config, Mode::Train)?;

        let normalize = Normalize::new(&config.mean, &config.std)?;
        let flip = RandomFlip::new(config.flip_prob)?;
        info!(
            mode = %config.mode,
            datapath = %config.datapath.display(),
            samples = manifest.len(),
            mean = ?config.mean,
            std = ?config.std,
            flip_prob = config.flip_prob,
            "training source ready"
        );

        Ok(Self {
            config: Arc::new(config),
            manifest,
            loader,
            normalize,
            crop: RandomCrop,
            flip,
        })
    }

    pub fn config(&self) -> &DatasetConfig {
        &self.config
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Loads the raw triple for `name`, before any preprocessing.
    pub fn load_raw(&self, name: &str) -> Result<SalientSample> {
        let image = self.loader.load_rgb(&self.config.image_path(name))?;
        let mask = self.loader.load_gray(&self.config.mask_path(name))?;
        let edge = self.loader.load_gray(&self.config.edge_path(name))?;
        SalientSample::new(image, mask, edge)
    }

    fn preprocess<R: Rng + ?Sized>(&self, name: &str, rng: &mut R) -> Result<SalientSample> {
        let sample = self.load_raw(name)?;
        let sample: SalientSample = self.normalize.apply(sample)?;
        let sample: SalientSample = self.crop.apply_with(sample, rng)?;
        self.flip.apply_with(sample, rng)
    }
}

impl<L: RasterLoader> SampleSource for TrainSource<L> {
    type Item = SalientSample;

    fn len(&self) -> usize {
        self.manifest.len()
    }

    fn get_item_with<R: Rng + ?Sized>(&self, index: usize, rng: &mut R) -> Result<SalientSample> {
        let name = name_at(&self.manifest, index)?;
        self.preprocess(name, rng)
            .with_context(|| format!("Failed to prepare training sample '{}'", name))
    }
}

//=======================================================================================================
/// Inference branch: load the image, record its `(H, W)`, then
/// `Normalize -> Resize(eval_size) -> ToTensor`.
///
/// No masks are read and nothing is random.
pub struct EvalSource<L = ImageRasterLoader> {
    config: Arc<DatasetConfig>,
    manifest: Manifest,
    loader: L,
    pipeline: Chain<Chain<Normalize, Resize, Tensor>, ToTensor, Tensor>,
}

impl EvalSource<ImageRasterLoader> {
    pub fn new(config: DatasetConfig) -> Result<Self> {
        Self::with_loader(config, ImageRasterLoader::new())
    }
}

impl<L: RasterLoader> EvalSource<L> {
    pub fn with_loader(config: DatasetConfig, loader: L) -> Result<Self> {
        let manifest = Manifest::load(config.manifest_path())?;
        Self::from_parts(config, manifest, loader)
    }

    pub fn from_parts(config: DatasetConfig, manifest: Manifest, loader: L) -> Result<Self> {
        config.validate()?;
        expect_mode(&config, Mode::Eval)?;

        let (height, width) = config.eval_size;
        let pipeline = Chain::new(
            Chain::new(
                Normalize::new(&config.mean, &config.std)?,
                Resize::new(height, width)?,
            ),
            ToTensor,
        );
        info!(
            mode = %config.mode,
            datapath = %config.datapath.display(),
            samples = manifest.len(),
            mean = ?config.mean,
            std = ?config.std,
            eval_size = ?config.eval_size,
            "eval source ready"
        );

        Ok(Self {
            config: Arc::new(config),
            manifest,
            loader,
            pipeline,
        })
    }

    pub fn config(&self) -> &DatasetConfig {
        &self.config
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    fn preprocess(&self, name: &str) -> Result<EvalItem> {
        let image = self.loader.load_rgb(&self.config.image_path(name))?;
        let (height, width, _) = image
            .size3()
            .context("Image must be a 3D tensor [H, W, C]")?;
        let image: Tensor = self.pipeline.apply(image)?;
        Ok(EvalItem {
            image,
            shape: (height, width),
            name: name.to_string(),
        })
    }
}

impl<L: RasterLoader> SampleSource for EvalSource<L> {
    type Item = EvalItem;

    fn len(&self) -> usize {
        self.manifest.len()
    }

    fn get_item_with<R: Rng + ?Sized>(&self, index: usize, _rng: &mut R) -> Result<EvalItem> {
        let name = name_at(&self.manifest, index)?;
        self.preprocess(name)
            .with_context(|| format!("Failed to prepare eval sample '{}'", name))
    }
}

//=======================================================================================================
/// A saliency dataset whose branch is fixed by [`DatasetConfig::mode`]
/// when it is built.
///
/// # Example
/// ```ignore
/// let dataset = SaliencyDataset::from_config(config)?;
/// dataset.init_worker(worker_id, epoch);
/// let item = dataset.get_item(index)?;
/// ```
pub enum SaliencyDataset<L = ImageRasterLoader> {
    Train(TrainSource<L>),
    Eval(EvalSource<L>),
}

impl SaliencyDataset<ImageRasterLoader> {
    pub fn from_config(config: DatasetConfig) -> Result<Self> {
        Self::with_loader(config, ImageRasterLoader::new())
    }
}

impl<L: RasterLoader> SaliencyDataset<L> {
    pub fn with_loader(config: DatasetConfig, loader: L) -> Result<Self> {
        let manifest = Manifest::load(config.manifest_path())?;
        Self::from_parts(config, manifest, loader)
    }

    pub fn from_parts(config: DatasetConfig, manifest: Manifest, loader: L) -> Result<Self> {
        Ok(match config.mode {
            Mode::Train => Self::Train(TrainSource::from_parts(config, manifest, loader)?),
            Mode::Eval => Self::Eval(EvalSource::from_parts(config, manifest, loader)?),
        })
    }

    pub fn mode(&self) -> Mode {
        self.config().mode
    }

    pub fn config(&self) -> &DatasetConfig {
        match self {
            Self::Train(source) => source.config(),
            Self::Eval(source) => source.config(),
        }
    }

    pub fn manifest(&self) -> &Manifest {
        match self {
            Self::Train(source) => source.manifest(),
            Self::Eval(source) => source.manifest(),
        }
    }

    /// A collator over the configured scale set.
    pub fn collator(&self) -> Result<MultiScaleCollator> {
        MultiScaleCollator::new(&self.config().scales)
    }

    /// Seeds the calling thread's RNG for `worker_id` in `epoch`.
    /// Uses the configured seed, or a fresh random base if none is set.
    pub fn init_worker(&self, worker_id: usize, epoch: usize) {
        let base_seed = self.config().seed.unwrap_or_else(rand::random);
        init_worker_rng(worker_id, epoch, base_seed);
    }
}

impl<L: RasterLoader> SampleSource for SaliencyDataset<L> {
    type Item = SaliencyItem;

    fn len(&self) -> usize {
        self.manifest().len()
    }

    fn get_item_with<R: Rng + ?Sized>(&self, index: usize, rng: &mut R) -> Result<SaliencyItem> {
        match self {
            Self::Train(source) => source.get_item_with(index, rng).map(SaliencyItem::Train),
            Self::Eval(source) => source.get_item_with(index, rng).map(SaliencyItem::Eval),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_MEAN, DEFAULT_STD};
    use crate::rng::reset_worker_rng;
    use rand::{rngs::StdRng, SeedableRng};
    use std::path::Path;
    use tch::{Device, Kind};

    /// Generates rasters in memory. Every plane holds `row * width + col`,
    /// so image and labels can be checked for alignment after augmentation.
    struct SyntheticLoader {
        height: i64,
        width: i64,
        label_width: i64,
        missing: Option<&'static str>,
    }

    impl SyntheticLoader {
        fn new(height: i64, width: i64) -> Self {
            Self {
                height,
                width,
                label_width: width,
                missing: None,
            }
        }

        fn plane(&self, width: i64) -> Tensor {
            Tensor::arange(self.height * width, (Kind::Float, Device::Cpu)).reshape([self.height, width])
        }

        fn check(&self, path: &Path) -> Result<()> {
            if let Some(name) = self.missing {
                if path.to_string_lossy().contains(name) {
                    return Err(SaliencyError::SampleNotFound {
                        path: path.to_path_buf(),
                    }
                    .into());
                }
            }
            Ok(())
        }
    }

    impl RasterLoader for SyntheticLoader {
        fn load_rgb(&self, path: &Path) -> Result<Tensor> {
            self.check(path)?;
            let plane = self.plane(self.width);
            Ok(Tensor::stack(&[&plane, &plane, &plane], 2))
        }

        fn load_gray(&self, path: &Path) -> Result<Tensor> {
            self.check(path)?;
            Ok(self.plane(self.label_width))
        }
    }

    fn train_config() -> DatasetConfig {
        DatasetConfig::builder().datapath("data").build().unwrap()
    }

    fn eval_config() -> DatasetConfig {
        DatasetConfig::builder()
            .mode(Mode::Eval)
            .datapath("data")
            .build()
            .unwrap()
    }

    fn manifest() -> Manifest {
        Manifest::from_names(["sun_a", "sun_b", "sun_c"])
    }

    #[test]
    fn test_train_item_shapes_and_bounds() -> Result<()> {
        let source = TrainSource::from_parts(train_config(), manifest(), SyntheticLoader::new(64, 96))?;
        assert_eq!(source.len(), 3);

        let mut rng = StdRng::seed_from_u64(0);
        for index in 0..3 {
            let sample = source.get_item_with(index, &mut rng)?;
            let (h, w) = sample.dims()?;
            assert!(h > 64 - 8 && h <= 64);
            assert!(w > 96 - 12 && w <= 96);
            assert_eq!(sample.mask.size(), vec![h, w]);
            assert_eq!(sample.edge.size(), vec![h, w]);
        }
        Ok(())
    }

    #[test]
    fn test_train_item_keeps_image_and_labels_aligned() -> Result<()> {
        let source = TrainSource::from_parts(train_config(), manifest(), SyntheticLoader::new(48, 40))?;
        let mut rng = StdRng::seed_from_u64(11);

        for _ in 0..10 {
            let sample = source.get_item_with(1, &mut rng)?;
            // undo both normalizations; every plane must land on the same raw values
            let red = sample.image.select(2, 0) * f64::from(DEFAULT_STD[0]) + f64::from(DEFAULT_MEAN[0]);
            let mask = &sample.mask * 255.0;
            assert!(red.allclose(&mask, 1e-5, 1e-2, false));
            assert!(sample.edge.allclose(&sample.mask, 0.0, 1e-6, false));
        }
        Ok(())
    }

    #[test]
    fn test_train_same_seed_same_item() -> Result<()> {
        let source = TrainSource::from_parts(train_config(), manifest(), SyntheticLoader::new(80, 72))?;
        let first = source.get_item_with(2, &mut StdRng::seed_from_u64(3))?;
        let second = source.get_item_with(2, &mut StdRng::seed_from_u64(3))?;
        assert!(first.image.equal(&second.image));
        assert!(first.mask.equal(&second.mask));
        Ok(())
    }

    #[test]
    fn test_eval_item() -> Result<()> {
        let source = EvalSource::from_parts(eval_config(), manifest(), SyntheticLoader::new(300, 400))?;
        let item = source.get_item_with(1, &mut StdRng::seed_from_u64(0))?;
        assert_eq!(item.image.size(), vec![3, 352, 352]);
        assert_eq!(item.shape, (300, 400));
        assert_eq!(item.name, "sun_b");
        Ok(())
    }

    #[test]
    fn test_eval_custom_size_ignores_rng() -> Result<()> {
        let config = DatasetConfig::builder()
            .mode(Mode::Eval)
            .eval_size(64, 48)
            .build()?;
        let source = EvalSource::from_parts(config, manifest(), SyntheticLoader::new(30, 20))?;
        let first = source.get_item_with(0, &mut StdRng::seed_from_u64(1))?;
        let second = source.get_item_with(0, &mut StdRng::seed_from_u64(2))?;
        assert_eq!(first.image.size(), vec![3, 64, 48]);
        assert!(first.image.equal(&second.image));
        Ok(())
    }

    #[test]
    fn test_missing_raster_and_index() {
        let mut loader = SyntheticLoader::new(32, 32);
        loader.missing = Some("sun_b");
        let source = TrainSource::from_parts(train_config(), manifest(), loader).unwrap();
        let mut rng = StdRng::seed_from_u64(0);

        assert!(source.get_item_with(0, &mut rng).is_ok());
        let err = source.get_item_with(1, &mut rng).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SaliencyError>(),
            Some(SaliencyError::SampleNotFound { .. })
        ));
        assert!(format!("{err:#}").contains("sun_b"));

        let err = source.get_item_with(3, &mut rng).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SaliencyError>(),
            Some(SaliencyError::IndexOutOfRange { index: 3, len: 3 })
        ));
    }

    #[test]
    fn test_misaligned_labels_are_shape_mismatch() {
        let mut loader = SyntheticLoader::new(32, 32);
        loader.label_width = 31;
        let source = TrainSource::from_parts(train_config(), manifest(), loader).unwrap();
        let err = source
            .get_item_with(0, &mut StdRng::seed_from_u64(0))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SaliencyError>(),
            Some(SaliencyError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_source_rejects_wrong_mode() {
        assert!(TrainSource::from_parts(eval_config(), manifest(), SyntheticLoader::new(8, 8)).is_err());
        assert!(EvalSource::from_parts(train_config(), manifest(), SyntheticLoader::new(8, 8)).is_err());
    }

    #[test]
    fn test_dataset_dispatches_on_mode() -> Result<()> {
        let mut rng = StdRng::seed_from_u64(0);

        let train = SaliencyDataset::from_parts(train_config(), manifest(), SyntheticLoader::new(40, 40))?;
        assert_eq!(train.mode(), Mode::Train);
        assert!(matches!(train.get_item_with(0, &mut rng)?, SaliencyItem::Train(_)));

        let eval = SaliencyDataset::from_parts(eval_config(), manifest(), SyntheticLoader::new(40, 40))?;
        assert_eq!(eval.mode(), Mode::Eval);
        assert_eq!(eval.len(), 3);
        assert!(matches!(eval.get_item_with(0, &mut rng)?, SaliencyItem::Eval(_)));
        assert_eq!(eval.collator()?.scales(), &[224, 256, 288, 320, 352]);
        Ok(())
    }

    #[test]
    fn test_init_worker_makes_get_item_reproducible() -> Result<()> {
        let config = DatasetConfig::builder().seed(1234).build()?;
        let dataset = SaliencyDataset::from_parts(config, manifest(), SyntheticLoader::new(120, 88))?;

        dataset.init_worker(2, 5);
        let first = dataset.get_item(0)?.into_train()?;
        dataset.init_worker(2, 5);
        let second = dataset.get_item(0)?.into_train()?;
        reset_worker_rng();

        assert_eq!(first.dims()?, second.dims()?);
        assert!(first.image.equal(&second.image));
        Ok(())
    }
}
