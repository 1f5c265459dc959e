//! src/config.rs
//!
//! Configuration for saliency datasets.
//!
//! The `DatasetConfig` struct is built once before any sample is accessed
//! and is read-only afterwards. Every field has a default, so a config
//! only needs to name what differs from the standard DUTS training setup.
//!
//! Example:
//! ```ignore
//! let config = DatasetConfig::builder()
//!     .mode(Mode::Train)
//!     .datapath("./data/DUTS")
//!     .seed(42)
//!     .build()?;
//! ```
//!
//! # On-disk layout
//! ```text
//! <datapath>/<mode>.txt                                   manifest
//! <datapath>/image/<id>.jpg                               RGB image
//! <datapath>/DUTS-TR-Mask/<id>.png                        saliency mask (train)
//! <datapath>/DUTS-TR-Mask-Edge-Thick/<id>_edgedilate.png  dilated edge (train)
//! ```

use crate::error::SaliencyError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Per-channel RGB mean of the training images.
pub const DEFAULT_MEAN: [f32; 3] = [124.55, 118.90, 102.94];
/// Per-channel RGB standard deviation of the training images.
pub const DEFAULT_STD: [f32; 3] = [56.77, 55.97, 57.50];
/// Fixed `(height, width)` every eval image is resized to.
pub const DEFAULT_EVAL_SIZE: (i64, i64) = (352, 352);
/// Square sizes a training batch may be collated at.
pub const DEFAULT_SCALES: [i64; 5] = [224, 256, 288, 320, 352];
pub const DEFAULT_FLIP_PROB: f64 = 0.5;

pub const IMAGE_DIR: &str = "image";
pub const MASK_DIR: &str = "DUTS-TR-Mask";
pub const EDGE_DIR: &str = "DUTS-TR-Mask-Edge-Thick";
pub const EDGE_SUFFIX: &str = "_edgedilate";

/// Which branch of the pipeline a dataset runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Normalize, random crop, random flip; yields (image, mask, edge).
    #[default]
    Train,
    /// Normalize, fixed resize, pack; yields (tensor, original shape, id).
    Eval,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Train => "train",
            Mode::Eval => "eval",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = SaliencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "train" => Ok(Mode::Train),
            "eval" => Ok(Mode::Eval),
            other => Err(SaliencyError::configuration(format!(
                "unknown mode '{}' (expected 'train' or 'eval')",
                other
            ))),
        }
    }
}

/// Configuration for a saliency dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// Pipeline branch (defaults to `Train`)
    pub mode: Mode,
    /// Dataset root directory (defaults to the current directory)
    pub datapath: PathBuf,
    /// Per-channel mean, RGB order (defaults to [`DEFAULT_MEAN`])
    pub mean: [f32; 3],
    /// Per-channel std, RGB order, all > 0 (defaults to [`DEFAULT_STD`])
    pub std: [f32; 3],
    /// Eval resize target as `(height, width)` (defaults to 352x352)
    pub eval_size: (i64, i64),
    /// Batch collation sizes (defaults to [`DEFAULT_SCALES`])
    pub scales: Vec<i64>,
    /// Horizontal flip probability during training (defaults to 0.5)
    pub flip_prob: f64,
    /// Manifest override. Defaults to `<datapath>/<mode>.txt`.
    pub manifest: Option<PathBuf>,
    /// Base seed for worker RNGs. When unset, workers are seeded from entropy.
    pub seed: Option<u64>,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Train,
            datapath: PathBuf::from("."),
            mean: DEFAULT_MEAN,
            std: DEFAULT_STD,
            eval_size: DEFAULT_EVAL_SIZE,
            scales: DEFAULT_SCALES.to_vec(),
            flip_prob: DEFAULT_FLIP_PROB,
            manifest: None,
            seed: None,
        }
    }
}

impl DatasetConfig {
    pub fn builder() -> DatasetConfigBuilder {
        DatasetConfigBuilder::default()
    }

    /// Loads a config from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: DatasetConfig = serde_json::from_str(&text).map_err(|e| {
            SaliencyError::configuration(format!(
                "invalid config file {}: {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every invariant the pipeline relies on.
    pub fn validate(&self) -> Result<(), SaliencyError> {
        if let Some((channel, s)) = self.std.iter().enumerate().find(|(_, s)| !(**s > 0.0)) {
            return Err(SaliencyError::configuration(format!(
                "std must be positive, got {} for channel {}",
                s, channel
            )));
        }
        if self.mean.iter().any(|m| !m.is_finite()) {
            return Err(SaliencyError::configuration(format!(
                "mean must be finite, got {:?}",
                self.mean
            )));
        }
        let (height, width) = self.eval_size;
        if height <= 0 || width <= 0 {
            return Err(SaliencyError::configuration(format!(
                "eval size must be positive, got {}x{}",
                height, width
            )));
        }
        if self.scales.is_empty() {
            return Err(SaliencyError::configuration("scale set cannot be empty"));
        }
        if let Some(scale) = self.scales.iter().find(|s| **s <= 0) {
            return Err(SaliencyError::configuration(format!(
                "scales must be positive, got {}",
                scale
            )));
        }
        if !(0.0..=1.0).contains(&self.flip_prob) {
            return Err(SaliencyError::configuration(format!(
                "flip probability must be in [0.0, 1.0], got {}",
                self.flip_prob
            )));
        }
        Ok(())
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.manifest
            .clone()
            .unwrap_or_else(|| self.datapath.join(format!("{}.txt", self.mode)))
    }

    pub fn image_path(&self, name: &str) -> PathBuf {
        self.datapath.join(IMAGE_DIR).join(format!("{name}.jpg"))
    }

    pub fn mask_path(&self, name: &str) -> PathBuf {
        self.datapath.join(MASK_DIR).join(format!("{name}.png"))
    }

    pub fn edge_path(&self, name: &str) -> PathBuf {
        self.datapath
            .join(EDGE_DIR)
            .join(format!("{name}{EDGE_SUFFIX}.png"))
    }
}

/// Builder for DatasetConfig with method chaining
#[derive(Default)]
pub struct DatasetConfigBuilder {
    config: DatasetConfig,
}

impl DatasetConfigBuilder {
    pub fn mode(mut self, mode: Mode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn datapath(mut self, datapath: impl Into<PathBuf>) -> Self {
        self.config.datapath = datapath.into();
        self
    }

    /// Set the per-channel mean (RGB order)
    pub fn mean(mut self, mean: [f32; 3]) -> Self {
        self.config.mean = mean;
        self
    }

    /// Set the per-channel standard deviation (RGB order)
    pub fn std(mut self, std: [f32; 3]) -> Self {
        self.config.std = std;
        self
    }

    pub fn eval_size(mut self, height: i64, width: i64) -> Self {
        self.config.eval_size = (height, width);
        self
    }

    /// Set the sizes a training batch may be collated at.
    pub fn scales(mut self, scales: impl Into<Vec<i64>>) -> Self {
        self.config.scales = scales.into();
        self
    }

    pub fn flip_prob(mut self, p: f64) -> Self {
        self.config.flip_prob = p;
        self
    }

    /// Read identifiers from `path` instead of `<datapath>/<mode>.txt`.
    pub fn manifest(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.manifest = Some(path.into());
        self
    }

    /// Set the base seed for reproducible augmentation.
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    /// Validate and build the final configuration.
    pub fn build(self) -> Result<DatasetConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
