pub mod collator;
pub mod config;
pub mod dataset;
pub mod error;
pub mod minibatch;
pub mod readers;
pub mod rng;
pub mod sample;
pub mod transforms;

pub use collator::{Collator, MultiScaleCollator, StackCollator};
pub use config::{DatasetConfig, DatasetConfigBuilder, Mode};
pub use dataset::{EvalSource, SaliencyDataset, SampleSource, TrainSource};
pub use error::SaliencyError;
pub use minibatch::{EvalBatch, SaliencyBatch};
pub use readers::{ImageRasterLoader, Manifest, RasterLoader};
pub use sample::{EvalItem, PackedSample, SaliencyItem, SalientSample};
