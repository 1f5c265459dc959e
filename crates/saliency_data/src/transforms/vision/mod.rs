//! src/transforms/vision/mod.rs
//!
//! Vision transforms for saliency samples.
//!
//! Every transform works on a channel-last `[H, W, 3]` image `Tensor`, and
//! most also on a whole [`SalientSample`](crate::sample::SalientSample), in
//! which case mask and edge receive exactly the same spatial treatment as
//! the image.
//!
//! ```text
//! transforms/vision/
//! ├── photometric.rs   → Per-pixel value maps (normalize, denormalize)
//! ├── geometric.rs     → Spatial resampling and cropping (resize, random crop)
//! ├── augmentation.rs  → Random mirroring (random flip)
//! └── conversion.rs    → Layout conversion (HWC → CHW)
//! ```
//!
//! # Quick Start
//!
//! ```ignore
//! use crate::transforms::{RandomTransform, Transform};
//! use crate::transforms::vision::{Normalize, RandomCrop, RandomFlip};
//!
//! // Training branch: normalize, then crop and flip jointly
//! let sample = Normalize::duts().apply(sample)?;
//! let sample = RandomCrop.apply_with(sample, &mut rng)?;
//! let sample = RandomFlip::default().apply_with(sample, &mut rng)?;
//! ```

pub mod augmentation;
pub mod conversion;
pub mod geometric;
pub mod photometric;

pub use augmentation::{flip_horizontal, RandomFlip};
pub use conversion::ToTensor;
pub use geometric::{CropWindow, RandomCrop, Resize, MAX_SHRINK_DIVISOR};
pub use photometric::{Denormalize, Normalize, LABEL_SCALE};
