pub mod manifest;
pub mod raster;

pub use manifest::Manifest;
pub use raster::{ImageRasterLoader, RasterLoader};
