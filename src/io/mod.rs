//! I/O modules for reading raster layers

pub mod raster;

pub use raster::RasterReader;
