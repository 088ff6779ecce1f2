pub mod activation;
pub mod bitmap;
pub mod canvas;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod frame_dump;
pub mod geometry;
pub mod host;
pub mod labels;
pub mod magnification;
pub mod map;
pub mod overlay;
#[cfg(feature = "raster")]
pub mod raster;
pub mod scale_bar;
pub mod text_metrics;
pub mod theme;
pub mod tiles;
pub mod viewport;

#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{Config, load_config};
pub use error::{Error, Result};
pub use labels::{LabelEngine, LabelSource, Rasterizer};
pub use map::{FrameStats, MapRenderer};
pub use tiles::{MemoryTileCache, TileCache, TileRenderer};
pub use viewport::Viewport;
