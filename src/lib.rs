//! ColoringFE — a coloring-page engine: raster surface, AI brush effects,
//! click fill, region auto-color and undo history, plus session files,
//! settings and the headless CLI used by the `ColoringFE` binary.

pub mod canvas;
pub mod cli;
pub mod components;
pub mod error;
pub mod io;
pub mod logger;
pub mod ops;
pub mod project;
pub mod settings;

pub use canvas::RasterSurface;
pub use error::{ColoringError, Result};
pub use project::ColoringSession;
