/// Configuration, types, and shared structures for glyphcast.
///
/// This crate contains all shared types, traits, and configuration logic
/// used across the glyphcast workspace.
pub mod charset;
pub mod config;
pub mod error;
pub mod frame;
pub mod grid;
pub mod palette;
pub mod traits;

pub use charset::GlyphLut;
pub use config::ConverterConfig;
pub use error::GcError;
pub use frame::{Frame, FrameBuffer};
pub use grid::{GlyphCell, GlyphGrid};
pub use traits::{FrameSource, SourceInfo};
