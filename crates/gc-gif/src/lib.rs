//! Minimal animated GIF encoder (no external codec dependencies).
//!
//! Produces GIF89a streams with NeuQuant-quantized 256-color palettes and
//! LZW-compressed frames.

pub mod encoder;
pub mod lzw;
pub mod neuquant;
pub mod sink;

pub use encoder::GifEncoder;
pub use neuquant::NeuQuant;
pub use sink::ByteSink;
