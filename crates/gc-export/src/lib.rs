/// Export modules for glyphcast: glyph rasterization, PNG stills, MP4
/// muxing, and the uniform encoder host.
pub mod host;
pub mod mp4;
pub mod png;
pub mod rasterizer;

pub use host::{EncoderFrame, EncoderHost, EncoderOptions, OutputFormat};
pub use rasterizer::Rasterizer;
