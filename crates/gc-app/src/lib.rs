/// CLI and orchestration for glyphcast.
pub mod cli;
pub mod pipeline;
