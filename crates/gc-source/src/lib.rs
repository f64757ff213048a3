/// Visual source modules for glyphcast (still image, animated GIF, video).
pub mod animated;
pub mod open;
pub mod still;
pub mod video;

pub use animated::AnimatedGifSource;
pub use open::open_source;
pub use still::StillSource;
pub use video::VideoSource;
