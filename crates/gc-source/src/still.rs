use std::path::Path;

use gc_core::error::GcError;
use gc_core::frame::{Frame, FrameBuffer};
use gc_core::traits::{FrameSource, SourceInfo};

/// Source d'image statique : exactement une frame, délai 0.
///
/// # Example
/// ```no_run
/// use gc_source::StillSource;
/// use std::path::Path;
/// let source = StillSource::open(Path::new("photo.png")).unwrap();
/// ```
#[derive(Debug)]
pub struct StillSource {
    width: u32,
    height: u32,
    frame: Option<Frame>,
}

impl StillSource {
    /// Charge une image depuis le disque.
    ///
    /// # Errors
    /// `GcError::SourceOpen` when the bytes cannot be decoded.
    pub fn open(path: &Path) -> Result<Self, GcError> {
        let img = image::open(path)
            .map_err(|e| GcError::source_open("image", format!("{} : {e}", path.display())))?;
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        log::debug!("image chargée : {} ({width}×{height})", path.display());
        let buffer = FrameBuffer {
            data: rgba.into_raw(),
            width,
            height,
        };
        Ok(Self::from_buffer(buffer))
    }

    /// Source à une frame depuis un buffer déjà décodé.
    #[must_use]
    pub fn from_buffer(buffer: FrameBuffer) -> Self {
        Self {
            width: buffer.width,
            height: buffer.height,
            frame: Some(Frame::still(buffer)),
        }
    }
}

impl FrameSource for StillSource {
    fn describe(&self) -> SourceInfo {
        SourceInfo {
            width: self.width,
            height: self.height,
            frame_count: Some(1),
            nominal_fps: None,
        }
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, GcError> {
        Ok(self.frame.take())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yields_exactly_one_frame_with_zero_delay() {
        let mut source = StillSource::from_buffer(FrameBuffer::new(8, 6));
        let info = source.describe();
        assert_eq!((info.width, info.height), (8, 6));
        assert_eq!(info.frame_count, Some(1));

        let frame = source.next_frame().unwrap().expect("une frame attendue");
        assert_eq!(frame.delay_ms, 0);
        assert_eq!(frame.timestamp_us, 0);
        assert!(source.next_frame().unwrap().is_none());
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn open_rejects_garbage() {
        let dir = std::env::temp_dir();
        let path = dir.join("glyphcast-not-an-image.bin");
        std::fs::write(&path, b"definitely not pixels").unwrap();
        let err = StillSource::open(&path).unwrap_err();
        std::fs::remove_file(&path).ok();
        assert!(matches!(err, GcError::SourceOpen { .. }));
    }
}
