use std::path::Path;

use gc_core::error::GcError;
use gc_core::traits::FrameSource;

use crate::animated::AnimatedGifSource;
use crate::still::StillSource;
use crate::video::VideoSource;

/// Extensions d'images fixes reconnues.
const IMAGE_EXTS: &[&str] = &["png", "jpg", "jpeg", "bmp", "webp"];

/// Extensions de conteneurs vidéo reconnues.
const VIDEO_EXTS: &[&str] = &["mp4", "webm", "mkv", "avi", "mov"];

/// Ouvre la source adaptée à l'extension du fichier.
///
/// `target_fps = None` suit le taux déclaré (délais natifs pour un GIF).
/// Les extensions inconnues sont tentées comme image fixe.
///
/// # Errors
/// `GcError::SourceOpen` / `GcError::Timeout` selon la source.
pub fn open_source(
    path: &Path,
    target_fps: Option<f64>,
) -> Result<Box<dyn FrameSource>, GcError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    if ext == "gif" {
        return Ok(Box::new(AnimatedGifSource::open(path, target_fps)?));
    }
    if VIDEO_EXTS.contains(&ext.as_str()) {
        return Ok(Box::new(VideoSource::open(path, target_fps)?));
    }
    if !IMAGE_EXTS.contains(&ext.as_str()) {
        log::warn!("extension inconnue « {ext} », tentative en image fixe");
    }
    Ok(Box::new(StillSource::open(path)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_extension_falls_back_to_still_image() {
        let dir = std::env::temp_dir();
        let path = dir.join("glyphcast-open-test.xyz");
        let img = image::RgbaImage::from_pixel(3, 3, image::Rgba([1, 2, 3, 255]));
        img.save_with_format(&path, image::ImageFormat::Png).unwrap();

        let mut source = open_source(&path, None).unwrap();
        std::fs::remove_file(&path).ok();
        let info = source.describe();
        assert_eq!((info.width, info.height), (3, 3));
        assert!(source.next_frame().unwrap().is_some());
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn missing_file_is_source_open_error() {
        let err = open_source(Path::new("/nonexistent/img.png"), None).unwrap_err();
        assert!(matches!(err, GcError::SourceOpen { .. }));
    }
}
