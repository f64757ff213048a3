//! Encodage H.264-dans-MP4 via un ffmpeg externe : frames RGBA brutes sur
//! stdin, fichier temporaire en sortie, relues et validées au finalize.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};

use gc_core::error::GcError;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Chaîne codec choisie par résolution : Baseline 3.1 jusqu'à 720p,
/// High 4.0 jusqu'à 1080p, High 5.1 au-delà.
///
/// # Example
/// ```
/// use gc_export::mp4::h264_codec_string;
/// assert_eq!(h264_codec_string(1280, 720), "avc1.42001f");
/// assert_eq!(h264_codec_string(1920, 1080), "avc1.640028");
/// assert_eq!(h264_codec_string(3840, 2160), "avc1.640033");
/// ```
#[must_use]
pub fn h264_codec_string(width: u32, height: u32) -> &'static str {
    let pixels = u64::from(width) * u64::from(height);
    if pixels <= 921_600 {
        "avc1.42001f"
    } else if pixels <= 2_073_600 {
        "avc1.640028"
    } else {
        "avc1.640033"
    }
}

/// Arguments ffmpeg (profil, niveau) correspondant à la chaîne codec.
fn profile_level(codec: &str) -> (&'static str, &'static str) {
    match codec {
        "avc1.42001f" => ("baseline", "3.1"),
        "avc1.640028" => ("high", "4.0"),
        _ => ("high", "5.1"),
    }
}

/// Encodeur MP4 : une instance par job, jamais réutilisée après
/// `finish`/`cancel`.
pub struct Mp4Encoder {
    child: Option<Child>,
    temp_path: PathBuf,
    width: u32,
    height: u32,
    codec: &'static str,
}

impl Mp4Encoder {
    /// Démarre ffmpeg pour `width`×`height` à `fps`, avec l'intervalle de
    /// keyframes donné.
    ///
    /// # Errors
    /// `GcError::Encode` when ffmpeg cannot be spawned.
    pub fn new(width: u32, height: u32, fps: f64, keyframe_interval: u32) -> Result<Self, GcError> {
        let codec = h264_codec_string(width, height);
        let (profile, level) = profile_level(codec);
        let temp_path = std::env::temp_dir().join(format!(
            "glyphcast-{}-{}.mp4",
            std::process::id(),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));

        let child = Command::new("ffmpeg")
            .args([
                "-y",
                "-f",
                "rawvideo",
                "-vcodec",
                "rawvideo",
                "-s",
                &format!("{width}x{height}"),
                "-pix_fmt",
                "rgba",
                "-r",
                &format!("{fps}"),
                "-i",
                "-",
                "-c:v",
                "libx264",
                "-profile:v",
                profile,
                "-level:v",
                level,
                "-g",
                &keyframe_interval.to_string(),
                "-pix_fmt",
                "yuv420p",
                // yuv420p exige des dimensions paires.
                "-vf",
                "pad=ceil(iw/2)*2:ceil(ih/2)*2",
                "-movflags",
                "+faststart",
                "-hide_banner",
                "-loglevel",
                "error",
            ])
            .arg(&temp_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                GcError::encode("mp4", format!("ffmpeg introuvable ou non exécutable : {e}"))
            })?;

        log::debug!("encodeur mp4 : {width}×{height} @ {fps:.3} fps, codec {codec}");
        Ok(Self {
            child: Some(child),
            temp_path,
            width,
            height,
            codec,
        })
    }

    /// Chaîne codec effective de ce flux.
    #[must_use]
    pub fn codec_string(&self) -> &'static str {
        self.codec
    }

    /// Pousse une frame RGBA brute (longueur `width·height·4`).
    ///
    /// # Errors
    /// `GcError::Encode` on size mismatch or broken pipe.
    pub fn write_frame(&mut self, rgba: &[u8]) -> Result<(), GcError> {
        let expected = (self.width * self.height * 4) as usize;
        if rgba.len() != expected {
            return Err(GcError::encode(
                "mp4",
                format!("frame de {} octets, {expected} attendus", rgba.len()),
            ));
        }
        let stdin = self
            .child
            .as_mut()
            .and_then(|c| c.stdin.as_mut())
            .ok_or_else(|| GcError::encode("mp4", "stdin ffmpeg fermé"))?;
        stdin
            .write_all(rgba)
            .map_err(|e| GcError::encode("mp4", format!("écriture vers ffmpeg : {e}")))
    }

    /// Ferme le flux, attend ffmpeg, relit et valide le fichier produit
    /// (non vide, atome `moov` présent), puis supprime le temporaire.
    ///
    /// # Errors
    /// `GcError::Encode` when ffmpeg fails or the output is invalid.
    pub fn finish(mut self) -> Result<Vec<u8>, GcError> {
        let mut child = self
            .child
            .take()
            .ok_or_else(|| GcError::encode("mp4", "encodeur déjà arrêté"))?;
        drop(child.stdin.take());
        let output = child
            .wait_with_output()
            .map_err(|e| GcError::encode("mp4", e.to_string()))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            std::fs::remove_file(&self.temp_path).ok();
            return Err(GcError::encode(
                "mp4",
                format!("ffmpeg a échoué : {}", stderr.trim()),
            ));
        }

        let bytes = std::fs::read(&self.temp_path)
            .map_err(|e| GcError::encode("mp4", format!("relecture : {e}")))?;
        std::fs::remove_file(&self.temp_path).ok();

        if bytes.is_empty() {
            return Err(GcError::encode("mp4", "sortie vide"));
        }
        if !bytes.windows(4).any(|w| w == b"moov") {
            return Err(GcError::encode("mp4", "atome moov absent"));
        }
        Ok(bytes)
    }

    /// Abandonne l'encodage : tue ffmpeg et supprime le fichier partiel.
    /// Idempotent.
    pub fn cancel(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        std::fs::remove_file(&self.temp_path).ok();
    }
}

impl Drop for Mp4Encoder {
    fn drop(&mut self) {
        // Un handle abandonné sans finish() ne laisse ni process ni
        // fichier temporaire derrière lui.
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_string_resolution_tiers() {
        assert_eq!(h264_codec_string(640, 480), "avc1.42001f");
        assert_eq!(h264_codec_string(1280, 720), "avc1.42001f");
        assert_eq!(h264_codec_string(1281, 720), "avc1.640028");
        assert_eq!(h264_codec_string(1920, 1080), "avc1.640028");
        assert_eq!(h264_codec_string(1920, 1081), "avc1.640033");
        assert_eq!(h264_codec_string(3840, 2160), "avc1.640033");
    }

    #[test]
    fn profile_matches_codec() {
        assert_eq!(profile_level("avc1.42001f"), ("baseline", "3.1"));
        assert_eq!(profile_level("avc1.640028"), ("high", "4.0"));
        assert_eq!(profile_level("avc1.640033"), ("high", "5.1"));
    }

    #[test]
    fn end_to_end_when_ffmpeg_available() {
        if Command::new("ffmpeg").arg("-version").output().is_err() {
            eprintln!("ffmpeg absent, test sauté");
            return;
        }
        let mut enc = Mp4Encoder::new(16, 16, 10.0, 20).unwrap();
        assert_eq!(enc.codec_string(), "avc1.42001f");
        let frame = vec![128u8; 16 * 16 * 4];
        for _ in 0..5 {
            enc.write_frame(&frame).unwrap();
        }
        let bytes = enc.finish().unwrap();
        assert!(!bytes.is_empty());
        assert!(bytes.windows(4).any(|w| w == b"moov"));
    }

    #[test]
    fn cancel_removes_partial_output() {
        if Command::new("ffmpeg").arg("-version").output().is_err() {
            eprintln!("ffmpeg absent, test sauté");
            return;
        }
        let mut enc = Mp4Encoder::new(16, 16, 10.0, 20).unwrap();
        let temp = enc.temp_path.clone();
        enc.write_frame(&vec![0u8; 16 * 16 * 4]).unwrap();
        enc.cancel();
        assert!(!temp.exists());
    }
}
