use std::io::Cursor;
use std::path::Path;

use image::AnimationDecoder;
use image::codecs::gif::GifDecoder;

use gc_core::error::GcError;
use gc_core::frame::{Frame, FrameBuffer};
use gc_core::traits::{FrameSource, SourceInfo};

/// Source GIF animée : délais natifs par frame, ou ré-échantillonnage
/// uniforme quand un frame rate cible est demandé.
///
/// À l'ouverture, si les octets ne forment pas un GIF décodable, un second
/// essai unique est fait avec le décodeur d'image statique.
#[derive(Debug)]
pub struct AnimatedGifSource {
    width: u32,
    height: u32,
    /// Frames décodées avec leur délai natif (ms).
    frames: Vec<(FrameBuffer, u32)>,
    /// Ordre de lecture : indices dans `frames`, avec le délai de sortie.
    schedule: Vec<(usize, u32)>,
    nominal_fps: Option<f64>,
    pos: usize,
    clock_us: i64,
}

impl AnimatedGifSource {
    /// Ouvre un fichier GIF.
    ///
    /// # Errors
    /// `GcError::SourceOpen` when neither decoder accepts the bytes,
    /// `GcError::Decode` on a mid-stream failure.
    pub fn open(path: &Path, target_fps: Option<f64>) -> Result<Self, GcError> {
        let bytes = std::fs::read(path)
            .map_err(|e| GcError::source_open("gif", format!("{} : {e}", path.display())))?;
        Self::from_bytes(&bytes, target_fps)
    }

    /// Décode un GIF depuis des octets en mémoire.
    ///
    /// # Errors
    /// Same as [`Self::open`].
    pub fn from_bytes(bytes: &[u8], target_fps: Option<f64>) -> Result<Self, GcError> {
        let frames = match GifDecoder::new(Cursor::new(bytes)) {
            Ok(decoder) => decoder
                .into_frames()
                .collect_frames()
                .map_err(|e| GcError::decode("gif", e.to_string()))?
                .into_iter()
                .map(|frame| {
                    let (numer, denom) = frame.delay().numer_denom_ms();
                    let delay_ms = numer / denom.max(1);
                    let buffer = frame.into_buffer();
                    let (w, h) = buffer.dimensions();
                    (
                        FrameBuffer {
                            data: buffer.into_raw(),
                            width: w,
                            height: h,
                        },
                        delay_ms,
                    )
                })
                .collect::<Vec<_>>(),
            Err(first_err) => {
                // Retry unique avec le décodeur statique.
                log::warn!("décodeur GIF refusé ({first_err}), nouvel essai en image fixe");
                let img = image::load_from_memory(bytes).map_err(|e| {
                    GcError::source_open("gif", format!("aucun décodeur n'accepte : {e}"))
                })?;
                let rgba = img.to_rgba8();
                let (w, h) = rgba.dimensions();
                vec![(
                    FrameBuffer {
                        data: rgba.into_raw(),
                        width: w,
                        height: h,
                    },
                    0,
                )]
            }
        };

        if frames.is_empty() {
            return Err(GcError::source_open("gif", "aucune frame décodée"));
        }
        let width = frames[0].0.width;
        let height = frames[0].0.height;

        let (schedule, nominal_fps) = match target_fps {
            Some(fps) if fps > 0.0 && frames.len() > 1 => {
                (resample_uniform(&frames, fps), Some(fps))
            }
            _ => (
                frames
                    .iter()
                    .enumerate()
                    .map(|(i, &(_, delay))| (i, delay))
                    .collect(),
                None,
            ),
        };

        log::debug!(
            "GIF animé : {} frame(s) natives, {} planifiées",
            frames.len(),
            schedule.len()
        );
        Ok(Self {
            width,
            height,
            frames,
            schedule,
            nominal_fps,
            pos: 0,
            clock_us: 0,
        })
    }
}

/// Plan de lecture uniforme : une frame tous les `1000/fps` ms, choisie
/// selon la frise des délais natifs.
fn resample_uniform(frames: &[(FrameBuffer, u32)], fps: f64) -> Vec<(usize, u32)> {
    // Frise cumulée des débuts de frame, en ms.
    let mut starts = Vec::with_capacity(frames.len());
    let mut clock = 0u64;
    for &(_, delay) in frames {
        starts.push(clock);
        clock += u64::from(delay);
    }
    let total_ms = clock.max(1);

    let out_delay_ms = (1000.0 / fps).round().max(1.0) as u32;
    let count = ((total_ms as f64 / 1000.0) * fps).round().max(1.0) as u64;

    let mut schedule = Vec::with_capacity(count as usize);
    for i in 0..count {
        let t = (i as f64 * 1000.0 / fps) as u64;
        // Dernière frame dont le début est ≤ t.
        let idx = match starts.binary_search(&t) {
            Ok(found) => found,
            Err(insert) => insert.saturating_sub(1),
        };
        schedule.push((idx, out_delay_ms));
    }
    schedule
}

impl FrameSource for AnimatedGifSource {
    fn describe(&self) -> SourceInfo {
        SourceInfo {
            width: self.width,
            height: self.height,
            frame_count: Some(self.schedule.len() as u64),
            nominal_fps: self.nominal_fps,
        }
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, GcError> {
        let Some(&(idx, delay_ms)) = self.schedule.get(self.pos) else {
            return Ok(None);
        };
        self.pos += 1;

        let timestamp_us = self.clock_us;
        // Timestamps strictement croissants même pour les délais nuls.
        self.clock_us += i64::from(delay_ms).max(1) * 1000;

        Ok(Some(Frame {
            buffer: self.frames[idx].0.clone(),
            timestamp_us,
            delay_ms,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gc_gif::GifEncoder;

    /// Construit un GIF de test avec notre propre assembleur.
    fn sample_gif(frame_colors: &[[u8; 3]], delay_ms: u32) -> Vec<u8> {
        let mut enc = GifEncoder::new(4, 4);
        enc.set_repeat(0);
        for color in frame_colors {
            enc.set_delay_ms(delay_ms);
            let rgba: Vec<u8> = (0..16)
                .flat_map(|_| [color[0], color[1], color[2], 255])
                .collect();
            enc.add_frame(&rgba).unwrap();
        }
        enc.finish()
    }

    #[test]
    fn native_delays_preserved() {
        let gif = sample_gif(&[[0, 0, 0], [80, 80, 80], [160, 160, 160]], 100);
        let mut source = AnimatedGifSource::from_bytes(&gif, None).unwrap();
        let info = source.describe();
        assert_eq!((info.width, info.height), (4, 4));
        assert_eq!(info.frame_count, Some(3));
        assert_eq!(info.nominal_fps, None);

        let mut prev_ts = -1i64;
        let mut count = 0;
        while let Some(frame) = source.next_frame().unwrap() {
            assert_eq!(frame.delay_ms, 100);
            assert!(frame.timestamp_us > prev_ts, "timestamps non croissants");
            prev_ts = frame.timestamp_us;
            count += 1;
        }
        assert_eq!(count, 3);
    }

    #[test]
    fn uniform_resampling_to_target_fps() {
        // 3 frames × 100 ms = 300 ms ; à 20 fps → 6 frames de 50 ms.
        let gif = sample_gif(&[[0, 0, 0], [80, 80, 80], [160, 160, 160]], 100);
        let mut source = AnimatedGifSource::from_bytes(&gif, Some(20.0)).unwrap();
        assert_eq!(source.describe().frame_count, Some(6));
        assert_eq!(source.describe().nominal_fps, Some(20.0));

        let mut count = 0;
        while let Some(frame) = source.next_frame().unwrap() {
            assert_eq!(frame.delay_ms, 50);
            count += 1;
        }
        assert_eq!(count, 6);
    }

    #[test]
    fn static_retry_accepts_png_bytes() {
        // Un PNG passé au chemin GIF déclenche le retry statique unique.
        let img = image::RgbaImage::from_pixel(6, 2, image::Rgba([9, 9, 9, 255]));
        let mut png = Vec::new();
        img.write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();

        let mut source = AnimatedGifSource::from_bytes(&png, None).unwrap();
        let frame = source.next_frame().unwrap().expect("frame unique");
        assert_eq!((frame.buffer.width, frame.buffer.height), (6, 2));
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn garbage_bytes_fail_both_decoders() {
        let err = AnimatedGifSource::from_bytes(b"GIFnope", None).unwrap_err();
        assert!(matches!(err, GcError::SourceOpen { .. }));
    }
}
