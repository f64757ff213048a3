//! Contrat uniforme au-dessus des encodeurs : création, ajout de frames,
//! finalisation, annulation. Machine à états par handle :
//! `Created → Writing → Finalized`, `Cancelled` terminal.

use gc_core::error::GcError;
use gc_gif::GifEncoder;

use crate::mp4::Mp4Encoder;

/// Format de sortie d'un job d'animation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Gif,
    Mp4,
}

/// Options transmises à la création d'un handle.
#[derive(Clone, Copy, Debug)]
pub struct EncoderOptions {
    /// Facteur d'échantillonnage NeuQuant [1, 30] (GIF).
    pub gif_quality: u32,
    /// Nombre de boucles (GIF) : 0 = infini, < 0 = aucune.
    pub repeat: i32,
    /// Intervalle de keyframes (MP4).
    pub keyframe_interval: u32,
}

impl Default for EncoderOptions {
    fn default() -> Self {
        Self {
            gif_quality: 10,
            repeat: 0,
            keyframe_interval: 1,
        }
    }
}

/// Une frame prête pour l'encodeur.
pub struct EncoderFrame<'a> {
    /// Pixels RGBA, `width·height·4` octets.
    pub rgba: &'a [u8],
    /// Timestamp de présentation, µs. Strictement croissant.
    pub timestamp_us: i64,
    /// Durée d'affichage, µs.
    pub duration_us: i64,
    /// Frame décodable indépendamment (MP4).
    pub is_key: bool,
}

/// États du cycle de vie d'un handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HostState {
    Created,
    Writing,
    Finalized,
    Cancelled,
}

enum Backend {
    Gif(GifEncoder),
    Mp4(Mp4Encoder),
}

/// Handle d'encodage : au plus un encodage actif par handle.
pub struct EncoderHost {
    state: HostState,
    backend: Option<Backend>,
    width: u32,
    height: u32,
    last_timestamp: Option<i64>,
}

impl EncoderHost {
    /// Crée un handle pour le format demandé.
    ///
    /// # Errors
    /// `GcError::Encode` when the backend cannot start (dimensions hors
    /// limites GIF, ffmpeg indisponible pour MP4).
    pub fn create(
        format: OutputFormat,
        width: u32,
        height: u32,
        frame_rate: Option<f64>,
        options: EncoderOptions,
    ) -> Result<Self, GcError> {
        let backend = match format {
            OutputFormat::Gif => {
                if width == 0 || height == 0 || width > 0xffff || height > 0xffff {
                    return Err(GcError::encode(
                        "gif",
                        format!("dimensions hors limites : {width}×{height}"),
                    ));
                }
                let mut enc = GifEncoder::new(width as u16, height as u16);
                enc.set_repeat(options.repeat);
                enc.set_quality(options.gif_quality);
                Backend::Gif(enc)
            }
            OutputFormat::Mp4 => Backend::Mp4(Mp4Encoder::new(
                width,
                height,
                frame_rate.unwrap_or(30.0),
                options.keyframe_interval.max(1),
            )?),
        };
        Ok(Self {
            state: HostState::Created,
            backend: Some(backend),
            width,
            height,
            last_timestamp: None,
        })
    }

    /// État courant du handle.
    #[must_use]
    pub fn state(&self) -> HostState {
        self.state
    }

    /// Soumet un lot ordonné de frames. Le premier appel fait passer le
    /// handle de `Created` à `Writing`.
    ///
    /// # Errors
    /// `GcError::InvalidState` hors de `Created`/`Writing` ;
    /// `GcError::Encode` sur timestamps non croissants, taille de frame
    /// erronée, ou refus du backend.
    pub fn add_frames(&mut self, frames: &[EncoderFrame]) -> Result<(), GcError> {
        match self.state {
            HostState::Created => self.state = HostState::Writing,
            HostState::Writing => {}
            other => {
                return Err(GcError::InvalidState(format!(
                    "add_frames en état {other:?}"
                )));
            }
        }

        let expected = (self.width * self.height * 4) as usize;
        let backend = self
            .backend
            .as_mut()
            .ok_or_else(|| GcError::InvalidState("backend absent".into()))?;

        for frame in frames {
            if frame.rgba.len() != expected {
                return Err(GcError::encode(
                    "host",
                    format!("frame de {} octets, {expected} attendus", frame.rgba.len()),
                ));
            }
            if let Some(last) = self.last_timestamp {
                if frame.timestamp_us <= last {
                    return Err(GcError::encode(
                        "host",
                        format!(
                            "timestamps non croissants : {} après {last}",
                            frame.timestamp_us
                        ),
                    ));
                }
            }
            self.last_timestamp = Some(frame.timestamp_us);

            match backend {
                Backend::Gif(enc) => {
                    enc.set_delay_ms(((frame.duration_us as f64) / 1000.0).round() as u32);
                    enc.add_frame(frame.rgba)?;
                }
                Backend::Mp4(enc) => enc.write_frame(frame.rgba)?,
            }
        }
        Ok(())
    }

    /// Termine l'encodage et rend le flux validé.
    ///
    /// Validation : un GIF doit commencer par `GIF87a`/`GIF89a` ; un MP4
    /// doit être non vide et porter un atome `moov` (vérifié par le muxer).
    ///
    /// # Errors
    /// `GcError::InvalidState` hors de `Writing` ; `GcError::Encode` quand
    /// la sortie est invalide.
    pub fn finalize(&mut self) -> Result<Vec<u8>, GcError> {
        if self.state != HostState::Writing {
            return Err(GcError::InvalidState(format!(
                "finalize en état {:?}",
                self.state
            )));
        }
        let backend = self
            .backend
            .take()
            .ok_or_else(|| GcError::InvalidState("backend absent".into()))?;
        self.state = HostState::Finalized;

        match backend {
            Backend::Gif(enc) => {
                let bytes = enc.finish();
                if !(bytes.starts_with(b"GIF89a") || bytes.starts_with(b"GIF87a")) {
                    return Err(GcError::encode("gif", "en-tête GIF invalide"));
                }
                Ok(bytes)
            }
            Backend::Mp4(enc) => enc.finish(),
        }
    }

    /// Annule l'encodage : l'état partiel du backend est détruit (fichier
    /// temporaire supprimé pour MP4). Idempotent ; sans effet une fois
    /// finalisé.
    pub fn cancel(&mut self) {
        match self.state {
            HostState::Created | HostState::Writing => {
                if let Some(Backend::Mp4(mut enc)) = self.backend.take() {
                    enc.cancel();
                }
                self.backend = None;
                self.state = HostState::Cancelled;
            }
            HostState::Cancelled | HostState::Finalized => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gif_host(w: u32, h: u32) -> EncoderHost {
        EncoderHost::create(OutputFormat::Gif, w, h, None, EncoderOptions::default()).unwrap()
    }

    fn frame(rgba: &[u8], ts: i64) -> EncoderFrame<'_> {
        EncoderFrame {
            rgba,
            timestamp_us: ts,
            duration_us: 100_000,
            is_key: ts == 0,
        }
    }

    #[test]
    fn lifecycle_created_writing_finalized() {
        let mut host = gif_host(2, 2);
        assert_eq!(host.state(), HostState::Created);
        let rgba = vec![0u8; 16];
        host.add_frames(&[frame(&rgba, 0)]).unwrap();
        assert_eq!(host.state(), HostState::Writing);
        let bytes = host.finalize().unwrap();
        assert_eq!(host.state(), HostState::Finalized);
        assert!(bytes.starts_with(b"GIF89a"));
        assert_eq!(*bytes.last().unwrap(), 0x3b);
    }

    #[test]
    fn add_after_finalize_is_invalid_state() {
        let mut host = gif_host(2, 2);
        let rgba = vec![0u8; 16];
        host.add_frames(&[frame(&rgba, 0)]).unwrap();
        host.finalize().unwrap();
        assert!(matches!(
            host.add_frames(&[frame(&rgba, 1)]),
            Err(GcError::InvalidState(_))
        ));
    }

    #[test]
    fn double_finalize_is_invalid_state() {
        let mut host = gif_host(2, 2);
        let rgba = vec![0u8; 16];
        host.add_frames(&[frame(&rgba, 0)]).unwrap();
        host.finalize().unwrap();
        assert!(matches!(host.finalize(), Err(GcError::InvalidState(_))));
    }

    #[test]
    fn finalize_without_frames_is_invalid_state() {
        let mut host = gif_host(2, 2);
        assert!(matches!(host.finalize(), Err(GcError::InvalidState(_))));
    }

    #[test]
    fn cancel_is_idempotent_and_terminal() {
        let mut host = gif_host(2, 2);
        host.cancel();
        assert_eq!(host.state(), HostState::Cancelled);
        host.cancel();
        assert_eq!(host.state(), HostState::Cancelled);
        let rgba = vec![0u8; 16];
        assert!(matches!(
            host.add_frames(&[frame(&rgba, 0)]),
            Err(GcError::InvalidState(_))
        ));
        assert!(matches!(host.finalize(), Err(GcError::InvalidState(_))));
    }

    #[test]
    fn non_monotonic_timestamps_rejected() {
        let mut host = gif_host(2, 2);
        let rgba = vec![0u8; 16];
        host.add_frames(&[frame(&rgba, 10)]).unwrap();
        assert!(matches!(
            host.add_frames(&[frame(&rgba, 10)]),
            Err(GcError::Encode { .. })
        ));
    }

    #[test]
    fn wrong_frame_size_rejected() {
        let mut host = gif_host(2, 2);
        let rgba = vec![0u8; 12];
        assert!(matches!(
            host.add_frames(&[frame(&rgba, 0)]),
            Err(GcError::Encode { .. })
        ));
    }

    #[test]
    fn gif_dimension_limits() {
        assert!(
            EncoderHost::create(OutputFormat::Gif, 0, 4, None, EncoderOptions::default()).is_err()
        );
        assert!(
            EncoderHost::create(
                OutputFormat::Gif,
                70_000,
                4,
                None,
                EncoderOptions::default()
            )
            .is_err()
        );
    }

    #[test]
    fn gif_frame_durations_become_delays() {
        let mut host = gif_host(2, 2);
        let rgba = vec![100u8; 16];
        let frames: Vec<EncoderFrame> = Vec::new();
        host.add_frames(&frames).unwrap(); // lot vide : transition seule
        host.add_frames(&[
            EncoderFrame {
                rgba: &rgba,
                timestamp_us: 0,
                duration_us: 50_000,
                is_key: true,
            },
            EncoderFrame {
                rgba: &rgba,
                timestamp_us: 50_000,
                duration_us: 50_000,
                is_key: false,
            },
        ])
        .unwrap();
        let bytes = host.finalize().unwrap();
        // GCE de la première frame : delay = 5 cs.
        let gce = 6 + 7 + 768 + 19; // header + LSD + GCT + netscape (repeat 0)
        assert_eq!(&bytes[gce..gce + 3], &[0x21, 0xf9, 0x04]);
        assert_eq!(&bytes[gce + 4..gce + 6], &[5, 0]);
    }
}
