use crate::error::GcError;
use crate::frame::Frame;

/// Métadonnées d'une source, connues à l'ouverture.
#[derive(Clone, Copy, Debug)]
pub struct SourceInfo {
    /// Largeur native en pixels.
    pub width: u32,
    /// Hauteur native en pixels.
    pub height: u32,
    /// Nombre de frames, si la source le déclare.
    pub frame_count: Option<u64>,
    /// Frame rate déclaré, si la source le déclare.
    pub nominal_fps: Option<f64>,
}

/// Fournit une séquence ordonnée de frames RGBA décodées au pipeline.
///
/// Implémenté par : `StillSource`, `AnimatedGifSource`, `VideoSource`.
///
/// Contrat : les timestamps des frames produites sont strictement
/// croissants ; un échec de décodage en cours de flux interrompt la
/// séquence et les frames partielles ne sont jamais livrées comme un
/// résultat « complet ».
///
/// # Example
/// ```
/// use gc_core::traits::{FrameSource, SourceInfo};
/// use gc_core::frame::Frame;
/// use gc_core::error::GcError;
///
/// #[derive(Debug)]
/// struct Empty;
/// impl FrameSource for Empty {
///     fn describe(&self) -> SourceInfo {
///         SourceInfo { width: 0, height: 0, frame_count: Some(0), nominal_fps: None }
///     }
///     fn next_frame(&mut self) -> Result<Option<Frame>, GcError> { Ok(None) }
/// }
/// ```
pub trait FrameSource: Send + std::fmt::Debug {
    /// Dimensions et cadence déclarées.
    fn describe(&self) -> SourceInfo;

    /// Prochaine frame dans l'ordre, `Ok(None)` en fin de flux.
    ///
    /// # Errors
    /// `GcError::Decode` on mid-stream failure; the sequence is then over.
    fn next_frame(&mut self) -> Result<Option<Frame>, GcError>;
}
