use thiserror::Error;

/// Errors surfaced by the conversion and encoding pipeline.
#[derive(Error, Debug)]
pub enum GcError {
    /// Invalid configuration value or structure.
    #[error("Configuration invalide : {0}")]
    Config(String),

    /// The source bytes could not be interpreted as a supported image or video.
    #[error("Ouverture de la source impossible ({component}) : {reason}")]
    SourceOpen {
        /// Component that rejected the source.
        component: &'static str,
        /// Human-readable summary.
        reason: String,
    },

    /// Mid-stream decode failure. Frames decoded before the failure are dropped.
    #[error("Échec de décodage ({component}) : {reason}")]
    Decode {
        /// Component that failed.
        component: &'static str,
        /// Human-readable summary.
        reason: String,
    },

    /// Pixel buffer too small to form even one full quantizer sample.
    #[error("Quantification impossible : {0}")]
    Quantize(String),

    /// The underlying encoder rejected a frame or produced invalid output.
    #[error("Échec d'encodage ({component}) : {reason}")]
    Encode {
        /// Component that failed.
        component: &'static str,
        /// Human-readable summary.
        reason: String,
    },

    /// Encoder lifecycle violated (add after finalize, double finalize).
    #[error("Transition d'état invalide : {0}")]
    InvalidState(String),

    /// Cooperative cancellation observed. Never retried.
    #[error("Opération annulée")]
    Cancelled,

    /// Configured wait exceeded while opening or probing a source.
    #[error("Délai dépassé ({component}) : {seconds} s")]
    Timeout {
        /// Component that timed out.
        component: &'static str,
        /// Configured wait, in seconds.
        seconds: u64,
    },
}

impl GcError {
    /// Shorthand for a decode failure.
    #[must_use]
    pub fn decode(component: &'static str, reason: impl Into<String>) -> Self {
        Self::Decode {
            component,
            reason: reason.into(),
        }
    }

    /// Shorthand for a source-open failure.
    #[must_use]
    pub fn source_open(component: &'static str, reason: impl Into<String>) -> Self {
        Self::SourceOpen {
            component,
            reason: reason.into(),
        }
    }

    /// Shorthand for an encode failure.
    #[must_use]
    pub fn encode(component: &'static str, reason: impl Into<String>) -> Self {
        Self::Encode {
            component,
            reason: reason.into(),
        }
    }
}
