use serde::{Deserialize, Serialize};

use crate::error::GcError;

/// Rampe standard — 10 caractères, du plus dense au plus clair.
pub const CHARSET_STANDARD: &str = "@%#*+=-:. ";

/// Rampe détaillée — 67 caractères.
pub const CHARSET_DETAILED: &str =
    "$@B%8&WM#*oahkbdpqwmZO0QLCJUYXzcvunxrjft/|()1{}?-_+~<>i!lI;:,\"^`'. ";

/// Blocs Unicode — pseudo-pixels.
pub const CHARSET_BLOCKS: &str = "█▓▒░ ";

/// Rampe courte, haut contraste.
pub const CHARSET_SIMPLE: &str = "#. ";

/// Séquence binaire.
pub const CHARSET_BINARY: &str = "# ";

/// Rampe braille — se termine par le « braille pattern blank » (U+2800).
pub const CHARSET_BRAILLE: &str = "⣿⣷⣯⣟⡿⢿⣻⣽⡾⠿⠯⠟⠛⠓⠒⠂⠁\u{2800}";

/// Rampe de points pleins/creux.
pub const CHARSET_DOTS: &str = "●◉◎○◦·. ";

/// Named glyph ramp selection.
///
/// # Example
/// ```
/// use gc_core::charset::Charset;
/// assert_eq!(Charset::default(), Charset::Standard);
/// assert_eq!(Charset::Standard.ramp(), "@%#*+=-:. ");
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Charset {
    /// 10-glyph classic ramp.
    #[default]
    Standard,
    /// 67-glyph dense ramp.
    Detailed,
    /// Unicode block elements.
    Blocks,
    /// Three-glyph high-contrast ramp.
    Simple,
    /// Two-glyph on/off ramp.
    Binary,
    /// Braille density patterns.
    Braille,
    /// Filled/hollow dots.
    Dots,
    /// User-supplied ramp (see `ConverterConfig::custom_charset`).
    Custom,
}

impl Charset {
    /// Built-in ramp for this selection. `Custom` has no built-in ramp and
    /// falls back to the standard one when no custom string is given.
    #[must_use]
    pub fn ramp(self) -> &'static str {
        match self {
            Self::Standard | Self::Custom => CHARSET_STANDARD,
            Self::Detailed => CHARSET_DETAILED,
            Self::Blocks => CHARSET_BLOCKS,
            Self::Simple => CHARSET_SIMPLE,
            Self::Binary => CHARSET_BINARY,
            Self::Braille => CHARSET_BRAILLE,
            Self::Dots => CHARSET_DOTS,
        }
    }

    /// Parse a charset name as it appears in config files and CLI flags.
    ///
    /// # Errors
    /// Returns `GcError::Config` for unknown names.
    pub fn parse(name: &str) -> Result<Self, GcError> {
        match name {
            "standard" => Ok(Self::Standard),
            "detailed" => Ok(Self::Detailed),
            "blocks" => Ok(Self::Blocks),
            "simple" => Ok(Self::Simple),
            "binary" => Ok(Self::Binary),
            "braille" => Ok(Self::Braille),
            "dots" => Ok(Self::Dots),
            "custom" => Ok(Self::Custom),
            other => Err(GcError::Config(format!("charset inconnu : {other}"))),
        }
    }
}

/// Resolve the effective glyph ramp: a non-empty `custom` string overrides
/// the named selection.
///
/// # Errors
/// Returns `GcError::Config` when the resolved ramp has fewer than 2 glyphs.
///
/// # Example
/// ```
/// use gc_core::charset::{Charset, resolve_ramp};
/// let ramp = resolve_ramp(Charset::Simple, "").unwrap();
/// assert_eq!(ramp, vec!['#', '.', ' ']);
/// let ramp = resolve_ramp(Charset::Simple, "01").unwrap();
/// assert_eq!(ramp, vec!['0', '1']);
/// ```
pub fn resolve_ramp(charset: Charset, custom: &str) -> Result<Vec<char>, GcError> {
    let ramp: Vec<char> = if custom.is_empty() {
        charset.ramp().chars().collect()
    } else {
        custom.chars().collect()
    };
    if ramp.len() < 2 {
        return Err(GcError::Config(format!(
            "la rampe de glyphes doit contenir au moins 2 caractères ({} fournis)",
            ramp.len()
        )));
    }
    Ok(ramp)
}

/// Lookup table mapping luminance [0..255] → glyph.
///
/// Pre-computed once per conversion for O(1) per-pixel cost. The ramp is
/// ordered densest→lightest, so index 0 of the ramp answers luminance 0.
///
/// # Example
/// ```
/// use gc_core::charset::GlyphLut;
/// let lut = GlyphLut::new(&['@', '#', ':', ' ']);
/// assert_eq!(lut.map(0), '@');
/// assert_eq!(lut.map(255), ' ');
/// ```
pub struct GlyphLut {
    lut: [char; 256],
}

impl GlyphLut {
    /// Build a LUT from a resolved ramp (densest→lightest).
    ///
    /// Glyph index for luminance `y` is `⌊(y/255)·(N−1)⌋`, clamped to the
    /// ramp. Inversion is applied by the caller as `255 − y`.
    #[must_use]
    pub fn new(ramp: &[char]) -> Self {
        debug_assert!(ramp.len() >= 2, "ramp must hold at least 2 glyphs");
        let max_idx = (ramp.len() - 1) as f32;
        let mut lut = [' '; 256];
        for (y, slot) in lut.iter_mut().enumerate() {
            let idx = ((y as f32 / 255.0) * max_idx).floor() as usize;
            *slot = ramp[idx.min(ramp.len() - 1)];
        }
        Self { lut }
    }

    /// Map a luminance value [0..255] to a glyph.
    #[inline(always)]
    #[must_use]
    pub fn map(&self, luminance: u8) -> char {
        self.lut[luminance as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lut_maps_extremes() {
        let ramp: Vec<char> = CHARSET_STANDARD.chars().collect();
        let lut = GlyphLut::new(&ramp);
        assert_eq!(lut.map(0), '@');
        assert_eq!(lut.map(255), ' ');
    }

    #[test]
    fn lut_index_in_bounds_for_all_luminances() {
        let ramp: Vec<char> = CHARSET_BINARY.chars().collect();
        let lut = GlyphLut::new(&ramp);
        for y in 0..=255u8 {
            let ch = lut.map(y);
            assert!(ramp.contains(&ch), "glyphe hors rampe à luminance {y}");
        }
    }

    #[test]
    fn lut_monotonic_toward_lighter_glyphs() {
        let ramp: Vec<char> = CHARSET_STANDARD.chars().collect();
        let lut = GlyphLut::new(&ramp);
        let mut prev = 0usize;
        for y in 0..=255u8 {
            let idx = ramp.iter().position(|&c| c == lut.map(y)).unwrap();
            assert!(idx >= prev, "LUT non monotone à luminance {y}");
            prev = idx;
        }
    }

    #[test]
    fn custom_overrides_named_ramp() {
        let ramp = resolve_ramp(Charset::Standard, "@. ").unwrap();
        assert_eq!(ramp, vec!['@', '.', ' ']);
    }

    #[test]
    fn single_glyph_ramp_rejected() {
        assert!(resolve_ramp(Charset::Custom, "@").is_err());
    }

    #[test]
    fn braille_ramp_ends_with_braille_blank() {
        let ramp = resolve_ramp(Charset::Braille, "").unwrap();
        assert_eq!(*ramp.last().unwrap(), '\u{2800}');
    }
}
