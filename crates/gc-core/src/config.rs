use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::charset::{Charset, resolve_ramp};
use crate::error::GcError;
use crate::palette::PaletteMode;

/// Couleur RGBA de fond (raster et markup).
///
/// # Example
/// ```
/// use gc_core::config::Rgba;
/// let c = Rgba::parse_hex("#ff8000").unwrap();
/// assert_eq!((c.r, c.g, c.b, c.a), (255, 128, 0, 255));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    /// Opaque color from an RGB triplet.
    #[must_use]
    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Parse `#rrggbb` or `#rrggbbaa` (leading `#` optional).
    ///
    /// # Errors
    /// Returns `GcError::Config` for malformed strings.
    pub fn parse_hex(s: &str) -> std::result::Result<Self, GcError> {
        let hex = s.trim_start_matches('#');
        let bad = || GcError::Config(format!("couleur invalide : {s}"));
        let byte = |i: usize| -> std::result::Result<u8, GcError> {
            u8::from_str_radix(hex.get(i..i + 2).ok_or_else(bad)?, 16).map_err(|_| bad())
        };
        match hex.len() {
            6 => Ok(Self {
                r: byte(0)?,
                g: byte(2)?,
                b: byte(4)?,
                a: 255,
            }),
            8 => Ok(Self {
                r: byte(0)?,
                g: byte(2)?,
                b: byte(4)?,
                a: byte(6)?,
            }),
            _ => Err(bad()),
        }
    }
}

/// Sémantique de couleur des cellules.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    /// Post-adjust RGB per cell.
    #[default]
    Color,
    /// (g, g, g) where g is the cell luminance.
    Grayscale,
}

impl ColorMode {
    /// Parse a color-mode name as it appears in config files and CLI flags.
    ///
    /// # Errors
    /// Returns `GcError::Config` for unknown names.
    pub fn parse(name: &str) -> std::result::Result<Self, GcError> {
        match name {
            "color" => Ok(Self::Color),
            "grayscale" => Ok(Self::Grayscale),
            other => Err(GcError::Config(format!("mode couleur inconnu : {other}"))),
        }
    }
}

/// Configuration complète d'une conversion, immuable une fois validée.
///
/// Chaque champ a une valeur par défaut saine ; sérialisable en TOML.
///
/// # Example
/// ```
/// use gc_core::config::ConverterConfig;
/// let config = ConverterConfig::default();
/// assert_eq!(config.width, 100);
/// assert_eq!(config.contrast, 100);
/// config.validate().unwrap();
/// ```
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ConverterConfig {
    /// Nombre de colonnes de la grille (≥ 1).
    pub width: u32,
    /// Rampe de glyphes nommée.
    pub charset: Charset,
    /// Rampe personnalisée ; prioritaire sur `charset` si non vide.
    pub custom_charset: String,
    /// Couleur ou niveaux de gris.
    pub color_mode: ColorMode,
    /// Palette appliquée au markup coloré uniquement.
    pub color_palette: PaletteMode,
    /// Taille de police du rendu raster, en pixels (≥ 1).
    pub font_size: u32,
    /// Multiplicateur d'interligne du rendu raster (≥ 0.5).
    pub line_height: f32,
    /// Contraste [0, 255]. 128 = identité.
    pub contrast: i32,
    /// Luminosité en pourcent [1, 400]. 100 = identité.
    pub brightness: u32,
    /// Inverser la rampe sombre↔clair.
    pub invert: bool,
    /// Couleur de fond du raster et du markup.
    pub background: Rgba,
    /// Frame rate cible pour les animations. `None` = auto (taux déclaré).
    pub frame_rate: Option<f64>,
    /// Facteur d'échantillonnage NeuQuant [1, 30]. 1 = meilleure qualité.
    pub gif_quality: u32,
    /// Facteur d'échelle du rendu raster (≥ 1).
    pub png_scale: u32,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            width: 100,
            charset: Charset::Standard,
            custom_charset: String::new(),
            color_mode: ColorMode::Color,
            color_palette: PaletteMode::Full,
            font_size: 12,
            line_height: 1.0,
            contrast: 100,
            brightness: 100,
            invert: false,
            background: Rgba::opaque(0, 0, 0),
            frame_rate: None,
            gif_quality: 10,
            png_scale: 1,
        }
    }
}

impl ConverterConfig {
    /// Vérifie chaque champ. Appelée avant toute conversion.
    ///
    /// # Errors
    /// Returns `GcError::Config` naming the first offending field. A contrast
    /// of 259 (the divide-by-zero pole of the curve) is rejected here along
    /// with everything else outside [0, 255].
    pub fn validate(&self) -> std::result::Result<(), GcError> {
        if self.width < 1 {
            return Err(GcError::Config("width doit être ≥ 1".into()));
        }
        resolve_ramp(self.charset, &self.custom_charset)?;
        if !(0..=255).contains(&self.contrast) {
            return Err(GcError::Config(format!(
                "contrast hors de [0, 255] : {}",
                self.contrast
            )));
        }
        if !(1..=400).contains(&self.brightness) {
            return Err(GcError::Config(format!(
                "brightness hors de [1, 400] : {}",
                self.brightness
            )));
        }
        if self.font_size < 1 {
            return Err(GcError::Config("font_size doit être ≥ 1".into()));
        }
        if self.line_height < 0.5 {
            return Err(GcError::Config(format!(
                "line_height doit être ≥ 0.5 : {}",
                self.line_height
            )));
        }
        if let Some(fps) = self.frame_rate {
            if !(fps > 0.0) {
                return Err(GcError::Config(format!(
                    "frame_rate doit être > 0 : {fps}"
                )));
            }
        }
        if !(1..=30).contains(&self.gif_quality) {
            return Err(GcError::Config(format!(
                "gif_quality hors de [1, 30] : {}",
                self.gif_quality
            )));
        }
        if self.png_scale < 1 {
            return Err(GcError::Config("png_scale doit être ≥ 1".into()));
        }
        Ok(())
    }

    /// Rampe de glyphes effective (custom prioritaire).
    ///
    /// # Errors
    /// Returns `GcError::Config` when the resolved ramp is too short.
    pub fn ramp(&self) -> std::result::Result<Vec<char>, GcError> {
        resolve_ramp(self.charset, &self.custom_charset)
    }
}

/// Structure TOML intermédiaire : toutes les valeurs optionnelles.
#[derive(Deserialize)]
struct ConfigFile {
    convert: ConvertSection,
}

/// Section `[convert]` du fichier TOML, champs optionnels pour override partiel.
#[derive(Deserialize)]
struct ConvertSection {
    width: Option<u32>,
    charset: Option<Charset>,
    custom_charset: Option<String>,
    color_mode: Option<ColorMode>,
    color_palette: Option<PaletteMode>,
    font_size: Option<u32>,
    line_height: Option<f32>,
    contrast: Option<i32>,
    brightness: Option<u32>,
    invert: Option<bool>,
    background: Option<String>,
    frame_rate: Option<f64>,
    gif_quality: Option<u32>,
    png_scale: Option<u32>,
}

/// Charge un fichier TOML et fusionne avec les valeurs par défaut.
///
/// # Errors
/// Returns an error if the file cannot be read or parsed, or if the merged
/// configuration fails validation.
pub fn load_config(path: &Path) -> Result<ConverterConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Impossible de lire {}", path.display()))?;

    let file: ConfigFile = toml::from_str(&content)
        .with_context(|| format!("Erreur de parsing TOML dans {}", path.display()))?;

    let mut config = ConverterConfig::default();
    let c = file.convert;
    if let Some(v) = c.width {
        config.width = v;
    }
    if let Some(v) = c.charset {
        config.charset = v;
    }
    if let Some(v) = c.custom_charset {
        config.custom_charset = v;
    }
    if let Some(v) = c.color_mode {
        config.color_mode = v;
    }
    if let Some(v) = c.color_palette {
        config.color_palette = v;
    }
    if let Some(v) = c.font_size {
        config.font_size = v;
    }
    if let Some(v) = c.line_height {
        config.line_height = v;
    }
    if let Some(v) = c.contrast {
        config.contrast = v;
    }
    if let Some(v) = c.brightness {
        config.brightness = v;
    }
    if let Some(v) = c.invert {
        config.invert = v;
    }
    if let Some(v) = c.background {
        config.background = Rgba::parse_hex(&v)?;
    }
    if let Some(v) = c.frame_rate {
        config.frame_rate = Some(v);
    }
    if let Some(v) = c.gif_quality {
        config.gif_quality = v;
    }
    if let Some(v) = c.png_scale {
        config.png_scale = v;
    }

    config.validate()?;
    Ok(config)
}
