use std::path::PathBuf;

use clap::Parser;

use gc_core::charset::Charset;
use gc_core::config::{ColorMode, ConverterConfig, Rgba};
use gc_core::error::GcError;
use gc_core::palette::PaletteMode;

/// glyphcast — convertit images et vidéos en art de caractères.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Fichier source : image fixe, GIF animé, ou vidéo.
    pub input: PathBuf,

    /// Fichier de sortie. Défaut : nom horodaté dans le dossier courant.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Format de sortie : text, html, png, gif, mp4. Défaut : déduit de
    /// l'extension de --output, sinon text.
    #[arg(long)]
    pub format: Option<String>,

    /// Fichier de configuration TOML (section [convert]).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Nombre de colonnes de la grille.
    #[arg(short, long)]
    pub width: Option<u32>,

    /// Rampe : standard, detailed, blocks, simple, binary, braille, dots, custom.
    #[arg(long)]
    pub charset: Option<String>,

    /// Rampe personnalisée (prioritaire sur --charset).
    #[arg(long)]
    pub custom_charset: Option<String>,

    /// color ou grayscale.
    #[arg(long)]
    pub color_mode: Option<String>,

    /// Palette du markup : full, ansi256, ansi16, cga, gameboy.
    #[arg(long)]
    pub palette: Option<String>,

    /// Taille de police du rendu raster, en pixels.
    #[arg(long)]
    pub font_size: Option<u32>,

    /// Multiplicateur d'interligne du rendu raster.
    #[arg(long)]
    pub line_height: Option<f32>,

    /// Contraste [0, 255], 128 = neutre.
    #[arg(long)]
    pub contrast: Option<i32>,

    /// Luminosité en pourcent [1, 400].
    #[arg(long)]
    pub brightness: Option<u32>,

    /// Inverser la rampe sombre↔clair.
    #[arg(long, default_value_t = false)]
    pub invert: bool,

    /// Couleur de fond, hex #rrggbb ou #rrggbbaa.
    #[arg(long)]
    pub background: Option<String>,

    /// Frame rate cible : "auto" ou un nombre > 0.
    #[arg(long, allow_hyphen_values = true)]
    pub frame_rate: Option<String>,

    /// Qualité GIF [1, 30] (1 = meilleure, plus lente).
    #[arg(long)]
    pub gif_quality: Option<u32>,

    /// Facteur d'échelle du rendu raster.
    #[arg(long)]
    pub png_scale: Option<u32>,

    /// Police TTF pour les rendus raster. Défaut : police système.
    #[arg(long)]
    pub font: Option<PathBuf>,

    /// Nombre de boucles GIF : 0 = infini, -1 = aucune.
    #[arg(long)]
    pub repeat: Option<i32>,

    /// Markup HTML sans document englobant.
    #[arg(long, default_value_t = false)]
    pub bare: bool,

    /// Niveau de log : error, warn, info, debug, trace.
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

/// Surface de sortie demandée.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    Text,
    Html,
    Png,
    Gif,
    Mp4,
}

impl ExportFormat {
    /// Extension de fichier usuelle.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Text => "txt",
            Self::Html => "html",
            Self::Png => "png",
            Self::Gif => "gif",
            Self::Mp4 => "mp4",
        }
    }

    fn parse(name: &str) -> Result<Self, GcError> {
        match name {
            "text" | "txt" => Ok(Self::Text),
            "html" => Ok(Self::Html),
            "png" => Ok(Self::Png),
            "gif" => Ok(Self::Gif),
            "mp4" => Ok(Self::Mp4),
            other => Err(GcError::Config(format!("format inconnu : {other}"))),
        }
    }
}

impl Cli {
    /// Format effectif : --format, sinon l'extension de --output, sinon text.
    ///
    /// # Errors
    /// `GcError::Config` for unknown format names.
    pub fn resolve_format(&self) -> Result<ExportFormat, GcError> {
        if let Some(ref name) = self.format {
            return ExportFormat::parse(name);
        }
        if let Some(ref out) = self.output {
            if let Some(ext) = out.extension().and_then(|e| e.to_str()) {
                if let Ok(f) = ExportFormat::parse(&ext.to_lowercase()) {
                    return Ok(f);
                }
            }
        }
        Ok(ExportFormat::Text)
    }

    /// Config de base (fichier TOML ou défauts) plus les overrides CLI.
    ///
    /// # Errors
    /// Returns an error when a flag value or the merged config is invalid.
    pub fn resolve_config(&self) -> anyhow::Result<ConverterConfig> {
        let mut config = match self.config {
            Some(ref path) => gc_core::config::load_config(path)?,
            None => ConverterConfig::default(),
        };

        if let Some(v) = self.width {
            config.width = v;
        }
        if let Some(ref v) = self.charset {
            config.charset = Charset::parse(v)?;
        }
        if let Some(ref v) = self.custom_charset {
            config.custom_charset = v.clone();
        }
        if let Some(ref v) = self.color_mode {
            config.color_mode = ColorMode::parse(v)?;
        }
        if let Some(ref v) = self.palette {
            config.color_palette = PaletteMode::parse(v)?;
        }
        if let Some(v) = self.font_size {
            config.font_size = v;
        }
        if let Some(v) = self.line_height {
            config.line_height = v;
        }
        if let Some(v) = self.contrast {
            config.contrast = v;
        }
        if let Some(v) = self.brightness {
            config.brightness = v;
        }
        if self.invert {
            config.invert = true;
        }
        if let Some(ref v) = self.background {
            config.background = Rgba::parse_hex(v)?;
        }
        if let Some(ref v) = self.frame_rate {
            config.frame_rate = parse_frame_rate(v)?;
        }
        if let Some(v) = self.gif_quality {
            config.gif_quality = v;
        }
        if let Some(v) = self.png_scale {
            config.png_scale = v;
        }

        config.validate()?;
        Ok(config)
    }
}

/// `"auto"` → None, sinon un nombre strictement positif.
fn parse_frame_rate(s: &str) -> Result<Option<f64>, GcError> {
    if s.eq_ignore_ascii_case("auto") {
        return Ok(None);
    }
    match s.parse::<f64>() {
        Ok(v) if v > 0.0 => Ok(Some(v)),
        _ => Err(GcError::Config(format!("frame_rate invalide : {s}"))),
    }
}
