use gc_core::config::{ColorMode, ConverterConfig};
use gc_core::error::GcError;
use gc_core::frame::FrameBuffer;
use gc_core::grid::{GlyphCell, GlyphGrid, grid_height};

use crate::transform::{adjust_rgb, contrast_factor, glyph_index, luminance};

/// Convertisseur frame → grille, préparé une fois par configuration.
///
/// La rampe et le facteur de contraste sont résolus à la construction ;
/// `convert` est ensuite de l'arithmétique pure par cellule.
///
/// # Example
/// ```
/// use gc_ascii::Converter;
/// use gc_core::config::ConverterConfig;
/// use gc_core::frame::FrameBuffer;
///
/// let config = ConverterConfig { width: 4, ..Default::default() };
/// let converter = Converter::new(&config).unwrap();
/// let grid = converter.convert(&FrameBuffer::new(4, 4));
/// assert_eq!((grid.width, grid.height), (4, 2));
/// ```
pub struct Converter {
    ramp: Vec<char>,
    factor: f32,
    width: u32,
    brightness: u32,
    invert: bool,
    color_mode: ColorMode,
}

impl Converter {
    /// Valide la configuration et résout la rampe.
    ///
    /// # Errors
    /// Returns `GcError::Config` when the configuration is invalid.
    pub fn new(config: &ConverterConfig) -> Result<Self, GcError> {
        config.validate()?;
        Ok(Self {
            ramp: config.ramp()?,
            factor: contrast_factor(config.contrast),
            width: config.width,
            brightness: config.brightness,
            invert: config.invert,
            color_mode: config.color_mode,
        })
    }

    /// Convertit une frame en grille de glyphes.
    ///
    /// Chaque cellule échantillonne (par moyenne) la région source
    /// correspondante, applique luminosité puis contraste, et mappe la
    /// luminance résultante sur la rampe.
    #[must_use]
    pub fn convert(&self, frame: &FrameBuffer) -> GlyphGrid {
        let height = grid_height(self.width, frame.width, frame.height);
        let mut grid = GlyphGrid::new(self.width, height);
        if frame.width == 0 || frame.height == 0 {
            return grid;
        }

        let n = self.ramp.len();
        for cy in 0..height {
            // Région source de la rangée cy.
            let y0 = (u64::from(cy) * u64::from(frame.height) / u64::from(height)) as u32;
            let y1 = (u64::from(cy + 1) * u64::from(frame.height) / u64::from(height)) as u32;
            for cx in 0..self.width {
                let x0 = (u64::from(cx) * u64::from(frame.width) / u64::from(self.width)) as u32;
                let x1 =
                    (u64::from(cx + 1) * u64::from(frame.width) / u64::from(self.width)) as u32;

                let (r, g, b, _a) = frame.area_sample(x0, y0, x1, y1);
                let (r, g, b) = adjust_rgb(r, g, b, self.brightness, self.factor);
                let y = luminance(r, g, b);
                let ch = self.ramp[glyph_index(y, n, self.invert)];

                let color = match self.color_mode {
                    ColorMode::Color => (r, g, b),
                    ColorMode::Grayscale => (y, y, y),
                };
                grid.set(cx, cy, GlyphCell { ch, color });
            }
        }
        grid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gc_core::charset::Charset;

    fn uniform_frame(w: u32, h: u32, rgba: [u8; 4]) -> FrameBuffer {
        let mut fb = FrameBuffer::new(w, h);
        for px in fb.data.chunks_exact_mut(4) {
            px.copy_from_slice(&rgba);
        }
        fb
    }

    #[test]
    fn black_image_maps_to_densest_glyph() {
        // 4×4 all-black, width 4, standard ramp → 4×2 grid of '@'.
        let config = ConverterConfig {
            width: 4,
            contrast: 128,
            ..Default::default()
        };
        let converter = Converter::new(&config).unwrap();
        let grid = converter.convert(&uniform_frame(4, 4, [0, 0, 0, 255]));
        assert_eq!((grid.width, grid.height), (4, 2));
        assert!(grid.cells.iter().all(|c| c.ch == '@'));
    }

    #[test]
    fn white_image_maps_to_space() {
        let config = ConverterConfig {
            width: 4,
            contrast: 128,
            ..Default::default()
        };
        let converter = Converter::new(&config).unwrap();
        let grid = converter.convert(&uniform_frame(4, 4, [255, 255, 255, 255]));
        assert!(grid.cells.iter().all(|c| c.ch == ' '));
    }

    #[test]
    fn one_by_one_source_yields_empty_grid() {
        // width 1 over a 1×1 source: H = ⌊1·1·0.5⌋ = 0.
        let config = ConverterConfig {
            width: 1,
            charset: Charset::Simple,
            color_mode: ColorMode::Grayscale,
            ..Default::default()
        };
        let converter = Converter::new(&config).unwrap();
        let grid = converter.convert(&uniform_frame(1, 1, [128, 128, 128, 255]));
        assert_eq!(grid.height, 0);
        assert!(grid.cells.is_empty());
    }

    #[test]
    fn grayscale_mode_stores_luminance_triplet() {
        let config = ConverterConfig {
            width: 4,
            contrast: 128,
            color_mode: ColorMode::Grayscale,
            ..Default::default()
        };
        let converter = Converter::new(&config).unwrap();
        let grid = converter.convert(&uniform_frame(4, 4, [255, 0, 0, 255]));
        let y = luminance(255, 0, 0);
        assert!(grid.cells.iter().all(|c| c.color == (y, y, y)));
    }

    #[test]
    fn color_mode_preserves_distinct_colors() {
        // 2×2: red, green / blue, blue. Width 4 → each pixel covers two cells.
        let mut fb = FrameBuffer::new(2, 2);
        fb.data[0..4].copy_from_slice(&[255, 0, 0, 255]);
        fb.data[4..8].copy_from_slice(&[0, 255, 0, 255]);
        fb.data[8..12].copy_from_slice(&[0, 0, 255, 255]);
        fb.data[12..16].copy_from_slice(&[0, 0, 255, 255]);

        let config = ConverterConfig {
            width: 4,
            contrast: 128,
            ..Default::default()
        };
        let converter = Converter::new(&config).unwrap();
        let grid = converter.convert(&fb);
        assert_eq!((grid.width, grid.height), (4, 2));
        assert_eq!(grid.get(0, 0).color, (255, 0, 0));
        assert_eq!(grid.get(2, 0).color, (0, 255, 0));
        assert_eq!(grid.get(0, 1).color, (0, 0, 255));
        assert_eq!(grid.get(3, 1).color, (0, 0, 255));
    }

    #[test]
    fn invalid_config_rejected_at_construction() {
        let config = ConverterConfig {
            width: 0,
            ..Default::default()
        };
        assert!(Converter::new(&config).is_err());
    }
}
