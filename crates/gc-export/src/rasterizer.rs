use std::collections::HashMap;
use std::path::PathBuf;

use ab_glyph::{Font, FontVec, PxScale, ScaleFont, point};
use rayon::prelude::*;

use gc_core::config::{ConverterConfig, Rgba};
use gc_core::error::GcError;
use gc_core::frame::FrameBuffer;
use gc_core::grid::{GlyphGrid, is_blank};

/// Convertit une GlyphGrid en pixels RGBA.
///
/// Atlas logiciel : chaque glyphe de la rampe est rasterisé une fois à la
/// construction, le rendu par frame est une composition pure, parallélisée
/// par bande de cellules.
#[derive(Debug)]
pub struct Rasterizer {
    cell_w: u32,
    cell_h: u32,
    /// Couverture alpha par glyphe (cell_w × cell_h).
    glyph_cache: HashMap<char, Vec<u8>>,
    /// Glyphe vide pré-alloué pour les caractères hors atlas.
    empty_glyph: Vec<u8>,
}

impl Rasterizer {
    /// Prépare l'atlas pour la rampe de `config`, à `png_scale · font_size`
    /// pixels.
    ///
    /// Largeur de cellule : avance du glyphe le plus large de la rampe,
    /// bornée par `0.6 · taille` ; hauteur : `taille · line_height`.
    ///
    /// # Errors
    /// `GcError::Config` when the font bytes are invalid or the ramp is.
    pub fn new(font_data: &[u8], config: &ConverterConfig) -> Result<Self, GcError> {
        let font = FontVec::try_from_vec(font_data.to_vec())
            .map_err(|e| GcError::Config(format!("police invalide : {e}")))?;
        let ramp = config.ramp()?;

        let px = (config.png_scale * config.font_size) as f32;
        let scale = PxScale::from(px);
        let scaled = font.as_scaled(scale);

        let mut measured = 0.0f32;
        for &ch in &ramp {
            let gid = font.glyph_id(ch);
            if gid.0 != 0 {
                measured = measured.max(scaled.h_advance(gid));
            }
        }
        let advance = measured.max(0.6 * px);
        let cell_w = (advance.ceil() as u32).max(1);
        let cell_h = ((px * config.line_height).ceil() as u32).max(1);
        let ascent = scaled.ascent();

        let empty_glyph = vec![0u8; (cell_w * cell_h) as usize];
        let mut glyph_cache = HashMap::new();
        for &ch in &ramp {
            if is_blank(ch) || glyph_cache.contains_key(&ch) {
                continue;
            }
            let gid = font.glyph_id(ch);
            if gid.0 == 0 {
                // Glyphe absent de la police : cellule vide plutôt qu'un
                // rectangle de remplacement.
                log::warn!("glyphe '{ch}' absent de la police");
                glyph_cache.insert(ch, empty_glyph.clone());
                continue;
            }

            let mut buffer = vec![0u8; (cell_w * cell_h) as usize];
            let glyph = gid.with_scale_and_position(scale, point(0.0, ascent));
            if let Some(outline) = font.outline_glyph(glyph) {
                let bounds = outline.px_bounds();
                outline.draw(|x, y, v| {
                    let gx = x as i64 + bounds.min.x as i64;
                    let gy = y as i64 + bounds.min.y as i64;
                    if gx >= 0 && gy >= 0 && (gx as u32) < cell_w && (gy as u32) < cell_h {
                        let idx = (gy as u32 * cell_w + gx as u32) as usize;
                        buffer[idx] = buffer[idx].max((v * 255.0).round() as u8);
                    }
                });
            }
            glyph_cache.insert(ch, buffer);
        }

        Ok(Self {
            cell_w,
            cell_h,
            glyph_cache,
            empty_glyph,
        })
    }

    /// Dimensions du bitmap produit pour une grille donnée.
    #[must_use]
    pub fn target_dimensions(&self, grid_w: u32, grid_h: u32) -> (u32, u32) {
        (grid_w * self.cell_w, grid_h * self.cell_h)
    }

    /// Rend la grille sur fond `background` (l'alpha du fond est respecté).
    /// Seuls les glyphes non blancs sont dessinés.
    #[must_use]
    pub fn render(&self, grid: &GlyphGrid, background: Rgba) -> FrameBuffer {
        let (out_w, out_h) = self.target_dimensions(grid.width, grid.height);
        let mut fb = FrameBuffer::new(out_w, out_h);

        let bg = [background.r, background.g, background.b, background.a];
        for px in fb.data.chunks_exact_mut(4) {
            px.copy_from_slice(&bg);
        }
        if grid.height == 0 || grid.width == 0 {
            return fb;
        }

        let stride = (out_w * 4) as usize;
        let band_size = stride * self.cell_h as usize;
        let empty_glyph = &self.empty_glyph;

        fb.data
            .par_chunks_exact_mut(band_size)
            .enumerate()
            .for_each(|(gy, band)| {
                for gx in 0..grid.width as usize {
                    let cell = grid.get(gx as u32, gy as u32);
                    if is_blank(cell.ch) {
                        continue;
                    }
                    let coverage = self.glyph_cache.get(&cell.ch).unwrap_or(empty_glyph);
                    let cx_start = gx * self.cell_w as usize;

                    for cy in 0..self.cell_h as usize {
                        let row = cy * stride;
                        for cx in 0..self.cell_w as usize {
                            let cov = coverage[cy * self.cell_w as usize + cx];
                            if cov == 0 {
                                continue;
                            }
                            let a = f32::from(cov) / 255.0;
                            let idx = row + (cx_start + cx) * 4;
                            let blend = |fg: u8, bg: u8| -> u8 {
                                (f32::from(fg) * a + f32::from(bg) * (1.0 - a)) as u8
                            };
                            band[idx] = blend(cell.color.0, band[idx]);
                            band[idx + 1] = blend(cell.color.1, band[idx + 1]);
                            band[idx + 2] = blend(cell.color.2, band[idx + 2]);
                            band[idx + 3] =
                                (a * 255.0 + f32::from(band[idx + 3]) * (1.0 - a)) as u8;
                        }
                    }
                }
            });
        fb
    }
}

/// Cherche une police monospace utilisable sur le système.
///
/// Pour les rendus raster quand l'utilisateur ne fournit pas `--font`.
#[must_use]
pub fn find_system_font() -> Option<PathBuf> {
    const CANDIDATES: &[&str] = &[
        "/usr/share/fonts/truetype/dejavu/DejaVuSansMono.ttf",
        "/usr/share/fonts/truetype/liberation/LiberationMono-Regular.ttf",
        "/usr/share/fonts/TTF/DejaVuSansMono.ttf",
        "/usr/share/fonts/dejavu/DejaVuSansMono.ttf",
        "/System/Library/Fonts/Monaco.ttf",
        "/System/Library/Fonts/Menlo.ttc",
    ];
    for candidate in CANDIDATES {
        let path = PathBuf::from(candidate);
        if path.exists() {
            return Some(path);
        }
    }
    // Dernier recours : premier .ttf trouvé sous /usr/share/fonts.
    scan_for_ttf(&PathBuf::from("/usr/share/fonts"), 0)
}

fn scan_for_ttf(dir: &PathBuf, depth: u8) -> Option<PathBuf> {
    if depth > 3 {
        return None;
    }
    let entries = std::fs::read_dir(dir).ok()?;
    let mut dirs = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            dirs.push(path);
        } else if path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("ttf"))
        {
            return Some(path);
        }
    }
    for sub in dirs {
        if let Some(found) = scan_for_ttf(&sub, depth + 1) {
            return Some(found);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use gc_core::grid::GlyphCell;

    fn test_font() -> Option<Vec<u8>> {
        find_system_font().and_then(|p| std::fs::read(p).ok())
    }

    fn config() -> ConverterConfig {
        ConverterConfig {
            width: 4,
            font_size: 16,
            ..Default::default()
        }
    }

    #[test]
    fn invalid_font_bytes_rejected() {
        let err = Rasterizer::new(b"not a font", &config()).unwrap_err();
        assert!(matches!(err, GcError::Config(_)));
    }

    #[test]
    fn cell_dimensions_and_target_size() {
        let Some(font) = test_font() else {
            eprintln!("aucune police système, test sauté");
            return;
        };
        let rast = Rasterizer::new(&font, &config()).unwrap();
        let (w, h) = rast.target_dimensions(4, 2);
        assert!(w >= 4 * (16.0f32 * 0.6).ceil() as u32);
        assert_eq!(h % 2, 0);
        assert!(h >= 2 * 16);
    }

    #[test]
    fn png_scale_scales_cells() {
        let Some(font) = test_font() else {
            eprintln!("aucune police système, test sauté");
            return;
        };
        let small = Rasterizer::new(&font, &config()).unwrap();
        let big = Rasterizer::new(
            &font,
            &ConverterConfig {
                png_scale: 2,
                ..config()
            },
        )
        .unwrap();
        let (w1, h1) = small.target_dimensions(1, 1);
        let (w2, h2) = big.target_dimensions(1, 1);
        assert!(w2 >= 2 * w1 - 1);
        assert!(h2 >= 2 * h1 - 1);
    }

    #[test]
    fn render_draws_glyphs_over_background() {
        let Some(font) = test_font() else {
            eprintln!("aucune police système, test sauté");
            return;
        };
        let rast = Rasterizer::new(&font, &config()).unwrap();
        let mut grid = GlyphGrid::new(2, 1);
        grid.set(0, 0, GlyphCell { ch: '@', color: (255, 255, 255) });
        // Cellule 1 : blanc (espace), doit rester fond pur.
        let bg = Rgba::opaque(10, 20, 30);
        let fb = rast.render(&grid, bg);

        let (w, h) = rast.target_dimensions(2, 1);
        assert_eq!((fb.width, fb.height), (w, h));
        assert!(
            fb.data.chunks_exact(4).any(|px| px[0] > 128),
            "aucun pixel de glyphe dessiné"
        );
        // La moitié droite (cellule blanche) est exactement le fond.
        for y in 0..h {
            for x in w / 2..w {
                assert_eq!(fb.pixel(x, y), (10, 20, 30, 255));
            }
        }
    }

    #[test]
    fn empty_grid_renders_empty_buffer() {
        let Some(font) = test_font() else {
            eprintln!("aucune police système, test sauté");
            return;
        };
        let rast = Rasterizer::new(&font, &config()).unwrap();
        let fb = rast.render(&GlyphGrid::new(3, 0), Rgba::opaque(0, 0, 0));
        assert_eq!(fb.height, 0);
        assert!(fb.data.is_empty());
    }
}
