use std::io::Cursor;

use gc_core::config::Rgba;
use gc_core::error::GcError;
use gc_core::grid::GlyphGrid;

use crate::rasterizer::Rasterizer;

/// Rasterise la grille et l'encode en PNG.
///
/// # Errors
/// `GcError::Encode` when the grid is degenerate (zero rows) or the PNG
/// encoder fails.
pub fn grid_to_png(
    grid: &GlyphGrid,
    rasterizer: &Rasterizer,
    background: Rgba,
) -> Result<Vec<u8>, GcError> {
    let fb = rasterizer.render(grid, background);
    if fb.width == 0 || fb.height == 0 {
        return Err(GcError::encode("png", "grille vide, rien à rasteriser"));
    }
    let img = image::RgbaImage::from_raw(fb.width, fb.height, fb.data)
        .ok_or_else(|| GcError::encode("png", "buffer raster incohérent"))?;
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png)
        .map_err(|e| GcError::encode("png", e.to_string()))?;
    Ok(out.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gc_core::config::ConverterConfig;
    use gc_core::grid::GlyphCell;

    #[test]
    fn png_bytes_have_magic() {
        let Some(font) = crate::rasterizer::find_system_font().and_then(|p| std::fs::read(p).ok())
        else {
            eprintln!("aucune police système, test sauté");
            return;
        };
        let config = ConverterConfig {
            width: 2,
            ..Default::default()
        };
        let rast = Rasterizer::new(&font, &config).unwrap();
        let mut grid = GlyphGrid::new(2, 1);
        grid.set(0, 0, GlyphCell { ch: '#', color: (200, 200, 200) });
        let png = grid_to_png(&grid, &rast, config.background).unwrap();
        assert_eq!(&png[..8], &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a]);
    }

    #[test]
    fn empty_grid_is_encode_error() {
        let Some(font) = crate::rasterizer::find_system_font().and_then(|p| std::fs::read(p).ok())
        else {
            eprintln!("aucune police système, test sauté");
            return;
        };
        let config = ConverterConfig {
            width: 1,
            ..Default::default()
        };
        let rast = Rasterizer::new(&font, &config).unwrap();
        let err = grid_to_png(&GlyphGrid::new(1, 0), &rast, config.background).unwrap_err();
        assert!(matches!(err, GcError::Encode { .. }));
    }
}
