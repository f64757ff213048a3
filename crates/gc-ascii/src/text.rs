use gc_core::grid::{GlyphGrid, normalize_blank};

/// Sérialise la grille en texte brut : lignes séparées par `\n`, blancs
/// normalisés (le blanc braille devient un espace).
///
/// # Example
/// ```
/// use gc_ascii::text::to_text;
/// use gc_core::grid::{GlyphCell, GlyphGrid};
///
/// let mut grid = GlyphGrid::new(2, 2);
/// grid.set(0, 0, GlyphCell { ch: '@', color: (0, 0, 0) });
/// assert_eq!(to_text(&grid), "@ \n  ");
/// ```
#[must_use]
pub fn to_text(grid: &GlyphGrid) -> String {
    let mut out = String::with_capacity(grid.cells.len() + grid.height as usize);
    for (i, row) in grid.rows().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        for cell in row {
            out.push(normalize_blank(cell.ch));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use gc_core::grid::{BRAILLE_BLANK, GlyphCell};

    #[test]
    fn rows_joined_with_lf() {
        let mut grid = GlyphGrid::new(4, 2);
        for cell in &mut grid.cells {
            cell.ch = '@';
        }
        assert_eq!(to_text(&grid), "@@@@\n@@@@");
    }

    #[test]
    fn empty_grid_serializes_to_empty_string() {
        assert_eq!(to_text(&GlyphGrid::new(1, 0)), "");
    }

    #[test]
    fn braille_blank_normalized_to_space() {
        let mut grid = GlyphGrid::new(2, 1);
        grid.set(0, 0, GlyphCell { ch: BRAILLE_BLANK, color: (0, 0, 0) });
        grid.set(1, 0, GlyphCell { ch: '⣿', color: (9, 9, 9) });
        assert_eq!(to_text(&grid), " ⣿");
    }
}
