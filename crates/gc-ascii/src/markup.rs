use gc_core::config::{ColorMode, ConverterConfig};
use gc_core::grid::{GlyphGrid, is_blank, normalize_blank};
use gc_core::palette::{Rgb, nearest_in_palette};

/// Sérialise la grille en markup monospace coloré.
///
/// Les suites de cellules de même couleur quantifiée sont fusionnées en un
/// seul span stylé ; les cellules blanches sont émises sans style et
/// coupent les runs. En mode couleur, la couleur quantifiée est l'entrée
/// de palette la plus proche quand une palette est sélectionnée, sinon le
/// triplet RGB brut.
///
/// `document` contrôle l'enrobage dans une page HTML complète.
///
/// # Example
/// ```
/// use gc_ascii::markup::to_colored_markup;
/// use gc_core::config::ConverterConfig;
/// use gc_core::grid::{GlyphCell, GlyphGrid};
///
/// let mut grid = GlyphGrid::new(2, 1);
/// grid.set(0, 0, GlyphCell { ch: '@', color: (255, 0, 0) });
/// grid.set(1, 0, GlyphCell { ch: '#', color: (255, 0, 0) });
/// let html = to_colored_markup(&grid, &ConverterConfig::default(), false);
/// // One run, one span.
/// assert_eq!(html.matches("<span").count(), 1);
/// ```
#[must_use]
pub fn to_colored_markup(grid: &GlyphGrid, config: &ConverterConfig, document: bool) -> String {
    let palette = match config.color_mode {
        ColorMode::Color => config.color_palette.table(),
        // La palette ne s'applique qu'au markup couleur.
        ColorMode::Grayscale => None,
    };

    let mut body = String::with_capacity(grid.cells.len() * 2);
    for (i, row) in grid.rows().enumerate() {
        if i > 0 {
            body.push('\n');
        }
        let mut open_run: Option<Rgb> = None;
        for cell in row {
            let ch = normalize_blank(cell.ch);
            if is_blank(ch) {
                if open_run.take().is_some() {
                    body.push_str("</span>");
                }
                body.push(' ');
                continue;
            }
            let (r, g, b) = cell.color;
            let color = match palette {
                Some(table) => nearest_in_palette(r, g, b, table),
                None => (r, g, b),
            };
            if open_run != Some(color) {
                if open_run.take().is_some() {
                    body.push_str("</span>");
                }
                body.push_str(&format!(
                    "<span style=\"color:#{:02x}{:02x}{:02x}\">",
                    color.0, color.1, color.2
                ));
                open_run = Some(color);
            }
            push_escaped(&mut body, ch);
        }
        if open_run.is_some() {
            body.push_str("</span>");
        }
    }

    if document {
        let bg = config.background;
        format!(
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
             <style>pre{{font-family:monospace;line-height:1;\
             background:rgba({},{},{},{:.3});}}</style>\n</head>\n<body>\n\
             <pre>{body}</pre>\n</body>\n</html>\n",
            bg.r,
            bg.g,
            bg.b,
            f32::from(bg.a) / 255.0
        )
    } else {
        format!("<pre>{body}</pre>")
    }
}

fn push_escaped(out: &mut String, ch: char) {
    match ch {
        '&' => out.push_str("&amp;"),
        '<' => out.push_str("&lt;"),
        '>' => out.push_str("&gt;"),
        other => out.push(other),
    }
}
