/// Facteur de la courbe de contraste, pour la valeur centrée `c = contrast − 128`.
///
/// `factor = 259·(c + 255) / (255·(259 − c))`. L'identité est à
/// contrast = 128 ; le pôle de la courbe (259) est rejeté à la validation
/// de la configuration.
///
/// # Example
/// ```
/// use gc_ascii::transform::contrast_factor;
/// assert!((contrast_factor(128) - 1.0).abs() < 1e-6);
/// assert!(contrast_factor(255) > 1.0);
/// assert!(contrast_factor(0) < 1.0);
/// ```
#[must_use]
pub fn contrast_factor(contrast: i32) -> f32 {
    let c = (contrast - 128) as f32;
    (259.0 * (c + 255.0)) / (255.0 * (259.0 - c))
}

/// Ajuste un canal : luminosité (pourcent) puis courbe de contraste, borné à [0, 255].
#[inline]
#[must_use]
pub fn adjust_channel(v: u8, brightness_pct: u32, factor: f32) -> u8 {
    let scaled = f32::from(v) * brightness_pct as f32 / 100.0;
    (factor * (scaled - 128.0) + 128.0).clamp(0.0, 255.0) as u8
}

/// Ajuste un triplet RGB complet.
///
/// # Example
/// ```
/// use gc_ascii::transform::{adjust_rgb, contrast_factor};
/// // brightness = 100, contrast = 128 : identité.
/// let f = contrast_factor(128);
/// assert_eq!(adjust_rgb(12, 34, 56, 100, f), (12, 34, 56));
/// ```
#[inline]
#[must_use]
pub fn adjust_rgb(r: u8, g: u8, b: u8, brightness_pct: u32, factor: f32) -> (u8, u8, u8) {
    (
        adjust_channel(r, brightness_pct, factor),
        adjust_channel(g, brightness_pct, factor),
        adjust_channel(b, brightness_pct, factor),
    )
}

/// Luminance pondérée `0.299·R + 0.587·G + 0.114·B`, arrondie.
///
/// # Example
/// ```
/// use gc_ascii::transform::luminance;
/// assert_eq!(luminance(0, 0, 0), 0);
/// assert_eq!(luminance(255, 255, 255), 255);
/// ```
#[inline]
#[must_use]
pub fn luminance(r: u8, g: u8, b: u8) -> u8 {
    let y = 0.299 * f32::from(r) + 0.587 * f32::from(g) + 0.114 * f32::from(b);
    y.round().clamp(0.0, 255.0) as u8
}

/// Index de glyphe pour une luminance : `⌊(Y/255)·(N−1)⌋`, rampe inversée
/// via `255 − Y`. Toujours dans `[0, N−1]`.
///
/// # Example
/// ```
/// use gc_ascii::transform::glyph_index;
/// assert_eq!(glyph_index(0, 10, false), 0);
/// assert_eq!(glyph_index(255, 10, false), 9);
/// assert_eq!(glyph_index(0, 10, true), 9);
/// ```
#[inline]
#[must_use]
pub fn glyph_index(y: u8, ramp_len: usize, invert: bool) -> usize {
    debug_assert!(ramp_len >= 2);
    let y = if invert { 255 - y } else { y };
    let idx = ((f32::from(y) / 255.0) * (ramp_len - 1) as f32).floor() as usize;
    idx.min(ramp_len - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_transform_preserves_pixels() {
        // brightness = 100, contrast = 128, invert = false → triplet inchangé.
        let f = contrast_factor(128);
        for &(r, g, b) in &[(0u8, 0u8, 0u8), (255, 255, 255), (1, 128, 254), (77, 3, 201)] {
            assert_eq!(adjust_rgb(r, g, b, 100, f), (r, g, b));
        }
    }

    #[test]
    fn brightness_scales_before_contrast() {
        let f = contrast_factor(128);
        assert_eq!(adjust_rgb(100, 100, 100, 200, f), (200, 200, 200));
        assert_eq!(adjust_rgb(200, 200, 200, 200, f), (255, 255, 255));
    }

    #[test]
    fn high_contrast_spreads_around_midpoint() {
        let f = contrast_factor(255);
        assert!(adjust_channel(100, 100, f) < 100);
        assert!(adjust_channel(156, 100, f) > 156);
        assert_eq!(adjust_channel(128, 100, f), 128);
    }

    #[test]
    fn glyph_index_always_in_bounds() {
        for len in 2..=12usize {
            for y in 0..=255u8 {
                for invert in [false, true] {
                    let idx = glyph_index(y, len, invert);
                    assert!(idx < len, "index {idx} hors bornes pour N={len}, Y={y}");
                }
            }
        }
    }

    #[test]
    fn invert_flips_extremes() {
        assert_eq!(glyph_index(0, 5, false), 0);
        assert_eq!(glyph_index(0, 5, true), 4);
        assert_eq!(glyph_index(255, 5, true), 0);
    }

    #[test]
    fn luminance_weights_sum_to_one() {
        for v in [0u8, 17, 128, 255] {
            assert_eq!(luminance(v, v, v), v);
        }
    }
}
