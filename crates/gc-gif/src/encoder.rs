//! Assembleur GIF89a : écran logique, palettes globale/locale, extension de
//! boucle NETSCAPE2.0, extensions de contrôle graphique, descripteurs
//! d'image, trailer.

use gc_core::error::GcError;
use gc_core::palette::Rgb;

use crate::lzw;
use crate::neuquant::NeuQuant;
use crate::sink::ByteSink;

/// Builder d'un flux GIF89a animé.
///
/// Chaque frame est quantifiée indépendamment par un NeuQuant neuf ; la
/// première frame fournit la palette globale, les suivantes portent une
/// palette locale.
///
/// # Example
/// ```
/// use gc_gif::GifEncoder;
/// let mut enc = GifEncoder::new(2, 2);
/// enc.set_repeat(0);
/// enc.add_frame(&[0u8; 2 * 2 * 4]).unwrap();
/// let bytes = enc.finish();
/// assert!(bytes.starts_with(b"GIF89a"));
/// assert_eq!(*bytes.last().unwrap(), 0x3b);
/// ```
pub struct GifEncoder {
    width: u16,
    height: u16,
    /// < 0 : pas de boucle ; 0 : infini ; n : n répétitions.
    repeat: i32,
    delay_cs: u16,
    /// Méthode de disposal. −1 = non configurée.
    dispose: i32,
    transparent: Option<Rgb>,
    sample: u32,
    first_frame: bool,
    frame_count: u32,
    out: ByteSink,
}

impl GifEncoder {
    /// Nouvel encodeur aux dimensions données. Écrit l'en-tête `GIF89a`.
    #[must_use]
    pub fn new(width: u16, height: u16) -> Self {
        let mut out = ByteSink::with_capacity(65_536);
        out.write_ascii("GIF89a");
        Self {
            width,
            height,
            repeat: -1,
            delay_cs: 0,
            dispose: -1,
            transparent: None,
            sample: 10,
            first_frame: true,
            frame_count: 0,
            out,
        }
    }

    /// Nombre de répétitions de l'animation : 0 = infini, < 0 = aucune
    /// extension de boucle. À appeler avant la première frame.
    pub fn set_repeat(&mut self, repeat: i32) {
        self.repeat = repeat;
    }

    /// Délai de la prochaine frame, en millisecondes (arrondi au centième
    /// de seconde).
    pub fn set_delay_ms(&mut self, ms: u32) {
        self.delay_cs = ((f64::from(ms) / 10.0).round() as u32).min(u32::from(u16::MAX)) as u16;
    }

    /// Facteur d'échantillonnage NeuQuant [1, 30]. 1 = meilleure qualité.
    pub fn set_quality(&mut self, sample: u32) {
        self.sample = sample.clamp(1, 30);
    }

    /// Méthode de disposal GIF (0–7). Non configurée par défaut.
    pub fn set_dispose(&mut self, dispose: i32) {
        self.dispose = dispose;
    }

    /// Couleur rendue transparente, si elle est référencée dans la frame.
    pub fn set_transparent(&mut self, color: Option<Rgb>) {
        self.transparent = color;
    }

    /// Frames écrites jusqu'ici.
    #[must_use]
    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    /// Quantifie et écrit une frame RGBA (longueur `width·height·4`).
    ///
    /// # Errors
    /// `GcError::Encode` on a size mismatch, `GcError::Quantize` when the
    /// frame is too small to quantize.
    pub fn add_frame(&mut self, rgba: &[u8]) -> Result<(), GcError> {
        let expected = usize::from(self.width) * usize::from(self.height) * 4;
        if rgba.len() != expected {
            return Err(GcError::encode(
                "gif",
                format!("frame de {} octets, {expected} attendus", rgba.len()),
            ));
        }

        // RGBA → RGB : l'alpha ne participe pas à la quantification.
        let mut rgb = Vec::with_capacity(expected / 4 * 3);
        for px in rgba.chunks_exact(4) {
            rgb.extend_from_slice(&px[..3]);
        }

        let nq = NeuQuant::train(&rgb, self.sample)?;
        let color_tab = nq.color_map();

        let mut used_entry = [false; 256];
        let mut indexed = Vec::with_capacity(expected / 4);
        for px in rgb.chunks_exact(3) {
            let idx = nq.map(px[0], px[1], px[2]);
            used_entry[idx] = true;
            indexed.push(idx as u8);
        }

        // Index transparent : entrée référencée la plus proche, sinon le
        // flag reste éteint.
        let trans_index = self
            .transparent
            .and_then(|c| find_closest_used(c, &color_tab, &used_entry));

        if self.first_frame {
            self.write_logical_screen();
            self.write_palette(&color_tab);
            if self.repeat >= 0 {
                self.write_netscape_ext();
            }
        }
        self.write_graphic_ctrl_ext(trans_index);
        self.write_image_desc();
        if !self.first_frame {
            self.write_palette(&color_tab);
        }
        lzw::encode(&indexed, 8, &mut self.out);

        self.first_frame = false;
        self.frame_count += 1;
        Ok(())
    }

    /// Écrit le trailer et rend le flux complet.
    #[must_use]
    pub fn finish(mut self) -> Vec<u8> {
        self.out.write_u8(0x3b);
        log::debug!(
            "GIF terminé : {} frame(s), {} octets",
            self.frame_count,
            self.out.len()
        );
        self.out.into_bytes()
    }

    /// Logical Screen Descriptor : dimensions, GCT 256 entrées, fond 0.
    fn write_logical_screen(&mut self) {
        self.out.write_le_u16(self.width);
        self.out.write_le_u16(self.height);
        // GCT présente | résolution couleur 8 bits | taille palette 2^(7+1).
        self.out.write_u8(0x80 | 0x70 | 0x07);
        self.out.write_u8(0); // background color index
        self.out.write_u8(0); // pixel aspect ratio
    }

    /// Palette 768 octets, complétée de zéros.
    fn write_palette(&mut self, color_tab: &[u8]) {
        self.out.write_bytes(color_tab);
        for _ in color_tab.len()..768 {
            self.out.write_u8(0);
        }
    }

    /// Extension NETSCAPE2.0 : nombre de boucles en u16 little-endian.
    fn write_netscape_ext(&mut self) {
        self.out.write_u8(0x21);
        self.out.write_u8(0xff);
        self.out.write_u8(11);
        self.out.write_ascii("NETSCAPE2.0");
        self.out.write_u8(3);
        self.out.write_u8(1);
        self.out.write_le_u16(self.repeat.clamp(0, i32::from(u16::MAX)) as u16);
        self.out.write_u8(0);
    }

    /// Graphic Control Extension : delay en centisecondes, disposal,
    /// transparence éventuelle.
    fn write_graphic_ctrl_ext(&mut self, trans_index: Option<u8>) {
        self.out.write_u8(0x21);
        self.out.write_u8(0xf9);
        self.out.write_u8(4);

        let (transp, default_disp) = match trans_index {
            Some(_) => (1u8, 2u8),
            None => (0, 0),
        };
        let disp = if self.dispose >= 0 {
            (self.dispose & 7) as u8
        } else {
            default_disp
        };
        self.out.write_u8(disp << 2 | transp);
        self.out.write_le_u16(self.delay_cs);
        self.out.write_u8(trans_index.unwrap_or(0));
        self.out.write_u8(0);
    }

    /// Image Descriptor à (0, 0) plein cadre ; palette locale à partir de
    /// la deuxième frame.
    fn write_image_desc(&mut self) {
        self.out.write_u8(0x2c);
        self.out.write_le_u16(0);
        self.out.write_le_u16(0);
        self.out.write_le_u16(self.width);
        self.out.write_le_u16(self.height);
        if self.first_frame {
            self.out.write_u8(0);
        } else {
            self.out.write_u8(0x80 | 0x07);
        }
    }
}

/// Entrée de palette référencée la plus proche de `color` (distance
/// euclidienne au carré), ou `None` si aucune entrée n'est référencée.
fn find_closest_used(color: Rgb, color_tab: &[u8], used_entry: &[bool; 256]) -> Option<u8> {
    let (r, g, b) = color;
    let mut best: Option<u8> = None;
    let mut best_d = i32::MAX;
    for (i, rgb) in color_tab.chunks_exact(3).enumerate() {
        if !used_entry[i] {
            continue;
        }
        let dr = i32::from(r) - i32::from(rgb[0]);
        let dg = i32::from(g) - i32::from(rgb[1]);
        let db = i32::from(b) - i32::from(rgb[2]);
        let d = dr * dr + dg * dg + db * db;
        if d < best_d {
            best_d = d;
            best = Some(i as u8);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform_rgba(w: usize, h: usize, rgba: [u8; 4]) -> Vec<u8> {
        rgba.iter()
            .copied()
            .cycle()
            .take(w * h * 4)
            .collect()
    }

    fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
        haystack.windows(needle.len()).position(|w| w == needle)
    }

    #[test]
    fn header_screen_and_trailer() {
        let mut enc = GifEncoder::new(4, 4);
        enc.add_frame(&uniform_rgba(4, 4, [0, 0, 0, 255])).unwrap();
        let bytes = enc.finish();
        assert!(bytes.starts_with(b"GIF89a"));
        // LSD : 4, 4 en LE u16, packed 0xF7, fond 0, aspect 0.
        assert_eq!(&bytes[6..13], &[4, 0, 4, 0, 0xf7, 0, 0]);
        // Palette globale complète : 768 octets avant le premier bloc.
        assert!(bytes.len() > 13 + 768);
        assert_eq!(*bytes.last().unwrap(), 0x3b);
    }

    #[test]
    fn netscape_loop_written_for_repeat_zero() {
        let mut enc = GifEncoder::new(2, 2);
        enc.set_repeat(0);
        enc.add_frame(&uniform_rgba(2, 2, [10, 20, 30, 255])).unwrap();
        let bytes = enc.finish();
        // L'extension suit immédiatement la palette globale.
        let ext = 6 + 7 + 768;
        assert_eq!(&bytes[ext..ext + 3], &[0x21, 0xff, 11]);
        assert_eq!(&bytes[ext + 3..ext + 14], b"NETSCAPE2.0");
        // 3, 1, boucle u16 LE = 0, terminateur.
        assert_eq!(&bytes[ext + 14..ext + 19], &[3, 1, 0, 0, 0]);
    }

    #[test]
    fn no_loop_extension_when_repeat_unset() {
        let mut enc = GifEncoder::new(2, 2);
        enc.add_frame(&uniform_rgba(2, 2, [10, 20, 30, 255])).unwrap();
        let bytes = enc.finish();
        assert!(find_subslice(&bytes, b"NETSCAPE2.0").is_none());
    }

    #[test]
    fn delay_rounded_to_centiseconds() {
        let mut enc = GifEncoder::new(2, 2);
        enc.set_delay_ms(96);
        enc.add_frame(&uniform_rgba(2, 2, [255, 255, 255, 255]))
            .unwrap();
        let bytes = enc.finish();
        let gce = 6 + 7 + 768;
        assert_eq!(&bytes[gce..gce + 3], &[0x21, 0xf9, 0x04]);
        // packed = 0 (pas de transparence, disposal 0), delay = 10 cs.
        assert_eq!(&bytes[gce + 3..gce + 8], &[0, 10, 0, 0, 0]);
    }

    #[test]
    fn first_frame_block_layout() {
        let mut enc = GifEncoder::new(2, 2);
        enc.add_frame(&uniform_rgba(2, 2, [200, 0, 0, 255])).unwrap();
        let bytes = enc.finish();
        // Sans extension de boucle : header(6) + LSD(7) + GCT(768) + GCE(8).
        let gce = 6 + 7 + 768;
        assert_eq!(&bytes[gce..gce + 4], &[0x21, 0xf9, 0x04, 0x00]);
        let desc = gce + 8;
        assert_eq!(&bytes[desc..desc + 9], &[0x2c, 0, 0, 0, 0, 2, 0, 2, 0]);
        assert_eq!(bytes[desc + 9], 0, "la première frame utilise la GCT");
        // Taille de code LZW initiale pour une palette 256 couleurs.
        assert_eq!(bytes[desc + 10], 8);
    }

    #[test]
    fn frame_size_mismatch_rejected() {
        let mut enc = GifEncoder::new(4, 4);
        assert!(matches!(
            enc.add_frame(&[0u8; 7]),
            Err(GcError::Encode { .. })
        ));
    }

    #[test]
    fn transparent_flag_set_only_for_referenced_color() {
        let mut enc = GifEncoder::new(2, 2);
        enc.set_transparent(Some((0, 0, 0)));
        enc.add_frame(&uniform_rgba(2, 2, [0, 0, 0, 255])).unwrap();
        let bytes = enc.finish();
        let gce = 6 + 7 + 768;
        assert_eq!(&bytes[gce..gce + 3], &[0x21, 0xf9, 0x04]);
        // Transparence active (bit 0) avec disposal par défaut 2.
        assert_eq!(bytes[gce + 3], 2 << 2 | 1);
    }
}
