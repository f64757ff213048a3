use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

/// Couleur RGB 24 bits.
pub type Rgb = (u8, u8, u8);

/// The 16 VGA/DOS console colors.
pub const ANSI16: [Rgb; 16] = [
    (0x00, 0x00, 0x00),
    (0x80, 0x00, 0x00),
    (0x00, 0x80, 0x00),
    (0x80, 0x80, 0x00),
    (0x00, 0x00, 0x80),
    (0x80, 0x00, 0x80),
    (0x00, 0x80, 0x80),
    (0xc0, 0xc0, 0xc0),
    (0x80, 0x80, 0x80),
    (0xff, 0x00, 0x00),
    (0x00, 0xff, 0x00),
    (0xff, 0xff, 0x00),
    (0x00, 0x00, 0xff),
    (0xff, 0x00, 0xff),
    (0x00, 0xff, 0xff),
    (0xff, 0xff, 0xff),
];

/// The 16 CGA colors.
pub const CGA: [Rgb; 16] = [
    (0x00, 0x00, 0x00),
    (0x00, 0x00, 0xaa),
    (0x00, 0xaa, 0x00),
    (0x00, 0xaa, 0xaa),
    (0xaa, 0x00, 0x00),
    (0xaa, 0x00, 0xaa),
    (0xaa, 0x55, 0x00),
    (0xaa, 0xaa, 0xaa),
    (0x55, 0x55, 0x55),
    (0x55, 0x55, 0xff),
    (0x55, 0xff, 0x55),
    (0x55, 0xff, 0xff),
    (0xff, 0x55, 0x55),
    (0xff, 0x55, 0xff),
    (0xff, 0xff, 0x55),
    (0xff, 0xff, 0xff),
];

/// Les quatre verts de la Game Boy DMG, du plus sombre au plus clair.
pub const GAMEBOY: [Rgb; 4] = [
    (0x0f, 0x38, 0x0f),
    (0x30, 0x62, 0x30),
    (0x8b, 0xac, 0x0f),
    (0x9b, 0xbc, 0x0f),
];

static ANSI256: OnceLock<[Rgb; 256]> = OnceLock::new();

/// The xterm-256 palette: ANSI-16, then the 6×6×6 cube, then 24 grays.
///
/// Computed once per process, immutable afterwards.
///
/// # Example
/// ```
/// use gc_core::palette::ansi256;
/// let pal = ansi256();
/// assert_eq!(pal[16], (0, 0, 0));
/// assert_eq!(pal[231], (255, 255, 255));
/// assert_eq!(pal[232], (8, 8, 8));
/// ```
#[must_use]
pub fn ansi256() -> &'static [Rgb; 256] {
    ANSI256.get_or_init(|| {
        let mut pal = [(0u8, 0u8, 0u8); 256];
        pal[..16].copy_from_slice(&ANSI16);
        // 6×6×6 cube: channel value for step i is 0 if i = 0, else i·40 + 55.
        for i in 0..216usize {
            let level = |c: usize| -> u8 {
                if c == 0 { 0 } else { (c * 40 + 55) as u8 }
            };
            let r = i / 36;
            let g = (i / 6) % 6;
            let b = i % 6;
            pal[16 + i] = (level(r), level(g), level(b));
        }
        // Grays: 8 + i·10 for i in [0, 23].
        for i in 0..24usize {
            let v = (8 + i * 10) as u8;
            pal[232 + i] = (v, v, v);
        }
        pal
    })
}

/// Palette applied when serializing colored markup.
///
/// # Example
/// ```
/// use gc_core::palette::PaletteMode;
/// assert!(PaletteMode::Full.table().is_none());
/// assert_eq!(PaletteMode::Ansi16.table().unwrap().len(), 16);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PaletteMode {
    /// Pass-through 24-bit color, no palette.
    #[default]
    Full,
    /// xterm-256.
    Ansi256,
    /// The 16 VGA/DOS console colors.
    Ansi16,
    /// CGA 16.
    Cga,
    /// Game Boy DMG greens.
    Gameboy,
}

impl PaletteMode {
    /// Fixed table for this mode, or `None` for pass-through.
    #[must_use]
    pub fn table(self) -> Option<&'static [Rgb]> {
        match self {
            Self::Full => None,
            Self::Ansi256 => Some(ansi256()),
            Self::Ansi16 => Some(&ANSI16),
            Self::Cga => Some(&CGA),
            Self::Gameboy => Some(&GAMEBOY),
        }
    }

    /// Parse a palette name as it appears in config files and CLI flags.
    ///
    /// # Errors
    /// Returns `crate::GcError::Config` for unknown names.
    pub fn parse(name: &str) -> Result<Self, crate::GcError> {
        match name {
            "full" => Ok(Self::Full),
            "ansi256" => Ok(Self::Ansi256),
            "ansi16" => Ok(Self::Ansi16),
            "cga" => Ok(Self::Cga),
            "gameboy" => Ok(Self::Gameboy),
            other => Err(crate::GcError::Config(format!("palette inconnue : {other}"))),
        }
    }
}

/// Nearest palette entry in RGB Euclidean space.
///
/// Ties resolve to the earliest index in the palette.
///
/// # Example
/// ```
/// use gc_core::palette::{ANSI16, nearest_in_palette};
/// assert_eq!(nearest_in_palette(250, 10, 10, &ANSI16), (255, 0, 0));
/// ```
#[must_use]
pub fn nearest_in_palette(r: u8, g: u8, b: u8, palette: &[Rgb]) -> Rgb {
    debug_assert!(!palette.is_empty(), "palette must not be empty");
    let mut best = palette[0];
    let mut best_d = u32::MAX;
    for &(pr, pg, pb) in palette {
        let dr = i32::from(r) - i32::from(pr);
        let dg = i32::from(g) - i32::from(pg);
        let db = i32::from(b) - i32::from(pb);
        let d = (dr * dr + dg * dg + db * db) as u32;
        if d < best_d {
            best_d = d;
            best = (pr, pg, pb);
        }
    }
    best
}
