//! Watermark overlay generation
//!
//! Builds the content stream for a translucent, rotated text layer sized to a
//! specific page. The overlay is pure data (operators plus the geometry it was
//! generated for); turning it into a Form XObject and attaching it to a page
//! is the compositor's job (see `stamp`).

use crate::error::{Error, Result};

/// Width and height of a single page, in points (72 per inch)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
}

impl PageGeometry {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// A zero or negative extent means the page cannot carry an overlay
    pub fn is_valid(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }

    fn diagonal(&self) -> f32 {
        (self.width * self.width + self.height * self.height).sqrt()
    }
}

/// Where watermark stamps are placed on the page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Placement {
    /// A single stamp centered on the page midpoint
    #[default]
    Centered,
    /// The stamp repeated on a grid covering the whole page
    Tiled,
}

/// Fixed watermark parameters for a run
///
/// Set once before processing begins; the same spec is applied to every page
/// of every file. Appearance defaults match the tool's stock watermark:
/// Helvetica-Bold 32pt, 40% gray, 25% opacity, rotated 45 degrees
/// counter-clockwise, one stamp centered on the page.
#[derive(Debug, Clone)]
pub struct OverlaySpec {
    /// Watermark text
    pub text: String,
    /// Font size in points (upper bound when `fit_to_page` is on)
    pub font_size: f32,
    /// Fill color as RGB components in [0,1]
    pub fill_color: (f32, f32, f32),
    /// Fill opacity in [0,1]
    pub opacity: f32,
    /// Rotation in degrees, counter-clockwise about the stamp anchor
    pub rotation_degrees: f32,
    /// Stamp placement policy
    pub placement: Placement,
    /// Shrink the font so the text never exceeds 80% of the page diagonal
    pub fit_to_page: bool,
}

impl OverlaySpec {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            font_size: 32.0,
            fill_color: (0.4, 0.4, 0.4),
            opacity: 0.25,
            rotation_degrees: 45.0,
            placement: Placement::Centered,
            fit_to_page: true,
        }
    }

    /// Validate the spec before any file is processed
    ///
    /// A spec that fails here would fail identically on every page of every
    /// file, so rejection happens up front rather than mid-batch.
    pub fn validate(&self) -> Result<()> {
        if self.text.trim().is_empty() {
            return Err(Error::InvalidSpec(
                "watermark text must not be empty".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.opacity) {
            return Err(Error::InvalidSpec(format!(
                "opacity must be within [0, 1], got {}",
                self.opacity
            )));
        }
        if self.font_size <= 0.0 {
            return Err(Error::InvalidSpec(format!(
                "font size must be positive, got {}",
                self.font_size
            )));
        }
        let (r, g, b) = self.fill_color;
        for component in [r, g, b] {
            if !(0.0..=1.0).contains(&component) {
                return Err(Error::InvalidSpec(format!(
                    "fill color components must be within [0, 1], got {:?}",
                    self.fill_color
                )));
            }
        }
        // Surface unrenderable text before the batch starts
        encode_winansi(&self.text)?;
        Ok(())
    }
}

/// A rendered overlay layer for one specific page size
///
/// `content` holds the PDF content-stream operators; `geometry` is the page
/// box the operators were laid out for. The two always travel together so the
/// compositor can set the Form XObject's BBox to match the target page.
#[derive(Debug, Clone)]
pub struct OverlayGraphic {
    pub geometry: PageGeometry,
    pub content: String,
    pub opacity: f32,
}

/// Resource names the overlay operators refer to. The compositor must install
/// the font and graphics state under these names in the XObject's Resources.
pub const FONT_RESOURCE: &str = "F1";
pub const GSTATE_RESOURCE: &str = "GSwm";

/// Generate the overlay layer for one page
///
/// Pure function of its inputs, no file I/O. The caller guarantees that
/// `geometry` is valid (positive extents) and that `spec` passed
/// `validate()`; text that cannot be encoded still surfaces as an error here
/// so the compositor never emits a malformed string literal.
pub fn generate_overlay(spec: &OverlaySpec, geometry: PageGeometry) -> Result<OverlayGraphic> {
    debug_assert!(geometry.is_valid());

    let encoded = encode_winansi(&spec.text)?;
    let font_size = effective_font_size(spec, geometry);
    let width = text_width(&encoded, font_size);
    let literal = escape_literal(&encoded);

    let theta = spec.rotation_degrees.to_radians();
    let (sin, cos) = theta.sin_cos();

    let (r, g, b) = spec.fill_color;
    let mut content = String::new();
    content.push_str(&format!("/{} gs\n", GSTATE_RESOURCE));
    content.push_str(&format!("{} {} {} rg\n", r, g, b));

    for (x, y) in stamp_anchors(spec.placement, geometry, width, font_size) {
        content.push_str("BT\n");
        content.push_str(&format!("/{} {} Tf\n", FONT_RESOURCE, font_size));
        // Rotate about the anchor, then step back half the text width along
        // the rotated baseline so the string is centered on the anchor
        content.push_str(&format!("{} {} {} {} {} {} Tm\n", cos, sin, -sin, cos, x, y));
        content.push_str(&format!("{} 0 Td\n", -width / 2.0));
        content.push_str(&format!("({}) Tj\n", literal));
        content.push_str("ET\n");
    }

    Ok(OverlayGraphic {
        geometry,
        content,
        opacity: spec.opacity,
    })
}

/// Anchor points the stamp is drawn at, in page space
fn stamp_anchors(
    placement: Placement,
    geometry: PageGeometry,
    text_width: f32,
    font_size: f32,
) -> Vec<(f32, f32)> {
    match placement {
        Placement::Centered => vec![(geometry.width / 2.0, geometry.height / 2.0)],
        Placement::Tiled => {
            let step_x = (text_width + 2.0 * font_size).max(72.0);
            let step_y = (4.0 * font_size).max(72.0);
            let mut anchors = Vec::new();
            let mut y = step_y / 2.0;
            while y < geometry.height {
                let mut x = step_x / 2.0;
                while x < geometry.width {
                    anchors.push((x, y));
                    x += step_x;
                }
                y += step_y;
            }
            // A page smaller than one grid cell still gets a stamp
            if anchors.is_empty() {
                anchors.push((geometry.width / 2.0, geometry.height / 2.0));
            }
            anchors
        }
    }
}

/// Font size after the optional fit-to-page reduction
pub(crate) fn effective_font_size(spec: &OverlaySpec, geometry: PageGeometry) -> f32 {
    if !spec.fit_to_page {
        return spec.font_size;
    }
    let encoded = match encode_winansi(&spec.text) {
        Ok(bytes) => bytes,
        Err(_) => return spec.font_size,
    };
    let max_width = 0.8 * geometry.diagonal();
    let width = text_width(&encoded, spec.font_size);
    if width > max_width {
        spec.font_size * max_width / width
    } else {
        spec.font_size
    }
}

/// Encode text as WinAnsi (CP-1252) bytes for the standard Helvetica-Bold font
///
/// WinAnsi is Latin-1 plus typographic characters remapped into the
/// 0x80-0x9F control range (euro sign, dashes, curly quotes, ellipsis).
pub(crate) fn encode_winansi(text: &str) -> Result<Vec<u8>> {
    let mut bytes = Vec::with_capacity(text.len());
    for ch in text.chars() {
        let code = ch as u32;
        match code {
            0x20..=0x7E | 0xA0..=0xFF => bytes.push(code as u8),
            _ => match winansi_extra(ch) {
                Some(byte) => bytes.push(byte),
                None => {
                    return Err(Error::Encoding(format!(
                        "character {ch:?} has no WinAnsi representation"
                    )))
                }
            },
        }
    }
    Ok(bytes)
}

/// CP-1252 codes for the characters WinAnsi places at 0x80-0x9F
fn winansi_extra(ch: char) -> Option<u8> {
    let byte = match ch {
        '\u{20AC}' => 0x80, // euro sign
        '\u{201A}' => 0x82, // single low quote
        '\u{0192}' => 0x83, // f with hook
        '\u{201E}' => 0x84, // double low quote
        '\u{2026}' => 0x85, // ellipsis
        '\u{2020}' => 0x86, // dagger
        '\u{2021}' => 0x87, // double dagger
        '\u{02C6}' => 0x88, // circumflex
        '\u{2030}' => 0x89, // per mille
        '\u{0160}' => 0x8A, // S caron
        '\u{2039}' => 0x8B, // single left angle quote
        '\u{0152}' => 0x8C, // OE
        '\u{017D}' => 0x8E, // Z caron
        '\u{2018}' => 0x91, // left single quote
        '\u{2019}' => 0x92, // right single quote
        '\u{201C}' => 0x93, // left double quote
        '\u{201D}' => 0x94, // right double quote
        '\u{2022}' => 0x95, // bullet
        '\u{2013}' => 0x96, // en dash
        '\u{2014}' => 0x97, // em dash
        '\u{02DC}' => 0x98, // tilde
        '\u{2122}' => 0x99, // trademark
        '\u{0161}' => 0x9A, // s caron
        '\u{203A}' => 0x9B, // single right angle quote
        '\u{0153}' => 0x9C, // oe
        '\u{017E}' => 0x9E, // z caron
        '\u{0178}' => 0x9F, // Y dieresis
        _ => return None,
    };
    Some(byte)
}

/// Escape encoded bytes for a PDF literal string
pub(crate) fn escape_literal(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        match b {
            b'\\' => out.push_str("\\\\"),
            b'(' => out.push_str("\\("),
            b')' => out.push_str("\\)"),
            0x20..=0x7E => out.push(b as char),
            _ => out.push_str(&format!("\\{:03o}", b)),
        }
    }
    out
}

/// Measure encoded text in points at the given font size
///
/// Widths come from the Helvetica-Bold AFM metrics (1/1000ths of the em
/// square). Latin-1 bytes outside the tabulated ASCII range use the average
/// lowercase width, close enough for centering accented text.
pub(crate) fn text_width(encoded: &[u8], font_size: f32) -> f32 {
    let total: u32 = encoded
        .iter()
        .map(|&b| match b {
            0x20..=0x7E => HELVETICA_BOLD_WIDTHS[(b - 0x20) as usize],
            _ => 556,
        })
        .sum();
    total as f32 / 1000.0 * font_size
}

/// Helvetica-Bold glyph widths for characters 32-126, in 1/1000ths of the em
const HELVETICA_BOLD_WIDTHS: [u32; 95] = [
    278, // 32 space
    333, // 33 !
    474, // 34 "
    556, // 35 #
    556, // 36 $
    889, // 37 %
    722, // 38 &
    238, // 39 '
    333, // 40 (
    333, // 41 )
    389, // 42 *
    584, // 43 +
    278, // 44 ,
    333, // 45 -
    278, // 46 .
    278, // 47 /
    556, // 48 0
    556, // 49 1
    556, // 50 2
    556, // 51 3
    556, // 52 4
    556, // 53 5
    556, // 54 6
    556, // 55 7
    556, // 56 8
    556, // 57 9
    333, // 58 :
    333, // 59 ;
    584, // 60 <
    584, // 61 =
    584, // 62 >
    611, // 63 ?
    975, // 64 @
    722, // 65 A
    722, // 66 B
    722, // 67 C
    722, // 68 D
    667, // 69 E
    611, // 70 F
    778, // 71 G
    722, // 72 H
    278, // 73 I
    556, // 74 J
    722, // 75 K
    611, // 76 L
    833, // 77 M
    722, // 78 N
    778, // 79 O
    667, // 80 P
    778, // 81 Q
    722, // 82 R
    667, // 83 S
    611, // 84 T
    722, // 85 U
    667, // 86 V
    944, // 87 W
    667, // 88 X
    667, // 89 Y
    611, // 90 Z
    333, // 91 [
    278, // 92 \
    333, // 93 ]
    584, // 94 ^
    556, // 95 _
    333, // 96 `
    556, // 97 a
    611, // 98 b
    556, // 99 c
    611, // 100 d
    556, // 101 e
    333, // 102 f
    611, // 103 g
    611, // 104 h
    278, // 105 i
    278, // 106 j
    556, // 107 k
    278, // 108 l
    889, // 109 m
    611, // 110 n
    611, // 111 o
    611, // 112 p
    611, // 113 q
    389, // 114 r
    556, // 115 s
    333, // 116 t
    611, // 117 u
    556, // 118 v
    778, // 119 w
    556, // 120 x
    556, // 121 y
    500, // 122 z
    389, // 123 {
    280, // 124 |
    389, // 125 }
    584, // 126 ~
];

#[cfg(test)]
mod tests {
    use super::*;

    const LETTER: PageGeometry = PageGeometry {
        width: 612.0,
        height: 792.0,
    };

    #[test]
    fn test_validate_rejects_empty_text() {
        let spec = OverlaySpec::new("   ");
        assert!(matches!(spec.validate(), Err(Error::InvalidSpec(_))));
    }

    #[test]
    fn test_validate_rejects_out_of_range_opacity() {
        let mut spec = OverlaySpec::new("DRAFT");
        spec.opacity = 1.5;
        assert!(matches!(spec.validate(), Err(Error::InvalidSpec(_))));
        spec.opacity = -0.1;
        assert!(matches!(spec.validate(), Err(Error::InvalidSpec(_))));
    }

    #[test]
    fn test_validate_rejects_non_positive_font_size() {
        let mut spec = OverlaySpec::new("DRAFT");
        spec.font_size = 0.0;
        assert!(matches!(spec.validate(), Err(Error::InvalidSpec(_))));
    }

    #[test]
    fn test_validate_rejects_unencodable_text() {
        let spec = OverlaySpec::new("混合");
        assert!(matches!(spec.validate(), Err(Error::Encoding(_))));
    }

    #[test]
    fn test_validate_accepts_defaults() {
        assert!(OverlaySpec::new("CONFIDENTIEL").validate().is_ok());
    }

    #[test]
    fn test_text_width_single_char() {
        // 'A' is 722/1000 em in Helvetica-Bold
        let width = text_width(b"A", 32.0);
        assert!((width - 0.722 * 32.0).abs() < 1e-4);
    }

    #[test]
    fn test_encode_latin1_as_octal_escape() {
        let encoded = encode_winansi("été").unwrap();
        assert_eq!(encoded, vec![0xE9, b't', 0xE9]);
        assert_eq!(escape_literal(&encoded), "\\351t\\351");
    }

    #[test]
    fn test_encode_winansi_typographic_range() {
        // Characters WinAnsi remaps into 0x80-0x9F
        assert_eq!(encode_winansi("\u{20AC}1").unwrap(), vec![0x80, b'1']);
        assert_eq!(
            encode_winansi("a\u{2014}b\u{201C}c\u{201D}").unwrap(),
            vec![b'a', 0x97, b'b', 0x93, b'c', 0x94]
        );
    }

    #[test]
    fn test_escape_parens_and_backslash() {
        assert_eq!(escape_literal(b"(a)\\b"), "\\(a\\)\\\\b");
    }

    #[test]
    fn test_overlay_carries_page_geometry_and_opacity() {
        let spec = OverlaySpec::new("DRAFT");
        let overlay = generate_overlay(&spec, LETTER).unwrap();
        assert_eq!(overlay.geometry, LETTER);
        assert_eq!(overlay.opacity, 0.25);
    }

    #[test]
    fn test_centered_overlay_content() {
        let mut spec = OverlaySpec::new("DRAFT");
        spec.rotation_degrees = 0.0;
        let overlay = generate_overlay(&spec, LETTER).unwrap();

        assert!(overlay.content.contains("/GSwm gs"));
        assert!(overlay.content.contains("0.4 0.4 0.4 rg"));
        assert!(overlay.content.contains("/F1 32 Tf"));
        // Unrotated stamp anchored at the page midpoint
        assert!(overlay.content.contains("306 396 Tm"));
        assert!(overlay.content.contains("(DRAFT) Tj"));
        // Exactly one stamp
        assert_eq!(overlay.content.matches("Tj").count(), 1);
    }

    #[test]
    fn test_tiled_overlay_repeats_stamp() {
        let mut spec = OverlaySpec::new("DRAFT");
        spec.placement = Placement::Tiled;
        let overlay = generate_overlay(&spec, LETTER).unwrap();
        assert!(overlay.content.matches("Tj").count() > 1);
    }

    #[test]
    fn test_tiled_overlay_on_tiny_page_still_stamps() {
        // Page smaller than one grid cell: fall back to a centered stamp
        let tiny = PageGeometry::new(30.0, 30.0);
        let anchors = stamp_anchors(Placement::Tiled, tiny, 100.0, 32.0);
        assert_eq!(anchors, vec![(15.0, 15.0)]);

        let mut spec = OverlaySpec::new("DRAFT");
        spec.placement = Placement::Tiled;
        let overlay = generate_overlay(&spec, tiny).unwrap();
        assert_eq!(overlay.content.matches("Tj").count(), 1);
    }

    #[test]
    fn test_fit_to_page_shrinks_long_text() {
        let spec = OverlaySpec::new(
            "A very long confidentiality notice that cannot fit on a small page at full size",
        );
        let small = PageGeometry::new(200.0, 200.0);
        let size = effective_font_size(&spec, small);
        assert!(size < spec.font_size);
        // Shrunk exactly to the 80%-of-diagonal bound
        let encoded = encode_winansi(&spec.text).unwrap();
        let width = text_width(&encoded, size);
        assert!((width - 0.8 * small.diagonal()).abs() < 0.1);
    }

    #[test]
    fn test_fit_to_page_keeps_short_text_at_configured_size() {
        let spec = OverlaySpec::new("DRAFT");
        assert_eq!(effective_font_size(&spec, LETTER), 32.0);
    }

    #[test]
    fn test_fit_to_page_disabled() {
        let mut spec = OverlaySpec::new(
            "A very long confidentiality notice that cannot fit on a small page at full size",
        );
        spec.fit_to_page = false;
        let small = PageGeometry::new(200.0, 200.0);
        assert_eq!(effective_font_size(&spec, small), 32.0);
    }
}
