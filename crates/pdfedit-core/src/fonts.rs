//! Standard-14 font resolution and Helvetica metrics.
//!
//! Text committed into a document always maps onto one of twelve standard
//! font keys (Helvetica/Times/Courier with bold/italic variants) for maximum
//! viewer compatibility. Times uses `Italic` names where the other families
//! use `Oblique`.

/// One of the twelve standard font variants the commit engine can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StandardFont {
    Helvetica,
    HelveticaBold,
    HelveticaOblique,
    HelveticaBoldOblique,
    TimesRoman,
    TimesBold,
    TimesItalic,
    TimesBoldItalic,
    Courier,
    CourierBold,
    CourierOblique,
    CourierBoldOblique,
}

impl StandardFont {
    /// Resolve a CSS-ish family name plus bold/italic flags. Families that
    /// mention neither Times nor Courier fall back to Helvetica, matching
    /// how user-entered families behave everywhere else in the editor.
    pub fn resolve(family: &str, bold: bool, italic: bool) -> StandardFont {
        if family.contains("Times") {
            match (bold, italic) {
                (true, true) => StandardFont::TimesBoldItalic,
                (true, false) => StandardFont::TimesBold,
                (false, true) => StandardFont::TimesItalic,
                (false, false) => StandardFont::TimesRoman,
            }
        } else if family.contains("Courier") {
            match (bold, italic) {
                (true, true) => StandardFont::CourierBoldOblique,
                (true, false) => StandardFont::CourierBold,
                (false, true) => StandardFont::CourierOblique,
                (false, false) => StandardFont::Courier,
            }
        } else {
            match (bold, italic) {
                (true, true) => StandardFont::HelveticaBoldOblique,
                (true, false) => StandardFont::HelveticaBold,
                (false, true) => StandardFont::HelveticaOblique,
                (false, false) => StandardFont::Helvetica,
            }
        }
    }

    /// The PostScript BaseFont name written into the font resource.
    pub fn base_font(self) -> &'static str {
        match self {
            StandardFont::Helvetica => "Helvetica",
            StandardFont::HelveticaBold => "Helvetica-Bold",
            StandardFont::HelveticaOblique => "Helvetica-Oblique",
            StandardFont::HelveticaBoldOblique => "Helvetica-BoldOblique",
            StandardFont::TimesRoman => "Times-Roman",
            StandardFont::TimesBold => "Times-Bold",
            StandardFont::TimesItalic => "Times-Italic",
            StandardFont::TimesBoldItalic => "Times-BoldItalic",
            StandardFont::Courier => "Courier",
            StandardFont::CourierBold => "Courier-Bold",
            StandardFont::CourierOblique => "Courier-Oblique",
            StandardFont::CourierBoldOblique => "Courier-BoldOblique",
        }
    }

    /// Resource key used inside page font dictionaries, e.g. `/FHvB`.
    pub fn resource_key(self) -> &'static str {
        match self {
            StandardFont::Helvetica => "FHv",
            StandardFont::HelveticaBold => "FHvB",
            StandardFont::HelveticaOblique => "FHvO",
            StandardFont::HelveticaBoldOblique => "FHvBO",
            StandardFont::TimesRoman => "FTm",
            StandardFont::TimesBold => "FTmB",
            StandardFont::TimesItalic => "FTmI",
            StandardFont::TimesBoldItalic => "FTmBI",
            StandardFont::Courier => "FCr",
            StandardFont::CourierBold => "FCrB",
            StandardFont::CourierOblique => "FCrO",
            StandardFont::CourierBoldOblique => "FCrBO",
        }
    }
}

// Helvetica AFM advance widths for ASCII 32..=126, in 1/1000 em units.
// Used to center watermark text without embedding font programs.
#[rustfmt::skip]
const HELVETICA_WIDTHS: [u32; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333,
    278, 278, 556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278,
    584, 584, 584, 556, 1015, 667, 667, 722, 722, 667, 611, 778, 722, 278,
    500, 667, 556, 833, 722, 778, 667, 778, 722, 667, 611, 722, 667, 944,
    667, 667, 611, 278, 278, 278, 469, 556, 333, 556, 556, 500, 556, 556,
    278, 556, 556, 222, 222, 500, 222, 833, 556, 556, 556, 556, 333, 500,
    278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

const HELVETICA_ASCENT: f64 = 718.0;
const HELVETICA_DESCENT: f64 = -207.0;

/// Width of `text` set in Helvetica at `size`, in points. Characters outside
/// the ASCII table use the average lowercase advance.
pub fn helvetica_text_width(text: &str, size: f64) -> f64 {
    let units: u32 = text
        .chars()
        .map(|c| {
            let code = c as u32;
            if (32..=126).contains(&code) {
                HELVETICA_WIDTHS[(code - 32) as usize]
            } else {
                556
            }
        })
        .sum();
    units as f64 / 1000.0 * size
}

/// Approximate line height of Helvetica at `size` (ascent minus descent).
pub fn helvetica_text_height(size: f64) -> f64 {
    (HELVETICA_ASCENT - HELVETICA_DESCENT) / 1000.0 * size
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_defaults_to_helvetica() {
        assert_eq!(
            StandardFont::resolve("Comic Sans MS", false, false),
            StandardFont::Helvetica
        );
        assert_eq!(StandardFont::resolve("", true, false), StandardFont::HelveticaBold);
    }

    #[test]
    fn resolve_times_uses_italic_names() {
        assert_eq!(
            StandardFont::resolve("Times New Roman", false, true).base_font(),
            "Times-Italic"
        );
        assert_eq!(
            StandardFont::resolve("Times New Roman", true, true).base_font(),
            "Times-BoldItalic"
        );
    }

    #[test]
    fn resolve_courier_variants() {
        assert_eq!(
            StandardFont::resolve("Courier New", true, true).base_font(),
            "Courier-BoldOblique"
        );
        assert_eq!(
            StandardFont::resolve("Courier New", false, true).base_font(),
            "Courier-Oblique"
        );
    }

    #[test]
    fn all_twelve_keys_are_distinct() {
        let mut names: Vec<&str> = [
            ("Helvetica", false, false),
            ("Helvetica", true, false),
            ("Helvetica", false, true),
            ("Helvetica", true, true),
            ("Times", false, false),
            ("Times", true, false),
            ("Times", false, true),
            ("Times", true, true),
            ("Courier", false, false),
            ("Courier", true, false),
            ("Courier", false, true),
            ("Courier", true, true),
        ]
        .iter()
        .map(|&(f, b, i)| StandardFont::resolve(f, b, i).base_font())
        .collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 12);
    }

    #[test]
    fn width_of_known_string() {
        // "Hi" = H (722) + i (222) = 944 units.
        let w = helvetica_text_width("Hi", 10.0);
        assert!((w - 9.44).abs() < 1e-9, "width was {}", w);
    }

    #[test]
    fn width_scales_linearly() {
        let w1 = helvetica_text_width("watermark", 12.0);
        let w2 = helvetica_text_width("watermark", 24.0);
        assert!((w2 - 2.0 * w1).abs() < 1e-9);
    }

    #[test]
    fn height_covers_ascent_and_descent() {
        let h = helvetica_text_height(48.0);
        assert!((h - 44.4).abs() < 1e-9, "height was {}", h);
    }
}
