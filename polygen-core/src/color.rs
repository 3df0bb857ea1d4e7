use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::warn;

use crate::error::CoreError;

/// An opaque 8-bit sRGB colour.
///
/// This is the only colour representation used inside the engine. Hex
/// strings exist at the serialization boundary only, so repeated edits
/// never accumulate conversion drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Self = Self::new(0, 0, 0);
    pub const WHITE: Self = Self::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rrggbb` (the leading `#` is optional, digits are case-insensitive).
    pub fn from_hex(hex: &str) -> crate::Result<Self> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(CoreError::InvalidColor(hex.to_string()));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|_| CoreError::InvalidColor(hex.to_string()))
        };
        Ok(Self::new(channel(0)?, channel(2)?, channel(4)?))
    }

    /// Parse a hex colour, substituting black for malformed input.
    pub fn from_hex_or_black(hex: &str) -> Self {
        Self::from_hex(hex).unwrap_or_else(|e| {
            warn!("{e}; using black");
            Self::BLACK
        })
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    #[inline]
    pub fn to_rgba(self, alpha: u8) -> [u8; 4] {
        [self.r, self.g, self.b, alpha]
    }

    /// Channel-wise linear blend, `t = 0` gives `self`, `t = 1` gives `other`.
    #[inline]
    pub fn lerp(self, other: Self, t: f64) -> Self {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        Self::new(
            lerp_channel(self.r, other.r, t),
            lerp_channel(self.g, other.g, t),
            lerp_channel(self.b, other.b, t),
        )
    }

    /// Hue (degrees), saturation and lightness (both 0–1).
    pub fn to_hsl(self) -> (f64, f64, f64) {
        let r = self.r as f64 / 255.0;
        let g = self.g as f64 / 255.0;
        let b = self.b as f64 / 255.0;
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let l = (max + min) / 2.0;
        let d = max - min;
        if d == 0.0 {
            return (0.0, 0.0, l);
        }
        let s = if l > 0.5 { d / (2.0 - max - min) } else { d / (max + min) };
        let h = if max == r {
            ((g - b) / d).rem_euclid(6.0)
        } else if max == g {
            (b - r) / d + 2.0
        } else {
            (r - g) / d + 4.0
        };
        (h * 60.0, s, l)
    }

    pub fn from_hsl(h: f64, s: f64, l: f64) -> Self {
        let h = h.rem_euclid(360.0);
        let s = s.clamp(0.0, 1.0);
        let l = l.clamp(0.0, 1.0);
        let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
        let x = c * (1.0 - ((h / 60.0).rem_euclid(2.0) - 1.0).abs());
        let m = l - c / 2.0;
        let (r, g, b) = match (h / 60.0) as u32 {
            0 => (c, x, 0.0),
            1 => (x, c, 0.0),
            2 => (0.0, c, x),
            3 => (0.0, x, c),
            4 => (x, 0.0, c),
            _ => (c, 0.0, x),
        };
        let to_u8 = |v: f64| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
        Self::new(to_u8(r), to_u8(g), to_u8(b))
    }
}

#[inline]
fn lerp_channel(a: u8, b: u8, t: f64) -> u8 {
    (a as f64 + (b as f64 - a as f64) * t).round() as u8
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for Rgb {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

/// Malformed strings deserialize to black rather than failing the whole
/// parameter struct.
impl<'de> Deserialize<'de> for Rgb {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from_hex_or_black(&raw))
    }
}

// ---------------------------------------------------------------------------
// Colour stops
// ---------------------------------------------------------------------------

/// One stop of a palette: a colour pinned at `position` (0–100) with an
/// opacity `alpha` (0–1).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorStop {
    pub color: Rgb,
    pub position: f64,
    #[serde(default = "default_alpha")]
    pub alpha: f64,
}

fn default_alpha() -> f64 {
    1.0
}

impl ColorStop {
    pub fn new(color: Rgb, position: f64) -> Self {
        Self {
            color,
            position,
            alpha: 1.0,
        }
    }

    pub fn with_alpha(self, alpha: f64) -> Self {
        Self { alpha, ..self }
    }

    /// Clamp position to 0–100 and alpha to 0–1, replacing NaN with the
    /// nearest sensible value.
    pub fn sanitized(self) -> Self {
        Self {
            color: self.color,
            position: finite_or(self.position, 0.0).clamp(0.0, 100.0),
            alpha: finite_or(self.alpha, 1.0).clamp(0.0, 1.0),
        }
    }
}

pub(crate) fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

/// Map `ratio` (0–1) through `stops` to a colour.
///
/// The stops are sorted by position first; storage order is not trusted.
/// Ratios outside 0–1 (and NaN) are clamped, positions before the first or
/// after the last stop take that boundary stop's colour. An empty palette
/// yields black.
pub fn interpolate(stops: &[ColorStop], ratio: f64) -> Rgb {
    Palette::new(stops).sample(ratio)
}

/// Like [`interpolate`] but also blends the stop alphas into the fourth byte.
pub fn interpolate_rgba(stops: &[ColorStop], ratio: f64) -> [u8; 4] {
    Palette::new(stops).sample_rgba(ratio)
}

// ---------------------------------------------------------------------------
// Palette
// ---------------------------------------------------------------------------

/// A palette with its stops sorted and sanitized once, for repeated lookups.
#[derive(Debug, Clone, PartialEq)]
pub struct Palette {
    stops: Vec<ColorStop>,
}

impl Palette {
    pub fn new(stops: &[ColorStop]) -> Self {
        let mut stops: Vec<ColorStop> = stops.iter().map(|s| s.sanitized()).collect();
        stops.sort_by(|a, b| a.position.total_cmp(&b.position));
        Self { stops }
    }

    /// The black-to-white palette used as a fallback default.
    pub fn grayscale() -> Self {
        Self::new(&[
            ColorStop::new(Rgb::BLACK, 0.0),
            ColorStop::new(Rgb::WHITE, 100.0),
        ])
    }

    pub fn stops(&self) -> &[ColorStop] {
        &self.stops
    }

    pub fn sample(&self, ratio: f64) -> Rgb {
        match self.bracket(ratio) {
            Bracket::Empty => Rgb::BLACK,
            Bracket::Exact(s) => s.color,
            Bracket::Between(a, b, t) => a.color.lerp(b.color, t),
        }
    }

    pub fn sample_rgba(&self, ratio: f64) -> [u8; 4] {
        match self.bracket(ratio) {
            Bracket::Empty => [0, 0, 0, 255],
            Bracket::Exact(s) => s.color.to_rgba(alpha_byte(s.alpha)),
            Bracket::Between(a, b, t) => {
                let alpha = a.alpha + (b.alpha - a.alpha) * t;
                a.color.lerp(b.color, t).to_rgba(alpha_byte(alpha))
            }
        }
    }

    /// Precompute `steps + 1` colours for ratios `i / steps`.
    ///
    /// Entry `i` is bit-identical to `sample(i as f64 / steps as f64)`, so
    /// integer-ratio callers (escape-time iteration counts) can index
    /// instead of searching.
    pub fn lut(&self, steps: u32) -> Vec<Rgb> {
        let steps = steps.max(1);
        (0..=steps)
            .map(|i| self.sample(i as f64 / steps as f64))
            .collect()
    }

    fn bracket(&self, ratio: f64) -> Bracket<'_> {
        let (first, last) = match (self.stops.first(), self.stops.last()) {
            (Some(f), Some(l)) => (f, l),
            _ => return Bracket::Empty,
        };
        let pos = finite_or(ratio, 0.0).clamp(0.0, 1.0) * 100.0;
        if pos <= first.position {
            return Bracket::Exact(first);
        }
        if pos >= last.position {
            return Bracket::Exact(last);
        }
        for pair in self.stops.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            if pos >= a.position && pos <= b.position {
                let range = b.position - a.position;
                if range <= 0.0 {
                    return Bracket::Exact(a);
                }
                return Bracket::Between(a, b, (pos - a.position) / range);
            }
        }
        Bracket::Exact(last)
    }
}

enum Bracket<'a> {
    Empty,
    Exact(&'a ColorStop),
    Between(&'a ColorStop, &'a ColorStop, f64),
}

#[inline]
fn alpha_byte(alpha: f64) -> u8 {
    (alpha.clamp(0.0, 1.0) * 255.0).round() as u8
}
