use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single decimal digit shown as the stimulus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Digit(u8);

impl Digit {
    pub const MAX: u8 = 9;

    pub fn new(value: u8) -> Option<Self> {
        (value <= Self::MAX).then_some(Self(value))
    }

    /// Parses the single-character form the participant types.
    pub fn from_char(c: char) -> Option<Self> {
        c.to_digit(10).map(|d| Self(d as u8))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn all() -> impl Iterator<Item = Digit> {
        (0..=Self::MAX).map(Digit)
    }
}

impl TryFrom<u8> for Digit {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Digit::new(value).ok_or_else(|| format!("digit out of range: {value}"))
    }
}

impl From<Digit> for u8 {
    fn from(d: Digit) -> u8 {
        d.0
    }
}

impl fmt::Display for Digit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ink color a digit is rendered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Red,
    Green,
    Blue,
    Yellow,
    Magenta,
    Cyan,
}

impl Color {
    pub fn name(self) -> &'static str {
        match self {
            Color::Red => "red",
            Color::Green => "green",
            Color::Blue => "blue",
            Color::Yellow => "yellow",
            Color::Magenta => "magenta",
            Color::Cyan => "cyan",
        }
    }

    pub fn rgb(self) -> [u8; 3] {
        match self {
            Color::Red => [255, 0, 0],
            Color::Green => [0, 200, 0],
            Color::Blue => [40, 80, 255],
            Color::Yellow => [255, 220, 0],
            Color::Magenta => [255, 0, 255],
            Color::Cyan => [0, 220, 220],
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaletteError {
    #[error("palette must contain at least one color")]
    Empty,
    #[error("palette lists {0} more than once")]
    Duplicate(Color),
}

/// Ordered set of distinct colors stimuli are drawn from. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Color>", into = "Vec<Color>")]
pub struct Palette(Vec<Color>);

impl Palette {
    pub fn new(colors: Vec<Color>) -> Result<Self, PaletteError> {
        if colors.is_empty() {
            return Err(PaletteError::Empty);
        }
        for (i, c) in colors.iter().enumerate() {
            if colors[..i].contains(c) {
                return Err(PaletteError::Duplicate(*c));
            }
        }
        Ok(Self(colors))
    }

    pub fn colors(&self) -> &[Color] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self(vec![Color::Red, Color::Green, Color::Blue])
    }
}

impl TryFrom<Vec<Color>> for Palette {
    type Error = PaletteError;

    fn try_from(colors: Vec<Color>) -> Result<Self, Self::Error> {
        Palette::new(colors)
    }
}

impl From<Palette> for Vec<Color> {
    fn from(p: Palette) -> Self {
        p.0
    }
}

/// One planned stimulus: a digit in a color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Trial {
    pub digit: Digit,
    pub color: Color,
}

impl Trial {
    pub fn new(digit: Digit, color: Color) -> Self {
        Self { digit, color }
    }
}

impl fmt::Display for Trial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.digit, self.color)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digit_bounds() {
        assert_eq!(Digit::new(9).map(Digit::value), Some(9));
        assert!(Digit::new(10).is_none());
        assert_eq!(Digit::all().count(), 10);
        assert_eq!(Digit::from_char('7'), Digit::new(7));
        assert!(Digit::from_char('a').is_none());
    }

    #[test]
    fn palette_rejects_empty_and_duplicates() {
        assert_eq!(Palette::new(vec![]), Err(PaletteError::Empty));
        assert_eq!(
            Palette::new(vec![Color::Red, Color::Blue, Color::Red]),
            Err(PaletteError::Duplicate(Color::Red))
        );
        assert_eq!(Palette::default().len(), 3);
    }

    #[test]
    fn palette_deserializes_through_validation() {
        let p: Palette = serde_json::from_str(r#"["yellow","cyan"]"#).unwrap();
        assert_eq!(p.colors(), &[Color::Yellow, Color::Cyan]);
        assert!(serde_json::from_str::<Palette>("[]").is_err());
    }
}
