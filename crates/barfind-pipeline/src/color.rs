//! Border color: an RGB triple written as `"r:g:b"`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::DetectionError;

/// Color of the drawn bounding box.
///
/// Serialized as its `"r:g:b"` string form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BorderColor {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
}

impl BorderColor {
    /// Create a color from its channels.
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// The channels as an `image` pixel.
    #[must_use]
    pub const fn to_rgb(self) -> image::Rgb<u8> {
        image::Rgb([self.r, self.g, self.b])
    }
}

impl Default for BorderColor {
    fn default() -> Self {
        crate::DetectionConfig::DEFAULT_BORDER_COLOR
    }
}

impl fmt::Display for BorderColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.r, self.g, self.b)
    }
}

impl FromStr for BorderColor {
    type Err = DetectionError;

    /// Parse `"r:g:b"`.
    ///
    /// Exactly three colon-separated tokens are required, each an integer
    /// in `0..=255` (surrounding whitespace is ignored).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tokens: Vec<&str> = s.split(':').collect();
        let [r, g, b] = tokens.as_slice() else {
            return Err(DetectionError::InvalidConfig(format!(
                "expected border color format 'r:g:b', got '{s}' ({} tokens)",
                tokens.len()
            )));
        };
        let channel = |token: &str| {
            token.trim().parse::<u8>().map_err(|e| {
                DetectionError::InvalidConfig(format!(
                    "border color channel '{token}' is not a number in 0..=255: {e}"
                ))
            })
        };
        Ok(Self::new(channel(*r)?, channel(*g)?, channel(*b)?))
    }
}

impl TryFrom<String> for BorderColor {
    type Error = DetectionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BorderColor> for String {
    fn from(color: BorderColor) -> Self {
        color.to_string()
    }
}
