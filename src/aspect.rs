//! Supported aspect ratios for generated and edited images.

use crate::error::{NanoBananaError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AspectRatio {
    Square,
    Portrait9x16,
    Landscape16x9,
    Portrait3x4,
    Landscape4x3,
    Landscape3x2,
    Portrait2x3,
    Landscape5x4,
    Portrait4x5,
    Ultrawide21x9,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 10] = [
        AspectRatio::Square,
        AspectRatio::Portrait9x16,
        AspectRatio::Landscape16x9,
        AspectRatio::Portrait3x4,
        AspectRatio::Landscape4x3,
        AspectRatio::Landscape3x2,
        AspectRatio::Portrait2x3,
        AspectRatio::Landscape5x4,
        AspectRatio::Portrait4x5,
        AspectRatio::Ultrawide21x9,
    ];

    /// The wire form sent as `imageConfig.aspectRatio`.
    pub fn as_str(self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Portrait9x16 => "9:16",
            AspectRatio::Landscape16x9 => "16:9",
            AspectRatio::Portrait3x4 => "3:4",
            AspectRatio::Landscape4x3 => "4:3",
            AspectRatio::Landscape3x2 => "3:2",
            AspectRatio::Portrait2x3 => "2:3",
            AspectRatio::Landscape5x4 => "5:4",
            AspectRatio::Portrait4x5 => "4:5",
            AspectRatio::Ultrawide21x9 => "21:9",
        }
    }
}

impl FromStr for AspectRatio {
    type Err = NanoBananaError;

    // Exact, case-sensitive match; no trimming.
    fn from_str(s: &str) -> Result<Self> {
        AspectRatio::ALL
            .into_iter()
            .find(|ratio| ratio.as_str() == s)
            .ok_or_else(|| NanoBananaError::InvalidAspectRatio(s.to_string()))
    }
}

impl TryFrom<String> for AspectRatio {
    type Error = NanoBananaError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<AspectRatio> for String {
    fn from(ratio: AspectRatio) -> Self {
        ratio.as_str().to_string()
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pick the ratio for a single call: an explicit override wins over the
/// session default, and neither being present is an error.
pub fn effective_aspect_ratio(
    session_id: &str,
    override_ratio: Option<&str>,
    session_default: Option<AspectRatio>,
) -> Result<AspectRatio> {
    match override_ratio.filter(|r| !r.is_empty()) {
        Some(raw) => raw.parse(),
        None => session_default
            .ok_or_else(|| NanoBananaError::MissingAspectRatio(session_id.to_string())),
    }
}
