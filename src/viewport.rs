use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Browser viewport used while the diagrams render.
///
/// Serialized as the `WIDTHxHEIGHT` string accepted on the command line, so
/// config files and flags share one syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ViewportParseError {
    #[error("Invalid viewport format: expected WIDTHxHEIGHT (e.g., 1920x1080)")]
    InvalidFormat,
    #[error("Invalid viewport dimension: {0}")]
    InvalidDimension(String),
    #[error("Viewport dimensions must be positive")]
    Zero,
}

impl FromStr for Viewport {
    type Err = ViewportParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (width, height) = s
            .trim()
            .split_once(['x', 'X'])
            .ok_or(ViewportParseError::InvalidFormat)?;
        let parse = |part: &str| {
            part.trim()
                .parse::<u32>()
                .map_err(|_| ViewportParseError::InvalidDimension(part.to_string()))
        };
        let viewport = Viewport {
            width: parse(width)?,
            height: parse(height)?,
        };
        if viewport.width == 0 || viewport.height == 0 {
            return Err(ViewportParseError::Zero);
        }
        Ok(viewport)
    }
}

impl TryFrom<String> for Viewport {
    type Error = ViewportParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Viewport> for String {
    fn from(value: Viewport) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Viewport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}
