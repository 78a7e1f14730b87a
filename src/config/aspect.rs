//! Aspect ratio parsing

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{LetterboxError, Result};

/// Normalized height/width factor of the output canvas.
///
/// Always in `(0, 1]`: parsing divides the smaller component by the larger,
/// so `"16:9"` and `"9:16"` produce the same ratio. Orientation of the input
/// string is intentionally discarded; the canvas is always padded vertically.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
pub struct AspectRatio(f64);

impl AspectRatio {
    /// Parse an `"A:B"` string into a normalized ratio
    pub fn parse(input: &str) -> Result<Self> {
        let mut parts = input.split(':');
        let (first, second) = match (parts.next(), parts.next(), parts.next()) {
            (Some(a), Some(b), None) => (a, b),
            _ => {
                return Err(LetterboxError::invalid_aspect(
                    input,
                    "expected exactly two components separated by ':'",
                ))
            }
        };

        let mut x = parse_component(input, first)?;
        let mut y = parse_component(input, second)?;

        if y > x {
            std::mem::swap(&mut x, &mut y);
        }

        Ok(Self(y / x))
    }

    /// The normalized factor
    pub fn value(self) -> f64 {
        self.0
    }

    /// Canvas height for a given width: `floor(width * ratio)`
    pub fn canvas_height(self, width: u32) -> u32 {
        (f64::from(width) * self.0).floor() as u32
    }
}

impl FromStr for AspectRatio {
    type Err = LetterboxError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}", self.0)
    }
}

fn parse_component(input: &str, component: &str) -> Result<f64> {
    let value = component.parse::<f64>().map_err(|e| {
        LetterboxError::invalid_aspect(input, format!("{:?} is not a number: {}", component, e))
    })?;

    // Zero, negative or non-finite components would break 0 < ratio <= 1
    if !value.is_finite() || value <= 0.0 {
        return Err(LetterboxError::invalid_aspect(
            input,
            format!("{:?} must be a positive finite number", component),
        ));
    }

    Ok(value)
}
