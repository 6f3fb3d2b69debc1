use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Cubic millimeters per cubic centimeter. Volumes are carried in mm³
/// internally and converted to cm³ once, at the reporting boundary.
pub const MM3_PER_CM3: f64 = 1000.0;

/// Length unit declared by the caller for incoming mesh coordinates.
/// Millimeter is the canonical internal unit; everything else is scaled
/// to it before any geometry runs.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LengthUnit {
    #[default]
    Millimeter,
    Centimeter,
    Inch,
}

impl LengthUnit {
    /// Linear scale factor from this unit to millimeters.
    pub fn scale(self) -> f32 {
        match self {
            LengthUnit::Millimeter => 1.0,
            LengthUnit::Centimeter => 10.0,
            LengthUnit::Inch => 25.4,
        }
    }
}

impl FromStr for LengthUnit {
    type Err = ();

    /// Unit strings come from untrusted upload forms, so anything
    /// unrecognized falls back to millimeters rather than erroring.
    fn from_str(raw: &str) -> Result<Self, ()> {
        Ok(match raw.trim().to_ascii_lowercase().as_str() {
            "cm" | "centimeter" | "centimeters" => LengthUnit::Centimeter,
            "in" | "inch" | "inches" => LengthUnit::Inch,
            _ => LengthUnit::Millimeter,
        })
    }
}

impl fmt::Display for LengthUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LengthUnit::Millimeter => "mm",
            LengthUnit::Centimeter => "cm",
            LengthUnit::Inch => "in",
        })
    }
}
