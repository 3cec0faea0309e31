//! Tessellation parameters.

use serde::{Deserialize, Serialize};

use crate::{Result, TessError};

/// Tessellation parameters controlling sampling density and repair.
///
/// Every field has a default, so TOML input only needs the knobs it changes:
///
/// ```
/// use cdt_kernel_tessellate::TessellationParams;
///
/// let p = TessellationParams::from_toml_str("length_divisor = 20.0\nparallel = false").unwrap();
/// assert_eq!(p.length_divisor, 20.0);
/// assert_eq!(p.singular_samples, 10);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TessellationParams {
    /// Maximum segment length is `sqrt(face area) / length_divisor`; the
    /// smaller face of an edge wins.
    pub length_divisor: f64,
    /// Minimum segment length as a fraction of the maximum.
    pub min_length_fraction: f64,
    /// Split a segment when the curve strays from its chord by more than
    /// this fraction of the chord length.
    pub chord_fraction: f64,
    /// Split a segment when the tangent turns by more than this (radians).
    pub max_turn: f64,
    /// Initial segment count for closed edges.
    pub closed_edge_segments: usize,
    /// Parametric samples on each singular trim.
    pub singular_samples: usize,
    /// Recursion cap for edge bisection.
    pub max_depth: u32,
    /// Interior points closer than this fraction of the grid spacing to a
    /// trim segment are dropped.
    pub interior_clearance: f64,
    /// Upper bound on interior grid divisions per direction.
    pub max_grid: usize,
    /// Triangles with two or more trim points and twice-area below
    /// `sliver_ratio * longest_edge²` are sent to repair.
    pub sliver_ratio: f64,
    /// Twice-area ratio below which a triangle counts as collinear.
    pub collinear_tolerance: f64,
    /// Near-collinear repair points are pushed off the line by this
    /// fraction of the adjacent edge length.
    pub repair_nudge: f64,
    /// Maximum repair sweeps per face.
    pub repair_passes: usize,
    /// Tessellate faces on the rayon pool.
    pub parallel: bool,
}

impl Default for TessellationParams {
    fn default() -> Self {
        Self {
            length_divisor: 10.0,
            min_length_fraction: 0.1,
            chord_fraction: 0.05,
            max_turn: 0.5,
            closed_edge_segments: 4,
            singular_samples: 10,
            max_depth: 16,
            interior_clearance: 0.3,
            max_grid: 64,
            sliver_ratio: 1e-3,
            collinear_tolerance: 1e-9,
            repair_nudge: 1e-3,
            repair_passes: 4,
            parallel: true,
        }
    }
}

impl TessellationParams {
    /// Parse parameters from TOML text and validate them.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let params: Self = toml::from_str(text)?;
        params.validate()?;
        Ok(params)
    }

    /// Check that every knob is in range.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("length_divisor", self.length_divisor),
            ("chord_fraction", self.chord_fraction),
            ("max_turn", self.max_turn),
            ("interior_clearance", self.interior_clearance),
        ];
        for (name, value) in positive {
            if !(value > 0.0 && value.is_finite()) {
                return Err(TessError::InvalidArguments(format!("{name} must be positive")));
            }
        }
        if !(0.0..1.0).contains(&self.min_length_fraction) {
            return Err(TessError::InvalidArguments(
                "min_length_fraction must be in [0, 1)".into(),
            ));
        }
        if self.closed_edge_segments < 3 {
            return Err(TessError::InvalidArguments(
                "closed_edge_segments must be at least 3".into(),
            ));
        }
        if self.singular_samples < 1 || self.max_grid < 1 {
            return Err(TessError::InvalidArguments(
                "singular_samples and max_grid must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(TessellationParams::default().validate().is_ok());
    }

    #[test]
    fn test_toml_overrides_and_rejects() {
        let p = TessellationParams::from_toml_str("max_turn = 0.25\nrepair_passes = 2").unwrap();
        assert_eq!(p.max_turn, 0.25);
        assert_eq!(p.repair_passes, 2);
        assert_eq!(p.length_divisor, 10.0);

        assert!(matches!(
            TessellationParams::from_toml_str("length_divisor = -1.0"),
            Err(TessError::InvalidArguments(_))
        ));
        assert!(matches!(
            TessellationParams::from_toml_str("length_divisor = \"ten\""),
            Err(TessError::Config(_))
        ));
    }

    #[test]
    fn test_round_trip_through_toml() {
        let p = TessellationParams {
            parallel: false,
            ..Default::default()
        };
        let text = toml::to_string(&p).unwrap();
        assert_eq!(TessellationParams::from_toml_str(&text).unwrap(), p);
    }
}
