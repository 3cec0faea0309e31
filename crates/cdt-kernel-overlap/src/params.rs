//! Overlap resolution parameters.

use serde::{Deserialize, Serialize};

use crate::{OverlapError, Result};

/// Parameters for [`resolve_overlaps`](crate::resolve_overlaps).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlapParams {
    /// Contacts within this fraction of the smaller triangle's shortest
    /// edge of a triangle edge count as edge or vertex touches.
    pub contact_tolerance: f64,
    /// Edges at or below this length are never split. When unset, the
    /// floor is `split_fraction` of the scene's bounding diagonal.
    pub length_threshold: Option<f64>,
    /// Length floor relative to the scene size, used without an explicit
    /// `length_threshold`.
    pub split_fraction: f64,
    /// Snapped midpoints may move at most this fraction of the edge length.
    pub snap_radius: f64,
    /// Maximum detect-and-split passes.
    pub max_iterations: usize,
    /// Run the narrow phase on the rayon pool.
    pub parallel: bool,
}

impl Default for OverlapParams {
    fn default() -> Self {
        Self {
            contact_tolerance: 1e-6,
            length_threshold: None,
            split_fraction: 0.05,
            snap_radius: 0.25,
            max_iterations: 32,
            parallel: true,
        }
    }
}

impl OverlapParams {
    /// Parse parameters from TOML text and validate them.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let params: Self = toml::from_str(text)?;
        params.validate()?;
        Ok(params)
    }

    /// Length floor for a scene with the given bounding diagonal.
    pub fn min_edge_length(&self, scene_diagonal: f64) -> f64 {
        self.length_threshold
            .unwrap_or(self.split_fraction * scene_diagonal)
    }

    /// Check that every knob is in range.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("contact_tolerance", self.contact_tolerance),
            ("split_fraction", self.split_fraction),
            ("length_threshold", self.length_threshold.unwrap_or(1.0)),
            ("snap_radius", self.snap_radius),
        ] {
            if !(value > 0.0 && value.is_finite()) {
                return Err(OverlapError::InvalidArguments(format!("{name} must be positive")));
            }
        }
        if self.max_iterations == 0 {
            return Err(OverlapError::InvalidArguments(
                "max_iterations must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toml_defaults_and_validation() {
        let p = OverlapParams::from_toml_str("max_iterations = 4").unwrap();
        assert_eq!(p.max_iterations, 4);
        assert_eq!(p.split_fraction, 0.05);
        assert_eq!(p.length_threshold, None);
        assert_eq!(p.min_edge_length(2.0), 0.1);

        let p = OverlapParams::from_toml_str("length_threshold = 0.25").unwrap();
        assert_eq!(p.min_edge_length(100.0), 0.25);
        assert!(OverlapParams::from_toml_str("length_threshold = -1.0").is_err());
        assert!(OverlapParams::from_toml_str("max_iterations = 0").is_err());
        assert!(matches!(
            OverlapParams::from_toml_str("snap_radius = []"),
            Err(OverlapError::Config(_))
        ));
    }
}
