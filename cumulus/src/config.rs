//! Configuration types for labeling and tracking.
//!
//! [`TrackerConfig`] is a flat struct grouped by comments into logical
//! sections. Every field has a default, so partial YAML documents are valid.

use serde::{Deserialize, Serialize};

use crate::error::Result;

// ============================================================================
// Enums
// ============================================================================

/// Cell adjacency used by labeling, growing and touch matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Connectivity {
    /// Cells sharing an edge (a face in 3D).
    #[default]
    Four,
    /// Edge-sharing plus diagonal (corner-sharing) cells.
    Eight,
}

impl Connectivity {
    pub fn from_diagonal(diagonal: bool) -> Self {
        if diagonal {
            Connectivity::Eight
        } else {
            Connectivity::Four
        }
    }
}

/// Behaviour of neighbour lookups at the domain edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeMode {
    /// Horizontal coordinates wrap around (doubly periodic domain).
    #[default]
    Wrap,
    /// Out-of-range neighbours are discarded.
    Clip,
}

/// Policy for apportioning a predecessor's area among its successors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FractionMethod {
    /// Two-pass reduced-fraction scheme of Plant (2009), eqns 4-6.
    #[default]
    Pc2009,
    /// Successor size over the summed size of all successors.
    Simple,
}

/// Taper applied to both fields before correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Window {
    /// Raised-cosine taper with `alpha = max(0.1, 10 / extent)`.
    #[default]
    Tukey,
    /// No taper.
    Rectangular,
}

// ============================================================================
// Labeling
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelConfig {
    pub connectivity: Connectivity,
    pub edge: EdgeMode,
    /// Components with fewer cells are dropped. 0 keeps everything.
    pub min_cells: usize,
}

// ============================================================================
// Tracking
// ============================================================================

/// Physical size of one grid cell, in metres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Resolution {
    /// Along x and y.
    pub horizontal: f64,
    /// Along z, only used for 3D fields.
    pub vertical: f64,
}

impl Default for Resolution {
    fn default() -> Self {
        Self {
            horizontal: 1000.0,
            vertical: 1000.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    // -- Geometry --
    pub resolution: Resolution,

    // -- Labeling of raw masks --
    pub labeling: LabelConfig,

    // -- Overlap matching --
    /// Match regions that touch the projection, not only those overlapping it.
    pub include_touching: bool,
    /// Touch matching includes diagonal neighbours.
    pub touching_diagonal: bool,
    /// Regions with `size <= ignore_smaller_than` are never linked or grouped.
    pub ignore_smaller_than: usize,

    // -- Displacement estimation --
    pub window: Window,
    /// 3D fields: level whose occupancy drives the correlation.
    /// `None` correlates column occupancy instead.
    pub track_level: Option<usize>,

    // -- Analytics --
    pub fraction_method: FractionMethod,
    /// Centre-to-centre distance (metres) below which regions cluster.
    pub cluster_distance: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            resolution: Resolution::default(),
            labeling: LabelConfig::default(),
            include_touching: false,
            touching_diagonal: false,
            ignore_smaller_than: 0,
            window: Window::Tukey,
            track_level: None,
            fraction_method: FractionMethod::Pc2009,
            cluster_distance: 10e3,
        }
    }
}

impl TrackerConfig {
    /// Parse a (possibly partial) YAML document and validate it.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yml::from_str(yaml)?;
        config.validate();
        Ok(config)
    }

    /// Adjacency used for touch matching.
    pub fn touching_connectivity(&self) -> Connectivity {
        Connectivity::from_diagonal(self.touching_diagonal)
    }

    /// Panics on values no run could meaningfully use.
    pub fn validate(&self) {
        assert!(
            self.resolution.horizontal.is_finite() && self.resolution.horizontal > 0.0,
            "horizontal resolution must be positive, got {}",
            self.resolution.horizontal
        );
        assert!(
            self.resolution.vertical.is_finite() && self.resolution.vertical > 0.0,
            "vertical resolution must be positive, got {}",
            self.resolution.vertical
        );
        assert!(
            self.cluster_distance.is_finite() && self.cluster_distance > 0.0,
            "cluster_distance must be positive, got {}",
            self.cluster_distance
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = TrackerConfig::default();
        config.validate();
        assert_eq!(config.fraction_method, FractionMethod::Pc2009);
        assert_eq!(config.touching_connectivity(), Connectivity::Four);
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let yaml = "
resolution:
  horizontal: 25.0
labeling:
  connectivity: eight
  min_cells: 4
include_touching: true
touching_diagonal: true
fraction_method: simple
track_level: 30
";
        let config = TrackerConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.resolution.horizontal, 25.0);
        assert_eq!(config.resolution.vertical, 1000.0);
        assert_eq!(config.labeling.connectivity, Connectivity::Eight);
        assert_eq!(config.labeling.edge, EdgeMode::Wrap);
        assert_eq!(config.labeling.min_cells, 4);
        assert!(config.include_touching);
        assert_eq!(config.touching_connectivity(), Connectivity::Eight);
        assert_eq!(config.fraction_method, FractionMethod::Simple);
        assert_eq!(config.track_level, Some(30));
        assert_eq!(config.window, Window::Tukey);
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        let result = TrackerConfig::from_yaml_str("fraction_method: [not, an, enum]");
        assert!(matches!(result, Err(crate::Error::Config(_))));
    }

    #[test]
    #[should_panic(expected = "horizontal resolution must be positive")]
    fn zero_resolution_panics() {
        let config = TrackerConfig {
            resolution: Resolution {
                horizontal: 0.0,
                vertical: 1.0,
            },
            ..Default::default()
        };
        config.validate();
    }
}
