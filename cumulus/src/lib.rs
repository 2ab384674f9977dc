//! Cumulus - cloud lineage tracking.
//!
//! Follows labelled cloud regions through a sequence of 2D or 3D fields:
//! - Connected-component labeling of binary masks, optionally wrapping
//! - Displacement estimation between consecutive fields by FFT correlation
//! - Overlap linking of regions into a lineage graph
//! - Groups of linked regions with split/merge topology, mass fractions and
//!   lifetimes
//! - Per-timestep spatial clustering
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use cumulus::{Tracker, TrackerConfig};
//!
//! let mut tracker = Tracker::new(TrackerConfig::default());
//! tracker.track_masks(&masks)?;
//! tracker.group();
//!
//! println!("{}", tracker.group_stats());
//! ```

pub mod cluster;
pub mod config;
pub mod correlation;
pub mod diagnostics;
pub mod error;
pub mod group;
pub mod grow;
pub mod labeling;
pub mod region;
pub mod tracker;

// ============================================================================
// Configuration and errors
// ============================================================================

pub use config::{
    Connectivity, EdgeMode, FractionMethod, LabelConfig, Resolution, TrackerConfig, Window,
};
pub use error::{Error, FieldRole, Result};

// ============================================================================
// Field processing
// ============================================================================

pub use correlation::{Displacement, FieldCorrelator};
pub use grow::grow;
pub use labeling::{LabelMap, LabelVolume};

// ============================================================================
// Lineage
// ============================================================================

pub use cluster::{cluster_regions, Cluster};
pub use group::{CloudGroup, GroupStats};
pub use region::{PrevLink, Region, RegionGraph, RegionId};
pub use tracker::{Frame, Tracker};

// ============================================================================
// Diagnostics
// ============================================================================

pub use diagnostics::{DiagnosticSink, FrameCollector, NullSink, OverlapFrame};
