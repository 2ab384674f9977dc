use common::{BitBuffer2, Buffer2, Buffer3};

use crate::labeling::{LabelMap, LabelVolume};

/// One timestep of input: a label field and an optional flux field.
///
/// 2D fields are stored as volumes of depth 1.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    labels: Buffer3<u32>,
    flux: Option<Buffer3<f64>>,
}

impl Frame {
    pub fn new(labels: impl Into<Buffer3<u32>>) -> Self {
        Self {
            labels: labels.into(),
            flux: None,
        }
    }

    /// Attach a flux field of the same shape as the labels.
    pub fn with_flux(mut self, flux: impl Into<Buffer3<f64>>) -> Self {
        let flux = flux.into();
        assert!(
            flux.same_shape(&self.labels),
            "flux field shape {}x{}x{} does not match labels {}x{}x{}",
            flux.width(),
            flux.height(),
            flux.depth(),
            self.labels.width(),
            self.labels.height(),
            self.labels.depth()
        );
        self.flux = Some(flux);
        self
    }

    pub fn labels(&self) -> &Buffer3<u32> {
        &self.labels
    }

    pub fn flux(&self) -> Option<&Buffer3<f64>> {
        self.flux.as_ref()
    }

    pub fn is_volume(&self) -> bool {
        self.labels.depth() > 1
    }

    /// Horizontal occupancy used for displacement estimation.
    ///
    /// 2D frames use their only level. Volumes use `level` when given,
    /// otherwise any occupied cell in the column.
    pub(crate) fn occupancy(&self, level: Option<usize>) -> BitBuffer2 {
        let occupied: Buffer2<bool> = match (self.is_volume(), level) {
            (false, _) => self.labels.level(0).map(|&l| l > 0),
            (true, Some(z)) => {
                assert!(
                    z < self.labels.depth(),
                    "track_level {} is outside frames of depth {}",
                    z,
                    self.labels.depth()
                );
                self.labels.level(z).map(|&l| l > 0)
            }
            (true, None) => self.labels.columns(|column| column.iter().any(|&l| l > 0)),
        };
        BitBuffer2::from(&occupied)
    }
}

impl From<Buffer2<u32>> for Frame {
    fn from(labels: Buffer2<u32>) -> Self {
        Self::new(labels)
    }
}

impl From<Buffer3<u32>> for Frame {
    fn from(labels: Buffer3<u32>) -> Self {
        Self::new(labels)
    }
}

impl From<LabelMap> for Frame {
    fn from(map: LabelMap) -> Self {
        Self::new(map.into_labels())
    }
}

impl From<LabelVolume> for Frame {
    fn from(volume: LabelVolume) -> Self {
        Self::new(volume.into_labels())
    }
}
