//! Track a synthetic field of drifting, growing and decaying blobs.
//!
//! Usage: `cumulus-synthetic [config.yml]`

use std::path::PathBuf;

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use common::log_setup::setup_logging;
use common::{wrap_coord, BitBuffer2};
use cumulus::{Tracker, TrackerConfig};

const WIDTH: usize = 128;
const HEIGHT: usize = 128;
const NUM_FRAMES: usize = 30;
const NUM_BLOBS: usize = 24;
const SEED: u64 = 0x5eed;

/// Wind in cells per frame.
const WIND: (i32, i32) = (2, -1);

#[derive(Debug, Clone, Copy)]
struct Blob {
    x: i32,
    y: i32,
    radius: f64,
    growth: f64,
}

impl Blob {
    fn random(rng: &mut StdRng) -> Self {
        Self {
            x: rng.random_range(0..WIDTH as i32),
            y: rng.random_range(0..HEIGHT as i32),
            radius: rng.random_range(1.0..4.0),
            growth: rng.random_range(-0.3..0.5),
        }
    }

    fn advance(&mut self, rng: &mut StdRng) {
        self.x += WIND.0 + rng.random_range(-1..=1);
        self.y += WIND.1 + rng.random_range(-1..=1);
        self.radius += self.growth;
        if self.radius > 8.0 {
            self.growth = -self.growth.abs();
        }
    }

    fn is_alive(&self) -> bool {
        self.radius >= 0.5
    }

    fn draw(&self, mask: &mut BitBuffer2) {
        let r = self.radius.ceil() as i32;
        for dy in -r..=r {
            for dx in -r..=r {
                if ((dx * dx + dy * dy) as f64).sqrt() <= self.radius {
                    let x = wrap_coord((self.x + dx) as isize, WIDTH);
                    let y = wrap_coord((self.y + dy) as isize, HEIGHT);
                    mask.set_xy(x, y, true);
                }
            }
        }
    }
}

fn generate_masks() -> Vec<BitBuffer2> {
    let mut rng = StdRng::seed_from_u64(SEED);
    let mut blobs: Vec<Blob> = (0..NUM_BLOBS).map(|_| Blob::random(&mut rng)).collect();

    let mut masks = Vec::with_capacity(NUM_FRAMES);
    for _ in 0..NUM_FRAMES {
        let mut mask = BitBuffer2::new_default(WIDTH, HEIGHT);
        for blob in &blobs {
            blob.draw(&mut mask);
        }
        masks.push(mask);

        for blob in &mut blobs {
            blob.advance(&mut rng);
        }
        blobs.retain(Blob::is_alive);
        while blobs.len() < NUM_BLOBS {
            blobs.push(Blob::random(&mut rng));
        }
    }
    masks
}

fn load_config() -> Result<TrackerConfig> {
    let Some(path) = std::env::args().nth(1).map(PathBuf::from) else {
        return Ok(TrackerConfig::default());
    };
    let yaml = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    TrackerConfig::from_yaml_str(&yaml)
        .with_context(|| format!("Failed to parse config {}", path.display()))
}

fn main() -> Result<()> {
    setup_logging("info", None);

    let config = load_config()?;
    tracing::info!("Generating {} frames of {}x{}", NUM_FRAMES, WIDTH, HEIGHT);
    let masks = generate_masks();

    let mut tracker = Tracker::new(config);
    tracker.track_masks(&masks)?;
    tracker.group();
    tracker.cluster();

    for (time_index, clusters) in tracker.clusters_at_time().iter().enumerate() {
        let largest = clusters.iter().map(|c| c.len()).max().unwrap_or(0);
        tracing::debug!(
            "time {}: {} clusters, largest has {} regions",
            time_index,
            clusters.len(),
            largest
        );
    }

    let longest = tracker
        .all_regions()
        .iter()
        .filter_map(|r| r.lifetime)
        .max()
        .unwrap_or(0);
    tracing::info!("Longest lineage: {} frames", longest);
    tracing::info!("\n{}", tracker.group_stats());

    Ok(())
}
