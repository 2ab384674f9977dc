//! Displacement estimation between consecutive occupancy masks.
//!
//! Cross-correlation via FFT:
//! 1. Taper both masks with a separable window and remove their means
//! 2. Multiply the spectrum of the current field by the conjugate spectrum
//!    of the previous field
//! 3. Take the real part of the inverse transform as the correlation surface
//! 4. The first maximum (row-major) gives the integer displacement
//!
//! Correlation is circular, so displacements are folded into `(-n/2, n/2]`
//! along each axis.


use std::f64::consts::PI;
use std::sync::Arc;

use common::BitBuffer2;
use rayon::prelude::*;
use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::config::Window;
use crate::error::{Error, FieldRole, Result};

/// Sum of squares at or below which a demeaned field carries no signal.
const MIN_FIELD_ENERGY: f64 = 1e-12;

/// Estimated translation from the previous field to the current one.
///
/// The current field is approximately the previous field rolled by
/// `(dx, dy)` cells.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Displacement {
    pub dx: isize,
    pub dy: isize,
    /// Peak correlation normalised by the field norms, ~1.0 for a clean shift.
    pub amplitude: f64,
}

/// FFT cross-correlator for fields of a fixed size.
///
/// Plans and window weights are computed once and reused for every pair.
pub struct FieldCorrelator {
    width: usize,
    height: usize,
    row_forward: Arc<dyn Fft<f64>>,
    row_inverse: Arc<dyn Fft<f64>>,
    col_forward: Arc<dyn Fft<f64>>,
    col_inverse: Arc<dyn Fft<f64>>,
    window_x: Vec<f64>,
    window_y: Vec<f64>,
}

impl std::fmt::Debug for FieldCorrelator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldCorrelator")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

impl FieldCorrelator {
    pub fn new(width: usize, height: usize, window: Window) -> Self {
        assert!(
            width > 0 && height > 0,
            "cannot correlate empty fields ({}x{})",
            width,
            height
        );

        let mut planner = FftPlanner::new();
        let row_forward = planner.plan_fft_forward(width);
        let row_inverse = planner.plan_fft_inverse(width);
        let col_forward = planner.plan_fft_forward(height);
        let col_inverse = planner.plan_fft_inverse(height);

        let (window_x, window_y) = match window {
            Window::Tukey => (tukey_window(width), tukey_window(height)),
            Window::Rectangular => (vec![1.0; width], vec![1.0; height]),
        };

        Self {
            width,
            height,
            row_forward,
            row_inverse,
            col_forward,
            col_inverse,
            window_x,
            window_y,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Estimate how far `current` has moved relative to `previous`.
    ///
    /// Fails with [`Error::DegenerateField`] when either field has no
    /// variance left after windowing (e.g. all cells empty).
    pub fn correlate(&self, previous: &BitBuffer2, current: &BitBuffer2) -> Result<Displacement> {
        assert!(
            previous.width() == self.width
                && previous.height() == self.height
                && current.same_shape(previous),
            "field shape mismatch: correlator is {}x{}, got {}x{} and {}x{}",
            self.width,
            self.height,
            previous.width(),
            previous.height(),
            current.width(),
            current.height()
        );

        let (prev_field, prev_energy) = self.prepare(previous, FieldRole::Previous)?;
        let (cur_field, cur_energy) = self.prepare(current, FieldRole::Current)?;

        let prev_spectrum = self.fft_2d(prev_field);
        let mut spectrum = self.fft_2d(cur_field);
        spectrum
            .par_iter_mut()
            .zip(prev_spectrum.par_iter())
            .for_each(|(cur, prev)| *cur *= prev.conj());

        let surface = self.ifft_2d(spectrum);
        let (peak_idx, peak_val) = find_peak(&surface);

        let displacement = Displacement {
            dx: fold(peak_idx % self.width, self.width),
            dy: fold(peak_idx / self.width, self.height),
            amplitude: peak_val / (prev_energy * cur_energy).sqrt(),
        };

        tracing::debug!(
            "correlation peak: dx={}, dy={}, amplitude={:.4}",
            displacement.dx,
            displacement.dy,
            displacement.amplitude
        );

        Ok(displacement)
    }

    /// Window and demean a mask. Returns the field and its sum of squares.
    fn prepare(&self, mask: &BitBuffer2, role: FieldRole) -> Result<(Vec<f64>, f64)> {
        let mut field = vec![0.0f64; self.width * self.height];
        for idx in mask.iter_ones() {
            field[idx] = self.window_x[idx % self.width] * self.window_y[idx / self.width];
        }

        let mean = field.iter().sum::<f64>() / field.len() as f64;
        let mut energy = 0.0;
        for value in field.iter_mut() {
            *value -= mean;
            energy += *value * *value;
        }

        // NaN fails this check too.
        if !(energy > MIN_FIELD_ENERGY) {
            return Err(Error::DegenerateField { role });
        }
        Ok((field, energy))
    }

    /// 2D FFT by row-column decomposition.
    fn fft_2d(&self, field: Vec<f64>) -> Vec<Complex<f64>> {
        let mut data: Vec<Complex<f64>> = field.into_iter().map(|v| Complex::new(v, 0.0)).collect();
        self.transform(&mut data, self.row_forward.as_ref(), self.col_forward.as_ref());
        data
    }

    /// Inverse 2D FFT, normalised, real part only.
    fn ifft_2d(&self, mut data: Vec<Complex<f64>>) -> Vec<f64> {
        self.transform(&mut data, self.row_inverse.as_ref(), self.col_inverse.as_ref());
        let norm = 1.0 / (self.width * self.height) as f64;
        data.into_iter().map(|c| c.re * norm).collect()
    }

    fn transform(&self, data: &mut Vec<Complex<f64>>, rows: &dyn Fft<f64>, cols: &dyn Fft<f64>) {
        data.par_chunks_mut(self.width).for_each(|row| rows.process(row));

        let mut columns = transpose(data, self.width, self.height);
        columns
            .par_chunks_mut(self.height)
            .for_each(|column| cols.process(column));

        *data = transpose(&columns, self.height, self.width);
    }
}

/// Tapered cosine window of length `n` with `alpha = max(0.1, 10 / n)`.
///
/// Samples sit at cell centres (`k + 0.5`). Cells beyond the taper zones
/// weigh 1.
pub fn tukey_window(n: usize) -> Vec<f64> {
    let len = n as f64;
    let alpha = (10.0 / len).max(0.1);
    let taper = alpha * len;

    (0..n)
        .map(|k| {
            let x = k as f64 + 0.5;
            if x > len * (1.0 - alpha / 2.0) {
                0.5 * (1.0 + (PI * (2.0 * x / taper - 2.0 / alpha + 1.0)).cos())
            } else if x < taper / 2.0 {
                0.5 * (1.0 + (PI * (2.0 * x / taper - 1.0)).cos())
            } else {
                1.0
            }
        })
        .collect()
}

/// Transpose a row-major `width x height` matrix into `height x width`.
fn transpose(data: &[Complex<f64>], width: usize, height: usize) -> Vec<Complex<f64>> {
    let mut out = vec![Complex::new(0.0, 0.0); data.len()];
    for y in 0..height {
        for x in 0..width {
            out[x * height + y] = data[y * width + x];
        }
    }
    out
}

/// First maximum in row-major order.
fn find_peak(surface: &[f64]) -> (usize, f64) {
    let mut max_idx = 0;
    let mut max_val = f64::NEG_INFINITY;
    for (idx, &val) in surface.iter().enumerate() {
        if val > max_val {
            max_val = val;
            max_idx = idx;
        }
    }
    (max_idx, max_val)
}

/// Map a circular offset in `0..n` to `(-n/2, n/2]`.
#[inline]
fn fold(offset: usize, n: usize) -> isize {
    if offset > n / 2 {
        offset as isize - n as isize
    } else {
        offset as isize
    }
}
