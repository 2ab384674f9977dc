pub mod bit_buffer2;
pub mod buffer2;
pub mod buffer3;
pub mod float_ext;
pub mod log_setup;

pub use bit_buffer2::BitBuffer2;
pub use buffer2::Buffer2;
pub use buffer3::Buffer3;
pub use float_ext::FloatExt;

pub const EPSILON: f64 = 1e-9;

/// Wrap a signed coordinate into `0..extent`.
#[inline]
pub fn wrap_coord(value: isize, extent: usize) -> usize {
    debug_assert!(extent > 0);
    value.rem_euclid(extent as isize) as usize
}
