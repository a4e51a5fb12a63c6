//! Time source interface

/// Monotonic millisecond clock.
///
/// Wraps around after ~49 days; consumers compare times with
/// `wrapping_sub`.
pub trait Clock {
    /// Milliseconds since an arbitrary, fixed origin
    fn millis(&self) -> u32;
}
