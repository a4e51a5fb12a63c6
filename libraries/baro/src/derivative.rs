//! Smooth noise-robust differentiator
//!
//! Estimates the slope of an irregularly sampled signal from a fixed window
//! of `(sample, timestamp_ms)` pairs using Holoborodko's one-sided-free
//! central differences. Supported window sizes are 5, 7 and 9.

use heapless::Deque;

/// Windowed derivative of a signal, in units per second
#[derive(Debug, Clone)]
pub struct DerivativeFilter<const N: usize> {
    samples: Deque<(f32, u32), N>,
    new_data: bool,
    last_slope: f32,
}

impl<const N: usize> DerivativeFilter<N> {
    /// Create an empty filter.
    ///
    /// Panics if `N` is not one of the supported window sizes.
    pub fn new() -> Self {
        assert!(
            matches!(N, 5 | 7 | 9),
            "derivative filter window must be 5, 7 or 9 samples, got {}",
            N
        );
        Self {
            samples: Deque::new(),
            new_data: false,
            last_slope: 0.0,
        }
    }

    /// Add a sample taken at `timestamp_ms`.
    ///
    /// A sample with the same timestamp as the previous one is ignored.
    pub fn update(&mut self, sample: f32, timestamp_ms: u32) {
        if let Some(&(_, last)) = self.samples.back() {
            if last == timestamp_ms {
                return;
            }
        }

        if self.samples.is_full() {
            self.samples.pop_front();
        }
        // a slot is always free here
        let _ = self.samples.push_back((sample, timestamp_ms));
        self.new_data = true;
    }

    /// Number of samples currently held
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether no sample has been added yet
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Slope of the window in units per second.
    ///
    /// Zero until the window is full. Without new samples since the last
    /// call the previous slope is returned.
    pub fn slope(&mut self) -> f32 {
        if !self.new_data {
            return self.last_slope;
        }
        if !self.samples.is_full() {
            return 0.0;
        }

        let mut f = [0.0f32; N];
        let mut x = [0u32; N];
        for (i, &(sample, timestamp)) in self.samples.iter().enumerate() {
            f[i] = sample;
            x[i] = timestamp;
        }

        let (weights, divisor) = Self::weights();
        let c = N / 2;
        let mut result = 0.0;
        for (k, weight) in weights.iter().enumerate() {
            let k = k + 1;
            let dt = x[c + k].wrapping_sub(x[c - k]) as f32;
            result += 2.0 * k as f32 * weight * (f[c + k] - f[c - k]) / dt;
        }
        // per millisecond to per second
        result = result / divisor * 1000.0;

        if !result.is_finite() {
            result = 0.0;
        }

        self.new_data = false;
        self.last_slope = result;
        result
    }

    fn weights() -> (&'static [f32], f32) {
        match N {
            5 => (&[2.0, 1.0], 8.0),
            7 => (&[5.0, 4.0, 1.0], 32.0),
            _ => (&[14.0, 14.0, 6.0, 1.0], 128.0),
        }
    }
}

impl<const N: usize> Default for DerivativeFilter<N> {
    fn default() -> Self {
        Self::new()
    }
}
