//! Barometer backend interface
//!
//! A backend owns exactly one sensor slot in the barometer frontend. It never
//! sees the frontend state: it receives an [`InstanceHandle`] when it is
//! registered and hands readings back through a [`BaroSink`].

/// Opaque handle to a sensor slot claimed in the barometer frontend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceHandle(u8);

impl InstanceHandle {
    /// Wrap a slot index. Only the frontend that owns the slot table should
    /// create handles.
    pub const fn new(index: u8) -> Self {
        Self(index)
    }

    /// Index of the slot in the frontend's instance table
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// A single raw reading reported by a backend
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BaroSample {
    /// Pressure in backend units (Pascals times the slot's precision divisor)
    pub pressure: f32,

    /// Temperature in Celsius
    pub temperature: f32,

    /// Time the sample was taken in milliseconds.
    ///
    /// Zero means "now": the frontend stamps the sample with its own clock.
    pub timestamp_ms: u32,
}

impl BaroSample {
    /// Sample stamped by the frontend on arrival
    pub const fn new(pressure: f32, temperature: f32) -> Self {
        Self {
            pressure,
            temperature,
            timestamp_ms: 0,
        }
    }

    /// Sample carrying its own acquisition time
    pub const fn at(pressure: f32, temperature: f32, timestamp_ms: u32) -> Self {
        Self {
            pressure,
            temperature,
            timestamp_ms,
        }
    }
}

/// Ingestion point handed to a backend during an update.
///
/// Publishing more than once in the same update keeps the last sample.
pub trait BaroSink {
    /// Publish the latest reading for the backend's slot
    fn publish(&mut self, sample: BaroSample);
}

/// Barometer backend driven by the frontend's update cycle.
///
/// Backends are `Send` so the frontend owning them can be moved to, or
/// shared with, the context a driver runs in.
pub trait BaroBackend: Send {
    /// The slot this backend publishes into
    fn instance(&self) -> InstanceHandle;

    /// Push the most recent reading, if a new one is available
    fn update(&mut self, sink: &mut dyn BaroSink);

    /// Take an intermediate reading between updates.
    ///
    /// Backends without their own timer or thread override this; the
    /// default does nothing.
    fn accumulate(&mut self) {}
}
