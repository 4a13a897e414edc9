use lazy_static::lazy_static;
use std::sync::atomic::{AtomicU64, Ordering};

/// Constant indicating that an inequality bound is to be treated as
/// infinite.  Bounds with magnitudes beyond this value are capped at it
/// when a model is installed, so one-sided constraints stay two-sided
/// internally.  A custom constant can be set with [`set_infinity`];
/// it applies at module level.
pub const INFINITY_DEFAULT: f64 = 1e30;

// f64 stored through its bit pattern so the bound can be process-global
struct AtomicF64(AtomicU64);

impl AtomicF64 {
    fn new(v: f64) -> Self {
        Self(AtomicU64::new(v.to_bits()))
    }
    fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }
    fn store(&self, v: f64) {
        self.0.store(v.to_bits(), Ordering::Relaxed);
    }
}

lazy_static! {
    static ref INFINITY: AtomicF64 = AtomicF64::new(INFINITY_DEFAULT);
}

/// Revert the internal infinity bound to [`INFINITY_DEFAULT`].
pub fn default_infinity() {
    INFINITY.store(INFINITY_DEFAULT);
}

/// Set the internal infinity bound to a new value.
pub fn set_infinity(v: f64) {
    INFINITY.store(v);
}

/// Get the current value of the internal infinity bound.
pub fn get_infinity() -> f64 {
    INFINITY.load()
}
