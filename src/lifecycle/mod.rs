//! Blocking primitives used by `wait` and `shutdown`

mod signal;

pub use signal::Signal;
