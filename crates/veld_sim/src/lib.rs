//! The discrete-event simulation kernel.
//!
//! [`Kernel`] runs an elaborated design: an event queue ordered by
//! `(time, delta, insertion sequence)`, per-driver pending values with
//! resolution, cooperative process scheduling over coroutine-shaped IR
//! units, watch callbacks, and the waveform sink contract. Scheduling is
//! single-threaded and deterministic.

#![warn(missing_docs)]

pub mod error;
pub mod kernel;
pub mod time;
pub mod wave;

pub use error::SimError;
pub use kernel::{Kernel, ProcessState, RunResult, WatchEvent, WatchId};
pub use time::{SimTime, FS_PER_MS, FS_PER_NS, FS_PER_PS, FS_PER_US};
pub use wave::{MemorySink, WaveSink};
