//! Simulation errors.

use veld_ir::IrError;
use veld_source::Loc;

/// Errors ending a simulation run.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// A fatal runtime trap: failed assertion, division by zero, or an
    /// explicit trap operation. Fatal to the run, not to the session.
    #[error("{message} at {time_fs}fs")]
    Trap {
        /// The trap's diagnostic message.
        message: String,
        /// Source location of the trapping operation.
        loc: Loc,
        /// Simulation time of the trap in femtoseconds.
        time_fs: u64,
    },

    /// A signal with multiple active drivers has no resolution function.
    ///
    /// Elaboration should have rejected this; reaching it at runtime is a
    /// fatal trap.
    #[error("signal {signal} has multiple drivers and no resolution at {time_fs}fs")]
    UnresolvedDrivers {
        /// The signal's hierarchical name.
        signal: String,
        /// Simulation time in femtoseconds.
        time_fs: u64,
    },

    /// Malformed IR reached the kernel.
    #[error(transparent)]
    Ir(#[from] IrError),

    /// Too many delta cycles in one instant; almost always a zero-delay
    /// feedback loop.
    #[error("delta cycle limit of {max_delta} exceeded at {time_fs}fs")]
    DeltaLimit {
        /// Simulation time in femtoseconds.
        time_fs: u64,
        /// The configured limit.
        max_delta: u32,
    },

    /// A signal name could not be found.
    #[error("no signal named {0}")]
    UnknownSignal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trap_display() {
        let err = SimError::Trap {
            message: "assertion failed".into(),
            loc: Loc::DUMMY,
            time_fs: 3_000_000,
        };
        assert_eq!(err.to_string(), "assertion failed at 3000000fs");
    }

    #[test]
    fn delta_limit_display() {
        let err = SimError::DeltaLimit {
            time_fs: 100,
            max_delta: 10_000,
        };
        assert_eq!(
            err.to_string(),
            "delta cycle limit of 10000 exceeded at 100fs"
        );
    }

    #[test]
    fn unknown_signal_display() {
        assert_eq!(
            SimError::UnknownSignal("top.ghost".into()).to_string(),
            "no signal named top.ghost"
        );
    }
}
