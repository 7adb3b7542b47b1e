//! The interactive simulation shell.
//!
//! Commands are textual and evaluated between delta cycles, never during
//! process execution. All output flows through a handler vector that
//! transports (terminal, WebSocket, debug protocols) subscribe to; the
//! shell itself implements no transport.

#![warn(missing_docs)]

pub mod command;
pub mod output;
pub mod shell;

pub use command::{parse_command, parse_duration, ShellCommand};
pub use output::{BufferedOutput, ShellOutput};
pub use shell::Shell;
