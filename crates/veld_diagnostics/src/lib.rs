//! Structured diagnostics for the veld VHDL toolchain.
//!
//! Errors, warnings, and notes flow through a [`DiagnosticSink`]: components
//! never print, they emit. Hints queued on the sink attach to the next
//! emitted error, mirroring how elaboration builds up context before the
//! failure point is known. Rendering to text is the renderer's job alone.

#![warn(missing_docs)]

pub mod diagnostic;
pub mod renderer;
pub mod severity;
pub mod sink;

pub use diagnostic::Diagnostic;
pub use renderer::{RenderMode, Renderer};
pub use severity::Severity;
pub use sink::DiagnosticSink;
