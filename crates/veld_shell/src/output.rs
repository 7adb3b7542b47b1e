//! The output handler vector.
//!
//! Every piece of shell output goes through [`ShellOutput`] handlers.
//! Transports subscribe by registering a handler; the shell never writes to
//! a file descriptor itself.

/// A subscriber to shell output and lifecycle events.
///
/// All methods default to no-ops so a transport implements only what it
/// carries.
pub trait ShellOutput {
    /// Normal command output.
    fn stdout(&mut self, text: &str) {
        let _ = text;
    }

    /// Error output.
    fn stderr(&mut self, text: &str) {
        let _ = text;
    }

    /// Out-of-band messages for machine consumers.
    fn backchannel(&mut self, text: &str) {
        let _ = text;
    }

    /// A watched signal changed value.
    fn signal_update(&mut self, path: &str, value: &str) {
        let (_, _) = (path, value);
    }

    /// A run started.
    fn sim_started(&mut self) {}

    /// The simulation was reset.
    fn sim_restarted(&mut self) {}

    /// Simulation time advanced to `fs` at the end of a run.
    fn next_time_step(&mut self, fs: u64) {
        let _ = fs;
    }
}

/// A handler that collects everything into strings, for tests and for
/// transports that frame complete lines.
#[derive(Debug, Default)]
pub struct BufferedOutput {
    /// Collected stdout lines.
    pub stdout: Vec<String>,
    /// Collected stderr lines.
    pub stderr: Vec<String>,
    /// Collected signal updates as `(path, value)`.
    pub signal_updates: Vec<(String, String)>,
    /// Lifecycle events in order: `started`, `restarted`, `time <fs>`.
    pub events: Vec<String>,
}

impl BufferedOutput {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ShellOutput for BufferedOutput {
    fn stdout(&mut self, text: &str) {
        self.stdout.push(text.to_string());
    }

    fn stderr(&mut self, text: &str) {
        self.stderr.push(text.to_string());
    }

    fn signal_update(&mut self, path: &str, value: &str) {
        self.signal_updates
            .push((path.to_string(), value.to_string()));
    }

    fn sim_started(&mut self) {
        self.events.push("started".to_string());
    }

    fn sim_restarted(&mut self) {
        self.events.push("restarted".to_string());
    }

    fn next_time_step(&mut self, fs: u64) {
        self.events.push(format!("time {fs}"));
    }
}
