//! The waveform sink contract.
//!
//! Waveform writers (VCD, FST, ...) are external collaborators; the kernel
//! only promises the calls below. `emit_time` is called at most once per
//! distinct time stamp and `emit_value` exactly once per `(delta, signal)`
//! in which the signal's resolved value changed.

/// A waveform output sink.
pub trait WaveSink {
    /// Starts a dump for the design rooted at `top`.
    fn begin_dump(&mut self, top: &str, timescale_fs: u64);

    /// Declares a signal and returns the sink's key for it.
    fn declare_signal(&mut self, path: &str, type_descriptor: &str) -> u64;

    /// Announces a new time stamp in femtoseconds.
    fn emit_time(&mut self, t: u64);

    /// Records a value change for a declared signal.
    fn emit_value(&mut self, key: u64, bytes: &[u8]);

    /// Finishes the dump.
    fn end_dump(&mut self);
}

/// A recorded call on a [`MemorySink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaveCall {
    /// `begin_dump(top, timescale)`.
    Begin(String, u64),
    /// `declare_signal(path, type) -> key`.
    Declare(String, String, u64),
    /// `emit_time(t)`.
    Time(u64),
    /// `emit_value(key, bytes)`.
    Value(u64, Vec<u8>),
    /// `end_dump()`.
    End,
}

/// A sink that records every call, for tests and the shell's signal-update
/// feed.
#[derive(Debug, Default)]
pub struct MemorySink {
    /// Every call in order.
    pub calls: Vec<WaveCall>,
    next_key: u64,
}

impl MemorySink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the times announced so far.
    pub fn times(&self) -> Vec<u64> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                WaveCall::Time(t) => Some(*t),
                _ => None,
            })
            .collect()
    }

    /// Returns the value changes recorded for `key`.
    pub fn values_for(&self, key: u64) -> Vec<Vec<u8>> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                WaveCall::Value(k, bytes) if *k == key => Some(bytes.clone()),
                _ => None,
            })
            .collect()
    }
}

impl WaveSink for MemorySink {
    fn begin_dump(&mut self, top: &str, timescale_fs: u64) {
        self.calls.push(WaveCall::Begin(top.to_string(), timescale_fs));
    }

    fn declare_signal(&mut self, path: &str, type_descriptor: &str) -> u64 {
        let key = self.next_key;
        self.next_key += 1;
        self.calls.push(WaveCall::Declare(
            path.to_string(),
            type_descriptor.to_string(),
            key,
        ));
        key
    }

    fn emit_time(&mut self, t: u64) {
        self.calls.push(WaveCall::Time(t));
    }

    fn emit_value(&mut self, key: u64, bytes: &[u8]) {
        self.calls.push(WaveCall::Value(key, bytes.to_vec()));
    }

    fn end_dump(&mut self) {
        self.calls.push(WaveCall::End);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_records_in_order() {
        let mut sink = MemorySink::new();
        sink.begin_dump("top", 1);
        let key = sink.declare_signal("top.clk", "STD_LOGIC");
        sink.emit_time(0);
        sink.emit_value(key, &[1]);
        sink.end_dump();

        assert_eq!(sink.calls.len(), 5);
        assert_eq!(sink.times(), vec![0]);
        assert_eq!(sink.values_for(key), vec![vec![1]]);
    }

    #[test]
    fn keys_are_distinct() {
        let mut sink = MemorySink::new();
        let a = sink.declare_signal("a", "BIT");
        let b = sink.declare_signal("b", "BIT");
        assert_ne!(a, b);
    }
}
