//! The simulation kernel: event queue, delta cycles, drivers, processes,
//! and watches.

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap};

use veld_common::{Interner, Logic};
use veld_diagnostics::{Diagnostic, DiagnosticSink};
use veld_elaborate::{Design, Resolution};
use veld_ir::{Backend, Frame, Interpreter, NoSignals, SignalAccess, StepOutcome, Value};

use crate::error::SimError;
use crate::time::SimTime;
use crate::wave::WaveSink;

/// Default bound on delta cycles per instant.
const DEFAULT_MAX_DELTA: u32 = 10_000;

/// Scheduling state of a process.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ProcessState {
    /// Suspended with nothing to wake it.
    Idle,
    /// Scheduled to run in the current delta.
    Ready,
    /// Currently executing.
    Running,
    /// Suspended until an event on its wait set.
    WaitingOnEvent,
    /// Suspended until a timeout.
    WaitingOnTime,
    /// Terminated; will never run again.
    Dead,
}

/// Identifier of a registered watch.
pub type WatchId = usize;

/// Delivered to watch callbacks at the end of a delta in which the watched
/// signal changed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WatchEvent {
    /// Flat index of the changed signal.
    pub signal: usize,
    /// When the change was applied.
    pub time: SimTime,
    /// The new resolved value.
    pub value: Value,
}

/// Callback invoked for a watched signal.
pub type WatchCallback = Box<dyn FnMut(&WatchEvent)>;

/// The result of a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunResult {
    /// Simulation time when the run stopped.
    pub final_time: SimTime,
    /// Delta cycles executed over the kernel's lifetime.
    pub total_deltas: u64,
}

#[derive(Debug, Clone, PartialEq)]
enum Action {
    Drive {
        signal: usize,
        driver: usize,
        value: Value,
    },
    Wake {
        process: usize,
        epoch: u64,
    },
    Reeval {
        signal: usize,
    },
    StopAt,
}

#[derive(Debug, Clone, PartialEq)]
struct QueuedEvent {
    time: SimTime,
    seq: u64,
    action: Action,
}

impl Eq for QueuedEvent {}

impl Ord for QueuedEvent {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Insertion sequence breaks ties deterministically.
        self.time.cmp(&other.time).then(self.seq.cmp(&other.seq))
    }
}

impl PartialOrd for QueuedEvent {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone)]
struct Driver {
    value: Value,
}

#[derive(Debug, Clone)]
struct SignalState {
    current: Value,
    previous: Value,
    drivers: Vec<Driver>,
    forced: Option<Value>,
}

struct ProcessRt {
    frame: Frame,
    state: ProcessState,
    wait_set: Vec<usize>,
    epoch: u64,
}

struct Watch {
    signal: usize,
    callback: WatchCallback,
}

/// Bridges the interpreter's process-local signal indices to the kernel's
/// flat space, collecting drives for scheduling after the activation.
struct ProcessSignals<'k> {
    signals: &'k [SignalState],
    map: &'k [usize],
    drives: Vec<(usize, Value, u64)>,
}

impl SignalAccess for ProcessSignals<'_> {
    fn read(&self, signal: u32) -> Value {
        let flat = self.map[signal as usize];
        self.signals[flat].current
    }

    fn drive(&mut self, signal: u32, value: Value, after_fs: u64) {
        let flat = self.map[signal as usize];
        self.drives.push((flat, value, after_fs));
    }
}

/// The discrete-event simulation kernel over an elaborated design.
///
/// Single-threaded and cooperative: processes are coroutine-shaped IR units
/// that run to their next wait. Two runs with identical stimulus produce
/// identical event traces.
pub struct Kernel<'a> {
    design: &'a Design,
    interner: &'a Interner,
    sink: &'a DiagnosticSink,
    backend: Box<dyn Backend>,
    time: SimTime,
    queue: BinaryHeap<Reverse<QueuedEvent>>,
    seq: u64,
    signals: Vec<SignalState>,
    processes: Vec<ProcessRt>,
    proc_driver: HashMap<(usize, usize), usize>,
    external_driver: HashMap<usize, usize>,
    watches: Vec<Option<Watch>>,
    wave: Option<Box<dyn WaveSink>>,
    wave_keys: Vec<u64>,
    wave_last_time: Option<u64>,
    stop_at_boundary: bool,
    halt: bool,
    max_delta: u32,
    total_deltas: u64,
}

impl<'a> Kernel<'a> {
    /// Creates a kernel over an elaborated design.
    ///
    /// All processes start ready, matching the initial execution VHDL
    /// prescribes at time zero.
    pub fn new(design: &'a Design, interner: &'a Interner, sink: &'a DiagnosticSink) -> Self {
        let mut kernel = Self {
            design,
            interner,
            sink,
            backend: Box::new(Interpreter::new()),
            time: SimTime::ZERO,
            queue: BinaryHeap::new(),
            seq: 0,
            signals: Vec::new(),
            processes: Vec::new(),
            proc_driver: HashMap::new(),
            external_driver: HashMap::new(),
            watches: Vec::new(),
            wave: None,
            wave_keys: Vec::new(),
            wave_last_time: None,
            stop_at_boundary: false,
            halt: false,
            max_delta: DEFAULT_MAX_DELTA,
            total_deltas: 0,
        };
        kernel.build_runtime_state();
        kernel
    }

    /// Replaces the execution backend. The interpreter is the default and
    /// the reference; an alternative must match it observably.
    pub fn set_backend(&mut self, backend: Box<dyn Backend>) {
        self.backend = backend;
    }

    /// Sets the bound on delta cycles per instant.
    pub fn set_max_delta(&mut self, max: u32) {
        self.max_delta = max;
    }

    fn build_runtime_state(&mut self) {
        self.signals = self
            .design
            .signals
            .iter()
            .map(|def| SignalState {
                current: def.init,
                previous: def.init,
                drivers: Vec::new(),
                forced: None,
            })
            .collect();

        // One driver slot per (process, driven signal), in process order.
        for (p, def) in self.design.processes.iter().enumerate() {
            for &flat in &def.drives {
                let slot = self.signals[flat].drivers.len();
                self.signals[flat].drivers.push(Driver {
                    value: self.design.signals[flat].init,
                });
                self.proc_driver.insert((p, flat), slot);
            }
        }

        self.processes = self
            .design
            .processes
            .iter()
            .map(|def| ProcessRt {
                frame: Frame::new(self.design.pool.get(def.unit)),
                state: ProcessState::Ready,
                wait_set: def.sensitivity.clone(),
                epoch: 0,
            })
            .collect();
    }

    /// Resets the kernel to its post-elaboration state.
    pub fn reset(&mut self) {
        self.time = SimTime::ZERO;
        self.queue.clear();
        self.seq = 0;
        self.proc_driver.clear();
        self.external_driver.clear();
        self.stop_at_boundary = false;
        self.halt = false;
        self.total_deltas = 0;
        self.wave_last_time = None;
        self.build_runtime_state();
    }

    /// Returns the current simulation time.
    pub fn now(&self) -> SimTime {
        self.time
    }

    /// Returns the current resolved value of a signal.
    pub fn signal_value(&self, flat: usize) -> Value {
        self.signals[flat].current
    }

    /// Returns the scheduling state of a process.
    pub fn process_state(&self, index: usize) -> ProcessState {
        self.processes[index].state
    }

    /// Finds a signal by hierarchical name.
    pub fn find_signal(&self, name: &str) -> Option<usize> {
        self.design
            .signals
            .iter()
            .position(|s| self.interner.resolve(s.name) == name)
    }

    /// Returns `true` if events remain in the queue.
    pub fn has_pending_events(&self) -> bool {
        !self.queue.is_empty()
    }

    fn push_event(&mut self, time: SimTime, action: Action) {
        let seq = self.seq;
        self.seq += 1;
        self.queue.push(Reverse(QueuedEvent { time, seq, action }));
    }

    /// Schedules an external stimulus on a signal at an absolute time.
    ///
    /// Uses a driver slot owned by the environment rather than a process.
    pub fn schedule_stimulus(&mut self, flat: usize, value: Value, at: SimTime) {
        let driver = self.external_driver_slot(flat);
        self.push_event(at, Action::Drive {
            signal: flat,
            driver,
            value,
        });
    }

    fn external_driver_slot(&mut self, flat: usize) -> usize {
        if let Some(&slot) = self.external_driver.get(&flat) {
            return slot;
        }
        let slot = self.signals[flat].drivers.len();
        self.signals[flat].drivers.push(Driver {
            value: self.design.signals[flat].init,
        });
        self.external_driver.insert(flat, slot);
        slot
    }

    /// Forces a signal to a value, overriding its drivers until
    /// [`release`](Self::release).
    pub fn force(&mut self, flat: usize, value: Value) {
        self.signals[flat].forced = Some(value);
        self.push_event(self.time.next_delta(), Action::Reeval { signal: flat });
    }

    /// Releases a forced signal back to its drivers.
    pub fn release(&mut self, flat: usize) {
        self.signals[flat].forced = None;
        self.push_event(self.time.next_delta(), Action::Reeval { signal: flat });
    }

    /// Registers a watch on a signal. The callback fires at the end of each
    /// delta in which the signal's resolved value changed, in registration
    /// order.
    pub fn add_watch(&mut self, flat: usize, callback: WatchCallback) -> WatchId {
        let id = self.watches.len();
        self.watches.push(Some(Watch {
            signal: flat,
            callback,
        }));
        id
    }

    /// Removes a watch.
    pub fn remove_watch(&mut self, id: WatchId) {
        if let Some(slot) = self.watches.get_mut(id) {
            *slot = None;
        }
    }

    /// Attaches a waveform sink, declaring every signal.
    pub fn attach_wave(&mut self, mut sink: Box<dyn WaveSink>) {
        let top = self
            .design
            .scopes
            .first()
            .map(|s| self.interner.resolve(s.name).to_string())
            .unwrap_or_default();
        sink.begin_dump(&top, 1);
        self.wave_keys = self
            .design
            .signals
            .iter()
            .map(|def| {
                let path = self.interner.resolve(def.name);
                // Pretty-printing needs the type table; the stable type
                // name recorded at elaboration is enough for sinks.
                sink.declare_signal(path, &format!("{}b", def.width_bytes))
            })
            .collect();
        self.wave = Some(sink);
        self.wave_last_time = None;
    }

    /// Detaches the waveform sink, finishing the dump.
    pub fn detach_wave(&mut self) -> Option<Box<dyn WaveSink>> {
        if let Some(mut sink) = self.wave.take() {
            sink.end_dump();
            Some(sink)
        } else {
            None
        }
    }

    /// Requests a cooperative stop: takes effect between ready processes
    /// and at delta boundaries; in-flight IR runs to its next wait.
    pub fn request_stop(&mut self) {
        self.halt = true;
    }

    /// Runs for `duration_fs` femtoseconds of simulated time.
    ///
    /// Internally schedules a synthetic stop event; every delta of the
    /// final instant still executes before the stop takes effect.
    pub fn run_for(&mut self, duration_fs: u64) -> Result<RunResult, SimError> {
        let end = self.time.fs + duration_fs;
        self.push_event(SimTime::from_fs(end), Action::StopAt);
        self.run_loop()
    }

    /// Runs until the event queue drains or a stop is requested.
    pub fn run_to_completion(&mut self) -> Result<RunResult, SimError> {
        self.run_loop()
    }

    fn run_loop(&mut self) -> Result<RunResult, SimError> {
        loop {
            if self.halt {
                break;
            }

            let has_ready = self
                .processes
                .iter()
                .any(|p| p.state == ProcessState::Ready);

            if !has_ready {
                let Some(Reverse(head)) = self.queue.peek() else {
                    break;
                };
                let next = head.time;
                if next.fs > self.time.fs {
                    // Advancing wall-clock time is where a scheduled stop
                    // takes effect: the final instant drains completely.
                    if self.stop_at_boundary {
                        break;
                    }
                    self.time = SimTime::from_fs(next.fs);
                } else if next > self.time {
                    self.time = next;
                }
            }

            if self.time.delta >= self.max_delta {
                return Err(SimError::DeltaLimit {
                    time_fs: self.time.fs,
                    max_delta: self.max_delta,
                });
            }

            self.step_delta()?;
        }

        Ok(RunResult {
            final_time: self.time,
            total_deltas: self.total_deltas,
        })
    }

    /// Executes one delta cycle at the current stamp.
    fn step_delta(&mut self) -> Result<(), SimError> {
        // 1. Dequeue every event at the current stamp, in insertion order.
        let mut dirty = BTreeSet::new();
        while let Some(Reverse(head)) = self.queue.peek() {
            if head.time > self.time {
                break;
            }
            let Reverse(event) = self.queue.pop().unwrap();
            match event.action {
                Action::Drive {
                    signal,
                    driver,
                    value,
                } => {
                    self.signals[signal].drivers[driver].value = value;
                    dirty.insert(signal);
                }
                Action::Wake { process, epoch } => {
                    let p = &mut self.processes[process];
                    if p.epoch == epoch
                        && matches!(
                            p.state,
                            ProcessState::WaitingOnEvent | ProcessState::WaitingOnTime
                        )
                    {
                        p.state = ProcessState::Ready;
                    }
                }
                Action::Reeval { signal } => {
                    dirty.insert(signal);
                }
                Action::StopAt => self.stop_at_boundary = true,
            }
        }

        // 2. Resolve dirty signals and record changes.
        let mut changed = Vec::new();
        for &flat in &dirty {
            let new_value = self.resolve_signal(flat)?;
            let state = &mut self.signals[flat];
            if new_value != state.current {
                state.previous = state.current;
                state.current = new_value;
                changed.push(flat);
            }
        }

        // 3. Wake processes sensitive to the changes, in scope-DFS order.
        for process in self.processes.iter_mut() {
            if process.state == ProcessState::WaitingOnEvent
                && process.wait_set.iter().any(|s| changed.contains(s))
            {
                process.state = ProcessState::Ready;
                process.epoch += 1;
            }
        }

        // 4. Run ready processes to their next wait.
        self.run_ready()?;

        // 5. End of delta: watches in registration order, then the wave.
        self.fire_watches(&changed);
        self.emit_wave(&changed);

        self.total_deltas += 1;
        Ok(())
    }

    fn resolve_signal(&mut self, flat: usize) -> Result<Value, SimError> {
        let state = &self.signals[flat];
        if let Some(forced) = state.forced {
            return Ok(forced);
        }

        let def = &self.design.signals[flat];
        let drivers: Vec<Value> = state.drivers.iter().map(|d| d.value).collect();

        match (def.resolution, drivers.len()) {
            // A signal with no drivers only changes through force; releasing
            // it reverts to the elaborated initial value.
            (_, 0) => Ok(def.init),
            (_, 1) => Ok(drivers[0]),
            (Resolution::None, n) => {
                let err = SimError::UnresolvedDrivers {
                    signal: self.interner.resolve(def.name).to_string(),
                    time_fs: self.time.fs,
                };
                self.sink.emit(
                    Diagnostic::fatal(format!(
                        "signal {} has {n} drivers and no resolution function",
                        self.interner.resolve(def.name)
                    ))
                    .at(def.loc),
                );
                Err(err)
            }
            (Resolution::Ieee1164, _) => {
                let logic = drivers.iter().map(|v| {
                    Logic::from_ordinal(v.as_int().unwrap_or(0).clamp(0, 8) as u8)
                        .unwrap_or(Logic::U)
                });
                Ok(Value::Int(Logic::resolve_all(logic).ordinal() as i64))
            }
            (Resolution::Function(unit_id), _) => {
                let unit = self.design.pool.get(unit_id);
                let mut acc = drivers[0];
                for value in &drivers[1..] {
                    let mut frame = Frame::with_args(unit, &[acc, *value]);
                    match self.backend.execute(unit, &mut frame, &mut NoSignals)? {
                        StepOutcome::Done(Some(v)) => acc = v,
                        StepOutcome::Done(None) => acc = drivers[0],
                        StepOutcome::Wait { .. } => {
                            return Err(SimError::Trap {
                                message: "resolution function suspended".to_string(),
                                loc: veld_source::Loc::DUMMY,
                                time_fs: self.time.fs,
                            })
                        }
                        StepOutcome::Trap { message, loc } => {
                            return Err(SimError::Trap {
                                message,
                                loc,
                                time_fs: self.time.fs,
                            })
                        }
                    }
                }
                Ok(acc)
            }
        }
    }

    fn run_ready(&mut self) -> Result<(), SimError> {
        loop {
            if self.halt {
                return Ok(());
            }
            let Some(index) = self
                .processes
                .iter()
                .position(|p| p.state == ProcessState::Ready)
            else {
                return Ok(());
            };
            self.run_process(index)?;
        }
    }

    fn run_process(&mut self, index: usize) -> Result<(), SimError> {
        let def = &self.design.processes[index];
        let unit = self.design.pool.get(def.unit);
        self.processes[index].state = ProcessState::Running;

        let mut access = ProcessSignals {
            signals: &self.signals,
            map: &def.signal_map,
            drives: Vec::new(),
        };

        let outcome = {
            let process = &mut self.processes[index];
            self.backend.execute(unit, &mut process.frame, &mut access)?
        };
        let drives = access.drives;

        // Non-fatal assertion reports surface as warnings.
        for message in self.processes[index].frame.output.drain(..) {
            self.sink.emit(Diagnostic::warning(message));
        }

        match outcome {
            StepOutcome::Done(_) => {
                self.processes[index].state = ProcessState::Dead;
            }
            StepOutcome::Wait {
                sensitivity,
                timeout,
            } => {
                let wait_set: Vec<usize> = sensitivity
                    .iter()
                    .map(|local| def.signal_map[*local as usize])
                    .collect();
                let process = &mut self.processes[index];
                process.epoch += 1;
                process.wait_set = wait_set;
                process.state = if process.wait_set.is_empty() {
                    if timeout.is_some() {
                        ProcessState::WaitingOnTime
                    } else {
                        ProcessState::Idle
                    }
                } else {
                    ProcessState::WaitingOnEvent
                };
                if let Some(t) = timeout {
                    let epoch = process.epoch;
                    let when = if t == 0 {
                        self.time.next_delta()
                    } else {
                        self.time.plus_fs(t)
                    };
                    self.push_event(when, Action::Wake {
                        process: index,
                        epoch,
                    });
                }
            }
            StepOutcome::Trap { message, loc } => {
                self.processes[index].state = ProcessState::Dead;
                self.sink.emit(Diagnostic::fatal(message.clone()).at(loc));
                return Err(SimError::Trap {
                    message,
                    loc,
                    time_fs: self.time.fs,
                });
            }
        }

        // Schedule the drives collected during this activation.
        for (flat, value, after_fs) in drives {
            let driver = match self.proc_driver.get(&(index, flat)) {
                Some(&slot) => slot,
                None => self.external_driver_slot(flat),
            };
            let when = if after_fs == 0 {
                self.time.next_delta()
            } else {
                self.time.plus_fs(after_fs)
            };
            self.push_event(when, Action::Drive {
                signal: flat,
                driver,
                value,
            });
        }

        Ok(())
    }

    fn fire_watches(&mut self, changed: &[usize]) {
        if changed.is_empty() {
            return;
        }
        let mut watches = std::mem::take(&mut self.watches);
        for slot in watches.iter_mut() {
            let Some(watch) = slot else { continue };
            if changed.contains(&watch.signal) {
                let event = WatchEvent {
                    signal: watch.signal,
                    time: self.time,
                    value: self.signals[watch.signal].current,
                };
                (watch.callback)(&event);
            }
        }
        // New watches registered from inside a callback are preserved.
        for extra in self.watches.drain(..) {
            watches.push(extra);
        }
        self.watches = watches;
    }

    fn emit_wave(&mut self, changed: &[usize]) {
        if changed.is_empty() {
            return;
        }
        let Some(sink) = self.wave.as_mut() else {
            return;
        };
        if self.wave_last_time != Some(self.time.fs) {
            sink.emit_time(self.time.fs);
            self.wave_last_time = Some(self.time.fs);
        }
        for &flat in changed {
            let def = &self.design.signals[flat];
            let bytes = encode_value(self.signals[flat].current, def.width_bytes);
            sink.emit_value(self.wave_keys[flat], &bytes);
        }
    }
}

fn encode_value(value: Value, width_bytes: usize) -> Vec<u8> {
    match value {
        Value::Int(v) => v.to_le_bytes()[..width_bytes.min(8)].to_vec(),
        Value::Real(v) => v.to_le_bytes().to_vec(),
    }
}
