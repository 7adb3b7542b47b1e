//! The shell: command evaluation over a simulation kernel.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use veld_common::Logic;
use veld_ir::Value;
use veld_sim::{Kernel, SimTime, WatchId};

use crate::command::{parse_command, ShellCommand};
use crate::output::ShellOutput;

/// The interactive shell.
///
/// Owns the kernel and a vector of output handlers. Commands execute
/// between delta cycles; a runtime trap ends the run but not the shell,
/// which can `reset` and run again.
pub struct Shell<'a> {
    kernel: Kernel<'a>,
    handlers: Vec<Box<dyn ShellOutput>>,
    pending_updates: Rc<RefCell<Vec<(String, String)>>>,
    watch_ids: HashMap<String, WatchId>,
    quit: bool,
}

impl<'a> Shell<'a> {
    /// Creates a shell over a kernel.
    pub fn new(kernel: Kernel<'a>) -> Self {
        Self {
            kernel,
            handlers: Vec::new(),
            pending_updates: Rc::new(RefCell::new(Vec::new())),
            watch_ids: HashMap::new(),
            quit: false,
        }
    }

    /// Subscribes an output handler.
    pub fn add_handler(&mut self, handler: Box<dyn ShellOutput>) {
        self.handlers.push(handler);
    }

    /// Returns `true` once `quit` has been executed.
    pub fn is_done(&self) -> bool {
        self.quit
    }

    /// Returns the kernel's current time.
    pub fn now(&self) -> SimTime {
        self.kernel.now()
    }

    /// Parses and executes one input line. Parse errors go to the error
    /// handlers; the shell keeps running.
    pub fn execute_line(&mut self, line: &str) {
        match parse_command(line) {
            Ok(cmd) => self.execute(&cmd),
            Err(err) => self.err(&err),
        }
    }

    /// Executes a parsed command.
    pub fn execute(&mut self, cmd: &ShellCommand) {
        match cmd {
            ShellCommand::Reset => {
                self.kernel.reset();
                for handler in &mut self.handlers {
                    handler.sim_restarted();
                }
                self.out("simulation reset");
            }
            ShellCommand::Run { duration_fs } => self.run(*duration_fs),
            ShellCommand::Continue => self.run(None),
            ShellCommand::Examine { names } => {
                for name in names {
                    match self.kernel.find_signal(name) {
                        Some(flat) => {
                            let text = format_value(self.kernel.signal_value(flat));
                            self.out(&format!("{name} = {text}"));
                        }
                        None => self.err(&format!("no signal named {name}")),
                    }
                }
            }
            ShellCommand::Force { name, value } => match self.kernel.find_signal(name) {
                Some(flat) => match parse_force_value(value) {
                    Some(parsed) => {
                        self.kernel.force(flat, parsed);
                        self.out(&format!("forcing {name} = {value}"));
                    }
                    None => self.err(&format!("cannot parse value '{value}'")),
                },
                None => self.err(&format!("no signal named {name}")),
            },
            ShellCommand::Release { name } => match self.kernel.find_signal(name) {
                Some(flat) => {
                    self.kernel.release(flat);
                    self.out(&format!("released {name}"));
                }
                None => self.err(&format!("no signal named {name}")),
            },
            ShellCommand::Watch { name } => match self.kernel.find_signal(name) {
                Some(flat) => {
                    let path = name.clone();
                    let queue = Rc::clone(&self.pending_updates);
                    let id = self.kernel.add_watch(
                        flat,
                        Box::new(move |event| {
                            queue
                                .borrow_mut()
                                .push((path.clone(), format_value(event.value)));
                        }),
                    );
                    self.watch_ids.insert(name.clone(), id);
                    self.out(&format!("watching {name}"));
                }
                None => self.err(&format!("no signal named {name}")),
            },
            ShellCommand::Unwatch { name } => match self.watch_ids.remove(name) {
                Some(id) => {
                    self.kernel.remove_watch(id);
                    self.out(&format!("unwatched {name}"));
                }
                None => self.err(&format!("{name} is not being watched")),
            },
            ShellCommand::Help => self.out(HELP_TEXT),
            ShellCommand::Quit => self.quit = true,
        }
    }

    fn run(&mut self, duration_fs: Option<u64>) {
        for handler in &mut self.handlers {
            handler.sim_started();
        }
        let result = match duration_fs {
            Some(d) => self.kernel.run_for(d),
            None => self.kernel.run_to_completion(),
        };
        self.drain_updates();
        match result {
            Ok(done) => {
                for handler in &mut self.handlers {
                    handler.next_time_step(done.final_time.fs);
                }
                self.out(&format!("ran to {}", done.final_time));
            }
            Err(err) => {
                // Fatal to the run, not to the shell.
                self.err(&err.to_string());
            }
        }
    }

    fn drain_updates(&mut self) {
        let updates: Vec<(String, String)> =
            self.pending_updates.borrow_mut().drain(..).collect();
        for (path, value) in updates {
            for handler in &mut self.handlers {
                handler.signal_update(&path, &value);
            }
        }
    }

    fn out(&mut self, text: &str) {
        for handler in &mut self.handlers {
            handler.stdout(text);
        }
    }

    fn err(&mut self, text: &str) {
        for handler in &mut self.handlers {
            handler.stderr(text);
        }
    }
}

/// Formats a runtime value for display.
fn format_value(value: Value) -> String {
    match value {
        Value::Int(v) => v.to_string(),
        Value::Real(v) => v.to_string(),
    }
}

/// Parses a force value: an integer, or a logic character like `'1'`.
fn parse_force_value(text: &str) -> Option<Value> {
    if let Ok(v) = text.parse::<i64>() {
        return Some(Value::Int(v));
    }
    let bare = text.trim_matches('\'');
    let mut chars = bare.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Logic::from_char(c).map(|l| Value::Int(l.ordinal() as i64)),
        _ => None,
    }
}

const HELP_TEXT: &str = "\
commands:
  reset                 return to the post-elaboration state
  run [duration]   (r)  run for a duration (e.g. 'run 100ns') or to completion
  continue         (c)  run until the event queue drains
  examine <sig>..  (e)  print signal values
  force <sig> <v>       override a signal until released
  release <sig>         release a forced signal
  watch <sig>      (w)  report changes of a signal
  unwatch <sig>         stop reporting changes
  help             (h)  this text
  quit             (q)  leave the shell

durations: fs, ps, ns, us, ms, s";
