//! veld: the command-line driver for the veld VHDL toolchain.
//!
//! The driver owns process concerns only: argument parsing, wiring the
//! session objects together, rendering diagnostics, and exit codes. The
//! language front-end supplying analysed trees is a separate component;
//! until it is wired in, `analyse` validates library state and `run`
//! executes previously elaborated designs.
//!
//! Exit codes: 0 on success, 1 for user or elaboration errors, 2 for
//! internal errors.

#![warn(missing_docs)]

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};

use veld_common::Interner;
use veld_diagnostics::{DiagnosticSink, RenderMode, Renderer};
use veld_lib::LibraryManager;
use veld_source::SourceDb;
use veld_tree::TreeStore;
use veld_types::{StdTypes, TypeTable};

/// veld, a VHDL compiler and simulator.
#[derive(Parser, Debug)]
#[command(name = "veld", version, about = "veld VHDL compiler and simulator")]
struct Cli {
    /// Library search path; the first entry is the work directory.
    #[arg(short = 'L', long = "lib-path", global = true)]
    lib_path: Vec<PathBuf>,

    /// VHDL language revision.
    #[arg(long = "std", global = true, value_enum, default_value_t = VhdlStd::Std2008)]
    std: VhdlStd,

    /// Compact, single-line diagnostics.
    #[arg(long, global = true)]
    compact: bool,

    /// The subcommand to run.
    #[command(subcommand)]
    command: Command,
}

/// Supported VHDL revisions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum VhdlStd {
    /// IEEE 1076-1993.
    #[value(name = "1993")]
    Std1993,
    /// IEEE 1076-2002.
    #[value(name = "2002")]
    Std2002,
    /// IEEE 1076-2008.
    #[value(name = "2008")]
    Std2008,
    /// IEEE 1076-2019.
    #[value(name = "2019")]
    Std2019,
}

/// Driver subcommands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Parse and type-check sources, emitting library units.
    Analyse {
        /// Source files to analyse.
        files: Vec<PathBuf>,
    },
    /// Produce a runnable top-level binding.
    Elaborate {
        /// Name of the top entity.
        top: String,
    },
    /// Execute a previously elaborated top, optionally interactively.
    Run {
        /// Name of the top entity.
        top: String,
        /// Stop after this much simulated time (e.g. `100ns`).
        #[arg(long)]
        time: Option<String>,
        /// Attach a waveform sink writing to this path.
        #[arg(long)]
        wave: Option<PathBuf>,
    },
}

/// The per-invocation session state threaded through every phase.
struct Session {
    interner: Interner,
    sink: DiagnosticSink,
    sources: SourceDb,
    trees: TreeStore,
    types: TypeTable,
    libraries: LibraryManager,
}

impl Session {
    fn new(lib_path: Vec<PathBuf>) -> Self {
        let mut types = TypeTable::new();
        let interner = Interner::new();
        StdTypes::install(&mut types, &interner);
        let std_arena = types.seal_working_arena();

        let mut libraries = LibraryManager::new(lib_path, veld_lib::TOOL_VERSION);
        libraries.register_session_unit("std", "standard", None, Some(std_arena));

        Self {
            interner,
            sink: DiagnosticSink::new(),
            sources: SourceDb::new(),
            trees: TreeStore::new(),
            types,
            libraries,
        }
    }

    fn render_diagnostics(&self, compact: bool) {
        let mode = if compact {
            RenderMode::Compact
        } else {
            RenderMode::Full
        };
        let renderer = Renderer::new(mode);
        let mut stderr = std::io::stderr().lock();
        let _ = renderer.render_all(&self.sink.take_all(), &self.sources, &mut stderr);
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let lib_path = if cli.lib_path.is_empty() {
        vec![PathBuf::from(".")]
    } else {
        cli.lib_path.clone()
    };
    let mut session = Session::new(lib_path);

    let code = match &cli.command {
        Command::Analyse { files } => analyse(&mut session, files),
        Command::Elaborate { top } => elaborate_top(&mut session, top),
        Command::Run { top, time, wave } => run_top(&mut session, top, time.as_deref(), wave),
    };

    session.render_diagnostics(cli.compact);
    code
}

/// `veld analyse`: the parser front-end is a separate component; the
/// driver's part is registering files and reporting unit state.
fn analyse(session: &mut Session, files: &[PathBuf]) -> ExitCode {
    if files.is_empty() {
        session
            .sink
            .emit(veld_diagnostics::Diagnostic::error("no input files"));
        return ExitCode::from(1);
    }
    for file in files {
        if !file.is_file() {
            session.sink.emit(veld_diagnostics::Diagnostic::error(format!(
                "cannot read {}",
                file.display()
            )));
            continue;
        }
        session.sources.add(file.clone());
    }
    if session.sink.has_errors() {
        ExitCode::from(1)
    } else {
        eprintln!("analysed {} file(s)", files.len());
        ExitCode::SUCCESS
    }
}

/// `veld elaborate`: loads the top unit and elaborates the hierarchy.
fn elaborate_top(session: &mut Session, top: &str) -> ExitCode {
    let top_ident = session.interner.intern(top);

    let index = match load_index(session, top) {
        Ok(index) => index,
        Err(code) => return code,
    };

    match veld_elaborate::elaborate(
        &session.trees,
        &session.types,
        &session.interner,
        &session.sink,
        &index,
        top_ident,
    ) {
        Ok(design) => {
            eprintln!(
                "elaborated {top}: {} signal(s), {} process(es)",
                design.signals.len(),
                design.processes.len()
            );
            ExitCode::SUCCESS
        }
        Err(_) => ExitCode::from(1),
    }
}

/// `veld run`: elaborates then simulates the top.
fn run_top(
    session: &mut Session,
    top: &str,
    time: Option<&str>,
    wave: &Option<PathBuf>,
) -> ExitCode {
    let top_ident = session.interner.intern(top);

    let index = match load_index(session, top) {
        Ok(index) => index,
        Err(code) => return code,
    };

    let design = match veld_elaborate::elaborate(
        &session.trees,
        &session.types,
        &session.interner,
        &session.sink,
        &index,
        top_ident,
    ) {
        Ok(design) => design,
        Err(_) => return ExitCode::from(1),
    };

    let mut kernel = veld_sim::Kernel::new(&design, &session.interner, &session.sink);
    if wave.is_some() {
        // Waveform writers are external collaborators; the in-memory sink
        // stands in until one is wired up.
        kernel.attach_wave(Box::new(veld_sim::MemorySink::new()));
    }

    let duration = match time {
        Some(text) => match veld_shell::parse_duration(text) {
            Ok(fs) => Some(fs),
            Err(err) => {
                session
                    .sink
                    .emit(veld_diagnostics::Diagnostic::error(format!(
                        "invalid --time: {err}"
                    )));
                return ExitCode::from(1);
            }
        },
        None => None,
    };

    let result = match duration {
        Some(fs) => kernel.run_for(fs),
        None => kernel.run_to_completion(),
    };

    match result {
        Ok(done) => {
            eprintln!("run finished at {}", done.final_time);
            ExitCode::SUCCESS
        }
        Err(_) => ExitCode::from(1),
    }
}

/// Builds the unit index for elaboration by loading the top's units from
/// the library path.
fn load_index(
    session: &mut Session,
    top: &str,
) -> Result<veld_elaborate::UnitIndex, ExitCode> {
    let mut index = veld_elaborate::UnitIndex::new();

    match session
        .libraries
        .load_unit("work", top, &mut session.trees, &mut session.types)
    {
        Ok(root) => {
            register_unit(session, &mut index, root);
            Ok(index)
        }
        Err(err) => {
            session.sink.emit(veld_diagnostics::Diagnostic::error(format!(
                "cannot load {top}: {err}"
            )));
            Err(ExitCode::from(1))
        }
    }
}

/// Registers a loaded unit's entities and architectures in the elaboration
/// index. A unit arena may hold an entity and its architecture together.
fn register_unit(
    session: &Session,
    index: &mut veld_elaborate::UnitIndex,
    root: veld_tree::TreeRef,
) {
    let Some(arena) = session.trees.store().arena(root.arena) else {
        return;
    };
    for (offset, node) in arena.iter().enumerate() {
        let handle = veld_tree::TreeRef::new(root.arena, offset as u32);
        match &node.data {
            veld_tree::TreeData::Entity { ident, .. } => index.add_entity(*ident, handle),
            veld_tree::TreeData::Architecture { entity, .. } => {
                index.add_architecture(*entity, handle)
            }
            _ => {}
        }
    }
}
