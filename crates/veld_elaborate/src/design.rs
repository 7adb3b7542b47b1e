//! The elaborated design: scopes, signals, processes, and compiled IR.

use std::collections::HashMap;

use veld_common::Ident;
use veld_ir::{IrPool, IrUnitId, Value};
use veld_layout::Layout;
use veld_tree::TreeRef;
use veld_types::TypeRef;

/// How multiple drivers of a signal combine.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Resolution {
    /// Single-driver signal; multiple drivers are an elaboration error and
    /// a fatal trap if reached at runtime.
    None,
    /// The built-in IEEE 1164 resolution table.
    Ieee1164,
    /// A user resolution function, folded pairwise over driver values.
    Function(IrUnitId),
}

/// One node of the scope tree.
#[derive(Clone, Debug)]
pub struct Scope {
    /// The scope's hierarchical name.
    pub name: Ident,
    /// Parent scope index; `None` for the root.
    pub parent: Option<usize>,
    /// Child scopes in instantiation order.
    pub children: Vec<usize>,
    /// Flat indices of signals declared in this scope.
    pub signals: Vec<usize>,
    /// Flat indices of processes declared in this scope.
    pub processes: Vec<usize>,
}

/// An elaborated signal.
#[derive(Clone, Debug)]
pub struct SignalDef {
    /// Full hierarchical name.
    pub name: Ident,
    /// The signal's type.
    pub ty: TypeRef,
    /// The signal layout.
    pub layout: Layout,
    /// Scalar width in bytes, from the value layout.
    pub width_bytes: usize,
    /// Initial value.
    pub init: Value,
    /// Driver resolution.
    pub resolution: Resolution,
    /// Owning scope index.
    pub scope: usize,
    /// Where the signal was declared.
    pub loc: veld_source::Loc,
}

/// An elaborated process.
#[derive(Clone, Debug)]
pub struct ProcessDef {
    /// Full hierarchical name.
    pub name: Ident,
    /// The compiled body.
    pub unit: IrUnitId,
    /// Process-local signal table: local index to flat signal index.
    pub signal_map: Vec<usize>,
    /// Flat indices of signals in the static sensitivity list.
    pub sensitivity: Vec<usize>,
    /// Flat indices of signals this process drives.
    pub drives: Vec<usize>,
    /// Owning scope index.
    pub scope: usize,
}

/// The output of elaboration: everything the kernel needs to run.
#[derive(Debug, Default)]
pub struct Design {
    /// Scope tree in depth-first creation order; index 0 is the root.
    pub scopes: Vec<Scope>,
    /// Flat signal table.
    pub signals: Vec<SignalDef>,
    /// Flat process table, in scope-DFS order.
    pub processes: Vec<ProcessDef>,
    /// Compiled IR units.
    pub pool: IrPool,
}

impl Design {
    /// Finds a signal by its full hierarchical name.
    pub fn find_signal(&self, name: Ident) -> Option<usize> {
        self.signals.iter().position(|s| s.name == name)
    }
}

/// Index of analysed design units available to the elaborator.
///
/// The parser front-end (or a test) registers entities and architectures
/// here; the elaborator resolves instantiations against it.
#[derive(Debug, Default)]
pub struct UnitIndex {
    entities: HashMap<Ident, TreeRef>,
    architectures: HashMap<Ident, TreeRef>,
}

impl UnitIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an entity declaration.
    pub fn add_entity(&mut self, name: Ident, tree: TreeRef) {
        self.entities.insert(name, tree);
    }

    /// Registers an architecture for its entity.
    ///
    /// A later registration for the same entity replaces the earlier one,
    /// matching the last-analysed-wins rule for default binding.
    pub fn add_architecture(&mut self, entity: Ident, tree: TreeRef) {
        self.architectures.insert(entity, tree);
    }

    /// Looks up an entity by name.
    pub fn entity(&self, name: Ident) -> Option<TreeRef> {
        self.entities.get(&name).copied()
    }

    /// Looks up the bound architecture of an entity.
    pub fn architecture_of(&self, entity: Ident) -> Option<TreeRef> {
        self.architectures.get(&entity).copied()
    }
}
