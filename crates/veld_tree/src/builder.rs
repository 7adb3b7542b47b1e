//! Convenience wrapper for building trees in a working arena.

use crate::node::{TreeData, TreeNode, TreeRef};
use veld_object::{ArenaId, ObjectStore};
use veld_source::Loc;

/// Tree storage with one open working arena.
///
/// Analysis builds each design unit into the working arena, then seals it;
/// library loading adds further frozen arenas through the store.
pub struct TreeStore {
    store: ObjectStore<TreeNode>,
    arena: ArenaId,
}

impl TreeStore {
    /// Creates a store with one open working arena.
    pub fn new() -> Self {
        let mut store = ObjectStore::new();
        let arena = store.new_arena();
        Self { store, arena }
    }

    /// Adds a node to the working arena.
    pub fn add(&mut self, node: TreeNode) -> TreeRef {
        self.store
            .alloc(self.arena, node)
            .expect("working arena accepts allocation")
    }

    /// Adds a node with the dummy location.
    pub fn synth(&mut self, data: TreeData) -> TreeRef {
        self.add(TreeNode::synthetic(data))
    }

    /// Adds a node at the given location.
    pub fn at(&mut self, loc: Loc, data: TreeData) -> TreeRef {
        self.add(TreeNode::at(loc, data))
    }

    /// Returns the node for a tree reference.
    pub fn get(&self, t: TreeRef) -> &TreeNode {
        self.store.get(t)
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &ObjectStore<TreeNode> {
        &self.store
    }

    /// Returns the underlying store mutably, for serialization and GC.
    pub fn store_mut(&mut self) -> &mut ObjectStore<TreeNode> {
        &mut self.store
    }

    /// Returns the current working arena.
    pub fn working_arena(&self) -> ArenaId {
        self.arena
    }

    /// Freezes the current working arena and opens a fresh one.
    pub fn seal_working_arena(&mut self) -> ArenaId {
        let sealed = self.arena;
        self.store
            .freeze(sealed)
            .expect("working arena satisfies the freeze invariant");
        self.arena = self.store.new_arena();
        sealed
    }
}

impl Default for TreeStore {
    fn default() -> Self {
        Self::new()
    }
}
