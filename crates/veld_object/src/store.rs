//! The store: a collection of arenas with allocation, freeze, and GC.

use crate::arena::Arena;
use crate::handle::{ArenaId, Generation, Handle};
use crate::node::Node;

/// Errors from object store operations.
#[derive(Debug, thiserror::Error)]
pub enum ObjectError {
    /// The arena id does not name a live arena.
    #[error("arena {0} is not live")]
    UnknownArena(u32),

    /// A mutation was attempted on a frozen arena.
    #[error("arena {0} is frozen")]
    Frozen(u32),

    /// Freezing found a reference from this arena to a younger one.
    #[error("arena {arena} (generation {from}) references younger generation {to}")]
    FreezeViolation {
        /// The arena being frozen.
        arena: u32,
        /// Its generation.
        from: u32,
        /// The younger generation it references.
        to: u32,
    },
}

/// Counters returned by [`ObjectStore::gc`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GcStats {
    /// Arenas dropped by this collection.
    pub collected: usize,
    /// Arenas retained by this collection.
    pub retained: usize,
}

/// A set of arenas holding nodes of one domain.
///
/// Arenas are created with monotonically increasing generations. Handles
/// stay valid until a [`gc`](Self::gc) call drops the arena they point
/// into; callers keep handles alive by listing them as roots.
#[derive(Debug, Clone)]
pub struct ObjectStore<T: Node> {
    arenas: Vec<Option<Arena<T>>>,
    next_generation: u32,
}

impl<T: Node> ObjectStore<T> {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            arenas: Vec::new(),
            next_generation: 0,
        }
    }

    /// Opens a new unfrozen arena with the next generation stamp.
    pub fn new_arena(&mut self) -> ArenaId {
        let id = ArenaId::from_raw(self.arenas.len() as u32);
        let generation = Generation(self.next_generation);
        self.next_generation += 1;
        self.arenas.push(Some(Arena::new(generation)));
        id
    }

    /// Returns the arena for `id`, or `None` if it was collected.
    pub fn arena(&self, id: ArenaId) -> Option<&Arena<T>> {
        self.arenas.get(id.as_raw() as usize)?.as_ref()
    }

    fn arena_mut(&mut self, id: ArenaId) -> Result<&mut Arena<T>, ObjectError> {
        self.arenas
            .get_mut(id.as_raw() as usize)
            .and_then(Option::as_mut)
            .ok_or(ObjectError::UnknownArena(id.as_raw()))
    }

    /// Allocates a node in the given arena.
    pub fn alloc(&mut self, arena: ArenaId, node: T) -> Result<Handle, ObjectError> {
        let a = self.arena_mut(arena)?;
        if a.is_frozen() {
            return Err(ObjectError::Frozen(arena.as_raw()));
        }
        let index = a.push(node);
        Ok(Handle::new(arena, index))
    }

    /// Returns the node for `handle`.
    ///
    /// # Panics
    ///
    /// Panics if the handle's arena was collected or the index is out of
    /// range; such a handle was not kept rooted across a `gc` call.
    pub fn get(&self, handle: Handle) -> &T {
        self.try_get(handle)
            .unwrap_or_else(|| panic!("dangling handle {handle}"))
    }

    /// Returns the node for `handle`, or `None` if it is dangling.
    pub fn try_get(&self, handle: Handle) -> Option<&T> {
        self.arena(handle.arena)?.get(handle.index)
    }

    /// Returns the node for `handle` mutably.
    ///
    /// Fails if the arena is frozen or the handle is dangling.
    pub fn get_mut(&mut self, handle: Handle) -> Result<&mut T, ObjectError> {
        let a = self.arena_mut(handle.arena)?;
        if a.is_frozen() {
            return Err(ObjectError::Frozen(handle.arena.as_raw()));
        }
        a.get_mut(handle.index)
            .ok_or(ObjectError::UnknownArena(handle.arena.as_raw()))
    }

    /// Freezes an arena, making it immutable.
    ///
    /// Verifies the freeze invariant first: no node in the arena may
    /// reference an arena with a younger generation. Freezing an already
    /// frozen arena is a no-op.
    pub fn freeze(&mut self, id: ArenaId) -> Result<(), ObjectError> {
        let own_gen = self
            .arena(id)
            .ok_or(ObjectError::UnknownArena(id.as_raw()))?
            .generation();

        let mut violation = None;
        if let Some(a) = self.arena(id) {
            for node in a.iter() {
                node.visit_handles(&mut |h| {
                    if violation.is_none() {
                        if let Some(target) = self.arena(h.arena) {
                            if target.generation() > own_gen {
                                violation = Some(target.generation());
                            }
                        }
                    }
                });
            }
        }

        if let Some(younger) = violation {
            return Err(ObjectError::FreezeViolation {
                arena: id.as_raw(),
                from: own_gen.0,
                to: younger.0,
            });
        }

        self.arena_mut(id)?.set_frozen();
        Ok(())
    }

    /// Returns the generation of an arena, or `None` if it was collected.
    pub fn generation_of(&self, id: ArenaId) -> Option<Generation> {
        self.arena(id).map(Arena::generation)
    }

    /// Collects arenas unreachable from the pinned roots.
    ///
    /// Unfrozen arenas are implicitly pinned; beyond that, an arena survives
    /// iff it holds a root handle or is referenced (transitively) by a
    /// surviving arena. Collected arenas are dropped whole; no compaction
    /// takes place. Handles into collected arenas become dangling, so
    /// callers must re-root anything they intend to keep.
    pub fn gc(&mut self, roots: &[Handle]) -> GcStats {
        let n = self.arenas.len();
        let mut marked = vec![false; n];

        for (i, slot) in self.arenas.iter().enumerate() {
            if let Some(a) = slot {
                if !a.is_frozen() {
                    marked[i] = true;
                }
            }
        }
        for root in roots {
            let i = root.arena.as_raw() as usize;
            if i < n && self.arenas[i].is_some() {
                marked[i] = true;
            }
        }

        // Propagate reachability until fixed point; the arena graph is
        // acyclic by generation so this terminates quickly.
        loop {
            let mut changed = false;
            for i in 0..n {
                if !marked[i] {
                    continue;
                }
                if let Some(a) = &self.arenas[i] {
                    for node in a.iter() {
                        node.visit_handles(&mut |h| {
                            let j = h.arena.as_raw() as usize;
                            if j < n && !marked[j] && self.arenas[j].is_some() {
                                marked[j] = true;
                                changed = true;
                            }
                        });
                    }
                }
            }
            if !changed {
                break;
            }
        }

        let mut stats = GcStats::default();
        for (i, slot) in self.arenas.iter_mut().enumerate() {
            if slot.is_some() {
                if marked[i] {
                    stats.retained += 1;
                } else {
                    *slot = None;
                    stats.collected += 1;
                }
            }
        }
        stats
    }
}

impl<T: Node> Default for ObjectStore<T> {
    fn default() -> Self {
        Self::new()
    }
}
