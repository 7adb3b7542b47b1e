//! Unit serialization: turning an arena into bytes and back.
//!
//! A serialized unit is one arena. The image records the arena's generation,
//! the schema digest of the node domain, and a dependency table naming every
//! foreign unit the arena references. Handles inside nodes are rewritten to
//! sentinel forms: local references become indices into the image's own node
//! list, external references become rows of the externals table, each naming
//! a dependency and an index within it. Deserialization reverses the
//! rewriting against units already loaded into the store.

use crate::handle::{ArenaId, Handle};
use crate::node::Node;
use crate::store::{ObjectError, ObjectStore};
use serde::{Deserialize, Serialize};
use veld_common::ContentHash;

/// A dependency of a serialized unit: the stable name of another unit and
/// the generation it had when this unit was written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepRef {
    /// The library holding the dependency.
    pub library: String,
    /// The unit name within that library.
    pub unit: String,
    /// The dependency's arena generation at serialization time.
    pub generation: u32,
}

/// The serialized form of one arena.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitImage<T> {
    /// Generation of the serialized arena.
    pub generation: u32,
    /// Digest of the node schema active when the unit was written.
    pub schema_digest: ContentHash,
    /// Units this arena references.
    pub deps: Vec<DepRef>,
    /// External references: `(dependency row, node index within it)`.
    pub externals: Vec<(u32, u32)>,
    /// The arena's nodes in allocation order, handles rewritten.
    pub nodes: Vec<T>,
    /// Index of the unit's top object.
    pub root: u32,
}

/// A serialized unit is unusable with the current tool or library state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StaleUnitError {
    /// The unit was written under a different node schema.
    #[error("schema digest mismatch: unit has {found}, tool expects {expected}")]
    DigestMismatch {
        /// Digest the current tool expects.
        expected: ContentHash,
        /// Digest found in the unit.
        found: ContentHash,
    },

    /// A dependency named by the unit could not be located.
    #[error("missing dependency {library}.{unit}")]
    MissingDependency {
        /// The dependency's library name.
        library: String,
        /// The dependency's unit name.
        unit: String,
    },
}

/// Errors from serializing a unit.
#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    /// The root's arena must be frozen before serialization.
    #[error("arena {0} must be frozen before serialization")]
    NotFrozen(u32),

    /// A referenced arena has no library/unit name.
    #[error("arena {0} is referenced but has no unit name")]
    UnnamedDependency(u32),

    /// The root handle does not point at a live node.
    #[error("root handle is dangling")]
    DanglingRoot,

    /// Binary encoding failed.
    #[error("encode error: {0}")]
    Encode(String),
}

impl<T: Node> UnitImage<T> {
    /// Encodes the image to bytes with bincode.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SerializeError> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| SerializeError::Encode(e.to_string()))
    }

    /// Decodes an image from bytes. Returns `None` on malformed input; the
    /// caller treats that the same as a missing unit.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .ok()
            .map(|(image, _)| image)
    }
}

/// Serializes the arena holding `root` into a [`UnitImage`].
///
/// The arena must be frozen. `name_of` supplies the `(library, unit)` name
/// for every foreign arena the unit references; returning `None` aborts
/// with [`SerializeError::UnnamedDependency`].
pub fn serialize_unit<T: Node>(
    store: &ObjectStore<T>,
    root: Handle,
    name_of: &mut dyn FnMut(ArenaId) -> Option<(String, String)>,
) -> Result<UnitImage<T>, SerializeError> {
    let arena = store
        .arena(root.arena)
        .ok_or(SerializeError::DanglingRoot)?;
    if !arena.is_frozen() {
        return Err(SerializeError::NotFrozen(root.arena.as_raw()));
    }
    if arena.get(root.index).is_none() {
        return Err(SerializeError::DanglingRoot);
    }

    let mut deps: Vec<DepRef> = Vec::new();
    let mut dep_rows: Vec<(ArenaId, u32)> = Vec::new();
    let mut externals: Vec<(u32, u32)> = Vec::new();
    let mut error = None;

    let mut nodes: Vec<T> = Vec::with_capacity(arena.len());
    for node in arena.iter() {
        let mut copy = node.clone();
        copy.map_handles(&mut |h| {
            if h.arena == root.arena {
                return Handle::new(ArenaId::LOCAL, h.index);
            }
            let row = match dep_rows.iter().find(|(a, _)| *a == h.arena) {
                Some((_, row)) => *row,
                None => match name_of(h.arena) {
                    Some((library, unit)) => {
                        let generation = store
                            .generation_of(h.arena)
                            .map(|g| g.0)
                            .unwrap_or_default();
                        let row = deps.len() as u32;
                        deps.push(DepRef {
                            library,
                            unit,
                            generation,
                        });
                        dep_rows.push((h.arena, row));
                        row
                    }
                    None => {
                        error = Some(SerializeError::UnnamedDependency(h.arena.as_raw()));
                        return h;
                    }
                },
            };
            let ext = externals.len() as u32;
            externals.push((row, h.index));
            Handle::new(ArenaId::EXTERN, ext)
        });
        nodes.push(copy);
    }

    if let Some(err) = error {
        return Err(err);
    }

    Ok(UnitImage {
        generation: arena.generation().0,
        schema_digest: T::schema().digest(),
        deps,
        externals,
        nodes,
        root: root.index,
    })
}

/// Loads a [`UnitImage`] into a fresh frozen arena of `store`.
///
/// The image's schema digest must match the current schema, and every
/// dependency must resolve through `resolve_dep` to an arena already in the
/// store; otherwise nothing is modified and a [`StaleUnitError`] is
/// returned. Returns the handle of the unit's top object.
pub fn deserialize_unit<T: Node>(
    store: &mut ObjectStore<T>,
    image: UnitImage<T>,
    resolve_dep: &mut dyn FnMut(&DepRef) -> Option<ArenaId>,
) -> Result<Handle, StaleUnitError> {
    let expected = T::schema().digest();
    if image.schema_digest != expected {
        return Err(StaleUnitError::DigestMismatch {
            expected,
            found: image.schema_digest,
        });
    }

    let mut dep_arenas = Vec::with_capacity(image.deps.len());
    for dep in &image.deps {
        match resolve_dep(dep) {
            Some(arena) => dep_arenas.push(arena),
            None => {
                return Err(StaleUnitError::MissingDependency {
                    library: dep.library.clone(),
                    unit: dep.unit.clone(),
                })
            }
        }
    }

    let arena = store.new_arena();
    for (index, mut node) in image.nodes.into_iter().enumerate() {
        node.map_handles(&mut |h| {
            if h.arena == ArenaId::LOCAL {
                Handle::new(arena, h.index)
            } else if h.arena == ArenaId::EXTERN {
                let (row, foreign_index) = image.externals[h.index as usize];
                Handle::new(dep_arenas[row as usize], foreign_index)
            } else {
                h
            }
        });
        let allocated = store
            .alloc(arena, node)
            .expect("fresh arena accepts allocation");
        debug_assert_eq!(allocated.index, index as u32);
    }

    match store.freeze(arena) {
        Ok(()) => {}
        Err(ObjectError::FreezeViolation { .. }) => {
            // A dependency resolved to a younger arena; treat the unit as
            // stale rather than leave a half-frozen store.
            let first = image.deps.first();
            return Err(StaleUnitError::MissingDependency {
                library: first.map(|d| d.library.clone()).unwrap_or_default(),
                unit: first.map(|d| d.unit.clone()).unwrap_or_default(),
            });
        }
        Err(_) => unreachable!("fresh arena is live"),
    }

    Ok(Handle::new(arena, image.root))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{items, ItemSlot, KindSchema, ObjectTag, SchemaTable};

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct TestNode {
        label: u32,
        refs: Vec<Handle>,
    }

    static TEST_SCHEMA: SchemaTable = SchemaTable {
        tag: ObjectTag::Tree,
        kinds: &[KindSchema {
            name: "NODE",
            items: items(&[ItemSlot::Ref]),
        }],
        transitions: &[],
    };

    impl Node for TestNode {
        const TAG: ObjectTag = ObjectTag::Tree;

        fn schema() -> &'static SchemaTable {
            &TEST_SCHEMA
        }

        fn kind(&self) -> u32 {
            0
        }

        fn visit_handles(&self, f: &mut dyn FnMut(Handle)) {
            for h in &self.refs {
                f(*h);
            }
        }

        fn map_handles(&mut self, f: &mut dyn FnMut(Handle) -> Handle) {
            for h in &mut self.refs {
                *h = f(*h);
            }
        }
    }

    fn no_deps(_: ArenaId) -> Option<(String, String)> {
        None
    }

    #[test]
    fn roundtrip_single_arena() {
        let mut store: ObjectStore<TestNode> = ObjectStore::new();
        let arena = store.new_arena();
        let leaf = store
            .alloc(
                arena,
                TestNode {
                    label: 2,
                    refs: vec![],
                },
            )
            .unwrap();
        let root = store
            .alloc(
                arena,
                TestNode {
                    label: 1,
                    refs: vec![leaf],
                },
            )
            .unwrap();
        store.freeze(arena).unwrap();

        let image = serialize_unit(&store, root, &mut no_deps).unwrap();
        let bytes = image.to_bytes().unwrap();
        let decoded: UnitImage<TestNode> = UnitImage::from_bytes(&bytes).unwrap();

        let mut fresh: ObjectStore<TestNode> = ObjectStore::new();
        let new_root = deserialize_unit(&mut fresh, decoded, &mut |_| None).unwrap();

        let root_node = fresh.get(new_root);
        assert_eq!(root_node.label, 1);
        assert_eq!(fresh.get(root_node.refs[0]).label, 2);
    }

    #[test]
    fn unfrozen_arena_rejected() {
        let mut store: ObjectStore<TestNode> = ObjectStore::new();
        let arena = store.new_arena();
        let root = store
            .alloc(
                arena,
                TestNode {
                    label: 1,
                    refs: vec![],
                },
            )
            .unwrap();
        assert!(matches!(
            serialize_unit(&store, root, &mut no_deps),
            Err(SerializeError::NotFrozen(_))
        ));
    }

    #[test]
    fn digest_mismatch_is_stale() {
        let mut store: ObjectStore<TestNode> = ObjectStore::new();
        let arena = store.new_arena();
        let root = store
            .alloc(
                arena,
                TestNode {
                    label: 1,
                    refs: vec![],
                },
            )
            .unwrap();
        store.freeze(arena).unwrap();

        let mut image = serialize_unit(&store, root, &mut no_deps).unwrap();
        image.schema_digest = ContentHash::from_bytes(b"not the real schema");

        let mut fresh: ObjectStore<TestNode> = ObjectStore::new();
        assert!(matches!(
            deserialize_unit(&mut fresh, image, &mut |_| None),
            Err(StaleUnitError::DigestMismatch { .. })
        ));
    }

    #[test]
    fn cross_arena_reference_becomes_dependency() {
        let mut store: ObjectStore<TestNode> = ObjectStore::new();
        let dep_arena = store.new_arena();
        let dep_node = store
            .alloc(
                dep_arena,
                TestNode {
                    label: 10,
                    refs: vec![],
                },
            )
            .unwrap();
        store.freeze(dep_arena).unwrap();

        let unit_arena = store.new_arena();
        let root = store
            .alloc(
                unit_arena,
                TestNode {
                    label: 1,
                    refs: vec![dep_node],
                },
            )
            .unwrap();
        store.freeze(unit_arena).unwrap();

        let image = serialize_unit(&store, root, &mut |arena| {
            assert_eq!(arena, dep_arena);
            Some(("std".to_string(), "standard".to_string()))
        })
        .unwrap();

        assert_eq!(image.deps.len(), 1);
        assert_eq!(image.deps[0].library, "std");
        assert_eq!(image.deps[0].unit, "standard");
        assert_eq!(image.externals.len(), 1);

        // Load into a fresh store where the dependency is already present.
        let mut fresh: ObjectStore<TestNode> = ObjectStore::new();
        let fresh_dep = fresh.new_arena();
        fresh
            .alloc(
                fresh_dep,
                TestNode {
                    label: 10,
                    refs: vec![],
                },
            )
            .unwrap();
        fresh.freeze(fresh_dep).unwrap();

        let new_root = deserialize_unit(&mut fresh, image, &mut |dep| {
            assert_eq!(dep.library, "std");
            Some(fresh_dep)
        })
        .unwrap();

        let target = fresh.get(new_root).refs[0];
        assert_eq!(fresh.get(target).label, 10);
    }

    #[test]
    fn missing_dependency_is_stale() {
        let mut store: ObjectStore<TestNode> = ObjectStore::new();
        let dep_arena = store.new_arena();
        let dep_node = store
            .alloc(
                dep_arena,
                TestNode {
                    label: 10,
                    refs: vec![],
                },
            )
            .unwrap();
        store.freeze(dep_arena).unwrap();

        let unit_arena = store.new_arena();
        let root = store
            .alloc(
                unit_arena,
                TestNode {
                    label: 1,
                    refs: vec![dep_node],
                },
            )
            .unwrap();
        store.freeze(unit_arena).unwrap();

        let image = serialize_unit(&store, root, &mut |_| {
            Some(("work".to_string(), "pkg".to_string()))
        })
        .unwrap();

        let mut fresh: ObjectStore<TestNode> = ObjectStore::new();
        let before = fresh.gc(&[]);
        assert_eq!(before.retained, 0);

        let err = deserialize_unit(&mut fresh, image, &mut |_| None).unwrap_err();
        assert!(matches!(err, StaleUnitError::MissingDependency { .. }));
    }

    #[test]
    fn unnamed_dependency_fails_serialization() {
        let mut store: ObjectStore<TestNode> = ObjectStore::new();
        let dep_arena = store.new_arena();
        let dep_node = store
            .alloc(
                dep_arena,
                TestNode {
                    label: 10,
                    refs: vec![],
                },
            )
            .unwrap();
        store.freeze(dep_arena).unwrap();

        let unit_arena = store.new_arena();
        let root = store
            .alloc(
                unit_arena,
                TestNode {
                    label: 1,
                    refs: vec![dep_node],
                },
            )
            .unwrap();
        store.freeze(unit_arena).unwrap();

        assert!(matches!(
            serialize_unit(&store, root, &mut no_deps),
            Err(SerializeError::UnnamedDependency(_))
        ));
    }
}
