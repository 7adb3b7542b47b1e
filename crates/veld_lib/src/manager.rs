//! The library manager: saving, loading, and linking design units.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use veld_object::{
    deserialize_unit, serialize_unit, ArenaId, DepRef, Handle, StaleUnitError,
};
use veld_tree::{TreeRef, TreeStore};
use veld_types::{TypeRef, TypeTable};

use crate::catalog::{Catalog, UnitMeta};
use crate::error::LibError;
use crate::format::{UnitFile, UnitPayload, TYPE_EXTERN, TYPE_LOCAL, UNIT_EXT};

/// A unit present in the session, either analysed here or loaded from disk.
#[derive(Debug, Clone, Copy)]
pub struct LoadedUnit {
    /// The unit's top tree object, if it has a tree.
    pub tree_root: Option<TreeRef>,
    /// The arena holding the unit's trees.
    pub tree_arena: Option<ArenaId>,
    /// The arena holding the unit's types, if it declares any.
    pub type_arena: Option<ArenaId>,
    /// The generation recorded in the unit's serialized image.
    pub generation: u32,
}

/// Manages design libraries on a search path.
///
/// Libraries are directories named after the library; the first search path
/// entry is where new libraries are created. The manager memoizes loaded
/// units and records which arena belongs to which `(library, unit)` pair so
/// cross-unit references serialize as stable triples.
pub struct LibraryManager {
    search_path: Vec<PathBuf>,
    tool_version: String,
    loaded: HashMap<(String, String), LoadedUnit>,
    tree_arena_names: HashMap<u32, (String, String)>,
    type_arena_names: HashMap<u32, (String, String)>,
    loading: HashSet<(String, String)>,
}

impl LibraryManager {
    /// Creates a manager over the given search path.
    pub fn new(search_path: Vec<PathBuf>, tool_version: &str) -> Self {
        Self {
            search_path,
            tool_version: tool_version.to_string(),
            loaded: HashMap::new(),
            tree_arena_names: HashMap::new(),
            type_arena_names: HashMap::new(),
            loading: HashSet::new(),
        }
    }

    /// Registers a unit that exists only in the session, such as the
    /// built-in STD and IEEE type arenas, so other units may depend on it.
    pub fn register_session_unit(
        &mut self,
        library: &str,
        unit: &str,
        tree_root: Option<TreeRef>,
        type_arena: Option<ArenaId>,
    ) {
        let key = (library.to_string(), unit.to_string());
        if let Some(root) = tree_root {
            self.tree_arena_names
                .insert(root.arena.as_raw(), key.clone());
        }
        if let Some(arena) = type_arena {
            self.type_arena_names.insert(arena.as_raw(), key.clone());
        }
        self.loaded.insert(
            key,
            LoadedUnit {
                tree_root,
                tree_arena: tree_root.map(|r| r.arena),
                type_arena,
                generation: 0,
            },
        );
    }

    /// Returns a previously loaded or registered unit.
    pub fn lookup(&self, library: &str, unit: &str) -> Option<&LoadedUnit> {
        self.loaded
            .get(&(library.to_string(), unit.to_string()))
    }

    fn lib_dir(&self, library: &str) -> Option<PathBuf> {
        self.search_path
            .iter()
            .map(|p| p.join(library))
            .find(|d| d.is_dir())
    }

    fn lib_dir_or_create(&self, library: &str) -> Result<PathBuf, LibError> {
        if let Some(dir) = self.lib_dir(library) {
            return Ok(dir);
        }
        let first = self
            .search_path
            .first()
            .ok_or_else(|| LibError::UnknownLibrary(library.to_string()))?;
        let dir = first.join(library);
        std::fs::create_dir_all(&dir).map_err(|e| LibError::Io {
            path: dir.clone(),
            source: e,
        })?;
        Ok(dir)
    }

    fn unit_path(dir: &Path, unit: &str) -> PathBuf {
        dir.join(format!("{unit}.{UNIT_EXT}"))
    }

    /// Saves a design unit into a library.
    ///
    /// The unit is the frozen arena holding `root`, plus the frozen
    /// `type_arena` if the unit declares types. The unit is also registered
    /// in the session so later units can depend on it.
    pub fn save_unit(
        &mut self,
        library: &str,
        unit: &str,
        trees: &TreeStore,
        types: &TypeTable,
        root: TreeRef,
        type_arena: Option<ArenaId>,
    ) -> Result<(), LibError> {
        // Serialize the unit's types first, naming foreign type arenas.
        let type_names = self.type_arena_names.clone();
        let types_image = match type_arena {
            Some(arena) => Some(
                serialize_unit(types.store(), Handle::new(arena, 0), &mut |foreign| {
                    type_names.get(&foreign.as_raw()).cloned()
                })
                .map_err(|e| LibError::Serialize(e.to_string()))?,
            ),
            None => None,
        };

        // Serialize the tree arena, naming foreign tree arenas.
        let tree_names = self.tree_arena_names.clone();
        let mut tree_image = serialize_unit(trees.store(), root, &mut |foreign| {
            tree_names.get(&foreign.as_raw()).cloned()
        })
        .map_err(|e| LibError::Serialize(e.to_string()))?;

        // Rewrite type references in the tree image to sentinels: local
        // types become image indices, foreign types become dependency rows.
        let mut type_deps: Vec<DepRef> = Vec::new();
        let mut type_externs: Vec<(u32, u32)> = Vec::new();
        let mut unnamed_type_arena = None;
        for node in &mut tree_image.nodes {
            node.map_type_refs(&mut |t: TypeRef| {
                if Some(t.arena) == type_arena {
                    return Handle::new(TYPE_LOCAL, t.index);
                }
                let Some((dep_lib, dep_unit)) = type_names.get(&t.arena.as_raw()) else {
                    unnamed_type_arena = Some(t.arena);
                    return t;
                };
                let row = match type_deps
                    .iter()
                    .position(|d| d.library == *dep_lib && d.unit == *dep_unit)
                {
                    Some(row) => row as u32,
                    None => {
                        let generation = self
                            .loaded
                            .get(&(dep_lib.clone(), dep_unit.clone()))
                            .map(|u| u.generation)
                            .unwrap_or_default();
                        type_deps.push(DepRef {
                            library: dep_lib.clone(),
                            unit: dep_unit.clone(),
                            generation,
                        });
                        (type_deps.len() - 1) as u32
                    }
                };
                let ext = type_externs.len() as u32;
                type_externs.push((row, t.index));
                Handle::new(TYPE_EXTERN, ext)
            });
        }
        if let Some(arena) = unnamed_type_arena {
            return Err(LibError::Serialize(format!(
                "type arena {} is referenced but has no unit name",
                arena.as_raw()
            )));
        }

        let generation = tree_image.generation;

        let mut all_deps = tree_image.deps.clone();
        if let Some(image) = &types_image {
            all_deps.extend(image.deps.iter().cloned());
        }
        all_deps.extend(type_deps.iter().cloned());
        all_deps.sort_by(|a, b| (&a.library, &a.unit).cmp(&(&b.library, &b.unit)));
        all_deps.dedup_by(|a, b| a.library == b.library && a.unit == b.unit);

        let payload = UnitPayload {
            types: types_image,
            tree: tree_image,
            type_deps,
            type_externs,
        };
        let file = UnitFile::new(&self.tool_version, all_deps, payload)?;

        let dir = self.lib_dir_or_create(library)?;
        file.write(&Self::unit_path(&dir, unit))?;

        let mut catalog =
            Catalog::load(&dir).unwrap_or_else(|| Catalog::new(&self.tool_version));
        catalog.tool_version = self.tool_version.clone();
        catalog.units.insert(unit.to_string(), UnitMeta { generation });
        catalog.save(&dir)?;

        let key = (library.to_string(), unit.to_string());
        self.tree_arena_names.insert(root.arena.as_raw(), key.clone());
        if let Some(arena) = type_arena {
            self.type_arena_names.insert(arena.as_raw(), key.clone());
        }
        self.loaded.insert(
            key,
            LoadedUnit {
                tree_root: Some(root),
                tree_arena: Some(root.arena),
                type_arena,
                generation,
            },
        );
        Ok(())
    }

    /// Loads a design unit, linking its dependencies first.
    ///
    /// Loads are memoized: a unit already in the session is returned as-is.
    /// Any staleness (schema digest mismatch, missing or mismatched
    /// dependency) surfaces before session state is touched.
    pub fn load_unit(
        &mut self,
        library: &str,
        unit: &str,
        trees: &mut TreeStore,
        types: &mut TypeTable,
    ) -> Result<TreeRef, LibError> {
        let key = (library.to_string(), unit.to_string());
        if let Some(existing) = self.loaded.get(&key) {
            return existing.tree_root.ok_or_else(|| LibError::UnknownUnit {
                library: library.to_string(),
                unit: unit.to_string(),
            });
        }

        if !self.loading.insert(key.clone()) {
            return Err(LibError::Corrupt {
                path: PathBuf::from(format!("{library}/{unit}")),
                reason: "circular unit dependency".to_string(),
            });
        }
        let result = self.load_unit_inner(library, unit, trees, types);
        self.loading.remove(&key);
        result
    }

    fn load_unit_inner(
        &mut self,
        library: &str,
        unit: &str,
        trees: &mut TreeStore,
        types: &mut TypeTable,
    ) -> Result<TreeRef, LibError> {
        let dir = self
            .lib_dir(library)
            .ok_or_else(|| LibError::UnknownLibrary(library.to_string()))?;
        let path = Self::unit_path(&dir, unit);
        if !path.is_file() {
            return Err(LibError::UnknownUnit {
                library: library.to_string(),
                unit: unit.to_string(),
            });
        }

        let file = UnitFile::read(&path)?;

        // Validate schema digests before touching any session state, so a
        // stale unit leaves no partial arenas behind.
        let expected_tree = <veld_tree::TreeNode as veld_object::Node>::schema().digest();
        if file.payload.tree.schema_digest != expected_tree {
            return Err(StaleUnitError::DigestMismatch {
                expected: expected_tree,
                found: file.payload.tree.schema_digest,
            }
            .into());
        }
        if let Some(types_image) = &file.payload.types {
            let expected_type = <veld_types::TypeNode as veld_object::Node>::schema().digest();
            if types_image.schema_digest != expected_type {
                return Err(StaleUnitError::DigestMismatch {
                    expected: expected_type,
                    found: types_image.schema_digest,
                }
                .into());
            }
        }

        // Link dependencies first, depth first.
        for dep in &file.header.deps {
            let dep_key = (dep.library.clone(), dep.unit.clone());
            if !self.loaded.contains_key(&dep_key) {
                self.load_unit(&dep.library, &dep.unit, trees, types)?;
            }
            let resolved = &self.loaded[&dep_key];
            if resolved.generation != dep.generation {
                return Err(StaleUnitError::MissingDependency {
                    library: dep.library.clone(),
                    unit: dep.unit.clone(),
                }
                .into());
            }
        }

        let UnitPayload {
            types: types_image,
            mut tree,
            type_deps,
            type_externs,
        } = file.payload;

        // Load the unit's own types.
        let loaded = self.loaded.clone();
        let type_arena = match types_image {
            Some(image) => Some(
                deserialize_unit(types.store_mut(), image, &mut |dep| {
                    loaded
                        .get(&(dep.library.clone(), dep.unit.clone()))
                        .and_then(|u| u.type_arena)
                })?
                .arena,
            ),
            None => None,
        };

        // Rewrite type sentinels in the tree image to live handles.
        let mut missing_dep: Option<DepRef> = None;
        for node in &mut tree.nodes {
            node.map_type_refs(&mut |t| {
                if t.arena == TYPE_LOCAL {
                    match type_arena {
                        Some(arena) => Handle::new(arena, t.index),
                        None => {
                            missing_dep = Some(DepRef {
                                library: library.to_string(),
                                unit: unit.to_string(),
                                generation: 0,
                            });
                            t
                        }
                    }
                } else if t.arena == TYPE_EXTERN {
                    let (row, index) = type_externs[t.index as usize];
                    let dep = &type_deps[row as usize];
                    match loaded
                        .get(&(dep.library.clone(), dep.unit.clone()))
                        .and_then(|u| u.type_arena)
                    {
                        Some(arena) => Handle::new(arena, index),
                        None => {
                            missing_dep = Some(dep.clone());
                            t
                        }
                    }
                } else {
                    t
                }
            });
        }
        if let Some(dep) = missing_dep {
            return Err(StaleUnitError::MissingDependency {
                library: dep.library,
                unit: dep.unit,
            }
            .into());
        }

        let generation = tree.generation;
        let root = deserialize_unit(trees.store_mut(), tree, &mut |dep| {
            loaded
                .get(&(dep.library.clone(), dep.unit.clone()))
                .and_then(|u| u.tree_arena)
        })?;

        let key = (library.to_string(), unit.to_string());
        self.tree_arena_names.insert(root.arena.as_raw(), key.clone());
        if let Some(arena) = type_arena {
            self.type_arena_names.insert(arena.as_raw(), key.clone());
        }
        self.loaded.insert(
            key,
            LoadedUnit {
                tree_root: Some(root),
                tree_arena: Some(root.arena),
                type_arena,
                generation,
            },
        );
        Ok(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veld_common::{ContentHash, Interner};
    use veld_tree::{tree_strict_eq, TreeData};
    use veld_types::{Range, TypeNode};

    struct Session {
        trees: TreeStore,
        types: TypeTable,
        interner: Interner,
    }

    impl Session {
        fn new() -> Self {
            Self {
                trees: TreeStore::new(),
                types: TypeTable::new(),
                interner: Interner::new(),
            }
        }
    }

    /// Builds a small entity+architecture unit declaring its own type.
    fn build_unit(session: &mut Session) -> (TreeRef, ArenaId) {
        let int = session.types.add(TypeNode::Integer {
            ident: session.interner.intern("COUNT_T"),
            range: Range::to(0, 255),
        });
        let type_arena = session.types.seal_working_arena();

        let init = session.trees.synth(TreeData::IntLit { value: 0 });
        let sig = session.trees.synth(TreeData::SignalDecl {
            ident: session.interner.intern("count"),
            ty: int,
            init: Some(init),
        });
        let root = session.trees.synth(TreeData::Architecture {
            ident: session.interner.intern("rtl"),
            entity: session.interner.intern("top"),
            decls: vec![sig],
            stmts: vec![],
        });
        session.trees.seal_working_arena();
        (root, type_arena)
    }

    #[test]
    fn save_load_roundtrip_strict_equality() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new();
        let (root, type_arena) = build_unit(&mut session);

        let mut mgr = LibraryManager::new(vec![dir.path().to_path_buf()], "0.1.0");
        mgr.save_unit(
            "work",
            "rtl",
            &session.trees,
            &session.types,
            root,
            Some(type_arena),
        )
        .unwrap();

        // Load into a fresh manager over the same session stores.
        let mut mgr2 = LibraryManager::new(vec![dir.path().to_path_buf()], "0.1.0");
        let reloaded = mgr2
            .load_unit("work", "rtl", &mut session.trees, &mut session.types)
            .unwrap();

        assert_ne!(root.arena, reloaded.arena);
        assert!(tree_strict_eq(
            session.trees.store(),
            &session.types,
            root,
            reloaded
        ));
    }

    #[test]
    fn load_is_memoized() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new();
        let (root, type_arena) = build_unit(&mut session);

        let mut mgr = LibraryManager::new(vec![dir.path().to_path_buf()], "0.1.0");
        mgr.save_unit(
            "work",
            "rtl",
            &session.trees,
            &session.types,
            root,
            Some(type_arena),
        )
        .unwrap();

        // The saving manager already has the unit; a load returns it as-is.
        let again = mgr
            .load_unit("work", "rtl", &mut session.trees, &mut session.types)
            .unwrap();
        assert_eq!(again, root);
    }

    #[test]
    fn unknown_unit_errors() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("work")).unwrap();
        let mut session = Session::new();
        let mut mgr = LibraryManager::new(vec![dir.path().to_path_buf()], "0.1.0");
        assert!(matches!(
            mgr.load_unit("work", "ghost", &mut session.trees, &mut session.types),
            Err(LibError::UnknownUnit { .. })
        ));
    }

    #[test]
    fn unknown_library_errors() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new();
        let mut mgr = LibraryManager::new(vec![dir.path().to_path_buf()], "0.1.0");
        assert!(matches!(
            mgr.load_unit("nolib", "x", &mut session.trees, &mut session.types),
            Err(LibError::UnknownLibrary(_))
        ));
    }

    #[test]
    fn stale_digest_rejected_without_partial_state() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new();
        let (root, type_arena) = build_unit(&mut session);

        let mut mgr = LibraryManager::new(vec![dir.path().to_path_buf()], "0.1.0");
        mgr.save_unit(
            "work",
            "rtl",
            &session.trees,
            &session.types,
            root,
            Some(type_arena),
        )
        .unwrap();

        // Tamper with the stored schema digest, simulating a unit written
        // by a tool with a different node schema.
        let path = dir.path().join("work").join("rtl.unit");
        let mut file = UnitFile::read(&path).unwrap();
        file.payload.tree.schema_digest = ContentHash::from_bytes(b"other schema");
        let file = UnitFile::new("0.1.0", file.header.deps.clone(), file.payload).unwrap();
        file.write(&path).unwrap();

        let tree_arenas_before = count_arenas(session.trees.store());
        let mut mgr2 = LibraryManager::new(vec![dir.path().to_path_buf()], "0.1.0");
        let err = mgr2
            .load_unit("work", "rtl", &mut session.trees, &mut session.types)
            .unwrap_err();
        assert!(matches!(
            err,
            LibError::Stale(StaleUnitError::DigestMismatch { .. })
        ));
        // No partial state: no new tree arena appeared.
        assert_eq!(count_arenas(session.trees.store()), tree_arenas_before);
    }

    fn count_arenas<T: veld_object::Node>(store: &veld_object::ObjectStore<T>) -> usize {
        // Arena ids are dense; probe until a gap of unknown ids.
        let mut n = 0;
        while store.arena(ArenaId::from_raw(n)).is_some()
            || store.generation_of(ArenaId::from_raw(n)).is_some()
        {
            n += 1;
            if n > 10_000 {
                break;
            }
        }
        n as usize
    }

    #[test]
    fn cross_unit_type_dependency() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new();

        // Unit A declares a type.
        let shared = session.types.add(TypeNode::Integer {
            ident: session.interner.intern("SHARED_T"),
            range: Range::to(0, 15),
        });
        let a_types = session.types.seal_working_arena();
        let a_root = session.trees.synth(TreeData::Entity {
            ident: session.interner.intern("pkg"),
            generics: vec![],
            ports: vec![],
        });
        session.trees.seal_working_arena();

        let mut mgr = LibraryManager::new(vec![dir.path().to_path_buf()], "0.1.0");
        mgr.save_unit(
            "work",
            "pkg",
            &session.trees,
            &session.types,
            a_root,
            Some(a_types),
        )
        .unwrap();

        // Unit B references A's type.
        let sig = session.trees.synth(TreeData::SignalDecl {
            ident: session.interner.intern("s"),
            ty: shared,
            init: None,
        });
        let b_root = session.trees.synth(TreeData::Architecture {
            ident: session.interner.intern("rtl"),
            entity: session.interner.intern("top"),
            decls: vec![sig],
            stmts: vec![],
        });
        session.trees.seal_working_arena();
        mgr.save_unit("work", "rtl", &session.trees, &session.types, b_root, None)
            .unwrap();

        // A fresh manager loads B; A's types come in transitively.
        let mut mgr2 = LibraryManager::new(vec![dir.path().to_path_buf()], "0.1.0");
        let reloaded = mgr2
            .load_unit("work", "rtl", &mut session.trees, &mut session.types)
            .unwrap();

        assert!(tree_strict_eq(
            session.trees.store(),
            &session.types,
            b_root,
            reloaded
        ));
        assert!(mgr2.lookup("work", "pkg").is_some());
    }
}
