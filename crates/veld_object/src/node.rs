//! The trait connecting domain node types to the object store.

use crate::handle::Handle;
use crate::schema::{ObjectTag, SchemaTable};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A node storable in an [`ObjectStore`](crate::ObjectStore).
///
/// Each domain (tree, type, IR unit, runtime) implements this once for its
/// node enum. The handle visitors drive serialization and garbage
/// collection without any per-slot runtime lookup: the implementation
/// enumerates exactly the handles its variant carries.
pub trait Node: Clone + Serialize + DeserializeOwned {
    /// The domain tag of this node type.
    const TAG: ObjectTag;

    /// The compile-time schema for this domain, used for digests and slot
    /// checks.
    fn schema() -> &'static SchemaTable;

    /// The kind number of this node, indexing [`SchemaTable::kinds`].
    fn kind(&self) -> u32;

    /// Calls `f` for every handle this node references.
    fn visit_handles(&self, f: &mut dyn FnMut(Handle));

    /// Rewrites every handle this node references through `f`.
    fn map_handles(&mut self, f: &mut dyn FnMut(Handle) -> Handle);
}
