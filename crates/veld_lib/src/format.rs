//! The unit file format.
//!
//! Layout: a little-endian `u32` header length, the bincode-encoded
//! [`UnitHeader`], then the bincode-encoded [`UnitPayload`]. The header
//! carries everything needed to judge staleness without decoding the
//! payload: magic bytes, format and tool versions, the schema digests, the
//! dependency triples, and a payload checksum.

use serde::{Deserialize, Serialize};
use std::path::Path;
use veld_common::ContentHash;
use veld_object::{ArenaId, DepRef, UnitImage};
use veld_tree::TreeNode;
use veld_types::TypeNode;

use crate::error::LibError;

/// Magic bytes identifying a veld unit file.
pub const UNIT_MAGIC: [u8; 4] = *b"VELD";

/// Current unit file format version.
pub const UNIT_FORMAT_VERSION: u32 = 1;

/// File extension of unit files.
pub const UNIT_EXT: &str = "unit";

/// Sentinel arena marking a type reference into the unit's own type image.
pub(crate) const TYPE_LOCAL: ArenaId = ArenaId::from_raw(u32::MAX - 2);

/// Sentinel arena marking a type reference into a dependency; the index
/// selects a row of [`UnitPayload::type_externs`].
pub(crate) const TYPE_EXTERN: ArenaId = ArenaId::from_raw(u32::MAX - 3);

/// Header of a unit file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitHeader {
    /// Must equal [`UNIT_MAGIC`].
    pub magic: [u8; 4],
    /// Must equal [`UNIT_FORMAT_VERSION`].
    pub format_version: u32,
    /// Tool version that wrote the unit.
    pub tool_version: String,
    /// Digest of the tree schema the unit was written under.
    pub tree_digest: ContentHash,
    /// Digest of the type schema the unit was written under.
    pub type_digest: ContentHash,
    /// Every unit this one depends on.
    pub deps: Vec<DepRef>,
    /// Checksum of the payload bytes.
    pub checksum: ContentHash,
}

/// The serialized arenas of one design unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitPayload {
    /// The unit's type arena, if it declares types.
    pub types: Option<UnitImage<TypeNode>>,
    /// The unit's tree arena.
    pub tree: UnitImage<TreeNode>,
    /// Units whose types this unit's trees reference.
    pub type_deps: Vec<DepRef>,
    /// Type externs: `(type_deps row, node index within that unit's types)`.
    pub type_externs: Vec<(u32, u32)>,
}

/// A decoded unit file.
#[derive(Debug, Clone)]
pub struct UnitFile {
    /// The validated header.
    pub header: UnitHeader,
    /// The serialized arenas.
    pub payload: UnitPayload,
}

impl UnitFile {
    /// Assembles a unit file, computing the payload checksum.
    pub fn new(
        tool_version: &str,
        deps: Vec<DepRef>,
        payload: UnitPayload,
    ) -> Result<Self, LibError> {
        let payload_bytes =
            bincode::serde::encode_to_vec(&payload, bincode::config::standard())
                .map_err(|e| LibError::Serialize(e.to_string()))?;
        let header = UnitHeader {
            magic: UNIT_MAGIC,
            format_version: UNIT_FORMAT_VERSION,
            tool_version: tool_version.to_string(),
            tree_digest: payload.tree.schema_digest,
            type_digest: payload
                .types
                .as_ref()
                .map(|t| t.schema_digest)
                .unwrap_or_else(|| ContentHash::from_bytes(&[])),
            deps,
            checksum: ContentHash::from_bytes(&payload_bytes),
        };
        Ok(Self { header, payload })
    }

    /// Writes the unit file to `path`.
    pub fn write(&self, path: &Path) -> Result<(), LibError> {
        let payload_bytes =
            bincode::serde::encode_to_vec(&self.payload, bincode::config::standard())
                .map_err(|e| LibError::Serialize(e.to_string()))?;
        let header_bytes =
            bincode::serde::encode_to_vec(&self.header, bincode::config::standard())
                .map_err(|e| LibError::Serialize(e.to_string()))?;

        let mut out = Vec::with_capacity(4 + header_bytes.len() + payload_bytes.len());
        out.extend_from_slice(&(header_bytes.len() as u32).to_le_bytes());
        out.extend_from_slice(&header_bytes);
        out.extend_from_slice(&payload_bytes);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LibError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        std::fs::write(path, &out).map_err(|e| LibError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Reads and validates a unit file from `path`.
    pub fn read(path: &Path) -> Result<Self, LibError> {
        let raw = std::fs::read(path).map_err(|e| LibError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        let corrupt = |reason: &str| LibError::Corrupt {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        };

        if raw.len() < 4 {
            return Err(corrupt("truncated"));
        }
        let header_len = u32::from_le_bytes(raw[..4].try_into().unwrap()) as usize;
        if raw.len() < 4 + header_len {
            return Err(corrupt("truncated header"));
        }

        let header: UnitHeader =
            bincode::serde::decode_from_slice(&raw[4..4 + header_len], bincode::config::standard())
                .map_err(|_| corrupt("undecodable header"))?
                .0;

        if header.magic != UNIT_MAGIC {
            return Err(corrupt("bad magic"));
        }
        if header.format_version != UNIT_FORMAT_VERSION {
            return Err(corrupt("unsupported format version"));
        }

        let payload_bytes = &raw[4 + header_len..];
        if ContentHash::from_bytes(payload_bytes) != header.checksum {
            return Err(corrupt("checksum mismatch"));
        }

        let payload: UnitPayload =
            bincode::serde::decode_from_slice(payload_bytes, bincode::config::standard())
                .map_err(|_| corrupt("undecodable payload"))?
                .0;

        Ok(Self { header, payload })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veld_object::Node;

    fn empty_payload() -> UnitPayload {
        UnitPayload {
            types: None,
            tree: UnitImage {
                generation: 0,
                schema_digest: TreeNode::schema().digest(),
                deps: Vec::new(),
                externals: Vec::new(),
                nodes: Vec::new(),
                root: 0,
            },
            type_deps: Vec::new(),
            type_externs: Vec::new(),
        }
    }

    #[test]
    fn write_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("top.unit");

        let file = UnitFile::new("0.1.0", Vec::new(), empty_payload()).unwrap();
        file.write(&path).unwrap();

        let read = UnitFile::read(&path).unwrap();
        assert_eq!(read.header.magic, UNIT_MAGIC);
        assert_eq!(read.header.tool_version, "0.1.0");
        assert_eq!(
            read.payload.tree.schema_digest,
            TreeNode::schema().digest()
        );
    }

    #[test]
    fn read_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.unit");
        std::fs::write(&path, b"zz").unwrap();
        assert!(matches!(
            UnitFile::read(&path),
            Err(LibError::Corrupt { .. })
        ));
    }

    #[test]
    fn read_rejects_tampered_payload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("top.unit");
        let file = UnitFile::new("0.1.0", Vec::new(), empty_payload()).unwrap();
        file.write(&path).unwrap();

        let mut raw = std::fs::read(&path).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0xff;
        std::fs::write(&path, &raw).unwrap();

        assert!(matches!(
            UnitFile::read(&path),
            Err(LibError::Corrupt { .. })
        ));
    }

    #[test]
    fn read_rejects_bad_magic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("top.unit");
        let mut file = UnitFile::new("0.1.0", Vec::new(), empty_payload()).unwrap();
        file.header.magic = *b"NOPE";
        file.write(&path).unwrap();
        assert!(matches!(
            UnitFile::read(&path),
            Err(LibError::Corrupt { .. })
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        assert!(matches!(
            UnitFile::read(Path::new("/nonexistent/a.unit")),
            Err(LibError::Io { .. })
        ));
    }
}
