//! Strict structural equality over trees.

use crate::node::{TreeNode, TreeRef};
use veld_object::{ArenaId, Handle, Node, ObjectStore};
use veld_types::TypeTable;

/// Compares two trees structurally, ignoring handle identity and source
/// locations.
///
/// Child trees are compared recursively; type references compare with
/// [`TypeTable::strict_eq`]; identifiers compare by handle, which is exact
/// because interning is preserved within a session.
pub fn tree_strict_eq(
    store: &ObjectStore<TreeNode>,
    types: &TypeTable,
    a: TreeRef,
    b: TreeRef,
) -> bool {
    if a == b {
        return true;
    }
    let na = store.get(a);
    let nb = store.get(b);
    if na.kind() != nb.kind() {
        return false;
    }

    // Payload equality modulo handles and location.
    let scrub = Handle::new(ArenaId::from_raw(0), 0);
    let mut ca = na.clone();
    let mut cb = nb.clone();
    ca.map_handles(&mut |_| scrub);
    ca.map_type_refs(&mut |_| scrub);
    cb.map_handles(&mut |_| scrub);
    cb.map_type_refs(&mut |_| scrub);
    if ca.data != cb.data {
        return false;
    }

    let mut children_a = Vec::new();
    let mut children_b = Vec::new();
    na.visit_handles(&mut |h| children_a.push(h));
    nb.visit_handles(&mut |h| children_b.push(h));
    debug_assert_eq!(children_a.len(), children_b.len());
    if !children_a
        .iter()
        .zip(&children_b)
        .all(|(x, y)| tree_strict_eq(store, types, *x, *y))
    {
        return false;
    }

    let mut types_a = Vec::new();
    let mut types_b = Vec::new();
    na.visit_type_refs(&mut |t| types_a.push(t));
    nb.visit_type_refs(&mut |t| types_b.push(t));
    types_a
        .iter()
        .zip(&types_b)
        .all(|(x, y)| types.strict_eq(*x, *y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::TreeStore;
    use crate::node::{BinaryOp, TreeData};
    use veld_common::Interner;
    use veld_types::{Range, TypeNode};

    #[test]
    fn identical_structure_is_equal() {
        let mut trees = TreeStore::new();
        let types = TypeTable::new();

        let l1 = trees.synth(TreeData::IntLit { value: 1 });
        let r1 = trees.synth(TreeData::IntLit { value: 2 });
        let a = trees.synth(TreeData::Binary {
            op: BinaryOp::Add,
            left: l1,
            right: r1,
        });

        let l2 = trees.synth(TreeData::IntLit { value: 1 });
        let r2 = trees.synth(TreeData::IntLit { value: 2 });
        let b = trees.synth(TreeData::Binary {
            op: BinaryOp::Add,
            left: l2,
            right: r2,
        });

        assert!(tree_strict_eq(trees.store(), &types, a, b));
    }

    #[test]
    fn different_literals_differ() {
        let mut trees = TreeStore::new();
        let types = TypeTable::new();
        let a = trees.synth(TreeData::IntLit { value: 1 });
        let b = trees.synth(TreeData::IntLit { value: 2 });
        assert!(!tree_strict_eq(trees.store(), &types, a, b));
    }

    #[test]
    fn different_operators_differ() {
        let mut trees = TreeStore::new();
        let types = TypeTable::new();
        let l = trees.synth(TreeData::IntLit { value: 1 });
        let r = trees.synth(TreeData::IntLit { value: 2 });
        let a = trees.synth(TreeData::Binary {
            op: BinaryOp::Add,
            left: l,
            right: r,
        });
        let b = trees.synth(TreeData::Binary {
            op: BinaryOp::Sub,
            left: l,
            right: r,
        });
        assert!(!tree_strict_eq(trees.store(), &types, a, b));
    }

    #[test]
    fn type_refs_compare_structurally() {
        let mut trees = TreeStore::new();
        let mut types = TypeTable::new();
        let interner = Interner::new();

        let t1 = types.add(TypeNode::Integer {
            ident: interner.intern("INTEGER"),
            range: Range::to(0, 100),
        });
        let t2 = types.add(TypeNode::Integer {
            ident: interner.intern("INTEGER"),
            range: Range::to(0, 100),
        });
        let other = types.add(TypeNode::Integer {
            ident: interner.intern("NATURAL"),
            range: Range::to(0, 100),
        });

        let a = trees.synth(TreeData::SignalDecl {
            ident: interner.intern("s"),
            ty: t1,
            init: None,
        });
        let b = trees.synth(TreeData::SignalDecl {
            ident: interner.intern("s"),
            ty: t2,
            init: None,
        });
        let c = trees.synth(TreeData::SignalDecl {
            ident: interner.intern("s"),
            ty: other,
            init: None,
        });

        assert!(tree_strict_eq(trees.store(), &types, a, b));
        assert!(!tree_strict_eq(trees.store(), &types, a, c));
    }

    #[test]
    fn location_is_ignored() {
        use veld_source::{FileId, Loc};
        let mut trees = TreeStore::new();
        let types = TypeTable::new();
        let a = trees.at(
            Loc::new(FileId::from_raw(0), 1, 1, 1),
            TreeData::IntLit { value: 7 },
        );
        let b = trees.at(
            Loc::new(FileId::from_raw(0), 99, 1, 1),
            TreeData::IntLit { value: 7 },
        );
        assert!(tree_strict_eq(trees.store(), &types, a, b));
    }
}
