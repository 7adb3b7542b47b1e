//! The type table: storage plus equality, predicates, and printing.

use crate::ty::{kind, Field, Range, TypeNode, TypeRef};
use veld_common::{Ident, Interner};
use veld_object::{ArenaId, KindTransitionError, Node, ObjectStore};

/// Errors from completing a forward-declared type.
#[derive(Debug, thiserror::Error)]
pub enum CompleteError {
    /// The requested kind change is not on the allow-list.
    #[error(transparent)]
    Transition(#[from] KindTransitionError),

    /// The type's arena is frozen.
    #[error("type arena is frozen")]
    Frozen,
}

/// Type storage and the operations the rest of the toolchain needs.
///
/// Types live in arenas of the underlying [`ObjectStore`]; the table keeps
/// one working arena open for new types and hands out [`TypeRef`]s into it.
/// Library loading adds further (frozen) arenas through the store.
pub struct TypeTable {
    store: ObjectStore<TypeNode>,
    arena: ArenaId,
    universal_int: Option<TypeRef>,
    universal_real: Option<TypeRef>,
}

impl TypeTable {
    /// Creates a table with one open working arena.
    pub fn new() -> Self {
        let mut store = ObjectStore::new();
        let arena = store.new_arena();
        Self {
            store,
            arena,
            universal_int: None,
            universal_real: None,
        }
    }

    /// Adds a type to the working arena.
    pub fn add(&mut self, node: TypeNode) -> TypeRef {
        self.store
            .alloc(self.arena, node)
            .expect("working arena accepts allocation")
    }

    /// Returns the node for a type reference.
    pub fn get(&self, t: TypeRef) -> &TypeNode {
        self.store.get(t)
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &ObjectStore<TypeNode> {
        &self.store
    }

    /// Returns the underlying store mutably, for serialization and GC.
    pub fn store_mut(&mut self) -> &mut ObjectStore<TypeNode> {
        &mut self.store
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

    /// Replaces a forward-declared type with its completion.
    ///
    /// The kind change must be on the transition allow-list, e.g.
    /// `INCOMPLETE` to `RECORD`.
    pub fn complete(&mut self, t: TypeRef, node: TypeNode) -> Result<(), CompleteError> {
        let from = self.get(t).kind();
        TypeNode::schema().check_transition(from, node.kind())?;
        let slot = self.store.get_mut(t).map_err(|_| CompleteError::Frozen)?;
        *slot = node;
        Ok(())
    }

    /// Follows subtype links to the base type reference.
    pub fn base_recur(&self, mut t: TypeRef) -> TypeRef {
        while let TypeNode::Subtype { base, .. } = self.get(t) {
            t = *base;
        }
        t
    }

    /// Returns the kind number of the base type.
    pub fn base_kind(&self, t: TypeRef) -> u32 {
        self.get(self.base_recur(t)).kind()
    }

    // -- Universal types --

    /// Returns the universal integer type, creating it on first use.
    pub fn universal_int(&mut self, interner: &Interner) -> TypeRef {
        if let Some(t) = self.universal_int {
            return t;
        }
        let t = self.add(TypeNode::Integer {
            ident: interner.intern("universal_integer"),
            range: Range::to(i64::MIN, i64::MAX),
        });
        self.universal_int = Some(t);
        t
    }

    /// Returns the universal real type, creating it on first use.
    pub fn universal_real(&mut self, interner: &Interner) -> TypeRef {
        if let Some(t) = self.universal_real {
            return t;
        }
        let t = self.add(TypeNode::Real {
            ident: interner.intern("universal_real"),
            range: crate::ty::RealRange {
                low: f64::MIN,
                high: f64::MAX,
            },
        });
        self.universal_real = Some(t);
        t
    }

    /// Returns `true` if `t` is one of the universal types.
    pub fn is_universal(&self, t: TypeRef) -> bool {
        Some(t) == self.universal_int || Some(t) == self.universal_real
    }

    // -- Equality --

    /// Strict structural equality: same kind, same name when both are
    /// named, recursively equal structural items.
    pub fn strict_eq(&self, a: TypeRef, b: TypeRef) -> bool {
        if a == b {
            return true;
        }
        let na = self.get(a);
        let nb = self.get(b);
        if na.kind() != nb.kind() {
            return false;
        }
        if let (Some(ia), Some(ib)) = (na.ident(), nb.ident()) {
            if ia != ib {
                return false;
            }
        }

        match (na, nb) {
            (TypeNode::Access { designated: da, .. }, TypeNode::Access { designated: db, .. }) => {
                return self.eq(*da, *db);
            }
            (TypeNode::Carray { elem: ea, .. }, TypeNode::Carray { elem: eb, .. })
            | (TypeNode::Uarray { elem: ea, .. }, TypeNode::Uarray { elem: eb, .. }) => {
                return self.strict_eq(*ea, *eb);
            }
            _ => {}
        }

        if let (
            TypeNode::Func {
                params: pa,
                result: ra,
                ..
            },
            TypeNode::Func {
                params: pb,
                result: rb,
                ..
            },
        ) = (na, nb)
        {
            if !self.strict_eq(*ra, *rb) {
                return false;
            }
            return pa.len() == pb.len()
                && pa.iter().zip(pb).all(|(x, y)| self.strict_eq(*x, *y));
        }
        if let (TypeNode::Proc { params: pa, .. }, TypeNode::Proc { params: pb, .. }) = (na, nb) {
            return pa.len() == pb.len()
                && pa.iter().zip(pb).all(|(x, y)| self.strict_eq(*x, *y));
        }

        true
    }

    /// Liberal equality: walks through subtype chains, treats constrained
    /// and unconstrained arrays as equal when their elements are, and
    /// treats an incomplete type as equal to any completing kind.
    pub fn eq(&self, a: TypeRef, b: TypeRef) -> bool {
        if a == b {
            return true;
        }
        let a = self.base_recur(a);
        let b = self.base_recur(b);
        if a == b {
            return true;
        }

        let na = self.get(a);
        let nb = self.get(b);
        let ka = na.kind();
        let kb = nb.kind();

        let compare_c_u_arrays = (ka == kind::CARRAY && kb == kind::UARRAY)
            || (ka == kind::UARRAY && kb == kind::CARRAY);
        let incomplete = ka == kind::INCOMPLETE || kb == kind::INCOMPLETE;

        if ka != kb && !compare_c_u_arrays && !incomplete {
            return false;
        }

        if let (Some(ia), Some(ib)) = (na.ident(), nb.ident()) {
            if ia != ib {
                return false;
            }
        }

        if incomplete {
            return true;
        }

        if let (TypeNode::Access { designated: da, .. }, TypeNode::Access { designated: db, .. }) =
            (na, nb)
        {
            return self.eq(*da, *db);
        }

        if compare_c_u_arrays || matches!(na, TypeNode::Carray { .. } | TypeNode::Uarray { .. }) {
            let (Some(ea), Some(eb)) = (self.elem_of(a), self.elem_of(b)) else {
                return false;
            };
            return self.eq(ea, eb);
        }

        if let (
            TypeNode::Func {
                params: pa,
                result: ra,
                ..
            },
            TypeNode::Func {
                params: pb,
                result: rb,
                ..
            },
        ) = (na, nb)
        {
            if !self.eq(*ra, *rb) {
                return false;
            }
            return pa.len() == pb.len() && pa.iter().zip(pb).all(|(x, y)| self.eq(*x, *y));
        }
        if let (TypeNode::Proc { params: pa, .. }, TypeNode::Proc { params: pb, .. }) = (na, nb) {
            return pa.len() == pb.len() && pa.iter().zip(pb).all(|(x, y)| self.eq(*x, *y));
        }

        true
    }

    /// Implicit conversion: allowed only from a universal integer/real to a
    /// non-universal type of the same family.
    pub fn is_convertible(&self, from: TypeRef, to: TypeRef) -> bool {
        let fromk = self.base_kind(from);
        let tok = self.base_kind(to);

        if fromk == kind::NONE {
            // Suppress cascading errors after a failed analysis.
            true
        } else if !self.is_universal(self.base_recur(from)) {
            false
        } else if self.is_universal(self.base_recur(to)) {
            false
        } else {
            (fromk == kind::INTEGER && tok == kind::INTEGER)
                || (fromk == kind::REAL && tok == kind::REAL)
        }
    }

    // -- Predicates --

    /// Is the base type an array?
    pub fn is_array(&self, t: TypeRef) -> bool {
        matches!(self.base_kind(t), kind::CARRAY | kind::UARRAY)
    }

    /// Is the base type a record?
    pub fn is_record(&self, t: TypeRef) -> bool {
        self.base_kind(t) == kind::RECORD
    }

    /// Is the base type scalar?
    pub fn is_scalar(&self, t: TypeRef) -> bool {
        matches!(
            self.base_kind(t),
            kind::INTEGER | kind::REAL | kind::ENUM | kind::PHYSICAL
        )
    }

    /// Is the base type discrete (integer or enumeration)?
    pub fn is_discrete(&self, t: TypeRef) -> bool {
        matches!(self.base_kind(t), kind::INTEGER | kind::ENUM)
    }

    /// Is the base type composite (array or record)?
    pub fn is_composite(&self, t: TypeRef) -> bool {
        matches!(
            self.base_kind(t),
            kind::CARRAY | kind::UARRAY | kind::RECORD
        )
    }

    /// Does `t` lack index constraints?
    ///
    /// An unconstrained array is unconstrained; a subtype is unconstrained
    /// iff it adds no constraint over an unconstrained base.
    pub fn is_unconstrained(&self, t: TypeRef) -> bool {
        match self.get(t) {
            TypeNode::Uarray { .. } => true,
            TypeNode::Subtype {
                base, constraint, ..
            } => constraint.is_none() && self.is_unconstrained(*base),
            _ => false,
        }
    }

    // -- Structural accessors --

    /// Returns the element type of an array, following subtypes.
    pub fn elem_of(&self, t: TypeRef) -> Option<TypeRef> {
        match self.get(t) {
            TypeNode::Subtype { base, .. } => self.elem_of(*base),
            TypeNode::Carray { elem, .. } | TypeNode::Uarray { elem, .. } => Some(*elem),
            _ => None,
        }
    }

    /// Returns the folded dimension ranges of `t`.
    ///
    /// A constrained subtype contributes its own constraint; otherwise the
    /// base's dimensions apply. Unconstrained arrays have none.
    pub fn dims_of(&self, t: TypeRef) -> Vec<Range> {
        match self.get(t) {
            TypeNode::Subtype {
                base, constraint, ..
            } => match constraint {
                Some(ranges) => ranges.clone(),
                None => self.dims_of(*base),
            },
            TypeNode::Carray { dims, .. } => dims.clone(),
            TypeNode::Integer { range, .. } | TypeNode::Physical { range, .. } => {
                vec![*range]
            }
            TypeNode::Enum { literals, .. } => {
                vec![Range::to(0, literals.len() as i64 - 1)]
            }
            _ => Vec::new(),
        }
    }

    /// Returns the number of array dimensions.
    pub fn ndims(&self, t: TypeRef) -> usize {
        match self.get(t) {
            TypeNode::Subtype { base, .. } => self.ndims(*base),
            TypeNode::Carray { dims, .. } => dims.len(),
            TypeNode::Uarray { index, .. } => index.len(),
            _ => 0,
        }
    }

    /// Returns the fields of a record type, following subtypes.
    pub fn fields_of(&self, t: TypeRef) -> Option<&Vec<Field>> {
        match self.get(t) {
            TypeNode::Subtype { base, .. } => self.fields_of(*base),
            TypeNode::Record { fields, .. } => Some(fields),
            _ => None,
        }
    }

    /// Returns the scalar bounds of `t` as `(low, high)`.
    pub fn bounds(&self, t: TypeRef) -> Option<(i64, i64)> {
        match self.get(t) {
            TypeNode::Subtype {
                base, constraint, ..
            } => match constraint {
                Some(ranges) => ranges.first().map(Range::bounds),
                None => self.bounds(*base),
            },
            TypeNode::Integer { range, .. } | TypeNode::Physical { range, .. } => {
                Some(range.bounds())
            }
            TypeNode::Enum { literals, .. } => Some((0, literals.len() as i64 - 1)),
            _ => None,
        }
    }

    /// Returns the literal names of an enumeration type, following subtypes.
    pub fn enum_literals(&self, t: TypeRef) -> Option<&Vec<Ident>> {
        match self.get(t) {
            TypeNode::Subtype { base, .. } => self.enum_literals(*base),
            TypeNode::Enum { literals, .. } => Some(literals),
            _ => None,
        }
    }

    /// Returns the resolution function name governing `t`, if any.
    ///
    /// The innermost subtype that names a resolution wins.
    pub fn resolution_of(&self, t: TypeRef) -> Option<Ident> {
        match self.get(t) {
            TypeNode::Subtype {
                base, resolution, ..
            } => resolution.or_else(|| self.resolution_of(*base)),
            _ => None,
        }
    }

    /// Returns the name of `t`, following subtype links for anonymous
    /// subtypes.
    pub fn ident_of(&self, t: TypeRef) -> Option<Ident> {
        match self.get(t) {
            TypeNode::Subtype {
                ident: Some(i), ..
            } => Some(*i),
            TypeNode::Subtype { base, .. } => self.ident_of(*base),
            node => node.ident(),
        }
    }

    // -- Printing --

    /// Pretty-prints a type name.
    ///
    /// Subprograms render as `name [p1, p2 return r]`; everything else as
    /// the final dotted component of its name.
    pub fn pretty(&self, interner: &Interner, t: TypeRef) -> String {
        match self.get(t) {
            TypeNode::Func { params, result, .. } => {
                let name = self.name_for_display(interner, t);
                let mut out = format!("{name} [");
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    out.push_str(&self.pretty(interner, *p));
                }
                if !params.is_empty() {
                    out.push(' ');
                }
                out.push_str("return ");
                out.push_str(&self.pretty(interner, *result));
                out.push(']');
                out
            }
            TypeNode::Proc { params, .. } => {
                let name = self.name_for_display(interner, t);
                let mut out = format!("{name} [");
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    out.push_str(&self.pretty(interner, *p));
                }
                out.push(']');
                out
            }
            _ => {
                let full = self.full_name(interner, t);
                last_component(&full).to_string()
            }
        }
    }

    /// Pretty-prints `t`, fully qualifying it when its short name collides
    /// with `peer`'s.
    pub fn pretty_vs(&self, interner: &Interner, t: TypeRef, peer: TypeRef) -> String {
        let full_t = self.full_name(interner, t);
        let full_peer = self.full_name(interner, peer);
        if last_component(&full_t) == last_component(&full_peer) && full_t != full_peer {
            full_t
        } else {
            last_component(&full_t).to_string()
        }
    }

    fn full_name(&self, interner: &Interner, t: TypeRef) -> String {
        match self.ident_of(t) {
            Some(ident) => interner.resolve(ident).to_string(),
            None => "none".to_string(),
        }
    }

    fn name_for_display(&self, interner: &Interner, t: TypeRef) -> String {
        let full = self.full_name(interner, t);
        last_component(&full).to_string()
    }
}

impl Default for TypeTable {
    fn default() -> Self {
        Self::new()
    }
}

fn last_component(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}
