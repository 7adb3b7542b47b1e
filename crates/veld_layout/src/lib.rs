//! Storage layout computation for types.
//!
//! A [`Layout`] describes the memory shape of a value: overall size and
//! alignment plus a list of parts classed as in-place data, array bounds,
//! a signal offset, or an external pointer. Layouts are memoized per
//! `(type, signal?)` key and immutable once produced.

#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use veld_common::map::IntMap;
use veld_object::Node;
use veld_types::{TypeNode, TypeRef, TypeTable};

/// Pointer size and alignment on supported hosts.
const PTR_BYTES: usize = 8;

/// What a layout part holds.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum PartClass {
    /// Value bytes stored in place.
    Data,
    /// Array bounds: two 8-byte entries per dimension.
    Bounds,
    /// The 8-byte offset of a signal within its shared store.
    Offset,
    /// An 8-byte pointer to externally stored data.
    External,
}

/// One contiguous piece of a layout.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct LayoutPart {
    /// Byte offset from the start of the value.
    pub offset: usize,
    /// Size in bytes of one repetition.
    pub size: usize,
    /// Number of repetitions.
    pub repeat: usize,
    /// Required alignment.
    pub align: usize,
    /// What the part holds.
    pub class: PartClass,
}

/// The memory shape of a value of some type.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct Layout {
    /// Total size in bytes.
    pub size: usize,
    /// Required alignment in bytes.
    pub align: usize,
    /// The parts, in offset order.
    pub parts: Vec<LayoutPart>,
}

/// Returns the number of bits needed to represent every value in
/// `[low, high]`, using two's complement when `low` is negative.
pub fn bits_for_range(low: i64, high: i64) -> u32 {
    debug_assert!(low <= high);
    if low < 0 {
        let neg_bits = 64 - (!low).leading_zeros() + 1;
        let pos_bits = if high >= 0 {
            64 - high.leading_zeros() + 1
        } else {
            1
        };
        neg_bits.max(pos_bits)
    } else {
        (64 - high.leading_zeros()).max(1)
    }
}

fn align_up(value: usize, align: usize) -> usize {
    value.div_ceil(align) * align
}

/// Memoizing layout computer.
///
/// Keys include whether the request was signal-flavored, so value and
/// signal layouts of one type coexist in the cache.
pub struct LayoutCache {
    cache: IntMap<Layout>,
}

impl LayoutCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self {
            cache: IntMap::new(64),
        }
    }

    /// Returns the in-memory layout of a value of type `t`.
    pub fn layout_of(&mut self, types: &TypeTable, t: TypeRef) -> Layout {
        self.cached(types, t, false)
    }

    /// Returns the layout of a signal of type `t`.
    ///
    /// In-place data is replaced with a pointer into the signal's shared
    /// store, and homogeneous signals carry an 8-byte offset part.
    pub fn signal_layout_of(&mut self, types: &TypeTable, t: TypeRef) -> Layout {
        self.cached(types, t, true)
    }

    fn cached(&mut self, types: &TypeTable, t: TypeRef, signal: bool) -> Layout {
        let key = (t.as_bits() << 1) | signal as u64;
        if let Some(hit) = self.cache.get(key) {
            return hit.clone();
        }
        let layout = if signal {
            self.compute_signal(types, t)
        } else {
            self.compute_value(types, t)
        };
        self.cache.put(key, layout.clone());
        layout
    }

    fn compute_value(&mut self, types: &TypeTable, t: TypeRef) -> Layout {
        let base = types.base_recur(t);
        match types.get(base) {
            TypeNode::Integer { range, .. } | TypeNode::Physical { range, .. } => {
                let (low, high) = range.bounds();
                scalar_layout(bits_for_range(low, high))
            }
            TypeNode::Enum { literals, .. } => {
                let high = literals.len().saturating_sub(1) as i64;
                scalar_layout(bits_for_range(0, high))
            }
            TypeNode::Real { .. } => scalar_layout(64),
            TypeNode::Carray { .. } | TypeNode::Uarray { .. } => {
                match self.count_sub_elements(types, t) {
                    Some(nelems) => {
                        let elem = self.scalar_element(types, t);
                        let el = self.cached(types, elem, false);
                        Layout {
                            size: nelems * el.size,
                            align: el.align,
                            parts: vec![LayoutPart {
                                offset: 0,
                                size: el.size,
                                repeat: nelems,
                                align: el.align,
                                class: PartClass::Data,
                            }],
                        }
                    }
                    None => wide_array_layout(types.ndims(t)),
                }
            }
            TypeNode::Record { fields, .. } => {
                let fields = fields.clone();
                let mut parts = Vec::with_capacity(fields.len());
                let mut offset = 0;
                for field in &fields {
                    let fl = self.cached(types, field.ty, false);
                    offset = align_up(offset, fl.align);
                    parts.push(LayoutPart {
                        offset,
                        size: fl.size,
                        repeat: 1,
                        align: fl.align,
                        class: PartClass::Data,
                    });
                    offset += fl.size;
                }
                Layout {
                    size: offset,
                    align: PTR_BYTES,
                    parts,
                }
            }
            TypeNode::Access { .. } | TypeNode::File { .. } => Layout {
                size: PTR_BYTES,
                align: PTR_BYTES,
                parts: vec![LayoutPart {
                    offset: 0,
                    size: PTR_BYTES,
                    repeat: 1,
                    align: PTR_BYTES,
                    class: PartClass::Data,
                }],
            },
            other => panic!(
                "cannot compute layout for kind {}",
                TypeNode::schema().kind_name(other.kind())
            ),
        }
    }

    fn compute_signal(&mut self, types: &TypeTable, t: TypeRef) -> Layout {
        let base = types.base_recur(t);
        match types.get(base) {
            TypeNode::Record { fields, .. } => {
                // One pointer per field; fields resolve independently.
                let nfields = fields.len();
                let parts = (0..nfields)
                    .map(|i| LayoutPart {
                        offset: i * PTR_BYTES,
                        size: PTR_BYTES,
                        repeat: 1,
                        align: PTR_BYTES,
                        class: PartClass::External,
                    })
                    .collect();
                Layout {
                    size: nfields * PTR_BYTES,
                    align: PTR_BYTES,
                    parts,
                }
            }
            TypeNode::Carray { .. } | TypeNode::Uarray { .. }
                if types.is_unconstrained(t) =>
            {
                let ndims = types.ndims(t);
                let mut parts = vec![
                    LayoutPart {
                        offset: 0,
                        size: PTR_BYTES,
                        repeat: 1,
                        align: PTR_BYTES,
                        class: PartClass::External,
                    },
                    LayoutPart {
                        offset: PTR_BYTES,
                        size: PTR_BYTES,
                        repeat: 1,
                        align: PTR_BYTES,
                        class: PartClass::Offset,
                    },
                ];
                parts.push(LayoutPart {
                    offset: 2 * PTR_BYTES,
                    size: 8,
                    repeat: ndims * 2,
                    align: 8,
                    class: PartClass::Bounds,
                });
                Layout {
                    size: 2 * PTR_BYTES + ndims * 16,
                    align: PTR_BYTES,
                    parts,
                }
            }
            _ => Layout {
                size: 2 * PTR_BYTES,
                align: PTR_BYTES,
                parts: vec![
                    LayoutPart {
                        offset: 0,
                        size: PTR_BYTES,
                        repeat: 1,
                        align: PTR_BYTES,
                        class: PartClass::External,
                    },
                    LayoutPart {
                        offset: PTR_BYTES,
                        size: PTR_BYTES,
                        repeat: 1,
                        align: PTR_BYTES,
                        class: PartClass::Offset,
                    },
                ],
            },
        }
    }

    /// Total scalar element count of a constrained array, flattening nested
    /// arrays. `None` when the type (or a nested element) is unconstrained.
    fn count_sub_elements(&self, types: &TypeTable, t: TypeRef) -> Option<usize> {
        if !types.is_array(t) {
            return Some(1);
        }
        if types.is_unconstrained(t) {
            return None;
        }
        let mut count = self.count_sub_elements(types, types.elem_of(t)?)?;
        for dim in types.dims_of(t) {
            count = count.checked_mul(dim.length() as usize)?;
        }
        Some(count)
    }

    /// The innermost non-array element type.
    fn scalar_element(&self, types: &TypeTable, t: TypeRef) -> TypeRef {
        let mut elem = types.elem_of(t).expect("array type has an element");
        while types.is_array(elem) {
            elem = types.elem_of(elem).expect("array type has an element");
        }
        elem
    }
}

impl Default for LayoutCache {
    fn default() -> Self {
        Self::new()
    }
}

fn scalar_layout(bits: u32) -> Layout {
    let size = (align_up(bits as usize, 8)) / 8;
    Layout {
        size,
        align: size,
        parts: vec![LayoutPart {
            offset: 0,
            size,
            repeat: 1,
            align: size,
            class: PartClass::Data,
        }],
    }
}

fn wide_array_layout(ndims: usize) -> Layout {
    Layout {
        size: PTR_BYTES + ndims * 16,
        align: PTR_BYTES,
        parts: vec![
            LayoutPart {
                offset: 0,
                size: PTR_BYTES,
                repeat: 1,
                align: PTR_BYTES,
                class: PartClass::External,
            },
            LayoutPart {
                offset: PTR_BYTES,
                size: 8,
                repeat: ndims * 2,
                align: 8,
                class: PartClass::Bounds,
            },
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veld_common::Interner;
    use veld_types::{Field, Range, StdTypes, TypeNode};

    fn setup() -> (TypeTable, Interner, StdTypes, LayoutCache) {
        let mut table = TypeTable::new();
        let interner = Interner::new();
        let std = StdTypes::install(&mut table, &interner);
        (table, interner, std, LayoutCache::new())
    }

    #[test]
    fn bits_for_small_ranges() {
        assert_eq!(bits_for_range(0, 0), 1);
        assert_eq!(bits_for_range(0, 1), 1);
        assert_eq!(bits_for_range(0, 7), 3);
        assert_eq!(bits_for_range(0, 8), 4);
        assert_eq!(bits_for_range(0, 255), 8);
    }

    #[test]
    fn bits_for_signed_ranges() {
        assert_eq!(bits_for_range(-1, 0), 1);
        assert_eq!(bits_for_range(-128, 127), 8);
        assert_eq!(bits_for_range(-129, 127), 9);
        assert_eq!(bits_for_range(i32::MIN as i64, i32::MAX as i64), 32);
        assert_eq!(bits_for_range(i64::MIN, i64::MAX), 64);
    }

    #[test]
    fn integer_is_four_bytes() {
        let (types, _, std, mut cache) = setup();
        let l = cache.layout_of(&types, std.integer);
        assert_eq!(l.size, 4);
        assert_eq!(l.align, 4);
        assert_eq!(l.parts.len(), 1);
        assert_eq!(l.parts[0].class, PartClass::Data);
    }

    #[test]
    fn natural_uses_base_range() {
        // Scalar subtypes size by their base type's range.
        let (types, _, std, mut cache) = setup();
        let l = cache.layout_of(&types, std.natural);
        assert_eq!(l.size, 4);
    }

    #[test]
    fn std_logic_is_one_byte() {
        let (types, _, std, mut cache) = setup();
        let l = cache.layout_of(&types, std.std_logic);
        assert_eq!(l.size, 1);
        assert_eq!(l.align, 1);
    }

    #[test]
    fn real_is_eight_bytes() {
        let (types, _, std, mut cache) = setup();
        let l = cache.layout_of(&types, std.real);
        assert_eq!(l.size, 8);
        assert_eq!(l.align, 8);
    }

    #[test]
    fn time_is_eight_bytes() {
        let (types, _, std, mut cache) = setup();
        let l = cache.layout_of(&types, std.time);
        assert_eq!(l.size, 8);
    }

    #[test]
    fn constrained_vector_repeats_element() {
        let (mut types, _, std, mut cache) = setup();
        let vec8 = types.add(TypeNode::Subtype {
            ident: None,
            base: std.std_logic_vector,
            constraint: Some(vec![Range::downto(7, 0)]),
            resolution: None,
        });
        let l = cache.layout_of(&types, vec8);
        assert_eq!(l.size, 8);
        assert_eq!(l.parts.len(), 1);
        assert_eq!(l.parts[0].repeat, 8);
        assert_eq!(l.parts[0].size, 1);
    }

    #[test]
    fn nested_arrays_flatten() {
        let (mut types, interner, std, mut cache) = setup();
        let word = types.add(TypeNode::Carray {
            ident: None,
            dims: vec![Range::downto(7, 0)],
            elem: std.bit,
        });
        let memory = types.add(TypeNode::Carray {
            ident: Some(interner.intern("MEM_T")),
            dims: vec![Range::to(0, 15)],
            elem: word,
        });
        let l = cache.layout_of(&types, memory);
        assert_eq!(l.parts.len(), 1);
        assert_eq!(l.parts[0].repeat, 128);
        assert_eq!(l.size, 128);
    }

    #[test]
    fn unconstrained_array_is_pointer_and_bounds() {
        let (types, _, std, mut cache) = setup();
        let l = cache.layout_of(&types, std.bit_vector);
        assert_eq!(l.parts.len(), 2);
        assert_eq!(l.parts[0].class, PartClass::External);
        assert_eq!(l.parts[1].class, PartClass::Bounds);
        assert_eq!(l.parts[1].repeat, 2);
        assert_eq!(l.size, 8 + 16);
        assert_eq!(l.align, 8);
    }

    #[test]
    fn unconstrained_subtype_reduces_to_base_layout() {
        let (mut types, _, std, mut cache) = setup();
        let sub = types.add(TypeNode::Subtype {
            ident: None,
            base: std.bit_vector,
            constraint: None,
            resolution: None,
        });
        assert_eq!(
            cache.layout_of(&types, sub),
            cache.layout_of(&types, std.bit_vector)
        );
    }

    #[test]
    fn record_fields_are_aligned() {
        let (mut types, interner, std, mut cache) = setup();
        let rec = types.add(TypeNode::Record {
            ident: interner.intern("PAIR_T"),
            fields: vec![
                Field {
                    name: interner.intern("flag"),
                    ty: std.bit,
                },
                Field {
                    name: interner.intern("count"),
                    ty: std.integer,
                },
            ],
        });
        let l = cache.layout_of(&types, rec);
        assert_eq!(l.parts.len(), 2);
        assert_eq!(l.parts[0].offset, 0);
        assert_eq!(l.parts[0].size, 1);
        // Second field aligned to 4.
        assert_eq!(l.parts[1].offset, 4);
        assert_eq!(l.parts[1].size, 4);
        assert_eq!(l.size, 8);
        assert_eq!(l.align, 8);
    }

    #[test]
    fn layout_size_covers_parts() {
        // The documented invariant: size >= sum of part extents, each part
        // aligned to its own alignment.
        let (mut types, interner, std, mut cache) = setup();
        let rec = types.add(TypeNode::Record {
            ident: interner.intern("R"),
            fields: vec![
                Field {
                    name: interner.intern("a"),
                    ty: std.bit,
                },
                Field {
                    name: interner.intern("b"),
                    ty: std.time,
                },
                Field {
                    name: interner.intern("c"),
                    ty: std.std_logic,
                },
            ],
        });
        for t in [std.integer, std.real, std.bit_vector, rec] {
            let l = cache.layout_of(&types, t);
            let total: usize = l.parts.iter().map(|p| p.size * p.repeat).sum();
            assert!(l.size >= total);
            for p in &l.parts {
                assert_eq!(p.offset % p.align, 0);
            }
        }
    }

    #[test]
    fn layout_is_referentially_stable() {
        let (types, _, std, mut cache) = setup();
        let a = cache.layout_of(&types, std.integer);
        let b = cache.layout_of(&types, std.integer);
        assert_eq!(a, b);
    }

    #[test]
    fn signal_layout_scalar_has_pointer_and_offset() {
        let (types, _, std, mut cache) = setup();
        let l = cache.signal_layout_of(&types, std.std_logic);
        assert_eq!(l.parts.len(), 2);
        assert_eq!(l.parts[0].class, PartClass::External);
        assert_eq!(l.parts[1].class, PartClass::Offset);
        assert_eq!(l.size, 16);
    }

    #[test]
    fn signal_layout_unconstrained_keeps_bounds() {
        let (types, _, std, mut cache) = setup();
        let l = cache.signal_layout_of(&types, std.std_logic_vector);
        assert_eq!(l.parts.len(), 3);
        assert_eq!(l.parts[0].class, PartClass::External);
        assert_eq!(l.parts[1].class, PartClass::Offset);
        assert_eq!(l.parts[2].class, PartClass::Bounds);
    }

    #[test]
    fn signal_layout_record_is_per_field_pointers() {
        let (mut types, interner, std, mut cache) = setup();
        let rec = types.add(TypeNode::Record {
            ident: interner.intern("R"),
            fields: vec![
                Field {
                    name: interner.intern("a"),
                    ty: std.bit,
                },
                Field {
                    name: interner.intern("b"),
                    ty: std.integer,
                },
            ],
        });
        let l = cache.signal_layout_of(&types, rec);
        assert_eq!(l.parts.len(), 2);
        assert!(l.parts.iter().all(|p| p.class == PartClass::External));
    }

    #[test]
    fn signal_and_value_layouts_are_cached_separately() {
        let (types, _, std, mut cache) = setup();
        let value = cache.layout_of(&types, std.integer);
        let signal = cache.signal_layout_of(&types, std.integer);
        assert_ne!(value, signal);
        // Ask again in the opposite order; the cache must not mix keys.
        assert_eq!(cache.signal_layout_of(&types, std.integer), signal);
        assert_eq!(cache.layout_of(&types, std.integer), value);
    }
}
