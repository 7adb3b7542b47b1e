//! Tree node definitions and their schema.

use serde::{Deserialize, Serialize};
use veld_common::Ident;
use veld_object::schema::{items, ItemSlot};
use veld_object::{Handle, KindSchema, Node, ObjectTag, SchemaTable};
use veld_source::Loc;
use veld_types::TypeRef;

/// A reference to a tree node in the store.
pub type TreeRef = Handle;

/// Direction of a port.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum PortMode {
    /// Input port.
    In,
    /// Output port.
    Out,
    /// Bidirectional port.
    Inout,
    /// Buffered output port.
    Buffer,
}

/// Binary operators.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Rem,
    And,
    Or,
    Xor,
    Nand,
    Nor,
    Eq,
    Neq,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Unary operators.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum UnaryOp {
    Neg,
    Not,
    Abs,
}

/// A tree node: a source location plus the node data.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct TreeNode {
    /// Where in the source this node came from.
    pub loc: Loc,
    /// The node payload.
    pub data: TreeData,
}

impl TreeNode {
    /// Creates a node with the dummy location.
    pub fn synthetic(data: TreeData) -> Self {
        Self {
            loc: Loc::DUMMY,
            data,
        }
    }

    /// Creates a node at the given location.
    pub fn at(loc: Loc, data: TreeData) -> Self {
        Self { loc, data }
    }
}

/// Tree node payloads. The variant order fixes the kind numbering used by
/// the schema digest and must not be rearranged.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub enum TreeData {
    /// An entity declaration.
    Entity {
        /// The entity name.
        ident: Ident,
        /// Generic declarations.
        generics: Vec<TreeRef>,
        /// Port declarations.
        ports: Vec<TreeRef>,
    },
    /// An architecture body.
    Architecture {
        /// The architecture name.
        ident: Ident,
        /// Name of the entity this architecture implements.
        entity: Ident,
        /// Declarative part.
        decls: Vec<TreeRef>,
        /// Concurrent statements.
        stmts: Vec<TreeRef>,
    },
    /// A generic (compile-time constant) declaration.
    GenericDecl {
        /// The generic name.
        ident: Ident,
        /// The generic's type.
        ty: TypeRef,
        /// Default value expression.
        default: Option<TreeRef>,
    },
    /// A port declaration.
    PortDecl {
        /// The port name.
        ident: Ident,
        /// The port mode.
        mode: PortMode,
        /// The port's type.
        ty: TypeRef,
        /// Default value expression.
        default: Option<TreeRef>,
    },
    /// A signal declaration.
    SignalDecl {
        /// The signal name.
        ident: Ident,
        /// The signal's type.
        ty: TypeRef,
        /// Initial value expression.
        init: Option<TreeRef>,
    },
    /// A constant declaration.
    ConstDecl {
        /// The constant name.
        ident: Ident,
        /// The constant's type.
        ty: TypeRef,
        /// The constant's value.
        value: TreeRef,
    },
    /// A variable declaration inside a process.
    VarDecl {
        /// The variable name.
        ident: Ident,
        /// The variable's type.
        ty: TypeRef,
        /// Initial value expression.
        init: Option<TreeRef>,
    },
    /// A process statement.
    Process {
        /// The process label, if any.
        ident: Option<Ident>,
        /// Sensitivity list signal names; empty means none.
        sensitivity: Vec<Ident>,
        /// Process-local declarations.
        decls: Vec<TreeRef>,
        /// Sequential statement body.
        body: Vec<TreeRef>,
    },
    /// A component instantiation.
    Instance {
        /// The instance label.
        ident: Ident,
        /// Name of the instantiated entity.
        entity: Ident,
        /// Generic map: formal name to actual expression.
        generic_map: Vec<(Ident, TreeRef)>,
        /// Port map: formal name to actual expression.
        port_map: Vec<(Ident, TreeRef)>,
    },
    /// A signal assignment, sequential or concurrent.
    SignalAssign {
        /// The assignment target.
        target: TreeRef,
        /// The value expression.
        value: TreeRef,
        /// Optional `after` delay expression.
        delay: Option<TreeRef>,
    },
    /// A variable assignment.
    VarAssign {
        /// The assignment target.
        target: TreeRef,
        /// The value expression.
        value: TreeRef,
    },
    /// An if statement.
    If {
        /// The condition.
        cond: TreeRef,
        /// Statements for the true branch.
        then_stmts: Vec<TreeRef>,
        /// Statements for the false branch.
        else_stmts: Vec<TreeRef>,
    },
    /// A while loop; no condition means loop forever.
    While {
        /// The loop condition.
        cond: Option<TreeRef>,
        /// The loop body.
        body: Vec<TreeRef>,
    },
    /// A wait statement.
    Wait {
        /// Signals to wait on.
        on: Vec<Ident>,
        /// Optional `until` condition.
        until: Option<TreeRef>,
        /// Optional `for` timeout expression.
        timeout: Option<TreeRef>,
    },
    /// An assertion.
    Assert {
        /// The asserted condition.
        cond: TreeRef,
        /// Optional report message.
        message: Option<TreeRef>,
        /// Optional severity expression.
        severity: Option<TreeRef>,
    },
    /// An integer literal.
    IntLit {
        /// The literal value.
        value: i64,
    },
    /// A real literal.
    RealLit {
        /// The literal value.
        value: f64,
    },
    /// An enumeration literal.
    EnumLit {
        /// The enumeration type.
        ty: TypeRef,
        /// The literal's ordinal.
        ordinal: u32,
    },
    /// A physical literal folded to primary units.
    PhysLit {
        /// The physical type.
        ty: TypeRef,
        /// The value in primary units.
        value: i64,
    },
    /// A string literal, used for assertion messages.
    StringLit {
        /// The string text.
        text: String,
    },
    /// A name reference, resolved during elaboration.
    Ref {
        /// The referenced name.
        ident: Ident,
    },
    /// A binary operation.
    Binary {
        /// The operator.
        op: BinaryOp,
        /// Left operand.
        left: TreeRef,
        /// Right operand.
        right: TreeRef,
    },
    /// A unary operation.
    Unary {
        /// The operator.
        op: UnaryOp,
        /// The operand.
        operand: TreeRef,
    },
    /// An array element access.
    Index {
        /// The indexed expression.
        base: TreeRef,
        /// The index expression.
        index: TreeRef,
    },
}

/// Kind numbers, fixed by variant order.
pub(crate) mod kind {
    pub const ENTITY: u32 = 0;
    pub const ARCHITECTURE: u32 = 1;
    pub const GENERIC_DECL: u32 = 2;
    pub const PORT_DECL: u32 = 3;
    pub const SIGNAL_DECL: u32 = 4;
    pub const CONST_DECL: u32 = 5;
    pub const VAR_DECL: u32 = 6;
    pub const PROCESS: u32 = 7;
    pub const INSTANCE: u32 = 8;
    pub const SIGNAL_ASSIGN: u32 = 9;
    pub const VAR_ASSIGN: u32 = 10;
    pub const IF: u32 = 11;
    pub const WHILE: u32 = 12;
    pub const WAIT: u32 = 13;
    pub const ASSERT: u32 = 14;
    pub const INT_LIT: u32 = 15;
    pub const REAL_LIT: u32 = 16;
    pub const ENUM_LIT: u32 = 17;
    pub const PHYS_LIT: u32 = 18;
    pub const STRING_LIT: u32 = 19;
    pub const REF: u32 = 20;
    pub const BINARY: u32 = 21;
    pub const UNARY: u32 = 22;
    pub const INDEX: u32 = 23;
}

static TREE_SCHEMA: SchemaTable = SchemaTable {
    tag: ObjectTag::Tree,
    kinds: &[
        KindSchema {
            name: "ENTITY",
            items: items(&[ItemSlot::Ident, ItemSlot::Generics, ItemSlot::Ports]),
        },
        KindSchema {
            name: "ARCHITECTURE",
            items: items(&[
                ItemSlot::Ident,
                ItemSlot::Ref,
                ItemSlot::Decls,
                ItemSlot::Stmts,
            ]),
        },
        KindSchema {
            name: "GENERIC_DECL",
            items: items(&[ItemSlot::Ident, ItemSlot::Type, ItemSlot::Value]),
        },
        KindSchema {
            name: "PORT_DECL",
            items: items(&[ItemSlot::Ident, ItemSlot::Type, ItemSlot::Value]),
        },
        KindSchema {
            name: "SIGNAL_DECL",
            items: items(&[ItemSlot::Ident, ItemSlot::Type, ItemSlot::Value]),
        },
        KindSchema {
            name: "CONST_DECL",
            items: items(&[ItemSlot::Ident, ItemSlot::Type, ItemSlot::Value]),
        },
        KindSchema {
            name: "VAR_DECL",
            items: items(&[ItemSlot::Ident, ItemSlot::Type, ItemSlot::Value]),
        },
        KindSchema {
            name: "PROCESS",
            items: items(&[
                ItemSlot::Ident,
                ItemSlot::Sensitivity,
                ItemSlot::Decls,
                ItemSlot::Stmts,
            ]),
        },
        KindSchema {
            name: "INSTANCE",
            items: items(&[
                ItemSlot::Ident,
                ItemSlot::Ref,
                ItemSlot::Generics,
                ItemSlot::Ports,
            ]),
        },
        KindSchema {
            name: "SIGNAL_ASSIGN",
            items: items(&[ItemSlot::Target, ItemSlot::Value, ItemSlot::Delay]),
        },
        KindSchema {
            name: "VAR_ASSIGN",
            items: items(&[ItemSlot::Target, ItemSlot::Value]),
        },
        KindSchema {
            name: "IF",
            items: items(&[ItemSlot::Condition, ItemSlot::Stmts]),
        },
        KindSchema {
            name: "WHILE",
            items: items(&[ItemSlot::Condition, ItemSlot::Stmts]),
        },
        KindSchema {
            name: "WAIT",
            items: items(&[ItemSlot::Sensitivity, ItemSlot::Condition, ItemSlot::Delay]),
        },
        KindSchema {
            name: "ASSERT",
            items: items(&[ItemSlot::Condition, ItemSlot::Message]),
        },
        KindSchema {
            name: "INT_LIT",
            items: items(&[ItemSlot::Value]),
        },
        KindSchema {
            name: "REAL_LIT",
            items: items(&[ItemSlot::Value]),
        },
        KindSchema {
            name: "ENUM_LIT",
            items: items(&[ItemSlot::Type, ItemSlot::Value]),
        },
        KindSchema {
            name: "PHYS_LIT",
            items: items(&[ItemSlot::Type, ItemSlot::Value]),
        },
        KindSchema {
            name: "STRING_LIT",
            items: items(&[ItemSlot::Value]),
        },
        KindSchema {
            name: "REF",
            items: items(&[ItemSlot::Ident]),
        },
        KindSchema {
            name: "BINARY",
            items: items(&[ItemSlot::Value]),
        },
        KindSchema {
            name: "UNARY",
            items: items(&[ItemSlot::Value]),
        },
        KindSchema {
            name: "INDEX",
            items: items(&[ItemSlot::Target, ItemSlot::Value]),
        },
    ],
    transitions: &[],
};

impl TreeData {
    fn kind_of(&self) -> u32 {
        match self {
            TreeData::Entity { .. } => kind::ENTITY,
            TreeData::Architecture { .. } => kind::ARCHITECTURE,
            TreeData::GenericDecl { .. } => kind::GENERIC_DECL,
            TreeData::PortDecl { .. } => kind::PORT_DECL,
            TreeData::SignalDecl { .. } => kind::SIGNAL_DECL,
            TreeData::ConstDecl { .. } => kind::CONST_DECL,
            TreeData::VarDecl { .. } => kind::VAR_DECL,
            TreeData::Process { .. } => kind::PROCESS,
            TreeData::Instance { .. } => kind::INSTANCE,
            TreeData::SignalAssign { .. } => kind::SIGNAL_ASSIGN,
            TreeData::VarAssign { .. } => kind::VAR_ASSIGN,
            TreeData::If { .. } => kind::IF,
            TreeData::While { .. } => kind::WHILE,
            TreeData::Wait { .. } => kind::WAIT,
            TreeData::Assert { .. } => kind::ASSERT,
            TreeData::IntLit { .. } => kind::INT_LIT,
            TreeData::RealLit { .. } => kind::REAL_LIT,
            TreeData::EnumLit { .. } => kind::ENUM_LIT,
            TreeData::PhysLit { .. } => kind::PHYS_LIT,
            TreeData::StringLit { .. } => kind::STRING_LIT,
            TreeData::Ref { .. } => kind::REF,
            TreeData::Binary { .. } => kind::BINARY,
            TreeData::Unary { .. } => kind::UNARY,
            TreeData::Index { .. } => kind::INDEX,
        }
    }

    fn visit_tree_refs(&self, f: &mut dyn FnMut(&TreeRef)) {
        match self {
            TreeData::Entity {
                generics, ports, ..
            } => {
                generics.iter().for_each(|h| f(h));
                ports.iter().for_each(|h| f(h));
            }
            TreeData::Architecture { decls, stmts, .. } => {
                decls.iter().for_each(|h| f(h));
                stmts.iter().for_each(|h| f(h));
            }
            TreeData::GenericDecl { default, .. } | TreeData::PortDecl { default, .. } => {
                default.iter().for_each(|h| f(h));
            }
            TreeData::SignalDecl { init, .. } | TreeData::VarDecl { init, .. } => {
                init.iter().for_each(|h| f(h));
            }
            TreeData::ConstDecl { value, .. } => f(value),
            TreeData::Process { decls, body, .. } => {
                decls.iter().for_each(|h| f(h));
                body.iter().for_each(|h| f(h));
            }
            TreeData::Instance {
                generic_map,
                port_map,
                ..
            } => {
                generic_map.iter().for_each(|(_, h)| f(h));
                port_map.iter().for_each(|(_, h)| f(h));
            }
            TreeData::SignalAssign {
                target,
                value,
                delay,
            } => {
                f(target);
                f(value);
                delay.iter().for_each(|h| f(h));
            }
            TreeData::VarAssign { target, value } => {
                f(target);
                f(value);
            }
            TreeData::If {
                cond,
                then_stmts,
                else_stmts,
            } => {
                f(cond);
                then_stmts.iter().for_each(|h| f(h));
                else_stmts.iter().for_each(|h| f(h));
            }
            TreeData::While { cond, body } => {
                cond.iter().for_each(|h| f(h));
                body.iter().for_each(|h| f(h));
            }
            TreeData::Wait { until, timeout, .. } => {
                until.iter().for_each(|h| f(h));
                timeout.iter().for_each(|h| f(h));
            }
            TreeData::Assert {
                cond,
                message,
                severity,
            } => {
                f(cond);
                message.iter().for_each(|h| f(h));
                severity.iter().for_each(|h| f(h));
            }
            TreeData::Binary { left, right, .. } => {
                f(left);
                f(right);
            }
            TreeData::Unary { operand, .. } => f(operand),
            TreeData::Index { base, index } => {
                f(base);
                f(index);
            }
            TreeData::IntLit { .. }
            | TreeData::RealLit { .. }
            | TreeData::EnumLit { .. }
            | TreeData::PhysLit { .. }
            | TreeData::StringLit { .. }
            | TreeData::Ref { .. } => {}
        }
    }

    fn map_tree_refs(&mut self, f: &mut dyn FnMut(TreeRef) -> TreeRef) {
        macro_rules! each {
            ($vec:expr) => {
                for h in $vec.iter_mut() {
                    *h = f(*h);
                }
            };
        }
        macro_rules! opt {
            ($opt:expr) => {
                if let Some(h) = $opt.as_mut() {
                    *h = f(*h);
                }
            };
        }
        match self {
            TreeData::Entity {
                generics, ports, ..
            } => {
                each!(generics);
                each!(ports);
            }
            TreeData::Architecture { decls, stmts, .. } => {
                each!(decls);
                each!(stmts);
            }
            TreeData::GenericDecl { default, .. } | TreeData::PortDecl { default, .. } => {
                opt!(default)
            }
            TreeData::SignalDecl { init, .. } | TreeData::VarDecl { init, .. } => opt!(init),
            TreeData::ConstDecl { value, .. } => *value = f(*value),
            TreeData::Process { decls, body, .. } => {
                each!(decls);
                each!(body);
            }
            TreeData::Instance {
                generic_map,
                port_map,
                ..
            } => {
                for (_, h) in generic_map.iter_mut() {
                    *h = f(*h);
                }
                for (_, h) in port_map.iter_mut() {
                    *h = f(*h);
                }
            }
            TreeData::SignalAssign {
                target,
                value,
                delay,
            } => {
                *target = f(*target);
                *value = f(*value);
                opt!(delay);
            }
            TreeData::VarAssign { target, value } => {
                *target = f(*target);
                *value = f(*value);
            }
            TreeData::If {
                cond,
                then_stmts,
                else_stmts,
            } => {
                *cond = f(*cond);
                each!(then_stmts);
                each!(else_stmts);
            }
            TreeData::While { cond, body } => {
                opt!(cond);
                each!(body);
            }
            TreeData::Wait { until, timeout, .. } => {
                opt!(until);
                opt!(timeout);
            }
            TreeData::Assert {
                cond,
                message,
                severity,
            } => {
                *cond = f(*cond);
                opt!(message);
                opt!(severity);
            }
            TreeData::Binary { left, right, .. } => {
                *left = f(*left);
                *right = f(*right);
            }
            TreeData::Unary { operand, .. } => *operand = f(*operand),
            TreeData::Index { base, index } => {
                *base = f(*base);
                *index = f(*index);
            }
            TreeData::IntLit { .. }
            | TreeData::RealLit { .. }
            | TreeData::EnumLit { .. }
            | TreeData::PhysLit { .. }
            | TreeData::StringLit { .. }
            | TreeData::Ref { .. } => {}
        }
    }
}

impl TreeNode {
    /// Calls `f` with every type reference this node carries.
    pub fn visit_type_refs(&self, f: &mut dyn FnMut(TypeRef)) {
        match &self.data {
            TreeData::GenericDecl { ty, .. }
            | TreeData::PortDecl { ty, .. }
            | TreeData::SignalDecl { ty, .. }
            | TreeData::ConstDecl { ty, .. }
            | TreeData::VarDecl { ty, .. }
            | TreeData::EnumLit { ty, .. }
            | TreeData::PhysLit { ty, .. } => f(*ty),
            _ => {}
        }
    }

    /// Rewrites every type reference this node carries through `f`.
    pub fn map_type_refs(&mut self, f: &mut dyn FnMut(TypeRef) -> TypeRef) {
        match &mut self.data {
            TreeData::GenericDecl { ty, .. }
            | TreeData::PortDecl { ty, .. }
            | TreeData::SignalDecl { ty, .. }
            | TreeData::ConstDecl { ty, .. }
            | TreeData::VarDecl { ty, .. }
            | TreeData::EnumLit { ty, .. }
            | TreeData::PhysLit { ty, .. } => *ty = f(*ty),
            _ => {}
        }
    }
}

impl Node for TreeNode {
    const TAG: ObjectTag = ObjectTag::Tree;

    fn schema() -> &'static SchemaTable {
        &TREE_SCHEMA
    }

    fn kind(&self) -> u32 {
        self.data.kind_of()
    }

    fn visit_handles(&self, f: &mut dyn FnMut(Handle)) {
        self.data.visit_tree_refs(&mut |h| f(*h));
    }

    fn map_handles(&mut self, f: &mut dyn FnMut(Handle) -> Handle) {
        self.data.map_tree_refs(f);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veld_object::ArenaId;

    fn handle(i: u32) -> Handle {
        Handle::new(ArenaId::from_raw(0), i)
    }

    #[test]
    fn kind_numbers_follow_variant_order() {
        let node = TreeNode::synthetic(TreeData::Entity {
            ident: Ident::from_raw(0),
            generics: vec![],
            ports: vec![],
        });
        assert_eq!(node.kind(), kind::ENTITY);

        let node = TreeNode::synthetic(TreeData::Ref {
            ident: Ident::from_raw(0),
        });
        assert_eq!(node.kind(), kind::REF);
    }

    #[test]
    fn visit_handles_covers_children() {
        let node = TreeNode::synthetic(TreeData::Binary {
            op: BinaryOp::Add,
            left: handle(1),
            right: handle(2),
        });
        let mut seen = Vec::new();
        node.visit_handles(&mut |h| seen.push(h.index));
        assert_eq!(seen, vec![1, 2]);
    }

    #[test]
    fn map_handles_rewrites_children() {
        let mut node = TreeNode::synthetic(TreeData::SignalAssign {
            target: handle(1),
            value: handle(2),
            delay: Some(handle(3)),
        });
        node.map_handles(&mut |h| Handle::new(h.arena, h.index + 10));
        let TreeData::SignalAssign {
            target,
            value,
            delay,
        } = &node.data
        else {
            unreachable!();
        };
        assert_eq!(target.index, 11);
        assert_eq!(value.index, 12);
        assert_eq!(delay.unwrap().index, 13);
    }

    #[test]
    fn type_refs_are_separate_from_tree_refs() {
        let ty = Handle::new(ArenaId::from_raw(9), 4);
        let node = TreeNode::synthetic(TreeData::SignalDecl {
            ident: Ident::from_raw(0),
            ty,
            init: Some(handle(5)),
        });

        let mut tree_refs = Vec::new();
        node.visit_handles(&mut |h| tree_refs.push(h));
        assert_eq!(tree_refs, vec![handle(5)]);

        let mut type_refs = Vec::new();
        node.visit_type_refs(&mut |t| type_refs.push(t));
        assert_eq!(type_refs, vec![ty]);
    }

    #[test]
    fn map_type_refs_rewrites() {
        let mut node = TreeNode::synthetic(TreeData::EnumLit {
            ty: Handle::new(ArenaId::from_raw(1), 2),
            ordinal: 3,
        });
        node.map_type_refs(&mut |t| Handle::new(t.arena, t.index + 100));
        let TreeData::EnumLit { ty, .. } = &node.data else {
            unreachable!();
        };
        assert_eq!(ty.index, 102);
    }

    #[test]
    fn schema_digest_is_stable() {
        assert_eq!(TreeNode::schema().digest(), TreeNode::schema().digest());
    }

    #[test]
    fn serde_roundtrip() {
        let node = TreeNode::synthetic(TreeData::IntLit { value: -42 });
        let json = serde_json::to_string(&node).unwrap();
        let back: TreeNode = serde_json::from_str(&json).unwrap();
        assert_eq!(node, back);
    }
}
