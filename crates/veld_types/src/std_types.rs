//! The predefined types of STD.STANDARD and IEEE.std_logic_1164.

use crate::table::TypeTable;
use crate::ty::{PhysicalUnit, Range, RealRange, TypeNode, TypeRef};
use veld_common::Interner;

/// References to the predefined types, installed once per session.
#[derive(Clone, Copy, Debug)]
pub struct StdTypes {
    /// STD.STANDARD.BOOLEAN.
    pub boolean: TypeRef,
    /// STD.STANDARD.BIT.
    pub bit: TypeRef,
    /// STD.STANDARD.CHARACTER.
    pub character: TypeRef,
    /// STD.STANDARD.SEVERITY_LEVEL.
    pub severity_level: TypeRef,
    /// STD.STANDARD.INTEGER.
    pub integer: TypeRef,
    /// STD.STANDARD.NATURAL.
    pub natural: TypeRef,
    /// STD.STANDARD.REAL.
    pub real: TypeRef,
    /// STD.STANDARD.TIME.
    pub time: TypeRef,
    /// STD.STANDARD.STRING.
    pub string: TypeRef,
    /// STD.STANDARD.BIT_VECTOR.
    pub bit_vector: TypeRef,
    /// IEEE.std_logic_1164.STD_ULOGIC.
    pub std_ulogic: TypeRef,
    /// IEEE.std_logic_1164.STD_LOGIC.
    pub std_logic: TypeRef,
    /// IEEE.std_logic_1164.STD_LOGIC_VECTOR.
    pub std_logic_vector: TypeRef,
}

/// Names of the control characters below space in CHARACTER.
const CONTROL_NAMES: [&str; 32] = [
    "NUL", "SOH", "STX", "ETX", "EOT", "ENQ", "ACK", "BEL", "BS", "HT", "LF", "VT", "FF", "CR",
    "SO", "SI", "DLE", "DC1", "DC2", "DC3", "DC4", "NAK", "SYN", "ETB", "CAN", "EM", "SUB", "ESC",
    "FSP", "GSP", "RSP", "USP",
];

impl StdTypes {
    /// Installs the predefined types into `table`.
    pub fn install(table: &mut TypeTable, interner: &Interner) -> Self {
        let boolean = table.add(TypeNode::Enum {
            ident: interner.intern("STD.STANDARD.BOOLEAN"),
            literals: vec![interner.intern("FALSE"), interner.intern("TRUE")],
        });

        let bit = table.add(TypeNode::Enum {
            ident: interner.intern("STD.STANDARD.BIT"),
            literals: vec![interner.intern("'0'"), interner.intern("'1'")],
        });

        let mut char_literals = Vec::with_capacity(256);
        for name in CONTROL_NAMES {
            char_literals.push(interner.intern(name));
        }
        for c in 32u8..=126 {
            char_literals.push(interner.intern(&format!("'{}'", c as char)));
        }
        char_literals.push(interner.intern("DEL"));
        for i in 128u32..=255 {
            char_literals.push(interner.intern(&format!("C{i}")));
        }
        let character = table.add(TypeNode::Enum {
            ident: interner.intern("STD.STANDARD.CHARACTER"),
            literals: char_literals,
        });

        let severity_level = table.add(TypeNode::Enum {
            ident: interner.intern("STD.STANDARD.SEVERITY_LEVEL"),
            literals: vec![
                interner.intern("NOTE"),
                interner.intern("WARNING"),
                interner.intern("ERROR"),
                interner.intern("FAILURE"),
            ],
        });

        let integer = table.add(TypeNode::Integer {
            ident: interner.intern("STD.STANDARD.INTEGER"),
            range: Range::to(i32::MIN as i64, i32::MAX as i64),
        });

        let natural = table.add(TypeNode::Subtype {
            ident: Some(interner.intern("STD.STANDARD.NATURAL")),
            base: integer,
            constraint: Some(vec![Range::to(0, i32::MAX as i64)]),
            resolution: None,
        });

        let real = table.add(TypeNode::Real {
            ident: interner.intern("STD.STANDARD.REAL"),
            range: RealRange {
                low: f64::MIN,
                high: f64::MAX,
            },
        });

        let time = table.add(TypeNode::Physical {
            ident: interner.intern("STD.STANDARD.TIME"),
            range: Range::to(i64::MIN, i64::MAX),
            units: vec![
                PhysicalUnit {
                    name: interner.intern("fs"),
                    multiplier: 1,
                },
                PhysicalUnit {
                    name: interner.intern("ps"),
                    multiplier: 1_000,
                },
                PhysicalUnit {
                    name: interner.intern("ns"),
                    multiplier: 1_000_000,
                },
                PhysicalUnit {
                    name: interner.intern("us"),
                    multiplier: 1_000_000_000,
                },
                PhysicalUnit {
                    name: interner.intern("ms"),
                    multiplier: 1_000_000_000_000,
                },
                PhysicalUnit {
                    name: interner.intern("sec"),
                    multiplier: 1_000_000_000_000_000,
                },
                PhysicalUnit {
                    name: interner.intern("min"),
                    multiplier: 60_000_000_000_000_000,
                },
                PhysicalUnit {
                    name: interner.intern("hr"),
                    multiplier: 3_600_000_000_000_000_000,
                },
            ],
        });

        let string = table.add(TypeNode::Uarray {
            ident: interner.intern("STD.STANDARD.STRING"),
            index: vec![natural],
            elem: character,
        });

        let bit_vector = table.add(TypeNode::Uarray {
            ident: interner.intern("STD.STANDARD.BIT_VECTOR"),
            index: vec![natural],
            elem: bit,
        });

        let std_ulogic = table.add(TypeNode::Enum {
            ident: interner.intern("IEEE.std_logic_1164.STD_ULOGIC"),
            literals: vec![
                interner.intern("'U'"),
                interner.intern("'X'"),
                interner.intern("'0'"),
                interner.intern("'1'"),
                interner.intern("'Z'"),
                interner.intern("'W'"),
                interner.intern("'L'"),
                interner.intern("'H'"),
                interner.intern("'-'"),
            ],
        });

        let std_logic = table.add(TypeNode::Subtype {
            ident: Some(interner.intern("IEEE.std_logic_1164.STD_LOGIC")),
            base: std_ulogic,
            constraint: None,
            resolution: Some(interner.intern("IEEE.std_logic_1164.RESOLVED")),
        });

        let std_logic_vector = table.add(TypeNode::Uarray {
            ident: interner.intern("IEEE.std_logic_1164.STD_LOGIC_VECTOR"),
            index: vec![natural],
            elem: std_logic,
        });

        Self {
            boolean,
            bit,
            character,
            severity_level,
            integer,
            natural,
            real,
            time,
            string,
            bit_vector,
            std_ulogic,
            std_logic,
            std_logic_vector,
        }
    }
}
