//! Parsing text into typed values.
//!
//! [`parse_value`] converts a string to a value of a given type: integers
//! (with `_` separators), reals, enumeration literals, physical values with
//! a mandatory unit, and arrays of enumeration literals including quoted
//! strings and hex bit-string literals.

use crate::table::TypeTable;
use crate::ty::{kind, TypeNode, TypeRef};
use veld_common::Interner;
use veld_object::Node;

/// A value produced by [`parse_value`].
#[derive(Clone, Debug, PartialEq)]
pub enum ParsedValue {
    /// An integer, enumeration ordinal, or physical value in primary units.
    Integer(i64),
    /// A real value.
    Real(f64),
    /// Element ordinals of an array of enumeration values.
    Enums(Vec<u8>),
}

/// Parses `input` as a value of type `t`. Returns `None` if the text does
/// not denote a value of the type.
pub fn parse_value(
    table: &TypeTable,
    interner: &Interner,
    t: TypeRef,
    input: &str,
) -> Option<ParsedValue> {
    let base = table.base_recur(t);
    match table.get(base).kind() {
        kind::INTEGER => parse_integer(input).map(ParsedValue::Integer),
        kind::REAL => parse_real(input).map(ParsedValue::Real),
        kind::ENUM => {
            let ordinal = enum_ordinal(table, interner, base, input.trim())?;
            Some(ParsedValue::Integer(ordinal as i64))
        }
        kind::PHYSICAL => parse_physical(table, interner, base, input).map(ParsedValue::Integer),
        kind::CARRAY | kind::UARRAY => {
            let elem = table.elem_of(base)?;
            let elem_base = table.base_recur(elem);
            if table.get(elem_base).kind() != kind::ENUM {
                return None;
            }
            parse_enum_array(table, interner, elem_base, input).map(ParsedValue::Enums)
        }
        _ => None,
    }
}

/// Parses a decimal integer with optional sign, `_` separators, and
/// surrounding whitespace.
fn parse_integer(input: &str) -> Option<i64> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };
    if digits.is_empty() || !digits.chars().next().unwrap().is_ascii_digit() {
        return None;
    }

    let mut magnitude: i128 = 0;
    for c in digits.chars() {
        match c {
            '0'..='9' => {
                magnitude = magnitude
                    .checked_mul(10)?
                    .checked_add((c as u8 - b'0') as i128)?;
            }
            '_' => continue,
            _ => return None,
        }
    }
    let signed = if negative { -magnitude } else { magnitude };
    i64::try_from(signed).ok()
}

/// Parses a real number with surrounding whitespace.
fn parse_real(input: &str) -> Option<f64> {
    input.trim().parse().ok()
}

/// Looks up an enumeration literal's ordinal.
///
/// Identifier literals compare case-insensitively; character literals
/// (`'x'`) compare exactly.
fn enum_ordinal(table: &TypeTable, interner: &Interner, t: TypeRef, name: &str) -> Option<u8> {
    let literals = table.enum_literals(t)?;
    let is_char = name.starts_with('\'');
    literals
        .iter()
        .position(|lit| {
            let text = interner.resolve(*lit);
            if is_char {
                text == name
            } else {
                text.eq_ignore_ascii_case(name)
            }
        })
        .and_then(|i| u8::try_from(i).ok())
}

/// Parses a physical value: a number followed by a mandatory unit name.
fn parse_physical(
    table: &TypeTable,
    interner: &Interner,
    t: TypeRef,
    input: &str,
) -> Option<i64> {
    let trimmed = input.trim();
    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || matches!(c, '-' | '.' | '_')))
        .unwrap_or(trimmed.len());
    let (number_text, unit_text) = trimmed.split_at(split);
    let unit_text = unit_text.trim();
    if number_text.is_empty() || unit_text.is_empty() {
        return None;
    }

    let TypeNode::Physical { units, .. } = table.get(t) else {
        return None;
    };
    let unit = units
        .iter()
        .find(|u| interner.resolve(u.name).eq_ignore_ascii_case(unit_text))?;

    if let Some(int) = parse_integer(number_text) {
        return int.checked_mul(unit.multiplier as i64);
    }
    let real: f64 = number_text.parse().ok()?;
    let scaled = real * unit.multiplier as f64;
    if !scaled.is_finite() {
        return None;
    }
    Some(scaled.round() as i64)
}

/// Parses an array of enumeration values.
///
/// Tries, in order: the verbatim text with every character (including
/// whitespace) mapped to a character literal of the element type; a hex
/// bit-string literal (`X"4A"`); a quoted string; a bare run of characters.
fn parse_enum_array(
    table: &TypeTable,
    interner: &Interner,
    elem: TypeRef,
    input: &str,
) -> Option<Vec<u8>> {
    if let Some(ordinals) = map_chars(table, interner, elem, input) {
        return Some(ordinals);
    }

    let trimmed = input.trim();

    let upper = trimmed.as_bytes().first().copied();
    if matches!(upper, Some(b'X') | Some(b'x'))
        && trimmed.len() > 3
        && trimmed[1..].starts_with('"')
        && trimmed.ends_with('"')
    {
        let zero = enum_ordinal(table, interner, elem, "'0'")?;
        let one = enum_ordinal(table, interner, elem, "'1'")?;
        let mut bits = Vec::new();
        for c in trimmed[2..trimmed.len() - 1].chars() {
            let nibble = c.to_digit(16)? as u8;
            for shift in (0..4).rev() {
                bits.push(if nibble >> shift & 1 == 1 { one } else { zero });
            }
        }
        return Some(bits);
    }

    let inner = if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        &trimmed[1..trimmed.len() - 1]
    } else {
        trimmed
    };
    map_chars(table, interner, elem, inner)
}

/// Maps every character of `text` to a character literal ordinal of `elem`.
fn map_chars(
    table: &TypeTable,
    interner: &Interner,
    elem: TypeRef,
    text: &str,
) -> Option<Vec<u8>> {
    if text.is_empty() {
        return None;
    }
    let mut out = Vec::with_capacity(text.len());
    for c in text.chars() {
        let literal = format!("'{c}'");
        out.push(enum_ordinal(table, interner, elem, &literal)?);
    }
    Some(out)
}
