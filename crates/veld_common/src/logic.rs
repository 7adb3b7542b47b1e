//! Nine-value logic scalars with the IEEE 1164 resolution table.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single nine-state logic value following IEEE 1164 `std_ulogic`.
///
/// The discriminants match the declaration order of the standard enumeration,
/// so a [`Logic`] converts losslessly to and from the ordinal stored in
/// signal memory.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[repr(u8)]
pub enum Logic {
    /// Uninitialized.
    U = 0,
    /// Forcing unknown.
    X = 1,
    /// Forcing zero.
    Zero = 2,
    /// Forcing one.
    One = 3,
    /// High impedance.
    Z = 4,
    /// Weak unknown.
    W = 5,
    /// Weak zero.
    L = 6,
    /// Weak one.
    H = 7,
    /// Don't care.
    DontCare = 8,
}

/// IEEE 1164 `resolved` function table, indexed by ordinal pairs.
const RESOLUTION: [[Logic; 9]; 9] = {
    use Logic::*;
    [
        // U  X  0  1  Z  W  L  H  -
        [U, U, U, U, U, U, U, U, U],                            // U
        [U, X, X, X, X, X, X, X, X],                            // X
        [U, X, Zero, X, Zero, Zero, Zero, Zero, X],             // 0
        [U, X, X, One, One, One, One, One, X],                  // 1
        [U, X, Zero, One, Z, W, L, H, X],                       // Z
        [U, X, Zero, One, W, W, W, W, X],                       // W
        [U, X, Zero, One, L, W, L, W, X],                       // L
        [U, X, Zero, One, H, W, W, H, X],                       // H
        [U, X, X, X, X, X, X, X, X],                            // -
    ]
};

impl Logic {
    /// Converts an ordinal in `0..9` to a [`Logic`] value.
    pub fn from_ordinal(ord: u8) -> Option<Self> {
        use Logic::*;
        match ord {
            0 => Some(U),
            1 => Some(X),
            2 => Some(Zero),
            3 => Some(One),
            4 => Some(Z),
            5 => Some(W),
            6 => Some(L),
            7 => Some(H),
            8 => Some(DontCare),
            _ => None,
        }
    }

    /// Returns the ordinal of this value in the standard enumeration.
    pub fn ordinal(self) -> u8 {
        self as u8
    }

    /// Converts a character to a [`Logic`] value.
    pub fn from_char(c: char) -> Option<Self> {
        use Logic::*;
        match c.to_ascii_uppercase() {
            'U' => Some(U),
            'X' => Some(X),
            '0' => Some(Zero),
            '1' => Some(One),
            'Z' => Some(Z),
            'W' => Some(W),
            'L' => Some(L),
            'H' => Some(H),
            '-' => Some(DontCare),
            _ => None,
        }
    }

    /// Returns the display character for this value.
    pub fn to_char(self) -> char {
        use Logic::*;
        match self {
            U => 'U',
            X => 'X',
            Zero => '0',
            One => '1',
            Z => 'Z',
            W => 'W',
            L => 'L',
            H => 'H',
            DontCare => '-',
        }
    }

    /// Resolves two driver contributions per the IEEE 1164 table.
    pub fn resolve(self, other: Self) -> Self {
        RESOLUTION[self as usize][other as usize]
    }

    /// Resolves an arbitrary number of driver contributions.
    ///
    /// An empty iterator yields `Z`, matching the standard's resolution of a
    /// disconnected bus.
    pub fn resolve_all(values: impl IntoIterator<Item = Logic>) -> Self {
        values.into_iter().fold(Logic::Z, Logic::resolve)
    }
}

impl fmt::Display for Logic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_char())
    }
}
