//! Escape values
//!
//! The first value of a band is always read with the band's regular coding.
//! A reserved run of 256 values in that coding's range stands for a
//! meta-coding selector byte `XB` instead of data:
//!
//! - signed regular codings reserve `-256..=-1`, with `XB = -1 - X`
//! - unsigned regular codings reserve `L..=L+255`, with `XB = X - L`

use crate::coding::Coding;

/// True if `regular` is able to carry escape values at all.
///
/// Single-byte and fixed-width (`L == 0`) codings cannot.
pub fn supports_escapes(regular: &Coding) -> bool {
    if regular.b() == 1 || regular.l() == 0 {
        return false;
    }
    if regular.s() != 0 {
        regular.min() <= -256
    } else {
        regular.max() >= regular.l() as i32 + 255
    }
}

/// Decode `x` as an escape value, returning the selector byte if it is one.
pub fn decode_escape_value(x: i32, regular: &Coding) -> Option<u8> {
    if regular.b() == 1 || regular.l() == 0 {
        return None;
    }
    if regular.s() != 0 {
        if (-256..=-1).contains(&x) && regular.min() <= -256 {
            return Some((-1 - x) as u8);
        }
    } else {
        let l = regular.l() as i32;
        if (l..=l + 255).contains(&x) && regular.max() >= l + 255 {
            return Some((x - l) as u8);
        }
    }
    None
}

/// Encode selector byte `xb` as an escape value of `regular`.
///
/// Returns `None` if `regular` does not support escapes.
pub fn encode_escape_value(xb: u8, regular: &Coding) -> Option<i32> {
    if !supports_escapes(regular) {
        return None;
    }
    let x = if regular.s() != 0 {
        -1 - xb as i32
    } else {
        xb as i32 + regular.l() as i32
    };
    debug_assert_eq!(decode_escape_value(x, regular), Some(xb));
    Some(x)
}
