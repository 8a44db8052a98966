//! Canonical coding table and well-known codings
//!
//! Meta-coding bytes `1..=115` name an entry of this table directly. The
//! table layout is fixed by the archive format and must never be reordered.

use crate::coding::Coding;
use crate::constants::{META_CANON_MAX, META_CANON_MIN};
use ahash::AHashMap;
use std::sync::LazyLock;

/// Single unsigned byte.
pub const BYTE1: Coding = Coding::of(1, 256, 0, 0);
/// Character data, mostly one byte.
pub const CHAR3: Coding = Coding::of(3, 128, 0, 0);
/// Bytecode indexes, mostly one-byte offsets.
pub const BCI5: Coding = Coding::of(5, 4, 0, 0);
/// Branch offsets, mostly forward.
pub const BRANCH5: Coding = Coding::of(5, 4, 2, 0);
/// General purpose unsigned coding; represents every `i32`.
pub const UNSIGNED5: Coding = Coding::of(5, 64, 0, 0);
/// Delta of [`UNSIGNED5`].
pub const UDELTA5: Coding = UNSIGNED5.delta_coding();
/// General purpose signed coding.
pub const SIGNED5: Coding = Coding::of(5, 64, 1, 0);
/// Delta of [`SIGNED5`].
pub const DELTA5: Coding = SIGNED5.delta_coding();
/// Delta coding biased towards increasing sequences.
pub const MDELTA5: Coding = Coding::of(5, 64, 2, 1);

const TABLE_LEN: usize = (META_CANON_MAX - META_CANON_MIN + 1) as usize;

const fn build_table() -> [Coding; TABLE_LEN] {
    let mut table = [BYTE1; TABLE_LEN];
    let mut i = 0;

    // Fixed-length codings, plain and delta, signed and unsigned.
    let mut b = 1;
    while b <= 4 {
        table[i] = Coding::of(b, 256, 0, 0);
        table[i + 1] = Coding::of(b, 256, 1, 0);
        table[i + 2] = Coding::of(b, 256, 0, 1);
        table[i + 3] = Coding::of(b, 256, 1, 1);
        i += 4;
        b += 1;
    }

    // Full-range variable-length codings, then their deltas.
    const FULL_H: [u32; 5] = [4, 16, 32, 64, 128];
    let mut d = 0;
    while d <= 1 {
        let mut k = 0;
        while k < FULL_H.len() {
            let mut s = 0;
            while s <= 2 {
                table[i] = Coding::of(5, FULL_H[k], s, d);
                i += 1;
                s += 1;
            }
            k += 1;
        }
        d += 1;
    }

    // Variable-length subrange codings.
    const SUB_H: [u32; 5] = [192, 224, 240, 248, 252];
    const SUB_DELTA_H: [u32; 9] = [8, 16, 32, 64, 128, 192, 224, 240, 248];
    let mut b = 2;
    while b <= 4 {
        let mut k = 0;
        while k < SUB_H.len() {
            table[i] = Coding::of(b, SUB_H[k], 0, 0);
            i += 1;
            k += 1;
        }
        let mut k = 0;
        while k < SUB_DELTA_H.len() {
            table[i] = Coding::of(b, SUB_DELTA_H[k], 0, 1);
            table[i + 1] = Coding::of(b, SUB_DELTA_H[k], 1, 1);
            i += 2;
            k += 1;
        }
        b += 1;
    }

    assert!(i == TABLE_LEN);
    table
}

static CANONICAL: [Coding; TABLE_LEN] = build_table();

static CANONICAL_INDEX: LazyLock<AHashMap<Coding, u8>> = LazyLock::new(|| {
    CANONICAL
        .iter()
        .enumerate()
        .map(|(i, c)| (*c, i as u8 + META_CANON_MIN))
        .collect()
});

const POPULAR: [Coding; 9] = [
    UNSIGNED5, SIGNED5, UDELTA5, DELTA5, MDELTA5, BYTE1, CHAR3, BCI5, BRANCH5,
];

/// Coding named by meta byte `index`, if it is a canonical index.
pub fn canonical_coding(index: u8) -> Option<Coding> {
    if !(META_CANON_MIN..=META_CANON_MAX).contains(&index) {
        return None;
    }
    Some(CANONICAL[(index - META_CANON_MIN) as usize])
}

/// Canonical index of `coding`, if it is in the table.
pub fn canonical_index(coding: &Coding) -> Option<u8> {
    CANONICAL_INDEX.get(coding).copied()
}

/// Every canonical coding, in index order.
pub fn all_canonical() -> &'static [Coding] {
    &CANONICAL
}

/// The small set of codings tried at moderate effort.
pub fn popular_codings() -> &'static [Coding] {
    &POPULAR
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_bounds() {
        assert_eq!(all_canonical().len(), 115);
        assert_eq!(canonical_coding(0), None);
        assert_eq!(canonical_coding(116), None);
        assert_eq!(canonical_coding(1), Some(BYTE1));
        assert_eq!(canonical_coding(115), Some(Coding::of(4, 248, 1, 1)));
    }

    #[test]
    fn test_well_known_indexes() {
        assert_eq!(canonical_index(&BYTE1), Some(1));
        assert_eq!(canonical_index(&BCI5), Some(17));
        assert_eq!(canonical_index(&BRANCH5), Some(19));
        assert_eq!(canonical_index(&UNSIGNED5), Some(26));
        assert_eq!(canonical_index(&SIGNED5), Some(27));
        assert_eq!(canonical_index(&UDELTA5), Some(41));
        assert_eq!(canonical_index(&DELTA5), Some(42));
        assert_eq!(canonical_index(&MDELTA5), Some(43));
        assert_eq!(canonical_index(&CHAR3), None);
    }

    #[test]
    fn test_table_entries_are_unique() {
        for (i, coding) in all_canonical().iter().enumerate() {
            assert_eq!(canonical_index(coding), Some(i as u8 + 1), "{}", coding);
        }
    }
}
