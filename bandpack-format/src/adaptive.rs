//! Adaptive (run) coding: the first `K` values use a head coding, the rest a
//! tail coding. Tails may themselves be adaptive, forming a chain.
//!
//! `K` is stored as `(KB + 1) << (4 * KX)`, so only lengths of that shape are
//! codable.

use crate::coding::Coding;
use crate::constants::{ADAPTIVE_KB_DEFAULT, META_POP, META_RUN};
use crate::error::{PackError, Result};
use crate::limits::Limits;
use crate::method::{parse_nested, CodingMethod, MetaBytes, MetaReader};
use smallvec::smallvec;
use std::fmt;
use std::io::{Read, Write};

/// Head/tail split of a band at a fixed position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdaptiveCoding {
    head_len: usize,
    head: CodingMethod,
    tail: CodingMethod,
}

impl AdaptiveCoding {
    /// Build a run coding. `head_len` must be codable.
    pub fn new(head_len: usize, head: CodingMethod, tail: CodingMethod) -> Result<Self> {
        if !Self::is_codable_length(head_len) {
            return Err(PackError::InvalidCoding(format!(
                "run length {} is not codable",
                head_len
            )));
        }
        Ok(Self { head_len, head, tail })
    }

    /// True if `k` can be written as `(KB + 1) << (4 * KX)`.
    pub fn is_codable_length(k: usize) -> bool {
        Self::kx_kb(k).is_some()
    }

    /// Every codable run length up to and including `max`, ascending.
    pub fn codable_lengths(max: usize) -> Vec<usize> {
        let mut lengths: Vec<usize> = (0..4u32)
            .flat_map(|kx| (1..=256usize).map(move |kb1| kb1 << (4 * kx)))
            .filter(|k| *k <= max)
            .collect();
        lengths.sort_unstable();
        lengths.dedup();
        lengths
    }

    fn kx_kb(k: usize) -> Option<(u32, u32)> {
        if k == 0 {
            return None;
        }
        let mut found = None;
        for kx in 0..4u32 {
            let unit = 1usize << (4 * kx);
            if k % unit != 0 {
                break;
            }
            let kb1 = k / unit;
            if (1..=256).contains(&kb1) {
                let kb = (kb1 - 1) as u32;
                if kb == ADAPTIVE_KB_DEFAULT {
                    return Some((kx, kb));
                }
                found.get_or_insert((kx, kb));
            }
        }
        found
    }

    /// Number of values coded by the head.
    pub fn head_len(&self) -> usize {
        self.head_len
    }

    /// Coding of the first [`head_len`](Self::head_len) values.
    pub fn head(&self) -> &CodingMethod {
        &self.head
    }

    /// Coding of the remaining values.
    pub fn tail(&self) -> &CodingMethod {
        &self.tail
    }

    fn split_at<'v>(&self, values: &'v [i32]) -> (&'v [i32], &'v [i32]) {
        values.split_at(self.head_len.min(values.len()))
    }

    pub(crate) fn coding_at(&self, index: usize) -> Option<(Coding, usize)> {
        if index < self.head_len {
            self.head.coding_at(index)
        } else {
            self.tail
                .coding_at(index - self.head_len)
                .map(|(coding, start)| (coding, start + self.head_len))
        }
    }

    pub(crate) fn array_length(&self, values: &[i32]) -> Option<usize> {
        let (head, tail) = self.split_at(values);
        Some(self.head.array_length(head)? + self.tail.array_length(tail)?)
    }

    pub(crate) fn write_array_to<W: Write + ?Sized>(&self, out: &mut W, values: &[i32]) -> Result<()> {
        let (head, tail) = self.split_at(values);
        self.head.write_array_to(out, head)?;
        self.tail.write_array_to(out, tail)
    }

    pub(crate) fn read_array_from<R: Read + ?Sized>(&self, input: &mut R, values: &mut [i32]) -> Result<()> {
        let split = self.head_len.min(values.len());
        let (head, tail) = values.split_at_mut(split);
        self.head.read_array_from(input, head)?;
        self.tail.read_array_from(input, tail)
    }

    pub(crate) fn meta_coding(&self, dflt: &Coding) -> MetaBytes {
        let (kx, kb) = Self::kx_kb(self.head_len).unwrap_or((0, ADAPTIVE_KB_DEFAULT));
        let kb_flag = kb != ADAPTIVE_KB_DEFAULT;
        let ab_def = if self.head.is_coding(dflt) {
            1
        } else if self.tail.is_coding(dflt) {
            2
        } else {
            0
        };
        let op = META_RUN as u32 + kx + 4 * kb_flag as u32 + 8 * ab_def;
        let mut meta: MetaBytes = smallvec![op as u8];
        if kb_flag {
            meta.push(kb as u8);
        }
        if ab_def != 1 {
            meta.extend_from_slice(&self.head.meta_coding(dflt));
        }
        if ab_def != 2 {
            meta.extend_from_slice(&self.tail.meta_coding(dflt));
        }
        meta
    }

    pub(crate) fn parse_meta(
        op: u8,
        reader: &mut MetaReader<'_>,
        dflt: &Coding,
        limits: &Limits,
        depth: usize,
    ) -> Result<Option<Self>> {
        if !(META_RUN..META_POP).contains(&op) {
            return Ok(None);
        }
        let x = (op - META_RUN) as u32;
        let kx = x & 3;
        let kb_flag = (x >> 2) & 1 != 0;
        let ab_def = x >> 3;
        let kb = if kb_flag {
            reader.next_byte()? as u32
        } else {
            ADAPTIVE_KB_DEFAULT
        };
        let head_len = ((kb + 1) as usize) << (4 * kx);
        let head = if ab_def == 1 {
            CodingMethod::Coding(*dflt)
        } else {
            parse_nested(reader, dflt, limits, depth + 1)?
        };
        let tail = if ab_def == 2 {
            CodingMethod::Coding(*dflt)
        } else {
            parse_nested(reader, dflt, limits, depth + 1)?
        };
        Ok(Some(Self { head_len, head, tail }))
    }
}

impl fmt::Display for AdaptiveCoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run({}*{} {})", self.head_len, self.head, self.tail)
    }
}
