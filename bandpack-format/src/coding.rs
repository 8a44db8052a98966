//! BHSD integer codings
//!
//! A coding is described by four small parameters:
//!
//! - `B`: maximum number of bytes per value (1..=5)
//! - `H`: the "high" radix of continuation bytes (1..=256); `L = 256 - H`
//!   byte values terminate a value early
//! - `S`: sign folding (0 = unsigned, 1 = zigzag, 2 = one negative per three)
//! - `D`: delta depth (0 or 1)
//!
//! All arithmetic is done on 32-bit values with wraparound, so the
//! full-range codings carry every `i32`.

use crate::constants::B_MAX;
use crate::error::{PackError, Result};
use smallvec::SmallVec;
use std::fmt;
use std::io::{Read, Write};

/// Encoded bytes of a single value.
pub type ValueBytes = SmallVec<[u8; B_MAX]>;

/// A single BHSD coding. Immutable value object; equality is parameter equality.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Coding {
    b: u8,
    h: u16,
    s: u8,
    d: u8,
    min: i32,
    max: i32,
    range: u64,
}

const fn code_range(b: u32, h: u32, n_max: u32) -> u64 {
    if n_max == 0 {
        return 0;
    }
    if b == 1 {
        return h as u64;
    }
    let l = (256 - h) as u64;
    let mut sum = 0u64;
    let mut h_i = 1u64;
    let mut n = 1;
    while n <= n_max {
        sum += h_i;
        h_i *= h as u64;
        n += 1;
    }
    sum *= l;
    if n_max == b {
        sum += h_i;
    }
    sum
}

const fn saturate32(v: u64) -> i32 {
    if v > i32::MAX as u64 {
        i32::MAX
    } else {
        v as i32
    }
}

const fn is_negative_code(ux: u64, s: u32) -> bool {
    let mask = (1u64 << s) - 1;
    (ux.wrapping_add(1) & mask) == 0
}

const fn decode_sign32(ux: u32, s: u32) -> i32 {
    if s == 0 {
        return ux as i32;
    }
    if is_negative_code(ux as u64, s) {
        !((ux >> s) as i32)
    } else {
        ux.wrapping_sub(ux >> s) as i32
    }
}

const fn encode_sign32(x: i32, s: u32) -> u32 {
    if s == 0 {
        return x as u32;
    }
    let mask = (1u64 << s) - 1;
    if x < 0 {
        let ux = (((!x) as u64) << s) | mask;
        if ux <= u32::MAX as u64 {
            return ux as u32;
        }
        // Only reachable for S=2: fold through the unsigned view instead.
        ((((x as u32) as u64) << s) / mask) as u32
    } else {
        (((x as u64) << s) / mask) as u32
    }
}

const fn code_max(b: u32, h: u32, s: u32) -> i32 {
    let range = code_range(b, h, b);
    if range == 0 {
        return -1;
    }
    if s == 0 || range >= 1u64 << 32 {
        return saturate32(range - 1);
    }
    let mut max_pos = range - 1;
    while is_negative_code(max_pos, s) {
        max_pos -= 1;
    }
    let smax = decode_sign32(max_pos as u32, s);
    if smax < 0 {
        i32::MAX
    } else {
        smax
    }
}

const fn code_min(b: u32, h: u32, s: u32) -> i32 {
    let range = code_range(b, h, b);
    if range >= 1u64 << 32 {
        return i32::MIN;
    }
    if s == 0 {
        return 0;
    }
    let mut max_neg = range as i64 - 1;
    while max_neg >= 0 && !is_negative_code(max_neg as u64, s) {
        max_neg -= 1;
    }
    if max_neg < 0 {
        return 0;
    }
    decode_sign32(max_neg as u32, s)
}

const fn params_valid(b: u32, h: u32, s: u32, d: u32) -> bool {
    b >= 1 && b as usize <= B_MAX && h >= 1 && h <= 256 && s <= 2 && d <= 1 && (b != 1 || h == 256)
}

impl Coding {
    /// Build a coding from literal parameters.
    ///
    /// # Panics
    ///
    /// Panics (at compile time in const context) if the parameters are not a
    /// valid BHSD coding. Use [`Coding::try_new`] for untrusted input.
    pub const fn of(b: u32, h: u32, s: u32, d: u32) -> Coding {
        assert!(params_valid(b, h, s, d), "invalid BHSD coding parameters");
        Coding {
            b: b as u8,
            h: h as u16,
            s: s as u8,
            d: d as u8,
            min: code_min(b, h, s),
            max: code_max(b, h, s),
            range: code_range(b, h, b),
        }
    }

    /// Build a coding from parameters read off the wire.
    pub fn try_new(b: u32, h: u32, s: u32, d: u32) -> Result<Coding> {
        if !params_valid(b, h, s, d) {
            return Err(PackError::InvalidCoding(format!(
                "B={} H={} S={} D={}",
                b, h, s, d
            )));
        }
        Ok(Coding::of(b, h, s, d))
    }

    /// Byte count parameter `B`.
    pub const fn b(&self) -> u32 {
        self.b as u32
    }
    /// Radix parameter `H`.
    pub const fn h(&self) -> u32 {
        self.h as u32
    }
    /// Count of terminating byte values, `256 - H`.
    pub const fn l(&self) -> u32 {
        256 - self.h as u32
    }
    /// Sign folding parameter `S`.
    pub const fn s(&self) -> u32 {
        self.s as u32
    }
    /// Delta depth `D`.
    pub const fn d(&self) -> u32 {
        self.d as u32
    }
    /// Smallest representable value.
    pub const fn min(&self) -> i32 {
        self.min
    }
    /// Largest representable value.
    pub const fn max(&self) -> i32 {
        self.max
    }
    /// Number of distinct unsigned codes (may exceed 2^32).
    pub const fn range(&self) -> u64 {
        self.range
    }

    /// True if this coding applies a delta transform.
    pub const fn is_delta(&self) -> bool {
        self.d != 0
    }

    /// True if every `i32` is representable.
    pub const fn is_full_range(&self) -> bool {
        self.min == i32::MIN && self.max == i32::MAX
    }

    /// True if delta arithmetic must be reduced modulo the coding's range.
    pub const fn is_subrange(&self) -> bool {
        self.max < i32::MAX && (self.max as i64 - self.min as i64 + 1) <= i32::MAX as i64
    }

    /// Same coding with a different `B`.
    pub fn set_b(&self, b: u32) -> Result<Coding> {
        Coding::try_new(b, self.h(), self.s(), self.d())
    }
    /// Same coding with a different `H`.
    pub fn set_h(&self, h: u32) -> Result<Coding> {
        Coding::try_new(self.b(), h, self.s(), self.d())
    }
    /// Same coding with a different `L` (`H = 256 - L`).
    pub fn set_l(&self, l: u32) -> Result<Coding> {
        if l > 255 {
            return Err(PackError::InvalidCoding(format!("L={}", l)));
        }
        self.set_h(256 - l)
    }
    /// Same coding with a different `S`.
    pub fn set_s(&self, s: u32) -> Result<Coding> {
        Coding::try_new(self.b(), self.h(), s, self.d())
    }
    /// Same coding with a different delta depth.
    pub const fn set_d(&self, d: u32) -> Coding {
        Coding::of(self.b(), self.h(), self.s(), if d == 0 { 0 } else { 1 })
    }
    /// The delta-transformed variant of this coding.
    pub const fn delta_coding(&self) -> Coding {
        self.set_d(1)
    }

    /// True if `x` fits without escaping.
    pub const fn can_represent_value(&self, x: i32) -> bool {
        x >= self.min && x <= self.max
    }

    /// True if every value in `values` fits, accounting for the delta transform.
    pub fn can_represent(&self, values: &[i32]) -> bool {
        if !self.is_delta() {
            return values.iter().all(|&x| self.can_represent_value(x));
        }
        let mut state = 0i32;
        for &x in values {
            if self.is_subrange() && !self.can_represent_value(x) {
                return false;
            }
            let delta = self.delta_between(state, x);
            if !self.can_represent_value(delta) {
                return false;
            }
            state = x;
        }
        true
    }

    fn reduce_to_range(&self, v: i64) -> i32 {
        let range = self.max as i64 - self.min as i64 + 1;
        let v = if v > self.max as i64 {
            v - range
        } else if v < self.min as i64 {
            v + range
        } else {
            v
        };
        v as i32
    }

    fn delta_between(&self, prev: i32, x: i32) -> i32 {
        if self.is_subrange() {
            self.reduce_to_range(x as i64 - prev as i64)
        } else {
            x.wrapping_sub(prev)
        }
    }

    /// Next running value after adding raw `delta` to `state`.
    pub fn apply_delta(&self, state: i32, delta: i32) -> i32 {
        if self.is_subrange() {
            self.reduce_to_range(state as i64 + delta as i64)
        } else {
            state.wrapping_add(delta)
        }
    }

    fn unsigned_len(&self, mut u: u64) -> usize {
        let l = self.l() as u64;
        let h = self.h() as u64;
        let b = self.b as usize;
        for i in 0..b {
            if i == b - 1 || u < l {
                return i + 1;
            }
            u = (u - l) / h;
        }
        b
    }

    fn check(&self, x: i32) -> Result<u64> {
        if !self.can_represent_value(x) {
            return Err(PackError::ValueOutOfRange {
                value: x,
                coding: self.to_string(),
            });
        }
        Ok(encode_sign32(x, self.s()) as u64)
    }

    /// Encoded length of a single raw value (no delta), or an error if it
    /// does not fit.
    pub fn length_of(&self, x: i32) -> Result<usize> {
        let u = self.check(x)?;
        Ok(self.unsigned_len(u))
    }

    /// Encoded length of a whole array, or `None` if some value does not fit.
    pub fn array_length(&self, values: &[i32]) -> Option<usize> {
        let mut total = 0usize;
        let mut state = 0i32;
        for &x in values {
            let raw = if self.is_delta() {
                if self.is_subrange() && !self.can_represent_value(x) {
                    return None;
                }
                let delta = self.delta_between(state, x);
                state = x;
                delta
            } else {
                x
            };
            if !self.can_represent_value(raw) {
                return None;
            }
            total += self.unsigned_len(encode_sign32(raw, self.s()) as u64);
        }
        Some(total)
    }

    /// Encode a single raw value (no delta).
    pub fn encode(&self, x: i32) -> Result<ValueBytes> {
        let mut u = self.check(x)?;
        let l = self.l() as u64;
        let h = self.h() as u64;
        let b = self.b as usize;
        let mut out = ValueBytes::new();
        for i in 0..b {
            if i == b - 1 || u < l {
                debug_assert!(u < 256);
                out.push(u as u8);
                break;
            }
            u -= l;
            out.push((l + u % h) as u8);
            u /= h;
        }
        Ok(out)
    }

    fn finish_decode(&self, ux: u64) -> Result<i32> {
        if ux > u32::MAX as u64 {
            return Err(PackError::ValueOutOfRange {
                value: ux as u32 as i32,
                coding: self.to_string(),
            });
        }
        Ok(decode_sign32(ux as u32, self.s()))
    }

    /// Decode a single raw value from the front of `bytes`, returning the
    /// value and the number of bytes consumed.
    pub fn decode(&self, bytes: &[u8]) -> Result<(i32, usize)> {
        let l = self.l() as u64;
        let h = self.h() as u64;
        let mut sum = 0u64;
        let mut h_i = 1u64;
        for i in 0..self.b as usize {
            let byte = *bytes.get(i).ok_or(PackError::UnexpectedEof)? as u64;
            sum += byte * h_i;
            h_i *= h;
            if byte < l {
                return Ok((self.finish_decode(sum)?, i + 1));
            }
        }
        Ok((self.finish_decode(sum)?, self.b as usize))
    }

    /// Write a single raw value (no delta).
    pub fn write_value<W: Write + ?Sized>(&self, out: &mut W, x: i32) -> Result<()> {
        out.write_all(&self.encode(x)?)?;
        Ok(())
    }

    /// Read a single raw value (no delta).
    pub fn read_value<R: Read + ?Sized>(&self, input: &mut R) -> Result<i32> {
        let l = self.l() as u64;
        let h = self.h() as u64;
        let mut sum = 0u64;
        let mut h_i = 1u64;
        let mut byte = [0u8; 1];
        for _ in 0..self.b {
            input.read_exact(&mut byte).map_err(PackError::from_read)?;
            let b = byte[0] as u64;
            sum += b * h_i;
            h_i *= h;
            if b < l {
                break;
            }
        }
        self.finish_decode(sum)
    }

    /// Write an array, applying the delta transform if this coding has one.
    pub fn write_array_to<W: Write + ?Sized>(&self, out: &mut W, values: &[i32]) -> Result<()> {
        if !self.is_delta() {
            for &x in values {
                self.write_value(out, x)?;
            }
            return Ok(());
        }
        let mut state = 0i32;
        for &x in values {
            if self.is_subrange() && !self.can_represent_value(x) {
                return Err(PackError::ValueOutOfRange {
                    value: x,
                    coding: self.to_string(),
                });
            }
            self.write_value(out, self.delta_between(state, x))?;
            state = x;
        }
        Ok(())
    }

    /// Fill `values` from `input`, undoing the delta transform.
    pub fn read_array_from<R: Read + ?Sized>(&self, input: &mut R, values: &mut [i32]) -> Result<()> {
        for slot in values.iter_mut() {
            *slot = self.read_value(input)?;
        }
        self.undo_delta(values);
        Ok(())
    }

    /// Convert raw decoded values into band values in place.
    ///
    /// The running state starts at zero for every array.
    pub fn undo_delta(&self, values: &mut [i32]) {
        if !self.is_delta() {
            return;
        }
        let mut state = 0i32;
        for slot in values.iter_mut() {
            state = self.apply_delta(state, *slot);
            *slot = state;
        }
    }
}

impl fmt::Display for Coding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{}", self.b, self.h)?;
        if self.s != 0 || self.d != 0 {
            write!(f, ",{}", self.s)?;
        }
        if self.d != 0 {
            write!(f, ",{}", self.d)?;
        }
        write!(f, ")")
    }
}

impl fmt::Debug for Coding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Coding{}", self)
    }
}
