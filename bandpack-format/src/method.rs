//! Coding methods and the meta-coding grammar
//!
//! A [`CodingMethod`] is whatever actually carries a band's values: a plain
//! [`Coding`], a [`PopulationCoding`] or an [`AdaptiveCoding`]. Each one can
//! describe itself as a meta-coding byte sequence relative to the band's
//! regular coding, and [`parse_meta_coding`] turns those bytes back into a
//! method.

use crate::adaptive::AdaptiveCoding;
use crate::canonical::{canonical_coding, canonical_index};
use crate::coding::Coding;
use crate::constants::{META_ARB, META_DEFAULT};
use crate::error::{PackError, Result};
use crate::limits::Limits;
use crate::population::PopulationCoding;
use smallvec::{smallvec, SmallVec};
use std::fmt;
use std::io::{Read, Write};

/// Meta-coding bytes; almost always a handful.
pub type MetaBytes = SmallVec<[u8; 8]>;

/// Anything able to encode and decode a band's value array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodingMethod {
    /// A single BHSD coding.
    Coding(Coding),
    /// Favored-value table plus token and unfavored codings.
    Population(Box<PopulationCoding>),
    /// Head coding for the first K values, tail coding for the rest.
    Adaptive(Box<AdaptiveCoding>),
}

impl From<Coding> for CodingMethod {
    fn from(coding: Coding) -> Self {
        CodingMethod::Coding(coding)
    }
}

impl From<PopulationCoding> for CodingMethod {
    fn from(pop: PopulationCoding) -> Self {
        CodingMethod::Population(Box::new(pop))
    }
}

impl From<AdaptiveCoding> for CodingMethod {
    fn from(run: AdaptiveCoding) -> Self {
        CodingMethod::Adaptive(Box::new(run))
    }
}

impl CodingMethod {
    /// The plain coding, if this method is one.
    pub fn as_coding(&self) -> Option<&Coding> {
        match self {
            CodingMethod::Coding(c) => Some(c),
            _ => None,
        }
    }

    /// True if this method is exactly the plain coding `dflt`.
    pub fn is_coding(&self, dflt: &Coding) -> bool {
        self.as_coding() == Some(dflt)
    }

    /// Encode `values` to `out`.
    pub fn write_array_to<W: Write + ?Sized>(&self, out: &mut W, values: &[i32]) -> Result<()> {
        match self {
            CodingMethod::Coding(c) => c.write_array_to(out, values),
            CodingMethod::Population(p) => p.write_array_to(out, values),
            CodingMethod::Adaptive(a) => a.write_array_to(out, values),
        }
    }

    /// Decode exactly `values.len()` values from `input`.
    pub fn read_array_from<R: Read + ?Sized>(&self, input: &mut R, values: &mut [i32]) -> Result<()> {
        match self {
            CodingMethod::Coding(c) => c.read_array_from(input, values),
            CodingMethod::Population(p) => p.read_array_from(input, values),
            CodingMethod::Adaptive(a) => a.read_array_from(input, values),
        }
    }

    /// Encoded size of `values`, or `None` if some value cannot be carried.
    pub fn array_length(&self, values: &[i32]) -> Option<usize> {
        match self {
            CodingMethod::Coding(c) => c.array_length(values),
            CodingMethod::Population(p) => p.array_length(values),
            CodingMethod::Adaptive(a) => a.array_length(values),
        }
    }

    /// True if every value in `values` can be carried.
    pub fn can_represent(&self, values: &[i32]) -> bool {
        self.array_length(values).is_some()
    }

    /// Self-describing meta-coding relative to the regular coding `dflt`.
    pub fn meta_coding(&self, dflt: &Coding) -> MetaBytes {
        match self {
            CodingMethod::Coding(c) => coding_meta(c, dflt),
            CodingMethod::Population(p) => p.meta_coding(dflt),
            CodingMethod::Adaptive(a) => a.meta_coding(dflt),
        }
    }

    /// Plain coding used for element `index` of a stream, plus the index at
    /// which that coding's delta state starts.
    ///
    /// Only plain codings and adaptive chains over plain codings can be read
    /// one value at a time.
    pub(crate) fn coding_at(&self, index: usize) -> Option<(Coding, usize)> {
        match self {
            CodingMethod::Coding(c) => Some((*c, 0)),
            CodingMethod::Population(_) => None,
            CodingMethod::Adaptive(a) => a.coding_at(index),
        }
    }
}

impl fmt::Display for CodingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodingMethod::Coding(c) => write!(f, "{}", c),
            CodingMethod::Population(p) => write!(f, "{}", p),
            CodingMethod::Adaptive(a) => write!(f, "{}", a),
        }
    }
}

/// Meta-coding of a single coding relative to `dflt`.
pub fn coding_meta(coding: &Coding, dflt: &Coding) -> MetaBytes {
    if coding == dflt {
        return smallvec![META_DEFAULT];
    }
    if let Some(index) = canonical_index(coding) {
        return smallvec![index];
    }
    let bsd = coding.d() + 2 * coding.s() + 8 * (coding.b() - 1);
    smallvec![META_ARB, bsd as u8, (coding.h() - 1) as u8]
}

/// Source of meta-coding bytes: an optional lead byte (the escape selector
/// taken from a band's value stream) followed by the shared band headers.
#[derive(Debug)]
pub struct MetaReader<'a> {
    lead: Option<u8>,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> MetaReader<'a> {
    /// Read meta-coding bytes straight from `bytes`.
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            lead: None,
            bytes,
            pos: 0,
        }
    }

    /// Read `lead` first, then continue in `bytes`.
    pub fn with_lead(lead: u8, bytes: &'a [u8]) -> Self {
        Self {
            lead: Some(lead),
            bytes,
            pos: 0,
        }
    }

    /// Bytes consumed from the header slice (the lead byte is not counted).
    pub fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn next_byte(&mut self) -> Result<u8> {
        if let Some(lead) = self.lead.take() {
            return Ok(lead);
        }
        let byte = *self
            .bytes
            .get(self.pos)
            .ok_or(PackError::TruncatedMetaCoding)?;
        self.pos += 1;
        Ok(byte)
    }
}

/// Parse one meta-coding, resolving "default" to `dflt`.
///
/// The lead byte is offered to each coding family in a fixed order: default,
/// plain coding, population, adaptive. An unrecognized lead byte is an error.
pub fn parse_meta_coding(
    reader: &mut MetaReader<'_>,
    dflt: &Coding,
    limits: &Limits,
) -> Result<CodingMethod> {
    parse_nested(reader, dflt, limits, 0)
}

pub(crate) fn parse_nested(
    reader: &mut MetaReader<'_>,
    dflt: &Coding,
    limits: &Limits,
    depth: usize,
) -> Result<CodingMethod> {
    if depth > limits.max_meta_depth {
        return Err(PackError::LimitExceeded(format!(
            "meta-coding nested deeper than {}",
            limits.max_meta_depth
        )));
    }
    let op = reader.next_byte()?;
    if op == META_DEFAULT {
        return Ok(CodingMethod::Coding(*dflt));
    }
    if let Some(coding) = parse_coding_meta(op, reader)? {
        return Ok(CodingMethod::Coding(coding));
    }
    if let Some(pop) = PopulationCoding::parse_meta(op, reader, dflt, limits, depth)? {
        return Ok(pop.into());
    }
    if let Some(run) = AdaptiveCoding::parse_meta(op, reader, dflt, limits, depth)? {
        return Ok(run.into());
    }
    Err(PackError::BadMetaCoding(op))
}

fn parse_coding_meta(op: u8, reader: &mut MetaReader<'_>) -> Result<Option<Coding>> {
    if let Some(coding) = canonical_coding(op) {
        return Ok(Some(coding));
    }
    if op != META_ARB {
        return Ok(None);
    }
    let bsd = reader.next_byte()? as u32;
    let h = reader.next_byte()? as u32 + 1;
    let d = bsd & 1;
    let s = (bsd >> 1) & 3;
    let b = (bsd >> 3) + 1;
    Coding::try_new(b, h, s, d).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::{BYTE1, CHAR3, DELTA5, SIGNED5, UNSIGNED5};

    fn parse(bytes: &[u8], dflt: &Coding) -> Result<CodingMethod> {
        parse_meta_coding(&mut MetaReader::new(bytes), dflt, &Limits::default())
    }

    #[test]
    fn test_default_and_canonical() {
        assert_eq!(parse(&[0], &SIGNED5).unwrap(), CodingMethod::Coding(SIGNED5));
        assert_eq!(parse(&[26], &SIGNED5).unwrap(), CodingMethod::Coding(UNSIGNED5));
        assert_eq!(coding_meta(&UNSIGNED5, &UNSIGNED5).as_slice(), &[0]);
        assert_eq!(coding_meta(&UNSIGNED5, &SIGNED5).as_slice(), &[26]);
    }

    #[test]
    fn test_arbitrary_coding_meta() {
        let meta = coding_meta(&CHAR3, &UNSIGNED5);
        assert_eq!(meta.as_slice(), &[116, 16, 127]);
        assert_eq!(parse(&meta, &UNSIGNED5).unwrap(), CodingMethod::Coding(CHAR3));
    }

    #[test]
    fn test_bad_op() {
        assert!(matches!(parse(&[200], &UNSIGNED5), Err(PackError::BadMetaCoding(200))));
        assert!(matches!(parse(&[255], &UNSIGNED5), Err(PackError::BadMetaCoding(255))));
    }

    #[test]
    fn test_truncated() {
        assert!(matches!(parse(&[116, 16], &UNSIGNED5), Err(PackError::TruncatedMetaCoding)));
        assert!(matches!(parse(&[], &UNSIGNED5), Err(PackError::TruncatedMetaCoding)));
    }

    #[test]
    fn test_invalid_arbitrary_coding() {
        // B=1 with H=128 is not a coding.
        assert!(matches!(parse(&[116, 0, 127], &UNSIGNED5), Err(PackError::InvalidCoding(_))));
    }

    #[test]
    fn test_lead_byte_reader() {
        let headers = [0u8, 26, 99];
        let mut reader = MetaReader::with_lead(117 + 8, &headers[1..]);
        let method = parse_meta_coding(&mut reader, &DELTA5, &Limits::default()).unwrap();
        assert_eq!(reader.position(), 1);
        match method {
            CodingMethod::Adaptive(run) => {
                assert_eq!(run.head_len(), 4);
                assert_eq!(run.head(), &CodingMethod::Coding(DELTA5));
                assert_eq!(run.tail(), &CodingMethod::Coding(UNSIGNED5));
            }
            other => panic!("unexpected {}", other),
        }
    }

    #[test]
    fn test_byte1_roundtrip_through_method() {
        let method = CodingMethod::from(BYTE1);
        let mut out = Vec::new();
        method.write_array_to(&mut out, &[1, 2, 255]).unwrap();
        assert_eq!(out, vec![1, 2, 255]);
        assert_eq!(method.array_length(&[1, 2, 255]), Some(3));
        assert_eq!(method.array_length(&[256]), None);
    }
}
