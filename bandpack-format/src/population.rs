//! Population coding
//!
//! The band's most frequent values are listed once in a favored table; the
//! band then becomes a token stream (`1..=K` picks a favored value, `0` means
//! "next unfavored value") followed by the unfavored values themselves.
//!
//! Stream layout:
//!
//! 1. favored values via the favored coding, terminated by repeating the
//!    last favored value
//! 2. one token per band value via the token coding
//! 3. the unfavored values via the unfavored coding

use crate::canonical::{BYTE1, UNSIGNED5};
use crate::coding::Coding;
use crate::constants::{B_MAX, META_POP, POP_L_VALUES};
use crate::error::{PackError, Result};
use crate::limits::Limits;
use crate::method::{parse_nested, CodingMethod, MetaBytes, MetaReader};
use ahash::AHashMap;
use smallvec::smallvec;
use std::fmt;
use std::io::{Read, Write};

/// How the token stream is coded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenCoding {
    /// Derived from the favored count `K` and a predefined `L` value.
    Fitted {
        /// One of the non-explicit entries of the `L` table.
        l: i32,
    },
    /// Spelled out in the meta-coding.
    Explicit(CodingMethod),
}

/// Favored/unfavored partition of a band.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopulationCoding {
    favored: Vec<i32>,
    favored_coding: CodingMethod,
    token_coding: TokenCoding,
    unfavored_coding: CodingMethod,
    favored_limit: usize,
}

impl PopulationCoding {
    /// Build a population coding for writing.
    ///
    /// `favored` must be non-empty and free of duplicates.
    pub fn new(
        favored: Vec<i32>,
        favored_coding: CodingMethod,
        token_coding: TokenCoding,
        unfavored_coding: CodingMethod,
    ) -> Result<Self> {
        if favored.is_empty() {
            return Err(PackError::InvalidCoding(
                "population coding needs at least one favored value".to_string(),
            ));
        }
        let mut seen = ahash::AHashSet::with_capacity(favored.len());
        if !favored.iter().all(|v| seen.insert(*v)) {
            return Err(PackError::InvalidCoding(
                "duplicate favored value".to_string(),
            ));
        }
        if let TokenCoding::Fitted { l } = token_coding {
            if l_index(l).is_none() {
                return Err(PackError::InvalidCoding(format!("token L={}", l)));
            }
        }
        let favored_limit = favored.len();
        Ok(Self {
            favored,
            favored_coding,
            token_coding,
            unfavored_coding,
            favored_limit,
        })
    }

    /// Favored values, most favored first. Empty for a parsed coding until
    /// the stream has been read.
    pub fn favored(&self) -> &[i32] {
        &self.favored
    }

    /// Coding of the favored table.
    pub fn favored_coding(&self) -> &CodingMethod {
        &self.favored_coding
    }

    /// Coding of the token stream.
    pub fn token_coding(&self) -> &TokenCoding {
        &self.token_coding
    }

    /// Coding of the unfavored values.
    pub fn unfavored_coding(&self) -> &CodingMethod {
        &self.unfavored_coding
    }

    /// Smallest token coding with the given `L` able to carry tokens `0..=k`.
    pub fn fit_token_coding(k: usize, l: i32) -> Coding {
        if k < 256 {
            return BYTE1;
        }
        let h = (256 - l) as u32;
        (2..=B_MAX as u32)
            .map(|b| Coding::of(b, h, 0, 0))
            .find(|c| c.max() as i64 >= k as i64)
            .unwrap_or(UNSIGNED5)
    }

    fn resolved_token_coding(&self, k: usize) -> CodingMethod {
        match &self.token_coding {
            TokenCoding::Fitted { l } => Self::fit_token_coding(k, *l).into(),
            TokenCoding::Explicit(method) => method.clone(),
        }
    }

    fn favored_stream(&self) -> Vec<i32> {
        let mut stream = Vec::with_capacity(self.favored.len() + 1);
        stream.extend_from_slice(&self.favored);
        if let Some(&last) = self.favored.last() {
            stream.push(last);
        }
        stream
    }

    fn split(&self, values: &[i32]) -> (Vec<i32>, Vec<i32>) {
        let index: AHashMap<i32, i32> = self
            .favored
            .iter()
            .enumerate()
            .map(|(i, v)| (*v, i as i32 + 1))
            .collect();
        let mut tokens = Vec::with_capacity(values.len());
        let mut unfavored = Vec::new();
        for v in values {
            match index.get(v) {
                Some(token) => tokens.push(*token),
                None => {
                    tokens.push(0);
                    unfavored.push(*v);
                }
            }
        }
        (tokens, unfavored)
    }

    pub(crate) fn array_length(&self, values: &[i32]) -> Option<usize> {
        let (tokens, unfavored) = self.split(values);
        let token_coding = self.resolved_token_coding(self.favored.len());
        Some(
            self.favored_coding.array_length(&self.favored_stream())?
                + token_coding.array_length(&tokens)?
                + self.unfavored_coding.array_length(&unfavored)?,
        )
    }

    pub(crate) fn write_array_to<W: Write + ?Sized>(&self, out: &mut W, values: &[i32]) -> Result<()> {
        if self.favored.is_empty() {
            return Err(PackError::InvalidCoding(
                "population coding has no favored values".to_string(),
            ));
        }
        let (tokens, unfavored) = self.split(values);
        self.favored_coding
            .write_array_to(out, &self.favored_stream())?;
        self.resolved_token_coding(self.favored.len())
            .write_array_to(out, &tokens)?;
        self.unfavored_coding.write_array_to(out, &unfavored)
    }

    pub(crate) fn read_array_from<R: Read + ?Sized>(&self, input: &mut R, values: &mut [i32]) -> Result<()> {
        let favored = read_favored(&self.favored_coding, input, self.favored_limit)?;
        let k = favored.len();
        let mut tokens = vec![0i32; values.len()];
        self.resolved_token_coding(k)
            .read_array_from(input, &mut tokens)?;
        let unfavored_count = tokens.iter().filter(|t| **t == 0).count();
        let mut unfavored = vec![0i32; unfavored_count];
        self.unfavored_coding.read_array_from(input, &mut unfavored)?;
        let mut next_unfavored = unfavored.into_iter();
        for (slot, token) in values.iter_mut().zip(tokens) {
            *slot = if token == 0 {
                next_unfavored.next().ok_or(PackError::UnexpectedEof)?
            } else {
                let index = usize::try_from(token)
                    .ok()
                    .filter(|t| *t <= k)
                    .ok_or_else(|| {
                        PackError::InvalidCoding(format!("population token {} exceeds {}", token, k))
                    })?;
                favored[index - 1]
            };
        }
        Ok(())
    }

    pub(crate) fn meta_coding(&self, dflt: &Coding) -> MetaBytes {
        let f_def = self.favored_coding.is_coding(dflt);
        let u_def = self.unfavored_coding.is_coding(dflt);
        let t_def_l = match &self.token_coding {
            TokenCoding::Fitted { l } => l_index(*l).unwrap_or(0),
            TokenCoding::Explicit(_) => 0,
        };
        let op = META_POP as usize + f_def as usize + 2 * u_def as usize + 4 * t_def_l;
        let mut meta: MetaBytes = smallvec![op as u8];
        if !f_def {
            meta.extend_from_slice(&self.favored_coding.meta_coding(dflt));
        }
        if t_def_l == 0 {
            let token = self.resolved_token_coding(self.favored.len());
            meta.extend_from_slice(&token.meta_coding(dflt));
        }
        if !u_def {
            meta.extend_from_slice(&self.unfavored_coding.meta_coding(dflt));
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
        if op < META_POP || op >= META_POP + 4 * POP_L_VALUES.len() as u8 {
            return Ok(None);
        }
        let x = (op - META_POP) as usize;
        let f_def = x & 1 != 0;
        let u_def = (x >> 1) & 1 != 0;
        let t_def_l = x >> 2;
        let favored_coding = if f_def {
            CodingMethod::Coding(*dflt)
        } else {
            parse_nested(reader, dflt, limits, depth + 1)?
        };
        let token_coding = if t_def_l == 0 {
            TokenCoding::Explicit(parse_nested(reader, dflt, limits, depth + 1)?)
        } else {
            TokenCoding::Fitted {
                l: POP_L_VALUES[t_def_l],
            }
        };
        let unfavored_coding = if u_def {
            CodingMethod::Coding(*dflt)
        } else {
            parse_nested(reader, dflt, limits, depth + 1)?
        };
        Ok(Some(Self {
            favored: Vec::new(),
            favored_coding,
            token_coding,
            unfavored_coding,
            favored_limit: limits.max_favored_values,
        }))
    }
}

fn l_index(l: i32) -> Option<usize> {
    POP_L_VALUES
        .iter()
        .skip(1)
        .position(|v| *v == l)
        .map(|i| i + 1)
}

/// Read favored values until one repeats the value before it.
fn read_favored<R: Read + ?Sized>(
    method: &CodingMethod,
    input: &mut R,
    limit: usize,
) -> Result<Vec<i32>> {
    let mut favored: Vec<i32> = Vec::new();
    let mut state = 0i32;
    let mut segment = usize::MAX;
    loop {
        let (coding, start) = method.coding_at(favored.len()).ok_or_else(|| {
            PackError::InvalidCoding(format!("favored values cannot use {}", method))
        })?;
        if start != segment {
            state = 0;
            segment = start;
        }
        let raw = coding.read_value(input)?;
        let value = if coding.is_delta() {
            coding.apply_delta(state, raw)
        } else {
            raw
        };
        state = value;
        if favored.last() == Some(&value) {
            return Ok(favored);
        }
        if favored.len() == limit {
            return Err(PackError::LimitExceeded(format!(
                "more than {} favored values",
                limit
            )));
        }
        favored.push(value);
    }
}

impl fmt::Display for PopulationCoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pop(K={} F={} T=", self.favored.len(), self.favored_coding)?;
        match &self.token_coding {
            TokenCoding::Fitted { l } => write!(f, "fit(L={})", l)?,
            TokenCoding::Explicit(m) => write!(f, "{}", m)?,
        }
        write!(f, " U={})", self.unfavored_coding)
    }
}
