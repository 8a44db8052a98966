//! Bandpack Codec - band trees and the band structure orchestrator
//!
//! This crate turns the integer codings of `bandpack-format` into whole
//! archives of bands:
//!
//! - An arena of value, byte and aggregate bands under a phase machine
//! - The static band tree of a class archive, in wire order
//! - Coding choice, escape markers and `band_headers` bookkeeping
//! - Constant-pool reference bands bound to caller-supplied indexes
//! - Attribute layouts and the bands they add
//! - Band dumps, band-sequence checks and JSON band reports

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod attributes;
pub mod bands;
pub mod bytecode;
pub mod code_header;
pub mod counter;
pub mod dump;
pub mod index;
pub mod layout;
pub mod phase;
pub mod structure;
pub mod tree;
pub mod verify;

use bandpack_format::constants::{DEFAULT_EFFORT, MAX_EFFORT, MIN_EFFORT};
use std::path::PathBuf;

// Re-export commonly used types
pub use bandpack_format::{
    Coding, CodingMethod, Limits, PackError, Result, BCI5, BRANCH5, BYTE1, CHAR3, DELTA5, MDELTA5, SIGNED5, UDELTA5,
    UNSIGNED5,
};

// Re-export our own types
pub use attributes::{AttrSlot, AttrTables};
pub use bands::StaticBands;
pub use bytecode::{BciMap, RawBci, SelfOp};
pub use code_header::{decode_short_code_header, short_code_header, CodeSizes, LONG_CODE_HEADER};
pub use dump::{BandReport, BandSummary};
pub use index::{CpTag, Index, IndexRef, IndexSource};
pub use layout::{AttrContext, Layout, LayoutElement};
pub use phase::Phase;
pub use structure::{AttrBandGroup, BandStructure, ClassVersion, STACK_MAP_CLASS_VERSION};
pub use tree::{BandId, BandTree, ByteBandId, CpRefBandId, IntBandId, Mode, MultiBandId};
pub use verify::{LenientVerifier, StrictVerifier, Verifier};

/// Options for packing and unpacking bands
#[derive(Debug, Clone)]
pub struct CodecOptions {
    /// Coding search effort, 1 to 9; 0 means the default
    pub effort: u8,
    /// Allow bands to use codings other than their regular one
    pub vary_codings: bool,
    /// Write per-band dump files into this directory
    pub dump_dir: Option<PathBuf>,
    /// Record the band sequence while writing and check it while reading
    pub debug_bands: bool,
    /// Seed for the chooser's randomized self-test mode
    pub stress_seed: Option<u64>,
    /// Security limits
    pub limits: Limits,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self {
            effort: DEFAULT_EFFORT,
            vary_codings: true,
            dump_dir: None,
            debug_bands: false,
            stress_seed: None,
            limits: Limits::default(),
        }
    }
}

impl CodecOptions {
    /// Effort actually used: zero maps to the default, anything else is
    /// clamped into the supported range.
    pub fn effective_effort(&self) -> u8 {
        match self.effort {
            0 => DEFAULT_EFFORT,
            e => e.clamp(MIN_EFFORT, MAX_EFFORT),
        }
    }
}
