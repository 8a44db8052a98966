//! Bandpack Format - integer coding primitives for band-structured archives
//!
//! This crate holds everything about how a single band's integers become
//! bytes, with no band or archive state:
//!
//! - BHSD codings and the canonical coding table
//! - Escape values for signalling a non-default coding in-band
//! - Population and adaptive coding methods
//! - The meta-coding grammar
//! - The effort-driven coding chooser
//! - Error types and security limits

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod adaptive;
pub mod canonical;
pub mod chooser;
pub mod coding;
pub mod constants;
pub mod error;
pub mod escape;
pub mod limits;
pub mod method;
pub mod population;

// Re-export commonly used types
pub use adaptive::AdaptiveCoding;
pub use canonical::{BCI5, BRANCH5, BYTE1, CHAR3, DELTA5, MDELTA5, SIGNED5, UDELTA5, UNSIGNED5};
pub use chooser::{Choice, CodingChooser};
pub use coding::Coding;
pub use error::{PackError, Result};
pub use limits::Limits;
pub use method::{parse_meta_coding, CodingMethod, MetaBytes, MetaReader};
pub use population::{PopulationCoding, TokenCoding};
