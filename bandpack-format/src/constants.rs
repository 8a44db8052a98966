//! Constants for the band coding format

/// Meta-coding byte meaning "use the band's regular coding".
pub const META_DEFAULT: u8 = 0;
/// First canonical coding index.
pub const META_CANON_MIN: u8 = 1;
/// Last canonical coding index.
pub const META_CANON_MAX: u8 = 115;
/// Arbitrary BHSD coding, followed by two parameter bytes.
pub const META_ARB: u8 = 116;
/// First adaptive (run) coding op.
pub const META_RUN: u8 = 117;
/// First population coding op; also the end of the run ops.
pub const META_POP: u8 = 141;
/// End of the population ops; every byte from here on is invalid.
pub const META_LIMIT: u8 = 189;

/// Longest byte sequence a single BHSD value can occupy.
pub const B_MAX: usize = 5;

/// Lowest coding effort: never search.
pub const MIN_EFFORT: u8 = 1;
/// Effort used when none is configured.
pub const DEFAULT_EFFORT: u8 = 5;
/// Highest coding effort: exhaustive search, including short bands.
pub const MAX_EFFORT: u8 = 9;

/// Bands shorter than this skip the coding search below maximum effort.
pub const SHORT_BAND_HEURISTIC: usize = 100;

/// Run length used by adaptive codings when no `KB` byte is present.
pub const ADAPTIVE_KB_DEFAULT: u32 = 3;

/// Token-coding `L` values selectable by a population op (index 0 = explicit).
pub const POP_L_VALUES: [i32; 12] = [-1, 4, 8, 16, 32, 64, 128, 192, 224, 240, 248, 252];
