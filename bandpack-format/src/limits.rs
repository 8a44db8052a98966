//! Security limits and configuration

/// Limits guarding the read side against hostile size fields
#[derive(Debug, Clone)]
pub struct Limits {
    /// Maximum values expected in a single band (default: 64 Mi)
    pub max_band_values: usize,
    /// Maximum bytes in the shared band-headers band (default: 1 MiB)
    pub max_band_header_bytes: usize,
    /// Maximum nesting of meta-codings inside one band header (default: 8)
    pub max_meta_depth: usize,
    /// Maximum favored values in a population coding (default: 65,536)
    pub max_favored_values: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_band_values: 64 * 1024 * 1024,
            max_band_header_bytes: 1024 * 1024,
            max_meta_depth: 8,
            max_favored_values: 65_536,
        }
    }
}
