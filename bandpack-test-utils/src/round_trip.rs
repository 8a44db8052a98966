//! Writer-to-reader round trips

use bandpack_codec::{BandStructure, CodecOptions, Coding, IntBandId, Mode, Result, StrictVerifier};

/// One dynamic band to push through a round trip.
#[derive(Debug, Clone)]
pub struct BandCase {
    /// Band name.
    pub name: String,
    /// Regular coding.
    pub regular: Coding,
    /// Values to write.
    pub values: Vec<i32>,
}

impl BandCase {
    /// New case.
    pub fn new(name: &str, regular: Coding, values: Vec<i32>) -> Self {
        Self {
            name: name.to_string(),
            regular,
            values,
        }
    }
}

/// What a round trip produced.
#[derive(Debug, Clone)]
pub struct RoundTrip {
    /// Every byte the writer emitted.
    pub bytes: Vec<u8>,
    /// Length of the writer's `band_headers`.
    pub header_len: usize,
    /// Meta-coding bytes the writer chose, per case.
    pub meta: Vec<Vec<u8>>,
    /// Values the reader decoded, per case.
    pub values: Vec<Vec<i32>>,
}

/// Writer with a strict verifier.
pub fn writer(options: CodecOptions) -> Result<BandStructure<String>> {
    BandStructure::with_verifier(Mode::Writer, options, Box::new(StrictVerifier))
}

/// Reader with a strict verifier.
pub fn reader(options: CodecOptions) -> Result<BandStructure<String>> {
    BandStructure::with_verifier(Mode::Reader, options, Box::new(StrictVerifier))
}

fn add_cases(s: &mut BandStructure<String>, cases: &[BandCase]) -> Vec<IntBandId> {
    let root = s.bands().all_bands;
    cases
        .iter()
        .map(|c| s.add_int_band(root, &c.name, c.regular))
        .collect()
}

/// Append `cases` after the static bands, write them, and read them back
/// with a reader given the same declarations and lengths.
pub fn round_trip_int_bands(cases: &[BandCase], options: CodecOptions) -> Result<RoundTrip> {
    let mut w = writer(options.clone())?;
    let ids = add_cases(&mut w, cases);
    for (id, case) in ids.iter().zip(cases) {
        for &v in &case.values {
            w.put_int(*id, v)?;
        }
    }
    w.choose_band_codings()?;
    let mut bytes = Vec::new();
    w.write_all_bands_to(&mut bytes)?;
    let header_len = w.len(w.bands().band_headers);
    let meta = ids.iter().map(|&id| w.band_meta(id).to_vec()).collect();

    let mut r = reader(options)?;
    r.expect_length(r.bands().band_headers, header_len)?;
    let rids = add_cases(&mut r, cases);
    for (id, case) in rids.iter().zip(cases) {
        r.expect_length(*id, case.values.len())?;
    }
    r.read_all_bands_from(&bytes[..])?;
    let values = rids.iter().map(|&id| r.values(id).to_vec()).collect();
    Ok(RoundTrip {
        bytes,
        header_len,
        meta,
        values,
    })
}
