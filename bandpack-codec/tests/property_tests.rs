//! Property-based tests for band round trips

use bandpack_codec::{CodecOptions, PackError, BYTE1, DELTA5, SIGNED5, UNSIGNED5};
use bandpack_test_utils::{band_values, reader, round_trip_int_bands, BandCase};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn bands_round_trip(
        a in band_values(200),
        b in band_values(20),
        c in prop::collection::vec(any::<i32>(), 0..150),
        effort in 1u8..=9,
        vary in any::<bool>(),
    ) {
        let cases = [
            BandCase::new("p_unsigned", UNSIGNED5, a),
            BandCase::new("p_delta", DELTA5, b),
            BandCase::new("p_signed", SIGNED5, c),
        ];
        let options = CodecOptions {
            effort,
            vary_codings: vary,
            ..CodecOptions::default()
        };
        let rt = round_trip_int_bands(&cases, options).unwrap();
        for (case, values) in cases.iter().zip(&rt.values) {
            prop_assert_eq!(&case.values, values);
        }
        if !vary {
            prop_assert!(rt.meta.iter().all(|m| m.is_empty()));
            prop_assert_eq!(rt.header_len, 0);
        }
    }

    #[test]
    fn byte_bands_never_escape(values in prop::collection::vec(0..256i32, 1..300)) {
        let cases = [BandCase::new("p_byte", BYTE1, values.clone())];
        let rt = round_trip_int_bands(&cases, CodecOptions::default()).unwrap();
        prop_assert_eq!(rt.bytes.len(), values.len());
        prop_assert!(rt.meta[0].is_empty());
        prop_assert_eq!(&rt.values[0], &values);
    }

    #[test]
    fn garbage_input_never_panics(
        bytes in prop::collection::vec(any::<u8>(), 0..64),
        len in 0usize..40,
    ) {
        let mut r = reader(CodecOptions::default()).unwrap();
        let root = r.bands().all_bands;
        let band = r.add_int_band(root, "g", UNSIGNED5);
        r.expect_length(band, len).unwrap();
        match r.read_all_bands_from(&bytes[..]) {
            Ok(()) => prop_assert_eq!(r.len(band), len),
            Err(e) => prop_assert!(
                !matches!(e, PackError::Invariant(_) | PackError::Io(_)),
                "unexpected error {}",
                e
            ),
        }
    }
}
