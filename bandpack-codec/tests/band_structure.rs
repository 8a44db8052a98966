//! End-to-end tests for the band structure: writer to bytes to reader

use bandpack_codec::{
    BandStructure, CodecOptions, CpTag, IntBandId, LenientVerifier, Mode, PackError, Phase, DELTA5, UNSIGNED5,
};
use bandpack_test_utils::{
    generate, init_test_logging, reader, round_trip_int_bands, string_index, writer, BandCase, MockIndexSource,
    ValuePattern,
};

fn three_bands(s: &mut BandStructure<String>) -> [IntBandId; 3] {
    let root = s.bands().all_bands;
    let group = s.add_multi_band(root, "(test_group)", UNSIGNED5);
    [
        s.add_int_band(group, "test_small", UNSIGNED5),
        s.add_int_band(group, "test_large", UNSIGNED5),
        s.add_int_band(group, "test_empty", UNSIGNED5),
    ]
}

#[test]
fn writes_and_reads_a_group_of_bands() {
    init_test_logging();
    let mut w = writer(CodecOptions::default()).unwrap();
    let [small, large, empty] = three_bands(&mut w);
    for v in [1, 2, 3] {
        w.put_int(small, v).unwrap();
    }
    for _ in 0..3 {
        w.put_int(large, 1000).unwrap();
    }
    w.choose_band_codings().unwrap();
    let mut bytes = Vec::new();
    let written = w.write_all_bands_to(&mut bytes).unwrap();
    assert_eq!(written, 9);
    assert_eq!(bytes.len(), 9);
    assert_eq!(&bytes[..3], &[1, 2, 3]);
    assert_eq!(w.phase(w.bands().all_bands), Phase::Done);
    assert_eq!(w.phase(empty), Phase::Done);

    let mut r = reader(CodecOptions::default()).unwrap();
    let [small, large, empty] = three_bands(&mut r);
    r.expect_length(small, 3).unwrap();
    r.expect_length(large, 3).unwrap();
    r.read_all_bands_from(&bytes[..]).unwrap();
    assert_eq!(r.get_int_total(small).unwrap(), 6);
    for expected in [1, 2, 3] {
        assert_eq!(r.get_int(small).unwrap(), expected);
    }
    r.done_disbursing(small).unwrap();
    assert_eq!(r.get_int_count(large, 1000).unwrap(), 3);
    assert_eq!(r.len(empty), 0);
    assert_eq!(r.phase(empty), Phase::Disburse);
}

#[test]
fn int_total_wraps_and_rewinds() {
    let cases = [BandCase::new("t", UNSIGNED5, vec![5, -3, 8])];
    let rt = round_trip_int_bands(&cases, CodecOptions::default()).unwrap();
    assert_eq!(rt.values[0], vec![5, -3, 8]);

    let mut r = reader(CodecOptions::default()).unwrap();
    let root = r.bands().all_bands;
    let band = r.add_int_band(root, "t", UNSIGNED5);
    r.expect_length(band, 3).unwrap();
    r.read_all_bands_from(&rt.bytes[..]).unwrap();
    assert_eq!(r.get_int_total(band).unwrap(), 10);
    assert_eq!(r.get_int(band).unwrap(), 5);
}

#[test]
fn over_read_is_always_an_error() {
    let rt = round_trip_int_bands(&[BandCase::new("t", UNSIGNED5, vec![7])], CodecOptions::default()).unwrap();
    let mut r = BandStructure::<String>::with_verifier(Mode::Reader, CodecOptions::default(), Box::new(LenientVerifier))
        .unwrap();
    let root = r.bands().all_bands;
    let band = r.add_int_band(root, "t", UNSIGNED5);
    r.expect_length(band, 1).unwrap();
    r.read_all_bands_from(&rt.bytes[..]).unwrap();
    assert_eq!(r.get_int(band).unwrap(), 7);
    assert!(r.get_int(band).is_err());
}

#[test]
fn under_read_fails_done_disbursing() {
    let rt = round_trip_int_bands(&[BandCase::new("t", UNSIGNED5, vec![7, 8])], CodecOptions::default()).unwrap();
    let mut r = reader(CodecOptions::default()).unwrap();
    let root = r.bands().all_bands;
    let band = r.add_int_band(root, "t", UNSIGNED5);
    r.expect_length(band, 2).unwrap();
    r.read_all_bands_from(&rt.bytes[..]).unwrap();
    r.get_int(band).unwrap();
    assert!(matches!(r.done_disbursing(band), Err(PackError::Invariant(_))));
}

#[test]
fn unbalanced_expectations_hit_eof() {
    let rt = round_trip_int_bands(&[BandCase::new("t", UNSIGNED5, vec![7, 8])], CodecOptions::default()).unwrap();
    let mut r = reader(CodecOptions::default()).unwrap();
    let root = r.bands().all_bands;
    let band = r.add_int_band(root, "t", UNSIGNED5);
    r.expect_length(band, 3).unwrap();
    assert!(matches!(r.read_all_bands_from(&rt.bytes[..]), Err(PackError::UnexpectedEof)));
}

#[test]
fn generated_bands_round_trip_at_every_effort() {
    for effort in [1, 5, 9] {
        let cases: Vec<BandCase> = ValuePattern::ALL
            .iter()
            .enumerate()
            .map(|(i, &p)| {
                let regular = if p == ValuePattern::Sorted { DELTA5 } else { UNSIGNED5 };
                BandCase::new(&format!("gen_{}", i), regular, generate(p, 300, i as u64))
            })
            .collect();
        let options = CodecOptions {
            effort,
            ..CodecOptions::default()
        };
        let rt = round_trip_int_bands(&cases, options).unwrap();
        for (case, values) in cases.iter().zip(&rt.values) {
            assert_eq!(&case.values, values, "{} at effort {}", case.name, effort);
        }
    }
}

#[test]
fn stress_mode_still_round_trips() {
    let cases = [BandCase::new("s", UNSIGNED5, generate(ValuePattern::Skewed, 500, 3))];
    let options = CodecOptions {
        stress_seed: Some(42),
        ..CodecOptions::default()
    };
    let rt = round_trip_int_bands(&cases, options).unwrap();
    assert_eq!(rt.values[0], cases[0].values);
}

#[test]
fn references_round_trip_through_indexes() {
    let utf8 = string_index(&["<init>", "main", "value"]);
    let classes = string_index(&["java/lang/Object", "java/lang/String"]);
    let source = || {
        MockIndexSource::new()
            .with(CpTag::Utf8, utf8.clone())
            .with(CpTag::Class, classes.clone())
            .with_fallback(string_index(&[]))
            .boxed()
    };

    let mut w = writer(CodecOptions::default()).unwrap();
    w.resolve_band_indexes(source()).unwrap();
    let this_class = w.bands().class_this;
    let src = w.bands().class_source_file_run;
    for name in ["java/lang/String", "java/lang/Object"] {
        w.put_ref(this_class, Some(&name.to_string())).unwrap();
    }
    w.put_ref(src, None).unwrap();
    w.put_ref(src, Some(&"main".to_string())).unwrap();
    w.choose_band_codings().unwrap();
    let mut bytes = Vec::new();
    w.write_all_bands_to(&mut bytes).unwrap();

    let mut r = reader(CodecOptions::default()).unwrap();
    r.resolve_band_indexes(source()).unwrap();
    r.expect_length(this_class, 2).unwrap();
    r.expect_length(src, 2).unwrap();
    r.read_all_bands_from(&bytes[..]).unwrap();
    assert_eq!(r.get_ref(this_class).unwrap().as_deref(), Some("java/lang/String"));
    assert_eq!(r.get_ref(this_class).unwrap().as_deref(), Some("java/lang/Object"));
    assert_eq!(r.get_ref(src).unwrap(), None);
    assert_eq!(r.get_ref(src).unwrap().as_deref(), Some("main"));
}

#[test]
fn report_serializes_to_json() {
    let mut w = writer(CodecOptions::default()).unwrap();
    let [small, _, _] = three_bands(&mut w);
    w.put_int(small, 4).unwrap();
    w.choose_band_codings().unwrap();
    w.write_all_bands_to(std::io::sink()).unwrap();
    let json: serde_json::Value = serde_json::from_str(&w.report().to_json().unwrap()).unwrap();
    let bands = json["bands"].as_array().unwrap();
    let small = bands.iter().find(|b| b["name"] == "test_small").unwrap();
    assert_eq!(small["len"], 1);
    assert_eq!(small["phase"], "Done");
    assert_eq!(small["output_size"], 1);
}
