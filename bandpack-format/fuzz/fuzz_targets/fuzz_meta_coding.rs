#![no_main]

use bandpack_format::{parse_meta_coding, Limits, MetaReader, UNSIGNED5};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let limits = Limits::default();
    let mut reader = MetaReader::new(data);
    if let Ok(method) = parse_meta_coding(&mut reader, &UNSIGNED5, &limits) {
        assert!(reader.position() <= data.len());
        // Whatever parsed must be able to describe itself again.
        let _ = method.meta_coding(&UNSIGNED5);
        let mut values = [0i32; 32];
        let rest = &data[reader.position()..];
        let _ = method.read_array_from(&mut &rest[..], &mut values);
    }
});
