#![no_main]

use bandpack_format::canonical::{all_canonical, CHAR3};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((&selector, bytes)) = data.split_first() else {
        return;
    };
    let coding = all_canonical()
        .get(selector as usize)
        .copied()
        .unwrap_or(CHAR3);
    if let Ok((value, used)) = coding.decode(bytes) {
        assert!(used <= bytes.len());
        let encoded = coding.encode(value).expect("decoded value must re-encode");
        let (again, _) = coding.decode(&encoded).expect("re-encoded value must decode");
        assert_eq!(again, value);
    }
    let mut values = vec![0i32; bytes.len().min(64)];
    let _ = coding.read_array_from(&mut &bytes[..], &mut values);
});
