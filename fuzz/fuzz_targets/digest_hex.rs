#![no_main]

use claimcheck_core::payload::ContentDigest;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(digest) = text.parse::<ContentDigest>() {
        // 파싱된 다이제스트는 소문자 hex로 되돌아가야 함
        let hex = digest.to_hex();
        assert_eq!(hex.len(), 32);
        assert_eq!(hex.parse::<ContentDigest>().ok(), Some(digest));
    }
});
