#![no_main]

use claimcheck_core::fixture::ResourceFixture;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(document) = std::str::from_utf8(data) {
        // 성공했다면 메인 큐 ARN은 항상 존재해야 함
        if let Ok(fixture) = ResourceFixture::parse(document, "claimcheck") {
            assert!(!fixture.queue_arn().is_empty());
            assert!(!fixture.queue.url.is_empty());
        }
    }
});
