//! 메트릭 상수 및 설명 등록
//!
//! 하네스가 기록하는 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `claimcheck_`
//! - 접미어: `_total` (counter), `_seconds` (histogram), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(claimcheck_core::metrics::RECEIVE_ATTEMPTS_TOTAL, "queue" => "main").increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 단계 레이블 키 (pipeline, poison, readiness, hygiene, teardown)
pub const LABEL_PHASE: &str = "phase";

/// 결과 레이블 키 (passed, failed, error, skipped)
pub const LABEL_RESULT: &str = "result";

/// 큐 레이블 키 (main, dead_letter)
pub const LABEL_QUEUE: &str = "queue";

/// 큐 레이블 값: 메인 큐
pub const QUEUE_MAIN: &str = "main";

/// 큐 레이블 값: DLQ
pub const QUEUE_DEAD_LETTER: &str = "dead_letter";

// ─── 단계 메트릭 ───────────────────────────────────────────────────

/// 단계 실행 시간 (histogram, 초, label: phase)
pub const PHASE_DURATION_SECONDS: &str = "claimcheck_phase_duration_seconds";

/// 단계 결과 수 (counter, label: phase, result)
pub const PHASE_RESULTS_TOTAL: &str = "claimcheck_phase_results_total";

// ─── 큐/토픽 메트릭 ────────────────────────────────────────────────

/// receive 호출 수 (counter, label: queue)
pub const RECEIVE_ATTEMPTS_TOTAL: &str = "claimcheck_receive_attempts_total";

/// 수신한 메시지 수 (counter, label: queue)
pub const MESSAGES_RECEIVED_TOTAL: &str = "claimcheck_messages_received_total";

/// purge 호출 수 (counter, label: queue, result)
pub const PURGES_TOTAL: &str = "claimcheck_purges_total";

/// 구독 준비 확인 횟수 (counter)
pub const READINESS_PROBES_TOTAL: &str = "claimcheck_readiness_probes_total";

// ─── 페이로드 메트릭 ───────────────────────────────────────────────

/// 마지막으로 생성한 페이로드 크기 (gauge, 바이트)
pub const PAYLOAD_BYTES: &str = "claimcheck_payload_bytes";

/// 빌드 정보 (gauge, 항상 1)
pub const BUILD_INFO: &str = "claimcheck_build_info";

// ─── 히스토그램 버킷 ───────────────────────────────────────────────

/// 단계 실행 시간 버킷 (초)
///
/// long-poll 한 번이 최대 20초, 준비 확인이 최대 수 분이므로 넓게 잡습니다.
pub const PHASE_DURATION_BUCKETS: [f64; 10] =
    [0.5, 1.0, 5.0, 10.0, 20.0, 30.0, 60.0, 120.0, 300.0, 900.0];

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명을 등록합니다.
///
/// 레코더 설치 직후 한 번 호출합니다. 레코더가 없으면 아무 일도 하지 않습니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    describe_histogram!(
        PHASE_DURATION_SECONDS,
        metrics::Unit::Seconds,
        "Wall-clock duration of each harness phase"
    );
    describe_counter!(
        PHASE_RESULTS_TOTAL,
        "Number of phase outcomes by phase and result"
    );
    describe_counter!(
        RECEIVE_ATTEMPTS_TOTAL,
        "Number of receive calls issued per queue"
    );
    describe_counter!(
        MESSAGES_RECEIVED_TOTAL,
        "Number of messages received per queue"
    );
    describe_counter!(PURGES_TOTAL, "Number of queue purge calls by outcome");
    describe_counter!(
        READINESS_PROBES_TOTAL,
        "Number of subscription readiness probes issued"
    );
    describe_gauge!(
        PAYLOAD_BYTES,
        metrics::Unit::Bytes,
        "Size of the most recently generated payload"
    );
    describe_gauge!(
        BUILD_INFO,
        "Build information (always 1, with version label)"
    );
}
