//! 에러 타입: 도메인별 에러 정의
//!
//! [`ClaimcheckError`]는 하네스 전체의 최상위 에러이며, [`ErrorKind`]로
//! 환경 에러 / 단언 실패 / 정리 실패를 구분합니다. 리포트와 종료 코드는
//! 이 분류만 보고 결정됩니다.

use std::fmt;

/// claimcheck 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum ClaimcheckError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 프로비저닝 출력 문서 에러
    #[error("fixture error: {0}")]
    Fixture(#[from] FixtureError),

    /// 실행 전제 조건 위반 (프로비저닝 실패, 구독 미활성 등)
    #[error("precondition failed: {0}")]
    Precondition(#[from] PreconditionError),

    /// 외부 서비스 호출 실패
    #[error("service error: {0}")]
    Service(#[from] ServiceError),

    /// 메시지 엔벨로프 해석 실패
    #[error("envelope error: {0}")]
    Envelope(#[from] EnvelopeError),

    /// 검증 단언 실패
    #[error("assertion failed: {0}")]
    Assertion(#[from] AssertionError),

    /// 정리 작업 실패 (purge, destroy)
    #[error("cleanup failed: {0}")]
    Cleanup(#[from] CleanupError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 에러 분류: 리포트 판정과 종료 코드의 기준
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// 환경/전제 조건 에러: 즉시 중단, 재시도 없음
    Environment,
    /// 파이프라인 검증 실패: 해당 단계 실패, teardown은 계속 진행
    Assertion,
    /// 정리 실패: 기록만 하고 판정을 바꾸지 않음
    Cleanup,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Environment => write!(f, "environment"),
            Self::Assertion => write!(f, "assertion"),
            Self::Cleanup => write!(f, "cleanup"),
        }
    }
}

impl ClaimcheckError {
    /// 에러 분류를 반환합니다.
    ///
    /// 엔벨로프 해석 실패는 파이프라인이 잘못된 메시지를 전달했다는 뜻이므로
    /// 단언 실패로 분류합니다.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_)
            | Self::Fixture(_)
            | Self::Precondition(_)
            | Self::Service(_)
            | Self::Io(_) => ErrorKind::Environment,
            Self::Envelope(_) | Self::Assertion(_) => ErrorKind::Assertion,
            Self::Cleanup(_) => ErrorKind::Cleanup,
        }
    }

    /// 환경 에러 여부. true면 남은 단계를 실행하지 않습니다.
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Environment
    }
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 프로비저닝 출력 문서(픽스처) 에러
#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    /// JSON 문법 오류
    #[error("malformed fixture document: {reason}")]
    Malformed { reason: String },

    /// 최상위 키 누락
    #[error("fixture document has no top-level key '{key}'")]
    MissingKey { key: String },

    /// 필수 필드 누락 또는 빈 값
    #[error("fixture is missing required field '{field}'")]
    MissingField { field: String },

    /// 픽스처 파일을 읽을 수 없음
    #[error("cannot read fixture file {path}: {reason}")]
    Unreadable { path: String, reason: String },
}

/// 실행 전제 조건 에러
#[derive(Debug, thiserror::Error)]
pub enum PreconditionError {
    /// 구독이 제한 시간 안에 활성화되지 않음
    #[error(
        "subscription from topic '{topic_arn}' to queue '{queue_arn}' not confirmed after {waited_secs}s ({attempts} probes)"
    )]
    SubscriptionInactive {
        topic_arn: String,
        queue_arn: String,
        waited_secs: u64,
        attempts: u32,
    },

    /// 프로비저닝 실패
    #[error("provisioning failed: {0}")]
    Provisioning(String),
}

/// 외부 서비스 호출 에러
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// 오브젝트 스토리지 호출 실패
    #[error("storage {operation} failed: {reason}")]
    Storage { operation: String, reason: String },

    /// 토픽 호출 실패
    #[error("topic {operation} failed: {reason}")]
    Topic { operation: String, reason: String },

    /// 큐 호출 실패
    #[error("queue {operation} failed: {reason}")]
    Queue { operation: String, reason: String },
}

/// 메시지 엔벨로프 해석 에러
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    /// 바깥 전송 래퍼 파싱 실패
    #[error("outer transport wrapper is not valid: {reason}")]
    Wrapper { reason: String },

    /// 안쪽 이벤트 파싱 실패
    #[error("inner event is not valid: {reason}")]
    Event { reason: String },

    /// 이벤트에서 locator를 찾을 수 없음
    #[error("event carries no object locator: {reason}")]
    NoLocator { reason: String },

    /// 다이제스트 문자열 형식 오류
    #[error("invalid digest '{value}': {reason}")]
    Digest { value: String, reason: String },
}

/// 검증 단언 실패
///
/// 모든 변형은 기대값과 실제값을 함께 담아 진단에 사용합니다.
#[derive(Debug, thiserror::Error)]
pub enum AssertionError {
    /// 다운로드한 데이터의 다이제스트 불일치
    #[error("digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    /// 알림이 가리키는 오브젝트가 업로드한 것과 다름
    #[error("locator mismatch: expected {expected}, got {actual}")]
    LocatorMismatch { expected: String, actual: String },

    /// 이벤트 필드 불일치
    #[error("event field '{field}' mismatch: expected '{expected}', got '{actual}'")]
    EventField {
        field: String,
        expected: String,
        actual: String,
    },

    /// 큐에서 받은 메시지 수가 기대와 다름
    #[error("queue '{queue}' delivered {actual} message(s), expected {expected}")]
    MessageCount {
        queue: String,
        expected: usize,
        actual: usize,
    },

    /// 제한 시간 안에 메시지가 도착하지 않음
    #[error("no message on queue '{queue}' within {waited_secs}s")]
    NothingReceived { queue: String, waited_secs: u64 },

    /// DLQ가 비어 있고, 그 전에 redrive를 일으킬 수신이 실패함
    #[error("no message on queue '{queue}' within {waited_secs}s; the redrive receive had failed: {cause}")]
    RedriveNotObserved {
        queue: String,
        waited_secs: u64,
        cause: String,
    },

    /// 메시지 본문 불일치
    #[error("message body mismatch on '{queue}': expected '{expected}', got '{actual}'")]
    BodyMismatch {
        queue: String,
        expected: String,
        actual: String,
    },
}

/// 정리 작업 에러
#[derive(Debug, thiserror::Error)]
pub enum CleanupError {
    /// 큐 purge 실패
    #[error("purge of '{queue}' failed: {reason}")]
    Purge { queue: String, reason: String },

    /// 리소스 삭제 실패
    #[error("teardown failed: {0}")]
    Teardown(String),
}
