//! claimcheck 공통 크레이트
//!
//! 클라우드 SDK에 의존하지 않는 모든 것을 담습니다: 설정, 에러 분류,
//! 프로비저닝 출력 문서 로더, 알림 엔벨로프 모델, 페이로드/다이제스트,
//! 결과적 일관성 대기 루프, 메트릭 이름.

pub mod config;
pub mod envelope;
pub mod error;
pub mod fixture;
pub mod metrics;
pub mod payload;
pub mod poll;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{
    AssertionError, ClaimcheckError, CleanupError, ConfigError, EnvelopeError, ErrorKind,
    FixtureError, PreconditionError, ServiceError,
};

// 설정
pub use config::{ClaimcheckConfig, PublishMode};

// 픽스처
pub use fixture::{QueueRef, ResourceFixture};

// 엔벨로프
pub use envelope::{ClaimCheckData, CloudEvent, InboundEvent, StorageNotification, TransportEnvelope};

// 페이로드
pub use payload::{ContentDigest, Payload, PayloadGenerator};

// 폴링
pub use poll::{PollError, PollPolicy, poll_until};

// 도메인 타입
pub use types::{ObjectLocator, PurgeOutcome, ReceivedMessage, SubscriptionInfo};
