//! 도메인 타입: 서비스 계약에서 주고받는 값들
//!
//! 클라우드 SDK 타입에 의존하지 않는 순수 값 타입입니다.
//! `claimcheck-cloud`의 구현체는 SDK 응답을 이 타입으로 변환합니다.

use std::fmt;

use serde::{Deserialize, Serialize};

/// SNS가 아직 확인되지 않은 구독에 부여하는 ARN 자리 표시값
pub const PENDING_CONFIRMATION: &str = "PendingConfirmation";

/// 오브젝트 위치 (버킷 + 키)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectLocator {
    /// 버킷 이름
    pub bucket: String,
    /// 오브젝트 키
    pub key: String,
}

impl ObjectLocator {
    /// 새 locator를 생성합니다.
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for ObjectLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

/// 큐에서 한 번 수신한 메시지 (전달 시도 1회)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    /// 서비스가 부여한 메시지 ID
    pub message_id: Option<String>,
    /// 삭제(확인)에 필요한 수신 핸들
    pub receipt_handle: String,
    /// 메시지 본문
    pub body: String,
    /// 서비스가 보고한 대략적인 수신 횟수
    pub receive_count: Option<u32>,
}

/// 토픽 구독 정보
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SubscriptionInfo {
    /// 구독 엔드포인트 (SQS 구독이면 큐 ARN)
    pub endpoint: Option<String>,
    /// 구독 ARN, 확인 전에는 `PendingConfirmation`
    pub subscription_arn: Option<String>,
    /// 프로토콜 (sqs, https, ...)
    pub protocol: Option<String>,
}

impl SubscriptionInfo {
    /// 확인 완료된 구독인지 여부
    pub fn is_confirmed(&self) -> bool {
        match self.subscription_arn.as_deref() {
            Some(arn) => !arn.is_empty() && arn != PENDING_CONFIRMATION,
            None => false,
        }
    }

    /// 주어진 엔드포인트로 향하는 확인된 구독인지 여부
    pub fn is_active_for(&self, endpoint: &str) -> bool {
        self.endpoint.as_deref() == Some(endpoint) && self.is_confirmed()
    }
}

/// purge 호출 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurgeOutcome {
    /// purge 요청이 수락됨
    Purged,
    /// 직전 purge가 아직 진행 중 (이미 비워진 것으로 간주)
    AlreadyInProgress,
}
