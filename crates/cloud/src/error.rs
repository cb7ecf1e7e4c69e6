//! 클라우드 호출 에러 타입
//!
//! [`CloudError`]는 SDK 호출 실패를 서비스별로 구분합니다.
//! `From<CloudError> for ClaimcheckError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.

use claimcheck_core::error::{ClaimcheckError, ServiceError};

/// 클라우드 서비스 호출 에러
#[derive(Debug, thiserror::Error)]
pub enum CloudError {
    /// 오브젝트 스토리지 호출 실패
    #[error("storage {operation} failed: {reason}")]
    Storage {
        /// 실패한 작업 (put_object, get_object)
        operation: &'static str,
        /// SDK 에러 문맥
        reason: String,
    },

    /// 토픽 호출 실패
    #[error("topic {operation} failed: {reason}")]
    Topic {
        /// 실패한 작업 (publish, list_subscriptions)
        operation: &'static str,
        /// SDK 에러 문맥
        reason: String,
    },

    /// 큐 호출 실패
    #[error("queue {operation} failed: {reason}")]
    Queue {
        /// 실패한 작업 (receive, delete, purge)
        operation: &'static str,
        /// SDK 에러 문맥
        reason: String,
    },
}

impl CloudError {
    pub(crate) fn storage(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::Storage {
            operation,
            reason: reason.into(),
        }
    }

    pub(crate) fn topic(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::Topic {
            operation,
            reason: reason.into(),
        }
    }

    pub(crate) fn queue(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::Queue {
            operation,
            reason: reason.into(),
        }
    }
}

impl From<CloudError> for ClaimcheckError {
    fn from(err: CloudError) -> Self {
        let service = match err {
            CloudError::Storage { operation, reason } => ServiceError::Storage {
                operation: operation.to_owned(),
                reason,
            },
            CloudError::Topic { operation, reason } => ServiceError::Topic {
                operation: operation.to_owned(),
                reason,
            },
            CloudError::Queue { operation, reason } => ServiceError::Queue {
                operation: operation.to_owned(),
                reason,
            },
        };
        ClaimcheckError::Service(service)
    }
}
