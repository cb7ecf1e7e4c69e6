//! 알림 엔벨로프: 전송 래퍼와 안쪽 이벤트
//!
//! 큐에 도착한 메시지는 두 겹입니다.
//!
//! 1. 토픽이 붙이는 전송 래퍼: `{"Type": "Notification", "Message": "<문자열>", ...}`
//! 2. `Message` 문자열 안의 이벤트: 스토리지 변경 알림(`Records` 배열) 또는
//!    `id`/`source`/`type`/`data`를 가진 CloudEvent
//!
//! 안쪽 이벤트의 형태는 `Records` 키의 존재로 판별합니다.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EnvelopeError;
use crate::payload::ContentDigest;
use crate::types::ObjectLocator;

/// CloudEvents 스펙 버전
pub const CLOUDEVENTS_SPEC_VERSION: &str = "1.0";

/// 스토리지 알림에서 오브젝트 생성 이벤트 이름
pub const OBJECT_CREATED_PUT: &str = "ObjectCreated:Put";

// ─── 전송 래퍼 ─────────────────────────────────────────────────────

/// 토픽 → 큐 전송 래퍼
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TransportEnvelope {
    /// 래퍼 종류 (`Notification`)
    #[serde(rename = "Type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// 토픽 메시지 ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    /// 발행된 토픽
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic_arn: Option<String>,
    /// 발행된 원문
    pub message: String,
    /// 발행 시각 (ISO 8601)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl TransportEnvelope {
    /// 큐 메시지 본문을 래퍼로 파싱합니다.
    pub fn parse(body: &str) -> Result<Self, EnvelopeError> {
        serde_json::from_str(body).map_err(|e| EnvelopeError::Wrapper {
            reason: e.to_string(),
        })
    }

    /// 본문에서 발행 원문만 꺼냅니다.
    pub fn unwrap_body(body: &str) -> Result<String, EnvelopeError> {
        Self::parse(body).map(|envelope| envelope.message)
    }
}

// ─── CloudEvent ────────────────────────────────────────────────────

/// CloudEvents 1.0 JSON 이벤트
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudEvent {
    /// 스펙 버전
    #[serde(default = "default_spec_version")]
    pub specversion: String,
    /// 이벤트 ID (업로드 키와 같음)
    pub id: String,
    /// 발행자
    pub source: String,
    /// 이벤트 타입
    #[serde(rename = "type")]
    pub event_type: String,
    /// data 콘텐츠 타입
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datacontenttype: Option<String>,
    /// 이벤트 데이터
    #[serde(default)]
    pub data: Value,
}

fn default_spec_version() -> String {
    CLOUDEVENTS_SPEC_VERSION.to_owned()
}

impl CloudEvent {
    /// 클레임 체크 데이터를 담은 이벤트를 만듭니다.
    pub fn claim_check(
        id: impl Into<String>,
        source: impl Into<String>,
        event_type: impl Into<String>,
        data: &ClaimCheckData,
    ) -> Result<Self, EnvelopeError> {
        let data = serde_json::to_value(data).map_err(|e| EnvelopeError::Event {
            reason: e.to_string(),
        })?;
        Ok(Self {
            specversion: default_spec_version(),
            id: id.into(),
            source: source.into(),
            event_type: event_type.into(),
            datacontenttype: Some("application/json".to_owned()),
            data,
        })
    }

    /// data 섹션을 클레임 체크 데이터로 해석합니다.
    pub fn claim_check_data(&self) -> Result<ClaimCheckData, EnvelopeError> {
        ClaimCheckData::deserialize(&self.data).map_err(|e| EnvelopeError::NoLocator {
            reason: format!("event data: {e}"),
        })
    }

    /// JSON 문자열로 직렬화합니다.
    pub fn to_json(&self) -> Result<String, EnvelopeError> {
        serde_json::to_string(self).map_err(|e| EnvelopeError::Event {
            reason: e.to_string(),
        })
    }
}

/// CloudEvent data 섹션
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimCheckData {
    /// 발행자 식별
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    /// 버킷 (없으면 픽스처 버킷)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    /// 오브젝트 키
    pub key: String,
    /// 페이로드 MD5 (소문자 hex)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md5sum: Option<String>,
}

// ─── 스토리지 알림 ─────────────────────────────────────────────────

/// 스토리지 변경 알림 문서
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageNotification {
    /// 변경 레코드 목록
    #[serde(rename = "Records")]
    pub records: Vec<StorageRecord>,
}

/// 변경 레코드 하나
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageRecord {
    /// 이벤트 이름 (`ObjectCreated:Put` 등)
    #[serde(rename = "eventName", default, skip_serializing_if = "Option::is_none")]
    pub event_name: Option<String>,
    /// 스토리지 엔티티
    pub s3: StorageEntity,
}

/// 레코드의 버킷/오브젝트 정보
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageEntity {
    /// 버킷
    pub bucket: BucketEntity,
    /// 오브젝트
    pub object: ObjectEntity,
}

/// 버킷 정보
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketEntity {
    /// 버킷 이름
    pub name: String,
}

/// 오브젝트 정보
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectEntity {
    /// 오브젝트 키
    pub key: String,
    /// 크기 (바이트)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// 엔티티 태그
    #[serde(rename = "eTag", default, skip_serializing_if = "Option::is_none")]
    pub e_tag: Option<String>,
}

impl StorageNotification {
    /// 오브젝트 생성 레코드 하나를 담은 알림을 만듭니다.
    pub fn object_created(locator: &ObjectLocator, size: u64, e_tag: Option<String>) -> Self {
        Self {
            records: vec![StorageRecord {
                event_name: Some(OBJECT_CREATED_PUT.to_owned()),
                s3: StorageEntity {
                    bucket: BucketEntity {
                        name: locator.bucket.clone(),
                    },
                    object: ObjectEntity {
                        key: locator.key.clone(),
                        size: Some(size),
                        e_tag: e_tag.map(|t| t.trim_matches('"').to_owned()),
                    },
                },
            }],
        }
    }

    /// JSON 문자열로 직렬화합니다.
    pub fn to_json(&self) -> Result<String, EnvelopeError> {
        serde_json::to_string(self).map_err(|e| EnvelopeError::Event {
            reason: e.to_string(),
        })
    }
}

// ─── 안쪽 이벤트 ───────────────────────────────────────────────────

/// 구조 검사로 판별한 안쪽 이벤트
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// `id`/`source`/`type`/`data`를 가진 일반 이벤트
    Generic(CloudEvent),
    /// `Records` 배열을 가진 스토리지 알림
    Storage(StorageNotification),
}

impl InboundEvent {
    /// 발행 원문을 이벤트로 파싱합니다.
    pub fn parse(message: &str) -> Result<Self, EnvelopeError> {
        let value: Value = serde_json::from_str(message).map_err(|e| EnvelopeError::Event {
            reason: e.to_string(),
        })?;
        let is_storage = value
            .as_object()
            .is_some_and(|map| map.contains_key("Records"));

        if is_storage {
            StorageNotification::deserialize(value)
                .map(Self::Storage)
                .map_err(|e| EnvelopeError::Event {
                    reason: format!("storage notification: {e}"),
                })
        } else {
            CloudEvent::deserialize(value)
                .map(Self::Generic)
                .map_err(|e| EnvelopeError::Event {
                    reason: format!("generic event: {e}"),
                })
        }
    }

    /// 큐 메시지 본문에서 래퍼와 이벤트를 차례로 해석합니다.
    pub fn from_queue_body(body: &str) -> Result<Self, EnvelopeError> {
        let message = TransportEnvelope::unwrap_body(body)?;
        Self::parse(&message)
    }

    /// 이벤트가 가리키는 오브젝트 위치
    ///
    /// 스토리지 알림은 첫 레코드를, 일반 이벤트는 data 섹션을 씁니다.
    /// data에 버킷이 없으면 `default_bucket`을 사용합니다.
    /// 키는 받은 그대로 사용하며 URL 디코딩하지 않습니다.
    pub fn locator(&self, default_bucket: &str) -> Result<ObjectLocator, EnvelopeError> {
        match self {
            Self::Storage(notification) => {
                let record = notification.records.first().ok_or_else(|| {
                    EnvelopeError::NoLocator {
                        reason: "storage notification has no records".to_owned(),
                    }
                })?;
                Ok(ObjectLocator::new(
                    record.s3.bucket.name.clone(),
                    record.s3.object.key.clone(),
                ))
            }
            Self::Generic(event) => {
                let data = event.claim_check_data()?;
                if data.key.is_empty() {
                    return Err(EnvelopeError::NoLocator {
                        reason: "event data key is empty".to_owned(),
                    });
                }
                let bucket = data
                    .bucket
                    .filter(|b| !b.is_empty())
                    .unwrap_or_else(|| default_bucket.to_owned());
                Ok(ObjectLocator::new(bucket, data.key))
            }
        }
    }

    /// 이벤트가 광고하는 다이제스트 (일반 이벤트의 `md5sum`)
    pub fn advertised_digest(&self) -> Result<Option<ContentDigest>, EnvelopeError> {
        match self {
            Self::Storage(_) => Ok(None),
            Self::Generic(event) => event
                .claim_check_data()?
                .md5sum
                .map(|s| s.parse())
                .transpose(),
        }
    }

    /// 로그용 형태 이름
    pub fn shape(&self) -> &'static str {
        match self {
            Self::Generic(_) => "generic",
            Self::Storage(_) => "storage",
        }
    }
}
