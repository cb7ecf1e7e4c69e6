//! 프로비저닝 출력 문서 → [`ResourceFixture`]
//!
//! 프로비저닝 도구의 `output -json` 문서(각 출력이 `{"value": ...}`로 감싸짐)와
//! 최상위 키 아래에 리소스 객체가 바로 있는 평범한 문서를 모두 받습니다.
//!
//! ```json
//! {
//!   "claimcheck": {
//!     "claimcheck_s3":      { "arn": "...", "name": "bucket" },
//!     "claimcheck_sqs":     { "arn": "...", "name": "q", "url": "https://..." },
//!     "claimcheck_sqs_dlq": { "arn": "...", "name": "dlq", "url": "https://..." },
//!     "claimcheck_sns":     { "topic": "t", "arn": "arn:aws:sns:..." }
//!   }
//! }
//! ```
//!
//! 필수 필드가 없거나 비어 있으면 점 표기 경로를 담은
//! [`FixtureError::MissingField`]로 즉시 실패합니다.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::FixtureError;

/// 큐 식별자
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueRef {
    /// 큐 이름 (문서에 있을 때만)
    pub name: Option<String>,
    /// 큐 ARN (구독 엔드포인트와 비교할 때 사용)
    pub arn: Option<String>,
    /// 큐 URL (모든 큐 API 호출에 사용)
    pub url: String,
}

impl QueueRef {
    /// 로그와 리포트에 쓸 표시 이름
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.url)
    }
}

/// 라이브 리소스 식별자. 한 번 만들어진 뒤 읽기 전용입니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceFixture {
    /// 페이로드 버킷 이름
    pub bucket_name: String,
    /// 버킷 ARN
    pub bucket_arn: Option<String>,
    /// 메인 큐 (ARN 필수)
    pub queue: QueueRef,
    /// 데드 레터 큐
    pub dead_letter_queue: QueueRef,
    /// 토픽 ARN
    pub topic_arn: String,
    /// 토픽 이름
    pub topic_name: Option<String>,
    /// 암호화 키 ARN (정보용)
    pub kms_key_arn: Option<String>,
}

impl ResourceFixture {
    /// 메인 큐 ARN (로더가 존재를 보장)
    pub fn queue_arn(&self) -> &str {
        self.queue.arn.as_deref().unwrap_or_default()
    }

    /// 최상위 키 아래의 JSON 문서를 파싱합니다.
    pub fn parse(document: &str, output_key: &str) -> Result<Self, FixtureError> {
        let root: Value = serde_json::from_str(document).map_err(|e| FixtureError::Malformed {
            reason: e.to_string(),
        })?;
        Self::from_value(root, output_key)
    }

    /// 이미 파싱된 JSON 값에서 픽스처를 만듭니다.
    pub fn from_value(root: Value, output_key: &str) -> Result<Self, FixtureError> {
        let Value::Object(mut map) = root else {
            return Err(FixtureError::Malformed {
                reason: "top-level document is not a JSON object".to_owned(),
            });
        };
        let entry = map.remove(output_key).ok_or_else(|| FixtureError::MissingKey {
            key: output_key.to_owned(),
        })?;

        let raw: RawOutput =
            serde_json::from_value(unwrap_output_value(entry)).map_err(|e| {
                FixtureError::Malformed {
                    reason: format!("'{output_key}': {e}"),
                }
            })?;
        raw.into_fixture()
    }

    /// 파일에서 픽스처를 읽습니다.
    pub async fn from_file(path: impl AsRef<Path>, output_key: &str) -> Result<Self, FixtureError> {
        let path = path.as_ref();
        let content =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|e| FixtureError::Unreadable {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })?;
        Self::parse(&content, output_key)
    }
}

/// `output -json` 형식이면 `value`를 꺼냅니다.
///
/// `value`와 함께 `type`이나 `sensitive`가 있을 때만 래퍼로 봅니다.
fn unwrap_output_value(entry: Value) -> Value {
    match entry {
        Value::Object(mut map)
            if map.contains_key("value")
                && (map.contains_key("type") || map.contains_key("sensitive")) =>
        {
            map.remove("value").unwrap_or(Value::Null)
        }
        other => other,
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawOutput {
    claimcheck_s3: Option<RawBucket>,
    claimcheck_sqs: Option<RawQueue>,
    claimcheck_sqs_dlq: Option<RawQueue>,
    claimcheck_sns: Option<RawTopic>,
    claimcheck_kms: Option<RawKey>,
}

#[derive(Debug, Default, Deserialize)]
struct RawBucket {
    arn: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawQueue {
    arn: Option<String>,
    name: Option<String>,
    url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawTopic {
    topic: Option<String>,
    arn: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawKey {
    arn: Option<String>,
}

impl RawOutput {
    fn into_fixture(self) -> Result<ResourceFixture, FixtureError> {
        let bucket = self.claimcheck_s3.unwrap_or_default();
        let queue = self.claimcheck_sqs.unwrap_or_default();
        let dlq = self.claimcheck_sqs_dlq.unwrap_or_default();
        let topic = self.claimcheck_sns.unwrap_or_default();

        let bucket_name = required(bucket.name, "claimcheck_s3.name")?;
        let queue_url = required(queue.url, "claimcheck_sqs.url")?;
        let queue_arn = required(queue.arn, "claimcheck_sqs.arn")?;
        let dlq_url = required(dlq.url, "claimcheck_sqs_dlq.url")?;
        let topic_arn = required(topic.arn, "claimcheck_sns.arn")?;

        Ok(ResourceFixture {
            bucket_name,
            bucket_arn: non_empty(bucket.arn),
            queue: QueueRef {
                name: non_empty(queue.name),
                arn: Some(queue_arn),
                url: queue_url,
            },
            dead_letter_queue: QueueRef {
                name: non_empty(dlq.name),
                arn: non_empty(dlq.arn),
                url: dlq_url,
            },
            topic_arn,
            topic_name: non_empty(topic.topic),
            kms_key_arn: self.claimcheck_kms.and_then(|k| non_empty(k.arn)),
        })
    }
}

fn required(value: Option<String>, field: &str) -> Result<String, FixtureError> {
    non_empty(value).ok_or_else(|| FixtureError::MissingField {
        field: field.to_owned(),
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
