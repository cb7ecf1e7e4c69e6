//! 설정 관리: claimcheck.toml 파싱 및 런타임 설정
//!
//! [`ClaimcheckConfig`]는 하네스 전체 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`CLAIMCHECK_PIPELINE_PUBLISH_MODE=cloudevent` 형식)
//! 3. 설정 파일 (`claimcheck.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), claimcheck_core::error::ClaimcheckError> {
//! use claimcheck_core::config::ClaimcheckConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = ClaimcheckConfig::load("claimcheck.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = ClaimcheckConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ClaimcheckError, ConfigError};

/// 1 MiB
pub const MIB: u64 = 1024 * 1024;

/// 단일 PUT으로 올릴 수 있는 최대 오브젝트 크기 (5 GiB)
const MAX_SINGLE_PUT_BYTES: u64 = 5 * 1024 * MIB;
/// SQS long-poll 최대 대기 시간
pub const MAX_LONG_POLL_SECS: u64 = 20;
const MAX_RECEIVE_COUNT: u32 = 1000;

/// claimcheck 통합 설정
///
/// `claimcheck.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClaimcheckConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// AWS 클라이언트 설정
    #[serde(default)]
    pub aws: AwsConfig,
    /// 프로비저닝 설정
    #[serde(default)]
    pub provision: ProvisionConfig,
    /// 구독 준비 확인 설정
    #[serde(default)]
    pub readiness: ReadinessConfig,
    /// 페이로드 생성 설정
    #[serde(default)]
    pub payload: PayloadConfig,
    /// 파이프라인 단계 설정
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// 포이즌 메시지 단계 설정
    #[serde(default)]
    pub poison: PoisonConfig,
    /// 큐 정리 설정
    #[serde(default)]
    pub hygiene: HygieneConfig,
    /// 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl ClaimcheckConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ClaimcheckError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// 파일 없이 기본값 + 환경변수 오버라이드로 설정을 만듭니다.
    pub fn from_env() -> Result<Self, ClaimcheckError> {
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ClaimcheckError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ClaimcheckError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                ClaimcheckError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, ClaimcheckError> {
        toml::from_str(toml_str).map_err(|e| {
            ClaimcheckError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `CLAIMCHECK_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "CLAIMCHECK_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "CLAIMCHECK_GENERAL_LOG_FORMAT");
        override_u64(
            &mut self.general.run_timeout_secs,
            "CLAIMCHECK_GENERAL_RUN_TIMEOUT_SECS",
        );

        // AWS
        override_string(&mut self.aws.region, "CLAIMCHECK_AWS_REGION");
        override_string(&mut self.aws.endpoint_url, "CLAIMCHECK_AWS_ENDPOINT_URL");
        override_bool(
            &mut self.aws.force_path_style,
            "CLAIMCHECK_AWS_FORCE_PATH_STYLE",
        );

        // Provision
        override_bool(&mut self.provision.enabled, "CLAIMCHECK_PROVISION_ENABLED");
        override_string(&mut self.provision.binary, "CLAIMCHECK_PROVISION_BINARY");
        override_string(
            &mut self.provision.working_dir,
            "CLAIMCHECK_PROVISION_WORKING_DIR",
        );
        override_string(
            &mut self.provision.output_key,
            "CLAIMCHECK_PROVISION_OUTPUT_KEY",
        );
        override_string(
            &mut self.provision.fixture_path,
            "CLAIMCHECK_PROVISION_FIXTURE_PATH",
        );
        override_u32(
            &mut self.provision.max_retries,
            "CLAIMCHECK_PROVISION_MAX_RETRIES",
        );
        override_u64(
            &mut self.provision.retry_backoff_secs,
            "CLAIMCHECK_PROVISION_RETRY_BACKOFF_SECS",
        );

        // Readiness
        override_u64(
            &mut self.readiness.timeout_secs,
            "CLAIMCHECK_READINESS_TIMEOUT_SECS",
        );
        override_u64(
            &mut self.readiness.poll_interval_secs,
            "CLAIMCHECK_READINESS_POLL_INTERVAL_SECS",
        );

        // Payload
        override_u64(&mut self.payload.min_bytes, "CLAIMCHECK_PAYLOAD_MIN_BYTES");
        override_u64(&mut self.payload.max_bytes, "CLAIMCHECK_PAYLOAD_MAX_BYTES");
        override_string(&mut self.payload.temp_dir, "CLAIMCHECK_PAYLOAD_TEMP_DIR");
        override_opt_u64(&mut self.payload.seed, "CLAIMCHECK_PAYLOAD_SEED");

        // Pipeline
        override_parsed(
            &mut self.pipeline.publish_mode,
            "CLAIMCHECK_PIPELINE_PUBLISH_MODE",
        );
        override_u64(
            &mut self.pipeline.receive_budget_secs,
            "CLAIMCHECK_PIPELINE_RECEIVE_BUDGET_SECS",
        );
        override_string(
            &mut self.pipeline.event_source,
            "CLAIMCHECK_PIPELINE_EVENT_SOURCE",
        );
        override_string(
            &mut self.pipeline.event_type,
            "CLAIMCHECK_PIPELINE_EVENT_TYPE",
        );
        override_string(&mut self.pipeline.sender, "CLAIMCHECK_PIPELINE_SENDER");

        // Poison
        override_string(
            &mut self.poison.message_prefix,
            "CLAIMCHECK_POISON_MESSAGE_PREFIX",
        );
        override_u32(
            &mut self.poison.max_receive_count,
            "CLAIMCHECK_POISON_MAX_RECEIVE_COUNT",
        );
        override_u64(
            &mut self.poison.visibility_wait_secs,
            "CLAIMCHECK_POISON_VISIBILITY_WAIT_SECS",
        );
        override_u64(
            &mut self.poison.receive_wait_secs,
            "CLAIMCHECK_POISON_RECEIVE_WAIT_SECS",
        );
        override_u64(
            &mut self.poison.dlq_budget_secs,
            "CLAIMCHECK_POISON_DLQ_BUDGET_SECS",
        );

        // Hygiene
        override_bool(&mut self.hygiene.enabled, "CLAIMCHECK_HYGIENE_ENABLED");
        override_u64(
            &mut self.hygiene.settle_secs,
            "CLAIMCHECK_HYGIENE_SETTLE_SECS",
        );

        // Metrics
        override_bool(&mut self.metrics.enabled, "CLAIMCHECK_METRICS_ENABLED");
        override_string(
            &mut self.metrics.textfile_path,
            "CLAIMCHECK_METRICS_TEXTFILE_PATH",
        );
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), ClaimcheckError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.general.run_timeout_secs == 0 {
            return Err(invalid("general.run_timeout_secs", "must be greater than 0"));
        }

        if self.provision.enabled {
            if self.provision.binary.is_empty() {
                return Err(invalid(
                    "provision.binary",
                    "binary must not be empty when provisioning is enabled",
                ));
            }
            if self.provision.output_key.is_empty() {
                return Err(invalid("provision.output_key", "must not be empty"));
            }
        } else if self.provision.fixture_path.is_empty() {
            return Err(invalid(
                "provision.fixture_path",
                "a fixture file is required when provisioning is disabled",
            ));
        }

        if self.readiness.timeout_secs == 0 {
            return Err(invalid("readiness.timeout_secs", "must be greater than 0"));
        }
        if self.readiness.poll_interval_secs == 0
            || self.readiness.poll_interval_secs > self.readiness.timeout_secs
        {
            return Err(invalid(
                "readiness.poll_interval_secs",
                format!("must be 1-{}", self.readiness.timeout_secs),
            ));
        }

        if self.payload.min_bytes == 0 {
            return Err(invalid("payload.min_bytes", "must be greater than 0"));
        }
        if self.payload.max_bytes < self.payload.min_bytes {
            return Err(invalid(
                "payload.max_bytes",
                "must be greater than or equal to payload.min_bytes",
            ));
        }
        if self.payload.max_bytes > MAX_SINGLE_PUT_BYTES {
            return Err(invalid(
                "payload.max_bytes",
                format!("must not exceed {MAX_SINGLE_PUT_BYTES} bytes"),
            ));
        }

        if self.pipeline.receive_budget_secs == 0 {
            return Err(invalid(
                "pipeline.receive_budget_secs",
                "must be greater than 0",
            ));
        }
        if self.pipeline.publish_mode == PublishMode::CloudEvent
            && (self.pipeline.event_source.is_empty() || self.pipeline.event_type.is_empty())
        {
            return Err(invalid(
                "pipeline.event_source",
                "event_source and event_type must be set for cloudevent mode",
            ));
        }

        if self.poison.message_prefix.is_empty() {
            return Err(invalid("poison.message_prefix", "must not be empty"));
        }
        if self.poison.max_receive_count == 0 || self.poison.max_receive_count > MAX_RECEIVE_COUNT
        {
            return Err(invalid(
                "poison.max_receive_count",
                format!("must be 1-{MAX_RECEIVE_COUNT}"),
            ));
        }
        if self.poison.visibility_wait_secs == 0 {
            return Err(invalid(
                "poison.visibility_wait_secs",
                "must be greater than 0",
            ));
        }
        if self.poison.receive_wait_secs > MAX_LONG_POLL_SECS {
            return Err(invalid(
                "poison.receive_wait_secs",
                format!("must be 0-{MAX_LONG_POLL_SECS}"),
            ));
        }
        if self.poison.dlq_budget_secs == 0 {
            return Err(invalid("poison.dlq_budget_secs", "must be greater than 0"));
        }

        if self.metrics.enabled && self.metrics.textfile_path.is_empty() {
            return Err(invalid(
                "metrics.textfile_path",
                "textfile_path must not be empty when metrics are enabled",
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ClaimcheckError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// 전체 단계 실행 제한 시간 (초), 초과 시 중단 후 teardown
    pub run_timeout_secs: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            run_timeout_secs: 900,
        }
    }
}

impl GeneralConfig {
    /// 전체 실행 제한 시간
    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }
}

/// AWS 클라이언트 설정
///
/// 빈 문자열은 "SDK 기본값 사용"을 뜻합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsConfig {
    /// 리전 (비어 있으면 기본 자격 증명 체인에서 결정)
    pub region: String,
    /// 엔드포인트 URL (LocalStack 등)
    pub endpoint_url: String,
    /// S3 path-style 주소 사용
    pub force_path_style: bool,
}

/// 프로비저닝 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionConfig {
    /// 프로비저닝 도구 실행 여부 (false면 fixture_path 사용)
    pub enabled: bool,
    /// 프로비저닝 도구 실행 파일 (tofu, terraform)
    pub binary: String,
    /// 스택 정의가 있는 디렉토리
    pub working_dir: String,
    /// 출력 문서의 최상위 키
    pub output_key: String,
    /// 미리 만들어 둔 출력 문서 경로
    pub fixture_path: String,
    /// 재시도 가능한 에러 발생 시 최대 재시도 횟수
    pub max_retries: u32,
    /// 재시도 간격 (초)
    pub retry_backoff_secs: u64,
    /// 재시도 대상 에러 패턴 (정규식)
    pub retryable_errors: Vec<String>,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            binary: "tofu".to_owned(),
            working_dir: ".".to_owned(),
            output_key: "claimcheck".to_owned(),
            fixture_path: String::new(),
            max_retries: 3,
            retry_backoff_secs: 5,
            retryable_errors: default_retryable_errors(),
        }
    }
}

/// 일시적인 프로비저닝 실패로 간주할 기본 에러 패턴
pub fn default_retryable_errors() -> Vec<String> {
    [
        ".*timeout while waiting for state to become.*",
        ".*timed out waiting for.*to become ready.*",
        ".*Error installing provider.*",
        ".*Failed to query available provider packages.*",
        ".*TLS handshake timeout.*",
        ".*connection reset by peer.*",
        ".*RequestError: send request failed.*",
        ".*ThrottlingException.*",
    ]
    .iter()
    .map(|s| (*s).to_owned())
    .collect()
}

/// 구독 준비 확인 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessConfig {
    /// 전체 대기 한도 (초)
    pub timeout_secs: u64,
    /// 폴링 간격 (초)
    pub poll_interval_secs: u64,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 180,
            poll_interval_secs: 5,
        }
    }
}

/// 페이로드 생성 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PayloadConfig {
    /// 최소 크기 (바이트)
    pub min_bytes: u64,
    /// 최대 크기 (바이트)
    pub max_bytes: u64,
    /// 임시 파일 디렉토리 (비어 있으면 시스템 기본값)
    pub temp_dir: String,
    /// 재현 가능한 실행을 위한 난수 시드
    pub seed: Option<u64>,
}

impl Default for PayloadConfig {
    fn default() -> Self {
        Self {
            min_bytes: 15 * MIB,
            max_bytes: 20 * MIB,
            temp_dir: String::new(),
            seed: None,
        }
    }
}

/// 파이프라인 단계에서 발행할 메시지 형태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishMode {
    /// key와 다이제스트를 data에 담은 CloudEvent
    #[default]
    #[serde(rename = "cloudevent", alias = "cloud_event")]
    CloudEvent,
    /// 스토리지 변경 알림 형태의 문서를 직접 발행
    StorageNotification,
    /// 발행하지 않고 스토리지 서비스의 자체 알림을 기다림
    BucketNotification,
}

impl PublishMode {
    /// 설정 파일 표기
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CloudEvent => "cloudevent",
            Self::StorageNotification => "storage_notification",
            Self::BucketNotification => "bucket_notification",
        }
    }
}

impl fmt::Display for PublishMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PublishMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cloud_event" | "cloudevent" => Ok(Self::CloudEvent),
            "storage_notification" => Ok(Self::StorageNotification),
            "bucket_notification" => Ok(Self::BucketNotification),
            other => Err(format!(
                "unknown publish mode '{other}', expected cloudevent, storage_notification or bucket_notification"
            )),
        }
    }
}

/// 파이프라인 단계 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// 발행 형태
    pub publish_mode: PublishMode,
    /// 알림 수신 대기 한도 (초)
    pub receive_budget_secs: u64,
    /// CloudEvent source
    pub event_source: String,
    /// CloudEvent type
    pub event_type: String,
    /// data.sender 값
    pub sender: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            publish_mode: PublishMode::CloudEvent,
            receive_budget_secs: 30,
            event_source: "claimcheck/publisher".to_owned(),
            event_type: "claimcheck.payload.stored".to_owned(),
            sender: "claimcheck-runner".to_owned(),
        }
    }
}

impl PipelineConfig {
    /// 알림 수신 대기 한도
    pub fn receive_budget(&self) -> Duration {
        Duration::from_secs(self.receive_budget_secs)
    }
}

/// 포이즌 메시지 단계 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoisonConfig {
    /// 메시지 접두어 (`<prefix>-<uuid>`)
    pub message_prefix: String,
    /// 큐의 redrive 정책 maxReceiveCount와 같아야 함
    pub max_receive_count: u32,
    /// 가시성 타임아웃보다 길게 기다릴 시간 (초)
    pub visibility_wait_secs: u64,
    /// 메인 큐 수신 long-poll 대기 (초)
    pub receive_wait_secs: u64,
    /// DLQ 도착 대기 한도 (초)
    pub dlq_budget_secs: u64,
}

impl Default for PoisonConfig {
    fn default() -> Self {
        Self {
            message_prefix: "dlq-test".to_owned(),
            max_receive_count: 1,
            visibility_wait_secs: 5,
            receive_wait_secs: 10,
            dlq_budget_secs: 10,
        }
    }
}

/// 큐 정리 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HygieneConfig {
    /// 단계 전 purge 실행 여부
    pub enabled: bool,
    /// purge 이후 안정화 대기 (초)
    pub settle_secs: u64,
}

impl Default for HygieneConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            settle_secs: 5,
        }
    }
}

/// 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 메트릭 기록 여부
    pub enabled: bool,
    /// 실행 종료 시 Prometheus 텍스트 형식으로 기록할 파일
    pub textfile_path: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            textfile_path: "claimcheck.prom".to_owned(),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    override_parsed(target, env_key);
}

fn override_u32(target: &mut u32, env_key: &str) {
    override_parsed(target, env_key);
}

fn override_u64(target: &mut u64, env_key: &str) {
    override_parsed(target, env_key);
}

fn override_opt_u64(target: &mut Option<u64>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = Some(parsed),
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

fn override_parsed<T: FromStr>(target: &mut T, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse env var, ignoring"
            ),
        }
    }
}
