//! AWS SDK 설정 로딩과 클라이언트 생성

use aws_config::{BehaviorVersion, Region, SdkConfig};
use claimcheck_core::config::AwsConfig;
use tracing::info;

use crate::queue::SqsQueue;
use crate::storage::S3ObjectStore;
use crate::topic::SnsTopic;

/// 공유 SDK 설정을 로드합니다.
///
/// 빈 `region`/`endpoint_url`은 기본 자격 증명/리전 체인에 맡깁니다.
pub async fn load_sdk_config(aws: &AwsConfig) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if !aws.region.is_empty() {
        loader = loader.region(Region::new(aws.region.clone()));
    }
    if !aws.endpoint_url.is_empty() {
        loader = loader.endpoint_url(aws.endpoint_url.clone());
    }
    loader.load().await
}

/// 세 서비스 클라이언트 묶음
#[derive(Clone)]
pub struct AwsClients {
    /// 오브젝트 스토리지
    pub storage: S3ObjectStore,
    /// 토픽
    pub topic: SnsTopic,
    /// 큐
    pub queue: SqsQueue,
}

impl AwsClients {
    /// 설정에서 클라이언트를 만듭니다.
    pub async fn connect(aws: &AwsConfig) -> Self {
        let sdk_config = load_sdk_config(aws).await;
        info!(
            region = sdk_config.region().map(|r| r.as_ref()).unwrap_or("default"),
            endpoint = sdk_config.endpoint_url().unwrap_or("default"),
            force_path_style = aws.force_path_style,
            "aws clients configured"
        );
        Self::from_sdk_config(&sdk_config, aws.force_path_style)
    }

    /// 이미 로드된 SDK 설정에서 클라이언트를 만듭니다.
    pub fn from_sdk_config(sdk_config: &SdkConfig, force_path_style: bool) -> Self {
        let s3_config = aws_sdk_s3::config::Builder::from(sdk_config)
            .force_path_style(force_path_style)
            .build();
        Self {
            storage: S3ObjectStore::new(aws_sdk_s3::Client::from_conf(s3_config)),
            topic: SnsTopic::new(aws_sdk_sns::Client::new(sdk_config)),
            queue: SqsQueue::new(aws_sdk_sqs::Client::new(sdk_config)),
        }
    }
}
