//! 알림 토픽 추상화

use std::future::Future;

use aws_sdk_sns::error::DisplayErrorContext;
use aws_sdk_sns::types::Subscription;
use claimcheck_core::types::SubscriptionInfo;
use tracing::debug;

use crate::error::CloudError;

/// 토픽 작업
pub trait NotificationTopic: Send + Sync + 'static {
    /// 메시지를 발행하고 메시지 ID를 돌려줍니다.
    fn publish(
        &self,
        topic_arn: &str,
        message: &str,
    ) -> impl Future<Output = Result<String, CloudError>> + Send;

    /// 토픽의 모든 구독을 조회합니다 (페이지를 끝까지 따라감).
    fn list_subscriptions(
        &self,
        topic_arn: &str,
    ) -> impl Future<Output = Result<Vec<SubscriptionInfo>, CloudError>> + Send;
}

/// AWS SNS 구현
#[derive(Clone)]
pub struct SnsTopic {
    client: aws_sdk_sns::Client,
}

impl SnsTopic {
    /// SDK 클라이언트를 감쌉니다.
    pub fn new(client: aws_sdk_sns::Client) -> Self {
        Self { client }
    }
}

impl NotificationTopic for SnsTopic {
    async fn publish(&self, topic_arn: &str, message: &str) -> Result<String, CloudError> {
        let output = self
            .client
            .publish()
            .topic_arn(topic_arn)
            .message(message)
            .send()
            .await
            .map_err(|e| CloudError::topic("publish", DisplayErrorContext(&e).to_string()))?;

        let message_id = output.message_id().unwrap_or_default().to_owned();
        debug!(topic_arn, message_id, "message published");
        Ok(message_id)
    }

    async fn list_subscriptions(&self, topic_arn: &str) -> Result<Vec<SubscriptionInfo>, CloudError> {
        let mut subscriptions = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let output = self
                .client
                .list_subscriptions_by_topic()
                .topic_arn(topic_arn)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| {
                    CloudError::topic("list_subscriptions", DisplayErrorContext(&e).to_string())
                })?;

            subscriptions.extend(output.subscriptions().iter().map(subscription_info));

            match output.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_owned()),
                _ => break,
            }
        }

        Ok(subscriptions)
    }
}

pub(crate) fn subscription_info(sub: &Subscription) -> SubscriptionInfo {
    SubscriptionInfo {
        endpoint: sub.endpoint().map(str::to_owned),
        subscription_arn: sub.subscription_arn().map(str::to_owned),
        protocol: sub.protocol().map(str::to_owned),
    }
}
