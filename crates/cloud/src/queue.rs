//! 메시지 큐 추상화

use std::future::Future;
use std::time::Duration;

use aws_sdk_sqs::error::DisplayErrorContext;
use aws_sdk_sqs::types::{Message, MessageSystemAttributeName};
use claimcheck_core::types::{PurgeOutcome, ReceivedMessage};
use tracing::{debug, warn};

use crate::error::CloudError;

/// 한 번의 receive로 받을 수 있는 최대 메시지 수
pub const MAX_BATCH: u32 = 10;

/// 큐 작업
pub trait MessageQueue: Send + Sync + 'static {
    /// 최대 `wait`만큼 long-poll하며 메시지를 받습니다.
    ///
    /// 받은 메시지는 가시성 타임아웃 동안 숨겨지며, 삭제하지 않으면 다시 전달됩니다.
    fn receive(
        &self,
        queue_url: &str,
        max_messages: u32,
        wait: Duration,
    ) -> impl Future<Output = Result<Vec<ReceivedMessage>, CloudError>> + Send;

    /// 수신 핸들로 메시지를 삭제(확인)합니다.
    fn delete(
        &self,
        queue_url: &str,
        receipt_handle: &str,
    ) -> impl Future<Output = Result<(), CloudError>> + Send;

    /// 큐의 모든 메시지를 지웁니다.
    fn purge(&self, queue_url: &str) -> impl Future<Output = Result<PurgeOutcome, CloudError>> + Send;
}

/// AWS SQS 구현
#[derive(Clone)]
pub struct SqsQueue {
    client: aws_sdk_sqs::Client,
}

impl SqsQueue {
    /// SDK 클라이언트를 감쌉니다.
    pub fn new(client: aws_sdk_sqs::Client) -> Self {
        Self { client }
    }
}

impl MessageQueue for SqsQueue {
    async fn receive(
        &self,
        queue_url: &str,
        max_messages: u32,
        wait: Duration,
    ) -> Result<Vec<ReceivedMessage>, CloudError> {
        let max = max_messages.clamp(1, MAX_BATCH) as i32;
        let wait_secs = wait.as_secs().min(20) as i32;

        let output = self
            .client
            .receive_message()
            .queue_url(queue_url)
            .max_number_of_messages(max)
            .wait_time_seconds(wait_secs)
            .message_system_attribute_names(MessageSystemAttributeName::ApproximateReceiveCount)
            .send()
            .await
            .map_err(|e| CloudError::queue("receive", DisplayErrorContext(&e).to_string()))?;

        let messages: Vec<ReceivedMessage> =
            output.messages().iter().filter_map(received_message).collect();
        debug!(queue_url, count = messages.len(), "receive completed");
        Ok(messages)
    }

    async fn delete(&self, queue_url: &str, receipt_handle: &str) -> Result<(), CloudError> {
        self.client
            .delete_message()
            .queue_url(queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| CloudError::queue("delete", DisplayErrorContext(&e).to_string()))?;
        Ok(())
    }

    async fn purge(&self, queue_url: &str) -> Result<PurgeOutcome, CloudError> {
        match self.client.purge_queue().queue_url(queue_url).send().await {
            Ok(_) => Ok(PurgeOutcome::Purged),
            Err(e)
                if e
                    .as_service_error()
                    .is_some_and(|se| se.is_purge_queue_in_progress()) =>
            {
                Ok(PurgeOutcome::AlreadyInProgress)
            }
            Err(e) => Err(CloudError::queue("purge", DisplayErrorContext(&e).to_string())),
        }
    }
}

/// SDK 메시지를 도메인 타입으로 바꿉니다. 수신 핸들이 없으면 버립니다.
pub(crate) fn received_message(msg: &Message) -> Option<ReceivedMessage> {
    let Some(receipt_handle) = msg.receipt_handle() else {
        warn!(message_id = ?msg.message_id(), "message without receipt handle skipped");
        return None;
    };
    let receive_count = msg
        .attributes()
        .and_then(|attrs| attrs.get(&MessageSystemAttributeName::ApproximateReceiveCount))
        .and_then(|count| count.parse::<u32>().ok());

    Some(ReceivedMessage {
        message_id: msg.message_id().map(str::to_owned),
        receipt_handle: receipt_handle.to_owned(),
        body: msg.body().unwrap_or_default().to_owned(),
        receive_count,
    })
}
