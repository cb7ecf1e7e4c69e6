//! 오브젝트 스토리지 추상화
//!
//! [`ObjectStore`] trait은 드라이버가 쓰는 put/get 두 작업만 노출합니다.
//! 운영 코드는 [`S3ObjectStore`]를, 테스트는 인메모리 구현을 사용합니다.

use std::future::Future;
use std::path::PathBuf;

use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use tracing::debug;

use crate::error::CloudError;

/// 업로드할 본문
#[derive(Debug, Clone)]
pub enum ObjectBody {
    /// 메모리의 바이트
    Bytes(Bytes),
    /// 로컬 파일 (스트리밍 업로드)
    File(PathBuf),
}

/// 업로드 결과
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PutReceipt {
    /// 엔티티 태그 (따옴표 포함 원문)
    pub e_tag: Option<String>,
}

/// 다운로드 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedObject {
    /// 오브젝트 전체 바이트
    pub bytes: Bytes,
    /// 엔티티 태그
    pub e_tag: Option<String>,
}

/// 오브젝트 스토리지 작업
///
/// `Send + Sync + 'static`이므로 `Arc`로 감싸 단계 태스크 간에 공유할 수 있습니다.
pub trait ObjectStore: Send + Sync + 'static {
    /// 오브젝트를 업로드합니다.
    fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: ObjectBody,
    ) -> impl Future<Output = Result<PutReceipt, CloudError>> + Send;

    /// 오브젝트 전체를 다운로드합니다.
    fn get_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> impl Future<Output = Result<FetchedObject, CloudError>> + Send;
}

/// AWS S3 구현
#[derive(Clone)]
pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
}

impl S3ObjectStore {
    /// SDK 클라이언트를 감쌉니다.
    pub fn new(client: aws_sdk_s3::Client) -> Self {
        Self { client }
    }
}

impl ObjectStore for S3ObjectStore {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: ObjectBody,
    ) -> Result<PutReceipt, CloudError> {
        let stream = match body {
            ObjectBody::Bytes(bytes) => ByteStream::from(bytes),
            ObjectBody::File(path) => ByteStream::from_path(&path).await.map_err(|e| {
                CloudError::storage("put_object", format!("{}: {e}", path.display()))
            })?,
        };

        let output = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(stream)
            .send()
            .await
            .map_err(|e| CloudError::storage("put_object", DisplayErrorContext(&e).to_string()))?;

        debug!(bucket, key, e_tag = ?output.e_tag(), "object stored");
        Ok(PutReceipt {
            e_tag: output.e_tag().map(str::to_owned),
        })
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<FetchedObject, CloudError> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| CloudError::storage("get_object", DisplayErrorContext(&e).to_string()))?;

        let e_tag = output.e_tag().map(str::to_owned);
        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| CloudError::storage("get_object", format!("reading body: {e}")))?
            .into_bytes();

        debug!(bucket, key, size = bytes.len(), "object fetched");
        Ok(FetchedObject { bytes, e_tag })
    }
}
