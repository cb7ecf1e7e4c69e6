//! claimcheck 클라우드 서비스 추상화
//!
//! 드라이버가 사용하는 세 가지 외부 서비스를 trait으로 분리합니다.
//!
//! ```text
//!  drivers / probe / hygiene
//!        │        │        │
//!        ▼        ▼        ▼
//!  ObjectStore  NotificationTopic  MessageQueue   (trait)
//!        │        │        │
//!        ▼        ▼        ▼
//!  S3ObjectStore SnsTopic  SqsQueue               (AWS SDK)
//! ```
//!
//! 테스트는 같은 trait의 인메모리 구현을 주입합니다.

pub mod error;
pub mod queue;
pub mod sdk;
pub mod storage;
pub mod topic;

pub use error::CloudError;
pub use queue::{MessageQueue, SqsQueue};
pub use sdk::{AwsClients, load_sdk_config};
pub use storage::{FetchedObject, ObjectBody, ObjectStore, PutReceipt, S3ObjectStore};
pub use topic::{NotificationTopic, SnsTopic};
