//! 결과적 일관성 대기 루프
//!
//! [`poll_until`]은 프로브가 값을 돌려주거나 제한 시간이 다 될 때까지 일정
//! 간격으로 프로브를 호출합니다. 구독 준비 확인과 제한된 수신 루프가 모두 이
//! 함수를 사용합니다.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

/// 폴링 정책
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// 프로브 사이 대기 시간
    pub interval: Duration,
    /// 전체 제한 시간
    pub timeout: Duration,
}

impl PollPolicy {
    /// 새 정책을 만듭니다.
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    /// 초 단위로 정책을 만듭니다.
    pub fn from_secs(interval_secs: u64, timeout_secs: u64) -> Self {
        Self::new(
            Duration::from_secs(interval_secs),
            Duration::from_secs(timeout_secs),
        )
    }
}

/// 폴링 실패
#[derive(Debug, thiserror::Error)]
pub enum PollError<E> {
    /// 제한 시간 안에 값을 얻지 못함
    #[error("condition not met after {attempts} attempts in {elapsed:?}")]
    TimedOut { attempts: u32, elapsed: Duration },

    /// 프로브 자체가 실패 (재시도하지 않음)
    #[error("probe failed: {0}")]
    Probe(E),
}

/// 프로브가 `Some`을 돌려줄 때까지 반복합니다.
///
/// - 프로브는 최소 한 번 호출됩니다.
/// - 프로브가 `Err`를 돌려주면 즉시 [`PollError::Probe`]로 끝납니다.
/// - 다음 대기가 제한 시간을 넘기면 더 기다리지 않고
///   [`PollError::TimedOut`]을 돌려줍니다.
///
/// 프로브에는 1부터 시작하는 시도 번호가 전달됩니다. 프로브 자체가 시간을
/// 소비할 수 있으므로(long-poll) 경과 시간은 매 시도 후 다시 잽니다.
pub async fn poll_until<T, E, F, Fut>(policy: PollPolicy, mut probe: F) -> Result<T, PollError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
{
    let started = Instant::now();
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        if let Some(value) = probe(attempts).await.map_err(PollError::Probe)? {
            return Ok(value);
        }

        let elapsed = started.elapsed();
        if elapsed.saturating_add(policy.interval) > policy.timeout {
            return Err(PollError::TimedOut { attempts, elapsed });
        }
        tokio::time::sleep(policy.interval).await;
    }
}
