// Fixed-cadence polling for the open conversation.
//
// Ticks are wall-clock driven: each tick spawns its own fetch and never waits for the
// previous one, so fetches can overlap on a slow network and the last one to complete
// wins in the store. The first fetch fires immediately on start.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub(super) struct PollScheduler {
    ticker: Option<JoinHandle<()>>,
}

impl PollScheduler {
    /// Starts polling. `deliver` receives `(fetch_seq, result)` for every completed
    /// fetch, in completion order; `fetch_seq` is the tick number that issued it.
    pub(super) fn start<F, Fut, T, D>(runtime: &Handle, period: Duration, fetch: F, deliver: D) -> Self
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
        D: Fn(u64, T) + Send + Sync + 'static,
    {
        let deliver = Arc::new(deliver);
        let ticker = runtime.spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut fetch_seq: u64 = 0;
            loop {
                // The first tick completes immediately.
                interval.tick().await;
                fetch_seq += 1;
                let seq = fetch_seq;
                let fut = fetch();
                let deliver = deliver.clone();
                tokio::spawn(async move {
                    let result = fut.await;
                    deliver(seq, result);
                });
            }
        });
        Self {
            ticker: Some(ticker),
        }
    }

    /// Cancels the timer. Idempotent. Fetches already in flight still complete and
    /// are delivered; the receiver is expected to drop them by screen token.
    pub(super) fn stop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }

    #[cfg(test)]
    fn is_running(&self) -> bool {
        self.ticker.is_some()
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
