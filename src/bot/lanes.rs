//! Per-user lanes: messages from one user are processed in arrival order,
//! one at a time; different users run in parallel.
//!
//! Each lane is an unbounded queue drained by its own task. An idle lane
//! closes its queue, finishes whatever was already queued, and exits. A lane
//! created for a returning user waits for its predecessor to exit before
//! processing anything.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::channels::IncomingMessage;

/// Work done for each message on a lane.
#[async_trait]
pub trait LaneProcessor: Send + Sync + 'static {
    async fn process(&self, message: IncomingMessage);
}

struct Lane {
    tx: mpsc::UnboundedSender<IncomingMessage>,
    handle: JoinHandle<()>,
}

/// Lanes keyed by user id. Owned by the dispatch loop.
pub struct UserLanes {
    lanes: HashMap<String, Lane>,
    processor: Arc<dyn LaneProcessor>,
    idle_timeout: Duration,
}

impl UserLanes {
    pub fn new(processor: Arc<dyn LaneProcessor>, idle_timeout: Duration) -> Self {
        Self {
            lanes: HashMap::new(),
            processor,
            idle_timeout,
        }
    }

    /// Queue a message on its sender's lane, opening one if needed.
    pub fn dispatch(&mut self, message: IncomingMessage) {
        let user_id = message.user_id.clone();

        let (message, previous) = match self.lanes.remove(&user_id) {
            Some(lane) => match lane.tx.send(message) {
                Ok(()) => {
                    self.lanes.insert(user_id, lane);
                    return;
                }
                // The lane closed itself after idling; chain a new one behind it.
                Err(mpsc::error::SendError(message)) => (message, Some(lane.handle)),
            },
            None => (message, None),
        };

        debug!(user_id = %user_id, "Opening lane");
        let lane = self.spawn_lane(previous);
        if lane.tx.send(message).is_err() {
            warn!(user_id = %user_id, "Fresh lane rejected a message");
        }
        self.lanes.insert(user_id, lane);
    }

    /// Forget lanes whose task has exited.
    pub fn reap_finished(&mut self) -> usize {
        let before = self.lanes.len();
        self.lanes.retain(|_, lane| !lane.handle.is_finished());
        before - self.lanes.len()
    }

    /// Number of tracked lanes.
    pub fn len(&self) -> usize {
        self.lanes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }

    /// Stop accepting messages and wait for every lane to drain.
    pub async fn shutdown(self) {
        let handles: Vec<JoinHandle<()>> = self
            .lanes
            .into_values()
            .map(|lane| {
                drop(lane.tx);
                lane.handle
            })
            .collect();

        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Lane task failed: {e}");
            }
        }
    }

    fn spawn_lane(&self, previous: Option<JoinHandle<()>>) -> Lane {
        let (tx, mut rx) = mpsc::unbounded_channel::<IncomingMessage>();
        let processor = Arc::clone(&self.processor);
        let idle_timeout = self.idle_timeout;

        let handle = tokio::spawn(async move {
            if let Some(previous) = previous {
                let _ = previous.await;
            }

            loop {
                match tokio::time::timeout(idle_timeout, rx.recv()).await {
                    Ok(Some(message)) => processor.process(message).await,
                    // All senders dropped: shutdown.
                    Ok(None) => break,
                    Err(_) => {
                        rx.close();
                        while let Ok(message) = rx.try_recv() {
                            processor.process(message).await;
                        }
                        break;
                    }
                }
            }
        });

        Lane { tx, handle }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    /// Records `(user, content)` pairs; optionally sleeps per message to widen
    /// interleaving windows.
    struct Recorder {
        seen: Mutex<Vec<(String, String)>>,
        in_flight: Mutex<HashMap<String, bool>>,
        delay: Duration,
    }

    impl Recorder {
        fn new(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                seen: Mutex::new(Vec::new()),
                in_flight: Mutex::new(HashMap::new()),
                delay,
            })
        }

        fn contents_for(&self, user: &str) -> Vec<String> {
            self.seen
                .lock()
                .unwrap()
                .iter()
                .filter(|(u, _)| u == user)
                .map(|(_, c)| c.clone())
                .collect()
        }
    }

    #[async_trait]
    impl LaneProcessor for Recorder {
        async fn process(&self, message: IncomingMessage) {
            {
                let mut in_flight = self.in_flight.lock().unwrap();
                let busy = in_flight.entry(message.user_id.clone()).or_default();
                assert!(!*busy, "two messages for one user in flight");
                *busy = true;
            }
            tokio::time::sleep(self.delay).await;
            self.seen
                .lock()
                .unwrap()
                .push((message.user_id.clone(), message.content.clone()));
            self.in_flight
                .lock()
                .unwrap()
                .insert(message.user_id, false);
        }
    }

    #[tokio::test]
    async fn preserves_per_user_order() {
        let recorder = Recorder::new(Duration::from_millis(2));
        let mut lanes = UserLanes::new(recorder.clone(), Duration::from_secs(60));

        for i in 0..10 {
            lanes.dispatch(IncomingMessage::new("t", "alice", &format!("a{i}")));
            lanes.dispatch(IncomingMessage::new("t", "bob", &format!("b{i}")));
        }
        assert_eq!(lanes.len(), 2);
        lanes.shutdown().await;

        let expected_a: Vec<String> = (0..10).map(|i| format!("a{i}")).collect();
        let expected_b: Vec<String> = (0..10).map(|i| format!("b{i}")).collect();
        assert_eq!(recorder.contents_for("alice"), expected_a);
        assert_eq!(recorder.contents_for("bob"), expected_b);
    }

    #[tokio::test]
    async fn users_run_in_parallel() {
        let recorder = Recorder::new(Duration::from_millis(50));
        let mut lanes = UserLanes::new(recorder.clone(), Duration::from_secs(60));

        let started = std::time::Instant::now();
        for user in ["a", "b", "c", "d"] {
            lanes.dispatch(IncomingMessage::new("t", user, "x"));
        }
        lanes.shutdown().await;

        // Serial processing would take at least 200ms.
        assert!(started.elapsed() < Duration::from_millis(190));
        assert_eq!(recorder.seen.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn idle_lane_exits_and_is_replaced() {
        let recorder = Recorder::new(Duration::ZERO);
        let mut lanes = UserLanes::new(recorder.clone(), Duration::from_millis(20));

        lanes.dispatch(IncomingMessage::new("t", "u", "first"));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(lanes.reap_finished(), 1);
        assert!(lanes.is_empty());

        lanes.dispatch(IncomingMessage::new("t", "u", "second"));
        lanes.shutdown().await;

        assert_eq!(recorder.contents_for("u"), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn closed_lane_is_chained_without_reaping() {
        let recorder = Recorder::new(Duration::ZERO);
        let mut lanes = UserLanes::new(recorder.clone(), Duration::from_millis(20));

        lanes.dispatch(IncomingMessage::new("t", "u", "first"));
        tokio::time::sleep(Duration::from_millis(100)).await;

        // Still tracked but closed: dispatch must open a successor.
        lanes.dispatch(IncomingMessage::new("t", "u", "second"));
        lanes.dispatch(IncomingMessage::new("t", "u", "third"));
        lanes.shutdown().await;

        assert_eq!(recorder.contents_for("u"), vec!["first", "second", "third"]);
    }
}
