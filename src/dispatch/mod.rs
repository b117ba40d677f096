//! Dispatcher
//!
//! Matches logged tokens against subscriber filters and hands matches to a
//! [`DeliverySink`]. Two paths share one delivered set per subscriber:
//!
//! - live: each token the poller persists, for every subscriber that joined
//!   before it was discovered
//! - replay: the whole TokenLog for one subscriber, on request
//!
//! Every subscriber has its own delivery session: a queue drained by one task,
//! so deliveries to one chat stay in order while a long replay for one
//! subscriber never holds up another. A token is marked delivered once a
//! delivery attempt was made, whether or not the sink reported success.
//! Neither path ever delivers a marked token.

pub mod format;
mod progress;
pub mod sink;

pub use format::{format_console_alert, format_token_alert, html_escape};
pub use sink::{ConsoleSink, DeliverySink};

use futures::stream::{FuturesUnordered, StreamExt};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Semaphore};

use crate::errors::ScoutError;
use crate::logger::{self, LogTag};
use crate::profiles::EnrichedToken;
use crate::shutdown::ShutdownSignal;
use crate::storage::Database;
use crate::subscriptions::{Subscriber, SubscriberId, SubscriptionRegistry};
use progress::DispatchProgress;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    /// Already in the delivered set
    Skipped,
    Delivered,
    Failed,
}

/// Counts for one dispatch pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl DispatchReport {
    /// Tokens a delivery was attempted for
    pub fn attempted(&self) -> usize {
        self.delivered + self.failed
    }

    fn record(&mut self, attempt: Attempt) {
        match attempt {
            Attempt::Skipped => self.skipped += 1,
            Attempt::Delivered => self.delivered += 1,
            Attempt::Failed => self.failed += 1,
        }
    }

    fn merge(&mut self, other: DispatchReport) {
        self.delivered += other.delivered;
        self.failed += other.failed;
        self.skipped += other.skipped;
    }
}

type LiveOutcome = Result<Option<Attempt>, ScoutError>;

enum SessionJob {
    Live {
        token: Arc<EnrichedToken>,
        done: oneshot::Sender<LiveOutcome>,
    },
    Replay {
        done: oneshot::Sender<Result<DispatchReport, ScoutError>>,
    },
}

/// Handle to a live dispatch that is settling in the background
pub struct LiveDispatch {
    sequence: u64,
    subscribers: usize,
    report: oneshot::Receiver<Result<DispatchReport, ScoutError>>,
}

impl LiveDispatch {
    /// Subscribers the token was queued for
    pub fn subscribers(&self) -> usize {
        self.subscribers
    }

    /// Wait until every queued subscriber has been handled
    pub async fn wait(self) -> Result<DispatchReport, ScoutError> {
        match self.report.await {
            Ok(result) => result,
            Err(_) => Err(ScoutError::Delivery(format!(
                "Dispatch of token #{} was abandoned",
                self.sequence
            ))),
        }
    }
}

struct DispatchCore {
    registry: Arc<SubscriptionRegistry>,
    sink: Arc<dyn DeliverySink>,
    delivery_slots: Semaphore,
    sessions: Mutex<HashMap<SubscriberId, mpsc::UnboundedSender<SessionJob>>>,
    progress: Mutex<DispatchProgress>,
}

pub struct Dispatcher {
    core: Arc<DispatchCore>,
}

impl Dispatcher {
    /// `max_concurrent_deliveries` bounds sink calls across all subscribers
    pub fn new(
        registry: Arc<SubscriptionRegistry>,
        sink: Arc<dyn DeliverySink>,
        max_concurrent_deliveries: usize,
    ) -> Self {
        Self {
            core: Arc::new(DispatchCore {
                registry,
                sink,
                delivery_slots: Semaphore::new(max_concurrent_deliveries.max(1)),
                sessions: Mutex::new(HashMap::new()),
                progress: Mutex::new(DispatchProgress::default()),
            }),
        }
    }

    /// Live path: queue one freshly logged token for every subscriber that
    /// joined before it was discovered
    ///
    /// Returns as soon as the token is queued. The dispatch watermark advances
    /// once every queued subscriber has been handled.
    pub fn dispatch_new(&self, token: &EnrichedToken) -> Result<LiveDispatch, ScoutError> {
        let candidates: Vec<SubscriberId> = self
            .core
            .registry
            .active_subscribers()?
            .into_iter()
            .filter(|s| token.discovery_sequence > s.joined_after_sequence)
            .map(|s| s.id)
            .collect();

        self.core.progress.lock().begin(token.discovery_sequence);

        let token = Arc::new(token.clone());
        let mut pending = Vec::with_capacity(candidates.len());
        for id in candidates {
            let (done, outcome) = oneshot::channel();
            self.core.submit(
                id,
                SessionJob::Live {
                    token: token.clone(),
                    done,
                },
            );
            pending.push((id, outcome));
        }

        let subscribers = pending.len();
        let (report_tx, report) = oneshot::channel();
        tokio::spawn(self.core.clone().settle_live(token.clone(), pending, report_tx));

        Ok(LiveDispatch {
            sequence: token.discovery_sequence,
            subscribers,
            report,
        })
    }

    /// Replay path: deliver every logged token matching the subscriber's
    /// filter that it has not been sent yet, in discovery order
    ///
    /// Runs in the subscriber's session after anything already queued for it.
    pub async fn replay(&self, id: SubscriberId) -> Result<DispatchReport, ScoutError> {
        self.core.registry.get(id)?;

        let (done, outcome) = oneshot::channel();
        self.core.submit(id, SessionJob::Replay { done });
        match outcome.await {
            Ok(result) => result,
            Err(_) => Err(ScoutError::Delivery(format!(
                "Replay for subscriber {} was abandoned",
                id
            ))),
        }
    }

    /// Drop a subscriber's session; queued work still drains
    pub fn close_session(&self, id: SubscriberId) {
        self.core.sessions.lock().remove(&id);
    }

    /// Re-run the live path for tokens logged after the dispatch watermark
    ///
    /// Covers tokens persisted right before a crash that never reached
    /// the live path, and live dispatches that failed last session.
    pub async fn catch_up(&self) -> Result<DispatchReport, ScoutError> {
        let watermark = self.core.db().get_dispatch_watermark()?;
        let pending = self.core.db().tokens_after(watermark)?;
        if pending.is_empty() {
            return Ok(DispatchReport::default());
        }

        logger::info(
            LogTag::Dispatch,
            &format!(
                "Catching up {} token(s) logged after #{}",
                pending.len(),
                watermark
            ),
        );

        let mut queued = Vec::with_capacity(pending.len());
        for token in &pending {
            queued.push(self.dispatch_new(token)?);
        }

        let mut report = DispatchReport::default();
        for live in queued {
            report.merge(live.wait().await?);
        }
        Ok(report)
    }

    /// Consume poller notifications until shutdown or the channel closes
    ///
    /// When the channel closes, dispatches still settling are awaited first.
    pub async fn run(
        self: Arc<Self>,
        mut notifications: mpsc::Receiver<EnrichedToken>,
        shutdown: ShutdownSignal,
    ) {
        if let Err(e) = self.catch_up().await {
            logger::error(LogTag::Dispatch, &format!("Startup catch-up failed: {}", e));
        }

        // Failures are logged where they settle
        let mut settling = FuturesUnordered::new();

        loop {
            tokio::select! {
                _ = shutdown.wait() => break,
                Some(_) = settling.next(), if !settling.is_empty() => {}
                token = notifications.recv() => {
                    let Some(token) = token else {
                        while settling.next().await.is_some() {}
                        break;
                    };
                    match self.dispatch_new(&token) {
                        Ok(live) => settling.push(live.wait()),
                        Err(e) => logger::error(
                            LogTag::Dispatch,
                            &format!(
                                "Dispatch of token #{} {} failed: {}",
                                token.discovery_sequence, token.token_address, e
                            ),
                        ),
                    }
                }
            }
        }

        logger::info(LogTag::Dispatch, "Dispatcher stopped");
    }
}

impl DispatchCore {
    fn db(&self) -> &Arc<Database> {
        self.registry.database()
    }

    /// Queue a job on the subscriber's session, starting one if needed
    fn submit(self: &Arc<Self>, id: SubscriberId, job: SessionJob) {
        let mut sessions = self.sessions.lock();
        let job = match sessions.get(&id) {
            Some(queue) => match queue.send(job) {
                Ok(()) => return,
                // Session task is gone; start a fresh one
                Err(mpsc::error::SendError(job)) => job,
            },
            None => job,
        };

        let (queue, jobs) = mpsc::unbounded_channel();
        // The receiver is alive inside the new task, so this cannot fail
        let _ = queue.send(job);
        sessions.insert(id, queue);
        tokio::spawn(self.clone().run_session(id, jobs));
    }

    async fn run_session(
        self: Arc<Self>,
        id: SubscriberId,
        mut jobs: mpsc::UnboundedReceiver<SessionJob>,
    ) {
        while let Some(job) = jobs.recv().await {
            match job {
                SessionJob::Live { token, done } => {
                    let _ = done.send(self.deliver_live(id, &token).await);
                }
                SessionJob::Replay { done } => {
                    let _ = done.send(self.replay_now(id).await);
                }
            }
        }
        logger::debug(
            LogTag::Dispatch,
            &format!("Delivery session for subscriber {} closed", id),
        );
    }

    async fn settle_live(
        self: Arc<Self>,
        token: Arc<EnrichedToken>,
        pending: Vec<(SubscriberId, oneshot::Receiver<LiveOutcome>)>,
        report_tx: oneshot::Sender<Result<DispatchReport, ScoutError>>,
    ) {
        let mut report = DispatchReport::default();
        let mut failure: Option<ScoutError> = None;
        for (id, outcome) in pending {
            match outcome.await {
                Ok(Ok(Some(attempt))) => report.record(attempt),
                Ok(Ok(None)) => {}
                Ok(Err(e)) => {
                    failure.get_or_insert(e);
                }
                Err(_) => {
                    failure.get_or_insert(ScoutError::Delivery(format!(
                        "Delivery session for subscriber {} ended early",
                        id
                    )));
                }
            }
        }

        let advance_to = self
            .progress
            .lock()
            .finish(token.discovery_sequence, failure.is_none());
        if let Some(sequence) = advance_to {
            if let Err(e) = self.db().advance_dispatch_watermark(sequence) {
                failure.get_or_insert(e.into());
            }
        }

        let result = match failure {
            None => {
                if report.attempted() > 0 {
                    logger::debug(
                        LogTag::Dispatch,
                        &format!(
                            "Token #{} {} dispatched: delivered={} failed={}",
                            token.discovery_sequence,
                            token.token_address,
                            report.delivered,
                            report.failed
                        ),
                    );
                }
                Ok(report)
            }
            Some(e) => {
                let held = self.progress.lock().held_at();
                logger::error(
                    LogTag::Dispatch,
                    &format!(
                        "Dispatch of token #{} {} failed: {}{}",
                        token.discovery_sequence,
                        token.token_address,
                        e,
                        held.map(|seq| format!(" (watermark held before #{})", seq))
                            .unwrap_or_default()
                    ),
                );
                Err(e)
            }
        };
        let _ = report_tx.send(result);
    }

    /// `None` when the subscriber is gone or its current filter rejects the token
    async fn deliver_live(&self, id: SubscriberId, token: &EnrichedToken) -> LiveOutcome {
        // Re-read inside the session so filter changes made meanwhile apply
        let subscriber = match self.registry.get(id) {
            Ok(subscriber) => subscriber,
            Err(ScoutError::UnknownSubscriber(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        if !subscriber.filter.matches(token) {
            return Ok(None);
        }

        self.attempt(&subscriber, token).await.map(Some)
    }

    async fn replay_now(&self, id: SubscriberId) -> Result<DispatchReport, ScoutError> {
        let subscriber = self.registry.get(id)?;
        let delivered = self.db().delivered_addresses(id.0)?;

        let mut report = DispatchReport::default();
        for token in self.db().tokens_ordered()? {
            if !subscriber.filter.matches(&token) {
                continue;
            }
            if delivered.contains(&token.token_address) {
                report.skipped += 1;
                continue;
            }
            report.record(self.attempt(&subscriber, &token).await?);
        }

        logger::info(
            LogTag::Dispatch,
            &format!(
                "Replay for subscriber {} ({}): delivered={} failed={} already sent={}",
                id, subscriber.filter, report.delivered, report.failed, report.skipped
            ),
        );
        Ok(report)
    }

    /// Only called from the subscriber's own session
    async fn attempt(
        &self,
        subscriber: &Subscriber,
        token: &EnrichedToken,
    ) -> Result<Attempt, ScoutError> {
        if self.db().is_delivered(subscriber.id.0, &token.token_address)? {
            return Ok(Attempt::Skipped);
        }

        let message = self.sink.render(token);
        let delivery = {
            let _slot = self
                .delivery_slots
                .acquire()
                .await
                .map_err(|_| ScoutError::Delivery("Delivery slots closed".to_string()))?;
            self.sink.deliver(subscriber.id, &message).await
        };
        let attempt = match delivery {
            Ok(()) => Attempt::Delivered,
            Err(e) => {
                logger::warning(
                    LogTag::Dispatch,
                    &format!(
                        "Delivery of {} to subscriber {} via {} failed: {}",
                        token.token_address,
                        subscriber.id,
                        self.sink.name(),
                        e
                    ),
                );
                Attempt::Failed
            }
        };

        self.db()
            .mark_delivered(subscriber.id.0, &token.token_address)?;
        Ok(attempt)
    }
}
