//! The stage worker framework.
//!
//! A stage is a queue consumer with a fixed pool of handler tasks. Work
//! flows over two bounded channels: the dispatcher fans deliveries into
//! a request queue of capacity N, handler tasks consume it, and handler
//! results land on an equally bounded cleanup queue consumed by a
//! single cleanup task that finalizes the registry update and
//! acknowledges or requeues the message.
//!
//! On receipt the worker loads the work item, refuses it if another
//! worker holds the claim or the status is terminal, and otherwise
//! writes its own `node+pid` claim through the registry before doing
//! real work. Handlers never panic across task boundaries: panics are
//! caught and become fatal outcomes.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use arca_common::constants::Status;
use arca_common::models::WorkItem;

use crate::context::Context;
use crate::queue::Message;

/// What a handler decided about one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Success: acknowledge, clear the claim, mark the item done
    /// (unless the handler already forwarded it to the next stage).
    Finish,

    /// Transient: negative-acknowledge with the given visibility delay.
    /// One minute when more requests remain to be made; two hours when
    /// waiting on external asynchronous work.
    Requeue(Duration),

    /// Permanent failure: no retry, flag for admin review, acknowledge.
    FailFatal,

    /// Failed but retryable: acknowledge; an external sweep re-enqueues
    /// the item later.
    FailRetry,
}

/// One work stage: a handler plus its queue identity and limits.
#[async_trait::async_trait]
pub trait Stage: Send + Sync + 'static {
    /// The topic this stage consumes.
    fn topic(&self) -> &'static str;

    /// Process one claimed work item. Mutations to `item` are written
    /// through by the cleanup task when the outcome is applied.
    async fn handle(&self, ctx: Arc<Context>, item: &mut WorkItem) -> Outcome;

    /// Called after the outcome has been applied.
    async fn cleanup(&self, _ctx: Arc<Context>, _item: &WorkItem, _outcome: &Outcome) {}
}

struct CleanupRequest {
    message: Message,
    item: WorkItem,
    outcome: Outcome,
}

/// Runs one stage against a message stream until the stream ends.
pub struct StageRunner {
    stage: Arc<dyn Stage>,
    ctx: Arc<Context>,
}

impl StageRunner {
    pub fn new(stage: Arc<dyn Stage>, ctx: Arc<Context>) -> Self {
        Self { stage, ctx }
    }

    /// Consume messages until the receiver closes, then drain all
    /// in-flight handlers and the cleanup queue.
    pub async fn run(self, mut messages: mpsc::Receiver<Message>) {
        let n = self.ctx.config.max_in_flight.max(1);
        let (request_tx, request_rx) = mpsc::channel::<(Message, WorkItem)>(n);
        let (cleanup_tx, cleanup_rx) = mpsc::channel::<CleanupRequest>(n);

        let request_rx = Arc::new(tokio::sync::Mutex::new(request_rx));
        let mut handler_tasks = Vec::with_capacity(n);
        for _ in 0..n {
            let stage = self.stage.clone();
            let ctx = self.ctx.clone();
            let request_rx = request_rx.clone();
            let cleanup_tx = cleanup_tx.clone();
            handler_tasks.push(tokio::spawn(async move {
                loop {
                    let next = request_rx.lock().await.recv().await;
                    let Some((message, mut item)) = next else {
                        break;
                    };
                    let outcome = run_handler(&stage, &ctx, &mut item).await;
                    if cleanup_tx
                        .send(CleanupRequest {
                            message,
                            item,
                            outcome,
                        })
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
            }));
        }
        drop(cleanup_tx);

        let cleanup_task = {
            let stage = self.stage.clone();
            let ctx = self.ctx.clone();
            tokio::spawn(async move {
                run_cleanup(stage, ctx, cleanup_rx).await;
            })
        };

        // Dispatcher: claim items and fan them into the request queue.
        while let Some(message) = messages.recv().await {
            match self.claim(&message).await {
                Claim::Taken(item) => {
                    if request_tx.send((message, item)).await.is_err() {
                        break;
                    }
                }
                Claim::Skip => message.finish().await,
                Claim::Redelivered => {}
            }
        }
        drop(request_tx);

        for task in handler_tasks {
            let _ = task.await;
        }
        let _ = cleanup_task.await;
    }

    /// Load the work item and take the lease. `Skip` means the message
    /// should be acknowledged without processing; `Redelivered` means
    /// it was already handed back to the broker.
    async fn claim(&self, message: &Message) -> Claim {
        let id = match message.work_item_id() {
            Ok(id) => id,
            Err(e) => {
                warn!(topic = self.stage.topic(), error = %e, "Dropping unreadable message");
                return Claim::Skip;
            }
        };
        let mut item = match self.ctx.registry.get_work_item(id).await {
            Ok(item) => item,
            Err(e) => {
                // Leave it to the broker's redelivery; the registry may
                // just be down.
                warn!(work_item_id = id, error = %e, "Could not load work item");
                message.requeue(Duration::from_secs(60)).await;
                return Claim::Redelivered;
            }
        };

        if item.claimed_by_other(&self.ctx.node, self.ctx.pid) {
            info!(
                work_item_id = id,
                node = %item.node,
                pid = item.pid,
                "Work item is claimed by another worker, skipping"
            );
            return Claim::Skip;
        }
        if !item.processable() {
            info!(
                work_item_id = id,
                status = %item.status,
                "Work item is not in a processable state, skipping"
            );
            return Claim::Skip;
        }

        item.claim(&self.ctx.node, self.ctx.pid);
        if !self.ctx.save_work_item(&item).await {
            message.requeue(Duration::from_secs(60)).await;
            return Claim::Redelivered;
        }
        Claim::Taken(item)
    }
}

enum Claim {
    Taken(WorkItem),
    Skip,
    Redelivered,
}

/// Run one handler under its deadline, converting panics and timeouts
/// into outcomes.
async fn run_handler(stage: &Arc<dyn Stage>, ctx: &Arc<Context>, item: &mut WorkItem) -> Outcome {
    let deadline = Duration::from_secs(ctx.config.max_processing_seconds);
    let handled = tokio::time::timeout(
        deadline,
        AssertUnwindSafe(stage.handle(ctx.clone(), item)).catch_unwind(),
    )
    .await;

    match handled {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(panic)) => {
            let detail = panic
                .downcast_ref::<String>()
                .map(String::as_str)
                .or_else(|| panic.downcast_ref::<&str>().copied())
                .unwrap_or("unknown panic");
            error!(work_item_id = item.id, panic = detail, "Handler panicked");
            item.note = format!("Internal error: {}", detail);
            Outcome::FailFatal
        }
        Err(_) => {
            warn!(
                work_item_id = item.id,
                deadline_secs = deadline.as_secs(),
                "Handler exceeded its deadline"
            );
            item.note = format!(
                "Processing exceeded the {}-second deadline",
                deadline.as_secs()
            );
            Outcome::FailRetry
        }
    }
}

/// Apply outcomes: registry finalization plus message acknowledgement.
async fn run_cleanup(
    stage: Arc<dyn Stage>,
    ctx: Arc<Context>,
    mut requests: mpsc::Receiver<CleanupRequest>,
) {
    while let Some(CleanupRequest {
        message,
        mut item,
        outcome,
    }) = requests.recv().await
    {
        match outcome {
            Outcome::Finish => {
                // A handler that forwarded the item to the next stage
                // already reset its status; respect that.
                if item.status == Status::Started {
                    item.status = Status::Success;
                }
                item.release();
                ctx.save_work_item(&item).await;
                message.finish().await;
            }
            Outcome::Requeue(delay) => {
                item.status = Status::Started;
                item.retry = true;
                ctx.save_work_item(&item).await;
                message.requeue(delay).await;
            }
            Outcome::FailFatal => {
                item.status = Status::Failed;
                item.retry = false;
                item.needs_admin_review = true;
                item.release();
                ctx.save_work_item(&item).await;
                message.finish().await;
            }
            Outcome::FailRetry => {
                item.status = Status::Failed;
                item.retry = true;
                item.release();
                ctx.save_work_item(&item).await;
                message.finish().await;
            }
        }
        stage.cleanup(ctx.clone(), &item, &outcome).await;
    }
}

/// Exponentially backed-off requeue delay, capped at two hours.
pub fn backoff_delay(attempt_number: u32) -> Duration {
    let minutes = 1u64 << attempt_number.min(7);
    Duration::from_secs((minutes * 60).min(2 * 60 * 60))
}
