//! Revision-ordered delivery of render results.
//!
//! One synchronizer serves one editing session. Edits may arrive faster than
//! rendering completes; superseding is the back-pressure strategy. A newer
//! snapshot never queues behind an older one, and a result is delivered only
//! while it is still the highest revision accepted so far. Stale results are
//! discarded silently; they are an expected condition, not an error.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicU64, Ordering},
};

use metrics::counter;
use tokio::sync::watch;
use tracing::{trace, warn};

use crate::application::render::types::{RenderResult, RenderService};
use crate::domain::document::{DocumentSnapshot, Revision};

type DeliveryCallback = Box<dyn Fn(&RenderResult) + Send + Sync>;

/// Session coordinator between a host shell and the render pipeline.
pub struct RenderSynchronizer {
    service: Arc<dyn RenderService>,
    next_revision: AtomicU64,
    latest_accepted: Arc<AtomicU64>,
    delivery: Arc<DeliveryChannel>,
}

impl RenderSynchronizer {
    pub fn new(service: Arc<dyn RenderService>) -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            service,
            next_revision: AtomicU64::new(0),
            latest_accepted: Arc::new(AtomicU64::new(0)),
            delivery: Arc::new(DeliveryChannel {
                tx,
                last_delivered: Mutex::new(0),
                callback: None,
            }),
        }
    }

    /// Install a delivery callback, invoked at most once per delivered
    /// revision. Must be called before the first submission.
    pub fn with_delivery_callback(
        mut self,
        callback: impl Fn(&RenderResult) + Send + Sync + 'static,
    ) -> Self {
        let delivery = Arc::get_mut(&mut self.delivery)
            .expect("delivery callback must be installed before submissions");
        delivery.callback = Some(Box::new(callback));
        self
    }

    /// Observe deliveries. Each feed sees the monotonic sequence of delivered
    /// results; a slow consumer only ever misses intermediate revisions,
    /// never the newest one.
    pub fn subscribe(&self) -> RenderFeed {
        RenderFeed {
            rx: self.delivery.tx.subscribe(),
        }
    }

    /// Record one host-shell edit: bumps the revision by exactly one and
    /// schedules a render of the new snapshot.
    pub fn submit_edit(&self, text: impl Into<String>) -> Revision {
        let revision = Revision::new(self.next_revision.fetch_add(1, Ordering::SeqCst) + 1);
        self.submit_snapshot(DocumentSnapshot::new(text, revision));
        revision
    }

    /// Schedule a render for a snapshot whose revision the host shell manages
    /// itself. Snapshots older than one already accepted are rendered at most
    /// opportunistically and never delivered.
    pub fn submit_snapshot(&self, snapshot: DocumentSnapshot) {
        let revision = snapshot.revision.get();
        self.latest_accepted.fetch_max(revision, Ordering::SeqCst);

        let service = Arc::clone(&self.service);
        let latest_accepted = Arc::clone(&self.latest_accepted);
        let delivery = Arc::clone(&self.delivery);

        tokio::spawn(async move {
            if latest_accepted.load(Ordering::SeqCst) > revision {
                trace!(
                    target = "application::render::synchronizer",
                    revision, "Snapshot superseded before rendering started"
                );
                counter!("anteprima_render_superseded_total").increment(1);
                return;
            }

            let rendered =
                tokio::task::spawn_blocking(move || service.render(&snapshot)).await;

            match rendered {
                Ok(result) => delivery.deliver(result, &latest_accepted),
                Err(err) => {
                    // A panicking render must not take the session down; the
                    // next edit simply renders from scratch.
                    warn!(
                        target = "application::render::synchronizer",
                        revision,
                        error = %err,
                        "Render task failed; result dropped"
                    );
                }
            }
        });
    }

    /// Most recently delivered result, if any revision has completed yet.
    pub fn latest_render_result(&self) -> Option<RenderResult> {
        self.delivery.tx.borrow().clone()
    }
}

/// Consumer handle over the delivery channel.
pub struct RenderFeed {
    rx: watch::Receiver<Option<RenderResult>>,
}

impl RenderFeed {
    pub fn latest(&self) -> Option<RenderResult> {
        self.rx.borrow().clone()
    }

    /// Wait for the next delivery after the current state. Returns `None`
    /// once the synchronizer is gone.
    pub async fn next_delivery(&mut self) -> Option<RenderResult> {
        self.rx.changed().await.ok()?;
        self.rx.borrow_and_update().clone()
    }
}

struct DeliveryChannel {
    tx: watch::Sender<Option<RenderResult>>,
    last_delivered: Mutex<u64>,
    callback: Option<DeliveryCallback>,
}

impl DeliveryChannel {
    fn deliver(&self, result: RenderResult, latest_accepted: &AtomicU64) {
        let mut last_delivered = self
            .last_delivered
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let revision = result.revision.get();
        if revision < latest_accepted.load(Ordering::SeqCst) || revision <= *last_delivered {
            trace!(
                target = "application::render::synchronizer",
                revision, "Stale render result discarded"
            );
            counter!("anteprima_render_superseded_total").increment(1);
            return;
        }

        *last_delivered = revision;
        if let Some(callback) = &self.callback {
            callback(&result);
        }
        counter!("anteprima_render_delivered_total").increment(1);
        let _ = self.tx.send(Some(result));
    }
}
