use std::{collections::HashMap, sync::Mutex};

use flowline_proto::SubscriptionId;
use tokio::sync::mpsc;

type Job = Box<dyn FnOnce() + Send>;

/// The *only* thing allowed to invoke user-supplied handlers and listeners.
///
/// Each subscription gets its own lane: a task draining an unbounded channel
/// of boxed closures in arrival order. This is the "striped executor keyed
/// by subscription id" the engine's lock discipline requires, so that
/// handler invocations for a given subscription are strictly in
/// wire-arrival order while different subscriptions never block each other.
#[derive(Debug)]
pub(crate) struct CallbackExecutor {
    runtime: tokio::runtime::Handle,
    lanes: Mutex<HashMap<SubscriptionId, mpsc::UnboundedSender<Job>>>,
    listener_lane: mpsc::UnboundedSender<Job>,
}

impl CallbackExecutor {
    pub(crate) fn new(runtime: tokio::runtime::Handle) -> Self {
        let listener_lane = spawn_lane(&runtime);
        Self {
            runtime,
            lanes: Mutex::new(HashMap::new()),
            listener_lane,
        }
    }

    /// Submit a unit of work for a given subscription. Preserves per-subscription order.
    pub(crate) fn submit(&self, subscription_id: SubscriptionId, job: Job) {
        let mut lanes = self.lanes.lock().unwrap_or_else(|poison| poison.into_inner());
        let sender = lanes
            .entry(subscription_id)
            .or_insert_with(|| spawn_lane(&self.runtime));

        if sender.send(job).is_err() {
            // The lane's task panicked; respawn it so future messages aren't lost.
            let sender = spawn_lane(&self.runtime);
            let _ = sender.send(Box::new(|| {}));
            lanes.insert(subscription_id, sender);
        }
    }

    /// Submit a unit of work for connection-state listener notifications.
    pub(crate) fn submit_listener(&self, job: Job) {
        let _ = self.listener_lane.send(job);
    }

    /// Drop a subscription's lane once it is closed, so the drain task exits.
    pub(crate) fn remove_lane(&self, subscription_id: SubscriptionId) {
        self.lanes
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .remove(&subscription_id);
    }
}

fn spawn_lane(runtime: &tokio::runtime::Handle) -> mpsc::UnboundedSender<Job> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
    runtime.spawn(async move {
        while let Some(job) = rx.recv().await {
            job();
        }
    });
    tx
}
