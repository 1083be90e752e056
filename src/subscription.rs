// Subscription - Realtime collection adapter
// Mirrors one live store collection into a typed in-memory list and tracks
// its loading / error state:
//
//   Idle ──start──▶ Loading ──snapshot──▶ Ready ◀─┐
//                      │                     │     │ snapshot
//                      └──error──▶ Failed    └─────┘
//
// stop() detaches from the store. Every listener handed to the store carries
// the generation it was created for, and deliveries from an older generation
// are dropped, so a store that keeps calling a removed listener cannot change
// state after teardown.

use crate::error::SubscriptionError;
use crate::medicine::Medicine;
use crate::store::{DocumentStore, ListenerRegistration, SnapshotListener, StoreEvent};
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Loading,
    Ready,
    Failed,
}

/// What the presentation layer sees for one collection.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct CollectionState {
    pub data: Option<Vec<Medicine>>,
    pub loading: bool,
    pub error: Option<SubscriptionError>,
}

/// Called after every accepted state transition.
///
/// Runs while the subscription's state is locked: it must not call back
/// into the subscription.
pub type ChangeHook = Arc<dyn Fn(&CollectionState) + Send + Sync>;

struct Shared {
    phase: Phase,
    state: CollectionState,
    generation: u64,
    live: bool,
    hook: Option<ChangeHook>,
}

impl Shared {
    fn notify(&self) {
        if let Some(hook) = &self.hook {
            hook(&self.state);
        }
    }
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// CollectionSubscription - Live view of one store collection
pub struct CollectionSubscription {
    store: Option<Arc<dyn DocumentStore>>,
    target: Option<String>,
    shared: Arc<Mutex<Shared>>,
    registration: Option<ListenerRegistration>,
}

impl CollectionSubscription {
    /// A subscription that is not yet started.
    ///
    /// `store` or `target` being `None` means there is no live query; such a
    /// subscription settles on an empty list as soon as it starts.
    pub fn new(store: Option<Arc<dyn DocumentStore>>, target: Option<String>) -> Self {
        Self {
            store,
            target,
            shared: Arc::new(Mutex::new(Shared {
                phase: Phase::Idle,
                state: CollectionState::default(),
                generation: 0,
                live: false,
                hook: None,
            })),
            registration: None,
        }
    }

    /// Builder pattern: install a change hook.
    pub fn with_on_change<F>(self, hook: F) -> Self
    where
        F: Fn(&CollectionState) + Send + Sync + 'static,
    {
        lock(&self.shared).hook = Some(Arc::new(hook));
        self
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn phase(&self) -> Phase {
        lock(&self.shared).phase
    }

    /// Snapshot of the observable state.
    pub fn state(&self) -> CollectionState {
        lock(&self.shared).state.clone()
    }

    pub fn is_live(&self) -> bool {
        lock(&self.shared).live
    }

    /// Subscribe (again). Any current subscription is torn down first.
    pub fn start(&mut self) {
        self.detach();

        let generation = {
            let mut shared = lock(&self.shared);
            shared.generation += 1;
            shared.live = true;
            shared.phase = Phase::Loading;
            shared.state.loading = true;

            if self.store.is_none() || self.target.is_none() {
                debug!("no live query, settling on an empty list");
                shared.phase = Phase::Ready;
                shared.state = CollectionState {
                    data: Some(Vec::new()),
                    loading: false,
                    error: None,
                };
            }
            shared.notify();

            if shared.phase == Phase::Ready {
                return;
            }
            shared.generation
        };

        let (Some(store), Some(target)) = (self.store.clone(), self.target.clone()) else {
            return;
        };

        debug!(collection = %target, generation, "subscribing");
        let listener = make_listener(Arc::downgrade(&self.shared), generation, target.clone());
        self.registration = Some(store.listen(&target, listener));
    }

    /// Unsubscribe. No notification reaches this subscription afterwards,
    /// and the last state (data and error) is kept as it was.
    pub fn stop(&mut self) {
        self.detach();
    }

    /// Point the subscription at another collection. The old subscription
    /// is torn down before the new one is established.
    pub fn set_target(&mut self, target: Option<String>) {
        if target == self.target {
            return;
        }
        debug!(from = ?self.target, to = ?target, "retargeting subscription");
        self.detach();
        self.target = target;
        self.start();
    }

    /// Tear down and subscribe again (user-triggered retry).
    pub fn retry(&mut self) {
        self.start();
    }

    fn detach(&mut self) {
        {
            let mut shared = lock(&self.shared);
            if shared.live {
                shared.generation += 1;
                shared.live = false;
                shared.state.loading = false;
                shared.phase = Phase::Idle;
            }
        }
        if let Some(registration) = self.registration.take() {
            registration.remove();
        }
    }
}

fn make_listener(
    shared: std::sync::Weak<Mutex<Shared>>,
    generation: u64,
    collection: String,
) -> SnapshotListener {
    Arc::new(move |event: StoreEvent| {
        let Some(shared) = shared.upgrade() else {
            return;
        };
        let mut shared = lock(&shared);

        if !shared.live || shared.generation != generation {
            trace!(collection = %collection, generation, "dropping stale notification");
            return;
        }
        if shared.phase == Phase::Failed {
            trace!(collection = %collection, "subscription failed, ignoring notification");
            return;
        }

        match event {
            StoreEvent::Snapshot(documents) => {
                debug!(collection = %collection, count = documents.len(), "snapshot received");
                shared.state.data = Some(documents.into_iter().map(Medicine::from_document).collect());
                shared.state.loading = false;
                shared.state.error = None;
                shared.phase = Phase::Ready;
            }
            StoreEvent::Error(err) => {
                error!(collection = %collection, error = %err, "realtime collection failed");
                shared.state.loading = false;
                shared.state.error = Some(err);
                shared.phase = Phase::Failed;
            }
        }
        shared.notify();
    })
}

impl Drop for CollectionSubscription {
    fn drop(&mut self) {
        self.detach();
    }
}

impl fmt::Debug for CollectionSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shared = lock(&self.shared);
        f.debug_struct("CollectionSubscription")
            .field("target", &self.target)
            .field("phase", &shared.phase)
            .field("generation", &shared.generation)
            .finish()
    }
}
