use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};

/// Handle to an in-flight operation; every clone resolves to the same value.
pub type Flight<T> = Shared<BoxFuture<'static, T>>;

struct Slot<T> {
    generation: u64,
    pending: Option<Flight<T>>,
}

/// At most one in-flight operation at a time, shared by all concurrent callers.
///
/// The first caller starts the operation; callers arriving while it runs get
/// a clone of the same handle. The slot empties itself in the same poll that
/// completes the operation, success or failure, so the next caller starts a
/// fresh one.
pub struct SingleFlight<T> {
    slot: Arc<Mutex<Slot<T>>>,
}

impl<T> SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Mutex::new(Slot {
                generation: 0,
                pending: None,
            })),
        }
    }

    /// Join the in-flight operation, or start one with `start`.
    ///
    /// `start` is only invoked when nothing is in flight.
    pub fn get_or_start<F, Fut>(&self, start: F) -> Flight<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let mut slot = lock(&self.slot);
        if let Some(ref pending) = slot.pending {
            return pending.clone();
        }

        slot.generation += 1;
        let generation = slot.generation;
        let shared_slot = Arc::clone(&self.slot);
        let operation = start();

        let flight = async move {
            let output = operation.await;
            let mut slot = lock(&shared_slot);
            if slot.generation == generation {
                slot.pending = None;
            }
            output
        }
        .boxed()
        .shared();

        slot.pending = Some(flight.clone());
        flight
    }

    pub fn in_flight(&self) -> bool {
        lock(&self.slot).pending.is_some()
    }
}

impl<T> Default for SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(slot: &Mutex<Slot<T>>) -> MutexGuard<'_, Slot<T>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}
