// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-flight primitive: concurrent callers share one in-flight operation.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};

use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;

type Flight<T, E> = Shared<BoxFuture<'static, Result<T, E>>>;

struct Slot<T, E> {
    generation: u64,
    pending: Option<(u64, Flight<T, E>)>,
}

/// A guarded "in-flight operation" slot with subscribe-and-await semantics.
///
/// The first caller of [`SingleFlight::run`] starts the operation; callers
/// arriving while it is pending await the same future and observe the same
/// outcome. The slot is emptied when the operation finishes, fails, panics, or
/// is dropped, so the next call after that starts fresh.
pub struct SingleFlight<T, E> {
    slot: Arc<Mutex<Slot<T, E>>>,
}

impl<T, E> Default for SingleFlight<T, E> {
    fn default() -> Self {
        Self { slot: Arc::new(Mutex::new(Slot { generation: 0, pending: None })) }
    }
}

impl<T, E> SingleFlight<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an operation is currently pending.
    pub fn in_flight(&self) -> bool {
        self.slot.lock().pending.is_some()
    }

    /// Join the pending operation, or start `op` if none is pending.
    ///
    /// `op` is only invoked when this call starts a new operation. It must not
    /// call back into the same `SingleFlight`.
    pub async fn run<F, Fut>(&self, op: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let flight = {
            let mut slot = self.slot.lock();
            match &slot.pending {
                Some((_, flight)) => flight.clone(),
                None => {
                    slot.generation = slot.generation.wrapping_add(1);
                    let guard = ClearOnDrop { slot: Arc::downgrade(&self.slot), id: slot.generation };
                    let fut = op();
                    let flight = async move {
                        // A panic leaves the shared future poisoned, so the slot
                        // is emptied before the unwind resumes.
                        let outcome = AssertUnwindSafe(fut).catch_unwind().await;
                        drop(guard);
                        match outcome {
                            Ok(result) => result,
                            Err(panic) => std::panic::resume_unwind(panic),
                        }
                    }
                    .boxed()
                    .shared();
                    slot.pending = Some((slot.generation, flight.clone()));
                    flight
                }
            }
        };
        flight.await
    }
}

/// Empties the slot when the operation it belongs to completes or is dropped.
struct ClearOnDrop<T, E> {
    slot: Weak<Mutex<Slot<T, E>>>,
    id: u64,
}

impl<T, E> Drop for ClearOnDrop<T, E> {
    fn drop(&mut self) {
        let Some(slot) = self.slot.upgrade() else {
            return;
        };
        let mut slot = slot.lock();
        if matches!(&slot.pending, Some((id, _)) if *id == self.id) {
            slot.pending = None;
        }
    }
}

#[cfg(test)]
#[path = "flight_tests.rs"]
mod tests;
