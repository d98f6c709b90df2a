use std::{
    future::Future,
    sync::{Mutex, MutexGuard},
    time::Duration,
};

use solana_sdk::pubkey::Pubkey;
use tokio::{task::JoinHandle, time::sleep};
use tracing::debug;

#[derive(Debug)]
struct ScheduledRefresh {
    owner: Pubkey,
    handle: JoinHandle<()>,
}

/// Holds at most one pending refresh, tied to the owner it refreshes.
///
/// Scheduling replaces and aborts the pending task. A tick that reschedules
/// itself must do so as its last step.
#[derive(Debug, Default)]
pub struct RefreshScheduler {
    pending: Mutex<Option<ScheduledRefresh>>,
}

impl RefreshScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<ScheduledRefresh>> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Runs `task` after `delay` unless cancelled or replaced first.
    pub fn schedule<F>(&self, owner: Pubkey, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            sleep(delay).await;
            task.await;
        });
        let previous = self.lock().replace(ScheduledRefresh { owner, handle });
        if let Some(previous) = previous {
            previous.handle.abort();
        }
        debug!("Next balance refresh for {} in {:?}", owner, delay);
    }

    pub fn cancel(&self) {
        if let Some(previous) = self.lock().take() {
            debug!("Cancelled balance refresh for {}", previous.owner);
            previous.handle.abort();
        }
    }

    /// Owner of the pending refresh, if one has not run yet.
    pub fn scheduled_owner(&self) -> Option<Pubkey> {
        self.lock()
            .as_ref()
            .filter(|pending| !pending.handle.is_finished())
            .map(|pending| pending.owner)
    }

    pub fn is_scheduled(&self) -> bool {
        self.scheduled_owner().is_some()
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}
