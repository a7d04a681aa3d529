use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::WalletId;

/// One async mutex per wallet id.
///
/// Every balance-changing operation holds the guards of all wallets it
/// touches across its re-check and commit. Guards are always taken in
/// ascending wallet id order, so two operations over the same pair of
/// wallets can never wait on each other in a cycle.
#[derive(Default)]
pub struct WalletLocks {
    locks: Mutex<HashMap<WalletId, Arc<Mutex<()>>>>,
}

impl WalletLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock every wallet in `ids`. Duplicates are locked once.
    pub async fn lock(&self, ids: &[WalletId]) -> Vec<OwnedMutexGuard<()>> {
        let mut ordered = ids.to_vec();
        ordered.sort();
        ordered.dedup();

        let handles: Vec<Arc<Mutex<()>>> = {
            let mut locks = self.locks.lock().await;
            ordered
                .iter()
                .map(|id| Arc::clone(locks.entry(*id).or_default()))
                .collect()
        };

        let mut guards = Vec::with_capacity(handles.len());
        for handle in handles {
            guards.push(handle.lock_owned().await);
        }
        guards
    }
}
