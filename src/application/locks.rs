use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One async mutex per vendor. Every ledger mutation for a vendor runs while
/// holding that vendor's guard, so the read-check-write sequence of a
/// withdrawal submission cannot interleave with another mutation. Entries
/// exist only while some task holds or waits for them.
#[derive(Default)]
pub struct VendorLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

/// Exclusive access to one vendor's ledger. Dropping it releases the lock and
/// removes the vendor's entry when nobody else is waiting.
pub struct VendorGuard<'a> {
    locks: &'a VendorLocks,
    vendor_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for VendorGuard<'_> {
    fn drop(&mut self) {
        // Release first so the map holds the only reference when idle
        self.guard.take();
        let mut locks = self.locks.table();
        if locks
            .get(&self.vendor_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.vendor_id);
        }
    }
}

impl VendorLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> MutexGuard<'_, HashMap<String, Arc<AsyncMutex<()>>>> {
        self.locks.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Wait for exclusive access to a vendor's ledger.
    pub async fn acquire(&self, vendor_id: &str) -> VendorGuard<'_> {
        let lock = self
            .table()
            .entry(vendor_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();
        VendorGuard {
            locks: self,
            vendor_id: vendor_id.to_string(),
            guard: Some(lock.lock_owned().await),
        }
    }

    /// Number of vendors whose lock is currently held or awaited.
    pub fn len(&self) -> usize {
        self.table().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
