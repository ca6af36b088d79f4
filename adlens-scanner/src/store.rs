//! The storage collaborator a scan pass reports to.

use crate::error::Result;
use crate::model::{AdRecord, Target};

/// Receives one batch of ads and their flattened targets per completed pass.
pub trait AdStore {
    /// Scanning is skipped entirely while the monitor is off.
    fn is_monitor_enabled(&self) -> Result<bool>;
    fn store_ads(&mut self, ads: &[AdRecord]) -> Result<()>;
    fn store_targets(&mut self, targets: &[Target]) -> Result<()>;

    /// Stores one pass's output. Stores that can write atomically should
    /// override this so a failure leaves nothing behind.
    fn store_batch(&mut self, ads: &[AdRecord], targets: &[Target]) -> Result<()> {
        self.store_ads(ads)?;
        self.store_targets(targets)
    }
}

impl<T: AdStore + ?Sized> AdStore for &mut T {
    fn is_monitor_enabled(&self) -> Result<bool> {
        (**self).is_monitor_enabled()
    }

    fn store_ads(&mut self, ads: &[AdRecord]) -> Result<()> {
        (**self).store_ads(ads)
    }

    fn store_targets(&mut self, targets: &[Target]) -> Result<()> {
        (**self).store_targets(targets)
    }

    fn store_batch(&mut self, ads: &[AdRecord], targets: &[Target]) -> Result<()> {
        (**self).store_batch(ads, targets)
    }
}

/// In-process store, mostly useful for tests and dry runs.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    pub monitor_enabled: bool,
    pub ads: Vec<AdRecord>,
    pub targets: Vec<Target>,
    /// Number of `store_ads` calls, one per emitting pass.
    pub batches: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            monitor_enabled: true,
            ads: Vec::new(),
            targets: Vec::new(),
            batches: 0,
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn disabled() -> Self {
        Self {
            monitor_enabled: false,
            ..Self::default()
        }
    }
}

impl AdStore for MemoryStore {
    fn is_monitor_enabled(&self) -> Result<bool> {
        Ok(self.monitor_enabled)
    }

    fn store_ads(&mut self, ads: &[AdRecord]) -> Result<()> {
        self.batches += 1;
        self.ads.extend_from_slice(ads);
        Ok(())
    }

    fn store_targets(&mut self, targets: &[Target]) -> Result<()> {
        self.targets.extend_from_slice(targets);
        Ok(())
    }
}
