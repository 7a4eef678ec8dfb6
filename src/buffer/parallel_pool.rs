use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use log::info;

use crate::common::{BedrockError, PageId, Result};
use crate::storage::disk::DiskManager;
use crate::storage::LogManager;

use super::{BufferPoolInstance, FrameHeader, ReadPageGuard, WritePageGuard};

/// A pool of independent buffer pool instances sharing one disk manager
/// and one log manager.
///
/// Page IDs are striped across the instances: page `p` belongs to instance
/// `p % N`, and instance `k` only ever allocates IDs congruent to `k`.
/// Operations on pages in different stripes touch different latches and
/// proceed in parallel; the only shared mutable state here is the
/// round-robin creation cursor.
pub struct ParallelBufferPool {
    instances: Vec<BufferPoolInstance>,
    /// Where the next `new_page` starts probing
    next_instance: AtomicUsize,
}

impl ParallelBufferPool {
    /// Creates `num_instances` instances of `pool_size` frames each.
    pub fn new(
        num_instances: usize,
        pool_size: usize,
        disk_manager: Arc<DiskManager>,
        log_manager: Option<Arc<LogManager>>,
    ) -> Self {
        assert!(num_instances > 0, "a pool needs at least one instance");

        let instances = (0..num_instances)
            .map(|i| {
                BufferPoolInstance::new_sharded(
                    pool_size,
                    num_instances as u32,
                    i as u32,
                    Arc::clone(&disk_manager),
                    log_manager.clone(),
                )
            })
            .collect();
        info!(
            "parallel pool: {} instances x {} frames",
            num_instances, pool_size
        );

        Self {
            instances,
            next_instance: AtomicUsize::new(0),
        }
    }

    /// The instance responsible for `page_id`.
    fn instance_for(&self, page_id: PageId) -> &BufferPoolInstance {
        &self.instances[page_id.as_usize() % self.instances.len()]
    }

    /// Direct access to one shard, mainly for introspection.
    pub fn instance(&self, index: usize) -> &BufferPoolInstance {
        &self.instances[index]
    }

    pub fn num_instances(&self) -> usize {
        self.instances.len()
    }

    /// Aggregate frame count across all instances.
    pub fn pool_size(&self) -> usize {
        self.instances.len() * self.instances[0].pool_size()
    }

    /// Fetches `page_id` from its owning instance, pinned.
    pub fn fetch_page(&self, page_id: PageId) -> Result<Arc<FrameHeader>> {
        self.instance_for(page_id).fetch_page(page_id)
    }

    /// Creates a page on some instance, probing round-robin from a
    /// rotating cursor so creation load spreads across the shards. Fails
    /// with [`BedrockError::PoolExhausted`] only after every instance
    /// refused.
    pub fn new_page(&self) -> Result<(PageId, Arc<FrameHeader>)> {
        let num = self.instances.len();
        let start = self.next_instance.fetch_add(1, Ordering::Relaxed);

        for offset in 0..num {
            match self.instances[(start + offset) % num].new_page() {
                Err(BedrockError::PoolExhausted) => continue,
                other => return other,
            }
        }
        Err(BedrockError::PoolExhausted)
    }

    /// Routed [`BufferPoolInstance::unpin_page`].
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        self.instance_for(page_id).unpin_page(page_id, is_dirty)
    }

    /// Routed [`BufferPoolInstance::flush_page`].
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        self.instance_for(page_id).flush_page(page_id)
    }

    /// Flushes every dirty resident page of every instance.
    pub fn flush_all_pages(&self) -> Result<()> {
        for instance in &self.instances {
            instance.flush_all_pages()?;
        }
        Ok(())
    }

    /// Routed [`BufferPoolInstance::delete_page`].
    pub fn delete_page(&self, page_id: PageId) -> bool {
        self.instance_for(page_id).delete_page(page_id)
    }

    /// Routed [`BufferPoolInstance::read_page`].
    pub fn read_page(&self, page_id: PageId) -> Result<ReadPageGuard> {
        self.instance_for(page_id).read_page(page_id)
    }

    /// Routed [`BufferPoolInstance::write_page`].
    pub fn write_page(&self, page_id: PageId) -> Result<WritePageGuard> {
        self.instance_for(page_id).write_page(page_id)
    }

    /// Routed [`BufferPoolInstance::get_pin_count`].
    pub fn get_pin_count(&self, page_id: PageId) -> Option<u32> {
        self.instance_for(page_id).get_pin_count(page_id)
    }
}
