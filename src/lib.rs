//! Bedrock - the buffer pool core of a disk-oriented storage engine
//!
//! This crate provides the memory-management substrate a disk-oriented
//! database sits on: a fixed set of in-memory frames caching fixed-size
//! disk pages, with pinning, dirty tracking, eviction, and sharding across
//! independent pool instances.
//!
//! # Architecture
//!
//! The system is organized into several layers:
//!
//! - **Storage Layer** (`storage`): Disk I/O and on-page formats
//!   - `DiskManager`: Reads and writes whole pages against the database file
//!   - `DiskScheduler`: Funnels page I/O through a background worker
//!   - `HashBucketPage`: Fixed-capacity associative array with parallel
//!     occupied/readable bitmaps, occupying exactly one page
//!   - `LogManager`: Opaque write-ahead log handle held for integration
//!
//! - **Buffer Pool** (`buffer`): Page caching and lifecycle
//!   - `BufferPoolInstance`: One pool of frames with a page table, free
//!     list, and replacement policy behind a single latch
//!   - `ParallelBufferPool`: Stripes page IDs across N instances so shards
//!     progress without shared latches
//!   - `LruReplacer`: Least-recently-unpinned eviction behind the
//!     pluggable `Replacer` trait
//!   - `ReadPageGuard`/`WritePageGuard`: RAII pins over page payloads
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use bedrock::buffer::ParallelBufferPool;
//! use bedrock::storage::disk::DiskManager;
//!
//! // One database file shared by four pool instances of 64 frames each.
//! let disk_manager = Arc::new(DiskManager::new("bedrock.db").unwrap());
//! let pool = ParallelBufferPool::new(4, 64, disk_manager, None);
//!
//! // Allocate a page; it comes back pinned and zeroed.
//! let (page_id, frame) = pool.new_page().unwrap();
//! frame.write_data()[0] = 0xAB;
//! pool.unpin_page(page_id, true);
//!
//! // Read it back through a guard that unpins on drop.
//! {
//!     let guard = pool.read_page(page_id).unwrap();
//!     assert_eq!(guard.data()[0], 0xAB);
//! }
//! pool.flush_page(page_id).unwrap();
//! ```

pub mod buffer;
pub mod common;
pub mod storage;

// Re-export commonly used types at the crate root
pub use common::{BedrockError, FrameId, PageId, Result};
