//! Quarry - the core storage engine of a disk-oriented database
//!
//! The crate provides a fixed-capacity buffer pool layered over a paged disk
//! file, and a concurrent B+ tree index built on top of that buffer pool.
//!
//! # Architecture
//!
//! The system is organized bottom-up:
//!
//! - **Storage Layer** (`storage`): disk I/O and persisted catalog state
//!   - `DiskManager`: reads, writes, allocates and deallocates pages
//!   - `DiskScheduler`: background worker thread for disk I/O
//!   - `HeaderPage`: page 0, persisting `index name -> root page id`
//!
//! - **Buffer Pool** (`buffer`): memory management for database pages
//!   - `BufferPoolManager`: caches pages in a fixed set of frames
//!   - `LruReplacer`: least-recently-unpinned victim selection
//!   - `FrameHeader`: per-frame metadata; its data lock is the page latch
//!   - `ReadPageGuard`/`WritePageGuard`: RAII pin + latch pairs
//!
//! - **Index** (`index`): a persistent B+ tree with crab-latched concurrent
//!   access, node splits, merges, redistribution, and forward iteration
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use quarry::buffer::BufferPoolManager;
//! use quarry::common::RecordId;
//! use quarry::index::{BPlusTree8, GenericComparator, GenericKey};
//! use quarry::storage::disk::DiskManager;
//!
//! let disk_manager = Arc::new(DiskManager::new("test.db").unwrap());
//! let bpm = Arc::new(BufferPoolManager::new(64, disk_manager));
//!
//! // Open (or create) an index; 0 picks the page-capacity node sizes
//! let tree = BPlusTree8::new("orders_pk", bpm, GenericComparator::<8>, 0, 0).unwrap();
//!
//! tree.insert(&GenericKey::from_i64(42), RecordId::from_i64(42)).unwrap();
//! assert!(tree.get_value(&GenericKey::from_i64(42)).unwrap().is_some());
//!
//! for entry in tree.iter().unwrap() {
//!     let (key, rid) = entry.unwrap();
//!     println!("{} -> {}", key.to_i64(), rid);
//! }
//! ```

pub mod buffer;
pub mod common;
pub mod index;
pub mod storage;

// Re-export commonly used types at the crate root
pub use common::{PageId, QuarryError, RecordId, Result, SlotId};
