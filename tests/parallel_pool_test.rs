//! Integration tests for the sharded parallel buffer pool

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use bedrock::buffer::ParallelBufferPool;
use bedrock::storage::disk::DiskManager;
use bedrock::BedrockError;
use tempfile::NamedTempFile;

fn create_pool(num_instances: usize, pool_size: usize) -> (ParallelBufferPool, NamedTempFile) {
    let temp_file = NamedTempFile::new().unwrap();
    let dm = Arc::new(DiskManager::new(temp_file.path()).unwrap());
    (
        ParallelBufferPool::new(num_instances, pool_size, dm, None),
        temp_file,
    )
}

#[test]
fn test_pool_size_is_aggregate() {
    let (pool, _temp) = create_pool(4, 16);
    assert_eq!(pool.pool_size(), 64);
}

#[test]
fn test_every_page_id_maps_to_its_allocator() {
    let (pool, _temp) = create_pool(4, 8);

    for _ in 0..16 {
        let (page_id, _frame) = pool.new_page().unwrap();
        let owner = page_id.as_usize() % 4;
        // The pin taken by new_page is visible on the owning instance and
        // nowhere else.
        for i in 0..4 {
            let count = pool.instance(i).get_pin_count(page_id);
            if i == owner {
                assert_eq!(count, Some(1));
            } else {
                assert_eq!(count, None);
            }
        }
        pool.unpin_page(page_id, false);
    }
}

#[test]
fn test_fetch_routes_to_the_owner() {
    let (pool, _temp) = create_pool(4, 8);

    let (page_id, _frame) = pool.new_page().unwrap();
    let owner = page_id.as_usize() % 4;

    let _again = pool.fetch_page(page_id).unwrap();
    assert_eq!(pool.instance(owner).get_pin_count(page_id), Some(2));

    pool.unpin_page(page_id, false);
    pool.unpin_page(page_id, false);
    assert_eq!(pool.get_pin_count(page_id), Some(0));
}

#[test]
fn test_direct_instance_creation_stays_in_stripe() {
    let (pool, _temp) = create_pool(4, 4);

    // Creating straight on instance 2 yields an id in its stripe, and the
    // pool routes a fetch of that id back to instance 2.
    let (page_id, _frame) = pool.instance(2).new_page().unwrap();
    assert_eq!(page_id.as_usize() % 4, 2);

    let _again = pool.fetch_page(page_id).unwrap();
    assert_eq!(pool.instance(2).get_pin_count(page_id), Some(2));

    pool.unpin_page(page_id, false);
    pool.unpin_page(page_id, false);
}

#[test]
fn test_page_ids_are_unique_across_shards() {
    let (pool, _temp) = create_pool(4, 8);

    let mut seen = HashSet::new();
    for _ in 0..32 {
        let (page_id, _frame) = pool.new_page().unwrap();
        assert!(seen.insert(page_id), "page id {page_id} issued twice");
        pool.unpin_page(page_id, false);
    }
}

#[test]
fn test_round_robin_creation_spreads_load() {
    let (pool, _temp) = create_pool(4, 4);

    // Sixteen creates must land four on each shard.
    let mut per_shard = [0usize; 4];
    for _ in 0..16 {
        let (page_id, _frame) = pool.new_page().unwrap();
        per_shard[page_id.as_usize() % 4] += 1;
        pool.unpin_page(page_id, false);
    }
    assert_eq!(per_shard, [4, 4, 4, 4]);
}

#[test]
fn test_creation_skips_exhausted_shards() {
    let (pool, _temp) = create_pool(2, 1);

    // Pin both shards full.
    let (p0, _f0) = pool.new_page().unwrap();
    let (p1, _f1) = pool.new_page().unwrap();
    assert_ne!(p0.as_usize() % 2, p1.as_usize() % 2);

    assert!(matches!(pool.new_page(), Err(BedrockError::PoolExhausted)));

    // Release one shard; creation succeeds by walking past the full one.
    pool.unpin_page(p1, false);
    let (p2, _f2) = pool.new_page().unwrap();
    assert_eq!(p2.as_usize() % 2, p1.as_usize() % 2);
}

#[test]
fn test_routed_operations_act_on_one_shard() {
    let (pool, _temp) = create_pool(3, 4);

    let (page_id, frame) = pool.new_page().unwrap();
    frame.write_data()[0] = 0x66;
    pool.unpin_page(page_id, true);

    assert!(pool.flush_page(page_id).unwrap());
    assert!(pool.delete_page(page_id));
    assert_eq!(pool.get_pin_count(page_id), None);

    // A fetch after delete reads the flushed image back from disk.
    let fetched = pool.fetch_page(page_id).unwrap();
    assert_eq!(fetched.read_data()[0], 0x66);
    pool.unpin_page(page_id, false);
}

#[test]
fn test_flush_all_covers_every_shard() {
    let temp_file = NamedTempFile::new().unwrap();
    let path = temp_file.path().to_path_buf();

    let page_ids;
    {
        let dm = Arc::new(DiskManager::new(&path).unwrap());
        let pool = ParallelBufferPool::new(4, 4, dm, None);

        page_ids = (0..8)
            .map(|i| {
                let (pid, frame) = pool.new_page().unwrap();
                frame.write_data()[0] = i as u8;
                pool.unpin_page(pid, true);
                pid
            })
            .collect::<Vec<_>>();

        pool.flush_all_pages().unwrap();
    }

    {
        let dm = Arc::new(DiskManager::new(&path).unwrap());
        let pool = ParallelBufferPool::new(4, 4, dm, None);

        for (i, &pid) in page_ids.iter().enumerate() {
            let guard = pool.read_page(pid).unwrap();
            assert_eq!(guard.data()[0], i as u8);
        }
    }
}

#[test]
fn test_shards_progress_concurrently() {
    let (pool, _temp) = create_pool(4, 4);
    let pool = Arc::new(pool);

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                for i in 0..64 {
                    match pool.new_page() {
                        Ok((pid, frame)) => {
                            frame.write_data()[0] = (t * 64 + i) as u8;
                            assert!(pool.unpin_page(pid, true));
                            let guard = pool.read_page(pid).unwrap();
                            assert_eq!(guard.data()[0], (t * 64 + i) as u8);
                            drop(guard);
                            if i % 4 == 0 {
                                pool.delete_page(pid);
                            }
                        }
                        Err(BedrockError::PoolExhausted) => {}
                        Err(e) => panic!("unexpected error: {e}"),
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // Quiescent: no pins remain anywhere.
    for i in 0..4 {
        let instance = pool.instance(i);
        assert_eq!(
            instance.free_frame_count() + instance.evictable_count(),
            instance.pool_size()
        );
    }
}
