use std::sync::Arc;

use bedrock::buffer::ParallelBufferPool;
use bedrock::storage::disk::DiskManager;
use bedrock::storage::page::{HashBucketPage, IntegerComparator};
use bedrock::storage::LogManager;

fn main() {
    env_logger::init();

    println!("Bedrock - buffer pool core for a disk-oriented storage engine");
    println!("==============================================================\n");

    let db_path = "demo.db";
    let disk_manager = Arc::new(DiskManager::new(db_path).expect("Failed to create disk manager"));
    println!("Created disk manager for: {}", db_path);

    let log_manager = Arc::new(LogManager::new());
    let pool = ParallelBufferPool::new(4, 8, Arc::clone(&disk_manager), Some(log_manager));
    println!(
        "Created parallel pool: {} instances, {} frames total\n",
        pool.num_instances(),
        pool.pool_size()
    );

    // Allocate a few pages; creation rotates across the shards and every
    // page id maps back to its owner by id % 4.
    let mut page_ids = Vec::new();
    for _ in 0..6 {
        let (page_id, frame) = pool.new_page().expect("Failed to allocate page");
        println!(
            "Allocated {} on instance {}",
            page_id,
            page_id.as_usize() % pool.num_instances()
        );
        frame.write_data()[0] = page_id.as_u32() as u8;
        pool.unpin_page(page_id, true);
        page_ids.push(page_id);
    }

    // Build a hash bucket inside the first page: 4-byte keys, 4-byte values.
    let bucket_page = page_ids[0];
    {
        let mut guard = pool.write_page(bucket_page).expect("Failed to pin page");
        let mut bucket = HashBucketPage::<4, 4>::new(guard.data_mut());
        bucket.init();

        let cmp = IntegerComparator;
        for (k, v) in [(1u32, 100u32), (1, 200), (2, 100)] {
            let inserted = bucket.insert(&k.to_le_bytes(), &v.to_le_bytes(), &cmp);
            println!("Inserted ({k}, {v}): {inserted}");
        }

        let mut values = Vec::new();
        bucket.get_value(&1u32.to_le_bytes(), &cmp, &mut values);
        println!(
            "Values under key 1: {:?}",
            values.iter().map(|v| u32::from_le_bytes(*v)).collect::<Vec<_>>()
        );
        println!("Bucket capacity: {}, live entries: {}", HashBucketPage::<4, 4>::CAPACITY, bucket.num_readable());
    }

    pool.flush_all_pages().expect("Failed to flush");
    println!("\nFlushed all pages ({} disk writes so far)", disk_manager.num_writes());

    // Read one of the plain pages back through a guard.
    let probe = page_ids[3];
    {
        let guard = pool.read_page(probe).expect("Failed to read page");
        println!("Read back {}: first byte {}", probe, guard.data()[0]);
    }

    for page_id in page_ids {
        pool.delete_page(page_id);
    }
    println!("Deleted demo pages");

    std::fs::remove_file(db_path).ok();
    println!("\nDemo completed successfully!");
}
