//! Integration tests for the disk manager

use bedrock::common::{PageId, PAGE_SIZE};
use bedrock::storage::disk::{DiskManager, DiskScheduler};
use std::sync::Arc;

#[test]
fn test_create_and_reopen() {
    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir.path().join("test.db");

    {
        let dm = DiskManager::new(&db_path).unwrap();
        assert_eq!(dm.num_pages(), 0);

        let mut data = [0u8; PAGE_SIZE];
        data[0] = 9;
        dm.write_page(PageId::new(2), &data).unwrap();
        assert_eq!(dm.num_pages(), 3);
    }

    let dm = DiskManager::new(&db_path).unwrap();
    assert_eq!(dm.num_pages(), 3);

    let mut data = [0u8; PAGE_SIZE];
    dm.read_page(PageId::new(2), &mut data).unwrap();
    assert_eq!(data[0], 9);
}

#[test]
fn test_whole_page_roundtrip() {
    let temp_dir = tempfile::tempdir().unwrap();
    let dm = DiskManager::new(temp_dir.path().join("rw.db")).unwrap();

    let mut write_data = [0u8; PAGE_SIZE];
    for (i, byte) in write_data.iter_mut().enumerate() {
        *byte = (i % 251) as u8;
    }
    dm.write_page(PageId::new(0), &write_data).unwrap();

    let mut read_data = [0u8; PAGE_SIZE];
    dm.read_page(PageId::new(0), &mut read_data).unwrap();
    assert_eq!(write_data, read_data);
}

#[test]
fn test_reads_past_eof_are_zeroed() {
    let temp_dir = tempfile::tempdir().unwrap();
    let dm = DiskManager::new(temp_dir.path().join("eof.db")).unwrap();

    let mut data = [0x77u8; PAGE_SIZE];
    dm.read_page(PageId::new(12), &mut data).unwrap();
    assert!(data.iter().all(|&b| b == 0));
}

#[test]
fn test_counters_track_io() {
    let temp_dir = tempfile::tempdir().unwrap();
    let dm = DiskManager::new(temp_dir.path().join("count.db")).unwrap();

    let data = [0u8; PAGE_SIZE];
    let mut buf = [0u8; PAGE_SIZE];
    dm.write_page(PageId::new(0), &data).unwrap();
    dm.write_page(PageId::new(1), &data).unwrap();
    dm.read_page(PageId::new(0), &mut buf).unwrap();

    assert_eq!(dm.num_writes(), 2);
    assert_eq!(dm.num_reads(), 1);
}

#[test]
fn test_scheduler_serves_interleaved_requests() {
    let temp_dir = tempfile::tempdir().unwrap();
    let dm = Arc::new(DiskManager::new(temp_dir.path().join("sched.db")).unwrap());
    let scheduler = DiskScheduler::new(Arc::clone(&dm));

    for i in 0..4u8 {
        let data = [i + 1; PAGE_SIZE];
        scheduler
            .schedule_write_sync(PageId::new(i as u32), &data)
            .unwrap();

        let mut readback = [0u8; PAGE_SIZE];
        scheduler
            .schedule_read_sync(PageId::new(i as u32), &mut readback)
            .unwrap();
        assert_eq!(readback[0], i + 1);
    }
    assert_eq!(dm.num_writes(), 4);
}

#[test]
fn test_sync_flushes_to_durable_storage() {
    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir.path().join("sync.db");
    let dm = DiskManager::new(&db_path).unwrap();

    let data = [3u8; PAGE_SIZE];
    dm.write_page(PageId::new(0), &data).unwrap();
    dm.sync().unwrap();

    let on_disk = std::fs::read(&db_path).unwrap();
    assert_eq!(on_disk.len(), PAGE_SIZE);
    assert!(on_disk.iter().all(|&b| b == 3));
}
