use std::sync::Arc;

use quarry::buffer::BufferPoolManager;
use quarry::common::RecordId;
use quarry::index::{BPlusTree8, GenericComparator, GenericKey};
use quarry::storage::disk::DiskManager;

fn main() {
    println!("Quarry - a disk-oriented storage engine in Rust");
    println!("===============================================\n");

    let db_path = "demo.db";

    let disk_manager = Arc::new(DiskManager::new(db_path).expect("Failed to create disk manager"));
    println!("Created disk manager for: {}", db_path);

    let bpm = Arc::new(BufferPoolManager::new(16, disk_manager));
    println!("Created buffer pool manager with 16 frames\n");

    // Small node sizes so a handful of keys already exercises splits
    let tree = BPlusTree8::new("demo_index", Arc::clone(&bpm), GenericComparator::<8>, 4, 4)
        .expect("Failed to open index");

    for key in [5i64, 9, 1, 7, 3, 8, 2, 6, 4] {
        tree.insert(&GenericKey::from_i64(key), RecordId::from_i64(key))
            .expect("Failed to insert");
    }
    println!("Inserted 9 keys in random order");

    println!("\nTree structure:");
    print!("{}", tree.debug_dump().expect("Failed to dump tree"));

    print!("\nIteration in key order:");
    let mut iter = tree.iter().expect("Failed to create iterator");
    while let Some((key, _rid)) = iter.next().expect("Failed to advance iterator") {
        print!(" {}", key.to_i64());
    }
    println!();

    for key in [2i64, 5, 8] {
        tree.remove(&GenericKey::from_i64(key))
            .expect("Failed to remove");
    }
    println!("\nRemoved keys 2, 5, 8; tree structure:");
    print!("{}", tree.debug_dump().expect("Failed to dump tree"));

    bpm.flush_all_pages().expect("Failed to flush");
    println!("\nFlushed all pages to disk");

    std::fs::remove_file(db_path).ok();
    println!("Demo completed successfully!");
}
