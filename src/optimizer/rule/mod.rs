mod nlj_as_hash_join;
mod seq_scan_as_index_scan;

pub use nlj_as_hash_join::NljAsHashJoin;
pub use seq_scan_as_index_scan::SeqScanAsIndexScan;
