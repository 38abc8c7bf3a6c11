//! Physical Operators Module

mod colbatch_scan;
mod operator;

pub use colbatch_scan::{ColBatchScan, ScanProgress, scan_pool_stats};
pub use operator::{Closer, KvReader, MetadataSource, Operator, Releasable, ScanOperator};
