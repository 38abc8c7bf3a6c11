// Scan settings — batching, memory and pooling knobs
//
// 환경 변수(COLSCAN_*) 또는 JSON 파일에서 로드

use crate::error::ColScanResult;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

/// Default byte budget for a single KV batch when the scan is not parallelized.
pub const DEFAULT_BATCH_BYTES_LIMIT: u64 = 10 << 20;

/// Default work-memory limit for one operator.
pub const DEFAULT_WORK_MEM_LIMIT: u64 = 64 << 20;

/// Default number of idle scan instances retained by the pool.
pub const DEFAULT_POOL_CAPACITY: usize = 256;

/// Maximum number of rows in one columnar batch.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 1024;

/// 스캔 설정
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    /// Byte limit substituted when neither parallelism nor an explicit limit is set
    pub default_batch_bytes_limit: u64,
    /// Work-memory limit used when the flow does not carry its own
    pub work_mem_limit_bytes: u64,
    /// Idle instances kept by the operator pool
    pub pool_capacity: usize,
    /// Upper bound on rows per batch
    pub max_batch_size: usize,
    /// Testing knob: always allocate full-size batches
    pub force_production_batch_sizes: bool,
    /// Testing knob: shrink the memory limit to a single byte
    pub force_disk_spill: bool,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            default_batch_bytes_limit: DEFAULT_BATCH_BYTES_LIMIT,
            work_mem_limit_bytes: DEFAULT_WORK_MEM_LIMIT,
            pool_capacity: DEFAULT_POOL_CAPACITY,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            force_production_batch_sizes: false,
            force_disk_spill: false,
        }
    }
}

impl ScanSettings {
    /// 환경 변수에서 로드 (설정되지 않은 값은 기본값)
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build settings from an arbitrary variable lookup.
    ///
    /// Unparseable values are ignored and leave the default in place.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut settings = Self::default();

        if let Some(v) = parse_var(&lookup, "COLSCAN_DEFAULT_BATCH_BYTES_LIMIT") {
            settings.default_batch_bytes_limit = v;
        }
        if let Some(v) = parse_var(&lookup, "COLSCAN_WORK_MEM_LIMIT_BYTES") {
            settings.work_mem_limit_bytes = v;
        }
        if let Some(v) = parse_var(&lookup, "COLSCAN_POOL_CAPACITY") {
            settings.pool_capacity = v;
        }
        if let Some(v) = parse_var::<usize>(&lookup, "COLSCAN_MAX_BATCH_SIZE") {
            settings.max_batch_size = v.max(1);
        }
        if let Some(v) = lookup("COLSCAN_FORCE_PRODUCTION_BATCH_SIZES") {
            settings.force_production_batch_sizes = parse_bool(&v);
        }
        if let Some(v) = lookup("COLSCAN_FORCE_DISK_SPILL") {
            settings.force_disk_spill = parse_bool(&v);
        }

        settings
    }

    /// 파일에서 로드
    pub fn load_from_file(path: &Path) -> ColScanResult<Self> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// 파일에 저장
    pub fn save_to_file(&self, path: &Path) -> ColScanResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, json)?;
        Ok(())
    }

    /// Resolve the memory limit for one operator.
    ///
    /// `explicit_limit` is the flow's own limit; zero means unset.
    pub fn work_mem_limit(&self, explicit_limit: u64) -> u64 {
        if self.force_disk_spill {
            1
        } else if explicit_limit > 0 {
            explicit_limit
        } else {
            self.work_mem_limit_bytes
        }
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Option<T> {
    lookup(name).and_then(|v| v.trim().parse().ok())
}

fn parse_bool(value: &str) -> bool {
    value.eq_ignore_ascii_case("true") || value == "1"
}
