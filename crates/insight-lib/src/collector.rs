//! Collector boundary
//!
//! The engine never gathers metrics itself. Collectors produce
//! [`MetricSnapshot`]s; callers may keep a [`SnapshotCache`] to avoid
//! re-collecting within a short TTL.

use crate::error::{EngineError, Result};
use crate::models::MetricSnapshot;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::debug;

/// Default lifetime of a cached snapshot
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(1);

/// Trait for snapshot sources
#[async_trait]
pub trait MetricsCollector: Send + Sync {
    async fn collect(&self) -> Result<MetricSnapshot>;
}

/// Reads a JSON-encoded snapshot from disk on every collection
pub struct FileCollector {
    path: PathBuf,
}

impl FileCollector {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl MetricsCollector for FileCollector {
    async fn collect(&self) -> Result<MetricSnapshot> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        let snapshot: MetricSnapshot = serde_json::from_str(&content)?;
        debug!(
            event = "snapshot_loaded",
            path = %self.path.display(),
            host = %snapshot.hostname,
            disks = snapshot.disk.len(),
            "Loaded snapshot from file"
        );
        Ok(snapshot)
    }
}

/// Last collected snapshot and when it was captured
#[derive(Debug, Clone)]
pub struct SnapshotCache {
    data: Option<MetricSnapshot>,
    captured_at: Option<Instant>,
    ttl: Duration,
}

impl Default for SnapshotCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}

impl SnapshotCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            data: None,
            captured_at: None,
            ttl,
        }
    }

    /// Cached snapshot, if still within the TTL
    pub fn get(&self) -> Option<&MetricSnapshot> {
        match (&self.data, self.captured_at) {
            (Some(data), Some(at)) if at.elapsed() < self.ttl => Some(data),
            _ => None,
        }
    }

    pub fn store(&mut self, snapshot: MetricSnapshot) {
        self.data = Some(snapshot);
        self.captured_at = Some(Instant::now());
    }

    pub fn invalidate(&mut self) {
        self.data = None;
        self.captured_at = None;
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

/// Return the cached snapshot when fresh, otherwise collect and cache a new one
pub async fn collect_cached(
    collector: &dyn MetricsCollector,
    cache: &mut SnapshotCache,
) -> Result<MetricSnapshot> {
    if let Some(snapshot) = cache.get() {
        debug!(event = "snapshot_cache_hit", "Using cached snapshot");
        return Ok(snapshot.clone());
    }
    let snapshot = collector.collect().await?;
    cache.store(snapshot.clone());
    Ok(snapshot)
}

/// Parse latency samples from a JSON array or newline-separated numbers
pub fn parse_latency_samples(content: &str) -> Result<Vec<f64>> {
    let trimmed = content.trim();
    if trimmed.starts_with('[') {
        return Ok(serde_json::from_str(trimmed)?);
    }

    trimmed
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .enumerate()
        .map(|(idx, line)| {
            line.parse::<f64>().map_err(|e| {
                EngineError::analysis(
                    "latency samples",
                    format!("entry {} ({:?}) is not a number: {}", idx + 1, line, e),
                )
            })
        })
        .collect()
}

pub async fn load_latency_samples(path: &Path) -> Result<Vec<f64>> {
    let content = tokio::fs::read_to_string(path).await?;
    parse_latency_samples(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CpuMetrics;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_test::{assert_err, assert_ok};

    struct MockCollector {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MetricsCollector for MockCollector {
        async fn collect(&self) -> Result<MetricSnapshot> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(MetricSnapshot::new(format!("host-{}", n)))
        }
    }

    #[tokio::test]
    async fn test_cache_hit_within_ttl() {
        let collector = MockCollector {
            calls: AtomicUsize::new(0),
        };
        let mut cache = SnapshotCache::new(Duration::from_secs(60));

        let first = collect_cached(&collector, &mut cache).await.unwrap();
        let second = collect_cached(&collector, &mut cache).await.unwrap();
        assert_eq!(first.hostname, second.hostname);
        assert_eq!(collector.calls.load(Ordering::SeqCst), 1);

        cache.invalidate();
        collect_cached(&collector, &mut cache).await.unwrap();
        assert_eq!(collector.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_zero_ttl_always_collects() {
        let collector = MockCollector {
            calls: AtomicUsize::new(0),
        };
        let mut cache = SnapshotCache::new(Duration::ZERO);
        collect_cached(&collector, &mut cache).await.unwrap();
        collect_cached(&collector, &mut cache).await.unwrap();
        assert_eq!(collector.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_file_collector_reads_json() {
        let snapshot = MetricSnapshot::new("db-1").with_cpu(CpuMetrics::with_utilization(55.0));
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(serde_json::to_string(&snapshot).unwrap().as_bytes())
            .unwrap();

        let loaded = assert_ok!(FileCollector::new(file.path()).collect().await);
        assert_eq!(loaded.hostname, "db-1");
        assert_eq!(loaded.metric("cpu_utilization"), Some(55.0));
    }

    #[tokio::test]
    async fn test_file_collector_missing_file() {
        let err = assert_err!(FileCollector::new("/nonexistent/snapshot.json").collect().await);
        assert_eq!(err.reason_code(), "io_error");
    }

    #[test]
    fn test_parse_latency_samples_formats() {
        assert_eq!(parse_latency_samples("[1.5, 2, 3]").unwrap(), vec![1.5, 2.0, 3.0]);
        assert_eq!(
            parse_latency_samples("# ms\n10\n\n 12.5 \n").unwrap(),
            vec![10.0, 12.5]
        );
        assert_err!(parse_latency_samples("10\nfast\n"));
    }
}
