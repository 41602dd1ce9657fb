use crate::config::ServiceConfig;
use crate::domains::export::pagination::{cap_page_limit, PageCursor, PageSource, VecPageSource};
use crate::domains::export::types::*;
use crate::domains::export::writer::{format_records, ExportWriter};
use chrono::{DateTime, Local, TimeZone, Utc};
use log::{debug, info, warn};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use uuid::Uuid;

/// `<tenant>_<entity>_export_<yyyy-MM-dd>_<HH-mm>.<ext>`
pub fn export_file_name<Tz: TimeZone>(
    tenant_slug: Option<&str>,
    entity_type: &str,
    format: ExportFormat,
    at: &DateTime<Tz>,
) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!(
        "{}_{}_export_{}.{}",
        sanitize_segment(tenant_slug.unwrap_or("export")),
        sanitize_segment(entity_type),
        at.format("%Y-%m-%d_%H-%M"),
        format.file_extension()
    )
}

fn sanitize_segment(segment: &str) -> String {
    segment
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

fn percent_complete(processed: usize, total: Option<usize>) -> u8 {
    match total {
        Some(total) if total > 0 => (processed.saturating_mul(100) / total).min(99) as u8,
        _ => 0,
    }
}

fn estimate_remaining(start: DateTime<Utc>, processed: usize, total: Option<usize>) -> Option<f64> {
    let total = total?;
    if processed == 0 {
        return None;
    }
    let elapsed = (Utc::now() - start).num_milliseconds().max(0) as f64 / 1000.0;
    let per_record = elapsed / processed as f64;
    Some(per_record * total.saturating_sub(processed) as f64)
}

/// Shared view of one job. Every status change goes through the watch
/// sender, and none applies once the job is terminal.
#[derive(Clone)]
struct JobTracker {
    progress: Arc<watch::Sender<ExportProgress>>,
    cancel_flag: Arc<AtomicBool>,
}

impl JobTracker {
    fn new(progress: ExportProgress) -> Self {
        let (tx, _rx) = watch::channel(progress);
        Self {
            progress: Arc::new(tx),
            cancel_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    fn snapshot(&self) -> ExportProgress {
        self.progress.borrow().clone()
    }

    fn is_cancelled(&self) -> bool {
        self.cancel_flag.load(Ordering::SeqCst)
    }

    fn update<F>(&self, apply: F) -> bool
    where
        F: FnOnce(&mut ExportProgress),
    {
        self.progress.send_if_modified(|progress| {
            if progress.status.is_terminal() {
                return false;
            }
            apply(progress);
            true
        })
    }

    fn begin_processing(&self) -> bool {
        self.update(|p| p.status = ExportStatus::Processing)
    }

    fn record_page(&self, received: usize, total: Option<usize>) -> bool {
        self.update(|p| {
            p.processed_records += received;
            p.total_records = total;
            p.progress = percent_complete(p.processed_records, total);
            p.estimated_time_remaining = estimate_remaining(p.start_time, p.processed_records, total);
        })
    }

    fn complete(&self) -> bool {
        self.update(|p| {
            p.status = ExportStatus::Completed;
            p.progress = 100;
            p.total_records = Some(p.processed_records);
            p.estimated_time_remaining = Some(0.0);
        })
    }

    fn fail(&self, message: String) -> bool {
        self.update(|p| {
            p.status = ExportStatus::Failed;
            p.estimated_time_remaining = None;
            p.error = Some(message);
        })
    }

    /// The download location is the one field that may change after a job
    /// completes; status, counters and output stay frozen.
    fn set_download_url(&self, url: String) -> bool {
        self.progress.send_if_modified(|progress| {
            if progress.status != ExportStatus::Completed {
                return false;
            }
            progress.download_url = Some(url);
            true
        })
    }

    fn cancel(&self) -> bool {
        let flag = Arc::clone(&self.cancel_flag);
        self.update(move |p| {
            flag.store(true, Ordering::SeqCst);
            p.status = ExportStatus::Cancelled;
            p.estimated_time_remaining = None;
        })
    }
}

struct JobEntry {
    request: ExportRequest,
    tracker: JobTracker,
    output: Option<String>,
}

type JobMap = Arc<Mutex<HashMap<Uuid, JobEntry>>>;

/// Runs export jobs and exposes their progress for polling.
///
/// Small record sets are formatted directly; anything at or above the
/// streaming threshold is pulled page by page on a background task.
#[derive(Clone)]
pub struct ExportJobManager {
    jobs: JobMap,
    streaming_threshold: usize,
    page_size: usize,
}

impl ExportJobManager {
    pub fn new(streaming_threshold: usize, page_size: usize) -> Self {
        Self {
            jobs: Arc::new(Mutex::new(HashMap::new())),
            streaming_threshold,
            page_size: cap_page_limit(page_size),
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(config.streaming_threshold, config.page_size)
    }

    pub fn mode_for(&self, record_count: usize) -> ExportMode {
        if record_count < self.streaming_threshold {
            ExportMode::InMemory
        } else {
            ExportMode::Streaming
        }
    }

    /// Start an export and return its job id.
    pub async fn export(&self, request: ExportRequest, source: ExportSource) -> Result<Uuid, ExportError> {
        match source {
            ExportSource::Records(records) if self.mode_for(records.len()) == ExportMode::InMemory => {
                self.export_in_memory(request, records).await
            }
            ExportSource::Records(records) => {
                let request = request.with_total(records.len());
                self.start_streaming(request, Arc::new(VecPageSource::new(records)))
                    .await
            }
            ExportSource::Provider(provider) => self.start_streaming(request, provider).await,
        }
    }

    async fn register(&self, request: ExportRequest, mode: ExportMode) -> (Uuid, JobTracker) {
        let job_id = Uuid::new_v4();
        let tracker = JobTracker::new(ExportProgress {
            job_id,
            status: ExportStatus::Preparing,
            mode,
            progress: 0,
            processed_records: 0,
            total_records: request.total_records,
            start_time: Utc::now(),
            estimated_time_remaining: None,
            download_url: None,
            error: None,
        });

        info!(
            "Export job {} created for {} ({:?}, {:?})",
            job_id, request.entity_type, request.format, mode
        );
        self.jobs.lock().await.insert(
            job_id,
            JobEntry {
                request,
                tracker: tracker.clone(),
                output: None,
            },
        );
        (job_id, tracker)
    }

    /// Format resident records directly. The job is terminal on return.
    pub async fn export_in_memory(&self, request: ExportRequest, records: Vec<Value>) -> Result<Uuid, ExportError> {
        let request = request.with_total(records.len());
        let (job_id, tracker) = self.register(request.clone(), ExportMode::InMemory).await;
        tracker.begin_processing();

        match format_records(request.format, &request.fields, &records) {
            Ok(output) => {
                let mut jobs = self.jobs.lock().await;
                tracker.record_page(records.len(), Some(records.len()));
                if tracker.complete() {
                    if let Some(entry) = jobs.get_mut(&job_id) {
                        entry.output = Some(output);
                    }
                }
                info!("Export job {} completed with {} records", job_id, records.len());
            }
            Err(e) => {
                warn!("Export job {} failed: {}", job_id, e);
                tracker.fail(e.to_string());
            }
        }
        Ok(job_id)
    }

    /// Start pulling pages from `provider` on a background task. A known
    /// `total_records` on the request bounds the walk; otherwise it ends on
    /// the first short page.
    pub async fn start_streaming(&self, request: ExportRequest, provider: Arc<dyn PageSource>) -> Result<Uuid, ExportError> {
        let (job_id, tracker) = self.register(request.clone(), ExportMode::Streaming).await;
        let jobs = Arc::clone(&self.jobs);
        let page_size = self.page_size;

        tokio::spawn(async move {
            run_streaming_job(jobs, job_id, tracker, request, provider, page_size).await;
        });
        Ok(job_id)
    }

    async fn tracker(&self, job_id: Uuid) -> Result<JobTracker, ExportError> {
        self.jobs
            .lock()
            .await
            .get(&job_id)
            .map(|entry| entry.tracker.clone())
            .ok_or(ExportError::NotFound(job_id))
    }

    pub async fn get_progress(&self, job_id: Uuid) -> Result<ExportProgress, ExportError> {
        Ok(self.tracker(job_id).await?.snapshot())
    }

    /// Request cancellation. No further pages are requested once the running
    /// job observes it; a page already in flight is discarded.
    pub async fn cancel(&self, job_id: Uuid) -> Result<ExportProgress, ExportError> {
        let tracker = self.tracker(job_id).await?;
        if !tracker.cancel() {
            let status = tracker.snapshot().status;
            return Err(ExportError::InvalidState(format!(
                "Job {} is already {}",
                job_id,
                status.as_str()
            )));
        }
        info!("Export job {} cancelled", job_id);
        Ok(tracker.snapshot())
    }

    /// Wait until the job reaches a terminal state
    pub async fn wait_for_completion(&self, job_id: Uuid) -> Result<ExportProgress, ExportError> {
        let tracker = self.tracker(job_id).await?;
        let mut receiver = tracker.progress.subscribe();
        loop {
            let progress = receiver.borrow_and_update().clone();
            if progress.status.is_terminal() {
                return Ok(progress);
            }
            receiver
                .changed()
                .await
                .map_err(|_| ExportError::NotFound(job_id))?;
        }
    }

    /// Formatted output of a completed job
    pub async fn output(&self, job_id: Uuid) -> Result<String, ExportError> {
        let jobs = self.jobs.lock().await;
        let entry = jobs.get(&job_id).ok_or(ExportError::NotFound(job_id))?;
        let status = entry.tracker.snapshot().status;
        match (&entry.output, status) {
            (Some(output), ExportStatus::Completed) => Ok(output.clone()),
            _ => Err(ExportError::InvalidState(format!(
                "Job {} is {}, not completed",
                job_id,
                status.as_str()
            ))),
        }
    }

    /// Write a completed job's output into `dir` and return the file path.
    pub async fn download(&self, job_id: Uuid, dir: impl AsRef<Path>) -> Result<PathBuf, ExportError> {
        let output = self.output(job_id).await?;
        let (request, tracker) = {
            let jobs = self.jobs.lock().await;
            let entry = jobs.get(&job_id).ok_or(ExportError::NotFound(job_id))?;
            (entry.request.clone(), entry.tracker.clone())
        };

        let dir = dir.as_ref();
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(export_file_name(
            request.tenant_slug.as_deref(),
            &request.entity_type,
            request.format,
            &Local::now(),
        ));
        tokio::fs::write(&path, output.as_bytes()).await?;

        tracker.set_download_url(path.display().to_string());
        debug!("Export job {} written to {}", job_id, path.display());
        Ok(path)
    }

    pub async fn list_jobs(&self) -> Vec<ExportProgress> {
        let mut jobs: Vec<ExportProgress> = self
            .jobs
            .lock()
            .await
            .values()
            .map(|entry| entry.tracker.snapshot())
            .collect();
        jobs.sort_by_key(|p| p.start_time);
        jobs
    }

    /// Forget a finished job and its output
    pub async fn remove_job(&self, job_id: Uuid) -> Result<(), ExportError> {
        let mut jobs = self.jobs.lock().await;
        let entry = jobs.get(&job_id).ok_or(ExportError::NotFound(job_id))?;
        let status = entry.tracker.snapshot().status;
        if !status.is_terminal() {
            return Err(ExportError::InvalidState(format!(
                "Job {} is still {}",
                job_id,
                status.as_str()
            )));
        }
        jobs.remove(&job_id);
        Ok(())
    }
}

async fn run_streaming_job(
    jobs: JobMap,
    job_id: Uuid,
    tracker: JobTracker,
    request: ExportRequest,
    provider: Arc<dyn PageSource>,
    page_size: usize,
) {
    if !tracker.begin_processing() {
        return;
    }

    let mut writer = ExportWriter::new(request.format, &request.fields);
    let mut total = request.total_records;
    let mut cursor = PageCursor::new(page_size, request.total_records);

    while let Some((offset, limit)) = cursor.next_request() {
        if tracker.is_cancelled() {
            debug!("Export job {} stopped before offset {}", job_id, offset);
            return;
        }

        let page = match provider.fetch_page(offset, limit).await {
            Ok(page) => page,
            Err(e) => {
                warn!("Export job {} failed at offset {}: {}", job_id, offset, e);
                tracker.fail(e.to_string());
                return;
            }
        };

        if tracker.is_cancelled() {
            debug!("Export job {} discarded page at offset {}", job_id, offset);
            return;
        }

        total = page.total.or(total);
        let batch = cursor.accept(page.data);
        if let Err(e) = writer.write_batch(&batch) {
            warn!("Export job {} failed to format page: {}", job_id, e);
            tracker.fail(e.to_string());
            return;
        }
        if !tracker.record_page(batch.len(), total) {
            return;
        }

        debug!("Export job {}: {} records processed", job_id, writer.rows_written());
        tokio::task::yield_now().await;
    }

    let output = match writer.finish() {
        Ok(output) => output,
        Err(e) => {
            warn!("Export job {} failed to finish output: {}", job_id, e);
            tracker.fail(e.to_string());
            return;
        }
    };

    let mut jobs = jobs.lock().await;
    if tracker.complete() {
        if let Some(entry) = jobs.get_mut(&job_id) {
            entry.output = Some(output);
        }
        info!("Export job {} completed", job_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::export::pagination::Page;
    use crate::errors::{ServiceError, ServiceResult};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::Semaphore;

    fn records(n: usize) -> Vec<Value> {
        (0..n).map(|i| json!({"id": i, "name": format!("record {}", i)})).collect()
    }

    /// Page source that blocks each fetch until a permit is released
    struct GatedSource {
        inner: VecPageSource,
        gate: Arc<Semaphore>,
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl PageSource for GatedSource {
        async fn fetch_page(&self, offset: usize, limit: usize) -> ServiceResult<Page<Value>> {
            let permit = self
                .gate
                .acquire()
                .await
                .map_err(|e| ServiceError::InvalidState(e.to_string()))?;
            permit.forget();
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.inner.fetch_page(offset, limit).await
        }
    }

    /// Page source that records every `(offset, limit)` it is asked for
    struct RecordingSource {
        inner: VecPageSource,
        requests: std::sync::Mutex<Vec<(usize, usize)>>,
    }

    impl RecordingSource {
        fn new(n: usize) -> Self {
            Self {
                inner: VecPageSource::new(records(n)),
                requests: std::sync::Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<(usize, usize)> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageSource for RecordingSource {
        async fn fetch_page(&self, offset: usize, limit: usize) -> ServiceResult<Page<Value>> {
            self.requests.lock().unwrap().push((offset, limit));
            self.inner.fetch_page(offset, limit).await
        }
    }

    /// Page source that fails from the given page onward
    struct FailingSource {
        inner: VecPageSource,
        fail_from_offset: usize,
    }

    #[async_trait]
    impl PageSource for FailingSource {
        async fn fetch_page(&self, offset: usize, limit: usize) -> ServiceResult<Page<Value>> {
            if offset >= self.fail_from_offset {
                return Err(ServiceError::Network("connection reset".to_string()));
            }
            self.inner.fetch_page(offset, limit).await
        }
    }

    #[test]
    fn test_file_name_pattern() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 0).unwrap();
        assert_eq!(
            export_file_name(Some("acme"), "issue", ExportFormat::Csv, &at),
            "acme_issue_export_2024-03-09_07-05.csv"
        );
        assert_eq!(
            export_file_name(None, "company", ExportFormat::Json, &at),
            "export_company_export_2024-03-09_07-05.json"
        );
        assert_eq!(
            export_file_name(Some("a/b"), "issue", ExportFormat::Xlsx, &at),
            "a_b_issue_export_2024-03-09_07-05.json"
        );
    }

    #[tokio::test]
    async fn test_in_memory_export_completes_synchronously() {
        let manager = ExportJobManager::new(5000, 2000);
        let request = ExportRequest::new("issue", Some("acme"), ExportFormat::Csv);

        let job_id = manager
            .export(request, ExportSource::Records(vec![json!({"a": 1, "b": "x,y"})]))
            .await
            .unwrap();

        let progress = manager.get_progress(job_id).await.unwrap();
        assert_eq!(progress.status, ExportStatus::Completed);
        assert_eq!(progress.mode, ExportMode::InMemory);
        assert_eq!(progress.progress, 100);
        assert_eq!(progress.processed_records, 1);

        let output = manager.output(job_id).await.unwrap();
        assert_eq!(output.lines().collect::<Vec<_>>(), vec!["a,b", "1,\"x,y\""]);
    }

    #[tokio::test]
    async fn test_large_record_set_streams_in_pages() {
        let manager = ExportJobManager::new(1000, 2000);
        let request = ExportRequest::new("issue", None, ExportFormat::Csv);

        let job_id = manager
            .export(request, ExportSource::Records(records(4500)))
            .await
            .unwrap();
        let progress = manager.wait_for_completion(job_id).await.unwrap();

        assert_eq!(progress.status, ExportStatus::Completed);
        assert_eq!(progress.mode, ExportMode::Streaming);
        assert_eq!(progress.processed_records, 4500);
        assert_eq!(progress.total_records, Some(4500));
        assert_eq!(progress.progress, 100);

        let output = manager.output(job_id).await.unwrap();
        assert_eq!(output.lines().count(), 4501);
    }

    #[tokio::test]
    async fn test_streaming_job_pages_like_fetch_all() {
        let manager = ExportJobManager::new(10, 5000);

        let bounded = Arc::new(RecordingSource::new(4500));
        let job_id = manager
            .export(
                ExportRequest::new("issue", None, ExportFormat::Csv).with_total(4500),
                ExportSource::Provider(bounded.clone()),
            )
            .await
            .unwrap();
        let progress = manager.wait_for_completion(job_id).await.unwrap();
        assert_eq!(progress.processed_records, 4500);
        assert_eq!(bounded.requests(), vec![(0, 2000), (2000, 2000), (4000, 500)]);

        let unbounded = Arc::new(RecordingSource::new(4500));
        let job_id = manager
            .export(
                ExportRequest::new("issue", None, ExportFormat::Csv),
                ExportSource::Provider(unbounded.clone()),
            )
            .await
            .unwrap();
        let progress = manager.wait_for_completion(job_id).await.unwrap();
        assert_eq!(progress.status, ExportStatus::Completed);
        assert_eq!(progress.processed_records, 4500);
        assert_eq!(unbounded.requests(), vec![(0, 2000), (2000, 2000), (4000, 2000)]);
    }

    #[tokio::test]
    async fn test_cancelled_job_stops_requesting_pages() {
        let manager = ExportJobManager::new(10, 100);
        let gate = Arc::new(Semaphore::new(1));
        let source = Arc::new(GatedSource {
            inner: VecPageSource::new(records(1000)),
            gate: Arc::clone(&gate),
            fetches: AtomicUsize::new(0),
        });

        let job_id = manager
            .export(
                ExportRequest::new("issue", Some("acme"), ExportFormat::Json),
                ExportSource::Provider(source.clone()),
            )
            .await
            .unwrap();

        // First page passes the gate; the second fetch blocks on it
        for _ in 0..200 {
            if manager.get_progress(job_id).await.unwrap().processed_records == 100 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert_eq!(manager.get_progress(job_id).await.unwrap().processed_records, 100);

        let cancelled = manager.cancel(job_id).await.unwrap();
        assert_eq!(cancelled.status, ExportStatus::Cancelled);

        gate.add_permits(20);
        tokio::time::sleep(Duration::from_millis(20)).await;

        let progress = manager.wait_for_completion(job_id).await.unwrap();
        assert_eq!(progress.status, ExportStatus::Cancelled);
        assert_eq!(progress.processed_records, 100);
        assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
        assert!(manager.output(job_id).await.is_err());
    }

    #[tokio::test]
    async fn test_page_failure_fails_job_with_message() {
        let manager = ExportJobManager::new(10, 100);
        let source = Arc::new(FailingSource {
            inner: VecPageSource::new(records(500)),
            fail_from_offset: 200,
        });

        let job_id = manager
            .export(
                ExportRequest::new("company", None, ExportFormat::Csv),
                ExportSource::Provider(source),
            )
            .await
            .unwrap();
        let progress = manager.wait_for_completion(job_id).await.unwrap();

        assert_eq!(progress.status, ExportStatus::Failed);
        assert_eq!(progress.processed_records, 200);
        assert!(progress.error.unwrap().contains("connection reset"));
    }

    #[tokio::test]
    async fn test_terminal_jobs_cannot_be_cancelled() {
        let manager = ExportJobManager::new(5000, 2000);
        let job_id = manager
            .export(
                ExportRequest::new("user", None, ExportFormat::Json),
                ExportSource::Records(records(3)),
            )
            .await
            .unwrap();

        assert!(matches!(
            manager.cancel(job_id).await,
            Err(ExportError::InvalidState(_))
        ));
        assert_eq!(
            manager.get_progress(job_id).await.unwrap().status,
            ExportStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_download_writes_named_file() {
        let dir = TempDir::new().unwrap();
        let manager = ExportJobManager::new(5000, 2000);
        let job_id = manager
            .export(
                ExportRequest::new("issue", Some("acme"), ExportFormat::Csv),
                ExportSource::Records(records(2)),
            )
            .await
            .unwrap();

        let before = manager.get_progress(job_id).await.unwrap();
        let path = manager.download(job_id, dir.path()).await.unwrap();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("acme_issue_export_"));
        assert!(name.ends_with(".csv"));

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(contents.lines().next(), Some("id,name"));

        let progress = manager.get_progress(job_id).await.unwrap();
        assert_eq!(progress.download_url, Some(path.display().to_string()));
        assert_eq!(progress.status, ExportStatus::Completed);
        assert_eq!(progress.processed_records, before.processed_records);
        assert_eq!(progress.total_records, before.total_records);
        assert_eq!(progress.progress, 100);
    }

    #[tokio::test]
    async fn test_download_url_is_not_set_on_cancelled_job() {
        let tracker = JobTracker::new(ExportProgress {
            job_id: Uuid::new_v4(),
            status: ExportStatus::Processing,
            mode: ExportMode::Streaming,
            progress: 10,
            processed_records: 100,
            total_records: Some(1000),
            start_time: Utc::now(),
            estimated_time_remaining: None,
            download_url: None,
            error: None,
        });
        assert!(!tracker.set_download_url("early.csv".to_string()));
        assert!(tracker.cancel());
        assert!(!tracker.set_download_url("late.csv".to_string()));
        assert_eq!(tracker.snapshot().download_url, None);
    }

    #[tokio::test]
    async fn test_remove_only_terminal_jobs() {
        let manager = ExportJobManager::new(1, 100);
        let gate = Arc::new(Semaphore::new(0));
        let source = Arc::new(GatedSource {
            inner: VecPageSource::new(records(10)),
            gate: Arc::clone(&gate),
            fetches: AtomicUsize::new(0),
        });

        let job_id = manager
            .export(
                ExportRequest::new("issue", None, ExportFormat::Csv),
                ExportSource::Provider(source),
            )
            .await
            .unwrap();
        assert!(matches!(
            manager.remove_job(job_id).await,
            Err(ExportError::InvalidState(_))
        ));
        assert_eq!(manager.list_jobs().await.len(), 1);

        gate.add_permits(5);
        manager.wait_for_completion(job_id).await.unwrap();
        manager.remove_job(job_id).await.unwrap();
        assert!(manager.list_jobs().await.is_empty());
        assert!(matches!(
            manager.get_progress(job_id).await,
            Err(ExportError::NotFound(_))
        ));
    }
}
