//! Batch integration tests.
//!
//! A fake in-process converter stands in for a real renderer: it echoes the
//! request back as JSON, fails any document containing `FAIL`, and records
//! how many conversions run at once.

use async_trait::async_trait;
use chrono::NaiveDate;
use edgequake_md2pdf::{
    batch, convert_path, discover, resolve, run_stream, BatchError, BatchProgressCallback,
    ConfigLayer, ConversionRequest, ConvertError, Converter, ConverterPool, Environment,
    FixedClock, Job, JobError, Overrides, RequestBuilder, ResolvedConfig,
};
use futures::StreamExt;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

// ── Fake converter ───────────────────────────────────────────────────────────

#[derive(Default)]
struct Gauge {
    in_flight: AtomicUsize,
    max_seen: AtomicUsize,
    calls: AtomicUsize,
}

/// Decrements the gauge even when the conversion future is dropped.
struct InFlight<'a>(&'a Gauge);

impl<'a> InFlight<'a> {
    fn enter(gauge: &'a Gauge) -> Self {
        let now = gauge.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        gauge.max_seen.fetch_max(now, Ordering::SeqCst);
        gauge.calls.fetch_add(1, Ordering::SeqCst);
        Self(gauge)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

enum Mode {
    /// Sleep, then echo the request (or fail on `FAIL`).
    Echo(Duration),
    /// Never finish.
    Hang,
}

struct FakeConverter {
    gauge: Arc<Gauge>,
    mode: Arc<Mode>,
}

#[async_trait]
impl Converter for FakeConverter {
    async fn convert(&self, request: &ConversionRequest) -> Result<Vec<u8>, ConvertError> {
        let _guard = InFlight::enter(&self.gauge);
        match *self.mode {
            Mode::Echo(delay) => tokio::time::sleep(delay).await,
            Mode::Hang => std::future::pending::<()>().await,
        }
        if request.markdown.contains("FAIL") {
            return Err(ConvertError::Renderer {
                exit_code: Some(1),
                stderr: "unsupported construct".into(),
            });
        }
        serde_json::to_vec_pretty(request).map_err(|e| ConvertError::Request(e.to_string()))
    }
}

fn fake_pool(n: usize, mode: Mode) -> (ConverterPool<FakeConverter>, Arc<Gauge>) {
    let gauge = Arc::new(Gauge::default());
    let mode = Arc::new(mode);
    let converters = (0..n)
        .map(|_| FakeConverter {
            gauge: Arc::clone(&gauge),
            mode: Arc::clone(&mode),
        })
        .collect();
    (ConverterPool::new(converters).unwrap(), gauge)
}

// ── Fixtures ─────────────────────────────────────────────────────────────────

fn write(root: &Path, rel: &str, body: &str) -> PathBuf {
    let p = root.join(rel);
    fs::create_dir_all(p.parent().unwrap()).unwrap();
    fs::write(&p, body).unwrap();
    p
}

/// Library logs go to the test harness; `RUST_LOG=debug` shows them.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn env() -> Environment {
    init_tracing();
    Environment::system().with_clock(Arc::new(FixedClock(
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
    )))
}

fn config(file: &ConfigLayer) -> Arc<ResolvedConfig> {
    Arc::new(resolve(
        &ConfigLayer::builtin(),
        file,
        &Overrides::default(),
        &env(),
    ))
}

fn builder() -> RequestBuilder {
    RequestBuilder::new(config(&ConfigLayer::default()))
}

fn read_request(path: &Path) -> ConversionRequest {
    serde_json::from_slice(&fs::read(path).unwrap()).unwrap()
}

/// docs/ with five good files and two bad ones, some nested.
fn mixed_tree(root: &Path) -> (BTreeSet<PathBuf>, BTreeSet<PathBuf>) {
    let docs = root.join("docs");
    let good = [
        "index.md",
        "guide/intro.md",
        "guide/setup.markdown",
        "guide/deep/notes.md",
        "api.md",
    ]
    .iter()
    .map(|rel| write(&docs, rel, &format!("# {rel}\n\nBody text.\n")))
    .collect();
    let bad = ["broken.md", "guide/deep/bad.md"]
        .iter()
        .map(|rel| write(&docs, rel, "# Broken\n\nFAIL here\n"))
        .collect();
    write(&docs, "guide/diagram.png", "not markdown");
    (good, bad)
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn failing_files_are_reported_and_good_files_are_written() {
    let tmp = TempDir::new().unwrap();
    let (good, bad) = mixed_tree(tmp.path());
    let out = tmp.path().join("out");
    let (pool, _) = fake_pool(3, Mode::Echo(Duration::from_millis(5)));

    let err = convert_path(
        tmp.path().join("docs"),
        Some(out.as_path()),
        config(&ConfigLayer::default()),
        &pool,
        &env(),
        &CancellationToken::new(),
    )
    .await
    .unwrap_err();

    match err {
        BatchError::JobsFailed {
            failed,
            total,
            failures,
        } => {
            assert_eq!((failed, total), (2, 7));
            let failing: BTreeSet<PathBuf> = failures.iter().map(|f| f.input.clone()).collect();
            assert_eq!(failing, bad);
            for f in &failures {
                assert!(
                    matches!(f.error, JobError::ConversionFailed { ref detail } if detail.contains("unsupported construct")),
                    "got: {}",
                    f.error
                );
            }
        }
        other => panic!("expected JobsFailed, got: {other}"),
    }

    let docs = tmp.path().join("docs");
    for input in &good {
        let rel = input.strip_prefix(&docs).unwrap();
        let output = out.join(rel).with_extension("pdf");
        assert!(output.exists(), "missing {}", output.display());
        assert_eq!(read_request(&output).source_path, *input);
    }
    for input in &bad {
        let rel = input.strip_prefix(&docs).unwrap();
        assert!(!out.join(rel).with_extension("pdf").exists());
    }
    assert_eq!(pool.available(), pool.size());
}

#[tokio::test]
async fn error_message_names_every_failing_input() {
    let tmp = TempDir::new().unwrap();
    let (_, bad) = mixed_tree(tmp.path());
    let (pool, _) = fake_pool(2, Mode::Echo(Duration::ZERO));

    let jobs = discover(&tmp.path().join("docs"), Some(tmp.path().join("out").as_path())).unwrap();
    let result = batch::run(&CancellationToken::new(), jobs, &pool, &builder(), &env()).await;
    assert_eq!(result.stats.succeeded, 5);

    let msg = result.into_result().unwrap_err().to_string();
    assert!(msg.starts_with("2/7 files failed"), "got: {msg}");
    for input in bad {
        assert!(msg.contains(&input.display().to_string()), "got: {msg}");
    }
}

#[tokio::test]
async fn rerunning_a_batch_produces_identical_outputs() {
    let tmp = TempDir::new().unwrap();
    let docs = tmp.path().join("docs");
    for i in 0..6 {
        write(&docs, &format!("part{i}/chapter.md"), &format!("# Chapter {i}\n"));
    }
    let out = tmp.path().join("out");
    let (pool, _) = fake_pool(3, Mode::Echo(Duration::from_millis(1)));

    let snapshot = |out: &Path| -> Vec<(PathBuf, Vec<u8>)> {
        let mut files: Vec<_> = walkdir_files(out)
            .into_iter()
            .map(|p| {
                let bytes = fs::read(&p).unwrap();
                (p, bytes)
            })
            .collect();
        files.sort();
        files
    };

    let jobs = discover(&docs, Some(out.as_path())).unwrap();
    let result = batch::run(&CancellationToken::new(), jobs, &pool, &builder(), &env()).await;
    assert!(result.is_success());
    let first = snapshot(&out);
    assert_eq!(first.len(), 6);

    let jobs = discover(&docs, Some(out.as_path())).unwrap();
    let result = batch::run(&CancellationToken::new(), jobs, &pool, &builder(), &env()).await;
    assert!(result.is_success());
    assert_eq!(snapshot(&out), first);
}

fn walkdir_files(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .into_iter()
        .map(|e| e.unwrap())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn conversions_never_exceed_pool_size() {
    let tmp = TempDir::new().unwrap();
    let docs = tmp.path().join("docs");
    for i in 0..12 {
        write(&docs, &format!("doc{i:02}.md"), "text\n");
    }
    let (pool, gauge) = fake_pool(3, Mode::Echo(Duration::from_millis(20)));

    let jobs = discover(&docs, None).unwrap();
    let result = batch::run(&CancellationToken::new(), jobs, &pool, &builder(), &env()).await;

    assert!(result.is_success());
    assert_eq!(gauge.calls.load(Ordering::SeqCst), 12);
    let max = gauge.max_seen.load(Ordering::SeqCst);
    assert!((1..=3).contains(&max), "max in flight: {max}");
    assert_eq!(gauge.in_flight.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn cancellation_returns_every_token() {
    let tmp = TempDir::new().unwrap();
    let docs = tmp.path().join("docs");
    for i in 0..5 {
        write(&docs, &format!("doc{i}.md"), "text\n");
    }
    let (pool, gauge) = fake_pool(2, Mode::Hang);
    let cancel = CancellationToken::new();

    let jobs = discover(&docs, None).unwrap();
    let builder = builder();
    let env = env();
    let run = batch::run(&cancel, jobs, &pool, &builder, &env);
    let trigger = async {
        while gauge.in_flight.load(Ordering::SeqCst) < 2 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        cancel.cancel();
    };
    let (result, ()) = tokio::join!(run, trigger);

    assert_eq!(result.stats.total, 5);
    assert_eq!(result.stats.failed, 5);
    assert!(result
        .outcomes
        .iter()
        .all(|o| o.error == Some(JobError::Cancelled)));
    assert_eq!(pool.available(), pool.size());
    assert_eq!(gauge.in_flight.load(Ordering::SeqCst), 0);
    for o in &result.outcomes {
        assert!(!o.job.output.exists());
    }
}

#[tokio::test]
async fn already_cancelled_batch_converts_nothing() {
    let tmp = TempDir::new().unwrap();
    let src = write(tmp.path(), "a.md", "# A\n");
    let (pool, gauge) = fake_pool(1, Mode::Echo(Duration::ZERO));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let jobs = discover(&src, None).unwrap();
    let result = batch::run(&cancel, jobs, &pool, &builder(), &env()).await;

    assert_eq!(result.outcomes[0].error, Some(JobError::Cancelled));
    assert_eq!(gauge.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unreadable_source_fails_alone() {
    let tmp = TempDir::new().unwrap();
    let docs = tmp.path().join("docs");
    write(&docs, "ok.md", "# Fine\n");
    let binary = docs.join("binary.md");
    fs::write(&binary, [0xff, 0xfe, 0x00, 0x80]).unwrap();
    let (pool, _) = fake_pool(2, Mode::Echo(Duration::ZERO));

    let jobs = discover(&docs, None).unwrap();
    let result = batch::run(&CancellationToken::new(), jobs, &pool, &builder(), &env()).await;

    assert_eq!(result.stats.succeeded, 1);
    let failed = result.outcome_for(&binary).unwrap();
    assert!(
        matches!(failed.error, Some(JobError::ReadFailed { .. })),
        "got: {:?}",
        failed.error
    );
    assert!(docs.join("ok.pdf").exists());
}

#[tokio::test]
async fn closed_pool_fails_every_job() {
    let tmp = TempDir::new().unwrap();
    let src = write(tmp.path(), "a.md", "# A\n");
    let (pool, _) = fake_pool(1, Mode::Echo(Duration::ZERO));
    pool.close().await.unwrap();

    let jobs = discover(&src, None).unwrap();
    let result = batch::run(&CancellationToken::new(), jobs, &pool, &builder(), &env()).await;

    assert!(matches!(
        result.outcomes[0].error,
        Some(JobError::PoolUnavailable { .. })
    ));
}

#[tokio::test]
async fn empty_job_list_is_an_empty_batch() {
    let (pool, _) = fake_pool(1, Mode::Echo(Duration::ZERO));
    let result = batch::run(&CancellationToken::new(), Vec::new(), &pool, &builder(), &env()).await;
    assert!(matches!(result.into_result(), Err(BatchError::EmptyBatch)));
}

#[tokio::test]
async fn single_file_to_explicit_target() {
    let tmp = TempDir::new().unwrap();
    let src = write(tmp.path(), "notes/README.md", "no heading here\n");
    let target = tmp.path().join("dist/handbook.pdf");
    let (pool, _) = fake_pool(1, Mode::Echo(Duration::ZERO));

    let result = convert_path(
        &src,
        Some(target.as_path()),
        config(&ConfigLayer::default()),
        &pool,
        &env(),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(result.stats.succeeded, 1);
    let request = read_request(&target);
    assert_eq!(request.title, "README");
    assert_eq!(request.footer.unwrap().date, "2024-03-15");
}

#[tokio::test]
async fn resolved_settings_reach_every_request() {
    let tmp = TempDir::new().unwrap();
    let docs = tmp.path().join("docs");
    write(&docs, "a.md", "# Alpha\n");
    write(&docs, "b/b.md", "# Beta\n");

    let mut file = ConfigLayer::default();
    file.author.name = Some("Ada".into());
    file.cover.enabled = Some(true);
    file.document.version = Some("1.2".into());
    let (pool, _) = fake_pool(2, Mode::Echo(Duration::ZERO));

    convert_path(
        &docs,
        None,
        config(&file),
        &pool,
        &env(),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    let a = read_request(&docs.join("a.pdf"));
    let b = read_request(&docs.join("b/b.pdf"));
    assert_eq!(a.title, "Alpha");
    assert_eq!(b.title, "Beta");
    for req in [a, b] {
        let cover = req.cover.unwrap();
        assert_eq!(cover.author, "Ada");
        assert_eq!(cover.title, req.title);
        assert_eq!(req.footer.unwrap().status, "1.2");
    }
}

#[tokio::test]
async fn stream_yields_one_outcome_per_job() {
    let tmp = TempDir::new().unwrap();
    let (good, bad) = mixed_tree(tmp.path());
    let (pool, gauge) = fake_pool(2, Mode::Echo(Duration::from_millis(2)));

    let jobs = discover(&tmp.path().join("docs"), Some(tmp.path().join("out").as_path())).unwrap();
    let outcomes: Vec<_> = run_stream(CancellationToken::new(), jobs, pool.clone(), builder(), &env())
        .collect()
        .await;

    assert_eq!(outcomes.len(), good.len() + bad.len());
    let failed: BTreeSet<PathBuf> = outcomes
        .iter()
        .filter(|o| !o.is_success())
        .map(|o| o.job.input.clone())
        .collect();
    assert_eq!(failed, bad);
    assert!(gauge.max_seen.load(Ordering::SeqCst) <= 2);
    assert_eq!(pool.available(), 2);
}

#[tokio::test]
async fn progress_callback_sees_every_job() {
    #[derive(Default)]
    struct Counts {
        started: AtomicUsize,
        completed: AtomicUsize,
        errored: AtomicUsize,
        batch_total: AtomicUsize,
        batch_succeeded: AtomicUsize,
    }

    impl BatchProgressCallback for Counts {
        fn on_batch_start(&self, total_jobs: usize) {
            self.batch_total.store(total_jobs, Ordering::SeqCst);
        }
        fn on_job_start(&self, _job: &Job) {
            self.started.fetch_add(1, Ordering::SeqCst);
        }
        fn on_job_complete(&self, _job: &Job, bytes_written: usize) {
            assert!(bytes_written > 0);
            self.completed.fetch_add(1, Ordering::SeqCst);
        }
        fn on_job_error(&self, _job: &Job, error: &str) {
            assert!(error.contains("conversion failed"));
            self.errored.fetch_add(1, Ordering::SeqCst);
        }
        fn on_batch_complete(&self, _total_jobs: usize, succeeded: usize) {
            self.batch_succeeded.store(succeeded, Ordering::SeqCst);
        }
    }

    let tmp = TempDir::new().unwrap();
    mixed_tree(tmp.path());
    let counts = Arc::new(Counts::default());
    let env = env().with_progress(counts.clone());
    let (pool, _) = fake_pool(3, Mode::Echo(Duration::ZERO));

    let jobs = discover(&tmp.path().join("docs"), Some(tmp.path().join("out").as_path())).unwrap();
    batch::run(&CancellationToken::new(), jobs, &pool, &builder(), &env).await;

    assert_eq!(counts.batch_total.load(Ordering::SeqCst), 7);
    assert_eq!(counts.started.load(Ordering::SeqCst), 7);
    assert_eq!(counts.completed.load(Ordering::SeqCst), 5);
    assert_eq!(counts.errored.load(Ordering::SeqCst), 2);
    assert_eq!(counts.batch_succeeded.load(Ordering::SeqCst), 5);
}
