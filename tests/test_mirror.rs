// tests/test_mirror.rs
//
// End-to-end tests of MirrorService against in-memory stores.

mod common;

use std::io;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use common::{test_config, MemoryStore};
use s3mirror::{MirrorService, ObjectStore};
use tokio_util::sync::CancellationToken;

fn service(source: &Arc<MemoryStore>, target: &Arc<MemoryStore>, cfg: s3mirror::MirrorConfig) -> MirrorService {
    let source: Arc<dyn ObjectStore> = source.clone();
    let target: Arc<dyn ObjectStore> = target.clone();
    MirrorService::new(source, target, cfg)
}

/// Collects formatted log lines for assertions.
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn source_with(n: usize) -> MemoryStore {
    (0..n).fold(MemoryStore::new("src"), |store, i| {
        store.with_object(&format!("obj-{i:04}"), format!("payload {i}").as_bytes())
    })
}

#[tokio::test]
async fn copies_everything_into_an_empty_target() -> Result<()> {
    let source = Arc::new(
        MemoryStore::new("src")
            .with_object("a.txt", b"alpha")
            .with_object("dir/b.txt", b"bravo!"),
    );
    let target = Arc::new(MemoryStore::new("dst"));

    let stats = service(&source, &target, test_config(4, "", "")).mirror().await?;

    assert_eq!(stats.total_objects, 2);
    assert_eq!(stats.copied_objects, 2);
    assert_eq!(stats.skipped_objects, 0);
    assert_eq!(stats.errors, 0);
    assert_eq!(stats.bytes_transferred, 11);
    assert!(stats.is_balanced());
    assert_eq!(target.keys(), vec!["a.txt", "dir/b.txt"]);
    assert_eq!(target.data("dir/b.txt").unwrap(), b"bravo!");
    Ok(())
}

#[tokio::test]
async fn second_run_skips_everything() -> Result<()> {
    let source = Arc::new(source_with(25));
    let target = Arc::new(MemoryStore::new("dst"));
    let svc = service(&source, &target, test_config(5, "", ""));

    let first = svc.mirror().await?;
    assert_eq!(first.copied_objects, 25);

    let second = svc.mirror().await?;
    assert_eq!(second.total_objects, 25);
    assert_eq!(second.copied_objects, 0);
    assert_eq!(second.skipped_objects, 25);
    assert_eq!(second.bytes_transferred, 0);
    assert!(second.is_balanced());
    assert_eq!(target.puts.load(Ordering::SeqCst), 25);
    Ok(())
}

#[tokio::test]
async fn skip_decision_follows_fingerprint() -> Result<()> {
    let source = Arc::new(
        MemoryStore::new("src")
            .with_fingerprint("same.bin", b"1", "abc")
            .with_fingerprint("changed.bin", b"2", "abc"),
    );
    let target = Arc::new(
        MemoryStore::new("dst")
            .with_fingerprint("same.bin", b"1", "abc")
            .with_fingerprint("changed.bin", b"old", "xyz"),
    );

    let stats = service(&source, &target, test_config(2, "", "")).mirror().await?;

    assert_eq!(stats.skipped_objects, 1);
    assert_eq!(stats.copied_objects, 1);
    assert_eq!(target.data("changed.bin").unwrap(), b"2");
    assert_eq!(source.gets.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn dry_run_never_stores_or_counts_bytes() -> Result<()> {
    let source = Arc::new(source_with(10).with_object("already", b"there"));
    let target = Arc::new(MemoryStore::new("dst").with_object("already", b"there").read_only());
    let mut cfg = test_config(3, "", "");
    cfg.dry_run = true;

    let stats = service(&source, &target, cfg).mirror().await?;

    assert_eq!(stats.total_objects, 11);
    assert_eq!(stats.copied_objects, 10);
    assert_eq!(stats.skipped_objects, 1);
    assert_eq!(stats.bytes_transferred, 0);
    assert_eq!(stats.errors, 0);
    assert_eq!(source.gets.load(Ordering::SeqCst), 0);
    assert_eq!(target.puts.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test]
async fn dry_run_reports_planned_copies_at_default_verbosity() -> Result<()> {
    let source = Arc::new(MemoryStore::new("src").with_object("a.txt", b"a").with_object("b.txt", b"bb"));
    let target = Arc::new(MemoryStore::new("dst").read_only());
    let mut cfg = test_config(2, "", "");
    cfg.dry_run = true;

    let logs = LogBuffer::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(cfg.log_filter(0)))
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let stats = service(&source, &target, cfg).mirror().await?;
    assert_eq!(stats.copied_objects, 2);

    let out = logs.contents();
    assert!(out.contains("Starting mirror"), "{out}");
    assert!(out.contains("DRY RUN MODE"), "{out}");
    assert!(out.contains("[DRY RUN] Would copy: a.txt -> a.txt"), "{out}");
    assert!(out.contains("[DRY RUN] Would copy: b.txt -> b.txt"), "{out}");
    Ok(())
}

#[tokio::test]
async fn one_failed_fetch_does_not_stop_the_run() -> Result<()> {
    let source = Arc::new(source_with(20).failing_get("obj-0007"));
    let target = Arc::new(MemoryStore::new("dst").with_object("obj-0003", b"payload 3"));

    let stats = service(&source, &target, test_config(4, "", "")).mirror().await?;

    assert_eq!(stats.errors, 1);
    assert_eq!(stats.skipped_objects, 1);
    assert_eq!(stats.copied_objects, 18);
    assert!(stats.is_balanced());
    assert!(stats.has_errors());
    assert!(target.data("obj-0007").is_none());
    assert_eq!(target.keys().len(), 19);
    Ok(())
}

#[tokio::test]
async fn failed_store_is_counted_as_an_error() -> Result<()> {
    let source = Arc::new(source_with(5));
    let target = Arc::new(MemoryStore::new("dst").failing_put("obj-0002"));

    let stats = service(&source, &target, test_config(2, "", "")).mirror().await?;

    assert_eq!(stats.errors, 1);
    assert_eq!(stats.copied_objects, 4);
    assert_eq!(stats.bytes_transferred, 4 * "payload 0".len() as u64);
    Ok(())
}

#[tokio::test]
async fn stat_error_on_target_is_treated_as_absent() -> Result<()> {
    let source = Arc::new(MemoryStore::new("src").with_object("locked.txt", b"data"));
    // Same content already present, but HEAD fails: we copy rather than skip.
    let target = Arc::new(
        MemoryStore::new("dst")
            .with_object("locked.txt", b"data")
            .failing_stat("locked.txt"),
    );

    let stats = service(&source, &target, test_config(1, "", "")).mirror().await?;

    assert_eq!(stats.copied_objects, 1);
    assert_eq!(stats.skipped_objects, 0);
    assert_eq!(stats.errors, 0);
    assert_eq!(target.puts.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn listing_failure_is_fatal() {
    let source = Arc::new(source_with(3).failing_list());
    let target = Arc::new(MemoryStore::new("dst").read_only());

    let err = service(&source, &target, test_config(2, "", "")).mirror().await.unwrap_err();

    assert!(format!("{err:#}").contains("failed to list source objects"));
    assert_eq!(target.stats.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn target_prefix_is_prepended() -> Result<()> {
    let source = Arc::new(MemoryStore::new("src").with_object("a.txt", b"a"));
    let target = Arc::new(MemoryStore::new("dst"));

    service(&source, &target, test_config(1, "", "backup/")).mirror().await?;

    assert_eq!(target.keys(), vec!["backup/a.txt"]);
    Ok(())
}

#[tokio::test]
async fn source_prefix_filters_listing() -> Result<()> {
    let source = Arc::new(
        MemoryStore::new("src")
            .with_object("logs/1", b"x")
            .with_object("logs/2", b"y")
            .with_object("data/1", b"z"),
    );
    let target = Arc::new(MemoryStore::new("dst"));

    let stats = service(&source, &target, test_config(2, "logs/", "mirror/")).mirror().await?;

    assert_eq!(stats.total_objects, 2);
    assert_eq!(target.keys(), vec!["mirror/logs/1", "mirror/logs/2"]);
    Ok(())
}

#[tokio::test]
async fn empty_source_completes_with_zero_stats() -> Result<()> {
    let source = Arc::new(MemoryStore::new("src"));
    let target = Arc::new(MemoryStore::new("dst").read_only());

    let stats = service(&source, &target, test_config(8, "", "")).mirror().await?;

    assert_eq!(stats.total_objects, 0);
    assert!(stats.is_balanced());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn many_workers_lose_no_updates() -> Result<()> {
    let source = Arc::new(source_with(1_000));
    let target = Arc::new(MemoryStore::new("dst"));

    let stats = service(&source, &target, test_config(20, "", "")).mirror().await?;

    assert_eq!(stats.total_objects, 1_000);
    assert_eq!(stats.copied_objects, 1_000);
    assert_eq!(stats.errors, 0);
    assert_eq!(target.keys().len(), 1_000);
    assert_eq!(target.puts.load(Ordering::SeqCst), 1_000);
    assert_eq!(target.stats.load(Ordering::SeqCst), 1_000);
    Ok(())
}

#[tokio::test]
async fn cancelled_run_still_accounts_for_every_object() -> Result<()> {
    let source = Arc::new(source_with(50));
    let target = Arc::new(MemoryStore::new("dst").read_only());
    let token = CancellationToken::new();
    token.cancel();

    let svc = service(&source, &target, test_config(4, "", "")).with_cancellation(token);
    let stats = svc.mirror().await?;

    assert_eq!(stats.total_objects, 50);
    assert_eq!(stats.errors, 50);
    assert_eq!(stats.copied_objects, 0);
    assert!(stats.is_balanced());
    assert_eq!(source.gets.load(Ordering::SeqCst), 0);
    Ok(())
}
