use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use filesweep_lib::file_search::filters;
use filesweep_lib::{
    locate_file, quick_search, AutoConfirm, DateRange, DeletionEngine, DeletionOutcome,
    FileScanner, FsRemover, NamePattern, NoopResolver, ScanPhase, ScanRequest, SearchConfig,
    Selection, SizeRange,
};
use lazy_static::lazy_static;
use tempfile::TempDir;

lazy_static! {
    static ref TEST_ENV_GUARD: Mutex<()> = Mutex::new(());
}

const TEST_CONFIG_JSON: &str = r#"{
    "worker_threads": 2,
    "content_line_cap": 5,
    "release_wait_ms": 0
}"#;

struct SweepTestEnv {
    root: TempDir,
    _config_dir: TempDir,
    prev_config_override: Option<String>,
}

impl SweepTestEnv {
    fn new() -> Self {
        let root = TempDir::new().expect("temp root");
        let config_dir = TempDir::new().expect("temp config dir");
        let config_path = config_dir.path().join("filesweep.json");
        fs::write(&config_path, TEST_CONFIG_JSON).expect("write config override");

        let prev_config_override = std::env::var("FILESWEEP_CONFIG").ok();
        std::env::set_var("FILESWEEP_CONFIG", &config_path);

        SweepTestEnv {
            root,
            _config_dir: config_dir,
            prev_config_override,
        }
    }

    fn path(&self) -> &Path {
        self.root.path()
    }

    fn create_file(&self, relative: &str, size: usize) -> PathBuf {
        let path = self.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        let mut file = fs::File::create(&path).expect("create file");
        if size > 0 {
            file.write_all(&vec![b'x'; size]).expect("write file");
        }
        path
    }

    fn config(&self) -> SearchConfig {
        SearchConfig::load().expect("config override loads")
    }

    fn engine(&self) -> DeletionEngine<NoopResolver, FsRemover> {
        DeletionEngine::with_parts(NoopResolver, FsRemover, Duration::ZERO)
    }
}

impl Drop for SweepTestEnv {
    fn drop(&mut self) {
        if let Some(prev) = self.prev_config_override.take() {
            std::env::set_var("FILESWEEP_CONFIG", prev);
        } else {
            std::env::remove_var("FILESWEEP_CONFIG");
        }
    }
}

fn acquire_env_guard() -> std::sync::MutexGuard<'static, ()> {
    TEST_ENV_GUARD.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[test]
fn config_override_is_read_from_env() {
    let _guard = acquire_env_guard();
    let env = SweepTestEnv::new();

    let config = env.config();

    assert_eq!(config.worker_threads, 2);
    assert_eq!(config.content_line_cap, 5);
    assert_eq!(config.release_wait(), Duration::ZERO);
    assert_eq!(config.no_match_threshold, 10_000);
}

#[tokio::test]
async fn scan_then_delete_selected_matches() {
    let _guard = acquire_env_guard();
    let env = SweepTestEnv::new();
    env.create_file("logs/app-1.log", 4096);
    env.create_file("logs/app-2.log", 8192);
    env.create_file("logs/nested/app-3.log", 2048);
    let small = env.create_file("logs/tiny.log", 10);
    env.create_file("notes/readme.txt", 4096);

    let request = ScanRequest::new(env.path())
        .size(SizeRange::at_least(1024))
        .name_pattern(NamePattern::from_glob("*.log").expect("valid glob"));
    let report = FileScanner::new(env.config(), AutoConfirm(true))
        .scan(request)
        .expect("scan should succeed");

    assert_eq!(report.phase, ScanPhase::Completed);
    assert_eq!(report.matches.len(), 3, "matches: {:?}", report.matches);
    assert_eq!(report.summary.scanned, 5);
    assert_eq!(report.total_size(), 4096 + 8192 + 2048);

    let selection = Selection::parse("1,3", report.matches.len());
    let reports = env.engine().delete(&report.matches, &selection).await;

    assert_eq!(reports.len(), 2);
    assert!(reports
        .iter()
        .all(|r| r.outcome == DeletionOutcome::Deleted { forced: false }));
    assert!(!report.matches[0].path().exists());
    assert!(report.matches[1].path().exists());
    assert!(!report.matches[2].path().exists());
    assert!(small.exists());
}

#[tokio::test]
async fn deleting_twice_reports_not_found() {
    let _guard = acquire_env_guard();
    let env = SweepTestEnv::new();
    env.create_file("data/a.bin", 100);

    let report = FileScanner::new(env.config(), AutoConfirm(true))
        .scan(ScanRequest::new(env.path().join("data")))
        .expect("scan should succeed");
    let engine = env.engine();

    let first = engine.delete(&report.matches, &Selection::All).await;
    let second = engine.delete(&report.matches, &Selection::All).await;

    assert_eq!(first[0].outcome, DeletionOutcome::Deleted { forced: false });
    assert_eq!(second[0].outcome, DeletionOutcome::NotFound);
}

#[test]
fn filter_text_drives_a_scan() {
    let _guard = acquire_env_guard();
    let env = SweepTestEnv::new();
    env.create_file("reports/q1.csv", 10);
    env.create_file("reports/q2.csv", 10);
    env.create_file("reports/summary.txt", 10);
    fs::write(env.path().join("reports/budget.txt"), "header\nBudget forecast\n").unwrap();

    let request = ScanRequest::new(env.path())
        .size(filters::parse_size_range("-1").unwrap())
        .modified(filters::parse_date_range("2000-01-01", "").unwrap())
        .keywords(filters::parse_keywords("FORECAST"));
    let report = FileScanner::new(env.config(), AutoConfirm(true))
        .scan(request)
        .expect("scan should succeed");

    assert_eq!(report.matches.len(), 1);
    assert!(report.matches[0].path().ends_with("budget.txt"));
}

#[test]
fn quick_search_and_direct_lookup() {
    let _guard = acquire_env_guard();
    let env = SweepTestEnv::new();
    env.create_file("southside.zip", 300);
    env.create_file("southside-old.zip", 100);
    env.create_file("archive/southside.zip", 300);

    let pattern = NamePattern::from_glob("*southside*").unwrap();
    let found = quick_search(
        env.path(),
        &pattern,
        SizeRange::at_least(200),
        DateRange::default(),
    )
    .expect("quick search should succeed");

    assert_eq!(found.len(), 1);
    assert!(found[0].path().ends_with("southside.zip"));
    assert_eq!(found[0].size(), 300);

    let located = locate_file(&env.path().join("archive/southside.zip")).expect("file exists");
    assert_eq!(located.size(), 300);
    assert!(locate_file(&env.path().join("archive")).is_none());
}

#[test]
fn report_serializes_for_scripts() {
    let _guard = acquire_env_guard();
    let env = SweepTestEnv::new();
    env.create_file("one.txt", 1);

    let pattern = NamePattern::from_glob("*.txt").unwrap();
    let request = ScanRequest::new(env.path()).name_pattern(pattern);
    let report = FileScanner::new(env.config(), AutoConfirm(true))
        .scan(request)
        .expect("scan should succeed");
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["phase"], "completed");
    assert_eq!(json["summary"]["matched"], 1);
    assert_eq!(json["matches"][0]["size"], 1);
    assert!(json["matches"][0]["path"]
        .as_str()
        .is_some_and(|p| p.ends_with("one.txt")));

    let outcome = serde_json::to_value(DeletionOutcome::Deleted { forced: true }).unwrap();
    assert_eq!(outcome["status"], "deleted");
    assert_eq!(outcome["forced"], true);
}
