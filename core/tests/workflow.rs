use async_trait::async_trait;
use normfix_core::error::{CoreError, Result, StoreError};
use normfix_core::{
    BulkFixRequest, Category, DiagnosticSource, FileFilter, LintRun, MemoryStore, NormConfig,
    SourceStore, TextSource, Workspace,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use walkdir::WalkDir;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Just enough of norminette to drive a scan-fix-rescan cycle: long lines,
/// trailing whitespace and functions named `ft_big*`.
struct MiniLint;

fn width(line: &str) -> usize {
    line.chars()
        .fold(0, |w, c| if c == '\t' { w + 4 - w % 4 } else { w + 1 })
}

#[async_trait]
impl DiagnosticSource for MiniLint {
    fn name(&self) -> String {
        "MiniLint".to_string()
    }

    async fn run(&self, project_path: &Path) -> Result<LintRun> {
        let mut run = LintRun::default();
        for entry in WalkDir::new(project_path).sort_by_file_name() {
            let entry = entry.map_err(|e| CoreError::Scanner(e.to_string()))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("c") {
                continue;
            }
            let rel = path
                .strip_prefix(project_path)
                .map_err(|e| CoreError::Scanner(e.to_string()))?
                .to_string_lossy()
                .into_owned();
            let text = std::fs::read_to_string(path)?;
            run.files.push(rel.clone());
            for (i, line) in text.lines().enumerate() {
                let n = i + 1;
                if line.starts_with("int\tft_big") {
                    run.output
                        .push_str(&format!("{}:{}:1: TOO_MANY_LINES: too many lines (30/25)\n", rel, n));
                }
                if width(line) > 80 {
                    run.output.push_str(&format!(
                        "{}:{}:81: TOO_LONG_LINE: line too long ({}/80)\n",
                        rel,
                        n,
                        width(line)
                    ));
                }
                if line.ends_with([' ', '\t']) && !line.trim().is_empty() {
                    run.output
                        .push_str(&format!("{}:{}:{}: SPC_BEFORE_NL: space before newline\n", rel, n, line.len()));
                }
            }
        }
        Ok(run)
    }
}

struct SlowSource;

#[async_trait]
impl DiagnosticSource for SlowSource {
    fn name(&self) -> String {
        "SlowSource".to_string()
    }

    async fn run(&self, _project_path: &Path) -> Result<LintRun> {
        tokio::time::sleep(Duration::from_millis(500)).await;
        Ok(LintRun::default())
    }
}

/// Memory store whose reads take a while, so bulk fixes overlap a deadline.
struct SlowStore {
    inner: MemoryStore,
    delay: Duration,
}

#[async_trait]
impl SourceStore for SlowStore {
    async fn read(&self, path: &str) -> std::result::Result<String, StoreError> {
        tokio::time::sleep(self.delay).await;
        self.inner.read(path).await
    }

    async fn write(&self, path: &str, original: &str, contents: &str) -> std::result::Result<(), StoreError> {
        self.inner.write(path, original, contents).await
    }

    async fn restore(&self, path: &str) -> std::result::Result<(), StoreError> {
        self.inner.restore(path).await
    }
}

const BIG: &str = "int\tft_big(void)\n\
{\n\
\tint\tx;   \n\
\tx = ft_compute(first_argument, second_argument, third_argument, fourth_argument);\n\
\treturn (x);\n\
}\n";

fn project() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("src")).unwrap();
    std::fs::write(dir.path().join("src/big.c"), BIG).unwrap();
    std::fs::write(dir.path().join("src/ok.c"), "int\tg_x;\n").unwrap();
    dir
}

#[tokio::test]
async fn scan_fix_rescan_on_disk() {
    init_tracing();
    let dir = project();
    let mut ws = Workspace::open(dir.path(), NormConfig::default()).unwrap();
    ws.register_source(MiniLint);

    let first = ws.scan(dir.path()).await.unwrap();
    assert_eq!(first.summary.total_files, 2);
    assert_eq!(first.summary.ok_files, 1);
    assert_eq!(first.summary.total_errors, 3);
    assert_eq!(first.summary.auto_fixable_errors, 2);

    let preview = ws.preview_fix(first.scan_id, "src/big.c").await.unwrap();
    assert_eq!(preview.changes_made, 2);
    assert!(preview.diff_text.starts_with("--- a/src/big.c"));
    assert_eq!(std::fs::read_to_string(dir.path().join("src/big.c")).unwrap(), BIG);

    let applied = ws.apply_fix(first.scan_id, "src/big.c").await.unwrap();
    assert_eq!(applied.changes_made, 2);
    assert_eq!(applied.unresolved, 0);
    assert_eq!(applied.remaining.error_count(), 1);

    let fixed = std::fs::read_to_string(dir.path().join("src/big.c")).unwrap();
    assert_eq!(
        fixed,
        "int\tft_big(void)\n{\n\tint\tx;\n\
         \tx = ft_compute(first_argument, second_argument, third_argument,\n\
         \t\tfourth_argument);\n\treturn (x);\n}\n"
    );

    let second = ws.scan(dir.path()).await.unwrap();
    assert_ne!(second.scan_id, first.scan_id);
    assert_eq!(second.summary.total_errors, 1);
    let detail = ws.get_file(second.scan_id, "src/big.c").await.unwrap();
    let remaining = &detail.by_category[&Category::FuncLength];
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].line, 1);

    // A fix against the stale snapshot is refused rather than misapplied.
    let again = ws.apply_fix(first.scan_id, "src/big.c").await.unwrap();
    assert_eq!(again.changes_made, 0);

    ws.restore("src/big.c").await.unwrap();
    assert_eq!(std::fs::read_to_string(dir.path().join("src/big.c")).unwrap(), BIG);
}

#[tokio::test]
async fn disabled_backups_cannot_restore() {
    let dir = project();
    let config = NormConfig::from_yaml_str("backup:\n  enabled: false\n").unwrap();
    let mut ws = Workspace::open(dir.path(), config).unwrap();
    ws.register_source(MiniLint);

    let scan = ws.scan(dir.path()).await.unwrap();
    ws.apply_fix(scan.scan_id, "src/big.c").await.unwrap();
    assert!(!dir.path().join(".norminette_backups").exists());
    assert!(matches!(ws.restore("src/big.c").await, Err(CoreError::Store(_))));
}

#[tokio::test]
async fn concurrent_fixes_of_one_file_apply_once() {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    store.insert("src/big.c", BIG);
    let output = "src/big.c:3:9: SPC_BEFORE_NL: space before newline\n\
                  src/big.c:4:81: TOO_LONG_LINE: line too long (85/80)\n";
    let mut ws = Workspace::new(NormConfig::default(), store.clone());
    ws.register_source(TextSource::new(output));
    let ws = Arc::new(ws);
    let scan_id = ws.scan("proj").await.unwrap().scan_id;

    let mut set = tokio::task::JoinSet::new();
    for _ in 0..2 {
        let ws = Arc::clone(&ws);
        set.spawn(async move { ws.apply_fix(scan_id, "src/big.c").await.unwrap().changes_made });
    }
    let mut total = 0;
    while let Some(changes) = set.join_next().await {
        total += changes.unwrap();
    }
    assert_eq!(total, 2);
    assert_eq!(store.writes(), 1);
}

#[tokio::test]
async fn bulk_fix_reports_per_file() {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    store.insert("a.c", BIG);
    store.insert("b.c", BIG);
    store.insert("c.c", BIG);
    store.set_unwritable("c.c");
    let output = "a.c:3:9: SPC_BEFORE_NL: space before newline\n\
                  b.c:1:1: TOO_MANY_LINES: too many lines (30/25)\n\
                  c.c:3:9: SPC_BEFORE_NL: space before newline\n";
    let mut ws = Workspace::new(NormConfig::default(), store.clone());
    ws.register_source(TextSource::new(output));
    let scan_id = ws.scan("proj").await.unwrap().scan_id;

    let report = ws
        .bulk_fix(
            scan_id,
            BulkFixRequest::new(["a.c", "b.c", "c.c"])
                .auto_fixable_only(false)
                .with_timeout(Duration::from_secs(5)),
        )
        .await
        .unwrap();
    // b.c has nothing safe to change; c.c cannot be written.
    assert_eq!(report.total_files_processed, 2);
    assert_eq!(report.total_changes, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].filepath, "c.c");
    assert!(report.pending.is_empty());
    assert_eq!(report.outcomes[0].filepath, "a.c");
    assert_eq!(report.outcomes[1].changes_made, 0);
}

#[tokio::test]
async fn custom_rules_from_a_rules_dir() {
    let rules = tempfile::tempdir().unwrap();
    std::fs::write(
        rules.path().join("house.yaml"),
        "name: house\nversion: \"1\"\nrules:\n  - id: HOUSE_TRAILING\n    category: SPACING\n    severity: WARNING\n    auto_fixable: true\n    transform: trim_trailing\n",
    )
    .unwrap();

    let config = NormConfig {
        rules_dir: Some(rules.path().to_path_buf()),
        ..NormConfig::default()
    };
    let store = Arc::new(MemoryStore::new());
    store.insert("a.c", "int\tx;  \n");
    let mut ws = Workspace::from_config(config, store.clone()).unwrap();
    ws.register_source(TextSource::new("a.c:1:7: HOUSE_TRAILING: trailing blanks\n"));

    let scan_id = ws.scan("proj").await.unwrap().scan_id;
    let fixable = ws
        .list_files(scan_id, &FileFilter::default().with_category(Category::Spacing).auto_fixable_only())
        .await
        .unwrap();
    assert_eq!(fixable.len(), 1);

    ws.apply_fix(scan_id, "a.c").await.unwrap();
    assert_eq!(store.get("a.c").unwrap(), "int\tx;\n");
}

#[tokio::test]
async fn invalid_config_is_rejected() {
    let config = NormConfig {
        max_workers: 0,
        ..NormConfig::default()
    };
    assert!(matches!(
        Workspace::from_config(config, Arc::new(MemoryStore::new())),
        Err(CoreError::Config(_))
    ));
}

#[tokio::test]
async fn slow_scans_time_out() {
    let mut ws = Workspace::new(NormConfig::default(), Arc::new(MemoryStore::new()));
    ws.register_source(SlowSource);
    let err = ws
        .scan_with_timeout("proj", Some(Duration::from_millis(20)))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::ScanTimeout { millis: 20, .. }));
}

#[tokio::test]
async fn two_long_lines_fixed_function_length_stays() {
    let dir = tempfile::tempdir().unwrap();
    let source = format!(
        "int\tft_big_two(void)\n{{\n\tx ={}1;\n\
         \tx = ft_compute(first_argument, second_argument, third_argument, fourth_argument);\n\
         \treturn (x);\n}}\n",
        " ".repeat(80)
    );
    std::fs::write(dir.path().join("two.c"), &source).unwrap();
    let mut ws = Workspace::open(dir.path(), NormConfig::default()).unwrap();
    ws.register_source(MiniLint);

    let first = ws.scan(dir.path()).await.unwrap();
    assert_eq!(first.summary.total_errors, 3);
    let applied = ws.apply_fix(first.scan_id, "two.c").await.unwrap();
    assert_eq!(applied.changes_made, 2);

    let second = ws.scan(dir.path()).await.unwrap();
    let detail = ws.get_file(second.scan_id, "two.c").await.unwrap();
    assert_eq!(detail.error_count, 1);
    assert_eq!(detail.by_category[&Category::FuncLength][0].line, 1);
    assert!(!detail.by_category.contains_key(&Category::LineLength));
}

#[tokio::test]
async fn bulk_fix_counts_clean_files_as_processed() {
    let store = Arc::new(MemoryStore::new());
    store.insert("a.c", "int\tx;  \nint\ty;\t\n");
    store.insert("c.c", "int\tz;\n");
    let output = "a.c:1:7: SPC_BEFORE_NL: space before newline\n\
                  a.c:2:7: SPC_BEFORE_NL: space before newline\n\
                  b.c:1:1: SPC_BEFORE_NL: space before newline\n";
    let mut ws = Workspace::new(NormConfig::default(), store.clone());
    ws.register_source(TextSource::new(output).with_files(["a.c", "b.c", "c.c"]));
    let scan_id = ws.scan("proj").await.unwrap().scan_id;

    let report = ws
        .bulk_fix(scan_id, BulkFixRequest::new(["a.c", "b.c", "c.c"]).auto_fixable_only(false))
        .await
        .unwrap();
    assert_eq!(report.total_files_processed, 2);
    assert_eq!(report.total_changes, 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].filepath, "b.c");
    assert_eq!(store.get("a.c").unwrap(), "int\tx;\nint\ty;\n");
}

#[tokio::test]
async fn bulk_fix_deadline_keeps_finished_files_and_reports_the_rest_pending() {
    init_tracing();
    let store = Arc::new(SlowStore {
        inner: MemoryStore::new(),
        delay: Duration::from_millis(200),
    });
    let mut output = String::new();
    let files: Vec<String> = (0..6).map(|i| format!("f{}.c", i)).collect();
    for f in &files {
        store.inner.insert(f.as_str(), "int\tx;  \n");
        output.push_str(&format!("{}:1:7: SPC_BEFORE_NL: space before newline\n", f));
    }
    let config = NormConfig {
        max_workers: 2,
        ..NormConfig::default()
    };
    let mut ws = Workspace::new(config, store.clone());
    ws.register_source(TextSource::new(output));
    let scan_id = ws.scan("proj").await.unwrap().scan_id;

    // Two waves of 200ms reads fit before anything is cut off; the third
    // wave has not started when the 300ms deadline passes.
    let report = ws
        .bulk_fix(
            scan_id,
            BulkFixRequest::new(files.clone()).with_timeout(Duration::from_millis(300)),
        )
        .await
        .unwrap();
    assert_eq!(report.total_files_processed, 4);
    assert_eq!(report.total_changes, 4);
    assert!(report.failures.is_empty());
    assert_eq!(report.pending, vec!["f4.c".to_string(), "f5.c".to_string()]);
    for f in &files[..4] {
        assert_eq!(store.inner.get(f).unwrap(), "int\tx;\n");
    }
    for f in &files[4..] {
        assert_eq!(store.inner.get(f).unwrap(), "int\tx;  \n");
    }
    // Only the fixed files dropped out of the summary.
    assert_eq!(report.summary.error_files, 2);
}
