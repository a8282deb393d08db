use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use taskkit_core::{
    from_async_fn, from_fn, ChangeEvent, Error, Executor, Reaction, RegistryBuilder, ReloadHub,
    RunReporter, WatchBinding, WatchLoop, WatcherConfig,
};
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const NO_DEPS: [&str; 0] = [];

#[derive(Default)]
struct CountingReporter {
    failures: AtomicUsize,
    reloads: AtomicUsize,
    triggered: Mutex<Vec<Vec<PathBuf>>>,
}

impl RunReporter for CountingReporter {
    fn watch_triggered(&self, _binding: &str, paths: &[PathBuf]) {
        self.triggered.lock().unwrap().push(paths.to_vec());
    }

    fn watch_run_failed(&self, _binding: &str, _error: &(dyn std::error::Error + 'static)) {
        self.failures.fetch_add(1, Ordering::SeqCst);
    }

    fn reload_sent(&self, _observers: usize) {
        self.reloads.fetch_add(1, Ordering::SeqCst);
    }
}

fn send(events: &mpsc::UnboundedSender<ChangeEvent>, path: &str) {
    events.send(ChangeEvent::new([path])).unwrap();
}

#[test]
fn test_binding_matches_single_level() {
    let binding = WatchBinding::reload(["src/*.js"]).unwrap();
    assert!(binding.matches(Path::new("src/app.js")));
    assert!(!binding.matches(Path::new("src/lib/app.js")));
    assert!(!binding.matches(Path::new("src/app.css")));
}

#[test]
fn test_binding_matches_recursive() {
    let binding = WatchBinding::reload(["demo/**/*", "README.md"]).unwrap();
    assert!(binding.matches(Path::new("demo/index.html")));
    assert!(binding.matches(Path::new("demo/assets/img/logo.png")));
    assert!(binding.matches(Path::new("README.md")));
    assert!(!binding.matches(Path::new("docs/README.md")));
}

#[test]
fn test_binding_rejects_bad_patterns() {
    assert!(matches!(
        WatchBinding::reload(["src/[.js"]),
        Err(Error::Watch(_))
    ));
    assert!(matches!(
        WatchBinding::reload(Vec::<String>::new()),
        Err(Error::Watch(_))
    ));
}

#[test]
fn test_binding_targets() {
    let binding = WatchBinding::reload(["src/*.js", "demo/**/*.html", "README.md"]).unwrap();
    let targets = binding.targets();

    assert_eq!(targets[0].path, PathBuf::from("src"));
    assert!(!targets[0].recursive);
    assert_eq!(targets[1].path, PathBuf::from("demo"));
    assert!(targets[1].recursive);
    assert_eq!(targets[2].path, PathBuf::from("README.md"));
}

#[test]
fn test_gate_only_applies_to_reload() {
    let mut builder = RegistryBuilder::new();
    let lint = builder.register("lint", NO_DEPS, from_fn(|_| Ok(()))).unwrap();
    builder.build().unwrap();

    let reload = WatchBinding::reload(["*.html"]).unwrap().with_gate(vec![lint]);
    assert_eq!(reload.reaction(), &Reaction::Reload { gate: vec![lint] });

    let run = WatchBinding::run(["*.js"], vec![lint]).unwrap().with_gate(vec![]);
    assert_eq!(run.reaction(), &Reaction::Run(vec![lint]));
}

#[tokio::test]
async fn test_runs_for_one_binding_never_overlap() {
    let running = Arc::new(AtomicBool::new(false));
    let overlapped = Arc::new(AtomicBool::new(false));
    let completed = Arc::new(AtomicUsize::new(0));

    let op = {
        let running = Arc::clone(&running);
        let overlapped = Arc::clone(&overlapped);
        let completed = Arc::clone(&completed);
        from_async_fn(move || {
            let running = Arc::clone(&running);
            let overlapped = Arc::clone(&overlapped);
            let completed = Arc::clone(&completed);
            async move {
                if running.swap(true, Ordering::SeqCst) {
                    overlapped.store(true, Ordering::SeqCst);
                }
                tokio::time::sleep(Duration::from_millis(30)).await;
                running.store(false, Ordering::SeqCst);
                completed.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
    };

    let mut builder = RegistryBuilder::new();
    let scripts = builder.register("scripts", NO_DEPS, op).unwrap();
    let executor = Arc::new(Executor::new(Arc::new(builder.build().unwrap())));
    let watch = WatchLoop::new(executor, Arc::new(ReloadHub::default()));

    let binding = WatchBinding::run(["src/*.js"], vec![scripts]).unwrap();
    let (events, receiver) = mpsc::unbounded_channel();
    send(&events, "src/a.js");
    send(&events, "src/b.js");
    send(&events, "src/c.js");
    drop(events);

    watch
        .run_events(vec![binding], receiver, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(completed.load(Ordering::SeqCst), 3);
    assert!(!overlapped.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_triggered_runs_keep_fifo_order() {
    let log: Arc<Mutex<Vec<String>>> = Default::default();
    let mut builder = RegistryBuilder::new();
    let recorded = Arc::clone(&log);
    let styles = builder
        .register(
            "styles",
            NO_DEPS,
            from_fn(move |_| {
                let mut log = recorded.lock().unwrap();
                let n = log.len();
                log.push(format!("run{}", n + 1));
                Ok(())
            }),
        )
        .unwrap();
    let executor = Arc::new(Executor::new(Arc::new(builder.build().unwrap())));
    let watch = WatchLoop::new(executor, Arc::new(ReloadHub::default()));

    let binding = WatchBinding::run(["styles/*.css"], vec![styles]).unwrap();
    let (events, receiver) = mpsc::unbounded_channel();
    send(&events, "styles/a.css");
    send(&events, "scripts/ignored.js");
    send(&events, "styles/b.css");
    drop(events);

    watch
        .run_events(vec![binding], receiver, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(*log.lock().unwrap(), vec!["run1", "run2"]);
}

#[tokio::test]
async fn test_failed_run_does_not_stop_loop() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempts);
    let flaky = from_fn(move |_| {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            Err("syntax error".into())
        } else {
            Ok(())
        }
    });

    let mut builder = RegistryBuilder::new();
    let lint = builder.register("lint", NO_DEPS, flaky).unwrap();
    let reporter = Arc::new(CountingReporter::default());
    let executor = Executor::new(Arc::new(builder.build().unwrap())).with_reporter(reporter.clone());
    let watch = WatchLoop::new(Arc::new(executor), Arc::new(ReloadHub::default()));

    let binding = WatchBinding::run(["src/*.js"], vec![lint]).unwrap();
    let (events, receiver) = mpsc::unbounded_channel();
    send(&events, "src/a.js");
    send(&events, "src/a.js");
    drop(events);

    watch
        .run_events(vec![binding], receiver, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    assert_eq!(reporter.failures.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failing_task_does_not_skip_rest_of_binding() {
    let log: Arc<Mutex<Vec<String>>> = Default::default();
    let mut builder = RegistryBuilder::new();
    let lint = builder
        .register("lint", NO_DEPS, from_fn(|_| Err("lint failed".into())))
        .unwrap();
    let recorded = Arc::clone(&log);
    let bundle = builder
        .register(
            "bundle",
            NO_DEPS,
            from_fn(move |_| {
                recorded.lock().unwrap().push("bundle".to_string());
                Ok(())
            }),
        )
        .unwrap();
    let executor = Arc::new(Executor::new(Arc::new(builder.build().unwrap())));
    let watch = WatchLoop::new(executor, Arc::new(ReloadHub::default()));

    let binding = WatchBinding::run(["src/*.js"], vec![lint, bundle]).unwrap();
    let (events, receiver) = mpsc::unbounded_channel();
    send(&events, "src/app.js");
    drop(events);

    watch
        .run_events(vec![binding], receiver, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(*log.lock().unwrap(), vec!["bundle"]);
}

#[tokio::test]
async fn test_reload_binding_notifies_observers() {
    let executor = Arc::new(Executor::new(Arc::new(RegistryBuilder::new().build().unwrap())));
    let hub = Arc::new(ReloadHub::default());
    let mut observer = hub.subscribe();
    let watch = WatchLoop::new(executor, Arc::clone(&hub));

    let binding = WatchBinding::reload(["demo/**/*"]).unwrap();
    let (events, receiver) = mpsc::unbounded_channel();
    send(&events, "demo/index.html");
    drop(events);

    watch
        .run_events(vec![binding], receiver, CancellationToken::new())
        .await
        .unwrap();

    let signal = observer.try_recv().unwrap();
    assert_eq!(signal.sequence, 1);
    assert_eq!(signal.paths, vec![PathBuf::from("demo/index.html")]);
}

#[tokio::test]
async fn test_failed_gate_skips_reload() {
    let mut builder = RegistryBuilder::new();
    let lint = builder
        .register("lint", NO_DEPS, from_fn(|_| Err("lint failed".into())))
        .unwrap();
    let reporter = Arc::new(CountingReporter::default());
    let executor =
        Arc::new(Executor::new(Arc::new(builder.build().unwrap())).with_reporter(reporter.clone()));
    let hub = Arc::new(ReloadHub::default());
    let mut observer = hub.subscribe();
    let watch = WatchLoop::new(executor, Arc::clone(&hub));

    let binding = WatchBinding::reload(["src/*.js"]).unwrap().with_gate(vec![lint]);
    let (events, receiver) = mpsc::unbounded_channel();
    send(&events, "src/app.js");
    drop(events);

    watch
        .run_events(vec![binding], receiver, CancellationToken::new())
        .await
        .unwrap();

    assert!(observer.try_recv().is_err());
    assert_eq!(reporter.failures.load(Ordering::SeqCst), 1);
    assert_eq!(reporter.reloads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_reload_without_observers_is_not_an_error() {
    let reporter = Arc::new(CountingReporter::default());
    let executor = Arc::new(
        Executor::new(Arc::new(RegistryBuilder::new().build().unwrap()))
            .with_reporter(reporter.clone()),
    );
    let watch = WatchLoop::new(executor, Arc::new(ReloadHub::default()));

    let binding = WatchBinding::reload(["*.html"]).unwrap();
    let (events, receiver) = mpsc::unbounded_channel();
    send(&events, "index.html");
    drop(events);

    watch
        .run_events(vec![binding], receiver, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(reporter.reloads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_one_change_can_trigger_several_bindings() {
    let count = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&count);
    let mut builder = RegistryBuilder::new();
    let docs = builder
        .register(
            "docs",
            NO_DEPS,
            from_fn(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        )
        .unwrap();
    let executor = Arc::new(Executor::new(Arc::new(builder.build().unwrap())));
    let hub = Arc::new(ReloadHub::default());
    let mut observer = hub.subscribe();
    let watch = WatchLoop::new(executor, Arc::clone(&hub));

    let bindings = vec![
        WatchBinding::run(["README.md"], vec![docs]).unwrap(),
        WatchBinding::reload(["*.md"]).unwrap(),
    ];
    let (events, receiver) = mpsc::unbounded_channel();
    send(&events, "README.md");
    drop(events);

    watch
        .run_events(bindings, receiver, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert!(observer.try_recv().is_ok());
}

fn counting_task(count: &Arc<AtomicUsize>, duration: Duration) -> Arc<dyn taskkit_core::Operation> {
    let count = Arc::clone(count);
    from_async_fn(move || {
        let count = Arc::clone(&count);
        async move {
            count.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(duration).await;
            Ok(())
        }
    })
}

#[tokio::test]
async fn test_debounce_merges_burst() {
    let count = Arc::new(AtomicUsize::new(0));
    let mut builder = RegistryBuilder::new();
    let build = builder
        .register("build", NO_DEPS, counting_task(&count, Duration::ZERO))
        .unwrap();
    let reporter = Arc::new(CountingReporter::default());
    let executor = Arc::new(
        Executor::new(Arc::new(builder.build().unwrap())).with_reporter(reporter.clone()),
    );
    let watch = WatchLoop::new(executor, Arc::new(ReloadHub::default())).with_config(WatcherConfig {
        debounce_ms: 60_000,
        ..Default::default()
    });

    let binding = WatchBinding::run(["src/*.js"], vec![build]).unwrap();
    let (events, receiver) = mpsc::unbounded_channel();
    send(&events, "src/a.js");
    send(&events, "src/b.js");
    send(&events, "src/a.js");
    send(&events, "src/c.js");
    drop(events);

    watch
        .run_events(vec![binding], receiver, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert_eq!(
        *reporter.triggered.lock().unwrap(),
        vec![vec![
            PathBuf::from("src/a.js"),
            PathBuf::from("src/b.js"),
            PathBuf::from("src/c.js"),
        ]]
    );
}

#[tokio::test]
async fn test_debounced_changes_during_run_are_queued() {
    let count = Arc::new(AtomicUsize::new(0));
    let mut builder = RegistryBuilder::new();
    let build = builder
        .register("build", NO_DEPS, counting_task(&count, Duration::from_millis(500)))
        .unwrap();
    let executor = Arc::new(Executor::new(Arc::new(builder.build().unwrap())));
    let watch = WatchLoop::new(executor, Arc::new(ReloadHub::default())).with_config(WatcherConfig {
        debounce_ms: 20,
        ..Default::default()
    });

    let binding = WatchBinding::run(["src/*.js"], vec![build]).unwrap();
    let (events, receiver) = mpsc::unbounded_channel();
    let changes = async move {
        send(&events, "src/a.js");
        tokio::time::sleep(Duration::from_millis(200)).await;
        send(&events, "src/b.js");
        tokio::time::sleep(Duration::from_millis(50)).await;
        send(&events, "src/c.js");
    };

    let (result, ()) = tokio::join!(
        watch.run_events(vec![binding], receiver, CancellationToken::new()),
        changes
    );
    result.unwrap();

    assert_eq!(count.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_last_change_of_burst_is_not_lost() {
    let count = Arc::new(AtomicUsize::new(0));
    let mut builder = RegistryBuilder::new();
    let build = builder
        .register("build", NO_DEPS, counting_task(&count, Duration::ZERO))
        .unwrap();
    let reporter = Arc::new(CountingReporter::default());
    let executor = Arc::new(
        Executor::new(Arc::new(builder.build().unwrap())).with_reporter(reporter.clone()),
    );
    let watch = WatchLoop::new(executor, Arc::new(ReloadHub::default())).with_config(WatcherConfig {
        debounce_ms: 50,
        ..Default::default()
    });

    let binding = WatchBinding::run(["src/*.js"], vec![build]).unwrap();
    let (events, receiver) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();
    let changes = {
        let count = Arc::clone(&count);
        let cancel = cancel.clone();
        async move {
            send(&events, "src/a.js");
            send(&events, "src/b.js");
            let waited = tokio::time::timeout(Duration::from_secs(5), async {
                while count.load(Ordering::SeqCst) == 0 {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            })
            .await;
            cancel.cancel();
            drop(events);
            waited.is_ok()
        }
    };

    let (result, flushed) = tokio::join!(watch.run_events(vec![binding], receiver, cancel.clone()), changes);
    result.unwrap();

    assert!(flushed, "the window never closed");
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert_eq!(
        *reporter.triggered.lock().unwrap(),
        vec![vec![PathBuf::from("src/a.js"), PathBuf::from("src/b.js")]]
    );
}

#[tokio::test]
async fn test_cancel_stops_loop() {
    let count = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&count);
    let mut builder = RegistryBuilder::new();
    let build = builder
        .register(
            "build",
            NO_DEPS,
            from_fn(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        )
        .unwrap();
    let executor = Arc::new(Executor::new(Arc::new(builder.build().unwrap())));
    let watch = WatchLoop::new(executor, Arc::new(ReloadHub::default()));

    let binding = WatchBinding::run(["src/*.js"], vec![build]).unwrap();
    let (events, receiver) = mpsc::unbounded_channel();
    send(&events, "src/a.js");
    let cancel = CancellationToken::new();
    cancel.cancel();

    tokio::time::timeout(
        Duration::from_secs(5),
        watch.run_events(vec![binding], receiver, cancel),
    )
    .await
    .expect("loop should stop after cancel")
    .unwrap();

    assert_eq!(count.load(Ordering::SeqCst), 0);
    drop(events);
}

#[tokio::test]
async fn test_missing_watch_path_is_fatal() {
    let dir = TempDir::new().unwrap();
    let executor = Arc::new(Executor::new(Arc::new(RegistryBuilder::new().build().unwrap())));
    let watch = WatchLoop::new(executor, Arc::new(ReloadHub::default())).with_config(WatcherConfig {
        root: dir.path().to_path_buf(),
        ..Default::default()
    });

    let binding = WatchBinding::reload(["missing/*.js"]).unwrap();
    let result = watch.watch(vec![binding], CancellationToken::new()).await;

    assert!(matches!(result, Err(Error::Watch(_))));
}

#[tokio::test]
async fn test_file_write_triggers_binding() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir(dir.path().join("src")).unwrap();

    let count = Arc::new(AtomicUsize::new(0));
    let mut builder = RegistryBuilder::new();
    let build = builder
        .register("build", NO_DEPS, counting_task(&count, Duration::ZERO))
        .unwrap();
    let executor = Arc::new(Executor::new(Arc::new(builder.build().unwrap())));
    let watch = WatchLoop::new(executor, Arc::new(ReloadHub::default())).with_config(WatcherConfig {
        root: dir.path().to_path_buf(),
        ..Default::default()
    });

    let binding = WatchBinding::run(["src/*.js"], vec![build]).unwrap();
    let cancel = CancellationToken::new();
    let writer = {
        let count = Arc::clone(&count);
        let cancel = cancel.clone();
        let file = dir.path().join("src").join("app.js");
        async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            std::fs::write(&file, "export default 1;\n").unwrap();
            let seen = tokio::time::timeout(Duration::from_secs(10), async {
                while count.load(Ordering::SeqCst) == 0 {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                }
            })
            .await;
            cancel.cancel();
            seen.is_ok()
        }
    };

    let (result, seen) = tokio::join!(watch.watch(vec![binding], cancel.clone()), writer);
    result.unwrap();

    assert!(seen, "no run was triggered by the file write");
    assert!(count.load(Ordering::SeqCst) >= 1);
}

#[test]
fn test_targets_resolve_against_root() {
    let executor = Arc::new(Executor::new(Arc::new(RegistryBuilder::new().build().unwrap())));
    let watch = WatchLoop::new(executor, Arc::new(ReloadHub::default())).with_config(WatcherConfig {
        root: PathBuf::from("/project"),
        ..Default::default()
    });

    let bindings = vec![
        WatchBinding::reload(["src/*.js"]).unwrap(),
        WatchBinding::reload(["src/*.js", "README.md"]).unwrap(),
    ];
    let targets = watch.targets(&bindings);

    let paths: Vec<PathBuf> = targets.into_iter().map(|t| t.path).collect();
    assert_eq!(
        paths,
        vec![PathBuf::from("/project/README.md"), PathBuf::from("/project/src")]
    );
}
