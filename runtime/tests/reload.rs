//! Integration tests for configuration reload
//!
//! Covers `Trellis::reload_config`: full pipeline re-runs, single-flight
//! serialization of concurrent reloads, and keeping the previous state
//! serving when a reload fails.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use trellis_core::{ConfigError, Module, SystemEvent};
use trellis_runtime::{InitError, InitReport};
use trellis_testing::{Harness, RecordingModule, ScriptedStorageDriver, ThemeTree};

fn two_themes() -> ThemeTree {
    ThemeTree::new().theme("core", "classic").theme("contrib", "alpha")
}

#[tokio::test]
async fn reload_reruns_the_whole_pipeline_with_new_values() {
    let blog = Arc::new(RecordingModule::new("blog"));
    let harness = Harness::builder(two_themes())
        .module(Arc::clone(&blog) as Arc<dyn Module>)
        .build()
        .unwrap();
    harness.app.initialise(false).await.unwrap();

    harness.config.persist("themes.front", "alpha".into());
    harness.config.persist("database.uri", "memory://replica".into());
    let completions = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&completions);
    let report = harness
        .app
        .reload_config(Some(Box::new(move |_: &InitReport| {
            seen.fetch_add(1, Ordering::SeqCst);
        })))
        .await
        .unwrap();

    assert_eq!(completions.load(Ordering::SeqCst), 1);
    assert_eq!(report.generation, 2);
    assert_eq!(report.active_theme, "alpha");
    assert_eq!(harness.config.load_count(), 1);
    assert_eq!(harness.storage.connects(), ["memory://trellis", "memory://replica"]);
    assert_eq!(blog.init_calls(), 2);
    assert_eq!(blog.fronts_seen(), ["classic", "alpha"]);
    assert_eq!(harness.app.snapshot().unwrap().active_theme.name(), "alpha");
}

#[tokio::test]
async fn reload_rediscovers_themes() {
    let harness = Harness::builder(ThemeTree::new().theme("core", "classic"))
        .build()
        .unwrap();
    harness.app.initialise(false).await.unwrap();

    let added = harness.tree.theme_path("contrib", "gamma");
    std::fs::create_dir_all(&added).unwrap();
    harness.config.persist("themes.front", "gamma".into());
    let report = harness.app.reload_config(None).await.unwrap();

    assert_eq!(report.available_themes, ["classic", "gamma"]);
    assert_eq!(report.active_theme, "gamma");
}

#[tokio::test]
async fn concurrent_reloads_are_serialized() {
    let harness = Harness::builder(two_themes())
        .storage(ScriptedStorageDriver::new().delayed(Duration::from_millis(30)))
        .build()
        .unwrap();
    harness.app.initialise(false).await.unwrap();

    let order = Arc::new(Mutex::new(Vec::new()));
    let completion = |label: &'static str| {
        let order = Arc::clone(&order);
        Some(Box::new(move |report: &InitReport| {
            order.lock().unwrap().push((label, report.generation));
        }) as trellis_runtime::Completion)
    };

    let (first, second) = tokio::join!(
        harness.app.reload_config(completion("first")),
        harness.app.reload_config(completion("second")),
    );

    let mut generations = [first.unwrap().generation, second.unwrap().generation];
    generations.sort_unstable();
    assert_eq!(generations, [2, 3]);
    assert_eq!(harness.config.load_count(), 2);

    let order = order.lock().unwrap().clone();
    assert_eq!(order.len(), 2);
    assert_eq!(order[0].1, 2);
    assert_eq!(order[1].1, 3);
    assert_eq!(harness.app.snapshot().unwrap().generation, 3);
}

#[tokio::test]
async fn is_initialising_reports_an_in_flight_cycle() {
    let harness = Harness::builder(two_themes())
        .storage(ScriptedStorageDriver::new().delayed(Duration::from_millis(50)))
        .build()
        .unwrap();
    let app = Arc::clone(&harness.app);

    let cycle = tokio::spawn(async move { app.initialise(false).await });
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(harness.app.is_initialising());
    cycle.await.unwrap().unwrap();
    assert!(!harness.app.is_initialising());
}

#[tokio::test]
async fn failed_reload_keeps_previous_state_serving() {
    let harness = Harness::builder(two_themes()).build().unwrap();
    harness.app.initialise(false).await.unwrap();

    harness.config.fail_loads(true);
    let completions = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&completions);
    let err = harness
        .app
        .reload_config(Some(Box::new(move |_: &InitReport| {
            seen.fetch_add(1, Ordering::SeqCst);
        })))
        .await
        .unwrap_err();

    assert!(matches!(err, InitError::ConfigLoad(ConfigError::Io { .. })));
    assert_eq!(completions.load(Ordering::SeqCst), 0);
    assert_eq!(harness.terminator.errors().len(), 1);
    assert_eq!(harness.app.snapshot().unwrap().generation, 1);

    harness.config.fail_loads(false);
    let report = harness.app.reload_config(None).await.unwrap();
    assert_eq!(report.generation, 2);
}

#[tokio::test]
async fn reload_to_broken_default_keeps_previous_state() {
    let harness = Harness::builder(two_themes()).build().unwrap();
    harness.app.initialise(false).await.unwrap();

    harness.config.persist("themes.default", "missing".into());
    harness.config.persist("themes.front", "missing".into());
    let err = harness.app.reload_config(None).await.unwrap_err();

    assert_eq!(
        err,
        InitError::DefaultThemeMissing {
            theme: "missing".into()
        }
    );
    let snapshot = harness.app.snapshot().unwrap();
    assert_eq!(snapshot.generation, 1);
    assert_eq!(snapshot.active_theme.name(), "classic");
}

#[tokio::test]
async fn failed_reload_keeps_module_listeners() {
    let listener = Arc::new(RecordingModule::new("listener").subscribing());
    let harness = Harness::builder(two_themes())
        .module(Arc::clone(&listener) as Arc<dyn Module>)
        .build()
        .unwrap();
    harness.app.initialise(false).await.unwrap();
    assert_eq!(harness.app.events().listener_count(), 1);

    harness.config.persist("themes.default", "missing".into());
    harness.config.persist("themes.front", "missing".into());
    harness.app.reload_config(None).await.unwrap_err();

    assert_eq!(harness.app.snapshot().unwrap().generation, 1);
    assert_eq!(harness.app.events().listener_count(), 1);
    assert_eq!(
        listener.received_events(),
        [
            SystemEvent::ModuleInitialised {
                name: "listener".into()
            },
            SystemEvent::Initialised { generation: 1 },
            SystemEvent::ConfigReloaded,
        ]
    );
}
