//! Dependency-gated boot orchestration with real `sh -c` processes.

use std::sync::Arc;
use std::time::Duration;
use warden::orchestrator::{LaunchStart, WaitOutcome};
use warden::service::{RunState, ServiceDefinition, ServiceKind};
use warden::supervisor::StartOutcome;
use warden::{DaemonConfig, ProvidesPolicy, Supervisor};

fn config(interval: &str, attempts: u32, policy: ProvidesPolicy) -> DaemonConfig {
    DaemonConfig {
        dependency_poll_interval: interval.to_string(),
        dependency_poll_attempts: attempts,
        provides_policy: policy,
        stop_grace_period: "2s".to_string(),
        ..DaemonConfig::default()
    }
}

fn build(config: DaemonConfig, definitions: Vec<ServiceDefinition>) -> Arc<Supervisor> {
    Supervisor::builder()
        .config(config)
        .definitions(definitions)
        .build()
        .expect("Failed to build supervisor")
}

#[tokio::test]
async fn provider_then_dependent_both_start() {
    let sup = build(
        config("100ms", 50, ProvidesPolicy::Attempted),
        vec![
            ServiceDefinition::new("a", ServiceKind::Oneshot, "sleep 0.2").with_provides(["net"]),
            ServiceDefinition::new("b", ServiceKind::Simple, "sleep 30").with_needs(["net"]),
        ],
    );

    let report = sup.launch_all().await;
    assert_eq!(report.outcomes.len(), 2);

    let a = report.outcome("a").unwrap();
    assert_eq!(a.start, LaunchStart::Started(StartOutcome::Completed));
    assert!(a.provided);

    let b = report.outcome("b").unwrap();
    assert_eq!(b.wait, WaitOutcome::Satisfied);
    assert!(matches!(b.start, LaunchStart::Started(StartOutcome::Tracked { .. })));

    let a_record = sup.registry().get("a").unwrap().snapshot();
    let b_record = sup.registry().get("b").unwrap().snapshot();
    assert_eq!(a_record.state, RunState::Started);
    assert_eq!(b_record.state, RunState::Started);
    assert_ne!(b_record.last_known_pid, 0);
    // b began starting only after a had finished and marked `net`
    assert!(a_record.last_action_at <= b_record.last_action_at);
    assert!(report.capabilities.contains("net"));

    sup.check_and_stop("b").await.unwrap();
    let entry = sup.registry().get("b").unwrap();
    for _ in 0..100 {
        if entry.last_known_pid() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(entry.last_known_pid(), 0);
    assert_eq!(entry.state(), RunState::Stopped);
}

#[tokio::test]
async fn unsatisfiable_need_gives_up_and_starts_anyway() {
    let sup = build(
        config("10ms", 5, ProvidesPolicy::Attempted),
        vec![
            ServiceDefinition::new("p", ServiceKind::Oneshot, "true")
                .with_provides(["c"])
                .with_auto_start(false),
            ServiceDefinition::new("w", ServiceKind::Oneshot, "true").with_needs(["c"]),
        ],
    );

    let report = tokio::time::timeout(Duration::from_secs(5), sup.launch_all())
        .await
        .expect("launcher must not hang on a missing capability");

    assert_eq!(report.outcomes.len(), 1);
    let w = report.outcome("w").unwrap();
    assert_eq!(
        w.wait,
        WaitOutcome::GaveUp {
            missing: vec!["c".to_string()]
        }
    );
    assert_eq!(w.start, LaunchStart::Started(StartOutcome::Completed));
    assert_eq!(report.gave_up().count(), 1);
    assert_eq!(sup.registry().get("p").unwrap().state(), RunState::NotStarted);
}

#[tokio::test]
async fn failed_provider_still_marks_its_capability() {
    let sup = build(
        config("10ms", 200, ProvidesPolicy::Attempted),
        vec![
            ServiceDefinition::new("f", ServiceKind::Oneshot, "exit 1").with_provides(["x"]),
            ServiceDefinition::new("g", ServiceKind::Oneshot, "true").with_needs(["x"]),
        ],
    );

    let report = sup.launch_all().await;
    let f = report.outcome("f").unwrap();
    assert!(matches!(f.start, LaunchStart::Failed(_)));
    assert!(f.provided);
    assert_eq!(report.outcome("g").unwrap().wait, WaitOutcome::Satisfied);
    assert_eq!(report.failed().count(), 1);
    // Every unit reported exactly once
    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(sup.registry().get("f").unwrap().state(), RunState::Errored);
}

#[tokio::test]
async fn confirmed_policy_only_marks_started_providers() {
    let sup = build(
        config("10ms", 10, ProvidesPolicy::Confirmed),
        vec![
            ServiceDefinition::new("f", ServiceKind::Oneshot, "exit 1").with_provides(["x"]),
            ServiceDefinition::new("g", ServiceKind::Oneshot, "true").with_needs(["x"]),
        ],
    );

    let report = sup.launch_all().await;
    assert!(!report.outcome("f").unwrap().provided);
    assert!(!report.outcome("g").unwrap().wait.is_satisfied());
    assert!(!report.capabilities.contains("x"));
}

#[tokio::test]
async fn already_started_service_is_skipped_but_provides() {
    let sup = build(
        config("10ms", 10, ProvidesPolicy::Attempted),
        vec![ServiceDefinition::new("s", ServiceKind::Oneshot, "true").with_provides(["fs"])],
    );
    let entry = sup.registry().get("s").unwrap();
    sup.processes().start(&entry, false).await.unwrap();

    let report = sup.launch_all().await;
    let s = report.outcome("s").unwrap();
    assert_eq!(s.start, LaunchStart::Skipped(RunState::Started));
    assert!(s.provided);
    assert!(report.capabilities.contains("fs"));
}

#[tokio::test]
async fn independent_services_start_concurrently() {
    let sup = build(
        config("10ms", 10, ProvidesPolicy::Attempted),
        (0..4)
            .map(|i| ServiceDefinition::new(format!("s{}", i), ServiceKind::Oneshot, "sleep 0.5"))
            .collect(),
    );

    let started = std::time::Instant::now();
    let report = sup.launch_all().await;
    assert_eq!(report.started().count(), 4);
    assert!(started.elapsed() < Duration::from_secs(2));
}
