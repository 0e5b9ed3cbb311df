/// Property-based tests for the service record state machine
///
/// Random sequences of start, launch, failure, exit and stop events are
/// applied to one registry entry. After every step:
/// - A `Started` record never moves straight back to `NotStarted`
/// - A refused start leaves the record untouched
/// - `last_action_at` and the run id never go backwards
/// - A record that is `Starting` tracks no PID
/// - Stop or exit results reported for an earlier run change nothing
use proptest::prelude::*;
use std::sync::Arc;
use warden::service::{Registry, RunState, ServiceDefinition, ServiceEntry, ServiceKind};

#[derive(Debug, Clone)]
enum Event {
    BeginStart { rearm: bool },
    /// `stale` reports for the previous run id
    Launched { pid: u32, stale: bool },
    LaunchFailed { stale: bool },
    Exited { stale: bool },
    StopFinished { ok: bool, stale: bool },
}

fn event_strategy() -> impl Strategy<Value = Event> {
    prop_oneof![
        any::<bool>().prop_map(|rearm| Event::BeginStart { rearm }),
        (1000u32..50000u32, any::<bool>()).prop_map(|(pid, stale)| Event::Launched { pid, stale }),
        any::<bool>().prop_map(|stale| Event::LaunchFailed { stale }),
        any::<bool>().prop_map(|stale| Event::Exited { stale }),
        (any::<bool>(), any::<bool>()).prop_map(|(ok, stale)| Event::StopFinished { ok, stale }),
    ]
}

fn entry() -> Arc<ServiceEntry> {
    let registry = Registry::from_definitions(vec![ServiceDefinition::new(
        "prop",
        ServiceKind::Simple,
        "sleep 1",
    )]);
    registry.get("prop").expect("entry exists")
}

fn run_id_for(entry: &ServiceEntry, stale: bool) -> u64 {
    let current = entry.snapshot().run_id;
    if stale {
        current.saturating_sub(1)
    } else {
        current
    }
}

fn apply(entry: &ServiceEntry, event: &Event) -> Option<bool> {
    match event {
        Event::BeginStart { rearm } => Some(entry.begin_start(*rearm).is_ok()),
        Event::Launched { pid, stale } => {
            entry.mark_started(run_id_for(entry, *stale), Some(*pid));
            None
        }
        Event::LaunchFailed { stale } => {
            entry.mark_errored(run_id_for(entry, *stale), "launch failed".to_string());
            None
        }
        Event::Exited { stale } => {
            entry.mark_exited(run_id_for(entry, *stale), None);
            None
        }
        Event::StopFinished { ok, stale } => {
            let outcome = if *ok {
                Ok(())
            } else {
                Err("shutdown failed".to_string())
            };
            entry.mark_stopped(run_id_for(entry, *stale), outcome);
            None
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn record_invariants_hold(events in prop::collection::vec(event_strategy(), 1..60)) {
        let entry = entry();

        for event in &events {
            let before = entry.snapshot();
            let started = apply(&entry, event);
            let after = entry.snapshot();

            prop_assert!(
                !(before.state == RunState::Started && after.state == RunState::NotStarted),
                "Started went back to NotStarted on {:?}",
                event
            );
            if started == Some(false) {
                prop_assert_eq!(&before, &after, "refused start modified the record");
            }
            prop_assert!(after.last_action_at >= before.last_action_at);
            prop_assert!(after.run_id >= before.run_id);
            if after.state == RunState::Starting {
                prop_assert_eq!(after.last_known_pid, 0);
            }
            let stale = matches!(
                event,
                Event::StopFinished { stale: true, .. } | Event::Exited { stale: true }
            );
            if stale && before.run_id > 0 {
                prop_assert_eq!(&before, &after, "result of an earlier run modified the record");
            }
        }
    }

    #[test]
    fn start_is_granted_only_from_not_started(rearm in any::<bool>(), events in prop::collection::vec(event_strategy(), 0..20)) {
        let entry = entry();
        for event in &events {
            apply(&entry, event);
        }

        let before = entry.snapshot();
        let granted = entry.begin_start(rearm).is_ok();
        let allowed = before.state == RunState::NotStarted || (rearm && before.state.is_terminal());
        prop_assert_eq!(granted, allowed);
        if granted {
            let after = entry.snapshot();
            prop_assert_eq!(after.state, RunState::Starting);
            prop_assert_eq!(after.run_id, before.run_id + 1);
        }
    }
}

#[test]
fn stale_exit_does_not_touch_new_run() {
    let entry = entry();
    let first = entry.begin_start(false).unwrap().run_id;
    assert!(entry.mark_started(first, Some(1200)));
    entry.mark_stopped(first, Ok(()));

    let second = entry.begin_start(true).unwrap().run_id;
    assert!(entry.mark_started(second, Some(1300)));

    // The first run's watcher fires late
    assert!(!entry.mark_exited(first, Some("exit status 143".to_string())));
    let record = entry.snapshot();
    assert_eq!(record.state, RunState::Started);
    assert_eq!(record.last_known_pid, 1300);
}
