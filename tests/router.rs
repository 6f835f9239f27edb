use highlights_events::{Event, EventRouter, Listener, WILDCARD, listener};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const KINDS: [&str; 3] = ["schedule_created", "pipeline_started", WILDCARD];

struct Probe {
    listener: Listener,
    hits: Arc<AtomicUsize>,
}

fn probe() -> Probe {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    Probe {
        listener: listener(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }),
        hits,
    }
}

#[test]
fn test_dispatch_invokes_exactly_the_registered_set() {
    fastrand::seed(7);
    let router = EventRouter::new();
    let probes: Vec<Probe> = (0..6).map(|_| probe()).collect();
    // (kind, probe index) -> live registrations
    let mut model: HashMap<(&str, usize), usize> = HashMap::new();

    for _ in 0..500 {
        let kind = KINDS[fastrand::usize(..KINDS.len())];
        let index = fastrand::usize(..probes.len());

        if fastrand::bool() {
            router.subscribe(kind, probes[index].listener.clone());
            *model.entry((kind, index)).or_default() += 1;
        } else {
            let removed = router.unsubscribe(kind, &probes[index].listener);
            let live = model.entry((kind, index)).or_default();
            assert_eq!(removed, *live > 0);
            *live = live.saturating_sub(1);
        }

        for probe in &probes {
            probe.hits.store(0, Ordering::SeqCst);
        }

        let target = KINDS[fastrand::usize(..2)];
        let report = router.dispatch(&Event::new(target, json!({})));

        let mut expected_total = 0;
        for (index, probe) in probes.iter().enumerate() {
            let expected = model.get(&(target, index)).copied().unwrap_or(0)
                + model.get(&(WILDCARD, index)).copied().unwrap_or(0);
            expected_total += expected;
            assert_eq!(probe.hits.load(Ordering::SeqCst), expected);
        }
        assert_eq!(report.delivered, expected_total);
        assert_eq!(report.failed, 0);
    }
}

#[test]
fn test_mount_unmount_cycle_with_scoped_subscriptions() {
    let router = Arc::new(EventRouter::new());
    let widget = probe();
    let toast = probe();

    {
        let _schedule_view = router.subscribe_scoped("schedule_updated", widget.listener.clone());
        let _toasts = router.subscribe_scoped(WILDCARD, toast.listener.clone());

        router.dispatch(&Event::new("schedule_updated", json!({"id": 1})));
        router.dispatch(&Event::new("highlight_generated", json!({"clip": "a"})));
    }

    router.dispatch(&Event::new("schedule_updated", json!({"id": 2})));

    assert_eq!(widget.hits.load(Ordering::SeqCst), 1);
    assert_eq!(toast.hits.load(Ordering::SeqCst), 2);
    assert_eq!(router.total_listeners(), 0);
}
