// tests/aggregator_properties.rs

use std::sync::Arc;
use std::thread;

use proptest::prelude::*;

use autobridge::output::OutputAggregator;

#[test]
fn fresh_aggregator_is_empty() {
    let aggregator = OutputAggregator::new();
    assert!(aggregator.is_empty());
    assert_eq!(aggregator.len(), 0);
    assert_eq!(aggregator.snapshot(), "");
}

#[test]
fn concurrent_appends_keep_each_writers_order() {
    let aggregator = OutputAggregator::new();
    let writers: Vec<_> = ["a", "b", "c", "d"]
        .into_iter()
        .map(|tag| {
            let sink = aggregator.sink();
            thread::spawn(move || {
                for i in 0..200 {
                    sink(&format!("{tag}{i};"));
                }
            })
        })
        .collect();
    for w in writers {
        w.join().unwrap();
    }

    assert_eq!(aggregator.len(), 800);
    let snapshot = aggregator.snapshot();
    for tag in ["a", "b", "c", "d"] {
        let seen: Vec<u32> = snapshot
            .split(';')
            .filter(|part| part.starts_with(tag))
            .map(|part| part[1..].parse().unwrap())
            .collect();
        assert_eq!(seen, (0..200).collect::<Vec<_>>(), "writer {tag}");
    }
}

proptest! {
    #[test]
    fn snapshot_is_the_ordered_concatenation(fragments in proptest::collection::vec(".{0,8}", 0..32)) {
        let aggregator = OutputAggregator::new();
        for fragment in &fragments {
            aggregator.append(fragment);
        }

        prop_assert_eq!(aggregator.snapshot(), fragments.concat());
        prop_assert_eq!(aggregator.len(), fragments.len());
    }

    #[test]
    fn clones_and_sinks_share_one_buffer(
        head in proptest::collection::vec("[a-z]{1,4}", 0..8),
        tail in proptest::collection::vec("[0-9]{1,4}", 0..8),
    ) {
        let aggregator = OutputAggregator::new();
        let clone = aggregator.clone();
        let sink: Arc<dyn Fn(&str) + Send + Sync> = aggregator.sink();

        for h in &head {
            clone.append(h);
        }
        for t in &tail {
            sink(t);
        }

        let expected = format!("{}{}", head.concat(), tail.concat());
        prop_assert_eq!(aggregator.snapshot(), expected);
    }

    #[test]
    fn snapshots_never_shrink(fragments in proptest::collection::vec(".{0,4}", 1..16)) {
        let aggregator = OutputAggregator::new();
        let mut previous = String::new();
        for fragment in &fragments {
            aggregator.append(fragment);
            let now = aggregator.snapshot();
            prop_assert!(now.starts_with(&previous));
            previous = now;
        }
    }
}
