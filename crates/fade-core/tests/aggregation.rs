use fade_core::{
    Aggregator, BackwardDecayAggregator, DecayFunction, EngineConfig, Event,
    ForwardDecayAggregator, GroundTruthOracle, SlidingWindowAggregator, TopKTracker, TrackerMode,
    WindowConfig,
};
use proptest::prelude::*;

fn relative_error(approx: f64, exact: f64) -> f64 {
    (approx - exact).abs() / exact.abs().max(1e-12)
}

#[test]
fn test_end_to_end_geometric_series() {
    let decay = DecayFunction::exponential(0.01).unwrap();
    let mut forward = ForwardDecayAggregator::new(decay, 16);
    for t in 0..1000 {
        forward.update(&Event::hit(t as f64, "k"));
    }

    let closed_form = (1.0 - (-0.01f64 * 1000.0).exp()) / (1.0 - (-0.01f64).exp());
    let sum = forward.query(999.0);
    assert!(relative_error(sum, closed_form) < 1e-9);
    assert!((sum - 100.5).abs() < 0.01);
}

#[test]
fn test_single_event_forward_sum() {
    for decay in [
        DecayFunction::exponential(0.3).unwrap(),
        DecayFunction::polynomial(2.0).unwrap(),
        DecayFunction::fixed_window(0.3, 10.0).unwrap(),
    ] {
        let mut forward = ForwardDecayAggregator::new(decay, 16);
        forward.update(&Event::new(5.0, "k", 42.0));
        assert!((forward.query(9.0) - 42.0 * decay.weight(4.0)).abs() < 1e-9);
    }
}

#[test]
fn test_sliding_event_past_horizon_contributes_nothing() {
    let decay = DecayFunction::fixed_window(0.01, 30.0).unwrap();
    let mut window = SlidingWindowAggregator::new(decay, WindowConfig::for_horizon(30.0).unwrap());
    window.update(&Event::new(0.0, "k", 1_000.0));
    window.update(&Event::new(30.5, "k", 1.0));

    assert!((window.query(30.5) - 1.0).abs() < 1e-12);
    assert_eq!(window.query(61.0), 0.0);
}

#[test]
fn test_sliding_memory_never_exceeds_cap() {
    let decay = DecayFunction::fixed_window(0.01, 30.0).unwrap();
    let config = WindowConfig::new(30.0, 0.05, 16).unwrap();
    let mut window = SlidingWindowAggregator::new(decay, config);

    let mut t = 0.0;
    for i in 0..100_000u64 {
        t += ((i * 7919) % 13) as f64 * 0.01;
        window.update(&Event::new(t, "k", (i % 1500) as f64));
        assert!(window.memory_units() <= 16);
    }
    assert!(window.merges() > 0);
}

#[test]
fn test_topk_ranking() {
    let decay = DecayFunction::exponential(1e-6).unwrap();
    let mut topk = TopKTracker::new(3, 16, decay, TrackerMode::Forward).unwrap();
    for (key, value) in [("a", 10.0), ("b", 5.0), ("c", 1.0), ("d", 20.0)] {
        topk.update(&Event::new(100.0, key, value));
    }

    assert_eq!(topk.top_keys(100.0), vec!["d", "a", "b"]);
}

#[test]
fn test_error_non_increasing_with_buffer_capacity() {
    let decay = DecayFunction::polynomial(1.0).unwrap();
    let events: Vec<Event> = (0..2_000)
        .map(|i| Event::new(i as f64 * 0.1, "k", 1.0 + (i % 5) as f64))
        .collect();

    let mut oracle = GroundTruthOracle::new(decay);
    for event in &events {
        oracle.record(event).unwrap();
    }
    let now = 199.9;
    let exact = oracle.query(now);

    let errors: Vec<f64> = [8, 64, 512, 4096]
        .into_iter()
        .map(|capacity| {
            let mut backward = BackwardDecayAggregator::new(decay, capacity);
            for event in &events {
                backward.update(event);
            }
            relative_error(backward.query(now), exact)
        })
        .collect();

    for pair in errors.windows(2) {
        assert!(pair[1] <= pair[0], "errors not monotone: {errors:?}");
    }
    assert!(errors[3] < 1e-12);
}

#[test]
fn test_sliding_error_non_increasing_with_bucket_cap() {
    let decay = DecayFunction::fixed_window(0.01, 30.0).unwrap();
    let mut events = Vec::with_capacity(50_000);
    let mut t = 0.0;
    for i in 0..50_000u64 {
        t += ((i * 7919) % 13) as f64 * 0.01;
        events.push(Event::new(t, "k", (i % 1500) as f64));
    }

    let mut oracle = GroundTruthOracle::new(decay);
    for event in &events {
        oracle.record(event).unwrap();
    }
    let exact = oracle.query(t);

    let errors: Vec<f64> = [2, 8, 32, 64]
        .into_iter()
        .map(|cap| {
            let mut window = SlidingWindowAggregator::new(
                decay,
                WindowConfig::new(30.0, 0.5, cap).unwrap(),
            );
            for event in &events {
                window.update(event);
            }
            assert!(window.memory_units() <= cap);
            relative_error(window.query(t), exact)
        })
        .collect();

    for pair in errors.windows(2) {
        assert!(pair[1] <= pair[0], "errors not monotone: {errors:?}");
    }
    assert!(errors[3] < 0.05, "errors: {errors:?}");
}

#[test]
fn test_aggregator_from_env_style_config() {
    let config = EngineConfig {
        top_k: 3,
        ..EngineConfig::default()
    };
    let mut aggregator = Aggregator::from_config(&config).unwrap();
    aggregator.update(&Event::new(1.0, "k", 2.0));
    assert!((aggregator.query(1.0) - 2.0).abs() < 1e-12);
}

proptest! {
    #[test]
    fn prop_forward_backward_oracle_agree(
        rate in 0.001f64..1.0,
        steps in prop::collection::vec((0.0f64..5.0, 0.0f64..100.0), 1..200),
    ) {
        let decay = DecayFunction::exponential(rate).unwrap();
        let mut forward = ForwardDecayAggregator::new(decay, 16);
        let mut backward = BackwardDecayAggregator::new(decay, 16);
        let mut oracle = GroundTruthOracle::new(decay);

        let mut t = 0.0;
        for (gap, value) in steps {
            t += gap;
            let event = Event::new(t, "k", value);
            forward.update(&event);
            backward.update(&event);
            oracle.record(&event).unwrap();
        }

        let exact = oracle.query(t);
        prop_assert!((forward.query(t) - exact).abs() <= 1e-9 * exact.max(1.0));
        prop_assert!((backward.query(t) - exact).abs() <= 1e-9 * exact.max(1.0));
    }

    #[test]
    fn prop_sliding_memory_bounded(
        cap in 2usize..20,
        gaps in prop::collection::vec(0.0f64..3.0, 1..500),
    ) {
        let decay = DecayFunction::fixed_window(0.05, 20.0).unwrap();
        let config = WindowConfig::new(20.0, 0.5, cap).unwrap();
        let mut window = SlidingWindowAggregator::new(decay, config);

        let mut t = 0.0;
        for gap in gaps {
            t += gap;
            window.update(&Event::hit(t, "k"));
            prop_assert!(window.memory_units() <= cap);
            prop_assert!(window.query(t) >= 0.0);
        }
    }
}
