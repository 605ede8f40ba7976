//! Property tests for the indicator library and classifiers

use momoscan::services::indicators::{ema, rsi, sma, stochastic, williams_r};
use momoscan::services::momentum::{MomentumModel, RsiCrossover, StochasticCombo};
use momoscan::types::{Candle, CandleColumns, MomentumSignal};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Random walk with occasional flat stretches and gaps.
fn random_candles(rng: &mut StdRng, count: usize) -> Vec<Candle> {
    let mut price: f64 = rng.gen_range(1.0..200.0);
    (0..count)
        .map(|i| {
            let flat = rng.gen_bool(0.1);
            if !flat {
                price = (price * (1.0 + rng.gen_range(-0.08..0.08))).max(0.01);
            }
            let spread = if flat { 0.0 } else { price * rng.gen_range(0.0..0.05) };
            let low = (price - spread).max(0.0);
            let high = price + spread;
            Candle {
                time: i as i64 * 60,
                open: price,
                high,
                low,
                close: rng.gen_range(low..=high),
                volume: rng.gen_range(0.0..1e6),
            }
        })
        .collect()
}

#[test]
fn test_oscillators_stay_in_bounds() {
    let mut rng = StdRng::seed_from_u64(7);

    for _ in 0..200 {
        let count = rng.gen_range(0..150);
        let candles = random_candles(&mut rng, count);
        let cols = CandleColumns::from_candles(&candles);

        let stoch = stochastic(&cols.highs, &cols.lows, &cols.closes, 8, 3);
        for v in stoch.k.iter().chain(stoch.d.iter()) {
            assert!(v.is_finite() && (0.0..=100.0).contains(v), "%K/%D out of range: {}", v);
        }

        for v in williams_r(&cols.highs, &cols.lows, &cols.closes, 38) {
            assert!(v.is_finite() && (-100.0..=0.0).contains(&v), "%R out of range: {}", v);
        }

        for v in rsi(&cols.closes, 13) {
            assert!(v.is_finite() && (0.0..=100.0).contains(&v), "RSI out of range: {}", v);
        }
    }
}

#[test]
fn test_short_input_gives_empty_series() {
    let mut rng = StdRng::seed_from_u64(11);
    let candles = random_candles(&mut rng, 7);
    let cols = CandleColumns::from_candles(&candles);

    let stoch = stochastic(&cols.highs, &cols.lows, &cols.closes, 8, 3);
    assert!(stoch.k.is_empty() && stoch.d.is_empty());
    assert!(williams_r(&cols.highs, &cols.lows, &cols.closes, 8).is_empty());
    assert!(rsi(&cols.closes, 7).is_empty());
    assert!(sma(&cols.closes, 8).is_empty());
    assert!(ema(&cols.closes, 8).is_empty());
}

#[test]
fn test_flat_window_gives_midpoints() {
    let flat = vec![4.2; 20];
    let stoch = stochastic(&flat, &flat, &flat, 8, 3);
    assert!(stoch.k.iter().all(|v| *v == 50.0));
    assert!(stoch.d.iter().all(|v| *v == 50.0));
    assert!(williams_r(&flat, &flat, &flat, 8).iter().all(|v| *v == -50.0));
}

#[test]
fn test_classifiers_are_total_over_random_input() {
    let mut rng = StdRng::seed_from_u64(42);
    let model_a = StochasticCombo::default();
    let model_b = RsiCrossover::default();

    for _ in 0..100 {
        let count = rng.gen_range(0..120);
        let candles = random_candles(&mut rng, count);

        let a = model_a.classify(&candles);
        let b = model_b.classify(&candles);
        if count < model_a.min_history() {
            assert_eq!(a, MomentumSignal::Neutral);
        }
        if count < model_b.min_history() {
            assert_eq!(b, MomentumSignal::Neutral);
        }
        // Same input, same answer.
        assert_eq!(model_a.classify(&candles), a);
        assert_eq!(model_b.classify(&candles), b);
    }
}
