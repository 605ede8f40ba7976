//! Exponential Moving Average (EMA) indicator.

/// EMA series seeded by the SMA of the first `period` values.
///
/// Like SMA but gives more weight to recent values, with multiplier
/// `2 / (period + 1)`. Output is aligned like [`super::sma`]: the first point
/// is the seed, and there are `values.len() - period + 1` points in total.
pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }

    let multiplier = 2.0 / (period as f64 + 1.0);

    // First EMA is SMA
    let seed: f64 = values[..period].iter().sum::<f64>() / period as f64;

    let mut out = Vec::with_capacity(values.len() + 1 - period);
    out.push(seed);

    let mut current = seed;
    for value in &values[period..] {
        current = (value - current) * multiplier + current;
        out.push(current);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ema_seeded_by_sma() {
        let out = ema(&[2.0, 4.0, 6.0, 8.0], 2);
        assert_eq!(out.len(), 3);
        assert!((out[0] - 3.0).abs() < 1e-12);
        // multiplier 2/3: 3 + (6 - 3) * 2/3 = 5
        assert!((out[1] - 5.0).abs() < 1e-12);
        // 5 + (8 - 5) * 2/3 = 7
        assert!((out[2] - 7.0).abs() < 1e-12);
    }

    #[test]
    fn test_ema_insufficient_data() {
        assert!(ema(&[1.0], 2).is_empty());
    }

    #[test]
    fn test_ema_tracks_faster_than_sma() {
        let mut values = vec![10.0; 20];
        values.extend([20.0, 20.0, 20.0]);
        let fast = *ema(&values, 2).last().unwrap();
        let slow = *super::super::sma(&values, 10).last().unwrap();
        assert!(fast > slow);
    }
}
