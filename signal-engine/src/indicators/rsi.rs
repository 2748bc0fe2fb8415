//! RSI (Relative Strength Index) indicator

/// Calculate RSI with Wilder smoothing.
///
/// The first average gain/loss is the plain mean of the first `period` price changes; later
/// averages blend the previous one with weight `(period - 1) / period`. Output `j` belongs to
/// input index `j + period`, so the result has `values.len() - period` points.
pub fn calculate_rsi(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() <= period {
        return Vec::new();
    }

    let changes: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();
    let period_f = period as f64;

    let mut avg_gain = changes[..period].iter().map(|c| c.max(0.0)).sum::<f64>() / period_f;
    let mut avg_loss = changes[..period].iter().map(|c| (-c).max(0.0)).sum::<f64>() / period_f;

    let mut results = Vec::with_capacity(changes.len() - period + 1);
    results.push(rsi_value(avg_gain, avg_loss));

    for &change in &changes[period..] {
        avg_gain = (avg_gain * (period_f - 1.0) + change.max(0.0)) / period_f;
        avg_loss = (avg_loss * (period_f - 1.0) + (-change).max(0.0)) / period_f;
        results.push(rsi_value(avg_gain, avg_loss));
    }

    results
}

/// Input index of the first RSI output
pub fn rsi_offset(period: usize) -> usize {
    period
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rsi_not_ready() {
        let values = vec![100.0, 102.0, 101.0, 103.0, 105.0, 104.0, 106.0];
        // RSI needs at least period+1 values
        assert!(calculate_rsi(&values, 14).is_empty());
    }

    #[test]
    fn test_rsi_only_gains() {
        let values: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let rsi = calculate_rsi(&values, 14);
        assert_eq!(rsi.len(), 6);
        assert!(rsi.iter().all(|&v| v == 100.0));
    }

    #[test]
    fn test_rsi_only_losses() {
        let values: Vec<f64> = (0..20).map(|i| 100.0 - i as f64).collect();
        let rsi = calculate_rsi(&values, 14);
        assert!(rsi.iter().all(|&v| v.abs() < 1e-12));
    }

    #[test]
    fn test_rsi_balanced_changes() {
        // Alternating +1/-1 with an even period gives equal averages
        let values: Vec<f64> = (0..5).map(|i| if i % 2 == 0 { 10.0 } else { 11.0 }).collect();
        let rsi = calculate_rsi(&values, 4);
        assert_eq!(rsi.len(), 1);
        assert!((rsi[0] - 50.0).abs() < 1e-9);
    }
}
