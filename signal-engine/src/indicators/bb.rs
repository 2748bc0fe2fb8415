//! Bollinger Bands indicator

use ta::indicators::BollingerBands;
use ta::Next;

/// Bollinger Bands result structure, aligned with `calculate_sma` of the same period
#[derive(Debug, Clone, Default)]
pub struct BollingerOutput {
    pub upper: Vec<f64>,
    pub middle: Vec<f64>,
    pub lower: Vec<f64>,
}

/// Calculate Bollinger Bands: SMA middle line ± `std_dev` population standard deviations
pub fn calculate_bollinger_bands(values: &[f64], period: usize, std_dev: f64) -> BollingerOutput {
    let mut output = BollingerOutput::default();
    if period == 0 || values.len() < period {
        return output;
    }

    let mut bb = match BollingerBands::new(period, std_dev) {
        Ok(bb) => bb,
        Err(_) => return output,
    };

    for band in values.iter().map(|&value| bb.next(value)).skip(period - 1) {
        output.upper.push(band.upper);
        output.middle.push(band.average);
        output.lower.push(band.lower);
    }

    output
}
