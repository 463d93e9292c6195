// Growth Forecaster - least-squares projection over monthly sales
// Closed-form fit over the normal-equation sums; no iterative solver.

use serde::{Deserialize, Serialize};

// ============================================================================
// PREDICTION
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrowthPrediction {
    pub next_month: f64,
    pub next_quarter: f64,
    pub next_year: f64,
    /// Forecast quality in [0, 100], derived from regression residuals.
    pub confidence: f64,
    pub trend: Trend,
}

impl GrowthPrediction {
    /// Policy for series too short to fit: everything zero, trend neutral.
    pub fn insufficient_data() -> Self {
        GrowthPrediction {
            next_month: 0.0,
            next_quarter: 0.0,
            next_year: 0.0,
            confidence: 0.0,
            trend: Trend::Neutral,
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "next month ${:.2}, quarter ${:.2}, year ${:.2} ({:?}, {:.0}% confidence)",
            self.next_month, self.next_quarter, self.next_year, self.trend, self.confidence
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    Bullish,
    Bearish,
    Neutral,
}

// ============================================================================
// FORECASTER
// ============================================================================

pub struct GrowthForecaster {
    /// Slope must exceed this fraction of the series mean to count as a trend.
    pub trend_band: f64,
}

impl GrowthForecaster {
    pub fn new() -> Self {
        GrowthForecaster { trend_band: 0.05 }
    }

    /// Project next month / quarter / year from an ordered monthly series.
    ///
    /// Fits y = slope*x + intercept over x = 0..n-1 and evaluates the line
    /// at n, n+2 and n+11. Revenue cannot go negative, so projections are
    /// clamped at zero. Never panics: short and degenerate series fall back
    /// to the insufficient-data policy or a zero confidence.
    pub fn predict(&self, series: &[f64]) -> GrowthPrediction {
        let n = series.len();
        if n < 2 {
            return GrowthPrediction::insufficient_data();
        }

        let (slope, intercept) = fit_line(series);
        let n = n as f64;

        let next_month = (slope * n + intercept).max(0.0);
        let next_quarter = (slope * (n + 2.0) + intercept).max(0.0);
        let next_year = (slope * (n + 11.0) + intercept).max(0.0);

        let mean = series.iter().sum::<f64>() / n;

        // Mean absolute residual against the fitted line
        let mae = series
            .iter()
            .enumerate()
            .map(|(x, y)| (y - (slope * x as f64 + intercept)).abs())
            .sum::<f64>()
            / n;

        // Zero mean would divide by zero; an all-zero series simply has no
        // forecast worth trusting.
        let confidence = if mean == 0.0 {
            0.0
        } else {
            (100.0 - (mae / mean * 100.0)).clamp(0.0, 100.0)
        };

        let trend = if slope > self.trend_band * mean {
            Trend::Bullish
        } else if slope < -self.trend_band * mean {
            Trend::Bearish
        } else {
            Trend::Neutral
        };

        GrowthPrediction {
            next_month,
            next_quarter,
            next_year,
            confidence,
            trend,
        }
    }
}

impl Default for GrowthForecaster {
    fn default() -> Self {
        Self::new()
    }
}

/// Ordinary least squares over x = 0..n-1, via the closed-form sums.
/// Returns (slope, intercept). Caller guarantees n >= 2.
pub fn fit_line(series: &[f64]) -> (f64, f64) {
    let n = series.len() as f64;

    let sum_x: f64 = (0..series.len()).map(|x| x as f64).sum();
    let sum_y: f64 = series.iter().sum();
    let sum_xy: f64 = series.iter().enumerate().map(|(x, y)| x as f64 * y).sum();
    let sum_x2: f64 = (0..series.len()).map(|x| (x as f64) * (x as f64)).sum();

    let denom = n * sum_x2 - sum_x * sum_x;
    if denom == 0.0 {
        // Single distinct x only happens for n < 2, which predict() filters
        return (0.0, series.first().copied().unwrap_or(0.0));
    }

    let slope = (n * sum_xy - sum_x * sum_y) / denom;
    let intercept = (sum_y - slope * sum_x) / n;
    (slope, intercept)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfectly_linear_series() {
        let forecaster = GrowthForecaster::new();
        let prediction = forecaster.predict(&[100.0, 110.0, 120.0, 130.0]);

        // slope 10, intercept 100: next point is 140 with zero residual
        assert!((prediction.next_month - 140.0).abs() < 1e-9);
        assert!((prediction.next_quarter - 160.0).abs() < 1e-9);
        assert!((prediction.next_year - 250.0).abs() < 1e-9);
        assert!((prediction.confidence - 100.0).abs() < 1e-9);
        assert_eq!(prediction.trend, Trend::Bullish);
    }

    #[test]
    fn test_short_series_policy() {
        let forecaster = GrowthForecaster::new();

        for series in [&[][..], &[500.0][..]] {
            let prediction = forecaster.predict(series);
            assert_eq!(prediction.next_month, 0.0);
            assert_eq!(prediction.next_quarter, 0.0);
            assert_eq!(prediction.next_year, 0.0);
            assert_eq!(prediction.confidence, 0.0);
            assert_eq!(prediction.trend, Trend::Neutral);
        }
    }

    #[test]
    fn test_all_zero_series_has_zero_confidence() {
        let forecaster = GrowthForecaster::new();
        let prediction = forecaster.predict(&[0.0, 0.0, 0.0, 0.0]);

        assert_eq!(prediction.next_month, 0.0);
        assert_eq!(prediction.confidence, 0.0);
        assert_eq!(prediction.trend, Trend::Neutral);
        assert!(!prediction.next_year.is_nan());
    }

    #[test]
    fn test_declining_series_clamps_at_zero() {
        let forecaster = GrowthForecaster::new();
        let prediction = forecaster.predict(&[300.0, 200.0, 100.0]);

        assert_eq!(prediction.trend, Trend::Bearish);
        assert!((prediction.next_month - 0.0).abs() < 1e-9);
        // Year projection would be deeply negative without the clamp
        assert_eq!(prediction.next_year, 0.0);
    }

    #[test]
    fn test_flat_series_is_neutral_and_confident() {
        let forecaster = GrowthForecaster::new();
        let prediction = forecaster.predict(&[5000.0, 5000.0, 5000.0]);

        assert_eq!(prediction.trend, Trend::Neutral);
        assert!((prediction.next_month - 5000.0).abs() < 1e-9);
        assert!((prediction.confidence - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_noisy_series_lowers_confidence() {
        let forecaster = GrowthForecaster::new();
        let prediction = forecaster.predict(&[100.0, 400.0, 50.0, 350.0]);

        assert!(prediction.confidence < 100.0);
        assert!(prediction.confidence >= 0.0);
    }

    #[test]
    fn test_fit_line_slope_and_intercept() {
        let (slope, intercept) = fit_line(&[100.0, 110.0, 120.0, 130.0]);
        assert!((slope - 10.0).abs() < 1e-9);
        assert!((intercept - 100.0).abs() < 1e-9);
    }
}
