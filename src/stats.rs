//! Windowed statistics over a bounded sample sequence
//!
//! Pure functions only. Every call recomputes from the samples it is given,
//! so a window's statistics never drift from its contents.

/// Mean and sample standard deviation of one window
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WindowStats {
    /// `None` when the window is empty
    pub mean: Option<f64>,
    /// `None` when the window holds fewer than two samples
    pub stdev: Option<f64>,
}

/// Compute mean and sample standard deviation (n - 1 denominator)
///
/// - empty input → `(None, None)`
/// - one sample → `(Some(x), None)`
/// - two or more → both present
///
/// Samples are divided by a power of two near the largest magnitude before
/// summing, so any window of finite readings yields finite statistics.
pub fn compute_stats<I>(samples: I) -> WindowStats
where
    I: IntoIterator<Item = f64>,
    I::IntoIter: Clone,
{
    let iter = samples.into_iter();

    let (count, largest) = iter
        .clone()
        .fold((0usize, 0.0f64), |(n, max), x| (n + 1, max.max(x.abs())));

    if count == 0 {
        return WindowStats::default();
    }

    let scale = overflow_scale(largest);
    let scaled = iter.map(|x| x / scale);

    let mean = scaled.clone().sum::<f64>() / count as f64;
    if count < 2 {
        return WindowStats {
            mean: Some(mean * scale),
            stdev: None,
        };
    }

    let squared_deviations: f64 = scaled.map(|x| (x - mean) * (x - mean)).sum();
    let variance = squared_deviations / (count - 1) as f64;

    WindowStats {
        mean: Some(mean * scale),
        stdev: Some(variance.sqrt() * scale),
    }
}

/// Power of two that brings `largest` to at most 2.0; exact in binary
/// floating point, and 1.0 for windows that cannot overflow.
fn overflow_scale(largest: f64) -> f64 {
    if !largest.is_finite() || largest <= 1.0 {
        return 1.0;
    }
    let exponent = (largest.log2().floor() as i32).min(f64::MAX_EXP - 1);
    2f64.powi(exponent)
}

/// Render an optional statistic with two decimals, or `N/A` when absent
pub fn format_stat(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.2}", v),
        None => "N/A".to_string(),
    }
}
