//! Order statistics over raster values.

/// Sorted copy of a sample set, queried for linearly interpolated
/// percentiles (the same estimator numpy uses by default).
pub struct Percentiles {
    sorted: Vec<f64>,
}

impl Percentiles {
    /// Non-finite values are dropped.
    pub fn new<I: IntoIterator<Item = f64>>(values: I) -> Self {
        let mut sorted: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
        sorted.sort_unstable_by(f64::total_cmp);
        Self { sorted }
    }

    pub fn is_empty(&self) -> bool {
        self.sorted.is_empty()
    }

    /// Percentile `p` in `[0, 100]`. Returns 0.0 for an empty sample.
    pub fn at(&self, p: f64) -> f64 {
        let n = self.sorted.len();
        if n == 0 {
            return 0.0;
        }
        let rank = (p.clamp(0.0, 100.0) / 100.0) * (n - 1) as f64;
        let lo = rank.floor() as usize;
        let hi = rank.ceil() as usize;
        let frac = rank - lo as f64;
        self.sorted[lo] + (self.sorted[hi] - self.sorted[lo]) * frac
    }

    pub fn min(&self) -> f64 {
        self.sorted.first().copied().unwrap_or(0.0)
    }

    pub fn max(&self) -> f64 {
        self.sorted.last().copied().unwrap_or(0.0)
    }
}

/// Convenience one-shot percentile.
pub fn percentile<I: IntoIterator<Item = f64>>(values: I, p: f64) -> f64 {
    Percentiles::new(values).at(p)
}

pub fn mean<I: IntoIterator<Item = f64>>(values: I) -> f64 {
    let (sum, n) = values.into_iter().fold((0.0f64, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 { 0.0 } else { sum / n as f64 }
}

/// Most frequent value in `counts` by index; lowest index wins ties.
pub fn argmax_count(counts: &[u32]) -> Option<usize> {
    let mut best: Option<(usize, u32)> = None;
    for (i, &c) in counts.iter().enumerate() {
        if c == 0 {
            continue;
        }
        match best {
            Some((_, bc)) if c <= bc => {}
            _ => best = Some((i, c)),
        }
    }
    best.map(|(i, _)| i)
}
