use serde::Serialize;

/// Online statistics over one stream of samples.
///
/// Keeps count, sum, sum of squares, min, max and the product of all
/// samples. The product is held as a sum of natural logarithms so long
/// streams neither overflow nor underflow; the geometric mean is only
/// defined while every sample seen is non-negative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Accumulator {
    count: u64,
    sum: f64,
    sum_sq: f64,
    min: f64,
    max: f64,
    ln_product: f64,
    negative_seen: bool,
}

impl Default for Accumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Accumulator {
    pub const fn new() -> Self {
        Self {
            count: 0,
            sum: 0.0,
            sum_sq: 0.0,
            min: 0.0,
            max: 0.0,
            ln_product: 0.0,
            negative_seen: false,
        }
    }

    pub fn add(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        self.sum += value;
        self.sum_sq += value * value;
        if value < 0.0 {
            self.negative_seen = true;
        } else {
            self.ln_product += value.ln();
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    /// Smallest sample, 0 when empty.
    pub fn min(&self) -> f64 {
        self.min
    }

    /// Largest sample, 0 when empty.
    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }

    /// Unbiased sample variance; 0 below two samples or when rounding makes it negative.
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            return 0.0;
        }
        let n = self.count as f64;
        let variance = (self.sum_sq - (self.sum * self.sum) / n) / (n - 1.0);
        variance.max(0.0)
    }

    pub fn stddev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// `product^(1/count)`, `None` when empty or once a negative sample was added.
    pub fn geomean(&self) -> Option<f64> {
        if self.count == 0 || self.negative_seen {
            return None;
        }
        Some((self.ln_product / self.count as f64).exp())
    }

    pub fn summary(&self) -> Summary {
        Summary {
            count: self.count,
            sum: self.sum,
            min: self.min,
            max: self.max,
            mean: self.mean(),
            stddev: self.stddev(),
            geomean: self.geomean(),
        }
    }
}

/// Point-in-time view of an [`Accumulator`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Summary {
    pub count: u64,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub stddev: f64,
    pub geomean: Option<f64>,
}

/// Percent change of every summary figure between two runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Comparison {
    pub count: f64,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub stddev: f64,
}

impl Comparison {
    pub fn between(reference: &Accumulator, candidate: &Accumulator) -> Self {
        Self {
            count: percent_change(reference.count() as f64, candidate.count() as f64),
            sum: percent_change(reference.sum(), candidate.sum()),
            min: percent_change(reference.min(), candidate.min()),
            max: percent_change(reference.max(), candidate.max()),
            mean: percent_change(reference.mean(), candidate.mean()),
            stddev: percent_change(reference.stddev(), candidate.stddev()),
        }
    }
}

/// `100 * (new - reference) / reference`, or 0 when the reference is 0.
pub fn percent_change(reference: f64, new: f64) -> f64 {
    if reference == 0.0 {
        0.0
    } else {
        100.0 * (new - reference) / reference
    }
}
