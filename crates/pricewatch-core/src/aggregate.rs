/// Markup applied on top of the mean listing price.
pub const DEFAULT_MARKUP: f64 = 1.10;

/// Reduces the samples from one attempt to a single published price.
#[derive(Debug, Clone, Copy)]
pub struct Aggregator {
    markup: f64,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new(DEFAULT_MARKUP)
    }
}

impl Aggregator {
    pub fn new(markup: f64) -> Self {
        Self { markup }
    }

    pub fn markup(&self) -> f64 {
        self.markup
    }

    /// Mean rounded to cents, times the markup, rounded to cents again.
    ///
    /// Returns `None` for an empty sample set; there is no zero-fill.
    pub fn reduce(&self, samples: &[f64]) -> Option<f64> {
        if samples.is_empty() {
            return None;
        }
        let mean = samples.iter().sum::<f64>() / samples.len() as f64;
        Some(round_cents(round_cents(mean) * self.markup))
    }
}

/// Round half away from zero to 2 decimal places.
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
