use std::time::Duration;

use crate::error::AppError;
use crate::job::JobReference;
use crate::models::SampleSet;
use crate::traits::PageDriver;

/// Default ceiling for a page to settle.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(20);

/// Drives a worker through one page load and turns its text into samples.
#[derive(Debug, Clone, Copy)]
pub struct ExtractionClient {
    timeout: Duration,
}

impl Default for ExtractionClient {
    fn default() -> Self {
        Self::new(DEFAULT_FETCH_TIMEOUT)
    }
}

impl ExtractionClient {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Load the job's page on `driver` and parse every price token found.
    ///
    /// An empty sample set is a valid result (no listings). The driver gets
    /// the timeout as a hint, and the whole call is also bounded by it.
    pub async fn fetch_and_extract<W: PageDriver>(
        &self,
        driver: &mut W,
        job: &JobReference,
    ) -> Result<SampleSet, AppError> {
        let tokens =
            match tokio::time::timeout(self.timeout, driver.load_tokens(&job.locator, self.timeout))
                .await
            {
                Ok(result) => result?,
                Err(_) => return Err(AppError::Timeout(self.timeout)),
            };

        let samples: SampleSet = tokens.iter().filter_map(|t| parse_price(t)).collect();
        if samples.len() < tokens.len() {
            tracing::debug!(
                key = %job.key,
                dropped = tokens.len() - samples.len(),
                "Ignored malformed price tokens"
            );
        }
        tracing::debug!(key = %job.key, samples = samples.len(), "Extracted samples");
        Ok(samples)
    }
}

/// Parse a display price like `"$1,234.50"`.
///
/// Currency symbols, thousands separators and whitespace are stripped. Anything
/// that is not then a plain non-negative decimal is rejected.
pub fn parse_price(token: &str) -> Option<f64> {
    let cleaned: String = token
        .chars()
        .filter(|c| !matches!(c, '$' | '€' | '£' | ',') && !c.is_whitespace())
        .collect();

    if cleaned.is_empty() || !cleaned.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }

    let value: f64 = cleaned.parse().ok()?;
    value.is_finite().then_some(value)
}
