use std::time::Duration;

use pricewatch_core::error::AppError;
use pricewatch_core::traits::PageDriver;
use reqwest::Client;
use scraper::{Html, Selector};
use url::Url;

use crate::selectors::PageSelectors;

/// Page driver for listing pages that are rendered server-side.
///
/// Downloads the HTML with reqwest and selects price nodes with `scraper`.
/// No JavaScript runs, so the `expand` and `ready` selectors are ignored.
#[derive(Clone)]
pub struct HttpPageDriver {
    client: Client,
    price: Selector,
}

impl HttpPageDriver {
    pub fn new(selectors: &PageSelectors) -> Result<Self, AppError> {
        let client = Client::builder()
            .user_agent("Pricewatch/0.1")
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;
        let price = Selector::parse(&selectors.price).map_err(|e| {
            AppError::ConfigError(format!("Invalid price selector '{}': {e}", selectors.price))
        })?;

        Ok(Self { client, price })
    }
}

impl PageDriver for HttpPageDriver {
    async fn load_tokens(
        &mut self,
        locator: &str,
        timeout: Duration,
    ) -> Result<Vec<String>, AppError> {
        validate_locator(locator)?;

        let response = self
            .client
            .get(locator)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::Timeout(timeout)
                } else if e.is_connect() {
                    AppError::NetworkError(format!("Connection failed: {e}"))
                } else {
                    AppError::HttpError(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::HttpError(format!(
                "HTTP {} for {}",
                status.as_u16(),
                locator
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AppError::HttpError(format!("Failed to read response body: {e}")))?;

        Ok(extract_tokens(&body, &self.price))
    }
}

/// Text of every node matching `selector`, trimmed, skipping empty nodes.
fn extract_tokens(html: &str, selector: &Selector) -> Vec<String> {
    Html::parse_document(html)
        .select(selector)
        .map(|node| node.text().collect::<String>().trim().to_string())
        .filter(|text| !text.is_empty())
        .collect()
}

/// Only absolute `http` and `https` locators are fetched.
pub(crate) fn validate_locator(locator: &str) -> Result<(), AppError> {
    let parsed =
        Url::parse(locator).map_err(|e| AppError::HttpError(format!("Invalid URL: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(AppError::HttpError(format!(
            "URL scheme '{scheme}' is not allowed (only http/https)"
        ))),
    }
}
