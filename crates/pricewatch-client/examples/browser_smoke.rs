/// Smoke-test for `BrowserPageDriver`.
///
/// Launches a headless Chromium, loads one listing page, and prints the raw
/// price tokens plus the parsed samples.
///
/// Run with:
///   cargo run --example browser_smoke --features browser -- <listing-url>
use std::time::Duration;

use pricewatch_client::{BrowserPageDriver, PageSelectors};
use pricewatch_core::parse_price;
use pricewatch_core::traits::PageDriver;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("info")
        .init();

    let url = std::env::args()
        .nth(1)
        .ok_or_else(|| anyhow::anyhow!("usage: browser_smoke <listing-url>"))?;

    println!("Launching headless browser...");
    let mut driver = BrowserPageDriver::launch(PageSelectors::default()).await?;

    println!("Loading {url} ...");
    let result = driver.load_tokens(&url, Duration::from_secs(20)).await;
    driver.shutdown().await;
    let tokens = result?;

    let samples: Vec<f64> = tokens.iter().filter_map(|t| parse_price(t)).collect();
    println!("Got {} price tokens, {} parsed:", tokens.len(), samples.len());
    for (token, sample) in tokens.iter().zip(samples.iter()) {
        println!("  {token:>12}  ->  {sample:.2}");
    }
    Ok(())
}
