#[cfg(feature = "browser")]
pub mod browser_driver;
pub mod http_driver;
pub mod selectors;
pub mod webhook;

#[cfg(feature = "browser")]
pub use browser_driver::BrowserPageDriver;
pub use http_driver::HttpPageDriver;
pub use selectors::PageSelectors;
pub use webhook::WebhookTransport;
