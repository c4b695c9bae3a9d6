/// CSS selectors describing where prices live on a listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSelectors {
    /// Control clicked once after navigation to reveal listings, if present.
    pub expand: Option<String>,
    /// Appears once the listing table has rendered.
    pub ready: String,
    /// One node per listing price.
    pub price: String,
}

impl Default for PageSelectors {
    fn default() -> Self {
        Self {
            expand: Some(".tcg-standard-button__content".to_string()),
            ready: ".listing-item__listing-data".to_string(),
            price: ".listing-item__listing-data__info__price:not(:empty)".to_string(),
        }
    }
}

impl PageSelectors {
    pub fn with_price(mut self, price: impl Into<String>) -> Self {
        self.price = price.into();
        self
    }

    pub fn with_ready(mut self, ready: impl Into<String>) -> Self {
        self.ready = ready.into();
        self
    }

    pub fn without_expand(mut self) -> Self {
        self.expand = None;
        self
    }
}
