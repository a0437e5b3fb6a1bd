use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

pub const EXCERPT_CHARS: usize = 260;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductId(pub String);

/// One catalog entry as stored for search.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: ProductId,
    pub title: String,
    pub price_rm: Option<Decimal>,
    pub url: Option<String>,
    pub image: Option<String>,
    pub document: String,
}

impl ProductRecord {
    pub fn excerpt(&self) -> String {
        let flattened = self.document.replace('\n', " ");
        let mut excerpt = flattened.chars().take(EXCERPT_CHARS).collect::<String>();
        if self.document.chars().count() > EXCERPT_CHARS {
            excerpt.push_str("...");
        }
        excerpt
    }

    pub fn to_hit(&self) -> ProductHit {
        ProductHit {
            title: Some(self.title.clone()),
            price_rm: self.price_rm,
            url: self.url.clone(),
            image: self.image.clone(),
            chunk_preview: Some(self.excerpt()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductHit {
    pub title: Option<String>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub price_rm: Option<Decimal>,
    pub url: Option<String>,
    pub image: Option<String>,
    pub chunk_preview: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSearchResponse {
    pub ok: bool,
    pub query: String,
    pub k: u32,
    pub hits: Vec<ProductHit>,
    pub summary: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductVariant {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub price_rm: Option<Decimal>,
}

/// A row of the scraped drinkware catalog (one JSON object per line).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapedProduct {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub price_rm: Option<Decimal>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub variants: Vec<ProductVariant>,
    #[serde(default)]
    pub measurements: Vec<String>,
    #[serde(default)]
    pub materials: Vec<String>,
    #[serde(default)]
    pub short_description: Option<String>,
}

impl ScrapedProduct {
    /// Searchable text: one `Label: value` line per populated field.
    pub fn to_document(&self) -> String {
        let variants = self
            .variants
            .iter()
            .filter_map(|variant| variant.name.as_deref())
            .filter(|name| !name.is_empty())
            .collect::<Vec<_>>()
            .join(", ");

        let parts = [
            Some(format!("Title: {}", self.title.as_deref().unwrap_or_default())),
            self.price_rm.map(|price| format!("Price: {}", format_ringgit(price))),
            (!variants.is_empty()).then(|| format!("Variants: {variants}")),
            (!self.measurements.is_empty())
                .then(|| format!("Measurements: {}", self.measurements.join("; "))),
            (!self.materials.is_empty())
                .then(|| format!("Materials: {}", self.materials.join("; "))),
            self.short_description
                .as_deref()
                .filter(|description| !description.is_empty())
                .map(|description| format!("Description: {description}")),
            Some(format!("URL: {}", self.url.as_deref().unwrap_or_default())),
        ];

        parts.into_iter().flatten().collect::<Vec<_>>().join("\n")
    }
}

/// Formats a price as `RM1,234.50`.
pub fn format_ringgit(price: Decimal) -> String {
    let rounded = price.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven);
    let text = format!("{:.2}", rounded.abs());
    let (whole, fraction) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (index, digit) in whole.chars().enumerate() {
        if index > 0 && (whole.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if rounded.is_sign_negative() && !rounded.is_zero() { "-" } else { "" };
    format!("{sign}RM{grouped}.{fraction}")
}
