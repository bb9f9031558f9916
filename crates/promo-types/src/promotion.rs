//! Promotion types.
//!
//! A promotion is transient: it is extracted from a message, matched against
//! tastes and formatted into notifications, but never persisted.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of promotion kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PromotionType {
    Coupon,
    Product,
    Service,
    Bundle,
    Membership,
    #[default]
    Unknown,
}

impl PromotionType {
    /// Parse a free-form type string. Unrecognised values map to `Unknown`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "coupon" => PromotionType::Coupon,
            "product" => PromotionType::Product,
            "service" => PromotionType::Service,
            "bundle" => PromotionType::Bundle,
            "membership" => PromotionType::Membership,
            _ => PromotionType::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PromotionType::Coupon => "coupon",
            PromotionType::Product => "product",
            PromotionType::Service => "service",
            PromotionType::Bundle => "bundle",
            PromotionType::Membership => "membership",
            PromotionType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for PromotionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured offer extracted from a chat message.
///
/// A valid promotion always has a non-empty `name` and either a
/// `current_price` or at least one coupon code. Construction through
/// [`Promotion::new`] does not enforce this; the extractor does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Promotion {
    pub name: String,

    #[serde(default)]
    pub current_price: Option<f64>,

    #[serde(default)]
    pub previous_price: Option<f64>,

    /// Currency symbol as written in the message (e.g. "R$", "US$")
    #[serde(default)]
    pub currency: Option<String>,

    #[serde(rename = "type", default)]
    pub kind: PromotionType,

    #[serde(default)]
    pub link: Option<String>,

    /// Case-preserving, deduplicated coupon codes
    #[serde(default)]
    pub coupon_codes: Vec<String>,

    #[serde(default)]
    pub description: Option<String>,

    /// ISO-8601 date string as given; pastness is not checked
    #[serde(default)]
    pub expires_at: Option<String>,

    /// Lowercase, trimmed, deduplicated tags
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Promotion {
    /// Create a bare promotion with only a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            current_price: None,
            previous_price: None,
            currency: None,
            kind: PromotionType::Unknown,
            link: None,
            coupon_codes: Vec::new(),
            description: None,
            expires_at: None,
            tags: Vec::new(),
        }
    }

    pub fn with_price(mut self, current: f64) -> Self {
        self.current_price = Some(current);
        self
    }

    pub fn with_previous_price(mut self, previous: f64) -> Self {
        self.previous_price = Some(previous);
        self
    }

    pub fn with_kind(mut self, kind: PromotionType) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_coupon(mut self, code: impl Into<String>) -> Self {
        self.coupon_codes.push(code.into());
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    /// Whether the promotion satisfies the acceptance rule:
    /// a non-blank name and either a price or a coupon.
    pub fn is_valid(&self) -> bool {
        !self.name.trim().is_empty()
            && (self.current_price.is_some() || !self.coupon_codes.is_empty())
    }
}
