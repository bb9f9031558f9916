//! Promotion response parsing.
//!
//! Turns raw model output into a validated [`Promotion`]. Every rejection
//! is a `None` with a debug log; nothing here returns an error.

use serde_json::{Map, Value};
use tracing::debug;

use promo_types::{Promotion, PromotionType};

use crate::json::extract_json;

type Object = Map<String, Value>;

/// Parse model output into a promotion.
///
/// Accepts a single object or an array of candidates. A candidate is
/// accepted when it has a non-blank name and either a numeric current price
/// or at least one coupon code.
pub fn parse_promotion(raw: &str) -> Option<Promotion> {
    let value = extract_json(raw)?;

    let candidate = match &value {
        Value::Object(obj) => obj,
        Value::Array(items) => select_candidate(items)?,
        _ => return None,
    };

    build_promotion(candidate)
}

/// Pick the first qualifying element, else the first object element.
fn select_candidate(items: &[Value]) -> Option<&Object> {
    let objects = || items.iter().filter_map(Value::as_object);

    objects()
        .find(|obj| {
            name_of(obj).is_some()
                && (to_number(obj.get("currentPrice")).is_some()
                    || !coupon_codes(obj.get("couponCodes")).is_empty())
        })
        .or_else(|| {
            debug!(
                candidates = items.len(),
                "No qualifying promotion in array, using first object"
            );
            objects().next()
        })
}

fn build_promotion(obj: &Object) -> Option<Promotion> {
    let Some(name) = name_of(obj) else {
        debug!("Rejecting promotion: missing name");
        return None;
    };

    let current_price = to_number(obj.get("currentPrice"));
    let coupon_codes = coupon_codes(obj.get("couponCodes"));

    if current_price.is_none() && coupon_codes.is_empty() {
        debug!(name = %name, "Rejecting promotion: no current price and no coupon codes");
        return None;
    }

    let previous_price = to_number(obj.get("previousPrice")).filter(|p| *p >= 0.0);

    let kind = obj
        .get("type")
        .and_then(Value::as_str)
        .map(PromotionType::parse)
        .unwrap_or_default();

    let promotion = Promotion {
        name,
        current_price,
        previous_price,
        currency: text_field(obj, "currency"),
        kind,
        link: text_field(obj, "link"),
        coupon_codes,
        description: text_field(obj, "description"),
        expires_at: text_field(obj, "expiresAt"),
        tags: tags(obj.get("tags")),
    };

    debug!(
        name = %promotion.name,
        kind = %promotion.kind,
        coupons = promotion.coupon_codes.len(),
        "Parsed promotion"
    );
    Some(promotion)
}

fn name_of(obj: &Object) -> Option<String> {
    let name = match obj.get("name")? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!name.is_empty()).then_some(name)
}

/// Optional non-blank string field, trimmed.
fn text_field(obj: &Object, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Coerce a price-like value. Null, missing, empty or non-numeric strings,
/// booleans and non-finite values are all "absent", never zero.
fn to_number(value: Option<&Value>) -> Option<f64> {
    let number = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            s.parse::<f64>().ok()?
        }
        _ => return None,
    };
    number.is_finite().then_some(number)
}

/// Strings from an array (or a single string), trimmed, blanks dropped.
fn string_items(value: Option<&Value>) -> Vec<String> {
    let items: Vec<&Value> = match value {
        None | Some(Value::Null) => return Vec::new(),
        Some(Value::Array(items)) => items.iter().collect(),
        Some(other) => vec![other],
    };

    items
        .into_iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn dedupe(items: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

/// Coupon codes keep their case; "SAVE10" and "save10" are distinct.
fn coupon_codes(value: Option<&Value>) -> Vec<String> {
    dedupe(string_items(value))
}

fn tags(value: Option<&Value>) -> Vec<String> {
    dedupe(
        string_items(value)
            .into_iter()
            .map(|t| t.to_lowercase())
            .collect(),
    )
}
