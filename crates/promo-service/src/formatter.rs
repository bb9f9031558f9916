//! Notification text for a matched promotion.
//!
//! Output uses the messaging transport's lightweight markup: `*bold*`,
//! `~strike~` and `` `code` ``.

use promo_types::Promotion;

/// Currency shown when the promotion does not name one.
pub const DEFAULT_CURRENCY: &str = "R$";

const HEADER: &str = "🔥 *New Promotion Detected!* 🔥";

/// Render `promotion` as a notification message.
///
/// Sections are separated by a blank line and each one is left out when its
/// data is missing. The match line only appears when `match_score` is given.
pub fn format_promotion(promotion: &Promotion, match_score: Option<f32>) -> String {
    let mut sections = vec![HEADER.to_string(), format!("*{}*", promotion.name.trim())];

    if let Some(price) = price_section(promotion) {
        sections.push(price);
    }

    if let Some(description) = non_blank(promotion.description.as_deref()) {
        sections.push(description.to_string());
    }

    if let Some(link) = non_blank(promotion.link.as_deref()) {
        sections.push(format!("🔗 {}", link));
    }

    if !promotion.coupon_codes.is_empty() {
        let codes: Vec<String> = promotion
            .coupon_codes
            .iter()
            .map(|code| format!("`{}`", code))
            .collect();
        sections.push(format!("🎟️ *Coupon(s):* {}", codes.join(", ")));
    }

    if let Some(score) = match_score {
        sections.push(format!(
            "⭐ *Match:* {}% {}",
            score_percent(score),
            "⭐".repeat(star_count(score))
        ));
    }

    sections.join("\n\n")
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn price_section(promotion: &Promotion) -> Option<String> {
    let current = promotion.current_price?;
    let currency = non_blank(promotion.currency.as_deref()).unwrap_or(DEFAULT_CURRENCY);

    let mut line = format!("💰 *{} {:.2}*", currency, current);
    if let Some(previous) = promotion.previous_price {
        line.push_str(&format!(
            " ~{} {:.2}~ (-{}%)",
            currency,
            previous,
            discount_percent(current, previous)
        ));
    }
    Some(line)
}

/// Whole-percent discount from `previous` to `current`; 0 when `previous`
/// is not positive. A price increase yields a negative value.
fn discount_percent(current: f64, previous: f64) -> i64 {
    if previous <= 0.0 {
        return 0;
    }
    ((previous - current) / previous * 100.0).round() as i64
}

fn score_percent(score: f32) -> i64 {
    (f64::from(score) * 100.0).round() as i64
}

fn star_count(score: f32) -> usize {
    match score {
        s if s >= 0.9 => 5,
        s if s >= 0.8 => 4,
        s if s >= 0.7 => 3,
        s if s >= 0.6 => 2,
        _ => 1,
    }
}
