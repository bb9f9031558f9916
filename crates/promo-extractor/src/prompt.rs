//! Prompt construction for promotion extraction and label enhancement.

use crate::completion::ChatMessage;

/// Sampling temperature for promotion extraction
pub const PROMOTION_TEMPERATURE: f32 = 0.2;

/// Sampling temperature for taste label enhancement
pub const LABEL_TEMPERATURE: f32 = 0.1;

/// Token cap for taste label enhancement
pub const LABEL_MAX_TOKENS: u32 = 256;

const PROMOTION_SYSTEM: &str = "You are a promotion extractor. Read the incoming message and ALWAYS answer \
with valid JSON only, or the literal null. Never explain, never wrap the answer in markdown, never add \
any other text.";

/// Messages asking the model to extract one promotion from `message`.
pub fn promotion_messages(message: &str) -> Vec<ChatMessage> {
    let user = format!(
        r#"Message: """{message}"""

Return EXACTLY ONE of:
1) A JSON object with these keys:
   {{
     "name": string,
     "currentPrice": number | null,
     "previousPrice": number | null,
     "currency": string | null,
     "type": "coupon" | "product" | "service" | "bundle" | "membership" | "unknown",
     "link": string | null,
     "couponCodes": string[],
     "description": string | null,
     "expiresAt": string | null (ISO 8601),
     "tags": string[] (always lowercase)
   }}
2) The literal null (no quotes) when the message has no promotion.

Rules:
- Raw JSON only, no markdown, nothing before or after it.
- If several promotions are present, pick the most relevant one (largest discount or first mentioned) and list the others in the description.
- Always give a clear name, even for coupons without a final price; keep currentPrice null in that case.
- Use a currency symbol (e.g. "R$", "$"), or null when there is no price.
- couponCodes and tags are always arrays; use [] when empty.
- Tags are short, lowercase and describe the category (e.g. ["tech","tv"]).
- Never invent values or codes that are not in the message."#
    );

    vec![ChatMessage::system(PROMOTION_SYSTEM), ChatMessage::user(user)]
}

const LABEL_SYSTEM: &str = "You are a data enrichment assistant that expands noisy user taste \
descriptions into high quality, multilingual search labels. Return ONLY a valid JSON object, with no \
other text, explanations, or markdown.";

/// Messages asking the model to expand a taste label into keywords.
pub fn label_messages(label: &str) -> Vec<ChatMessage> {
    let user = format!(
        r#"Given the user taste "{label}", build a JSON object of this shape:

{{ "keywords": string[] }}

Rules:
- keywords are lowercase, trimmed and unique
- include spelling fixes, synonyms, categories, related products and translations (pt-BR when possible)
- at most 32 entries, most specific first
- prefer single words or short phrases (max 4 words)

Example output:
{{"keywords":["games","video game deals","jogos eletrônicos","ps5","xbox","nintendo"]}}"#
    );

    vec![ChatMessage::system(LABEL_SYSTEM), ChatMessage::user(user)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_promotion_prompt_embeds_message() {
        let messages = promotion_messages("PS5 for R$ 3.499");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert!(messages[1].content.contains(r#""""PS5 for R$ 3.499""""#));
        assert!(messages[1].content.contains("\"couponCodes\": string[]"));
    }

    #[test]
    fn test_label_prompt_embeds_label() {
        let messages = label_messages("games");
        assert!(messages[1].content.contains("\"games\""));
        assert!(messages[1].content.contains("{ \"keywords\": string[] }"));
    }
}
