//! Inbound message pipeline E2E tests for promo-radar.
//!
//! A group message goes through extraction, taste matching and dispatch;
//! only users whose tastes score above the threshold are notified.

use pretty_assertions::assert_eq;

use e2e_tests::{group_message, product_json, vector, TestHarness, DEALS_GROUP};
use promo_embeddings::MockEmbedder;
use promo_service::{DispatchReport, PipelineOutcome, RecordingSender};
use promo_types::Attachment;

const KEYBOARD_TEXT: &str = "Keychron K2 | keyboard mechanical | product";

fn keyboard_harness() -> TestHarness {
    let embedder = MockEmbedder::new(e2e_tests::DIMENSION)
        .with_vector("mechanical keyboard", vector(&[1.0]))
        .with_vector("garden hose", vector(&[0.0, 1.0]))
        .with_vector(KEYBOARD_TEXT, vector(&[0.95, 0.05]));
    TestHarness::with_components(embedder, RecordingSender::new())
}

/// Full path: registered group, detected promotion, one interested user.
#[tokio::test]
async fn test_promotion_reaches_only_interested_user() {
    // 1. Harness with a monitored group and two users
    let harness = keyboard_harness().with_group().await;
    let alice = harness
        .user_with_tastes("Alice", "5511900000001", &["mechanical keyboard"])
        .await;
    harness
        .user_with_tastes("Bob", "5511900000002", &["garden hose"])
        .await;

    // 2. Model recognises a promotion
    harness.completion.push_response(
        r#"```json
{"name":"Keychron K2","currentPrice":399.9,"previousPrice":499.9,"type":"product",
 "tags":["Keyboard","mechanical"],"couponCodes":["KEY10"],"link":"https://shop.example/k2"}
```"#,
    );

    // 3. Run the message through the pipeline
    let outcome = harness
        .pipeline
        .handle(&group_message(DEALS_GROUP, "Keychron K2 por R$ 399,90!"))
        .await
        .unwrap();

    // 4. Only Alice was notified, with the fully formatted message
    assert_eq!(
        outcome,
        PipelineOutcome::Dispatched(DispatchReport {
            recipients: 1,
            delivered: 1,
            failed: 0
        })
    );
    let sent = harness.sender.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, alice.phone);

    let expected = [
        "🔥 *New Promotion Detected!* 🔥",
        "*Keychron K2*",
        "💰 *R$ 399.90* ~R$ 499.90~ (-20%)",
        "🔗 https://shop.example/k2",
        "🎟️ *Coupon(s):* `KEY10`",
        "⭐ *Match:* 100% ⭐⭐⭐⭐⭐",
    ]
    .join("\n\n");
    assert_eq!(sent[0].text, expected);
}

/// Images attached to the group message are forwarded with every notification.
#[tokio::test]
async fn test_image_forwarded_with_notification() {
    let harness = keyboard_harness().with_group().await;
    harness
        .user_with_tastes("Alice", "111", &["mechanical keyboard"])
        .await;
    harness.completion.push_response(product_json(
        "Keychron K2",
        399.9,
        &["keyboard", "mechanical"],
    ));

    let mut message = group_message(DEALS_GROUP, "Keychron K2 399,90 (photo)");
    message.image = Some(Attachment {
        file_name: "k2.jpg".to_string(),
        mime_type: "image/jpeg".to_string(),
        data: vec![0xFF, 0xD8, 0xFF],
    });

    harness.pipeline.handle(&message).await.unwrap();

    let sent = harness.sender.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].image, message.image);
}

/// Messages from groups that are not registered never reach the model.
#[tokio::test]
async fn test_unregistered_group_ignored() {
    let harness = keyboard_harness().with_group().await;

    let outcome = harness
        .pipeline
        .handle(&group_message("stranger@g.us", "Keychron K2 399,90"))
        .await
        .unwrap();

    assert_eq!(outcome, PipelineOutcome::UnknownGroup);
    assert_eq!(harness.completion.call_count(), 0);
    assert_eq!(harness.embedder.call_count(), 0);
}

/// Model answers that are not promotions: literal null, prose, and an
/// object with neither price nor coupon.
#[tokio::test]
async fn test_non_promotions_are_dropped() {
    let harness = keyboard_harness().with_group().await;
    harness
        .user_with_tastes("Alice", "111", &["mechanical keyboard"])
        .await;
    let embed_calls = harness.embedder.call_count();

    for answer in [
        "null",
        "I could not find any promotion in this message.",
        r#"{"name":"Good morning","type":"unknown"}"#,
    ] {
        harness.completion.push_response(answer);
        let outcome = harness
            .pipeline
            .handle(&group_message(DEALS_GROUP, "bom dia pessoal"))
            .await
            .unwrap();
        assert_eq!(outcome, PipelineOutcome::NoPromotion);
    }

    assert_eq!(harness.completion.call_count(), 3);
    assert_eq!(harness.embedder.call_count(), embed_calls);
    assert!(harness.sender.sent().is_empty());
}

/// A coupon with no price is still a promotion.
#[tokio::test]
async fn test_coupon_only_promotion_dispatched() {
    let embedder = MockEmbedder::new(e2e_tests::DIMENSION)
        .with_vector("mechanical keyboard", vector(&[1.0]))
        .with_vector("Keyboard store voucher | keyboard | coupon", vector(&[1.0]));
    let harness = TestHarness::with_components(embedder, RecordingSender::new())
        .with_group()
        .await;
    harness
        .user_with_tastes("Alice", "111", &["mechanical keyboard"])
        .await;
    harness.completion.push_response(
        r#"{"name":"Keyboard store voucher","type":"coupon","tags":["keyboard"],"couponCodes":"SAVE15"}"#,
    );

    let outcome = harness
        .pipeline
        .handle(&group_message(DEALS_GROUP, "cupom SAVE15 na loja"))
        .await
        .unwrap();

    assert!(matches!(outcome, PipelineOutcome::Dispatched(_)));
    let text = &harness.sender.sent()[0].text;
    assert!(!text.contains("💰"));
    assert!(text.contains("🎟️ *Coupon(s):* `SAVE15`"));
    assert!(text.contains("⭐ *Match:* 100% ⭐⭐⭐⭐⭐"));
}

/// A promotion nobody cares about ends without sends.
#[tokio::test]
async fn test_no_matches_below_threshold() {
    let harness = keyboard_harness().with_group().await;
    harness
        .user_with_tastes("Bob", "222", &["garden hose"])
        .await;
    harness.completion.push_response(product_json(
        "Keychron K2",
        399.9,
        &["keyboard", "mechanical"],
    ));

    let outcome = harness
        .pipeline
        .handle(&group_message(DEALS_GROUP, "Keychron K2 399,90"))
        .await
        .unwrap();

    assert_eq!(outcome, PipelineOutcome::NoMatches);
    assert!(harness.sender.sent().is_empty());
}
