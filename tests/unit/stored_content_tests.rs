//! Unit tests for the stored content envelope

use snapback::models::StoredContent;

#[test]
fn identical_pre_save_stays_plain() {
    let stored = StoredContent::pack("same".to_string(), Some("same"));
    assert!(!stored.is_envelope());
    assert_eq!(stored.encode().unwrap(), "same");
}

#[test]
fn differing_pre_save_is_enveloped() {
    let stored = StoredContent::pack("on disk".to_string(), Some("in editor"));
    assert!(stored.is_envelope());

    let encoded = stored.encode().unwrap();
    let value: serde_json::Value = serde_json::from_str(&encoded).unwrap();
    assert_eq!(value["content"], "on disk");
    assert_eq!(value["previousBlob"], "in editor");

    let decoded = StoredContent::decode(&encoded, Some(true));
    assert_eq!(decoded, stored);
    assert_eq!(decoded.content(), "on disk");
}

#[test]
fn flagged_plain_json_text_is_not_unwrapped() {
    let raw = r#"{"content":"x","previousBlob":"y"}"#;
    let decoded = StoredContent::decode(raw, Some(false));
    assert_eq!(decoded.into_content(), raw);
}

#[test]
fn unflagged_records_are_sniffed() {
    let raw = r#"{"content":"x","previousBlob":"y"}"#;
    assert!(StoredContent::decode(raw, None).is_envelope());
    assert!(!StoredContent::decode("plain text", None).is_envelope());
}
