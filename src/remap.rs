//! Model name remapping for outbound JSON request bodies
use bytes::Bytes;
use serde_json::value::RawValue;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

/// Source model name → target model name. Built once at startup, read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelMap(HashMap<String, String>);

impl ModelMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Later inserts for the same source replace earlier ones.
    pub fn insert(&mut self, from: impl Into<String>, to: impl Into<String>) {
        self.0.insert(from.into(), to.into());
    }

    pub fn get(&self, model: &str) -> Option<&str> {
        self.0.get(model).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ModelMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = ModelMap::new();
        for (from, to) in iter {
            map.insert(from, to);
        }
        map
    }
}

/// `application/json`, bare or with parameters. Nothing looser.
pub fn is_json_content_type(content_type: &str) -> bool {
    content_type == "application/json" || content_type.starts_with("application/json;")
}

/// Top-level fields of a JSON object. Values are kept as their raw JSON text
/// so everything except `model` is written back exactly as received.
type Document = BTreeMap<String, Box<RawValue>>;

/// Rewrite the `model` field of a JSON request body according to `models`.
///
/// Returns the body to forward and whether it differs from the input. Any
/// content type other than JSON, a body that is not a JSON object, or a
/// `model` that is missing, not a string, or unmapped leaves the body as is.
pub fn remap(body: &Bytes, content_type: Option<&str>, models: &ModelMap) -> (Bytes, bool) {
    if !content_type.is_some_and(is_json_content_type) {
        return (body.clone(), false);
    }

    match remap_model(body, models) {
        Some(rewritten) => (rewritten, true),
        None => (body.clone(), false),
    }
}

fn remap_model(body: &[u8], models: &ModelMap) -> Option<Bytes> {
    let mut doc: Document = match serde_json::from_slice(body) {
        Ok(doc) => doc,
        Err(e) => {
            debug!("Body is not a JSON object, skipping model remap: {}", e);
            return None;
        }
    };

    let current: Value = serde_json::from_str(doc.get("model")?.get()).ok()?;
    let from = current.as_str()?;
    let to = models.get(from)?;

    let replacement = serde_json::value::to_raw_value(to).ok()?;
    doc.insert("model".to_string(), replacement);
    let rewritten = serde_json::to_vec(&doc).ok()?;

    info!("✏️  Remapped model: {} → {}", from, to);
    Some(Bytes::from(rewritten))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn models() -> ModelMap {
        ModelMap::from_iter([("some-dangerous-model", "less-safe-model")])
    }

    fn body(value: Value) -> Bytes {
        Bytes::from(serde_json::to_vec(&value).unwrap())
    }

    #[test]
    fn test_remaps_mapped_model() {
        let input = body(json!({"model": "some-dangerous-model"}));
        let (out, changed) = remap(&input, Some("application/json"), &models());

        assert!(changed);
        assert_eq!(&out[..], br#"{"model":"less-safe-model"}"#);
    }

    #[test]
    fn test_remaps_with_charset_parameter() {
        let input = body(json!({"model": "some-dangerous-model"}));
        let (out, changed) = remap(&input, Some("application/json; charset=utf-8"), &models());

        assert!(changed);
        let parsed: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed["model"], "less-safe-model");
    }

    #[test]
    fn test_keeps_other_fields() {
        let input = body(json!({
            "model": "some-dangerous-model",
            "stream": true,
            "messages": [{"role": "user", "content": "hi"}],
            "max_tokens": 1024
        }));
        let (out, changed) = remap(&input, Some("application/json"), &models());

        assert!(changed);
        let parsed: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(
            parsed,
            json!({
                "model": "less-safe-model",
                "stream": true,
                "messages": [{"role": "user", "content": "hi"}],
                "max_tokens": 1024
            })
        );
    }

    #[test]
    fn test_preserves_raw_values_exactly() {
        let input = Bytes::from_static(
            br#"{"model":"some-dangerous-model","seed":123456789012345678901234567890,"temperature":0.10000000000000001}"#,
        );
        let (out, changed) = remap(&input, Some("application/json"), &models());

        assert!(changed);
        let text = std::str::from_utf8(&out).unwrap();
        assert!(text.contains(r#""seed":123456789012345678901234567890"#));
        assert!(text.contains(r#""temperature":0.10000000000000001"#));
        assert!(text.contains(r#""model":"less-safe-model""#));
    }

    #[test]
    fn test_unmapped_model_is_untouched() {
        let input = body(json!({"model": "some-other-model"}));
        let (out, changed) = remap(&input, Some("application/json"), &models());

        assert!(!changed);
        assert_eq!(out, input);
    }

    #[test]
    fn test_non_string_model_is_untouched() {
        let input = body(json!({"model": 123}));
        let (out, changed) = remap(&input, Some("application/json"), &models());

        assert!(!changed);
        assert_eq!(out, input);
    }

    #[test]
    fn test_missing_model_is_untouched() {
        let input = body(json!({"other_field": "some-value"}));
        let (out, changed) = remap(&input, Some("application/json"), &models());

        assert!(!changed);
        assert_eq!(out, input);
    }

    #[test]
    fn test_other_content_types_are_untouched() {
        let input = body(json!({"model": "some-dangerous-model"}));

        for content_type in [Some("application/jsoninvalid"), Some("text/plain"), Some(""), None] {
            let (out, changed) = remap(&input, content_type, &models());
            assert!(!changed, "content type {:?} should not be remapped", content_type);
            assert_eq!(out, input);
        }
    }

    #[test]
    fn test_malformed_json_is_untouched() {
        let input = Bytes::from_static(br#"{"model": "some-dangerous-model""#);
        let (out, changed) = remap(&input, Some("application/json"), &models());

        assert!(!changed);
        assert_eq!(out, input);
    }

    #[test]
    fn test_non_object_json_is_untouched() {
        let input = Bytes::from_static(br#"["some-dangerous-model"]"#);
        let (out, changed) = remap(&input, Some("application/json"), &models());

        assert!(!changed);
        assert_eq!(out, input);
    }

    #[test]
    fn test_later_mapping_wins() {
        let map = ModelMap::from_iter([("a", "b"), ("a", "c")]);
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("a"), Some("c"));
    }
}
