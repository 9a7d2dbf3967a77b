//! Content-derived batch keys.
//!
//! The same key names a batch in the result cache and in the keyed mutex.

use serde::Serialize;
use sha2::{Digest, Sha256};

/// `{prefix}_{sha256 hex}` of the JSON encoding of `content`.
pub fn content_key<S>(prefix: &str, content: &S) -> String
where
    S: Serialize + ?Sized,
{
    let mut hasher = Sha256::new();
    // Serialising plain data into a Vec cannot fail
    let encoded = serde_json::to_vec(content).unwrap_or_default();
    hasher.update(&encoded);
    format!("{}_{}", prefix, hex::encode(hasher.finalize()))
}

/// Key over an identifier set: order and duplicates do not matter.
pub fn id_set_key<I>(prefix: &str, ids: &[I], variant: &str) -> String
where
    I: AsRef<str>,
{
    let mut sorted: Vec<&str> = ids.iter().map(AsRef::as_ref).collect();
    sorted.sort_unstable();
    sorted.dedup();
    content_key(prefix, &(sorted, variant))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_content_key_is_stable_and_prefixed() {
        let a = content_key("batch", &json!([{ "id": "UC1", "videoTitle": "t" }]));
        let b = content_key("batch", &json!([{ "id": "UC1", "videoTitle": "t" }]));
        assert_eq!(a, b);
        assert!(a.starts_with("batch_"));
        assert_eq!(a.len(), "batch_".len() + 64);
    }

    #[test]
    fn test_content_key_depends_on_order() {
        let a = content_key("batch", &["x", "y"]);
        let b = content_key("batch", &["y", "x"]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_id_set_key_normalises() {
        assert_eq!(
            id_set_key("channels", &["b", "a", "b"], "production"),
            id_set_key("channels", &["a", "b"], "production")
        );
        assert_ne!(
            id_set_key("channels", &["a"], "production"),
            id_set_key("channels", &["a"], "development")
        );
    }
}
