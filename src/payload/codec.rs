use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;
use tracing::debug;

use crate::errors::Error;

/// Serializes `value` to JSON and base64-encodes its UTF-8 bytes.
pub fn encode(value: &Value) -> Result<String, Error> {
    let text = serde_json::to_string(value).map_err(|e| Error::Encode(e.to_string()))?;
    Ok(STANDARD.encode(text.as_bytes()))
}

/// Inverse of [`encode`].
///
/// Falls back to reading the decoded bytes as Latin-1 text, which is how peers
/// that base64 their JSON without UTF-8 transcoding produce payloads.
pub fn decode(text: &str) -> Result<Value, Error> {
    let bytes = STANDARD.decode(text.trim()).map_err(|e| Error::Decode {
        raw: text.to_string(),
        reason: e.to_string(),
    })?;
    match serde_json::from_slice(&bytes) {
        Ok(value) => Ok(value),
        Err(primary) => {
            debug!(error = %primary, "payload.decode.legacy_fallback");
            decode_legacy(&bytes).map_err(|legacy| Error::Decode {
                raw: text.to_string(),
                reason: format!("{primary}; legacy: {legacy}"),
            })
        }
    }
}

fn decode_legacy(bytes: &[u8]) -> Result<Value, serde_json::Error> {
    let latin1: String = bytes.iter().map(|&b| char::from(b)).collect();
    serde_json::from_str(&latin1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn legacy_encode(text: &str) -> String {
        let bytes: Vec<u8> = text
            .chars()
            .map(|c| u8::try_from(u32::from(c)).expect("latin-1 only"))
            .collect();
        STANDARD.encode(bytes)
    }

    #[test]
    fn round_trips_multibyte_text() {
        let value = json!({
            "question": "Quelle est la capitale de l'Allemagne? 🇩🇪",
            "answer": "Berlín",
            "tags": ["数学", "ελληνικά"],
            "score": 9.5,
            "passed": true,
            "notes": null
        });
        let encoded = encode(&value).unwrap();
        assert!(encoded.is_ascii());
        assert_eq!(decode(&encoded).unwrap(), value);
    }

    #[test]
    fn encodes_utf8_bytes_not_code_points() {
        let encoded = encode(&json!("é")).unwrap();
        let bytes = STANDARD.decode(encoded).unwrap();
        assert_eq!(bytes, "\"é\"".as_bytes());
    }

    #[test]
    fn legacy_latin1_payload_uses_fallback() {
        let encoded = legacy_encode(r#"{"name":"café","ok":true}"#);
        assert!(STANDARD.decode(&encoded).map(String::from_utf8).unwrap().is_err());

        let value = decode(&encoded).unwrap();
        assert_eq!(value, json!({"name": "café", "ok": true}));
    }

    #[test]
    fn decode_error_keeps_raw_text() {
        let err = decode("bm90IGpzb24=").unwrap_err();
        match err {
            Error::Decode { raw, reason } => {
                assert_eq!(raw, "bm90IGpzb24=");
                assert!(reason.contains("legacy"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn decode_rejects_invalid_base64() {
        let err = decode("%%%").unwrap_err();
        assert!(matches!(err, Error::Decode { raw, .. } if raw == "%%%"));
    }
}
