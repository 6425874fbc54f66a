//! Canonical binary encoding for ledger data.
//!
//! Envelopes, results, meta, headers and bucket records are stored and
//! compared in this form. Equal values always encode to equal bytes.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::TypeError;

pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, TypeError> {
    bincode::serialize(value).map_err(|e| TypeError::Serialization(e.to_string()))
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, TypeError> {
    bincode::deserialize(bytes).map_err(|e| TypeError::Serialization(e.to_string()))
}

/// Canonical encoding, base64 wrapped. This is the textual form stored in
/// history rows and shown in diagnostics.
pub fn encode_base64<T: Serialize>(value: &T) -> Result<String, TypeError> {
    Ok(STANDARD.encode(encode(value)?))
}

pub fn decode_base64<T: DeserializeOwned>(text: &str) -> Result<T, TypeError> {
    let bytes = STANDARD
        .decode(text)
        .map_err(|e| TypeError::InvalidBase64(e.to_string()))?;
    decode(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::AccountId;
    use crate::asset::Asset;
    use crate::entry::LedgerKey;

    #[test]
    fn equal_values_encode_equal() {
        let a = LedgerKey::trustline(AccountId::from_seed("a"), Asset::Native);
        let b = LedgerKey::trustline(AccountId::from_seed("a"), Asset::Native);
        assert_eq!(encode(&a).unwrap(), encode(&b).unwrap());
    }

    #[test]
    fn base64_roundtrip() {
        let key = LedgerKey::data(AccountId::from_seed("a"), "name");
        let text = encode_base64(&key).unwrap();
        let back: LedgerKey = decode_base64(&text).unwrap();
        assert_eq!(back, key);
    }

    #[test]
    fn decode_rejects_truncated_input() {
        let key = LedgerKey::data(AccountId::from_seed("a"), "name");
        let bytes = encode(&key).unwrap();
        let err = decode::<LedgerKey>(&bytes[..bytes.len() - 3]).unwrap_err();
        assert!(matches!(err, TypeError::Serialization(_)));
    }

    #[test]
    fn decode_base64_rejects_bad_text() {
        assert!(matches!(
            decode_base64::<LedgerKey>("not base64!"),
            Err(TypeError::InvalidBase64(_))
        ));
    }
}
