//! Transaction signature type.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{MAX_SIGNATURE_LEN, SIGNATURE_SIZE};
use crate::error::{Result, TricorderError};

/// A Solana transaction signature in its canonical base58 form.
///
/// Construction validates that the text decodes to exactly
/// [`SIGNATURE_SIZE`] bytes, so anything holding a `TxSignature` can be used
/// as a cache key and passed to the RPC backend without further checks.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TxSignature(String);

impl TxSignature {
    /// Parses and validates a base58 signature.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() || raw.len() > MAX_SIGNATURE_LEN {
            return Err(TricorderError::InvalidSignature(format!(
                "expected 1..={} characters, got {}",
                MAX_SIGNATURE_LEN,
                raw.len()
            )));
        }

        let bytes = bs58::decode(raw)
            .into_vec()
            .map_err(|e| TricorderError::InvalidSignature(e.to_string()))?;

        if bytes.len() != SIGNATURE_SIZE {
            return Err(TricorderError::InvalidSignature(format!(
                "expected {} bytes, got {}",
                SIGNATURE_SIZE,
                bytes.len()
            )));
        }

        Ok(Self(raw.to_string()))
    }

    /// Returns the base58 text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decodes the signature bytes.
    pub fn to_bytes(&self) -> [u8; SIGNATURE_SIZE] {
        let mut out = [0u8; SIGNATURE_SIZE];
        // Length was checked in `parse`
        if let Ok(bytes) = bs58::decode(&self.0).into_vec() {
            out.copy_from_slice(&bytes);
        }
        out
    }

    /// Returns true if `raw` is a valid signature.
    pub fn is_valid(raw: &str) -> bool {
        Self::parse(raw).is_ok()
    }
}

impl FromStr for TxSignature {
    type Err = TricorderError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TxSignature {
    type Error = TricorderError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<TxSignature> for String {
    fn from(sig: TxSignature) -> Self {
        sig.0
    }
}

impl AsRef<str> for TxSignature {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    fn encoded(bytes: &[u8]) -> String {
        bs58::encode(bytes).into_string()
    }

    #[test]
    fn test_parse_valid_signature() {
        let raw = encoded(&[42u8; SIGNATURE_SIZE]);
        let sig = TxSignature::parse(&raw).unwrap();
        assert_eq!(sig.as_str(), raw);
        assert_eq!(sig.to_bytes(), [42u8; SIGNATURE_SIZE]);
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let raw = encoded(&[1u8; SIGNATURE_SIZE]);
        let sig = TxSignature::parse(&format!("  {}\n", raw)).unwrap();
        assert_eq!(sig.as_str(), raw);
    }

    #[test_case("" ; "empty")]
    #[test_case("0OIl" ; "characters outside the base58 alphabet")]
    #[test_case("sigA" ; "too short")]
    fn test_parse_rejects(raw: &str) {
        assert!(matches!(
            TxSignature::parse(raw),
            Err(TricorderError::InvalidSignature(_))
        ));
    }

    #[test]
    fn test_parse_rejects_wrong_length() {
        let raw = encoded(&[9u8; 32]);
        assert!(!TxSignature::is_valid(&raw));
    }

    #[test]
    fn test_serde_roundtrip_validates() {
        let raw = encoded(&[3u8; SIGNATURE_SIZE]);
        let json = serde_json::to_string(&TxSignature::parse(&raw).unwrap()).unwrap();
        assert_eq!(json, format!("\"{}\"", raw));

        let bad: std::result::Result<TxSignature, _> = serde_json::from_str("\"nope\"");
        assert!(bad.is_err());
    }

    proptest! {
        #[test]
        fn prop_any_64_bytes_parse(
            bytes in proptest::collection::vec(any::<u8>(), SIGNATURE_SIZE)
        ) {
            let raw = encoded(&bytes);
            let sig = TxSignature::parse(&raw).unwrap();
            prop_assert_eq!(sig.to_bytes().to_vec(), bytes);
        }
    }
}
