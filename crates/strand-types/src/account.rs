use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// An account on the source chain, identified by its ed25519 public key.
///
/// The canonical textual form is the `G...` strkey address, which is also
/// what the history store indexes participants by.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId {
    key: [u8; 32],
}

impl AccountId {
    pub const fn from_bytes(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Derive a deterministic account from a label. Used to build fixtures.
    pub fn from_seed(seed: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"strand-account-v1:");
        hasher.update(seed.as_bytes());
        Self {
            key: *hasher.finalize().as_bytes(),
        }
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.key
    }

    /// The `G...` strkey address.
    pub fn address(&self) -> String {
        stellar_strkey::ed25519::PublicKey(self.key).to_string()
    }

    /// Parse a `G...` strkey address.
    pub fn from_address(address: &str) -> Result<Self, TypeError> {
        let pk = stellar_strkey::ed25519::PublicKey::from_string(address)
            .map_err(|e| TypeError::InvalidAddress(format!("{address}: {e}")))?;
        Ok(Self { key: pk.0 })
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let address = self.address();
        write!(f, "AccountId({}…)", &address[..8])
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.address())
    }
}
