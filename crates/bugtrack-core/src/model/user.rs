use super::UserId;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// A registered user. The credential is never serialized into snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    #[serde(skip)]
    pub credential: Credential,
    pub created_at_us: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub credential: Credential,
}

/// Salted blake3 digest of a user secret.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credential {
    pub salt: String,
    pub digest: String,
}

impl Credential {
    /// Derive a fresh credential from `secret` with a random salt.
    #[must_use]
    pub fn derive(secret: &str) -> Self {
        let salt = to_hex(&rand::random::<[u8; 16]>());
        let digest = digest(&salt, secret).to_hex().to_string();
        Self { salt, digest }
    }

    /// Constant-time check of `secret` against the stored digest.
    #[must_use]
    pub fn verify(&self, secret: &str) -> bool {
        blake3::Hash::from_hex(&self.digest)
            .is_ok_and(|stored| stored == digest(&self.salt, secret))
    }
}

fn digest(salt: &str, secret: &str) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(salt.as_bytes());
    hasher.update(&[0]);
    hasher.update(secret.as_bytes());
    hasher.finalize()
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}
