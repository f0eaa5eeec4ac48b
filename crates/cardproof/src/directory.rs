//! External collaborators: key directory and content fetcher.
//!
//! The service calls out through these traits and never implements a
//! transport itself. Failures are `anyhow` errors; the service maps them to
//! typed errors at its boundary.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use cardproof_core::{Content, PublicKey};

/// Resolves a cosigner identity to its public key.
#[async_trait]
pub trait KeyDirectory: Send + Sync {
    async fn resolve(&self, identity: &str) -> anyhow::Result<PublicKey>;
}

/// Fetches the content a proof's `resource.url` points at.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> anyhow::Result<Content>;
}

/// In-process key directory.
#[derive(Debug, Default)]
pub struct StaticKeyDirectory {
    keys: RwLock<HashMap<String, PublicKey>>,
}

impl StaticKeyDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an identity's key.
    pub fn insert(&self, identity: impl Into<String>, key: PublicKey) {
        if let Ok(mut keys) = self.keys.write() {
            keys.insert(identity.into(), key);
        }
    }

    pub fn with(self, identity: impl Into<String>, key: PublicKey) -> Self {
        self.insert(identity, key);
        self
    }
}

#[async_trait]
impl KeyDirectory for StaticKeyDirectory {
    async fn resolve(&self, identity: &str) -> anyhow::Result<PublicKey> {
        let keys = self.keys.read().map_err(|_| anyhow!("key directory lock poisoned"))?;
        match keys.get(identity) {
            Some(key) => Ok(*key),
            None => bail!("no key registered for {identity}"),
        }
    }
}

/// In-process content fetcher.
#[derive(Debug, Default)]
pub struct StaticContentFetcher {
    content: RwLock<HashMap<String, Content>>,
}

impl StaticContentFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, url: impl Into<String>, content: impl Into<Content>) {
        if let Ok(mut map) = self.content.write() {
            map.insert(url.into(), content.into());
        }
    }

    pub fn with(self, url: impl Into<String>, content: impl Into<Content>) -> Self {
        self.insert(url, content);
        self
    }
}

#[async_trait]
impl ContentFetcher for StaticContentFetcher {
    async fn fetch(&self, url: &str) -> anyhow::Result<Content> {
        let map = self.content.read().map_err(|_| anyhow!("content map lock poisoned"))?;
        map.get(url)
            .cloned()
            .ok_or_else(|| anyhow!("nothing served at {url}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardproof_core::Keypair;

    #[tokio::test]
    async fn test_static_directory() {
        let key = Keypair::from_seed(&[7u8; 32]).public_key();
        let directory = StaticKeyDirectory::new().with("did:cc:bob", key);

        assert_eq!(directory.resolve("did:cc:bob").await.unwrap(), key);
        assert!(directory.resolve("did:cc:carol").await.is_err());
    }

    #[tokio::test]
    async fn test_static_fetcher() {
        let fetcher = StaticContentFetcher::new().with("https://example.com/a", "hi");

        let content = fetcher.fetch("https://example.com/a").await.unwrap();
        assert_eq!(content.as_bytes(), b"hi");
        assert!(fetcher.fetch("https://example.com/b").await.is_err());
    }
}
