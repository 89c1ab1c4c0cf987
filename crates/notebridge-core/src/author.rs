//! Author configuration and NIP-19 identifier decoding.
//!
//! Authors are configured as a JSON array of `{npub, name, link}` records.
//! Each `npub` is decoded to its canonical hex public key, which is the key
//! events are matched on. Anything that is not a public key is rejected, so a
//! pasted `note1...` or `nprofile1...` aborts startup instead of silently
//! never matching.

use crate::error::{Error, Result};
use nostr::nips::nip19::{FromBech32, Nip19};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// One record of the author configuration file.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct AuthorEntry {
    /// Bech32 `npub` identifier.
    #[serde(alias = "Npub")]
    pub npub: String,
    /// Display name used in notifications.
    #[serde(alias = "Name")]
    pub name: String,
    /// Link attached to the display name.
    #[serde(alias = "Link")]
    pub link: String,
}

/// A resolved author.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    /// Canonical hex public key.
    pub key: String,
    /// Display name used in notifications.
    pub display_name: String,
    /// Link attached to the display name.
    pub link: String,
}

/// Result of decoding a NIP-19 identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedIdentifier {
    /// An `npub`, carrying the hex public key.
    PublicKey(String),
    /// Any other NIP-19 entity, named by its bech32 prefix.
    Other(&'static str),
}

/// Decode a bech32 NIP-19 identifier.
///
/// Returns an error only when the string is not valid NIP-19 at all. Valid
/// identifiers of the wrong kind come back as [`DecodedIdentifier::Other`] so
/// callers decide what to accept.
pub fn decode_identifier(identifier: &str) -> Result<DecodedIdentifier> {
    let nip19 = Nip19::from_bech32(identifier).map_err(|e| Error::InvalidIdentifier {
        identifier: identifier.to_string(),
        reason: e.to_string(),
    })?;

    #[allow(unreachable_patterns)]
    let decoded = match nip19 {
        Nip19::Pubkey(public_key) => DecodedIdentifier::PublicKey(public_key.to_hex()),
        Nip19::Profile(_) => DecodedIdentifier::Other("nprofile"),
        Nip19::EventId(_) => DecodedIdentifier::Other("note"),
        Nip19::Event(_) => DecodedIdentifier::Other("nevent"),
        Nip19::Coordinate(_) => DecodedIdentifier::Other("naddr"),
        Nip19::Secret(_) => DecodedIdentifier::Other("nsec"),
        _ => DecodedIdentifier::Other("unsupported entity"),
    };

    Ok(decoded)
}

/// Immutable mapping from hex public key to [`Author`].
///
/// Keys keep configuration order so the relay filter is stable across runs.
#[derive(Debug, Clone, Default)]
pub struct AuthorDirectory {
    authors: HashMap<String, Author>,
    order: Vec<String>,
}

impl AuthorDirectory {
    /// Build a directory from configuration records.
    ///
    /// Fails on the first identifier that is not a valid `npub`, or when no
    /// records are given. A repeated `npub` keeps its first position and the
    /// last record's metadata.
    pub fn from_entries(entries: Vec<AuthorEntry>) -> Result<Self> {
        if entries.is_empty() {
            return Err(Error::NoAuthors);
        }

        let authors = entries
            .into_iter()
            .map(|entry| match decode_identifier(&entry.npub)? {
                DecodedIdentifier::PublicKey(key) => Ok(Author {
                    key,
                    display_name: entry.name,
                    link: entry.link,
                }),
                DecodedIdentifier::Other(entity) => Err(Error::UnexpectedEntity {
                    identifier: entry.npub,
                    entity,
                }),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::from_authors(authors))
    }

    /// Build a directory from already-resolved authors.
    pub fn from_authors(authors: impl IntoIterator<Item = Author>) -> Self {
        let mut directory = Self::default();
        for author in authors {
            directory.insert(author);
        }
        directory
    }

    fn insert(&mut self, author: Author) {
        let key = author.key.clone();
        if self.authors.insert(key.clone(), author).is_some() {
            tracing::warn!(author = %key, "duplicate author entry, later entry wins");
        } else {
            self.order.push(key);
        }
    }

    /// Parse a JSON array of [`AuthorEntry`] records.
    pub fn from_json(json: &str) -> Result<Self> {
        let entries: Vec<AuthorEntry> = serde_json::from_str(json)?;
        Self::from_entries(entries)
    }

    /// Load the author configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let directory = Self::from_json(&json)?;
        tracing::info!(
            path = %path.display(),
            authors = directory.len(),
            "author configuration loaded"
        );
        Ok(directory)
    }

    /// Look up an author by hex public key.
    pub fn get(&self, key: &str) -> Option<&Author> {
        self.authors.get(key)
    }

    /// Hex public keys in configuration order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Number of distinct authors.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the directory has no authors.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
