//! Deterministic enumeration of packing inputs.
//!
//! Items are ordered by their raw reference name (the sketch path for on-disk catalogs), which
//! fixes the processing order of the packer and makes runs reproducible.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{Error, Result};

/// File name tokens that are parameters or extensions rather than part of a sample identifier,
/// e.g. `SAMEA897824.fa.gz.w.31.spacing.10.hll`.
pub const DEFAULT_NOISE_TOKENS: [&str; 8] = ["fa", "fq", "gz", "w", "31", "spacing", "10", "hll"];

/// Single packing input
#[derive(Debug, Clone, PartialEq)]
pub struct Item<S> {
    id: String,
    sketch: S,
}

impl<S> Item<S> {
    /// Creates new `Item` from an identifier and a sketch reference
    pub fn new(id: impl Into<String>, sketch: S) -> Self {
        Self {
            id: id.into(),
            sketch,
        }
    }

    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[inline]
    pub fn sketch(&self) -> &S {
        &self.sketch
    }

    pub fn into_parts(self) -> (String, S) {
        (self.id, self.sketch)
    }
}

/// What to do when a raw name contains no clean identifier token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum FallbackPolicy {
    /// Use the raw name verbatim
    Silent,
    /// Use the raw name verbatim and log a warning
    #[default]
    Warn,
    /// Fail catalog construction
    Reject,
}

/// Result of identifier extraction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    /// First token of the name that is not noise
    Token(String),
    /// No clean token found, the whole name is used
    Verbatim(String),
}

impl Identifier {
    pub fn as_str(&self) -> &str {
        match self {
            Identifier::Token(s) | Identifier::Verbatim(s) => s,
        }
    }

    pub fn into_string(self) -> String {
        match self {
            Identifier::Token(s) | Identifier::Verbatim(s) => s,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Identifier::Verbatim(_))
    }
}

/// Rules mapping raw reference names to item identifiers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierRules {
    noise_tokens: Vec<String>,
    fallback: FallbackPolicy,
}

impl Default for IdentifierRules {
    fn default() -> Self {
        Self {
            noise_tokens: DEFAULT_NOISE_TOKENS.iter().map(|t| t.to_string()).collect(),
            fallback: FallbackPolicy::default(),
        }
    }
}

impl IdentifierRules {
    /// Replace the noise token set
    pub fn with_noise_tokens<I, T>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.noise_tokens = tokens.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_fallback(mut self, fallback: FallbackPolicy) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn fallback(&self) -> FallbackPolicy {
        self.fallback
    }

    /// Extract the identifier from a file name: the first non-empty `.`-separated token that is
    /// not a noise token, or the whole name when every token is noise.
    pub fn extract(&self, file_name: &str) -> Identifier {
        file_name
            .split('.')
            .find(|part| !part.is_empty() && !self.noise_tokens.iter().any(|t| t == part))
            .map(|part| Identifier::Token(part.to_string()))
            .unwrap_or_else(|| Identifier::Verbatim(file_name.to_string()))
    }

    /// Resolve an identifier, applying the fallback policy.
    pub fn resolve(&self, file_name: &str) -> Result<String> {
        let identifier = self.extract(file_name);
        if identifier.is_fallback() {
            match self.fallback {
                FallbackPolicy::Silent => {}
                FallbackPolicy::Warn => {
                    warn!(name = file_name, "no identifier token, using full name")
                }
                FallbackPolicy::Reject => {
                    return Err(Error::UnrecognizedIdentifier(file_name.to_string()))
                }
            }
        }
        Ok(identifier.into_string())
    }
}

/// Ordered, duplicate-free sequence of items
#[derive(Debug, Clone, PartialEq)]
pub struct ItemCatalog<S> {
    items: Vec<Item<S>>,
}

impl<S> ItemCatalog<S> {
    /// Build a catalog from `(raw_name, sketch)` pairs, ordered by raw name.
    pub fn from_named<I, N>(entries: I, rules: &IdentifierRules) -> Result<Self>
    where
        I: IntoIterator<Item = (N, S)>,
        N: Into<String>,
    {
        let mut entries: Vec<(String, S)> = entries
            .into_iter()
            .map(|(name, sketch)| (name.into(), sketch))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let mut seen: HashMap<String, String> = HashMap::with_capacity(entries.len());
        let mut items = Vec::with_capacity(entries.len());
        for (name, sketch) in entries {
            let id = rules.resolve(base_name(&name))?;
            if let Some(first) = seen.get(&id) {
                return Err(Error::DuplicateIdentifier {
                    id,
                    first: first.clone(),
                    second: name,
                });
            }
            debug!(id = %id, name = %name, "catalogued item");
            seen.insert(id.clone(), name);
            items.push(Item::new(id, sketch));
        }

        Ok(Self { items })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[Item<S>] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Item<S>> {
        self.items.iter()
    }
}

impl ItemCatalog<PathBuf> {
    /// Catalog every file with `extension` directly inside `dir`, ordered by path.
    ///
    /// Hidden files (name starting with `.`) are ignored. A missing directory is treated as an empty catalog.
    pub fn scan(dir: &Path, extension: &str, rules: &IdentifierRules) -> Result<Self> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(dir = %dir.display(), "sketch directory does not exist");
                return Ok(Self { items: Vec::new() });
            }
            Err(e) => return Err(Error::io(dir, e)),
        };

        let mut paths = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| Error::io(dir, e))?.path();
            let hidden = path
                .file_name()
                .is_some_and(|name| name.to_string_lossy().starts_with('.'));
            if !hidden && path.is_file() && path.extension().is_some_and(|ext| ext == extension) {
                paths.push(path);
            }
        }

        Self::from_named(
            paths
                .into_iter()
                .map(|path| (path.to_string_lossy().into_owned(), path)),
            rules,
        )
    }
}

impl<S> IntoIterator for ItemCatalog<S> {
    type Item = Item<S>;
    type IntoIter = std::vec::IntoIter<Item<S>>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

/// Final path component of a raw name, or the name itself
fn base_name(name: &str) -> &str {
    Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(name)
}
