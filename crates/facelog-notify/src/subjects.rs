//! Display name → subject identifier table.
//!
//! The table is a TOML file of `[[subject]]` entries. A default table is
//! embedded at compile time from `contrib/subjects.toml`.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

const BUILTIN_SUBJECTS: &str = include_str!("../../../contrib/subjects.toml");

#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("cannot read subject table {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid subject table: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Deserialize)]
struct SubjectFile {
    #[serde(default)]
    subject: Vec<SubjectRow>,
}

#[derive(Debug, Deserialize)]
struct SubjectRow {
    name: String,
    id: String,
}

/// Lookup from uppercase display name to subject id.
#[derive(Debug, Clone, Default)]
pub struct SubjectDirectory {
    ids: HashMap<String, String>,
}

impl SubjectDirectory {
    /// The table shipped with the binary.
    pub fn builtin() -> Result<Self, DirectoryError> {
        Self::from_toml_str(BUILTIN_SUBJECTS)
    }

    /// Read a table from disk.
    pub fn load(path: &Path) -> Result<Self, DirectoryError> {
        let src = std::fs::read_to_string(path).map_err(|source| DirectoryError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let dir = Self::from_toml_str(&src)?;
        tracing::info!(path = %path.display(), subjects = dir.len(), "loaded subject table");
        Ok(dir)
    }

    /// Parse a table. A name listed twice keeps its last id.
    pub fn from_toml_str(src: &str) -> Result<Self, DirectoryError> {
        let file: SubjectFile = toml::from_str(src)?;
        Ok(file.subject.into_iter().map(|row| (row.name, row.id)).collect())
    }

    /// Subject id for a gallery label; matching ignores case and surrounding spaces.
    pub fn resolve(&self, label: &str) -> Option<&str> {
        self.ids.get(&normalize(label)).map(String::as_str)
    }

    pub fn insert(&mut self, name: &str, id: impl Into<String>) {
        let key = normalize(name);
        let id = id.into();
        if let Some(previous) = self.ids.insert(key.clone(), id.clone()) {
            if previous != id {
                tracing::warn!(name = %key, previous = %previous, id = %id, "duplicate subject name; keeping the later id");
            }
        }
    }

    /// Entries sorted by name.
    pub fn entries(&self) -> Vec<(&str, &str)> {
        let mut rows: Vec<(&str, &str)> = self.ids.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        rows.sort_unstable();
        rows
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl<N: AsRef<str>, I: Into<String>> FromIterator<(N, I)> for SubjectDirectory {
    fn from_iter<T: IntoIterator<Item = (N, I)>>(iter: T) -> Self {
        let mut dir = SubjectDirectory::default();
        for (name, id) in iter {
            dir.insert(name.as_ref(), id);
        }
        dir
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_uppercase()
}
