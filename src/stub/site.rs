use std::fmt;
use std::panic::Location;
use std::sync::Arc;

use sha1::{Digest, Sha1};

/// Where a stub was declared. Two stubs with the same name but different
/// sites are distinct functions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DeclarationSite {
    Source {
        file: &'static str,
        line: u32,
        column: u32,
    },
    Manifest {
        path: String,
        index: usize,
    },
}

impl DeclarationSite {
    #[track_caller]
    pub fn caller() -> Self {
        let location = Location::caller();
        DeclarationSite::Source {
            file: location.file(),
            line: location.line(),
            column: location.column(),
        }
    }

    pub fn manifest(path: impl Into<String>, index: usize) -> Self {
        DeclarationSite::Manifest {
            path: path.into(),
            index,
        }
    }
}

impl fmt::Display for DeclarationSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeclarationSite::Source { file, line, column } => write!(f, "{file}:{line}:{column}"),
            DeclarationSite::Manifest { path, index } => write!(f, "{path}#stubs[{index}]"),
        }
    }
}

/// Cache identity of a stub: SHA-1 over its name and declaration site.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StubKey(pub Arc<String>);

impl StubKey {
    pub fn new(name: &str, site: &DeclarationSite) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(name.as_bytes());
        hasher.update([0u8]);
        hasher.update(site.to_string().as_bytes());
        StubKey(Arc::new(format!("{:x}", hasher.finalize())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StubKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_depends_on_name_and_site() {
        let here = DeclarationSite::caller();
        let there = DeclarationSite::manifest("stubs.yaml", 0);
        assert_eq!(StubKey::new("add", &here), StubKey::new("add", &here));
        assert_ne!(StubKey::new("add", &here), StubKey::new("add", &there));
        assert_ne!(StubKey::new("add", &here), StubKey::new("sub", &here));
        assert_eq!(StubKey::new("add", &here).as_str().len(), 40);
    }

    #[test]
    fn caller_records_this_file() {
        let site = DeclarationSite::caller();
        assert!(site.to_string().contains("site.rs"));
    }
}
