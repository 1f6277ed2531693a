//! Output directory provisioning.
//!
//! The engine writes nothing outside the directory the jail hands it;
//! sandboxing beyond that is the jail implementation's concern.

use std::fs;
use std::path::PathBuf;

use crate::model::ProjectId;

/// Provides and validates the output directory for a project.
pub trait OutputJail: Send + Sync {
    /// Provision a writable directory for the project's artifacts.
    fn provision(&self, project_id: ProjectId) -> anyhow::Result<PathBuf>;
}

/// Jail rooted at a local directory; each project gets a subdirectory
/// named after its id.
#[derive(Debug, Clone)]
pub struct LocalOutputJail {
    root: PathBuf,
}

impl LocalOutputJail {
    /// Create a jail rooted at the given directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl OutputJail for LocalOutputJail {
    fn provision(&self, project_id: ProjectId) -> anyhow::Result<PathBuf> {
        let dir = self.root.join(project_id.to_string());
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provision_creates_project_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let jail = LocalOutputJail::new(tmp.path());
        let id = ProjectId::new();

        let dir = jail.provision(id).unwrap();
        assert!(dir.is_dir());
        assert!(dir.ends_with(id.to_string()));
    }

    #[test]
    fn test_provision_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let jail = LocalOutputJail::new(tmp.path());
        let id = ProjectId::new();

        let first = jail.provision(id).unwrap();
        let second = jail.provision(id).unwrap();
        assert_eq!(first, second);
    }
}
