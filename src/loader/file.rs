//! File-system backing store
//!
//! Serves templates from a base directory. Normalized template names map
//! onto relative paths below the base directory; the loader refuses names
//! that carry a scheme part and never follows a name outside the base
//! directory (normalization already rejects `..` escapes, but the check is
//! repeated here because loaders are also reachable through custom lookup
//! strategies).
//!
//! Versioning uses the file's modification time plus size, so an unchanged
//! file answers "not modified" without being read.

use std::fs::{File, Metadata};
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use tracing::trace;

use crate::core::Token;
use crate::loader::{OpenedTemplate, TemplateContent, TemplateLoader, TemplateLoadingResult};

/// Identity of a file-backed template: its canonical-ish absolute path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileSource(pub PathBuf);

/// Version token of a file-backed template.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileVersion {
    /// Last modification time as reported by the file system.
    pub modified: SystemTime,
    /// File size in bytes.
    pub size: u64,
}

impl FileVersion {
    fn of(metadata: &Metadata) -> io::Result<Self> {
        Ok(Self { modified: metadata.modified()?, size: metadata.len() })
    }
}

/// [`TemplateLoader`] over a directory tree.
#[derive(Debug)]
pub struct FileTemplateLoader {
    base_dir: PathBuf,
}

impl FileTemplateLoader {
    /// Creates a loader rooted at `base_dir`.
    ///
    /// # Errors
    ///
    /// Fails when `base_dir` does not exist or is not a directory.
    pub fn new(base_dir: impl Into<PathBuf>) -> io::Result<Self> {
        let base_dir = base_dir.into();
        let metadata = std::fs::metadata(&base_dir)?;
        if !metadata.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotADirectory,
                format!("template base directory is not a directory: {}", base_dir.display()),
            ));
        }
        Ok(Self { base_dir })
    }

    /// The base directory templates are served from.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Maps a normalized template name to a path below the base directory.
    /// `None` for names this loader does not serve (scheme-prefixed names,
    /// directory names).
    fn name_to_path(&self, name: &str) -> io::Result<Option<PathBuf>> {
        if name.is_empty() || name.contains(':') || name.ends_with('/') {
            return Ok(None);
        }
        let relative: PathBuf = name.split('/').collect();
        // Normalized names contain no "." or ".." steps; reject anything
        // else that could leave the base directory.
        if relative.components().any(|c| !matches!(c, Component::Normal(_))) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("template name escapes the base directory: {name:?}"),
            ));
        }
        Ok(Some(self.base_dir.join(relative)))
    }
}

impl TemplateLoader for FileTemplateLoader {
    fn load(
        &self,
        name: &str,
        prior_source: Option<&Arc<dyn Token>>,
        prior_version: Option<&Arc<dyn Token>>,
        _session: Option<&mut (dyn crate::loader::TemplateLoaderSession + '_)>,
    ) -> io::Result<TemplateLoadingResult> {
        let Some(path) = self.name_to_path(name)? else {
            return Ok(TemplateLoadingResult::NotFound);
        };

        let metadata = match std::fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                trace!(template = name, "file not found");
                return Ok(TemplateLoadingResult::NotFound);
            }
            Err(err) => return Err(err),
        };
        if !metadata.is_file() {
            return Ok(TemplateLoadingResult::NotFound);
        }

        let source = FileSource(path.clone());
        let version = FileVersion::of(&metadata)?;

        let source_unchanged =
            prior_source.is_some_and(|prior| prior.token_eq(&source as &dyn Token));
        let version_unchanged =
            prior_version.is_some_and(|prior| prior.token_eq(&version as &dyn Token));
        if source_unchanged && version_unchanged {
            trace!(template = name, "file unchanged");
            return Ok(TemplateLoadingResult::NotModified);
        }

        let file = File::open(&path)?;
        trace!(template = name, path = %path.display(), "file opened");
        Ok(TemplateLoadingResult::Opened(OpenedTemplate {
            source: Arc::new(source),
            version: Some(Arc::new(version)),
            content: TemplateContent::Bytes(Box::new(file)),
            options: None,
        }))
    }
}
