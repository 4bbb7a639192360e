//! Spec cache — read-mostly, invalidated on file mtime change or explicit
//! reload.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use dashmap::DashMap;
use tracing::debug;

use lattice_core::errors::{LatticeResult, SpecError};

use crate::mapping::MappingSpec;

struct CachedSpec {
    mtime: SystemTime,
    spec: Arc<MappingSpec>,
}

pub struct SpecCache {
    dir: PathBuf,
    entries: DashMap<String, CachedSpec>,
}

impl SpecCache {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            entries: DashMap::new(),
        }
    }

    /// Resolve a spec by name (`<dir>/<name>.yaml`), re-reading when the
    /// file's mtime moved.
    pub fn get(&self, spec_name: &str) -> LatticeResult<Arc<MappingSpec>> {
        let path = self.dir.join(format!("{spec_name}.yaml"));
        let meta = std::fs::metadata(&path).map_err(|_| SpecError::SpecNotFound {
            name: spec_name.to_string(),
        })?;
        let mtime = meta.modified().map_err(|e| SpecError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        if let Some(entry) = self.entries.get(spec_name) {
            if entry.mtime == mtime {
                return Ok(entry.spec.clone());
            }
        }

        let yaml = std::fs::read_to_string(&path).map_err(|e| SpecError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let spec = Arc::new(MappingSpec::from_yaml(&path.display().to_string(), &yaml)?);
        if spec.spec_name != spec_name {
            return Err(SpecError::Invalid {
                spec_name: spec_name.to_string(),
                reason: format!("file declares spec_name {}", spec.spec_name),
            }
            .into());
        }
        debug!(spec_name, path = %path.display(), "loaded mapping spec");
        self.entries.insert(
            spec_name.to_string(),
            CachedSpec {
                mtime,
                spec: spec.clone(),
            },
        );
        Ok(spec)
    }

    /// Drop every cached entry.
    pub fn reload(&self) {
        self.entries.clear();
    }
}
