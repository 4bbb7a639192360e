//! Workspace registry — domain schemas per workspace, read-mostly,
//! invalidated only by explicit reload.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, info, warn};

use lattice_core::errors::{LatticeResult, SpecError};

use crate::mapping::MappingSpec;
use crate::schema::DomainSchema;
use crate::validate::validate_spec;

pub struct WorkspaceRegistry {
    schemas: DashMap<String, Arc<DomainSchema>>,
    schema_dir: Option<PathBuf>,
}

impl WorkspaceRegistry {
    pub fn new() -> Self {
        Self {
            schemas: DashMap::new(),
            schema_dir: None,
        }
    }

    /// Load every `*.yaml` schema in the directory. Files that fail to
    /// parse are skipped with a warning so one broken schema cannot take
    /// down the rest.
    pub fn load_dir(dir: impl AsRef<Path>) -> LatticeResult<Self> {
        let dir = dir.as_ref();
        let registry = Self {
            schemas: DashMap::new(),
            schema_dir: Some(dir.to_path_buf()),
        };
        registry.scan(dir)?;
        Ok(registry)
    }

    fn scan(&self, dir: &Path) -> LatticeResult<()> {
        let entries = std::fs::read_dir(dir).map_err(|e| SpecError::Io {
            path: dir.display().to_string(),
            reason: e.to_string(),
        })?;
        for entry in entries {
            let entry = entry.map_err(|e| SpecError::Io {
                path: dir.display().to_string(),
                reason: e.to_string(),
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("yaml") {
                continue;
            }
            let yaml = std::fs::read_to_string(&path).map_err(|e| SpecError::Io {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
            match DomainSchema::from_yaml(&yaml) {
                Ok(schema) => {
                    debug!(workspace_id = %schema.workspace_id, path = %path.display(), "loaded schema");
                    self.schemas
                        .insert(schema.workspace_id.clone(), Arc::new(schema));
                }
                Err(e) => warn!(path = %path.display(), "skipping unparseable schema: {e}"),
            }
        }
        info!(workspaces = self.schemas.len(), "workspace registry loaded");
        Ok(())
    }

    /// Drop everything and rescan the schema directory.
    pub fn reload(&self) -> LatticeResult<()> {
        let Some(dir) = self.schema_dir.clone() else {
            return Ok(());
        };
        self.schemas.clear();
        self.scan(&dir)
    }

    /// Register a workspace from a schema document (workspace creation).
    pub fn register(&self, yaml: &str) -> LatticeResult<String> {
        let schema = DomainSchema::from_yaml(yaml)?;
        let workspace_id = schema.workspace_id.clone();
        self.schemas.insert(workspace_id.clone(), Arc::new(schema));
        Ok(workspace_id)
    }

    pub fn workspaces(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.schemas.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn schema(&self, workspace_id: &str) -> LatticeResult<Arc<DomainSchema>> {
        self.schemas
            .get(workspace_id)
            .map(|e| e.value().clone())
            .ok_or_else(|| {
                SpecError::WorkspaceNotFound {
                    workspace_id: workspace_id.to_string(),
                }
                .into()
            })
    }

    /// Validate a spec against its workspace's schema. The ingest
    /// orchestrator calls this before touching the store.
    pub fn validate(&self, spec: &MappingSpec) -> LatticeResult<()> {
        let schema = self.schema(&spec.workspace_id)?;
        validate_spec(spec, &schema)
    }
}

impl Default for WorkspaceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_lookup() {
        let registry = WorkspaceRegistry::new();
        let id = registry
            .register("workspace_id: ws9\nentity_types:\n  Location: {}\n")
            .unwrap();
        assert_eq!(id, "ws9");
        assert_eq!(registry.workspaces(), vec!["ws9".to_string()]);
        assert!(registry.schema("ws9").is_ok());
        assert!(registry.schema("absent").is_err());
    }
}
