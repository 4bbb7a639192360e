//! Configuration. Loaded from TOML; every field has a default so partial
//! files work.

use serde::{Deserialize, Serialize};

/// Backing graph store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path of the store file; `:memory:` opens an ephemeral store.
    pub path: String,
    /// Read connections kept in the pool.
    pub read_pool_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: "lattice.db".to_string(),
            read_pool_size: 4,
        }
    }
}

/// Where mapping specs and workspace schemas live.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecDirsConfig {
    pub spec_dir: String,
    pub schema_dir: String,
}

impl Default for SpecDirsConfig {
    fn default() -> Self {
        Self {
            spec_dir: "specs".to_string(),
            schema_dir: "schemas".to_string(),
        }
    }
}

/// Endpoints of external collaborators. The core passes these through to
/// the transport layer unchanged; it never calls them itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CollaboratorConfig {
    pub vector_endpoint: Option<String>,
    pub queue_endpoint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

/// Top-level configuration aggregating all subsystem configs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LatticeConfig {
    pub store: StoreConfig,
    pub dirs: SpecDirsConfig,
    pub collaborators: CollaboratorConfig,
    pub http: HttpConfig,
}

impl LatticeConfig {
    /// Load config from a TOML string, falling back to defaults for missing
    /// fields.
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }
}
