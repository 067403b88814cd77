//! Run configuration.
//!
//! Read from the TOML file named by `--config` or the `TAXLINK_CONFIG`
//! environment variable. Every field has a default, so the file is optional
//! and may be partial.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::compendium::DEFAULT_STRUCTURE_COLUMN;
use crate::engine::DEFAULT_MAX_PRODUCTS;
use crate::error::{Error, Result};
use crate::linkage::{
    Execution, OutputNames, DEFAULT_ADJACENCY_FILE, DEFAULT_EDGES_FILE, DEFAULT_STRUCTURES_FILE,
};
use crate::structure::{DEFAULT_KEY_LENGTH, FULL_KEY_LENGTH};

pub const CONFIG_ENV: &str = "TAXLINK_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub compendium: CompendiumConfig,
    #[serde(default)]
    pub rules: RulesConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompendiumConfig {
    pub path: Option<PathBuf>,
    #[serde(default = "default_smiles_column")]
    pub smiles_column: String,
}

impl Default for CompendiumConfig {
    fn default() -> Self {
        Self {
            path: None,
            smiles_column: default_smiles_column(),
        }
    }
}

fn default_smiles_column() -> String {
    DEFAULT_STRUCTURE_COLUMN.to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RulesConfig {
    pub biological: Option<PathBuf>,
    pub chemical: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchingConfig {
    #[serde(default = "default_key_length")]
    pub identity_key_length: usize,
    #[serde(default = "default_max_products")]
    pub max_products: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            identity_key_length: default_key_length(),
            max_products: default_max_products(),
        }
    }
}

fn default_key_length() -> usize {
    DEFAULT_KEY_LENGTH
}

fn default_max_products() -> usize {
    DEFAULT_MAX_PRODUCTS
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// `0` runs sequentially.
    #[serde(default)]
    pub workers: usize,
}

impl ExecutionConfig {
    pub fn execution(&self) -> Execution {
        Execution::from_workers(self.workers)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_adjacency")]
    pub adjacency: String,
    #[serde(default = "default_edges")]
    pub edges: String,
    #[serde(default = "default_structures")]
    pub structures: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            adjacency: default_adjacency(),
            edges: default_edges(),
            structures: default_structures(),
        }
    }
}

impl OutputConfig {
    pub fn names(&self) -> OutputNames {
        OutputNames {
            adjacency: self.adjacency.clone(),
            edges: self.edges.clone(),
            structures: self.structures.clone(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_adjacency() -> String {
    DEFAULT_ADJACENCY_FILE.to_string()
}

fn default_edges() -> String {
    DEFAULT_EDGES_FILE.to_string()
}

fn default_structures() -> String {
    DEFAULT_STRUCTURES_FILE.to_string()
}

impl Config {
    pub fn from_toml(text: &str, origin: &Path) -> Result<Self> {
        toml::from_str(text).map_err(|source| Error::Toml {
            path: origin.to_path_buf(),
            source,
        })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(Error::io(path))?;
        Self::from_toml(&text, path)
    }

    /// Loads `explicit` if given, else the file named by `TAXLINK_CONFIG`,
    /// else the defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => match std::env::var_os(CONFIG_ENV) {
                Some(path) => Self::from_file(PathBuf::from(path)),
                None => Ok(Self::default()),
            },
        }
    }

    /// Checks what a run needs: a compendium, a biological rule library and
    /// a key length within the identity key.
    pub fn validate(&self) -> Result<()> {
        let key_length = self.matching.identity_key_length;
        if !(1..=FULL_KEY_LENGTH).contains(&key_length) {
            return Err(Error::Config(format!(
                "identity_key_length must be between 1 and {FULL_KEY_LENGTH}, got {key_length}"
            )));
        }
        if self.matching.max_products == 0 {
            return Err(Error::Config("max_products must be at least 1".into()));
        }
        if self.compendium.path.is_none() {
            return Err(Error::Config("no compendium path given".into()));
        }
        if self.rules.biological.is_none() {
            return Err(Error::Config("no biological rule library given".into()));
        }
        Ok(())
    }
}
