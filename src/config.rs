//! Configuration for chainpm.
//!
//! Configuration sources (highest priority first):
//! 1. Command line flags (applied by the CLI on top of this)
//! 2. Environment variables (CHAINPM_HOME, CHAINPM_NODE_URL, CHAINPM_KEYS_URL,
//!    CHAINPM_COMPILER_URL, CHAINPM_ADDRESS)
//! 3. Config file (.chainpm/config.yaml)
//! 4. Defaults (~/.chainpm, local services)
//!
//! Config file discovery:
//! - Searches current directory and parents for .chainpm/config.yaml
//! - Paths in config file are relative to the project root (the directory
//!   holding .chainpm/)

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::core::{RunDefaults, RunPaths};

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

pub const DEFAULT_NODE_URL: &str = "http://127.0.0.1:46657";
pub const DEFAULT_KEYS_URL: &str = "http://127.0.0.1:4767";
pub const DEFAULT_COMPILER_URL: &str = "http://127.0.0.1:9099";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub endpoints: EndpointsConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EndpointsConfig {
    pub node: Option<String>,
    pub keys: Option<String>,
    pub compiler: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// Engine state directory (relative to .chainpm/)
    pub home: Option<String>,
    /// Contract sources (relative to the project root)
    pub contracts: Option<String>,
    pub abi: Option<String>,
    pub bin: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DefaultsConfig {
    /// Account every run starts with
    pub address: Option<String>,
    pub amount: Option<String>,
    pub fee: Option<String>,
    pub gas: Option<String>,
    /// `key=value` pairs recorded before the first job
    #[serde(default)]
    pub sets: Vec<String>,
}

/// Collaborator service URLs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub node: String,
    pub keys: String,
    pub compiler: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            node: DEFAULT_NODE_URL.to_string(),
            keys: DEFAULT_KEYS_URL.to_string(),
            compiler: DEFAULT_COMPILER_URL.to_string(),
        }
    }
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Absolute path to chainpm home
    pub home: PathBuf,
    /// Contract, ABI and bytecode locations
    pub paths: RunPaths,
    pub endpoints: Endpoints,
    /// Amount, fee and gas used when a job leaves them empty
    pub defaults: RunDefaults,
    /// Account every run starts with
    pub default_address: Option<String>,
    /// Parsed `key=value` default assignments
    pub default_sets: Vec<(String, String)>,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

/// Split a `key=value` assignment
pub fn parse_assignment(assignment: &str) -> Result<(String, String)> {
    let (key, value) = assignment
        .split_once('=')
        .with_context(|| format!("Expected key=value, got '{}'", assignment))?;
    let key = key.trim();
    if key.is_empty() {
        anyhow::bail!("Assignment '{}' has an empty key", assignment);
    }
    Ok((key.to_string(), value.trim().to_string()))
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".chainpm").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's parent
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".chainpm");

    build_config(find_config_file(), default_home, |key| std::env::var(key).ok())
}

/// Combine a config file (if any), environment lookups and defaults
fn build_config(
    config_file: Option<PathBuf>,
    default_home: PathBuf,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ResolvedConfig> {
    let file = match &config_file {
        Some(path) => Some(load_config_file(path)?),
        None => None,
    };

    let chainpm_dir = config_file
        .as_deref()
        .and_then(Path::parent)
        .unwrap_or(Path::new("."));
    let base_dir = chainpm_dir.parent().unwrap_or(Path::new("."));

    let paths_config = file.as_ref().map(|f| f.paths.clone()).unwrap_or_default();
    let endpoints_config = file.as_ref().map(|f| f.endpoints.clone()).unwrap_or_default();
    let defaults_config = file.map(|f| f.defaults).unwrap_or_default();

    // Resolve home path
    let home = if let Some(env_home) = env("CHAINPM_HOME") {
        PathBuf::from(env_home)
    } else if let Some(ref home_path) = paths_config.home {
        resolve_path(chainpm_dir, home_path)
    } else {
        default_home
    };

    let default_paths = RunPaths::default();
    let project_path = |configured: &Option<String>, fallback: PathBuf| match configured {
        Some(p) if config_file.is_some() => resolve_path(base_dir, p),
        Some(p) => PathBuf::from(p),
        None => fallback,
    };
    let paths = RunPaths {
        contracts: project_path(&paths_config.contracts, default_paths.contracts),
        abi: project_path(&paths_config.abi, default_paths.abi),
        bin: project_path(&paths_config.bin, default_paths.bin),
    };

    let fallback = Endpoints::default();
    let endpoints = Endpoints {
        node: env("CHAINPM_NODE_URL")
            .or(endpoints_config.node)
            .unwrap_or(fallback.node),
        keys: env("CHAINPM_KEYS_URL")
            .or(endpoints_config.keys)
            .unwrap_or(fallback.keys),
        compiler: env("CHAINPM_COMPILER_URL")
            .or(endpoints_config.compiler)
            .unwrap_or(fallback.compiler),
    };

    let builtin = RunDefaults::default();
    let defaults = RunDefaults {
        amount: defaults_config.amount.unwrap_or(builtin.amount),
        fee: defaults_config.fee.unwrap_or(builtin.fee),
        gas: defaults_config.gas.unwrap_or(builtin.gas),
    };

    let default_address = env("CHAINPM_ADDRESS")
        .or(defaults_config.address)
        .filter(|a| !a.is_empty());

    let default_sets = defaults_config
        .sets
        .iter()
        .map(|s| parse_assignment(s))
        .collect::<Result<Vec<_>>>()
        .context("Invalid entry in defaults.sets")?;

    Ok(ResolvedConfig {
        home,
        paths,
        endpoints,
        defaults,
        default_address,
        default_sets,
        config_file,
    })
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (useful for testing)
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_default_config_without_file() {
        let home = PathBuf::from("/home/dev/.chainpm");
        let config = build_config(None, home.clone(), no_env).unwrap();

        assert_eq!(config.home, home);
        assert_eq!(config.endpoints, Endpoints::default());
        assert_eq!(config.paths, RunPaths::default());
        assert_eq!(config.defaults, RunDefaults::default());
        assert!(config.default_address.is_none());
        assert!(config.config_file.is_none());
    }

    #[test]
    fn test_config_file_parsing() {
        let temp = TempDir::new().unwrap();
        let chainpm_dir = temp.path().join(".chainpm");
        std::fs::create_dir_all(&chainpm_dir).unwrap();

        let config_path = chainpm_dir.join("config.yaml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(
            file,
            r#"
version: "1.0"
endpoints:
  node: http://chain:46657
paths:
  abi: ./build/abi
defaults:
  address: "0xabcd"
  gas: "500000"
  sets:
    - greeting=hello
"#
        )
        .unwrap();

        let parsed = load_config_file(&config_path).unwrap();
        assert_eq!(parsed.version, "1.0");
        assert_eq!(parsed.paths.abi, Some("./build/abi".to_string()));

        let config =
            build_config(Some(config_path.clone()), PathBuf::from("/unused"), no_env).unwrap();
        assert_eq!(config.endpoints.node, "http://chain:46657");
        assert_eq!(config.endpoints.keys, DEFAULT_KEYS_URL);
        assert_eq!(config.paths.abi, temp.path().join("./build/abi"));
        assert_eq!(config.defaults.gas, "500000");
        assert_eq!(config.defaults.fee, "1234");
        assert_eq!(config.default_address, Some("0xabcd".to_string()));
        assert_eq!(
            config.default_sets,
            vec![("greeting".to_string(), "hello".to_string())]
        );
        assert_eq!(config.config_file, Some(config_path));
    }

    #[test]
    fn test_environment_overrides_file() {
        let env: HashMap<&str, &str> = [
            ("CHAINPM_KEYS_URL", "http://keys:4767"),
            ("CHAINPM_ADDRESS", "FFFF"),
            ("CHAINPM_HOME", "/srv/chainpm"),
        ]
        .into_iter()
        .collect();

        let config = build_config(None, PathBuf::from("/unused"), |k| {
            env.get(k).map(|v| v.to_string())
        })
        .unwrap();

        assert_eq!(config.endpoints.keys, "http://keys:4767");
        assert_eq!(config.endpoints.node, DEFAULT_NODE_URL);
        assert_eq!(config.default_address, Some("FFFF".to_string()));
        assert_eq!(config.home, PathBuf::from("/srv/chainpm"));
    }

    #[test]
    fn test_parse_assignment() {
        assert_eq!(
            parse_assignment("name = value=with=equals").unwrap(),
            ("name".to_string(), "value=with=equals".to_string())
        );
        assert!(parse_assignment("novalue").is_err());
        assert!(parse_assignment("=x").is_err());
    }

    #[test]
    fn test_resolve_relative_path() {
        let base = PathBuf::from("/home/user/project");

        assert_eq!(
            resolve_path(&base, "./subdir"),
            PathBuf::from("/home/user/project/subdir")
        );
        assert_eq!(
            resolve_path(&base, "/absolute/path"),
            PathBuf::from("/absolute/path")
        );
    }
}
