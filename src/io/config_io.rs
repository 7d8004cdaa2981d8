use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::model::config::Config;

pub const CONFIG_FILE: &str = "config.toml";

/// Environment variable naming the data directory
pub const DATA_DIR_ENV: &str = "TODO_FLOW_DIR";

/// Error type for configuration loading and editing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    ReadError { path: PathBuf, source: io::Error },
    #[error("could not write {path}: {source}")]
    WriteError { path: PathBuf, source: io::Error },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config syntax: {0}")]
    Syntax(#[from] toml_edit::TomlError),
    #[error("no data directory: set TODO_FLOW_DIR or HOME, or pass -C")]
    NoDataDir,
}

const DEFAULT_CONFIG: &str = r#"# todo-flow configuration

[user]
# Whose task list this directory holds by default (override with --user)
id = "local"

[sync]
# Milliseconds between completing a parent and releasing its children
cascade_delay_ms = 0
# Move due postponed tasks into today when tasks are loaded
auto_migrate = true

[display]
show_completed = true
completed_limit = 20
"#;

/// Pick the data directory: explicit flag, then `TODO_FLOW_DIR`, then the
/// XDG data home, then `~/.local/share`.
pub fn resolve_data_dir(flag: Option<&Path>) -> Result<PathBuf, ConfigError> {
    resolve_data_dir_with(flag, |key| std::env::var(key).ok())
}

fn resolve_data_dir_with(
    flag: Option<&Path>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<PathBuf, ConfigError> {
    if let Some(dir) = flag {
        return Ok(dir.to_path_buf());
    }
    let var = |key: &str| env(key).filter(|v| !v.is_empty());
    if let Some(dir) = var(DATA_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }
    if let Some(xdg) = var("XDG_DATA_HOME") {
        return Ok(PathBuf::from(xdg).join("todo-flow"));
    }
    var("HOME")
        .map(|home| PathBuf::from(home).join(".local/share/todo-flow"))
        .ok_or(ConfigError::NoDataDir)
}

/// Load config.toml, falling back to defaults when the file is absent.
pub fn load_config(data_dir: &Path) -> Result<Config, ConfigError> {
    let path = data_dir.join(CONFIG_FILE);
    match fs::read_to_string(&path) {
        Ok(text) => Ok(toml::from_str(&text)?),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Config::default()),
        Err(source) => Err(ConfigError::ReadError { path, source }),
    }
}

/// Create the data directory and a commented default config.
/// Returns false when a config already existed.
pub fn init_data_dir(data_dir: &Path) -> Result<bool, ConfigError> {
    fs::create_dir_all(data_dir.join("users")).map_err(|source| ConfigError::WriteError {
        path: data_dir.to_path_buf(),
        source,
    })?;
    let path = data_dir.join(CONFIG_FILE);
    if path.exists() {
        return Ok(false);
    }
    fs::write(&path, DEFAULT_CONFIG).map_err(|source| ConfigError::WriteError { path, source })?;
    Ok(true)
}

/// Read the config as a toml_edit document for format-preserving edits.
/// A missing file yields the default document.
pub fn read_config_doc(data_dir: &Path) -> Result<toml_edit::DocumentMut, ConfigError> {
    let path = data_dir.join(CONFIG_FILE);
    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => DEFAULT_CONFIG.to_string(),
        Err(source) => return Err(ConfigError::ReadError { path, source }),
    };
    // Validate against the typed config before handing out the document
    toml::from_str::<Config>(&text)?;
    Ok(text.parse()?)
}

pub fn write_config_doc(data_dir: &Path, doc: &toml_edit::DocumentMut) -> Result<(), ConfigError> {
    let path = data_dir.join(CONFIG_FILE);
    fs::write(&path, doc.to_string()).map_err(|source| ConfigError::WriteError { path, source })
}

/// Set `[user] id` in the config document
pub fn set_user_id(doc: &mut toml_edit::DocumentMut, id: &str) {
    if !doc.contains_key("user") {
        doc["user"] = toml_edit::Item::Table(toml_edit::Table::new());
    }
    doc["user"]["id"] = toml_edit::value(id);
}
