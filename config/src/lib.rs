//! Utilities for loading and merging layered configuration files.
//!
//! Configuration is read from `.hdl/config.toml` files found in the working
//! directory and its ancestors, followed by `$HDL_HOME/config.toml`.
//! Files closer to the working directory take precedence.
//! Environment variables of the form `HDL_FOO_BAR` override the key `foo.bar`.
#![warn(missing_docs)]

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use serde::de::DeserializeOwned;
use toml::{Table, Value};
use tracing::{event, Level};

pub(crate) mod paths;

/// The name of the directory holding configuration files.
pub const CONFIG_DIR: &str = ".hdl";
/// The name of a configuration file within [`CONFIG_DIR`].
pub const CONFIG_FILE: &str = "config.toml";
/// The prefix of environment variables that override configuration keys.
pub const ENV_PREFIX: &str = "HDL";
/// The environment variable naming the user-level configuration directory.
pub const HOME_ENV: &str = "HDL_HOME";

/// A merged view of all configuration sources.
#[derive(Debug, Clone, Default)]
pub struct Config {
    values: Table,
    env: HashMap<String, String>,
    sources: Vec<PathBuf>,
    search_stop_path: Option<PathBuf>,
}

impl Config {
    /// Creates an empty configuration with no sources and no environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the configuration visible from the current working directory,
    /// using the process environment.
    pub fn load() -> Result<Self> {
        let cwd = std::env::current_dir()
            .context("couldn't get the current directory of the process")?;
        let mut config = Self::new();
        config.set_env(std::env::vars().collect());
        config.reload_rooted_at(cwd)?;
        Ok(config)
    }

    /// Parses a configuration from TOML source text.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let values: Table = toml::from_str(source).context("could not parse TOML configuration")?;
        Ok(Self {
            values,
            ..Default::default()
        })
    }

    /// Sets the environment used for overrides.
    pub fn set_env(&mut self, env: HashMap<String, String>) {
        self.env = env;
    }

    /// Stops the ancestor search at the given directory (inclusive).
    pub fn set_search_stop_path(&mut self, path: impl Into<PathBuf>) {
        self.search_stop_path = Some(path.into());
    }

    /// The files that contributed to this configuration, in merge order.
    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    /// Discards all loaded values and reloads every file visible from `cwd`.
    pub fn reload_rooted_at(&mut self, cwd: impl AsRef<Path>) -> Result<()> {
        self.values = Table::new();
        self.sources.clear();

        let mut files: Vec<PathBuf> = paths::ancestors(cwd.as_ref(), self.search_stop_path.as_deref())
            .map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
            .filter(|path| path.exists())
            .collect();
        if let Some(home) = self.env.get(HOME_ENV) {
            let path = PathBuf::from(home).join(CONFIG_FILE);
            if path.exists() && !files.contains(&path) {
                files.push(path);
            }
        }

        // Farthest first, so nearer files override.
        for path in files.into_iter().rev() {
            self.merge_file(&path)?;
        }
        Ok(())
    }

    /// Merges the TOML file at `path` into this configuration.
    ///
    /// Values from the file take precedence over existing values.
    pub fn merge_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read configuration file `{}`", path.display()))?;
        let table: Table = toml::from_str(&contents)
            .with_context(|| format!("could not parse TOML configuration in `{}`", path.display()))?;
        merge_tables(&mut self.values, table)
            .with_context(|| format!("failed to merge configuration file `{}`", path.display()))?;
        event!(Level::DEBUG, path = %path.display(), "loaded configuration file");
        self.sources.push(path.to_path_buf());
        Ok(())
    }

    /// Merges `table` into this configuration, taking precedence over existing values.
    pub fn merge_table(&mut self, table: Table) -> Result<()> {
        merge_tables(&mut self.values, table)
    }

    /// Retrieves and deserializes the value at the dotted `key`.
    ///
    /// Environment overrides are applied before deserialization:
    /// `HDL_FOO_BAR` replaces `foo.bar` as a whole, while `HDL_FOO_BAR_BAZ`
    /// sets the field `baz` of the table `foo.bar`.
    ///
    /// ```rust,ignore
    /// let format: Option<String> = config.get("netlist.format")?;
    /// ```
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let value = self.get_value(key)?;
        value
            .map(|value| {
                value
                    .try_into()
                    .with_context(|| format!("invalid configuration value for key `{key}`"))
            })
            .transpose()
    }

    fn get_value(&self, key: &str) -> Result<Option<Value>> {
        let mut value = lookup(&self.values, key).cloned();
        let env_key = env_key(key);

        if let Some(raw) = self.env.get(&env_key) {
            event!(Level::DEBUG, key, var = %env_key, "configuration overridden by environment");
            return Ok(Some(parse_env_value(raw)));
        }

        let field_prefix = format!("{env_key}_");
        let mut fields: Vec<(&String, &String)> = self
            .env
            .iter()
            .filter(|(var, _)| var.starts_with(&field_prefix))
            .collect();
        fields.sort();

        for (var, raw) in fields {
            let field = var[field_prefix.len()..].to_lowercase();
            let table = match value.get_or_insert_with(|| Value::Table(Table::new())) {
                Value::Table(table) => table,
                other => bail!(
                    "environment variable `{var}` sets a field of `{key}`, but `{key}` is a {}",
                    other.type_str()
                ),
            };
            table.insert(field, parse_env_value(raw));
        }

        Ok(value)
    }
}

/// Returns the environment variable corresponding to a dotted key.
pub fn env_key(key: &str) -> String {
    let mut var = String::from(ENV_PREFIX);
    for part in key.split('.') {
        var.push('_');
        var.push_str(&part.replace('-', "_").to_uppercase());
    }
    var
}

fn lookup<'a>(table: &'a Table, key: &str) -> Option<&'a Value> {
    let mut parts = key.split('.');
    let mut value = table.get(parts.next()?)?;
    for part in parts {
        value = value.as_table()?.get(part)?;
    }
    Some(value)
}

fn parse_env_value(raw: &str) -> Value {
    toml::from_str::<Table>(&format!("value = {raw}"))
        .ok()
        .and_then(|mut table| table.remove("value"))
        .unwrap_or_else(|| Value::String(raw.to_string()))
}

fn merge_tables(old: &mut Table, new: Table) -> Result<()> {
    for (key, value) in new {
        match old.get_mut(&key) {
            Some(existing) => merge_values(existing, value)
                .with_context(|| format!("failed to merge key `{key}`"))?,
            None => {
                old.insert(key, value);
            }
        }
    }
    Ok(())
}

fn merge_values(old: &mut Value, new: Value) -> Result<()> {
    match (old, new) {
        (Value::Table(old), Value::Table(new)) => merge_tables(old, new),
        (Value::Array(old), Value::Array(new)) => {
            old.extend(new);
            Ok(())
        }
        (old, new) => {
            if old.is_table() || old.is_array() || new.is_table() || new.is_array() {
                return Err(anyhow!(
                    "expected {}, but found {}",
                    old.type_str(),
                    new.type_str()
                ));
            }
            *old = new;
            Ok(())
        }
    }
}
