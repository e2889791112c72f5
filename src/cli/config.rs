use std::path::Path;

use crate::cli::context::CliContext;
use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Subcommand};
use serde_yaml::{Mapping, Value};
use soultrace_cli::config::SECTIONS;
use soultrace_cli::Config;
use tokio::fs;
use tracing::info;

#[derive(Args, Clone, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Clone, Debug)]
pub enum ConfigAction {
    /// Print the configuration file with defaults filled in
    Show {
        /// Only this section (storage, capture or bridge)
        section: Option<String>,
    },

    /// Change one setting, e.g. `capture.stop.budget_ms 3000`
    Set { key: String, value: String },

    /// Print one setting
    Get { key: String },

    /// Overwrite the file with the built-in defaults
    Reset,

    /// Parse the file and check its settings fit together
    Validate,
}

/// Dotted path to a setting, rooted at one of the known sections.
#[derive(Debug, PartialEq)]
struct SettingKey(Vec<String>);

impl SettingKey {
    fn parse(raw: &str) -> Result<Self> {
        let segments: Vec<String> = raw.split('.').map(str::trim).map(String::from).collect();
        if segments.iter().any(String::is_empty) {
            bail!("malformed setting key `{raw}`");
        }
        if !SECTIONS.contains(&segments[0].as_str()) {
            bail!(
                "unknown section `{}`; expected one of {}",
                segments[0],
                SECTIONS.join(", ")
            );
        }
        Ok(Self(segments))
    }

    fn lookup<'a>(&self, doc: &'a Value) -> Option<&'a Value> {
        self.0
            .iter()
            .try_fold(doc, |node, segment| node.as_mapping()?.get(segment.as_str()))
    }

    /// Writes `value` and returns what it replaced.
    fn assign(&self, doc: &mut Value, value: Value) -> Result<Option<Value>> {
        let mut node = doc;
        for (depth, segment) in self.0.iter().enumerate() {
            if node.is_null() {
                *node = Value::Mapping(Mapping::new());
            }
            let map = node.as_mapping_mut().ok_or_else(|| {
                anyhow!("`{}` holds a plain value", self.0[..depth].join("."))
            })?;
            if depth + 1 == self.0.len() {
                return Ok(map.insert(Value::String(segment.clone()), value));
            }
            let key = Value::String(segment.clone());
            if !map.contains_key(&key) {
                map.insert(key.clone(), Value::Null);
            }
            node = map
                .get_mut(&key)
                .ok_or_else(|| anyhow!("`{segment}` vanished while assigning"))?;
        }
        Ok(None)
    }
}

impl std::fmt::Display for SettingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

pub async fn cmd_config(args: ConfigArgs, ctx: &CliContext) -> Result<()> {
    let path = ctx.config_path();
    match args.action {
        ConfigAction::Show { section } => {
            let doc = serde_yaml::to_value(read_config(path).await?)?;
            match section {
                Some(name) => {
                    let key = SettingKey::parse(&name)?;
                    let value = key.lookup(&doc).unwrap_or(&Value::Null);
                    println!("# {key} ({})", path.display());
                    print!("{}", serde_yaml::to_string(value)?);
                }
                None => {
                    println!("# {}", path.display());
                    print!("{}", serde_yaml::to_string(&doc)?);
                }
            }
        }
        ConfigAction::Set { key, value } => {
            let key = SettingKey::parse(&key)?;
            let config = read_config(path).await?;
            let updated = apply_setting(&config, &key, &value)?;
            write_config(path, &updated).await?;
            info!(setting = %key, path = %path.display(), "configuration updated");
            println!("{key} = {}", value.trim());
        }
        ConfigAction::Get { key } => {
            let key = SettingKey::parse(&key)?;
            let doc = serde_yaml::to_value(read_config(path).await?)?;
            let value = key
                .lookup(&doc)
                .ok_or_else(|| anyhow!("no setting named `{key}`"))?;
            print!("{}", serde_yaml::to_string(value)?);
        }
        ConfigAction::Reset => {
            write_config(path, &Config::default()).await?;
            println!("Wrote default configuration to {}", path.display());
        }
        ConfigAction::Validate => {
            let config = read_config(path).await?;
            let problems = config.problems();
            if problems.is_empty() {
                println!("{}: ok", path.display());
            } else {
                for problem in &problems {
                    println!("{}: {problem}", path.display());
                }
                bail!("{} problem(s) in {}", problems.len(), path.display());
            }
        }
    }
    Ok(())
}

/// Applies one `key = raw` change and returns the resulting configuration.
/// Unknown settings and changes that leave the configuration unusable are
/// rejected.
fn apply_setting(config: &Config, key: &SettingKey, raw: &str) -> Result<Config> {
    let mut doc = serde_yaml::to_value(config)?;
    if key.lookup(&doc).is_none() {
        bail!("no setting named `{key}`");
    }
    key.assign(&mut doc, parse_value(raw))?;
    let updated: Config =
        serde_yaml::from_value(doc).with_context(|| format!("invalid value for {key}"))?;
    let problems = updated.problems();
    if !problems.is_empty() {
        bail!("{key} = {raw} rejected: {}", problems.join("; "));
    }
    Ok(updated)
}

/// Command-line values are read as YAML scalars so numbers and booleans keep
/// their type; anything unparseable stays a string.
fn parse_value(raw: &str) -> Value {
    let raw = raw.trim();
    match serde_yaml::from_str::<Value>(raw) {
        Ok(Value::Null) if !raw.is_empty() && raw != "null" && raw != "~" => {
            Value::String(raw.to_string())
        }
        Ok(value) => value,
        Err(_) => Value::String(raw.to_string()),
    }
}

async fn read_config(path: &Path) -> Result<Config> {
    if !fs::try_exists(path).await? {
        return Ok(Config::default());
    }
    let raw = fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    Config::from_yaml(&raw).with_context(|| format!("parsing {}", path.display()))
}

async fn write_config(path: &Path, config: &Config) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    fs::write(path, serde_yaml::to_string(config)?)
        .await
        .with_context(|| format!("writing {}", path.display()))
}
