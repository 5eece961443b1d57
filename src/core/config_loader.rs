//! Configuration file loader for dataset-publisher
//!
//! Loads layered YAML configuration, merges it section by section and
//! expands `${VAR}` references in registrar credentials and paths.

use lazy_static::lazy_static;
use log::{debug, warn};
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;

use super::config::*;
use crate::core::error::PublishError;

/// Configuration file name
const CONFIG_FILENAME: &str = ".dataset-publisher.yaml";

lazy_static! {
    /// Environment variable reference (`${VAR_NAME}`)
    static ref ENV_VAR_PATTERN: Regex = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap();
}

/// Configuration load options
#[derive(Debug)]
pub struct ConfigLoadOptions {
    /// Project path to load config from
    pub project_path: PathBuf,

    /// Home directory holding the global config, if any
    pub home_dir: Option<PathBuf>,

    /// CLI overrides (highest priority)
    pub cli_args: Option<PublishConfig>,

    /// Environment variables
    pub env: HashMap<String, String>,
}

impl ConfigLoadOptions {
    /// Options reading the real process environment
    pub fn from_environment(project_path: impl Into<PathBuf>) -> Self {
        Self {
            project_path: project_path.into(),
            home_dir: std::env::var_os("HOME").map(PathBuf::from),
            cli_args: None,
            env: std::env::vars().collect(),
        }
    }
}

/// Configuration file loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from multiple sources with priority
    ///
    /// Priority (high to low):
    /// 1. CLI arguments
    /// 2. Environment variables
    /// 3. Project config (./.dataset-publisher.yaml)
    /// 4. Global config (~/.dataset-publisher.yaml)
    /// 5. Default values
    pub async fn load(options: ConfigLoadOptions) -> Result<PublishConfig, PublishError> {
        let mut configs: Vec<PublishConfig> = vec![PublishConfig::default()];

        if let Some(home_dir) = &options.home_dir
            && let Some(global_config) = Self::load_config_file(&home_dir.join(CONFIG_FILENAME)).await?
        {
            configs.push(global_config);
        }

        if let Some(project_config) =
            Self::load_config_file(&options.project_path.join(CONFIG_FILENAME)).await?
        {
            configs.push(project_config);
        }

        if let Some(env_config) = Self::load_env_config(&options.env) {
            configs.push(env_config);
        }

        if let Some(cli_config) = options.cli_args {
            configs.push(cli_config);
        }

        let merged = Self::merge_configs(configs);
        Ok(Self::expand_env_vars(merged, &options.env))
    }

    /// Load configuration from a YAML file, following `extends`
    fn load_config_file(
        file_path: &Path,
    ) -> std::pin::Pin<
        Box<
            dyn std::future::Future<Output = Result<Option<PublishConfig>, PublishError>>
                + Send
                + '_,
        >,
    > {
        Box::pin(async move {
            if !file_path.exists() {
                return Ok(None);
            }

            debug!("Loading configuration from {}", file_path.display());

            let content = fs::read_to_string(file_path).await.map_err(|e| {
                PublishError::Config(format!("failed to read {}: {}", file_path.display(), e))
            })?;

            let config: PublishConfig = serde_yaml::from_str(&content).map_err(|e| {
                PublishError::Config(format!("failed to parse {}: {}", file_path.display(), e))
            })?;

            if let Some(extends_path) = &config.extends {
                let base_path = file_path
                    .parent()
                    .ok_or_else(|| PublishError::Config("invalid config file path".to_string()))?
                    .join(extends_path);

                if let Some(base_config) = Self::load_config_file(&base_path).await? {
                    return Ok(Some(Self::merge_configs(vec![base_config, config])));
                }
            }

            Ok(Some(config))
        })
    }

    /// Load configuration from environment variables
    fn load_env_config(env: &HashMap<String, String>) -> Option<PublishConfig> {
        let mut config = PublishConfig::default();
        let mut has_changes = false;

        if let Some(provider) = env.get("PUBLISHER_DOI_PROVIDER") {
            config
                .settings
                .insert(DOI_PROVIDER_SETTING.to_string(), provider.clone());
            has_changes = true;
        }

        let cache_root = env.get("PUBLISHER_CACHE_ROOT");
        let format = env.get("PUBLISHER_EXPORT_FORMAT");
        if cache_root.is_some() || format.is_some() {
            let mut export = ExportConfig::default();
            if let Some(root) = cache_root {
                export.cache_root = PathBuf::from(root);
            }
            if let Some(format) = format {
                export.format = format.clone();
            }
            config.export = Some(export);
            has_changes = true;
        }

        if has_changes { Some(config) } else { None }
    }

    /// Merge multiple configurations with priority
    fn merge_configs(configs: Vec<PublishConfig>) -> PublishConfig {
        let mut result = PublishConfig::default();

        for config in configs {
            Self::merge_into(&mut result, config);
        }

        result
    }

    /// Merge source config into target
    fn merge_into(target: &mut PublishConfig, source: PublishConfig) {
        if !source.version.is_empty() {
            target.version = source.version;
        }

        if source.extends.is_some() {
            target.extends = source.extends;
        }

        target.settings.extend(source.settings);

        if let Some(source_registrar) = source.registrar {
            let target_registrar = target.registrar.get_or_insert_with(RegistrarConfig::default);

            if source_registrar.ezid.is_some() {
                target_registrar.ezid = source_registrar.ezid;
            }
            if source_registrar.datacite.is_some() {
                target_registrar.datacite = source_registrar.datacite;
            }
            if source_registrar.shoulder.is_some() {
                target_registrar.shoulder = source_registrar.shoulder;
            }
            if source_registrar.sequence_start.is_some() {
                target_registrar.sequence_start = source_registrar.sequence_start;
            }
            if source_registrar.target_url_template.is_some() {
                target_registrar.target_url_template = source_registrar.target_url_template;
            }
        }

        if source.export.is_some() {
            target.export = source.export;
        }

        if source.timeouts.is_some() {
            target.timeouts = source.timeouts;
        }

        if source.retry.is_some() {
            target.retry = source.retry;
        }
    }

    /// Expand `${VAR}` references in credentials, URLs and the cache root
    fn expand_env_vars(mut config: PublishConfig, env: &HashMap<String, String>) -> PublishConfig {
        if let Some(registrar) = &mut config.registrar {
            if let Some(ezid) = &mut registrar.ezid {
                ezid.base_url = Self::expand_string(&ezid.base_url, env);
                ezid.username = Self::expand_string(&ezid.username, env);
                ezid.password = Self::expand_secret(&ezid.password, env);
            }
            if let Some(datacite) = &mut registrar.datacite {
                datacite.base_url = Self::expand_string(&datacite.base_url, env);
                datacite.username = Self::expand_string(&datacite.username, env);
                datacite.password = Self::expand_secret(&datacite.password, env);
            }
        }

        if let Some(export) = &mut config.export {
            let root = export.cache_root.to_string_lossy().into_owned();
            export.cache_root = PathBuf::from(Self::expand_string(&root, env));
        }

        config
    }

    fn expand_secret(secret: &SecretString, env: &HashMap<String, String>) -> SecretString {
        SecretString::new(Self::expand_string(secret.expose_secret(), env).into())
    }

    /// Expand environment variables in a single string; unknown variables
    /// are left untouched
    fn expand_string(input: &str, env: &HashMap<String, String>) -> String {
        ENV_VAR_PATTERN
            .replace_all(input, |caps: &regex::Captures| {
                let var_name = &caps[1];
                match env.get(var_name) {
                    Some(value) => value.clone(),
                    None => {
                        warn!("Environment variable {} is not set, leaving reference", var_name);
                        caps[0].to_string()
                    }
                }
            })
            .into_owned()
    }
}
