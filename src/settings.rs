use anyhow::{bail, Context, Result};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use serde::Deserialize;

use crate::chunker::DEFAULT_UNIT_LIMIT;
use crate::merger::{Grammar, Syntax};

const CONFIG_FILE: &str = "pageobject";
const ENV_PREFIX: &str = "PAGEOBJ";

/// Runtime settings: defaults, then `pageobject.toml`, then `PAGEOBJ_*` variables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Prompt-flow scoring endpoint.
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub unit_limit: usize,
    /// Generator requests in flight at once.
    pub concurrency: usize,
    pub timeout_secs: u64,
    /// Accept self-signed certificates from the page and the endpoint.
    pub accept_invalid_certs: bool,
    pub syntax: Syntax,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            endpoint: None,
            api_key: None,
            unit_limit: DEFAULT_UNIT_LIMIT,
            concurrency: 4,
            timeout_secs: 180,
            accept_invalid_certs: false,
            syntax: Syntax::default(),
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        let builder = Config::builder()
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("syntax.accessor_keywords"),
            );
        Self::from_builder(builder)
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        let settings: Settings = builder
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;
        settings.grammar()?;
        Ok(settings)
    }

    pub fn grammar(&self) -> Result<Grammar> {
        Grammar::new(&self.syntax).context("Invalid syntax configuration")
    }

    /// Endpoint and API key, both required by the `run` command.
    pub fn credentials(&self) -> Result<(&str, &str)> {
        let endpoint = self.endpoint.as_deref().filter(|s| !s.trim().is_empty());
        let api_key = self.api_key.as_deref().filter(|s| !s.trim().is_empty());
        match (endpoint, api_key) {
            (Some(endpoint), Some(api_key)) => Ok((endpoint, api_key)),
            (None, _) => bail!("{}_ENDPOINT must be set (environment or {}.toml)", ENV_PREFIX, CONFIG_FILE),
            (_, None) => bail!("{}_API_KEY must be set (environment or {}.toml)", ENV_PREFIX, CONFIG_FILE),
        }
    }
}
