//! Runtime settings for the ingestion and report binaries.
//!
//! Settings are layered: serde defaults, then an optional TOML file, then
//! environment variables prefixed with `CMA_` using `__` between sections,
//! e.g. `CMA_RISK__HIGH_VALUE_THRESHOLD=20000`.

use std::{collections::HashMap, path::Path, time::Duration};

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::{Error, risk::RiskPolicy};

const ENV_PREFIX: &str = "CMA";

/// Every setting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// The classification thresholds.
    pub risk: RiskPolicy,
    /// How the dashboard reads the store.
    pub reader: ReaderSettings,
}

/// Settings for reading the latest transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderSettings {
    /// How long a read of the latest transactions is cached, zero disables
    /// the cache.
    pub cache_ttl_secs: u64,
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self { cache_ttl_secs: 60 }
    }
}

impl ReaderSettings {
    /// The cache TTL as a [Duration].
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

impl Settings {
    /// Load the settings from the TOML file at `path`, if given, and the
    /// process environment.
    ///
    /// # Errors
    /// Returns [Error::Config] if the file cannot be read, a value has the
    /// wrong type, or the risk policy is inconsistent.
    pub fn load(path: Option<&Path>) -> Result<Self, Error> {
        Self::build(path, environment(None))
    }

    fn build(path: Option<&Path>, environment: Environment) -> Result<Self, Error> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }

        let settings: Settings = builder
            .add_source(environment)
            .build()
            .and_then(|config| config.try_deserialize())
            .map_err(|error| {
                tracing::error!("could not load settings: {error}");
                Error::Config(error.to_string())
            })?;

        settings.risk.validate()?;

        if let Some(path) = path {
            tracing::debug!("Loaded settings from {}", path.display());
        }

        Ok(settings)
    }
}

/// The `CMA_` environment source, reading from `variables` instead of the
/// process environment when given.
fn environment(variables: Option<HashMap<String, String>>) -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("risk.enabled_signals")
        .source(variables)
}

#[cfg(test)]
mod settings_tests {
    use std::{collections::HashMap, io::Write, time::Duration};

    use tempfile::NamedTempFile;

    use crate::{
        Error,
        config::{ReaderSettings, Settings, environment},
        risk::{RiskPolicy, RiskSignal},
    };

    fn toml_file(content: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("Could not create temp file");
        file.write_all(content.as_bytes())
            .expect("Could not write temp file");
        file
    }

    fn no_variables() -> config::Environment {
        environment(Some(HashMap::new()))
    }

    #[test]
    fn defaults_without_file_or_environment() {
        let settings = Settings::build(None, no_variables()).expect("Could not load settings");

        assert_eq!(settings, Settings::default());
        assert_eq!(settings.reader.cache_ttl(), Duration::from_secs(60));
        assert_eq!(settings.risk, RiskPolicy::default());
    }

    #[test]
    fn file_overrides_defaults() {
        let file = toml_file(
            r#"
            [risk]
            high_value_threshold = 20000.0
            enabled_signals = ["high_amount", "velocity"]

            [reader]
            cache_ttl_secs = 0
            "#,
        );

        let settings =
            Settings::build(Some(file.path()), no_variables()).expect("Could not load settings");

        assert_eq!(settings.risk.high_value_threshold, 20_000.0);
        assert_eq!(settings.risk.severe_amount_threshold, 50_000.0);
        assert_eq!(
            settings.risk.enabled_signals,
            vec![RiskSignal::HighAmount, RiskSignal::Velocity]
        );
        assert_eq!(settings.reader, ReaderSettings { cache_ttl_secs: 0 });
    }

    #[test]
    fn environment_overrides_file() {
        let file = toml_file("[risk]\nvelocity_threshold = 8\n");
        let variables = HashMap::from([
            ("CMA_RISK__VELOCITY_THRESHOLD".to_owned(), "4".to_owned()),
            ("CMA_READER__CACHE_TTL_SECS".to_owned(), "5".to_owned()),
        ]);

        let settings = Settings::build(Some(file.path()), environment(Some(variables)))
            .expect("Could not load settings");

        assert_eq!(settings.risk.velocity_threshold, 4);
        assert_eq!(settings.reader.cache_ttl_secs, 5);
    }

    #[test]
    fn missing_file_is_an_error() {
        let result = Settings::build(
            Some(std::path::Path::new("does-not-exist.toml")),
            no_variables(),
        );

        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn inconsistent_policy_is_rejected() {
        let file = toml_file(
            "[risk]\nhigh_value_threshold = 60000.0\nsevere_amount_threshold = 50000.0\n",
        );

        let result = Settings::build(Some(file.path()), no_variables());

        assert!(matches!(result, Err(Error::Config(_))));
    }
}
