// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration support for treetape.
//!
//! Configuration is layered: the default config embedded in treetape comes first, then the
//! repository's `.config/treetape.toml` (or a config file passed in explicitly), and finally any
//! command-line overrides applied through the setters on [`RunConfig`].

use crate::{
    errors::{ConfigParseError, ConfigParseErrorKind, HarnessOptionParseError},
    harness::HarnessOptions,
};
use camino::Utf8Path;
use config::{Config, ConfigBuilder, File, FileFormat, builder::DefaultState};
use serde::Deserialize;
use std::str::FromStr;

/// Configuration shared by every test in a run.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct RunConfig {
    #[serde(default)]
    test_only: bool,
    #[serde(default)]
    harness: HarnessOptions,
}

impl RunConfig {
    /// The default location of the config within a directory.
    pub const CONFIG_PATH: &'static str = ".config/treetape.toml";

    /// Contains the default config as a TOML file.
    ///
    /// Repository-specific configuration is layered on top of the default config.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../default-config.toml");

    /// Reads the config from the given file, or if not specified from `.config/treetape.toml` in
    /// `root`.
    ///
    /// A config file passed in explicitly must exist. If no config file is specified and `root`
    /// doesn't have `.config/treetape.toml`, the default config is used.
    pub fn from_sources(
        root: &Utf8Path,
        config_file: Option<&Utf8Path>,
    ) -> Result<Self, ConfigParseError> {
        let (config_file, source) = match config_file {
            Some(file) => (file.to_owned(), File::new(file.as_str(), FileFormat::Toml)),
            None => {
                let config_file = root.join(Self::CONFIG_PATH);
                let source = File::new(config_file.as_str(), FileFormat::Toml).required(false);
                (config_file, source)
            }
        };

        let builder = Self::make_default_config().add_source(source);
        Self::build_and_deserialize_config(&builder)
            .map_err(|kind| ConfigParseError::new(config_file, kind))
    }

    /// Returns the default config.
    pub fn default_config() -> Self {
        Self::build_and_deserialize_config(&Self::make_default_config())
            .unwrap_or_else(|err| panic!("default config is always valid: {err}"))
    }

    /// Whether only tests whose name starts with `test` are run.
    pub fn test_only(&self) -> bool {
        self.test_only
    }

    /// Sets whether only tests whose name starts with `test` are run.
    pub fn set_test_only(&mut self, test_only: bool) -> &mut Self {
        self.test_only = test_only;
        self
    }

    /// The options passed through to the harness.
    pub fn harness_options(&self) -> &HarnessOptions {
        &self.harness
    }

    /// Sets a harness option, replacing any configured value.
    pub fn set_harness_option(&mut self, option: HarnessOption) -> &mut Self {
        self.harness.insert(option.key, option.value);
        self
    }

    // ---
    // Helper methods
    // ---

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }

    fn build_and_deserialize_config(
        builder: &ConfigBuilder<DefaultState>,
    ) -> Result<Self, ConfigParseErrorKind> {
        let config = builder
            .build_cloned()
            .map_err(|err| ConfigParseErrorKind::BuildError(Box::new(err)))?;

        serde_path_to_error::deserialize(config)
            .map_err(|err| ConfigParseErrorKind::DeserializeError(Box::new(err)))
    }
}

/// A single `key=value` harness option, as passed on the command line.
///
/// The value is parsed as JSON if possible, and is otherwise treated as a string: `timeout=500`
/// is a number, `skip=true` a boolean and `label=slow` the string `"slow"`.
#[derive(Clone, Debug, PartialEq)]
pub struct HarnessOption {
    key: String,
    value: serde_json::Value,
}

impl HarnessOption {
    /// The option's key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The option's value.
    pub fn value(&self) -> &serde_json::Value {
        &self.value
    }
}

impl FromStr for HarnessOption {
    type Err = HarnessOptionParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let Some((key, value)) = input.split_once('=') else {
            return Err(HarnessOptionParseError::new(input, "expected `key=value`"));
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(HarnessOptionParseError::new(input, "key is empty"));
        }
        let value = serde_json::from_str(value)
            .unwrap_or_else(|_| serde_json::Value::String(value.to_owned()));
        Ok(Self {
            key: key.to_owned(),
            value,
        })
    }
}
