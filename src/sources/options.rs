/// Per-source option handling
///
/// Options arrive as raw `key=value` strings (command line or config file).
/// Each loader parses them into its own typed struct via [`LoaderOptions`].
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Raw option strings for one source, in sorted key order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceOptions(BTreeMap<String, String>);

impl SourceOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Error on the first option not named in `specs`
    pub fn reject_unknown(&self, specs: &[OptionSpec]) -> Result<(), OptionError> {
        match self.0.keys().find(|key| !specs.iter().any(|spec| spec.name == key.as_str())) {
            Some(key) => Err(OptionError::Unexpected { option: key.clone() }),
            None => Ok(()),
        }
    }
}

impl From<BTreeMap<String, String>> for SourceOptions {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, String)> for SourceOptions {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Documentation for one option a loader accepts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub default: Option<&'static str>,
}

impl OptionSpec {
    pub const fn new(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            default: None,
        }
    }

    pub const fn with_default(mut self, default: &'static str) -> Self {
        self.default = Some(default);
        self
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OptionError {
    #[error("unexpected option '{option}'")]
    Unexpected { option: String },

    #[error("invalid value '{value}' for option '{option}': {reason}")]
    Invalid {
        option: String,
        value: String,
        reason: String,
    },
}

impl OptionError {
    pub fn option(&self) -> &str {
        match self {
            OptionError::Unexpected { option } | OptionError::Invalid { option, .. } => option,
        }
    }

    pub fn invalid(option: &str, value: &str, reason: impl Into<String>) -> Self {
        OptionError::Invalid {
            option: option.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// A loader's typed option set
pub trait LoaderOptions: Sized + Default {
    fn specs() -> Vec<OptionSpec>;

    fn parse(options: &SourceOptions) -> Result<Self, OptionError>;
}

/// Loaders that take no options reject any they are given
impl LoaderOptions for () {
    fn specs() -> Vec<OptionSpec> {
        Vec::new()
    }

    fn parse(options: &SourceOptions) -> Result<Self, OptionError> {
        options.reject_unknown(&[])
    }
}

/// Parse a yes/no style flag
pub fn parse_flag(option: &str, value: &str) -> Result<bool, OptionError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "yes" | "y" | "true" | "1" | "on" => Ok(true),
        "no" | "n" | "false" | "0" | "off" => Ok(false),
        _ => Err(OptionError::invalid(option, value, "expected yes or no")),
    }
}

/// Parse a `SOURCE:KEY=VALUE` command-line assignment
pub fn parse_assignment(input: &str) -> Result<(String, String, String), String> {
    let (source, rest) = input
        .split_once(':')
        .ok_or_else(|| format!("expected SOURCE:KEY=VALUE, got '{}'", input))?;
    let (key, value) = rest
        .split_once('=')
        .ok_or_else(|| format!("expected SOURCE:KEY=VALUE, got '{}'", input))?;
    if source.is_empty() || key.is_empty() {
        return Err(format!("expected SOURCE:KEY=VALUE, got '{}'", input));
    }
    Ok((source.to_string(), key.to_string(), value.to_string()))
}
