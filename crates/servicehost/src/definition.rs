//! Immutable description of the one service this process manages.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use servicehost_config::Config;

use crate::error::NativeError;

/// Name, presentation, and launch command of the managed service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDefinition {
    name: String,
    display_name: String,
    description: Option<String>,
    user: Option<String>,
    executable: PathBuf,
    arguments: Vec<String>,
    requires_elevation: bool,
}

impl ServiceDefinition {
    /// Builds a definition launching `executable` with no extra arguments.
    pub fn new(name: impl Into<String>, executable: impl Into<PathBuf>) -> Self {
        let name = name.into();
        Self {
            display_name: name.clone(),
            name,
            description: None,
            user: None,
            executable: executable.into(),
            arguments: Vec::new(),
            requires_elevation: true,
        }
    }

    /// Builds the definition for the running executable from `config`.
    ///
    /// The daemon is launched with `--name {name}` followed by
    /// `config_arguments`, so it resolves the same configuration as the
    /// command that installed it.
    pub fn from_config(
        config: &Config,
        config_arguments: &[OsString],
    ) -> Result<Self, NativeError> {
        let executable =
            std::env::current_exe().map_err(|source| NativeError::Executable { source })?;
        let mut arguments = vec![String::from("--name"), config.name().to_owned()];
        let mut skip_value = false;
        for argument in config_arguments {
            let argument = argument.to_string_lossy();
            if std::mem::take(&mut skip_value) {
                continue;
            }
            if argument == "--name" {
                skip_value = true;
                continue;
            }
            if argument.starts_with("--name=") {
                continue;
            }
            arguments.push(argument.into_owned());
        }
        Ok(Self::new(config.name(), executable)
            .with_display_name(config.display_name())
            .with_description(config.description().map(str::to_owned))
            .with_user(config.user().map(str::to_owned))
            .with_arguments(arguments))
    }

    /// Replaces the display name.
    #[must_use]
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    /// Replaces the description.
    #[must_use]
    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    /// Replaces the account the service runs as.
    #[must_use]
    pub fn with_user(mut self, user: Option<String>) -> Self {
        self.user = user;
        self
    }

    /// Replaces the launch arguments placed before the `run` verb.
    #[must_use]
    pub fn with_arguments(mut self, arguments: Vec<String>) -> Self {
        self.arguments = arguments;
        self
    }

    /// Marks whether lifecycle verbs require administrator rights.
    #[must_use]
    pub fn with_elevation(mut self, requires_elevation: bool) -> Self {
        self.requires_elevation = requires_elevation;
        self
    }

    /// Logical name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Display name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Description, if any.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Account the service runs as, if any.
    #[must_use]
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    /// Executable launched by the service manager.
    #[must_use]
    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Arguments placed before the `run` verb.
    #[must_use]
    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    /// Whether lifecycle verbs require administrator rights.
    #[must_use]
    pub const fn requires_elevation(&self) -> bool {
        self.requires_elevation
    }

    /// Full daemon argument list: configured arguments, `run`, then `extra`.
    #[must_use]
    pub fn daemon_arguments(&self, extra: &[&str]) -> Vec<String> {
        let mut arguments = self.arguments.clone();
        arguments.push(String::from("run"));
        arguments.extend(extra.iter().map(|argument| (*argument).to_owned()));
        arguments
    }
}
