//! Configuration loading helpers for `servicectl`.
//!
//! Configuration flags lead the command line and are handed to
//! `ortho_config`; the verb and its own flags follow. The same leading flags
//! are recorded in the service definition so the daemon resolves the
//! configuration the installing command saw.

use std::ffi::{OsStr, OsString};

use servicehost_config::Config;

use crate::errors::AppError;

/// Configuration flags that take a value.
///
/// Keep in sync with the fields of `servicehost_config::Config`.
const CONFIG_VALUE_FLAGS: &[&str] = &[
    "--config-path",
    "--name",
    "--display-name",
    "--description",
    "--user",
    "--log-filter",
    "--log-format",
    "--log-file",
    "--status-dir",
    "--systemd-unit-dir",
    "--init-script-dir",
    "--poll-interval-ms",
    "--wait-timeout-ms",
    "--pending-timeout-ms",
    "--pending-grace-ms",
    "--stop-retry-limit",
    "--restart-attempts",
    "--restart-delay-ms",
    "--failure-reset-secs",
];

/// Configuration flags that stand alone.
const CONFIG_SWITCH_FLAGS: &[&str] = &["--delayed-auto-start"];

pub(crate) trait ConfigLoader {
    /// Loads configuration from the leading configuration flags.
    ///
    /// `args` starts with the program name, as `ortho_config` expects.
    fn load(&self, args: &[OsString]) -> Result<Config, AppError>;
}

pub(crate) struct OrthoConfigLoader;

impl ConfigLoader for OrthoConfigLoader {
    fn load(&self, args: &[OsString]) -> Result<Config, AppError> {
        Config::load_from_iter(args.iter().cloned()).map_err(AppError::LoadConfiguration)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlagAction {
    Include { needs_value: bool },
    Stop,
}

fn classify(argument: &OsStr) -> FlagAction {
    let text = argument.to_string_lossy();
    let (flag, inline_value) = match text.split_once('=') {
        Some((flag, _)) => (flag, true),
        None => (&*text, false),
    };
    if CONFIG_VALUE_FLAGS.contains(&flag) {
        return FlagAction::Include {
            needs_value: !inline_value,
        };
    }
    if CONFIG_SWITCH_FLAGS.contains(&flag) {
        return FlagAction::Include { needs_value: false };
    }
    FlagAction::Stop
}

/// Leading configuration flags and where the verb starts.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct ConfigArgumentSplit {
    /// Program name followed by the configuration flags.
    pub(crate) config_arguments: Vec<OsString>,
    /// Index of the first verb token in the original arguments.
    pub(crate) command_start: usize,
}

impl ConfigArgumentSplit {
    /// Configuration flags without the program name.
    pub(crate) fn flags(&self) -> &[OsString] {
        self.config_arguments.get(1..).unwrap_or_default()
    }

    /// Program name followed by the verb tokens, for clap.
    pub(crate) fn command_arguments(&self, args: &[OsString]) -> Vec<OsString> {
        self.config_arguments
            .first()
            .into_iter()
            .chain(args.iter().skip(self.command_start))
            .cloned()
            .collect()
    }
}

pub(crate) fn split_config_arguments(args: &[OsString]) -> ConfigArgumentSplit {
    let Some(program) = args.first() else {
        return ConfigArgumentSplit {
            config_arguments: Vec::new(),
            command_start: 0,
        };
    };

    let mut config_arguments = vec![program.clone()];
    let mut command_start = 1;
    let mut pending_value = false;

    for argument in args.iter().skip(1) {
        if std::mem::take(&mut pending_value) {
            config_arguments.push(argument.clone());
            command_start += 1;
            continue;
        }
        match classify(argument) {
            FlagAction::Include { needs_value } => {
                config_arguments.push(argument.clone());
                command_start += 1;
                pending_value = needs_value;
            }
            FlagAction::Stop => break,
        }
    }

    ConfigArgumentSplit {
        config_arguments,
        command_start,
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn os(args: &[&str]) -> Vec<OsString> {
        args.iter().map(OsString::from).collect()
    }

    #[rstest]
    #[case("--log-filter=debug", FlagAction::Include { needs_value: false })]
    #[case("--log-filter", FlagAction::Include { needs_value: true })]
    #[case("--delayed-auto-start", FlagAction::Include { needs_value: false })]
    #[case("--no-wait", FlagAction::Stop)]
    #[case("start", FlagAction::Stop)]
    fn flags_are_classified(#[case] argument: &str, #[case] expected: FlagAction) {
        assert_eq!(classify(OsStr::new(argument)), expected);
    }

    #[rstest]
    fn leading_configuration_flags_are_split_from_the_verb() {
        let args = os(&[
            "servicectl",
            "--name",
            "billing",
            "--log-format=compact",
            "--delayed-auto-start",
            "start",
            "--name",
        ]);

        let split = split_config_arguments(&args);

        assert_eq!(
            split.flags(),
            os(&["--name", "billing", "--log-format=compact", "--delayed-auto-start"])
        );
        assert_eq!(split.command_start, 5);
        assert_eq!(
            split.command_arguments(&args),
            os(&["servicectl", "start", "--name"])
        );
    }

    #[rstest]
    fn empty_arguments_split_to_nothing() {
        let split = split_config_arguments(&[]);

        assert!(split.flags().is_empty());
        assert!(split.command_arguments(&[]).is_empty());
    }
}
