use std::cell::RefCell;
use std::ffi::OsString;
use std::fs;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use once_cell::sync::Lazy;
use rstest::{fixture, rstest};
use rstest_bdd_macros::{given, scenario, then, when};
use tempfile::TempDir;

use servicehost_config::{
    Config, DEFAULT_POLL_INTERVAL_MS, default_log_filter, default_log_format,
    default_service_name, default_status_dir,
};

const NAME_VAR: &str = "SERVICEHOST_NAME";

static ENV_MUTEX: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

struct Harness {
    temp_dir: TempDir,
    cli_args: RefCell<Vec<OsString>>,
    env_overrides: RefCell<Vec<(String, Option<OsString>)>>,
    loaded: RefCell<Option<Config>>,
    error: RefCell<Option<String>>,
    _env_guard: MutexGuard<'static, ()>,
}

impl Harness {
    fn new() -> Self {
        let env_guard = match ENV_MUTEX.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        // Scenarios must not inherit an override from the surrounding shell.
        let previous = std::env::var_os(NAME_VAR);
        unsafe { std::env::remove_var(NAME_VAR) };
        let temp_dir = match TempDir::new() {
            Ok(dir) => dir,
            Err(error) => panic!("failed to create temporary directory: {error}"),
        };
        Self {
            temp_dir,
            cli_args: RefCell::new(vec![OsString::from("servicectl")]),
            env_overrides: RefCell::new(vec![(NAME_VAR.to_owned(), previous)]),
            loaded: RefCell::new(None),
            error: RefCell::new(None),
            _env_guard: env_guard,
        }
    }

    fn write_config(&self, name: &str) {
        let path = self.temp_dir.path().join("servicehost.toml");
        if let Err(error) = fs::write(&path, format!("name = \"{name}\"\n")) {
            panic!("failed to write configuration: {error}");
        }
        let mut args = self.cli_args.borrow_mut();
        args.push(OsString::from("--config-path"));
        args.push(path.into_os_string());
    }

    fn set_env(&self, key: &str, value: &str) {
        let previous = std::env::var_os(key);
        unsafe { std::env::set_var(key, value) };
        self.env_overrides
            .borrow_mut()
            .push((key.to_owned(), previous));
    }

    fn push_cli_arg(&self, arg: impl Into<OsString>) {
        self.cli_args.borrow_mut().push(arg.into());
    }

    fn load(&self) {
        if self.loaded.borrow().is_some() || self.error.borrow().is_some() {
            return;
        }
        let args = self.cli_args.borrow().clone();
        match Config::load_from_iter(args) {
            Ok(config) => *self.loaded.borrow_mut() = Some(config),
            Err(error) => *self.error.borrow_mut() = Some(error.to_string()),
        }
    }

    fn loaded_config(&self) -> Config {
        self.load();
        if let Some(error) = self.error.borrow().as_ref() {
            panic!("configuration failed to load: {error}");
        }
        match self.loaded.borrow().as_ref() {
            Some(config) => config.clone(),
            None => panic!("configuration was not loaded"),
        }
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        let mut overrides = self.env_overrides.borrow_mut();
        while let Some((key, value)) = overrides.pop() {
            match value {
                Some(os_value) => unsafe { std::env::set_var(&key, os_value) },
                None => unsafe { std::env::remove_var(&key) },
            }
        }
    }
}

#[fixture]
fn harness() -> Harness {
    Harness::new()
}

#[given("a configuration file setting the service name to \"{name}\"")]
fn given_configuration_file(harness: &Harness, name: String) {
    harness.write_config(&name);
}

#[given("the environment overrides the service name to \"{name}\"")]
fn given_environment_override(harness: &Harness, name: String) {
    harness.set_env(NAME_VAR, &name);
}

#[when("the CLI sets the service name to \"{name}\"")]
fn when_cli_name(harness: &Harness, name: String) {
    harness.push_cli_arg("--name");
    harness.push_cli_arg(name);
}

#[when("the CLI sets the poll interval to \"{millis}\"")]
fn when_cli_poll_interval(harness: &Harness, millis: String) {
    harness.push_cli_arg("--poll-interval-ms");
    harness.push_cli_arg(millis);
}

#[when("the configuration loads without overrides")]
fn when_load_without_overrides(harness: &Harness) {
    harness.load();
}

#[then("loading the configuration resolves the service name to \"{name}\"")]
fn then_resolved_name(harness: &Harness, name: String) {
    assert_eq!(harness.loaded_config().name(), name);
}

#[then("loading the configuration resolves the poll interval to {millis} milliseconds")]
fn then_resolved_poll_interval(harness: &Harness, millis: u64) {
    assert_eq!(
        harness.loaded_config().poll_interval(),
        Duration::from_millis(millis)
    );
}

#[then("loading the configuration applies the built-in defaults")]
fn then_defaults_applied(harness: &Harness) {
    let config = harness.loaded_config();
    assert_eq!(config.name(), default_service_name());
    assert_eq!(config.status_dir, default_status_dir());
    assert_eq!(config.log_filter(), default_log_filter());
    assert_eq!(config.log_format(), default_log_format());
    assert_eq!(config.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
    assert!(!config.delayed_auto_start);
}

#[scenario(path = "tests/features/configuration_precedence.feature")]
fn configuration_precedence(#[from(harness)] harness: Harness) {
    let _ = harness;
}

#[rstest]
fn inherent_loader_needs_no_trait_import(harness: Harness) {
    let config_path = harness.temp_dir.path().join("servicehost.toml");
    if let Err(error) = fs::write(&config_path, "poll_interval_ms = 250\n") {
        panic!("failed to write configuration: {error}");
    }
    let args = [
        OsString::from("servicectl"),
        OsString::from("--config-path"),
        config_path.into_os_string(),
        OsString::from("--name"),
        OsString::from("billing"),
    ];

    let config = match Config::load_from_iter(args) {
        Ok(config) => config,
        Err(error) => panic!("configuration failed to load: {error}"),
    };

    assert_eq!(config.name(), "billing");
    assert_eq!(config.poll_interval(), Duration::from_millis(250));
}
