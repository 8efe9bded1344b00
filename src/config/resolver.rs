//! Merging of CLI flags, environment variables, the optional config file and
//! build constants into one [`ResolvedConfig`].
//!
//! # Precedence
//! ```text
//! --flag (non-empty)  >  ENV_VAR (non-empty)  >  config file  >  unset
//! ```
//!
//! # Design Decisions
//! - `--help` and `--version` are terminal outcomes, reported before validation
//! - Inputs are captured once into [`RawInputs`] so tests never touch process state
//! - Failures are returned as errors; only `resolve_or_exit` terminates

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::PathBuf;

use clap::{ArgAction, CommandFactory, FromArgMatches, Parser};

use crate::config::loader::{load_file, ConfigError};
use crate::config::schema::{version_banner, FileConfig, ResolvedConfig};
use crate::config::validation::{validate, ConfigCandidate};

pub const ENVIRONMENT_ENV_VAR: &str = "ENVIRONMENT";
pub const LOG_LEVEL_ENV_VAR: &str = "LOG_LEVEL";
pub const TRACE_ENDPOINT_ENV_VAR: &str = "TRACE_ENDPOINT";
pub const METRICS_ENDPOINT_ENV_VAR: &str = "METRICS_ENDPOINT";

/// Command-line flags understood by every host service.
#[derive(Debug, Clone, Default, Parser)]
#[command(disable_help_flag = true, disable_version_flag = true)]
pub struct Flags {
    /// Set the environment in which the service is running [ localhost | dev | test | stage | prod ]
    #[arg(long = "env", value_name = "ENV")]
    pub environment: Option<String>,

    /// Sets the log level [ debug | info | warn | error | fatal ]
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// The host and port of the otel collector where traces are to be sent [<server>:<port>]
    #[arg(long = "trace-endpoint", value_name = "ADDR")]
    pub trace_endpoint: Option<String>,

    /// The host and port of the otel collector where metrics are to be sent [<server>:<port>]
    #[arg(long = "metrics-endpoint", value_name = "ADDR")]
    pub metrics_endpoint: Option<String>,

    /// Path to a TOML file with default observability settings
    #[arg(long = "config", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Display current version information for the app
    #[arg(long, action = ArgAction::SetTrue)]
    pub version: bool,

    /// Display help information
    #[arg(long, action = ArgAction::SetTrue)]
    pub help: bool,
}

/// Everything read from the process at startup. Immutable once captured.
#[derive(Debug, Clone)]
pub struct RawInputs {
    flags: Flags,
    env: HashMap<String, String>,
    host_name: String,
}

impl RawInputs {
    /// Capture the real command line, environment and host name.
    pub fn from_process() -> Result<Self, ConfigError> {
        let env = std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)));
        Self::from_parts(std::env::args_os(), env)
    }

    /// Build inputs from explicit arguments (including the program name) and
    /// environment pairs.
    pub fn from_parts<A, T, E, K, V>(args: A, env: E) -> Result<Self, ConfigError>
    where
        A: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
        E: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let matches = Flags::command().try_get_matches_from(args)?;
        let flags = Flags::from_arg_matches(&matches)?;

        Ok(Self {
            flags,
            env: env.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            host_name: local_host_name(),
        })
    }

    /// Override the detected host name.
    pub fn with_host_name(mut self, host_name: impl Into<String>) -> Self {
        self.host_name = host_name.into();
        self
    }

    pub fn flags(&self) -> &Flags {
        &self.flags
    }

    fn env_var(&self, key: &str) -> Option<&str> {
        self.env.get(key).map(String::as_str)
    }
}

/// Outcome of a resolution pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Configuration is valid and ready to use.
    Ready(ResolvedConfig),
    /// `--help` was given; holds the usage text.
    ShowHelp(String),
    /// `--version` was given; holds the version banner.
    ShowVersion(String),
}

/// Resolves configuration for one service build.
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    service_name: String,
    build_date: String,
    version: String,
    commit_hash: String,
}

impl ConfigResolver {
    pub fn new(
        service_name: impl Into<String>,
        build_date: impl Into<String>,
        version: impl Into<String>,
        commit_hash: impl Into<String>,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            build_date: build_date.into(),
            version: version.into(),
            commit_hash: commit_hash.into(),
        }
    }

    /// Run one resolution pass over the captured inputs.
    pub fn resolve(&self, inputs: &RawInputs) -> Result<Resolution, ConfigError> {
        if inputs.flags.help {
            return Ok(Resolution::ShowHelp(self.usage()));
        }
        if inputs.flags.version {
            return Ok(Resolution::ShowVersion(version_banner(
                &self.version,
                &self.build_date,
                &self.commit_hash,
            )));
        }

        let file = match &inputs.flags.config {
            Some(path) => load_file(path)?,
            None => FileConfig::default(),
        };
        let flags = &inputs.flags;
        let defaults = &file.observability;

        let candidate = ConfigCandidate {
            service_name: self.service_name.clone(),
            build_date: self.build_date.clone(),
            version: self.version.clone(),
            commit_hash: self.commit_hash.clone(),
            host_name: inputs.host_name.clone(),
            environment: pick(
                flags.environment.as_deref(),
                inputs.env_var(ENVIRONMENT_ENV_VAR),
                defaults.environment.as_deref(),
            ),
            log_level: pick(
                flags.log_level.as_deref(),
                inputs.env_var(LOG_LEVEL_ENV_VAR),
                defaults.log_level.as_deref(),
            ),
            trace_endpoint: pick(
                flags.trace_endpoint.as_deref(),
                inputs.env_var(TRACE_ENDPOINT_ENV_VAR),
                defaults.trace_endpoint.as_deref(),
            ),
            metrics_endpoint: pick(
                flags.metrics_endpoint.as_deref(),
                inputs.env_var(METRICS_ENDPOINT_ENV_VAR),
                defaults.metrics_endpoint.as_deref(),
            ),
        };

        let config = validate(&candidate).map_err(ConfigError::Validation)?;

        tracing::debug!(
            service = %config.service_name(),
            environment = %config.environment(),
            log_level = %config.log_level(),
            trace_endpoint = %config.trace_endpoint(),
            metrics_endpoint = %config.metrics_endpoint(),
            "Configuration resolved"
        );
        Ok(Resolution::Ready(config))
    }

    /// Capture the process inputs and resolve them.
    pub fn resolve_process(&self) -> Result<Resolution, ConfigError> {
        let inputs = RawInputs::from_process()?;
        self.resolve(&inputs)
    }

    /// Resolve the process inputs, printing and exiting on help, version or
    /// invalid configuration.
    pub fn resolve_or_exit(&self) -> ResolvedConfig {
        match self.resolve_process() {
            Ok(Resolution::Ready(config)) => config,
            Ok(Resolution::ShowHelp(usage)) => {
                println!("{}", usage);
                std::process::exit(0);
            }
            Ok(Resolution::ShowVersion(banner)) => {
                println!("{}", banner);
                std::process::exit(0);
            }
            Err(e) => {
                eprintln!("{}: {}", self.service_name, e);
                std::process::exit(1);
            }
        }
    }

    /// Usage text listing every flag.
    pub fn usage(&self) -> String {
        Flags::command()
            .name(self.service_name.clone())
            .render_help()
            .to_string()
    }
}

/// First non-empty value in precedence order.
fn pick(flag: Option<&str>, env: Option<&str>, file: Option<&str>) -> Option<String> {
    [flag, env, file]
        .into_iter()
        .flatten()
        .find(|v| !v.is_empty())
        .map(str::to_string)
}

fn local_host_name() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{Environment, LogLevel};
    use crate::config::validation::ValidationError;

    fn resolver() -> ConfigResolver {
        ConfigResolver::new("svc", "2024-01-01", "1.0.0", "abcd")
    }

    fn full_env() -> Vec<(&'static str, &'static str)> {
        vec![
            (ENVIRONMENT_ENV_VAR, "test"),
            (LOG_LEVEL_ENV_VAR, "debug"),
            (TRACE_ENDPOINT_ENV_VAR, "x:1"),
            (METRICS_ENDPOINT_ENV_VAR, "y:2"),
        ]
    }

    fn ready(resolution: Resolution) -> ResolvedConfig {
        match resolution {
            Resolution::Ready(cfg) => cfg,
            other => panic!("expected ready config, got {:?}", other),
        }
    }

    #[test]
    fn test_env_only() {
        let inputs = RawInputs::from_parts(["svc"], full_env()).unwrap();
        let cfg = ready(resolver().resolve(&inputs).unwrap());

        assert_eq!(cfg.service_name(), "svc");
        assert_eq!(cfg.environment(), Environment::Test);
        assert_eq!(cfg.log_level(), LogLevel::Debug);
        assert_eq!(cfg.trace_endpoint(), "x:1");
        assert_eq!(cfg.metrics_endpoint(), "y:2");
        assert_eq!(cfg.version(), "1.0.0");
        assert_eq!(cfg.build_date(), "2024-01-01");
        assert_eq!(cfg.commit_hash(), "abcd");
    }

    #[test]
    fn test_flag_overrides_env() {
        let inputs = RawInputs::from_parts(["svc", "--log-level", "warn"], full_env()).unwrap();
        let cfg = ready(resolver().resolve(&inputs).unwrap());

        assert_eq!(cfg.log_level(), LogLevel::Warn);
        assert_eq!(cfg.environment(), Environment::Test);
        assert_eq!(cfg.trace_endpoint(), "x:1");
    }

    #[test]
    fn test_precedence_grid() {
        // (flag, env, expected)
        let cases = [
            (Some("flag:1"), Some("env:1"), Some("flag:1")),
            (Some(""), Some("env:1"), Some("env:1")),
            (None, Some("env:1"), Some("env:1")),
            (Some("flag:1"), None, Some("flag:1")),
            (Some(""), Some(""), None),
            (None, None, None),
        ];

        for (flag, env, expected) in cases {
            let mut args = vec!["svc".to_string()];
            if let Some(flag) = flag {
                args.push(format!("--trace-endpoint={}", flag));
            }
            let mut vars = full_env();
            vars.retain(|(k, _)| *k != TRACE_ENDPOINT_ENV_VAR);
            if let Some(env) = env {
                vars.push((TRACE_ENDPOINT_ENV_VAR, env));
            }

            let inputs = RawInputs::from_parts(args, vars).unwrap();
            match (resolver().resolve(&inputs), expected) {
                (Ok(Resolution::Ready(cfg)), Some(expected)) => {
                    assert_eq!(cfg.trace_endpoint(), expected)
                }
                (Err(ConfigError::Validation(errors)), None) => {
                    assert_eq!(errors, vec![ValidationError::Missing("trace endpoint")])
                }
                (other, expected) => {
                    panic!("flag={:?} env={:?}: got {:?}, expected {:?}", flag, env, other, expected)
                }
            }
        }
    }

    #[test]
    fn test_rejects_unknown_environment() {
        let inputs = RawInputs::from_parts(["svc", "--env", "qa"], full_env()).unwrap();
        let err = resolver().resolve(&inputs).unwrap_err();
        match err {
            ConfigError::Validation(errors) => {
                assert_eq!(errors, vec![ValidationError::InvalidEnvironment("qa".into())])
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_missing_build_identity() {
        let resolver = ConfigResolver::new("", "2024-01-01", "", "abcd");
        let inputs = RawInputs::from_parts(["svc"], full_env()).unwrap();
        match resolver.resolve(&inputs).unwrap_err() {
            ConfigError::Validation(errors) => assert_eq!(
                errors,
                vec![
                    ValidationError::MissingBuildField("svcName"),
                    ValidationError::MissingBuildField("ver"),
                ]
            ),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_help_before_validation() {
        let inputs = RawInputs::from_parts(["svc", "--help"], Vec::<(String, String)>::new()).unwrap();
        match resolver().resolve(&inputs).unwrap() {
            Resolution::ShowHelp(usage) => {
                assert!(usage.contains("--log-level"));
                assert!(usage.contains("--trace-endpoint"));
            }
            other => panic!("expected help, got {:?}", other),
        }
    }

    #[test]
    fn test_version_before_validation() {
        let inputs =
            RawInputs::from_parts(["svc", "--version"], Vec::<(String, String)>::new()).unwrap();
        assert_eq!(
            resolver().resolve(&inputs).unwrap(),
            Resolution::ShowVersion(
                "Version: 1.0.0, Build Date: 2024-01-01, Build Commit: abcd".into()
            )
        );
    }

    #[test]
    fn test_unknown_flag() {
        let err = RawInputs::from_parts(["svc", "--bogus"], full_env()).unwrap_err();
        assert!(matches!(err, ConfigError::Flags(_)));
    }

    #[test]
    fn test_config_file_is_lowest_precedence() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[observability]\nenvironment = \"dev\"\nlog_level = \"error\"\ntrace_endpoint = \"file:1\"\nmetrics_endpoint = \"file:2\""
        )
        .unwrap();
        let path = file.path().to_string_lossy().to_string();

        let env = vec![(LOG_LEVEL_ENV_VAR, "info")];
        let args = vec!["svc".to_string(), "--config".into(), path, "--metrics-endpoint".into(), "flag:2".into()];
        let inputs = RawInputs::from_parts(args, env).unwrap();
        let cfg = ready(resolver().resolve(&inputs).unwrap());

        assert_eq!(cfg.environment(), Environment::Dev);
        assert_eq!(cfg.log_level(), LogLevel::Info);
        assert_eq!(cfg.trace_endpoint(), "file:1");
        assert_eq!(cfg.metrics_endpoint(), "flag:2");
    }

    #[test]
    fn test_host_name_override() {
        let inputs = RawInputs::from_parts(["svc"], full_env())
            .unwrap()
            .with_host_name("node-7");
        let cfg = ready(resolver().resolve(&inputs).unwrap());
        assert_eq!(cfg.host_name(), "node-7");
    }
}
