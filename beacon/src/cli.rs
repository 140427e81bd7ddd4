use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use beacon_config::{Config, OverridableConfig, extract_config_env_vars};
use clap::ArgMatches;

use crate::cliapp::make_app;
use crate::setup;

/// Config folder used when none is passed on the command line.
const DEFAULT_CONFIG_PATH: &str = ".beacon";

/// Runs the command line application.
pub fn execute() -> Result<()> {
    let app = make_app();
    let matches = app.get_matches();
    let config_path = matches
        .get_one::<PathBuf>("config")
        .map_or(Path::new(DEFAULT_CONFIG_PATH), PathBuf::as_path);

    let mut config = Config::from_path(config_path)
        .with_context(|| format!("could not load config from {}", config_path.display()))?;

    // Environment variables override the config file, command line arguments override both.
    config.apply_override(extract_config_env_vars())?;

    if let Some(run_matches) = matches.subcommand_matches("run") {
        config.apply_override(extract_config_cli_args(run_matches))?;
    }

    beacon_log::init(config.logging());

    match matches.subcommand() {
        Some(("config", config_matches)) => manage_config(&config, config_matches),
        _ => run(config),
    }
}

/// Extract config arguments from a parsed command line arguments object.
pub fn extract_config_cli_args(matches: &ArgMatches) -> OverridableConfig {
    let value = |name: &str| matches.get_one::<String>(name).cloned();

    OverridableConfig {
        host: value("host"),
        port: value("port"),
        statsd: value("statsd"),
        log_target: value("log_target"),
        service: value("service"),
        environment: value("env"),
        auto_tune: matches.get_flag("auto_tune").then(|| "true".to_owned()),
        shutdown_timeout: None,
    }
}

pub fn manage_config(config: &Config, matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("show", _)) => {
            let yaml = config.to_yaml_string()?;
            #[allow(clippy::print_stdout)]
            {
                print!("{yaml}");
            }
            Ok(())
        }
        _ => unreachable!(),
    }
}

pub fn run(config: Config) -> Result<()> {
    setup::dump_spawn_infos(&config);
    setup::check_config(&config)?;
    beacon_server::run(config)?;
    Ok(())
}
