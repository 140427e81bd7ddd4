use std::env;

/// Structure used to hold information about configuration overrides via
/// CLI parameters or environment variables
#[derive(Debug, Default)]
pub struct OverridableConfig {
    /// The host the service should bind to (network interface).
    pub host: Option<String>,
    /// The port to bind for the HTTP server.
    pub port: Option<String>,
    /// Address of the statsd agent.
    pub statsd: Option<String>,
    /// Address of the TCP log collector.
    pub log_target: Option<String>,
    /// Name of the service.
    pub service: Option<String>,
    /// Deployment environment.
    pub environment: Option<String>,
    /// "true" if the adaptive rate tuner is enabled "false" otherwise
    pub auto_tune: Option<String>,
    /// shutdown timeout
    pub shutdown_timeout: Option<String>,
}

/// Extract config arguments from environment variables.
///
/// Variables that are set to an empty string are treated as unset.
pub fn extract_config_env_vars() -> OverridableConfig {
    overrides_from(|name| env::var(name).ok())
}

fn overrides_from<F>(lookup: F) -> OverridableConfig
where
    F: Fn(&str) -> Option<String>,
{
    let var = |name: &str| lookup(name).filter(|value| !value.is_empty());

    OverridableConfig {
        host: var("BEACON_HOST"),
        port: var("BEACON_PORT"),
        statsd: var("STATSD_ADDR"),
        log_target: var("LOG_TARGET"),
        service: var("SERVICE_NAME"),
        environment: var("ENV"),
        auto_tune: var("BEACON_AUTO_TUNE"),
        shutdown_timeout: var("BEACON_SHUTDOWN_TIMEOUT"),
    }
}
