use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use beacon_log::LogConfig;
use beacon_sampling::tuning::AutoTuneConfig;
use serde::{Deserialize, Serialize};

use crate::{ConfigError, ConfigErrorKind, OverridableConfig};

/// The basename of the config file inside the config folder.
const CONFIG_FILE_NAME: &str = "config.yml";

/// Network settings of the HTTP server.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Server {
    /// The host the service should bind to (network interface).
    pub host: IpAddr,
    /// The port to bind for the HTTP server.
    pub port: u16,
    /// Seconds to wait for in-flight requests on shutdown.
    pub shutdown_timeout: u64,
}

impl Default for Server {
    fn default() -> Self {
        Server {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8080,
            shutdown_timeout: 10,
        }
    }
}

/// Static identity attached to every log event and pushed metric.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Identity {
    /// Name of the service.
    pub service: String,
    /// Deployment environment, such as `dev` or `prod`.
    pub environment: String,
}

impl Default for Identity {
    fn default() -> Self {
        Identity {
            service: "api".to_owned(),
            environment: "dev".to_owned(),
        }
    }
}

/// Controls the push metrics sent to a statsd agent.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Metrics {
    /// Host and port of the statsd agent.
    pub statsd: String,
    /// Prefix for all pushed metrics.
    pub prefix: String,
    /// Additional tags for all pushed metrics.
    ///
    /// The `service` and `env` tags are always added from the [`Identity`].
    pub default_tags: BTreeMap<String, String>,
    /// Batch metrics into larger UDP packets.
    pub buffering: bool,
    /// Number of metrics that can be queued before new metrics are dropped.
    pub queue_size: usize,
}

impl Default for Metrics {
    fn default() -> Self {
        Metrics {
            statsd: "127.0.0.1:8125".to_owned(),
            prefix: "api".to_owned(),
            default_tags: BTreeMap::new(),
            buffering: false,
            queue_size: 100_000,
        }
    }
}

/// Controls the JSON log stream sent to a log collector over TCP.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Logs {
    /// Host and port of the log collector.
    pub target: String,
    /// Seconds to wait for the connection at startup.
    pub connect_timeout: u64,
    /// Milliseconds to wait for a single line to be written.
    pub write_timeout: u64,
    /// Number of log lines that can be queued before new lines are dropped.
    pub queue_size: usize,
}

impl Default for Logs {
    fn default() -> Self {
        Logs {
            target: "127.0.0.1:9000".to_owned(),
            connect_timeout: 5,
            write_timeout: 1000,
            queue_size: 10_000,
        }
    }
}

/// Parameters of the simulated request handling.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Simulation {
    /// Upper bound of the random processing delay in milliseconds (exclusive).
    pub max_delay_ms: u64,
    /// Probability of a request failing with status 500.
    pub error_rate: f64,
}

impl Default for Simulation {
    fn default() -> Self {
        Simulation {
            max_delay_ms: 100,
            error_rate: 0.1,
        }
    }
}

/// Controls the sample rate.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Sampling {
    /// Adaptive tuning of the rate from error ratio and latency.
    pub auto_tune: AutoTuneConfig,
}

#[derive(Serialize, Deserialize, Debug, Default)]
#[serde(default)]
struct ConfigValues {
    server: Server,
    identity: Identity,
    metrics: Metrics,
    logs: Logs,
    simulation: Simulation,
    sampling: Sampling,
    logging: LogConfig,
}

impl ConfigValues {
    /// The full path of the config file within the given config folder.
    fn path(base: &Path) -> PathBuf {
        base.join(CONFIG_FILE_NAME)
    }

    /// Loads the config file from within the given directory, or defaults if it does not exist.
    fn load(base: &Path) -> Result<Self, ConfigError> {
        let path = Self::path(base);

        let f = match fs::File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(ConfigError::wrap(e, ConfigErrorKind::CouldNotOpenFile).file(&path));
            }
        };

        let value: serde_yaml::Value = serde_yaml::from_reader(io::BufReader::new(f))
            .map_err(|e| ConfigError::wrap(e, ConfigErrorKind::BadYaml).file(&path))?;

        // An empty file parses as null.
        if value.is_null() {
            return Ok(Self::default());
        }

        serde_yaml::from_value(value)
            .map_err(|e| ConfigError::wrap(e, ConfigErrorKind::BadYaml).file(&path))
    }
}

/// Config struct.
#[derive(Default)]
pub struct Config {
    values: ConfigValues,
    path: PathBuf,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("path", &self.path)
            .field("values", &self.values)
            .finish()
    }
}

impl Config {
    /// Loads a config from a given config folder.
    ///
    /// A missing `config.yml` is not an error, all values are defaulted in this case.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let path = env::current_dir()
            .map(|x| x.join(path.as_ref()))
            .unwrap_or_else(|_| path.as_ref().to_path_buf());

        Ok(Config {
            values: ConfigValues::load(&path)?,
            path,
        })
    }

    /// Creates a config from a JSON value.
    ///
    /// This is mostly useful for tests.
    pub fn from_json_value(value: serde_json::Value) -> Result<Config, ConfigError> {
        Ok(Config {
            values: serde_json::from_value(value)
                .map_err(|err| ConfigError::wrap(err, ConfigErrorKind::BadJson))?,
            path: PathBuf::new(),
        })
    }

    /// Override configuration with values coming from other sources (e.g. env variables or
    /// command line parameters)
    pub fn apply_override(&mut self, overrides: OverridableConfig) -> Result<&mut Self, ConfigError> {
        let server = &mut self.values.server;

        if let Some(host) = overrides.host {
            server.host = host
                .parse::<IpAddr>()
                .map_err(|err| ConfigError::for_field(err, "host"))?;
        }

        if let Some(port) = overrides.port {
            server.port = port
                .as_str()
                .parse()
                .map_err(|err| ConfigError::for_field(err, "port"))?;
        }

        if let Some(shutdown_timeout) = overrides.shutdown_timeout {
            server.shutdown_timeout = shutdown_timeout
                .parse()
                .map_err(|err| ConfigError::for_field(err, "shutdown_timeout"))?;
        }

        if let Some(statsd) = overrides.statsd {
            self.values.metrics.statsd = statsd;
        }

        if let Some(log_target) = overrides.log_target {
            self.values.logs.target = log_target;
        }

        let identity = &mut self.values.identity;
        if let Some(service) = overrides.service {
            identity.service = service;
        }
        if let Some(environment) = overrides.environment {
            identity.environment = environment;
        }

        if let Some(enabled) = overrides.auto_tune {
            let auto_tune = &mut self.values.sampling.auto_tune;
            match enabled.to_lowercase().as_str() {
                "true" | "1" => auto_tune.enabled = true,
                "false" | "0" | "" => auto_tune.enabled = false,
                _ => {
                    return Err(ConfigError::new(ConfigErrorKind::InvalidValue).field("auto_tune"));
                }
            }
        }

        Ok(self)
    }

    /// Returns the path of the config folder.
    ///
    /// This is empty if the config was not loaded from a folder.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Dumps out a YAML string of the values.
    pub fn to_yaml_string(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(&self.values)
            .map_err(|e| ConfigError::wrap(e, ConfigErrorKind::CouldNotWriteFile))
    }

    /// Returns the socket address the HTTP server binds to.
    pub fn listen_addr(&self) -> SocketAddr {
        (self.values.server.host, self.values.server.port).into()
    }

    /// Returns the time to wait for in-flight requests on shutdown.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.values.server.shutdown_timeout)
    }

    /// Returns the service name.
    pub fn service(&self) -> &str {
        &self.values.identity.service
    }

    /// Returns the deployment environment.
    pub fn environment(&self) -> &str {
        &self.values.identity.environment
    }

    /// Returns the address of the statsd agent.
    pub fn statsd_addr(&self) -> &str {
        &self.values.metrics.statsd
    }

    /// Returns the prefix for pushed metrics.
    pub fn metrics_prefix(&self) -> &str {
        &self.values.metrics.prefix
    }

    /// Returns the tags added to every pushed metric, including `service` and `env`.
    pub fn metrics_default_tags(&self) -> BTreeMap<String, String> {
        let mut tags = self.values.metrics.default_tags.clone();
        tags.insert("service".to_owned(), self.service().to_owned());
        tags.insert("env".to_owned(), self.environment().to_owned());
        tags
    }

    /// Returns `true` if pushed metrics are batched into larger packets.
    pub fn metrics_buffering(&self) -> bool {
        self.values.metrics.buffering
    }

    /// Returns the capacity of the push metrics queue.
    pub fn metrics_queue_size(&self) -> usize {
        self.values.metrics.queue_size
    }

    /// Returns the address of the log collector.
    pub fn logs_target(&self) -> &str {
        &self.values.logs.target
    }

    /// Returns the time to wait for the log collector connection at startup.
    pub fn logs_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.values.logs.connect_timeout)
    }

    /// Returns the time to wait for a single log line to be written.
    pub fn logs_write_timeout(&self) -> Duration {
        Duration::from_millis(self.values.logs.write_timeout)
    }

    /// Returns the capacity of the log line queue.
    pub fn logs_queue_size(&self) -> usize {
        self.values.logs.queue_size
    }

    /// Returns the upper bound of the simulated processing delay.
    pub fn simulation_max_delay(&self) -> Duration {
        Duration::from_millis(self.values.simulation.max_delay_ms)
    }

    /// Returns the probability of a simulated failure.
    pub fn simulation_error_rate(&self) -> f64 {
        self.values.simulation.error_rate
    }

    /// Returns the configuration of the adaptive rate tuner.
    pub fn auto_tune(&self) -> &AutoTuneConfig {
        &self.values.sampling.auto_tune
    }

    /// Returns the logging configuration.
    pub fn logging(&self) -> &LogConfig {
        &self.values.logging
    }
}
