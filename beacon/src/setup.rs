use anyhow::Result;
use beacon_config::Config;

/// Validates values that deserialize fine but cannot be used.
pub fn check_config(config: &Config) -> Result<()> {
    let error_rate = config.simulation_error_rate();
    if !(0.0..=1.0).contains(&error_rate) {
        anyhow::bail!("simulated error rate must be between 0 and 1, got {error_rate}");
    }

    if config.metrics_queue_size() == 0 || config.logs_queue_size() == 0 {
        anyhow::bail!("telemetry queue sizes must be greater than zero");
    }

    let auto_tune = config.auto_tune();
    if !(0.0..=1.0).contains(&auto_tune.min_rate)
        || !(0.0..=1.0).contains(&auto_tune.max_rate)
        || auto_tune.min_rate > auto_tune.max_rate
    {
        anyhow::bail!(
            "invalid auto tune bounds [{}, {}], both must be between 0 and 1",
            auto_tune.min_rate,
            auto_tune.max_rate
        );
    }

    if auto_tune.step <= 0.0 {
        anyhow::bail!("auto tune step must be positive");
    }

    Ok(())
}

/// Print spawn infos to the log.
pub fn dump_spawn_infos(config: &Config) {
    if config.path().as_os_str().is_empty() {
        beacon_log::info!("launching beacon without config folder");
    } else {
        beacon_log::info!(
            "launching beacon from config folder {}",
            config.path().display()
        );
    }
    beacon_log::info!("  service: {}", config.service());
    beacon_log::info!("  environment: {}", config.environment());
    beacon_log::info!("  statsd: {}", config.statsd_addr());
    beacon_log::info!("  log target: {}", config.logs_target());
    beacon_log::info!("  log level: {}", config.logging().level);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(json: serde_json::Value) -> Config {
        Config::from_json_value(json).unwrap()
    }

    #[test]
    fn test_defaults_are_valid() {
        check_config(&Config::default()).unwrap();
    }

    #[test]
    fn test_invalid_error_rate() {
        let config = config(serde_json::json!({"simulation": {"error_rate": 1.5}}));
        assert!(check_config(&config).is_err());
    }

    #[test]
    fn test_invalid_tune_bounds() {
        let config = config(serde_json::json!({
            "sampling": {"auto_tune": {"min_rate": 0.8, "max_rate": 0.2}}
        }));
        assert!(check_config(&config).is_err());
    }
}
