use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use beacon_config::Config;
use beacon_sampling::SamplingController;
use beacon_statsd::{MetricsClient, MetricsClientError, MetricsConfig};
use tokio::task::JoinHandle;

use crate::services::logs::{LogEmitter, LogsError};
use crate::services::metrics::MetricsSink;
use crate::services::outcome::{OutcomeGenerator, SimulatedOutcomes};
use crate::services::pipeline::TelemetryPipeline;
use crate::services::telemetry::ExternalTelemetry;
use crate::services::tuner::{AutoTuner, RateControl};

/// Indicates the type of failure of the server.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Registering the aggregate metrics failed.
    #[error("could not register aggregate metrics")]
    Registry(#[from] prometheus::Error),

    /// Creating the statsd client failed.
    #[error("could not initialize statsd client")]
    Statsd(#[from] MetricsClientError),

    /// Connecting to the log collector failed.
    #[error("could not initialize log stream")]
    Logs(#[from] LogsError),
}

#[derive(Debug)]
struct StateInner {
    config: Arc<Config>,
    pipeline: TelemetryPipeline,
    outcomes: Box<dyn OutcomeGenerator>,
    rate_control: Arc<RateControl>,
}

/// Server state.
#[derive(Clone, Debug)]
pub struct ServiceState {
    inner: Arc<StateInner>,
}

/// Background tasks started along with the [`ServiceState`].
#[derive(Debug)]
pub struct ServiceTasks {
    /// Writes log events to the log collector until all emitters are dropped.
    pub log_writer: JoinHandle<()>,
    /// The periodic rate tuner, if enabled.
    pub tuner: Option<JoinHandle<()>>,
}

impl ServiceState {
    /// Connects all sinks and starts background tasks.
    ///
    /// Fails if a sink cannot be set up. Must be called within a tokio runtime.
    pub async fn start(config: Arc<Config>) -> Result<(Self, ServiceTasks), ServiceError> {
        let sampling = Arc::new(SamplingController::new());
        let metrics = MetricsSink::new()?;

        let client = MetricsClient::connect(MetricsConfig {
            prefix: config.metrics_prefix().to_owned(),
            host: config.statsd_addr().to_owned(),
            default_tags: config.metrics_default_tags(),
            buffering: config.metrics_buffering(),
            queue_size: config.metrics_queue_size(),
        })?;

        let (logs, log_writer) = LogEmitter::connect(
            config.logs_target(),
            config.logs_connect_timeout(),
            config.logs_write_timeout(),
            config.logs_queue_size(),
        )
        .await?;

        let pipeline = TelemetryPipeline::new(
            sampling.clone(),
            metrics.clone(),
            ExternalTelemetry::new(Arc::new(client)),
            logs,
            config.service().to_owned(),
            config.environment().to_owned(),
        );

        let outcomes = SimulatedOutcomes::new(
            config.simulation_max_delay(),
            config.simulation_error_rate(),
        );

        let rate_control = Arc::new(RateControl::new(sampling, config.auto_tune().clone()));

        let tuner = if config.auto_tune().enabled {
            let interval = config.auto_tune().interval();
            beacon_log::info!("tuning sample rate every {}s", interval.as_secs());
            let tuner = AutoTuner::new(rate_control.clone(), metrics);
            Some(tokio::spawn(tuner.run(interval)))
        } else {
            None
        };

        let state = Self::from_parts(config, pipeline, Box::new(outcomes), rate_control);
        let tasks = ServiceTasks { log_writer, tuner };

        Ok((state, tasks))
    }

    /// Assembles the state from already constructed parts.
    pub fn from_parts(
        config: Arc<Config>,
        pipeline: TelemetryPipeline,
        outcomes: Box<dyn OutcomeGenerator>,
        rate_control: Arc<RateControl>,
    ) -> Self {
        Self {
            inner: Arc::new(StateInner {
                config,
                pipeline,
                outcomes,
                rate_control,
            }),
        }
    }

    /// Returns the current config.
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Returns the telemetry pipeline.
    pub fn pipeline(&self) -> &TelemetryPipeline {
        &self.inner.pipeline
    }

    /// Returns the request processing.
    pub fn outcomes(&self) -> &dyn OutcomeGenerator {
        self.inner.outcomes.as_ref()
    }

    /// Returns the shared sample rate control.
    pub fn rate_control(&self) -> &RateControl {
        &self.inner.rate_control
    }

    /// Returns the sample rate.
    pub fn sampling(&self) -> &SamplingController {
        self.inner.rate_control.sampling()
    }
}

impl FromRequestParts<ServiceState> for ServiceState {
    type Rejection = Infallible;

    async fn from_request_parts(
        _parts: &mut Parts,
        state: &ServiceState,
    ) -> Result<Self, Self::Rejection> {
        Ok(state.clone())
    }
}
