// Telemetry
//
// Console logging through tracing-subscriber for every binary, plus an OTLP
// span exporter when built with the `otel` feature and an endpoint is set.
// Console output goes to stderr; the CLI prints results on stdout.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[cfg(feature = "otel")]
use opentelemetry::{trace::TracerProvider as _, KeyValue};
#[cfg(feature = "otel")]
use opentelemetry_otlp::WithExportConfig;
#[cfg(feature = "otel")]
use opentelemetry_sdk::{trace::SdkTracerProvider, Resource};

/// Logging setup of one binary.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Reported as `service.name` on exported spans
    pub service_name: String,
    pub service_version: Option<String>,
    /// `OTEL_EXPORTER_OTLP_ENDPOINT`; only used with the `otel` feature
    pub otlp_endpoint: Option<String>,
    /// `RUST_LOG` (or `LOG_LEVEL`) directives
    pub log_filter: Option<String>,
}

impl TelemetryConfig {
    /// Configuration for the binary `service_name`, overridable through
    /// `OTEL_SERVICE_NAME`, `OTEL_EXPORTER_OTLP_ENDPOINT` and `RUST_LOG`/`LOG_LEVEL`.
    pub fn for_service(service_name: &str, service_version: &str) -> Self {
        let env = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());
        Self {
            service_name: env("OTEL_SERVICE_NAME").unwrap_or_else(|| service_name.to_string()),
            service_version: Some(service_version.to_string()),
            otlp_endpoint: env("OTEL_EXPORTER_OTLP_ENDPOINT"),
            log_filter: env("RUST_LOG").or_else(|| env("LOG_LEVEL")),
        }
    }

    /// Use `filter` unless the environment already provided one.
    pub fn with_default_filter(mut self, filter: &str) -> Self {
        self.log_filter.get_or_insert_with(|| filter.to_string());
        self
    }

    fn env_filter(&self) -> EnvFilter {
        match self.log_filter.as_deref().map(EnvFilter::try_new) {
            Some(Ok(filter)) => filter,
            Some(Err(e)) => {
                eprintln!("Ignoring invalid log filter: {}", e);
                EnvFilter::new("info")
            }
            None => EnvFilter::new("info"),
        }
    }
}

/// Flushes exported spans when dropped
pub struct TelemetryGuard {
    #[cfg(feature = "otel")]
    provider: Option<SdkTracerProvider>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        #[cfg(feature = "otel")]
        if let Some(provider) = self.provider.take() {
            if let Err(e) = provider.shutdown() {
                eprintln!("Failed to shut down span exporter: {:?}", e);
            }
        }
    }
}

/// Install the global subscriber.
///
/// Keep the returned guard alive for the lifetime of the process. A second
/// call leaves the first subscriber in place.
pub fn init_telemetry(config: TelemetryConfig) -> TelemetryGuard {
    let console = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr)
        .with_filter(config.env_filter());

    #[cfg(feature = "otel")]
    {
        let exporter = config
            .otlp_endpoint
            .as_deref()
            .map(|endpoint| span_exporter(endpoint, &config).map(|p| (endpoint, p)));

        let provider = match exporter {
            Some(Ok((endpoint, provider))) => {
                let tracer = provider.tracer("bizdesk");
                let _ = tracing_subscriber::registry()
                    .with(console)
                    .with(tracing_opentelemetry::layer().with_tracer(tracer))
                    .try_init();
                tracing::info!(endpoint, service = %config.service_name, "Exporting spans over OTLP");
                Some(provider)
            }
            Some(Err(e)) => {
                let _ = tracing_subscriber::registry().with(console).try_init();
                tracing::warn!(error = %e, "OTLP exporter unavailable, logging to console only");
                None
            }
            None => {
                let _ = tracing_subscriber::registry().with(console).try_init();
                None
            }
        };

        TelemetryGuard { provider }
    }

    #[cfg(not(feature = "otel"))]
    {
        let _ = tracing_subscriber::registry().with(console).try_init();
        if config.otlp_endpoint.is_some() {
            tracing::warn!("OTEL_EXPORTER_OTLP_ENDPOINT set but built without the `otel` feature");
        }
        TelemetryGuard {}
    }
}

#[cfg(feature = "otel")]
fn span_exporter(endpoint: &str, config: &TelemetryConfig) -> anyhow::Result<SdkTracerProvider> {
    let mut attributes = vec![KeyValue::new("service.name", config.service_name.clone())];
    if let Some(version) = &config.service_version {
        attributes.push(KeyValue::new("service.version", version.clone()));
    }

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .with_timeout(std::time::Duration::from_secs(10))
        .build()?;

    Ok(SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(Resource::builder().with_attributes(attributes).build())
        .build())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare(service: &str) -> TelemetryConfig {
        TelemetryConfig {
            service_name: service.to_string(),
            service_version: None,
            otlp_endpoint: None,
            log_filter: None,
        }
    }

    #[test]
    fn test_default_filter_does_not_override() {
        let config = bare("bizdesk-server").with_default_filter("bizdesk_server=debug");
        assert_eq!(config.log_filter.as_deref(), Some("bizdesk_server=debug"));

        let config = TelemetryConfig {
            log_filter: Some("warn".to_string()),
            ..bare("bizdesk")
        }
        .with_default_filter("debug");
        assert_eq!(config.log_filter.as_deref(), Some("warn"));
    }

    #[test]
    fn test_for_service_carries_version() {
        let config = TelemetryConfig::for_service("bizdesk-cli", "1.2.3");
        assert_eq!(config.service_version.as_deref(), Some("1.2.3"));
        assert!(!config.service_name.is_empty());
    }

    #[test]
    fn test_init_twice_is_harmless() {
        let _first = init_telemetry(bare("bizdesk").with_default_filter("info"));
        let _second = init_telemetry(bare("bizdesk"));
        tracing::info!("still logging");
    }
}
