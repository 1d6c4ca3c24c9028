//! Tracing subscriber and span export lifecycle.

use std::time::Duration;

use opentelemetry::{KeyValue, global, trace::TracerProvider as _};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    Resource,
    propagation::TraceContextPropagator,
    trace::{RandomIdGenerator, Sampler, SdkTracerProvider},
};
use tracing::error;
use tracing_subscriber::{
    EnvFilter, Layer, Registry, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::config::observability::{LogFormat, LoggingConfig, TraceExportConfig};

use super::{ObservabilityError, settings};

/// Crates whose chatter is capped at warn unless `RUST_LOG` says otherwise.
const NOISY_TARGETS: &str = "h2=warn,hyper=warn,reqwest=warn,sqlx=warn,tonic=warn,opentelemetry=warn";

type FmtLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Installed logging and, when enabled, the span exporter to flush on exit.
#[derive(Debug)]
pub(crate) struct Observability {
    tracer_provider: Option<SdkTracerProvider>,
}

impl Observability {
    /// Install the global subscriber.
    pub(crate) fn init(
        logging: &LoggingConfig,
        traces: &TraceExportConfig,
    ) -> Result<Self, ObservabilityError> {
        settings::apply(logging, traces);

        let tracer_provider = if traces.otel_enabled {
            global::set_text_map_propagator(TraceContextPropagator::new());

            Some(span_exporter(traces)?)
        } else {
            None
        };

        let otel_layer = tracer_provider.as_ref().map(|provider| {
            tracing_opentelemetry::layer()
                .with_tracer(provider.tracer(traces.otel_service_name.clone()))
        });

        tracing_subscriber::registry()
            .with(fmt_layer(logging.log_format))
            .with(otel_layer)
            .with(env_filter(&logging.log_level))
            .try_init()?;

        Ok(Self { tracer_provider })
    }

    /// Flush buffered spans.
    pub(crate) fn shutdown(self) {
        if let Some(provider) = self.tracer_provider
            && let Err(source) = provider.shutdown()
        {
            error!("failed to shut down tracer provider: {source}");
        }
    }
}

fn fmt_layer(format: LogFormat) -> FmtLayer {
    match format {
        LogFormat::Compact => tracing_subscriber::fmt::layer()
            .compact()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
    }
}

fn env_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{log_level},{NOISY_TARGETS}")))
}

fn span_exporter(traces: &TraceExportConfig) -> Result<SdkTracerProvider, ObservabilityError> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(traces.otel_exporter_otlp_endpoint.clone())
        .with_timeout(Duration::from_secs(
            traces.otel_exporter_otlp_timeout_seconds,
        ))
        .build()?;

    let resource = Resource::builder_empty()
        .with_service_name(traces.otel_service_name.clone())
        .with_attributes([
            KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
            KeyValue::new(
                "deployment.environment.name",
                traces.otel_deployment_environment.clone(),
            ),
        ])
        .build();

    let ratio = traces.otel_trace_sample_ratio.clamp(0.0, 1.0);

    Ok(SdkTracerProvider::builder()
        .with_sampler(Sampler::ParentBased(Box::new(Sampler::TraceIdRatioBased(
            ratio,
        ))))
        .with_id_generator(RandomIdGenerator::default())
        .with_resource(resource)
        .with_batch_exporter(exporter)
        .build())
}
