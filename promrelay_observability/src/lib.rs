//! Tracing and metrics bootstrap shared by the forwarder crates.
//!
//! Logs go to stdout (optionally as JSON via `RUST_LOG_FORMAT=json`);
//! metrics and traces are exported over OTLP when `OTEL_SDK_DISABLED` is
//! explicitly set to `false`. Embedders and tests can additionally register
//! a [`MetricsExporter`] to read counter values in-process.

use std::borrow::Cow;
use std::time::Duration;

use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{InstrumentationScope, global};
use opentelemetry_otlp::{ExporterBuildError, MetricExporter, SpanExporter};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::metrics::{MeterProviderBuilder, PeriodicReader};
use opentelemetry_sdk::trace::SdkTracerProvider;
use snafu::{ResultExt, Snafu};
use tracing::Subscriber;
use tracing_opentelemetry::MetricsLayer;
use tracing_subscriber::{EnvFilter, Layer, prelude::*, registry::LookupSpan};

pub use opentelemetry::{
    KeyValue,
    metrics::{Counter, Gauge, Histogram, Meter, UpDownCounter},
};

pub use crate::metrics::MetricsExporter;

mod metrics;

const OTEL_SDK_DISABLED: &str = "OTEL_SDK_DISABLED";

pub type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync>;

#[derive(Debug, Snafu)]
pub enum ObservabilityError {
    #[snafu(display("failed to build OTLP exporter"))]
    Exporter { source: ExporterBuildError },
}

/// Returns a meter from the globally installed provider.
pub fn meter(name: &'static str) -> Meter {
    global::meter(name)
}

/// Installs the global tracing subscriber and meter provider.
///
/// The OTLP exporters follow `OTEL_SDK_DISABLED`; unlike the OTel spec we
/// default to disabled so that embedding the forwarder never requires a
/// collector. The given `metrics_exporter` is always registered so local
/// readers keep working either way.
pub fn init_observability(
    package_name: impl Into<Cow<'static, str>>,
    package_version: impl Into<Cow<'static, str>>,
    metrics_exporter: MetricsExporter,
) -> Result<(), ObservabilityError> {
    let sdk_enabled = std::env::var(OTEL_SDK_DISABLED)
        .map(|v| v == "false")
        .unwrap_or(false);

    if std::env::var("RUST_LOG").is_err() {
        unsafe {
            std::env::set_var("RUST_LOG", "info");
        }
    }

    let otel_layer = otel(package_name, package_version, metrics_exporter, sdk_enabled)?;

    tracing_subscriber::registry()
        .with(vec![stdout(), otel_layer])
        .init();

    Ok(())
}

fn stdout<S>() -> BoxedLayer<S>
where
    S: Subscriber,
    for<'a> S: LookupSpan<'a>,
{
    let log_env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("INFO"));

    let json_fmt = std::env::var("RUST_LOG_FORMAT")
        .map(|val| val == "json")
        .unwrap_or(false);

    if json_fmt {
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_target(true)
            .json()
            .with_filter(log_env_filter)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .compact()
            .with_target(true)
            .with_filter(log_env_filter)
            .boxed()
    }
}

fn otel<S>(
    package_name: impl Into<Cow<'static, str>>,
    version: impl Into<Cow<'static, str>>,
    additional_reader: MetricsExporter,
    sdk_enabled: bool,
) -> Result<BoxedLayer<S>, ObservabilityError>
where
    S: Subscriber + Send + Sync,
    for<'a> S: LookupSpan<'a>,
{
    let resource = Resource::builder().build();

    let otel_env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("INFO"));

    let instrumentation_scope = InstrumentationScope::builder(package_name.into())
        .with_version(version.into())
        .build();

    let mut trace_provider = SdkTracerProvider::builder().with_resource(resource.clone());

    if sdk_enabled {
        let span_exporter = SpanExporter::builder()
            .with_tonic()
            .build()
            .context(ExporterSnafu)?;

        trace_provider = trace_provider.with_batch_exporter(span_exporter);
    }

    let trace_provider = trace_provider.build();
    let tracer = trace_provider.tracer_with_scope(instrumentation_scope);

    let mut meter_provider = MeterProviderBuilder::default()
        .with_resource(resource)
        .with_reader(additional_reader);

    if sdk_enabled {
        let metrics_exporter = MetricExporter::builder()
            .with_tonic()
            .build()
            .context(ExporterSnafu)?;

        let metrics_reader = PeriodicReader::builder(metrics_exporter)
            .with_interval(Duration::from_secs(10))
            .build();

        meter_provider = meter_provider.with_reader(metrics_reader);
    }

    let meter_provider = meter_provider.build();

    global::set_meter_provider(meter_provider.clone());

    let otel_trace_layer = tracing_opentelemetry::layer().with_tracer(tracer);
    let otel_metrics_layer = MetricsLayer::new(meter_provider);
    let otel_layer = otel_env_filter
        .and_then(otel_metrics_layer)
        .and_then(otel_trace_layer)
        .boxed();

    Ok(otel_layer)
}
