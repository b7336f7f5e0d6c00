use std::sync::{Arc, Weak};
use std::time::Duration;

use opentelemetry_sdk::error::{OTelSdkError, OTelSdkResult};
use opentelemetry_sdk::metrics::data::ResourceMetrics;
use opentelemetry_sdk::metrics::reader::MetricReader;
use opentelemetry_sdk::metrics::{InstrumentKind, ManualReader, Pipeline, Temporality};

/// A pull-based metric reader for in-process consumers.
///
/// Register one with [`init_observability`](crate::init_observability) (or
/// directly on a meter provider) and call [`collect`](Self::collect) to read
/// the current counter and histogram state, e.g. from tests or an admin
/// endpoint.
#[derive(Clone, Debug)]
pub struct MetricsExporter {
    reader: Arc<ManualReader>,
}

impl Default for MetricsExporter {
    fn default() -> Self {
        let reader = ManualReader::builder().build();
        Self {
            reader: Arc::new(reader),
        }
    }
}

impl MetricsExporter {
    /// Collects a snapshot of all instruments registered so far.
    pub fn collect(&self) -> Result<ResourceMetrics, OTelSdkError> {
        let mut rm = ResourceMetrics::default();
        self.reader.collect(&mut rm)?;
        Ok(rm)
    }
}

impl MetricReader for MetricsExporter {
    fn register_pipeline(&self, pipeline: Weak<Pipeline>) {
        self.reader.register_pipeline(pipeline);
    }

    fn collect(&self, rm: &mut ResourceMetrics) -> OTelSdkResult {
        self.reader.collect(rm)
    }

    fn force_flush(&self) -> OTelSdkResult {
        self.reader.force_flush()
    }

    fn shutdown_with_timeout(&self, timeout: Duration) -> OTelSdkResult {
        self.reader.shutdown_with_timeout(timeout)
    }

    fn temporality(&self, kind: InstrumentKind) -> Temporality {
        self.reader.temporality(kind)
    }
}
