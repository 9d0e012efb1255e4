//! Metrics and tracing helpers.
//!
//! With the `metrics` feature, [`METRICS`] records query counts, errors and
//! durations plus connection wait times through OpenTelemetry and exposes them
//! in Prometheus text format. With the `tracing` feature,
//! [`tracing_helpers`] builds the spans entered around statements, connection
//! acquisition and store operations.

#[cfg(feature = "metrics")]
pub use prometheus_metrics::{DocDbMetrics, METRICS};

#[cfg(feature = "metrics")]
mod prometheus_metrics {
    use once_cell::sync::Lazy;
    use opentelemetry::metrics::{Counter, Histogram, MeterProvider};
    use opentelemetry_sdk::metrics::SdkMeterProvider;
    use prometheus::{Encoder, Registry, TextEncoder};
    use std::time::Duration;

    pub static METRICS: Lazy<DocDbMetrics> = Lazy::new(DocDbMetrics::init);

    pub struct DocDbMetrics {
        registry: Registry,
        _provider: SdkMeterProvider,
        pub queries_total: Counter<u64>,
        pub query_errors_total: Counter<u64>,
        pub query_duration: Histogram<f64>,
        pub connection_wait_duration: Histogram<f64>,
        pub documents_saved_total: Counter<u64>,
    }

    impl DocDbMetrics {
        pub fn init() -> Self {
            let registry = Registry::new();
            let provider = match opentelemetry_prometheus::exporter().with_registry(registry.clone()).build() {
                Ok(exporter) => SdkMeterProvider::builder().with_reader(exporter).build(),
                Err(e) => {
                    log::warn!("Prometheus exporter unavailable, metrics will not be exported: {e}");
                    SdkMeterProvider::builder().build()
                }
            };
            let meter = provider.meter("docdb");

            let queries_total = meter
                .u64_counter("docdb_queries_total")
                .with_description("Total statements executed")
                .build();

            let query_errors_total = meter
                .u64_counter("docdb_query_errors_total")
                .with_description("Statements that failed")
                .build();

            let query_duration = meter
                .f64_histogram("docdb_query_duration_seconds")
                .with_description("Duration of statements")
                .build();

            let connection_wait_duration = meter
                .f64_histogram("docdb_connection_wait_seconds")
                .with_description("Time spent waiting for a pooled connection")
                .build();

            let documents_saved_total = meter
                .u64_counter("docdb_documents_saved_total")
                .with_description("Documents inserted")
                .build();

            Self {
                registry,
                _provider: provider,
                queries_total,
                query_errors_total,
                query_duration,
                connection_wait_duration,
                documents_saved_total,
            }
        }

        pub fn record_query_duration(&self, elapsed: Duration) {
            self.queries_total.add(1, &[]);
            self.query_duration.record(elapsed.as_secs_f64(), &[]);
        }

        pub fn record_query_error(&self) {
            self.query_errors_total.add(1, &[]);
        }

        pub fn record_connection_wait(&self, waited: Duration) {
            self.connection_wait_duration.record(waited.as_secs_f64(), &[]);
        }

        pub fn record_document_saved(&self) {
            self.documents_saved_total.add(1, &[]);
        }

        /// Render every collected metric in Prometheus text format
        pub fn gather(&self) -> String {
            let mut buf = Vec::new();
            if let Err(e) = TextEncoder::new().encode(&self.registry.gather(), &mut buf) {
                log::warn!("Failed to encode metrics: {e}");
            }
            String::from_utf8_lossy(&buf).into_owned()
        }
    }
}

#[cfg(feature = "tracing")]
pub mod tracing_helpers {
    use tracing::Span;

    pub fn execute_query_span(query: &str) -> Span {
        tracing::info_span!("docdb.execute_query", sql = %query)
    }

    pub fn acquire_connection_span() -> Span {
        tracing::info_span!("docdb.acquire_connection")
    }

    /// Span around one store operation on a document type
    pub fn document_span(operation: &'static str, document: &'static str) -> Span {
        tracing::info_span!("docdb.document", operation, document)
    }
}
