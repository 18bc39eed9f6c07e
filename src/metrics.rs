//! Observability hooks.
//!
//! With the `metrics` feature, statements executed by [`SqlStore`](crate::SqlStore)
//! are counted and timed through OpenTelemetry. With the `tracing` feature, record
//! saves and deletes run inside spans so that the cascades they trigger nest under
//! them.

#[cfg(feature = "metrics")]
use once_cell::sync::Lazy;
#[cfg(feature = "metrics")]
use opentelemetry::{
    global,
    metrics::{Counter, Histogram},
    KeyValue,
};

#[cfg(feature = "metrics")]
pub static METRICS: Lazy<LifelineMetrics> = Lazy::new(LifelineMetrics::init);

#[cfg(feature = "metrics")]
pub struct LifelineMetrics {
    pub statements_total: Counter<u64>,
    pub statement_errors_total: Counter<u64>,
    pub statement_duration: Histogram<f64>,
}

#[cfg(feature = "metrics")]
impl LifelineMetrics {
    pub fn init() -> Self {
        let meter = global::meter("lifeline");

        let statements_total = meter
            .u64_counter("lifeline_statements_total")
            .with_description("Total SQL statements executed")
            .build();

        let statement_errors_total = meter
            .u64_counter("lifeline_statement_errors_total")
            .with_description("SQL statements that returned an error")
            .build();

        let statement_duration = meter
            .f64_histogram("lifeline_statement_duration_seconds")
            .with_description("Duration of SQL statements")
            .build();

        Self {
            statements_total,
            statement_errors_total,
            statement_duration,
        }
    }

    pub fn record_statement(&self, elapsed: std::time::Duration, ok: bool) {
        let outcome = [KeyValue::new("outcome", if ok { "ok" } else { "error" })];
        self.statements_total.add(1, &outcome);
        if !ok {
            self.statement_errors_total.add(1, &[]);
        }
        self.statement_duration.record(elapsed.as_secs_f64(), &outcome);
    }
}

#[cfg(feature = "tracing")]
pub mod tracing_helpers {
    use tracing::{info_span, Span};

    /// Span around `Record::save` and the association hooks it runs
    pub fn save_span(model: &str) -> Span {
        info_span!("lifeline.save", model = %model)
    }

    /// Span around `Record::delete` and its dependent policies
    pub fn delete_span(model: &str) -> Span {
        info_span!("lifeline.delete", model = %model)
    }
}
