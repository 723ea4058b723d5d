//! Metrics collection.
//!
//! An explicitly constructed collector, injected where it is needed; there
//! is no process-wide registry. The collector also acts as the client's
//! telemetry sink so per-attempt records flow into the same store, and it
//! renders the Prometheus text exposition format for the HTTP sidecar.

use qolaba_mcp_client::{AttemptRecord, TelemetrySink};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Instant;

/// Histogram bucket boundaries in seconds.
const DURATION_BUCKETS: [f64; 8] = [0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0];

/// Label set, kept sorted for stable keys and rendering.
type Labels = BTreeMap<String, String>;

fn labels(pairs: &[(&str, &str)]) -> Labels {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[derive(Debug, Clone)]
struct Histogram {
    bucket_counts: [u64; DURATION_BUCKETS.len()],
    sum: f64,
    count: u64,
}

impl Histogram {
    fn new() -> Self {
        Self {
            bucket_counts: [0; DURATION_BUCKETS.len()],
            sum: 0.0,
            count: 0,
        }
    }

    fn observe(&mut self, value: f64) {
        for (index, boundary) in DURATION_BUCKETS.iter().enumerate() {
            if value <= *boundary {
                self.bucket_counts[index] += 1;
            }
        }
        self.sum += value;
        self.count += 1;
    }
}

#[derive(Debug, Default)]
struct Store {
    counters: BTreeMap<(String, Labels), u64>,
    gauges: BTreeMap<(String, Labels), f64>,
    histograms: BTreeMap<(String, Labels), Histogram>,
}

/// Collects counters, gauges and duration histograms.
#[derive(Debug)]
pub struct MetricsCollector {
    store: Mutex<Store>,
    started_at: Instant,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            store: Mutex::new(Store::default()),
            started_at: Instant::now(),
        }
    }

    /// Increment a counter.
    pub fn increment_counter(&self, name: &str, labels: Labels, by: u64) {
        if let Ok(mut store) = self.store.lock() {
            *store.counters.entry((name.to_string(), labels)).or_insert(0) += by;
        }
    }

    /// Set a gauge.
    pub fn set_gauge(&self, name: &str, labels: Labels, value: f64) {
        if let Ok(mut store) = self.store.lock() {
            store.gauges.insert((name.to_string(), labels), value);
        }
    }

    /// Observe a duration histogram sample, in seconds.
    pub fn observe_histogram(&self, name: &str, labels: Labels, value: f64) {
        if let Ok(mut store) = self.store.lock() {
            store
                .histograms
                .entry((name.to_string(), labels))
                .or_insert_with(Histogram::new)
                .observe(value);
        }
    }

    /// Record one physical API request attempt.
    pub fn record_api_request(
        &self,
        endpoint: &str,
        method: &str,
        status_code: u16,
        duration_seconds: f64,
        error_type: Option<&str>,
    ) {
        let status = status_code.to_string();
        let base = labels(&[("endpoint", endpoint), ("method", method), ("status", &status)]);
        self.increment_counter("qolaba_api_requests_total", base.clone(), 1);
        self.observe_histogram(
            "qolaba_api_request_duration_seconds",
            labels(&[("endpoint", endpoint), ("method", method)]),
            duration_seconds,
        );
        if let Some(error_type) = error_type {
            self.increment_counter(
                "qolaba_api_errors_total",
                labels(&[("endpoint", endpoint), ("error_type", error_type)]),
                1,
            );
        }
    }

    /// Record one MCP operation end to end.
    pub fn record_mcp_operation(&self, operation: &str, duration_seconds: f64, success: bool) {
        let outcome = if success { "success" } else { "error" };
        self.increment_counter(
            "qolaba_mcp_operations_total",
            labels(&[("operation", operation), ("outcome", outcome)]),
            1,
        );
        self.observe_histogram(
            "qolaba_mcp_operation_duration_seconds",
            labels(&[("operation", operation)]),
            duration_seconds,
        );
    }

    /// Record one health check run.
    pub fn record_health_check(&self, component: &str, healthy: bool) {
        let outcome = if healthy { "healthy" } else { "unhealthy" };
        self.increment_counter(
            "qolaba_health_checks_total",
            labels(&[("component", component), ("outcome", outcome)]),
            1,
        );
    }

    /// Summary for debugging endpoints.
    pub fn summary(&self) -> Value {
        let store = match self.store.lock() {
            Ok(store) => store,
            Err(_) => return Value::Null,
        };
        json!({
            "uptime_seconds": self.started_at.elapsed().as_secs_f64(),
            "counters": store.counters.len(),
            "gauges": store.gauges.len(),
            "histograms": store.histograms.len(),
        })
    }

    /// Render the Prometheus text exposition format.
    pub fn export_prometheus(&self) -> String {
        fn render_labels(labels: &Labels, extra: Option<(&str, String)>) -> String {
            let mut parts: Vec<String> = labels
                .iter()
                .map(|(k, v)| format!("{k}=\"{v}\""))
                .collect();
            if let Some((key, value)) = extra {
                parts.push(format!("{key}=\"{value}\""));
            }
            if parts.is_empty() {
                String::new()
            } else {
                format!("{{{}}}", parts.join(","))
            }
        }

        let store = match self.store.lock() {
            Ok(store) => store,
            Err(_) => return String::new(),
        };
        let mut out = String::new();

        let mut last_name = "";
        for ((name, labels), value) in &store.counters {
            if name != last_name {
                out.push_str(&format!("# TYPE {name} counter\n"));
                last_name = name;
            }
            out.push_str(&format!("{name}{} {value}\n", render_labels(labels, None)));
        }

        let mut last_name = "";
        for ((name, labels), value) in &store.gauges {
            if name != last_name {
                out.push_str(&format!("# TYPE {name} gauge\n"));
                last_name = name;
            }
            out.push_str(&format!("{name}{} {value}\n", render_labels(labels, None)));
        }

        let mut last_name = "";
        for ((name, labels), histogram) in &store.histograms {
            if name != last_name {
                out.push_str(&format!("# TYPE {name} histogram\n"));
                last_name = name;
            }
            for (index, boundary) in DURATION_BUCKETS.iter().enumerate() {
                out.push_str(&format!(
                    "{name}_bucket{} {}\n",
                    render_labels(labels, Some(("le", boundary.to_string()))),
                    histogram.bucket_counts[index]
                ));
            }
            out.push_str(&format!(
                "{name}_bucket{} {}\n",
                render_labels(labels, Some(("le", "+Inf".to_string()))),
                histogram.count
            ));
            out.push_str(&format!(
                "{name}_sum{} {}\n",
                render_labels(labels, None),
                histogram.sum
            ));
            out.push_str(&format!(
                "{name}_count{} {}\n",
                render_labels(labels, None),
                histogram.count
            ));
        }

        out
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetrySink for MetricsCollector {
    fn record_attempt(&self, record: AttemptRecord) {
        self.record_api_request(
            &record.endpoint,
            &record.method,
            record.status_code,
            record.duration_ms as f64 / 1000.0,
            record.error_type.as_deref(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_accumulates() {
        let collector = MetricsCollector::new();
        collector.increment_counter("x_total", labels(&[("a", "1")]), 1);
        collector.increment_counter("x_total", labels(&[("a", "1")]), 2);
        let rendered = collector.export_prometheus();
        assert!(rendered.contains("x_total{a=\"1\"} 3"));
    }

    #[test]
    fn test_histogram_buckets() {
        let collector = MetricsCollector::new();
        collector.observe_histogram("d_seconds", Labels::new(), 0.3);
        collector.observe_histogram("d_seconds", Labels::new(), 7.0);
        let rendered = collector.export_prometheus();
        assert!(rendered.contains("d_seconds_bucket{le=\"0.1\"} 0"));
        assert!(rendered.contains("d_seconds_bucket{le=\"0.5\"} 1"));
        assert!(rendered.contains("d_seconds_bucket{le=\"10\"} 2"));
        assert!(rendered.contains("d_seconds_bucket{le=\"+Inf\"} 2"));
        assert!(rendered.contains("d_seconds_count 2"));
    }

    #[test]
    fn test_api_request_recording() {
        let collector = MetricsCollector::new();
        collector.record_api_request("chat", "POST", 500, 0.2, Some("server_error"));
        let rendered = collector.export_prometheus();
        assert!(rendered.contains(
            "qolaba_api_requests_total{endpoint=\"chat\",method=\"POST\",status=\"500\"} 1"
        ));
        assert!(rendered
            .contains("qolaba_api_errors_total{endpoint=\"chat\",error_type=\"server_error\"} 1"));
    }

    #[test]
    fn test_telemetry_sink_bridge() {
        let collector = MetricsCollector::new();
        collector.record_attempt(AttemptRecord {
            endpoint: "models".into(),
            method: "GET".into(),
            status_code: 200,
            duration_ms: 1500,
            request_size: 0,
            response_size: 10,
            error_type: None,
        });
        let rendered = collector.export_prometheus();
        assert!(rendered.contains(
            "qolaba_api_requests_total{endpoint=\"models\",method=\"GET\",status=\"200\"} 1"
        ));
        // 1.5s lands above the 1.0 bucket.
        assert!(rendered.contains(
            "qolaba_api_request_duration_seconds_bucket{endpoint=\"models\",method=\"GET\",le=\"1\"} 0"
        ));
    }

    #[test]
    fn test_mcp_operation_recording() {
        let collector = MetricsCollector::new();
        collector.record_mcp_operation("text_to_image", 0.4, true);
        collector.record_mcp_operation("text_to_image", 0.9, false);
        let rendered = collector.export_prometheus();
        assert!(rendered.contains(
            "qolaba_mcp_operations_total{operation=\"text_to_image\",outcome=\"success\"} 1"
        ));
        assert!(rendered.contains(
            "qolaba_mcp_operations_total{operation=\"text_to_image\",outcome=\"error\"} 1"
        ));
    }
}
