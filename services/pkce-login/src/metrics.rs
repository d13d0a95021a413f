//! Prometheus metrics exposition
//!
//! - `pkce_logins_total` (counter)
//! - `pkce_callbacks_total` (counter): label `outcome`
//! - `pkce_logouts_total` (counter)
//! - `pkce_provider_request_duration_seconds` (histogram): label `stage`,
//!   recorded by `pkce_auth` around each provider call

use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

const PROVIDER_DURATION: &str = "pkce_provider_request_duration_seconds";

/// Buckets from 5ms up to the longest sensible provider timeout.
const PROVIDER_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 15.0, 30.0, 60.0,
];

fn builder() -> Result<PrometheusBuilder, BuildError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Full(PROVIDER_DURATION.to_string()), PROVIDER_BUCKETS)
}

/// Install the Prometheus recorder and return a handle for rendering metrics.
///
/// Provider durations render as a histogram (`_bucket` lines) rather than
/// the exporter's default summary.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    builder()?.install_recorder()
}

/// A `/login` redirect was issued.
pub fn record_login() {
    metrics::counter!("pkce_logins_total").increment(1);
}

/// A callback finished; `outcome` is `success` or the error kind.
pub fn record_callback(outcome: &'static str) {
    metrics::counter!("pkce_callbacks_total", "outcome" => outcome).increment(1);
}

pub fn record_logout() {
    metrics::counter!("pkce_logouts_total").increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::PrometheusRecorder;

    #[test]
    fn record_functions_do_not_panic_without_recorder() {
        record_login();
        record_callback("success");
        record_logout();
    }

    /// Isolated recorder/handle pair; only one global recorder can exist per
    /// process.
    fn isolated_recorder() -> (PrometheusRecorder, PrometheusHandle) {
        let recorder = builder()
            .expect("failed to set histogram buckets")
            .build_recorder();
        let handle = recorder.handle();
        (recorder, handle)
    }

    #[test]
    fn counters_render_with_outcome_label() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        record_login();
        record_login();
        record_callback("success");
        record_callback("state_mismatch");
        record_logout();

        let output = handle.render();
        assert!(output.contains("pkce_logins_total 2"), "got:\n{output}");
        assert!(output.contains("outcome=\"success\""));
        assert!(output.contains("outcome=\"state_mismatch\""));
        assert!(output.contains("pkce_logouts_total 1"));
    }

    #[test]
    fn provider_duration_renders_as_histogram() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        metrics::histogram!(PROVIDER_DURATION, "stage" => "token_exchange").record(0.042);

        let output = handle.render();
        assert!(
            output.contains("pkce_provider_request_duration_seconds_bucket"),
            "histogram must render _bucket lines, got:\n{output}"
        );
        assert!(output.contains("stage=\"token_exchange\""));
        assert!(output.contains("le=\"15\""));
        assert!(output.contains("le=\"+Inf\""));
    }
}
