use std::{
    collections::HashMap,
    fmt::Write as _,
    hash::Hash,
    sync::Mutex,
};

use super::core::{MetricsState, METRICS_STATE};

pub(crate) fn metrics_state() -> &'static MetricsState {
    METRICS_STATE.get_or_init(MetricsState::default)
}

fn snapshot<K: Clone + Eq + Hash>(counters: &Mutex<HashMap<K, u64>>) -> HashMap<K, u64> {
    counters
        .lock()
        .map_or_else(|_| HashMap::new(), |guard| guard.clone())
}

fn write_header(output: &mut String, name: &str, help: &str) {
    let _ = writeln!(output, "# HELP {name} {help}");
    let _ = writeln!(output, "# TYPE {name} counter");
}

pub(crate) fn render_metrics() -> String {
    let state = metrics_state();
    let mut output = String::new();

    write_header(
        &mut output,
        "agora_auth_failures_total",
        "Count of auth-related failures by reason",
    );
    let mut auth_entries: Vec<_> = snapshot(&state.auth_failures).into_iter().collect();
    auth_entries.sort_by_key(|(reason, _)| *reason);
    for (reason, value) in auth_entries {
        let _ = writeln!(
            output,
            "agora_auth_failures_total{{reason=\"{reason}\"}} {value}"
        );
    }

    write_header(
        &mut output,
        "agora_rate_limit_hits_total",
        "Count of rate-limited requests by surface and reason",
    );
    let mut rate_entries: Vec<_> = snapshot(&state.rate_limit_hits).into_iter().collect();
    rate_entries.sort_by_key(|(labels, _)| *labels);
    for ((surface, reason), value) in rate_entries {
        let _ = writeln!(
            output,
            "agora_rate_limit_hits_total{{surface=\"{surface}\",reason=\"{reason}\"}} {value}"
        );
    }

    write_header(
        &mut output,
        "agora_operation_outcomes_total",
        "Count of service operation results by event and outcome",
    );
    let mut outcome_entries: Vec<_> = snapshot(&state.operation_outcomes).into_iter().collect();
    outcome_entries.sort_by_key(|(labels, _)| *labels);
    for ((event, outcome), value) in outcome_entries {
        let _ = writeln!(
            output,
            "agora_operation_outcomes_total{{event=\"{event}\",outcome=\"{outcome}\"}} {value}"
        );
    }

    output
}

pub(crate) fn record_auth_failure(reason: &'static str) {
    if let Ok(mut counters) = metrics_state().auth_failures.lock() {
        *counters.entry(reason).or_insert(0) += 1;
    }
}

pub(crate) fn record_rate_limit_hit(surface: &'static str, reason: &'static str) {
    if let Ok(mut counters) = metrics_state().rate_limit_hits.lock() {
        *counters.entry((surface, reason)).or_insert(0) += 1;
    }
}

pub(crate) fn record_operation_outcome(event: &'static str, outcome: &'static str) {
    if let Ok(mut counters) = metrics_state().operation_outcomes.lock() {
        *counters.entry((event, outcome)).or_insert(0) += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::{record_auth_failure, record_operation_outcome, record_rate_limit_hit, render_metrics};

    #[test]
    fn rendered_counters_include_labels() {
        record_auth_failure("metrics_test_reason");
        record_rate_limit_hit("metrics_test_surface", "burst");
        record_operation_outcome("metrics.test", "ok");

        let rendered = render_metrics();
        assert!(rendered.contains("# TYPE agora_auth_failures_total counter"));
        assert!(rendered.contains("agora_auth_failures_total{reason=\"metrics_test_reason\"}"));
        assert!(rendered.contains(
            "agora_rate_limit_hits_total{surface=\"metrics_test_surface\",reason=\"burst\"}"
        ));
        assert!(rendered
            .contains("agora_operation_outcomes_total{event=\"metrics.test\",outcome=\"ok\"}"));
    }
}
