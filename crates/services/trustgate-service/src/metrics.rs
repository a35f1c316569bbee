use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};
use std::sync::Mutex;
use trustgate_types::{SourceHealth, TrustDecision, TrustSource};

// Registry holds every trustgate metric
static REGISTRY: Lazy<Mutex<Registry>> = Lazy::new(|| Mutex::new(Registry::new()));

static DECISIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let decisions = IntCounterVec::new(
        Opts::new(
            "trustgate_decisions_total",
            "Trust decisions returned, by kind, deciding source and outcome",
        ),
        &["kind", "source", "outcome"], // kind: "issuer" | "verifier"; outcome: "trusted" | "untrusted"
    )
    .expect("Failed to create trustgate_decisions_total metric");

    register_metric(&decisions);
    decisions
});

static SOURCE_HEALTHY: Lazy<IntGaugeVec> = Lazy::new(|| {
    let healthy = IntGaugeVec::new(
        Opts::new(
            "trustgate_source_healthy",
            "1 when the source is enabled and its last refresh succeeded",
        ),
        &["source"],
    )
    .expect("Failed to create trustgate_source_healthy metric");

    register_metric(&healthy);
    healthy
});

static SOURCE_ENTRIES: Lazy<IntGaugeVec> = Lazy::new(|| {
    let entries = IntGaugeVec::new(
        Opts::new(
            "trustgate_source_entries",
            "Providers (trust list) or reachable anchors (federation) held by the source",
        ),
        &["source"],
    )
    .expect("Failed to create trustgate_source_entries metric");

    register_metric(&entries);
    entries
});

static REFRESH_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    let failures = IntCounterVec::new(
        Opts::new(
            "trustgate_refresh_failures_total",
            "Refreshes that left a source unhealthy",
        ),
        &["source"],
    )
    .expect("Failed to create trustgate_refresh_failures_total metric");

    register_metric(&failures);
    failures
});

fn register_metric<M: prometheus::core::Collector + Clone + 'static>(metric: &M) {
    let registry = REGISTRY.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Err(e) = registry.register(Box::new(metric.clone())) {
        tracing::warn!("Failed to register metric: {}", e);
    }
}

/// Count a decision returned by `validate_issuer` / `validate_verifier`.
pub fn record_decision(kind: &str, decision: &TrustDecision) {
    let source = decision.source.map_or("none", |s| s.as_str());
    let outcome = if decision.trusted { "trusted" } else { "untrusted" };
    DECISIONS_TOTAL
        .with_label_values(&[kind, source, outcome])
        .inc();
}

/// Mirror a source's health into the gauges.
pub fn update_source_health(source: TrustSource, health: &SourceHealth) {
    let label = source.as_str();
    SOURCE_HEALTHY
        .with_label_values(&[label])
        .set(i64::from(health.enabled && health.healthy));
    SOURCE_ENTRIES
        .with_label_values(&[label])
        .set(health.entry_count as i64);
}

pub fn record_refresh_failure(source: TrustSource) {
    REFRESH_FAILURES.with_label_values(&[source.as_str()]).inc();
}

/// Get the registry of all metrics
pub fn get_registry() -> Registry {
    REGISTRY
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone()
}

/// Renders every metric in the Prometheus text exposition format.
pub fn gather_text() -> String {
    // Metrics register lazily; touch them so families show up before first use.
    Lazy::force(&DECISIONS_TOTAL);
    Lazy::force(&SOURCE_HEALTHY);
    Lazy::force(&SOURCE_ENTRIES);
    Lazy::force(&REFRESH_FAILURES);

    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    if let Err(e) = encoder.encode(&get_registry().gather(), &mut buffer) {
        tracing::warn!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
