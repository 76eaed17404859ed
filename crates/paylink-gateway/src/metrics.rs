use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry};
use std::sync::{LazyLock, Once};

pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// Gate outcomes: credit_reused, subscription_active, paid, payment_required
pub static GATE_OUTCOMES: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("paylink_gate_outcomes_total", "Payment gate decisions"),
        &["outcome"],
    )
    .unwrap()
});

// Facilitator failures by stage: verify, settle
pub static FACILITATOR_FAILURES: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "paylink_facilitator_failures_total",
            "Facilitator rejections and transport errors",
        ),
        &["stage"],
    )
    .unwrap()
});

pub static UNRECORDED_PAYMENTS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "paylink_unrecorded_payments_total",
        "Settled payments whose purchase could not be stored",
    )
    .unwrap()
});

// Proxy metrics
pub static PROXY_REQUESTS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "paylink_proxy_requests_total",
        "Total number of proxied requests",
    )
    .unwrap()
});

pub static PROXY_LATENCY: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        HistogramOpts::new("paylink_proxy_latency_seconds", "Proxy request latency")
            .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
    )
    .unwrap()
});

pub static FILE_DOWNLOADS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "paylink_file_downloads_total",
        "Presigned download URLs handed out",
    )
    .unwrap()
});

static REGISTER: Once = Once::new();

/// Register all metrics with the registry. Safe to call more than once.
pub fn register_metrics() {
    REGISTER.call_once(|| {
        REGISTRY.register(Box::new(GATE_OUTCOMES.clone())).unwrap();
        REGISTRY
            .register(Box::new(FACILITATOR_FAILURES.clone()))
            .unwrap();
        REGISTRY
            .register(Box::new(UNRECORDED_PAYMENTS.clone()))
            .unwrap();
        REGISTRY
            .register(Box::new(PROXY_REQUESTS_TOTAL.clone()))
            .unwrap();
        REGISTRY.register(Box::new(PROXY_LATENCY.clone())).unwrap();
        REGISTRY.register(Box::new(FILE_DOWNLOADS.clone())).unwrap();
    });
}
