// Metrics module - Prometheus counters for cache efficiency and traffic
//
// Each `Metrics` owns its registry so several services (and tests) can live
// in one process without colliding registrations.

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

pub struct Metrics {
    registry: Registry,
    cache_hits: IntCounter,
    cache_misses: IntCounter,
    delivered_bytes: IntCounter,
    received_bytes: IntCounter,
    requests: IntCounterVec,
    transform_duration: Histogram,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let cache_hits = IntCounter::new(
            "hyperpic_cache_hits_total",
            "Image requests served from the cache",
        )?;
        let cache_misses = IntCounter::new(
            "hyperpic_cache_misses_total",
            "Image requests that fell back to the source",
        )?;
        let delivered_bytes = IntCounter::new(
            "hyperpic_image_delivered_bytes_total",
            "Bytes of image bodies sent to clients",
        )?;
        let received_bytes = IntCounter::new(
            "hyperpic_image_received_bytes_total",
            "Bytes of uploaded source images",
        )?;
        let requests = IntCounterVec::new(
            Opts::new("hyperpic_http_requests_total", "HTTP requests by method and status"),
            &["method", "status"],
        )?;
        let transform_duration = Histogram::with_opts(
            HistogramOpts::new(
                "hyperpic_transform_duration_seconds",
                "Time spent in the transform engine",
            )
            .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
        )?;

        registry.register(Box::new(cache_hits.clone()))?;
        registry.register(Box::new(cache_misses.clone()))?;
        registry.register(Box::new(delivered_bytes.clone()))?;
        registry.register(Box::new(received_bytes.clone()))?;
        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(transform_duration.clone()))?;

        Ok(Self {
            registry,
            cache_hits,
            cache_misses,
            delivered_bytes,
            received_bytes,
            requests,
            transform_duration,
        })
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.inc();
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.inc();
    }

    pub fn record_delivered(&self, bytes: usize) {
        self.delivered_bytes.inc_by(bytes as u64);
    }

    pub fn record_received(&self, bytes: usize) {
        self.received_bytes.inc_by(bytes as u64);
    }

    pub fn record_request(&self, method: &str, status: u16) {
        self.requests
            .with_label_values(&[method, &status.to_string()])
            .inc();
    }

    pub fn observe_transform(&self, seconds: f64) {
        self.transform_duration.observe(seconds);
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.get()
    }

    pub fn cache_misses(&self) -> u64 {
        self.cache_misses.get()
    }

    pub fn received_bytes(&self) -> u64 {
        self.received_bytes.get()
    }

    pub fn delivered_bytes(&self) -> u64 {
        self.delivered_bytes.get()
    }

    /// Prometheus text exposition of every metric
    pub fn export_prometheus(&self) -> String {
        let mut buffer = Vec::new();
        if let Err(e) = TextEncoder::new().encode(&self.registry.gather(), &mut buffer) {
            tracing::error!(error = %e, "Failed to encode metrics");
            return String::new();
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}
