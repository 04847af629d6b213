//! Prometheus metrics for the API server and worker

use prometheus::{Encoder, Gauge, Histogram, HistogramOpts, IntCounter, Registry, TextEncoder};

pub struct Metrics {
    registry: Registry,

    pub http_requests_total: IntCounter,
    pub http_request_duration_seconds: Histogram,
    pub http_requests_in_flight: Gauge,

    pub jobs_submitted_total: IntCounter,
    pub jobs_rejected_total: IntCounter,
    pub jobs_completed_total: IntCounter,
    pub jobs_failed_total: IntCounter,
    pub jobs_dropped_total: IntCounter,
    pub jobs_swept_total: IntCounter,
    pub jobs_in_flight: Gauge,
    pub job_evaluation_duration_seconds: Histogram,

    pub stock_universe_size: Gauge,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let http_requests_total =
            IntCounter::new("http_requests_total", "Total number of HTTP requests")?;
        let http_request_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "HTTP request duration in seconds",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        )?;
        let http_requests_in_flight =
            Gauge::new("http_requests_in_flight", "HTTP requests currently being served")?;

        let jobs_submitted_total =
            IntCounter::new("screener_jobs_submitted_total", "Screener jobs accepted")?;
        let jobs_rejected_total = IntCounter::new(
            "screener_jobs_rejected_total",
            "Screener submissions rejected because the user had an active job",
        )?;
        let jobs_completed_total =
            IntCounter::new("screener_jobs_completed_total", "Screener jobs completed")?;
        let jobs_failed_total =
            IntCounter::new("screener_jobs_failed_total", "Screener jobs marked failed")?;
        let jobs_dropped_total = IntCounter::new(
            "screener_jobs_dropped_total",
            "Queue payloads dropped before processing (malformed or tracker unavailable)",
        )?;
        let jobs_swept_total = IntCounter::new(
            "screener_jobs_swept_total",
            "Running jobs failed by the stale job sweeper",
        )?;
        let jobs_in_flight =
            Gauge::new("screener_jobs_in_flight", "Jobs currently being evaluated")?;
        let job_evaluation_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "screener_job_evaluation_duration_seconds",
                "Time spent evaluating rules across the stock universe",
            )
            .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 10.0]),
        )?;

        let stock_universe_size =
            Gauge::new("screener_stock_universe_size", "Stocks loaded in the worker universe")?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;
        registry.register(Box::new(http_requests_in_flight.clone()))?;
        registry.register(Box::new(jobs_submitted_total.clone()))?;
        registry.register(Box::new(jobs_rejected_total.clone()))?;
        registry.register(Box::new(jobs_completed_total.clone()))?;
        registry.register(Box::new(jobs_failed_total.clone()))?;
        registry.register(Box::new(jobs_dropped_total.clone()))?;
        registry.register(Box::new(jobs_swept_total.clone()))?;
        registry.register(Box::new(jobs_in_flight.clone()))?;
        registry.register(Box::new(job_evaluation_duration_seconds.clone()))?;
        registry.register(Box::new(stock_universe_size.clone()))?;

        Ok(Self {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            http_requests_in_flight,
            jobs_submitted_total,
            jobs_rejected_total,
            jobs_completed_total,
            jobs_failed_total,
            jobs_dropped_total,
            jobs_swept_total,
            jobs_in_flight,
            job_evaluation_duration_seconds,
            stock_universe_size,
        })
    }

    /// Render all metrics in the Prometheus text format
    pub fn export(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
