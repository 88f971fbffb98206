use prometheus::{Counter, Histogram, Registry, TextEncoder};

/// Counters for one retrieval run, rendered next to the run file.
pub struct MetricsRegistry {
    pub registry: Registry,

    // Query metrics
    pub queries_total: Counter,
    pub query_errors_total: Counter,
    pub hypotheses_total: Counter,

    // Stage latency
    pub generation_duration: Histogram,
    pub search_duration: Histogram,
    pub search_hits_total: Counter,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let queries_total = Counter::new(
            "hyde_queries_total",
            "Total number of queries retrieved"
        )?;

        let query_errors_total = Counter::new(
            "hyde_query_errors_total",
            "Total number of queries aborted by an error"
        )?;

        let hypotheses_total = Counter::new(
            "hyde_hypotheses_total",
            "Total number of hypothesis documents generated"
        )?;

        // Generation duration histogram (10ms to 10 minutes); LLM latency dominates
        let generation_duration = Histogram::with_opts(
            prometheus::HistogramOpts::new(
                "hyde_generation_duration_seconds",
                "Hypothesis generation duration per query in seconds"
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 300.0, 600.0])
        )?;

        // Search duration histogram (1ms to 5 seconds)
        let search_duration = Histogram::with_opts(
            prometheus::HistogramOpts::new(
                "hyde_search_duration_seconds",
                "Vector search duration per query in seconds"
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0])
        )?;

        let search_hits_total = Counter::new(
            "hyde_search_hits_total",
            "Total number of search hits written to run files"
        )?;

        registry.register(Box::new(queries_total.clone()))?;
        registry.register(Box::new(query_errors_total.clone()))?;
        registry.register(Box::new(hypotheses_total.clone()))?;
        registry.register(Box::new(generation_duration.clone()))?;
        registry.register(Box::new(search_duration.clone()))?;
        registry.register(Box::new(search_hits_total.clone()))?;

        Ok(Self {
            registry,
            queries_total,
            query_errors_total,
            hypotheses_total,
            generation_duration,
            search_duration,
            search_hits_total,
        })
    }

    /// Prometheus text exposition format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        TextEncoder::new().encode_to_string(&self.registry.gather())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_registered_metrics() {
        let metrics = MetricsRegistry::new().unwrap();
        metrics.queries_total.inc();
        metrics.hypotheses_total.inc_by(8.0);
        metrics.search_duration.observe(0.02);

        let text = metrics.render().unwrap();
        assert!(text.contains("hyde_queries_total 1"));
        assert!(text.contains("hyde_hypotheses_total 8"));
        assert!(text.contains("hyde_search_duration_seconds_count 1"));
        assert!(text.contains("hyde_query_errors_total 0"));
    }
}
