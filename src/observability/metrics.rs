use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub offers_created_total: IntCounter,
    pub offers_open: IntGauge,
    pub accepts_total: IntCounterVec,
    pub code_verifications_total: IntCounterVec,
    pub zone_sessions: IntGauge,
    pub offer_time_to_accept_seconds: Histogram,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let offers_created_total =
            IntCounter::new("offers_created_total", "Delivery offers opened")
                .expect("valid offers_created_total metric");

        let offers_open = IntGauge::new("offers_open", "Offers not yet in a terminal state")
            .expect("valid offers_open metric");

        let accepts_total = IntCounterVec::new(
            Opts::new("accepts_total", "Acceptance attempts by outcome"),
            &["outcome"],
        )
        .expect("valid accepts_total metric");

        let code_verifications_total = IntCounterVec::new(
            Opts::new(
                "code_verifications_total",
                "Handoff code verifications by phase and outcome",
            ),
            &["phase", "outcome"],
        )
        .expect("valid code_verifications_total metric");

        let zone_sessions = IntGauge::new("zone_sessions", "Connected rider zone sessions")
            .expect("valid zone_sessions metric");

        let offer_time_to_accept_seconds = Histogram::with_opts(HistogramOpts::new(
            "offer_time_to_accept_seconds",
            "Seconds from offer creation to acceptance",
        ))
        .expect("valid offer_time_to_accept_seconds metric");

        registry
            .register(Box::new(offers_created_total.clone()))
            .expect("register offers_created_total");
        registry
            .register(Box::new(offers_open.clone()))
            .expect("register offers_open");
        registry
            .register(Box::new(accepts_total.clone()))
            .expect("register accepts_total");
        registry
            .register(Box::new(code_verifications_total.clone()))
            .expect("register code_verifications_total");
        registry
            .register(Box::new(zone_sessions.clone()))
            .expect("register zone_sessions");
        registry
            .register(Box::new(offer_time_to_accept_seconds.clone()))
            .expect("register offer_time_to_accept_seconds");

        Self {
            registry,
            offers_created_total,
            offers_open,
            accepts_total,
            code_verifications_total,
            zone_sessions,
            offer_time_to_accept_seconds,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
