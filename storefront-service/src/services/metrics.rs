use anyhow::Context;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use prometheus::{IntCounter, IntCounterVec, Opts, Registry};
use std::sync::OnceLock;

pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
pub static PROMETHEUS_REGISTRY: OnceLock<Registry> = OnceLock::new();
pub static ORDERS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static REVENUE_CENTS_TOTAL: OnceLock<IntCounter> = OnceLock::new();
pub static GIFT_CARD_REDEMPTIONS_TOTAL: OnceLock<IntCounter> = OnceLock::new();

/// Install the Prometheus recorder for HTTP metrics and register the
/// storefront business counters.
pub fn init_metrics() -> anyhow::Result<()> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install Prometheus recorder")?;
    if METRICS_HANDLE.set(handle).is_err() {
        anyhow::bail!("metrics handle already initialized");
    }

    let registry = Registry::new();

    let orders = IntCounterVec::new(
        Opts::new("storefront_orders_total", "Orders placed, by source"),
        &["source"],
    )?;
    let revenue = IntCounter::new(
        "storefront_revenue_cents_total",
        "Order revenue in cents",
    )?;
    let redemptions = IntCounter::new(
        "storefront_gift_card_redemptions_total",
        "Successful gift card redemptions",
    )?;

    registry.register(Box::new(orders.clone()))?;
    registry.register(Box::new(revenue.clone()))?;
    registry.register(Box::new(redemptions.clone()))?;

    // Ignore repeat initialisation; the first registry wins.
    let _ = PROMETHEUS_REGISTRY.set(registry);
    let _ = ORDERS_TOTAL.set(orders);
    let _ = REVENUE_CENTS_TOTAL.set(revenue);
    let _ = GIFT_CARD_REDEMPTIONS_TOTAL.set(redemptions);

    Ok(())
}

pub fn get_metrics() -> String {
    let mut output = METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string());

    if let Some(registry) = PROMETHEUS_REGISTRY.get() {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&registry.gather(), &mut buffer).ok();
        if let Ok(custom_metrics) = String::from_utf8(buffer) {
            output.push_str(&custom_metrics);
        }
    }

    output
}

/// Count a placed order. `source` is `checkout` for orders created directly
/// and `payment` for orders created on payment confirmation.
pub fn record_order(source: &str, total_cents: i64) {
    if let Some(counter) = ORDERS_TOTAL.get() {
        counter.with_label_values(&[source]).inc();
    }
    if let Some(counter) = REVENUE_CENTS_TOTAL.get() {
        counter.inc_by(u64::try_from(total_cents).unwrap_or(0));
    }
}

pub fn record_gift_card_redemption() {
    if let Some(counter) = GIFT_CARD_REDEMPTIONS_TOTAL.get() {
        counter.inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_before_init_is_a_no_op() {
        record_order("checkout", 1234);
        record_gift_card_redemption();
        assert!(!get_metrics().is_empty());
    }
}
