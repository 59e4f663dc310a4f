//! Prometheus counters for the posting and moderation engine.

use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::registry::Registry;

use domains::{CooldownKind, DomainError};

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct KindLabels {
    kind: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct RejectionLabels {
    kind: String,
    reason: String,
}

pub struct CoreMetrics {
    registry: Registry,
    created: Family<KindLabels, Counter>,
    rejected: Family<RejectionLabels, Counter>,
    pruned_threads: Counter,
    swept_entries: Counter,
}

impl Default for CoreMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl CoreMetrics {
    pub fn new() -> Self {
        let mut registry = Registry::with_prefix("comfyboard");
        let created = Family::<KindLabels, Counter>::default();
        let rejected = Family::<RejectionLabels, Counter>::default();
        let pruned_threads = Counter::default();
        let swept_entries = Counter::default();

        registry.register("content_created", "Threads and posts committed", created.clone());
        registry.register(
            "content_rejected",
            "Content creation attempts refused before commit",
            rejected.clone(),
        );
        registry.register(
            "threads_pruned",
            "Threads evicted by board capacity pressure",
            pruned_threads.clone(),
        );
        registry.register(
            "ephemeral_entries_swept",
            "Cooldown and session entries purged by the sweeper",
            swept_entries.clone(),
        );

        Self { registry, created, rejected, pruned_threads, swept_entries }
    }

    pub fn record_created(&self, kind: CooldownKind) {
        self.created.get_or_create(&KindLabels { kind: kind.as_str().to_string() }).inc();
    }

    pub fn record_rejected(&self, kind: CooldownKind, err: &DomainError) {
        let reason = match err {
            DomainError::NotFound { .. } => "not_found",
            DomainError::Validation(_) => "validation",
            DomainError::RateLimited { .. } => "cooldown",
            DomainError::Forbidden(_) => "forbidden",
            DomainError::Unauthorized(_) => "unauthorized",
            DomainError::Storage(_) | DomainError::Cleanup { .. } => "internal",
        };
        self.rejected
            .get_or_create(&RejectionLabels {
                kind: kind.as_str().to_string(),
                reason: reason.to_string(),
            })
            .inc();
    }

    pub fn record_pruned(&self, count: usize) {
        self.pruned_threads.inc_by(count as u64);
    }

    pub fn record_swept(&self, count: usize) {
        self.swept_entries.inc_by(count as u64);
    }

    /// Text exposition format.
    pub fn encode(&self) -> Result<String, std::fmt::Error> {
        let mut buffer = String::new();
        encode(&mut buffer, &self.registry)?;
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;

    use super::*;

    #[test]
    fn counters_show_up_in_exposition() {
        let metrics = CoreMetrics::new();
        metrics.record_created(CooldownKind::Thread);
        metrics.record_created(CooldownKind::Post);
        metrics.record_created(CooldownKind::Post);
        metrics.record_rejected(
            CooldownKind::Post,
            &DomainError::RateLimited { remaining: TimeDelta::seconds(3) },
        );
        metrics.record_pruned(2);

        let text = metrics.encode().unwrap();
        assert!(text.contains(r#"comfyboard_content_created_total{kind="post"} 2"#));
        assert!(text.contains(r#"comfyboard_content_created_total{kind="thread"} 1"#));
        assert!(text.contains(r#"comfyboard_content_rejected_total{kind="post",reason="cooldown"} 1"#));
        assert!(text.contains("comfyboard_threads_pruned_total 2"));
    }
}
