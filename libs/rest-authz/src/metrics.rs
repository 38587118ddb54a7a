//! Metrics tracking for enforcement outcomes
//!
//! This module provides a trait-based approach to metrics that can be
//! implemented with various backends (Prometheus, StatsD, etc.)

/// Terminal outcomes of the enforcement pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthzOutcome {
    /// Request matched a bypass rule
    Bypassed,

    /// Request method is not enforced (HEAD, OPTIONS, ...)
    Passthrough,

    /// Decision engine allowed the request
    Allowed,

    /// Decision engine explicitly denied the request
    Denied,

    /// No action matched the request
    NotFound,

    /// More than one action matched the request
    Ambiguous,

    /// Resource or entities provider rejected the request
    InvalidRequest,

    /// Principal, engine or pipeline failure
    Failed,
}

impl AuthzOutcome {
    /// Get the metric name for this outcome
    #[must_use]
    pub fn metric_name(self) -> &'static str {
        match self {
            AuthzOutcome::Bypassed => "authz.request.bypassed",
            AuthzOutcome::Passthrough => "authz.request.passthrough",
            AuthzOutcome::Allowed => "authz.decision.allow",
            AuthzOutcome::Denied => "authz.decision.deny",
            AuthzOutcome::NotFound => "authz.route.not_found",
            AuthzOutcome::Ambiguous => "authz.route.ambiguous",
            AuthzOutcome::InvalidRequest => "authz.provider.invalid",
            AuthzOutcome::Failed => "authz.pipeline.error",
        }
    }
}

/// Which middleware produced the outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnforcementMode {
    Generic,
    Route,
}

impl EnforcementMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EnforcementMode::Generic => "generic",
            EnforcementMode::Route => "route",
        }
    }
}

/// Labels for enforcement metrics
#[derive(Debug, Clone)]
pub struct AuthzMetricLabels {
    pub mode: EnforcementMode,

    /// Lower-case request method
    pub verb: Option<String>,

    /// Resolved action id
    pub action: Option<String>,
}

impl AuthzMetricLabels {
    #[must_use]
    pub fn new(mode: EnforcementMode) -> Self {
        Self {
            mode,
            verb: None,
            action: None,
        }
    }

    #[must_use]
    pub fn with_verb(mut self, verb: impl Into<String>) -> Self {
        self.verb = Some(verb.into());
        self
    }

    #[must_use]
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }
}

/// Trait for metrics backends
pub trait AuthzMetrics: Send + Sync {
    /// Record a terminal pipeline outcome
    fn record_outcome(&self, outcome: AuthzOutcome, labels: &AuthzMetricLabels);

    /// Record how long the decision engine took
    fn record_decision_latency(&self, duration_ms: u64, labels: &AuthzMetricLabels);
}

/// No-op metrics implementation (default)
#[derive(Debug, Clone, Copy)]
pub struct NoOpMetrics;

impl AuthzMetrics for NoOpMetrics {
    fn record_outcome(&self, _outcome: AuthzOutcome, _labels: &AuthzMetricLabels) {
        // No-op
    }

    fn record_decision_latency(&self, _duration_ms: u64, _labels: &AuthzMetricLabels) {
        // No-op
    }
}

/// Logging-based metrics implementation (for debugging)
#[derive(Debug, Clone, Copy)]
pub struct LoggingMetrics;

impl AuthzMetrics for LoggingMetrics {
    fn record_outcome(&self, outcome: AuthzOutcome, labels: &AuthzMetricLabels) {
        tracing::debug!(
            metric = outcome.metric_name(),
            mode = labels.mode.as_str(),
            verb = ?labels.verb,
            action = ?labels.action,
            "Authz outcome recorded"
        );
    }

    fn record_decision_latency(&self, duration_ms: u64, labels: &AuthzMetricLabels) {
        tracing::debug!(
            metric = "authz.decision.duration_ms",
            duration_ms = duration_ms,
            mode = labels.mode.as_str(),
            action = ?labels.action,
            "Decision latency recorded"
        );
    }
}
