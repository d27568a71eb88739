//! Violation classification.
//!
//! Pure: the same call site and policy always produce the same violation.

use crate::models::{CallSite, OperationKind, Severity, Violation, ViolationKind};

/// Classification policy. By default every unscoped call is critical.
#[derive(Debug, Clone, Default)]
pub struct Policy {
    /// Operation kinds downgraded to warnings.
    pub warn_on: Vec<OperationKind>,
}

/// Turn an unscoped call site into exactly one violation.
pub fn classify(call: CallSite, policy: &Policy) -> Violation {
    let kind = if call.is_raw() {
        ViolationKind::UnscopedRawQuery
    } else {
        ViolationKind::MissingScopeKey
    };
    let severity = if policy.warn_on.contains(&call.operation_kind) {
        Severity::Warning
    } else {
        Severity::Critical
    };
    let message = match kind {
        ViolationKind::MissingScopeKey => format!(
            "{}.{} has no tenant scope key in reach",
            call.entity_name, call.method
        ),
        ViolationKind::UnscopedRawQuery => format!(
            "raw query {} on '{}' has no tenant scope key in reach",
            call.method, call.entity_name
        ),
    };
    Violation {
        kind,
        severity,
        call_site: call,
        message,
    }
}
