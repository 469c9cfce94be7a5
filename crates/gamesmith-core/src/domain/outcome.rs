//! Check verdicts and the repair strategy they select.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The three checks, in the order the orchestrator runs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    Syntax,
    Logic,
    Dynamic,
}

impl CheckKind {
    /// Verdict kind produced when this check fails.
    pub fn failure(&self) -> OutcomeKind {
        match self {
            CheckKind::Syntax => OutcomeKind::SyntaxFail,
            CheckKind::Logic => OutcomeKind::LogicFail,
            CheckKind::Dynamic => OutcomeKind::RuntimeFail,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CheckKind::Syntax => "syntax",
            CheckKind::Logic => "logic",
            CheckKind::Dynamic => "runtime (fuzz)",
        }
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Pass,
    SyntaxFail,
    LogicFail,
    RuntimeFail,
}

/// Result of exactly one check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub kind: OutcomeKind,
    pub detail: String,
}

impl ValidationOutcome {
    pub fn pass(detail: impl Into<String>) -> Self {
        Self {
            kind: OutcomeKind::Pass,
            detail: detail.into(),
        }
    }

    pub fn syntax_fail(detail: impl Into<String>) -> Self {
        Self {
            kind: OutcomeKind::SyntaxFail,
            detail: detail.into(),
        }
    }

    pub fn logic_fail(detail: impl Into<String>) -> Self {
        Self {
            kind: OutcomeKind::LogicFail,
            detail: detail.into(),
        }
    }

    pub fn runtime_fail(detail: impl Into<String>) -> Self {
        Self {
            kind: OutcomeKind::RuntimeFail,
            detail: detail.into(),
        }
    }

    pub fn is_pass(&self) -> bool {
        self.kind == OutcomeKind::Pass
    }

    /// Repair strategy for a failing outcome; `None` on pass.
    pub fn repair_strategy(&self) -> Option<RepairStrategy> {
        match self.kind {
            OutcomeKind::Pass => None,
            OutcomeKind::SyntaxFail => Some(RepairStrategy::Syntax),
            OutcomeKind::LogicFail | OutcomeKind::RuntimeFail => Some(RepairStrategy::Logic),
        }
    }
}

/// Which fix prompt to use.
///
/// Syntax repair only needs the code and the parser message; behavioural repair
/// also needs the design document to recover the original intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairStrategy {
    Syntax,
    Logic,
}

impl RepairStrategy {
    pub fn needs_design(&self) -> bool {
        matches!(self, RepairStrategy::Logic)
    }
}

impl fmt::Display for RepairStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepairStrategy::Syntax => f.write_str("syntax"),
            RepairStrategy::Logic => f.write_str("logic"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_selection_by_failure_kind() {
        assert_eq!(ValidationOutcome::pass("ok").repair_strategy(), None);
        assert_eq!(
            ValidationOutcome::syntax_fail("e").repair_strategy(),
            Some(RepairStrategy::Syntax)
        );
        assert_eq!(
            ValidationOutcome::logic_fail("e").repair_strategy(),
            Some(RepairStrategy::Logic)
        );
        assert_eq!(
            ValidationOutcome::runtime_fail("e").repair_strategy(),
            Some(RepairStrategy::Logic)
        );
    }

    #[test]
    fn test_check_failure_kinds() {
        assert_eq!(CheckKind::Syntax.failure(), OutcomeKind::SyntaxFail);
        assert_eq!(CheckKind::Logic.failure(), OutcomeKind::LogicFail);
        assert_eq!(CheckKind::Dynamic.failure(), OutcomeKind::RuntimeFail);
    }

    #[test]
    fn test_only_logic_repair_needs_design() {
        assert!(!RepairStrategy::Syntax.needs_design());
        assert!(RepairStrategy::Logic.needs_design());
    }
}
