// Which handshake a connection ended up running.

use std::fmt;

use crate::noise::{Pattern, IK, XX};

/// The handshake variant an executor is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternKind {
    /// Three-message mutual authentication.
    Xx,
    /// Two-message handshake against a known responder static key.
    Ik,
    /// XX resumed from a failed IK attempt.
    XxFallback,
}

impl PatternKind {
    /// Human-readable label (used in errors, logs and metrics).
    pub fn label(&self) -> &'static str {
        match self {
            PatternKind::Xx => "XX",
            PatternKind::Ik => "IK",
            PatternKind::XxFallback => "XXfallback",
        }
    }

    /// The token pattern driven by this variant. XX-fallback runs plain XX
    /// with a replayed first message.
    pub fn pattern(&self) -> &'static Pattern {
        match self {
            PatternKind::Xx | PatternKind::XxFallback => &XX,
            PatternKind::Ik => &IK,
        }
    }
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
