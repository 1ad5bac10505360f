//! Confirmation gate.
//!
//! Pure decision logic: whether a generated command runs straight away, needs
//! an operator answer first, or is only displayed. The threshold is
//! `oa_protocol::CONFIRMATION_THRESHOLD` and is not configurable.

use oa_protocol::SafetyLevel;

/// What the session does with a generated command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Run without asking.
    Execute,
    /// Ask the operator and act on the answer.
    Prompt,
    /// Do not run.
    Abort,
    /// Show the command, never run it.
    DryRunOnly,
}

/// Operator answer at the confirmation prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    Yes,
    Revise,
    No,
}

impl Answer {
    /// The decision this answer turns a `Prompt` into. `Revise` is handled
    /// by the caller, which collects a replacement command first.
    pub fn decision(self) -> Decision {
        match self {
            Answer::Yes => Decision::Execute,
            Answer::Revise | Answer::No => Decision::Abort,
        }
    }
}

/// Decide how to treat a command of the given safety level.
pub fn decide(level: SafetyLevel, auto_confirm: bool, dry_run: bool) -> Decision {
    if dry_run {
        Decision::DryRunOnly
    } else if level.requires_confirmation() && !auto_confirm {
        Decision::Prompt
    } else {
        Decision::Execute
    }
}

/// Interpret one line typed at the confirmation prompt.
///
/// Only `y` (any case) confirms and only `r` revises; everything else,
/// including an empty line, declines.
pub fn resolve_answer(answer: &str) -> Answer {
    match answer.trim().to_ascii_lowercase().as_str() {
        "y" => Answer::Yes,
        "r" => Answer::Revise,
        _ => Answer::No,
    }
}
