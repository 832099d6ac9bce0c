//! The error taxonomy of the pipeline.
//!
//! Configuration errors describe broken declarations and are detected as
//! early as possible, during the inventory scan or schedule planning.
//! Hook errors affect the whole group and are escalated to a fatal
//! [`RunError`]; they are never recorded as a single case failure.
//! Recoverable per-case conditions (skips, not-applicable signals) are not
//! errors at all and surface only in that case's [`CaseOutcome`](crate::outcome::CaseOutcome).

use std::borrow::Cow;

use thiserror::Error;

use crate::{
    marker::{Element, Marker},
    phase::LifePhase,
};

/// A broken declaration or processor configuration. Fatal for the group run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A mutually-exclusive interest set found more than one of its markers
    /// on a single element.
    #[error(
        "element `{element}` carries mutually exclusive markers {} declared by processor `{processor}`",
        fmt_markers(markers)
    )]
    ExclusiveMarkers {
        processor: &'static str,
        element: Element,
        markers: Vec<Marker>,
    },

    /// Two processors both claim exclusive ownership of a phase and the
    /// pairwise priority check did not single one out.
    #[error("processors `{left}` and `{right}` cannot agree on ownership of phase {phase}")]
    AmbiguousOwnership {
        phase: LifePhase,
        left: &'static str,
        right: &'static str,
    },

    /// A phase is claimed exclusively while shared processors are also bound
    /// to it.
    #[error(
        "phase {phase} is claimed exclusively by `{exclusive}` but `{shared}` is also bound to it"
    )]
    MixedOwnership {
        phase: LifePhase,
        exclusive: &'static str,
        shared: &'static str,
    },

    /// The before/after preferences of the processors bound to a phase form
    /// a cycle.
    #[error("ordering constraints between {} form a cycle in phase {phase}", members.join(", "))]
    OrderingCycle {
        phase: LifePhase,
        members: Vec<&'static str>,
    },

    /// A marker-carrying method is not publicly accessible.
    #[error("method `{method}` carries {} but is not publicly accessible", fmt_markers(markers))]
    InaccessibleMarkedMethod {
        method: String,
        markers: Vec<Marker>,
    },

    /// A method on a group-bearing type carries neither the test-case nor
    /// the not-a-test-case marker.
    #[error(
        "method `{method}` on group-bearing type `{ty}` must carry either the test-case \
         or the not-a-test-case marker, found neither"
    )]
    MissingCaseMarker { ty: String, method: String },

    /// A method on a group-bearing type carries both case markers at once.
    #[error(
        "method `{method}` on group-bearing type `{ty}` carries both the test-case \
         and the not-a-test-case marker"
    )]
    ConflictingCaseMarkers { ty: String, method: String },

    /// An exclusion entry in the execution arguments did not parse.
    #[error("invalid exclusion entry `{entry}`: {reason}")]
    InvalidExclusion { entry: String, reason: String },
}

fn fmt_markers(markers: &[Marker]) -> String {
    let names: Vec<&str> = markers.iter().map(Marker::name).collect();
    format!("[{}]", names.join(", "))
}

/// A group-level hook could not be located or failed while running.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HookError {
    /// A method carries a hook marker but no hook body of that name is
    /// registered on the group.
    #[error("no hook body registered for marked method `{name}`")]
    Missing { name: String },

    /// The hook body ran and reported an error.
    #[error("hook `{name}` failed: {message}")]
    Invocation { name: String, message: String },
}

/// A fatal, run-aborting condition. Distinct from ordinary test failures,
/// which live in per-case outcomes.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A before/after-group hook problem; the whole group stops.
    #[error("hook failure during {phase}: {source}")]
    Hook {
        phase: LifePhase,
        source: HookError,
    },

    /// A processor found the context in an inconsistent state.
    #[error("processor `{processor}` reported a broken context in {phase}: {message}")]
    Broken {
        processor: &'static str,
        phase: LifePhase,
        message: Cow<'static, str>,
    },

    /// Two outcomes were recorded under the same case name. Indicates a
    /// processor implementation bug.
    #[error("duplicate outcome recorded for case `{name}`")]
    DuplicateResult { name: String },

    /// A case went through its sub-pipeline without any processor recording
    /// an outcome. Indicates a broken case-pipeline configuration.
    #[error("case `{name}` finished its pipeline without an outcome")]
    MissingCaseOutcome { name: String },
}
