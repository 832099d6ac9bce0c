//! Life phases and per-phase bookkeeping.
//!
//! A group run walks an ordered sequence of life phases, and every processor
//! declares which phases it wants to act in. Phases come in two families:
//! group-level phases driven directly by the [`GroupDriver`](crate::GroupDriver),
//! and case-level phases driven per surviving test case by the running phase.
//!
//! Both families live in one closed enum so that per-phase state (like the
//! [`PhaseLedger`]) can be a fixed-size array instead of a map.

use std::{borrow::Cow, fmt};

/// A named stage in the execution of a test group or a single test case.
///
/// The group-level sequence is [`LifePhase::GROUP_SEQUENCE`], the case-level
/// sequence is [`LifePhase::CASE_SEQUENCE`]. The declaration order of the
/// variants is the execution order within each family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifePhase {
    /// Marker placement checks, before anything runs.
    Validating,
    /// Group-wide setup hooks.
    BeforeGroup,
    /// Test cases may be removed from the run here.
    CaseRemoving,
    /// The per-case sub-pipelines execute here.
    RunningCases,
    /// Group-wide teardown hooks.
    AfterGroup,
    /// Case-level setup.
    BeforeCase,
    /// The case body executes here.
    RunningCase,
    /// Case-level teardown.
    AfterCase,
}

impl LifePhase {
    /// Number of distinct life phases across both families.
    pub const COUNT: usize = 8;

    /// The ordered group-level phase sequence.
    pub const GROUP_SEQUENCE: &'static [LifePhase] = &[
        LifePhase::Validating,
        LifePhase::BeforeGroup,
        LifePhase::CaseRemoving,
        LifePhase::RunningCases,
        LifePhase::AfterGroup,
    ];

    /// The ordered case-level phase sequence.
    pub const CASE_SEQUENCE: &'static [LifePhase] = &[
        LifePhase::BeforeCase,
        LifePhase::RunningCase,
        LifePhase::AfterCase,
    ];

    /// Stable index of this phase, usable as an array key.
    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn is_group_level(self) -> bool {
        matches!(
            self,
            LifePhase::Validating
                | LifePhase::BeforeGroup
                | LifePhase::CaseRemoving
                | LifePhase::RunningCases
                | LifePhase::AfterGroup
        )
    }

    pub const fn is_case_level(self) -> bool {
        !self.is_group_level()
    }
}

impl fmt::Display for LifePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifePhase::Validating => "validating",
            LifePhase::BeforeGroup => "before-group",
            LifePhase::CaseRemoving => "case-removing",
            LifePhase::RunningCases => "running-cases",
            LifePhase::AfterGroup => "after-group",
            LifePhase::BeforeCase => "before-case",
            LifePhase::RunningCase => "running-case",
            LifePhase::AfterCase => "after-case",
        };
        f.write_str(name)
    }
}

/// How many processors may act for a single phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseOwnership {
    /// Exactly one processor may act; conflicts are resolved through
    /// [`Processor::outranks`](crate::Processor::outranks).
    OnePerPhase,
    /// Any number of processors may act, ordered only by their declared
    /// before/after preferences.
    ManyPerPhase,
}

/// A processor's self-reported state for one round of a phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// The processor has work to do right now.
    Ready,
    /// The processor is done for this round of the phase.
    NothingForMe,
    /// The context is inconsistent; the whole run aborts.
    Broken(Cow<'static, str>),
}

/// Tracks per phase whether a processor was already invoked.
///
/// This backs the default readiness behavior: a processor is `Ready` the
/// first time a phase asks, and reports `NothingForMe` on every later round
/// of that phase. The driver marks entries after each successful
/// [`process`](crate::Processor::process) call.
#[derive(Debug, Default, Clone)]
pub struct PhaseLedger {
    called: [bool; LifePhase::COUNT],
}

impl PhaseLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn was_called(&self, phase: LifePhase) -> bool {
        self.called[phase.index()]
    }

    pub fn mark_called(&mut self, phase: LifePhase) {
        self.called[phase.index()] = true;
    }

    /// Forget a single phase, making the default readiness fire again.
    ///
    /// Used by the driver when a loop-back re-enters a phase.
    pub fn clear(&mut self, phase: LifePhase) {
        self.called[phase.index()] = false;
    }

    /// Forget everything, making the processor reusable for a new run.
    pub fn reset(&mut self) {
        self.called = [false; LifePhase::COUNT];
    }
}
