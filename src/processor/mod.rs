//! The pluggable unit of behavior in the pipeline.
//!
//! Everything a phase does is supplied by processors. A processor declares
//! the life phases it participates in, what ownership it claims for each,
//! its ordering preferences relative to other processors, and the markers it
//! wants the inventory to collect. The driver resolves those declarations
//! once at setup and then iterates each phase's processors until every one
//! of them reports [`Readiness::NothingForMe`] in the same round.
//!
//! The trait is generic over its context so the same contract serves both
//! the group-level pipeline ([`GroupContext`](crate::context::GroupContext))
//! and the per-case sub-pipeline ([`CaseContext`](crate::context::CaseContext)).
//!
//! The built-in processors live in this module's submodules and cover the
//! default behavior of every group-level phase.

use crate::{
    error::RunError,
    marker::MarkerInterest,
    phase::{LifePhase, PhaseLedger, PhaseOwnership, Readiness},
};

mod hooks;
pub use hooks::*;

mod exclusion;
pub use exclusion::*;

mod run_cases;
pub use run_cases::*;

mod validate;
pub use validate::*;

/// A pluggable unit implementing behavior for one or more life phases.
///
/// Implementations embed a [`PhaseLedger`] and expose it through
/// [`ledger`](Processor::ledger)/[`ledger_mut`](Processor::ledger_mut). The
/// default [`readiness`](Processor::readiness) built on top of it reports
/// [`Readiness::Ready`] exactly once per phase, which guarantees the
/// driver's fixed-point loop terminates. Processors that override
/// `readiness` with phase-spanning state must preserve that guarantee:
/// once invoked, a processor has to eventually report `NothingForMe`.
pub trait Processor<Ctx> {
    /// A stable identifier, used for ordering preferences, the marker
    /// inventory, and error messages.
    fn name(&self) -> &'static str;

    /// The life phases this processor acts in. Evaluated once at setup.
    fn phases(&self) -> &'static [LifePhase];

    /// The ownership this processor claims for one of its phases.
    fn ownership(&self, phase: LifePhase) -> PhaseOwnership;

    /// Names of processors this one wants to run before, per shared phase.
    ///
    /// Together with [`run_after`](Processor::run_after) this forms a
    /// partial order; unmentioned processors stay unordered relative to
    /// this one.
    fn run_before(&self) -> &'static [&'static str] {
        &[]
    }

    /// Names of processors this one wants to run after, per shared phase.
    fn run_after(&self) -> &'static [&'static str] {
        &[]
    }

    /// The markers the inventory should collect for this processor.
    fn marker_interest(&self) -> MarkerInterest {
        MarkerInterest::NONE
    }

    fn ledger(&self) -> &PhaseLedger;

    fn ledger_mut(&mut self) -> &mut PhaseLedger;

    /// Whether this processor has work to do in the current round.
    ///
    /// The default is idempotent: `Ready` until the driver marks the phase
    /// called, `NothingForMe` afterwards.
    fn readiness(&self, phase: LifePhase, ctx: &Ctx) -> Readiness {
        let _ = ctx;
        match self.ledger().was_called(phase) {
            true => Readiness::NothingForMe,
            false => Readiness::Ready,
        }
    }

    /// Perform this processor's effect for the phase.
    ///
    /// On normal return the driver marks the processor as called for the
    /// phase. Errors abort the group run.
    fn process(&mut self, phase: LifePhase, ctx: &mut Ctx) -> Result<(), RunError>;

    /// Tie-break for two processors both claiming exclusive ownership of the
    /// same phase. The driver requires that exactly one of the pair answers
    /// `true`; anything else is a configuration error.
    fn outranks(&self, other: &dyn Processor<Ctx>) -> bool {
        let _ = other;
        false
    }

    /// Request a loop-back: when this returns `Some(origin)` right after the
    /// processor was invoked in `phase`, the driver re-enters `origin` once
    /// the *next* scheduled phase completes, before resuming the normal
    /// sequence. Re-entry clears this processor's ledger entry for `origin`,
    /// so the default readiness fires again there.
    fn revisit_after(&self, phase: LifePhase) -> Option<LifePhase> {
        let _ = phase;
        None
    }

    /// Make this processor reusable for a new run.
    fn reset(&mut self) {
        self.ledger_mut().reset();
    }
}
