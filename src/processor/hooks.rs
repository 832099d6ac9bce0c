//! Group-level setup and teardown hooks.
//!
//! Both processors resolve their marked method names through the marker
//! inventory and invoke the matching hook bodies registered on the group.
//! A missing body or a failing invocation affects the whole group, so it is
//! logged and escalated to a fatal [`RunError::Hook`] instead of being
//! recorded as a case failure.

use crate::{
    context::GroupContext,
    error::{HookError, RunError},
    marker::{self, Marker, MarkerInterest},
    phase::{LifePhase, PhaseLedger, PhaseOwnership},
    processor::Processor,
};

/// Runs every method marked as a before-group hook, in name order.
#[derive(Debug, Default)]
pub struct BeforeGroupActions {
    ledger: PhaseLedger,
}

/// Runs every method marked as an after-group hook, in name order.
#[derive(Debug, Default)]
pub struct AfterGroupActions {
    ledger: PhaseLedger,
}

const BEFORE_MARKERS: &[Marker] = &[marker::BEFORE_GROUP];
const AFTER_MARKERS: &[Marker] = &[marker::AFTER_GROUP];

impl BeforeGroupActions {
    pub const NAME: &'static str = "before-group-actions";

    pub fn new() -> Self {
        Self::default()
    }
}

impl AfterGroupActions {
    pub const NAME: &'static str = "after-group-actions";

    pub fn new() -> Self {
        Self::default()
    }
}

impl Processor<GroupContext> for BeforeGroupActions {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn phases(&self) -> &'static [LifePhase] {
        &[LifePhase::BeforeGroup]
    }

    fn ownership(&self, _: LifePhase) -> PhaseOwnership {
        PhaseOwnership::ManyPerPhase
    }

    fn marker_interest(&self) -> MarkerInterest {
        MarkerInterest::of(BEFORE_MARKERS)
    }

    fn ledger(&self) -> &PhaseLedger {
        &self.ledger
    }

    fn ledger_mut(&mut self) -> &mut PhaseLedger {
        &mut self.ledger
    }

    fn process(&mut self, phase: LifePhase, ctx: &mut GroupContext) -> Result<(), RunError> {
        run_marked_hooks(Self::NAME, &marker::BEFORE_GROUP, phase, ctx)
    }
}

impl Processor<GroupContext> for AfterGroupActions {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn phases(&self) -> &'static [LifePhase] {
        &[LifePhase::AfterGroup]
    }

    fn ownership(&self, _: LifePhase) -> PhaseOwnership {
        PhaseOwnership::ManyPerPhase
    }

    fn marker_interest(&self) -> MarkerInterest {
        MarkerInterest::of(AFTER_MARKERS)
    }

    fn ledger(&self) -> &PhaseLedger {
        &self.ledger
    }

    fn ledger_mut(&mut self) -> &mut PhaseLedger {
        &mut self.ledger
    }

    fn process(&mut self, phase: LifePhase, ctx: &mut GroupContext) -> Result<(), RunError> {
        run_marked_hooks(Self::NAME, &marker::AFTER_GROUP, phase, ctx)
    }
}

fn run_marked_hooks(
    processor: &'static str,
    marker: &Marker,
    phase: LifePhase,
    ctx: &mut GroupContext,
) -> Result<(), RunError> {
    // sorted and deduplicated, so hierarchy overrides run once
    let names = ctx.markers().method_names_with(processor, marker);

    for name in names {
        let outcome = match ctx.hook(&name) {
            None => Err(HookError::Missing { name: name.clone() }),
            Some(hook) => match hook.call().0 {
                Ok(()) => Ok(()),
                Err(message) => Err(HookError::Invocation {
                    name: name.clone(),
                    message,
                }),
            },
        };

        if let Err(source) = outcome {
            ctx.log().line(format_args!("something is wrong: {source}"));
            tracing::warn!(hook = %name, %phase, error = %source, "hook failed");
            return Err(RunError::Hook { phase, source });
        }
        ctx.log().line(format_args!("hook `{name}` finished"));
    }

    Ok(())
}
