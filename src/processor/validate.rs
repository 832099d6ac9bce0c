//! Marker placement validation.
//!
//! Both validators run in the validating phase, before any hook or case
//! executes, so declaration mistakes surface as configuration errors instead
//! of half-run groups. The placement validator orders itself after the
//! accessibility validator: reporting a hidden method before complaining
//! about its missing case marker gives the author the actionable error first.

use crate::{
    context::GroupContext,
    error::{ConfigError, RunError},
    marker::{NOT_TEST_CASE, TEST_CASE},
    phase::{LifePhase, PhaseLedger, PhaseOwnership},
    processor::Processor,
};

/// Rejects marker-carrying methods that are not publicly accessible.
#[derive(Debug, Default)]
pub struct MarkerAccessValidator {
    ledger: PhaseLedger,
}

impl MarkerAccessValidator {
    pub const NAME: &'static str = "marker-access";

    pub fn new() -> Self {
        Self::default()
    }
}

impl Processor<GroupContext> for MarkerAccessValidator {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn phases(&self) -> &'static [LifePhase] {
        &[LifePhase::Validating]
    }

    fn ownership(&self, _: LifePhase) -> PhaseOwnership {
        PhaseOwnership::ManyPerPhase
    }

    fn ledger(&self) -> &PhaseLedger {
        &self.ledger
    }

    fn ledger_mut(&mut self) -> &mut PhaseLedger {
        &mut self.ledger
    }

    fn process(&mut self, _: LifePhase, ctx: &mut GroupContext) -> Result<(), RunError> {
        for ty in &ctx.meta().types {
            for method in &ty.methods {
                if !method.markers.is_empty() && !method.public {
                    return Err(ConfigError::InaccessibleMarkedMethod {
                        method: format!("{}::{}", ty.name, method.name),
                        markers: method.markers.clone(),
                    }
                    .into());
                }
            }
        }
        Ok(())
    }
}

/// Requires every eligible method on a group-bearing type to carry exactly
/// one of the test-case / not-a-test-case markers.
///
/// Eligible means publicly accessible, not synthetic, not static, and not an
/// entry point. Both "neither marker" and "both markers" are configuration
/// errors naming the method.
#[derive(Debug, Default)]
pub struct CasePlacementValidator {
    ledger: PhaseLedger,
}

impl CasePlacementValidator {
    pub const NAME: &'static str = "case-placement";

    pub fn new() -> Self {
        Self::default()
    }
}

impl Processor<GroupContext> for CasePlacementValidator {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn phases(&self) -> &'static [LifePhase] {
        &[LifePhase::Validating]
    }

    fn ownership(&self, _: LifePhase) -> PhaseOwnership {
        PhaseOwnership::ManyPerPhase
    }

    fn run_after(&self) -> &'static [&'static str] {
        &[MarkerAccessValidator::NAME]
    }

    fn ledger(&self) -> &PhaseLedger {
        &self.ledger
    }

    fn ledger_mut(&mut self) -> &mut PhaseLedger {
        &mut self.ledger
    }

    fn process(&mut self, _: LifePhase, ctx: &mut GroupContext) -> Result<(), RunError> {
        for ty in ctx.meta().types.iter().filter(|ty| ty.group_bearing) {
            for method in &ty.methods {
                if !method.public || method.synthetic || method.is_static || method.entry_point {
                    continue;
                }

                let is_case = method.markers.contains(&TEST_CASE);
                let is_not_case = method.markers.contains(&NOT_TEST_CASE);
                let error = match (is_case, is_not_case) {
                    (true, true) => ConfigError::ConflictingCaseMarkers {
                        ty: ty.name.to_string(),
                        method: method.name.to_string(),
                    },
                    (false, false) => ConfigError::MissingCaseMarker {
                        ty: ty.name.to_string(),
                        method: method.name.to_string(),
                    },
                    _ => continue,
                };
                return Err(error.into());
            }
        }
        Ok(())
    }
}
