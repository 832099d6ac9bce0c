//! The group-level pipeline driver.
//!
//! One driver owns a set of registered processors and runs test groups
//! through the ordered group-level phase sequence. Setup work (resetting
//! processor state, scanning the marker inventory, planning the schedule)
//! happens before the first phase, so configuration errors abort the run
//! before any case executes.

use crate::{
    context::{ExecutionArgs, GroupContext, LogSink},
    error::RunError,
    group::TestGroup,
    marker::MarkerInventory,
    outcome::GroupReport,
    phase::LifePhase,
    processor::{
        AfterGroupActions, BeforeGroupActions, CaseExclusion, CasePlacementValidator,
        MarkerAccessValidator, Processor, RunTestCases,
    },
    schedule::{Schedule, run_sequence},
};

/// Runs test groups through the group-level phase sequence.
///
/// A driver is reusable: every [`run`](GroupDriver::run) resets the
/// registered processors first. It is not meant to serve two concurrent
/// group runs; create one driver per worker instead.
pub struct GroupDriver {
    processors: Vec<Box<dyn Processor<GroupContext>>>,
}

impl GroupDriver {
    /// A driver with the built-in processors registered: both validators,
    /// both group hook processors, case exclusion, and the case runner.
    pub fn new() -> Self {
        Self::bare()
            .with_processor(Box::new(MarkerAccessValidator::new()))
            .with_processor(Box::new(CasePlacementValidator::new()))
            .with_processor(Box::new(BeforeGroupActions::new()))
            .with_processor(Box::new(CaseExclusion::new()))
            .with_processor(Box::new(RunTestCases::new()))
            .with_processor(Box::new(AfterGroupActions::new()))
    }

    /// A driver without any processors.
    pub fn bare() -> Self {
        Self {
            processors: Vec::new(),
        }
    }

    pub fn register(&mut self, processor: Box<dyn Processor<GroupContext>>) {
        self.processors.push(processor);
    }

    pub fn with_processor(mut self, processor: Box<dyn Processor<GroupContext>>) -> Self {
        self.register(processor);
        self
    }

    /// Execute one group and hand back the accumulated report.
    ///
    /// Fatal conditions (configuration errors, hook failures, broken
    /// contexts) surface as [`RunError`]; recoverable per-case problems only
    /// show up in the report's outcomes.
    pub fn run(
        &mut self,
        group: TestGroup,
        args: ExecutionArgs,
        log: LogSink,
    ) -> Result<GroupReport, RunError> {
        tracing::debug!(group = %group.meta.name, "starting group run");

        for processor in &mut self.processors {
            processor.reset();
        }

        let inventory = MarkerInventory::scan(
            &group.meta,
            self.processors
                .iter()
                .map(|processor| (processor.name(), processor.marker_interest())),
        )?;
        let schedule = Schedule::plan(&self.processors, LifePhase::GROUP_SEQUENCE)?;

        let mut ctx = GroupContext::new(group, args, log, inventory);
        run_sequence(
            &schedule,
            LifePhase::GROUP_SEQUENCE,
            &mut self.processors,
            &mut ctx,
        )?;

        Ok(ctx.into_report())
    }
}

impl Default for GroupDriver {
    fn default() -> Self {
        Self::new()
    }
}
