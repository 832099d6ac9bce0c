//! Driving the surviving test cases.
//!
//! [`RunTestCases`] is the one and only driver of the per-case sub-pipeline.
//! It claims its phase exclusively and always wins arbitration. For each
//! surviving case it checks the skip predicate, then recurses into the
//! case-level phase sequence through the same schedule machinery the group
//! driver uses, and records the produced outcome keyed by case name.
//!
//! [`CaseExecution`] is the case-side counterpart: it invokes the case body
//! under `catch_unwind` so a panicking case turns into a failure outcome
//! instead of tearing down the run.

use std::{
    any::Any,
    panic::{AssertUnwindSafe, catch_unwind},
};

use crate::{
    context::{CaseContext, GroupContext},
    error::RunError,
    group::{CaseSignal, SkipStatus},
    outcome::{CaseOutcome, CaseStatus},
    phase::{LifePhase, PhaseLedger, PhaseOwnership, Readiness},
    processor::Processor,
    schedule::{Schedule, run_sequence},
};

/// The sole driver of the per-case sub-pipeline.
pub struct RunTestCases {
    ledger: PhaseLedger,
    case_processors: Vec<Box<dyn Processor<CaseContext>>>,
}

impl RunTestCases {
    pub const NAME: &'static str = "run-test-cases";

    /// A runner with the default case pipeline: just [`CaseExecution`].
    pub fn new() -> Self {
        Self {
            ledger: PhaseLedger::new(),
            case_processors: vec![Box::new(CaseExecution::new())],
        }
    }

    /// Add a processor to the case-level pipeline.
    pub fn with_case_processor(
        mut self,
        processor: Box<dyn Processor<CaseContext>>,
    ) -> Self {
        self.case_processors.push(processor);
        self
    }

    fn run_case(&mut self, schedule: &Schedule, case: &mut CaseContext) -> Result<(), RunError> {
        for processor in &mut self.case_processors {
            processor.reset();
        }
        run_sequence(
            schedule,
            LifePhase::CASE_SEQUENCE,
            &mut self.case_processors,
            case,
        )
    }
}

impl Default for RunTestCases {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RunTestCases {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunTestCases")
            .field("case_processors", &self.case_processors.len())
            .finish()
    }
}

impl Processor<GroupContext> for RunTestCases {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn phases(&self) -> &'static [LifePhase] {
        &[LifePhase::RunningCases]
    }

    fn ownership(&self, _: LifePhase) -> PhaseOwnership {
        PhaseOwnership::OnePerPhase
    }

    fn ledger(&self) -> &PhaseLedger {
        &self.ledger
    }

    fn ledger_mut(&mut self) -> &mut PhaseLedger {
        &mut self.ledger
    }

    /// Readiness depends on outstanding cases, not on the call count.
    fn readiness(&self, _: LifePhase, ctx: &GroupContext) -> Readiness {
        match ctx.has_pending_cases() {
            true => Readiness::Ready,
            false => Readiness::NothingForMe,
        }
    }

    fn process(&mut self, _: LifePhase, ctx: &mut GroupContext) -> Result<(), RunError> {
        let schedule = Schedule::plan(&self.case_processors, LifePhase::CASE_SEQUENCE)?;

        for mut case in ctx.take_cases() {
            let name = case.name().to_owned();

            if let Some(reason) = skip_reason(&case.case().meta.skip) {
                ctx.log()
                    .line(format_args!("case `{name}` skipped: {reason}"));
                ctx.record(name, CaseOutcome::failed(reason))?;
                continue;
            }

            self.run_case(&schedule, &mut case)?;

            let outcome = case
                .take_outcome()
                .ok_or_else(|| RunError::MissingCaseOutcome { name: name.clone() })?;
            if outcome.status == CaseStatus::NotApplicable {
                ctx.note_not_applicable();
            }
            ctx.record(name, outcome)?;
        }

        Ok(())
    }

    /// The case runner always wins phase-ownership arbitration.
    fn outranks(&self, _: &dyn Processor<GroupContext>) -> bool {
        true
    }
}

fn skip_reason(skip: &SkipStatus) -> Option<String> {
    match skip {
        SkipStatus::Run => None,
        SkipStatus::Skip => Some("skipped".to_owned()),
        SkipStatus::SkipWithReason(reason) => Some(format!("skipped: {reason}")),
    }
}

/// Invokes the case body and stores its outcome on the case context.
#[derive(Debug, Default)]
pub struct CaseExecution {
    ledger: PhaseLedger,
}

impl CaseExecution {
    pub const NAME: &'static str = "case-execution";

    pub fn new() -> Self {
        Self::default()
    }

    /// Convert a panic payload into a string, matching the common payload
    /// types produced by `panic!`.
    fn payload_as_string(err: Box<dyn Any + Send + 'static>) -> String {
        err.downcast::<&'static str>()
            .map(|s| s.to_string())
            .or_else(|err| err.downcast::<String>().map(|s| *s))
            .unwrap_or_else(|_| String::from("Box<dyn Any>"))
    }
}

impl Processor<CaseContext> for CaseExecution {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn phases(&self) -> &'static [LifePhase] {
        &[LifePhase::RunningCase]
    }

    fn ownership(&self, _: LifePhase) -> PhaseOwnership {
        PhaseOwnership::OnePerPhase
    }

    fn ledger(&self) -> &PhaseLedger {
        &self.ledger
    }

    fn ledger_mut(&mut self) -> &mut PhaseLedger {
        &mut self.ledger
    }

    fn process(&mut self, _: LifePhase, ctx: &mut CaseContext) -> Result<(), RunError> {
        let case = ctx.case();
        let result = catch_unwind(AssertUnwindSafe(|| case.call()));

        let outcome = match result {
            Ok(result) => match result.0 {
                Ok(()) => CaseOutcome::passed(),
                Err(CaseSignal::Failure(message)) => CaseOutcome::failed(message),
                Err(CaseSignal::NotApplicable(message)) => CaseOutcome::not_applicable(message),
            },
            Err(payload) => CaseOutcome::failed(Self::payload_as_string(payload)),
        };

        ctx.set_outcome(outcome);
        Ok(())
    }

    fn outranks(&self, _: &dyn Processor<CaseContext>) -> bool {
        true
    }
}
