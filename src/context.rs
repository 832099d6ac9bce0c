//! Run-state shared by processors during one group execution.
//!
//! A [`GroupContext`] is created once per group run and destroyed when the
//! run completes. It owns the group's declarations, its hooks, the ordered
//! case contexts (mutable during the removal phase), the accumulated results,
//! and the log sink. A [`CaseContext`] is created per surviving case and is
//! consumed by the running phase when it drives the case-level sub-pipeline.
//!
//! The marker inventory is populated once, before any phase executes, and
//! only shared references to it are handed out afterwards.

use std::{
    fmt::{self, Debug},
    io::{self, Write},
    sync::{Arc, Mutex},
};

use crate::{
    error::RunError,
    group::{GroupMeta, Hook, TestCase, TestGroup},
    marker::MarkerInventory,
    outcome::{CaseOutcome, GroupReport},
    phase::LifePhase,
};

/// A cheap-to-clone, write-only log handle supplied by the caller.
#[derive(Clone)]
pub struct LogSink(Arc<Mutex<dyn Write + Send>>);

impl LogSink {
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self(Arc::new(Mutex::new(writer)))
    }

    /// A sink that discards everything.
    pub fn discard() -> Self {
        Self::new(io::sink())
    }

    /// Write one line. Log output is best effort; write errors are dropped.
    pub fn line(&self, message: impl fmt::Display) {
        if let Ok(mut writer) = self.0.lock() {
            let _ = writeln!(writer, "{message}");
        }
    }
}

impl Debug for LogSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LogSink(..)")
    }
}

/// Execution arguments handed in by the (out-of-scope) caller.
#[derive(Debug, Clone, Default)]
#[non_exhaustive]
pub struct ExecutionArgs {
    /// Raw exclusion entries, parsed by the exclusion processor. See
    /// [`ExclusionSpec`](crate::ExclusionSpec) for the entry format.
    pub exclusions: Vec<String>,
}

impl ExecutionArgs {
    pub fn with_exclusions<I, S>(exclusions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            exclusions: exclusions.into_iter().map(Into::into).collect(),
        }
    }
}

/// A context that tracks which life phase it is currently in.
///
/// The schedule machinery is generic over this, so the group pipeline and
/// the per-case sub-pipeline run through the same code.
pub trait PhaseContext {
    fn enter_phase(&mut self, phase: LifePhase) {
        let _ = phase;
    }
}

/// Mutable run-state for one group execution.
#[derive(Debug)]
pub struct GroupContext {
    meta: Arc<GroupMeta>,
    hooks: Vec<Hook>,
    cases: Vec<CaseContext>,
    results: ResultSet,
    not_applicable: usize,
    args: ExecutionArgs,
    log: LogSink,
    markers: Arc<MarkerInventory>,
}

impl GroupContext {
    pub fn new(
        group: TestGroup,
        args: ExecutionArgs,
        log: LogSink,
        markers: MarkerInventory,
    ) -> Self {
        let meta = Arc::new(group.meta);
        let markers = Arc::new(markers);
        let cases = group
            .cases
            .into_iter()
            .map(|case| CaseContext::new(case, Arc::clone(&meta), log.clone(), Arc::clone(&markers)))
            .collect();

        Self {
            meta,
            hooks: group.hooks,
            cases,
            results: ResultSet::default(),
            not_applicable: 0,
            args,
            log,
            markers,
        }
    }

    pub fn meta(&self) -> &GroupMeta {
        &self.meta
    }

    pub fn args(&self) -> &ExecutionArgs {
        &self.args
    }

    pub fn log(&self) -> &LogSink {
        &self.log
    }

    pub fn markers(&self) -> &MarkerInventory {
        &self.markers
    }

    pub fn hook(&self, name: &str) -> Option<&Hook> {
        self.hooks.iter().find(|hook| hook.name == name)
    }

    /// The case contexts still part of the run, in order.
    pub fn cases(&self) -> &[CaseContext] {
        &self.cases
    }

    pub fn has_pending_cases(&self) -> bool {
        !self.cases.is_empty()
    }

    /// Drop every case the predicate rejects. Meant for the removal phase.
    pub fn retain_cases(&mut self, keep: impl FnMut(&CaseContext) -> bool) {
        self.cases.retain(keep);
    }

    /// Hand over the surviving cases for execution, leaving none pending.
    pub fn take_cases(&mut self) -> Vec<CaseContext> {
        std::mem::take(&mut self.cases)
    }

    /// Record a case outcome. Keys are unique; recording a second outcome
    /// under the same name is a sharp error.
    pub fn record(&mut self, name: impl Into<String>, outcome: CaseOutcome) -> Result<(), RunError> {
        self.results.insert(name.into(), outcome)
    }

    pub fn note_not_applicable(&mut self) {
        self.not_applicable += 1;
    }

    pub fn not_applicable_count(&self) -> usize {
        self.not_applicable
    }

    pub fn results(&self) -> &ResultSet {
        &self.results
    }

    pub(crate) fn into_report(self) -> GroupReport {
        GroupReport {
            results: self.results.entries,
            not_applicable: self.not_applicable,
        }
    }
}

impl PhaseContext for GroupContext {}

/// Run-state for one test case, consumed by the running phase.
#[derive(Debug)]
pub struct CaseContext {
    case: TestCase,
    meta: Arc<GroupMeta>,
    log: LogSink,
    markers: Arc<MarkerInventory>,
    /// The case-level phase currently executing, if any.
    cursor: Option<LifePhase>,
    outcome: Option<CaseOutcome>,
}

impl CaseContext {
    fn new(
        case: TestCase,
        meta: Arc<GroupMeta>,
        log: LogSink,
        markers: Arc<MarkerInventory>,
    ) -> Self {
        Self {
            case,
            meta,
            log,
            markers,
            cursor: None,
            outcome: None,
        }
    }

    pub fn case(&self) -> &TestCase {
        &self.case
    }

    pub fn name(&self) -> &str {
        &self.case.meta.name
    }

    pub fn group_meta(&self) -> &GroupMeta {
        &self.meta
    }

    pub fn log(&self) -> &LogSink {
        &self.log
    }

    pub fn markers(&self) -> &MarkerInventory {
        &self.markers
    }

    pub fn current_phase(&self) -> Option<LifePhase> {
        self.cursor
    }

    /// Store the case's outcome, replacing any earlier one.
    pub fn set_outcome(&mut self, outcome: CaseOutcome) {
        self.outcome = Some(outcome);
    }

    pub fn outcome(&self) -> Option<&CaseOutcome> {
        self.outcome.as_ref()
    }

    pub fn take_outcome(&mut self) -> Option<CaseOutcome> {
        self.outcome.take()
    }
}

impl PhaseContext for CaseContext {
    fn enter_phase(&mut self, phase: LifePhase) {
        self.cursor = Some(phase);
    }
}

/// Append-only, key-unique accumulation of case outcomes.
///
/// Keeping the structure key-unique from the start means a future concurrent
/// case runner only needs a synchronized wrapper, not a data-model change.
#[derive(Debug, Default)]
pub struct ResultSet {
    entries: Vec<(String, CaseOutcome)>,
}

impl ResultSet {
    pub fn insert(&mut self, name: String, outcome: CaseOutcome) -> Result<(), RunError> {
        if self.entries.iter().any(|(existing, _)| *existing == name) {
            return Err(RunError::DuplicateResult { name });
        }
        self.entries.push((name, outcome));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&CaseOutcome> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, outcome)| outcome)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CaseOutcome)> {
        self.entries
            .iter()
            .map(|(name, outcome)| (name.as_str(), outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_set_rejects_duplicate_keys() {
        let mut results = ResultSet::default();
        results
            .insert("a".into(), CaseOutcome::passed())
            .unwrap();
        results
            .insert("b".into(), CaseOutcome::failed("nope"))
            .unwrap();

        let err = results
            .insert("a".into(), CaseOutcome::passed())
            .unwrap_err();
        assert!(matches!(err, RunError::DuplicateResult { name } if name == "a"));
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn result_set_keeps_insertion_order() {
        let mut results = ResultSet::default();
        for name in ["c", "a", "b"] {
            results.insert(name.into(), CaseOutcome::passed()).unwrap();
        }
        let order: Vec<&str> = results.iter().map(|(name, _)| name).collect();
        assert_eq!(order, ["c", "a", "b"]);
    }

    #[test]
    fn log_sink_collects_lines() {
        let buffer = std::sync::Arc::new(Mutex::new(Vec::<u8>::new()));
        let sink = LogSink(buffer.clone());

        sink.line("first");
        sink.line(format_args!("{} {}", "second", 2));

        let written = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
        assert_eq!(written, "first\nsecond 2\n");
    }
}
