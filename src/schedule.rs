//! Phase scheduling: who runs in a phase, in which order, and until when.
//!
//! Planning happens once per run, before any phase executes, so broken
//! processor configurations fail fast instead of at call time. Execution
//! then iterates each phase's processors in planned order until a full
//! round passes in which every processor reports
//! [`Readiness::NothingForMe`]. That fixed point lets a processor wait on
//! context state another processor populates later in the same phase.

use std::collections::VecDeque;

use crate::{
    context::PhaseContext,
    error::{ConfigError, RunError},
    phase::{LifePhase, PhaseOwnership, Readiness},
    processor::Processor,
};

/// The planned processor order for every phase of one pipeline.
#[derive(Debug)]
pub(crate) struct Schedule {
    per_phase: [Vec<usize>; LifePhase::COUNT],
}

/// A loop-back request produced while running a phase.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Revisit {
    /// The phase to re-enter after the next scheduled phase completes.
    pub origin: LifePhase,
    /// Index of the processor that asked for the revisit.
    pub processor: usize,
}

impl Schedule {
    /// Resolve ownership and ordering for every phase in `phases`.
    pub fn plan<Ctx>(
        processors: &[Box<dyn Processor<Ctx>>],
        phases: &[LifePhase],
    ) -> Result<Schedule, ConfigError> {
        let mut per_phase: [Vec<usize>; LifePhase::COUNT] = Default::default();

        for &phase in phases {
            let selected: Vec<usize> = processors
                .iter()
                .enumerate()
                .filter(|(_, processor)| processor.phases().contains(&phase))
                .map(|(idx, _)| idx)
                .collect();

            let (exclusive, shared): (Vec<usize>, Vec<usize>) = selected
                .iter()
                .copied()
                .partition(|&idx| processors[idx].ownership(phase) == PhaseOwnership::OnePerPhase);

            per_phase[phase.index()] = match exclusive.as_slice() {
                [] => order_shared(processors, phase, shared)?,
                [single] if shared.is_empty() => vec![*single],
                _ => {
                    if let Some(&blocked) = shared.first() {
                        return Err(ConfigError::MixedOwnership {
                            phase,
                            exclusive: processors[exclusive[0]].name(),
                            shared: processors[blocked].name(),
                        });
                    }
                    vec![arbitrate(processors, phase, &exclusive)?]
                }
            };
        }

        Ok(Schedule { per_phase })
    }

    /// Run one phase to its readiness fixed point.
    ///
    /// Returns the first loop-back request made by a just-invoked processor,
    /// if any. A `Broken` readiness report aborts immediately.
    pub fn run_phase<Ctx: PhaseContext>(
        &self,
        phase: LifePhase,
        processors: &mut [Box<dyn Processor<Ctx>>],
        ctx: &mut Ctx,
    ) -> Result<Option<Revisit>, RunError> {
        let order = &self.per_phase[phase.index()];
        ctx.enter_phase(phase);
        let mut revisit = None;

        loop {
            let mut worked = false;
            for &idx in order {
                match processors[idx].readiness(phase, ctx) {
                    Readiness::NothingForMe => {}
                    Readiness::Broken(message) => {
                        return Err(RunError::Broken {
                            processor: processors[idx].name(),
                            phase,
                            message,
                        });
                    }
                    Readiness::Ready => {
                        worked = true;
                        tracing::debug!(processor = processors[idx].name(), %phase, "process");
                        processors[idx].process(phase, ctx)?;
                        processors[idx].ledger_mut().mark_called(phase);
                        if revisit.is_none() {
                            if let Some(origin) = processors[idx].revisit_after(phase) {
                                revisit = Some(Revisit {
                                    origin,
                                    processor: idx,
                                });
                            }
                        }
                    }
                }
            }
            if !worked {
                break;
            }
        }

        Ok(revisit)
    }
}

/// Walk `phases` front to back, honoring loop-back requests.
///
/// A revisit requested while running phase `P` re-enters its origin phase
/// once the phase after `P` completes, with the requesting processor's
/// ledger entry for the origin cleared so its default readiness fires again.
/// A revisit requested by the final phase is dropped: there is no next phase
/// for it to follow.
pub(crate) fn run_sequence<Ctx: PhaseContext>(
    schedule: &Schedule,
    phases: &[LifePhase],
    processors: &mut [Box<dyn Processor<Ctx>>],
    ctx: &mut Ctx,
) -> Result<(), RunError> {
    let mut queue: VecDeque<LifePhase> = phases.iter().copied().collect();
    let mut pending: Option<Revisit> = None;

    while let Some(phase) = queue.pop_front() {
        tracing::debug!(%phase, "entering phase");
        let revisit = schedule.run_phase(phase, processors, ctx)?;
        if let Some(back) = pending.take() {
            processors[back.processor].ledger_mut().clear(back.origin);
            queue.push_front(back.origin);
        }
        pending = revisit;
    }

    Ok(())
}

/// Pick the single winner among exclusive claimants of one phase.
///
/// Every unordered pair must disagree on [`Processor::outranks`], and one
/// claimant has to outrank all the others; anything else means the
/// processors cannot agree on phase ownership.
fn arbitrate<Ctx>(
    processors: &[Box<dyn Processor<Ctx>>],
    phase: LifePhase,
    claimants: &[usize],
) -> Result<usize, ConfigError> {
    for (pos, &left) in claimants.iter().enumerate() {
        for &right in &claimants[pos + 1..] {
            let left_wins = processors[left].outranks(processors[right].as_ref());
            let right_wins = processors[right].outranks(processors[left].as_ref());
            if left_wins == right_wins {
                return Err(ConfigError::AmbiguousOwnership {
                    phase,
                    left: processors[left].name(),
                    right: processors[right].name(),
                });
            }
        }
    }

    let winner = claimants.iter().copied().find(|&candidate| {
        claimants
            .iter()
            .filter(|&&other| other != candidate)
            .all(|&other| processors[candidate].outranks(processors[other].as_ref()))
    });

    winner.ok_or_else(|| ConfigError::AmbiguousOwnership {
        phase,
        left: processors[claimants[0]].name(),
        right: processors[claimants[1]].name(),
    })
}

/// Order the shared processors of one phase by their before/after edges.
///
/// Kahn's algorithm; ties go to the lower registration index, so the order
/// is deterministic within one run. Preferences naming processors that are
/// not bound to the phase are ignored.
fn order_shared<Ctx>(
    processors: &[Box<dyn Processor<Ctx>>],
    phase: LifePhase,
    selected: Vec<usize>,
) -> Result<Vec<usize>, ConfigError> {
    let position_of = |name: &str| -> Option<usize> {
        selected
            .iter()
            .position(|&idx| processors[idx].name() == name)
    };

    // edges[a] holds positions that must run after a
    let mut successors: Vec<Vec<usize>> = vec![Vec::new(); selected.len()];
    let mut indegree: Vec<usize> = vec![0; selected.len()];

    for (pos, &idx) in selected.iter().enumerate() {
        for before in processors[idx].run_before() {
            if let Some(target) = position_of(before) {
                successors[pos].push(target);
                indegree[target] += 1;
            }
        }
        for after in processors[idx].run_after() {
            if let Some(source) = position_of(after) {
                successors[source].push(pos);
                indegree[pos] += 1;
            }
        }
    }

    let mut order = Vec::with_capacity(selected.len());
    let mut placed = vec![false; selected.len()];

    while order.len() < selected.len() {
        let next = (0..selected.len()).find(|&pos| !placed[pos] && indegree[pos] == 0);
        let Some(next) = next else {
            let members = selected
                .iter()
                .enumerate()
                .filter(|(pos, _)| !placed[*pos])
                .map(|(_, &idx)| processors[idx].name())
                .collect();
            return Err(ConfigError::OrderingCycle { phase, members });
        };

        placed[next] = true;
        order.push(selected[next]);
        for &successor in &successors[next] {
            indegree[successor] -= 1;
        }
    }

    Ok(order)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use crate::{
        context::{ExecutionArgs, GroupContext, LogSink},
        marker::MarkerInventory,
        phase::PhaseLedger,
        test_support::*,
    };

    use super::*;

    /// A configurable probe processor recording its invocations.
    struct Probe {
        name: &'static str,
        phases: &'static [LifePhase],
        ownership: PhaseOwnership,
        run_before: &'static [&'static str],
        run_after: &'static [&'static str],
        outranks: bool,
        trace: Arc<Mutex<Vec<&'static str>>>,
        ledger: PhaseLedger,
    }

    impl Probe {
        fn shared(name: &'static str, trace: &Arc<Mutex<Vec<&'static str>>>) -> Self {
            Self {
                name,
                phases: &[LifePhase::BeforeGroup],
                ownership: PhaseOwnership::ManyPerPhase,
                run_before: &[],
                run_after: &[],
                outranks: false,
                trace: Arc::clone(trace),
                ledger: PhaseLedger::new(),
            }
        }

        fn exclusive(
            name: &'static str,
            outranks: bool,
            trace: &Arc<Mutex<Vec<&'static str>>>,
        ) -> Self {
            Self {
                ownership: PhaseOwnership::OnePerPhase,
                outranks,
                ..Self::shared(name, trace)
            }
        }
    }

    impl Processor<GroupContext> for Probe {
        fn name(&self) -> &'static str {
            self.name
        }

        fn phases(&self) -> &'static [LifePhase] {
            self.phases
        }

        fn ownership(&self, _: LifePhase) -> PhaseOwnership {
            self.ownership
        }

        fn run_before(&self) -> &'static [&'static str] {
            self.run_before
        }

        fn run_after(&self) -> &'static [&'static str] {
            self.run_after
        }

        fn ledger(&self) -> &PhaseLedger {
            &self.ledger
        }

        fn ledger_mut(&mut self) -> &mut PhaseLedger {
            &mut self.ledger
        }

        fn process(&mut self, _: LifePhase, _: &mut GroupContext) -> Result<(), RunError> {
            self.trace.lock().unwrap().push(self.name);
            Ok(())
        }

        fn outranks(&self, _: &dyn Processor<GroupContext>) -> bool {
            self.outranks
        }
    }

    fn context() -> GroupContext {
        GroupContext::new(
            group(vec![], vec![]),
            ExecutionArgs::default(),
            LogSink::discard(),
            MarkerInventory::default(),
        )
    }

    fn boxed(probes: Vec<Probe>) -> Vec<Box<dyn Processor<GroupContext>>> {
        probes
            .into_iter()
            .map(|probe| Box::new(probe) as Box<dyn Processor<GroupContext>>)
            .collect()
    }

    #[test]
    fn empty_phase_runs_nothing() {
        let mut processors = boxed(vec![]);
        let schedule = Schedule::plan(&processors, LifePhase::GROUP_SEQUENCE).unwrap();
        let mut ctx = context();
        run_sequence(&schedule, LifePhase::GROUP_SEQUENCE, &mut processors, &mut ctx).unwrap();
    }

    #[test]
    fn agreeing_exclusive_pair_picks_the_winner() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        let mut processors = boxed(vec![
            Probe::exclusive("loser", false, &trace),
            Probe::exclusive("winner", true, &trace),
        ]);

        let schedule = Schedule::plan(&processors, &[LifePhase::BeforeGroup]).unwrap();
        let mut ctx = context();
        schedule
            .run_phase(LifePhase::BeforeGroup, &mut processors, &mut ctx)
            .unwrap();

        assert_eq!(*trace.lock().unwrap(), ["winner"]);
    }

    #[test]
    fn disagreeing_exclusive_pair_is_a_config_error() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        for both in [true, false] {
            let processors = boxed(vec![
                Probe::exclusive("a", both, &trace),
                Probe::exclusive("b", both, &trace),
            ]);

            let err = Schedule::plan(&processors, &[LifePhase::BeforeGroup]).unwrap_err();
            assert!(matches!(err, ConfigError::AmbiguousOwnership { .. }));
        }
    }

    #[test]
    fn shared_next_to_exclusive_is_a_config_error() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        let processors = boxed(vec![
            Probe::exclusive("one", true, &trace),
            Probe::shared("many", &trace),
        ]);

        let err = Schedule::plan(&processors, &[LifePhase::BeforeGroup]).unwrap_err();
        assert!(matches!(err, ConfigError::MixedOwnership { .. }));
    }

    #[test]
    fn run_before_is_respected() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        let mut processors = boxed(vec![
            Probe::shared("y", &trace),
            Probe {
                run_before: &["y"],
                ..Probe::shared("x", &trace)
            },
        ]);

        let schedule = Schedule::plan(&processors, &[LifePhase::BeforeGroup]).unwrap();
        let mut ctx = context();
        schedule
            .run_phase(LifePhase::BeforeGroup, &mut processors, &mut ctx)
            .unwrap();

        assert_eq!(*trace.lock().unwrap(), ["x", "y"]);
    }

    #[test]
    fn run_after_is_respected() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        let mut processors = boxed(vec![
            Probe {
                run_after: &["late"],
                ..Probe::shared("later", &trace)
            },
            Probe {
                run_after: &["early"],
                ..Probe::shared("late", &trace)
            },
            Probe::shared("early", &trace),
        ]);

        let schedule = Schedule::plan(&processors, &[LifePhase::BeforeGroup]).unwrap();
        let mut ctx = context();
        schedule
            .run_phase(LifePhase::BeforeGroup, &mut processors, &mut ctx)
            .unwrap();

        assert_eq!(*trace.lock().unwrap(), ["early", "late", "later"]);
    }

    #[test]
    fn ordering_cycles_are_a_config_error() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        let processors = boxed(vec![
            Probe {
                run_before: &["b"],
                ..Probe::shared("a", &trace)
            },
            Probe {
                run_before: &["a"],
                ..Probe::shared("b", &trace)
            },
        ]);

        let err = Schedule::plan(&processors, &[LifePhase::BeforeGroup]).unwrap_err();
        match err {
            ConfigError::OrderingCycle { members, .. } => {
                assert_eq!(members, ["a", "b"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn default_readiness_fires_exactly_once_per_phase() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        let mut processors = boxed(vec![Probe::shared("once", &trace)]);

        let schedule = Schedule::plan(&processors, &[LifePhase::BeforeGroup]).unwrap();
        let mut ctx = context();
        schedule
            .run_phase(LifePhase::BeforeGroup, &mut processors, &mut ctx)
            .unwrap();

        assert_eq!(*trace.lock().unwrap(), ["once"]);
        assert_eq!(
            processors[0].readiness(LifePhase::BeforeGroup, &ctx),
            Readiness::NothingForMe
        );
    }

    /// Waits until another processor has recorded a result, exercising the
    /// fixed-point rounds.
    struct WaitsForResult {
        ledger: PhaseLedger,
        trace: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Processor<GroupContext> for WaitsForResult {
        fn name(&self) -> &'static str {
            "waits"
        }

        fn phases(&self) -> &'static [LifePhase] {
            &[LifePhase::BeforeGroup]
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

        fn readiness(&self, phase: LifePhase, ctx: &GroupContext) -> Readiness {
            match (self.ledger.was_called(phase), ctx.results().is_empty()) {
                (true, _) => Readiness::NothingForMe,
                (false, true) => Readiness::NothingForMe,
                (false, false) => Readiness::Ready,
            }
        }

        fn process(&mut self, _: LifePhase, _: &mut GroupContext) -> Result<(), RunError> {
            self.trace.lock().unwrap().push("waits");
            Ok(())
        }
    }

    /// Records a result on first invocation.
    struct ProducesResult {
        ledger: PhaseLedger,
        trace: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Processor<GroupContext> for ProducesResult {
        fn name(&self) -> &'static str {
            "produces"
        }

        fn phases(&self) -> &'static [LifePhase] {
            &[LifePhase::BeforeGroup]
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
            self.trace.lock().unwrap().push("produces");
            ctx.record("seed", crate::outcome::CaseOutcome::passed())
        }
    }

    #[test]
    fn rounds_continue_until_a_quiet_round() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        // "waits" is ordered first but only becomes ready once "produces"
        // has recorded something, so it runs in the second round.
        let mut processors: Vec<Box<dyn Processor<GroupContext>>> = vec![
            Box::new(WaitsForResult {
                ledger: PhaseLedger::new(),
                trace: Arc::clone(&trace),
            }),
            Box::new(ProducesResult {
                ledger: PhaseLedger::new(),
                trace: Arc::clone(&trace),
            }),
        ];

        let schedule = Schedule::plan(&processors, &[LifePhase::BeforeGroup]).unwrap();
        let mut ctx = context();
        schedule
            .run_phase(LifePhase::BeforeGroup, &mut processors, &mut ctx)
            .unwrap();

        assert_eq!(*trace.lock().unwrap(), ["produces", "waits"]);
    }

    /// Reports a broken context.
    struct Broken {
        ledger: PhaseLedger,
    }

    impl Processor<GroupContext> for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn phases(&self) -> &'static [LifePhase] {
            &[LifePhase::BeforeGroup]
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

        fn readiness(&self, _: LifePhase, _: &GroupContext) -> Readiness {
            Readiness::Broken("cases vanished".into())
        }

        fn process(&mut self, _: LifePhase, _: &mut GroupContext) -> Result<(), RunError> {
            unreachable!("a broken processor must never process")
        }
    }

    #[test]
    fn broken_readiness_aborts_the_run() {
        let mut processors: Vec<Box<dyn Processor<GroupContext>>> = vec![Box::new(Broken {
            ledger: PhaseLedger::new(),
        })];

        let schedule = Schedule::plan(&processors, &[LifePhase::BeforeGroup]).unwrap();
        let mut ctx = context();
        let err = schedule
            .run_phase(LifePhase::BeforeGroup, &mut processors, &mut ctx)
            .unwrap_err();

        assert!(matches!(
            err,
            RunError::Broken {
                processor: "broken",
                phase: LifePhase::BeforeGroup,
                ..
            }
        ));
    }
}
