//! Removing unwanted cases before anything runs.
//!
//! The exclusion specification arrives as raw entries in the execution
//! arguments. An entry is either a bare case name, which excludes the case
//! entirely, or `name:indices` with a comma-separated list of indices and
//! `low-high` ranges, which excludes only those sub-indices. Only blanket
//! entries remove a case context at this layer; index sets are parsed and
//! kept for collaborators that execute sub-indexed cases.

use std::collections::{BTreeMap, BTreeSet};

use crate::{
    context::GroupContext,
    error::{ConfigError, RunError},
    phase::{LifePhase, PhaseLedger, PhaseOwnership},
    processor::Processor,
};

/// A parsed exclusion specification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionSpec {
    entries: BTreeMap<String, Exclusion>,
}

/// How much of a case an entry excludes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exclusion {
    /// The whole case; its context is removed before anything runs.
    Blanket,
    /// Only these sub-indices.
    Indices(BTreeSet<u32>),
}

impl ExclusionSpec {
    /// Parse raw entries of the form `name` or `name:1,3-5`.
    pub fn parse<'e>(entries: impl IntoIterator<Item = &'e str>) -> Result<Self, ConfigError> {
        let mut spec = ExclusionSpec::default();
        for entry in entries {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            let (name, exclusion) = parse_entry(entry)?;
            spec.entries.insert(name, exclusion);
        }
        Ok(spec)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether this case is excluded entirely.
    pub fn is_blanket(&self, case: &str) -> bool {
        matches!(self.entries.get(case), Some(Exclusion::Blanket))
    }

    /// The excluded sub-indices of a case, if any were specified.
    pub fn excluded_indices(&self, case: &str) -> Option<&BTreeSet<u32>> {
        match self.entries.get(case) {
            Some(Exclusion::Indices(indices)) => Some(indices),
            _ => None,
        }
    }
}

fn parse_entry(entry: &str) -> Result<(String, Exclusion), ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidExclusion {
        entry: entry.to_owned(),
        reason: reason.to_owned(),
    };

    let Some((name, spec)) = entry.split_once(':') else {
        return Ok((entry.to_owned(), Exclusion::Blanket));
    };

    let name = name.trim();
    if name.is_empty() {
        return Err(invalid("missing case name"));
    }

    let mut indices = BTreeSet::new();
    for part in spec.split(',') {
        let part = part.trim();
        if part.is_empty() {
            return Err(invalid("empty index"));
        }
        match part.split_once('-') {
            None => {
                let index: u32 = part.parse().map_err(|_| invalid("index is not a number"))?;
                indices.insert(index);
            }
            Some((low, high)) => {
                let low: u32 = low
                    .trim()
                    .parse()
                    .map_err(|_| invalid("range start is not a number"))?;
                let high: u32 = high
                    .trim()
                    .parse()
                    .map_err(|_| invalid("range end is not a number"))?;
                if low > high {
                    return Err(invalid("range is reversed"));
                }
                indices.extend(low..=high);
            }
        }
    }

    Ok((name.to_owned(), Exclusion::Indices(indices)))
}

/// Removes blanket-excluded case contexts during the removal phase.
#[derive(Debug, Default)]
pub struct CaseExclusion {
    ledger: PhaseLedger,
}

impl CaseExclusion {
    pub const NAME: &'static str = "case-exclusion";

    pub fn new() -> Self {
        Self::default()
    }
}

impl Processor<GroupContext> for CaseExclusion {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn phases(&self) -> &'static [LifePhase] {
        &[LifePhase::CaseRemoving]
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
        let spec = ExclusionSpec::parse(ctx.args().exclusions.iter().map(String::as_str))?;
        if spec.is_empty() {
            return Ok(());
        }

        let log = ctx.log().clone();
        ctx.retain_cases(|case| {
            let excluded = spec.is_blanket(case.name());
            if excluded {
                log.line(format_args!("case `{}` excluded from the run", case.name()));
            }
            !excluded
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{context::ExecutionArgs, test_support::*};

    #[test]
    fn bare_names_parse_as_blanket() {
        let spec = ExclusionSpec::parse(["checkLoad", "checkStore"]).unwrap();
        assert!(spec.is_blanket("checkLoad"));
        assert!(spec.is_blanket("checkStore"));
        assert!(!spec.is_blanket("checkOther"));
    }

    #[test]
    fn indices_and_ranges_parse() {
        let spec = ExclusionSpec::parse(["checkLoad:1,3-5,9"]).unwrap();
        assert!(!spec.is_blanket("checkLoad"));
        let indices = spec.excluded_indices("checkLoad").unwrap();
        assert_eq!(
            indices.iter().copied().collect::<Vec<_>>(),
            vec![1, 3, 4, 5, 9]
        );
    }

    #[test]
    fn malformed_entries_are_config_errors() {
        for entry in [":1", "name:", "name:a", "name:2-1", "name:1,,2"] {
            let err = ExclusionSpec::parse([entry]).unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidExclusion { .. }),
                "entry `{entry}` should not parse"
            );
        }
    }

    #[test]
    fn blanket_exclusion_removes_the_case() {
        let group = group(
            vec![],
            vec![passing_case("a"), passing_case("b"), passing_case("c")],
        );

        let report = run_group_with_args(group, ExecutionArgs::with_exclusions(["b"])).unwrap();

        let names: Vec<&str> = report.results.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, ["a", "c"]);
    }

    #[test]
    fn index_exclusion_keeps_the_case() {
        let group = group(vec![], vec![passing_case("a"), passing_case("b")]);

        let report =
            run_group_with_args(group, ExecutionArgs::with_exclusions(["b:0-2"])).unwrap();

        assert_eq!(report.results.len(), 2);
    }
}
