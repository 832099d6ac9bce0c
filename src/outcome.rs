use std::borrow::Cow;

/// The recorded result of one test case.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct CaseOutcome {
    pub status: CaseStatus,
    pub message: Cow<'static, str>,
}

impl CaseOutcome {
    pub fn passed() -> Self {
        Self {
            status: CaseStatus::Passed,
            message: Cow::Borrowed(""),
        }
    }

    pub fn failed(message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            status: CaseStatus::Failed,
            message: message.into(),
        }
    }

    pub fn not_applicable(message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            status: CaseStatus::NotApplicable,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum CaseStatus {
    Passed,
    Failed,
    /// The case opted out under current conditions; not counted as a failure.
    NotApplicable,
}

impl CaseStatus {
    pub fn passed(&self) -> bool {
        matches!(self, CaseStatus::Passed)
    }

    pub fn failed(&self) -> bool {
        matches!(self, CaseStatus::Failed)
    }

    pub fn not_applicable(&self) -> bool {
        matches!(self, CaseStatus::NotApplicable)
    }
}

/// The aggregate a finished group run hands to the reporting layer.
///
/// `results` keeps insertion order: the order cases were recorded in, which
/// is not necessarily declaration order once exclusion removed entries.
#[derive(Debug)]
#[non_exhaustive]
pub struct GroupReport {
    pub results: Vec<(String, CaseOutcome)>,
    pub not_applicable: usize,
}

impl GroupReport {
    pub fn outcome_of(&self, case: &str) -> Option<&CaseOutcome> {
        self.results
            .iter()
            .find(|(name, _)| name == case)
            .map(|(_, outcome)| outcome)
    }

    pub fn has_failures(&self) -> bool {
        self.results
            .iter()
            .any(|(_, outcome)| outcome.status.failed())
    }
}
