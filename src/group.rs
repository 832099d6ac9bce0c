//! The test-group data model.
//!
//! A [`TestGroup`] bundles three things: the declared type hierarchy with its
//! markers ([`GroupMeta`]), the named hook bodies resolved by the hook
//! processors, and the executable test cases. Declarations are registered
//! explicitly instead of being reflected from source; whatever scans markers
//! from source is an external collaborator and out of scope here.

use std::{borrow::Cow, fmt::Debug, ops::Deref, panic::RefUnwindSafe};

use crate::marker::Marker;

/// A test group ready for execution.
#[derive(Debug, Default)]
#[non_exhaustive]
pub struct TestGroup {
    pub meta: GroupMeta,
    pub hooks: Vec<Hook>,
    pub cases: Vec<TestCase>,
}

impl TestGroup {
    pub fn new(meta: GroupMeta, hooks: Vec<Hook>, cases: Vec<TestCase>) -> Self {
        Self { meta, hooks, cases }
    }
}

/// The declared shape of a test group: its name and full type hierarchy.
#[derive(Debug, Clone, Default)]
pub struct GroupMeta {
    pub name: Cow<'static, str>,
    /// The full hierarchy, most derived type first, interfaces included.
    pub types: Vec<TypeDecl>,
}

/// One declared type or interface in a group's hierarchy.
#[derive(Debug, Clone)]
pub struct TypeDecl {
    pub name: Cow<'static, str>,
    /// Whether this type is, or inherits from, a group-bearing type.
    pub group_bearing: bool,
    /// Type-level markers.
    pub markers: Vec<Marker>,
    pub methods: Vec<MethodDecl>,
}

/// One declared method, with the accessibility facts the validators need.
#[derive(Debug, Clone)]
pub struct MethodDecl {
    pub name: Cow<'static, str>,
    pub markers: Vec<Marker>,
    pub public: bool,
    pub is_static: bool,
    /// Compiler-generated, not written by the test author.
    pub synthetic: bool,
    /// A `main`-like entry point, exempt from case-marker placement rules.
    pub entry_point: bool,
}

impl MethodDecl {
    /// A public instance method carrying the given markers.
    pub fn public(name: impl Into<Cow<'static, str>>, markers: Vec<Marker>) -> Self {
        Self {
            name: name.into(),
            markers,
            public: true,
            is_static: false,
            synthetic: false,
            entry_point: false,
        }
    }
}

/// A named group-level hook body, located by the hook processors through the
/// marker inventory and invoked by name.
pub struct Hook {
    pub name: Cow<'static, str>,
    function: HookFnHandle,
}

impl Hook {
    pub fn new(name: impl Into<Cow<'static, str>>, function: HookFnHandle) -> Self {
        Self {
            name: name.into(),
            function,
        }
    }

    pub(crate) fn call(&self) -> HookResult {
        self.function.call()
    }
}

impl Debug for Hook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hook").field("name", &self.name).finish()
    }
}

#[non_exhaustive]
pub enum HookFnHandle {
    Ptr(fn() -> HookResult),
    Owned(Box<dyn HookFn + Send + Sync>),
    Static(&'static (dyn HookFn + Send + Sync)),
}

impl HookFnHandle {
    pub const fn from_const_fn(f: fn() -> HookResult) -> Self {
        Self::Ptr(f)
    }

    pub fn from_boxed<F, T>(f: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
        T: Into<HookResult>,
    {
        Self::Owned(Box::new(f))
    }

    pub fn call(&self) -> HookResult {
        match self {
            Self::Ptr(f) => f(),
            Self::Owned(f) => f.call_hook(),
            Self::Static(f) => f.call_hook(),
        }
    }
}

pub trait HookFn {
    fn call_hook(&self) -> HookResult;
}

impl<F, T> HookFn for F
where
    F: Fn() -> T,
    T: Into<HookResult>,
{
    fn call_hook(&self) -> HookResult {
        (self)().into()
    }
}

/// What a hook body reports back. Any error is group-fatal.
#[derive(Debug)]
pub struct HookResult(pub Result<(), String>);

impl From<()> for HookResult {
    fn from(_: ()) -> Self {
        Self(Ok(()))
    }
}

impl<E: Debug> From<Result<(), E>> for HookResult {
    fn from(v: Result<(), E>) -> Self {
        HookResult(v.map_err(|e| format!("{e:#?}")))
    }
}

/// An executable test case: a function handle plus its metadata.
#[derive(Debug, Default)]
#[non_exhaustive]
pub struct TestCase {
    function: CaseFnHandle,
    pub meta: CaseMeta,
}

impl TestCase {
    pub const fn new(function: CaseFnHandle, meta: CaseMeta) -> Self {
        Self { function, meta }
    }

    pub(crate) fn call(&self) -> CaseResult {
        self.function.call()
    }
}

impl Deref for TestCase {
    type Target = CaseMeta;

    fn deref(&self) -> &Self::Target {
        &self.meta
    }
}

#[derive(Debug, Clone, Default)]
pub struct CaseMeta {
    pub name: Cow<'static, str>,
    pub skip: SkipStatus,
}

/// The runtime skip predicate checked before a case's sub-pipeline starts.
///
/// A skipped case is recorded as a recoverable failure carrying the skip
/// reason; the run continues.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SkipStatus {
    #[default]
    Run,
    Skip,
    SkipWithReason(Cow<'static, str>),
}

impl From<bool> for SkipStatus {
    fn from(value: bool) -> Self {
        match value {
            true => Self::Skip,
            false => Self::Run,
        }
    }
}

impl From<&'static str> for SkipStatus {
    fn from(value: &'static str) -> Self {
        Self::SkipWithReason(value.into())
    }
}

impl From<String> for SkipStatus {
    fn from(value: String) -> Self {
        Self::SkipWithReason(value.into())
    }
}

#[non_exhaustive]
pub enum CaseFnHandle {
    Ptr(fn() -> CaseResult),
    Owned(Box<dyn CaseFn + Send + Sync + RefUnwindSafe>),
    Static(&'static (dyn CaseFn + Send + Sync + RefUnwindSafe)),
}

impl Debug for CaseFnHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ptr(ptr) => f.debug_tuple("Ptr").field(ptr).finish(),
            Self::Owned(_) => write!(f, "Owned(...)"),
            Self::Static(_) => write!(f, "Static(...)"),
        }
    }
}

impl Default for CaseFnHandle {
    fn default() -> Self {
        Self::Static(&|| {})
    }
}

impl CaseFnHandle {
    pub const fn from_const_fn(f: fn() -> CaseResult) -> Self {
        Self::Ptr(f)
    }

    pub fn from_boxed<F, T>(f: F) -> Self
    where
        F: Fn() -> T + Send + Sync + RefUnwindSafe + 'static,
        T: Into<CaseResult>,
    {
        Self::Owned(Box::new(f))
    }

    pub const fn from_static_obj(f: &'static (dyn CaseFn + Send + Sync + RefUnwindSafe)) -> Self {
        Self::Static(f)
    }

    pub fn call(&self) -> CaseResult {
        match self {
            Self::Ptr(f) => f(),
            Self::Owned(f) => f.call_case(),
            Self::Static(f) => f.call_case(),
        }
    }
}

pub trait CaseFn {
    fn call_case(&self) -> CaseResult;
}

impl<F, T> CaseFn for F
where
    F: Fn() -> T,
    T: Into<CaseResult>,
{
    fn call_case(&self) -> CaseResult {
        (self)().into()
    }
}

/// What a case body reports back.
#[derive(Debug)]
pub struct CaseResult(pub Result<(), CaseSignal>);

impl CaseResult {
    /// The case opted out of execution under current conditions.
    pub fn not_applicable(message: impl Into<String>) -> Self {
        Self(Err(CaseSignal::NotApplicable(message.into())))
    }

    /// The case failed with a message.
    pub fn failure(message: impl Into<String>) -> Self {
        Self(Err(CaseSignal::Failure(message.into())))
    }
}

/// The ways a case body can end other than passing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaseSignal {
    /// An ordinary failure, counted against the group.
    Failure(String),
    /// The case does not apply; excluded from pass/fail tallies.
    NotApplicable(String),
}

impl From<()> for CaseResult {
    fn from(_: ()) -> Self {
        Self(Ok(()))
    }
}

impl<E: Debug> From<Result<(), E>> for CaseResult {
    fn from(v: Result<(), E>) -> Self {
        CaseResult(v.map_err(|e| CaseSignal::Failure(format!("{e:#?}"))))
    }
}
