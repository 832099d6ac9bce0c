use std::panic::RefUnwindSafe;

use crate::{
    context::{ExecutionArgs, LogSink},
    driver::GroupDriver,
    error::RunError,
    group::{
        CaseFnHandle, CaseMeta, CaseResult, GroupMeta, Hook, MethodDecl, TestCase, TestGroup,
        TypeDecl,
    },
    marker::Marker,
    outcome::GroupReport,
    processor::RunTestCases,
};

pub fn group_meta(name: &'static str, types: Vec<TypeDecl>) -> GroupMeta {
    GroupMeta {
        name: name.into(),
        types,
    }
}

/// A plain type declaration, not subject to case-placement checks.
pub fn group_type(name: &'static str, methods: Vec<MethodDecl>) -> TypeDecl {
    TypeDecl {
        name: name.into(),
        group_bearing: false,
        markers: vec![],
        methods,
    }
}

/// A group-bearing type declaration.
pub fn bearing_type(name: &'static str, methods: Vec<MethodDecl>) -> TypeDecl {
    TypeDecl {
        group_bearing: true,
        markers: vec![crate::marker::TEST_GROUP],
        ..group_type(name, methods)
    }
}

pub fn method(name: &'static str, markers: &[Marker]) -> MethodDecl {
    MethodDecl::public(name, markers.to_vec())
}

/// A group without declared types, enough for pipeline-behavior tests.
pub fn group(hooks: Vec<Hook>, cases: Vec<TestCase>) -> TestGroup {
    group_with_meta(GroupMeta::default(), hooks, cases)
}

pub fn group_with_meta(meta: GroupMeta, hooks: Vec<Hook>, cases: Vec<TestCase>) -> TestGroup {
    TestGroup::new(meta, hooks, cases)
}

pub fn passing_case(name: &'static str) -> TestCase {
    case_with_body(name, || {})
}

pub fn case_with_body<F>(name: &'static str, body: F) -> TestCase
where
    F: Fn() + Send + Sync + RefUnwindSafe + 'static,
{
    case_with_result(name, move || {
        body();
        CaseResult(Ok(()))
    })
}

pub fn case_with_result<F>(name: &'static str, body: F) -> TestCase
where
    F: Fn() -> CaseResult + Send + Sync + RefUnwindSafe + 'static,
{
    TestCase::new(
        CaseFnHandle::from_boxed(body),
        CaseMeta {
            name: name.into(),
            skip: Default::default(),
        },
    )
}

pub fn skipped_case(name: &'static str, reason: &'static str) -> TestCase {
    TestCase::new(
        CaseFnHandle::default(),
        CaseMeta {
            name: name.into(),
            skip: reason.into(),
        },
    )
}

pub fn run_group(group: TestGroup) -> Result<GroupReport, RunError> {
    run_group_with_args(group, ExecutionArgs::default())
}

pub fn run_group_with_args(
    group: TestGroup,
    args: ExecutionArgs,
) -> Result<GroupReport, RunError> {
    GroupDriver::new().run(group, args, LogSink::discard())
}

/// Run with only the given case runner registered.
pub fn run_group_with_runner(
    group: TestGroup,
    runner: RunTestCases,
) -> Result<GroupReport, RunError> {
    GroupDriver::bare()
        .with_processor(Box::new(runner))
        .run(group, ExecutionArgs::default(), LogSink::discard())
}
