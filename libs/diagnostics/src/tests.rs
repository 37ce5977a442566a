use test_log::test;

use crate::*;

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TestIssue {
    severity: Severity,
}

impl Display for TestIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.severity)
    }
}

impl Diagnostic for TestIssue {
    fn severity(&self) -> Severity {
        self.severity
    }
}

impl From<Severity> for TestIssue {
    fn from(severity: Severity) -> Self {
        Self { severity }
    }
}

#[test]
fn issue_set_counters() {
    let mut issues: IssueSet<TestIssue> = IssueSet::new();
    issues.add(Severity::Info.into());
    assert_eq!(issues.num_errors(), 0);
    assert_eq!(issues.num_warnings(), 0);
    assert!(!issues.has_error());
    issues.add(Severity::Warning.into());
    assert_eq!(issues.num_warnings(), 1);
    assert!(issues.has_warning());
    issues.add(Severity::Error.into());
    assert_eq!(issues.num_errors(), 1);
    assert!(issues.has_error());
    assert_eq!(issues.len(), 3);
    assert_eq!(issues.errors().count(), 1);
}

#[test]
fn worst_severity() {
    let mut issues: IssueSet<TestIssue> = IssueSet::new();
    assert_eq!(issues.worst(), None);
    issues.add(Severity::Info.into());
    assert_eq!(issues.worst(), Some(Severity::Info));
    issues.add(Severity::Error.into());
    issues.add(Severity::Warning.into());
    assert_eq!(issues.worst(), Some(Severity::Error));
}

#[test]
fn into_result_keeps_warnings() {
    let issues: IssueSet<TestIssue> = [Severity::Warning, Severity::Info]
        .into_iter()
        .map(TestIssue::from)
        .collect();
    let ok = issues.into_result().unwrap();
    assert_eq!(ok.len(), 2);

    let issues: IssueSet<TestIssue> = [Severity::Warning, Severity::Error]
        .into_iter()
        .map(TestIssue::from)
        .collect();
    let err = issues.into_result().unwrap_err();
    assert_eq!(err.num_errors(), 1);
    assert_eq!(err.to_string(), "warning\nerror\n");
}

#[test]
fn default_severity_is_warning() {
    assert_eq!(Severity::default(), Severity::Warning);
}

#[test]
fn severity_as_tracing_level() {
    assert_eq!(Severity::Info.as_tracing_level(), tracing::Level::INFO);
    assert_eq!(Severity::Warning.as_tracing_level(), tracing::Level::WARN);
    assert_eq!(Severity::Error.as_tracing_level(), tracing::Level::ERROR);
}

#[test]
fn counts_by_severity() {
    let issues: IssueSet<TestIssue> = [Severity::Info, Severity::Info, Severity::Error]
        .into_iter()
        .map(TestIssue::from)
        .collect();
    assert_eq!(issues.count(Severity::Info), 2);
    assert_eq!(issues.count(Severity::Warning), 0);
    assert_eq!(issues.count(Severity::Error), 1);
    assert_eq!((&issues).into_iter().filter(|i| i.severity.is_error()).count(), 1);
}
