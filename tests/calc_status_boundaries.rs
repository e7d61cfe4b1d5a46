mod test_support;

use sinad::calc::{self, StudentStatus};
use sinad::db::MemoryStore;
use sinad::ledger::Ledger;
use sinad::model::Dataset;
use test_support::{grade, student, subject};

fn status_for(values: &[f64]) -> StudentStatus {
    let grades: Vec<_> = values
        .iter()
        .enumerate()
        .map(|(i, v)| grade(i as i64 + 1, 1, 1, *v, 100.0))
        .collect();
    calc::student_summary(1, &grades).status
}

#[test]
fn status_thresholds_are_inclusive_at_the_pass_mark() {
    assert_eq!(status_for(&[6.0]), StudentStatus::Passed);
    assert_eq!(status_for(&[5.99]), StudentStatus::AtRisk);
    assert_eq!(status_for(&[4.0]), StudentStatus::AtRisk);
    assert_eq!(status_for(&[3.99]), StudentStatus::Failed);
    assert_eq!(status_for(&[]), StudentStatus::NoGrades);
}

#[test]
fn single_student_scenario_matches_expected_kpis() {
    let data = Dataset {
        students: vec![student(1, "Ana", "5A")],
        subjects: vec![subject(1, "Math")],
        grades: vec![grade(1, 1, 1, 8.0, 90.0), grade(2, 1, 1, 4.0, 80.0)],
    };
    let ledger = Ledger::from_dataset(data, Box::new(MemoryStore::new()));

    let summary = ledger.student_summary(1);
    assert_eq!(summary.average_grade, Some(6.0));
    assert_eq!(summary.status, StudentStatus::Passed);
    assert_eq!(ledger.class_average(), 6.0);
    assert_eq!(ledger.attendance_rate(), 85.0);
    assert!(ledger.students_at_risk().is_empty());
}

#[test]
fn empty_ledger_yields_zero_kpis() {
    let ledger = Ledger::from_dataset(Dataset::default(), Box::new(MemoryStore::new()));

    let kpi = ledger.class_kpis();
    assert_eq!(kpi.class_average, 0.0);
    assert_eq!(kpi.attendance_rate, 0.0);
    assert_eq!(kpi.students_at_risk_count, 0);
    assert_eq!(kpi.total_evaluations, 0);
    assert!(ledger.students_at_risk().is_empty());
    assert!(ledger.export_rows().is_empty());
    assert_eq!(calc::grade_distribution(ledger.grades()).total(), 0);
    assert!(calc::timeline(ledger.grades(), Default::default()).is_empty());
}

#[test]
fn students_without_grades_are_not_at_risk() {
    let data = Dataset {
        students: vec![student(1, "Ana", "5A"), student(2, "Bruno", "5A")],
        subjects: vec![subject(1, "Math")],
        grades: vec![grade(1, 1, 1, 5.0, 90.0)],
    };
    let ledger = Ledger::from_dataset(data, Box::new(MemoryStore::new()));

    let at_risk: Vec<i64> = ledger.students_at_risk().iter().map(|s| s.id).collect();
    assert_eq!(at_risk, vec![1]);
    assert_eq!(ledger.student_summary(2).status, StudentStatus::NoGrades);
}

#[test]
fn subject_without_grades_has_zero_pass_rate() {
    let summary = calc::subject_summary(9, &[]);
    assert_eq!(summary.average_grade, None);
    assert_eq!(summary.pass_rate, 0.0);
    assert_eq!(summary.total_evaluations, 0);
}
