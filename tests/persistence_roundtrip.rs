mod test_support;

use sinad::db::{CollectionStore, SqliteStore, GRADES_KEY};
use sinad::ledger::{Ledger, LoadSource};
use sinad::model::{EvaluationType, NewGrade};
use sinad::seed::DEFAULT_RNG_SEED;
use test_support::date;

fn open(path: &std::path::Path) -> Ledger {
    let store = SqliteStore::open(path).expect("open store");
    Ledger::load(Box::new(store), DEFAULT_RNG_SEED)
}

#[test]
fn fresh_workspace_is_seeded_and_persisted() {
    let dir = tempfile::tempdir().expect("tempdir");

    let first = open(dir.path());
    assert_eq!(first.source(), LoadSource::Seeded);
    assert_eq!(first.students().len(), 15);
    assert_eq!(first.subjects().len(), 13);
    assert_eq!(first.grades().len(), 15 * 13);
    drop(first);

    let second = open(dir.path());
    assert_eq!(second.source(), LoadSource::Stored);
    assert_eq!(second.grades().len(), 15 * 13);
}

#[test]
fn added_grade_survives_reload() {
    let dir = tempfile::tempdir().expect("tempdir");

    let mut ledger = open(dir.path());
    let added = ledger
        .add_grade(NewGrade {
            student_id: 3,
            subject_id: 5,
            grade: 7.5,
            attendance: 95.0,
            kind: EvaluationType::Project,
            date: Some(date(2024, 11, 4)),
            notes: Some("  group work ".to_string()),
        })
        .expect("add grade");
    assert_eq!(added.notes.as_deref(), Some("group work"));
    drop(ledger);

    let reloaded = open(dir.path());
    assert_eq!(reloaded.source(), LoadSource::Stored);
    assert_eq!(reloaded.grade(added.id), Some(&added));
}

#[test]
fn corrupt_collection_falls_back_to_seed_and_rewrites_it() {
    let dir = tempfile::tempdir().expect("tempdir");
    drop(open(dir.path()));

    let mut store = SqliteStore::open(dir.path()).expect("open store");
    store
        .write_all(&[(GRADES_KEY, "{not json".to_string())])
        .expect("corrupt grades");
    drop(store);

    let recovered = open(dir.path());
    assert_eq!(recovered.source(), LoadSource::Seeded);
    assert_eq!(recovered.grades().len(), 15 * 13);
    drop(recovered);

    let again = open(dir.path());
    assert_eq!(again.source(), LoadSource::Stored);
}

#[test]
fn deletes_are_visible_after_reload() {
    let dir = tempfile::tempdir().expect("tempdir");

    let mut ledger = open(dir.path());
    ledger.delete_student(1).expect("delete student");
    drop(ledger);

    let reloaded = open(dir.path());
    assert!(reloaded.student(1).is_none());
    assert!(reloaded.student_grades(1).is_empty());
    assert_eq!(reloaded.grades().len(), 14 * 13);
}
