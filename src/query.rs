use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::calc::{self, StudentStatus};
use crate::model::{EvaluationType, Grade, Student, StudentId, Subject, SubjectId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    fn apply(self, ord: Ordering) -> Ordering {
        match self {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

/// Trimmed, lowercased search text; `None` when there is nothing to match.
fn normalized_search(raw: Option<&str>) -> Option<String> {
    raw.map(|s| s.trim().to_lowercase()).filter(|s| !s.is_empty())
}

fn cmp_ci(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}

fn cmp_f64(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

/// All set predicates must match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentFilter {
    pub search: Option<String>,
    #[serde(rename = "class")]
    pub class_name: Option<String>,
    /// Students with at least one grade in this subject.
    pub subject_id: Option<SubjectId>,
    pub status: Option<StudentStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRow {
    #[serde(flatten)]
    pub student: Student,
    pub average_grade: Option<f64>,
    pub grade_count: usize,
    pub status: StudentStatus,
}

pub fn student_rows(
    students: &[Student],
    subjects: &[Subject],
    grades: &[Grade],
    filter: &StudentFilter,
) -> Vec<StudentRow> {
    let grades = calc::linked_grades(students, subjects, grades);
    let search = normalized_search(filter.search.as_deref());
    let in_subject: Option<HashSet<StudentId>> = filter.subject_id.map(|subject_id| {
        grades
            .iter()
            .filter(|g| g.subject_id == subject_id)
            .map(|g| g.student_id)
            .collect()
    });

    students
        .iter()
        .zip(calc::student_summaries(students, subjects, &grades))
        .filter(|(s, _)| search.as_deref().map_or(true, |q| contains_ci(&s.name, q)))
        .filter(|(s, _)| {
            filter
                .class_name
                .as_deref()
                .map_or(true, |c| s.class_name == c)
        })
        .filter(|(s, _)| in_subject.as_ref().map_or(true, |ids| ids.contains(&s.id)))
        .filter(|(_, summary)| filter.status.map_or(true, |st| summary.status == st))
        .map(|(s, summary)| StudentRow {
            student: s.clone(),
            average_grade: summary.average_grade,
            grade_count: summary.grade_count,
            status: summary.status,
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StudentSortKey {
    #[default]
    Name,
    Average,
    Class,
    Status,
}

fn compare_student_rows(
    a: &StudentRow,
    b: &StudentRow,
    key: StudentSortKey,
    direction: SortDirection,
) -> Ordering {
    match key {
        StudentSortKey::Name => direction.apply(cmp_ci(&a.student.name, &b.student.name)),
        StudentSortKey::Class => direction.apply(a.student.class_name.cmp(&b.student.class_name)),
        StudentSortKey::Status => direction.apply(a.status.priority().cmp(&b.status.priority())),
        // Students without grades stay at the end in either direction.
        StudentSortKey::Average => match (a.average_grade, b.average_grade) {
            (Some(x), Some(y)) => direction.apply(cmp_f64(x, y)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
    }
}

/// Stable: rows that compare equal keep their relative order.
pub fn sort_student_rows(rows: &mut [StudentRow], key: StudentSortKey, direction: SortDirection) {
    rows.sort_by(|a, b| compare_student_rows(a, b, key, direction));
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeFilter {
    /// Matches student or subject names.
    pub search: Option<String>,
    pub student_id: Option<StudentId>,
    pub subject_id: Option<SubjectId>,
    /// Class of the owning student.
    #[serde(rename = "class")]
    pub class_name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<EvaluationType>,
    /// Inclusive.
    pub date_from: Option<NaiveDate>,
    /// Inclusive.
    pub date_to: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeRow {
    #[serde(flatten)]
    pub grade: Grade,
    pub student_name: Option<String>,
    pub subject_name: Option<String>,
    #[serde(rename = "class")]
    pub class_name: Option<String>,
}

pub fn grade_rows(
    students: &[Student],
    subjects: &[Subject],
    grades: &[Grade],
    filter: &GradeFilter,
) -> Vec<GradeRow> {
    let by_student: HashMap<StudentId, &Student> = students.iter().map(|s| (s.id, s)).collect();
    let by_subject: HashMap<SubjectId, &Subject> = subjects.iter().map(|s| (s.id, s)).collect();
    let search = normalized_search(filter.search.as_deref());

    grades
        .iter()
        .filter(|g| filter.student_id.map_or(true, |id| g.student_id == id))
        .filter(|g| filter.subject_id.map_or(true, |id| g.subject_id == id))
        .filter(|g| filter.kind.map_or(true, |k| g.kind == k))
        .filter(|g| filter.date_from.map_or(true, |d| g.date >= d))
        .filter(|g| filter.date_to.map_or(true, |d| g.date <= d))
        .filter_map(|g| {
            let student = by_student.get(&g.student_id).copied();
            let subject = by_subject.get(&g.subject_id).copied();
            if let Some(class_name) = filter.class_name.as_deref() {
                if student.map(|s| s.class_name.as_str()) != Some(class_name) {
                    return None;
                }
            }
            if let Some(q) = search.as_deref() {
                let hit = student.map_or(false, |s| contains_ci(&s.name, q))
                    || subject.map_or(false, |s| contains_ci(&s.name, q));
                if !hit {
                    return None;
                }
            }
            Some(GradeRow {
                grade: g.clone(),
                student_name: student.map(|s| s.name.clone()),
                subject_name: subject.map(|s| s.name.clone()),
                class_name: student.map(|s| s.class_name.clone()),
            })
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GradeSortKey {
    #[default]
    Date,
    Grade,
    Student,
    Subject,
}

pub fn sort_grade_rows(rows: &mut [GradeRow], key: GradeSortKey, direction: SortDirection) {
    rows.sort_by(|a, b| {
        let ord = match key {
            GradeSortKey::Date => a.grade.date.cmp(&b.grade.date),
            GradeSortKey::Grade => cmp_f64(a.grade.grade, b.grade.grade),
            GradeSortKey::Student => cmp_ci(
                a.student_name.as_deref().unwrap_or(""),
                b.student_name.as_deref().unwrap_or(""),
            ),
            GradeSortKey::Subject => cmp_ci(
                a.subject_name.as_deref().unwrap_or(""),
                b.subject_name.as_deref().unwrap_or(""),
            ),
        };
        direction.apply(ord)
    });
}

/// Ids picked for bulk actions, kept apart from filter and sort.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    ids: BTreeSet<StudentId>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, id: StudentId, selected: bool) {
        if selected {
            self.ids.insert(id);
        } else {
            self.ids.remove(&id);
        }
    }

    /// Returns whether the id is selected afterwards.
    pub fn toggle(&mut self, id: StudentId) -> bool {
        if self.ids.remove(&id) {
            false
        } else {
            self.ids.insert(id);
            true
        }
    }

    pub fn select_all<I>(&mut self, ids: I)
    where
        I: IntoIterator<Item = StudentId>,
    {
        self.ids.extend(ids);
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn contains(&self, id: StudentId) -> bool {
        self.ids.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> Vec<StudentId> {
        self.ids.iter().copied().collect()
    }

    /// Selected ids that are currently visible, in visible order.
    pub fn actionable(&self, visible: &[StudentId]) -> Vec<StudentId> {
        visible
            .iter()
            .copied()
            .filter(|id| self.ids.contains(id))
            .collect()
    }

    /// Drops ids that no longer exist in the ledger.
    pub fn retain_existing(&mut self, existing: &[Student]) {
        let known: HashSet<StudentId> = existing.iter().map(|s| s.id).collect();
        self.ids.retain(|id| known.contains(id));
    }
}

/// Filter, sort and selection of the student list. A filter change clears the
/// selection.
#[derive(Debug, Clone, Default)]
pub struct StudentView {
    filter: StudentFilter,
    sort_key: StudentSortKey,
    direction: SortDirection,
    selection: Selection,
}

impl StudentView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(&self) -> &StudentFilter {
        &self.filter
    }

    pub fn sort(&self) -> (StudentSortKey, SortDirection) {
        (self.sort_key, self.direction)
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut Selection {
        &mut self.selection
    }

    /// Returns true when the filter changed (and the selection was cleared).
    pub fn set_filter(&mut self, filter: StudentFilter) -> bool {
        if filter == self.filter {
            return false;
        }
        self.filter = filter;
        if !self.selection.is_empty() {
            log::debug!("filter changed, clearing {} selected student(s)", self.selection.len());
        }
        self.selection.clear();
        true
    }

    pub fn set_sort(&mut self, key: StudentSortKey, direction: SortDirection) {
        self.sort_key = key;
        self.direction = direction;
    }

    /// Same key flips the direction; a new key starts ascending.
    pub fn toggle_sort(&mut self, key: StudentSortKey) {
        if self.sort_key == key {
            self.direction = self.direction.toggled();
        } else {
            self.sort_key = key;
            self.direction = SortDirection::Asc;
        }
    }

    pub fn rows(&self, students: &[Student], subjects: &[Subject], grades: &[Grade]) -> Vec<StudentRow> {
        let mut rows = student_rows(students, subjects, grades, &self.filter);
        sort_student_rows(&mut rows, self.sort_key, self.direction);
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student(id: i64, name: &str, class_name: &str) -> Student {
        Student {
            id,
            name: name.to_string(),
            email: String::new(),
            class_name: class_name.to_string(),
        }
    }

    fn grade(id: i64, student_id: i64, subject_id: i64, value: f64) -> Grade {
        Grade {
            id,
            student_id,
            subject_id,
            grade: value,
            attendance: 90.0,
            kind: EvaluationType::Exam,
            date: NaiveDate::from_ymd_opt(2024, 10, id as u32).expect("date"),
            notes: None,
        }
    }

    fn subject(id: i64, name: &str) -> Subject {
        Subject {
            id,
            name: name.to_string(),
            area: "Sciences".to_string(),
            code: String::new(),
        }
    }

    fn names(rows: &[StudentRow]) -> Vec<&str> {
        rows.iter().map(|r| r.student.name.as_str()).collect()
    }

    #[test]
    fn filters_combine_with_and() {
        let students = vec![
            student(1, "Ana Garcia", "5A"),
            student(2, "Anabel Ruiz", "5B"),
            student(3, "Bruno Diaz", "5A"),
        ];
        let subjects = vec![subject(1, "Math"), subject(2, "History")];
        let grades = vec![grade(1, 1, 1, 8.0), grade(2, 2, 1, 5.0), grade(3, 3, 2, 3.0)];

        let filter = StudentFilter {
            search: Some("  ANA ".to_string()),
            class_name: Some("5A".to_string()),
            ..StudentFilter::default()
        };
        let rows = student_rows(&students, &subjects, &grades, &filter);
        assert_eq!(names(&rows), vec!["Ana Garcia"]);

        let filter = StudentFilter {
            subject_id: Some(1),
            status: Some(StudentStatus::AtRisk),
            ..StudentFilter::default()
        };
        let rows = student_rows(&students, &subjects, &grades, &filter);
        assert_eq!(names(&rows), vec!["Anabel Ruiz"]);
    }

    #[test]
    fn average_sort_keeps_no_grades_last_both_ways() {
        let students = vec![
            student(1, "A", "5A"),
            student(2, "B", "5A"),
            student(3, "C", "5A"),
        ];
        let grades = vec![grade(1, 1, 1, 4.0), grade(2, 3, 1, 9.0)];
        let mut rows = student_rows(
            &students,
            &[subject(1, "Math")],
            &grades,
            &StudentFilter::default(),
        );

        sort_student_rows(&mut rows, StudentSortKey::Average, SortDirection::Asc);
        assert_eq!(names(&rows), vec!["A", "C", "B"]);
        sort_student_rows(&mut rows, StudentSortKey::Average, SortDirection::Desc);
        assert_eq!(names(&rows), vec!["C", "A", "B"]);
    }

    #[test]
    fn name_sort_ignores_case() {
        let students = vec![student(1, "bruno", "5A"), student(2, "Ana", "5A")];
        let mut rows = student_rows(&students, &[], &[], &StudentFilter::default());
        sort_student_rows(&mut rows, StudentSortKey::Name, SortDirection::Asc);
        assert_eq!(names(&rows), vec!["Ana", "bruno"]);
    }

    #[test]
    fn grade_rows_join_names_and_filter_by_class_and_dates() {
        let students = vec![student(1, "Ana", "5A"), student(2, "Bruno", "5B")];
        let subjects = vec![Subject {
            id: 1,
            name: "Mathematics".to_string(),
            area: "Sciences".to_string(),
            code: "MAT".to_string(),
        }];
        let grades = vec![grade(1, 1, 1, 8.0), grade(2, 2, 1, 6.0), grade(5, 1, 1, 7.0)];

        let filter = GradeFilter {
            class_name: Some("5A".to_string()),
            date_to: NaiveDate::from_ymd_opt(2024, 10, 4),
            ..GradeFilter::default()
        };
        let rows = grade_rows(&students, &subjects, &grades, &filter);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].student_name.as_deref(), Some("Ana"));
        assert_eq!(rows[0].subject_name.as_deref(), Some("Mathematics"));

        let filter = GradeFilter {
            search: Some("math".to_string()),
            ..GradeFilter::default()
        };
        let mut rows = grade_rows(&students, &subjects, &grades, &filter);
        assert_eq!(rows.len(), 3);
        sort_grade_rows(&mut rows, GradeSortKey::Grade, SortDirection::Desc);
        assert_eq!(rows[0].grade.grade, 8.0);
    }

    #[test]
    fn filter_change_clears_selection() {
        let mut view = StudentView::new();
        view.selection_mut().select_all([1, 2, 3]);

        assert!(!view.set_filter(StudentFilter::default()));
        assert_eq!(view.selection().len(), 3);

        let changed = view.set_filter(StudentFilter {
            class_name: Some("5A".to_string()),
            ..StudentFilter::default()
        });
        assert!(changed);
        assert!(view.selection().is_empty());
    }

    #[test]
    fn sort_change_keeps_selection_and_toggles_direction() {
        let mut view = StudentView::new();
        view.selection_mut().set(4, true);
        view.toggle_sort(StudentSortKey::Average);
        assert_eq!(view.sort(), (StudentSortKey::Average, SortDirection::Asc));
        view.toggle_sort(StudentSortKey::Average);
        assert_eq!(view.sort(), (StudentSortKey::Average, SortDirection::Desc));
        assert!(view.selection().contains(4));
    }

    #[test]
    fn actionable_is_the_visible_part_of_the_selection() {
        let mut sel = Selection::new();
        assert!(sel.toggle(5));
        sel.set(2, true);
        assert_eq!(sel.actionable(&[1, 2, 3]), vec![2]);
        assert!(!sel.toggle(5));
        assert_eq!(sel.ids(), vec![2]);
    }
}
