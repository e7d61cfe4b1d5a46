//! The authoritative collections of students, subjects and grades.
//!
//! Every mutation is validated, written to the backing [`CollectionStore`] and
//! only then applied in memory, so a failed write leaves the ledger untouched
//! and a successful one is immediately visible to aggregate reads.

use std::borrow::Cow;
use std::cell::OnceCell;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::calc::{self, ClassKpi, ExportRow, StudentSummary, SubjectSummary};
use crate::db::{CollectionStore, GRADES_KEY, STUDENTS_KEY, SUBJECTS_KEY};
use crate::error::{EntityKind, LedgerError, LedgerResult, StorageError};
use crate::model::{
    Dataset, Grade, GradeId, GradePatch, NewGrade, NewStudent, NewSubject, Student, StudentId,
    StudentPatch, Subject, SubjectId, SubjectPatch, ATTENDANCE_MAX, ATTENDANCE_MIN, GRADE_MAX,
    GRADE_MIN,
};
use crate::seed;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    Stored,
    Seeded,
}

impl LoadSource {
    pub fn as_str(self) -> &'static str {
        match self {
            LoadSource::Stored => "stored",
            LoadSource::Seeded => "seeded",
        }
    }
}

#[derive(Default)]
struct Changes {
    students: Option<Vec<Student>>,
    subjects: Option<Vec<Subject>>,
    grades: Option<Vec<Grade>>,
}

pub struct Ledger {
    students: Vec<Student>,
    subjects: Vec<Subject>,
    grades: Vec<Grade>,
    store: Box<dyn CollectionStore>,
    source: LoadSource,
    revision: u64,
    kpis: OnceCell<ClassKpi>,
}

fn next_id<I>(ids: I) -> LedgerResult<i64>
where
    I: IntoIterator<Item = i64>,
{
    ids.into_iter()
        .max()
        .unwrap_or(0)
        .checked_add(1)
        .ok_or_else(|| LedgerError::validation("id", "no identifiers left"))
}

fn today() -> chrono::NaiveDate {
    chrono::Local::now().date_naive()
}

fn required_text(field: &'static str, raw: &str) -> LedgerResult<String> {
    let v = raw.trim();
    if v.is_empty() {
        return Err(LedgerError::validation(field, "must not be empty"));
    }
    Ok(v.to_string())
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> LedgerResult<()> {
    if !value.is_finite() || value < min || value > max {
        return Err(LedgerError::out_of_range(field, value, min, max));
    }
    Ok(())
}

fn normalized_notes(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn encode<T: Serialize>(items: &[T]) -> Result<String, StorageError> {
    Ok(serde_json::to_string(items)?)
}

fn decode<T: DeserializeOwned>(key: &str, raw: &str) -> Result<Vec<T>, StorageError> {
    serde_json::from_str(raw).map_err(|e| StorageError::Corrupt {
        key: key.to_string(),
        message: e.to_string(),
    })
}

/// `Ok(None)` when nothing has been stored yet.
fn read_dataset(store: &dyn CollectionStore) -> Result<Option<Dataset>, StorageError> {
    let students = store.read(STUDENTS_KEY)?;
    let subjects = store.read(SUBJECTS_KEY)?;
    let grades = store.read(GRADES_KEY)?;

    match (students, subjects, grades) {
        (None, None, None) => Ok(None),
        (Some(st), Some(su), Some(gr)) => Ok(Some(Dataset {
            students: decode(STUDENTS_KEY, &st)?,
            subjects: decode(SUBJECTS_KEY, &su)?,
            grades: decode(GRADES_KEY, &gr)?,
        })),
        (st, su, _) => {
            let missing = if st.is_none() {
                STUDENTS_KEY
            } else if su.is_none() {
                SUBJECTS_KEY
            } else {
                GRADES_KEY
            };
            Err(StorageError::Corrupt {
                key: missing.to_string(),
                message: "collection is missing".to_string(),
            })
        }
    }
}

impl Ledger {
    /// Loads the stored collections, falling back to the seed dataset when
    /// they are absent or unreadable. Never fails.
    pub fn load(store: Box<dyn CollectionStore>, rng_seed: u64) -> Self {
        match read_dataset(store.as_ref()) {
            Ok(Some(data)) => {
                let ledger = Self::from_parts(data, store, LoadSource::Stored);
                ledger.report_dangling();
                log::info!(
                    "loaded {} students, {} subjects, {} grades",
                    ledger.students.len(),
                    ledger.subjects.len(),
                    ledger.grades.len()
                );
                ledger
            }
            Ok(None) => {
                log::info!("no stored collections, using seed data");
                Self::seeded(store, rng_seed)
            }
            Err(e @ StorageError::Corrupt { .. }) => {
                log::warn!("stored collections unreadable ({}), using seed data", e);
                Self::seeded(store, rng_seed)
            }
            Err(e) => {
                // Stored data may still be intact; serve the seed without overwriting it.
                log::warn!("could not read stored collections ({}), serving seed data", e);
                Self::from_parts(seed::seed_dataset(rng_seed), store, LoadSource::Seeded)
            }
        }
    }

    fn seeded(store: Box<dyn CollectionStore>, rng_seed: u64) -> Self {
        let mut ledger = Self::from_parts(seed::seed_dataset(rng_seed), store, LoadSource::Seeded);
        if let Err(e) = ledger.save() {
            log::warn!("could not persist seed data: {}", e);
        }
        ledger
    }

    /// Wraps an existing dataset without touching the store.
    pub fn from_dataset(data: Dataset, store: Box<dyn CollectionStore>) -> Self {
        Self::from_parts(data, store, LoadSource::Stored)
    }

    fn from_parts(data: Dataset, store: Box<dyn CollectionStore>, source: LoadSource) -> Self {
        Self {
            students: data.students,
            subjects: data.subjects,
            grades: data.grades,
            store,
            source,
            revision: 0,
            kpis: OnceCell::new(),
        }
    }

    fn report_dangling(&self) {
        let dangling = self
            .grades
            .iter()
            .filter(|g| self.student(g.student_id).is_none() || self.subject(g.subject_id).is_none())
            .count();
        if dangling > 0 {
            log::warn!("{} stored grade(s) reference missing students or subjects", dangling);
        }
    }

    /// Writes all three collections.
    pub fn save(&mut self) -> LedgerResult<()> {
        let entries = [
            (STUDENTS_KEY, encode(&self.students)?),
            (SUBJECTS_KEY, encode(&self.subjects)?),
            (GRADES_KEY, encode(&self.grades)?),
        ];
        self.store.write_all(&entries)?;
        Ok(())
    }

    fn commit(&mut self, changes: Changes) -> LedgerResult<()> {
        let mut entries: Vec<(&str, String)> = Vec::new();
        if let Some(v) = &changes.students {
            entries.push((STUDENTS_KEY, encode(v)?));
        }
        if let Some(v) = &changes.subjects {
            entries.push((SUBJECTS_KEY, encode(v)?));
        }
        if let Some(v) = &changes.grades {
            entries.push((GRADES_KEY, encode(v)?));
        }
        if entries.is_empty() {
            return Ok(());
        }
        self.store.write_all(&entries)?;

        if let Some(v) = changes.students {
            self.students = v;
        }
        if let Some(v) = changes.subjects {
            self.subjects = v;
        }
        if let Some(v) = changes.grades {
            self.grades = v;
        }
        self.revision += 1;
        self.kpis = OnceCell::new();
        Ok(())
    }

    pub fn source(&self) -> LoadSource {
        self.source
    }

    /// Bumped by every successful mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn students(&self) -> &[Student] {
        &self.students
    }

    pub fn subjects(&self) -> &[Subject] {
        &self.subjects
    }

    pub fn grades(&self) -> &[Grade] {
        &self.grades
    }

    pub fn dataset(&self) -> Dataset {
        Dataset {
            students: self.students.clone(),
            subjects: self.subjects.clone(),
            grades: self.grades.clone(),
        }
    }

    pub fn student(&self, id: StudentId) -> Option<&Student> {
        self.students.iter().find(|s| s.id == id)
    }

    pub fn subject(&self, id: SubjectId) -> Option<&Subject> {
        self.subjects.iter().find(|s| s.id == id)
    }

    pub fn grade(&self, id: GradeId) -> Option<&Grade> {
        self.grades.iter().find(|g| g.id == id)
    }

    /// Distinct class sections, sorted.
    pub fn class_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.students.iter().map(|s| s.class_name.clone()).collect();
        names.sort();
        names.dedup();
        names
    }

    fn student_index(&self, id: StudentId) -> LedgerResult<usize> {
        self.students
            .iter()
            .position(|s| s.id == id)
            .ok_or(LedgerError::NotFound {
                entity: EntityKind::Student,
                id,
            })
    }

    fn subject_index(&self, id: SubjectId) -> LedgerResult<usize> {
        self.subjects
            .iter()
            .position(|s| s.id == id)
            .ok_or(LedgerError::NotFound {
                entity: EntityKind::Subject,
                id,
            })
    }

    fn grade_index(&self, id: GradeId) -> LedgerResult<usize> {
        self.grades
            .iter()
            .position(|g| g.id == id)
            .ok_or(LedgerError::NotFound {
                entity: EntityKind::Grade,
                id,
            })
    }

    fn ensure_references(&self, student_id: StudentId, subject_id: SubjectId) -> LedgerResult<()> {
        if self.student(student_id).is_none() {
            return Err(LedgerError::DanglingReference {
                entity: EntityKind::Student,
                id: student_id,
            });
        }
        if self.subject(subject_id).is_none() {
            return Err(LedgerError::DanglingReference {
                entity: EntityKind::Subject,
                id: subject_id,
            });
        }
        Ok(())
    }

    pub fn add_student(&mut self, data: NewStudent) -> LedgerResult<Student> {
        let student = Student {
            id: next_id(self.students.iter().map(|s| s.id))?,
            name: required_text("name", &data.name)?,
            email: data.email.trim().to_string(),
            class_name: data.class_name.trim().to_string(),
        };
        let mut students = self.students.clone();
        students.push(student.clone());
        self.commit(Changes {
            students: Some(students),
            ..Changes::default()
        })?;
        log::debug!("added student {} ({})", student.id, student.name);
        Ok(student)
    }

    pub fn update_student(&mut self, id: StudentId, patch: StudentPatch) -> LedgerResult<()> {
        let idx = self.student_index(id)?;
        let mut updated = self.students[idx].clone();
        if let Some(name) = patch.name {
            updated.name = required_text("name", &name)?;
        }
        if let Some(email) = patch.email {
            updated.email = email.trim().to_string();
        }
        if let Some(class_name) = patch.class_name {
            updated.class_name = class_name.trim().to_string();
        }
        if updated == self.students[idx] {
            return Ok(());
        }
        let mut students = self.students.clone();
        students[idx] = updated;
        self.commit(Changes {
            students: Some(students),
            ..Changes::default()
        })
    }

    /// Removes the student and every grade that references it, in one write.
    /// Returns the number of grades removed.
    pub fn delete_student(&mut self, id: StudentId) -> LedgerResult<usize> {
        let idx = self.student_index(id)?;
        let mut students = self.students.clone();
        students.remove(idx);
        let grades: Vec<Grade> = self
            .grades
            .iter()
            .filter(|g| g.student_id != id)
            .cloned()
            .collect();
        let removed = self.grades.len() - grades.len();
        self.commit(Changes {
            students: Some(students),
            grades: Some(grades),
            ..Changes::default()
        })?;
        log::debug!("deleted student {} and {} grade(s)", id, removed);
        Ok(removed)
    }

    pub fn add_subject(&mut self, data: NewSubject) -> LedgerResult<Subject> {
        let subject = Subject {
            id: next_id(self.subjects.iter().map(|s| s.id))?,
            name: required_text("name", &data.name)?,
            area: data.area.trim().to_string(),
            code: data.code.trim().to_string(),
        };
        let mut subjects = self.subjects.clone();
        subjects.push(subject.clone());
        self.commit(Changes {
            subjects: Some(subjects),
            ..Changes::default()
        })?;
        log::debug!("added subject {} ({})", subject.id, subject.name);
        Ok(subject)
    }

    pub fn update_subject(&mut self, id: SubjectId, patch: SubjectPatch) -> LedgerResult<()> {
        let idx = self.subject_index(id)?;
        let mut updated = self.subjects[idx].clone();
        if let Some(name) = patch.name {
            updated.name = required_text("name", &name)?;
        }
        if let Some(area) = patch.area {
            updated.area = area.trim().to_string();
        }
        if let Some(code) = patch.code {
            updated.code = code.trim().to_string();
        }
        if updated == self.subjects[idx] {
            return Ok(());
        }
        let mut subjects = self.subjects.clone();
        subjects[idx] = updated;
        self.commit(Changes {
            subjects: Some(subjects),
            ..Changes::default()
        })
    }

    /// Removes the subject and its grades, in one write.
    pub fn delete_subject(&mut self, id: SubjectId) -> LedgerResult<usize> {
        let idx = self.subject_index(id)?;
        let mut subjects = self.subjects.clone();
        subjects.remove(idx);
        let grades: Vec<Grade> = self
            .grades
            .iter()
            .filter(|g| g.subject_id != id)
            .cloned()
            .collect();
        let removed = self.grades.len() - grades.len();
        self.commit(Changes {
            subjects: Some(subjects),
            grades: Some(grades),
            ..Changes::default()
        })?;
        log::debug!("deleted subject {} and {} grade(s)", id, removed);
        Ok(removed)
    }

    pub fn add_grade(&mut self, data: NewGrade) -> LedgerResult<Grade> {
        check_range("grade", data.grade, GRADE_MIN, GRADE_MAX)?;
        check_range("attendance", data.attendance, ATTENDANCE_MIN, ATTENDANCE_MAX)?;
        self.ensure_references(data.student_id, data.subject_id)?;

        let grade = Grade {
            id: next_id(self.grades.iter().map(|g| g.id))?,
            student_id: data.student_id,
            subject_id: data.subject_id,
            grade: data.grade,
            attendance: data.attendance,
            kind: data.kind,
            date: data.date.unwrap_or_else(today),
            notes: normalized_notes(data.notes),
        };
        let mut grades = self.grades.clone();
        grades.push(grade.clone());
        self.commit(Changes {
            grades: Some(grades),
            ..Changes::default()
        })?;
        log::debug!(
            "added grade {} for student {} in subject {}",
            grade.id,
            grade.student_id,
            grade.subject_id
        );
        Ok(grade)
    }

    /// An empty patch leaves the record exactly as it was.
    pub fn update_grade(&mut self, id: GradeId, patch: GradePatch) -> LedgerResult<()> {
        let idx = self.grade_index(id)?;
        let mut updated = self.grades[idx].clone();
        if let Some(v) = patch.grade {
            check_range("grade", v, GRADE_MIN, GRADE_MAX)?;
            updated.grade = v;
        }
        if let Some(v) = patch.attendance {
            check_range("attendance", v, ATTENDANCE_MIN, ATTENDANCE_MAX)?;
            updated.attendance = v;
        }
        if let Some(v) = patch.student_id {
            updated.student_id = v;
        }
        if let Some(v) = patch.subject_id {
            updated.subject_id = v;
        }
        if patch.student_id.is_some() || patch.subject_id.is_some() {
            self.ensure_references(updated.student_id, updated.subject_id)?;
        }
        if let Some(v) = patch.kind {
            updated.kind = v;
        }
        if let Some(v) = patch.date {
            updated.date = v;
        }
        if patch.notes.is_some() {
            updated.notes = normalized_notes(patch.notes);
        }
        if updated == self.grades[idx] {
            return Ok(());
        }
        let mut grades = self.grades.clone();
        grades[idx] = updated;
        self.commit(Changes {
            grades: Some(grades),
            ..Changes::default()
        })
    }

    pub fn delete_grade(&mut self, id: GradeId) -> LedgerResult<()> {
        let idx = self.grade_index(id)?;
        let mut grades = self.grades.clone();
        grades.remove(idx);
        self.commit(Changes {
            grades: Some(grades),
            ..Changes::default()
        })
    }

    fn linked_grades(&self) -> Cow<'_, [Grade]> {
        calc::linked_grades(&self.students, &self.subjects, &self.grades)
    }

    pub fn student_grades(&self, student_id: StudentId) -> Vec<Grade> {
        self.linked_grades()
            .iter()
            .filter(|g| g.student_id == student_id)
            .cloned()
            .collect()
    }

    pub fn subject_grades(&self, subject_id: SubjectId) -> Vec<Grade> {
        self.linked_grades()
            .iter()
            .filter(|g| g.subject_id == subject_id)
            .cloned()
            .collect()
    }

    /// Memoized until the next mutation.
    pub fn class_kpis(&self) -> ClassKpi {
        *self
            .kpis
            .get_or_init(|| calc::class_kpis(&self.students, &self.subjects, &self.grades))
    }

    pub fn class_average(&self) -> f64 {
        self.class_kpis().class_average
    }

    pub fn attendance_rate(&self) -> f64 {
        self.class_kpis().attendance_rate
    }

    pub fn students_at_risk(&self) -> Vec<Student> {
        calc::students_at_risk(&self.students, &self.subjects, &self.grades)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn student_summary(&self, student_id: StudentId) -> StudentSummary {
        calc::student_summary(student_id, &self.linked_grades())
    }

    pub fn subject_summary(&self, subject_id: SubjectId) -> SubjectSummary {
        calc::subject_summary(subject_id, &self.linked_grades())
    }

    pub fn export_rows(&self) -> Vec<ExportRow> {
        calc::export_rows(&self.students, &self.subjects, &self.grades)
    }
}
