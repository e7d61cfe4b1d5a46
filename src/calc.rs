use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use crate::model::{EvaluationType, Grade, Student, StudentId, Subject, SubjectId};

/// Averages at or above this pass.
pub const PASS_THRESHOLD: f64 = 6.0;
/// Averages below this fail; `[FAIL_THRESHOLD, PASS_THRESHOLD)` is at risk.
pub const FAIL_THRESHOLD: f64 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StudentStatus {
    Passed,
    AtRisk,
    Failed,
    NoGrades,
}

impl StudentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            StudentStatus::Passed => "passed",
            StudentStatus::AtRisk => "at-risk",
            StudentStatus::Failed => "failed",
            StudentStatus::NoGrades => "no-grades",
        }
    }

    /// Sort priority, worst first.
    pub fn priority(self) -> u8 {
        match self {
            StudentStatus::Failed => 0,
            StudentStatus::AtRisk => 1,
            StudentStatus::Passed => 2,
            StudentStatus::NoGrades => 3,
        }
    }
}

/// Two-decimal display rounding. Internal math stays unrounded.
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// `None` for an empty input, never NaN.
pub fn mean<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = f64>,
{
    let mut sum = 0.0;
    let mut count: usize = 0;
    for v in values {
        sum += v;
        count += 1;
    }
    if count == 0 {
        None
    } else {
        Some(sum / (count as f64))
    }
}

pub fn classify(average: Option<f64>) -> StudentStatus {
    match average {
        None => StudentStatus::NoGrades,
        Some(avg) if avg >= PASS_THRESHOLD => StudentStatus::Passed,
        Some(avg) if avg >= FAIL_THRESHOLD => StudentStatus::AtRisk,
        Some(_) => StudentStatus::Failed,
    }
}

/// A student with grades whose average is below the pass threshold.
fn needs_attention(status: StudentStatus) -> bool {
    matches!(status, StudentStatus::AtRisk | StudentStatus::Failed)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentSummary {
    pub student_id: StudentId,
    pub average_grade: Option<f64>,
    pub grade_count: usize,
    pub status: StudentStatus,
}

pub fn student_summary(student_id: StudentId, grades: &[Grade]) -> StudentSummary {
    let values: Vec<f64> = grades
        .iter()
        .filter(|g| g.student_id == student_id)
        .map(|g| g.grade)
        .collect();
    let average_grade = mean(values.iter().copied());
    StudentSummary {
        student_id,
        average_grade,
        grade_count: values.len(),
        status: classify(average_grade),
    }
}

/// Grades whose student and subject both exist. Orphans are logged and left
/// out of every whole-ledger fold.
pub fn linked_grades<'a>(
    students: &[Student],
    subjects: &[Subject],
    grades: &'a [Grade],
) -> Cow<'a, [Grade]> {
    let known_students: HashSet<StudentId> = students.iter().map(|s| s.id).collect();
    let known_subjects: HashSet<SubjectId> = subjects.iter().map(|s| s.id).collect();
    let is_linked =
        |g: &Grade| known_students.contains(&g.student_id) && known_subjects.contains(&g.subject_id);

    let orphaned = grades.iter().filter(|g| !is_linked(g)).count();
    if orphaned == 0 {
        return Cow::Borrowed(grades);
    }
    log::warn!(
        "skipping {} grade(s) that reference unknown students or subjects",
        orphaned
    );
    Cow::Owned(grades.iter().filter(|g| is_linked(g)).cloned().collect())
}

/// Summaries for every listed student, in input order.
pub fn student_summaries(
    students: &[Student],
    subjects: &[Subject],
    grades: &[Grade],
) -> Vec<StudentSummary> {
    fold_student_summaries(students, &linked_grades(students, subjects, grades))
}

/// Folds the grade list once. Callers pass linked grades.
fn fold_student_summaries(students: &[Student], grades: &[Grade]) -> Vec<StudentSummary> {
    let mut totals: HashMap<StudentId, (f64, usize)> = HashMap::new();
    for g in grades {
        let entry = totals.entry(g.student_id).or_insert((0.0, 0));
        entry.0 += g.grade;
        entry.1 += 1;
    }
    students
        .iter()
        .map(|s| {
            let (sum, count) = totals.get(&s.id).copied().unwrap_or((0.0, 0));
            let average_grade = if count == 0 {
                None
            } else {
                Some(sum / (count as f64))
            };
            StudentSummary {
                student_id: s.id,
                average_grade,
                grade_count: count,
                status: classify(average_grade),
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectSummary {
    pub subject_id: SubjectId,
    pub average_grade: Option<f64>,
    /// Percentage of evaluations at or above the pass threshold; 0 when empty.
    pub pass_rate: f64,
    pub total_evaluations: usize,
    /// Students whose average in this subject is in the at-risk band.
    pub at_risk_count: usize,
}

pub fn subject_summary(subject_id: SubjectId, grades: &[Grade]) -> SubjectSummary {
    let in_subject: Vec<&Grade> = grades.iter().filter(|g| g.subject_id == subject_id).collect();
    let total = in_subject.len();
    let passed = in_subject
        .iter()
        .filter(|g| g.grade >= PASS_THRESHOLD)
        .count();
    let pass_rate = if total == 0 {
        0.0
    } else {
        (passed as f64) / (total as f64) * 100.0
    };

    let mut per_student: BTreeMap<StudentId, Vec<f64>> = BTreeMap::new();
    for g in &in_subject {
        per_student.entry(g.student_id).or_default().push(g.grade);
    }
    let at_risk_count = per_student
        .values()
        .filter(|v| classify(mean(v.iter().copied())) == StudentStatus::AtRisk)
        .count();

    SubjectSummary {
        subject_id,
        average_grade: mean(in_subject.iter().map(|g| g.grade)),
        pass_rate,
        total_evaluations: total,
        at_risk_count,
    }
}

/// One summary per subject, over linked grades only.
pub fn subject_summaries(
    students: &[Student],
    subjects: &[Subject],
    grades: &[Grade],
) -> Vec<SubjectSummary> {
    let linked = linked_grades(students, subjects, grades);
    subjects
        .iter()
        .map(|s| subject_summary(s.id, &linked))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassKpi {
    /// 0 when there are no grades.
    pub class_average: f64,
    /// 0 when there are no grades.
    pub attendance_rate: f64,
    pub students_at_risk_count: usize,
    pub total_evaluations: usize,
}

pub fn class_kpis(students: &[Student], subjects: &[Subject], grades: &[Grade]) -> ClassKpi {
    let linked = linked_grades(students, subjects, grades);
    ClassKpi {
        class_average: mean(linked.iter().map(|g| g.grade)).unwrap_or(0.0),
        attendance_rate: mean(linked.iter().map(|g| g.attendance)).unwrap_or(0.0),
        students_at_risk_count: at_risk_among(students, &linked).len(),
        total_evaluations: linked.len(),
    }
}

/// Students with at least one grade and an average below the pass threshold.
/// Students without grades are not at risk; they have status `no-grades`.
pub fn students_at_risk<'a>(
    students: &'a [Student],
    subjects: &[Subject],
    grades: &[Grade],
) -> Vec<&'a Student> {
    at_risk_among(students, &linked_grades(students, subjects, grades))
}

fn at_risk_among<'a>(students: &'a [Student], grades: &[Grade]) -> Vec<&'a Student> {
    students
        .iter()
        .zip(fold_student_summaries(students, grades))
        .filter(|(_, summary)| needs_attention(summary.status))
        .map(|(s, _)| s)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GradeBucket {
    Excellent,
    Good,
    Average,
    BelowAverage,
    Poor,
}

/// `>=9` excellent, `[7,9)` good, `[6,7)` average, `[4,6)` below average, `<4` poor.
pub fn bucket_for(grade: f64) -> GradeBucket {
    if grade >= 9.0 {
        GradeBucket::Excellent
    } else if grade >= 7.0 {
        GradeBucket::Good
    } else if grade >= PASS_THRESHOLD {
        GradeBucket::Average
    } else if grade >= FAIL_THRESHOLD {
        GradeBucket::BelowAverage
    } else {
        GradeBucket::Poor
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeDistribution {
    pub excellent: usize,
    pub good: usize,
    pub average: usize,
    pub below_average: usize,
    pub poor: usize,
}

impl GradeDistribution {
    pub fn total(&self) -> usize {
        self.excellent + self.good + self.average + self.below_average + self.poor
    }
}

pub fn grade_distribution(grades: &[Grade]) -> GradeDistribution {
    let mut out = GradeDistribution::default();
    for g in grades {
        match bucket_for(g.grade) {
            GradeBucket::Excellent => out.excellent += 1,
            GradeBucket::Good => out.good += 1,
            GradeBucket::Average => out.average += 1,
            GradeBucket::BelowAverage => out.below_average += 1,
            GradeBucket::Poor => out.poor += 1,
        }
    }
    out
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TimelinePeriod {
    #[default]
    Month,
    Week,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelinePoint {
    pub period: String,
    pub average: f64,
    pub count: usize,
}

/// Averages grouped by calendar period, oldest first.
pub fn timeline(grades: &[Grade], group_by: TimelinePeriod) -> Vec<TimelinePoint> {
    let mut groups: BTreeMap<(i32, u32), (f64, usize)> = BTreeMap::new();
    for g in grades {
        let key = match group_by {
            TimelinePeriod::Month => (g.date.year(), g.date.month()),
            TimelinePeriod::Week => {
                let w = g.date.iso_week();
                (w.year(), w.week())
            }
        };
        let entry = groups.entry(key).or_insert((0.0, 0));
        entry.0 += g.grade;
        entry.1 += 1;
    }
    groups
        .into_iter()
        .map(|((year, part), (sum, count))| TimelinePoint {
            period: match group_by {
                TimelinePeriod::Month => format!("{:04}-{:02}", year, part),
                TimelinePeriod::Week => format!("{:04}-W{:02}", year, part),
            },
            average: sum / (count as f64),
            count,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassSectionSummary {
    #[serde(rename = "class")]
    pub class_name: String,
    pub student_count: usize,
    pub average_grade: Option<f64>,
    pub attendance_rate: Option<f64>,
    pub at_risk_count: usize,
}

/// Per class section, sorted by section label.
pub fn class_breakdown(
    students: &[Student],
    subjects: &[Subject],
    grades: &[Grade],
) -> Vec<ClassSectionSummary> {
    let grades = linked_grades(students, subjects, grades);
    let mut sections: BTreeMap<&str, Vec<&Student>> = BTreeMap::new();
    for s in students {
        sections.entry(s.class_name.as_str()).or_default().push(s);
    }
    let summaries: HashMap<StudentId, StudentSummary> = fold_student_summaries(students, &grades)
        .into_iter()
        .map(|s| (s.student_id, s))
        .collect();

    sections
        .into_iter()
        .map(|(class_name, members)| {
            let ids: HashSet<StudentId> = members.iter().map(|s| s.id).collect();
            let section_grades: Vec<&Grade> =
                grades.iter().filter(|g| ids.contains(&g.student_id)).collect();
            let at_risk_count = members
                .iter()
                .filter_map(|s| summaries.get(&s.id))
                .filter(|summary| needs_attention(summary.status))
                .count();
            ClassSectionSummary {
                class_name: class_name.to_string(),
                student_count: members.len(),
                average_grade: mean(section_grades.iter().map(|g| g.grade)),
                attendance_rate: mean(section_grades.iter().map(|g| g.attendance)),
                at_risk_count,
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeSummary {
    #[serde(rename = "type")]
    pub kind: EvaluationType,
    pub count: usize,
    pub average_grade: Option<f64>,
}

pub fn type_breakdown(grades: &[Grade]) -> Vec<TypeSummary> {
    EvaluationType::ALL
        .iter()
        .map(|kind| {
            let values: Vec<f64> = grades
                .iter()
                .filter(|g| g.kind == *kind)
                .map(|g| g.grade)
                .collect();
            TypeSummary {
                kind: *kind,
                count: values.len(),
                average_grade: mean(values),
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectAverage {
    pub subject_id: SubjectId,
    pub subject_name: String,
    pub average_grade: Option<f64>,
    pub grade_count: usize,
    pub status: StudentStatus,
}

/// One student's average in every subject, in subject order.
pub fn student_subject_averages(
    student_id: StudentId,
    subjects: &[Subject],
    grades: &[Grade],
) -> Vec<SubjectAverage> {
    subjects
        .iter()
        .map(|subject| {
            let values: Vec<f64> = grades
                .iter()
                .filter(|g| g.student_id == student_id && g.subject_id == subject.id)
                .map(|g| g.grade)
                .collect();
            let average_grade = mean(values.iter().copied());
            SubjectAverage {
                subject_id: subject.id,
                subject_name: subject.name.clone(),
                average_grade,
                grade_count: values.len(),
                status: classify(average_grade),
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedStudent {
    pub student_id: StudentId,
    pub name: String,
    #[serde(rename = "class")]
    pub class_name: String,
    pub average_grade: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Ranking {
    pub top: Vec<RankedStudent>,
    pub bottom: Vec<RankedStudent>,
}

/// Best and worst `n` students by average. Students without grades are not ranked.
pub fn rank_students(
    students: &[Student],
    subjects: &[Subject],
    grades: &[Grade],
    n: usize,
) -> Ranking {
    let mut ranked: Vec<RankedStudent> = students
        .iter()
        .zip(student_summaries(students, subjects, grades))
        .filter_map(|(s, summary)| {
            summary.average_grade.map(|avg| RankedStudent {
                student_id: s.id,
                name: s.name.clone(),
                class_name: s.class_name.clone(),
                average_grade: avg,
            })
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.average_grade
            .partial_cmp(&a.average_grade)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let top = ranked.iter().take(n).cloned().collect();

    ranked.sort_by(|a, b| {
        a.average_grade
            .partial_cmp(&b.average_grade)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let bottom = ranked.into_iter().take(n).collect();

    Ranking { top, bottom }
}

/// Flat row consumed by report and spreadsheet generators.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRow {
    pub student_name: String,
    pub subject_name: String,
    #[serde(rename = "class")]
    pub class_name: String,
    pub grade: f64,
    pub attendance: f64,
    #[serde(rename = "type")]
    pub kind: EvaluationType,
    pub date: chrono::NaiveDate,
}

pub fn export_rows(students: &[Student], subjects: &[Subject], grades: &[Grade]) -> Vec<ExportRow> {
    let by_student: HashMap<StudentId, &Student> = students.iter().map(|s| (s.id, s)).collect();
    let by_subject: HashMap<SubjectId, &Subject> = subjects.iter().map(|s| (s.id, s)).collect();

    let mut out = Vec::with_capacity(grades.len());
    for g in grades {
        let (Some(student), Some(subject)) =
            (by_student.get(&g.student_id), by_subject.get(&g.subject_id))
        else {
            log::warn!(
                "export skipped grade {}: student {} or subject {} is missing",
                g.id,
                g.student_id,
                g.subject_id
            );
            continue;
        };
        out.push(ExportRow {
            student_name: student.name.clone(),
            subject_name: subject.name.clone(),
            class_name: student.class_name.clone(),
            grade: g.grade,
            attendance: g.attendance,
            kind: g.kind,
            date: g.date,
        });
    }
    out
}
