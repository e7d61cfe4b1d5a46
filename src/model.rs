use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub type StudentId = i64;
pub type SubjectId = i64;
pub type GradeId = i64;

pub const GRADE_MIN: f64 = 0.0;
pub const GRADE_MAX: f64 = 10.0;
pub const ATTENDANCE_MIN: f64 = 0.0;
pub const ATTENDANCE_MAX: f64 = 100.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: StudentId,
    pub name: String,
    pub email: String,
    /// Section label, e.g. "5A".
    #[serde(rename = "class")]
    pub class_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: SubjectId,
    pub name: String,
    /// Curricular grouping.
    pub area: String,
    pub code: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EvaluationType {
    Exam,
    Assignment,
    Quiz,
    Project,
    Participation,
}

impl EvaluationType {
    pub const ALL: [EvaluationType; 5] = [
        EvaluationType::Exam,
        EvaluationType::Assignment,
        EvaluationType::Quiz,
        EvaluationType::Project,
        EvaluationType::Participation,
    ];
}

/// The central fact record. Only foreign keys are stored; display names are
/// joined at read time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grade {
    pub id: GradeId,
    pub student_id: StudentId,
    pub subject_id: SubjectId,
    pub grade: f64,
    pub attendance: f64,
    #[serde(rename = "type")]
    pub kind: EvaluationType,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStudent {
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(rename = "class", default)]
    pub class_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    #[serde(rename = "class")]
    pub class_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSubject {
    pub name: String,
    #[serde(default)]
    pub area: String,
    #[serde(default)]
    pub code: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectPatch {
    pub name: Option<String>,
    pub area: Option<String>,
    pub code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGrade {
    pub student_id: StudentId,
    pub subject_id: SubjectId,
    pub grade: f64,
    pub attendance: f64,
    #[serde(rename = "type")]
    pub kind: EvaluationType,
    /// Defaults to today when omitted.
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradePatch {
    pub student_id: Option<StudentId>,
    pub subject_id: Option<SubjectId>,
    pub grade: Option<f64>,
    pub attendance: Option<f64>,
    #[serde(rename = "type")]
    pub kind: Option<EvaluationType>,
    pub date: Option<NaiveDate>,
    /// An empty string clears the notes.
    pub notes: Option<String>,
}

/// The three persisted collections, in the shape they are stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub students: Vec<Student>,
    pub subjects: Vec<Subject>,
    pub grades: Vec<Grade>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grade_serializes_with_wire_names() {
        let g = Grade {
            id: 1,
            student_id: 2,
            subject_id: 3,
            grade: 7.5,
            attendance: 90.0,
            kind: EvaluationType::Quiz,
            date: NaiveDate::from_ymd_opt(2024, 9, 12).expect("date"),
            notes: None,
        };
        let v = serde_json::to_value(&g).expect("serialize");
        assert_eq!(v["studentId"], 2);
        assert_eq!(v["subjectId"], 3);
        assert_eq!(v["type"], "quiz");
        assert_eq!(v["date"], "2024-09-12");
        assert!(v.get("notes").is_none());
    }

    #[test]
    fn student_class_uses_class_key() {
        let s: Student = serde_json::from_value(serde_json::json!({
            "id": 4, "name": "Ana", "email": "ana@example.com", "class": "5A"
        }))
        .expect("parse student");
        assert_eq!(s.class_name, "5A");
    }
}
