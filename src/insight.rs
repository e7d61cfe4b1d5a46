//! Narrative summaries for the assistant panels.
//!
//! Providers only reformat aggregate output; nothing here computes statistics
//! of its own.

use crate::calc::{self, ClassKpi, StudentStatus, StudentSummary, SubjectAverage};
use crate::model::Student;

pub struct StudentContext<'a> {
    pub student: &'a Student,
    pub summary: StudentSummary,
    pub subjects: Vec<SubjectAverage>,
}

pub trait InsightProvider {
    fn student_insight(&self, ctx: &StudentContext<'_>) -> String;
    fn class_insight(&self, kpi: &ClassKpi) -> String;
}

/// Fixed-template provider. Output depends only on its input.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateInsights;

fn status_sentence(status: StudentStatus) -> &'static str {
    match status {
        StudentStatus::Passed => "is on track to pass",
        StudentStatus::AtRisk => "is at risk and would benefit from support",
        StudentStatus::Failed => "is currently failing and needs intervention",
        StudentStatus::NoGrades => "has no recorded grades yet",
    }
}

impl InsightProvider for TemplateInsights {
    fn student_insight(&self, ctx: &StudentContext<'_>) -> String {
        let mut out = format!("{} {}", ctx.student.name, status_sentence(ctx.summary.status));
        if let Some(avg) = ctx.summary.average_grade {
            out.push_str(&format!(
                " with an average of {:.2} over {} evaluation(s).",
                calc::round2(avg),
                ctx.summary.grade_count
            ));
        } else {
            out.push('.');
            return out;
        }

        let mut graded: Vec<&SubjectAverage> = ctx
            .subjects
            .iter()
            .filter(|s| s.average_grade.is_some())
            .collect();
        graded.sort_by(|a, b| {
            b.average_grade
                .partial_cmp(&a.average_grade)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        if let (Some(best), Some(worst)) = (graded.first(), graded.last()) {
            if best.subject_id != worst.subject_id {
                out.push_str(&format!(
                    " Strongest subject: {} ({:.2}). Weakest subject: {} ({:.2}).",
                    best.subject_name,
                    calc::round2(best.average_grade.unwrap_or(0.0)),
                    worst.subject_name,
                    calc::round2(worst.average_grade.unwrap_or(0.0))
                ));
            }
        }
        out
    }

    fn class_insight(&self, kpi: &ClassKpi) -> String {
        if kpi.total_evaluations == 0 {
            return "No evaluations have been recorded yet.".to_string();
        }
        format!(
            "Class average is {:.2} across {} evaluation(s) with {:.2}% attendance; {} student(s) are below the pass mark.",
            calc::round2(kpi.class_average),
            kpi.total_evaluations,
            calc::round2(kpi.attendance_rate),
            kpi.students_at_risk_count
        )
    }
}
