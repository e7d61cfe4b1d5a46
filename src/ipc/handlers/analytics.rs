use crate::calc::{self, round2, TimelinePeriod, TimelinePoint};
use crate::error::{EntityKind, LedgerError};
use crate::ipc::error::{ledger_err, ok};
use crate::ipc::helpers::{optional, required_i64, round_opt};
use crate::ipc::types::{AppState, Request};
use crate::model::Grade;
use crate::query::{self, GradeFilter};
use serde_json::json;

/// Linked grades after the optional `filter` param; all of them when it is absent.
fn filtered_grades(state: &AppState, req: &Request) -> Result<Vec<Grade>, serde_json::Value> {
    let linked = calc::linked_grades(
        state.ledger.students(),
        state.ledger.subjects(),
        state.ledger.grades(),
    );
    let Some(filter) = optional::<GradeFilter>(req, "filter")? else {
        return Ok(linked.into_owned());
    };
    Ok(query::grade_rows(
        state.ledger.students(),
        state.ledger.subjects(),
        &linked,
        &filter,
    )
    .into_iter()
    .map(|r| r.grade)
    .collect())
}

fn timeline_json(points: &[TimelinePoint]) -> Vec<serde_json::Value> {
    points
        .iter()
        .map(|p| {
            json!({
                "period": p.period,
                "average": round2(p.average),
                "count": p.count
            })
        })
        .collect()
}

fn handle_class_kpis(state: &mut AppState, req: &Request) -> serde_json::Value {
    let kpi = state.ledger.class_kpis();
    ok(
        &req.id,
        json!({
            "classAverage": round2(kpi.class_average),
            "attendanceRate": round2(kpi.attendance_rate),
            "studentsAtRiskCount": kpi.students_at_risk_count,
            "totalEvaluations": kpi.total_evaluations,
            "studentCount": state.ledger.students().len(),
            "subjectCount": state.ledger.subjects().len()
        }),
    )
}

fn handle_class_at_risk(state: &mut AppState, req: &Request) -> serde_json::Value {
    let students = state
        .ledger
        .students_at_risk()
        .into_iter()
        .map(|s| {
            let summary = state.ledger.student_summary(s.id);
            json!({
                "id": s.id,
                "name": s.name,
                "email": s.email,
                "class": s.class_name,
                "averageGrade": round_opt(summary.average_grade),
                "gradeCount": summary.grade_count,
                "status": summary.status.as_str()
            })
        })
        .collect::<Vec<_>>();
    ok(&req.id, json!({ "students": students }))
}

fn handle_classes(state: &mut AppState, req: &Request) -> serde_json::Value {
    let sections = calc::class_breakdown(
        state.ledger.students(),
        state.ledger.subjects(),
        state.ledger.grades(),
    )
        .into_iter()
        .map(|c| {
            json!({
                "class": c.class_name,
                "studentCount": c.student_count,
                "averageGrade": round_opt(c.average_grade),
                "attendanceRate": round_opt(c.attendance_rate),
                "atRiskCount": c.at_risk_count
            })
        })
        .collect::<Vec<_>>();
    ok(&req.id, json!({ "classes": sections }))
}

fn handle_student_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let student_id = match required_i64(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(student) = state.ledger.student(student_id) else {
        return ledger_err(
            &req.id,
            &LedgerError::NotFound {
                entity: EntityKind::Student,
                id: student_id,
            },
        );
    };
    let grades = state.ledger.student_grades(student_id);
    let summary = calc::student_summary(student_id, &grades);
    let subjects = calc::student_subject_averages(student_id, state.ledger.subjects(), &grades)
        .into_iter()
        .filter(|s| s.grade_count > 0)
        .map(|s| {
            json!({
                "subjectId": s.subject_id,
                "subjectName": s.subject_name,
                "averageGrade": round_opt(s.average_grade),
                "gradeCount": s.grade_count,
                "status": s.status.as_str()
            })
        })
        .collect::<Vec<_>>();
    let attendance = calc::mean(grades.iter().map(|g| g.attendance));

    ok(
        &req.id,
        json!({
            "student": student,
            "summary": {
                "averageGrade": round_opt(summary.average_grade),
                "gradeCount": summary.grade_count,
                "status": summary.status.as_str(),
                "attendanceRate": round_opt(attendance)
            },
            "subjects": subjects,
            "timeline": timeline_json(&calc::timeline(&grades, TimelinePeriod::Month)),
            "grades": grades
        }),
    )
}

fn handle_subject_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let subject_id = match required_i64(req, "subjectId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(subject) = state.ledger.subject(subject_id) else {
        return ledger_err(
            &req.id,
            &LedgerError::NotFound {
                entity: EntityKind::Subject,
                id: subject_id,
            },
        );
    };
    let grades = state.ledger.subject_grades(subject_id);
    let summary = calc::subject_summary(subject_id, &grades);

    ok(
        &req.id,
        json!({
            "subject": subject,
            "summary": {
                "averageGrade": round_opt(summary.average_grade),
                "passRate": round2(summary.pass_rate),
                "totalEvaluations": summary.total_evaluations,
                "atRiskCount": summary.at_risk_count
            },
            "distribution": calc::grade_distribution(&grades),
            "timeline": timeline_json(&calc::timeline(&grades, TimelinePeriod::Month))
        }),
    )
}

fn handle_subjects_summary(state: &mut AppState, req: &Request) -> serde_json::Value {
    let summaries = calc::subject_summaries(
        state.ledger.students(),
        state.ledger.subjects(),
        state.ledger.grades(),
    );
    let rows = state
        .ledger
        .subjects()
        .iter()
        .zip(summaries)
        .map(|(s, summary)| {
            json!({
                "subjectId": s.id,
                "name": s.name,
                "area": s.area,
                "averageGrade": round_opt(summary.average_grade),
                "passRate": round2(summary.pass_rate),
                "totalEvaluations": summary.total_evaluations,
                "atRiskCount": summary.at_risk_count
            })
        })
        .collect::<Vec<_>>();
    ok(&req.id, json!({ "subjects": rows }))
}

fn handle_distribution(state: &mut AppState, req: &Request) -> serde_json::Value {
    let grades = match filtered_grades(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let distribution = calc::grade_distribution(&grades);
    ok(
        &req.id,
        json!({
            "distribution": distribution,
            "total": distribution.total()
        }),
    )
}

fn handle_timeline(state: &mut AppState, req: &Request) -> serde_json::Value {
    let group_by = match optional::<TimelinePeriod>(req, "groupBy") {
        Ok(v) => v.unwrap_or_default(),
        Err(e) => return e,
    };
    let grades = match filtered_grades(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    ok(
        &req.id,
        json!({
            "groupBy": group_by,
            "points": timeline_json(&calc::timeline(&grades, group_by))
        }),
    )
}

fn handle_types(state: &mut AppState, req: &Request) -> serde_json::Value {
    let grades = match filtered_grades(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let types = calc::type_breakdown(&grades)
        .into_iter()
        .map(|t| {
            json!({
                "type": t.kind,
                "count": t.count,
                "averageGrade": round_opt(t.average_grade)
            })
        })
        .collect::<Vec<_>>();
    ok(&req.id, json!({ "types": types }))
}

fn handle_ranking(state: &mut AppState, req: &Request) -> serde_json::Value {
    let n = match optional::<usize>(req, "n") {
        Ok(v) => v.unwrap_or(5),
        Err(e) => return e,
    };
    let mut ranking = calc::rank_students(
        state.ledger.students(),
        state.ledger.subjects(),
        state.ledger.grades(),
        n,
    );
    for r in ranking.top.iter_mut().chain(ranking.bottom.iter_mut()) {
        r.average_grade = round2(r.average_grade);
    }
    ok(&req.id, json!(ranking))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "analytics.class.kpis" => Some(handle_class_kpis(state, req)),
        "analytics.class.atRisk" => Some(handle_class_at_risk(state, req)),
        "analytics.classes" => Some(handle_classes(state, req)),
        "analytics.student.open" => Some(handle_student_open(state, req)),
        "analytics.subject.open" => Some(handle_subject_open(state, req)),
        "analytics.subjects.summary" => Some(handle_subjects_summary(state, req)),
        "analytics.distribution" => Some(handle_distribution(state, req)),
        "analytics.timeline" => Some(handle_timeline(state, req)),
        "analytics.types" => Some(handle_types(state, req)),
        "analytics.ranking" => Some(handle_ranking(state, req)),
        _ => None,
    }
}
