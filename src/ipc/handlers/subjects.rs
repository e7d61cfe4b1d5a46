use crate::calc;
use crate::ipc::error::{ledger_err, ok};
use crate::ipc::helpers::{params_as, required, required_i64, round_opt};
use crate::ipc::types::{AppState, Request};
use crate::model::{NewSubject, SubjectPatch};
use serde_json::json;

fn handle_subjects_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let summaries = calc::subject_summaries(
        state.ledger.students(),
        state.ledger.subjects(),
        state.ledger.grades(),
    );
    let subjects = state
        .ledger
        .subjects()
        .iter()
        .zip(summaries)
        .map(|(s, summary)| {
            json!({
                "id": s.id,
                "name": s.name,
                "area": s.area,
                "code": s.code,
                "averageGrade": round_opt(summary.average_grade),
                "passRate": calc::round2(summary.pass_rate),
                "totalEvaluations": summary.total_evaluations
            })
        })
        .collect::<Vec<_>>();
    ok(&req.id, json!({ "subjects": subjects }))
}

fn handle_subjects_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let data = match params_as::<NewSubject>(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match state.ledger.add_subject(data) {
        Ok(subject) => ok(&req.id, json!({ "subject": subject })),
        Err(e) => ledger_err(&req.id, &e),
    }
}

fn handle_subjects_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let subject_id = match required_i64(req, "subjectId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let patch = match required::<SubjectPatch>(req, "patch") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match state.ledger.update_subject(subject_id, patch) {
        Ok(()) => ok(&req.id, json!({ "subject": state.ledger.subject(subject_id) })),
        Err(e) => ledger_err(&req.id, &e),
    }
}

fn handle_subjects_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let subject_id = match required_i64(req, "subjectId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match state.ledger.delete_subject(subject_id) {
        Ok(removed) => ok(&req.id, json!({ "ok": true, "deletedGrades": removed })),
        Err(e) => ledger_err(&req.id, &e),
    }
}

fn handle_subjects_grades(state: &mut AppState, req: &Request) -> serde_json::Value {
    let subject_id = match required_i64(req, "subjectId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    ok(
        &req.id,
        json!({ "grades": state.ledger.subject_grades(subject_id) }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "subjects.list" => Some(handle_subjects_list(state, req)),
        "subjects.create" => Some(handle_subjects_create(state, req)),
        "subjects.update" => Some(handle_subjects_update(state, req)),
        "subjects.delete" => Some(handle_subjects_delete(state, req)),
        "subjects.grades" => Some(handle_subjects_grades(state, req)),
        _ => None,
    }
}
