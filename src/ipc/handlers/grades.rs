use crate::ipc::error::{ledger_err, ok};
use crate::ipc::helpers::{optional, params_as, required, required_i64};
use crate::ipc::types::{AppState, Request};
use crate::model::{GradePatch, NewGrade};
use crate::query::{self, GradeFilter, GradeSortKey, SortDirection};
use serde_json::json;

fn handle_grades_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let filter = match optional::<GradeFilter>(req, "filter") {
        Ok(v) => v.unwrap_or_default(),
        Err(e) => return e,
    };
    let sort = match optional::<GradeSortKey>(req, "sort") {
        Ok(v) => v.unwrap_or_default(),
        Err(e) => return e,
    };
    let direction = match optional::<SortDirection>(req, "direction") {
        Ok(v) => v.unwrap_or_default(),
        Err(e) => return e,
    };

    let mut rows = query::grade_rows(
        state.ledger.students(),
        state.ledger.subjects(),
        state.ledger.grades(),
        &filter,
    );
    query::sort_grade_rows(&mut rows, sort, direction);
    ok(
        &req.id,
        json!({
            "rows": rows,
            "total": state.ledger.grades().len()
        }),
    )
}

fn handle_grades_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let data = match params_as::<NewGrade>(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match state.ledger.add_grade(data) {
        Ok(grade) => ok(&req.id, json!({ "grade": grade })),
        Err(e) => ledger_err(&req.id, &e),
    }
}

fn handle_grades_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let grade_id = match required_i64(req, "gradeId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let patch = match required::<GradePatch>(req, "patch") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match state.ledger.update_grade(grade_id, patch) {
        Ok(()) => ok(&req.id, json!({ "grade": state.ledger.grade(grade_id) })),
        Err(e) => ledger_err(&req.id, &e),
    }
}

fn handle_grades_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let grade_id = match required_i64(req, "gradeId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match state.ledger.delete_grade(grade_id) {
        Ok(()) => ok(&req.id, json!({ "ok": true })),
        Err(e) => ledger_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grades.list" => Some(handle_grades_list(state, req)),
        "grades.create" => Some(handle_grades_create(state, req)),
        "grades.update" => Some(handle_grades_update(state, req)),
        "grades.delete" => Some(handle_grades_delete(state, req)),
        _ => None,
    }
}
