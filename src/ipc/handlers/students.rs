use crate::ipc::error::{ledger_err, ok};
use crate::ipc::helpers::{optional, params_as, required, required_i64, round_opt};
use crate::ipc::types::{AppState, Request};
use crate::model::{NewStudent, StudentPatch};
use crate::query::{SortDirection, StudentFilter, StudentRow, StudentSortKey};
use serde_json::json;

pub(crate) fn student_row_json(row: &StudentRow) -> serde_json::Value {
    json!({
        "id": row.student.id,
        "name": row.student.name,
        "email": row.student.email,
        "class": row.student.class_name,
        "averageGrade": round_opt(row.average_grade),
        "gradeCount": row.grade_count,
        "status": row.status.as_str()
    })
}

pub(crate) fn selection_json(state: &AppState, visible: &[i64]) -> serde_json::Value {
    let selection = state.student_view.selection();
    json!({
        "selected": selection.ids(),
        "actionable": selection.actionable(visible)
    })
}

/// Params that are absent keep the current view settings.
fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let filter = match optional::<StudentFilter>(req, "filter") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let sort = match optional::<StudentSortKey>(req, "sort") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let direction = match optional::<SortDirection>(req, "direction") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let filter_changed = match filter {
        Some(f) => state.student_view.set_filter(f),
        None => false,
    };
    if sort.is_some() || direction.is_some() {
        let (cur_key, cur_dir) = state.student_view.sort();
        state
            .student_view
            .set_sort(sort.unwrap_or(cur_key), direction.unwrap_or(cur_dir));
    }

    let rows = state.student_view.rows(
        state.ledger.students(),
        state.ledger.subjects(),
        state.ledger.grades(),
    );
    let visible: Vec<i64> = rows.iter().map(|r| r.student.id).collect();
    let (sort_key, sort_dir) = state.student_view.sort();

    ok(
        &req.id,
        json!({
            "rows": rows.iter().map(student_row_json).collect::<Vec<_>>(),
            "filter": state.student_view.filter(),
            "sort": sort_key,
            "direction": sort_dir,
            "filterChanged": filter_changed,
            "classes": state.ledger.class_names(),
            "selection": selection_json(state, &visible)
        }),
    )
}

fn handle_students_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let data = match params_as::<NewStudent>(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match state.ledger.add_student(data) {
        Ok(student) => ok(&req.id, json!({ "student": student })),
        Err(e) => ledger_err(&req.id, &e),
    }
}

fn handle_students_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let student_id = match required_i64(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let patch = match required::<StudentPatch>(req, "patch") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match state.ledger.update_student(student_id, patch) {
        Ok(()) => ok(&req.id, json!({ "student": state.ledger.student(student_id) })),
        Err(e) => ledger_err(&req.id, &e),
    }
}

fn handle_students_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let student_id = match required_i64(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match state.ledger.delete_student(student_id) {
        Ok(removed) => {
            let students = state.ledger.students().to_vec();
            state
                .student_view
                .selection_mut()
                .retain_existing(&students);
            ok(
                &req.id,
                json!({ "ok": true, "deletedGrades": removed }),
            )
        }
        Err(e) => ledger_err(&req.id, &e),
    }
}

fn handle_students_grades(state: &mut AppState, req: &Request) -> serde_json::Value {
    let student_id = match required_i64(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    ok(
        &req.id,
        json!({ "grades": state.ledger.student_grades(student_id) }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(handle_students_list(state, req)),
        "students.create" => Some(handle_students_create(state, req)),
        "students.update" => Some(handle_students_update(state, req)),
        "students.delete" => Some(handle_students_delete(state, req)),
        "students.grades" => Some(handle_students_grades(state, req)),
        _ => None,
    }
}
