use crate::calc;
use crate::error::{EntityKind, LedgerError};
use crate::insight::StudentContext;
use crate::ipc::error::{ledger_err, ok};
use crate::ipc::helpers::required_i64;
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_insights_student(state: &mut AppState, req: &Request) -> serde_json::Value {
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
    let ctx = StudentContext {
        student,
        summary: calc::student_summary(student_id, &grades),
        subjects: calc::student_subject_averages(student_id, state.ledger.subjects(), &grades),
    };
    let text = state.insights.student_insight(&ctx);
    ok(
        &req.id,
        json!({
            "studentId": student_id,
            "status": ctx.summary.status.as_str(),
            "text": text
        }),
    )
}

fn handle_insights_class(state: &mut AppState, req: &Request) -> serde_json::Value {
    let kpi = state.ledger.class_kpis();
    ok(&req.id, json!({ "text": state.insights.class_insight(&kpi) }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "insights.student" => Some(handle_insights_student(state, req)),
        "insights.class" => Some(handle_insights_class(state, req)),
        _ => None,
    }
}
