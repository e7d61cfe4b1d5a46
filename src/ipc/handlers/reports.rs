use crate::ipc::error::ok;
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_reports_grade_rows(state: &mut AppState, req: &Request) -> serde_json::Value {
    let rows = state.ledger.export_rows();
    ok(
        &req.id,
        json!({
            "rowCount": rows.len(),
            "rows": rows
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.gradeRows" => Some(handle_reports_grade_rows(state, req)),
        _ => None,
    }
}
