use crate::ipc::error::{err, ok};
use crate::ipc::helpers::required_str;
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "source": state.ledger.source().as_str(),
            "revision": state.ledger.revision(),
            "counts": {
                "students": state.ledger.students().len(),
                "subjects": state.ledger.subjects().len(),
                "grades": state.ledger.grades().len()
            }
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let path = match required_str(req, "path") {
        Ok(v) => PathBuf::from(v),
        Err(e) => return e,
    };

    match state.open_workspace(&path) {
        Ok(()) => ok(
            &req.id,
            json!({
                "workspacePath": path.to_string_lossy(),
                "source": state.ledger.source().as_str()
            }),
        ),
        Err(e) => err(&req.id, "db_open_failed", format!("{e:?}"), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        _ => None,
    }
}
