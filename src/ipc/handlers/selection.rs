use crate::ipc::error::{err, ok};
use crate::ipc::handlers::students::selection_json;
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn visible_ids(state: &AppState) -> Vec<i64> {
    state
        .student_view
        .rows(
            state.ledger.students(),
            state.ledger.subjects(),
            state.ledger.grades(),
        )
        .iter()
        .map(|r| r.student.id)
        .collect()
}

fn handle_selection_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let visible = visible_ids(state);
    ok(&req.id, selection_json(state, &visible))
}

fn handle_selection_set(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(raw) = req.params.get("ids").and_then(|v| v.as_array()) else {
        return err(&req.id, "bad_params", "missing ids", None);
    };
    let mut ids = Vec::with_capacity(raw.len());
    for v in raw {
        let Some(id) = v.as_i64() else {
            return err(&req.id, "bad_params", "ids must contain only integers", None);
        };
        ids.push(id);
    }
    let selected = req
        .params
        .get("selected")
        .and_then(|v| v.as_bool())
        .unwrap_or(true);

    // Unknown ids are ignored.
    let selection = state.student_view.selection_mut();
    for id in ids {
        if state.ledger.student(id).is_some() {
            selection.set(id, selected);
        }
    }
    let visible = visible_ids(state);
    ok(&req.id, selection_json(state, &visible))
}

fn handle_selection_clear(state: &mut AppState, req: &Request) -> serde_json::Value {
    state.student_view.selection_mut().clear();
    ok(&req.id, json!({ "selected": [], "actionable": [] }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "selection.get" => Some(handle_selection_get(state, req)),
        "selection.set" => Some(handle_selection_set(state, req)),
        "selection.clear" => Some(handle_selection_clear(state, req)),
        _ => None,
    }
}
