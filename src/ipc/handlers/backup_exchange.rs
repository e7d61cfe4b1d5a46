use crate::backup;
use crate::db::MemoryStore;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::required_str;
use crate::ipc::types::{AppState, Request};
use crate::ledger::Ledger;
use serde_json::json;
use std::path::PathBuf;

fn handle_backup_export(state: &mut AppState, req: &Request) -> serde_json::Value {
    let out_path = match required_str(req, "outPath") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(workspace_path) = state.workspace.clone() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let out = PathBuf::from(&out_path);
    match backup::export_workspace_bundle(&workspace_path, &out) {
        Ok(export) => ok(
            &req.id,
            json!({
                "ok": true,
                "path": out_path,
                "bundleId": export.bundle_id,
                "dbSha256": export.db_sha256
            }),
        ),
        Err(e) => err(
            &req.id,
            "backup_failed",
            format!("{e:#}"),
            Some(json!({ "path": out_path })),
        ),
    }
}

fn handle_backup_import(state: &mut AppState, req: &Request) -> serde_json::Value {
    let in_path = match required_str(req, "inPath") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(workspace_path) = state.workspace.clone() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let src = PathBuf::from(&in_path);
    if !src.is_file() {
        return err(
            &req.id,
            "not_found",
            "bundle file not found",
            Some(json!({ "path": in_path })),
        );
    }

    // Release the database handle before the file is replaced.
    let current = state.ledger.dataset();
    state.ledger = Ledger::from_dataset(current, Box::new(MemoryStore::new()));

    let imported = backup::import_workspace_bundle(&src, &workspace_path);
    // Reopen either way so the sidecar keeps running on the workspace database.
    if let Err(e) = state.open_workspace(&workspace_path) {
        return err(&req.id, "db_open_failed", format!("{e:#}"), None);
    }

    match imported {
        Ok(import) => ok(
            &req.id,
            json!({
                "ok": true,
                "workspacePath": workspace_path.to_string_lossy(),
                "bundleId": import.bundle_id,
                "source": state.ledger.source().as_str(),
                "counts": {
                    "students": state.ledger.students().len(),
                    "subjects": state.ledger.subjects().len(),
                    "grades": state.ledger.grades().len()
                }
            }),
        ),
        Err(e) => err(
            &req.id,
            "backup_failed",
            format!("{e:#}"),
            Some(json!({ "path": in_path })),
        ),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "backup.export" => Some(handle_backup_export(state, req)),
        "backup.import" => Some(handle_backup_import(state, req)),
        _ => None,
    }
}
