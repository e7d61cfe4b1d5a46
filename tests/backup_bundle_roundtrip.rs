mod test_support;

use serde_json::json;
use test_support::{spawn_sidecar, spawn_sidecar_with_env};

#[test]
fn bundle_restores_the_exported_state() {
    let dir = tempfile::tempdir().expect("tempdir");
    let workspace = dir.path().join("workspace");
    let bundle = dir.path().join("backup.zip");
    let mut sidecar = spawn_sidecar();

    let selected = sidecar.request_ok(
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    assert_eq!(selected["source"], json!("seeded"));

    let exported = sidecar.request_ok(
        "2",
        "backup.export",
        json!({ "outPath": bundle.to_string_lossy() }),
    );
    assert!(bundle.is_file());
    assert_eq!(exported["dbSha256"].as_str().map(|s| s.len()), Some(64));

    sidecar.request_ok("3", "students.delete", json!({ "studentId": 1 }));
    let health = sidecar.request_ok("4", "health", json!({}));
    assert_eq!(health["counts"]["students"], json!(14));

    let imported = sidecar.request_ok(
        "5",
        "backup.import",
        json!({ "inPath": bundle.to_string_lossy() }),
    );
    assert_eq!(imported["bundleId"], exported["bundleId"]);
    assert_eq!(imported["source"], json!("stored"));
    assert_eq!(imported["counts"]["students"], json!(15));
    assert_eq!(imported["counts"]["grades"], json!(15 * 13));

    let student = sidecar.request_ok("6", "analytics.student.open", json!({ "studentId": 1 }));
    assert_eq!(student["student"]["id"], json!(1));
}

#[test]
fn configured_workspace_is_opened_at_startup() {
    let dir = tempfile::tempdir().expect("tempdir");
    let workspace = dir.path().join("ws");

    {
        let mut first = spawn_sidecar_with_env(&[("SINA_WORKSPACE", workspace.as_path())]);
        let health = first.request_ok("1", "health", json!({}));
        assert_eq!(health["source"], json!("seeded"));
        first.request_ok(
            "2",
            "subjects.create",
            json!({ "name": "Robotics", "area": "Sciences", "code": "ROB" }),
        );
    }

    let mut second = spawn_sidecar_with_env(&[("SINA_WORKSPACE", workspace.as_path())]);
    let health = second.request_ok("1", "health", json!({}));
    assert_eq!(health["source"], json!("stored"));
    assert_eq!(health["counts"]["subjects"], json!(14));
}

#[test]
fn tampered_bundle_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let workspace = dir.path().join("workspace");
    let bogus = dir.path().join("bogus.zip");
    std::fs::write(&bogus, b"not a zip").expect("write bogus bundle");
    let mut sidecar = spawn_sidecar();

    sidecar.request_ok(
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let code = sidecar.request_err(
        "2",
        "backup.import",
        json!({ "inPath": bogus.to_string_lossy() }),
    );
    assert_eq!(code, "backup_failed");

    let health = sidecar.request_ok("3", "health", json!({}));
    assert_eq!(health["counts"]["students"], json!(15));
}
