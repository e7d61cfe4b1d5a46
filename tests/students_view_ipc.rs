mod test_support;

use serde_json::json;
use test_support::spawn_sidecar;

fn ids(v: &serde_json::Value) -> Vec<i64> {
    v.as_array()
        .expect("array")
        .iter()
        .filter_map(|x| x.as_i64())
        .collect()
}

fn row_ids(list: &serde_json::Value) -> Vec<i64> {
    list["rows"]
        .as_array()
        .expect("rows")
        .iter()
        .filter_map(|r| r["id"].as_i64())
        .collect()
}

#[test]
fn filter_change_clears_selection_but_sort_change_does_not() {
    let mut sidecar = spawn_sidecar();

    let sel = sidecar.request_ok("1", "selection.set", json!({ "ids": [1, 2, 999] }));
    assert_eq!(ids(&sel["selected"]), vec![1, 2]);

    let list = sidecar.request_ok("2", "students.list", json!({ "sort": "average", "direction": "desc" }));
    assert_eq!(list["filterChanged"], json!(false));
    assert_eq!(ids(&list["selection"]["selected"]), vec![1, 2]);

    let list = sidecar.request_ok("3", "students.list", json!({ "filter": { "class": "5B" } }));
    assert_eq!(list["filterChanged"], json!(true));
    assert!(ids(&list["selection"]["selected"]).is_empty());
    assert_eq!(list["sort"], json!("average"));
    assert_eq!(list["direction"], json!("desc"));
    for row in list["rows"].as_array().expect("rows") {
        assert_eq!(row["class"], json!("5B"));
    }
    assert_eq!(list["classes"], json!(["5A", "5B", "6A"]));
}

#[test]
fn actionable_selection_is_limited_to_visible_rows() {
    let mut sidecar = spawn_sidecar();

    let list = sidecar.request_ok("1", "students.list", json!({ "filter": { "class": "5A" } }));
    let visible = row_ids(&list);
    assert_eq!(visible.len(), 5);

    // Student 2 sits in 5B and stays selected but not actionable.
    let sel = sidecar.request_ok("2", "selection.set", json!({ "ids": [visible[0], 2] }));
    assert_eq!(ids(&sel["actionable"]), vec![visible[0]]);
    assert_eq!(ids(&sel["selected"]).len(), 2);

    let cleared = sidecar.request_ok("3", "selection.clear", json!({}));
    assert!(ids(&cleared["selected"]).is_empty());
}

#[test]
fn deleting_a_student_cascades_and_drops_it_from_the_selection() {
    let mut sidecar = spawn_sidecar();
    sidecar.request_ok("1", "selection.set", json!({ "ids": [3] }));

    let deleted = sidecar.request_ok("2", "students.delete", json!({ "studentId": 3 }));
    assert_eq!(deleted["deletedGrades"], json!(13));

    let grades = sidecar.request_ok("3", "students.grades", json!({ "studentId": 3 }));
    assert_eq!(grades["grades"], json!([]));

    let sel = sidecar.request_ok("4", "selection.get", json!({}));
    assert!(ids(&sel["selected"]).is_empty());

    let code = sidecar.request_err("5", "students.delete", json!({ "studentId": 3 }));
    assert_eq!(code, "not_found");
}

#[test]
fn empty_patch_keeps_grade_unchanged() {
    let mut sidecar = spawn_sidecar();

    let before = sidecar.request_ok("1", "health", json!({}));
    let rows = sidecar.request_ok("2", "grades.list", json!({ "filter": { "studentId": 1, "subjectId": 1 } }));
    let grade = rows["rows"][0].clone();
    let grade_id = grade["id"].as_i64().expect("grade id");

    let updated = sidecar.request_ok("3", "grades.update", json!({ "gradeId": grade_id, "patch": {} }));
    assert_eq!(updated["grade"]["grade"], grade["grade"]);
    assert_eq!(updated["grade"]["date"], grade["date"]);

    let after = sidecar.request_ok("4", "health", json!({}));
    assert_eq!(after["revision"], before["revision"]);
}

#[test]
fn grade_patch_is_reflected_in_class_kpis() {
    let mut sidecar = spawn_sidecar();

    let kpis = sidecar.request_ok("1", "analytics.class.kpis", json!({}));
    let before = sidecar.request_ok("2", "health", json!({}));
    let rows = sidecar.request_ok("3", "grades.list", json!({ "filter": { "studentId": 1, "subjectId": 1 } }));
    let grade = rows["rows"][0].clone();
    let grade_id = grade["id"].as_i64().expect("grade id");
    let old_value = grade["grade"].as_f64().expect("grade value");
    let new_value = if old_value < 5.0 { 10.0 } else { 0.0 };

    let updated = sidecar.request_ok(
        "4",
        "grades.update",
        json!({ "gradeId": grade_id, "patch": { "grade": new_value } }),
    );
    assert_eq!(updated["grade"]["grade"], json!(new_value));

    let after = sidecar.request_ok("5", "health", json!({}));
    assert_eq!(
        after["revision"].as_u64().expect("revision"),
        before["revision"].as_u64().expect("revision") + 1
    );

    let refreshed = sidecar.request_ok("6", "analytics.class.kpis", json!({}));
    assert_eq!(refreshed["totalEvaluations"], kpis["totalEvaluations"]);
    let total = kpis["totalEvaluations"].as_f64().expect("total");
    let expected_shift = (new_value - old_value) / total;
    let shift = refreshed["classAverage"].as_f64().expect("average")
        - kpis["classAverage"].as_f64().expect("average");
    assert!(shift != 0.0);
    assert!((shift - expected_shift).abs() < 0.011, "shift {shift} vs {expected_shift}");
}
