#![allow(dead_code)]

use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use sinad::model::{Dataset, EvaluationType, Grade, Student, Subject};

pub struct Sidecar {
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
}

/// Starts the sidecar without a config file so it runs on the in-memory seed.
pub fn spawn_sidecar() -> Sidecar {
    spawn_sidecar_with_env(&[])
}

pub fn spawn_sidecar_with_env(env: &[(&str, &Path)]) -> Sidecar {
    let exe = env!("CARGO_BIN_EXE_sinad");
    let mut cmd = Command::new(exe);
    cmd.env("SINA_CONFIG", "/nonexistent/sina-test.toml")
        .env_remove("SINA_WORKSPACE")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null());
    for (k, v) in env {
        cmd.env(k, v);
    }
    let mut child = cmd.spawn().expect("spawn sinad");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    Sidecar {
        child,
        stdin,
        reader: BufReader::new(stdout),
    }
}

impl Sidecar {
    pub fn send_line(&mut self, line: &str) -> serde_json::Value {
        writeln!(self.stdin, "{}", line).expect("write request");
        self.stdin.flush().expect("flush request");
        let mut out = String::new();
        self.reader.read_line(&mut out).expect("read response line");
        assert!(!out.trim().is_empty(), "empty response");
        serde_json::from_str(out.trim()).expect("parse response json")
    }

    pub fn request(&mut self, id: &str, method: &str, params: serde_json::Value) -> serde_json::Value {
        let payload = json!({
            "id": id,
            "method": method,
            "params": params,
        });
        let value = self.send_line(&payload.to_string());
        assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
        value
    }

    pub fn request_ok(&mut self, id: &str, method: &str, params: serde_json::Value) -> serde_json::Value {
        let value = self.request(id, method, params);
        assert_eq!(
            value.get("ok").and_then(|v| v.as_bool()),
            Some(true),
            "{} failed: {}",
            method,
            value
        );
        value.get("result").cloned().unwrap_or_default()
    }

    pub fn request_err(&mut self, id: &str, method: &str, params: serde_json::Value) -> String {
        let value = self.request(id, method, params);
        assert_eq!(
            value.get("ok").and_then(|v| v.as_bool()),
            Some(false),
            "{} unexpectedly succeeded: {}",
            method,
            value
        );
        value["error"]["code"].as_str().unwrap_or("").to_string()
    }
}

impl Drop for Sidecar {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

pub fn date(y: i32, m: u32, d: u32) -> chrono::NaiveDate {
    chrono::NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

pub fn student(id: i64, name: &str, class_name: &str) -> Student {
    Student {
        id,
        name: name.to_string(),
        email: format!("{}@example.test", name.to_ascii_lowercase()),
        class_name: class_name.to_string(),
    }
}

pub fn subject(id: i64, name: &str) -> Subject {
    Subject {
        id,
        name: name.to_string(),
        area: "General".to_string(),
        code: name.chars().take(3).collect::<String>().to_ascii_uppercase(),
    }
}

pub fn grade(id: i64, student_id: i64, subject_id: i64, value: f64, attendance: f64) -> Grade {
    Grade {
        id,
        student_id,
        subject_id,
        grade: value,
        attendance,
        kind: EvaluationType::Exam,
        date: date(2024, 10, 1),
        notes: None,
    }
}

/// Two classes, three subjects, and students covering every status.
pub fn small_dataset() -> Dataset {
    Dataset {
        students: vec![
            student(1, "Ana", "5A"),
            student(2, "Bruno", "5A"),
            student(3, "Carla", "5B"),
            student(4, "Daniel", "5B"),
        ],
        subjects: vec![subject(1, "Math"), subject(2, "History"), subject(3, "Music")],
        grades: vec![
            grade(1, 1, 1, 8.0, 90.0),
            grade(2, 1, 2, 4.0, 80.0),
            grade(3, 2, 1, 5.0, 70.0),
            grade(4, 2, 3, 5.5, 75.0),
            grade(5, 3, 2, 2.0, 60.0),
            grade(6, 3, 1, 3.5, 65.0),
        ],
    }
}
