//! Fallback dataset used when a workspace has no usable stored collections.
//!
//! Records look randomized but are generated from a fixed RNG seed, so the
//! same seed always produces the same dataset.

use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::model::{Dataset, EvaluationType, Grade, Student, Subject};

pub const DEFAULT_RNG_SEED: u64 = 20_240_902;

const CLASSES: [&str; 3] = ["5A", "5B", "6A"];

const STUDENT_NAMES: [&str; 15] = [
    "Ana Garcia",
    "Bruno Diaz",
    "Carla Romero",
    "Daniel Navarro",
    "Elena Torres",
    "Felipe Castro",
    "Gabriela Ortiz",
    "Hugo Molina",
    "Irene Vargas",
    "Javier Rubio",
    "Lucia Herrera",
    "Mateo Silva",
    "Nora Medina",
    "Pablo Guerrero",
    "Sofia Reyes",
];

const SUBJECTS: [(&str, &str, &str); 13] = [
    ("Mathematics", "Sciences", "MAT"),
    ("Physics", "Sciences", "PHY"),
    ("Chemistry", "Sciences", "CHE"),
    ("Biology", "Sciences", "BIO"),
    ("Language", "Humanities", "LAN"),
    ("History", "Humanities", "HIS"),
    ("Philosophy", "Humanities", "PHI"),
    ("Geography", "Humanities", "GEO"),
    ("English", "Languages", "ENG"),
    ("French", "Languages", "FRE"),
    ("Music", "Arts and Sports", "MUS"),
    ("Visual Arts", "Arts and Sports", "ART"),
    ("Physical Education", "Arts and Sports", "PED"),
];

/// First day of the term the seed grades are spread over.
fn term_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 9, 2).unwrap_or_default()
}

const TERM_DAYS: i64 = 120;

fn email_for(name: &str) -> String {
    let local = name.to_ascii_lowercase().replace(' ', ".");
    format!("{}@sina.school", local)
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

pub fn seed_students() -> Vec<Student> {
    STUDENT_NAMES
        .iter()
        .enumerate()
        .map(|(i, name)| Student {
            id: (i + 1) as i64,
            name: (*name).to_string(),
            email: email_for(name),
            class_name: CLASSES[i % CLASSES.len()].to_string(),
        })
        .collect()
}

pub fn seed_subjects() -> Vec<Subject> {
    SUBJECTS
        .iter()
        .enumerate()
        .map(|(i, (name, area, code))| Subject {
            id: (i + 1) as i64,
            name: (*name).to_string(),
            area: (*area).to_string(),
            code: (*code).to_string(),
        })
        .collect()
}

/// One grade per student and subject.
pub fn seed_dataset(rng_seed: u64) -> Dataset {
    let mut rng = StdRng::seed_from_u64(rng_seed);
    let students = seed_students();
    let subjects = seed_subjects();
    let start = term_start();

    let mut grades = Vec::with_capacity(students.len() * subjects.len());
    for student in &students {
        for subject in &subjects {
            let kind = EvaluationType::ALL[rng.gen_range(0..EvaluationType::ALL.len())];
            grades.push(Grade {
                id: (grades.len() + 1) as i64,
                student_id: student.id,
                subject_id: subject.id,
                grade: round1(rng.gen_range(2.0..=10.0)),
                attendance: round1(rng.gen_range(60.0..=100.0)),
                kind,
                date: start + Duration::days(rng.gen_range(0..TERM_DAYS)),
                notes: None,
            });
        }
    }

    log::info!(
        "generated seed dataset: {} students, {} subjects, {} grades",
        students.len(),
        subjects.len(),
        grades.len()
    );

    Dataset {
        students,
        subjects,
        grades,
    }
}
