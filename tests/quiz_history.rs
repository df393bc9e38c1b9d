mod test_support;

use serde_json::json;
use test_support::{error_code, request_err, request_ok, seeded_sidecar};

fn attempt(subject: &str, score: i64) -> serde_json::Value {
    json!({
        "student_id": "S001",
        "subject": subject,
        "score": score,
        "total_questions": 5,
        "accuracy": score as f64 * 20.0,
        "time_taken_seconds": 95,
        "details": { "questions": [{ "q": "2+2", "answer": "4", "correct": true }] }
    })
}

#[test]
fn attempts_are_listed_newest_first_and_counted() {
    let (_child, mut stdin, mut reader) = seeded_sidecar("student360-quiz-history");

    let first = request_ok(&mut stdin, &mut reader, "1", "student.quizAttempt", attempt("Math", 4));
    assert_eq!(first["message"], json!("Quiz attempt saved successfully."));
    let _ = request_ok(&mut stdin, &mut reader, "2", "student.quizAttempt", attempt("Science", 3));

    let history = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "student.quizHistory",
        json!({ "student_id": "S001" }),
    );
    let rows = history["history"].as_array().expect("history");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["subject"], json!("Science"));
    assert_eq!(rows[1]["subject"], json!("Math"));
    assert_eq!(rows[1]["accuracy"], json!(80.0));
    assert_eq!(rows[1]["time_taken_seconds"], json!(95));
    assert_eq!(rows[1]["details"]["questions"][0]["answer"], json!("4"));

    let login = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "auth.login",
        json!({ "username": "alice.j", "password": "student123", "role": "student" }),
    );
    assert_eq!(login["user"]["quizzesTaken"], json!(2));

    let other = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "student.quizHistory",
        json!({ "student_id": "S002" }),
    );
    assert_eq!(other["history"], json!([]));
}

#[test]
fn malformed_attempts_are_rejected() {
    let (_child, mut stdin, mut reader) = seeded_sidecar("student360-quiz-invalid");

    let missing = request_err(
        &mut stdin,
        &mut reader,
        "1",
        "student.quizAttempt",
        json!({ "student_id": "S001", "subject": "Math", "score": 1 }),
    );
    assert_eq!(error_code(&missing), "bad_params");
    assert_eq!(
        missing["details"]["missing"],
        json!(["total_questions", "accuracy", "time_taken_seconds", "details"])
    );

    let mut too_high = attempt("Math", 4);
    too_high["score"] = json!(6);
    let e = request_err(&mut stdin, &mut reader, "2", "student.quizAttempt", too_high);
    assert_eq!(error_code(&e), "bad_params");

    let mut ghost = attempt("Math", 4);
    ghost["student_id"] = json!("S999");
    let e = request_err(&mut stdin, &mut reader, "3", "student.quizAttempt", ghost);
    assert_eq!(error_code(&e), "not_found");

    let e = request_err(
        &mut stdin,
        &mut reader,
        "4",
        "student.quizHistory",
        json!({ "student_id": "S999" }),
    );
    assert_eq!(error_code(&e), "not_found");
}
