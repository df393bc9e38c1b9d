mod test_support;

use serde_json::json;
use test_support::{error_code, request_err, request_ok, seeded_sidecar};

#[test]
fn doubts_flow_from_student_to_teacher_and_back() {
    let (_child, mut stdin, mut reader) = seeded_sidecar("student360-doubts-flow");

    let open = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "student.askDoubt",
        json!({ "student_id": "S001", "question_text": "What is a vector?" }),
    );
    assert_eq!(open["message"], json!("Your doubt has been submitted successfully!"));
    let open_id = open["doubt_id"].as_i64().expect("doubt_id");

    let directed = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "student.askDoubt",
        json!({ "student_id": "S005", "teacher_id": "T002", "question_text": "Essay length?" }),
    );
    let directed_id = directed["doubt_id"].as_i64().expect("doubt_id");

    // Unassigned doubts reach every teacher; directed ones only their teacher.
    let t1 = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "teacher.doubts",
        json!({ "teacher_id": "T001" }),
    );
    let t1_ids: Vec<i64> = t1["doubts"]
        .as_array()
        .expect("doubts")
        .iter()
        .map(|d| d["id"].as_i64().expect("id"))
        .collect();
    assert_eq!(t1_ids, vec![open_id]);

    let t2 = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "teacher.doubts",
        json!({ "teacher_id": "T002" }),
    );
    assert_eq!(t2["doubts"].as_array().expect("doubts").len(), 2);
    assert_eq!(t2["doubts"][1]["student_name"], json!("Ethan Hunt"));

    let answered = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "doubts.answer",
        json!({ "doubt_id": open_id, "answer_text": "A quantity with direction." }),
    );
    assert_eq!(answered["message"], json!("Doubt answered successfully."));

    let resolved = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "doubts.resolve",
        json!({ "doubt_id": directed_id.to_string() }),
    );
    assert_eq!(resolved["message"], json!("Doubt marked as resolved."));

    let t2_after = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "teacher.doubts",
        json!({ "teacher_id": "T002" }),
    );
    assert_eq!(t2_after["doubts"], json!([]));

    let mine = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "student.doubts",
        json!({ "student_id": "S001" }),
    );
    let doubt = &mine["doubts"][0];
    assert_eq!(doubt["answer_text"], json!("A quantity with direction."));
    assert_eq!(doubt["is_resolved"], json!(true));
    assert_eq!(doubt["teacher_id"], json!(null));
}

#[test]
fn invalid_doubt_requests_are_rejected() {
    let (_child, mut stdin, mut reader) = seeded_sidecar("student360-doubts-invalid");

    let blank = request_err(
        &mut stdin,
        &mut reader,
        "1",
        "student.askDoubt",
        json!({ "student_id": "S001", "question_text": "   " }),
    );
    assert_eq!(error_code(&blank), "bad_params");
    assert_eq!(blank["message"], json!("Missing student ID or question text."));

    let ghost = request_err(
        &mut stdin,
        &mut reader,
        "2",
        "student.askDoubt",
        json!({ "student_id": "S999", "question_text": "Hello?" }),
    );
    assert_eq!(error_code(&ghost), "not_found");

    let ghost_teacher = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "student.askDoubt",
        json!({ "student_id": "S001", "teacher_id": "T999", "question_text": "Hello?" }),
    );
    assert_eq!(error_code(&ghost_teacher), "not_found");

    let no_doubt = request_err(
        &mut stdin,
        &mut reader,
        "4",
        "doubts.resolve",
        json!({ "doubt_id": 4242 }),
    );
    assert_eq!(error_code(&no_doubt), "not_found");

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "student.askDoubt",
        json!({ "student_id": "S002", "question_text": "Photosynthesis?" }),
    );
    let empty_answer = request_err(
        &mut stdin,
        &mut reader,
        "6",
        "doubts.answer",
        json!({ "doubt_id": created["doubt_id"], "answer_text": "" }),
    );
    assert_eq!(error_code(&empty_answer), "bad_params");
}
