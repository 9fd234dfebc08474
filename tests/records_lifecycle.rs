mod test_support;

use serde_json::json;
use test_support::{
    add_mark, add_student, add_subject, error_code, request_err, request_ok, spawn_sidecar,
    str_field, temp_dir,
};

#[test]
fn students_subjects_and_marks_round_trip_through_the_store() {
    let workspace = temp_dir("gradebook-records-lifecycle");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "students.create",
        json!({ "name": "  Meera   Nair ", "className": "10", "section": "b", "dob": "2011-02-14" }),
    );
    let meera = str_field(&created, "studentId");
    assert_eq!(created["student"]["name"], "Meera Nair");
    assert_eq!(created["student"]["section"], "B");
    assert_eq!(created["student"]["dob"], "2011-02-14");

    let bad = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "students.create",
        json!({ "name": "X", "className": "", "section": "A", "dob": "2030-01-01" }),
    );
    assert_eq!(error_code(&bad), "validation_failed");
    let problems = bad["details"]["errors"].as_array().expect("errors");
    assert_eq!(problems.len(), 3, "{:?}", problems);

    let updated = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "students.update",
        json!({
            "studentId": meera,
            "patch": { "name": "Meera Nair", "className": "10", "section": "A" }
        }),
    );
    assert_eq!(updated["student"]["section"], "A");
    assert!(updated["student"]["dob"].is_null());

    let ravi = add_student(&mut stdin, &mut reader, "5", "Ravi Kumar", "10", "A");
    let _ = add_student(&mut stdin, &mut reader, "6", "Tom Ellis", "9", "C");

    let filtered = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "students.list",
        json!({ "className": "10", "section": "A", "search": "ravi" }),
    );
    let rows = filtered["students"].as_array().expect("students");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"], json!(ravi));

    let classes = request_ok(&mut stdin, &mut reader, "8", "students.classes", json!({}));
    assert_eq!(classes["classes"], json!(["10", "9"]));
    assert_eq!(classes["sections"], json!(["A", "C"]));
    assert_eq!(classes["groups"][0]["studentCount"], 2);

    let maths = add_subject(&mut stdin, &mut reader, "9", "Mathematics");
    let dup = request_err(
        &mut stdin,
        &mut reader,
        "10",
        "subjects.create",
        json!({ "name": "mathematics" }),
    );
    assert_eq!(error_code(&dup), "conflict");
    let science = add_subject(&mut stdin, &mut reader, "11", "Science");
    let renamed = request_ok(
        &mut stdin,
        &mut reader,
        "12",
        "subjects.update",
        json!({ "subjectId": science, "name": "General Science" }),
    );
    assert_eq!(renamed["subject"]["name"], "General Science");

    let m1 = add_mark(&mut stdin, &mut reader, "13", &meera, &maths, 88, 100);
    let _ = add_mark(&mut stdin, &mut reader, "14", &meera, &science, 30, 50);
    let _ = add_mark(&mut stdin, &mut reader, "15", &ravi, &maths, 35, 100);

    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "16",
        "marks.list",
        json!({ "studentId": meera }),
    );
    let marks = listed["marks"].as_array().expect("marks");
    assert_eq!(marks.len(), 2);
    let maths_row = marks
        .iter()
        .find(|m| m["id"] == json!(m1))
        .expect("maths mark");
    assert_eq!(maths_row["grade"], "A");
    assert_eq!(maths_row["studentName"], "Meera Nair");
    assert_eq!(maths_row["subjectName"], "Mathematics");
    assert_eq!(maths_row["percentage"], 88.0);

    let moved = request_ok(
        &mut stdin,
        &mut reader,
        "17",
        "marks.update",
        json!({
            "markId": m1,
            "patch": {
                "studentId": meera,
                "subjectId": maths,
                "marksObtained": 45,
                "maxMarks": 50,
                "assessmentDate": "2024-04-02"
            }
        }),
    );
    assert_eq!(moved["mark"]["percentage"], 90.0);
    assert_eq!(moved["mark"]["grade"], "A+");
    assert_eq!(moved["mark"]["assessmentType"], "Assignment");

    let missing = request_err(
        &mut stdin,
        &mut reader,
        "18",
        "marks.create",
        json!({
            "studentId": "no-such-student",
            "subjectId": maths,
            "marksObtained": 10,
            "assessmentDate": "2024-04-02"
        }),
    );
    assert_eq!(error_code(&missing), "not_found");

    let future = request_err(
        &mut stdin,
        &mut reader,
        "19",
        "marks.create",
        json!({
            "studentId": ravi,
            "subjectId": maths,
            "marksObtained": 10,
            "assessmentDate": "2999-01-01"
        }),
    );
    assert_eq!(error_code(&future), "validation_failed");

    // Deleting a subject or student takes its marks along.
    let dropped = request_ok(
        &mut stdin,
        &mut reader,
        "20",
        "subjects.delete",
        json!({ "subjectId": science }),
    );
    assert_eq!(dropped["marksDeleted"], 1);
    let removed = request_ok(
        &mut stdin,
        &mut reader,
        "21",
        "students.delete",
        json!({ "studentId": meera }),
    );
    assert_eq!(removed["marksDeleted"], 1);

    let info = request_ok(&mut stdin, &mut reader, "22", "db.info", json!({}));
    assert_eq!(info["counts"]["studentCount"], 2);
    assert_eq!(info["counts"]["subjectCount"], 1);
    assert_eq!(info["counts"]["markCount"], 1);

    let gone = request_err(
        &mut stdin,
        &mut reader,
        "23",
        "students.get",
        json!({ "studentId": meera }),
    );
    assert_eq!(error_code(&gone), "not_found");
}
