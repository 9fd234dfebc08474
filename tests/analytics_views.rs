mod test_support;

use serde_json::json;
use test_support::{
    add_mark, add_student, add_subject, error_code, f64_at, request_err, request_ok,
    spawn_sidecar, temp_dir,
};

fn graded(id: &str, student: &str, subject: &str, m: i64, max: i64, pct: f64, grade: &str) -> serde_json::Value {
    json!({
        "id": id,
        "studentId": student,
        "subjectId": subject,
        "marksObtained": m,
        "maxMarks": max,
        "assessmentType": "Quiz",
        "assessmentDate": "2024-03-15",
        "percentage": pct,
        "grade": grade,
    })
}

#[test]
fn compute_aggregates_caller_records_and_rejects_inconsistent_ones() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let records = json!([
        graded("r1", "s2", "math", 80, 100, 80.0, "A"),
        graded("r2", "s1", "math", 45, 100, 45.0, "C"),
        graded("r3", "s3", "sci", 92, 100, 92.0, "A+"),
        graded("r4", "s1", "sci", 92, 100, 92.0, "A+"),
    ]);
    let r = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "analytics.compute",
        json!({ "records": records, "limit": 2 }),
    );
    assert_eq!(r["summary"]["count"], 4);
    assert_eq!(f64_at(&r, "/summary/meanPercentage"), 77.25);
    let top = r["topPerformers"].as_array().expect("top");
    assert_eq!(top.len(), 2);
    // Equal percentages fall back to student id order.
    assert_eq!(top[0]["id"], "r4");
    assert_eq!(top[1]["id"], "r3");
    assert_eq!(r["subjects"][0]["subjectId"], "sci");
    assert_eq!(r["students"][0]["studentId"], "s3");

    let empty = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "analytics.compute",
        json!({ "records": [] }),
    );
    assert_eq!(empty["summary"]["count"], 0);
    assert_eq!(f64_at(&empty, "/summary/meanPercentage"), 0.0);

    let mismatched = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "analytics.compute",
        json!({ "records": [graded("bad", "s1", "math", 50, 100, 50.0, "A+")] }),
    );
    assert_eq!(error_code(&mismatched), "invalid_state");

    let out_of_range = request_err(
        &mut stdin,
        &mut reader,
        "4",
        "analytics.compute",
        json!({ "records": [graded("bad", "s1", "math", 150, 100, 150.0, "A+")] }),
    );
    assert_eq!(error_code(&out_of_range), "invalid_state");

    let unknown_band = request_err(
        &mut stdin,
        &mut reader,
        "4a",
        "analytics.compute",
        json!({ "records": [graded("d", "s1", "math", 50, 100, 50.0, "D")] }),
    );
    assert_eq!(error_code(&unknown_band), "invalid_state");

    let wrong_percentage = request_err(
        &mut stdin,
        &mut reader,
        "4b",
        "analytics.compute",
        json!({ "records": [graded("w", "s1", "math", 10, 100, 95.0, "A+")] }),
    );
    assert_eq!(error_code(&wrong_percentage), "invalid_state");

    let huge = graded("h", "s1", "math", i64::MAX, i64::MAX, 100.0, "A+");
    let overflow = request_err(
        &mut stdin,
        &mut reader,
        "4c",
        "analytics.compute",
        json!({ "records": [huge.clone(), huge] }),
    );
    assert_eq!(error_code(&overflow), "invalid_state");
    // The process is still serving after the rejected batches.
    let _ = request_ok(&mut stdin, &mut reader, "4d", "health", json!({}));

    let malformed = request_err(
        &mut stdin,
        &mut reader,
        "5",
        "analytics.compute",
        json!({ "records": [{ "id": "x", "grade": "Z" }] }),
    );
    assert_eq!(error_code(&malformed), "bad_params");
}

#[test]
fn student_ranking_class_wise_and_report_cards() {
    let workspace = temp_dir("gradebook-analytics-views");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let asha = add_student(&mut stdin, &mut reader, "2", "Asha Rao", "9", "A");
    let bilal = add_student(&mut stdin, &mut reader, "3", "Bilal Khan", "9", "A");
    let chen = add_student(&mut stdin, &mut reader, "4", "Chen Wei", "10", "B");
    let idle = add_student(&mut stdin, &mut reader, "5", "Idle Person", "10", "B");
    let maths = add_subject(&mut stdin, &mut reader, "6", "Mathematics");
    let art = add_subject(&mut stdin, &mut reader, "7", "Art");

    // Asha: 45/50 + 30/50 = 75/100; Bilal: 19/20 = 95%; Chen: 35/100.
    let _ = add_mark(&mut stdin, &mut reader, "8", &asha, &maths, 45, 50);
    let _ = add_mark(&mut stdin, &mut reader, "9", &asha, &art, 30, 50);
    let _ = add_mark(&mut stdin, &mut reader, "10", &bilal, &art, 19, 20);
    let _ = add_mark(&mut stdin, &mut reader, "11", &chen, &maths, 35, 100);

    let ranked = request_ok(
        &mut stdin,
        &mut reader,
        "12",
        "analytics.topPerformers",
        json!({ "limit": 2 }),
    );
    let students = ranked["students"].as_array().expect("students");
    assert_eq!(students.len(), 2);
    assert_eq!(students[0]["studentName"], "Bilal Khan");
    assert_eq!(f64_at(&students[0], "/percentage"), 95.0);
    assert_eq!(students[1]["studentName"], "Asha Rao");
    assert_eq!(students[1]["totalObtained"], 75);
    assert_eq!(students[1]["totalMax"], 100);
    assert_eq!(students[1]["grade"], "B+");

    let bad_limit = request_err(
        &mut stdin,
        &mut reader,
        "13",
        "analytics.topPerformers",
        json!({ "limit": 0 }),
    );
    assert_eq!(error_code(&bad_limit), "bad_params");

    let card = request_ok(
        &mut stdin,
        &mut reader,
        "14",
        "analytics.student.open",
        json!({ "studentId": asha }),
    );
    assert_eq!(card["student"]["name"], "Asha Rao");
    assert_eq!(card["reportCard"]["subjectCount"], 2);
    assert_eq!(card["reportCard"]["subjects"][0]["subjectName"], "Mathematics");
    assert_eq!(card["reportCard"]["subjects"][0]["grade"], "A+");
    assert_eq!(card["reportCard"]["passingSubjects"], 2);
    assert_eq!(
        card["assessmentTypes"],
        json!([{ "assessmentType": "Unit Test", "count": 2 }])
    );
    // Both marks share a date, so one sits in each trend window.
    assert_eq!(card["trend"]["recentCount"], 1);
    assert_eq!(card["trend"]["previousCount"], 1);
    assert_ne!(card["trend"]["direction"], "insufficient_data");

    let blank = request_ok(
        &mut stdin,
        &mut reader,
        "15",
        "analytics.student.open",
        json!({ "studentId": idle }),
    );
    assert!(blank["reportCard"].is_null());
    assert_eq!(blank["trend"]["direction"], "insufficient_data");
    assert_eq!(blank["assessmentTypes"], json!([]));
    assert_eq!(blank["summary"]["count"], 0);

    let missing = request_err(
        &mut stdin,
        &mut reader,
        "16",
        "analytics.student.open",
        json!({ "studentId": "nobody" }),
    );
    assert_eq!(error_code(&missing), "not_found");

    let wise = request_ok(&mut stdin, &mut reader, "17", "analytics.classWise", json!({}));
    let classes = wise["classes"].as_array().expect("classes");
    assert_eq!(classes.len(), 2);
    assert_eq!(classes[0]["className"], "10");
    assert_eq!(classes[0]["studentCount"], 2);
    assert_eq!(classes[0]["summary"]["failCount"], 1);
    assert_eq!(classes[1]["className"], "9");
    assert_eq!(classes[1]["topStudent"]["studentName"], "Bilal Khan");

    let compare = request_ok(
        &mut stdin,
        &mut reader,
        "18",
        "analytics.subjects.compare",
        json!({ "className": "9", "section": "A" }),
    );
    let subjects = compare["subjects"].as_array().expect("subjects");
    assert_eq!(subjects.len(), 2);
    assert_eq!(subjects[0]["subjectName"], "Mathematics");
    assert_eq!(f64_at(&subjects[0], "/meanPercentage"), 90.0);
    assert_eq!(subjects[1]["subjectName"], "Art");
    assert_eq!(f64_at(&subjects[1], "/meanPercentage"), 77.5);

    let overview = request_ok(&mut stdin, &mut reader, "19", "analytics.overview", json!({}));
    assert_eq!(overview["counts"]["studentCount"], 4);
    assert_eq!(overview["counts"]["markCount"], 4);
    assert_eq!(overview["classCount"], 2);
    assert_eq!(overview["summary"]["count"], 4);
    assert_eq!(overview["topStudents"][0]["studentName"], "Bilal Khan");
}
