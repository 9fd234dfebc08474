use crate::grading::{self, AssessmentRecord, GradingPolicy};
use crate::ipc::error::{err, grade_err, ok, store_err};
use crate::ipc::helpers::{db_conn, name_maps, required_str, today, typed_params};
use crate::ipc::types::{AppState, Request};
use crate::store::{self, MarkFilter, MarkInput};
use serde_json::json;
use std::collections::HashMap;

/// A stored mark plus its grade under the current policy. Rows that no longer
/// grade (an over-max score after switching back to reject) carry the reason
/// instead of failing the whole listing.
fn graded_row(
    r: &AssessmentRecord,
    policy: &GradingPolicy,
    student_names: &HashMap<String, String>,
    subject_names: &HashMap<String, String>,
) -> serde_json::Value {
    let mut row = json!({
        "id": r.id,
        "studentId": r.student_id,
        "studentName": student_names.get(&r.student_id),
        "subjectId": r.subject_id,
        "subjectName": subject_names.get(&r.subject_id),
        "marksObtained": r.marks_obtained,
        "maxMarks": r.max_marks,
        "assessmentType": r.assessment_type,
        "assessmentDate": r.assessment_date,
    });
    match grading::grade_with_policy(r.marks_obtained, r.max_marks, policy.over_max) {
        Ok(g) => {
            row["percentage"] = json!(policy.display(g.percentage));
            row["grade"] = json!(g.grade);
            row["pass"] = json!(g.grade.is_pass());
        }
        Err(e) => {
            row["percentage"] = serde_json::Value::Null;
            row["grade"] = serde_json::Value::Null;
            row["gradeError"] = json!({ "code": e.code(), "message": e.to_string() });
        }
    }
    row
}

fn handle_marks_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let filter: MarkFilter = match typed_params(req, None) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let records = match store::list_marks(conn, &filter) {
        Ok(v) => v,
        Err(e) => return store_err(&req.id, e),
    };
    let (students, subjects) = match name_maps(conn) {
        Ok(v) => v,
        Err(e) => return store_err(&req.id, e),
    };
    let policy = state.grading.policy;
    let rows: Vec<serde_json::Value> = records
        .iter()
        .map(|r| graded_row(r, &policy, &students, &subjects))
        .collect();
    ok(&req.id, json!({ "marks": rows }))
}

fn handle_marks_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let input: MarkInput = match typed_params(req, None) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let policy = state.grading.policy;
    let record = match store::create_mark(conn, &input, policy.over_max, today()) {
        Ok(v) => v,
        Err(e) => return store_err(&req.id, e),
    };
    let (students, subjects) = match name_maps(conn) {
        Ok(v) => v,
        Err(e) => return store_err(&req.id, e),
    };
    ok(
        &req.id,
        json!({
            "markId": record.id,
            "mark": graded_row(&record, &policy, &students, &subjects),
        }),
    )
}

fn handle_marks_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let mark_id = match required_str(req, "markId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let input: MarkInput = match typed_params(req, Some("patch")) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let policy = state.grading.policy;
    let record = match store::update_mark(conn, &mark_id, &input, policy.over_max, today()) {
        Ok(v) => v,
        Err(e) => return store_err(&req.id, e),
    };
    let (students, subjects) = match name_maps(conn) {
        Ok(v) => v,
        Err(e) => return store_err(&req.id, e),
    };
    ok(
        &req.id,
        json!({ "mark": graded_row(&record, &policy, &students, &subjects) }),
    )
}

fn handle_marks_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let mark_id = match required_str(req, "markId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match store::delete_mark(conn, &mark_id) {
        Ok(()) => ok(&req.id, json!({ "ok": true })),
        Err(e) => store_err(&req.id, e),
    }
}

fn handle_marks_grade(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(marks_obtained) = req.params.get("marksObtained").and_then(|v| v.as_i64()) else {
        return err(&req.id, "bad_params", "marksObtained must be an integer", None);
    };
    let max_marks = match req.params.get("maxMarks") {
        None => 100,
        Some(v) if v.is_null() => 100,
        Some(v) => match v.as_i64() {
            Some(n) => n,
            None => return err(&req.id, "bad_params", "maxMarks must be an integer", None),
        },
    };
    let policy = state.grading.policy;
    match grading::grade_with_policy(marks_obtained, max_marks, policy.over_max) {
        Ok(g) => ok(
            &req.id,
            json!({
                "percentage": policy.display(g.percentage),
                "percentageExact": g.percentage,
                "grade": g.grade,
                "pass": g.grade.is_pass(),
                "overMaxPolicy": policy.over_max,
            }),
        ),
        Err(e) => grade_err(&req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "marks.list" => Some(handle_marks_list(state, req)),
        "marks.create" => Some(handle_marks_create(state, req)),
        "marks.update" => Some(handle_marks_update(state, req)),
        "marks.delete" => Some(handle_marks_delete(state, req)),
        "marks.grade" => Some(handle_marks_grade(state, req)),
        _ => None,
    }
}
