use crate::ipc::error::{ok, store_err};
use crate::ipc::helpers::{db_conn, required_str, today, typed_params};
use crate::ipc::types::{AppState, Request};
use crate::store::{self, StudentFilter, StudentInput};
use serde_json::json;

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let filter: StudentFilter = match typed_params(req, None) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match store::list_students(conn, &filter) {
        Ok(students) => ok(&req.id, json!({ "students": students })),
        Err(e) => store_err(&req.id, e),
    }
}

fn handle_students_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match store::get_student(conn, &student_id) {
        Ok(s) => ok(&req.id, json!({ "student": s })),
        Err(e) => store_err(&req.id, e),
    }
}

fn handle_students_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let input: StudentInput = match typed_params(req, None) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match store::create_student(conn, &input, today()) {
        Ok(s) => {
            tracing::info!(student_id = %s.id, "student created");
            ok(&req.id, json!({ "studentId": s.id, "student": s }))
        }
        Err(e) => store_err(&req.id, e),
    }
}

fn handle_students_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let input: StudentInput = match typed_params(req, Some("patch")) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match store::update_student(conn, &student_id, &input, today()) {
        Ok(s) => ok(&req.id, json!({ "student": s })),
        Err(e) => store_err(&req.id, e),
    }
}

fn handle_students_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match store::delete_student(conn, &student_id) {
        Ok(marks_deleted) => {
            tracing::info!(%student_id, marks_deleted, "student deleted");
            ok(&req.id, json!({ "ok": true, "marksDeleted": marks_deleted }))
        }
        Err(e) => store_err(&req.id, e),
    }
}

fn handle_students_classes(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let groups = match store::list_class_sections(conn) {
        Ok(v) => v,
        Err(e) => return store_err(&req.id, e),
    };
    let mut classes: Vec<&str> = groups.iter().map(|g| g.class_name.as_str()).collect();
    classes.dedup();
    let mut sections: Vec<&str> = groups.iter().map(|g| g.section.as_str()).collect();
    sections.sort();
    sections.dedup();
    ok(
        &req.id,
        json!({ "classes": classes, "sections": sections, "groups": groups }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(handle_students_list(state, req)),
        "students.get" => Some(handle_students_get(state, req)),
        "students.create" => Some(handle_students_create(state, req)),
        "students.update" => Some(handle_students_update(state, req)),
        "students.delete" => Some(handle_students_delete(state, req)),
        "students.classes" => Some(handle_students_classes(state, req)),
        _ => None,
    }
}
