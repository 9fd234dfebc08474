use crate::analytics::{self, AnalyticsReport};
use crate::db;
use crate::grading::{self, GradedRecord, GradedRecordWire};
use crate::ipc::error::{err, grade_err, ok, store_err};
use crate::ipc::helpers::{db_conn, name_maps, optional_limit, required_str, typed_params};
use crate::ipc::types::{AppState, Request};
use crate::memo;
use crate::store::{self, MarkFilter, StudentFilter};
use serde_json::{json, Value};
use std::collections::HashMap;

/// Graded, aggregated and display-rounded report for the marks matching `filter`,
/// served from the memo cache when the same records were aggregated before.
fn cached_report(
    state: &mut AppState,
    req: &Request,
    filter: &MarkFilter,
    top_limit: usize,
) -> Result<AnalyticsReport, Value> {
    let AppState {
        db, grading: cfg, cache, ..
    } = state;
    let Some(conn) = db.as_ref() else {
        return Err(err(&req.id, "no_workspace", "select a workspace first", None));
    };
    let records = store::list_marks(conn, filter).map_err(|e| store_err(&req.id, e))?;
    let policy = cfg.policy;
    let key = memo::fingerprint(&records, &policy, top_limit);
    let report = cache
        .get_or_try_insert_with(key, || {
            let graded = grading::grade_records(&records, &policy)?;
            analytics::build_report(&graded, top_limit)
        })
        .map_err(|e| grade_err(&req.id, e))?;
    Ok(report.for_display(&policy))
}

/// Adds `studentName` / `subjectName` next to every id the report carries.
fn attach_names(
    value: &mut Value,
    students: &HashMap<String, String>,
    subjects: &HashMap<String, String>,
) {
    match value {
        Value::Array(items) => {
            for v in items {
                attach_names(v, students, subjects);
            }
        }
        Value::Object(map) => {
            let student = map
                .get("studentId")
                .and_then(|v| v.as_str())
                .and_then(|id| students.get(id))
                .cloned();
            let subject = map
                .get("subjectId")
                .and_then(|v| v.as_str())
                .and_then(|id| subjects.get(id))
                .cloned();
            if let Some(name) = student {
                map.insert("studentName".into(), Value::String(name));
            }
            if let Some(name) = subject {
                map.insert("subjectName".into(), Value::String(name));
            }
            for v in map.values_mut() {
                attach_names(v, students, subjects);
            }
        }
        _ => {}
    }
}

fn named(state: &AppState, req: &Request, mut value: Value) -> Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match name_maps(conn) {
        Ok((students, subjects)) => {
            attach_names(&mut value, &students, &subjects);
            ok(&req.id, value)
        }
        Err(e) => store_err(&req.id, e),
    }
}

fn handle_analytics_overview(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let mut counts = serde_json::Map::new();
    for (key, table) in [
        ("studentCount", "students"),
        ("subjectCount", "subjects"),
        ("markCount", "marks"),
    ] {
        match db::table_count(conn, table) {
            Ok(n) => {
                counts.insert(key.into(), json!(n));
            }
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        }
    }
    let class_count = match store::list_class_sections(conn) {
        Ok(groups) => groups.len(),
        Err(e) => return store_err(&req.id, e),
    };
    let limit = state.grading.top_performers_limit;
    let report = match cached_report(state, req, &MarkFilter::default(), limit) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let top_students: Vec<_> = report.students.iter().take(limit).collect();
    named(
        state,
        req,
        json!({
            "counts": counts,
            "classCount": class_count,
            "summary": report.summary,
            "subjects": report.subjects,
            "topStudents": top_students,
            "topPerformers": report.top_performers,
        }),
    )
}

fn handle_analytics_class_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let class_name = match required_str(req, "className") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let section = match required_str(req, "section") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let students = match store::list_students(
        conn,
        &StudentFilter {
            class_name: Some(class_name.clone()),
            section: Some(section.clone()),
            search: None,
        },
    ) {
        Ok(v) => v,
        Err(e) => return store_err(&req.id, e),
    };
    let filter = MarkFilter {
        class_name: Some(class_name.clone()),
        section: Some(section.clone()),
        ..Default::default()
    };
    let limit = state.grading.top_performers_limit;
    let report = match cached_report(state, req, &filter, limit) {
        Ok(v) => v,
        Err(e) => return e,
    };
    named(
        state,
        req,
        json!({
            "className": class_name,
            "section": section,
            "studentCount": students.len(),
            "summary": report.summary,
            "topPerformers": report.top_performers,
            "subjects": report.subjects,
            "students": report.students,
        }),
    )
}

fn handle_analytics_student_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student = match store::get_student(conn, &student_id) {
        Ok(v) => v,
        Err(e) => return store_err(&req.id, e),
    };
    let filter = MarkFilter {
        student_id: Some(student_id),
        ..Default::default()
    };
    let policy = state.grading.policy;
    let graded = match store::list_marks(conn, &filter) {
        Ok(records) => match grading::grade_records(&records, &policy) {
            Ok(v) => v,
            Err(e) => return grade_err(&req.id, e),
        },
        Err(e) => return store_err(&req.id, e),
    };
    let trend = match analytics::performance_trend(&graded) {
        Ok(v) => v.for_display(&policy),
        Err(e) => return grade_err(&req.id, e),
    };
    let assessment_types = analytics::assessment_type_counts(&graded);

    let limit = state.grading.top_performers_limit;
    let report = match cached_report(state, req, &filter, limit) {
        Ok(v) => v,
        Err(e) => return e,
    };
    // No marks yet: the card stays null and the summary carries the zero sentinels.
    let card = report.students.into_iter().next();
    named(
        state,
        req,
        json!({
            "student": student,
            "summary": report.summary,
            "reportCard": card,
            "bestAssessments": report.top_performers,
            "assessmentTypes": assessment_types,
            "trend": trend,
        }),
    )
}

fn handle_analytics_subjects_compare(state: &mut AppState, req: &Request) -> serde_json::Value {
    let filter: MarkFilter = match typed_params(req, None) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let limit = state.grading.top_performers_limit;
    let report = match cached_report(state, req, &filter, limit) {
        Ok(v) => v,
        Err(e) => return e,
    };
    named(state, req, json!({ "subjects": report.subjects }))
}

fn handle_analytics_top_performers(state: &mut AppState, req: &Request) -> serde_json::Value {
    let limit = match optional_limit(req, "limit", state.grading.top_performers_limit) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let filter: MarkFilter = match typed_params(req, None) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let report = match cached_report(state, req, &filter, limit) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let students = analytics::rank_students(report.students, Some(limit));
    named(
        state,
        req,
        json!({
            "limit": limit,
            "students": students,
            "records": report.top_performers,
        }),
    )
}

fn handle_analytics_class_wise(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let groups = match store::list_class_sections(conn) {
        Ok(v) => v,
        Err(e) => return store_err(&req.id, e),
    };
    let limit = state.grading.top_performers_limit;
    let mut classes = Vec::with_capacity(groups.len());
    for g in groups {
        let filter = MarkFilter {
            class_name: Some(g.class_name.clone()),
            section: Some(g.section.clone()),
            ..Default::default()
        };
        let report = match cached_report(state, req, &filter, limit) {
            Ok(v) => v,
            Err(e) => return e,
        };
        classes.push(json!({
            "className": g.class_name,
            "section": g.section,
            "studentCount": g.student_count,
            "summary": report.summary,
            "topStudent": report.students.first(),
        }));
    }
    named(state, req, json!({ "classes": classes }))
}

/// Aggregates graded records supplied by the caller. Nothing is read from the
/// store and nothing is cached. Any record that contradicts itself fails the
/// whole request with invalid_state.
fn handle_analytics_compute(state: &mut AppState, req: &Request) -> serde_json::Value {
    let wire: Vec<GradedRecordWire> = match typed_params(req, Some("records")) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let records: Vec<GradedRecord> = match wire
        .into_iter()
        .map(GradedRecordWire::into_graded)
        .collect()
    {
        Ok(v) => v,
        Err(e) => return grade_err(&req.id, e),
    };
    let limit = match optional_limit(req, "limit", state.grading.top_performers_limit) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let policy = state.grading.policy;
    match analytics::build_report(&records, limit) {
        Ok(report) => {
            let report = report.for_display(&policy);
            ok(
                &req.id,
                json!({
                    "summary": report.summary,
                    "topPerformers": report.top_performers,
                    "subjects": report.subjects,
                    "students": report.students,
                }),
            )
        }
        Err(e) => grade_err(&req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "analytics.overview" => Some(handle_analytics_overview(state, req)),
        "analytics.class.open" => Some(handle_analytics_class_open(state, req)),
        "analytics.student.open" => Some(handle_analytics_student_open(state, req)),
        "analytics.subjects.compare" => Some(handle_analytics_subjects_compare(state, req)),
        "analytics.topPerformers" => Some(handle_analytics_top_performers(state, req)),
        "analytics.classWise" => Some(handle_analytics_class_wise(state, req)),
        "analytics.compute" => Some(handle_analytics_compute(state, req)),
        _ => None,
    }
}
