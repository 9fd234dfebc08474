use crate::error::StoreError;
use crate::grading::{AssessmentRecord, OverMaxPolicy};
use crate::validation;
use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub name: String,
    pub class_name: String,
    pub section: String,
    pub dob: Option<NaiveDate>,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentInput {
    pub name: String,
    pub class_name: String,
    pub section: String,
    #[serde(default)]
    pub dob: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: String,
    pub name: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkInput {
    pub student_id: String,
    pub subject_id: String,
    pub marks_obtained: i64,
    #[serde(default)]
    pub max_marks: Option<i64>,
    #[serde(default)]
    pub assessment_type: Option<String>,
    pub assessment_date: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentFilter {
    pub class_name: Option<String>,
    pub section: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkFilter {
    pub student_id: Option<String>,
    pub subject_id: Option<String>,
    pub class_name: Option<String>,
    pub section: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassSection {
    pub class_name: String,
    pub section: String,
    pub student_count: i64,
}

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn fail_if_any(errors: Vec<String>) -> Result<(), StoreError> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(StoreError::Validation(errors))
    }
}

fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

// ---- students ----

struct CleanStudent {
    name: String,
    class_name: String,
    section: String,
    dob: Option<NaiveDate>,
}

fn clean_student(input: &StudentInput, today: NaiveDate) -> Result<CleanStudent, StoreError> {
    let mut errors = Vec::new();
    let name = validation::sanitize_input(&input.name);
    validation::check_person_name(&name, &mut errors);
    let class_name = validation::sanitize_input(&input.class_name);
    let section = validation::sanitize_input(&input.section).to_ascii_uppercase();
    validation::check_class_section(&class_name, &section, &mut errors);

    let dob = match input.dob.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        None => None,
        Some(raw) => {
            let parsed = validation::parse_date(raw, "dob", &mut errors);
            if let Some(d) = parsed {
                validation::check_date_of_birth(d, today, &mut errors);
            }
            parsed
        }
    };
    fail_if_any(errors)?;
    Ok(CleanStudent {
        name,
        class_name,
        section,
        dob,
    })
}

fn student_from_row(r: &Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        id: r.get(0)?,
        name: r.get(1)?,
        class_name: r.get(2)?,
        section: r.get(3)?,
        dob: r.get(4)?,
        created_at: r.get(5)?,
    })
}

pub fn get_student(conn: &Connection, id: &str) -> Result<Student, StoreError> {
    conn.query_row(
        "SELECT id, name, class_name, section, dob, created_at FROM students WHERE id = ?",
        [id],
        student_from_row,
    )
    .optional()?
    .ok_or(StoreError::NotFound("student"))
}

pub fn list_students(conn: &Connection, filter: &StudentFilter) -> Result<Vec<Student>, StoreError> {
    let mut sql = String::from(
        "SELECT id, name, class_name, section, dob, created_at FROM students WHERE 1 = 1",
    );
    let mut values: Vec<Value> = Vec::new();
    if let Some(c) = filter.class_name.as_deref().filter(|s| !s.trim().is_empty()) {
        sql.push_str(" AND class_name = ?");
        values.push(Value::Text(c.trim().to_string()));
    }
    if let Some(s) = filter.section.as_deref().filter(|s| !s.trim().is_empty()) {
        sql.push_str(" AND section = ?");
        values.push(Value::Text(s.trim().to_ascii_uppercase()));
    }
    if let Some(term) = filter.search.as_deref() {
        let term = validation::check_search_term(term)
            .map_err(|m| StoreError::Validation(vec![m]))?;
        if !term.is_empty() {
            sql.push_str(" AND name LIKE ? ESCAPE '\\'");
            values.push(Value::Text(like_pattern(&term)));
        }
    }
    sql.push_str(" ORDER BY class_name, section, name, id");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(values), student_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn list_class_sections(conn: &Connection) -> Result<Vec<ClassSection>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT class_name, section, COUNT(*)
         FROM students
         GROUP BY class_name, section
         ORDER BY class_name, section",
    )?;
    let rows = stmt
        .query_map([], |r| {
            Ok(ClassSection {
                class_name: r.get(0)?,
                section: r.get(1)?,
                student_count: r.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn create_student(
    conn: &Connection,
    input: &StudentInput,
    today: NaiveDate,
) -> Result<Student, StoreError> {
    let clean = clean_student(input, today)?;
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO students(id, name, class_name, section, dob, created_at)
         VALUES(?, ?, ?, ?, ?, ?)",
        (
            &id,
            &clean.name,
            &clean.class_name,
            &clean.section,
            clean.dob,
            now_rfc3339(),
        ),
    )?;
    get_student(conn, &id)
}

pub fn update_student(
    conn: &Connection,
    id: &str,
    input: &StudentInput,
    today: NaiveDate,
) -> Result<Student, StoreError> {
    let clean = clean_student(input, today)?;
    let changed = conn.execute(
        "UPDATE students SET name = ?, class_name = ?, section = ?, dob = ? WHERE id = ?",
        (&clean.name, &clean.class_name, &clean.section, clean.dob, id),
    )?;
    if changed == 0 {
        return Err(StoreError::NotFound("student"));
    }
    get_student(conn, id)
}

/// Deletes the student and their marks. Returns how many marks went with them.
pub fn delete_student(conn: &Connection, id: &str) -> Result<usize, StoreError> {
    get_student(conn, id)?;
    let tx = conn.unchecked_transaction()?;
    let marks_deleted = tx.execute("DELETE FROM marks WHERE student_id = ?", [id])?;
    tx.execute("DELETE FROM students WHERE id = ?", [id])?;
    tx.commit()?;
    Ok(marks_deleted)
}

// ---- subjects ----

fn clean_subject_name(raw: &str) -> Result<String, StoreError> {
    let mut errors = Vec::new();
    let name = validation::sanitize_input(raw);
    validation::check_subject_name(&name, &mut errors);
    fail_if_any(errors)?;
    Ok(name)
}

fn ensure_subject_name_free(
    conn: &Connection,
    name: &str,
    except_id: Option<&str>,
) -> Result<(), StoreError> {
    let clash: Option<String> = conn
        .query_row(
            "SELECT id FROM subjects WHERE lower(name) = lower(?) AND id != ?",
            (name, except_id.unwrap_or("")),
            |r| r.get(0),
        )
        .optional()?;
    match clash {
        Some(_) => Err(StoreError::Conflict(format!("subject '{}' already exists", name))),
        None => Ok(()),
    }
}

fn subject_from_row(r: &Row<'_>) -> rusqlite::Result<Subject> {
    Ok(Subject {
        id: r.get(0)?,
        name: r.get(1)?,
        created_at: r.get(2)?,
    })
}

pub fn get_subject(conn: &Connection, id: &str) -> Result<Subject, StoreError> {
    conn.query_row(
        "SELECT id, name, created_at FROM subjects WHERE id = ?",
        [id],
        subject_from_row,
    )
    .optional()?
    .ok_or(StoreError::NotFound("subject"))
}

pub fn list_subjects(conn: &Connection, search: Option<&str>) -> Result<Vec<Subject>, StoreError> {
    let term = match search {
        Some(t) => validation::check_search_term(t).map_err(|m| StoreError::Validation(vec![m]))?,
        None => String::new(),
    };
    let mut stmt = conn.prepare(
        "SELECT id, name, created_at FROM subjects
         WHERE ? = '' OR name LIKE ? ESCAPE '\\'
         ORDER BY name, id",
    )?;
    let rows = stmt
        .query_map((&term, like_pattern(&term)), subject_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn create_subject(conn: &Connection, name: &str) -> Result<Subject, StoreError> {
    let name = clean_subject_name(name)?;
    ensure_subject_name_free(conn, &name, None)?;
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO subjects(id, name, created_at) VALUES(?, ?, ?)",
        (&id, &name, now_rfc3339()),
    )?;
    get_subject(conn, &id)
}

pub fn update_subject(conn: &Connection, id: &str, name: &str) -> Result<Subject, StoreError> {
    let name = clean_subject_name(name)?;
    get_subject(conn, id)?;
    ensure_subject_name_free(conn, &name, Some(id))?;
    conn.execute("UPDATE subjects SET name = ? WHERE id = ?", (&name, id))?;
    get_subject(conn, id)
}

pub fn delete_subject(conn: &Connection, id: &str) -> Result<usize, StoreError> {
    get_subject(conn, id)?;
    let tx = conn.unchecked_transaction()?;
    let marks_deleted = tx.execute("DELETE FROM marks WHERE subject_id = ?", [id])?;
    tx.execute("DELETE FROM subjects WHERE id = ?", [id])?;
    tx.commit()?;
    Ok(marks_deleted)
}

// ---- marks ----

struct CleanMark {
    marks_obtained: i64,
    max_marks: i64,
    assessment_type: String,
    assessment_date: NaiveDate,
}

fn clean_mark(
    conn: &Connection,
    input: &MarkInput,
    over_max: OverMaxPolicy,
    today: NaiveDate,
) -> Result<CleanMark, StoreError> {
    get_student(conn, &input.student_id)?;
    get_subject(conn, &input.subject_id)?;

    let mut errors = Vec::new();
    let max_marks = input.max_marks.unwrap_or(100);
    validation::check_marks(
        input.marks_obtained,
        max_marks,
        over_max == OverMaxPolicy::Clamp,
        &mut errors,
    );
    let assessment_type =
        validation::check_assessment_type(input.assessment_type.as_deref(), &mut errors);
    let date = validation::parse_date(&input.assessment_date, "assessmentDate", &mut errors);
    if let Some(d) = date {
        validation::check_assessment_date(d, today, &mut errors);
    }
    fail_if_any(errors)?;
    Ok(CleanMark {
        marks_obtained: input.marks_obtained,
        max_marks,
        assessment_type,
        // fail_if_any above guarantees a parsed date
        assessment_date: date.unwrap_or(today),
    })
}

fn mark_from_row(r: &Row<'_>) -> rusqlite::Result<AssessmentRecord> {
    Ok(AssessmentRecord {
        id: r.get(0)?,
        student_id: r.get(1)?,
        subject_id: r.get(2)?,
        marks_obtained: r.get(3)?,
        max_marks: r.get(4)?,
        assessment_type: r.get(5)?,
        assessment_date: r.get(6)?,
    })
}

pub fn get_mark(conn: &Connection, id: &str) -> Result<AssessmentRecord, StoreError> {
    conn.query_row(
        "SELECT id, student_id, subject_id, marks_obtained, max_marks, assessment_type, assessment_date
         FROM marks WHERE id = ?",
        [id],
        mark_from_row,
    )
    .optional()?
    .ok_or(StoreError::NotFound("mark"))
}

pub fn list_marks(conn: &Connection, filter: &MarkFilter) -> Result<Vec<AssessmentRecord>, StoreError> {
    let mut sql = String::from(
        "SELECT m.id, m.student_id, m.subject_id, m.marks_obtained, m.max_marks,
                m.assessment_type, m.assessment_date
         FROM marks m
         JOIN students s ON s.id = m.student_id
         WHERE 1 = 1",
    );
    let mut values: Vec<Value> = Vec::new();
    if let Some(v) = filter.student_id.as_deref() {
        sql.push_str(" AND m.student_id = ?");
        values.push(Value::Text(v.to_string()));
    }
    if let Some(v) = filter.subject_id.as_deref() {
        sql.push_str(" AND m.subject_id = ?");
        values.push(Value::Text(v.to_string()));
    }
    if let Some(v) = filter.class_name.as_deref().filter(|s| !s.trim().is_empty()) {
        sql.push_str(" AND s.class_name = ?");
        values.push(Value::Text(v.trim().to_string()));
    }
    if let Some(v) = filter.section.as_deref().filter(|s| !s.trim().is_empty()) {
        sql.push_str(" AND s.section = ?");
        values.push(Value::Text(v.trim().to_ascii_uppercase()));
    }
    sql.push_str(" ORDER BY m.assessment_date DESC, m.created_at DESC, m.id");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(values), mark_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn create_mark(
    conn: &Connection,
    input: &MarkInput,
    over_max: OverMaxPolicy,
    today: NaiveDate,
) -> Result<AssessmentRecord, StoreError> {
    let clean = clean_mark(conn, input, over_max, today)?;
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO marks(id, student_id, subject_id, marks_obtained, max_marks,
                           assessment_type, assessment_date, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &id,
            &input.student_id,
            &input.subject_id,
            clean.marks_obtained,
            clean.max_marks,
            &clean.assessment_type,
            clean.assessment_date,
            now_rfc3339(),
        ),
    )?;
    get_mark(conn, &id)
}

/// Replaces every field of an existing mark.
pub fn update_mark(
    conn: &Connection,
    id: &str,
    input: &MarkInput,
    over_max: OverMaxPolicy,
    today: NaiveDate,
) -> Result<AssessmentRecord, StoreError> {
    get_mark(conn, id)?;
    let clean = clean_mark(conn, input, over_max, today)?;
    conn.execute(
        "UPDATE marks
         SET student_id = ?, subject_id = ?, marks_obtained = ?, max_marks = ?,
             assessment_type = ?, assessment_date = ?, updated_at = ?
         WHERE id = ?",
        (
            &input.student_id,
            &input.subject_id,
            clean.marks_obtained,
            clean.max_marks,
            &clean.assessment_type,
            clean.assessment_date,
            now_rfc3339(),
            id,
        ),
    )?;
    get_mark(conn, id)
}

pub fn delete_mark(conn: &Connection, id: &str) -> Result<(), StoreError> {
    let changed = conn.execute("DELETE FROM marks WHERE id = ?", [id])?;
    if changed == 0 {
        return Err(StoreError::NotFound("mark"));
    }
    Ok(())
}
