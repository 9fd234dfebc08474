//! Field checks applied before anything reaches the store. Each check appends
//! human-readable messages so a form can show every problem at once.

use chrono::{Datelike, NaiveDate};

pub const MAX_MARKS_LIMIT: i64 = 1000;
pub const MAX_SEARCH_LEN: usize = 100;
pub const MAX_ASSESSMENT_TYPE_LEN: usize = 20;
pub const DEFAULT_ASSESSMENT_TYPE: &str = "Assignment";

/// Collapses runs of whitespace and drops markup-ish characters.
pub fn sanitize_input(input: &str) -> String {
    input
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | '&' | '"' | '\''))
        .collect()
}

pub fn check_person_name(name: &str, errors: &mut Vec<String>) {
    let name = name.trim();
    if name.is_empty() {
        errors.push("Name is required".into());
        return;
    }
    let len = name.chars().count();
    if len < 2 {
        errors.push("Name must be at least 2 characters long".into());
    } else if len > 100 {
        errors.push("Name cannot exceed 100 characters".into());
    } else if !name.chars().all(|c| c.is_alphabetic() || c == ' ') {
        errors.push("Name can only contain letters and spaces".into());
    }
}

pub fn check_class_section(class_name: &str, section: &str, errors: &mut Vec<String>) {
    let class_name = class_name.trim();
    if class_name.is_empty() {
        errors.push("Class is required".into());
    } else if class_name.chars().count() > 10 {
        errors.push("Class name too long".into());
    } else if !class_name.chars().all(|c| c.is_alphanumeric() || c == ' ') {
        errors.push("Class name contains invalid characters".into());
    }

    let section = section.trim();
    if section.is_empty() {
        errors.push("Section is required".into());
    } else if section.chars().count() > 5 {
        errors.push("Section name too long".into());
    } else if !section.chars().all(char::is_alphanumeric) {
        errors.push("Section can only contain letters and numbers".into());
    }
}

/// Whole years between `dob` and `today`.
fn age_in_years(dob: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - dob.year();
    if (today.month(), today.day()) < (dob.month(), dob.day()) {
        age -= 1;
    }
    age
}

pub fn parse_date(raw: &str, field: &str, errors: &mut Vec<String>) -> Option<NaiveDate> {
    match NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") {
        Ok(d) => Some(d),
        Err(_) => {
            errors.push(format!("{} must be a date in YYYY-MM-DD format", field));
            None
        }
    }
}

pub fn check_date_of_birth(dob: NaiveDate, today: NaiveDate, errors: &mut Vec<String>) {
    if dob >= today {
        errors.push("Date of birth must be in the past".into());
    } else if dob < NaiveDate::from_ymd_opt(1900, 1, 1).unwrap_or(NaiveDate::MIN) {
        errors.push("Date of birth is too old".into());
    } else {
        let age = age_in_years(dob, today);
        if age < 3 {
            errors.push("Student must be at least 3 years old".into());
        } else if age > 25 {
            errors.push("Student age seems too high for school".into());
        }
    }
}

pub fn check_subject_name(name: &str, errors: &mut Vec<String>) {
    let name = name.trim();
    if name.is_empty() {
        errors.push("Subject name is required".into());
        return;
    }
    let len = name.chars().count();
    if len < 2 {
        errors.push("Subject name must be at least 2 characters long".into());
    } else if len > 50 {
        errors.push("Subject name cannot exceed 50 characters".into());
    }
}

/// `allow_over_max` is true only under the clamp policy.
pub fn check_marks(marks_obtained: i64, max_marks: i64, allow_over_max: bool, errors: &mut Vec<String>) {
    if marks_obtained < 0 {
        errors.push("Marks cannot be negative".into());
    }
    if max_marks <= 0 {
        errors.push("Maximum marks must be greater than 0".into());
    } else if max_marks > MAX_MARKS_LIMIT {
        errors.push("Maximum marks seems too high".into());
    }
    if !allow_over_max && max_marks > 0 && marks_obtained > max_marks {
        errors.push("Marks obtained cannot exceed maximum marks".into());
    }
}

pub fn check_assessment_date(date: NaiveDate, today: NaiveDate, errors: &mut Vec<String>) {
    if date > today {
        errors.push("Assessment date cannot be in the future".into());
    } else if date < NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or(NaiveDate::MIN) {
        errors.push("Assessment date is too old".into());
    }
}

/// Returns the cleaned label, defaulting when blank.
pub fn check_assessment_type(raw: Option<&str>, errors: &mut Vec<String>) -> String {
    let cleaned = sanitize_input(raw.unwrap_or(""));
    if cleaned.is_empty() {
        return DEFAULT_ASSESSMENT_TYPE.to_string();
    }
    if cleaned.chars().count() > MAX_ASSESSMENT_TYPE_LEN {
        errors.push(format!(
            "Assessment type cannot exceed {} characters",
            MAX_ASSESSMENT_TYPE_LEN
        ));
    }
    cleaned
}

pub fn check_search_term(term: &str) -> Result<String, String> {
    if term.chars().count() > MAX_SEARCH_LEN {
        return Err("Search term too long".into());
    }
    Ok(term.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn sanitize_collapses_whitespace_and_strips_markup() {
        assert_eq!(sanitize_input("  Computer   <b>Science</b> "), "Computer bScience/b");
        assert_eq!(sanitize_input("O'Neil & \"Co\""), "ONeil  Co");
        assert_eq!(sanitize_input("   "), "");
    }

    #[test]
    fn names_collect_errors() {
        let mut e = Vec::new();
        check_person_name("Priya Patel", &mut e);
        assert!(e.is_empty());
        check_person_name("", &mut e);
        check_person_name("A", &mut e);
        check_person_name("R2D2", &mut e);
        assert_eq!(
            e,
            vec![
                "Name is required",
                "Name must be at least 2 characters long",
                "Name can only contain letters and spaces"
            ]
        );
    }

    #[test]
    fn class_and_section_rules() {
        let mut e = Vec::new();
        check_class_section("10", "A", &mut e);
        assert!(e.is_empty());
        check_class_section("", "", &mut e);
        assert_eq!(e, vec!["Class is required", "Section is required"]);
        e.clear();
        check_class_section("Grade-10", "A B", &mut e);
        assert_eq!(
            e,
            vec![
                "Class name contains invalid characters",
                "Section can only contain letters and numbers"
            ]
        );
    }

    #[test]
    fn date_of_birth_age_window() {
        let today = d(2026, 10, 19);
        let mut e = Vec::new();
        check_date_of_birth(d(2012, 5, 20), today, &mut e);
        assert!(e.is_empty());
        check_date_of_birth(d(2026, 10, 19), today, &mut e);
        check_date_of_birth(d(2024, 1, 1), today, &mut e);
        check_date_of_birth(d(1990, 1, 1), today, &mut e);
        check_date_of_birth(d(1899, 12, 31), today, &mut e);
        assert_eq!(
            e,
            vec![
                "Date of birth must be in the past",
                "Student must be at least 3 years old",
                "Student age seems too high for school",
                "Date of birth is too old"
            ]
        );
    }

    #[test]
    fn marks_respect_over_max_flag() {
        let mut e = Vec::new();
        check_marks(80, 100, false, &mut e);
        assert!(e.is_empty());
        check_marks(120, 100, true, &mut e);
        assert!(e.is_empty());
        check_marks(120, 100, false, &mut e);
        assert_eq!(e, vec!["Marks obtained cannot exceed maximum marks"]);
        e.clear();
        check_marks(-1, 0, false, &mut e);
        assert_eq!(
            e,
            vec!["Marks cannot be negative", "Maximum marks must be greater than 0"]
        );
        e.clear();
        check_marks(5, 5000, false, &mut e);
        assert_eq!(e, vec!["Maximum marks seems too high"]);
    }

    #[test]
    fn assessment_date_window_and_type_default() {
        let today = d(2026, 10, 19);
        let mut e = Vec::new();
        check_assessment_date(d(2024, 3, 15), today, &mut e);
        assert!(e.is_empty());
        check_assessment_date(d(2026, 10, 20), today, &mut e);
        check_assessment_date(d(2019, 12, 31), today, &mut e);
        assert_eq!(
            e,
            vec![
                "Assessment date cannot be in the future",
                "Assessment date is too old"
            ]
        );

        let mut e = Vec::new();
        assert_eq!(check_assessment_type(None, &mut e), "Assignment");
        assert_eq!(check_assessment_type(Some("  Unit   Test "), &mut e), "Unit Test");
        check_assessment_type(Some("An extremely long assessment label"), &mut e);
        assert_eq!(e.len(), 1);
        assert!(parse_date("2024-02-30", "assessmentDate", &mut e).is_none());
        assert_eq!(e.len(), 2);
    }
}
