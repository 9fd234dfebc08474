use crate::error::GradeError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Letter grade bands, best first. The derived ordering follows declaration
/// order, so `Grade::APlus < Grade::F`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Grade {
    #[serde(rename = "A+")]
    APlus,
    A,
    #[serde(rename = "B+")]
    BPlus,
    B,
    #[serde(rename = "C+")]
    CPlus,
    C,
    F,
}

/// Inclusive lower bounds, evaluated top-down; anything below the last band is F.
const GRADE_BANDS: [(f64, Grade); 6] = [
    (90.0, Grade::APlus),
    (80.0, Grade::A),
    (70.0, Grade::BPlus),
    (60.0, Grade::B),
    (50.0, Grade::CPlus),
    (40.0, Grade::C),
];

impl Grade {
    pub const ALL: [Grade; 7] = [
        Grade::APlus,
        Grade::A,
        Grade::BPlus,
        Grade::B,
        Grade::CPlus,
        Grade::C,
        Grade::F,
    ];

    pub fn from_percentage(percentage: f64) -> Grade {
        GRADE_BANDS
            .iter()
            .find(|(min, _)| percentage >= *min)
            .map(|(_, g)| *g)
            .unwrap_or(Grade::F)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Grade::APlus => "A+",
            Grade::A => "A",
            Grade::BPlus => "B+",
            Grade::B => "B",
            Grade::CPlus => "C+",
            Grade::C => "C",
            Grade::F => "F",
        }
    }

    pub fn parse(s: &str) -> Option<Grade> {
        Grade::ALL.iter().copied().find(|g| g.as_str() == s.trim())
    }

    pub fn is_pass(self) -> bool {
        self != Grade::F
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do with a score above the assessment maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverMaxPolicy {
    #[default]
    Reject,
    Clamp,
}

impl OverMaxPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            OverMaxPolicy::Reject => "reject",
            OverMaxPolicy::Clamp => "clamp",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" => Some(OverMaxPolicy::Reject),
            "clamp" => Some(OverMaxPolicy::Clamp),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradingPolicy {
    pub over_max: OverMaxPolicy,
    pub display_decimals: u32,
}

impl Default for GradingPolicy {
    fn default() -> Self {
        Self {
            over_max: OverMaxPolicy::Reject,
            display_decimals: 2,
        }
    }
}

impl GradingPolicy {
    pub fn display(&self, value: f64) -> f64 {
        round_off(value, self.display_decimals)
    }

    /// Rounds a 0..=1 ratio to the same precision `display` gives its percentage.
    pub fn display_fraction(&self, value: f64) -> f64 {
        round_off(value, self.display_decimals + 2)
    }
}

/// Half-up rounding to `decimals` places: `Int(x * 10^d + 0.5) / 10^d`.
pub fn round_off(x: f64, decimals: u32) -> f64 {
    let factor = 10_f64.powi(decimals as i32);
    ((x * factor) + 0.5).floor() / factor
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GradeResult {
    pub percentage: f64,
    pub grade: Grade,
}

/// `marks_obtained / max_marks * 100` at full precision.
///
/// Computed as `(marks * 100) / max` so whole percentages stay exact and
/// scaling both operands by the same factor yields the same value.
pub fn percentage(marks_obtained: i64, max_marks: i64) -> Result<f64, GradeError> {
    if max_marks <= 0 {
        return Err(GradeError::InvalidInput(format!(
            "max marks must be greater than 0 (got {})",
            max_marks
        )));
    }
    if marks_obtained < 0 {
        return Err(GradeError::InvalidInput(format!(
            "marks obtained cannot be negative (got {})",
            marks_obtained
        )));
    }
    Ok((marks_obtained as f64 * 100.0) / max_marks as f64)
}

/// Grades one score under the default reject policy.
pub fn grade(marks_obtained: i64, max_marks: i64) -> Result<GradeResult, GradeError> {
    grade_with_policy(marks_obtained, max_marks, OverMaxPolicy::Reject)
}

pub fn grade_with_policy(
    marks_obtained: i64,
    max_marks: i64,
    over_max: OverMaxPolicy,
) -> Result<GradeResult, GradeError> {
    let mut pct = percentage(marks_obtained, max_marks)?;
    if marks_obtained > max_marks {
        match over_max {
            OverMaxPolicy::Reject => {
                return Err(GradeError::InvalidInput(format!(
                    "marks obtained ({}) cannot exceed maximum marks ({})",
                    marks_obtained, max_marks
                )))
            }
            OverMaxPolicy::Clamp => pct = 100.0,
        }
    }
    Ok(GradeResult {
        percentage: pct,
        grade: Grade::from_percentage(pct),
    })
}

/// One scored assessment as held by the record store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentRecord {
    pub id: String,
    pub student_id: String,
    pub subject_id: String,
    pub marks_obtained: i64,
    pub max_marks: i64,
    pub assessment_type: String,
    pub assessment_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradedRecord {
    #[serde(flatten)]
    pub record: AssessmentRecord,
    pub percentage: f64,
    pub grade: Grade,
}

impl GradedRecord {
    pub fn student_id(&self) -> &str {
        &self.record.student_id
    }

    pub fn subject_id(&self) -> &str {
        &self.record.subject_id
    }
}

/// A graded record as a caller sends it. The grade stays a plain string until
/// `into_graded`, so an unknown band is a contract violation rather than a
/// decode failure.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradedRecordWire {
    #[serde(flatten)]
    pub record: AssessmentRecord,
    pub percentage: f64,
    pub grade: String,
}

impl GradedRecordWire {
    pub fn into_graded(self) -> Result<GradedRecord, GradeError> {
        let grade = Grade::parse(&self.grade).ok_or_else(|| {
            GradeError::InvalidState(format!(
                "record {} carries unknown grade {:?}",
                self.record.id, self.grade
            ))
        })?;
        Ok(GradedRecord {
            record: self.record,
            percentage: self.percentage,
            grade,
        })
    }
}

pub fn grade_record(
    record: &AssessmentRecord,
    policy: &GradingPolicy,
) -> Result<GradedRecord, GradeError> {
    let r = grade_with_policy(record.marks_obtained, record.max_marks, policy.over_max)?;
    Ok(GradedRecord {
        record: record.clone(),
        percentage: r.percentage,
        grade: r.grade,
    })
}

pub fn grade_records(
    records: &[AssessmentRecord],
    policy: &GradingPolicy,
) -> Result<Vec<GradedRecord>, GradeError> {
    records.iter().map(|r| grade_record(r, policy)).collect()
}
