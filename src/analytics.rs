use crate::error::GradeError;
use crate::grading::{self, Grade, GradedRecord, GradingPolicy};
use crate::validation::MAX_MARKS_LIMIT;
use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Count per grade band. Every band is always present, best band first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GradeDistribution {
    counts: [usize; 7],
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct GradeCount {
    pub grade: Grade,
    pub count: usize,
}

impl GradeDistribution {
    fn add(&mut self, grade: Grade) {
        self.counts[grade as usize] += 1;
    }

    pub fn get(&self, grade: Grade) -> usize {
        self.counts[grade as usize]
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = GradeCount> + '_ {
        Grade::ALL.iter().map(|g| GradeCount {
            grade: *g,
            count: self.get(*g),
        })
    }
}

impl Serialize for GradeDistribution {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(Grade::ALL.len()))?;
        for band in self.iter() {
            seq.serialize_element(&band)?;
        }
        seq.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassSummary {
    pub count: usize,
    /// 0.0 when `count == 0`.
    pub mean_percentage: f64,
    pub distribution: GradeDistribution,
    pub pass_count: usize,
    pub fail_count: usize,
    pub pass_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectAverage {
    pub subject_id: String,
    pub record_count: usize,
    pub mean_percentage: f64,
    pub grade: Grade,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectTotal {
    pub subject_id: String,
    pub assessment_count: usize,
    pub total_obtained: i64,
    pub total_max: i64,
    pub percentage: f64,
    pub grade: Grade,
}

/// One student's rollup across every assessment they sat.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentSummary {
    pub student_id: String,
    pub assessment_count: usize,
    pub subject_count: usize,
    /// Subjects whose combined percentage is a passing grade.
    pub passing_subjects: usize,
    pub total_obtained: i64,
    pub total_max: i64,
    pub percentage: f64,
    pub grade: Grade,
    pub subjects: Vec<SubjectTotal>,
}

/// Everything a class dashboard needs from one record set.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsReport {
    pub summary: ClassSummary,
    pub top_performers: Vec<GradedRecord>,
    pub subjects: Vec<SubjectAverage>,
    pub students: Vec<StudentSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentTypeCount {
    pub assessment_type: String,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Improving,
    Declining,
    Stable,
    InsufficientData,
}

/// Newest assessments against the ones just before them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceTrend {
    pub direction: TrendDirection,
    pub recent_mean: Option<f64>,
    pub previous_mean: Option<f64>,
    pub recent_count: usize,
    pub previous_count: usize,
}

pub const TREND_WINDOW: usize = 3;

/// Distance allowed between a supplied percentage and the one its marks give.
/// Percentages rounded to two decimals still pass.
const PERCENTAGE_TOLERANCE: f64 = 0.005 + 1e-9;

fn validate(record: &GradedRecord) -> Result<(), GradeError> {
    let r = &record.record;
    if r.marks_obtained < 0 || !(1..=MAX_MARKS_LIMIT).contains(&r.max_marks) {
        return Err(GradeError::InvalidState(format!(
            "record {} has marks {}/{}; marks must be >= 0 and max marks in 1..={}",
            r.id, r.marks_obtained, r.max_marks, MAX_MARKS_LIMIT
        )));
    }
    let p = record.percentage;
    if !p.is_finite() || !(0.0..=100.0).contains(&p) {
        return Err(GradeError::InvalidState(format!(
            "record {} has percentage {} outside 0..=100",
            r.id, p
        )));
    }
    // Over-max marks only grade under clamp, which scores them at 100.
    let from_marks = if r.marks_obtained > r.max_marks {
        100.0
    } else {
        grading::percentage(r.marks_obtained, r.max_marks)
            .map_err(|e| GradeError::InvalidState(e.to_string()))?
    };
    if (from_marks - p).abs() > PERCENTAGE_TOLERANCE {
        return Err(GradeError::InvalidState(format!(
            "record {} carries {}% but {}/{} is {:.2}%",
            r.id, p, r.marks_obtained, r.max_marks, from_marks
        )));
    }
    let expected = Grade::from_percentage(p);
    if record.grade != expected {
        return Err(GradeError::InvalidState(format!(
            "record {} carries grade {} but {:.2}% maps to {}",
            r.id, record.grade, p, expected
        )));
    }
    Ok(())
}

fn validate_all(records: &[GradedRecord]) -> Result<(), GradeError> {
    records.iter().try_for_each(validate)
}

fn mean(sum: f64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

fn ratio(obtained: i64, max: i64) -> f64 {
    if max <= 0 {
        0.0
    } else {
        (obtained as f64 * 100.0) / max as f64
    }
}

fn by_rank(a: &GradedRecord, b: &GradedRecord) -> Ordering {
    b.percentage
        .total_cmp(&a.percentage)
        .then_with(|| a.student_id().cmp(b.student_id()))
        .then_with(|| a.subject_id().cmp(b.subject_id()))
        .then_with(|| a.record.assessment_date.cmp(&b.record.assessment_date))
        .then_with(|| a.record.id.cmp(&b.record.id))
}

/// Mean percentage; 0.0 for an empty set.
pub fn class_average(records: &[GradedRecord]) -> Result<f64, GradeError> {
    validate_all(records)?;
    Ok(mean(records.iter().map(|r| r.percentage).sum(), records.len()))
}

pub fn grade_distribution(records: &[GradedRecord]) -> Result<GradeDistribution, GradeError> {
    validate_all(records)?;
    let mut dist = GradeDistribution::default();
    for r in records {
        dist.add(r.grade);
    }
    Ok(dist)
}

/// Fraction of records not graded F; 0.0 for an empty set.
pub fn pass_rate(records: &[GradedRecord]) -> Result<f64, GradeError> {
    validate_all(records)?;
    let passed = records.iter().filter(|r| r.grade.is_pass()).count();
    Ok(if records.is_empty() {
        0.0
    } else {
        passed as f64 / records.len() as f64
    })
}

/// Records by percentage descending, ties by student id ascending.
pub fn top_performers(
    records: &[GradedRecord],
    limit: Option<usize>,
) -> Result<Vec<&GradedRecord>, GradeError> {
    validate_all(records)?;
    let mut ranked: Vec<&GradedRecord> = records.iter().collect();
    ranked.sort_by(|a, b| by_rank(a, b));
    if let Some(n) = limit {
        ranked.truncate(n);
    }
    Ok(ranked)
}

/// Per-subject mean percentage, best subject first, ties by subject id.
pub fn subject_comparison(records: &[GradedRecord]) -> Result<Vec<SubjectAverage>, GradeError> {
    validate_all(records)?;
    let mut groups: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
    for r in records {
        let e = groups.entry(r.subject_id()).or_insert((0.0, 0));
        e.0 += r.percentage;
        e.1 += 1;
    }
    let mut out: Vec<SubjectAverage> = groups
        .into_iter()
        .map(|(subject_id, (sum, count))| {
            let m = mean(sum, count);
            SubjectAverage {
                subject_id: subject_id.to_string(),
                record_count: count,
                mean_percentage: m,
                grade: Grade::from_percentage(m),
            }
        })
        .collect();
    out.sort_by(|a, b| {
        b.mean_percentage
            .total_cmp(&a.mean_percentage)
            .then_with(|| a.subject_id.cmp(&b.subject_id))
    });
    Ok(out)
}

pub fn summarize(records: &[GradedRecord]) -> Result<ClassSummary, GradeError> {
    let distribution = grade_distribution(records)?;
    let count = records.len();
    let fail_count = distribution.get(Grade::F);
    let pass_count = count - fail_count;
    Ok(ClassSummary {
        count,
        mean_percentage: mean(records.iter().map(|r| r.percentage).sum(), count),
        distribution,
        pass_count,
        fail_count,
        pass_rate: if count == 0 {
            0.0
        } else {
            pass_count as f64 / count as f64
        },
    })
}

/// Totals per student (and per subject within a student), ordered by student id.
///
/// Totals use the marks that actually counted towards the percentage, so a
/// clamped over-max score contributes its maximum.
pub fn student_summaries(records: &[GradedRecord]) -> Result<Vec<StudentSummary>, GradeError> {
    validate_all(records)?;
    // student -> subject -> (count, obtained, max)
    let mut acc: BTreeMap<&str, BTreeMap<&str, (usize, i64, i64)>> = BTreeMap::new();
    for r in records {
        let counted = r.record.marks_obtained.min(r.record.max_marks);
        let e = acc
            .entry(r.student_id())
            .or_default()
            .entry(r.subject_id())
            .or_insert((0, 0, 0));
        e.0 += 1;
        e.1 += counted;
        e.2 += r.record.max_marks;
    }

    let out = acc
        .into_iter()
        .map(|(student_id, subjects)| {
            let mut totals: Vec<SubjectTotal> = subjects
                .into_iter()
                .map(|(subject_id, (count, obtained, max))| {
                    let pct = ratio(obtained, max);
                    SubjectTotal {
                        subject_id: subject_id.to_string(),
                        assessment_count: count,
                        total_obtained: obtained,
                        total_max: max,
                        percentage: pct,
                        grade: Grade::from_percentage(pct),
                    }
                })
                .collect();
            totals.sort_by(|a, b| {
                b.percentage
                    .total_cmp(&a.percentage)
                    .then_with(|| a.subject_id.cmp(&b.subject_id))
            });
            let total_obtained: i64 = totals.iter().map(|t| t.total_obtained).sum();
            let total_max: i64 = totals.iter().map(|t| t.total_max).sum();
            let pct = ratio(total_obtained, total_max);
            StudentSummary {
                student_id: student_id.to_string(),
                assessment_count: totals.iter().map(|t| t.assessment_count).sum(),
                subject_count: totals.len(),
                passing_subjects: totals.iter().filter(|t| t.grade.is_pass()).count(),
                total_obtained,
                total_max,
                percentage: pct,
                grade: Grade::from_percentage(pct),
                subjects: totals,
            }
        })
        .collect();
    Ok(out)
}

/// Student summaries ordered by overall percentage descending, ties by student id.
pub fn rank_students(mut summaries: Vec<StudentSummary>, limit: Option<usize>) -> Vec<StudentSummary> {
    summaries.sort_by(|a, b| {
        b.percentage
            .total_cmp(&a.percentage)
            .then_with(|| a.student_id.cmp(&b.student_id))
    });
    if let Some(n) = limit {
        summaries.truncate(n);
    }
    summaries
}

/// How many records of each assessment type, ordered by type name.
pub fn assessment_type_counts(records: &[GradedRecord]) -> Vec<AssessmentTypeCount> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for r in records {
        *counts.entry(r.record.assessment_type.as_str()).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .map(|(t, count)| AssessmentTypeCount {
            assessment_type: t.to_string(),
            count,
        })
        .collect()
}

/// Mean of the newest `TREND_WINDOW` assessments against the mean of the next
/// `TREND_WINDOW`. With fewer than `TREND_WINDOW + 1` records the newest window
/// shrinks so the previous window keeps at least one record. Same-day records
/// order by id.
pub fn performance_trend(records: &[GradedRecord]) -> Result<PerformanceTrend, GradeError> {
    validate_all(records)?;
    if records.len() < 2 {
        return Ok(PerformanceTrend {
            direction: TrendDirection::InsufficientData,
            recent_mean: None,
            previous_mean: None,
            recent_count: 0,
            previous_count: 0,
        });
    }
    let mut newest: Vec<&GradedRecord> = records.iter().collect();
    newest.sort_by(|a, b| {
        b.record
            .assessment_date
            .cmp(&a.record.assessment_date)
            .then_with(|| a.record.id.cmp(&b.record.id))
    });
    let (recent, rest) = newest.split_at(TREND_WINDOW.min(newest.len() - 1));
    let previous = &rest[..TREND_WINDOW.min(rest.len())];
    let avg = |rs: &[&GradedRecord]| mean(rs.iter().map(|r| r.percentage).sum(), rs.len());
    let (recent_mean, previous_mean) = (avg(recent), avg(previous));

    let direction = if (recent_mean - previous_mean).abs() <= 1e-9 {
        TrendDirection::Stable
    } else if recent_mean > previous_mean {
        TrendDirection::Improving
    } else {
        TrendDirection::Declining
    };
    Ok(PerformanceTrend {
        direction,
        recent_mean: Some(recent_mean),
        previous_mean: Some(previous_mean),
        recent_count: recent.len(),
        previous_count: previous.len(),
    })
}

pub fn build_report(
    records: &[GradedRecord],
    top_limit: usize,
) -> Result<AnalyticsReport, GradeError> {
    let summary = summarize(records)?;
    let top = top_performers(records, Some(top_limit))?
        .into_iter()
        .cloned()
        .collect();
    Ok(AnalyticsReport {
        summary,
        top_performers: top,
        subjects: subject_comparison(records)?,
        students: rank_students(student_summaries(records)?, None),
    })
}

impl ClassSummary {
    pub fn for_display(&self, policy: &GradingPolicy) -> Self {
        Self {
            mean_percentage: policy.display(self.mean_percentage),
            pass_rate: policy.display_fraction(self.pass_rate),
            ..self.clone()
        }
    }
}

impl SubjectAverage {
    pub fn for_display(&self, policy: &GradingPolicy) -> Self {
        Self {
            mean_percentage: policy.display(self.mean_percentage),
            ..self.clone()
        }
    }
}

impl StudentSummary {
    pub fn for_display(&self, policy: &GradingPolicy) -> Self {
        Self {
            percentage: policy.display(self.percentage),
            subjects: self
                .subjects
                .iter()
                .map(|s| SubjectTotal {
                    percentage: policy.display(s.percentage),
                    ..s.clone()
                })
                .collect(),
            ..self.clone()
        }
    }
}

impl PerformanceTrend {
    pub fn for_display(&self, policy: &GradingPolicy) -> Self {
        Self {
            recent_mean: self.recent_mean.map(|v| policy.display(v)),
            previous_mean: self.previous_mean.map(|v| policy.display(v)),
            ..*self
        }
    }
}

impl AnalyticsReport {
    pub fn for_display(&self, policy: &GradingPolicy) -> Self {
        Self {
            summary: self.summary.for_display(policy),
            top_performers: self
                .top_performers
                .iter()
                .map(|r| GradedRecord {
                    percentage: policy.display(r.percentage),
                    ..r.clone()
                })
                .collect(),
            subjects: self.subjects.iter().map(|s| s.for_display(policy)).collect(),
            students: self.students.iter().map(|s| s.for_display(policy)).collect(),
        }
    }
}
