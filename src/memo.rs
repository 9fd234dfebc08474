use crate::analytics::AnalyticsReport;
use crate::error::GradeError;
use crate::grading::{AssessmentRecord, GradingPolicy};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

/// SHA-256 over everything that can change a report: the grading policy, the
/// ranking limit and each record's fields, taken in id order so row order from
/// the store does not matter.
pub fn fingerprint(
    records: &[AssessmentRecord],
    policy: &GradingPolicy,
    top_limit: usize,
) -> Fingerprint {
    let mut sorted: Vec<&AssessmentRecord> = records.iter().collect();
    sorted.sort_by(|a, b| a.id.cmp(&b.id));

    let mut h = Sha256::new();
    h.update(policy.over_max.as_str().as_bytes());
    h.update(policy.display_decimals.to_le_bytes());
    h.update((top_limit as u64).to_le_bytes());
    h.update((sorted.len() as u64).to_le_bytes());
    for r in sorted {
        for field in [
            r.id.as_str(),
            r.student_id.as_str(),
            r.subject_id.as_str(),
            r.assessment_type.as_str(),
        ] {
            h.update((field.len() as u64).to_le_bytes());
            h.update(field.as_bytes());
        }
        h.update(r.marks_obtained.to_le_bytes());
        h.update(r.max_marks.to_le_bytes());
        h.update(r.assessment_date.format("%Y-%m-%d").to_string().as_bytes());
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&h.finalize());
    Fingerprint(out)
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Bounded report cache owned by the caller. Oldest entry goes first once full;
/// a capacity of 0 computes every time.
#[derive(Debug)]
pub struct AnalyticsCache {
    capacity: usize,
    entries: HashMap<Fingerprint, AnalyticsReport>,
    order: VecDeque<Fingerprint>,
    hits: u64,
    misses: u64,
}

impl AnalyticsCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::new(),
            order: VecDeque::new(),
            hits: 0,
            misses: 0,
        }
    }

    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
        self.evict_to(capacity);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            capacity: self.capacity,
            hits: self.hits,
            misses: self.misses,
        }
    }

    pub fn get_or_try_insert_with<F>(
        &mut self,
        key: Fingerprint,
        compute: F,
    ) -> Result<AnalyticsReport, GradeError>
    where
        F: FnOnce() -> Result<AnalyticsReport, GradeError>,
    {
        if let Some(hit) = self.entries.get(&key) {
            self.hits += 1;
            tracing::debug!(key = %key.to_hex(), "analytics cache hit");
            return Ok(hit.clone());
        }
        self.misses += 1;
        tracing::debug!(key = %key.to_hex(), "analytics cache miss");

        let report = compute()?;
        if self.capacity > 0 {
            self.evict_to(self.capacity - 1);
            self.entries.insert(key, report.clone());
            self.order.push_back(key);
        }
        Ok(report)
    }

    fn evict_to(&mut self, max_len: usize) {
        while self.order.len() > max_len {
            if let Some(old) = self.order.pop_front() {
                self.entries.remove(&old);
            }
        }
    }
}
