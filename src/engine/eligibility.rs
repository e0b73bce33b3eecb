//! Candidacy eligibility scoring.
//!
//! Pure and deterministic: profile views recompute the score every time, so the
//! same criteria must always produce the same result.

use serde::{Deserialize, Serialize};

use crate::model::candidate::{Criteria, YearOfStudy};

/// Lowest cgpa that may stand for election.
pub const MIN_CGPA: f64 = 2.5;

/// Highest possible score.
pub const MAX_SCORE: u32 = 100;

pub const REASON_INCOMPLETE: &str = "incomplete";
pub const REASON_YEAR: &str = "year of study not eligible";
pub const REASON_CGPA: &str = "cgpa below 2.5";
pub const REASON_ELIGIBLE: &str = "eligible";

/// The inputs the scorer looks at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EligibilityInput<'a> {
    pub cgpa: Option<f64>,
    pub year: Option<YearOfStudy>,
    pub experience: u32,
    pub department: Option<&'a str>,
}

impl<'a> From<&'a Criteria> for EligibilityInput<'a> {
    fn from(criteria: &'a Criteria) -> Self {
        Self {
            cgpa: criteria.cgpa,
            year: criteria.year,
            experience: criteria.experience,
            department: criteria.department.as_deref(),
        }
    }
}

/// Outcome of scoring a criteria bundle. `score` is always 0 when not eligible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Eligibility {
    pub eligible: bool,
    pub score: u32,
    pub reason: String,
}

impl Eligibility {
    fn ineligible(reason: &str) -> Self {
        Self {
            eligible: false,
            score: 0,
            reason: reason.to_string(),
        }
    }
}

/// Score a criteria bundle.
pub fn assess(input: EligibilityInput<'_>) -> Eligibility {
    let department = input.department.filter(|d| !d.trim().is_empty());
    let cgpa = input.cgpa.filter(|cgpa| cgpa.is_finite());
    let (Some(_), Some(cgpa), Some(year)) = (department, cgpa, input.year) else {
        return Eligibility::ineligible(REASON_INCOMPLETE);
    };

    if year.is_disqualified() {
        return Eligibility::ineligible(REASON_YEAR);
    }
    if cgpa < MIN_CGPA {
        return Eligibility::ineligible(REASON_CGPA);
    }

    // Department present and year allowed are both worth a flat 10.
    let score = cgpa_band(cgpa) + experience_band(input.experience) + 10 + 10;
    Eligibility {
        eligible: true,
        score: score.min(MAX_SCORE),
        reason: REASON_ELIGIBLE.to_string(),
    }
}

fn cgpa_band(cgpa: f64) -> u32 {
    if cgpa >= 3.5 {
        50
    } else if cgpa >= 3.0 {
        40
    } else if cgpa >= MIN_CGPA {
        30
    } else {
        0
    }
}

fn experience_band(years: u32) -> u32 {
    match years {
        0 => 0,
        1 | 2 => 20,
        _ => 30,
    }
}

impl Criteria {
    /// Score this bundle afresh.
    pub fn assess(&self) -> Eligibility {
        assess(self.into())
    }
}
