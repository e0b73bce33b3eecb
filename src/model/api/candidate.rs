use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::eligibility::Eligibility;
use crate::model::candidate::{Candidate, CandidateStatus, Criteria, YearOfStudy};

/// A candidate's profile, as submitted for review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub description: String,
    pub image: String,
    #[serde(default)]
    pub criteria: Option<CriteriaSpec>,
}

/// The criteria bundle part of a submitted profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriteriaSpec {
    pub manifesto: String,
    pub vision: String,
    #[serde(default)]
    pub experience: u32,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub cgpa: Option<f64>,
    #[serde(default)]
    pub year: Option<YearOfStudy>,
}

/// Criteria as shown on a profile page, with the score recomputed for the view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriteriaDescription {
    pub manifesto: String,
    pub vision: String,
    pub experience: u32,
    pub department: Option<String>,
    pub cgpa: Option<f64>,
    pub year: Option<YearOfStudy>,
    pub eligibility: Eligibility,
}

impl From<Criteria> for CriteriaDescription {
    fn from(criteria: Criteria) -> Self {
        let eligibility = criteria.assess();
        Self {
            manifesto: criteria.manifesto,
            vision: criteria.vision,
            experience: criteria.experience,
            department: criteria.department,
            cgpa: criteria.cgpa,
            year: criteria.year,
            eligibility,
        }
    }
}

/// A candidate as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateDescription {
    pub id: String,
    pub owner: String,
    pub name: String,
    pub description: String,
    pub image: String,
    pub votes: u64,
    pub status: CandidateStatus,
    pub criteria: Option<CriteriaDescription>,
    pub submitted_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
}

impl From<Candidate> for CandidateDescription {
    fn from(candidate: Candidate) -> Self {
        let id = candidate.id.to_string();
        let core = candidate.candidate;
        Self {
            id,
            owner: core.owner.to_string(),
            name: core.name,
            description: core.description,
            image: core.image,
            votes: core.votes,
            status: core.status,
            criteria: core.criteria.map(Into::into),
            submitted_at: core.submitted_at,
            approved_at: core.approved_at,
            rejected_at: core.rejected_at,
        }
    }
}
