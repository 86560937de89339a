//! Core type definitions for Evolv
//!
//! Records consumed from collaborators (experiences, outcomes, signals) and
//! the guideline values the engine reads and annotates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{EvolvError, Result};

/// Guideline identifier
pub type GuidelineId = String;

/// Guideline priority levels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical = 0,
    High = 1,
    #[default]
    Medium = 2,
    Low = 3,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Critical => write!(f, "critical"),
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "critical" | "0" => Ok(Self::Critical),
            "high" | "1" => Ok(Self::High),
            "medium" | "2" => Ok(Self::Medium),
            "low" | "3" => Ok(Self::Low),
            _ => Err(format!("Invalid priority: {}", s)),
        }
    }
}

/// Outcome category reported for a completed project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeCategory {
    Success,
    PartialSuccess,
    Failure,
}

impl std::fmt::Display for OutcomeCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::PartialSuccess => write!(f, "partial_success"),
            Self::Failure => write!(f, "failure"),
        }
    }
}

impl std::str::FromStr for OutcomeCategory {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "success" => Ok(Self::Success),
            "partial_success" | "partial-success" | "partialsuccess" => Ok(Self::PartialSuccess),
            "failure" => Ok(Self::Failure),
            _ => Err(format!("Invalid outcome category: {}", s)),
        }
    }
}

/// A published guideline (owned by the external guideline store)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Guideline {
    pub id: GuidelineId,
    pub category: String,
    pub content: String,
    pub priority: Priority,
    /// Whether candidates may be generated for this guideline
    pub evolvable: bool,
    pub usage_count: u64,
    /// Effectiveness measured when the guideline was published
    pub original_effectiveness: f64,
    pub last_updated: DateTime<Utc>,
}

impl Guideline {
    pub fn new(
        id: impl Into<String>,
        category: impl Into<String>,
        content: impl Into<String>,
        original_effectiveness: f64,
    ) -> Self {
        Self {
            id: id.into(),
            category: category.into(),
            content: content.into(),
            priority: Priority::default(),
            evolvable: true,
            usage_count: 0,
            original_effectiveness,
            last_updated: Utc::now(),
        }
    }

    /// Whole days since the guideline was last updated
    pub fn age_days_at(&self, now: DateTime<Utc>) -> i64 {
        (now - self.last_updated).num_days()
    }

    pub fn age_days(&self) -> i64 {
        self.age_days_at(Utc::now())
    }

    pub fn is_outdated_at(&self, now: DateTime<Utc>, max_age_days: i64) -> bool {
        self.age_days_at(now) > max_age_days
    }

    /// Case-insensitive substring match of `domain` against category or content.
    ///
    /// This is a heuristic: "api" also matches "rapid prototyping".
    pub fn is_applicable_to(&self, domain: &str) -> bool {
        let domain = domain.trim().to_lowercase();
        if domain.is_empty() {
            return false;
        }
        self.category.to_lowercase().contains(&domain)
            || self.content.to_lowercase().contains(&domain)
    }
}

/// A candidate replacement produced by an evolution strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolvedGuideline {
    pub id: String,
    /// Guideline this candidate would replace
    pub guideline_id: GuidelineId,
    pub content: String,
    /// Measured or predicted effectiveness of the candidate
    pub effectiveness_score: f64,
    pub created_at: DateTime<Utc>,
}

impl EvolvedGuideline {
    pub fn new(
        guideline_id: impl Into<String>,
        content: impl Into<String>,
        effectiveness_score: f64,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            guideline_id: guideline_id.into(),
            content: content.into(),
            effectiveness_score,
            created_at: Utc::now(),
        }
    }
}

/// One completed project's measured result for a guideline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperienceRecord {
    pub id: String,
    pub guideline_id: GuidelineId,
    pub success_rate: f64,
    pub time_efficiency: f64,
    pub code_quality_score: f64,
    pub project_size: String,
    pub complexity: String,
}

/// Production outcome observed some time after an experience
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub experience_id: String,
    pub overall_score: f64,
    pub category: OutcomeCategory,
    pub months_in_production: u32,
    pub production_stability: f64,
    #[serde(default)]
    pub project_size: String,
    #[serde(default)]
    pub complexity: String,
}

/// Single score sample appended to a tracker or an A/B test arm
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub score: f64,
    pub experience_id: String,
    pub timestamp: DateTime<Utc>,
    pub project_size: String,
    pub complexity: String,
    pub is_real_world: bool,
    #[serde(default)]
    pub outcome: Option<OutcomeCategory>,
}

impl Measurement {
    /// Create a validated measurement for the given source experience
    pub fn new(score: f64, experience_id: impl Into<String>) -> Result<Self> {
        let experience_id = experience_id.into();
        validate_score(score)?;
        if experience_id.trim().is_empty() {
            return Err(EvolvError::validation("experience id must not be empty"));
        }

        Ok(Self {
            score,
            experience_id,
            timestamp: Utc::now(),
            project_size: String::new(),
            complexity: String::new(),
            is_real_world: false,
            outcome: None,
        })
    }

    /// Measurement from a simulated or in-development experience
    pub fn from_experience(score: f64, experience: &ExperienceRecord) -> Result<Self> {
        let mut measurement = Self::new(score, experience.id.clone())?;
        measurement.project_size = experience.project_size.clone();
        measurement.complexity = experience.complexity.clone();
        Ok(measurement)
    }

    /// Measurement from a production outcome
    pub fn from_outcome(outcome: &OutcomeRecord) -> Result<Self> {
        let mut measurement = Self::new(outcome.overall_score, outcome.experience_id.clone())?;
        measurement.project_size = outcome.project_size.clone();
        measurement.complexity = outcome.complexity.clone();
        measurement.is_real_world = true;
        measurement.outcome = Some(outcome.category);
        Ok(measurement)
    }
}

/// Check that a score is a finite value within [0, 1]
pub fn validate_score(score: f64) -> Result<()> {
    if score.is_finite() && (0.0..=1.0).contains(&score) {
        Ok(())
    } else {
        Err(EvolvError::validation(format!(
            "score must be within [0, 1], got {}",
            score
        )))
    }
}

/// Incoming problem signature matched against learned patterns
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signal {
    pub error_type: Option<String>,
    pub message: Option<String>,
    pub stack_trace: Option<String>,
    pub class_name: Option<String>,
    pub method_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn experience(id: &str) -> ExperienceRecord {
        ExperienceRecord {
            id: id.to_string(),
            guideline_id: "g-1".to_string(),
            success_rate: 0.8,
            time_efficiency: 0.7,
            code_quality_score: 0.9,
            project_size: "medium".to_string(),
            complexity: "high".to_string(),
        }
    }

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::Critical < Priority::High);
        assert!(Priority::High < Priority::Medium);
        assert!(Priority::Medium < Priority::Low);
        assert_eq!("HIGH".parse::<Priority>().unwrap(), Priority::High);
    }

    #[test]
    fn test_outcome_category_rejects_typos() {
        assert_eq!(
            "partial_success".parse::<OutcomeCategory>().unwrap(),
            OutcomeCategory::PartialSuccess
        );
        assert!("sucess".parse::<OutcomeCategory>().is_err());

        let json = serde_json::to_string(&OutcomeCategory::PartialSuccess).unwrap();
        assert_eq!(json, "\"partial_success\"");
        assert!(serde_json::from_str::<OutcomeCategory>("\"partial\"").is_err());
    }

    #[test]
    fn test_measurement_validation() {
        assert!(Measurement::new(0.5, "exp-1").is_ok());
        assert!(Measurement::new(1.2, "exp-1").is_err());
        assert!(Measurement::new(-0.1, "exp-1").is_err());
        assert!(Measurement::new(f64::NAN, "exp-1").is_err());
        assert!(Measurement::new(0.5, "  ").is_err());
    }

    #[test]
    fn test_measurement_from_experience_copies_tags() {
        let m = Measurement::from_experience(0.7, &experience("exp-2")).unwrap();
        assert_eq!(m.experience_id, "exp-2");
        assert_eq!(m.project_size, "medium");
        assert_eq!(m.complexity, "high");
        assert!(!m.is_real_world);
    }

    #[test]
    fn test_measurement_from_outcome_is_real_world() {
        let outcome = OutcomeRecord {
            experience_id: "exp-3".to_string(),
            overall_score: 0.9,
            category: OutcomeCategory::Success,
            months_in_production: 6,
            production_stability: 0.95,
            project_size: String::new(),
            complexity: String::new(),
        };
        let m = Measurement::from_outcome(&outcome).unwrap();
        assert!(m.is_real_world);
        assert_eq!(m.score, 0.9);
        assert_eq!(m.outcome, Some(OutcomeCategory::Success));
    }

    #[test]
    fn test_guideline_outdated() {
        let mut guideline = Guideline::new("g-1", "testing", "Write tests first", 0.7);
        let now = Utc::now();
        guideline.last_updated = now - Duration::days(181);
        assert!(guideline.is_outdated_at(now, 180));

        guideline.last_updated = now - Duration::days(180);
        assert!(!guideline.is_outdated_at(now, 180));
    }

    #[test]
    fn test_guideline_applicability_is_case_insensitive() {
        let guideline = Guideline::new(
            "g-1",
            "Error-Handling",
            "Propagate errors with context in async services",
            0.7,
        );
        assert!(guideline.is_applicable_to("error-handling"));
        assert!(guideline.is_applicable_to("ASYNC"));
        assert!(!guideline.is_applicable_to("database"));
        assert!(!guideline.is_applicable_to("   "));
    }
}
