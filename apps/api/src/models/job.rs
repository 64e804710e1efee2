use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobRow {
    pub id: Uuid,
    pub employer_id: Uuid,
    pub title: String,
    pub description: String,
    pub category: Option<String>,
    pub salary_min: Option<i64>,
    pub salary_max: Option<i64>,
    pub location: Option<String>,
    pub required_skill: Option<String>,
    pub experience_level: Option<String>,
    pub education_level: Option<String>,
    pub job_type: Option<String>,
    pub duration: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Body accepted by job create and update.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobInput {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: Option<String>,
    pub salary_min: Option<i64>,
    pub salary_max: Option<i64>,
    pub location: Option<String>,
    pub required_skill: Option<String>,
    pub experience_level: Option<String>,
    pub education_level: Option<String>,
    pub job_type: Option<String>,
    pub duration: Option<String>,
}

impl JobInput {
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("title cannot be empty".to_string());
        }
        if let (Some(min), Some(max)) = (self.salary_min, self.salary_max) {
            if min > max {
                return Err(format!("salary_min ({min}) exceeds salary_max ({max})"));
            }
        }
        if self.salary_min.is_some_and(|v| v < 0) || self.salary_max.is_some_and(|v| v < 0) {
            return Err("salary cannot be negative".to_string());
        }
        Ok(())
    }
}
