use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Review state of an application. Any status may move to any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "application_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Pending,
    Reviewed,
    Accepted,
    Denied,
}

impl ApplicationStatus {
    pub fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Reviewed => "reviewed",
            ApplicationStatus::Accepted => "accepted",
            ApplicationStatus::Denied => "denied",
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ApplicationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(ApplicationStatus::Pending),
            "reviewed" => Ok(ApplicationStatus::Reviewed),
            "accepted" => Ok(ApplicationStatus::Accepted),
            "denied" => Ok(ApplicationStatus::Denied),
            other => Err(format!("unknown application status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ApplicationRow {
    pub id: Uuid,
    pub job_id: Uuid,
    pub seeker_id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub qualification: Option<String>,
    pub experience_level: Option<String>,
    pub education_level: Option<String>,
    pub status: ApplicationStatus,
    pub resume_url: Option<String>,
    pub video_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Profile fields copied from the seeker at apply time.
#[derive(Debug, Clone)]
pub struct NewApplication {
    pub job_id: Uuid,
    pub seeker_id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub qualification: Option<String>,
    pub experience_level: Option<String>,
    pub education_level: Option<String>,
    pub resume_url: Option<String>,
    pub video_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse_is_case_insensitive() {
        assert_eq!(
            "Accepted".parse::<ApplicationStatus>().unwrap(),
            ApplicationStatus::Accepted
        );
        assert!("hired".parse::<ApplicationStatus>().is_err());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&ApplicationStatus::Reviewed).unwrap();
        assert_eq!(json, "\"reviewed\"");
    }
}
