use crate::model::participant::{SUBMISSION_APPROVED, SUBMISSION_REJECTED};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Debug)]
pub struct AdminLoginPayload {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize, Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CreateCohortPayload {
    pub cohort_number: i32,
    pub name: Option<String>,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct EnrollParticipantsPayload {
    pub users: Vec<NewUserCredentials>,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct NewUserCredentials {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct CreateCheckpointPayload {
    pub title: String,
    pub description: Option<String>,
    pub deadline: DateTime<Utc>,
    pub points: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewDecision {
    Approved,
    Rejected,
}

impl ReviewDecision {
    /// Parses the wire representation; anything but the two known statuses
    /// is rejected by the handler as a bad request.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            SUBMISSION_APPROVED => Some(ReviewDecision::Approved),
            SUBMISSION_REJECTED => Some(ReviewDecision::Rejected),
            _ => None,
        }
    }

    pub fn as_status(self) -> &'static str {
        match self {
            ReviewDecision::Approved => SUBMISSION_APPROVED,
            ReviewDecision::Rejected => SUBMISSION_REJECTED,
        }
    }
}

#[derive(Deserialize, Serialize, Debug)]
pub struct ReviewSubmissionPayload {
    pub status: String,
}
