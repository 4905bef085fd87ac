use crate::schema::{participants, submissions};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

pub const PARTICIPANT_ACTIVE: &str = "active";

pub const SUBMISSION_PENDING: &str = "pending";
pub const SUBMISSION_APPROVED: &str = "approved";
pub const SUBMISSION_REJECTED: &str = "rejected";

#[derive(Insertable, Debug)]
#[diesel(table_name = participants)]
pub struct NewParticipant {
    pub cohort_id: i64,
    pub matric_number: String,
    pub username: String,
    pub password_hash: String,
    pub status: String,
    pub points: i32,
    // created_at has a DB default (CURRENT_TIMESTAMP)
}

#[derive(Insertable, Debug)]
#[diesel(table_name = submissions)]
pub struct NewSubmission {
    pub participant_id: i64,
    pub checkpoint_id: i64,
    pub certificate_url: String,
    pub social_proof_url: String,
    pub status: String,
    // created_at has a DB default, reviewed_at defaults to NULL
}

#[derive(Deserialize, Serialize, Debug)]
pub struct LoginResponse {
    pub token: String,
}

#[derive(Deserialize, Serialize, Debug, Queryable)]
#[serde(rename_all = "camelCase")]
pub struct ActiveCheckpoint {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub deadline: DateTime<Utc>,
    pub points: i32,
}

#[derive(Deserialize, Serialize, Debug, Queryable)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionResponse {
    pub id: i64,
    pub participant_id: i64,
    pub checkpoint_id: i64,
    pub certificate_url: String,
    pub social_proof_url: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}
