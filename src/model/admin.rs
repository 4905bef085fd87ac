use crate::schema::{admins, checkpoints, cohorts};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Insertable, Debug)]
#[diesel(table_name = admins)]
pub struct NewAdmin {
    pub username: String,
    pub password_hash: String,
    pub role: String,
    // created_at has a DB default (CURRENT_TIMESTAMP)
}

#[derive(Insertable, Debug)]
#[diesel(table_name = cohorts)]
pub struct NewCohort {
    pub cohort_number: i32,
    pub name: Option<String>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = checkpoints)]
pub struct NewCheckpoint {
    pub title: String,
    pub description: Option<String>,
    pub deadline: DateTime<Utc>,
    pub points: i32,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct LoginResponse {
    pub token: String,
}

#[derive(Deserialize, Serialize, Debug, Queryable)]
#[serde(rename_all = "camelCase")]
pub struct CohortResponse {
    pub id: i64,
    pub cohort_number: i32,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize, Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CohortSummary {
    pub id: i64,
    pub cohort_number: i32,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub participant_count: i64,
}

/// Leaderboard row inside a cohort detail view.
#[derive(Deserialize, Serialize, Debug, Queryable)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantOverview {
    pub id: i64,
    pub matric_number: String,
    pub username: String,
    pub status: String,
    pub points: i32,
}

#[derive(Deserialize, Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CohortDetailResponse {
    pub id: i64,
    pub cohort_number: i32,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub participants: Vec<ParticipantOverview>,
}

#[derive(Deserialize, Serialize, Debug, Queryable)]
#[serde(rename_all = "camelCase")]
pub struct EnrolledParticipant {
    pub id: i64,
    pub matric_number: String,
    pub username: String,
}

#[derive(Deserialize, Serialize, Debug, Queryable)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointResponse {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub deadline: DateTime<Utc>,
    pub points: i32,
    pub created_at: DateTime<Utc>,
}

/// Pending-queue row, enriched with participant and checkpoint display
/// fields. Ordered oldest first so reviewers see the longest-waiting
/// submissions at the top.
#[derive(Deserialize, Serialize, Debug, Queryable)]
#[serde(rename_all = "camelCase")]
pub struct PendingSubmissionEntry {
    pub id: i64,
    pub username: String,
    pub matric_number: String,
    pub checkpoint_title: String,
    pub checkpoint_points: i32,
    pub certificate_url: String,
    pub social_proof_url: String,
    pub created_at: DateTime<Utc>,
}
