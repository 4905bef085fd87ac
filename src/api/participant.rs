use super::helper;
use crate::auth::{self, AuthKeys, ParticipantIdentity};
use crate::model::participant::{
    ActiveCheckpoint, LoginResponse, NewSubmission, PARTICIPANT_ACTIVE, SUBMISSION_PENDING,
    SubmissionResponse,
};
use crate::payloads::participant::ParticipantLoginPayload;
use crate::storage::SharedBlobStore;
use crate::{
    errors::AppError,
    response::ApiResponse,
    schema::{
        checkpoints::dsl as cps_dsl, participants::dsl as parts_dsl,
        submissions::dsl as subs_dsl,
    },
};
use axum::extract::{Multipart, State};
use axum::response::Json;
use chrono::{DateTime, Utc};
use deadpool_diesel::postgres::Pool;
use diesel::dsl::{exists, now};
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::upsert::excluded;
use tracing::log::warn;
use tracing::{debug, info, instrument};

/// Authenticates a participant by matriculation number and issues a bearer token.
///
/// Only `active` participants may log in; suspended or otherwise terminated
/// accounts get the same response as bad credentials.
///
/// Request Body: `ParticipantLoginPayload`
///
/// Returns (wrapped in `ApiResponse`)
/// * `LoginResponse`: A signed bearer token valid for the configured lifetime (200 OK).
/// * `401 Unauthorized`: If the matriculation number is unknown, the account
///   is not active, or the password does not match.
/// * `500 Internal Server Error`: If a database error occurs.
#[instrument(skip(pool, keys, payload))]
pub async fn login(
    State(pool): State<Pool>,
    State(keys): State<AuthKeys>,
    Json(payload): Json<ParticipantLoginPayload>,
) -> Result<ApiResponse<LoginResponse>, AppError> {
    info!(
        "Participant login attempt for matric number: {}",
        payload.matric_number
    );

    let matric_number = payload.matric_number.clone();
    let account = helper::run_query(&pool, move |conn| {
        parts_dsl::participants
            .filter(parts_dsl::matric_number.eq(matric_number))
            .select((
                parts_dsl::id,
                parts_dsl::matric_number,
                parts_dsl::cohort_id,
                parts_dsl::password_hash,
                parts_dsl::status,
            ))
            .first::<(i64, String, i64, String, String)>(conn)
            .optional()
    })
    .await?;

    let Some((participant_id, matric_number, cohort_id, password_hash, status)) = account else {
        warn!(
            "Participant login failed: unknown matric number {}",
            payload.matric_number
        );
        return Err(AppError::Unauthorized(
            "Invalid credentials or inactive account".to_string(),
        ));
    };

    if status != PARTICIPANT_ACTIVE {
        warn!(
            "Participant login refused: account {} has status '{}'",
            matric_number, status
        );
        return Err(AppError::Unauthorized(
            "Invalid credentials or inactive account".to_string(),
        ));
    }

    if !auth::verify_password(&payload.password, &password_hash)? {
        warn!(
            "Participant login failed: bad password for {}",
            matric_number
        );
        return Err(AppError::Unauthorized(
            "Invalid credentials or inactive account".to_string(),
        ));
    }

    let token = keys.issue_participant_token(participant_id, &matric_number, cohort_id)?;
    info!("Participant {} logged in successfully", matric_number);
    Ok(ApiResponse::ok(LoginResponse { token }))
}

/// Queries checkpoints whose deadline has not passed, nearest deadline first.
///
/// Returns (wrapped in `ApiResponse`)
/// * `Vec<ActiveCheckpoint>`: Active checkpoints ascending by deadline (200 OK).
/// * `403 Forbidden`: If the participant account is no longer active.
/// * `500 Internal Server Error`: If a database error occurs.
#[instrument(skip(pool))]
pub async fn get_active_checkpoints(
    State(pool): State<Pool>,
    participant: ParticipantIdentity,
) -> Result<ApiResponse<Vec<ActiveCheckpoint>>, AppError> {
    info!(
        "Fetching active checkpoints for participant {}",
        participant.id
    );

    ensure_active_participant(&pool, participant.id).await?;

    let checkpoints = helper::run_query(&pool, |conn| {
        cps_dsl::checkpoints
            .filter(cps_dsl::deadline.ge(now))
            .order(cps_dsl::deadline.asc())
            .select((
                cps_dsl::id,
                cps_dsl::title,
                cps_dsl::description,
                cps_dsl::deadline,
                cps_dsl::points,
            ))
            .load::<ActiveCheckpoint>(conn)
    })
    .await?;

    info!(
        "Successfully fetched {} active checkpoints for participant {}",
        checkpoints.len(),
        participant.id
    );
    Ok(ApiResponse::ok(checkpoints))
}

/// Submits proof files for a checkpoint.
///
/// Multipart form with a `checkpointId` text field and two file fields,
/// `certificateFile` and `socialProofFile`. Both files are persisted through
/// the blob store before any row is written, so a failed upload leaves no
/// partial submission. At most one submission exists per
/// (participant, checkpoint) pair: resubmitting overwrites the file
/// references, resets the status to pending and clears the review timestamp,
/// while the original creation time is kept so the review queue stays fair.
///
/// Returns (wrapped in `ApiResponse`)
/// * `SubmissionResponse`: The created or reopened submission (201 Created).
/// * `400 Bad Request`: If `checkpointId` or either file is missing or empty.
/// * `403 Forbidden`: If the participant account is no longer active.
/// * `404 Not Found`: If the checkpoint does not exist.
/// * `500 Internal Server Error`: If storing a file or a database operation fails.
#[instrument(skip(pool, blobs, multipart))]
pub async fn create_submission(
    State(pool): State<Pool>,
    State(blobs): State<SharedBlobStore>,
    participant: ParticipantIdentity,
    mut multipart: Multipart,
) -> Result<ApiResponse<SubmissionResponse>, AppError> {
    info!(
        "Attempting submission upload for participant {}",
        participant.id
    );

    ensure_active_participant(&pool, participant.id).await?;

    let mut checkpoint_id: Option<i64> = None;
    let mut certificate: Option<(String, Vec<u8>)> = None;
    let mut social_proof: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Malformed multipart request: {}", e)))?
    {
        match field.name() {
            Some("checkpointId") => {
                let text = field.text().await.map_err(|e| {
                    AppError::BadRequest(format!("Failed to read checkpointId: {}", e))
                })?;
                checkpoint_id = Some(text.trim().parse::<i64>().map_err(|_| {
                    AppError::BadRequest("checkpointId must be an integer".to_string())
                })?);
            }
            Some("certificateFile") => {
                certificate = Some(read_file_field(field, "certificateFile").await?);
            }
            Some("socialProofFile") => {
                social_proof = Some(read_file_field(field, "socialProofFile").await?);
            }
            other => {
                debug!("Ignoring unexpected multipart field: {:?}", other);
            }
        }
    }

    let checkpoint_id = checkpoint_id
        .ok_or_else(|| AppError::BadRequest("checkpointId is required".to_string()))?;
    let (certificate_name, certificate_bytes) = certificate
        .filter(|(_, bytes)| !bytes.is_empty())
        .ok_or_else(|| AppError::BadRequest("certificateFile is required".to_string()))?;
    let (social_proof_name, social_proof_bytes) = social_proof
        .filter(|(_, bytes)| !bytes.is_empty())
        .ok_or_else(|| AppError::BadRequest("socialProofFile is required".to_string()))?;

    let checkpoint_exists = helper::run_query(&pool, move |conn| {
        diesel::select(exists(cps_dsl::checkpoints.find(checkpoint_id))).get_result::<bool>(conn)
    })
    .await?;

    if !checkpoint_exists {
        warn!(
            "Submission refused: checkpoint {} not found (participant {})",
            checkpoint_id, participant.id
        );
        return Err(AppError::NotFound(format!(
            "Checkpoint with ID {} not found",
            checkpoint_id
        )));
    }

    // Files are stored before the ledger row: if either upload fails the
    // operation aborts without touching the database.
    let certificate_url = blobs
        .store("certificateFile", &certificate_name, certificate_bytes)
        .await
        .map_err(AppError::InternalServerError)?;
    let social_proof_url = blobs
        .store("socialProofFile", &social_proof_name, social_proof_bytes)
        .await
        .map_err(AppError::InternalServerError)?;

    let participant_id = participant.id;
    let new_submission = NewSubmission {
        participant_id,
        checkpoint_id,
        certificate_url,
        social_proof_url,
        status: SUBMISSION_PENDING.to_string(),
    };

    let conn = pool.get().await?;
    let upsert_result: Result<SubmissionResponse, AppError> = conn
        .interact(move |conn_sync| {
            diesel::insert_into(subs_dsl::submissions)
                .values(&new_submission)
                .on_conflict((subs_dsl::participant_id, subs_dsl::checkpoint_id))
                .do_update()
                .set((
                    subs_dsl::certificate_url.eq(excluded(subs_dsl::certificate_url)),
                    subs_dsl::social_proof_url.eq(excluded(subs_dsl::social_proof_url)),
                    subs_dsl::status.eq(SUBMISSION_PENDING),
                    subs_dsl::reviewed_at.eq(None::<DateTime<Utc>>),
                ))
                .returning((
                    subs_dsl::id,
                    subs_dsl::participant_id,
                    subs_dsl::checkpoint_id,
                    subs_dsl::certificate_url,
                    subs_dsl::social_proof_url,
                    subs_dsl::status,
                    subs_dsl::created_at,
                    subs_dsl::reviewed_at,
                ))
                .get_result::<SubmissionResponse>(conn_sync)
                .map_err(|e| {
                    if let DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _) =
                        e
                    {
                        warn!(
                            "Submission upsert hit a foreign key violation for participant {}",
                            participant_id
                        );
                        AppError::NotFound(
                            "Referenced participant or checkpoint not found.".to_string(),
                        )
                    } else {
                        AppError::from(e)
                    }
                })
        })
        .await?;

    let submission = upsert_result?;
    info!(
        "Submission {} recorded for participant {} and checkpoint {} (status: {})",
        submission.id, participant_id, checkpoint_id, submission.status
    );
    Ok(ApiResponse::created(submission))
}

async fn read_file_field(
    field: axum::extract::multipart::Field<'_>,
    name: &'static str,
) -> Result<(String, Vec<u8>), AppError> {
    let original_name = field.file_name().unwrap_or(name).to_string();
    let bytes = field
        .bytes()
        .await
        .map_err(|e| AppError::BadRequest(format!("Failed to read {}: {}", name, e)))?;
    Ok((original_name, bytes.to_vec()))
}

/// The bearer token only proves who the participant was at login; the
/// account must still be active when the request is served.
async fn ensure_active_participant(pool: &Pool, participant_id: i64) -> Result<(), AppError> {
    let status = helper::run_query(pool, move |conn| {
        parts_dsl::participants
            .find(participant_id)
            .select(parts_dsl::status)
            .first::<String>(conn)
            .optional()
    })
    .await?;

    match status.as_deref() {
        Some(PARTICIPANT_ACTIVE) => Ok(()),
        Some(other) => {
            warn!(
                "Participant {} has status '{}'; refusing request",
                participant_id, other
            );
            Err(AppError::Forbidden(
                "Participant account is not active".to_string(),
            ))
        }
        None => {
            warn!(
                "Participant {} from bearer token no longer exists",
                participant_id
            );
            Err(AppError::Forbidden(
                "Participant account is not active".to_string(),
            ))
        }
    }
}
