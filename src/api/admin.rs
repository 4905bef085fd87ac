use super::helper;
use crate::auth::{self, AdminIdentity, AuthKeys};
use crate::matric::generate_matric_number;
use crate::model::admin::{
    CheckpointResponse, CohortDetailResponse, CohortResponse, CohortSummary, EnrolledParticipant,
    LoginResponse, NewCheckpoint, NewCohort, ParticipantOverview, PendingSubmissionEntry,
};
use crate::model::participant::{
    NewParticipant, PARTICIPANT_ACTIVE, SUBMISSION_APPROVED, SUBMISSION_PENDING,
    SUBMISSION_REJECTED, SubmissionResponse,
};
use crate::payloads::admin::{
    AdminLoginPayload, CreateCheckpointPayload, CreateCohortPayload, EnrollParticipantsPayload,
    ReviewDecision, ReviewSubmissionPayload,
};
use crate::{
    errors::AppError,
    response::ApiResponse,
    schema::{
        admins::dsl as admins_dsl, checkpoints::dsl as cps_dsl, cohorts::dsl as cohorts_dsl,
        participants::dsl as parts_dsl, submissions::dsl as subs_dsl,
    },
};
use anyhow::anyhow;
use axum::extract::{Path, State};
use axum::response::Json;
use deadpool_diesel::postgres::Pool;
use diesel::dsl::{count_star, now};
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use std::collections::HashMap;
use tracing::log::warn;
use tracing::{debug, error, info, instrument};

/// Authenticates an administrator and issues a bearer token.
///
/// Request Body: `AdminLoginPayload`
///
/// Returns (wrapped in `ApiResponse`)
/// * `LoginResponse`: A signed bearer token valid for the configured lifetime (200 OK).
/// * `401 Unauthorized`: If the username is unknown or the password does not match.
/// * `500 Internal Server Error`: If a database error occurs.
#[instrument(skip(pool, keys, payload))]
pub async fn login(
    State(pool): State<Pool>,
    State(keys): State<AuthKeys>,
    Json(payload): Json<AdminLoginPayload>,
) -> Result<ApiResponse<LoginResponse>, AppError> {
    info!("Admin login attempt for username: {}", payload.username);

    let username = payload.username.clone();
    let account = helper::run_query(&pool, move |conn| {
        admins_dsl::admins
            .filter(admins_dsl::username.eq(username))
            .select((admins_dsl::id, admins_dsl::username, admins_dsl::password_hash))
            .first::<(i64, String, String)>(conn)
            .optional()
    })
    .await?;

    let Some((admin_id, admin_username, password_hash)) = account else {
        warn!("Admin login failed: unknown username {}", payload.username);
        return Err(AppError::Unauthorized(
            "Invalid username or password".to_string(),
        ));
    };

    if !auth::verify_password(&payload.password, &password_hash)? {
        warn!("Admin login failed: bad password for {}", payload.username);
        return Err(AppError::Unauthorized(
            "Invalid username or password".to_string(),
        ));
    }

    let token = keys.issue_admin_token(admin_id, &admin_username)?;
    info!("Admin {} logged in successfully", admin_username);
    Ok(ApiResponse::ok(LoginResponse { token }))
}

/// Creates a new cohort.
///
/// Request Body: `CreateCohortPayload`
///
/// Returns (wrapped in `ApiResponse`)
/// * `CohortResponse`: The newly created cohort (201 Created).
/// * `400 Bad Request`: If the cohort number is not a positive integer.
/// * `409 Conflict`: If the cohort number is already in use.
/// * `500 Internal Server Error`: If a database error occurs.
#[instrument(skip(pool, payload))]
pub async fn create_cohort(
    State(pool): State<Pool>,
    admin: AdminIdentity,
    Json(payload): Json<CreateCohortPayload>,
) -> Result<ApiResponse<CohortResponse>, AppError> {
    info!(
        "Attempting to create cohort number {} requested by admin {}",
        payload.cohort_number, admin.username
    );
    debug!("Create cohort payload: {:?}", payload);

    if payload.cohort_number <= 0 {
        return Err(AppError::BadRequest(
            "Cohort number must be a positive integer".to_string(),
        ));
    }

    let new_cohort = NewCohort {
        cohort_number: payload.cohort_number,
        name: payload.name,
    };

    let insert_result = helper::run_query(&pool, move |conn| {
        diesel::insert_into(cohorts_dsl::cohorts)
            .values(&new_cohort)
            .returning((
                cohorts_dsl::id,
                cohorts_dsl::cohort_number,
                cohorts_dsl::name,
                cohorts_dsl::created_at,
            ))
            .get_result::<CohortResponse>(conn)
    })
    .await;

    match insert_result {
        Ok(cohort) => {
            info!(
                "Successfully created cohort {} with id {}",
                cohort.cohort_number, cohort.id
            );
            Ok(ApiResponse::created(cohort))
        }
        Err(AppError::InternalServerError(ref err)) => {
            if let Some(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, db_info)) =
                err.downcast_ref::<DieselError>()
            {
                warn!(
                    "Failed to create cohort {}: number already in use. Details: {}",
                    payload.cohort_number,
                    db_info.message()
                );
                return Err(AppError::Conflict(format!(
                    "Cohort number {} is already in use.",
                    payload.cohort_number
                )));
            }
            Err(insert_result.unwrap_err())
        }
        Err(e) => Err(e),
    }
}

/// Queries all cohorts with their participant counts, ordered by cohort number.
///
/// Returns (wrapped in `ApiResponse`)
/// * `Vec<CohortSummary>`: All cohorts, ascending by cohort number (200 OK).
/// * `500 Internal Server Error`: If a database error occurs.
#[instrument(skip(pool))]
pub async fn list_cohorts(
    State(pool): State<Pool>,
    admin: AdminIdentity,
) -> Result<ApiResponse<Vec<CohortSummary>>, AppError> {
    info!("Fetching all cohorts for admin {}", admin.username);

    let cohorts = helper::run_query(&pool, |conn| {
        cohorts_dsl::cohorts
            .order(cohorts_dsl::cohort_number.asc())
            .select((
                cohorts_dsl::id,
                cohorts_dsl::cohort_number,
                cohorts_dsl::name,
                cohorts_dsl::created_at,
            ))
            .load::<CohortResponse>(conn)
    })
    .await?;

    let counts: HashMap<i64, i64> = helper::run_query(&pool, |conn| {
        parts_dsl::participants
            .group_by(parts_dsl::cohort_id)
            .select((parts_dsl::cohort_id, count_star()))
            .load::<(i64, i64)>(conn)
    })
    .await?
    .into_iter()
    .collect();

    let summaries: Vec<CohortSummary> = cohorts
        .into_iter()
        .map(|cohort| CohortSummary {
            participant_count: counts.get(&cohort.id).copied().unwrap_or(0),
            id: cohort.id,
            cohort_number: cohort.cohort_number,
            name: cohort.name,
            created_at: cohort.created_at,
        })
        .collect();

    info!("Successfully fetched {} cohorts", summaries.len());
    Ok(ApiResponse::ok(summaries))
}

/// Queries a single cohort together with its participant leaderboard.
///
/// Participants are ranked by descending points; ties keep enrollment order.
///
/// Returns (wrapped in `ApiResponse`)
/// * `CohortDetailResponse`: Cohort fields plus ranked participants (200 OK).
/// * `404 Not Found`: If the cohort does not exist.
/// * `500 Internal Server Error`: If a database error occurs.
#[instrument(skip(pool))]
pub async fn get_cohort(
    State(pool): State<Pool>,
    admin: AdminIdentity,
    Path(cohort_id): Path<i64>,
) -> Result<ApiResponse<CohortDetailResponse>, AppError> {
    info!("Fetching cohort detail for cohort_id: {}", cohort_id);

    let cohort = helper::run_query(&pool, move |conn| {
        cohorts_dsl::cohorts
            .find(cohort_id)
            .select((
                cohorts_dsl::id,
                cohorts_dsl::cohort_number,
                cohorts_dsl::name,
                cohorts_dsl::created_at,
            ))
            .first::<CohortResponse>(conn)
            .optional()
    })
    .await?
    .ok_or_else(|| {
        warn!("Cohort with ID {} not found", cohort_id);
        AppError::NotFound(format!("Cohort with ID {} not found", cohort_id))
    })?;

    let participants = helper::run_query(&pool, move |conn| {
        parts_dsl::participants
            .filter(parts_dsl::cohort_id.eq(cohort_id))
            .order((parts_dsl::points.desc(), parts_dsl::id.asc()))
            .select((
                parts_dsl::id,
                parts_dsl::matric_number,
                parts_dsl::username,
                parts_dsl::status,
                parts_dsl::points,
            ))
            .load::<ParticipantOverview>(conn)
    })
    .await?;

    info!(
        "Successfully fetched cohort {} with {} participants",
        cohort_id,
        participants.len()
    );
    Ok(ApiResponse::ok(CohortDetailResponse {
        id: cohort.id,
        cohort_number: cohort.cohort_number,
        name: cohort.name,
        created_at: cohort.created_at,
        participants,
    }))
}

/// Bulk-enrolls participants into a cohort, assigning matriculation numbers.
///
/// Indices continue from the cohort's current participant count; the cohort
/// row is locked for the duration of the transaction so concurrent
/// enrollments cannot hand out the same index. The whole batch is applied
/// atomically: the first duplicate username aborts everything.
///
/// Request Body: `EnrollParticipantsPayload`
///
/// Returns (wrapped in `ApiResponse`)
/// * `Vec<EnrolledParticipant>`: The created participants with their matriculation numbers (201 Created).
/// * `400 Bad Request`: If the users array is empty or a username/password is blank.
/// * `404 Not Found`: If the cohort does not exist.
/// * `409 Conflict`: If a username is already taken (no participants from the batch are kept).
/// * `500 Internal Server Error`: If a database error or transaction failure occurs.
#[instrument(skip(pool, payload))]
pub async fn enroll_participants(
    State(pool): State<Pool>,
    admin: AdminIdentity,
    Path(cohort_id): Path<i64>,
    Json(payload): Json<EnrollParticipantsPayload>,
) -> Result<ApiResponse<Vec<EnrolledParticipant>>, AppError> {
    info!(
        "Attempting to enroll {} participants into cohort {} requested by admin {}",
        payload.users.len(),
        cohort_id,
        admin.username
    );

    if payload.users.is_empty() {
        return Err(AppError::BadRequest(
            "Users array is required and must not be empty".to_string(),
        ));
    }
    if payload
        .users
        .iter()
        .any(|user| user.username.trim().is_empty() || user.password.is_empty())
    {
        return Err(AppError::BadRequest(
            "Every user needs a non-empty username and password".to_string(),
        ));
    }

    let users = payload.users;
    let conn = pool.get().await?;
    let enrollment_result: Result<Vec<EnrolledParticipant>, AppError> = conn
        .interact(move |conn_sync| {
            conn_sync.transaction(|transaction_conn| {
                // Lock the cohort row: index assignment is serialized per cohort.
                let cohort_number = cohorts_dsl::cohorts
                    .find(cohort_id)
                    .select(cohorts_dsl::cohort_number)
                    .for_update()
                    .first::<i32>(transaction_conn)
                    .optional()?
                    .ok_or_else(|| {
                        warn!("Cannot enroll: cohort {} not found", cohort_id);
                        AppError::NotFound(format!("Cohort with ID {} not found", cohort_id))
                    })?;

                let existing_count = parts_dsl::participants
                    .filter(parts_dsl::cohort_id.eq(cohort_id))
                    .count()
                    .get_result::<i64>(transaction_conn)?;

                let mut enrolled = Vec::with_capacity(users.len());
                for (offset, user) in users.into_iter().enumerate() {
                    let matric_number =
                        generate_matric_number(cohort_number, existing_count + offset as i64 + 1);
                    let password_hash = auth::hash_password(&user.password)?;

                    let new_participant = NewParticipant {
                        cohort_id,
                        matric_number,
                        username: user.username,
                        password_hash,
                        status: PARTICIPANT_ACTIVE.to_string(),
                        points: 0,
                    };

                    let created = diesel::insert_into(parts_dsl::participants)
                        .values(&new_participant)
                        .returning((
                            parts_dsl::id,
                            parts_dsl::matric_number,
                            parts_dsl::username,
                        ))
                        .get_result::<EnrolledParticipant>(transaction_conn)
                        .map_err(|e| {
                            if let DieselError::DatabaseError(
                                DatabaseErrorKind::UniqueViolation,
                                db_info,
                            ) = &e
                            {
                                warn!(
                                    "Enrollment batch aborted: username '{}' already taken. Details: {}",
                                    new_participant.username,
                                    db_info.message()
                                );
                                AppError::Conflict(format!(
                                    "Username '{}' is already taken.",
                                    new_participant.username
                                ))
                            } else {
                                AppError::from(e)
                            }
                        })?;
                    enrolled.push(created);
                }

                Ok(enrolled)
            })
        })
        .await?;

    let enrolled = enrollment_result?;
    info!(
        "Successfully enrolled {} participants into cohort {}",
        enrolled.len(),
        cohort_id
    );
    Ok(ApiResponse::created(enrolled))
}

/// Creates a new checkpoint.
///
/// Request Body: `CreateCheckpointPayload`
///
/// Returns (wrapped in `ApiResponse`)
/// * `CheckpointResponse`: The newly created checkpoint (201 Created).
/// * `400 Bad Request`: If the title is blank or points is not positive.
/// * `500 Internal Server Error`: If a database error occurs.
#[instrument(skip(pool, payload))]
pub async fn create_checkpoint(
    State(pool): State<Pool>,
    admin: AdminIdentity,
    Json(payload): Json<CreateCheckpointPayload>,
) -> Result<ApiResponse<CheckpointResponse>, AppError> {
    info!(
        "Attempting to create checkpoint '{}' requested by admin {}",
        payload.title, admin.username
    );
    debug!("Create checkpoint payload: {:?}", payload);

    if payload.title.trim().is_empty() {
        return Err(AppError::BadRequest("Title is required".to_string()));
    }
    if payload.points <= 0 {
        return Err(AppError::BadRequest(
            "Points must be a positive integer".to_string(),
        ));
    }

    let new_checkpoint = NewCheckpoint {
        title: payload.title,
        description: payload.description,
        deadline: payload.deadline,
        points: payload.points,
    };

    let checkpoint = helper::run_query(&pool, move |conn| {
        diesel::insert_into(cps_dsl::checkpoints)
            .values(&new_checkpoint)
            .returning((
                cps_dsl::id,
                cps_dsl::title,
                cps_dsl::description,
                cps_dsl::deadline,
                cps_dsl::points,
                cps_dsl::created_at,
            ))
            .get_result::<CheckpointResponse>(conn)
    })
    .await?;

    info!(
        "Successfully created checkpoint '{}' with id {}",
        checkpoint.title, checkpoint.id
    );
    Ok(ApiResponse::created(checkpoint))
}

/// Queries all checkpoints, nearest deadline first.
///
/// Past-deadline checkpoints stay visible to admins.
///
/// Returns (wrapped in `ApiResponse`)
/// * `Vec<CheckpointResponse>`: All checkpoints ascending by deadline (200 OK).
/// * `500 Internal Server Error`: If a database error occurs.
#[instrument(skip(pool))]
pub async fn list_checkpoints(
    State(pool): State<Pool>,
    admin: AdminIdentity,
) -> Result<ApiResponse<Vec<CheckpointResponse>>, AppError> {
    info!("Fetching all checkpoints for admin {}", admin.username);

    let checkpoints = helper::run_query(&pool, |conn| {
        cps_dsl::checkpoints
            .order(cps_dsl::deadline.asc())
            .select((
                cps_dsl::id,
                cps_dsl::title,
                cps_dsl::description,
                cps_dsl::deadline,
                cps_dsl::points,
                cps_dsl::created_at,
            ))
            .load::<CheckpointResponse>(conn)
    })
    .await?;

    info!("Successfully fetched {} checkpoints", checkpoints.len());
    Ok(ApiResponse::ok(checkpoints))
}

/// Queries the review queue: all pending submissions, oldest first.
///
/// Returns (wrapped in `ApiResponse`)
/// * `Vec<PendingSubmissionEntry>`: Pending submissions enriched with
///   participant and checkpoint display fields (200 OK).
/// * `500 Internal Server Error`: If a database error occurs.
#[instrument(skip(pool))]
pub async fn get_pending_submissions(
    State(pool): State<Pool>,
    admin: AdminIdentity,
) -> Result<ApiResponse<Vec<PendingSubmissionEntry>>, AppError> {
    info!("Fetching pending submissions for admin {}", admin.username);

    let pending = helper::run_query(&pool, |conn| {
        subs_dsl::submissions
            .inner_join(parts_dsl::participants)
            .inner_join(cps_dsl::checkpoints)
            .filter(subs_dsl::status.eq(SUBMISSION_PENDING))
            .order(subs_dsl::created_at.asc())
            .select((
                subs_dsl::id,
                parts_dsl::username,
                parts_dsl::matric_number,
                cps_dsl::title,
                cps_dsl::points,
                subs_dsl::certificate_url,
                subs_dsl::social_proof_url,
                subs_dsl::created_at,
            ))
            .load::<PendingSubmissionEntry>(conn)
    })
    .await?;

    info!(
        "Successfully fetched {} pending submissions",
        pending.len()
    );
    Ok(ApiResponse::ok(pending))
}

/// Reviews a pending submission, crediting points on approval.
///
/// The status write and the point credit are applied in one transaction:
/// either both persist or neither does. The submission row is locked for
/// the duration, so concurrent reviews of the same submission cannot
/// double-credit. A submission that is no longer pending cannot be reviewed
/// again; resubmission reopens it.
///
/// Request Body: `ReviewSubmissionPayload`
///
/// Returns (wrapped in `ApiResponse`)
/// * `SubmissionResponse`: The reviewed submission (200 OK).
/// * `400 Bad Request`: If the status is neither `approved` nor `rejected`.
/// * `404 Not Found`: If the submission does not exist.
/// * `409 Conflict`: If the submission has already been reviewed.
/// * `500 Internal Server Error`: If a database error or transaction failure occurs.
#[instrument(skip(pool, payload))]
pub async fn review_submission(
    State(pool): State<Pool>,
    admin: AdminIdentity,
    Path(submission_id): Path<i64>,
    Json(payload): Json<ReviewSubmissionPayload>,
) -> Result<ApiResponse<SubmissionResponse>, AppError> {
    let decision = ReviewDecision::parse(&payload.status).ok_or_else(|| {
        warn!(
            "Rejecting review of submission {}: unknown status '{}'",
            submission_id, payload.status
        );
        AppError::BadRequest(format!(
            "status must be '{}' or '{}'",
            SUBMISSION_APPROVED, SUBMISSION_REJECTED
        ))
    })?;
    info!(
        "Attempting to review submission {} as '{}' requested by admin {}",
        submission_id,
        decision.as_status(),
        admin.username
    );

    let conn = pool.get().await?;
    let review_result: Result<SubmissionResponse, AppError> = conn
        .interact(move |conn_sync| {
            conn_sync.transaction(|transaction_conn| {
                // Lock the submission row so a concurrent review of the same
                // id waits here and then fails the pending check.
                let (participant_id, checkpoint_id, current_status) = subs_dsl::submissions
                    .find(submission_id)
                    .select((
                        subs_dsl::participant_id,
                        subs_dsl::checkpoint_id,
                        subs_dsl::status,
                    ))
                    .for_update()
                    .first::<(i64, i64, String)>(transaction_conn)
                    .optional()?
                    .ok_or_else(|| {
                        warn!("Submission with ID {} not found", submission_id);
                        AppError::NotFound(format!(
                            "Submission with ID {} not found",
                            submission_id
                        ))
                    })?;

                if current_status != SUBMISSION_PENDING {
                    warn!(
                        "Submission {} is already '{}'; refusing re-review",
                        submission_id, current_status
                    );
                    return Err(AppError::Conflict(format!(
                        "Submission {} has already been reviewed (status: {}).",
                        submission_id, current_status
                    )));
                }

                let checkpoint_points = cps_dsl::checkpoints
                    .find(checkpoint_id)
                    .select(cps_dsl::points)
                    .first::<i32>(transaction_conn)?;

                let reviewed = diesel::update(subs_dsl::submissions.find(submission_id))
                    .set((
                        subs_dsl::status.eq(decision.as_status()),
                        subs_dsl::reviewed_at.eq(now),
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
                    .get_result::<SubmissionResponse>(transaction_conn)?;

                if decision == ReviewDecision::Approved {
                    let rows_affected =
                        diesel::update(parts_dsl::participants.find(participant_id))
                            .set(parts_dsl::points.eq(parts_dsl::points + checkpoint_points))
                            .execute(transaction_conn)?;

                    if rows_affected != 1 {
                        error!(
                            "Failed to credit {} points to participant {}: {} rows affected",
                            checkpoint_points, participant_id, rows_affected
                        );
                        return Err(AppError::InternalServerError(anyhow!(
                            "Point credit affected {} rows, expected 1",
                            rows_affected
                        )));
                    }
                    info!(
                        "Credited {} points to participant {} for submission {}",
                        checkpoint_points, participant_id, submission_id
                    );
                }

                Ok(reviewed)
            })
        })
        .await?;

    let reviewed = review_result?;
    info!(
        "Successfully reviewed submission {} as '{}'",
        submission_id,
        reviewed.status
    );
    Ok(ApiResponse::ok(reviewed))
}
