use axum::http::StatusCode;
use checkpoint_portal_server::model::admin::{
    CheckpointResponse, CohortDetailResponse, CohortSummary, EnrolledParticipant, LoginResponse,
    PendingSubmissionEntry,
};
use checkpoint_portal_server::model::participant::SubmissionResponse;
use checkpoint_portal_server::response::ApiResponse;
use chrono::{Duration, Utc};
use serde_json::{Value, json};

mod helpers;
use helpers::{
    admin_token, count_cohort_participants, create_test_admin, create_test_checkpoint,
    create_test_cohort, create_test_participant, create_test_submission, get_participant_points,
    get_submission_state, participant_token, set_participant_points, setup_test_environment,
};

// login

#[tokio::test]
async fn test_admin_login_success() {
    let (server, pool) = setup_test_environment().await;
    create_test_admin(&pool, "superadmin", "correct-horse").await;

    let response = server
        .post("/admin/login")
        .json(&json!({"username": "superadmin", "password": "correct-horse"}))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: ApiResponse<LoginResponse> = response.json();
    assert_eq!(body.status_code, 200);
    assert!(!body.data.unwrap().token.is_empty());
}

#[tokio::test]
async fn test_admin_login_wrong_password() {
    let (server, pool) = setup_test_environment().await;
    create_test_admin(&pool, "superadmin", "correct-horse").await;

    let response = server
        .post("/admin/login")
        .json(&json!({"username": "superadmin", "password": "wrong-horse"}))
        .await;

    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    let body: ApiResponse<Value> = response.json();
    assert_eq!(body.status_code, 401);
    assert!(body.status_message.contains("Invalid username or password"));
}

#[tokio::test]
async fn test_admin_login_unknown_username() {
    let (server, _pool) = setup_test_environment().await;

    let response = server
        .post("/admin/login")
        .json(&json!({"username": "nobody", "password": "irrelevant"}))
        .await;

    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
}

// auth guards

#[tokio::test]
async fn test_admin_route_requires_token() {
    let (server, _pool) = setup_test_environment().await;

    let response = server.get("/admin/cohorts").await;

    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    let body: ApiResponse<Value> = response.json();
    assert!(body.status_message.contains("No token provided"));
}

#[tokio::test]
async fn test_admin_route_rejects_garbage_token() {
    let (server, _pool) = setup_test_environment().await;

    let response = server
        .get("/admin/cohorts")
        .authorization_bearer("not-a-real-token")
        .await;

    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_route_rejects_participant_token() {
    let (server, pool) = setup_test_environment().await;
    let cohort_id = create_test_cohort(&pool, 40, None).await;
    let participant_id =
        create_test_participant(&pool, cohort_id, "40001", "intruder", "pw").await;

    let response = server
        .get("/admin/cohorts")
        .authorization_bearer(participant_token(participant_id, "40001", cohort_id))
        .await;

    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
    let body: ApiResponse<Value> = response.json();
    assert!(
        body.status_message
            .contains("Administrator credentials required")
    );
}

// create_cohort

#[tokio::test]
async fn test_create_cohort_success() {
    let (server, _pool) = setup_test_environment().await;

    let response = server
        .post("/admin/cohorts")
        .authorization_bearer(admin_token(1))
        .json(&json!({"cohortNumber": 3}))
        .await;

    assert_eq!(response.status_code(), StatusCode::CREATED);
    let body: ApiResponse<Value> = response.json();
    assert_eq!(body.status_code, 201);
    let cohort = body.data.unwrap();
    assert_eq!(cohort["cohortNumber"], 3);
    assert!(cohort["name"].is_null());
}

#[tokio::test]
async fn test_create_cohort_duplicate_number() {
    let (server, pool) = setup_test_environment().await;
    create_test_cohort(&pool, 5, Some("First Five")).await;

    let response = server
        .post("/admin/cohorts")
        .authorization_bearer(admin_token(1))
        .json(&json!({"cohortNumber": 5, "name": "Second Five"}))
        .await;

    assert_eq!(response.status_code(), StatusCode::CONFLICT);
    let body: ApiResponse<Value> = response.json();
    assert!(body.status_message.contains("already in use"));
}

#[tokio::test]
async fn test_create_cohort_rejects_non_positive_number() {
    let (server, _pool) = setup_test_environment().await;

    let response = server
        .post("/admin/cohorts")
        .authorization_bearer(admin_token(1))
        .json(&json!({"cohortNumber": 0}))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

// list_cohorts / get_cohort

#[tokio::test]
async fn test_list_cohorts_with_counts_sorted_by_number() {
    let (server, pool) = setup_test_environment().await;
    let cohort_b = create_test_cohort(&pool, 9, Some("Niners")).await;
    let cohort_a = create_test_cohort(&pool, 2, None).await;
    create_test_participant(&pool, cohort_b, "09001", "b-one", "pw").await;
    create_test_participant(&pool, cohort_b, "09002", "b-two", "pw").await;

    let response = server
        .get("/admin/cohorts")
        .authorization_bearer(admin_token(1))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: ApiResponse<Vec<CohortSummary>> = response.json();
    let cohorts = body.data.unwrap();
    assert_eq!(cohorts.len(), 2);
    assert_eq!(cohorts[0].id, cohort_a);
    assert_eq!(cohorts[0].participant_count, 0);
    assert_eq!(cohorts[1].id, cohort_b);
    assert_eq!(cohorts[1].participant_count, 2);
}

#[tokio::test]
async fn test_get_cohort_leaderboard_order() {
    let (server, pool) = setup_test_environment().await;
    let cohort_id = create_test_cohort(&pool, 7, Some("Leaders")).await;
    let low = create_test_participant(&pool, cohort_id, "07001", "low", "pw").await;
    let high = create_test_participant(&pool, cohort_id, "07002", "high", "pw").await;
    let tied = create_test_participant(&pool, cohort_id, "07003", "tied", "pw").await;

    set_participant_points(&pool, high, 80).await;
    set_participant_points(&pool, tied, 0).await;

    let response = server
        .get(&format!("/admin/cohorts/{}", cohort_id))
        .authorization_bearer(admin_token(1))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: ApiResponse<CohortDetailResponse> = response.json();
    let detail = body.data.unwrap();
    assert_eq!(detail.cohort_number, 7);
    let ids: Vec<i64> = detail.participants.iter().map(|p| p.id).collect();
    // Highest points first; the zero-point tie keeps enrollment order.
    assert_eq!(ids, vec![high, low, tied]);
}

#[tokio::test]
async fn test_get_cohort_not_found() {
    let (server, _pool) = setup_test_environment().await;

    let response = server
        .get("/admin/cohorts/999999")
        .authorization_bearer(admin_token(1))
        .await;

    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

// enroll_participants

#[tokio::test]
async fn test_enroll_assigns_sequential_matric_numbers() {
    let (server, pool) = setup_test_environment().await;
    let cohort_id = create_test_cohort(&pool, 3, None).await;

    let response = server
        .post(&format!("/admin/cohorts/{}/users", cohort_id))
        .authorization_bearer(admin_token(1))
        .json(&json!({"users": [
            {"username": "alice", "password": "alice-pw"},
            {"username": "bob", "password": "bob-pw"}
        ]}))
        .await;

    assert_eq!(response.status_code(), StatusCode::CREATED);
    let body: ApiResponse<Vec<EnrolledParticipant>> = response.json();
    let enrolled = body.data.unwrap();
    assert_eq!(enrolled.len(), 2);
    assert_eq!(enrolled[0].matric_number, "03001");
    assert_eq!(enrolled[0].username, "alice");
    assert_eq!(enrolled[1].matric_number, "03002");
    assert_eq!(enrolled[1].username, "bob");
}

#[tokio::test]
async fn test_enroll_continues_index_from_existing_participants() {
    let (server, pool) = setup_test_environment().await;
    let cohort_id = create_test_cohort(&pool, 4, None).await;
    create_test_participant(&pool, cohort_id, "04001", "existing", "pw").await;

    let response = server
        .post(&format!("/admin/cohorts/{}/users", cohort_id))
        .authorization_bearer(admin_token(1))
        .json(&json!({"users": [{"username": "newcomer", "password": "pw"}]}))
        .await;

    assert_eq!(response.status_code(), StatusCode::CREATED);
    let body: ApiResponse<Vec<EnrolledParticipant>> = response.json();
    assert_eq!(body.data.unwrap()[0].matric_number, "04002");
}

#[tokio::test]
async fn test_enroll_duplicate_username_rolls_back_whole_batch() {
    let (server, pool) = setup_test_environment().await;
    let cohort_id = create_test_cohort(&pool, 6, None).await;
    create_test_participant(&pool, cohort_id, "06001", "taken", "pw").await;

    let response = server
        .post(&format!("/admin/cohorts/{}/users", cohort_id))
        .authorization_bearer(admin_token(1))
        .json(&json!({"users": [
            {"username": "fresh", "password": "pw"},
            {"username": "taken", "password": "pw"}
        ]}))
        .await;

    assert_eq!(response.status_code(), StatusCode::CONFLICT);
    let body: ApiResponse<Value> = response.json();
    assert!(body.status_message.contains("already taken"));
    // The first user of the batch must not have been kept.
    assert_eq!(count_cohort_participants(&pool, cohort_id).await, 1);
}

#[tokio::test]
async fn test_enroll_empty_users_array() {
    let (server, pool) = setup_test_environment().await;
    let cohort_id = create_test_cohort(&pool, 8, None).await;

    let response = server
        .post(&format!("/admin/cohorts/{}/users", cohort_id))
        .authorization_bearer(admin_token(1))
        .json(&json!({"users": []}))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_enroll_cohort_not_found() {
    let (server, _pool) = setup_test_environment().await;

    let response = server
        .post("/admin/cohorts/999999/users")
        .authorization_bearer(admin_token(1))
        .json(&json!({"users": [{"username": "ghost", "password": "pw"}]}))
        .await;

    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

// checkpoints

#[tokio::test]
async fn test_create_checkpoint_success() {
    let (server, _pool) = setup_test_environment().await;
    let deadline = Utc::now() + Duration::days(14);

    let response = server
        .post("/admin/checkpoints")
        .authorization_bearer(admin_token(1))
        .json(&json!({
            "title": "Deploy a contract",
            "description": "Ship it to testnet",
            "deadline": deadline,
            "points": 50
        }))
        .await;

    assert_eq!(response.status_code(), StatusCode::CREATED);
    let body: ApiResponse<CheckpointResponse> = response.json();
    let checkpoint = body.data.unwrap();
    assert_eq!(checkpoint.title, "Deploy a contract");
    assert_eq!(checkpoint.points, 50);
}

#[tokio::test]
async fn test_create_checkpoint_rejects_non_positive_points() {
    let (server, _pool) = setup_test_environment().await;

    let response = server
        .post("/admin/checkpoints")
        .authorization_bearer(admin_token(1))
        .json(&json!({
            "title": "Worthless",
            "deadline": Utc::now() + Duration::days(1),
            "points": 0
        }))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_checkpoints_sorted_by_deadline_includes_past() {
    let (server, pool) = setup_test_environment().await;
    let later =
        create_test_checkpoint(&pool, "Later", Utc::now() + Duration::days(30), 10).await;
    let past = create_test_checkpoint(&pool, "Past", Utc::now() - Duration::days(1), 20).await;
    let soon = create_test_checkpoint(&pool, "Soon", Utc::now() + Duration::days(2), 30).await;

    let response = server
        .get("/admin/checkpoints")
        .authorization_bearer(admin_token(1))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: ApiResponse<Vec<CheckpointResponse>> = response.json();
    let ids: Vec<i64> = body.data.unwrap().iter().map(|c| c.id).collect();
    // Admins still see expired checkpoints, nearest deadline first.
    assert_eq!(ids, vec![past, soon, later]);
}

// pending queue

#[tokio::test]
async fn test_pending_queue_is_enriched_and_oldest_first() {
    let (server, pool) = setup_test_environment().await;
    let cohort_id = create_test_cohort(&pool, 11, None).await;
    let participant_id =
        create_test_participant(&pool, cohort_id, "11001", "queued", "pw").await;
    let checkpoint_id =
        create_test_checkpoint(&pool, "Certify", Utc::now() + Duration::days(7), 50).await;
    let other_checkpoint =
        create_test_checkpoint(&pool, "Older Task", Utc::now() + Duration::days(7), 10).await;

    let newer = create_test_submission(
        &pool,
        participant_id,
        checkpoint_id,
        "pending",
        Utc::now(),
    )
    .await;
    let older = create_test_submission(
        &pool,
        participant_id,
        other_checkpoint,
        "pending",
        Utc::now() - Duration::hours(5),
    )
    .await;

    let response = server
        .get("/admin/submissions/pending")
        .authorization_bearer(admin_token(1))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: ApiResponse<Vec<PendingSubmissionEntry>> = response.json();
    let queue = body.data.unwrap();
    assert_eq!(queue.len(), 2);
    assert_eq!(queue[0].id, older);
    assert_eq!(queue[1].id, newer);
    assert_eq!(queue[1].username, "queued");
    assert_eq!(queue[1].matric_number, "11001");
    assert_eq!(queue[1].checkpoint_title, "Certify");
    assert_eq!(queue[1].checkpoint_points, 50);
}

#[tokio::test]
async fn test_pending_queue_excludes_reviewed_submissions() {
    let (server, pool) = setup_test_environment().await;
    let cohort_id = create_test_cohort(&pool, 12, None).await;
    let participant_id =
        create_test_participant(&pool, cohort_id, "12001", "reviewed", "pw").await;
    let approved_cp =
        create_test_checkpoint(&pool, "Approved CP", Utc::now() + Duration::days(7), 10).await;
    let rejected_cp =
        create_test_checkpoint(&pool, "Rejected CP", Utc::now() + Duration::days(7), 10).await;
    create_test_submission(&pool, participant_id, approved_cp, "approved", Utc::now()).await;
    create_test_submission(&pool, participant_id, rejected_cp, "rejected", Utc::now()).await;

    let response = server
        .get("/admin/submissions/pending")
        .authorization_bearer(admin_token(1))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: ApiResponse<Vec<PendingSubmissionEntry>> = response.json();
    assert!(body.data.unwrap().is_empty());
}

// review_submission

#[tokio::test]
async fn test_review_approve_credits_points_and_clears_queue() {
    let (server, pool) = setup_test_environment().await;
    let cohort_id = create_test_cohort(&pool, 13, None).await;
    let participant_id =
        create_test_participant(&pool, cohort_id, "13001", "earner", "pw").await;
    let checkpoint_id =
        create_test_checkpoint(&pool, "Worth Fifty", Utc::now() + Duration::days(7), 50).await;
    let submission_id = create_test_submission(
        &pool,
        participant_id,
        checkpoint_id,
        "pending",
        Utc::now(),
    )
    .await;
    let points_before = get_participant_points(&pool, participant_id).await;

    let response = server
        .patch(&format!("/admin/submissions/{}/review", submission_id))
        .authorization_bearer(admin_token(1))
        .json(&json!({"status": "approved"}))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: ApiResponse<SubmissionResponse> = response.json();
    let reviewed = body.data.unwrap();
    assert_eq!(reviewed.status, "approved");
    assert!(reviewed.reviewed_at.is_some());

    assert_eq!(
        get_participant_points(&pool, participant_id).await,
        points_before + 50
    );

    let queue_response = server
        .get("/admin/submissions/pending")
        .authorization_bearer(admin_token(1))
        .await;
    let queue: ApiResponse<Vec<PendingSubmissionEntry>> = queue_response.json();
    assert!(queue.data.unwrap().iter().all(|s| s.id != submission_id));
}

#[tokio::test]
async fn test_review_reject_leaves_points_unchanged() {
    let (server, pool) = setup_test_environment().await;
    let cohort_id = create_test_cohort(&pool, 14, None).await;
    let participant_id =
        create_test_participant(&pool, cohort_id, "14001", "unlucky", "pw").await;
    let checkpoint_id =
        create_test_checkpoint(&pool, "Rejected Task", Utc::now() + Duration::days(7), 25).await;
    let submission_id = create_test_submission(
        &pool,
        participant_id,
        checkpoint_id,
        "pending",
        Utc::now(),
    )
    .await;

    let response = server
        .patch(&format!("/admin/submissions/{}/review", submission_id))
        .authorization_bearer(admin_token(1))
        .json(&json!({"status": "rejected"}))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: ApiResponse<SubmissionResponse> = response.json();
    let reviewed = body.data.unwrap();
    assert_eq!(reviewed.status, "rejected");
    assert!(reviewed.reviewed_at.is_some());
    assert_eq!(get_participant_points(&pool, participant_id).await, 0);
}

#[tokio::test]
async fn test_review_unknown_status_is_bad_request() {
    let (server, pool) = setup_test_environment().await;
    let cohort_id = create_test_cohort(&pool, 17, None).await;
    let participant_id =
        create_test_participant(&pool, cohort_id, "17001", "undecided", "pw").await;
    let checkpoint_id =
        create_test_checkpoint(&pool, "Strict Review", Utc::now() + Duration::days(7), 10).await;
    let submission_id = create_test_submission(
        &pool,
        participant_id,
        checkpoint_id,
        "pending",
        Utc::now(),
    )
    .await;

    let response = server
        .patch(&format!("/admin/submissions/{}/review", submission_id))
        .authorization_bearer(admin_token(1))
        .json(&json!({"status": "maybe"}))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: ApiResponse<Value> = response.json();
    assert!(body.status_message.contains("approved"));
    assert!(body.status_message.contains("rejected"));

    let (status, reviewed_at, _, _) = get_submission_state(&pool, submission_id).await;
    assert_eq!(status, "pending");
    assert!(reviewed_at.is_none());
}

#[tokio::test]
async fn test_review_failed_credit_rolls_back_status_write() {
    let (server, pool) = setup_test_environment().await;
    let cohort_id = create_test_cohort(&pool, 16, None).await;
    let participant_id =
        create_test_participant(&pool, cohort_id, "16001", "maxed-out", "pw").await;
    let checkpoint_id =
        create_test_checkpoint(&pool, "One Too Many", Utc::now() + Duration::days(7), 50).await;
    let submission_id = create_test_submission(
        &pool,
        participant_id,
        checkpoint_id,
        "pending",
        Utc::now(),
    )
    .await;

    // Make the point credit fail mid-transaction: the balance sits at the
    // column maximum, so adding the checkpoint's points overflows.
    set_participant_points(&pool, participant_id, i32::MAX).await;

    let response = server
        .patch(&format!("/admin/submissions/{}/review", submission_id))
        .authorization_bearer(admin_token(1))
        .json(&json!({"status": "approved"}))
        .await;

    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

    // The status write from the same transaction must not have survived.
    let (status, reviewed_at, _, _) = get_submission_state(&pool, submission_id).await;
    assert_eq!(status, "pending");
    assert!(reviewed_at.is_none());
    assert_eq!(
        get_participant_points(&pool, participant_id).await,
        i32::MAX
    );
}

#[tokio::test]
async fn test_review_not_found() {
    let (server, _pool) = setup_test_environment().await;

    let response = server
        .patch("/admin/submissions/999999/review")
        .authorization_bearer(admin_token(1))
        .json(&json!({"status": "approved"}))
        .await;

    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_review_twice_conflicts_and_credits_once() {
    let (server, pool) = setup_test_environment().await;
    let cohort_id = create_test_cohort(&pool, 15, None).await;
    let participant_id =
        create_test_participant(&pool, cohort_id, "15001", "once-only", "pw").await;
    let checkpoint_id =
        create_test_checkpoint(&pool, "Single Credit", Utc::now() + Duration::days(7), 40).await;
    let submission_id = create_test_submission(
        &pool,
        participant_id,
        checkpoint_id,
        "pending",
        Utc::now(),
    )
    .await;

    let first = server
        .patch(&format!("/admin/submissions/{}/review", submission_id))
        .authorization_bearer(admin_token(1))
        .json(&json!({"status": "approved"}))
        .await;
    assert_eq!(first.status_code(), StatusCode::OK);

    let second = server
        .patch(&format!("/admin/submissions/{}/review", submission_id))
        .authorization_bearer(admin_token(1))
        .json(&json!({"status": "approved"}))
        .await;

    assert_eq!(second.status_code(), StatusCode::CONFLICT);
    let body: ApiResponse<Value> = second.json();
    assert!(body.status_message.contains("already been reviewed"));

    // The failed re-review must leave both rows untouched.
    assert_eq!(get_participant_points(&pool, participant_id).await, 40);
    let (status, reviewed_at, _, _) = get_submission_state(&pool, submission_id).await;
    assert_eq!(status, "approved");
    assert!(reviewed_at.is_some());
}
