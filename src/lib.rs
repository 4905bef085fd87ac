use crate::auth::AuthKeys;
use crate::cli::Args;
use crate::model::admin::NewAdmin;
use crate::schema::admins::dsl as admins_dsl;
use crate::storage::{LocalBlobStore, SharedBlobStore};
use anyhow::Context;
use axum::Router;
use axum::extract::FromRef;
use axum::routing::{get, patch, post};
use deadpool_diesel::Runtime;
use deadpool_diesel::postgres::{Manager, Pool};
use diesel::prelude::*;
use std::path::Path;
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::log::info;

pub mod auth;
pub mod cli;
pub mod matric;
pub mod model;
pub mod payloads;
pub mod response;
pub mod schema;
pub mod storage;

pub mod errors;

mod api;

#[derive(Clone)]
pub struct AppState {
    pub pool: Pool,
    pub auth_keys: AuthKeys,
    pub blob_store: SharedBlobStore,
}

impl FromRef<AppState> for Pool {
    fn from_ref(state: &AppState) -> Pool {
        state.pool.clone()
    }
}

impl FromRef<AppState> for AuthKeys {
    fn from_ref(state: &AppState) -> AuthKeys {
        state.auth_keys.clone()
    }
}

impl FromRef<AppState> for SharedBlobStore {
    fn from_ref(state: &AppState) -> SharedBlobStore {
        state.blob_store.clone()
    }
}

pub async fn init_router(args: &Args) -> anyhow::Result<Router> {
    info!("Initializing database pool...");
    let pool = init_pool(&args.connection_str, args.db_pool_max_size)
        .context("Failed to initialize database pool")?;

    if let (Some(username), Some(password)) = (&args.admin_username, &args.admin_password) {
        info!("Ensuring bootstrap admin account exists...");
        ensure_seed_admin(&pool, username, password)
            .await
            .context("Failed to seed bootstrap admin")?;
    }

    let state = AppState {
        pool,
        auth_keys: AuthKeys::new(&args.jwt_secret, args.token_ttl_hours),
        blob_store: Arc::new(LocalBlobStore::new(
            args.uploads_dir.clone(),
            args.public_base_url.clone(),
        )),
    };

    info!("Initializing router...");
    Ok(init_router_internal(state, &args.uploads_dir))
}

pub fn init_test_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health))
        .nest("/admin", admin_routes())
        .nest("/users", participant_routes())
        .with_state(state)
}

fn init_router_internal(state: AppState, uploads_dir: &Path) -> Router {
    Router::new()
        .route("/", get(health))
        .nest("/admin", admin_routes())
        .nest("/users", participant_routes())
        .nest_service("/uploads", ServeDir::new(uploads_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "Checkpoint portal API is alive"
}

fn init_pool(conn_str: &str, max_size: u32) -> anyhow::Result<Pool> {
    let manager = Manager::new(conn_str, Runtime::Tokio1);
    let pool = Pool::builder(manager).max_size(max_size as usize).build()?;
    Ok(pool)
}

/// Inserts the bootstrap admin account if the username is still free.
pub async fn ensure_seed_admin(pool: &Pool, username: &str, password: &str) -> anyhow::Result<()> {
    let new_admin = NewAdmin {
        username: username.to_string(),
        password_hash: auth::hash_password(password)
            .map_err(|e| anyhow::anyhow!("Failed to hash bootstrap admin password: {}", e))?,
        role: "super_admin".to_string(),
    };

    let conn = pool
        .get()
        .await
        .context("Failed to get connection for admin seed")?;
    let inserted = conn
        .interact(move |conn_sync| {
            diesel::insert_into(admins_dsl::admins)
                .values(&new_admin)
                .on_conflict(admins_dsl::username)
                .do_nothing()
                .execute(conn_sync)
        })
        .await
        .map_err(|e| anyhow::anyhow!("Admin seed interaction failed: {}", e))?
        .context("Admin seed insert failed")?;

    if inserted == 1 {
        info!("Bootstrap admin '{}' created", username);
    } else {
        info!("Bootstrap admin '{}' already exists, skipping seed", username);
    }
    Ok(())
}

fn admin_routes() -> Router<AppState> {
    Router::new()
        // public routes go here
        .route("/login", post(api::admin::login))
        // protected routes go here
        .route(
            "/cohorts",
            post(api::admin::create_cohort).get(api::admin::list_cohorts),
        )
        .route("/cohorts/{id}", get(api::admin::get_cohort))
        .route("/cohorts/{id}/users", post(api::admin::enroll_participants))
        .route(
            "/checkpoints",
            post(api::admin::create_checkpoint).get(api::admin::list_checkpoints),
        )
        .route(
            "/submissions/pending",
            get(api::admin::get_pending_submissions),
        )
        .route(
            "/submissions/{id}/review",
            patch(api::admin::review_submission),
        )
}

fn participant_routes() -> Router<AppState> {
    Router::new()
        // public routes go here
        .route("/login", post(api::participant::login))
        // protected routes go here
        .route(
            "/checkpoints",
            get(api::participant::get_active_checkpoints),
        )
        .route("/submissions", post(api::participant::create_submission))
}
