//! Pathbit REST API Server
//!
//! Run with: cargo run --features server --bin pathbit-server
//!
//! Settings come from `pathbit.toml` and `PATHBIT_*` variables (see `pathbit::Settings`).
//!
//! Endpoints:
//!   GET    /health                  - Liveness
//!   GET    /menus/tree              - Menu hierarchy
//!   GET    /menus/forest            - Hierarchy with dangling-reference diagnostics
//!   POST   /menus                   - Create menu
//!   PUT    /menus/:id               - Rename / re-parent menu
//!   DELETE /menus/:id               - Delete menu
//!   POST   /paths                   - Create endpoint
//!   PUT    /paths/:id               - Edit endpoint
//!   DELETE /paths/:id               - Delete endpoint (revoked from every role)
//!   GET    /roles                   - List roles (?id=&name= prefix filters)
//!   POST   /roles                   - Create role
//!   GET    /roles/:id               - Role with permission tree
//!   PUT    /roles/:id               - Edit role / replace grants
//!   DELETE /roles/:id               - Delete role
//!   GET    /users                   - List users (?id=&username=&email=&phone= prefixes, ?status=)
//!   POST   /users                   - Create user
//!   GET    /users/:id               - User with roles
//!   PUT    /users/:id               - Edit user / replace roles
//!   DELETE /users/:id               - Delete user
//!   GET    /users/:id/menus         - Menu tree annotated with the user's permissions
//!   GET    /users/:id/menus/accessible - Only the menus and endpoints the user can reach
//!   GET    /users/:id/permissions   - Effective endpoint ids
//!   POST   /authorize               - Check (user, method, path); 200 allow, 403 deny
//!   GET    /admins                  - List admins (?id= exact, ?username=&email=&phone= prefixes)
//!   POST   /admins                  - Create admin
//!   GET    /admins/:id              - Admin
//!   PUT    /admins/:id              - Edit admin
//!   DELETE /admins/:id              - Delete admin
//!   POST   /auth/login              - Verify admin credentials
//!   POST   /admins/:id/password     - Change password

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use pathbit::{
    Admin, AdminFilter, AdminUpdate, Forest, LogConfig, LogFormat, Menu, MenuNode, MenuUpdate, NewAdmin, NewMenu, NewPath,
    NewRole, NewUser, PageRequest, Paged, PathUpdate, PathbitError, Role, RoleFilter, RoleInfo, RoleMenuNode, RoleUpdate,
    Settings, Store, User, UserFilter, UserInfo, UserUpdate,
};

// ============================================================================
// State & Errors
// ============================================================================

type AppState = Arc<Store>;

struct ApiError(PathbitError);

#[derive(Serialize)]
struct ErrorRes {
    error: String,
}

impl From<PathbitError> for ApiError {
    fn from(e: PathbitError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            PathbitError::NotFound { .. } => StatusCode::NOT_FOUND,
            PathbitError::Conflict(_) => StatusCode::CONFLICT,
            PathbitError::Invalid(_) => StatusCode::BAD_REQUEST,
            PathbitError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            PathbitError::IntegrityViolation(_) | PathbitError::DanglingReference(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            PathbitError::Transaction(_) | PathbitError::Config(_) => {
                error!(error = %self.0, "request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(ErrorRes { error: self.0.to_string() })).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Run a store operation off the async executor; LMDB writers block
async fn blocking<T, F>(store: AppState, f: F) -> ApiResult<T>
where
    T: Send + 'static,
    F: FnOnce(&Store) -> pathbit::Result<T> + Send + 'static,
{
    match tokio::task::spawn_blocking(move || f(&store)).await {
        Ok(r) => Ok(Json(r?)),
        Err(e) => Err(ApiError(PathbitError::Transaction(e.to_string()))),
    }
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Serialize)]
struct HealthRes {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct AffectedRes {
    affected_users: Vec<String>,
}

#[derive(Deserialize)]
struct AuthorizeReq {
    user_id: String,
    method: String,
    path: String,
}

#[derive(Serialize)]
struct AuthorizeRes {
    allowed: bool,
}

#[derive(Deserialize)]
struct LoginReq {
    username: String,
    password: String,
}

#[derive(Deserialize)]
struct ChangePasswordReq {
    old_password: String,
    new_password: String,
}

// ============================================================================
// Handlers
// ============================================================================

async fn health() -> Json<HealthRes> {
    Json(HealthRes { status: "ok", version: env!("CARGO_PKG_VERSION") })
}

// Menus & endpoints

async fn menu_tree(State(s): State<AppState>) -> ApiResult<Vec<MenuNode>> {
    blocking(s, |st| st.get_menu_tree()).await
}

async fn menu_forest(State(s): State<AppState>) -> ApiResult<Forest> {
    blocking(s, |st| st.get_menu_forest()).await
}

async fn add_menu(State(s): State<AppState>, Json(req): Json<NewMenu>) -> ApiResult<Menu> {
    blocking(s, move |st| st.add_menu(req)).await
}

async fn edit_menu(State(s): State<AppState>, Path(id): Path<String>, Json(req): Json<MenuUpdate>) -> ApiResult<Menu> {
    blocking(s, move |st| st.edit_menu(&id, req)).await
}

async fn delete_menu(State(s): State<AppState>, Path(id): Path<String>) -> ApiResult<()> {
    blocking(s, move |st| st.delete_menu(&id)).await
}

async fn add_path(State(s): State<AppState>, Json(req): Json<NewPath>) -> ApiResult<pathbit::Path> {
    blocking(s, move |st| st.add_path(req)).await
}

async fn edit_path(
    State(s): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<PathUpdate>,
) -> ApiResult<pathbit::Path> {
    blocking(s, move |st| st.edit_path(&id, req)).await
}

async fn delete_path(State(s): State<AppState>, Path(id): Path<String>) -> ApiResult<AffectedRes> {
    blocking(s, move |st| Ok(AffectedRes { affected_users: st.delete_path(&id)? })).await
}

// Roles

async fn list_roles(
    State(s): State<AppState>,
    Query(filter): Query<RoleFilter>,
    Query(page): Query<PageRequest>,
) -> ApiResult<Paged<Role>> {
    blocking(s, move |st| st.list_roles(&filter, page)).await
}

async fn add_role(State(s): State<AppState>, Json(req): Json<NewRole>) -> ApiResult<Role> {
    blocking(s, move |st| st.add_role(req)).await
}

async fn role_info(State(s): State<AppState>, Path(id): Path<String>) -> ApiResult<RoleInfo> {
    blocking(s, move |st| st.role_info(&id)).await
}

async fn edit_role(State(s): State<AppState>, Path(id): Path<String>, Json(req): Json<RoleUpdate>) -> ApiResult<Role> {
    blocking(s, move |st| st.edit_role(&id, req)).await
}

async fn delete_role(State(s): State<AppState>, Path(id): Path<String>) -> ApiResult<AffectedRes> {
    blocking(s, move |st| Ok(AffectedRes { affected_users: st.delete_role(&id)? })).await
}

// Users

async fn list_users(
    State(s): State<AppState>,
    Query(filter): Query<UserFilter>,
    Query(page): Query<PageRequest>,
) -> ApiResult<Paged<User>> {
    blocking(s, move |st| st.list_users(&filter, page)).await
}

async fn add_user(State(s): State<AppState>, Json(req): Json<NewUser>) -> ApiResult<User> {
    blocking(s, move |st| st.add_user(req)).await
}

async fn user_info(State(s): State<AppState>, Path(id): Path<String>) -> ApiResult<UserInfo> {
    blocking(s, move |st| st.user_info(&id)).await
}

async fn edit_user(State(s): State<AppState>, Path(id): Path<String>, Json(req): Json<UserUpdate>) -> ApiResult<User> {
    blocking(s, move |st| st.edit_user(&id, req)).await
}

async fn delete_user(State(s): State<AppState>, Path(id): Path<String>) -> ApiResult<()> {
    blocking(s, move |st| st.delete_user(&id)).await
}

async fn user_menus(State(s): State<AppState>, Path(id): Path<String>) -> ApiResult<Vec<RoleMenuNode>> {
    blocking(s, move |st| st.get_user_menu_tree(&id)).await
}

async fn user_accessible_menus(State(s): State<AppState>, Path(id): Path<String>) -> ApiResult<Vec<RoleMenuNode>> {
    blocking(s, move |st| st.get_user_accessible_menus(&id)).await
}

async fn user_permissions(State(s): State<AppState>, Path(id): Path<String>) -> ApiResult<BTreeSet<String>> {
    blocking(s, move |st| st.effective_permissions(&id)).await
}

async fn authorize(State(s): State<AppState>, Json(req): Json<AuthorizeReq>) -> Result<Response, ApiError> {
    let Json(allowed) = blocking(s, move |st| st.is_authorized(&req.user_id, &req.method, &req.path)).await?;
    let status = if allowed { StatusCode::OK } else { StatusCode::FORBIDDEN };
    Ok((status, Json(AuthorizeRes { allowed })).into_response())
}

// Admins

async fn list_admins(
    State(s): State<AppState>,
    Query(filter): Query<AdminFilter>,
    Query(page): Query<PageRequest>,
) -> ApiResult<Paged<Admin>> {
    blocking(s, move |st| st.list_admins(&filter, page)).await
}

async fn add_admin(State(s): State<AppState>, Json(req): Json<NewAdmin>) -> ApiResult<Admin> {
    blocking(s, move |st| st.add_admin(req)).await
}

async fn admin_info(State(s): State<AppState>, Path(id): Path<String>) -> ApiResult<Admin> {
    blocking(s, move |st| st.admin_info(&id)).await
}

async fn edit_admin(State(s): State<AppState>, Path(id): Path<String>, Json(req): Json<AdminUpdate>) -> ApiResult<Admin> {
    blocking(s, move |st| st.edit_admin(&id, req)).await
}

async fn delete_admin(State(s): State<AppState>, Path(id): Path<String>) -> ApiResult<()> {
    blocking(s, move |st| st.delete_admin(&id)).await
}

async fn login(State(s): State<AppState>, Json(req): Json<LoginReq>) -> ApiResult<Admin> {
    blocking(s, move |st| st.login_admin(&req.username, &req.password)).await
}

async fn change_password(
    State(s): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ChangePasswordReq>,
) -> ApiResult<()> {
    blocking(s, move |st| st.change_admin_password(&id, &req.old_password, &req.new_password)).await
}

// ============================================================================
// Main
// ============================================================================

fn init_logger(log: &LogConfig) -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&log.filter))?;
    let registry = tracing_subscriber::registry().with(filter);
    match log.format {
        LogFormat::Json => registry.with(fmt::layer().json().with_target(true)).try_init()?,
        LogFormat::Pretty => registry.with(fmt::layer().pretty().with_target(true)).try_init()?,
    }
    Ok(())
}

fn router(store: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/menus/tree", get(menu_tree))
        .route("/menus/forest", get(menu_forest))
        .route("/menus", post(add_menu))
        .route("/menus/:id", put(edit_menu).delete(delete_menu))
        .route("/paths", post(add_path))
        .route("/paths/:id", put(edit_path).delete(delete_path))
        .route("/roles", get(list_roles).post(add_role))
        .route("/roles/:id", get(role_info).put(edit_role).delete(delete_role))
        .route("/users", get(list_users).post(add_user))
        .route("/users/:id", get(user_info).put(edit_user).delete(delete_user))
        .route("/users/:id/menus", get(user_menus))
        .route("/users/:id/menus/accessible", get(user_accessible_menus))
        .route("/users/:id/permissions", get(user_permissions))
        .route("/authorize", post(authorize))
        .route("/admins", get(list_admins).post(add_admin))
        .route("/auth/login", post(login))
        .route("/admins/:id", get(admin_info).put(edit_admin).delete(delete_admin))
        .route("/admins/:id/password", post(change_password))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(store)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::load()?;
    init_logger(&settings.log)?;

    let store = Arc::new(Store::open_with(&settings.store)?);
    info!(path = %settings.store.path.display(), "store ready");

    let addr = settings.server.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "pathbit server listening");
    axum::serve(listener, router(store)).await?;
    Ok(())
}
