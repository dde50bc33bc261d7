use std::{collections::HashMap, error::Error, fmt, sync::Arc};

use async_trait::async_trait;
use axum::{
    extract::{rejection::JsonRejection, FromRequestParts, Path, State},
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        request, HeaderValue, Method, StatusCode,
    },
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, RequestPartsExt as _, Router,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use derive_more::From;
use itertools::Itertools as _;
use time::OffsetDateTime;
use tokio::{fs, net, task};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{
    layer::SubscriberExt as _, util::SubscriberInitExt as _, EnvFilter,
};

use assignment_review::{
    api::{self, user::Role},
    auth, db,
    db::assignment::Decision,
    validation, Config,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = fs::read_to_string("config.toml").await?;
    let config = toml::from_str::<Config>(&config)?;

    let (db_client, db_connection) = db::connect(config.db).await?;

    task::spawn(async move {
        if let Err(e) = db_connection.await {
            panic!("database connection failed: {e}");
        }
    });

    let mut cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);
    for origin in &config.http.cors.allowed_origins {
        cors = cors.allow_origin(origin.parse::<HeaderValue>()?);
    }

    let app = Router::new()
        .nest("/admin", admin_routes())
        .nest("/user", user_routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(Arc::new(AppState {
            db_client,
            authority: auth::Authority::new(
                config.jwt.secret.as_bytes(),
                config.jwt.expiration_time,
            ),
        }));

    let listener = net::TcpListener::bind(config.http.server.addr).await?;
    tracing::info!(addr = %config.http.server.addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}

fn admin_routes() -> Router<SharedAppState> {
    Router::new()
        .route("/register", post(register_admin))
        .route("/login", post(login_admin))
        .route("/assignments", get(list_admin_assignments))
        .route("/assignments/:id/accept", post(accept_assignment))
        .route("/assignments/:id/reject", post(reject_assignment))
}

fn user_routes() -> Router<SharedAppState> {
    Router::new()
        .route("/register", post(register_user))
        .route("/login", post(login_user))
        .route("/upload", post(upload_assignment))
        .route("/assignments", get(list_user_assignments))
        .route("/admins", get(list_admins))
}

fn reply(status: StatusCode, msg: impl Into<String>) -> Response {
    (status, Json(api::Message::new(msg))).into_response()
}

fn server_error(e: impl fmt::Display) -> Response {
    tracing::error!(error = %e, "request failed");
    reply(StatusCode::INTERNAL_SERVER_ERROR, "Server error")
}

fn validation_failed(errors: validation::Errors) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(api::Message::with_errors(
            "Validation error",
            errors.into_messages(),
        )),
    )
        .into_response()
}

async fn register_admin(
    State(state): State<SharedAppState>,
    input: Result<Json<validation::RegisterInput>, JsonRejection>,
) -> Result<(StatusCode, Json<api::Message>), RegisterError> {
    let Json(input) = input.map_err(validation::Errors::from)?;
    register(&state, Role::Admin, input).await
}

async fn register_user(
    State(state): State<SharedAppState>,
    input: Result<Json<validation::RegisterInput>, JsonRejection>,
) -> Result<(StatusCode, Json<api::Message>), RegisterError> {
    let Json(input) = input.map_err(validation::Errors::from)?;
    register(&state, Role::User, input).await
}

/// Creates an account with the role of the endpoint it was requested on.
async fn register(
    state: &AppState,
    role: Role,
    input: validation::RegisterInput,
) -> Result<(StatusCode, Json<api::Message>), RegisterError> {
    use RegisterError as E;

    let validation::Registration {
        name,
        email,
        password,
        role,
    } = input.validate(role)?;

    if state.db_client.get_user_by_email(&email).await?.is_some() {
        return Err(E::EmailAlreadyExists);
    }

    let user = db::User {
        id: api::user::Id::new(),
        name,
        email,
        role,
        password_hash: auth::hash_password(password).await?,
    };
    if !state.db_client.insert_user(&user).await? {
        return Err(E::EmailAlreadyExists);
    }

    tracing::info!(user_id = %user.id, %role, "account registered");

    Ok((
        StatusCode::CREATED,
        Json(api::Message::new(format!("{role} registered successfully"))),
    ))
}

#[derive(Debug, From)]
pub enum RegisterError {
    #[from]
    CryptoError(auth::Error),
    #[from]
    DbError(db::Error),
    EmailAlreadyExists,
    #[from]
    ValidationError(validation::Errors),
}

impl IntoResponse for RegisterError {
    fn into_response(self) -> Response {
        match self {
            Self::ValidationError(errors) => validation_failed(errors),
            Self::EmailAlreadyExists => {
                reply(StatusCode::BAD_REQUEST, "Email already exists")
            }
            Self::CryptoError(e) => server_error(e),
            Self::DbError(e) => server_error(e),
        }
    }
}

async fn login_admin(
    State(state): State<SharedAppState>,
    input: Result<Json<validation::LoginInput>, JsonRejection>,
) -> Result<Json<api::Token>, LoginError> {
    let Json(input) = input.map_err(validation::Errors::from)?;
    login(&state, Role::Admin, input).await
}

async fn login_user(
    State(state): State<SharedAppState>,
    input: Result<Json<validation::LoginInput>, JsonRejection>,
) -> Result<Json<api::Token>, LoginError> {
    let Json(input) = input.map_err(validation::Errors::from)?;
    login(&state, Role::User, input).await
}

/// Only accounts with the endpoint's role can log in through it.
async fn login(
    state: &AppState,
    role: Role,
    input: validation::LoginInput,
) -> Result<Json<api::Token>, LoginError> {
    use LoginError as E;

    let validation::Credentials { email, password } = input.validate()?;

    let user = state
        .db_client
        .get_user_by_email(&email)
        .await?
        .filter(|u| u.role == role)
        .ok_or(E::AccountNotFound(role))?;
    if !auth::verify_password(password, user.password_hash).await? {
        return Err(E::InvalidCredentials);
    }

    let token = state.authority.issue(user.id, user.role)?;

    tracing::info!(user_id = %user.id, %role, "logged in");

    Ok(Json(api::Token { token }))
}

#[derive(Debug, From)]
pub enum LoginError {
    AccountNotFound(Role),
    #[from]
    CryptoError(auth::Error),
    #[from]
    DbError(db::Error),
    InvalidCredentials,
    #[from]
    ValidationError(validation::Errors),
}

impl IntoResponse for LoginError {
    fn into_response(self) -> Response {
        match self {
            Self::ValidationError(errors) => validation_failed(errors),
            Self::AccountNotFound(role) => {
                reply(StatusCode::BAD_REQUEST, format!("{role} not found"))
            }
            Self::InvalidCredentials => {
                reply(StatusCode::BAD_REQUEST, "Invalid credentials")
            }
            Self::CryptoError(e) => server_error(e),
            Self::DbError(e) => server_error(e),
        }
    }
}

async fn list_admin_assignments(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
) -> Result<Json<Vec<api::Assignment>>, ListAssignmentsError> {
    let my = auth_claims.require(Role::Admin)?;

    let assignments =
        state.db_client.get_assignments_by_admin(my.user_id).await?;

    Ok(Json(describe_assignments(&state.db_client, assignments).await?))
}

async fn list_user_assignments(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
) -> Result<Json<Vec<api::Assignment>>, ListAssignmentsError> {
    let my = auth_claims.require(Role::User)?;

    let assignments =
        state.db_client.get_assignments_by_user(my.user_id).await?;

    Ok(Json(describe_assignments(&state.db_client, assignments).await?))
}

/// Resolves submitter and admin names, preserving the input order.
async fn describe_assignments(
    db_client: &db::Client,
    assignments: Vec<db::Assignment>,
) -> Result<Vec<api::Assignment>, ListAssignmentsError> {
    use ListAssignmentsError as E;

    let user_ids = assignments
        .iter()
        .flat_map(|assignment| [assignment.user, assignment.admin])
        .unique()
        .collect::<Vec<_>>();
    let users = db_client.get_users_by_ids(&user_ids).await?;

    assignments
        .into_iter()
        .map(|assignment| describe_assignment(assignment, &users))
        .collect::<Result<Vec<_>, _>>()
        .map_err(E::UserNotFound)
}

fn describe_assignment(
    assignment: db::Assignment,
    users: &HashMap<api::user::Id, db::User>,
) -> Result<api::Assignment, api::user::Id> {
    let user = users.get(&assignment.user).ok_or(assignment.user)?;
    let admin = users.get(&assignment.admin).ok_or(assignment.admin)?;
    Ok(api::Assignment {
        id: assignment.id,
        task: assignment.task,
        status: assignment.status,
        user: user.into(),
        admin: admin.into(),
        created_at: assignment.created_at,
    })
}

#[derive(Debug, From)]
pub enum ListAssignmentsError {
    #[from]
    AuthError(AuthError),
    #[from]
    DbError(db::Error),
    UserNotFound(api::user::Id),
}

impl IntoResponse for ListAssignmentsError {
    fn into_response(self) -> Response {
        match self {
            Self::AuthError(e) => e.into_response(),
            Self::DbError(e) => server_error(e),
            Self::UserNotFound(id) => {
                server_error(format_args!("assignment party {id} not found"))
            }
        }
    }
}

async fn upload_assignment(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    input: Result<Json<validation::UploadInput>, JsonRejection>,
) -> Result<(StatusCode, Json<api::assignment::Uploaded>), UploadAssignmentError>
{
    use UploadAssignmentError as E;

    let claims = auth_claims.require(Role::User)?;
    let Json(input) = input.map_err(validation::Errors::from)?;
    let validation::Upload { task, admin_id } = input.validate()?;

    let admin = state
        .db_client
        .get_user_by_id(admin_id)
        .await?
        .filter(|u| u.role == Role::Admin)
        .ok_or(E::InvalidAdmin)?;
    let my = state
        .db_client
        .get_user_by_id(claims.user_id)
        .await?
        .ok_or(E::UserNotFound)?;

    let assignment = db::Assignment {
        id: api::assignment::Id::new(),
        task,
        status: api::assignment::Status::Pending,
        user: my.id,
        admin: admin.id,
        created_at: OffsetDateTime::now_utc(),
    };

    state.db_client.insert_assignment(&assignment).await?;

    tracing::info!(
        assignment_id = %assignment.id,
        user_id = %my.id,
        admin_id = %admin.id,
        "assignment uploaded"
    );

    Ok((
        StatusCode::CREATED,
        Json(api::assignment::Uploaded {
            msg: "Assignment uploaded successfully".to_string(),
            assignment: api::Assignment {
                id: assignment.id,
                task: assignment.task,
                status: assignment.status,
                user: (&my).into(),
                admin: (&admin).into(),
                created_at: assignment.created_at,
            },
        }),
    ))
}

#[derive(Debug, From)]
pub enum UploadAssignmentError {
    #[from]
    AuthError(AuthError),
    #[from]
    DbError(db::Error),
    InvalidAdmin,
    UserNotFound,
    #[from]
    ValidationError(validation::Errors),
}

impl IntoResponse for UploadAssignmentError {
    fn into_response(self) -> Response {
        match self {
            Self::AuthError(e) => e.into_response(),
            Self::ValidationError(errors) => validation_failed(errors),
            Self::InvalidAdmin => {
                reply(StatusCode::BAD_REQUEST, "Invalid admin ID provided")
            }
            Self::DbError(e) => server_error(e),
            Self::UserNotFound => server_error("submitter account not found"),
        }
    }
}

async fn accept_assignment(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    Path(id): Path<api::assignment::Id>,
) -> Result<Json<api::Message>, ReviewAssignmentError> {
    review_assignment(&state, auth_claims, id, Decision::Accept).await
}

async fn reject_assignment(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    Path(id): Path<api::assignment::Id>,
) -> Result<Json<api::Message>, ReviewAssignmentError> {
    review_assignment(&state, auth_claims, id, Decision::Reject).await
}

/// Applies the decision of the admin the assignment is addressed to.
///
/// Assignments of other admins are reported as missing.
async fn review_assignment(
    state: &AppState,
    auth_claims: AuthClaims,
    id: api::assignment::Id,
    decision: Decision,
) -> Result<Json<api::Message>, ReviewAssignmentError> {
    use ReviewAssignmentError as E;

    let my = auth_claims.require(Role::Admin)?;

    let assignment = state
        .db_client
        .get_assignment_by_id(id)
        .await?
        .filter(|a| a.admin == my.user_id)
        .ok_or(E::AssignmentNotFound)?;
    let status = assignment
        .status
        .review(decision)
        .ok_or(E::AlreadyReviewed)?;

    // Lost race against a concurrent review of the same assignment.
    if !state
        .db_client
        .update_assignment_status(id, assignment.status, status)
        .await?
    {
        return Err(E::AlreadyReviewed);
    }

    tracing::info!(
        assignment_id = %id,
        admin_id = %my.user_id,
        ?status,
        "assignment reviewed"
    );

    Ok(Json(api::Message::new(match decision {
        Decision::Accept => "Assignment accepted",
        Decision::Reject => "Assignment rejected",
    })))
}

#[derive(Debug, From)]
pub enum ReviewAssignmentError {
    AlreadyReviewed,
    AssignmentNotFound,
    #[from]
    AuthError(AuthError),
    #[from]
    DbError(db::Error),
}

impl IntoResponse for ReviewAssignmentError {
    fn into_response(self) -> Response {
        match self {
            Self::AuthError(e) => e.into_response(),
            Self::AssignmentNotFound => reply(
                StatusCode::NOT_FOUND,
                "Assignment not found or not assigned to this admin",
            ),
            Self::AlreadyReviewed => reply(
                StatusCode::CONFLICT,
                "Assignment has already been reviewed",
            ),
            Self::DbError(e) => server_error(e),
        }
    }
}

async fn list_admins(
    State(state): State<SharedAppState>,
    _: AuthClaims,
) -> Result<Json<Vec<api::User>>, ListAdminsError> {
    let admins = state.db_client.get_users_by_role(Role::Admin).await?;

    Ok(Json(admins.iter().map(api::User::from).collect()))
}

#[derive(Debug, From)]
pub enum ListAdminsError {
    #[from]
    DbError(db::Error),
}

impl IntoResponse for ListAdminsError {
    fn into_response(self) -> Response {
        match self {
            Self::DbError(e) => server_error(e),
        }
    }
}

type SharedAppState = Arc<AppState>;

struct AppState {
    db_client: db::Client,

    authority: auth::Authority,
}

/// Claims of a verified bearer token.
#[derive(Clone, Copy, Debug)]
pub struct AuthClaims(auth::Claims);

impl AuthClaims {
    fn require(self, role: Role) -> Result<auth::Claims, AuthError> {
        Ok(self.0.require(role)?)
    }
}

#[async_trait]
impl FromRequestParts<SharedAppState> for AuthClaims {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut request::Parts,
        state: &SharedAppState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| AuthError::InvalidToken)?;
        let claims = state.authority.verify(bearer.token()).map_err(|e| {
            tracing::debug!(error = %e, "token rejected");
            AuthError::InvalidToken
        })?;

        Ok(Self(claims))
    }
}

#[derive(Debug, From)]
pub enum AuthError {
    #[from]
    AccessDenied(auth::Forbidden),
    InvalidToken,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            Self::AccessDenied(_) => {
                reply(StatusCode::FORBIDDEN, "Access denied")
            }
            Self::InvalidToken => {
                reply(StatusCode::UNAUTHORIZED, "Invalid token")
            }
        }
    }
}
