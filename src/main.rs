use std::{collections::HashMap, error::Error, sync::Arc, time::Duration};

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Path, Query, State},
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        request, HeaderValue, Method, StatusCode,
    },
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, RequestPartsExt as _, Router,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use derive_more::From;
use futures::future::OptionFuture;
use itertools::Itertools as _;
use jsonwebtoken::{
    decode, encode, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use time::{macros::format_description, Date, OffsetDateTime};
use tokio::{fs, net, task};
use tower_http::cors::CorsLayer;
use tracing_subscriber::{
    layer::SubscriberExt as _, util::SubscriberInitExt as _,
};

use coyahue_helpdesk::{
    access, api,
    db::{self, audit::AuditEntry, comment::Comment},
    lifecycle, notify, sla, Config,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::registry()
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

    let notifier: Arc<dyn notify::Notifier> = match &config.smtp {
        Some(smtp) => Arc::new(notify::Mailer::new(smtp)?),
        None => {
            tracing::info!("no [smtp] section, notifications disabled");
            Arc::new(notify::Disabled)
        }
    };

    let mut cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);
    for origin in &config.http.cors.allowed_origins {
        cors = cors.allow_origin(origin.parse::<HeaderValue>()?);
    }

    let app = Router::new()
        .route("/auth", post(auth))
        .route("/user", get(get_user).post(save_user))
        .route("/user/all", get(list_users))
        .route("/ticket", get(list_tickets).post(add_ticket))
        .route("/ticket/:id", get(get_ticket).patch(edit_ticket))
        .route("/category", get(list_categories).post(save_category))
        .route("/category/:id", delete(delete_category))
        .route("/area", get(list_areas).post(save_area))
        .route("/area/:id", delete(delete_area))
        .route("/faq", get(list_faqs).post(save_faq))
        .route("/faq/:id", delete(delete_faq))
        .route("/report", get(report))
        .layer(cors)
        .with_state(Arc::new(AppState {
            db_client,
            notifier,
            jwt_expiration_time: config.jwt.expiration_time,
            jwt_decoding_key: DecodingKey::from_secret(
                config.jwt.secret.as_bytes(),
            ),
            jwt_encoding_key: EncodingKey::from_secret(
                config.jwt.secret.as_bytes(),
            ),
        }));

    let listener = net::TcpListener::bind(config.http.server.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Deserialize)]
struct AuthInput {
    login: String,
    password: String,
}

async fn auth(
    State(state): State<SharedAppState>,
    Json(AuthInput { login, password }): Json<AuthInput>,
) -> Result<String, AuthError> {
    use AuthError as E;

    let password_hash = api::user::PasswordHash::new(&password);

    let user = state
        .db_client
        .get_user_by_login(&login)
        .await?
        .filter(|u| u.password_hash == password_hash)
        .ok_or(E::WrongLoginOrPassword)?;

    let expires_at = OffsetDateTime::now_utc() + state.jwt_expiration_time;
    encode(
        &Header::default(),
        &AuthClaims {
            user_id: user.id,
            exp: expires_at.unix_timestamp(),
        },
        &state.jwt_encoding_key,
    )
    .map_err(|_| E::InvalidToken)
}

#[derive(Debug, From)]
pub enum AuthError {
    #[from]
    DbError(db::Error),
    InvalidToken,
    WrongLoginOrPassword,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            Self::DbError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::InvalidToken => StatusCode::UNAUTHORIZED,
            Self::WrongLoginOrPassword => StatusCode::FORBIDDEN,
        }
        .into_response()
    }
}

async fn get_user(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
) -> Result<Json<api::User>, GetUserError> {
    use GetUserError as E;

    let my = state
        .db_client
        .get_user_by_id(auth_claims.user_id)
        .await?
        .ok_or(E::UserNotFound)?;

    Ok(Json(api::User {
        id: my.id,
        name: my.name,
        role: my.role,
    }))
}

#[derive(Debug, From)]
pub enum GetUserError {
    #[from]
    DbError(db::Error),
    UserNotFound,
}

impl IntoResponse for GetUserError {
    fn into_response(self) -> Response {
        match self {
            Self::DbError(_) | Self::UserNotFound => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
        .into_response()
    }
}

async fn list_users(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
) -> Result<Json<Vec<api::user::Account>>, ListUsersError> {
    use ListUsersError as E;

    let my = state
        .db_client
        .get_user_by_id(auth_claims.user_id)
        .await?
        .ok_or(E::UserNotFound)?;
    if !access::allows(my.role, access::Action::ManageUsers) {
        return Err(E::AccessDenied);
    }

    let accounts = state
        .db_client
        .get_all_users()
        .await?
        .into_iter()
        .map(|u| api::user::Account {
            id: u.id,
            login: u.login,
            name: u.name,
            email: u.email,
            role: u.role,
        })
        .collect();

    Ok(Json(accounts))
}

#[derive(Debug, From)]
pub enum ListUsersError {
    #[from]
    DbError(db::Error),
    AccessDenied,
    UserNotFound,
}

impl IntoResponse for ListUsersError {
    fn into_response(self) -> Response {
        match self {
            Self::AccessDenied => StatusCode::FORBIDDEN,
            Self::DbError(_) | Self::UserNotFound => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
        .into_response()
    }
}

#[derive(Deserialize)]
struct SaveUserInput {
    id: Option<api::user::Id>,
    login: String,
    name: String,
    email: String,
    role: api::user::Role,
    password: Option<String>,
}

async fn save_user(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    Json(input): Json<SaveUserInput>,
) -> Result<Json<api::user::Account>, SaveUserError> {
    use SaveUserError as E;

    let my = state
        .db_client
        .get_user_by_id(auth_claims.user_id)
        .await?
        .ok_or(E::ActorNotFound)?;
    if !access::allows(my.role, access::Action::ManageUsers) {
        return Err(E::AccessDenied);
    }
    if input.login.trim().is_empty() {
        return Err(E::EmptyLogin);
    }

    // The role lands in the same row as the account itself: no user can
    // exist, even transiently, without one.
    let user = match input.id {
        Some(id) => {
            let existing = state
                .db_client
                .get_user_by_id(id)
                .await?
                .ok_or(E::UserNotFound)?;
            if existing.login != input.login
                && state
                    .db_client
                    .get_user_by_login(&input.login)
                    .await?
                    .is_some()
            {
                return Err(E::LoginTaken);
            }
            db::User {
                id,
                name: input.name,
                login: input.login,
                password_hash: match &input.password {
                    Some(password) => api::user::PasswordHash::new(password),
                    None => existing.password_hash,
                },
                email: input.email,
                role: input.role,
            }
        }
        None => {
            if state
                .db_client
                .get_user_by_login(&input.login)
                .await?
                .is_some()
            {
                return Err(E::LoginTaken);
            }
            let password = input.password.ok_or(E::MissingPassword)?;
            db::User {
                id: api::user::Id::new(),
                name: input.name,
                login: input.login,
                password_hash: api::user::PasswordHash::new(&password),
                email: input.email,
                role: input.role,
            }
        }
    };

    state.db_client.write_user(&user).await?;

    Ok(Json(api::user::Account {
        id: user.id,
        login: user.login,
        name: user.name,
        email: user.email,
        role: user.role,
    }))
}

#[derive(Debug, From)]
pub enum SaveUserError {
    #[from]
    DbError(db::Error),
    AccessDenied,
    ActorNotFound,
    EmptyLogin,
    LoginTaken,
    MissingPassword,
    UserNotFound,
}

impl IntoResponse for SaveUserError {
    fn into_response(self) -> Response {
        match self {
            Self::AccessDenied => StatusCode::FORBIDDEN,
            Self::EmptyLogin | Self::LoginTaken | Self::MissingPassword => {
                StatusCode::BAD_REQUEST
            }
            Self::UserNotFound => StatusCode::NOT_FOUND,
            Self::DbError(_) | Self::ActorNotFound => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
        .into_response()
    }
}

#[derive(Deserialize)]
struct ListTicketsInput {
    offset: usize,
    limit: usize,
}

async fn list_tickets(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    Query(ListTicketsInput { offset, limit }): Query<ListTicketsInput>,
) -> Result<Json<api::ticket::List>, ListTicketsError> {
    use ListTicketsError as E;

    let my = state
        .db_client
        .get_user_by_id(auth_claims.user_id)
        .await?
        .ok_or(E::UserNotFound)?;

    // Plain users only see their own tickets. The tech/admin queue is
    // deliberately unpartitioned so technicians can cover for each other.
    let (page, total_count) = if my.role == api::user::Role::User {
        let page_fut = state
            .db_client
            .get_tickets_page_by_requester(my.id, offset, limit);
        let count_fut =
            state.db_client.get_tickets_count_by_requester(my.id);
        tokio::try_join!(page_fut, count_fut)?
    } else {
        let page_fut = state.db_client.get_tickets_page(offset, limit);
        let count_fut = state.db_client.get_tickets_count();
        tokio::try_join!(page_fut, count_fut)?
    };

    let now = OffsetDateTime::now_utc();
    let tickets = build_ticket_views(&state, page, now).await?;

    Ok(Json(api::ticket::List {
        tickets,
        total_count,
    }))
}

#[derive(Debug, From)]
pub enum ListTicketsError {
    #[from]
    DbError(db::Error),
    #[from]
    View(ViewError),
    UserNotFound,
}

impl IntoResponse for ListTicketsError {
    fn into_response(self) -> Response {
        match self {
            Self::DbError(_) | Self::View(_) | Self::UserNotFound => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
        .into_response()
    }
}

#[derive(Deserialize)]
struct AddTicketInput {
    title: String,
    description: String,
    category: db::category::Id,
    area: Option<db::area::Id>,
    priority: Option<api::ticket::Priority>,
}

async fn add_ticket(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    Json(input): Json<AddTicketInput>,
) -> Result<Json<api::Ticket>, AddTicketError> {
    use AddTicketError as E;

    let my = state
        .db_client
        .get_user_by_id(auth_claims.user_id)
        .await?
        .ok_or(E::UserNotFound)?;
    if !access::allows(my.role, access::Action::CreateTicket) {
        return Err(E::AccessDenied);
    }
    if input.title.trim().is_empty() {
        return Err(E::EmptyTitle);
    }

    let category = state
        .db_client
        .get_category_by_id(input.category)
        .await?
        .ok_or(E::CategoryNotFound)?;
    let area = match input.area {
        Some(id) => Some(
            state
                .db_client
                .get_area_by_id(id)
                .await?
                .ok_or(E::AreaNotFound)?,
        ),
        None => None,
    };

    let now = OffsetDateTime::now_utc();
    let ticket = db::Ticket {
        id: api::ticket::Id::new(),
        title: input.title,
        description: input.description,
        category: category.id,
        area: area.map(|a| a.id),
        priority: input.priority.unwrap_or(api::ticket::Priority::Medium),
        status: api::ticket::Status::New,
        requester: my.id,
        assignee: None,
        created_at: now,
        updated_at: now,
        closed_at: None,
        rating: None,
        rating_comment: None,
    };
    let entry = AuditEntry::new(
        ticket.id,
        my.id,
        "created the ticket".to_string(),
        now,
    );
    state
        .db_client
        .write_ticket_with_audit(&ticket, &entry)
        .await?;

    let (subject, body) = notify::message::ticket_created(
        &my.name,
        &ticket.id.reference(),
        &ticket.title,
    );
    notify::spawn(Arc::clone(&state.notifier), my.email, subject, body);

    let mut views = build_ticket_views(&state, vec![ticket], now).await?;
    Ok(Json(views.pop().expect("one ticket in, one view out")))
}

#[derive(Debug, From)]
pub enum AddTicketError {
    #[from]
    DbError(db::Error),
    #[from]
    View(ViewError),
    AccessDenied,
    AreaNotFound,
    CategoryNotFound,
    EmptyTitle,
    UserNotFound,
}

impl IntoResponse for AddTicketError {
    fn into_response(self) -> Response {
        match self {
            Self::AccessDenied => StatusCode::FORBIDDEN,
            Self::EmptyTitle => StatusCode::BAD_REQUEST,
            Self::AreaNotFound | Self::CategoryNotFound => {
                StatusCode::NOT_FOUND
            }
            Self::DbError(_) | Self::View(_) | Self::UserNotFound => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
        .into_response()
    }
}

async fn get_ticket(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    Path(id): Path<api::ticket::Id>,
) -> Result<Json<api::Ticket>, GetTicketError> {
    use GetTicketError as E;

    let my = state
        .db_client
        .get_user_by_id(auth_claims.user_id)
        .await?
        .ok_or(E::UserNotFound)?;
    let ticket = state
        .db_client
        .get_ticket_by_id(id)
        .await?
        .ok_or(E::TicketNotFound)?;

    if my.role == api::user::Role::User && ticket.requester != my.id {
        return Err(E::AccessDenied);
    }

    let now = OffsetDateTime::now_utc();
    let mut views = build_ticket_views(&state, vec![ticket], now).await?;
    Ok(Json(views.pop().expect("one ticket in, one view out")))
}

#[derive(Debug, From)]
pub enum GetTicketError {
    #[from]
    DbError(db::Error),
    #[from]
    View(ViewError),
    AccessDenied,
    TicketNotFound,
    UserNotFound,
}

impl IntoResponse for GetTicketError {
    fn into_response(self) -> Response {
        match self {
            Self::AccessDenied => StatusCode::FORBIDDEN,
            Self::TicketNotFound => StatusCode::NOT_FOUND,
            Self::DbError(_) | Self::View(_) | Self::UserNotFound => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
        .into_response()
    }
}

#[derive(Deserialize)]
#[serde(content = "data", rename_all = "camelCase", tag = "op")]
enum EditTicketInput {
    Take,
    AdvanceStatus,
    AdvancePriority,
    Rate {
        score: u8,
        comment: Option<String>,
    },
    AddComment {
        content: String,
    },
}

async fn edit_ticket(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    Path(id): Path<api::ticket::Id>,
    Json(op): Json<EditTicketInput>,
) -> Result<Json<api::Ticket>, EditTicketError> {
    use EditTicketError as E;
    use EditTicketInput as Op;

    let my = state
        .db_client
        .get_user_by_id(auth_claims.user_id)
        .await?
        .ok_or(E::UserNotFound)?;
    let mut ticket = state
        .db_client
        .get_ticket_by_id(id)
        .await?
        .ok_or(E::TicketNotFound)?;

    let now = OffsetDateTime::now_utc();
    let is_requester = ticket.requester == my.id;

    match op {
        Op::Take => {
            if !access::allows(my.role, access::Action::TakeTicket) {
                return Err(E::AccessDenied);
            }

            let previous = lifecycle::take(&mut ticket, my.id, now);
            let previous = match previous {
                Some(id) => state
                    .db_client
                    .get_user_by_id(id)
                    .await?
                    .map_or_else(|| id.to_string(), |u| u.name),
                None => "nobody".to_string(),
            };
            let entry = AuditEntry::new(
                ticket.id,
                my.id,
                format!("took the ticket (reassigned from {previous})"),
                now,
            );
            state
                .db_client
                .write_ticket_with_audit(&ticket, &entry)
                .await?;
        }
        Op::AdvanceStatus => {
            if !access::allows(my.role, access::Action::AdvanceStatus) {
                return Err(E::AccessDenied);
            }

            let (from, to) = lifecycle::advance_status(&mut ticket, now);
            let entry = AuditEntry::new(
                ticket.id,
                my.id,
                format!("changed status from {from} to {to}"),
                now,
            );
            state
                .db_client
                .write_ticket_with_audit(&ticket, &entry)
                .await?;

            // The requester only hears about the terminal-facing statuses.
            if matches!(
                to,
                api::ticket::Status::Resolved | api::ticket::Status::Closed,
            ) {
                if let Some(requester) = state
                    .db_client
                    .get_user_by_id(ticket.requester)
                    .await?
                {
                    let (subject, body) = notify::message::status_changed(
                        &requester.name,
                        &ticket.id.reference(),
                        &ticket.title,
                        to,
                    );
                    notify::spawn(
                        Arc::clone(&state.notifier),
                        requester.email,
                        subject,
                        body,
                    );
                }
            }
        }
        Op::AdvancePriority => {
            if !access::allows(my.role, access::Action::AdvancePriority) {
                return Err(E::AccessDenied);
            }

            let (from, to) = lifecycle::advance_priority(&mut ticket, now);
            let entry = AuditEntry::new(
                ticket.id,
                my.id,
                format!("changed priority from {from} to {to}"),
                now,
            );
            state
                .db_client
                .write_ticket_with_audit(&ticket, &entry)
                .await?;
        }
        Op::Rate { score, comment } => {
            if !is_requester {
                return Err(E::AccessDenied);
            }
            if !access::can_rate(is_requester, ticket.status) {
                return Err(E::TicketCannotBeRated);
            }
            let score =
                api::ticket::Rating::new(score).ok_or(E::InvalidRating)?;
            let comment = comment.filter(|c| !c.trim().is_empty());

            lifecycle::rate(&mut ticket, score, comment, now);
            let entry = AuditEntry::new(
                ticket.id,
                my.id,
                format!("rated the service with {} stars", score.get()),
                now,
            );
            state
                .db_client
                .write_ticket_with_audit(&ticket, &entry)
                .await?;
        }
        Op::AddComment { content } => {
            if !access::can_comment(my.role, is_requester) {
                return Err(E::AccessDenied);
            }
            if content.trim().is_empty() {
                return Err(E::EmptyComment);
            }

            let comment = Comment::new(ticket.id, my.id, content, now);
            state.db_client.write_comment(&comment).await?;

            // Notify the other side of the conversation: the requester when
            // staff writes, the assignee (if any) when the requester does.
            let recipient = if !is_requester {
                state.db_client.get_user_by_id(ticket.requester).await?
            } else {
                OptionFuture::from(
                    ticket
                        .assignee
                        .map(|id| state.db_client.get_user_by_id(id)),
                )
                .await
                .transpose()?
                .flatten()
            };
            if let Some(recipient) = recipient {
                let (subject, body) = notify::message::new_comment(
                    &recipient.name,
                    &ticket.id.reference(),
                    &ticket.title,
                    &comment.content,
                    !is_requester,
                );
                notify::spawn(
                    Arc::clone(&state.notifier),
                    recipient.email,
                    subject,
                    body,
                );
            }
        }
    }

    let mut views = build_ticket_views(&state, vec![ticket], now).await?;
    Ok(Json(views.pop().expect("one ticket in, one view out")))
}

#[derive(Debug, From)]
pub enum EditTicketError {
    #[from]
    DbError(db::Error),
    #[from]
    View(ViewError),
    AccessDenied,
    EmptyComment,
    InvalidRating,
    TicketCannotBeRated,
    TicketNotFound,
    UserNotFound,
}

impl IntoResponse for EditTicketError {
    fn into_response(self) -> Response {
        match self {
            Self::AccessDenied => StatusCode::FORBIDDEN,
            Self::EmptyComment
            | Self::InvalidRating
            | Self::TicketCannotBeRated => StatusCode::BAD_REQUEST,
            Self::TicketNotFound => StatusCode::NOT_FOUND,
            Self::DbError(_) | Self::View(_) | Self::UserNotFound => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
        .into_response()
    }
}

async fn list_categories(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
) -> Result<Json<Vec<api::catalog::Category>>, CatalogError> {
    use CatalogError as E;

    let my = state
        .db_client
        .get_user_by_id(auth_claims.user_id)
        .await?
        .ok_or(E::UserNotFound)?;

    let categories_fut = state.db_client.get_all_categories();
    let counts_fut = state.db_client.get_tickets_count_by_category();
    let (categories, counts) = tokio::try_join!(categories_fut, counts_fut)?;

    // Admins manage the whole catalog; everyone else only picks from the
    // active entries.
    let is_admin = access::allows(my.role, access::Action::ManageCatalog);
    let categories = categories
        .into_iter()
        .filter(|c| is_admin || c.active)
        .map(|c| api::catalog::Category {
            ticket_count: counts.get(&c.id).copied().unwrap_or(0),
            id: c.id,
            name: c.name,
            description: c.description,
            active: c.active,
        })
        .collect();

    Ok(Json(categories))
}

#[derive(Deserialize)]
struct SaveCategoryInput {
    id: Option<db::category::Id>,
    name: String,
    description: String,
    active: bool,
}

async fn save_category(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    Json(input): Json<SaveCategoryInput>,
) -> Result<Json<api::catalog::Category>, CatalogError> {
    use CatalogError as E;

    let my = state
        .db_client
        .get_user_by_id(auth_claims.user_id)
        .await?
        .ok_or(E::UserNotFound)?;
    if !access::allows(my.role, access::Action::ManageCatalog) {
        return Err(E::AccessDenied);
    }
    if input.name.trim().is_empty() {
        return Err(E::EmptyName);
    }

    let id = match input.id {
        Some(id) => {
            state
                .db_client
                .get_category_by_id(id)
                .await?
                .ok_or(E::NotFound)?;
            id
        }
        None => db::category::Id::new(),
    };
    let category = db::Category {
        id,
        name: input.name,
        description: input.description,
        active: input.active,
    };
    state.db_client.write_category(&category).await?;

    let counts = state.db_client.get_tickets_count_by_category().await?;
    Ok(Json(api::catalog::Category {
        ticket_count: counts.get(&category.id).copied().unwrap_or(0),
        id: category.id,
        name: category.name,
        description: category.description,
        active: category.active,
    }))
}

async fn delete_category(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    Path(id): Path<db::category::Id>,
) -> Result<StatusCode, CatalogError> {
    use CatalogError as E;

    let my = state
        .db_client
        .get_user_by_id(auth_claims.user_id)
        .await?
        .ok_or(E::UserNotFound)?;
    if !access::allows(my.role, access::Action::ManageCatalog) {
        return Err(E::AccessDenied);
    }

    if !state.db_client.delete_category(id).await? {
        return Err(E::NotFound);
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn list_areas(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
) -> Result<Json<Vec<api::catalog::Area>>, CatalogError> {
    use CatalogError as E;

    let my = state
        .db_client
        .get_user_by_id(auth_claims.user_id)
        .await?
        .ok_or(E::UserNotFound)?;

    let is_admin = access::allows(my.role, access::Action::ManageCatalog);
    let areas = state
        .db_client
        .get_all_areas()
        .await?
        .into_iter()
        .filter(|a| is_admin || a.active)
        .map(|a| api::catalog::Area {
            id: a.id,
            name: a.name,
            description: a.description,
            active: a.active,
        })
        .collect();

    Ok(Json(areas))
}

#[derive(Deserialize)]
struct SaveAreaInput {
    id: Option<db::area::Id>,
    name: String,
    description: String,
    active: bool,
}

async fn save_area(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    Json(input): Json<SaveAreaInput>,
) -> Result<Json<api::catalog::Area>, CatalogError> {
    use CatalogError as E;

    let my = state
        .db_client
        .get_user_by_id(auth_claims.user_id)
        .await?
        .ok_or(E::UserNotFound)?;
    if !access::allows(my.role, access::Action::ManageCatalog) {
        return Err(E::AccessDenied);
    }
    if input.name.trim().is_empty() {
        return Err(E::EmptyName);
    }

    let id = match input.id {
        Some(id) => {
            state
                .db_client
                .get_area_by_id(id)
                .await?
                .ok_or(E::NotFound)?;
            id
        }
        None => db::area::Id::new(),
    };
    let area = db::Area {
        id,
        name: input.name,
        description: input.description,
        active: input.active,
    };
    state.db_client.write_area(&area).await?;

    Ok(Json(api::catalog::Area {
        id: area.id,
        name: area.name,
        description: area.description,
        active: area.active,
    }))
}

async fn delete_area(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    Path(id): Path<db::area::Id>,
) -> Result<StatusCode, CatalogError> {
    use CatalogError as E;

    let my = state
        .db_client
        .get_user_by_id(auth_claims.user_id)
        .await?
        .ok_or(E::UserNotFound)?;
    if !access::allows(my.role, access::Action::ManageCatalog) {
        return Err(E::AccessDenied);
    }

    if !state.db_client.delete_area(id).await? {
        return Err(E::NotFound);
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn list_faqs(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
) -> Result<Json<Vec<api::catalog::Faq>>, CatalogError> {
    use CatalogError as E;

    state
        .db_client
        .get_user_by_id(auth_claims.user_id)
        .await?
        .ok_or(E::UserNotFound)?;

    let faqs = state
        .db_client
        .get_active_faqs()
        .await?
        .into_iter()
        .map(|f| api::catalog::Faq {
            id: f.id,
            question: f.question,
            answer: f.answer,
        })
        .collect();

    Ok(Json(faqs))
}

#[derive(Deserialize)]
struct SaveFaqInput {
    id: Option<db::faq::Id>,
    question: String,
    answer: String,
}

async fn save_faq(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    Json(input): Json<SaveFaqInput>,
) -> Result<Json<api::catalog::Faq>, CatalogError> {
    use CatalogError as E;

    let my = state
        .db_client
        .get_user_by_id(auth_claims.user_id)
        .await?
        .ok_or(E::UserNotFound)?;
    if !access::allows(my.role, access::Action::ManageCatalog) {
        return Err(E::AccessDenied);
    }
    if input.question.trim().is_empty() {
        return Err(E::EmptyName);
    }

    let faq = match input.id {
        Some(id) => {
            let existing = state
                .db_client
                .get_faq_by_id(id)
                .await?
                .ok_or(E::NotFound)?;
            db::Faq {
                question: input.question,
                answer: input.answer,
                ..existing
            }
        }
        None => db::Faq {
            id: db::faq::Id::new(),
            question: input.question,
            answer: input.answer,
            created_by: Some(my.id),
            created_at: OffsetDateTime::now_utc(),
            active: true,
        },
    };
    state.db_client.write_faq(&faq).await?;

    Ok(Json(api::catalog::Faq {
        id: faq.id,
        question: faq.question,
        answer: faq.answer,
    }))
}

async fn delete_faq(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    Path(id): Path<db::faq::Id>,
) -> Result<StatusCode, CatalogError> {
    use CatalogError as E;

    let my = state
        .db_client
        .get_user_by_id(auth_claims.user_id)
        .await?
        .ok_or(E::UserNotFound)?;
    if !access::allows(my.role, access::Action::ManageCatalog) {
        return Err(E::AccessDenied);
    }

    if !state.db_client.delete_faq(id).await? {
        return Err(E::NotFound);
    }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, From)]
pub enum CatalogError {
    #[from]
    DbError(db::Error),
    AccessDenied,
    EmptyName,
    NotFound,
    UserNotFound,
}

impl IntoResponse for CatalogError {
    fn into_response(self) -> Response {
        match self {
            Self::AccessDenied => StatusCode::FORBIDDEN,
            Self::EmptyName => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::DbError(_) | Self::UserNotFound => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
        .into_response()
    }
}

#[derive(Deserialize)]
struct ReportInput {
    /// Inclusive lower bound on creation date, `YYYY-MM-DD`.
    from: Option<String>,
    /// Inclusive upper bound on creation date, `YYYY-MM-DD`.
    to: Option<String>,
    category: Option<String>,
    priority: Option<api::ticket::Priority>,
    /// Assignee login.
    assignee: Option<String>,
}

async fn report(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    Query(input): Query<ReportInput>,
) -> Result<Json<api::report::Report>, ReportError> {
    use ReportError as E;

    let my = state
        .db_client
        .get_user_by_id(auth_claims.user_id)
        .await?
        .ok_or(E::UserNotFound)?;
    if !access::allows(my.role, access::Action::ViewReports) {
        return Err(E::AccessDenied);
    }

    let date_format = format_description!("[year]-[month]-[day]");
    let from = input
        .from
        .map(|s| Date::parse(&s, &date_format))
        .transpose()
        .map_err(|_| E::InvalidDate)?
        .map(|d| d.midnight().assume_utc());
    let to = input
        .to
        .map(|s| Date::parse(&s, &date_format))
        .transpose()
        .map_err(|_| E::InvalidDate)?
        .and_then(day_after);

    let category = match input.category {
        Some(name) => Some(
            state
                .db_client
                .get_category_by_name(&name)
                .await?
                .ok_or(E::CategoryNotFound)?
                .id,
        ),
        None => None,
    };
    let assignee = match input.assignee {
        Some(login) => Some(
            state
                .db_client
                .get_user_by_login(&login)
                .await?
                .ok_or(E::AssigneeNotFound)?
                .id,
        ),
        None => None,
    };

    let filter = db::ticket::ReportFilter {
        from,
        to,
        category,
        priority: input.priority,
        assignee,
    };
    let tickets = state.db_client.get_report_tickets(&filter).await?;

    let user_ids = tickets
        .iter()
        .map(|t| t.requester)
        .chain(tickets.iter().filter_map(|t| t.assignee))
        .unique()
        .collect::<Vec<_>>();
    let category_ids =
        tickets.iter().map(|t| t.category).unique().collect::<Vec<_>>();
    let area_ids =
        tickets.iter().filter_map(|t| t.area).unique().collect::<Vec<_>>();

    let users_fut = state.db_client.get_users_by_ids(&user_ids);
    let categories_fut = state.db_client.get_categories_by_ids(&category_ids);
    let areas_fut = state.db_client.get_areas_by_ids(&area_ids);
    let (users, categories, areas) =
        tokio::try_join!(users_fut, categories_fut, areas_fut)?;

    let now = OffsetDateTime::now_utc();
    let rows = tickets
        .into_iter()
        .map(|t| {
            let requester = users
                .get(&t.requester)
                .ok_or(ViewError::UserNotFound(t.requester))?;
            let assignee = t
                .assignee
                .map(|id| {
                    users.get(&id).ok_or(ViewError::UserNotFound(id))
                })
                .transpose()?;
            let category = categories
                .get(&t.category)
                .ok_or(ViewError::CategoryNotFound(t.category))?;

            Ok::<_, ViewError>(api::report::Row {
                reference: t.id.reference(),
                title: t.title,
                category: category.name.clone(),
                area: t
                    .area
                    .and_then(|id| areas.get(&id))
                    .map(|a| a.name.clone()),
                requester: requester.name.clone(),
                assignee: assignee.map(|u| u.name.clone()),
                priority: t.priority,
                status: t.status,
                created_at: t.created_at,
                closed: t.closed_at.is_some(),
                hours_to_close: t.closed_at.map(|closed_at| {
                    (closed_at - t.created_at).as_seconds_f64() / 3600.0
                }),
                rating: t.rating,
                sla: sla::classify(t.priority, t.created_at, t.closed_at, now),
                deadline_hours: sla::deadline_hours(t.priority),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(api::report::Report { rows }))
}

#[derive(Debug, From)]
pub enum ReportError {
    #[from]
    DbError(db::Error),
    #[from]
    View(ViewError),
    AccessDenied,
    AssigneeNotFound,
    CategoryNotFound,
    InvalidDate,
    UserNotFound,
}

impl IntoResponse for ReportError {
    fn into_response(self) -> Response {
        match self {
            Self::AccessDenied => StatusCode::FORBIDDEN,
            Self::InvalidDate => StatusCode::BAD_REQUEST,
            Self::AssigneeNotFound | Self::CategoryNotFound => {
                StatusCode::NOT_FOUND
            }
            Self::DbError(_) | Self::View(_) | Self::UserNotFound => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
        .into_response()
    }
}

/// Exclusive upper bound that still covers the whole of `day`. `None` when
/// the next midnight is unrepresentable, which means "no upper bound".
fn day_after(day: Date) -> Option<OffsetDateTime> {
    day.next_day().map(|d| d.midnight().assume_utc())
}

/// A referenced row disappeared between queries; surfaced as an internal
/// error by every handler.
#[derive(Debug, From)]
pub enum ViewError {
    #[from]
    DbError(db::Error),
    UserNotFound(api::user::Id),
    CategoryNotFound(db::category::Id),
}

/// Resolves names, timelines, threads and SLA for a page of tickets.
async fn build_ticket_views(
    state: &AppState,
    tickets: Vec<db::Ticket>,
    now: OffsetDateTime,
) -> Result<Vec<api::Ticket>, ViewError> {
    let ids = tickets.iter().map(|t| t.id).collect::<Vec<_>>();

    let audit_fut = state.db_client.get_audit_for_tickets(&ids);
    let comments_fut = state.db_client.get_comments_for_tickets(&ids);
    let (mut timelines, mut threads) =
        tokio::try_join!(audit_fut, comments_fut)?;

    let user_ids = tickets
        .iter()
        .map(|t| t.requester)
        .chain(tickets.iter().filter_map(|t| t.assignee))
        .chain(timelines.values().flatten().map(|e| e.actor))
        .chain(threads.values().flatten().map(|c| c.author))
        .unique()
        .collect::<Vec<_>>();
    let category_ids =
        tickets.iter().map(|t| t.category).unique().collect::<Vec<_>>();
    let area_ids =
        tickets.iter().filter_map(|t| t.area).unique().collect::<Vec<_>>();

    let users_fut = state.db_client.get_users_by_ids(&user_ids);
    let categories_fut = state.db_client.get_categories_by_ids(&category_ids);
    let areas_fut = state.db_client.get_areas_by_ids(&area_ids);
    let (users, categories, areas) =
        tokio::try_join!(users_fut, categories_fut, areas_fut)?;

    let actor_name = |users: &HashMap<api::user::Id, db::User>,
                      id: api::user::Id| {
        users
            .get(&id)
            .map_or_else(|| id.to_string(), |u| u.name.clone())
    };

    tickets
        .into_iter()
        .map(|t| {
            let requester = users
                .get(&t.requester)
                .ok_or(ViewError::UserNotFound(t.requester))?;
            let assignee = t
                .assignee
                .map(|id| {
                    users.get(&id).ok_or(ViewError::UserNotFound(id))
                })
                .transpose()?;
            let category = categories
                .get(&t.category)
                .ok_or(ViewError::CategoryNotFound(t.category))?;

            let history = timelines
                .remove(&t.id)
                .unwrap_or_default()
                .into_iter()
                .map(|e| api::ticket::AuditRecord {
                    actor: actor_name(&users, e.actor),
                    action: e.action,
                    at: e.at,
                })
                .collect();
            let comments = threads
                .remove(&t.id)
                .unwrap_or_default()
                .into_iter()
                .map(|c| api::ticket::Comment {
                    author: actor_name(&users, c.author),
                    content: c.content,
                    at: c.at,
                })
                .collect();

            Ok(api::Ticket {
                id: t.id,
                title: t.title,
                description: t.description,
                category: category.name.clone(),
                area: t
                    .area
                    .and_then(|id| areas.get(&id))
                    .map(|a| a.name.clone()),
                priority: t.priority,
                status: t.status,
                requester: api::User {
                    id: requester.id,
                    name: requester.name.clone(),
                    role: requester.role,
                },
                assignee: assignee.map(|u| api::User {
                    id: u.id,
                    name: u.name.clone(),
                    role: u.role,
                }),
                created_at: t.created_at,
                updated_at: t.updated_at,
                closed: t.closed_at.is_some(),
                rating: t.rating,
                rating_comment: t.rating_comment,
                sla: sla::classify(t.priority, t.created_at, t.closed_at, now),
                deadline_hours: sla::deadline_hours(t.priority),
                history,
                comments,
            })
        })
        .collect()
}

type SharedAppState = Arc<AppState>;

struct AppState {
    db_client: db::Client,

    notifier: Arc<dyn notify::Notifier>,

    jwt_expiration_time: Duration,

    jwt_decoding_key: DecodingKey,

    jwt_encoding_key: EncodingKey,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct AuthClaims {
    user_id: api::user::Id,
    exp: i64,
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
        let token_data = decode::<Self>(
            bearer.token(),
            &state.jwt_decoding_key,
            &Validation::default(),
        )
        .map_err(|_| AuthError::InvalidToken)?;

        Ok(token_data.claims)
    }
}
