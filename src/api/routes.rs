use crate::api::get_embedded_asset;
use crate::api::page::{self, Notice, PageView};
use crate::auth::session::{
    SessionState, SessionStore, expired_cookie_header, session_cookie_header,
    session_id_from_cookies,
};
use crate::auth::{self, AuthError};
use crate::config::Config;
use crate::db::{Database, ScheduleRow, UserRow};
use crate::identity::{self, IdentityMode};
use crate::schedule::{self, Periods, SaveOutcome, clock};
use anyhow::{Context, Result, anyhow};
use axum::extract::{Form, Path, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub database: Arc<Mutex<Database>>,
    pub sessions: Arc<SessionStore>,
}

impl AppState {
    fn database(&self) -> Result<MutexGuard<'_, Database>> {
        self.database
            .lock()
            .map_err(|_| anyhow!("Database handle poisoned by an earlier panic"))
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/schedule/:user_id", post(schedule_submit))
        .route("/login", post(login))
        .route("/register", post(register))
        .route("/logout", post(logout))
        .route("/static/*path", get(static_assets))
        .route("/api/v1/status", get(status))
        .route("/api/v1/schedules/:date", get(schedules_by_date))
        .fallback(not_found)
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
pub struct PeriodForm {
    period1: Option<String>,
    period2: Option<String>,
    period3: Option<String>,
    period4: Option<String>,
}

impl PeriodForm {
    // Unchecked boxes are absent from the submitted form.
    pub fn periods(&self) -> Periods {
        Periods::new([
            self.period1.is_some(),
            self.period2.is_some(),
            self.period3.is_some(),
            self.period4.is_some(),
        ])
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CredentialsForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

#[derive(Debug, Serialize)]
struct StatusPayload {
    today: NaiveDate,
    yesterday: NaiveDate,
    timezone: &'static str,
    identity_mode: String,
    user_count: i64,
}

#[derive(Debug, Serialize)]
struct ScheduleView {
    user_id: i64,
    username: Option<String>,
    periods: Periods,
}

#[derive(Debug, Serialize)]
struct SchedulesPayload {
    date: NaiveDate,
    count: usize,
    schedules: Vec<ScheduleView>,
}

async fn index(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Response> {
    let session = state.sessions.state(session_id(&headers));
    let html = checklist_page(&state, &session, Utc::now(), &[])?;

    html_response(StatusCode::OK, html, None)
}

async fn schedule_submit(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    headers: HeaderMap,
    Form(form): Form<PeriodForm>,
) -> ApiResult<Response> {
    let session = state.sessions.state(session_id(&headers));
    let now = Utc::now();

    let (status, notices) = match submit_periods(&state, &session, user_id, form.periods(), now) {
        Ok(notice) => (StatusCode::OK, notice.into_iter().collect::<Vec<_>>()),
        Err(ApiError::Forbidden(message)) => (StatusCode::FORBIDDEN, vec![Notice::error(message)]),
        Err(error) => return Err(error),
    };
    let html = checklist_page(&state, &session, now, &notices)?;

    html_response(status, html, None)
}

async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<CredentialsForm>,
) -> ApiResult<Response> {
    require_login_mode(&state)?;

    let result = {
        let database = state.database()?;
        auth::authenticate(&database, &form.username, &form.password)
    };

    match result {
        Ok(user) => {
            let notices = [Notice::success(format!("Welcome, {}", user.username))];
            let id = state.sessions.login(user.clone());
            info!(
                username = %user.username,
                active_sessions = state.sessions.active_count(),
                "session opened"
            );

            let session = SessionState::Authenticated(user);
            let html = checklist_page(&state, &session, Utc::now(), &notices)?;
            html_response(StatusCode::OK, html, Some(session_cookie_header(&id)))
        }
        Err(error) => {
            let session = state.sessions.state(session_id(&headers));
            let html = checklist_page(&state, &session, Utc::now(), &[auth_notice(error)?])?;
            html_response(StatusCode::OK, html, None)
        }
    }
}

async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<CredentialsForm>,
) -> ApiResult<Response> {
    require_login_mode(&state)?;

    let result = {
        let database = state.database()?;
        auth::register(&database, &form.username, &form.password)
    };

    let notice = match result {
        Ok(_) => Notice::info("registration complete, please log in"),
        Err(error) => auth_notice(error)?,
    };

    let session = state.sessions.state(session_id(&headers));
    let html = checklist_page(&state, &session, Utc::now(), &[notice])?;
    html_response(StatusCode::OK, html, None)
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Response> {
    require_login_mode(&state)?;

    if let Some(user) = state.sessions.logout(session_id(&headers)) {
        info!(username = %user.username, "logged out");
    }

    let html = checklist_page(
        &state,
        &SessionState::Anonymous,
        Utc::now(),
        &[Notice::info("logged out")],
    )?;
    html_response(StatusCode::OK, html, Some(expired_cookie_header()))
}

async fn status(State(state): State<AppState>) -> ApiResult<Json<StatusPayload>> {
    let today = clock::today();
    let database = state.database()?;

    Ok(Json(StatusPayload {
        today,
        yesterday: clock::previous_day(today)?,
        timezone: clock::TIMEZONE.name(),
        identity_mode: state.config.identity_mode.to_string(),
        user_count: database.count_users()?,
    }))
}

async fn schedules_by_date(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> ApiResult<Json<SchedulesPayload>> {
    let target_date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest("Invalid date format. Example: 2024-01-10".to_string()))?;

    let database = state.database()?;
    let usernames = database
        .list_users()?
        .into_iter()
        .map(|user| (user.id, user.username))
        .collect::<HashMap<_, _>>();

    let schedules = database
        .schedules_for_date(target_date)?
        .into_iter()
        .map(|row| ScheduleView {
            user_id: row.user_id,
            username: usernames.get(&row.user_id).cloned(),
            periods: row.periods,
        })
        .collect::<Vec<_>>();

    Ok(Json(SchedulesPayload {
        date: target_date,
        count: schedules.len(),
        schedules,
    }))
}

async fn static_assets(Path(path): Path<String>) -> ApiResult<Response> {
    match get_embedded_asset(&path) {
        Some((bytes, mime)) => {
            let mut response = Response::new(bytes.into_response().into_body());
            response
                .headers_mut()
                .insert(header::CONTENT_TYPE, HeaderValue::from_str(&mime)?);
            Ok(response)
        }
        None => Err(ApiError::NotFound("Static asset not found".to_string())),
    }
}

async fn not_found() -> ApiError {
    ApiError::NotFound("Page not found".to_string())
}

pub fn checklist_page(
    state: &AppState,
    session: &SessionState,
    now: DateTime<Utc>,
    notices: &[Notice],
) -> Result<String> {
    let today = clock::local_date(now);
    let mut database = state.database()?;
    schedule::reset_for_now(&mut database, now)?;

    let schedules = identity::visible_users(&database, &state.config, session)?
        .into_iter()
        .map(|user| -> Result<(UserRow, ScheduleRow)> {
            let record = schedule::get_or_create(&database, user.id, today)?;
            Ok((user, record))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(page::render(&PageView {
        today,
        identity_mode: state.config.identity_mode,
        session_user: session.user(),
        schedules: &schedules,
        notices,
    }))
}

pub fn submit_periods(
    state: &AppState,
    session: &SessionState,
    user_id: i64,
    displayed: Periods,
    now: DateTime<Utc>,
) -> ApiResult<Option<Notice>> {
    let today = clock::local_date(now);
    let mut database = state.database()?;
    schedule::reset_for_now(&mut database, now)?;

    if !identity::may_edit(&database, &state.config, session, user_id)? {
        return Err(ApiError::Forbidden(
            "This schedule is not editable from the current session".to_string(),
        ));
    }

    let user = database
        .user_by_id(user_id)?
        .with_context(|| format!("User disappeared: {user_id}"))?;
    let mut record = schedule::get_or_create(&database, user_id, today)?;

    let notice = match schedule::save_on_change(&mut database, &mut record, displayed)? {
        SaveOutcome::Saved => Some(Notice::success(format!("{} schedule saved", user.username))),
        SaveOutcome::Unchanged => None,
    };

    Ok(notice)
}

fn auth_notice(error: AuthError) -> ApiResult<Notice> {
    match error {
        AuthError::Store(error) => Err(ApiError::Internal(error)),
        other => Ok(Notice::error(other.to_string())),
    }
}

fn require_login_mode(state: &AppState) -> ApiResult<()> {
    match state.config.identity_mode {
        IdentityMode::Login => Ok(()),
        IdentityMode::Fixed => Err(ApiError::NotFound("Page not found".to_string())),
    }
}

fn session_id(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::COOKIE)
        .and_then(|value| value.to_str().ok())
        .and_then(session_id_from_cookies)
}

fn html_response(status: StatusCode, html: String, cookie: Option<String>) -> ApiResult<Response> {
    let mut response = (status, Html(html)).into_response();

    if let Some(cookie) = cookie {
        response
            .headers_mut()
            .insert(header::SET_COOKIE, HeaderValue::from_str(&cookie)?);
    }

    Ok(response)
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Forbidden(String),
    NotFound(String),
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for ApiError {
    fn from(value: anyhow::Error) -> Self {
        Self::Internal(value)
    }
}

impl From<axum::http::header::InvalidHeaderValue> for ApiError {
    fn from(value: axum::http::header::InvalidHeaderValue) -> Self {
        Self::Internal(value.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            ApiError::Forbidden(message) => {
                (StatusCode::FORBIDDEN, Json(json!({ "error": message }))).into_response()
            }
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": message }))).into_response()
            }
            ApiError::Internal(error) => {
                tracing::error!(error = %error, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": error.to_string() })),
                )
                    .into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ApiError, AppState, CredentialsForm, PeriodForm, checklist_page, index, login, logout,
        register, schedule_submit, schedules_by_date, submit_periods,
    };
    use crate::api::page::NoticeKind;
    use crate::auth::session::{SessionState, SessionStore, session_id_from_cookies};
    use crate::config::Config;
    use crate::db::Database;
    use crate::identity::{self, IdentityMode};
    use crate::schedule::{Periods, clock};
    use axum::body::Body;
    use axum::extract::{Form, FromRequest, Path, State};
    use axum::http::{HeaderMap, HeaderValue, Request, StatusCode, header};
    use axum::response::Response;
    use chrono::{DateTime, TimeZone, Utc};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    fn app_state(identity_mode: IdentityMode) -> (TempDir, AppState) {
        let dir = tempfile::tempdir().expect("temp dir");
        let config = Config {
            db_path: dir.path().join("schedule.db"),
            identity_mode,
            ..Config::default()
        };
        let database = Database::open(&config.db_path).expect("open db");
        identity::bootstrap_users(&database, &config).expect("bootstrap");

        let state = AppState {
            config: Arc::new(config),
            database: Arc::new(Mutex::new(database)),
            sessions: Arc::new(SessionStore::default()),
        };
        (dir, state)
    }

    fn noon(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 12, 0, 0).unwrap()
    }

    fn user_id(state: &AppState, username: &str) -> i64 {
        state
            .database()
            .unwrap()
            .user_by_name(username)
            .unwrap()
            .expect("user")
            .id
    }

    fn user_count(state: &AppState) -> i64 {
        state.database().unwrap().count_users().unwrap()
    }

    fn credentials(username: &str, password: &str) -> Form<CredentialsForm> {
        Form(CredentialsForm {
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    fn set_cookie(response: &Response) -> Option<String> {
        response
            .headers()
            .get(header::SET_COOKIE)
            .map(|value| value.to_str().expect("ascii cookie").to_string())
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        String::from_utf8(bytes.to_vec()).expect("utf-8 body")
    }

    async fn decode_form(body: &'static str) -> PeriodForm {
        let request = Request::builder()
            .method("POST")
            .uri("/schedule/1")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .expect("request");

        let Form(form) = Form::<PeriodForm>::from_request(request, &())
            .await
            .expect("form decodes");
        form
    }

    #[tokio::test]
    async fn urlencoded_form_maps_missing_boxes_to_unchecked() {
        assert_eq!(decode_form("").await.periods(), Periods::default());

        let form = decode_form("period2=on&period4=on").await;
        assert_eq!(form.periods().as_array(), [false, true, false, true]);
    }

    #[test]
    fn page_load_creates_records_for_fixed_users() {
        let (_dir, state) = app_state(IdentityMode::Fixed);

        let html = checklist_page(&state, &SessionState::Anonymous, noon(10), &[]).expect("page");

        assert!(html.contains("sohn1 schedule"));
        assert!(html.contains("sohn2 schedule"));
        assert_eq!(state.database().unwrap().count_schedules().unwrap(), 2);
    }

    #[test]
    fn submit_saves_once_and_next_day_page_resets() {
        let (_dir, state) = app_state(IdentityMode::Fixed);
        let sohn1 = user_id(&state, "sohn1");
        let session = SessionState::Anonymous;
        let checked = Periods::new([true, false, true, false]);

        let first = submit_periods(&state, &session, sohn1, checked, noon(10)).expect("first");
        let notice = first.expect("saved notice");
        assert_eq!(notice.kind, NoticeKind::Success);
        assert_eq!(notice.message, "sohn1 schedule saved");

        let second = submit_periods(&state, &session, sohn1, checked, noon(10)).expect("second");
        assert!(second.is_none());

        checklist_page(&state, &session, noon(11), &[]).expect("next day page");
        let yesterday = clock::local_date(noon(10));
        let stored = state
            .database()
            .unwrap()
            .schedule(sohn1, yesterday)
            .unwrap()
            .expect("row");
        assert!(stored.periods.is_clear());
    }

    #[test]
    fn login_mode_rejects_edits_for_other_users() {
        let (_dir, state) = app_state(IdentityMode::Login);
        let (alice, bob) = {
            let database = state.database().unwrap();
            (
                database.insert_user("alice", Some("secret")).unwrap(),
                database.insert_user("bob", Some("hunter2")).unwrap(),
            )
        };

        let anonymous = SessionState::Anonymous;
        let result = submit_periods(&state, &anonymous, alice.id, Periods::default(), noon(10));
        assert!(matches!(result, Err(ApiError::Forbidden(_))));

        let session = SessionState::Authenticated(alice.clone());
        let result = submit_periods(&state, &session, bob.id, Periods::default(), noon(10));
        assert!(matches!(result, Err(ApiError::Forbidden(_))));

        let saved = submit_periods(
            &state,
            &session,
            alice.id,
            Periods::default().with(0, true),
            noon(10),
        )
        .expect("own schedule");
        assert!(saved.is_some());
    }

    #[tokio::test]
    async fn forbidden_submission_renders_page_with_403() {
        let (_dir, state) = app_state(IdentityMode::Login);
        let alice = state
            .database()
            .unwrap()
            .insert_user("alice", Some("secret"))
            .unwrap();

        let response = schedule_submit(
            State(state.clone()),
            Path(alice.id),
            HeaderMap::new(),
            Form(PeriodForm::default()),
        )
        .await
        .expect("html response");

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let html = body_text(response).await;
        assert!(html.contains(r#"<div class="notice error">"#));
        assert!(html.contains("<h1>Schedule Checker</h1>"));
    }

    #[test]
    fn anonymous_login_page_has_no_schedules() {
        let (_dir, state) = app_state(IdentityMode::Login);

        let html = checklist_page(&state, &SessionState::Anonymous, noon(10), &[]).expect("page");

        assert!(html.contains(r#"action="/login""#));
        assert!(!html.contains("/schedule/"));
        assert_eq!(state.database().unwrap().count_schedules().unwrap(), 0);
    }

    #[tokio::test]
    async fn fixed_mode_hides_account_routes() {
        let (_dir, state) = app_state(IdentityMode::Fixed);
        let before = user_count(&state);

        let signed_up = register(
            State(state.clone()),
            HeaderMap::new(),
            credentials("mallory", "x"),
        )
        .await;
        let logged_in = login(State(state.clone()), HeaderMap::new(), credentials("sohn1", "")).await;
        let logged_out = logout(State(state.clone()), HeaderMap::new()).await;

        assert!(matches!(signed_up, Err(ApiError::NotFound(_))));
        assert!(matches!(logged_in, Err(ApiError::NotFound(_))));
        assert!(matches!(logged_out, Err(ApiError::NotFound(_))));
        assert_eq!(user_count(&state), before);
    }

    #[tokio::test]
    async fn cookie_less_page_loads_store_no_sessions() {
        let (_dir, state) = app_state(IdentityMode::Fixed);

        for _ in 0..50 {
            let response = index(State(state.clone()), HeaderMap::new())
                .await
                .expect("page");
            assert_eq!(set_cookie(&response), None);
        }

        assert_eq!(state.sessions.active_count(), 0);
    }

    #[tokio::test]
    async fn register_keeps_session_anonymous_and_reports_duplicates() {
        let (_dir, state) = app_state(IdentityMode::Login);

        let response = register(
            State(state.clone()),
            HeaderMap::new(),
            credentials("alice", "secret"),
        )
        .await
        .expect("register");
        assert_eq!(set_cookie(&response), None);
        let html = body_text(response).await;
        assert!(html.contains("registration complete, please log in"));
        assert!(html.contains(r#"action="/login""#));
        assert_eq!(state.sessions.active_count(), 0);
        assert_eq!(user_count(&state), 1);

        let response = register(
            State(state.clone()),
            HeaderMap::new(),
            credentials("alice", "other"),
        )
        .await
        .expect("duplicate register");
        let html = body_text(response).await;
        assert!(html.contains(r#"<div class="notice error">username already exists</div>"#));
        assert_eq!(user_count(&state), 1);
    }

    #[tokio::test]
    async fn login_and_logout_drive_the_session() {
        let (_dir, state) = app_state(IdentityMode::Login);
        state
            .database()
            .unwrap()
            .insert_user("alice", Some("secret"))
            .unwrap();

        let rejected = login(State(state.clone()), HeaderMap::new(), credentials("alice", "Secret"))
            .await
            .expect("rejected login");
        assert_eq!(set_cookie(&rejected), None);
        let html = body_text(rejected).await;
        assert!(html.contains("invalid username or password"));
        assert_eq!(state.sessions.active_count(), 0);

        let accepted = login(State(state.clone()), HeaderMap::new(), credentials("alice", "secret"))
            .await
            .expect("login");
        let cookie = set_cookie(&accepted).expect("session cookie");
        let id = session_id_from_cookies(&cookie).expect("session id").to_string();
        let html = body_text(accepted).await;
        assert!(html.contains("Logged in as <strong>alice</strong>"));
        assert!(html.contains("alice schedule"));
        assert_eq!(state.sessions.active_count(), 1);

        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("daycheck_session={id}")).unwrap(),
        );
        let page = index(State(state.clone()), headers.clone()).await.expect("page");
        assert!(body_text(page).await.contains("alice schedule"));

        let logged_out = logout(State(state.clone()), headers).await.expect("logout");
        assert!(set_cookie(&logged_out).expect("expired cookie").contains("Max-Age=0"));
        let html = body_text(logged_out).await;
        assert!(html.contains(r#"action="/login""#));
        assert!(!html.contains("alice schedule"));
        assert_eq!(state.sessions.active_count(), 0);
    }

    #[tokio::test]
    async fn schedules_by_date_reads_without_creating() {
        let (_dir, state) = app_state(IdentityMode::Fixed);
        checklist_page(&state, &SessionState::Anonymous, noon(10), &[]).expect("page");
        let before = state.database().unwrap().count_schedules().unwrap();

        let existing = schedules_by_date(State(state.clone()), Path("2024-01-10".to_string()))
            .await
            .expect("existing date");
        assert_eq!(existing.0.count, 2);
        let names = existing
            .0
            .schedules
            .iter()
            .filter_map(|view| view.username.as_deref())
            .collect::<Vec<_>>();
        assert_eq!(names, ["sohn1", "sohn2"]);

        let empty = schedules_by_date(State(state.clone()), Path("2024-01-12".to_string()))
            .await
            .expect("empty date");
        assert_eq!(empty.0.count, 0);
        assert_eq!(state.database().unwrap().count_schedules().unwrap(), before);

        let invalid = schedules_by_date(State(state.clone()), Path("10.01.2024".to_string())).await;
        assert!(matches!(invalid, Err(ApiError::BadRequest(_))));
    }
}
