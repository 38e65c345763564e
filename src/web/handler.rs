use std::collections::HashMap;
use std::str::FromStr;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, Uri};
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::{Cookie, SameSite};
use axum_extra::extract::PrivateCookieJar;
use strum::{Display, EnumString};
use time::Duration;

use super::error::FlowError;
use super::flow::{AuthFlow, AuthResponse, CallbackParams};
use super::AppState;
use crate::session::{Session, SessionId};

/// Name of the cookie carrying the session id.
pub const SESSION_COOKIE: &str = "auth-session";

const SESSION_COOKIE_DAYS: i64 = 30;

/// Sub-paths served under `/auth/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "snake_case")]
pub enum AuthRoute {
    SignIn,
    SignOut,
    Callback,
    Token,
}

impl AuthRoute {
    pub fn from_path(path: &str) -> Option<Self> {
        path.strip_prefix("/auth/")
            .and_then(|rest| Self::from_str(rest).ok())
    }
}

/// Request parameters from the query string and, for non-GET requests with
/// an `application/x-www-form-urlencoded` body, that body. Body values take
/// precedence.
#[derive(Debug, Clone, Default)]
pub struct AuthForm {
    values: HashMap<String, String>,
}

impl AuthForm {
    pub fn parse(query: Option<&str>, body: &[u8]) -> Self {
        let mut values = HashMap::new();
        let query = query.unwrap_or_default().as_bytes();
        for (key, value) in url::form_urlencoded::parse(body).chain(url::form_urlencoded::parse(query)) {
            values
                .entry(key.into_owned())
                .or_insert_with(|| value.into_owned());
        }
        Self { values }
    }

    /// First value for `key`, or empty.
    pub fn value(&self, key: &str) -> &str {
        self.values.get(key).map(String::as_str).unwrap_or_default()
    }

    fn callback_params(&self) -> CallbackParams {
        CallbackParams {
            state: self.value("state").to_string(),
            code: self.value("code").to_string(),
            error: self.value("error").to_string(),
            error_description: self.value("error_description").to_string(),
        }
    }
}

/// Entry point for everything under `/auth/`.
///
/// Loads (or starts) the session named by the cookie, runs the matching
/// flow step, and always answers with the session cookie set.
pub async fn handle_auth(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> (PrivateCookieJar, Response) {
    let session_id = jar
        .get(SESSION_COOKIE)
        .and_then(|cookie| SessionId::parse(cookie.value()));
    let mut session = Session::open(state.sessions.clone(), session_id);

    let form = AuthForm::parse(uri.query(), form_body(&method, &headers, &body));

    let response = match dispatch(&state.flow, &mut session, uri.path(), &form).await {
        Ok(ok) => ok.into_response(),
        Err(err) => {
            // Keeps a consumed nonce consumed.
            if let Err(save_err) = session.save() {
                tracing::warn!(session_id = %session.id(), error = %save_err, "failed to persist session");
            }
            err.classify().into_response()
        }
    };

    let jar = jar.add(session_cookie(session.id(), state.secure_cookies));
    (jar, response)
}

async fn dispatch(
    flow: &AuthFlow,
    session: &mut Session,
    path: &str,
    form: &AuthForm,
) -> Result<AuthResponse, FlowError> {
    let route = AuthRoute::from_path(path)
        .ok_or_else(|| FlowError::UnhandledPath(path.to_string()))?;
    tracing::debug!(%route, session_id = %session.id(), "auth request");
    match route {
        AuthRoute::SignIn => flow.sign_in(session, form.value("redirect")),
        AuthRoute::SignOut => flow.sign_out(session, form.value("redirect")),
        AuthRoute::Callback => flow.callback(session, &form.callback_params()).await,
        AuthRoute::Token => flow.token(session).await,
    }
}

/// The request body when it carries form values, otherwise empty.
fn form_body<'a>(method: &Method, headers: &HeaderMap, body: &'a [u8]) -> &'a [u8] {
    if method == Method::GET || method == Method::HEAD {
        return &[];
    }
    let is_form = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/x-www-form-urlencoded"));
    if is_form {
        body
    } else {
        &[]
    }
}

fn session_cookie(id: &SessionId, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, id.to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(Duration::days(SESSION_COOKIE_DAYS))
        .build()
}
