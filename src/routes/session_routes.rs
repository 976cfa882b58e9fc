use actix_web::cookie::{Cookie, SameSite};
use actix_web::http::StatusCode;
use actix_web::{get, post, web, HttpRequest, HttpResponse, Responder};
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::credentials::Credentials;
use crate::errors::AppError;
use crate::remote::RemoteDirectory;
use crate::session::SESSION_COOKIE;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub auid: String,
    #[serde(default)]
    pub password: String,
}

fn unauthorized() -> HttpResponse {
    HttpResponse::Unauthorized().json(AppError::Authentication.error_response())
}

#[post("/login")]
pub async fn login(
    req: HttpRequest,
    form: web::Form<LoginForm>,
    state: web::Data<AppState>,
) -> impl Responder {
    // Any earlier login on this session is dropped before checking the new one
    if let Some(cookie) = req.cookie(SESSION_COOKIE) {
        state.sessions.remove(cookie.value()).await;
    }

    let form = form.into_inner();
    let credentials = match Credentials::new(form.auid, form.password) {
        Ok(credentials) => credentials,
        Err(_) => {
            warn!("Login rejected: malformed auid");
            return unauthorized();
        }
    };

    match RemoteDirectory::connect(&state.config.remote, state.runner.clone(), &credentials).await
    {
        Ok(_) => {
            let auid = credentials.auid.clone();
            let session_id = state.sessions.create(credentials).await;
            info!("Login succeeded for {}", auid);

            let cookie = Cookie::build(SESSION_COOKIE, session_id)
                .path("/")
                .http_only(true)
                .same_site(SameSite::Strict)
                .finish();

            HttpResponse::Ok()
                .cookie(cookie)
                .json(serde_json::json!({ "ok": true }))
        }
        Err(AppError::Authentication) => {
            warn!("Login rejected for {}", credentials.auid);
            unauthorized()
        }
        Err(e) => {
            error!("Login check failed: {}", e);
            let status =
                StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            HttpResponse::build(status).json(e.error_response())
        }
    }
}

/// Not implemented yet. Always answers with an empty body.
#[get("/list")]
pub async fn list_printers() -> impl Responder {
    HttpResponse::Ok().finish()
}
