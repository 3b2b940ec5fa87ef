use rocket::http::Status;
use rocket::request::{FromRequest, Outcome, Request};
use rocket::response::Redirect;
use rocket::serde::Serialize;
use rocket::{catch, catchers, uri, Build, Rocket};
use rocket_dyn_templates::Template;

pub mod config;
pub mod db;
pub mod forms;
pub mod models;
pub mod routes;
pub mod schema;
pub mod services;

use config::Config;
use db::DbPool;

pub const SESSION_COOKIE: &str = "session_token";

/// Request guard for pages that need a logged-in user.
#[derive(Debug, Clone, Serialize)]
#[serde(crate = "rocket::serde")]
pub struct AuthenticatedUser {
    pub id: i32,
    pub username: String,
}

// Why the guard turned a request away; read back by the catcher.
#[derive(Debug, Clone, Copy)]
pub enum AuthError {
    MissingSession,
    InvalidSession,
    NoSessionState,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthenticatedUser {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let pool = match req.rocket().state::<DbPool>() {
            Some(pool) => pool,
            None => {
                req.local_cache(|| Some(AuthError::NoSessionState));
                return Outcome::Error((Status::InternalServerError, ()));
            }
        };

        let token = match req.cookies().get(SESSION_COOKIE) {
            Some(cookie) if !cookie.value().is_empty() => cookie.value().to_string(),
            _ => {
                req.local_cache(|| Some(AuthError::MissingSession));
                return Outcome::Forward(Status::Unauthorized);
            }
        };

        let user = services::blocking(pool, move |pool| services::auth::session_user(pool, &token)).await;
        match user {
            Ok(Some(user)) => Outcome::Success(AuthenticatedUser {
                id: user.id,
                username: user.username,
            }),
            Ok(None) => {
                req.local_cache(|| Some(AuthError::InvalidSession));
                Outcome::Forward(Status::Unauthorized)
            }
            Err(e) => {
                log::error!("session lookup failed: {}", e);
                Outcome::Error((Status::InternalServerError, ()))
            }
        }
    }
}

#[catch(401)]
fn unauthorized_catcher(req: &Request<'_>) -> Redirect {
    match req.local_cache(|| None as Option<AuthError>) {
        Some(reason) => log::info!("{:?} on {}, redirecting to login", reason, req.uri()),
        None => log::info!("unauthorized request to {}, redirecting to login", req.uri()),
    }
    Redirect::to(uri!(routes::auth::login_page))
}

#[catch(500)]
fn internal_server_error_catcher(req: &Request<'_>) -> &'static str {
    if let Some(AuthError::NoSessionState) = req.local_cache(|| None as Option<AuthError>) {
        log::error!("database pool is not managed; was the db fairing attached?");
    }
    "An unexpected error occurred on the server."
}

// This function can be used by main.rs to launch the server
// and by tests to get a Rocket instance.
pub fn rocket_instance(config: Config) -> Rocket<Build> {
    let figment = rocket::Config::figment().merge(("template_dir", config.template_dir.clone()));
    let rocket = rocket::custom(figment);

    if let Err(e) = services::media::prepare(&config.media_root) {
        log::error!("cannot prepare media root {}: {}", config.media_root.display(), e);
    }

    rocket
        .attach(db::stage(&config))
        .attach(Template::fairing())
        .mount("/", routes::auth::auth_routes())
        .mount("/", routes::todos::todo_routes())
        .mount("/", routes::users::user_routes())
        .register("/", catchers![unauthorized_catcher, internal_server_error_catcher])
        .manage(config)
}
