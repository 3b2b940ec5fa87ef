use rocket::form::{Contextual, Form};
use rocket::http::{Cookie, CookieJar, SameSite};
use rocket::request::FlashMessage;
use rocket::response::{Flash, Redirect};
use rocket::{get, post, routes, uri, State};
use rocket_dyn_templates::{context, Template};

use super::{failure, flash_view, FlashView, Page};
use crate::config::Config;
use crate::db::DbPool;
use crate::forms::{FormView, LoginForm, PasswordChangeForm, PasswordResetForm, RegistrationForm};
use crate::services::auth::{self, NewAccount};
use crate::services::{blocking, ServiceError};
use crate::{AuthenticatedUser, SESSION_COOKIE};

// Served with and without the trailing slash; redirects use the slashed form.
pub const REGISTER_PATH: &str = "/register/";
pub const RESET_PASSWORD_PATH: &str = "/reset_password/";
pub const CHANGE_PASSWORD_PATH: &str = "/change_password/";

fn render(name: &'static str, form: FormView, flash: Option<FlashView>) -> Template {
    Template::render(name, context! {
        user: Option::<AuthenticatedUser>::None,
        flash: flash,
        form: form,
    })
}

/// Starts a server-side session and hands its token to the browser. A token
/// the browser already holds is ended first.
pub(crate) async fn begin_session(
    pool: &DbPool,
    config: &Config,
    cookies: &CookieJar<'_>,
    user_id: i32,
) -> Result<(), ServiceError> {
    let previous = cookies.get(SESSION_COOKIE).map(|cookie| cookie.value().to_string());
    let ttl = config.session_ttl();
    let session = blocking(pool, move |pool| {
        if let Some(token) = previous {
            auth::end_session(pool, &token)?;
        }
        auth::start_session(pool, user_id, ttl)
    })
    .await?;

    cookies.add(
        Cookie::build((SESSION_COOKIE, session.id))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax),
    );
    Ok(())
}

#[get("/")]
pub fn login_page(flash: Option<FlashMessage<'_>>) -> Template {
    render("login", FormView::new(LoginForm::FIELDS), flash_view(flash))
}

#[post("/", data = "<form>")]
pub async fn login(
    form: Form<Contextual<'_, LoginForm>>,
    pool: &State<DbPool>,
    config: &State<Config>,
    cookies: &CookieJar<'_>,
) -> Page {
    let Contextual { value, context } = form.into_inner();
    let view = FormView::from_context(&context, LoginForm::FIELDS, LoginForm::SECRET);
    let Some(credentials) = value else {
        return Page::Render(render("login", view, None));
    };

    let username = credentials.username.trim().to_string();
    let lookup = username.clone();
    let password = credentials.password;
    let user = blocking(pool, move |pool| auth::authenticate(pool, &lookup, &password)).await;
    match user {
        Ok(Some(user)) => match begin_session(pool, config, cookies, user.id).await {
            Ok(()) => Page::Redirect(Redirect::to(uri!(super::todos::list_todos))),
            Err(e) => failure(e, Redirect::to(uri!(login_page))),
        },
        Ok(None) => {
            log::info!("rejected login for {:?}", username);
            let view = view.with_form_error("Invalid username or password");
            Page::Render(render("login", view, None))
        }
        Err(e) => failure(e, Redirect::to(uri!(login_page))),
    }
}

#[get("/register/<_..>")]
pub fn register_page(flash: Option<FlashMessage<'_>>) -> Template {
    render("register", FormView::new(RegistrationForm::FIELDS), flash_view(flash))
}

#[post("/register/<_..>", data = "<form>")]
pub async fn register(
    form: Form<Contextual<'_, RegistrationForm>>,
    pool: &State<DbPool>,
    config: &State<Config>,
    cookies: &CookieJar<'_>,
) -> Page {
    let Contextual { value, context } = form.into_inner();
    let view = FormView::from_context(&context, RegistrationForm::FIELDS, RegistrationForm::SECRET);
    let Some(registration) = value else {
        return Page::Render(render("register", view, None));
    };

    let cost = config.bcrypt_cost;
    let registered = blocking(pool, move |pool| {
        let account = NewAccount {
            username: registration.username.trim(),
            email: registration.email.trim(),
            password: &registration.password1,
        };
        auth::register_user(pool, &account, cost)
    })
    .await;
    let user = match registered {
        Ok(user) => user,
        Err(ServiceError::Conflict(message)) => {
            return Page::Render(render("register", view.with_form_error(message), None));
        }
        Err(e) => return failure(e, Redirect::to(REGISTER_PATH)),
    };

    match begin_session(pool, config, cookies, user.id).await {
        Ok(()) => Page::Redirect(Redirect::to(uri!(super::todos::list_todos))),
        Err(e) => {
            log::error!("could not log in freshly registered user {}: {}", user.id, e);
            Page::Flash(Flash::error(
                Redirect::to(REGISTER_PATH),
                "Registration failed. Please try again.",
            ))
        }
    }
}

#[get("/logout/<_..>")]
pub async fn logout(_user: AuthenticatedUser, pool: &State<DbPool>, cookies: &CookieJar<'_>) -> Redirect {
    let token = cookies.get(SESSION_COOKIE).map(|cookie| cookie.value().to_string());
    if let Some(token) = token {
        if let Err(e) = blocking(pool, move |pool| auth::end_session(pool, &token)).await {
            log::error!("failed to end session: {}", e);
        }
    }
    cookies.remove(Cookie::from(SESSION_COOKIE));
    Redirect::to(uri!(login_page))
}

#[get("/reset_password/<_..>")]
pub fn reset_password_page(flash: Option<FlashMessage<'_>>) -> Template {
    render("reset_password", FormView::new(PasswordResetForm::FIELDS), flash_view(flash))
}

#[post("/reset_password/<_..>", data = "<form>")]
pub async fn reset_password(
    form: Form<Contextual<'_, PasswordResetForm>>,
    pool: &State<DbPool>,
    config: &State<Config>,
) -> Page {
    let Contextual { value, context } = form.into_inner();
    let view = FormView::from_context(&context, PasswordResetForm::FIELDS, PasswordResetForm::SECRET);
    let Some(reset) = value else {
        return Page::Render(render("reset_password", view, None));
    };

    let cost = config.bcrypt_cost;
    let result = blocking(pool, move |pool| {
        auth::reset_password(pool, reset.email.trim(), &reset.new_password, cost)
    })
    .await;
    match result {
        Ok(()) => Page::Flash(Flash::success(
            Redirect::to(uri!(login_page)),
            "Your password has been reset. Please log in.",
        )),
        Err(ServiceError::NotFound(message)) => {
            Page::Render(render("reset_password", view.with_form_error(message), None))
        }
        Err(e) => failure(e, Redirect::to(RESET_PASSWORD_PATH)),
    }
}

#[get("/change_password/<_..>")]
pub fn change_password_page(flash: Option<FlashMessage<'_>>) -> Template {
    render("change_password", FormView::new(PasswordChangeForm::FIELDS), flash_view(flash))
}

#[post("/change_password/<_..>", data = "<form>")]
pub async fn change_password(
    form: Form<Contextual<'_, PasswordChangeForm>>,
    pool: &State<DbPool>,
    config: &State<Config>,
) -> Page {
    let Contextual { value, context } = form.into_inner();
    let view = FormView::from_context(&context, PasswordChangeForm::FIELDS, PasswordChangeForm::SECRET);
    let Some(change) = value else {
        return Page::Render(render("change_password", view, None));
    };

    let cost = config.bcrypt_cost;
    let result = blocking(pool, move |pool| {
        auth::change_password(
            pool,
            change.email.trim(),
            &change.old_password,
            &change.new_password,
            cost,
        )
    })
    .await;
    match result {
        Ok(()) => Page::Flash(Flash::success(
            Redirect::to(uri!(login_page)),
            "Password updated successfully.",
        )),
        Err(ServiceError::NotFound(message)) | Err(ServiceError::Unauthorized(message)) => {
            Page::Render(render("change_password", view.with_form_error(message), None))
        }
        Err(e) => failure(e, Redirect::to(CHANGE_PASSWORD_PATH)),
    }
}

pub fn auth_routes() -> Vec<rocket::Route> {
    routes![
        login_page,
        login,
        register_page,
        register,
        logout,
        reset_password_page,
        reset_password,
        change_password_page,
        change_password,
    ]
}
