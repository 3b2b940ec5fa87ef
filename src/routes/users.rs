use rocket::request::FlashMessage;
use rocket::response::Redirect;
use rocket::{get, routes, State};
use rocket_dyn_templates::{context, Template};

use super::{failure, flash_view, Page};
use crate::db::DbPool;
use crate::services::{blocking, users};
use crate::AuthenticatedUser;

#[get("/user_detail/<id>")]
pub async fn user_detail(
    id: i32,
    user: AuthenticatedUser,
    pool: &State<DbPool>,
    flash: Option<FlashMessage<'_>>,
) -> Page {
    match blocking(pool, move |pool| users::get_user_info(pool, id)).await {
        Ok(profile) => Page::Render(Template::render("user_detail", context! {
            user: &user,
            flash: flash_view(flash),
            profile: profile,
        })),
        Err(e) => failure(e, Redirect::to(super::auth::REGISTER_PATH)),
    }
}

pub fn user_routes() -> Vec<rocket::Route> {
    routes![user_detail]
}
