use rocket::request::FlashMessage;
use rocket::response::{Flash, Redirect};
use rocket::serde::Serialize;
use rocket::Responder;
use rocket_dyn_templates::Template;

use crate::services::ServiceError;

pub mod auth;
pub mod todos;
pub mod users;

pub const GENERIC_FAILURE: &str = "Something went wrong. Please try again.";

/// Every handler ends in one of these.
#[derive(Responder)]
pub enum Page {
    Render(Template),
    Redirect(Redirect),
    Flash(Flash<Redirect>),
}

#[derive(Debug, Serialize)]
#[serde(crate = "rocket::serde")]
pub struct FlashView {
    pub kind: String,
    pub message: String,
}

pub fn flash_view(flash: Option<FlashMessage<'_>>) -> Option<FlashView> {
    flash.map(|flash| FlashView {
        kind: flash.kind().to_string(),
        message: flash.message().to_string(),
    })
}

/// Turns a service failure into a flash on `fallback`. Store-level faults are
/// logged and shown only as a generic message.
pub fn failure(err: ServiceError, fallback: Redirect) -> Page {
    if err.is_user_facing() {
        Page::Flash(Flash::error(fallback, err.to_string()))
    } else {
        log::error!("request failed: {}", err);
        Page::Flash(Flash::error(fallback, GENERIC_FAILURE))
    }
}
