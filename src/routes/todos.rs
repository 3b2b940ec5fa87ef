use std::path::{Path, PathBuf};

use rocket::form::{Contextual, Form};
use rocket::fs::NamedFile;
use rocket::http::{ContentType, Header, Status};
use rocket::request::FlashMessage;
use rocket::response::{Flash, Redirect};
use rocket::{get, post, routes, uri, Responder, State};
use rocket_dyn_templates::{context, Template};

use super::{failure, flash_view, FlashView, Page};
use crate::config::Config;
use crate::db::DbPool;
use crate::forms::{FormView, TodoForm};
use crate::models::TodoItem;
use crate::services::media::{self, UploadKind};
use crate::services::todos::{self, Attachments};
use crate::services::{blocking, ServiceError};
use crate::AuthenticatedUser;

fn render_form(user: &AuthenticatedUser, form: FormView, item: Option<&TodoItem>) -> Template {
    let (heading, action) = match item {
        Some(item) => ("Edit to-do", uri!(update_todo(item.id)).to_string()),
        None => ("New to-do", uri!(create_todo).to_string()),
    };
    Template::render("todos/form", context! {
        user: user,
        flash: Option::<FlashView>::None,
        form: form,
        item: item,
        heading: heading,
        action: action,
    })
}

fn prefilled(item: &TodoItem) -> FormView {
    FormView::new(TodoForm::FIELDS)
        .with_value("title", &item.title)
        .with_value("description", &item.description)
        .with_value("priority", &item.priority)
        .with_value("dueDate", &item.due_date)
}

async fn store_uploads(media_root: &Path, todo: &mut TodoForm<'_>) -> Result<Attachments, ServiceError> {
    let mut stored = Attachments::default();
    if media::is_empty(&todo.file) {
        todo.file = None;
    }
    if media::is_empty(&todo.image) {
        todo.image = None;
    }
    if let Some(file) = todo.file.as_mut() {
        stored.file = Some(media::store(media_root, UploadKind::File, file).await?);
    }
    if let Some(image) = todo.image.as_mut() {
        match media::store(media_root, UploadKind::Image, image).await {
            Ok(reference) => stored.image = Some(reference),
            Err(e) => {
                discard(media_root, &stored).await;
                return Err(e.into());
            }
        }
    }
    Ok(stored)
}

async fn discard(media_root: &Path, attachments: &Attachments) {
    for reference in [&attachments.file, &attachments.image].into_iter().flatten() {
        media::remove(media_root, reference).await;
    }
}

#[get("/create")]
pub fn create_page(user: AuthenticatedUser) -> Template {
    render_form(&user, FormView::new(TodoForm::FIELDS), None)
}

#[post("/create", data = "<form>")]
pub async fn create_todo(
    user: AuthenticatedUser,
    form: Form<Contextual<'_, TodoForm<'_>>>,
    pool: &State<DbPool>,
    config: &State<Config>,
) -> Page {
    let Contextual { value, context } = form.into_inner();
    let Some(mut todo) = value else {
        return Page::Render(render_form(&user, FormView::from_context(&context, TodoForm::FIELDS, &[]), None));
    };

    let uploads = match store_uploads(&config.media_root, &mut todo).await {
        Ok(uploads) => uploads,
        Err(e) => return failure(e, Redirect::to(uri!(list_todos))),
    };

    let (owner, fields, attachments) = (user.id, todo.fields(), uploads.clone());
    let created = blocking(pool, move |pool| todos::add_todo_item(pool, owner, fields, attachments)).await;
    match created {
        Ok(item) => {
            log::info!("user {} created to-do {}", user.id, item.id);
            Page::Redirect(Redirect::to(uri!(list_todos)))
        }
        Err(e) => {
            discard(&config.media_root, &uploads).await;
            failure(e, Redirect::to(uri!(list_todos)))
        }
    }
}

#[get("/info")]
pub async fn list_todos(user: AuthenticatedUser, pool: &State<DbPool>, flash: Option<FlashMessage<'_>>) -> Template {
    let mut flash = flash_view(flash);
    let owner = user.id;
    let items = blocking(pool, move |pool| todos::list_todo_items(pool, owner))
        .await
        .unwrap_or_else(|e| {
            log::error!("failed to list to-dos for user {}: {}", owner, e);
            flash = Some(FlashView {
                kind: "error".to_string(),
                message: super::GENERIC_FAILURE.to_string(),
            });
            Vec::new()
        });

    Template::render("todos/list", context! {
        user: &user,
        flash: flash,
        todos: items,
    })
}

async fn owned_item(pool: &DbPool, user: &AuthenticatedUser, id: i32) -> Result<TodoItem, ServiceError> {
    let owner = user.id;
    blocking(pool, move |pool| todos::get_todo_item(pool, owner, id)).await
}

#[get("/info/<id>")]
pub async fn view_todo(
    id: i32,
    user: AuthenticatedUser,
    pool: &State<DbPool>,
    flash: Option<FlashMessage<'_>>,
) -> Page {
    match owned_item(pool, &user, id).await {
        Ok(item) => Page::Render(Template::render("todos/detail", context! {
            user: &user,
            flash: flash_view(flash),
            item: item,
        })),
        Err(e) => failure(e, Redirect::to(uri!(list_todos))),
    }
}

#[get("/update/<id>")]
pub async fn update_page(id: i32, user: AuthenticatedUser, pool: &State<DbPool>) -> Page {
    match owned_item(pool, &user, id).await {
        Ok(item) => Page::Render(render_form(&user, prefilled(&item), Some(&item))),
        Err(e) => failure(e, Redirect::to(uri!(list_todos))),
    }
}

#[post("/update/<id>", data = "<form>")]
pub async fn update_todo(
    id: i32,
    user: AuthenticatedUser,
    form: Form<Contextual<'_, TodoForm<'_>>>,
    pool: &State<DbPool>,
    config: &State<Config>,
) -> Page {
    let existing = match owned_item(pool, &user, id).await {
        Ok(item) => item,
        Err(e) => return failure(e, Redirect::to(uri!(list_todos))),
    };

    let Contextual { value, context } = form.into_inner();
    let Some(mut todo) = value else {
        let view = FormView::from_context(&context, TodoForm::FIELDS, &[]);
        return Page::Render(render_form(&user, view, Some(&existing)));
    };

    let uploads = match store_uploads(&config.media_root, &mut todo).await {
        Ok(uploads) => uploads,
        Err(e) => return failure(e, Redirect::to(uri!(view_todo(id)))),
    };

    // A new upload wins over the clear box; otherwise keep what is there.
    let keep = |current: &Option<String>, clear: bool| if clear { None } else { current.clone() };
    let attachments = Attachments {
        file: uploads.file.clone().or_else(|| keep(&existing.file, todo.file_clear)),
        image: uploads.image.clone().or_else(|| keep(&existing.image, todo.image_clear)),
    };

    let (owner, fields) = (user.id, todo.fields());
    let updated = blocking(pool, move |pool| todos::update_todo_item(pool, owner, id, fields, attachments)).await;
    match updated {
        Ok(item) => {
            let replaced = [(&existing.file, &item.file), (&existing.image, &item.image)];
            for (old, new) in replaced {
                if let Some(old) = old {
                    if new.as_ref() != Some(old) {
                        media::remove(&config.media_root, old).await;
                    }
                }
            }
            log::info!("user {} updated to-do {}", user.id, item.id);
            Page::Redirect(Redirect::to(uri!(view_todo(item.id))))
        }
        Err(e) => {
            discard(&config.media_root, &uploads).await;
            failure(e, Redirect::to(uri!(list_todos)))
        }
    }
}

#[get("/delete/<id>")]
pub async fn delete_page(id: i32, user: AuthenticatedUser, pool: &State<DbPool>) -> Page {
    match owned_item(pool, &user, id).await {
        Ok(item) => Page::Render(Template::render("todos/delete", context! {
            user: &user,
            flash: Option::<FlashView>::None,
            item: item,
        })),
        Err(e) => failure(e, Redirect::to(uri!(list_todos))),
    }
}

#[post("/delete/<id>")]
pub async fn delete_todo(
    id: i32,
    user: AuthenticatedUser,
    pool: &State<DbPool>,
    config: &State<Config>,
) -> Page {
    let item = match owned_item(pool, &user, id).await {
        Ok(item) => item,
        Err(e) => return failure(e, Redirect::to(uri!(list_todos))),
    };

    let owner = user.id;
    if let Err(e) = blocking(pool, move |pool| todos::delete_todo_item(pool, owner, id)).await {
        return failure(e, Redirect::to(uri!(list_todos)));
    }

    let attachments = Attachments { file: item.file, image: item.image };
    discard(&config.media_root, &attachments).await;
    log::info!("user {} deleted to-do {}", user.id, id);
    Page::Flash(Flash::success(Redirect::to(uri!(list_todos)), "To-do deleted."))
}

/// A stored upload, always offered as a download.
#[derive(Responder)]
pub struct Attachment {
    file: NamedFile,
    content_type: ContentType,
    disposition: Header<'static>,
    nosniff: Header<'static>,
}

#[get("/media/<path..>")]
pub async fn attachment(
    path: PathBuf,
    user: AuthenticatedUser,
    pool: &State<DbPool>,
    config: &State<Config>,
) -> Result<Attachment, Status> {
    let reference = path.to_string_lossy().into_owned();
    let (owner, lookup) = (user.id, reference.clone());
    match blocking(pool, move |pool| todos::owns_attachment(pool, owner, &lookup)).await {
        Ok(true) => {}
        Ok(false) => return Err(Status::NotFound),
        Err(e) => {
            log::error!("attachment lookup failed for user {}: {}", user.id, e);
            return Err(Status::InternalServerError);
        }
    }

    let file = NamedFile::open(media::resolve(&config.media_root, &reference))
        .await
        .map_err(|e| {
            log::warn!("attachment {} is missing on disk: {}", reference, e);
            Status::NotFound
        })?;

    Ok(Attachment {
        file,
        content_type: media::served_content_type(&reference),
        disposition: Header::new(
            "Content-Disposition",
            format!("attachment; filename=\"{}\"", media::download_name(&reference)),
        ),
        nosniff: Header::new("X-Content-Type-Options", "nosniff"),
    })
}

pub fn todo_routes() -> Vec<rocket::Route> {
    routes![
        create_page,
        create_todo,
        list_todos,
        view_todo,
        update_page,
        update_todo,
        delete_page,
        delete_todo,
        attachment,
    ]
}
