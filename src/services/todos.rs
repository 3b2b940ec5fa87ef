use crate::db::DbPool;
use crate::models::{NewTodoItem, TodoChangeset, TodoFields, TodoItem};
use chrono::Utc;
use diesel::prelude::*;
use super::error::ServiceError;

/// Attachment references produced by the media store.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Attachments {
    pub file: Option<String>,
    pub image: Option<String>,
}

pub fn add_todo_item(
    pool: &DbPool,
    owner: i32,
    fields: TodoFields,
    attachments: Attachments,
) -> Result<TodoItem, ServiceError> {
    use crate::schema::todo_items::dsl::*;
    let mut conn = pool.get()?;

    let new_item = NewTodoItem {
        user_id: owner,
        title: fields.title,
        description: fields.description,
        priority: fields.priority,
        due_date: fields.due_date,
        file: attachments.file,
        image: attachments.image,
    };

    let item = diesel::insert_into(todo_items)
        .values(&new_item)
        .returning(TodoItem::as_returning())
        .get_result(&mut conn)?;
    Ok(item)
}

pub fn list_todo_items(pool: &DbPool, owner: i32) -> Result<Vec<TodoItem>, ServiceError> {
    use crate::schema::todo_items::dsl::*;
    let mut conn = pool.get()?;

    let items = todo_items
        .filter(user_id.eq(owner))
        .order((created_at.desc(), id.desc()))
        .select(TodoItem::as_select())
        .load::<TodoItem>(&mut conn)?;
    Ok(items)
}

/// Scoped lookup: the item must exist *and* belong to `owner`.
pub fn get_todo_item(pool: &DbPool, owner: i32, item_id: i32) -> Result<TodoItem, ServiceError> {
    use crate::schema::todo_items::dsl::*;
    let mut conn = pool.get()?;

    todo_items
        .filter(id.eq(item_id).and(user_id.eq(owner)))
        .select(TodoItem::as_select())
        .first::<TodoItem>(&mut conn)
        .optional()?
        .ok_or_else(not_found)
}

pub fn update_todo_item(
    pool: &DbPool,
    owner: i32,
    item_id: i32,
    fields: TodoFields,
    attachments: Attachments,
) -> Result<TodoItem, ServiceError> {
    use crate::schema::todo_items::dsl::*;
    let mut conn = pool.get()?;

    let changes = TodoChangeset {
        title: fields.title,
        description: fields.description,
        priority: fields.priority,
        due_date: fields.due_date,
        file: attachments.file,
        image: attachments.image,
        updated_at: Utc::now().naive_utc(),
    };

    diesel::update(todo_items.filter(id.eq(item_id).and(user_id.eq(owner))))
        .set(&changes)
        .returning(TodoItem::as_returning())
        .get_result(&mut conn)
        .optional()?
        .ok_or_else(not_found)
}

pub fn delete_todo_item(pool: &DbPool, owner: i32, item_id: i32) -> Result<(), ServiceError> {
    use crate::schema::todo_items::dsl::*;
    let mut conn = pool.get()?;

    let deleted = diesel::delete(todo_items.filter(id.eq(item_id).and(user_id.eq(owner))))
        .execute(&mut conn)?;
    if deleted == 0 {
        return Err(not_found());
    }
    Ok(())
}

/// Whether `reference` is the file or image of one of `owner`'s to-dos.
pub fn owns_attachment(pool: &DbPool, owner: i32, reference: &str) -> Result<bool, ServiceError> {
    use crate::schema::todo_items::dsl::*;
    let mut conn = pool.get()?;

    let matches: i64 = todo_items
        .filter(user_id.eq(owner))
        .filter(file.eq(reference).or(image.eq(reference)))
        .count()
        .get_result(&mut conn)?;
    Ok(matches > 0)
}

fn not_found() -> ServiceError {
    ServiceError::NotFound("To-do not found.".to_string())
}
