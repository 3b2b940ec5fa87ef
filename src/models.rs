use crate::schema::{sessions, todo_items, users};
use chrono::NaiveDateTime;
use diesel::prelude::*;
use rocket::serde::Serialize;

#[derive(Queryable, Identifiable, Selectable, Serialize, Debug, PartialEq, Clone)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[serde(crate = "rocket::serde")]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)] // Password hash should not be sent to client
    pub password_hash: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = users)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
}

// What the user detail page shows.
#[derive(Serialize, Debug, Clone)]
#[serde(crate = "rocket::serde")]
pub struct UserInfo {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub created_at: NaiveDateTime,
}

impl From<User> for UserInfo {
    fn from(user: User) -> Self {
        UserInfo {
            id: user.id,
            username: user.username,
            email: user.email,
            created_at: user.created_at,
        }
    }
}

#[derive(Queryable, Identifiable, Selectable, Associations, Serialize, Debug, PartialEq, Clone)]
#[diesel(belongs_to(User))]
#[diesel(table_name = todo_items)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[serde(crate = "rocket::serde")]
pub struct TodoItem {
    pub id: i32,
    pub user_id: i32,
    pub title: String,
    pub description: String,
    pub priority: String,
    pub due_date: String,
    /// Path below the media root, always under `files/`.
    pub file: Option<String>,
    /// Path below the media root, always under `images/`.
    pub image: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = todo_items)]
pub struct NewTodoItem {
    pub user_id: i32,
    pub title: String,
    pub description: String,
    pub priority: String,
    pub due_date: String,
    pub file: Option<String>,
    pub image: Option<String>,
}

/// Full replacement of the editable columns; `None` attachments clear the column.
#[derive(AsChangeset, Debug)]
#[diesel(table_name = todo_items, treat_none_as_null = true)]
pub struct TodoChangeset {
    pub title: String,
    pub description: String,
    pub priority: String,
    pub due_date: String,
    pub file: Option<String>,
    pub image: Option<String>,
    pub updated_at: NaiveDateTime,
}

/// The editable text fields of a to-do, already validated.
#[derive(Debug, Clone, PartialEq)]
pub struct TodoFields {
    pub title: String,
    pub description: String,
    pub priority: String,
    pub due_date: String,
}

#[derive(Queryable, Identifiable, Selectable, Associations, Debug, Clone)]
#[diesel(belongs_to(User))]
#[diesel(table_name = sessions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Session {
    pub id: String,
    pub user_id: i32,
    pub created_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = sessions)]
pub struct NewSession<'a> {
    pub id: &'a str,
    pub user_id: i32,
    pub expires_at: NaiveDateTime,
}
