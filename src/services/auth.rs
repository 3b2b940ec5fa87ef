use crate::db::DbPool;
use crate::models::{NewSession, NewUser, Session, User};
use crate::schema::{sessions, users};
use bcrypt::{hash, verify};
use chrono::{Duration, Utc};
use diesel::prelude::*;
use uuid::Uuid;
use super::error::ServiceError;

pub struct NewAccount<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

pub fn register_user(pool: &DbPool, account: &NewAccount<'_>, cost: u32) -> Result<User, ServiceError> {
    let mut conn = pool.get()?;

    let username_taken = users::table
        .filter(users::username.eq(account.username))
        .select(users::id)
        .first::<i32>(&mut conn)
        .optional()?
        .is_some();
    if username_taken {
        return Err(ServiceError::Conflict("A user with that username already exists.".to_string()));
    }

    let email_taken = users::table
        .filter(users::email.eq(account.email))
        .select(users::id)
        .first::<i32>(&mut conn)
        .optional()?
        .is_some();
    if email_taken {
        return Err(ServiceError::Conflict("A user with that email already exists.".to_string()));
    }

    let hashed_password = hash(account.password, cost)?;

    let new_user = NewUser {
        username: account.username,
        email: account.email,
        password_hash: &hashed_password,
    };

    let user = diesel::insert_into(users::table)
        .values(&new_user)
        .returning(User::as_returning())
        .get_result(&mut conn)?;

    log::info!("registered user {} ({})", user.username, user.id);
    Ok(user)
}

/// Returns the user only when the username exists and the password verifies.
pub fn authenticate(pool: &DbPool, username: &str, password: &str) -> Result<Option<User>, ServiceError> {
    let mut conn = pool.get()?;

    let found_user = users::table
        .filter(users::username.eq(username))
        .select(User::as_select())
        .first::<User>(&mut conn)
        .optional()?;

    match found_user {
        Some(user) if verify(password, &user.password_hash)? => Ok(Some(user)),
        _ => Ok(None),
    }
}

pub fn start_session(pool: &DbPool, user_id: i32, ttl: Duration) -> Result<Session, ServiceError> {
    let mut conn = pool.get()?;
    let now = Utc::now().naive_utc();

    diesel::delete(sessions::table.filter(sessions::expires_at.lt(now))).execute(&mut conn)?;

    let token = Uuid::new_v4().to_string();
    let new_session = NewSession {
        id: &token,
        user_id,
        expires_at: now + ttl,
    };

    let session = diesel::insert_into(sessions::table)
        .values(&new_session)
        .returning(Session::as_returning())
        .get_result(&mut conn)?;

    log::info!("started session for user {}", user_id);
    Ok(session)
}

pub fn end_session(pool: &DbPool, token: &str) -> Result<(), ServiceError> {
    let mut conn = pool.get()?;
    diesel::delete(sessions::table.filter(sessions::id.eq(token))).execute(&mut conn)?;
    Ok(())
}

/// Resolves a session token to its user; expired sessions are dropped on sight.
pub fn session_user(pool: &DbPool, token: &str) -> Result<Option<User>, ServiceError> {
    let mut conn = pool.get()?;

    let found = sessions::table
        .inner_join(users::table)
        .filter(sessions::id.eq(token))
        .select((Session::as_select(), User::as_select()))
        .first::<(Session, User)>(&mut conn)
        .optional()?;

    match found {
        Some((session, user)) if session.expires_at > Utc::now().naive_utc() => Ok(Some(user)),
        Some((session, _)) => {
            diesel::delete(sessions::table.filter(sessions::id.eq(&session.id))).execute(&mut conn)?;
            Ok(None)
        }
        None => Ok(None),
    }
}

/// Sets a new password for the account registered under `email`, no questions asked.
pub fn reset_password(pool: &DbPool, email: &str, new_password: &str, cost: u32) -> Result<(), ServiceError> {
    let mut conn = pool.get()?;

    let user = find_by_email(&mut conn, email)?
        .ok_or_else(|| ServiceError::NotFound("User with the provided email does not exist".to_string()))?;

    let hashed_password = hash(new_password, cost)?;
    set_password(&mut conn, user.id, &hashed_password)?;
    log::info!("password reset for user {}", user.id);
    Ok(())
}

/// Sets a new password only if `old_password` matches the stored hash.
pub fn change_password(
    pool: &DbPool,
    email: &str,
    old_password: &str,
    new_password: &str,
    cost: u32,
) -> Result<(), ServiceError> {
    let mut conn = pool.get()?;

    let user = find_by_email(&mut conn, email)?
        .ok_or_else(|| ServiceError::NotFound("User with the provided email does not exist.".to_string()))?;

    if !verify(old_password, &user.password_hash)? {
        return Err(ServiceError::Unauthorized("Old password is incorrect.".to_string()));
    }

    let hashed_password = hash(new_password, cost)?;
    set_password(&mut conn, user.id, &hashed_password)?;
    log::info!("password changed for user {}", user.id);
    Ok(())
}

fn find_by_email(conn: &mut SqliteConnection, email: &str) -> Result<Option<User>, ServiceError> {
    let user = users::table
        .filter(users::email.eq(email))
        .select(User::as_select())
        .first::<User>(conn)
        .optional()?;
    Ok(user)
}

// New hash plus logout everywhere, in one transaction.
fn set_password(conn: &mut SqliteConnection, user_id: i32, password_hash: &str) -> Result<(), ServiceError> {
    conn.transaction(|conn| {
        diesel::update(users::table.find(user_id))
            .set((
                users::password_hash.eq(password_hash),
                users::updated_at.eq(Utc::now().naive_utc()),
            ))
            .execute(conn)?;
        diesel::delete(sessions::table.filter(sessions::user_id.eq(user_id))).execute(conn)?;
        Ok(())
    })
}
