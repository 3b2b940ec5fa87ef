use crate::db::DbPool;
use crate::models::{User, UserInfo};
use crate::schema::users;
use diesel::prelude::*;
use super::error::ServiceError;

pub fn get_user_info(pool: &DbPool, user_id: i32) -> Result<UserInfo, ServiceError> {
    let mut conn = pool.get()?;

    users::table
        .find(user_id)
        .select(User::as_select())
        .first::<User>(&mut conn)
        .optional()?
        .map(UserInfo::from)
        .ok_or_else(|| ServiceError::NotFound("User not found.".to_string()))
}
