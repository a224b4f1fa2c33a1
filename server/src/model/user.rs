use crate::{
    db_core::prelude::*,
    error::{AppError, AppResult},
};

pub struct UserCtrl;

impl UserCtrl {
    pub async fn get_by_id(conn: &DatabaseConnection, user_id: i32) -> AppResult<user::Model> {
        User::find_by_id(user_id)
            .one(conn)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    pub async fn get_by_email(conn: &DatabaseConnection, email: &str) -> AppResult<user::Model> {
        User::find()
            .filter(user::Column::Email.eq(email))
            .one(conn)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }
}
