use crate::{
    db_core::prelude::*,
    error::{AppError, AppResult},
};

pub struct EmailCtrl;

impl EmailCtrl {
    /// Fetches an email only if it belongs to `user_id`.
    pub async fn get_for_user(
        conn: &DatabaseConnection,
        user_id: i32,
        email_id: i32,
    ) -> AppResult<email::Model> {
        Email::find_by_id(email_id)
            .filter(email::Column::UserId.eq(user_id))
            .one(conn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Email {} not found", email_id)))
    }

    /// Database ids of the user's emails with the given provider ids, in
    /// the order the provider ids were given. Unknown ids are skipped.
    pub async fn ids_by_provider_ids(
        conn: &DatabaseConnection,
        user_id: i32,
        provider_ids: &[String],
    ) -> AppResult<Vec<i32>> {
        if provider_ids.is_empty() {
            return Ok(vec![]);
        }

        let found: Vec<(i32, String)> = Email::find()
            .select_only()
            .column(email::Column::Id)
            .column(email::Column::ProviderId)
            .filter(email::Column::UserId.eq(user_id))
            .filter(email::Column::ProviderId.is_in(provider_ids.iter().cloned()))
            .into_tuple()
            .all(conn)
            .await?;

        let ids = provider_ids
            .iter()
            .filter_map(|provider_id| {
                found
                    .iter()
                    .find(|(_, p)| p == provider_id)
                    .map(|(id, _)| *id)
            })
            .collect();

        Ok(ids)
    }
}
