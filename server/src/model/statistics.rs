use crate::{db_core::prelude::*, error::AppResult, prompt::TokenUsage};

pub struct StatisticsCtrl;

impl StatisticsCtrl {
    /// Adds the tokens spent on a user's prompts to their running totals.
    pub async fn add_token_usage(
        conn: &DatabaseConnection,
        user_id: i32,
        usage: TokenUsage,
    ) -> AppResult<()> {
        if usage == TokenUsage::default() {
            return Ok(());
        }

        let result = Statistics::update_many()
            .col_expr(
                statistics::Column::NbTokensInput,
                Expr::col(statistics::Column::NbTokensInput).add(usage.input),
            )
            .col_expr(
                statistics::Column::NbTokensOutput,
                Expr::col(statistics::Column::NbTokensOutput).add(usage.output),
            )
            .filter(statistics::Column::UserId.eq(user_id))
            .exec(conn)
            .await?;

        if result.rows_affected == 0 {
            statistics::ActiveModel {
                id: ActiveValue::NotSet,
                user_id: ActiveValue::Set(user_id),
                nb_tokens_input: ActiveValue::Set(usage.input),
                nb_tokens_output: ActiveValue::Set(usage.output),
            }
            .insert(conn)
            .await?;
        }

        tracing::debug!(
            "User {} used {} input / {} output tokens",
            user_id,
            usage.input,
            usage.output
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    use super::*;

    #[tokio::test]
    async fn test_add_to_existing_row() {
        let conn = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();

        StatisticsCtrl::add_token_usage(&conn, 3, TokenUsage { input: 100, output: 20 })
            .await
            .unwrap();

        let log = conn.into_transaction_log();
        assert_eq!(log.len(), 1);
    }

    #[tokio::test]
    async fn test_zero_usage_is_noop() {
        let conn = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        StatisticsCtrl::add_token_usage(&conn, 3, TokenUsage::default())
            .await
            .unwrap();
        assert!(conn.into_transaction_log().is_empty());
    }
}
