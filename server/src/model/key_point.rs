use crate::{db_core::prelude::*, error::AppResult, knowledge::summary::Summary};

pub struct KeyPointCtrl;

/// A keypoint together with the provider id of the email it came from.
#[derive(Debug, Clone, PartialEq, Eq, FromQueryResult)]
pub struct KeyPointRow {
    pub category: String,
    pub organization: String,
    pub topic: String,
    pub content: String,
    pub provider_id: String,
}

impl KeyPointCtrl {
    /// Every keypoint of the user's emails, oldest first.
    pub async fn rows_for_user(
        conn: &DatabaseConnection,
        user_id: i32,
    ) -> AppResult<Vec<KeyPointRow>> {
        let rows = KeyPoint::find()
            .join(JoinType::InnerJoin, key_point::Relation::Email.def())
            .filter(email::Column::UserId.eq(user_id))
            .select_only()
            .column(key_point::Column::Category)
            .column(key_point::Column::Organization)
            .column(key_point::Column::Topic)
            .column(key_point::Column::Content)
            .column(email::Column::ProviderId)
            .order_by(key_point::Column::Id, Order::Asc)
            .into_model::<KeyPointRow>()
            .all(conn)
            .await?;

        Ok(rows)
    }

    /// Swaps the keypoints stored for an email with those of `summary`.
    /// Running it twice with the same summary leaves the same rows behind.
    pub async fn replace_for_email(
        conn: &DatabaseConnection,
        email_id: i32,
        summary: &Summary,
    ) -> AppResult<u64> {
        let models = summary
            .keypoints
            .iter()
            .map(|keypoint| key_point::ActiveModel {
                id: ActiveValue::NotSet,
                email_id: ActiveValue::Set(email_id),
                is_reply: ActiveValue::Set(summary.is_reply),
                position: ActiveValue::Set(keypoint.position),
                category: ActiveValue::Set(summary.category.clone()),
                organization: ActiveValue::Set(summary.organization.clone()),
                topic: ActiveValue::Set(summary.topic.clone()),
                content: ActiveValue::Set(keypoint.content.clone()),
            })
            .collect::<Vec<_>>();
        let inserted = models.len() as u64;

        let txn = conn.begin().await?;
        KeyPoint::delete_many()
            .filter(key_point::Column::EmailId.eq(email_id))
            .exec(&txn)
            .await?;
        if !models.is_empty() {
            KeyPoint::insert_many(models)
                .exec_without_returning(&txn)
                .await?;
        }
        txn.commit().await?;

        Ok(inserted)
    }

    pub async fn delete_for_email(conn: &DatabaseConnection, email_id: i32) -> AppResult<u64> {
        let result = KeyPoint::delete_many()
            .filter(key_point::Column::EmailId.eq(email_id))
            .exec(conn)
            .await?;

        Ok(result.rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Statement, Transaction, Value};

    use super::*;
    use crate::knowledge::{
        summary::{Summary, SummaryKeypoint},
        tree::KnowledgeTree,
    };

    fn row(category: &str, organization: &str, topic: &str, content: &str, id: &str) -> BTreeMap<&'static str, Value> {
        BTreeMap::from([
            ("category", Value::from(category)),
            ("organization", Value::from(organization)),
            ("topic", Value::from(topic)),
            ("content", Value::from(content)),
            ("provider_id", Value::from(id)),
        ])
    }

    #[tokio::test]
    async fn test_rows_for_user_build_tree() {
        let conn = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![
                row("Studies", "ESAIP", "Semester 4", "erasmus", "gm-1"),
                row("Studies", "ESAIP", "Semester 4", "Erasmus", "gm-2"),
                row("Work", "Acme", "Payroll", "paid on the 28th", "gm-3"),
            ]])
            .into_connection();

        let rows = KeyPointCtrl::rows_for_user(&conn, 1).await.unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2].provider_id, "gm-3");

        let tree = KnowledgeTree::from_rows(rows);
        let topic = tree.topic("Studies", "ESAIP", "Semester 4").unwrap();
        assert_eq!(topic.keypoints, vec!["erasmus"]);
        assert_eq!(topic.emails, vec!["gm-1", "gm-2"]);

        let log = conn.into_transaction_log();
        assert_eq!(log.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_for_email() {
        let conn = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 4,
            }])
            .into_connection();

        let deleted = KeyPointCtrl::delete_for_email(&conn, 12).await.unwrap();
        assert_eq!(deleted, 4);
    }

    fn exec_result(rows_affected: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected,
        }
    }

    fn thread_summary(keypoints: Vec<SummaryKeypoint>) -> Summary {
        Summary {
            category: "Work".to_string(),
            organization: "Acme".to_string(),
            topic: "Hiring".to_string(),
            is_reply: true,
            keypoints,
        }
    }

    #[tokio::test]
    async fn test_replace_for_email() {
        let conn = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([exec_result(3), exec_result(2)])
            .into_connection();
        let summary = thread_summary(vec![
            SummaryKeypoint {
                position: Some(1),
                content: "interview Friday".to_string(),
            },
            SummaryKeypoint {
                position: Some(2),
                content: "bring ID".to_string(),
            },
        ]);

        let stored = KeyPointCtrl::replace_for_email(&conn, 12, &summary)
            .await
            .unwrap();
        assert_eq!(stored, 2);

        assert_eq!(
            conn.into_transaction_log(),
            [Transaction::many([
                Statement::from_string(DatabaseBackend::Postgres, "BEGIN"),
                Statement::from_sql_and_values(
                    DatabaseBackend::Postgres,
                    r#"DELETE FROM "key_point" WHERE "key_point"."email_id" = $1"#,
                    [12i32.into()],
                ),
                Statement::from_sql_and_values(
                    DatabaseBackend::Postgres,
                    r#"INSERT INTO "key_point" ("email_id", "is_reply", "position", "category", "organization", "topic", "content") VALUES ($1, $2, $3, $4, $5, $6, $7), ($8, $9, $10, $11, $12, $13, $14)"#,
                    [
                        12i32.into(),
                        true.into(),
                        Some(1i32).into(),
                        "Work".into(),
                        "Acme".into(),
                        "Hiring".into(),
                        "interview Friday".into(),
                        12i32.into(),
                        true.into(),
                        Some(2i32).into(),
                        "Work".into(),
                        "Acme".into(),
                        "Hiring".into(),
                        "bring ID".into(),
                    ],
                ),
                Statement::from_string(DatabaseBackend::Postgres, "COMMIT"),
            ])]
        );
    }

    #[tokio::test]
    async fn test_replace_with_empty_summary_only_deletes() {
        let conn = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([exec_result(3)])
            .into_connection();

        let stored = KeyPointCtrl::replace_for_email(&conn, 12, &thread_summary(vec![]))
            .await
            .unwrap();
        assert_eq!(stored, 0);

        assert_eq!(
            conn.into_transaction_log(),
            [Transaction::many([
                Statement::from_string(DatabaseBackend::Postgres, "BEGIN"),
                Statement::from_sql_and_values(
                    DatabaseBackend::Postgres,
                    r#"DELETE FROM "key_point" WHERE "key_point"."email_id" = $1"#,
                    [12i32.into()],
                ),
                Statement::from_string(DatabaseBackend::Postgres, "COMMIT"),
            ])]
        );
    }
}
