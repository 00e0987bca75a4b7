use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use super::run_pending;
    use crate::{connect_with_settings, migrations::MIGRATOR};

    async fn facility_table_exists(pool: &sqlx::SqlitePool) -> bool {
        sqlx::query(
            "SELECT COUNT(*) AS count FROM sqlite_master WHERE type = 'table' AND name = 'AACountyexcel'",
        )
        .fetch_one(pool)
        .await
        .expect("check facility table")
        .get::<i64, _>("count")
            == 1
    }

    #[tokio::test]
    async fn migrations_create_facility_table_with_every_column() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        assert!(facility_table_exists(&pool).await);

        let columns: Vec<String> = sqlx::query("SELECT name FROM pragma_table_info('AACountyexcel')")
            .fetch_all(&pool)
            .await
            .expect("load columns")
            .into_iter()
            .map(|row| row.get::<String, _>("name"))
            .collect();

        assert_eq!(columns.len(), querybot_core::FACILITY_COLUMNS.len());
        for hint in querybot_core::FACILITY_COLUMNS {
            assert!(columns.iter().any(|name| name == hint.name), "missing column {}", hint.name);
        }
    }

    #[tokio::test]
    async fn migrations_are_reversible() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        MIGRATOR.undo(&pool, 0).await.expect("undo migrations");
        assert!(!facility_table_exists(&pool).await);

        run_pending(&pool).await.expect("re-run migrations");
        assert!(facility_table_exists(&pool).await);
    }
}
