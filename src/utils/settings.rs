use sqlx::MySqlPool;

pub const CUTOFF_KEY: &str = "cutoffTime";
pub const DEFAULT_CUTOFF: &str = "08:00";

/// Read-through accessor: the setting row is created lazily on first write,
/// so an absent row yields the compiled-in default.
pub async fn get_cutoff_time(pool: &MySqlPool) -> Result<String, sqlx::Error> {
    let value = sqlx::query_scalar::<_, String>("SELECT value FROM settings WHERE `key` = ?")
        .bind(CUTOFF_KEY)
        .fetch_optional(pool)
        .await?;

    Ok(value.unwrap_or_else(|| DEFAULT_CUTOFF.to_string()))
}

pub async fn set_cutoff_time(pool: &MySqlPool, value: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO settings (`key`, value)
        VALUES (?, ?)
        ON DUPLICATE KEY UPDATE value = VALUES(value)
        "#,
    )
    .bind(CUTOFF_KEY)
    .bind(value)
    .execute(pool)
    .await?;

    Ok(())
}
