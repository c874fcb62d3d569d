use rusqlite::Connection;

use crate::error::Result;

/// Initialise the scheduler schema in `conn`. Idempotent — `CREATE TABLE IF
/// NOT EXISTS` doubles as the "no migration machinery needed yet" policy.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS jobs (
            job_id      TEXT    NOT NULL PRIMARY KEY,
            name        TEXT    NOT NULL,
            schedule    TEXT    NOT NULL,
            prompt      TEXT    NOT NULL,
            enabled     INTEGER NOT NULL DEFAULT 1,
            one_shot    INTEGER NOT NULL DEFAULT 0,
            created_by  TEXT    NOT NULL,
            created_at  TEXT    NOT NULL,
            next_run    TEXT,
            last_run    TEXT,
            last_status TEXT,
            last_error  TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_jobs_next_run ON jobs (next_run);
        ",
    )?;
    Ok(())
}
