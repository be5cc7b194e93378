use super::{now_ms, Db, DbError};

/// One raw webhook delivery, kept verbatim for audit.
#[derive(Debug, Clone)]
pub struct RawEvent {
    pub id: i64,
    pub body: String,
    pub received_at: u64,
}

impl Db {
    /// Append a raw webhook body. Fire-and-forget from the caller's side;
    /// failures are logged, never surfaced to the sender.
    pub async fn raw_events_insert(&self, body: &str) -> Result<(), DbError> {
        let body = body.to_string();
        let ts = now_ms() as i64;
        self.exec(move |conn| {
            conn.execute(
                "INSERT INTO raw_events (body, received_at) VALUES (?1, ?2)",
                rusqlite::params![body, ts],
            )?;
            Ok(())
        })
        .await
    }

    /// Most recent raw deliveries, newest first.
    pub async fn raw_events_recent(&self, limit: usize) -> Result<Vec<RawEvent>, DbError> {
        self.exec(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, body, received_at FROM raw_events
                 ORDER BY received_at DESC, id DESC LIMIT ?1",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![limit as i64], |row| {
                    Ok(RawEvent {
                        id: row.get(0)?,
                        body: row.get(1)?,
                        received_at: row.get::<_, i64>(2)? as u64,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    /// Record an accepted contest submission.
    pub async fn uploads_insert(&self, sender: &str, kind: &str, url: &str) -> Result<(), DbError> {
        let sender = sender.to_string();
        let kind = kind.to_string();
        let url = url.to_string();
        let ts = now_ms() as i64;
        self.exec(move |conn| {
            conn.execute(
                "INSERT INTO uploads (sender, kind, url, received_at) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![sender, kind, url, ts],
            )?;
            Ok(())
        })
        .await
    }
}
