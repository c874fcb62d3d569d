use rusqlite::Connection;

use crate::error::Result;

/// All three indices (entity, chunk, memory) share one table, distinguished
/// by `tag`. The embedding is stored as a flat little-endian `f32` BLOB so
/// the flat-scan search can read it back without a JSON round-trip.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS rag_records (
            id          TEXT PRIMARY KEY,
            tag         TEXT NOT NULL,
            payload_json TEXT NOT NULL,
            embedding   BLOB NOT NULL,
            dim         INTEGER NOT NULL,
            created_at  TEXT NOT NULL,
            expires_at  TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_rag_records_tag ON rag_records(tag);
        CREATE INDEX IF NOT EXISTS idx_rag_records_expires ON rag_records(expires_at);",
    )?;
    Ok(())
}

pub fn encode_embedding(v: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(v.len() * 4);
    for x in v {
        bytes.extend_from_slice(&x.to_le_bytes());
    }
    bytes
}

pub fn decode_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedding_round_trips_through_bytes() {
        let v = vec![0.1_f32, -0.5, 1.0, -1.0, 0.0];
        let bytes = encode_embedding(&v);
        let back = decode_embedding(&bytes);
        assert_eq!(v, back);
    }
}
