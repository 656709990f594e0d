use crate::models::EnrichmentRecord;
use chrono::{DateTime, Utc};
use color_eyre::Result;
use rusqlite::{params, Connection};
use tracing::warn;

/// One persisted enrichment cycle, as kept in the local history database.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub id: i64,
    pub saved_at: DateTime<Utc>,
    pub record: EnrichmentRecord,
}

/// Local SQLite log of records that were submitted to the persistence
/// endpoint. Diagnostic only; the HTTP endpoint stays the system of record.
pub struct HistoryStore {
    conn: Connection,
}

impl HistoryStore {
    pub fn open(path: &str) -> Result<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS enrichments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                saved_at TEXT NOT NULL,
                latitude TEXT NOT NULL,
                longitude TEXT NOT NULL,
                country TEXT NOT NULL,
                state TEXT NOT NULL,
                city TEXT NOT NULL,
                postal_code TEXT NOT NULL,
                zone TEXT NOT NULL,
                ip_address TEXT NOT NULL
            )",
            [],
        )?;
        Ok(Self { conn })
    }

    pub fn insert(&self, record: &EnrichmentRecord) -> Result<HistoryEntry> {
        let saved_at = Utc::now();
        self.conn.execute(
            "INSERT INTO enrichments
                (saved_at, latitude, longitude, country, state, city, postal_code, zone, ip_address)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                saved_at.to_rfc3339(),
                record.latitude,
                record.longitude,
                record.country,
                record.state,
                record.city,
                record.postal_code,
                record.zone,
                record.ip_address,
            ],
        )?;
        Ok(HistoryEntry {
            id: self.conn.last_insert_rowid(),
            saved_at,
            record: record.clone(),
        })
    }

    /// Most recent entries first.
    pub fn load(&self) -> Result<Vec<HistoryEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, saved_at, latitude, longitude, country, state, city,
                    postal_code, zone, ip_address
             FROM enrichments ORDER BY id DESC LIMIT 200",
        )?;
        let rows = stmt.query_map([], |row| {
            let saved_at_raw: String = row.get(1)?;
            Ok(HistoryEntry {
                id: row.get(0)?,
                saved_at: parse_saved_at(&saved_at_raw),
                record: EnrichmentRecord {
                    latitude: row.get(2)?,
                    longitude: row.get(3)?,
                    country: row.get(4)?,
                    state: row.get(5)?,
                    city: row.get(6)?,
                    postal_code: row.get(7)?,
                    zone: row.get(8)?,
                    ip_address: row.get(9)?,
                },
            })
        })?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    /// Writes the full history to a CSV file, returning the row count.
    pub fn export_csv(&self, path: &str) -> Result<usize> {
        let entries = self.load()?;
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record([
            "savedAt",
            "latitude",
            "longitude",
            "country",
            "state",
            "city",
            "postalCode",
            "zone",
            "ipAddress",
        ])?;
        for entry in &entries {
            let r = &entry.record;
            let saved_at = entry.saved_at.to_rfc3339();
            writer.write_record([
                saved_at.as_str(),
                r.latitude.as_str(),
                r.longitude.as_str(),
                r.country.as_str(),
                r.state.as_str(),
                r.city.as_str(),
                r.postal_code.as_str(),
                r.zone.as_str(),
                r.ip_address.as_str(),
            ])?;
        }
        writer.flush()?;
        Ok(entries.len())
    }
}

fn parse_saved_at(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            warn!("Unparseable saved_at '{}' in history: {}", raw, e);
            Utc::now()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> EnrichmentRecord {
        EnrichmentRecord {
            latitude: "52.52".into(),
            longitude: "13.405".into(),
            country: "Germany".into(),
            state: "Berlin".into(),
            city: "Berlin".into(),
            postal_code: "10117".into(),
            zone: "Not Available".into(),
            ip_address: "203.0.113.7".into(),
        }
    }

    #[test]
    fn insert_and_load_round_trip() {
        let store = HistoryStore::open_in_memory().unwrap();
        let entry = store.insert(&sample_record()).unwrap();
        assert_eq!(entry.id, 1);

        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].record, sample_record());
    }

    #[test]
    fn load_returns_newest_first() {
        let store = HistoryStore::open_in_memory().unwrap();
        let mut first = sample_record();
        first.city = "Potsdam".into();
        store.insert(&first).unwrap();
        store.insert(&sample_record()).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded[0].record.city, "Berlin");
        assert_eq!(loaded[1].record.city, "Potsdam");
    }

    #[test]
    fn exports_csv_with_header_and_rows() {
        let store = HistoryStore::open_in_memory().unwrap();
        store.insert(&sample_record()).unwrap();

        let path = std::env::temp_dir().join("geoform-history-test.csv");
        let path = path.to_str().unwrap().to_string();
        let count = store.export_csv(&path).unwrap();
        assert_eq!(count, 1);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("savedAt,latitude"));
        assert!(contents.contains("203.0.113.7"));
        let _ = std::fs::remove_file(&path);
    }
}
