use std::path::Path;

use ammi_common::{Error, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Kind of health record. Image and PDF ingestion currently defaults to
/// `BloodWork`; classification from content is a known gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordType {
    BloodWork,
    Vitals,
    Imaging,
    Medication,
}

impl RecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::BloodWork => "blood_work",
            RecordType::Vitals => "vitals",
            RecordType::Imaging => "imaging",
            RecordType::Medication => "medication",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "blood_work" => Some(RecordType::BloodWork),
            "vitals" => Some(RecordType::Vitals),
            "imaging" => Some(RecordType::Imaging),
            "medication" => Some(RecordType::Medication),
            _ => None,
        }
    }

    /// Human-readable label, e.g. "blood work".
    pub fn label(&self) -> String {
        self.as_str().replace('_', " ")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Pdf,
    Image,
    Text,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Pdf => "pdf",
            SourceType::Image => "image",
            SourceType::Text => "text",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pdf" => Some(SourceType::Pdf),
            "image" => Some(SourceType::Image),
            "text" => Some(SourceType::Text),
            _ => None,
        }
    }
}

/// A persisted health record. Immutable once created; "record numbers"
/// shown to users are positions in a creation-time-descending query and
/// are never stored.
#[derive(Debug, Clone)]
pub struct HealthRecord {
    pub id: String,
    pub user_id: String,
    pub record_type: RecordType,
    pub date: DateTime<Utc>,
    pub source_type: SourceType,
    pub raw_data: String,
    pub structured_data: Option<serde_json::Value>,
    pub analysis: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Insert shape for a record before persistence assigns id and created_at.
#[derive(Debug, Clone)]
pub struct NewHealthRecord {
    pub user_id: String,
    pub record_type: RecordType,
    pub date: DateTime<Utc>,
    pub source_type: SourceType,
    pub raw_data: String,
    pub structured_data: Option<serde_json::Value>,
    pub analysis: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Medication {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    pub times: Vec<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub active: bool,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewMedication {
    pub user_id: String,
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    pub times: Vec<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub active: bool,
    pub notes: Option<String>,
}

/// Persistent storage for health records and medications.
pub struct RecordStore {
    conn: Connection,
}

impl RecordStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        info!("opening record store at {}", db_path.display());
        let conn = Connection::open(db_path)
            .map_err(|e| Error::Database(format!("failed to open database: {e}")))?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| Error::Database(format!("failed to set pragmas: {e}")))?;

        let store = Self { conn };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Database(format!("failed to open in-memory database: {e}")))?;

        let store = Self { conn };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS health_records (
                    id TEXT PRIMARY KEY,
                    user_id TEXT NOT NULL,
                    record_type TEXT NOT NULL,
                    date TEXT NOT NULL,
                    source_type TEXT NOT NULL,
                    raw_data TEXT NOT NULL,
                    structured_data TEXT,
                    analysis TEXT,
                    created_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_records_user_created
                    ON health_records(user_id, created_at);

                CREATE TABLE IF NOT EXISTS medications (
                    id TEXT PRIMARY KEY,
                    user_id TEXT NOT NULL,
                    name TEXT NOT NULL,
                    dosage TEXT NOT NULL,
                    frequency TEXT NOT NULL,
                    times TEXT NOT NULL DEFAULT '[]',
                    start_date TEXT NOT NULL,
                    end_date TEXT,
                    active INTEGER NOT NULL DEFAULT 1,
                    notes TEXT
                );

                CREATE INDEX IF NOT EXISTS idx_medications_user_active
                    ON medications(user_id, active);",
            )
            .map_err(|e| Error::Database(format!("migration failed: {e}")))?;
        Ok(())
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Insert one record. Records are never updated or deleted afterwards.
    pub fn insert_record(&self, record: NewHealthRecord) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let structured = record
            .structured_data
            .as_ref()
            .map(|v| v.to_string());
        self.conn
            .execute(
                "INSERT INTO health_records
                 (id, user_id, record_type, date, source_type, raw_data, structured_data, analysis, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    id,
                    record.user_id,
                    record.record_type.as_str(),
                    record.date.to_rfc3339(),
                    record.source_type.as_str(),
                    record.raw_data,
                    structured,
                    record.analysis,
                    Utc::now().to_rfc3339(),
                ],
            )
            .map_err(|e| Error::Database(format!("failed to insert record: {e}")))?;
        Ok(id)
    }

    /// Most recent records, newest first. Position 0 of the returned list
    /// is what users see as record #1.
    pub fn recent_records(&self, user_id: &str, limit: usize) -> Result<Vec<HealthRecord>> {
        self.query_records(
            "SELECT id, user_id, record_type, date, source_type, raw_data, structured_data, analysis, created_at
             FROM health_records
             WHERE user_id = ?1
             ORDER BY rowid DESC
             LIMIT ?2",
            params![user_id, limit as i64],
        )
    }

    /// Records whose occurrence date falls on or after `cutoff`, newest
    /// occurrence first.
    pub fn records_since(
        &self,
        user_id: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<HealthRecord>> {
        self.query_records(
            "SELECT id, user_id, record_type, date, source_type, raw_data, structured_data, analysis, created_at
             FROM health_records
             WHERE user_id = ?1 AND datetime(date) >= datetime(?2)
             ORDER BY datetime(date) DESC",
            params![user_id, cutoff.to_rfc3339()],
        )
    }

    pub fn count_records(&self, user_id: &str) -> Result<i64> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM health_records WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .map_err(|e| Error::Database(format!("failed to count records: {e}")))
    }

    fn query_records(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<HealthRecord>> {
        let mut stmt = self
            .conn
            .prepare(sql)
            .map_err(|e| Error::Database(format!("failed to prepare record query: {e}")))?;

        let rows = stmt
            .query_map(params, |row| {
                let type_raw: String = row.get(2)?;
                let date_raw: String = row.get(3)?;
                let source_raw: String = row.get(4)?;
                let structured_raw: Option<String> = row.get(6)?;
                let created_raw: String = row.get(8)?;
                Ok(HealthRecord {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    record_type: RecordType::parse(&type_raw).unwrap_or(RecordType::Vitals),
                    date: parse_timestamp(&date_raw),
                    source_type: SourceType::parse(&source_raw).unwrap_or(SourceType::Text),
                    raw_data: row.get(5)?,
                    structured_data: structured_raw
                        .and_then(|s| serde_json::from_str(&s).ok()),
                    analysis: row.get(7)?,
                    created_at: parse_timestamp(&created_raw),
                })
            })
            .map_err(|e| Error::Database(format!("failed to load records: {e}")))?;

        let mut records = Vec::new();
        for row in rows {
            records
                .push(row.map_err(|e| Error::Database(format!("failed to read record row: {e}")))?);
        }
        Ok(records)
    }

    pub fn insert_medication(&self, med: NewMedication) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let times = serde_json::to_string(&med.times)
            .map_err(|e| Error::Database(format!("failed to encode times: {e}")))?;
        self.conn
            .execute(
                "INSERT INTO medications
                 (id, user_id, name, dosage, frequency, times, start_date, end_date, active, notes)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    id,
                    med.user_id,
                    med.name,
                    med.dosage,
                    med.frequency,
                    times,
                    med.start_date.to_rfc3339(),
                    med.end_date.map(|d| d.to_rfc3339()),
                    med.active,
                    med.notes,
                ],
            )
            .map_err(|e| Error::Database(format!("failed to insert medication: {e}")))?;
        Ok(id)
    }

    pub fn active_medications(&self, user_id: &str) -> Result<Vec<Medication>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, user_id, name, dosage, frequency, times, start_date, end_date, active, notes
                 FROM medications
                 WHERE user_id = ?1 AND active = 1
                 ORDER BY name",
            )
            .map_err(|e| Error::Database(format!("failed to prepare medication query: {e}")))?;

        let rows = stmt
            .query_map(params![user_id], |row| {
                let times_raw: String = row.get(5)?;
                let start_raw: String = row.get(6)?;
                let end_raw: Option<String> = row.get(7)?;
                Ok(Medication {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    name: row.get(2)?,
                    dosage: row.get(3)?,
                    frequency: row.get(4)?,
                    times: serde_json::from_str(&times_raw).unwrap_or_default(),
                    start_date: parse_timestamp(&start_raw),
                    end_date: end_raw.map(|s| parse_timestamp(&s)),
                    active: row.get(8)?,
                    notes: row.get(9)?,
                })
            })
            .map_err(|e| Error::Database(format!("failed to load medications: {e}")))?;

        let mut meds = Vec::new();
        for row in rows {
            meds.push(
                row.map_err(|e| Error::Database(format!("failed to read medication row: {e}")))?,
            );
        }
        Ok(meds)
    }
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            warn!("failed to parse timestamp '{value}': {e}, falling back to now");
            Utc::now()
        })
}
