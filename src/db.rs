// 🗃️ SQLite store - one canonical schema for parcels, rates, credits and the log
//
// Connections are scoped per operation (`Database::with_connection`) and
// dropped on every exit path. Parcel updates that carry a log entry are
// written in a single SQLite transaction.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::EnforcementConfig;
use crate::entities::{
    Credit, CureTrack, EnforcementLogEntry, EnforcementStep, Parcel, ParcelStatus, RateRecord,
};
use crate::error::{EnforcementError, EnforcementResult};
use crate::seed::campus_parcels;
use crate::store::{check_entry_matches, ParcelStore};

/// Current canonical schema version
pub const SCHEMA_VERSION: i64 = 2;

/// Lender and title research columns, added to `parcels` in version 2
const RESEARCH_COLUMNS: [(&str, &str); 10] = [
    ("county_parcel_id", "TEXT"),
    ("mailing_address", "TEXT"),
    ("lender_name", "TEXT"),
    ("lender_address", "TEXT"),
    ("deed_of_trust_ref", "TEXT"),
    ("lender_contact", "TEXT"),
    ("loan_number", "TEXT"),
    ("title_company", "TEXT"),
    ("address_verified", "INTEGER NOT NULL DEFAULT 0"),
    ("lender_verified", "INTEGER NOT NULL DEFAULT 0"),
];

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER NOT NULL,
            applied_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS parcels (
            id INTEGER PRIMARY KEY,
            address TEXT NOT NULL,
            business_name TEXT NOT NULL DEFAULT '',
            sqft INTEGER NOT NULL CHECK (sqft > 0),
            status TEXT NOT NULL,
            entity_owner TEXT NOT NULL DEFAULT '',
            corporate_target TEXT NOT NULL DEFAULT '',
            past_due_balance REAL NOT NULL DEFAULT 0 CHECK (past_due_balance >= 0),
            billed_weekly_rate REAL,
            delinquent_since TEXT,
            settlement_amount REAL,
            settled_on TEXT,
            certified_mail_tracking TEXT,
            packet_sent TEXT,
            cure_track TEXT NOT NULL DEFAULT 'demand-letter',
            cure_deadline TEXT,
            lien_filing_date TEXT,
            attorney_referral_date TEXT,
            enforcement_step INTEGER NOT NULL DEFAULT 0,
            next_action TEXT,
            next_action_deadline TEXT,
            notes TEXT,
            county_parcel_id TEXT,
            mailing_address TEXT,
            lender_name TEXT,
            lender_address TEXT,
            deed_of_trust_ref TEXT,
            lender_contact TEXT,
            loan_number TEXT,
            title_company TEXT,
            address_verified INTEGER NOT NULL DEFAULT 0,
            lender_verified INTEGER NOT NULL DEFAULT 0,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS rates (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            label TEXT NOT NULL,
            effective_from TEXT UNIQUE NOT NULL,
            weekly_rate REAL NOT NULL CHECK (weekly_rate > 0)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS credits (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            parcel_id INTEGER NOT NULL REFERENCES parcels(id),
            received_on TEXT NOT NULL,
            amount REAL NOT NULL CHECK (amount > 0),
            memo TEXT NOT NULL DEFAULT ''
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS enforcement_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            entry_id TEXT UNIQUE NOT NULL,
            parcel_id INTEGER NOT NULL REFERENCES parcels(id),
            timestamp TEXT NOT NULL,
            action TEXT NOT NULL,
            resulting_status TEXT,
            sent_via TEXT,
            response_due TEXT,
            next_step TEXT,
            notes TEXT,
            digest TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_log_parcel ON enforcement_log(parcel_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_credits_parcel ON credits(parcel_id)",
        [],
    )?;

    Ok(())
}

/// Recorded schema version, 0 when none has been recorded yet
pub fn schema_version(conn: &Connection) -> Result<i64> {
    if !table_exists(conn, "schema_version")? {
        return Ok(0);
    }
    let version: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(version.unwrap_or(0))
}

/// Bring the schema up to `SCHEMA_VERSION`. Returns the version now recorded.
///
/// Refuses databases written by a newer build, and databases whose `parcels`
/// table is the old unversioned layout. That layout cannot be upgraded in
/// place; `import_legacy` copies it into a fresh database instead.
pub fn migrate(conn: &Connection) -> Result<i64> {
    let found = schema_version(conn)?;
    if found > SCHEMA_VERSION {
        bail!(
            "database schema version {} is newer than this build supports ({})",
            found,
            SCHEMA_VERSION
        );
    }

    if found == 0 && has_unversioned_parcels(conn)? {
        bail!(
            "database holds the old unversioned parcel layout; open a fresh database and run `import-legacy` on this file"
        );
    }

    setup_database(conn)?;
    add_research_columns(conn)?;

    if found < SCHEMA_VERSION {
        conn.execute(
            "INSERT INTO schema_version (version, applied_at) VALUES (?1, ?2)",
            params![SCHEMA_VERSION, Utc::now().to_rfc3339()],
        )?;
        info!(from = found, to = SCHEMA_VERSION, "schema migrated");
    }

    Ok(SCHEMA_VERSION)
}

/// Version 1 databases predate the lender research columns
fn add_research_columns(conn: &Connection) -> Result<()> {
    for (name, kind) in RESEARCH_COLUMNS {
        if !column_exists(conn, "parcels", name)? {
            conn.execute(&format!("ALTER TABLE parcels ADD COLUMN {} {}", name, kind), [])?;
            info!(column = name, "parcel column added");
        }
    }
    Ok(())
}

fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        params![name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn has_unversioned_parcels(conn: &Connection) -> Result<bool> {
    Ok(table_exists(conn, "parcels")? && column_exists(conn, "parcels", "pct_campus")?)
}

fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names.iter().any(|n| n == column))
}

/// Layouts in a separate file, e.g. the old `kirby_gate.db` tracker.
/// The file is opened read-only.
pub fn legacy_layouts_at(path: &Path) -> Result<Vec<String>> {
    if !path.is_file() {
        bail!("no database at {:?}", path);
    }
    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .with_context(|| format!("Failed to open {:?}", path))?;
    legacy_layouts(&conn)
}

/// Older, incompatible store layouts found in a database.
///
/// These are reported, never read from. `import_legacy` is the only path
/// that reads the unversioned parcel layout; `targets` is never imported.
pub fn legacy_layouts(conn: &Connection) -> Result<Vec<String>> {
    let mut found = Vec::new();
    if has_unversioned_parcels(conn)? {
        let rows: i64 = conn.query_row("SELECT COUNT(*) FROM parcels", [], |row| row.get(0))?;
        found.push(format!("unversioned 'parcels' table with {} rows", rows));
    }
    if table_exists(conn, "targets")? {
        let rows: i64 = conn.query_row("SELECT COUNT(*) FROM targets", [], |row| row.get(0))?;
        found.push(format!("legacy 'targets' table with {} rows", rows));
    }
    if !found.is_empty() {
        warn!(layouts = ?found, "legacy store layout present");
    }
    Ok(found)
}

// ============================================================================
// ROW MAPPING
// ============================================================================

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

fn date_column(row: &Row, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    let text: Option<String> = row.get(idx)?;
    match text {
        None => Ok(None),
        Some(s) if s.is_empty() => Ok(None),
        Some(s) => NaiveDate::parse_from_str(&s, "%Y-%m-%d")
            .map(Some)
            .map_err(|e| conversion_error(idx, format!("bad date '{}': {}", s, e))),
    }
}

fn required_date_column(row: &Row, idx: usize) -> rusqlite::Result<NaiveDate> {
    date_column(row, idx)?.ok_or_else(|| conversion_error(idx, "missing date".to_string()))
}

fn date_text(date: Option<NaiveDate>) -> Option<String> {
    date.map(|d| d.format("%Y-%m-%d").to_string())
}

const PARCEL_COLUMNS: &str = "id, address, business_name, sqft, status, entity_owner, corporate_target,
     past_due_balance, billed_weekly_rate, delinquent_since, settlement_amount, settled_on,
     certified_mail_tracking, packet_sent, cure_track, cure_deadline, lien_filing_date,
     attorney_referral_date, enforcement_step, next_action, next_action_deadline, notes,
     county_parcel_id, mailing_address, lender_name, lender_address, deed_of_trust_ref,
     lender_contact, loan_number, title_company, address_verified, lender_verified";

fn parcel_from_row(row: &Row) -> rusqlite::Result<Parcel> {
    let status: String = row.get(4)?;
    let cure_track: String = row.get(14)?;
    let step: u8 = row.get(18)?;

    Ok(Parcel {
        id: row.get(0)?,
        address: row.get(1)?,
        business_name: row.get(2)?,
        sqft: row.get(3)?,
        status: status.parse().map_err(|e: String| conversion_error(4, e))?,
        entity_owner: row.get(5)?,
        corporate_target: row.get(6)?,
        past_due_balance: row.get(7)?,
        billed_weekly_rate: row.get(8)?,
        delinquent_since: date_column(row, 9)?,
        settlement_amount: row.get(10)?,
        settled_on: date_column(row, 11)?,
        certified_mail_tracking: row.get(12)?,
        packet_sent: date_column(row, 13)?,
        cure_track: cure_track.parse().map_err(|e: String| conversion_error(14, e))?,
        cure_deadline: date_column(row, 15)?,
        lien_filing_date: date_column(row, 16)?,
        attorney_referral_date: date_column(row, 17)?,
        enforcement_step: EnforcementStep::from_ordinal(step)
            .ok_or_else(|| conversion_error(18, format!("unknown enforcement step {}", step)))?,
        next_action: row.get(19)?,
        next_action_deadline: date_column(row, 20)?,
        notes: row.get(21)?,
        county_parcel_id: row.get(22)?,
        mailing_address: row.get(23)?,
        lender_name: row.get(24)?,
        lender_address: row.get(25)?,
        deed_of_trust_ref: row.get(26)?,
        lender_contact: row.get(27)?,
        loan_number: row.get(28)?,
        title_company: row.get(29)?,
        address_verified: row.get(30)?,
        lender_verified: row.get(31)?,
    })
}

fn log_entry_from_row(row: &Row) -> rusqlite::Result<EnforcementLogEntry> {
    let timestamp: String = row.get(2)?;
    let status: Option<String> = row.get(4)?;

    Ok(EnforcementLogEntry {
        entry_id: row.get(0)?,
        parcel_id: row.get(1)?,
        timestamp: DateTime::parse_from_rfc3339(&timestamp)
            .map_err(|e| conversion_error(2, e.to_string()))?
            .with_timezone(&Utc),
        action: row.get(3)?,
        resulting_status: match status {
            Some(s) => Some(s.parse::<ParcelStatus>().map_err(|e| conversion_error(4, e))?),
            None => None,
        },
        sent_via: row.get(5)?,
        response_due: date_column(row, 6)?,
        next_step: row.get(7)?,
        notes: row.get(8)?,
        digest: row.get(9)?,
    })
}

// ============================================================================
// PARCELS
// ============================================================================

pub fn insert_parcel(conn: &Connection, parcel: &Parcel) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO parcels ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11,
             ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26,
             ?27, ?28, ?29, ?30, ?31, ?32)",
            PARCEL_COLUMNS
        ),
        params![
            parcel.id,
            parcel.address,
            parcel.business_name,
            parcel.sqft,
            parcel.status.as_str(),
            parcel.entity_owner,
            parcel.corporate_target,
            parcel.past_due_balance,
            parcel.billed_weekly_rate,
            date_text(parcel.delinquent_since),
            parcel.settlement_amount,
            date_text(parcel.settled_on),
            parcel.certified_mail_tracking,
            date_text(parcel.packet_sent),
            parcel.cure_track.as_str(),
            date_text(parcel.cure_deadline),
            date_text(parcel.lien_filing_date),
            date_text(parcel.attorney_referral_date),
            parcel.enforcement_step.ordinal(),
            parcel.next_action,
            date_text(parcel.next_action_deadline),
            parcel.notes,
            parcel.county_parcel_id,
            parcel.mailing_address,
            parcel.lender_name,
            parcel.lender_address,
            parcel.deed_of_trust_ref,
            parcel.lender_contact,
            parcel.loan_number,
            parcel.title_company,
            parcel.address_verified,
            parcel.lender_verified,
        ],
    )
    .with_context(|| format!("Failed to insert parcel {}", parcel.id))?;
    Ok(())
}

/// Overwrite every mutable column of a parcel. Returns rows changed (0 or 1).
pub fn update_parcel(conn: &Connection, parcel: &Parcel) -> Result<usize> {
    let changed = conn.execute(
        "UPDATE parcels SET
            address = ?2, business_name = ?3, sqft = ?4, status = ?5,
            entity_owner = ?6, corporate_target = ?7, past_due_balance = ?8,
            billed_weekly_rate = ?9, delinquent_since = ?10, settlement_amount = ?11,
            settled_on = ?12, certified_mail_tracking = ?13, packet_sent = ?14,
            cure_track = ?15, cure_deadline = ?16, lien_filing_date = ?17,
            attorney_referral_date = ?18, enforcement_step = ?19, next_action = ?20,
            next_action_deadline = ?21, notes = ?22, county_parcel_id = ?23,
            mailing_address = ?24, lender_name = ?25, lender_address = ?26,
            deed_of_trust_ref = ?27, lender_contact = ?28, loan_number = ?29,
            title_company = ?30, address_verified = ?31, lender_verified = ?32,
            updated_at = CURRENT_TIMESTAMP
         WHERE id = ?1",
        params![
            parcel.id,
            parcel.address,
            parcel.business_name,
            parcel.sqft,
            parcel.status.as_str(),
            parcel.entity_owner,
            parcel.corporate_target,
            parcel.past_due_balance,
            parcel.billed_weekly_rate,
            date_text(parcel.delinquent_since),
            parcel.settlement_amount,
            date_text(parcel.settled_on),
            parcel.certified_mail_tracking,
            date_text(parcel.packet_sent),
            parcel.cure_track.as_str(),
            date_text(parcel.cure_deadline),
            date_text(parcel.lien_filing_date),
            date_text(parcel.attorney_referral_date),
            parcel.enforcement_step.ordinal(),
            parcel.next_action,
            date_text(parcel.next_action_deadline),
            parcel.notes,
            parcel.county_parcel_id,
            parcel.mailing_address,
            parcel.lender_name,
            parcel.lender_address,
            parcel.deed_of_trust_ref,
            parcel.lender_contact,
            parcel.loan_number,
            parcel.title_company,
            parcel.address_verified,
            parcel.lender_verified,
        ],
    )?;
    Ok(changed)
}

pub fn get_parcel(conn: &Connection, parcel_id: i64) -> Result<Option<Parcel>> {
    let parcel = conn
        .query_row(
            &format!("SELECT {} FROM parcels WHERE id = ?1", PARCEL_COLUMNS),
            params![parcel_id],
            parcel_from_row,
        )
        .optional()?;
    Ok(parcel)
}

pub fn get_all_parcels(conn: &Connection) -> Result<Vec<Parcel>> {
    let mut stmt = conn.prepare(&format!("SELECT {} FROM parcels ORDER BY id", PARCEL_COLUMNS))?;
    let parcels = stmt
        .query_map([], parcel_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(parcels)
}

pub fn count_parcels(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM parcels", [], |row| row.get(0))?;
    Ok(count)
}

// ============================================================================
// RATES & CREDITS
// ============================================================================

pub fn insert_rate(conn: &Connection, rate: &RateRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO rates (label, effective_from, weekly_rate) VALUES (?1, ?2, ?3)",
        params![
            rate.label,
            rate.effective_from.format("%Y-%m-%d").to_string(),
            rate.weekly_rate
        ],
    )
    .with_context(|| format!("Failed to insert rate effective {}", rate.effective_from))?;
    Ok(())
}

pub fn get_rates(conn: &Connection) -> Result<Vec<RateRecord>> {
    let mut stmt =
        conn.prepare("SELECT label, effective_from, weekly_rate FROM rates ORDER BY effective_from")?;
    let rates = stmt
        .query_map([], |row| {
            Ok(RateRecord {
                label: row.get(0)?,
                effective_from: required_date_column(row, 1)?,
                weekly_rate: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rates)
}

pub fn insert_credit(conn: &Connection, credit: &Credit) -> Result<()> {
    conn.execute(
        "INSERT INTO credits (parcel_id, received_on, amount, memo) VALUES (?1, ?2, ?3, ?4)",
        params![
            credit.parcel_id,
            credit.received_on.format("%Y-%m-%d").to_string(),
            credit.amount,
            credit.memo
        ],
    )?;
    Ok(())
}

pub fn get_credits(conn: &Connection, parcel_id: Option<i64>) -> Result<Vec<Credit>> {
    let mut stmt = conn.prepare(
        "SELECT parcel_id, received_on, amount, memo FROM credits
         WHERE ?1 IS NULL OR parcel_id = ?1
         ORDER BY received_on, id",
    )?;
    let credits = stmt
        .query_map(params![parcel_id], |row| {
            Ok(Credit {
                parcel_id: row.get(0)?,
                received_on: required_date_column(row, 1)?,
                amount: row.get(2)?,
                memo: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(credits)
}

// ============================================================================
// ENFORCEMENT LOG
// ============================================================================

pub fn insert_log_entry(conn: &Connection, entry: &EnforcementLogEntry) -> Result<()> {
    conn.execute(
        "INSERT INTO enforcement_log (
            entry_id, parcel_id, timestamp, action, resulting_status,
            sent_via, response_due, next_step, notes, digest
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            entry.entry_id,
            entry.parcel_id,
            entry.timestamp.to_rfc3339(),
            entry.action,
            entry.resulting_status.map(|s| s.as_str()),
            entry.sent_via,
            date_text(entry.response_due),
            entry.next_step,
            entry.notes,
            entry.digest,
        ],
    )
    .with_context(|| format!("Failed to append log entry for parcel {}", entry.parcel_id))?;
    Ok(())
}

/// Log entries, oldest first
pub fn get_log_entries(conn: &Connection, parcel_id: Option<i64>) -> Result<Vec<EnforcementLogEntry>> {
    let mut stmt = conn.prepare(
        "SELECT entry_id, parcel_id, timestamp, action, resulting_status,
                sent_via, response_due, next_step, notes, digest
         FROM enforcement_log
         WHERE ?1 IS NULL OR parcel_id = ?1
         ORDER BY id",
    )?;
    let entries = stmt
        .query_map(params![parcel_id], log_entry_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(entries)
}

pub fn count_log_entries(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM enforcement_log", [], |row| row.get(0))?;
    Ok(count)
}

// ============================================================================
// SEED
// ============================================================================

/// Load the campus parcels and configured rates into an empty database.
/// Returns the number of parcels inserted (0 when already seeded).
pub fn seed_campus(conn: &mut Connection, config: &EnforcementConfig) -> Result<usize> {
    if count_parcels(conn)? > 0 {
        return Ok(0);
    }

    let parcels = campus_parcels();
    let tx = conn.transaction()?;
    for parcel in &parcels {
        insert_parcel(&tx, parcel)?;
    }
    if get_rates(&tx)?.is_empty() {
        for rate in &config.rates {
            insert_rate(&tx, rate)?;
        }
    }
    tx.commit()?;

    info!(parcels = parcels.len(), rates = config.rates.len(), "campus seeded");
    Ok(parcels.len())
}

// ============================================================================
// LEGACY IMPORT
// ============================================================================

/// What `import_legacy` carried over
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LegacyImport {
    pub parcels: usize,
    pub log_entries: usize,
    /// Campus-wide entries and entries for parcels that no longer exist
    pub skipped_log_entries: usize,
    /// Layouts found in the file that were reported but not read
    pub ignored_layouts: Vec<String>,
}

/// Parcel columns read from the unversioned layout. Older files lack some of
/// them; missing columns read as NULL.
const LEGACY_PARCEL_COLUMNS: [&str; 29] = [
    "id",
    "address",
    "business_name",
    "sqft",
    "status",
    "entity_owner",
    "corporate_target",
    "past_due_balance",
    "weekly_rate",
    "certified_mail_tracking",
    "date_packet_sent",
    "cure_deadline",
    "lien_filing_date",
    "attorney_referral_date",
    "enforcement_step",
    "next_action",
    "deadline",
    "notes",
    "county_parcel_id",
    "mailing_address",
    "lender_name",
    "lender_address",
    "deed_of_trust_ref",
    "lender_contact",
    "loan_number",
    "title_company",
    "address_verified",
    "lender_verified",
    "pct_campus",
];

const LEGACY_LOG_COLUMNS: [&str; 10] = [
    "parcel_id",
    "timestamp",
    "action",
    "sent_via",
    "response_due",
    "response_received",
    "next_step",
    "attorney",
    "cost",
    "notes",
];

fn legacy_select(conn: &Connection, table: &str, columns: &[&str], order: &str) -> Result<String> {
    let mut selected = Vec::with_capacity(columns.len());
    for column in columns {
        if column_exists(conn, table, column)? {
            selected.push(column.to_string());
        } else {
            selected.push(format!("NULL AS {}", column));
        }
    }
    Ok(format!("SELECT {} FROM {} ORDER BY {}", selected.join(", "), table, order))
}

fn legacy_text(row: &Row, idx: usize) -> rusqlite::Result<Option<String>> {
    let text: Option<String> = row.get(idx)?;
    Ok(text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()))
}

fn legacy_date(row: &Row, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    match legacy_text(row, idx)? {
        None => Ok(None),
        Some(s) => NaiveDate::parse_from_str(&s, "%Y-%m-%d")
            .map(Some)
            .map_err(|e| conversion_error(idx, format!("bad date '{}': {}", s, e))),
    }
}

fn legacy_parcel_from_row(row: &Row) -> rusqlite::Result<Parcel> {
    let id: i64 = row.get(0)?;
    let sqft: Option<i64> = row.get(3)?;
    let sqft = sqft
        .filter(|sf| *sf > 0)
        .and_then(|sf| u32::try_from(sf).ok())
        .ok_or_else(|| conversion_error(3, format!("parcel {} has no usable square footage", id)))?;
    let status = legacy_text(row, 4)?.unwrap_or_else(|| "VERIFY".to_string());
    let status: ParcelStatus = status.parse().map_err(|e: String| conversion_error(4, e))?;

    let mut parcel = Parcel::new(
        id,
        &legacy_text(row, 1)?.unwrap_or_default(),
        &legacy_text(row, 2)?.unwrap_or_default(),
        sqft,
        status,
    );
    parcel.entity_owner = legacy_text(row, 5)?.unwrap_or_default();
    parcel.corporate_target = legacy_text(row, 6)?.unwrap_or_default();
    parcel.past_due_balance = row.get::<_, Option<f64>>(7)?.unwrap_or(0.0).max(0.0);
    parcel.billed_weekly_rate = row.get::<_, Option<f64>>(8)?.filter(|rate| *rate > 0.0);
    parcel.certified_mail_tracking = legacy_text(row, 9)?;
    parcel.packet_sent = legacy_date(row, 10)?;
    parcel.cure_deadline = legacy_date(row, 11)?;
    parcel.lien_filing_date = legacy_date(row, 12)?;
    parcel.attorney_referral_date = legacy_date(row, 13)?;
    if let Some(step) = legacy_text(row, 14)? {
        parcel.enforcement_step = step.parse().map_err(|e: String| conversion_error(14, e))?;
    }
    parcel.next_action = legacy_text(row, 15)?;
    parcel.next_action_deadline = legacy_date(row, 16)?;
    parcel.notes = legacy_text(row, 17)?;
    parcel.county_parcel_id = legacy_text(row, 18)?;
    parcel.mailing_address = legacy_text(row, 19)?;
    parcel.lender_name = legacy_text(row, 20)?;
    parcel.lender_address = legacy_text(row, 21)?;
    parcel.deed_of_trust_ref = legacy_text(row, 22)?;
    parcel.lender_contact = legacy_text(row, 23)?;
    parcel.loan_number = legacy_text(row, 24)?;
    parcel.title_company = legacy_text(row, 25)?;
    parcel.address_verified = row.get::<_, Option<i64>>(26)?.unwrap_or(0) != 0;
    parcel.lender_verified = row.get::<_, Option<i64>>(27)?.unwrap_or(0) != 0;

    // The unversioned tracker only ran the Declaration's 15-day cure
    if parcel.packet_sent.is_some() {
        parcel.cure_track = CureTrack::Declaration;
    }
    Ok(parcel)
}

/// A legacy log row, or None for campus-wide entries with no parcel
fn legacy_log_from_row(row: &Row) -> rusqlite::Result<Option<EnforcementLogEntry>> {
    let parcel_id: Option<i64> = row.get(0)?;
    let Some(parcel_id) = parcel_id else {
        return Ok(None);
    };

    let stamp = legacy_text(row, 1)?.unwrap_or_default();
    let timestamp = NaiveDateTime::parse_from_str(&stamp, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDate::parse_from_str(&stamp, "%Y-%m-%d").map(|d| d.and_time(NaiveTime::MIN)))
        .map_err(|e| conversion_error(1, format!("bad timestamp '{}': {}", stamp, e)))?
        .and_utc();

    let action = legacy_text(row, 2)?.unwrap_or_else(|| "Legacy entry".to_string());
    let mut entry = EnforcementLogEntry::new(parcel_id, &action);
    if let Some(via) = legacy_text(row, 3)? {
        entry = entry.with_sent_via(&via);
    }
    if let Some(due) = legacy_date(row, 4)? {
        entry = entry.with_response_due(due);
    }
    if let Some(next) = legacy_text(row, 6)? {
        entry = entry.with_next_step(&next);
    }

    let mut notes = Vec::new();
    if let Some(received) = legacy_text(row, 5)? {
        notes.push(format!("Response received {}", received));
    }
    if let Some(attorney) = legacy_text(row, 7)? {
        notes.push(format!("Attorney: {}", attorney));
    }
    if let Some(cost) = row.get::<_, Option<f64>>(8)?.filter(|c| *c > 0.0) {
        notes.push(format!("Cost ${:.2}", cost));
    }
    if let Some(text) = legacy_text(row, 9)? {
        notes.push(text);
    }
    if !notes.is_empty() {
        entry = entry.with_notes(&notes.join("; "));
    }

    Ok(Some(entry.recorded_at(timestamp)))
}

/// Copy the unversioned `parcels` and `enforcement_log` tables from the file at
/// `legacy_path` into `conn`, which must not hold any parcels yet.
///
/// The legacy file is opened read-only. Percent-of-campus figures are dropped
/// (shares are always derived from square footage) and so are the old rate
/// rows, which mixed rates with other constants. A `targets` table is
/// reported in `ignored_layouts` and never read.
pub fn import_legacy(conn: &mut Connection, legacy_path: &Path) -> Result<LegacyImport> {
    if !legacy_path.is_file() {
        bail!("no legacy database at {:?}", legacy_path);
    }
    let existing = count_parcels(conn)?;
    if existing > 0 {
        bail!(
            "target database already holds {} parcels; import into a fresh database",
            existing
        );
    }

    let legacy = Connection::open_with_flags(legacy_path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .with_context(|| format!("Failed to open legacy database {:?}", legacy_path))?;
    let mut report = LegacyImport {
        ignored_layouts: legacy_layouts(&legacy)?
            .into_iter()
            .filter(|layout| !layout.starts_with("unversioned"))
            .collect(),
        ..LegacyImport::default()
    };
    if !has_unversioned_parcels(&legacy)? {
        bail!(
            "{:?} has no unversioned parcel table to import (found: {})",
            legacy_path,
            if report.ignored_layouts.is_empty() {
                "nothing".to_string()
            } else {
                report.ignored_layouts.join(", ")
            }
        );
    }

    let parcels = {
        let sql = legacy_select(&legacy, "parcels", &LEGACY_PARCEL_COLUMNS, "id")?;
        let mut stmt = legacy.prepare(&sql)?;
        let rows = stmt
            .query_map([], legacy_parcel_from_row)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read legacy parcels")?;
        rows
    };

    let entries = if table_exists(&legacy, "enforcement_log")? {
        let sql = legacy_select(&legacy, "enforcement_log", &LEGACY_LOG_COLUMNS, "id")?;
        let mut stmt = legacy.prepare(&sql)?;
        let rows = stmt
            .query_map([], legacy_log_from_row)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read legacy enforcement log")?;
        rows
    } else {
        Vec::new()
    };

    let tx = conn.transaction()?;
    for parcel in &parcels {
        insert_parcel(&tx, parcel)?;
    }
    report.parcels = parcels.len();

    for entry in entries {
        match entry {
            Some(entry) if parcels.iter().any(|p| p.id == entry.parcel_id) => {
                insert_log_entry(&tx, &entry)?;
                report.log_entries += 1;
            }
            _ => report.skipped_log_entries += 1,
        }
    }
    tx.commit()?;

    info!(
        parcels = report.parcels,
        log_entries = report.log_entries,
        skipped = report.skipped_log_entries,
        "legacy database imported"
    );
    Ok(report)
}

// ============================================================================
// DATABASE HANDLE
// ============================================================================

#[derive(Debug, Clone)]
pub struct Database {
    path: PathBuf,
}

impl Database {
    /// Open (creating if needed) and migrate the database at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = Database {
            path: path.as_ref().to_path_buf(),
        };
        db.with_connection(|conn| migrate(conn))
            .with_context(|| format!("Failed to open database {:?}", db.path))?;
        Ok(db)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> rusqlite::Result<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(conn)
    }

    /// Run `f` on a fresh connection; the connection is closed when `f` returns
    pub fn with_connection<T, E, F>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut Connection) -> std::result::Result<T, E>,
        E: From<rusqlite::Error>,
    {
        let mut conn = self.connect()?;
        f(&mut conn)
    }

    pub fn seed(&self, config: &EnforcementConfig) -> Result<usize> {
        self.with_connection(|conn| seed_campus(conn, config))
    }

    pub fn legacy_layouts(&self) -> Result<Vec<String>> {
        self.with_connection(|conn| legacy_layouts(conn))
    }

    /// Import an unversioned tracker file into this (empty) database
    pub fn import_legacy<P: AsRef<Path>>(&self, legacy_path: P) -> Result<LegacyImport> {
        self.with_connection(|conn| import_legacy(conn, legacy_path.as_ref()))
    }

    pub fn log_count(&self) -> Result<i64> {
        self.with_connection(|conn| count_log_entries(conn))
    }

    fn read<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> EnforcementResult<T> {
        self.with_connection(|conn| f(conn).map_err(storage))
    }
}

fn storage(err: anyhow::Error) -> EnforcementError {
    EnforcementError::Storage(format!("{:#}", err))
}

impl ParcelStore for Database {
    fn parcel(&self, parcel_id: i64) -> EnforcementResult<Parcel> {
        self.read(|conn| get_parcel(conn, parcel_id))?
            .ok_or(EnforcementError::ParcelNotFound { parcel_id })
    }

    fn parcels(&self) -> EnforcementResult<Vec<Parcel>> {
        self.read(get_all_parcels)
    }

    fn rates(&self) -> EnforcementResult<Vec<RateRecord>> {
        self.read(get_rates)
    }

    fn credits(&self, parcel_id: Option<i64>) -> EnforcementResult<Vec<Credit>> {
        self.read(|conn| get_credits(conn, parcel_id))
    }

    fn log_entries(&self, parcel_id: Option<i64>) -> EnforcementResult<Vec<EnforcementLogEntry>> {
        self.read(|conn| get_log_entries(conn, parcel_id))
    }

    fn commit(&mut self, parcel: &Parcel, entry: &EnforcementLogEntry) -> EnforcementResult<()> {
        check_entry_matches(parcel.id, entry)?;

        self.with_connection(|conn| {
            let tx = conn.transaction()?;
            if update_parcel(&tx, parcel).map_err(storage)? == 0 {
                return Err(EnforcementError::ParcelNotFound { parcel_id: parcel.id });
            }
            insert_log_entry(&tx, entry).map_err(storage)?;
            tx.commit()?;
            Ok(())
        })
    }

    fn commit_batch(&mut self, changes: &[(Parcel, EnforcementLogEntry)]) -> EnforcementResult<()> {
        for (parcel, entry) in changes {
            check_entry_matches(parcel.id, entry)?;
        }

        self.with_connection(|conn| {
            let tx = conn.transaction()?;
            for (parcel, entry) in changes {
                if update_parcel(&tx, parcel).map_err(storage)? == 0 {
                    return Err(EnforcementError::ParcelNotFound { parcel_id: parcel.id });
                }
                insert_log_entry(&tx, entry).map_err(storage)?;
            }
            tx.commit()?;
            Ok(())
        })
    }

    fn append_log(&mut self, entry: &EnforcementLogEntry) -> EnforcementResult<()> {
        self.with_connection(|conn| {
            if get_parcel(conn, entry.parcel_id).map_err(storage)?.is_none() {
                return Err(EnforcementError::ParcelNotFound {
                    parcel_id: entry.parcel_id,
                });
            }
            insert_log_entry(conn, entry).map_err(storage)
        })
    }

    fn record_credit(&mut self, credit: &Credit, entry: &EnforcementLogEntry) -> EnforcementResult<()> {
        check_entry_matches(credit.parcel_id, entry)?;

        self.with_connection(|conn| {
            let tx = conn.transaction()?;
            if get_parcel(&tx, credit.parcel_id).map_err(storage)?.is_none() {
                return Err(EnforcementError::ParcelNotFound {
                    parcel_id: credit.parcel_id,
                });
            }
            insert_credit(&tx, credit).map_err(storage)?;
            insert_log_entry(&tx, entry).map_err(storage)?;
            tx.commit()?;
            Ok(())
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn seeded() -> (TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(dir.path().join("enforcement.db")).unwrap();
        db.seed(&EnforcementConfig::default()).unwrap();
        (dir, db)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_seed_is_idempotent() {
        let (_dir, db) = seeded();
        assert_eq!(db.seed(&EnforcementConfig::default()).unwrap(), 0);

        let parcels = db.parcels().unwrap();
        assert_eq!(parcels.len(), 21);
        let total: u64 = parcels.iter().map(|p| p.sqft as u64).sum();
        assert_eq!(total, 672_718);
        assert_eq!(db.rates().unwrap().len(), 2);
    }

    #[test]
    fn test_parcel_round_trips_through_sqlite() {
        let (_dir, mut db) = seeded();
        let mut parcel = db.parcel(12).unwrap();
        parcel.packet_sent = Some(date(2026, 2, 10));
        parcel.cure_deadline = Some(date(2026, 3, 12));
        parcel.cure_track = CureTrack::Declaration;
        parcel.certified_mail_tracking = Some("9407 1000".to_string());
        parcel.enforcement_step = EnforcementStep::DemandSent;

        let entry = EnforcementLogEntry::new(12, "Demand packet sent");
        db.commit(&parcel, &entry).unwrap();

        assert_eq!(db.parcel(12).unwrap(), parcel);

        let log = db.log_entries(Some(12)).unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0], entry);
        assert!(log[0].is_intact());
    }

    #[test]
    fn test_missing_parcel() {
        let (_dir, mut db) = seeded();
        assert_eq!(
            db.parcel(404).unwrap_err(),
            EnforcementError::ParcelNotFound { parcel_id: 404 }
        );

        let ghost = Parcel::new(404, "nowhere", "Ghost", 100, ParcelStatus::Verify);
        let entry = EnforcementLogEntry::new(404, "Status VERIFY -> RECON");
        assert!(db.commit(&ghost, &entry).is_err());
        assert!(db.append_log(&entry).is_err());
        assert_eq!(db.log_count().unwrap(), 0);
    }

    #[test]
    fn test_failed_commit_leaves_parcel_untouched() {
        let (_dir, mut db) = seeded();
        let entry = EnforcementLogEntry::new(10, "Status DELINQUENT -> RECON");
        db.append_log(&entry).unwrap();

        // Reusing the entry id violates the UNIQUE constraint after the update ran
        let mut parcel = db.parcel(10).unwrap();
        parcel.status = ParcelStatus::Recon;
        assert!(db.commit(&parcel, &entry).is_err());

        assert_eq!(db.parcel(10).unwrap().status, ParcelStatus::Delinquent);
        assert_eq!(db.log_count().unwrap(), 1);
    }

    #[test]
    fn test_credits_are_scoped_by_parcel() {
        let (_dir, mut db) = seeded();
        let credit = Credit::new(11, date(2026, 1, 15), 2_500.0, "Partial");
        db.record_credit(&credit, &EnforcementLogEntry::new(11, "Credit")).unwrap();

        assert_eq!(db.credits(Some(11)).unwrap(), vec![credit]);
        assert!(db.credits(Some(12)).unwrap().is_empty());
        assert_eq!(db.credits(None).unwrap().len(), 1);
    }

    #[test]
    fn test_schema_version_and_reopen() {
        let (dir, db) = seeded();
        let version = db.with_connection(|conn| schema_version(conn)).unwrap();
        assert_eq!(version, SCHEMA_VERSION);

        let reopened = Database::open(dir.path().join("enforcement.db")).unwrap();
        assert_eq!(reopened.parcels().unwrap().len(), 21);
        let rows: i64 = reopened
            .with_connection(|conn| conn.query_row("SELECT COUNT(*) FROM schema_version", [], |r| r.get(0)))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn test_legacy_targets_table_is_flagged_not_read() {
        let (_dir, db) = seeded();
        db.with_connection(|conn| -> Result<()> {
            conn.execute("CREATE TABLE targets (id INTEGER PRIMARY KEY, name TEXT, owed REAL)", [])?;
            conn.execute("INSERT INTO targets (name, owed) VALUES ('Old Kroger', 1.0)", [])?;
            Ok(())
        })
        .unwrap();

        let layouts = db.legacy_layouts().unwrap();
        assert_eq!(layouts.len(), 1);
        assert!(layouts[0].contains("targets"));
        assert_eq!(db.parcels().unwrap().len(), 21);
    }

    #[test]
    fn test_old_unversioned_layout_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("old.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute(
                "CREATE TABLE parcels (id INTEGER PRIMARY KEY, address TEXT, pct_campus REAL)",
                [],
            )
            .unwrap();
        }

        let err = Database::open(&path).unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.contains("unversioned"));
        assert!(message.contains("import-legacy"));
    }

    #[test]
    fn test_research_fields_round_trip() {
        let (_dir, mut db) = seeded();
        let mut parcel = db.parcel(13).unwrap();
        parcel.county_parcel_id = Some("073013 00012".to_string());
        parcel.lender_name = Some("First Horizon Bank".to_string());
        parcel.deed_of_trust_ref = Some("Instr. 21034567".to_string());
        parcel.address_verified = true;

        db.commit(&parcel, &EnforcementLogEntry::new(13, "Lender research updated"))
            .unwrap();
        let stored = db.parcel(13).unwrap();
        assert_eq!(stored, parcel);
        assert!(!stored.lender_verified);
    }

    #[test]
    fn test_version_one_database_gains_research_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("v1.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE schema_version (version INTEGER NOT NULL, applied_at TEXT NOT NULL);
                 INSERT INTO schema_version VALUES (1, '2026-01-01T00:00:00+00:00');
                 CREATE TABLE parcels (
                    id INTEGER PRIMARY KEY, address TEXT NOT NULL,
                    business_name TEXT NOT NULL DEFAULT '', sqft INTEGER NOT NULL,
                    status TEXT NOT NULL, entity_owner TEXT NOT NULL DEFAULT '',
                    corporate_target TEXT NOT NULL DEFAULT '',
                    past_due_balance REAL NOT NULL DEFAULT 0, billed_weekly_rate REAL,
                    delinquent_since TEXT, settlement_amount REAL, settled_on TEXT,
                    certified_mail_tracking TEXT, packet_sent TEXT,
                    cure_track TEXT NOT NULL DEFAULT 'demand-letter', cure_deadline TEXT,
                    lien_filing_date TEXT, attorney_referral_date TEXT,
                    enforcement_step INTEGER NOT NULL DEFAULT 0, next_action TEXT,
                    next_action_deadline TEXT, notes TEXT,
                    updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
                 );
                 INSERT INTO parcels (id, address, business_name, sqft, status)
                 VALUES (1, '2735 Kirby Pkwy', 'Dunkin', 2375, 'DELINQUENT');",
            )
            .unwrap();
        }

        let db = Database::open(&path).unwrap();
        assert_eq!(db.with_connection(|conn| schema_version(conn)).unwrap(), 2);
        let parcel = db.parcel(1).unwrap();
        assert_eq!(parcel.lender_name, None);
        assert!(!parcel.address_verified);
    }

    /// An unversioned tracker file: old parcel layout, no research columns
    fn legacy_file(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("kirbygate.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE parcels (
                id INTEGER PRIMARY KEY AUTOINCREMENT, address TEXT NOT NULL,
                business_name TEXT, sqft INTEGER, pct_campus REAL,
                status TEXT DEFAULT 'VERIFY', entity_owner TEXT, corporate_target TEXT,
                past_due_balance REAL, weekly_rate REAL, certified_mail_tracking TEXT,
                date_packet_sent TEXT, cure_deadline TEXT, lien_filing_date TEXT,
                attorney_referral_date TEXT, enforcement_step TEXT DEFAULT 'Research',
                next_action TEXT, deadline TEXT, notes TEXT
             );
             CREATE TABLE enforcement_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT, parcel_id INTEGER,
                timestamp TEXT NOT NULL, action TEXT, sent_via TEXT, response_due TEXT,
                response_received TEXT, next_step TEXT, attorney TEXT,
                cost REAL DEFAULT 0, notes TEXT
             );
             CREATE TABLE rates (id INTEGER PRIMARY KEY, label TEXT, value REAL, effective_date TEXT);
             INSERT INTO parcels VALUES (1, '6480 Quince Rd', 'Pointe at Kirby (MedHCP)', 31061, 4.62,
                'DELINQUENT', 'Grace Mgmt', 'MedHCP Corp', 120000.5, 287.1, '9407 1111',
                '2026-02-10', '2026-02-25', NULL, NULL, 'Demand Sent', 'Follow-up',
                '2026-03-01', 'Large parcel');
             INSERT INTO parcels VALUES (2, '2966 Kirby Rd', 'Car Wash (GX18)', 5000, 0.74,
                'VERIFY', 'Unknown', 'TBD', NULL, NULL, NULL, NULL, NULL, NULL, NULL,
                'Research', 'Verify rolls', '2026-03-01', '');
             INSERT INTO enforcement_log (parcel_id, timestamp, action) VALUES
                (NULL, '2026-02-01 09:00:00', 'Tracker created');
             INSERT INTO enforcement_log
                (parcel_id, timestamp, action, sent_via, response_due, next_step, attorney, cost, notes)
                VALUES (1, '2026-02-10 14:30:00', 'Demand sent', 'USPS Certified', '2026-02-25',
                        'Wait for cure', 'Rosenblum', 12.5, 'Declaration cure');
             INSERT INTO enforcement_log (parcel_id, timestamp, action) VALUES
                (7, '2026-02-11 10:00:00', 'Parcel later removed');",
        )
        .unwrap();
        path
    }

    #[test]
    fn test_import_legacy_maps_parcels_and_log() {
        let dir = tempfile::tempdir().unwrap();
        let legacy = legacy_file(&dir);
        let db = Database::open(dir.path().join("enforcement.db")).unwrap();

        let report = db.import_legacy(&legacy).unwrap();
        assert_eq!(report.parcels, 2);
        assert_eq!(report.log_entries, 1);
        assert_eq!(report.skipped_log_entries, 2);
        assert!(report.ignored_layouts.is_empty());

        let pointe = db.parcel(1).unwrap();
        assert_eq!(pointe.status, ParcelStatus::Delinquent);
        assert_eq!(pointe.sqft, 31_061);
        assert_eq!(pointe.past_due_balance, 120_000.5);
        assert_eq!(pointe.billed_weekly_rate, Some(287.1));
        assert_eq!(pointe.packet_sent, Some(date(2026, 2, 10)));
        assert_eq!(pointe.cure_track, CureTrack::Declaration);
        assert_eq!(pointe.enforcement_step, EnforcementStep::DemandSent);
        assert_eq!(pointe.next_action_deadline, Some(date(2026, 3, 1)));
        assert_eq!(pointe.lender_name, None);

        let car_wash = db.parcel(2).unwrap();
        assert_eq!(car_wash.status, ParcelStatus::Verify);
        assert_eq!(car_wash.notes, None);
        assert_eq!(car_wash.cure_track, CureTrack::DemandLetter);

        let log = db.log_entries(Some(1)).unwrap();
        assert_eq!(log.len(), 1);
        assert!(log[0].is_intact());
        assert_eq!(log[0].timestamp.to_rfc3339(), "2026-02-10T14:30:00+00:00");
        assert_eq!(log[0].sent_via.as_deref(), Some("USPS Certified"));
        assert_eq!(log[0].response_due, Some(date(2026, 2, 25)));
        assert_eq!(
            log[0].notes.as_deref(),
            Some("Attorney: Rosenblum; Cost $12.50; Declaration cure")
        );

        // No rates came across; the legacy file is left as it was
        assert!(db.rates().unwrap().is_empty());
        assert_eq!(legacy_layouts_at(&legacy).unwrap().len(), 1);
    }

    #[test]
    fn test_import_legacy_refuses_populated_target() {
        let dir = tempfile::tempdir().unwrap();
        let legacy = legacy_file(&dir);
        let (_db_dir, db) = seeded();

        let err = db.import_legacy(&legacy).unwrap_err();
        assert!(format!("{:#}", err).contains("already holds 21 parcels"));
        assert_eq!(db.parcels().unwrap().len(), 21);
        assert!(db.import_legacy(dir.path().join("missing.db")).is_err());
    }

    #[test]
    fn test_separate_targets_file_is_flagged_not_imported() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = dir.path().join("kirby_gate.db");
        {
            let conn = Connection::open(&tracker).unwrap();
            conn.execute_batch(
                "CREATE TABLE targets (id INTEGER PRIMARY KEY, entity_name TEXT NOT NULL, past_due_balance REAL);
                 INSERT INTO targets (entity_name, past_due_balance) VALUES ('Kroger', 1.0);
                 INSERT INTO targets (entity_name, past_due_balance) VALUES ('Dollar Tree', 2.0);",
            )
            .unwrap();
        }

        let layouts = legacy_layouts_at(&tracker).unwrap();
        assert_eq!(layouts, vec!["legacy 'targets' table with 2 rows".to_string()]);

        let db = Database::open(dir.path().join("enforcement.db")).unwrap();
        let err = db.import_legacy(&tracker).unwrap_err();
        assert!(format!("{:#}", err).contains("targets"));
        assert!(db.parcels().unwrap().is_empty());
    }
}
