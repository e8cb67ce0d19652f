// 📤 CSV export - parcel master and enforcement timeline

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::engine::ParcelFigures;
use crate::entities::{EnforcementLogEntry, Parcel};

#[derive(Debug, Serialize)]
struct ParcelRow<'a> {
    #[serde(rename = "ID")]
    id: i64,
    #[serde(rename = "Business")]
    business: &'a str,
    #[serde(rename = "Address")]
    address: &'a str,
    #[serde(rename = "Status")]
    status: &'static str,
    #[serde(rename = "SF")]
    sqft: u32,
    #[serde(rename = "Campus_Share_Pct")]
    share_pct: String,
    #[serde(rename = "Arrears")]
    arrears: String,
    #[serde(rename = "Weekly_Pro_Rata")]
    weekly: String,
    #[serde(rename = "Monthly_Pro_Rata")]
    monthly: String,
    #[serde(rename = "Billed_Weekly")]
    billed_weekly: String,
    #[serde(rename = "Deadline_Status")]
    deadline_status: &'static str,
}

#[derive(Debug, Serialize)]
struct LogRow<'a> {
    #[serde(rename = "Timestamp")]
    timestamp: String,
    #[serde(rename = "Parcel_ID")]
    parcel_id: i64,
    #[serde(rename = "Business")]
    business: &'a str,
    #[serde(rename = "Action")]
    action: &'a str,
    #[serde(rename = "Resulting_Status")]
    resulting_status: &'static str,
    #[serde(rename = "Sent_Via")]
    sent_via: &'a str,
    #[serde(rename = "Response_Due")]
    response_due: String,
    #[serde(rename = "Next_Step")]
    next_step: &'a str,
    #[serde(rename = "Notes")]
    notes: &'a str,
    #[serde(rename = "Digest")]
    digest: &'a str,
}

/// Parcel master: one row per parcel with computed figures
pub fn write_parcels<W: Write>(writer: W, figures: &[ParcelFigures]) -> Result<usize> {
    let mut wtr = csv::Writer::from_writer(writer);

    for f in figures {
        wtr.serialize(ParcelRow {
            id: f.parcel_id,
            business: &f.business_name,
            address: &f.address,
            status: f.status.as_str(),
            sqft: f.sqft,
            share_pct: format!("{:.4}", f.share * 100.0),
            arrears: format!("{:.2}", f.arrears),
            weekly: format!("{:.2}", f.weekly_pro_rata),
            monthly: format!("{:.2}", f.monthly_pro_rata),
            billed_weekly: f.billed_weekly.map(|b| format!("{:.2}", b)).unwrap_or_default(),
            deadline_status: f.deadline_status.as_str(),
        })?;
    }

    wtr.flush()?;
    Ok(figures.len())
}

/// Enforcement timeline, oldest first
pub fn write_log<W: Write>(writer: W, entries: &[EnforcementLogEntry], parcels: &[Parcel]) -> Result<usize> {
    let names: HashMap<i64, &str> = parcels.iter().map(|p| (p.id, p.label())).collect();
    let mut wtr = csv::Writer::from_writer(writer);

    for e in entries {
        wtr.serialize(LogRow {
            timestamp: e.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            parcel_id: e.parcel_id,
            business: names.get(&e.parcel_id).copied().unwrap_or(""),
            action: &e.action,
            resulting_status: e.resulting_status.map(|s| s.as_str()).unwrap_or(""),
            sent_via: e.sent_via.as_deref().unwrap_or(""),
            response_due: e.response_due.map(|d| d.to_string()).unwrap_or_default(),
            next_step: e.next_step.as_deref().unwrap_or(""),
            notes: e.notes.as_deref().unwrap_or(""),
            digest: &e.digest,
        })?;
    }

    wtr.flush()?;
    Ok(entries.len())
}

/// Write `parcels.csv` and `enforcement_log.csv` into `dir`
pub fn export_to_dir(
    dir: &Path,
    figures: &[ParcelFigures],
    entries: &[EnforcementLogEntry],
    parcels: &[Parcel],
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create export directory {:?}", dir))?;

    let parcel_path = dir.join("parcels.csv");
    let file = File::create(&parcel_path).with_context(|| format!("Failed to create {:?}", parcel_path))?;
    write_parcels(file, figures)?;

    let log_path = dir.join("enforcement_log.csv");
    let file = File::create(&log_path).with_context(|| format!("Failed to create {:?}", log_path))?;
    write_log(file, entries, parcels)?;

    Ok(vec![parcel_path, log_path])
}
