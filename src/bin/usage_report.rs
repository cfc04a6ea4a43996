//! Print one month's usage submissions as JSON.
//!
//! Usage: cargo run --bin usage_report <meterbot.db> [<year> <month>]
//!
//! Defaults to the current month (UTC). Status goes to stderr so stdout can
//! be piped straight into jq or a file.

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, TimeZone, Utc};
use rusqlite::{Connection, params};
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct ReportRow {
    chat_id: i64,
    room_number: String,
    language: String,
    electricity: f64,
    water: f64,
    submitted_at: DateTime<Utc>,
}

fn month_range(year: i32, month: u32) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = NaiveDate::from_ymd_opt(year, month, 1).expect("Invalid year/month");
    let end = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1).unwrap()
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1).unwrap()
    };
    (
        Utc.from_utc_datetime(&start.and_time(NaiveTime::MIN)),
        Utc.from_utc_datetime(&end.and_time(NaiveTime::MIN)),
    )
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() != 2 && args.len() != 4 {
        eprintln!("Usage: {} <meterbot.db> [<year> <month>]", args[0]);
        eprintln!();
        eprintln!("Print one month's usage submissions as JSON.");
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  meterbot.db   Path to the bot's SQLite database");
        eprintln!("  year, month   Month to report (e.g., 2026 8); defaults to this month");
        std::process::exit(1);
    }

    let db_path = Path::new(&args[1]);
    let (year, month) = if args.len() == 4 {
        (
            args[2].parse().expect("Invalid year"),
            args[3].parse().expect("Invalid month"),
        )
    } else {
        let today = Utc::now().date_naive();
        (today.year(), today.month())
    };

    let (from, to) = month_range(year, month);

    let conn = Connection::open(db_path).expect("Failed to open database");
    let mut stmt = conn
        .prepare(
            "SELECT chat_id, room_number, language, electricity, water, submitted_at
             FROM usage
             WHERE submitted_at >= ?1 AND submitted_at < ?2
             ORDER BY submitted_at",
        )
        .expect("Failed to query usage table");
    let rows: Vec<ReportRow> = stmt
        .query_map(params![from, to], |row| {
            Ok(ReportRow {
                chat_id: row.get(0)?,
                room_number: row.get(1)?,
                language: row.get(2)?,
                electricity: row.get(3)?,
                water: row.get(4)?,
                submitted_at: row.get(5)?,
            })
        })
        .expect("Failed to read usage rows")
        .collect::<Result<_, _>>()
        .expect("Failed to read usage rows");

    eprintln!("{} submission(s) for {:04}-{:02}", rows.len(), year, month);
    let json = serde_json::to_string_pretty(&rows).expect("Failed to serialize");
    println!("{}", json);
}
