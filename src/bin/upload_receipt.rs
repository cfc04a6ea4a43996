//! Store a payment receipt image for a room.
//!
//! Usage: cargo run --bin upload_receipt <meterbot.db> <room_number> <chat_id> <image.jpg>
//!
//! The bot's receipt dispatcher picks the image up on its next pass and
//! forwards it to the resident waiting on that room. Uploading again for the
//! same room replaces the previous image.

use chrono::Utc;
use rusqlite::{Connection, params};
use std::path::Path;

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() != 5 {
        eprintln!(
            "Usage: {} <meterbot.db> <room_number> <chat_id> <image.jpg>",
            args[0]
        );
        eprintln!();
        eprintln!("Store a payment receipt image for a room.");
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  meterbot.db   Path to the bot's SQLite database");
        eprintln!("  room_number   Room the receipt belongs to (e.g., A101)");
        eprintln!("  chat_id       Chat id of the uploading operator");
        eprintln!("  image.jpg     Receipt image file");
        std::process::exit(1);
    }

    let db_path = Path::new(&args[1]);
    let room_number = args[2].trim();
    let chat_id: i64 = args[3].parse().expect("Invalid chat_id");
    let image_path = Path::new(&args[4]);

    if room_number.is_empty() {
        eprintln!("ERROR: room_number must not be empty.");
        std::process::exit(1);
    }

    let image = std::fs::read(image_path).expect("Failed to read image file");
    println!("Read {} bytes from {:?}", image.len(), image_path);

    let conn = Connection::open(db_path).expect("Failed to open database");
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS receipts (
            room_number TEXT PRIMARY KEY,
            chat_id INTEGER NOT NULL,
            image BLOB NOT NULL,
            uploaded_at TEXT NOT NULL
        )",
    )
    .expect("Failed to ensure receipts table");

    conn.execute(
        "INSERT INTO receipts (room_number, chat_id, image, uploaded_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(room_number) DO UPDATE SET
            chat_id = ?2,
            image = ?3,
            uploaded_at = ?4",
        params![room_number, chat_id, image, Utc::now()],
    )
    .expect("Failed to store receipt");

    println!("Receipt stored for room {}", room_number);
}
