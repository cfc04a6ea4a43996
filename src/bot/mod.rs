//! Bot module - collects monthly utility readings over Telegram.

pub mod gateway;
pub mod receipts;
pub mod reminder;
pub mod router;
pub mod session;
pub mod store;
pub mod texts;


pub use gateway::{Delivery, TelegramClient};
pub use session::{PendingReceipts, SessionStore};
pub use store::Store;
pub use texts::Language;

use chrono_tz::Tz;
use std::sync::Arc;

/// An incoming update, reduced to what the conversation flow needs.
#[derive(Debug, Clone)]
pub struct InboundEvent {
    pub chat_id: i64,
    pub text: Option<String>,
    /// Phone number from a shared contact card. Carried through but never
    /// used as identity; everything is keyed on the chat id.
    pub contact: Option<String>,
}

/// Everything the handlers and the background tasks share.
pub struct BotState {
    pub store: Store,
    pub sessions: SessionStore,
    pub pending_receipts: PendingReceipts,
    pub delivery: Arc<dyn Delivery>,
    pub timezone: Tz,
    pub reminder_hour: u32,
}

impl BotState {
    pub fn new(store: Store, delivery: Arc<dyn Delivery>, timezone: Tz, reminder_hour: u32) -> Self {
        Self {
            store,
            sessions: SessionStore::new(),
            pending_receipts: PendingReceipts::new(),
            delivery,
            timezone,
            reminder_hour,
        }
    }
}
