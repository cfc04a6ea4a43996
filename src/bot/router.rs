//! Message routing and the conversation state machine.
//!
//! One handler per session state, dispatched from [`handle_event`]. Commands
//! cut across states: `/start` and `/clear` always replace whatever flow is
//! in progress.

use chrono::Utc;
use regex::Regex;
use std::sync::OnceLock;
use tracing::{info, warn};

use crate::bot::gateway::Keyboard;
use crate::bot::reminder::next_reminder_after;
use crate::bot::session::{Session, SessionState};
use crate::bot::store::UsageRecord;
use crate::bot::texts::{self, ClearReply, Language};
use crate::bot::{BotState, InboundEvent};

/// Commands recognized regardless of session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Clear,
}

/// Match a leading `/start` or `/clear`, tolerating a `@botname` suffix and
/// trailing arguments.
pub fn parse_command(text: &str) -> Option<Command> {
    let first = text.split_whitespace().next()?;
    let name = first.split('@').next().unwrap_or(first);
    match name {
        "/start" => Some(Command::Start),
        "/clear" => Some(Command::Clear),
        _ => None,
    }
}

fn room_pattern() -> &'static Regex {
    static ROOM: OnceLock<Regex> = OnceLock::new();
    ROOM.get_or_init(|| Regex::new(r"^[A-Za-z0-9\- ]+$").unwrap())
}

/// Validate a room label: non-empty after trimming, and only letters,
/// digits, hyphens, and spaces.
pub fn valid_room(text: &str) -> bool {
    let trimmed = text.trim();
    !trimmed.is_empty() && room_pattern().is_match(trimmed)
}

/// Parse a meter reading. Rejects anything that is not a plain non-negative
/// finite number; in particular an empty string is not zero.
pub fn parse_reading(text: &str) -> Option<f64> {
    let value: f64 = text.trim().parse().ok()?;
    if value.is_finite() && value >= 0.0 {
        Some(value)
    } else {
        None
    }
}

/// Route one inbound event.
pub async fn handle_event(state: &BotState, event: InboundEvent) {
    let chat_id = event.chat_id;
    let text = event.text.as_deref().unwrap_or("");

    if let Some(phone) = event.contact.as_deref() {
        info!("Chat {} shared a contact card ({}); identity stays the chat id", chat_id, phone);
    }

    match parse_command(text) {
        Some(Command::Start) => return handle_start(state, chat_id).await,
        Some(Command::Clear) => return handle_clear(state, chat_id).await,
        None => {}
    }

    let Some(session) = state.sessions.get(chat_id).await else {
        // No conversation in flight. Nothing has been chosen yet, so the
        // nudge goes out in the default language.
        send(state, chat_id, texts::ENGLISH.welcome, Keyboard::None).await;
        return;
    };

    match session.state {
        SessionState::AwaitingLanguage => handle_language(state, chat_id, text, session).await,
        SessionState::AwaitingRoomNumber => handle_room_number(state, chat_id, text, session).await,
        SessionState::AwaitingElectricity => handle_electricity(state, chat_id, text, session).await,
        SessionState::AwaitingWater => handle_water(state, chat_id, text, session).await,
        SessionState::AwaitingClearConfirm => handle_clear_confirm(state, chat_id, text, session).await,
    }
}

async fn send(state: &BotState, chat_id: i64, text: &str, keyboard: Keyboard) {
    if let Err(e) = state.delivery.send_text(chat_id, text, keyboard).await {
        warn!("Failed to send to chat {}: {}", chat_id, e);
    }
}

fn language_keyboard() -> Keyboard {
    Keyboard::Reply(vec![vec![
        texts::BUTTON_KHMER.to_string(),
        texts::BUTTON_ENGLISH.to_string(),
    ]])
}

fn clear_keyboard() -> Keyboard {
    Keyboard::Reply(vec![vec![
        texts::BUTTON_CLEAR_YES.to_string(),
        texts::BUTTON_CLEAR_NO.to_string(),
    ]])
}

/// `/start`: register or reactivate the user and open a fresh submission
/// flow, replacing any session in progress.
async fn handle_start(state: &BotState, chat_id: i64) {
    let now = Utc::now();
    let first_reminder = next_reminder_after(now, state.timezone, state.reminder_hour);

    if let Err(e) = state.store.start_user(chat_id, now, first_reminder) {
        warn!("Failed to register chat {}: {}", chat_id, e);
        send(state, chat_id, texts::ENGLISH.error, Keyboard::None).await;
        return;
    }

    // Greet returning users in their stored language.
    let language = match state.store.get_user(chat_id) {
        Ok(Some(user)) => user.language,
        Ok(None) => Language::default(),
        Err(e) => {
            warn!("Failed to load chat {}: {}", chat_id, e);
            Language::default()
        }
    };

    state
        .sessions
        .set(chat_id, Session::new(SessionState::AwaitingLanguage, language))
        .await;
    info!("Submission flow started for chat {}", chat_id);

    let t = language.texts();
    send(state, chat_id, t.start, Keyboard::None).await;
    send(state, chat_id, t.choose_language, language_keyboard()).await;
}

/// `/clear`: ask for confirmation before wiping anything.
async fn handle_clear(state: &BotState, chat_id: i64) {
    let stored = state.store.get_user(chat_id).unwrap_or_else(|e| {
        warn!("Failed to load chat {}: {}", chat_id, e);
        None
    });
    let language = match stored {
        Some(user) => user.language,
        None => state
            .sessions
            .get(chat_id)
            .await
            .map(|s| s.language)
            .unwrap_or_default(),
    };

    state
        .sessions
        .set(chat_id, Session::new(SessionState::AwaitingClearConfirm, language))
        .await;

    send(state, chat_id, language.texts().clear_confirm, clear_keyboard()).await;
}

async fn handle_language(state: &BotState, chat_id: i64, text: &str, mut session: Session) {
    let Some(language) = Language::from_choice(text) else {
        send(
            state,
            chat_id,
            session.language.texts().select_language,
            language_keyboard(),
        )
        .await;
        return;
    };

    // Persist the preference; the session copy drives the rest of the flow
    // even if the write fails.
    if let Err(e) = state.store.set_language(chat_id, language) {
        warn!("Failed to persist language for chat {}: {}", chat_id, e);
    }

    session.language = language;
    session.state = SessionState::AwaitingRoomNumber;
    state.sessions.set(chat_id, session).await;

    send(state, chat_id, language.texts().room_number, Keyboard::Remove).await;
}

async fn handle_room_number(state: &BotState, chat_id: i64, text: &str, mut session: Session) {
    let language = session.language;
    let room = text.trim();

    if !valid_room(room) {
        send(state, chat_id, language.texts().invalid_room, Keyboard::None).await;
        return;
    }

    session.data.room_number = Some(room.to_string());
    session.state = SessionState::AwaitingElectricity;
    state.sessions.set(chat_id, session).await;

    send(state, chat_id, language.texts().electricity, Keyboard::None).await;
}

async fn handle_electricity(state: &BotState, chat_id: i64, text: &str, mut session: Session) {
    let language = session.language;

    let Some(electricity) = parse_reading(text) else {
        send(state, chat_id, language.texts().invalid_number, Keyboard::None).await;
        return;
    };

    session.data.electricity = Some(electricity);
    session.state = SessionState::AwaitingWater;
    state.sessions.set(chat_id, session).await;

    send(state, chat_id, language.texts().water, Keyboard::None).await;
}

/// Final step: validate the water reading, then commit.
async fn handle_water(state: &BotState, chat_id: i64, text: &str, session: Session) {
    let language = session.language;
    let t = language.texts();

    let Some(water) = parse_reading(text) else {
        send(state, chat_id, t.invalid_number, Keyboard::None).await;
        return;
    };

    let (Some(room_number), Some(electricity)) =
        (session.data.room_number, session.data.electricity)
    else {
        // Not reachable through normal transitions. Reset instead of
        // leaving the conversation wedged.
        warn!("Chat {} reached the water step without earlier answers", chat_id);
        state
            .sessions
            .set(chat_id, Session::new(SessionState::AwaitingLanguage, language))
            .await;
        send(state, chat_id, t.error, Keyboard::None).await;
        send(state, chat_id, t.choose_language, language_keyboard()).await;
        return;
    };

    let now = Utc::now();
    let record = UsageRecord {
        chat_id,
        room_number: room_number.clone(),
        language,
        electricity,
        water,
        submitted_at: now,
    };

    if let Err(e) = state.store.add_usage(&record) {
        // Nothing durable happened yet; keep the session so the reading can
        // be re-sent without restarting the whole flow.
        warn!("Failed to save usage for chat {}: {}", chat_id, e);
        send(state, chat_id, t.error, Keyboard::None).await;
        return;
    }

    // The record is durable. Whatever fails from here on, the session rolls
    // forward so a retry cannot write the month twice.
    let next_reminder = next_reminder_after(now, state.timezone, state.reminder_hour);
    if let Err(e) = state.store.complete_submission(chat_id, now, next_reminder) {
        warn!("Failed to update chat {} after submission: {}", chat_id, e);
    }

    state
        .pending_receipts
        .register(chat_id, room_number.clone(), language)
        .await;

    send(state, chat_id, t.data_saved, Keyboard::None).await;
    send(state, chat_id, t.no_receipt_yet, Keyboard::None).await;
    send(state, chat_id, t.thank_you, Keyboard::Remove).await;

    state.sessions.remove(chat_id).await;
    info!("Usage submitted for chat {} (room {})", chat_id, room_number);
}

async fn handle_clear_confirm(state: &BotState, chat_id: i64, text: &str, session: Session) {
    let t = session.language.texts();

    match ClearReply::parse(text) {
        ClearReply::Yes => {
            state.sessions.remove(chat_id).await;
            state.pending_receipts.remove(chat_id).await;

            if let Err(e) = state.store.clear_user(chat_id) {
                warn!("Failed to clear chat {}: {}", chat_id, e);
                send(state, chat_id, t.error, Keyboard::None).await;
                return;
            }

            info!("Cleared data for chat {}", chat_id);
            send(state, chat_id, t.data_cleared, Keyboard::Remove).await;
        }
        ClearReply::No => {
            state.sessions.remove(chat_id).await;
            send(state, chat_id, t.cancelled, Keyboard::Remove).await;
        }
        ClearReply::Other => {
            send(state, chat_id, t.clear_confirm, clear_keyboard()).await;
        }
    }
}
