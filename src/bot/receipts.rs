//! Receipt dispatcher.
//!
//! Users who finish a submission are parked in [`crate::bot::PendingReceipts`]
//! until an operator uploads the payment receipt for their room. A polling
//! task checks the store and forwards each receipt as it appears.

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::bot::BotState;
use crate::bot::gateway::{DeliveryError, Keyboard};

/// Spawn the polling task.
pub fn spawn(state: Arc<BotState>, poll_interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(poll_interval);
        loop {
            ticker.tick().await;
            run_pass(&state).await;
        }
    });
}

/// One pass over the waiting users. Entries whose receipt has not been
/// uploaded yet are left in place for the next pass.
pub async fn run_pass(state: &BotState) {
    for (chat_id, request) in state.pending_receipts.snapshot().await {
        let receipt = match state.store.get_receipt(&request.room_number) {
            Ok(Some(receipt)) => receipt,
            Ok(None) => continue,
            Err(e) => {
                warn!("Receipt lookup for room {} failed: {}", request.room_number, e);
                continue;
            }
        };

        let t = request.language.texts();
        let caption = format!("Receipt for Room: {}", request.room_number);

        let mut result = state
            .delivery
            .send_text(chat_id, t.receipt_ready, Keyboard::None)
            .await;
        if result.is_ok() {
            result = state.delivery.send_photo(chat_id, receipt.image, &caption).await;
        }

        match result {
            Ok(()) => {
                info!("Delivered receipt for room {} to chat {}", request.room_number, chat_id);
            }
            Err(DeliveryError::Unreachable) => {
                info!("Chat {} unreachable; dropping receipt delivery", chat_id);
                if let Err(e) = state.store.deactivate_user(chat_id) {
                    warn!("Failed to deactivate chat {}: {}", chat_id, e);
                }
            }
            Err(e) => {
                warn!("Failed to deliver receipt to chat {}: {}", chat_id, e);
                let notice =
                    format!("{} (Receipt sending failed). Please contact support.", t.error);
                if let Err(e) = state.delivery.send_text(chat_id, &notice, Keyboard::None).await {
                    warn!("Failed to notify chat {} about the failure: {}", chat_id, e);
                }
            }
        }

        // Delivered or failed for good, either way the wait is over.
        state.pending_receipts.remove(chat_id).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::tests::{due_user, make_state, RecordingDelivery, Sent};
    use crate::bot::texts::{ENGLISH, KHMER};
    use crate::bot::Language;
    use chrono::{TimeZone, Utc};

    fn put_receipt(state: &crate::bot::BotState, room: &str, bytes: &[u8]) {
        let receipt = crate::bot::store::Receipt {
            room_number: room.to_string(),
            chat_id: 999,
            image: bytes.to_vec(),
            uploaded_at: Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap(),
        };
        state.store.put_receipt(&receipt).unwrap();
    }

    #[tokio::test]
    async fn test_receipt_delivered_once_uploaded() {
        let delivery = Arc::new(RecordingDelivery::new());
        let state = make_state(delivery.clone());
        state.pending_receipts.register(1, "A101".into(), Language::English).await;
        put_receipt(&state, "A101", b"jpegbytes");

        run_pass(&state).await;

        let sent = delivery.sent_to(1);
        assert_eq!(sent.len(), 2);
        assert!(matches!(&sent[0], Sent::Text { text, .. } if text == ENGLISH.receipt_ready));
        assert!(
            matches!(&sent[1], Sent::Photo { caption, .. } if caption == "Receipt for Room: A101")
        );
        assert!(!state.pending_receipts.contains(1).await);
    }

    #[tokio::test]
    async fn test_waits_until_receipt_exists() {
        let delivery = Arc::new(RecordingDelivery::new());
        let state = make_state(delivery.clone());
        state.pending_receipts.register(1, "A101".into(), Language::English).await;

        run_pass(&state).await;

        assert!(delivery.sent_to(1).is_empty());
        assert!(state.pending_receipts.contains(1).await);
    }

    #[tokio::test]
    async fn test_notice_uses_submission_language() {
        let delivery = Arc::new(RecordingDelivery::new());
        let state = make_state(delivery.clone());
        state.pending_receipts.register(1, "B7".into(), Language::Khmer).await;
        put_receipt(&state, "B7", b"jpegbytes");

        run_pass(&state).await;

        let sent = delivery.sent_to(1);
        assert!(matches!(&sent[0], Sent::Text { text, .. } if text == KHMER.receipt_ready));
    }

    #[tokio::test]
    async fn test_failed_send_notifies_and_gives_up() {
        let delivery = Arc::new(RecordingDelivery::new());
        let state = make_state(delivery.clone());
        state.pending_receipts.register(1, "A101".into(), Language::English).await;
        put_receipt(&state, "A101", b"jpegbytes");
        delivery.break_photos(1);

        run_pass(&state).await;

        let sent = delivery.sent_to(1);
        assert_eq!(sent.len(), 2);
        let expected =
            format!("{} (Receipt sending failed). Please contact support.", ENGLISH.error);
        assert!(matches!(&sent[1], Sent::Text { text, .. } if *text == expected));
        assert!(!state.pending_receipts.contains(1).await);
    }

    #[tokio::test]
    async fn test_unreachable_user_deactivated_without_notice() {
        let delivery = Arc::new(RecordingDelivery::new());
        let state = make_state(delivery.clone());
        let target = Utc.with_ymd_and_hms(2026, 4, 1, 2, 0, 0).unwrap();
        due_user(&state, 1, Language::English, target);
        state.pending_receipts.register(1, "A101".into(), Language::English).await;
        put_receipt(&state, "A101", b"jpegbytes");
        delivery.mark_unreachable(1);

        run_pass(&state).await;

        assert!(delivery.sent_to(1).is_empty());
        assert!(!state.pending_receipts.contains(1).await);
        assert!(!state.store.get_user(1).unwrap().unwrap().active);
    }

    #[tokio::test]
    async fn test_lookup_failure_keeps_entry_for_retry() {
        let delivery = Arc::new(RecordingDelivery::new());
        let state = make_state(delivery.clone());
        state.pending_receipts.register(1, "A101".into(), Language::English).await;
        state.store.drop_receipts_table();

        run_pass(&state).await;

        assert!(delivery.sent_to(1).is_empty());
        assert!(state.pending_receipts.contains(1).await);
    }

    #[tokio::test]
    async fn test_other_waiters_untouched() {
        let delivery = Arc::new(RecordingDelivery::new());
        let state = make_state(delivery.clone());
        state.pending_receipts.register(1, "A101".into(), Language::English).await;
        state.pending_receipts.register(2, "C3".into(), Language::English).await;
        put_receipt(&state, "A101", b"jpegbytes");

        run_pass(&state).await;

        assert!(!state.pending_receipts.contains(1).await);
        assert!(state.pending_receipts.contains(2).await);
        assert!(delivery.sent_to(2).is_empty());
    }
}
