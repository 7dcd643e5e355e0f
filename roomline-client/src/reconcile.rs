//! Folds optimistic, fetched and realtime messages into what a room renders.
//!
//! Everything here is a pure function of its inputs and is recomputed on
//! every change; nothing is cached between renders.

use std::collections::HashMap;

use shared::models::{Message, MessageGroup};

/// Deduplicates by correlation token and orders by creation time.
///
/// Inputs are considered in the order `optimistic`, `fetched`, `realtime`.
/// For entries sharing a token, a confirmed entry replaces an unconfirmed one;
/// otherwise the more recently touched entry wins and exact ties keep the
/// earlier one. The survivor keeps the position of the token's first
/// occurrence, and the final sort is stable.
#[must_use]
pub fn reconcile(optimistic: &[Message], fetched: &[Message], realtime: &[Message]) -> Vec<Message> {
    let mut merged: Vec<Message> = Vec::with_capacity(optimistic.len() + fetched.len() + realtime.len());
    let mut slots: HashMap<&str, usize> = HashMap::new();

    for candidate in optimistic.iter().chain(fetched).chain(realtime) {
        match slots.get(candidate.correlation_token.as_str()) {
            Some(&slot) => {
                if supersedes(candidate, &merged[slot]) {
                    merged[slot] = candidate.clone();
                }
            }
            None => {
                slots.insert(candidate.correlation_token.as_str(), merged.len());
                merged.push(candidate.clone());
            }
        }
    }

    merged.sort_by_key(|message| message.created_at);
    merged
}

fn supersedes(candidate: &Message, current: &Message) -> bool {
    match (candidate.is_confirmed(), current.is_confirmed()) {
        (true, false) => true,
        (false, true) => false,
        _ => candidate.last_touched() > current.last_touched(),
    }
}

/// Folds adjacent messages from the same human sender into groups. Agent
/// messages (no user sender) share the `None` key.
#[must_use]
pub fn group_by_sender(messages: &[Message]) -> Vec<MessageGroup> {
    let mut groups: Vec<MessageGroup> = Vec::new();

    for message in messages {
        match groups.last_mut() {
            Some(group) if group.sender_user_id == message.sender_user_id => {
                group.messages.push(message.clone());
            }
            _ => groups.push(MessageGroup {
                sender_user_id: message.sender_user_id.clone(),
                messages: vec![message.clone()],
            }),
        }
    }
    groups
}

/// [`reconcile`] followed by [`group_by_sender`].
#[must_use]
pub fn render(optimistic: &[Message], fetched: &[Message], realtime: &[Message]) -> Vec<MessageGroup> {
    group_by_sender(&reconcile(optimistic, fetched, realtime))
}
