use std::sync::Arc;

use shared::models::Message;
use tokio::sync::watch;

/// A message list that is replaced, never mutated in place. Every update
/// publishes a new `Arc`, so a snapshot held by a reader never changes
/// underneath it.
#[derive(Debug, Clone)]
pub struct MessageCollection {
    tx: Arc<watch::Sender<Arc<Vec<Message>>>>,
}

impl Default for MessageCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageCollection {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Arc::new(Vec::new()));
        Self { tx: Arc::new(tx) }
    }

    /// Current contents.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Vec<Message>> {
        self.tx.borrow().clone()
    }

    /// Receiver woken on every update.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Arc<Vec<Message>>> {
        self.tx.subscribe()
    }

    pub fn replace(&self, messages: Vec<Message>) {
        self.tx.send_replace(Arc::new(messages));
    }

    /// Publishes a new list holding the previous entries plus `message`.
    pub fn append(&self, message: Message) {
        self.tx.send_modify(|current| {
            let mut next = Vec::with_capacity(current.len() + 1);
            next.extend(current.iter().cloned());
            next.push(message);
            *current = Arc::new(next);
        });
    }

    /// Applies `update` to the entry carrying `correlation_token`. Returns
    /// false, publishing nothing, when no entry matches.
    pub fn update_by_token<F>(&self, correlation_token: &str, update: F) -> bool
    where
        F: FnOnce(&mut Message),
    {
        self.tx.send_if_modified(|current| {
            let Some(index) = current
                .iter()
                .position(|message| message.correlation_token == correlation_token)
            else {
                return false;
            };
            let mut next: Vec<Message> = (**current).clone();
            update(&mut next[index]);
            *current = Arc::new(next);
            true
        })
    }

    /// Keeps only the entries matching `keep`. Publishes nothing when every
    /// entry is kept.
    pub fn retain<F>(&self, mut keep: F) -> bool
    where
        F: FnMut(&Message) -> bool,
    {
        self.tx.send_if_modified(|current| {
            let next: Vec<Message> = current.iter().filter(|m| keep(m)).cloned().collect();
            if next.len() == current.len() {
                return false;
            }
            *current = Arc::new(next);
            true
        })
    }

    /// Entry carrying `correlation_token`, if any.
    #[must_use]
    pub fn find_by_token(&self, correlation_token: &str) -> Option<Message> {
        self.tx
            .borrow()
            .iter()
            .find(|message| message.correlation_token == correlation_token)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::{LocalMessageDraft, build_local_message};

    fn message(text: &str) -> Message {
        build_local_message(LocalMessageDraft::new("room-1", text))
    }

    #[test]
    fn append_publishes_a_new_list() {
        let collection = MessageCollection::new();
        collection.append(message("one"));
        let before = collection.snapshot();

        collection.append(message("two"));
        let after = collection.snapshot();

        assert_eq!(before.len(), 1);
        assert_eq!(after.len(), 2);
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(after[0], before[0]);
    }

    #[test]
    fn update_by_token_touches_only_the_match() {
        let collection = MessageCollection::new();
        let first = message("one");
        let token = first.correlation_token.clone();
        collection.append(first);
        collection.append(message("two"));

        assert!(collection.update_by_token(&token, |m| m.pending = false));
        assert!(!collection.update_by_token("missing", |m| m.pending = false));

        let snapshot = collection.snapshot();
        assert!(!snapshot[0].pending);
        assert!(snapshot[1].pending);
        assert_eq!(collection.find_by_token(&token).map(|m| m.pending), Some(false));
    }

    #[tokio::test]
    async fn subscribers_are_woken_on_append() {
        let collection = MessageCollection::new();
        let mut rx = collection.subscribe();

        collection.append(message("one"));

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().len(), 1);
    }
}
