pub mod errors;
pub mod message;
pub mod records;
pub mod timestamp;

pub use errors::ErrorResponse;
pub use message::{Message, MessageGroup, MessageKind};
pub use records::{NewMessageRecord, RealtimePayload, StoredMessageRecord};
pub use timestamp::Timestamp;
