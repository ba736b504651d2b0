mod conversations;
mod log;
mod receipts;
mod relations;
mod seq;

pub use conversations::ConversationStore;
pub use log::{MessageLog, SqliteMessageLog};
pub use receipts::ReceiptStore;
pub use relations::RelationStore;
pub use seq::SequenceAllocator;
