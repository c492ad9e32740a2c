// agentverse-sync: mirrors an on-chain agent run's conversation locally

pub mod clock;
pub mod errors;
pub mod message;
pub mod session;
pub mod synchronizer;
pub mod view;

pub use clock::{Clock, TokioClock};
pub use errors::{HistoryMismatch, SyncError};
pub use message::{Message, MessageBatch, Role};
pub use session::{RunPhase, RunSession};
pub use synchronizer::{PollOutcome, RunSynchronizer, SyncConfig};
pub use view::{slice_history, ConversationView};
