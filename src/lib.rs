//! Learner-progress core for a data structures course: SM-2 flashcard
//! scheduling and prerequisite-gated study path tracking.

pub mod catalog;
pub mod clock;
pub mod completion;
pub mod deck;
pub mod error;
pub mod models;
pub mod progress;
pub mod scheduler;
pub mod store;

pub use catalog::Curriculum;
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::StorageError;
pub use models::{Rating, ReviewRecord};
pub use scheduler::ReviewScheduler;
pub use store::{MemoryStore, SqliteStore, Store};
