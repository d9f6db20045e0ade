pub mod coordinator;
pub mod error;
pub mod queue;

pub use coordinator::{Coordinator, Outcome};
pub use error::ProvisionError;
pub use queue::{ProvisionQueue, ProvisionStatus, TaskState};
