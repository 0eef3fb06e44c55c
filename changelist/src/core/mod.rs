// The changelist pipeline and the admin registration trait

pub mod changelist;
pub mod traits;

// Re-export commonly used items
pub use changelist::{ChangeList, Requester, run_changelist};
pub use traits::ModelAdmin;
