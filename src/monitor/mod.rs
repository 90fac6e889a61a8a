pub mod data_source;
pub mod navigation;
pub mod notifications;
pub mod page;
pub mod paginator;
pub mod query_state;
pub mod retry;
pub mod signal;
pub mod types;

pub use data_source::{RunTable, RunsDataSource};
pub use navigation::{MemoryRouter, Navigation, Navigator};
pub use notifications::NotificationSync;
pub use page::{RunsPage, RunsPageDeps};
pub use paginator::Paginator;
pub use query_state::QueryStateSync;
pub use retry::{RetryController, is_retry_eligible};
pub use signal::{Control, Subject, Subscription};
