pub mod envelope;
pub mod machine;
pub mod reject;
pub mod sweep;

pub use envelope::{AutoApprovePolicy, NewApplication, create_request};
pub use machine::{apply_status_to_all_dates, apply_status_to_date_subset};
pub use reject::reject_request;
pub use sweep::auto_reject_stale;
