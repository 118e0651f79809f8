pub mod reject_request;
pub mod request;
pub mod request_dates;
pub mod status_log;
