pub mod request;
pub mod request_date;
pub mod status_log;
