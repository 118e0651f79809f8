pub mod idempotency_cache;
pub mod validation;
