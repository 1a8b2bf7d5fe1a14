pub mod db_utils;
pub mod email_filter;
pub mod error_hints;
pub mod notification_store;
pub mod retry;
