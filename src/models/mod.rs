pub mod apns;
pub mod fcm;
pub mod flush_result;
pub mod message;
pub mod retry;
pub mod status;
pub mod validation;
