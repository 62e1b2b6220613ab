pub mod apns;
pub mod auth;
pub mod certificate;
pub mod connector;
pub mod fcm;
pub mod legacy;
pub mod provider;
