mod common;

mod certificate_tests;
mod fcm_tests;
