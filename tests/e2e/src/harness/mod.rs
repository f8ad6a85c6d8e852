//! In-process application harness

mod app;

pub use app::{body_json, request, TestApp, API_KEY, ADMIN_PASSWORD, ADMIN_USER};
