pub mod auth;
pub mod documents;
pub mod health;
pub mod jobs;
pub mod requests;
pub mod types;
pub mod users;
