pub mod documents;
pub mod requests;
pub mod types;
pub mod users;
