pub mod catalog;
pub mod document;
pub mod request;
pub mod review;
pub mod user;
