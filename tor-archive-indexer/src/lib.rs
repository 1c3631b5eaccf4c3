pub mod archive;
pub mod args;
pub mod cache;
pub mod catalog;
pub mod classify;
pub mod crawl;
pub mod error;
pub mod inspect;
pub mod layout;
