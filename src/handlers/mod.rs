//! HTTP handlers for pages and the JSON API.

pub mod api;
pub mod page;
pub mod pages;
pub mod validation;

pub use page::{get_page_index, Page};
