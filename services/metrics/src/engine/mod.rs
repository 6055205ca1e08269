pub mod classify;
pub mod compute;
pub mod models;
pub mod service;
pub mod timeline;

#[cfg(test)]
pub(crate) mod fixtures;
