pub mod api;
pub mod client;
pub mod config;
pub mod countdown;
pub mod monitor;
pub mod purchase;
pub mod scheduler;
pub mod snapshot;
pub mod store;
pub mod ui;
pub mod view;

#[cfg(test)]
pub(crate) mod test_helpers;
