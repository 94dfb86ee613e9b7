//! Tornado Cash withdrawal viewer.
//!
//! Terminal front end for [`tcview`]: API-key setup and caching, interactive
//! menus, the recipient table and CSV export.

pub mod config;
pub mod credentials;
pub mod interactive;
pub mod prompt;
pub mod report;
pub mod run;
pub mod setup;
