//! Deskmate: a console personal assistant.
//!
//! Lines from stdin pass a wake-word gate ([`session`]), are classified by an
//! ordered keyword rule table ([`intent`]) and handled by the [`dispatch`]er,
//! which calls the web and local [`services`] and answers through the
//! [`console`] sink.

pub mod config;
pub mod console;
pub mod dispatch;
pub mod error;
pub mod intent;
pub mod logger;
pub mod reminders;
pub mod services;
pub mod session;
