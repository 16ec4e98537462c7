use std::time::SystemTime;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

pub mod billing;
pub mod email;
pub mod game;
pub mod health;
pub mod roster;
pub mod session;
pub mod site_data;
pub mod sse;
pub mod stats;
pub mod user;
pub mod validation;

fn format_system_time(time: SystemTime) -> String {
    OffsetDateTime::from(time)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}
