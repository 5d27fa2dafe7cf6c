//! Domain layer - core types for channel archives.
//!
//! Messages, configuration and errors, free of any network or
//! filesystem access.

pub mod error;
pub mod models;
pub mod settings;

pub use error::{AppError, Result};
pub use models::{
    format_date, local_date, local_midnight, next_day, parse_date, Attachment, Author,
    ChannelHandle, Embed, EmbedKind, Message,
};
pub use settings::{AppConfig, ChannelPlan, DiscordConfig};
