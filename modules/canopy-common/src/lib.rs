pub mod config;
pub mod cursor;
pub mod error;
pub mod tags;
pub mod types;

pub use config::Config;
pub use cursor::Cursor;
pub use error::CanopyError;
pub use tags::{extract_hashtags, topic_display_name, topic_id};
pub use types::*;
