pub mod client;
pub mod reader;
pub mod subscribe;
pub mod writer;

#[cfg(feature = "test-utils")]
pub mod testutil;

pub use client::GraphClient;
pub use reader::SocialGraphReader;
pub use subscribe::{subscribe_notifications, subscribe_unread_count, Subscription};
pub use writer::SocialGraphWriter;
