//! Slack integration surface for routey.
//!
//! The routing core never talks to Slack directly; it consumes two contracts
//! defined here:
//! - **Directory lookup** (`channel::DirectoryLookup`) - branch contact
//!   email to channel-native user handle
//! - **Notification channel** (`channel::NotificationChannel`) - send one
//!   message with an optional document link
//!
//! `notice` composes the dispatch notification (fallback text plus Block Kit
//! style blocks) from a record and its route decision. Test doubles for both
//! contracts live beside the traits so every crate downstream can exercise
//! delivery paths without a workspace token.

pub mod channel;
pub mod notice;

pub use channel::{
    ChannelError, ChannelHandle, DirectoryLookup, InMemoryDirectory, LookupError,
    NotificationChannel, ScriptedChannel, SentMessage,
};
pub use notice::DispatchNotice;
