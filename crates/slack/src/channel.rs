use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct ChannelHandle(pub String);

impl std::fmt::Display for ChannelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("no channel handle found for contact `{0}`")]
    NotFound(String),
    #[error("directory lookup failed: {0}")]
    Transport(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ChannelError {
    #[error("channel rejected the message: {0}")]
    Rejected(String),
    #[error("channel transport failed: {0}")]
    Transport(String),
    #[error("channel call timed out")]
    Timeout,
}

/// Contact identifier (branch POC email) to channel-native recipient handle.
#[async_trait::async_trait]
pub trait DirectoryLookup: Send + Sync {
    async fn resolve_contact(&self, contact: &str) -> Result<ChannelHandle, LookupError>;
}

/// One-shot message delivery with an optional document link.
#[async_trait::async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn send(
        &self,
        recipient: &ChannelHandle,
        text: &str,
        attachment_url: Option<&str>,
    ) -> Result<(), ChannelError>;
}

/// Directory fake: a fixed email -> handle map.
#[derive(Clone, Default)]
pub struct InMemoryDirectory {
    handles: BTreeMap<String, ChannelHandle>,
}

impl InMemoryDirectory {
    pub fn new(entries: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            handles: entries
                .into_iter()
                .map(|(contact, handle)| (contact, ChannelHandle(handle)))
                .collect(),
        }
    }
}

#[async_trait::async_trait]
impl DirectoryLookup for InMemoryDirectory {
    async fn resolve_contact(&self, contact: &str) -> Result<ChannelHandle, LookupError> {
        self.handles.get(contact).cloned().ok_or_else(|| LookupError::NotFound(contact.to_owned()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentMessage {
    pub recipient: ChannelHandle,
    pub text: String,
    pub attachment_url: Option<String>,
}

/// Channel fake that records every send and can be scripted to fail a fixed
/// number of times before succeeding.
#[derive(Clone, Default)]
pub struct ScriptedChannel {
    state: Arc<Mutex<ScriptedChannelState>>,
}

#[derive(Default)]
struct ScriptedChannelState {
    failures_remaining: u32,
    sent: Vec<SentMessage>,
    attempts: u32,
}

impl ScriptedChannel {
    pub fn reliable() -> Self {
        Self::default()
    }

    pub fn failing_first(failures: u32) -> Self {
        let channel = Self::default();
        channel.lock().failures_remaining = failures;
        channel
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.lock().sent.clone()
    }

    pub fn attempts(&self) -> u32 {
        self.lock().attempts
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ScriptedChannelState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait::async_trait]
impl NotificationChannel for ScriptedChannel {
    async fn send(
        &self,
        recipient: &ChannelHandle,
        text: &str,
        attachment_url: Option<&str>,
    ) -> Result<(), ChannelError> {
        let mut state = self.lock();
        state.attempts += 1;
        if state.failures_remaining > 0 {
            state.failures_remaining -= 1;
            return Err(ChannelError::Transport("scripted transport failure".to_owned()));
        }
        state.sent.push(SentMessage {
            recipient: recipient.clone(),
            text: text.to_owned(),
            attachment_url: attachment_url.map(str::to_owned),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::channel::{
        ChannelHandle, DirectoryLookup, InMemoryDirectory, LookupError, NotificationChannel,
        ScriptedChannel,
    };

    #[tokio::test]
    async fn directory_resolves_known_contacts_only() {
        let directory = InMemoryDirectory::new([(
            "poc.cebu@example.ph".to_owned(),
            "U-CEBU-01".to_owned(),
        )]);

        let handle = directory.resolve_contact("poc.cebu@example.ph").await.expect("known contact");
        assert_eq!(handle, ChannelHandle("U-CEBU-01".to_owned()));

        let error = directory.resolve_contact("ghost@example.ph").await.expect_err("unknown");
        assert_eq!(error, LookupError::NotFound("ghost@example.ph".to_owned()));
    }

    #[tokio::test]
    async fn scripted_channel_fails_then_delivers() {
        let channel = ScriptedChannel::failing_first(2);
        let recipient = ChannelHandle("U-1".to_owned());

        assert!(channel.send(&recipient, "first", None).await.is_err());
        assert!(channel.send(&recipient, "second", None).await.is_err());
        channel.send(&recipient, "third", Some("https://files/doc.pdf")).await.expect("delivers");

        assert_eq!(channel.attempts(), 3);
        let sent = channel.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].text, "third");
        assert_eq!(sent[0].attachment_url.as_deref(), Some("https://files/doc.pdf"));
    }
}
