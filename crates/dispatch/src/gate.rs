use thiserror::Error;

use routey_core::audit::DeliveryMode;
use routey_core::config::DeliveryConfig;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GateConfigError {
    #[error("test mode is enabled but no test recipient is configured")]
    MissingTestRecipient,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecipientRouting {
    pub contact: String,
    pub mode: DeliveryMode,
}

/// Test/production recipient substitution.
///
/// Built once from injected configuration; there is no caller-facing input
/// that can flip the mode, and the dispatcher has no send path that skips
/// this gate. In test mode every candidate is replaced by the configured
/// test recipient.
#[derive(Clone, Debug)]
pub struct DeliverySafetyGate {
    mode: GateMode,
}

#[derive(Clone, Debug)]
enum GateMode {
    Test { recipient: String },
    Production,
}

impl DeliverySafetyGate {
    pub fn from_config(config: &DeliveryConfig) -> Result<Self, GateConfigError> {
        let mode = if config.test_mode {
            let recipient = config
                .test_recipient
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .ok_or(GateConfigError::MissingTestRecipient)?;
            GateMode::Test { recipient: recipient.to_owned() }
        } else {
            GateMode::Production
        };
        Ok(Self { mode })
    }

    pub fn resolve_recipient(&self, candidate: &str) -> RecipientRouting {
        match &self.mode {
            GateMode::Test { recipient } => {
                RecipientRouting { contact: recipient.clone(), mode: DeliveryMode::Test }
            }
            GateMode::Production => {
                RecipientRouting { contact: candidate.to_owned(), mode: DeliveryMode::Production }
            }
        }
    }
}
