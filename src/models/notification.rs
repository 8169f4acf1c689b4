use super::AccountRef;
use serde::{Deserialize, Serialize};

/// Message for an account holder, delivered after commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub account: AccountRef,
    pub message: String,
}

impl Notification {
    pub fn new(account: AccountRef, message: impl Into<String>) -> Self {
        Self {
            account,
            message: message.into(),
        }
    }
}
