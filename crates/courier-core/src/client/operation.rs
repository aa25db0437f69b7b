//! Logical operation names reported in events and errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Provider resource family an operation acts on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Messages,
    Threads,
    Drafts,
    Folders,
    Events,
    Calendars,
    Contacts,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 7] = [
        ResourceKind::Messages,
        ResourceKind::Threads,
        ResourceKind::Drafts,
        ResourceKind::Folders,
        ResourceKind::Events,
        ResourceKind::Calendars,
        ResourceKind::Contacts,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Messages => "messages",
            ResourceKind::Threads => "threads",
            ResourceKind::Drafts => "drafts",
            ResourceKind::Folders => "folders",
            ResourceKind::Events => "events",
            ResourceKind::Calendars => "calendars",
            ResourceKind::Contacts => "contacts",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name of one provider call, e.g. `messages.list` or `grant.identity`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Operation(String);

impl Operation {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    fn on(kind: ResourceKind, action: &str) -> Self {
        Self(format!("{}.{}", kind, action))
    }

    pub fn list(kind: ResourceKind) -> Self {
        Self::on(kind, "list")
    }

    pub fn find(kind: ResourceKind) -> Self {
        Self::on(kind, "find")
    }

    pub fn create(kind: ResourceKind) -> Self {
        Self::on(kind, "create")
    }

    pub fn update(kind: ResourceKind) -> Self {
        Self::on(kind, "update")
    }

    pub fn delete(kind: ResourceKind) -> Self {
        Self::on(kind, "delete")
    }

    pub fn send_message() -> Self {
        Self::on(ResourceKind::Messages, "send")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Operation {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Operation {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl AsRef<str> for Operation {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
