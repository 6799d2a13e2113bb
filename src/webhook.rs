//! Webhook related structures

use serde::Deserialize;

pub const EVENT_HEADER: &str = "X-GitHub-Event";
/// The only event type that can trigger a deployment.
pub const PUSH_EVENT: &str = "push";

/// The subset of a GitHub push payload this server looks at.
/// Every field is optional; a payload without `ref` is still classified.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PushPayload {
    #[serde(rename = "ref")]
    pub git_ref: Option<String>,
    pub repository: Option<Repository>,
    pub pusher: Option<Pusher>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Repository {
    pub name: Option<String>,
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Pusher {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl PushPayload {
    /// `owner/name` when present, falling back to the bare name.
    pub fn repository_name(&self) -> Option<&str> {
        let repo = self.repository.as_ref()?;
        repo.full_name.as_deref().or(repo.name.as_deref())
    }

    pub fn pusher_name(&self) -> Option<&str> {
        self.pusher.as_ref()?.name.as_deref()
    }

    pub fn pusher_email(&self) -> Option<&str> {
        self.pusher.as_ref()?.email.as_deref()
    }
}
