//! Roster backend client
//!
//! The backend's authoritative roster is derived from chat membership: every
//! chat whose allowed-users list contains the subject is a confirmed
//! relationship. Profiles are fetched separately and used only for
//! display-field enrichment.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use weave_common::CandidateKind;

use crate::{Error, Result};

const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// One entry of the authoritative roster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterEntry {
    /// Identity of the counterpart (user id or group id)
    pub identity: String,
    /// Counterpart kind
    pub kind: CandidateKind,
    /// Chat page the relationship routes to
    pub routing_key: String,
}

/// Display profile of a user or group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub bio: String,
    pub kind: CandidateKind,
}

/// Source of the authoritative roster and display profiles
#[async_trait]
pub trait RosterSource: Send + Sync {
    /// Relationships currently visible to the user via shared chat membership
    async fn get_authoritative_roster(&self, user_id: &str) -> Result<Vec<RosterEntry>>;

    /// All known profiles, for display-field enrichment only
    async fn get_all_profiles(&self) -> Result<Vec<Profile>>;
}

/// Wire shape of one chat as returned by the backend
#[derive(Debug, Deserialize)]
struct ChatRecord {
    #[serde(rename = "pageName")]
    page_name: String,
    #[serde(rename = "allowedUsers", default)]
    allowed_users: Vec<String>,
    #[serde(rename = "groupId", default)]
    group_id: Option<String>,
}

/// Wire shape of a user profile
#[derive(Debug, Deserialize)]
struct UserRecord {
    id: String,
    name: String,
    #[serde(default)]
    bio: String,
}

/// Wire shape of a group profile
#[derive(Debug, Deserialize)]
struct GroupRecord {
    id: String,
    name: String,
    #[serde(default)]
    bio: String,
}

/// HTTP-backed roster client
pub struct HttpRosterClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRosterClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(DEFAULT_TIMEOUT_MS))
            .build()
            .map_err(|e| Error::RosterFetch(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Map a chat the subject belongs to onto a roster entry
    ///
    /// Direct chats are keyed `<a>_<b>`; the counterpart identity is the
    /// other side of the key. Group chats carry an explicit group id.
    fn roster_entry_for(chat: &ChatRecord, user_id: &str) -> Option<RosterEntry> {
        if let Some(group_id) = &chat.group_id {
            return Some(RosterEntry {
                identity: group_id.clone(),
                kind: CandidateKind::Group,
                routing_key: chat.page_name.clone(),
            });
        }

        let (a, b) = chat.page_name.split_once('_')?;
        let counterpart = if a == user_id {
            b
        } else if b == user_id {
            a
        } else {
            // Membership granted under a routing key that doesn't embed the
            // subject; treat the whole page as the counterpart identity
            chat.page_name.as_str()
        };

        Some(RosterEntry {
            identity: counterpart.to_string(),
            kind: CandidateKind::Person,
            routing_key: chat.page_name.clone(),
        })
    }
}

#[async_trait]
impl RosterSource for HttpRosterClient {
    async fn get_authoritative_roster(&self, user_id: &str) -> Result<Vec<RosterEntry>> {
        let url = format!("{}/chats", self.base_url);

        let chats: Vec<ChatRecord> = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::RosterFetch(e.to_string()))?
            .error_for_status()
            .map_err(|e| Error::RosterFetch(e.to_string()))?
            .json()
            .await
            .map_err(|e| Error::RosterFetch(e.to_string()))?;

        let roster: Vec<RosterEntry> = chats
            .iter()
            .filter(|chat| chat.allowed_users.iter().any(|u| u == user_id))
            .filter_map(|chat| Self::roster_entry_for(chat, user_id))
            .collect();

        debug!(
            user_id = %user_id,
            chat_count = chats.len(),
            roster_count = roster.len(),
            "Roster fetched"
        );

        Ok(roster)
    }

    async fn get_all_profiles(&self) -> Result<Vec<Profile>> {
        let users_url = format!("{}/users", self.base_url);
        let groups_url = format!("{}/groups", self.base_url);

        let (users, groups) = tokio::try_join!(
            async {
                self.client
                    .get(&users_url)
                    .send()
                    .await
                    .map_err(|e| Error::RosterFetch(e.to_string()))?
                    .json::<Vec<UserRecord>>()
                    .await
                    .map_err(|e| Error::RosterFetch(e.to_string()))
            },
            async {
                self.client
                    .get(&groups_url)
                    .send()
                    .await
                    .map_err(|e| Error::RosterFetch(e.to_string()))?
                    .json::<Vec<GroupRecord>>()
                    .await
                    .map_err(|e| Error::RosterFetch(e.to_string()))
            }
        )?;

        let mut profiles: Vec<Profile> = users
            .into_iter()
            .map(|u| Profile {
                id: u.id,
                name: u.name,
                bio: u.bio,
                kind: CandidateKind::Person,
            })
            .collect();

        profiles.extend(groups.into_iter().map(|g| Profile {
            id: g.id,
            name: g.name,
            bio: g.bio,
            kind: CandidateKind::Group,
        }));

        Ok(profiles)
    }
}
