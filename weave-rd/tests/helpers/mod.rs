//! Shared test helpers: in-process stubs for the external collaborators

// Each test binary compiles this module separately and uses a subset
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use weave_common::CandidateKind;
use weave_rd::ranking::RawCandidate;
use weave_rd::services::{Profile, ProviderError, RosterEntry, RosterSource, ScoringProvider};

/// What a stub provider should return on the next call
pub enum StubResponse {
    Ok(Vec<RawCandidate>),
    Unavailable,
    Malformed,
}

/// Scripted scoring provider
pub struct StubProvider {
    kind: CandidateKind,
    name: String,
    response: Mutex<StubResponse>,
}

impl StubProvider {
    pub fn new(kind: CandidateKind, name: &str, candidates: Vec<RawCandidate>) -> Self {
        Self {
            kind,
            name: name.to_string(),
            response: Mutex::new(StubResponse::Ok(candidates)),
        }
    }

    pub fn set_response(&self, response: StubResponse) {
        *self.response.lock().unwrap() = response;
    }
}

#[async_trait]
impl ScoringProvider for StubProvider {
    fn kind(&self) -> CandidateKind {
        self.kind
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn rank(
        &self,
        subjects: &[String],
    ) -> Result<HashMap<String, Vec<RawCandidate>>, ProviderError> {
        match &*self.response.lock().unwrap() {
            StubResponse::Ok(candidates) => {
                let mut map = HashMap::new();
                for subject in subjects {
                    map.insert(subject.clone(), candidates.clone());
                }
                Ok(map)
            }
            StubResponse::Unavailable => Err(ProviderError::Unavailable(
                self.name.clone(),
                "stub outage".to_string(),
            )),
            StubResponse::Malformed => Err(ProviderError::Malformed(
                self.name.clone(),
                "stub garbage".to_string(),
            )),
        }
    }
}

/// Scripted roster source
pub struct StubRoster {
    roster: Mutex<Vec<RosterEntry>>,
    profiles: Mutex<Vec<Profile>>,
    fail_roster: Mutex<bool>,
}

impl StubRoster {
    pub fn new(roster: Vec<RosterEntry>, profiles: Vec<Profile>) -> Self {
        Self {
            roster: Mutex::new(roster),
            profiles: Mutex::new(profiles),
            fail_roster: Mutex::new(false),
        }
    }

    pub fn set_roster(&self, roster: Vec<RosterEntry>) {
        *self.roster.lock().unwrap() = roster;
    }

    pub fn set_fail_roster(&self, fail: bool) {
        *self.fail_roster.lock().unwrap() = fail;
    }
}

#[async_trait]
impl RosterSource for StubRoster {
    async fn get_authoritative_roster(&self, _user_id: &str) -> weave_rd::Result<Vec<RosterEntry>> {
        if *self.fail_roster.lock().unwrap() {
            return Err(weave_rd::Error::RosterFetch("stub outage".to_string()));
        }
        Ok(self.roster.lock().unwrap().clone())
    }

    async fn get_all_profiles(&self) -> weave_rd::Result<Vec<Profile>> {
        Ok(self.profiles.lock().unwrap().clone())
    }
}

/// Shorthand for a raw scored candidate
pub fn raw(id: &str, score: Option<f64>) -> RawCandidate {
    RawCandidate {
        id: id.to_string(),
        score,
    }
}

/// Shorthand for a roster entry
pub fn roster_entry(identity: &str, kind: CandidateKind, routing_key: &str) -> RosterEntry {
    RosterEntry {
        identity: identity.to_string(),
        kind,
        routing_key: routing_key.to_string(),
    }
}

/// Shorthand for a profile
pub fn profile(id: &str, name: &str, bio: &str, kind: CandidateKind) -> Profile {
    Profile {
        id: id.to_string(),
        name: name.to_string(),
        bio: bio.to_string(),
        kind,
    }
}
