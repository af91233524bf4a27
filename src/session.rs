use crate::game::constants::PLAYER_TIMEOUT_MS;
use std::collections::HashMap;
use std::net::SocketAddr;

/// Server-side record binding an identity to its datagram endpoint.
#[derive(Debug, Clone, Copy)]
pub struct Session {
    pub addr: SocketAddr,
    pub last_seen_ms: i64,
    pub spectator: bool,
    /// Set when the identity's snake died this tick; the next broadcast
    /// sends the one-time DEAD notice and removes the session.
    pub death_pending: bool,
}

#[derive(Debug, Default)]
pub struct SessionTable {
    sessions: HashMap<String, Session>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
        }
    }

    pub fn admit_player(&mut self, id: &str, addr: SocketAddr, now_ms: i64) {
        self.admit(id, addr, now_ms, false);
    }

    pub fn admit_spectator(&mut self, id: &str, addr: SocketAddr, now_ms: i64) {
        self.admit(id, addr, now_ms, true);
    }

    fn admit(&mut self, id: &str, addr: SocketAddr, now_ms: i64, spectator: bool) {
        let session = self.sessions.entry(id.to_string()).or_insert(Session {
            addr,
            last_seen_ms: now_ms,
            spectator,
            death_pending: false,
        });
        session.addr = addr;
        session.last_seen_ms = now_ms;
        session.spectator = spectator;
        session.death_pending = false;
    }

    /// Refreshes liveness and rebinds the endpoint (NAT rebinding).
    /// Unknown identities are not created.
    pub fn touch(&mut self, id: &str, addr: SocketAddr, now_ms: i64) -> bool {
        match self.sessions.get_mut(id) {
            Some(session) => {
                session.addr = addr;
                session.last_seen_ms = now_ms;
                true
            }
            None => false,
        }
    }

    pub fn mark_dead(&mut self, id: &str) {
        if let Some(session) = self.sessions.get_mut(id) {
            session.death_pending = true;
        }
    }

    /// Drops every session idle past the timeout. Returns the identities
    /// of removed player sessions so their snakes can be destroyed; timed
    /// out spectators are simply forgotten.
    pub fn reap(&mut self, now_ms: i64) -> Vec<String> {
        let expired: Vec<String> = self
            .sessions
            .iter()
            .filter(|(_, session)| now_ms - session.last_seen_ms > PLAYER_TIMEOUT_MS)
            .map(|(id, _)| id.clone())
            .collect();
        let mut evicted_players = Vec::new();
        for id in expired {
            if let Some(session) = self.sessions.remove(&id) {
                tracing::debug!(identity = %id, spectator = session.spectator, "session timed out");
                if !session.spectator {
                    evicted_players.push(id);
                }
            }
        }
        evicted_players
    }

    pub fn remove_death_pending(&mut self) {
        self.sessions.retain(|_, session| !session.death_pending);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Session)> {
        self.sessions.iter()
    }

    pub fn get(&self, id: &str) -> Option<&Session> {
        self.sessions.get(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
