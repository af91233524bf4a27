use crate::game::constants::{MAP_SIZE, TICK_MS};
use crate::game::world::World;
use crate::protocol::{self, ClientMessage};
use crate::session::SessionTable;
use anyhow::Context;
use std::env;
use std::net::SocketAddr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::net::UdpSocket;
use tokio::time::MissedTickBehavior;

pub const DEFAULT_PORT: u16 = 9999;

/// Datagrams are read into a fixed buffer; anything longer than the
/// assumed MTU is truncated by the socket and dropped by the codec.
const RECV_BUFFER_LEN: usize = 2048;

const STATS_EVERY_TICKS: u64 = 312;

const TICK_MS_ENV_KEY: &str = "KITTENS_TICK_MS";
const MAP_SIZE_ENV_KEY: &str = "KITTENS_MAP_SIZE";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub tick_ms: u64,
    pub map_size: f64,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let port = env::var("PORT")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(DEFAULT_PORT);
        let tick_ms = env::var(TICK_MS_ENV_KEY)
            .ok()
            .and_then(|value| value.parse().ok())
            .filter(|ms| *ms > 0)
            .unwrap_or(TICK_MS);
        let map_size = env::var(MAP_SIZE_ENV_KEY)
            .ok()
            .and_then(|value| value.parse::<f64>().ok())
            .filter(|size| size.is_finite() && *size > 0.0)
            .unwrap_or(MAP_SIZE);
        Self {
            port,
            tick_ms,
            map_size,
        }
    }
}

pub struct Server {
    socket: UdpSocket,
    state: ServerState,
    tick_ms: u64,
}

/// All mutable game state, owned by the single server task. Ingress
/// handling and the tick pipeline are synchronous methods so the whole
/// loop stays a single logical writer.
struct ServerState {
    world: World,
    sessions: SessionTable,
    ticks: u64,
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

impl Server {
    pub async fn bind(config: &ServerConfig) -> anyhow::Result<Self> {
        let address = format!("0.0.0.0:{}", config.port);
        let socket = UdpSocket::bind(&address)
            .await
            .with_context(|| format!("failed to bind {address}"))?;
        tracing::info!("listening on {address}");
        Ok(Self {
            socket,
            state: ServerState::new(config.map_size),
            tick_ms: config.tick_ms,
        })
    }

    pub async fn run(mut self) -> anyhow::Result<()> {
        let mut interval = tokio::time::interval(Duration::from_millis(self.tick_ms));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut buffer = [0u8; RECV_BUFFER_LEN];
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    for (addr, payload) in self.state.tick(now_millis()) {
                        if let Err(error) = self.socket.send_to(&payload, addr).await {
                            tracing::warn!(?error, %addr, "send failed");
                        }
                    }
                }
                received = self.socket.recv_from(&mut buffer) => {
                    match received {
                        Ok((len, addr)) => {
                            let Some(message) = protocol::decode_datagram(&buffer[..len]) else {
                                continue;
                            };
                            if let Some(reply) = self.state.handle_message(message, addr, now_millis()) {
                                if let Err(error) = self.socket.send_to(&reply, addr).await {
                                    tracing::warn!(?error, %addr, "reply send failed");
                                }
                            }
                        }
                        Err(error) => tracing::warn!(?error, "socket receive failed"),
                    }
                }
            }
        }
    }
}

impl ServerState {
    fn new(map_size: f64) -> Self {
        Self {
            world: World::new(map_size, map_size),
            sessions: SessionTable::new(),
            ticks: 0,
        }
    }

    /// Applies one decoded datagram. Returns a reply payload only for
    /// DISCOVER; everything else is table or mailbox bookkeeping.
    fn handle_message(
        &mut self,
        message: ClientMessage,
        addr: SocketAddr,
        now_ms: i64,
    ) -> Option<Vec<u8>> {
        match message {
            ClientMessage::Discover => {
                tracing::debug!(%addr, "discover");
                Some(protocol::DISCOVER_REPLY.to_vec())
            }
            ClientMessage::Join { uuid } => {
                self.world.spawn_player(&uuid);
                self.sessions.admit_player(&uuid, addr, now_ms);
                tracing::debug!(identity = %uuid, %addr, "player joined");
                None
            }
            ClientMessage::Spectate { uuid } => {
                self.sessions.admit_spectator(&uuid, addr, now_ms);
                tracing::debug!(identity = %uuid, %addr, "spectator joined");
                None
            }
            ClientMessage::Heartbeat { uuid } => {
                self.sessions.touch(&uuid, addr, now_ms);
                None
            }
            ClientMessage::Input { uuid, input } => {
                if self.sessions.touch(&uuid, addr, now_ms) {
                    self.world.apply_input(&uuid, &input);
                }
                None
            }
        }
    }

    /// One full tick: evict idle sessions, advance the world, then build
    /// the per-endpoint broadcast (DEAD notices before snapshots).
    fn tick(&mut self, now_ms: i64) -> Vec<(SocketAddr, Vec<u8>)> {
        for id in self.sessions.reap(now_ms) {
            self.world.remove_player(&id);
        }

        let dead = self.world.tick();
        for id in &dead {
            self.sessions.mark_dead(id);
        }

        let snapshot = self.world.state();
        let text = serde_json::to_vec(&snapshot).unwrap_or_else(|error| {
            tracing::error!(?error, "snapshot encode failed");
            Vec::new()
        });
        let mut binary: Option<Vec<u8>> = None;

        let mut outbound = Vec::with_capacity(self.sessions.len());
        for (id, session) in self.sessions.iter() {
            if session.death_pending {
                outbound.push((session.addr, protocol::DEAD_NOTICE.to_vec()));
                continue;
            }
            if text.is_empty() {
                continue;
            }
            let payload = if id == protocol::BINARY_SNAPSHOT_IDENTITY {
                binary
                    .get_or_insert_with(|| {
                        protocol::encode_snapshot_binary(&snapshot).unwrap_or_else(|| {
                            tracing::warn!("binary snapshot overflows u16, sending text");
                            text.clone()
                        })
                    })
                    .clone()
            } else {
                text.clone()
            };
            outbound.push((session.addr, payload));
        }
        self.sessions.remove_death_pending();

        self.ticks = self.ticks.wrapping_add(1);
        if self.ticks % STATS_EVERY_TICKS == 0 {
            tracing::debug!(
                players = self.world.player_count(),
                sessions = self.sessions.len(),
                food = self.world.food_count(),
                "tick stats"
            );
        }
        outbound
    }
}
