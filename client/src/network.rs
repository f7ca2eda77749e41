use crate::events::ClientEvent;
use crate::input::{IntentSequencer, Wanderer};
use crate::state::ObserverState;
use bincode::{deserialize, serialize};
use log::{error, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{Packet, Subscription, Vec3, MAX_DATAGRAM, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::time::interval;

/// Headless observer: mirrors the session and optionally plays by itself
pub struct Client {
    socket: UdpSocket,
    server_addr: SocketAddr,
    nickname: String,

    state: ObserverState,
    events: Subscription<ClientEvent>,
    input: IntentSequencer,

    wanderer: Option<Wanderer>,
    shoot_interval: Option<Duration>,
    last_shot: Instant,
    start_match: bool,
    rng: StdRng,
}

impl Client {
    pub async fn new(
        server_addr: &str,
        nickname: String,
        wander: bool,
        shoot_interval: Option<Duration>,
        start_match: bool,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let server_addr = server_addr.parse()?;
        let state = ObserverState::new();
        let events = state.subscribe();

        Ok(Client {
            socket,
            server_addr,
            nickname,
            state,
            events,
            input: IntentSequencer::new(),
            wanderer: wander.then(|| Wanderer::new(Duration::from_secs(2))),
            shoot_interval,
            last_shot: Instant::now(),
            start_match,
            rng: StdRng::from_entropy(),
        })
    }

    pub fn state(&self) -> &ObserverState {
        &self.state
    }

    async fn connect(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        info!("Connecting to server as '{}'...", self.nickname);
        let packet = Packet::Connect {
            client_version: PROTOCOL_VERSION,
            nickname: self.nickname.as_bytes().to_vec(),
        };
        self.send_packet(&packet).await
    }

    async fn send_packet(&self, packet: &Packet) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        self.socket.send_to(&data, self.server_addr).await?;
        Ok(())
    }

    async fn on_event(&mut self, event: ClientEvent) {
        match event {
            ClientEvent::Connected { is_host, .. } => {
                if is_host && self.start_match {
                    info!("Starting match as host");
                    if let Err(e) = self.send_packet(&Packet::StartMatch).await {
                        error!("Failed to send start request: {}", e);
                    }
                }
            }
            ClientEvent::HealthChanged { health } => info!("Health: {:.0}", health),
            ClientEvent::KillScoreChanged { kills } => info!("Kills: {}", kills),
            ClientEvent::RosterChanged { size } => {
                let names: Vec<&str> = self
                    .state
                    .roster
                    .entries()
                    .map(|e| e.display_name.as_str())
                    .collect();
                info!("Roster ({}): {}", size, names.join(", "));
            }
            ClientEvent::ScoreboardChanged => {
                for line in self.state.scoreboard.values() {
                    info!("  {:<24} K {:>3}  D {:>3}", line.nickname, line.kills, line.deaths);
                }
            }
            ClientEvent::MatchStarted => info!("Match started"),
            ClientEvent::Respawned { .. } | ClientEvent::WorldUpdated { .. } => {}
            ClientEvent::Disconnected { reason } => warn!("Disconnected: {}", reason),
            ClientEvent::SessionEnded => info!("Session ended"),
        }
    }

    /// Drives movement and shooting when automation is enabled
    async fn play(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if self.state.client_id.is_none() || self.state.ended {
            return Ok(());
        }

        let direction = match self.wanderer.as_mut() {
            Some(wanderer) if self.state.local_entity().is_some() => {
                wanderer.direction(&mut self.rng)
            }
            _ => Vec3::ZERO,
        };
        if let Some(packet) = self.input.update_move(direction) {
            self.send_packet(&packet).await?;
        }

        let Some(every) = self.shoot_interval else {
            return Ok(());
        };
        if self.last_shot.elapsed() < every {
            return Ok(());
        }
        let Some(me) = self.state.local_entity().map(|e| e.position) else {
            return Ok(());
        };
        let target = self
            .state
            .others()
            .min_by(|a, b| me.distance(a.position).total_cmp(&me.distance(b.position)))
            .map(|e| e.position + Vec3::UP);
        if let Some(target) = target {
            self.last_shot = Instant::now();
            let aim = self.input.aim(target);
            self.send_packet(&aim).await?;
            let shot = self.input.shoot(target);
            self.send_packet(&shot).await?;
        }
        Ok(())
    }

    /// Tells the server we are going, then clears the local mirror
    ///
    /// A failed send is only logged; the local state is cleared regardless.
    pub async fn leave(&mut self) {
        info!("Leaving session");
        if self.state.client_id.is_some() {
            if let Err(e) = self.send_packet(&Packet::Disconnect).await {
                warn!("Failed to send disconnect: {}", e);
            }
        }
        self.state.teardown_local();
        self.state.ended = true;
    }

    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.connect().await?;

        let mut input_interval = interval(Duration::from_millis(50));
        let mut buffer = [0u8; MAX_DATAGRAM];
        let interrupted = tokio::signal::ctrl_c();
        tokio::pin!(interrupted);

        while !self.state.ended {
            tokio::select! {
                result = self.socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((len, _)) => match deserialize::<Packet>(&buffer[..len]) {
                            Ok(packet) => {
                                self.state.apply_packet(packet);
                            }
                            Err(e) => warn!("Failed to deserialize packet: {}", e),
                        },
                        Err(e) => error!("Error receiving packet: {}", e),
                    }
                },

                _ = input_interval.tick() => {
                    if let Err(e) = self.play().await {
                        error!("Error sending intent: {}", e);
                    }
                },

                _ = &mut interrupted => {
                    self.leave().await;
                    break;
                },
            }

            for event in self.events.drain() {
                self.on_event(event).await;
            }
        }

        Ok(())
    }
}
