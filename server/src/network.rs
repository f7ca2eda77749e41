//! Server network layer: UDP transport around the authoritative session
//!
//! Three background tasks talk to the main loop over unbounded channels:
//! - the receiver decodes datagrams and forwards them as [`ServerMessage`]s
//! - the sender encodes [`GameMessage`]s and writes them to the socket
//! - the timeout checker drops clients that went silent
//!
//! The main loop owns the [`Session`] exclusively. Every mutation happens
//! there, and whatever the session queued is resolved to socket addresses
//! *before* any client is removed, so a departing client's audience is
//! still known when its messages go out.

use crate::client_manager::{ClientManager, Intent};
use crate::config::SessionConfig;
use crate::error::ServerError;
use crate::outbox::{Delivery, Outgoing};
use crate::session::Session;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{ClientId, Packet, MAX_DATAGRAM, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::interval;

/// Messages sent from network tasks to the main loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { packet: Packet, addr: SocketAddr },
    ClientTimeout { client_id: ClientId },
    Shutdown,
}

/// Messages sent from the main loop to the sender task
#[derive(Debug)]
pub enum GameMessage {
    SendPacket {
        packet: Packet,
        addr: SocketAddr,
    },
    Multicast {
        packet: Packet,
        addrs: Vec<SocketAddr>,
    },
}

/// Maps an audience onto the addresses currently connected
pub fn resolve_delivery(delivery: Delivery, clients: &ClientManager) -> Vec<SocketAddr> {
    match delivery {
        Delivery::To(client_id) => clients.addr_of(client_id).into_iter().collect(),
        Delivery::All | Delivery::AllExcept(_) => clients
            .get_client_addrs()
            .into_iter()
            .filter(|(id, _)| delivery.includes(*id))
            .map(|(_, addr)| addr)
            .collect(),
    }
}

pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    session: Session,
    tick_duration: Duration,
    sender_task: Option<JoinHandle<()>>,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
}

impl Server {
    pub async fn new(addr: &str, config: SessionConfig) -> Result<Self, ServerError> {
        let tick_duration = Duration::from_secs_f32(config.tick_seconds());
        let timeout = Duration::from_secs_f32(config.client_timeout_secs);
        let max_clients = config.max_clients;
        let session = Session::new(config)?;

        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::with_timeout(max_clients, timeout))),
            session,
            tick_duration,
            sender_task: None,
            server_tx,
            server_rx,
            game_tx,
            game_rx,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.socket.local_addr()?)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Handle for stopping the server from another task
    pub fn control(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; MAX_DATAGRAM];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => match deserialize::<Packet>(&buffer[..len]) {
                        Ok(packet) if !packet.is_intent() => {
                            warn!("Dropping authority-only packet from {}", addr);
                        }
                        Ok(packet) => {
                            if server_tx
                                .send(ServerMessage::PacketReceived { packet, addr })
                                .is_err()
                            {
                                debug!("Main loop gone, receiver stopping");
                                break;
                            }
                        }
                        Err(e) => warn!("Failed to deserialize packet from {}: {}", addr, e),
                    },
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        let handle = tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    GameMessage::Multicast { packet, addrs } => {
                        let data = match serialize(&packet) {
                            Ok(data) => data,
                            Err(e) => {
                                error!("Failed to encode packet: {}", e);
                                continue;
                            }
                        };
                        if data.len() > MAX_DATAGRAM {
                            error!(
                                "Dropping {} byte packet, larger than a {} byte datagram",
                                data.len(),
                                MAX_DATAGRAM
                            );
                            continue;
                        }
                        for addr in addrs {
                            if let Err(e) = socket.send_to(&data, addr).await {
                                error!("Failed to send to {}: {}", addr, e);
                            }
                        }
                    }
                }
            }
        });
        self.sender_task = Some(handle);
    }

    fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts()
                };

                for client_id in timed_out {
                    if server_tx
                        .send(ServerMessage::ClientTimeout { client_id })
                        .is_err()
                    {
                        return;
                    }
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), ServerError> {
        let data = serialize(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    /// Resolves audiences against the current client set and queues sends
    async fn dispatch(&self, outgoing: Vec<Outgoing>) {
        if outgoing.is_empty() {
            return;
        }
        let clients = self.clients.read().await;
        for Outgoing { delivery, packet } in outgoing {
            let addrs = resolve_delivery(delivery, &clients);
            if addrs.is_empty() {
                continue;
            }
            if let Err(e) = self.game_tx.send(GameMessage::Multicast { packet, addrs }) {
                error!("Failed to queue packet for sending: {}", e);
            }
        }
    }

    async fn flush(&mut self) {
        let outgoing = self.session.drain_outgoing();
        self.dispatch(outgoing).await;
    }

    async fn find_client(&self, addr: SocketAddr) -> Option<ClientId> {
        self.clients.read().await.find_client_by_addr(addr)
    }

    /// Runs the session side of a departure, flushes, then forgets the sockets
    async fn drop_client(&mut self, client_id: ClientId) {
        let dropped = self.session.disconnect(client_id);
        self.flush().await;

        let mut clients = self.clients.write().await;
        for id in dropped {
            clients.remove_client(id);
        }
    }

    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::Connect {
                client_version,
                nickname,
            } => {
                info!("Client connecting from {} (version: {})", addr, client_version);

                if client_version != PROTOCOL_VERSION {
                    self.send_packet(
                        Packet::Rejected {
                            reason: "Protocol version mismatch".to_string(),
                        },
                        addr,
                    );
                    return;
                }

                // A repeated connect from a known address never replaces the client
                if let Some(existing_id) = self.find_client(addr).await {
                    debug!("Repeated connect from {} (client {})", addr, existing_id);
                    self.clients.write().await.touch(existing_id);
                    if self.session.resend_welcome(existing_id) {
                        self.flush().await;
                    }
                    return;
                }

                let client_id = self.clients.write().await.add_client(addr);
                let Some(client_id) = client_id else {
                    self.send_packet(
                        Packet::Rejected {
                            reason: "Server full".to_string(),
                        },
                        addr,
                    );
                    return;
                };

                let approval = self.session.connect(client_id, &nickname);
                if approval.accepted {
                    info!("Client {} joined as '{}'", client_id, approval.display_name);
                    self.flush().await;
                } else {
                    self.clients.write().await.remove_client(client_id);
                    self.send_packet(
                        Packet::Rejected {
                            reason: "Session closed".to_string(),
                        },
                        addr,
                    );
                }
            }

            Packet::Move { sequence, direction } => {
                self.queue_intent(addr, sequence, Intent::Move { direction }).await;
            }
            Packet::Aim { sequence, point } => {
                self.queue_intent(addr, sequence, Intent::Aim { point }).await;
            }
            Packet::Shoot { sequence, target } => {
                self.queue_intent(addr, sequence, Intent::Shoot { target }).await;
            }

            Packet::StartMatch => {
                if let Some(client_id) = self.find_client(addr).await {
                    self.clients.write().await.touch(client_id);
                    self.session.start_match(client_id);
                    self.flush().await;
                }
            }

            Packet::Disconnect => {
                if let Some(client_id) = self.find_client(addr).await {
                    self.drop_client(client_id).await;
                }
            }

            other => {
                debug!("Ignoring {:?} from {}", other, addr);
            }
        }
    }

    async fn queue_intent(&mut self, addr: SocketAddr, sequence: u32, intent: Intent) {
        let mut clients = self.clients.write().await;
        match clients.find_client_by_addr(addr) {
            Some(client_id) => {
                clients.add_intent(client_id, sequence, intent);
            }
            None => debug!("Intent from unknown address {}", addr),
        }
    }

    async fn run_tick(&mut self) {
        let intents = self.clients.write().await.drain_intents();
        let outgoing = self.session.tick(intents);
        self.dispatch(outgoing).await;

        let tick = self.session.current_tick();
        if tick % 300 == 0 {
            let client_count = self.clients.read().await.len();
            if client_count > 0 {
                debug!(
                    "Tick {}: {} clients, {} entities",
                    tick,
                    client_count,
                    self.session.combat().len()
                );
            }
        }
    }

    /// Tears the session down and forgets every client
    async fn shutdown(&mut self) {
        let dropped = self.session.teardown();
        self.flush().await;
        let mut clients = self.clients.write().await;
        for id in dropped {
            clients.remove_client(id);
        }
    }

    /// Lets the sender drain everything already queued
    async fn finish_sending(&mut self) {
        let (closed, _) = mpsc::unbounded_channel();
        drop(std::mem::replace(&mut self.game_tx, closed));
        if let Some(handle) = self.sender_task.take() {
            if tokio::time::timeout(Duration::from_secs(1), handle).await.is_err() {
                warn!("Sender did not finish flushing in time");
            }
        }
    }

    pub async fn run(&mut self) -> Result<(), ServerError> {
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_checker();

        let mut tick_interval = interval(self.tick_duration);
        let interrupted = tokio::signal::ctrl_c();
        tokio::pin!(interrupted);
        info!("Server started successfully");

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        }
                        Some(ServerMessage::ClientTimeout { client_id }) => {
                            self.drop_client(client_id).await;
                        }
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            self.shutdown().await;
                            break;
                        }
                    }
                }

                _ = tick_interval.tick() => {
                    self.run_tick().await;
                }

                _ = &mut interrupted => {
                    info!("Interrupted, shutting down");
                    self.shutdown().await;
                    break;
                }
            }

            if self.session.is_torn_down() {
                info!("Session ended");
                break;
            }
        }

        self.finish_sending().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{}", port).parse().unwrap()
    }

    #[test]
    fn test_resolve_delivery() {
        let mut clients = ClientManager::new(4);
        let a = clients.add_client(addr(9001)).unwrap();
        let b = clients.add_client(addr(9002)).unwrap();

        assert_eq!(resolve_delivery(Delivery::To(a), &clients), vec![addr(9001)]);
        assert_eq!(resolve_delivery(Delivery::To(b), &clients), vec![addr(9002)]);
        assert!(resolve_delivery(Delivery::To(77), &clients).is_empty());

        let mut all = resolve_delivery(Delivery::All, &clients);
        all.sort();
        assert_eq!(all, vec![addr(9001), addr(9002)]);

        assert_eq!(
            resolve_delivery(Delivery::AllExcept(a), &clients),
            vec![addr(9002)]
        );
    }

    #[test]
    fn test_server_message_creation() {
        let msg = ServerMessage::PacketReceived {
            packet: Packet::StartMatch,
            addr: addr(8080),
        };
        match msg {
            ServerMessage::PacketReceived { packet, addr: a } => {
                assert_eq!(a, addr(8080));
                assert!(matches!(packet, Packet::StartMatch));
            }
            _ => panic!("Unexpected message type"),
        }
    }

    async fn recv_until(
        socket: &UdpSocket,
        mut predicate: impl FnMut(&Packet) -> bool,
    ) -> Option<Packet> {
        let mut buffer = [0u8; MAX_DATAGRAM];
        for _ in 0..32 {
            let (len, _) = timeout(Duration::from_secs(2), socket.recv_from(&mut buffer))
                .await
                .ok()?
                .ok()?;
            let packet: Packet = deserialize(&buffer[..len]).ok()?;
            if predicate(&packet) {
                return Some(packet);
            }
        }
        None
    }

    #[tokio::test]
    async fn test_loopback_connect_and_host_leave() {
        let mut config = SessionConfig::default();
        config.bots.waves = 0;
        let mut server = Server::new("127.0.0.1:0", config).await.unwrap();
        let server_addr = server.local_addr().unwrap();
        let handle = tokio::spawn(async move { server.run().await });

        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let connect = Packet::Connect {
            client_version: PROTOCOL_VERSION,
            nickname: b"Loopback".to_vec(),
        };
        socket
            .send_to(&serialize(&connect).unwrap(), server_addr)
            .await
            .unwrap();

        let connected = recv_until(&socket, |p| matches!(p, Packet::Connected { .. })).await;
        assert!(matches!(
            connected,
            Some(Packet::Connected { client_id: 1, is_host: true })
        ));

        socket
            .send_to(&serialize(&Packet::Disconnect).unwrap(), server_addr)
            .await
            .unwrap();
        let teardown = recv_until(&socket, |p| matches!(p, Packet::SessionTeardown)).await;
        assert!(teardown.is_some());

        let result = timeout(Duration::from_secs(3), handle).await;
        assert!(matches!(result, Ok(Ok(Ok(())))));
    }

    #[tokio::test]
    async fn test_repeated_host_connect_keeps_session() {
        let mut config = SessionConfig::default();
        config.bots.waves = 0;
        let server = Server::new("127.0.0.1:0", config).await.unwrap();
        let server_addr = server.local_addr().unwrap();
        let control = server.control();
        let mut server = server;
        let handle = tokio::spawn(async move { server.run().await });

        let host = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let guest = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let host_connect = serialize(&Packet::Connect {
            client_version: PROTOCOL_VERSION,
            nickname: b"Host".to_vec(),
        })
        .unwrap();

        host.send_to(&host_connect, server_addr).await.unwrap();
        let first = recv_until(&host, |p| matches!(p, Packet::Connected { .. })).await;
        assert!(matches!(
            first,
            Some(Packet::Connected { client_id: 1, is_host: true })
        ));

        let guest_connect = Packet::Connect {
            client_version: PROTOCOL_VERSION,
            nickname: b"Guest".to_vec(),
        };
        guest
            .send_to(&serialize(&guest_connect).unwrap(), server_addr)
            .await
            .unwrap();
        let joined = recv_until(&guest, |p| matches!(p, Packet::Connected { .. })).await;
        assert!(matches!(
            joined,
            Some(Packet::Connected { client_id: 2, is_host: false })
        ));

        // Same datagram again, as a duplicated or late delivery would look
        host.send_to(&host_connect, server_addr).await.unwrap();
        let again = recv_until(&host, |p| {
            matches!(p, Packet::Connected { .. } | Packet::Rejected { .. })
        })
        .await;
        assert!(matches!(
            again,
            Some(Packet::Connected { client_id: 1, is_host: true })
        ));

        host.send_to(&serialize(&Packet::StartMatch).unwrap(), server_addr)
            .await
            .unwrap();
        let seen = recv_until(&guest, |p| {
            matches!(p, Packet::MatchStarted | Packet::SessionTeardown)
        })
        .await;
        assert!(matches!(seen, Some(Packet::MatchStarted)));

        control.send(ServerMessage::Shutdown).unwrap();
        let result = timeout(Duration::from_secs(3), handle).await;
        assert!(matches!(result, Ok(Ok(Ok(())))));
    }

    #[tokio::test]
    async fn test_version_mismatch_is_rejected() {
        let server = Server::new("127.0.0.1:0", SessionConfig::default())
            .await
            .unwrap();
        let server_addr = server.local_addr().unwrap();
        let control = server.control();
        let mut server = server;
        let handle = tokio::spawn(async move { server.run().await });

        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let connect = Packet::Connect {
            client_version: PROTOCOL_VERSION + 1,
            nickname: Vec::new(),
        };
        socket
            .send_to(&serialize(&connect).unwrap(), server_addr)
            .await
            .unwrap();

        let rejected = recv_until(&socket, |p| matches!(p, Packet::Rejected { .. })).await;
        match rejected {
            Some(Packet::Rejected { reason }) => assert_eq!(reason, "Protocol version mismatch"),
            other => panic!("expected rejection, got {:?}", other),
        }

        control.send(ServerMessage::Shutdown).unwrap();
        assert!(timeout(Duration::from_secs(3), handle).await.is_ok());
    }
}
