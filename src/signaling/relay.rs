//! Signaling relay.
//!
//! Routes control frames between the sockets of an interview session:
//!
//! ```text
//! ┌─────────────────┐    ┌──────────────────┐    ┌─────────────────┐
//! │ WebSocket       │───▶│ Relay task       │───▶│ ConnectionHandle│
//! │ readers         │    │ (RelayInput via  │    │ writers         │
//! │                 │    │  mpsc, one turn  │    │ (Outbound)      │
//! │                 │    │  per input)      │    │                 │
//! └─────────────────┘    └──────────────────┘    └─────────────────┘
//! ```
//!
//! Every input is handled to completion, registry mutation and outbound sends
//! included, before the next one is taken from the channel. Session state is
//! therefore never observed half-updated and needs no lock.

use std::collections::HashMap;

use log::{debug, info, warn};
use serde_json::Value;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::task::JoinHandle;

use crate::session_management::connection::{Connection, ConnectionHandle, ConnectionId, Role};
use crate::session_management::registry::SessionRegistry;
use crate::signaling::messages::{ClientMessage, ServerMessage, CANDIDATE_TARGET};

/// Work item of the relay task.
#[derive(Debug)]
pub enum RelayInput {
    Connect(ConnectionHandle),
    Message {
        connection_id: ConnectionId,
        message: ClientMessage,
    },
    Disconnect(ConnectionId),
}

/// Session-aware router of signaling frames.
///
/// # Examples
///
/// ```rust,no_run
/// use tokio::sync::mpsc;
/// use vigil::session_management::ConnectionHandle;
/// use vigil::signaling::relay::{Relay, RelayInput};
///
/// #[tokio::main]
/// async fn main() {
///     let (relay_tx, _task) = Relay::new().spawn(256);
///     let (out_tx, _out_rx) = mpsc::unbounded_channel();
///     let handle = ConnectionHandle::new(String::from("c1"), out_tx);
///     relay_tx.send(RelayInput::Connect(handle)).await.unwrap();
/// }
/// ```
#[derive(Debug, Default)]
pub struct Relay {
    registry: SessionRegistry,
    connections: HashMap<ConnectionId, Connection>,
}

impl Relay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn connection(&self, connection_id: &str) -> Option<&Connection> {
        self.connections.get(connection_id)
    }

    /// Registers a new transport connection and greets it with its id.
    pub fn connect(&mut self, handle: ConnectionHandle) {
        info!("[{}] connected", handle.id);
        handle.send(ServerMessage::Welcome {
            client_id: handle.id.clone(),
        });
        self.connections
            .insert(handle.id.clone(), Connection::new(handle));
    }

    /// Dispatches one parsed frame from `connection_id`.
    pub fn handle(&mut self, connection_id: &str, message: ClientMessage) {
        if !self.connections.contains_key(connection_id) {
            debug!("[{}] frame from unknown connection dropped", connection_id);
            return;
        }
        match message {
            ClientMessage::Join { session_id, role } => self.join(connection_id, &session_id, role),
            ClientMessage::Ready { .. } => self.ready(connection_id),
            ClientMessage::Signal { to, signal } => self.signal(connection_id, to.as_deref(), signal),
            ClientMessage::Event { event } => self.event(connection_id, event),
        }
    }

    /// Removes a connection, notifying its counterparts.
    pub fn disconnect(&mut self, connection_id: &str) {
        self.leave(connection_id);
        if self.connections.remove(connection_id).is_some() {
            info!("[{}] disconnected", connection_id);
        }
    }

    /// Consumes inputs until every sender is dropped.
    pub async fn run(mut self, mut inputs: Receiver<RelayInput>) {
        info!("Relay started");
        while let Some(input) = inputs.recv().await {
            match input {
                RelayInput::Connect(handle) => self.connect(handle),
                RelayInput::Message {
                    connection_id,
                    message,
                } => self.handle(&connection_id, message),
                RelayInput::Disconnect(connection_id) => self.disconnect(&connection_id),
            }
        }
        info!(
            "Relay stopped with {} live sessions",
            self.registry.len()
        );
    }

    /// Moves the relay onto its own task.
    pub fn spawn(self, capacity: usize) -> (Sender<RelayInput>, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity);
        let task = tokio::spawn(self.run(rx));
        (tx, task)
    }

    fn join(&mut self, connection_id: &str, session_id: &str, role: Role) {
        if session_id.is_empty() {
            debug!("[{}] join without session id dropped", connection_id);
            return;
        }
        let Some(conn) = self.connections.get(connection_id) else {
            return;
        };
        let handle = conn.handle.clone();
        let rejoin = conn.session_id.as_deref() == Some(session_id) && conn.role == Some(role);
        if conn.session_id.is_some() && !rejoin {
            self.leave(connection_id);
        }
        if let Some(conn) = self.connections.get_mut(connection_id) {
            conn.session_id = Some(session_id.to_string());
            conn.role = Some(role);
        }

        let session = self.registry.get_or_create(session_id);
        let mut evicted = None;
        match role {
            Role::Candidate => {
                if let Some(previous) = session.candidate.take() {
                    if previous.id != connection_id {
                        info!(
                            "[{}] candidate {} replaced by {}",
                            session_id, previous.id, connection_id
                        );
                        previous.send(ServerMessage::CandidateLeft {
                            from: connection_id.to_string(),
                        });
                        previous.close();
                        evicted = Some(previous.id);
                    }
                }
                for viewer_id in session.take_pending() {
                    if session.viewers.contains_key(&viewer_id) {
                        debug!("[{}] delivering queued ready of {}", session_id, viewer_id);
                        handle.send(ServerMessage::ViewerReady { from: viewer_id });
                    }
                }
                session.candidate = Some(handle);
                info!("[{}] candidate {} joined", session_id, connection_id);
            }
            Role::Viewer => {
                session.viewers.insert(connection_id.to_string(), handle);
                info!("[{}] viewer {} joined", session_id, connection_id);
            }
        }
        if let Some(evicted) = evicted {
            if let Some(conn) = self.connections.get_mut(&evicted) {
                conn.detach();
            }
        }
        self.registry.cleanup(session_id);
    }

    fn ready(&mut self, connection_id: &str) {
        let Some(conn) = self.connections.get(connection_id) else {
            return;
        };
        let (Some(session_id), Some(Role::Viewer)) = (conn.session_id.clone(), conn.role) else {
            debug!("[{}] ready from a non-viewer dropped", connection_id);
            return;
        };
        let handle = conn.handle.clone();
        let session = self.registry.get_or_create(&session_id);
        match session.candidate.clone() {
            Some(candidate) => candidate.send(ServerMessage::ViewerReady {
                from: connection_id.to_string(),
            }),
            None => {
                debug!("[{}] no candidate yet, queueing ready of {}", session_id, connection_id);
                session.queue_ready(connection_id);
            }
        }
        handle.send(ServerMessage::ReadyAck);
    }

    fn signal(&mut self, connection_id: &str, to: Option<&str>, signal: Value) {
        if signal.is_null() {
            debug!("[{}] empty signal dropped", connection_id);
            return;
        }
        let Some(session_id) = self.joined_session(connection_id) else {
            return;
        };
        let Some(session) = self.registry.get(&session_id) else {
            return;
        };
        let target = match to {
            None | Some(CANDIDATE_TARGET) => session.candidate.as_ref(),
            Some(viewer_id) => session.viewers.get(viewer_id),
        };
        match target {
            Some(target) => target.send(ServerMessage::Signal {
                from: connection_id.to_string(),
                signal,
            }),
            None => debug!(
                "[{}] signal from {} to {:?} dropped, target not connected",
                session_id, connection_id, to
            ),
        }
    }

    fn event(&mut self, connection_id: &str, event: Value) {
        let Some(conn) = self.connections.get(connection_id) else {
            return;
        };
        let (Some(session_id), Some(role)) = (conn.session_id.clone(), conn.role) else {
            return;
        };
        let Some(session) = self.registry.get(&session_id) else {
            return;
        };
        let payload = ServerMessage::Event {
            from: connection_id.to_string(),
            event,
        };
        match role {
            Role::Candidate => {
                for (viewer_id, viewer) in &session.viewers {
                    if viewer_id != connection_id {
                        viewer.send(payload.clone());
                    }
                }
            }
            Role::Viewer => {
                if let Some(candidate) = &session.candidate {
                    candidate.send(payload);
                }
            }
        }
    }

    /// Detaches a connection from its session and notifies the counterparts.
    fn leave(&mut self, connection_id: &str) {
        let Some(conn) = self.connections.get_mut(connection_id) else {
            return;
        };
        let (Some(session_id), Some(role)) = (conn.session_id.take(), conn.role.take()) else {
            return;
        };
        let Some(session) = self.registry.get_mut(&session_id) else {
            return;
        };
        match role {
            Role::Candidate => {
                if session.is_candidate(connection_id) {
                    session.candidate = None;
                    info!("[{}] candidate {} left", session_id, connection_id);
                    for viewer in session.viewers.values() {
                        viewer.send(ServerMessage::CandidateLeft {
                            from: connection_id.to_string(),
                        });
                    }
                } else {
                    warn!(
                        "[{}] {} left as candidate but was not the session's candidate",
                        session_id, connection_id
                    );
                }
            }
            Role::Viewer => {
                session.remove_viewer(connection_id);
                info!("[{}] viewer {} left", session_id, connection_id);
                if let Some(candidate) = &session.candidate {
                    candidate.send(ServerMessage::ViewerDisconnected {
                        from: connection_id.to_string(),
                    });
                }
            }
        }
        self.registry.cleanup(&session_id);
    }

    fn joined_session(&self, connection_id: &str) -> Option<String> {
        let session_id = self.connections.get(connection_id)?.session_id.clone();
        if session_id.is_none() {
            debug!("[{}] frame before join dropped", connection_id);
        }
        session_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session_management::connection::Outbound;
    use serde_json::json;
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

    struct Client {
        id: String,
        rx: UnboundedReceiver<Outbound>,
    }

    impl Client {
        fn drain(&mut self) -> Vec<Outbound> {
            let mut out = Vec::new();
            while let Ok(frame) = self.rx.try_recv() {
                out.push(frame);
            }
            out
        }

        fn messages(&mut self) -> Vec<ServerMessage> {
            self.drain()
                .into_iter()
                .filter_map(|o| match o {
                    Outbound::Message(m) => Some(m),
                    Outbound::Close => None,
                })
                .collect()
        }
    }

    fn connect(relay: &mut Relay, id: &str) -> Client {
        let (tx, rx) = unbounded_channel();
        relay.connect(ConnectionHandle::new(id.to_string(), tx));
        let mut client = Client {
            id: id.to_string(),
            rx,
        };
        assert_eq!(
            client.messages(),
            vec![ServerMessage::Welcome {
                client_id: id.to_string()
            }]
        );
        client
    }

    fn join(relay: &mut Relay, client: &Client, session: &str, role: Role) {
        relay.handle(
            &client.id,
            ClientMessage::Join {
                session_id: session.to_string(),
                role,
            },
        );
    }

    fn ready(relay: &mut Relay, client: &Client) {
        relay.handle(
            &client.id,
            ClientMessage::Ready {
                session_id: None,
                role: None,
            },
        );
    }

    fn viewer_ready(from: &str) -> ServerMessage {
        ServerMessage::ViewerReady {
            from: from.to_string(),
        }
    }

    #[test]
    fn second_candidate_evicts_first() {
        let mut relay = Relay::new();
        let mut c1 = connect(&mut relay, "c1");
        let mut c2 = connect(&mut relay, "c2");
        let mut v = connect(&mut relay, "v");
        join(&mut relay, &c1, "S", Role::Candidate);
        join(&mut relay, &v, "S", Role::Viewer);
        join(&mut relay, &c2, "S", Role::Candidate);

        assert_eq!(
            c1.drain(),
            vec![
                Outbound::Message(ServerMessage::CandidateLeft {
                    from: String::from("c2")
                }),
                Outbound::Close,
            ]
        );
        assert!(relay.registry().get("S").unwrap().is_candidate("c2"));

        // The evicted socket closing later must not disturb the new candidate.
        relay.disconnect("c1");
        assert!(relay.registry().get("S").unwrap().is_candidate("c2"));
        assert!(v.messages().is_empty());
        assert!(c2.messages().is_empty());
    }

    #[test]
    fn ready_before_candidate_is_delivered_once_on_join() {
        let mut relay = Relay::new();
        let mut a = connect(&mut relay, "A");
        let mut c = connect(&mut relay, "C");
        join(&mut relay, &a, "S", Role::Viewer);
        ready(&mut relay, &a);
        assert_eq!(a.messages(), vec![ServerMessage::ReadyAck]);
        assert_eq!(relay.registry().get("S").unwrap().pending_ready, vec!["A"]);

        join(&mut relay, &c, "S", Role::Candidate);
        assert_eq!(c.messages(), vec![viewer_ready("A")]);
        assert!(relay.registry().get("S").unwrap().pending_ready.is_empty());

        // A second candidate join does not replay it.
        join(&mut relay, &c, "S", Role::Candidate);
        assert!(c.messages().is_empty());
    }

    #[test]
    fn pending_ready_is_delivered_in_arrival_order() {
        let mut relay = Relay::new();
        let b = connect(&mut relay, "b");
        let a = connect(&mut relay, "a");
        let gone = connect(&mut relay, "gone");
        let mut c = connect(&mut relay, "c");
        for viewer in [&b, &gone, &a] {
            join(&mut relay, viewer, "S", Role::Viewer);
            ready(&mut relay, viewer);
        }
        ready(&mut relay, &b);
        relay.disconnect("gone");

        join(&mut relay, &c, "S", Role::Candidate);
        assert_eq!(c.messages(), vec![viewer_ready("b"), viewer_ready("a")]);
    }

    #[test]
    fn ready_with_candidate_present_is_immediate() {
        let mut relay = Relay::new();
        let mut c = connect(&mut relay, "c");
        let mut v = connect(&mut relay, "v");
        join(&mut relay, &c, "S", Role::Candidate);
        join(&mut relay, &v, "S", Role::Viewer);
        ready(&mut relay, &v);

        assert_eq!(c.messages(), vec![viewer_ready("v")]);
        assert_eq!(v.messages(), vec![ServerMessage::ReadyAck]);

        ready(&mut relay, &c);
        assert!(c.messages().is_empty());
    }

    #[test]
    fn signals_route_by_target() {
        let mut relay = Relay::new();
        let mut c = connect(&mut relay, "c");
        let mut v1 = connect(&mut relay, "v1");
        let mut v2 = connect(&mut relay, "v2");
        join(&mut relay, &c, "S", Role::Candidate);
        join(&mut relay, &v1, "S", Role::Viewer);
        join(&mut relay, &v2, "S", Role::Viewer);

        let offer = json!({"offer": {"type": "offer", "sdp": "v=0"}});
        relay.handle(
            "c",
            ClientMessage::Signal {
                to: Some(String::from("v2")),
                signal: offer.clone(),
            },
        );
        assert_eq!(
            v2.messages(),
            vec![ServerMessage::Signal {
                from: String::from("c"),
                signal: offer
            }]
        );
        assert!(v1.messages().is_empty());

        for to in [None, Some(String::from("candidate"))] {
            relay.handle(
                "v1",
                ClientMessage::Signal {
                    to,
                    signal: json!({"answer": {}}),
                },
            );
        }
        assert_eq!(c.messages().len(), 2);

        relay.handle(
            "c",
            ClientMessage::Signal {
                to: Some(String::from("nobody")),
                signal: json!({"candidate": {}}),
            },
        );
        relay.handle(
            "v1",
            ClientMessage::Signal {
                to: None,
                signal: Value::Null,
            },
        );
        assert!(c.messages().is_empty());
        assert!(v1.messages().is_empty());
        assert!(v2.messages().is_empty());
    }

    #[test]
    fn signal_to_absent_candidate_is_not_queued() {
        let mut relay = Relay::new();
        let v = connect(&mut relay, "v");
        join(&mut relay, &v, "S", Role::Viewer);
        relay.handle(
            "v",
            ClientMessage::Signal {
                to: None,
                signal: json!({"offer": {}}),
            },
        );

        let mut c = connect(&mut relay, "c");
        join(&mut relay, &c, "S", Role::Candidate);
        assert!(c.messages().is_empty());
    }

    #[test]
    fn events_form_a_star_around_the_candidate() {
        let mut relay = Relay::new();
        let mut c = connect(&mut relay, "c");
        let mut v1 = connect(&mut relay, "v1");
        let mut v2 = connect(&mut relay, "v2");
        join(&mut relay, &c, "S", Role::Candidate);
        join(&mut relay, &v1, "S", Role::Viewer);
        join(&mut relay, &v2, "S", Role::Viewer);

        relay.handle("c", ClientMessage::Event { event: json!({"type": "no-face-10s"}) });
        assert_eq!(v1.messages().len(), 1);
        assert_eq!(v2.messages().len(), 1);
        assert!(c.messages().is_empty());

        relay.handle("v1", ClientMessage::Event { event: json!("note") });
        assert_eq!(
            c.messages(),
            vec![ServerMessage::Event {
                from: String::from("v1"),
                event: json!("note")
            }]
        );
        assert!(v2.messages().is_empty());
    }

    #[test]
    fn disconnects_notify_counterparts_and_clean_up() {
        let mut relay = Relay::new();
        let mut c = connect(&mut relay, "c");
        let mut v1 = connect(&mut relay, "v1");
        let mut v2 = connect(&mut relay, "v2");
        join(&mut relay, &c, "S", Role::Candidate);
        join(&mut relay, &v1, "S", Role::Viewer);
        join(&mut relay, &v2, "S", Role::Viewer);

        relay.disconnect("v1");
        assert_eq!(
            c.messages(),
            vec![ServerMessage::ViewerDisconnected {
                from: String::from("v1")
            }]
        );

        relay.disconnect("c");
        assert_eq!(
            v2.messages(),
            vec![ServerMessage::CandidateLeft {
                from: String::from("c")
            }]
        );
        assert!(v1.messages().is_empty());
        assert_eq!(relay.registry().len(), 1);

        relay.disconnect("v2");
        assert!(relay.registry().is_empty());
    }

    #[test]
    fn frames_before_join_are_dropped() {
        let mut relay = Relay::new();
        let mut v = connect(&mut relay, "v");
        ready(&mut relay, &v);
        relay.handle("v", ClientMessage::Event { event: json!(1) });
        relay.handle(
            "ghost",
            ClientMessage::Join {
                session_id: String::from("S"),
                role: Role::Viewer,
            },
        );
        assert!(v.messages().is_empty());
        assert!(relay.registry().is_empty());
    }

    #[test]
    fn rejoining_elsewhere_leaves_previous_session() {
        let mut relay = Relay::new();
        let mut c = connect(&mut relay, "c");
        let v = connect(&mut relay, "v");
        join(&mut relay, &c, "S", Role::Candidate);
        join(&mut relay, &v, "S", Role::Viewer);
        join(&mut relay, &v, "T", Role::Viewer);

        assert_eq!(
            c.messages(),
            vec![ServerMessage::ViewerDisconnected {
                from: String::from("v")
            }]
        );
        assert!(relay.registry().get("S").unwrap().viewers.is_empty());
        assert!(relay.registry().get("T").unwrap().viewers.contains_key("v"));
    }

    #[test]
    fn unwritable_connection_does_not_break_routing() {
        let mut relay = Relay::new();
        let c = connect(&mut relay, "c");
        let mut v = connect(&mut relay, "v");
        join(&mut relay, &c, "S", Role::Candidate);
        join(&mut relay, &v, "S", Role::Viewer);
        drop(c);

        ready(&mut relay, &v);
        assert_eq!(v.messages(), vec![ServerMessage::ReadyAck]);
    }

    #[tokio::test]
    async fn spawned_relay_processes_inputs_in_order() {
        let (relay_tx, task) = Relay::new().spawn(16);
        let (c_tx, mut c_rx) = unbounded_channel();
        let (v_tx, mut v_rx) = unbounded_channel();

        let inputs = vec![
            RelayInput::Connect(ConnectionHandle::new(String::from("v"), v_tx)),
            RelayInput::Message {
                connection_id: String::from("v"),
                message: ClientMessage::Join {
                    session_id: String::from("S"),
                    role: Role::Viewer,
                },
            },
            RelayInput::Message {
                connection_id: String::from("v"),
                message: ClientMessage::Ready {
                    session_id: Some(String::from("S")),
                    role: Some(Role::Viewer),
                },
            },
            RelayInput::Connect(ConnectionHandle::new(String::from("c"), c_tx)),
            RelayInput::Message {
                connection_id: String::from("c"),
                message: ClientMessage::Join {
                    session_id: String::from("S"),
                    role: Role::Candidate,
                },
            },
            RelayInput::Disconnect(String::from("c")),
        ];
        for input in inputs {
            relay_tx.send(input).await.unwrap();
        }
        drop(relay_tx);
        task.await.unwrap();

        let mut c_frames = Vec::new();
        while let Ok(frame) = c_rx.try_recv() {
            c_frames.push(frame);
        }
        assert_eq!(c_frames.len(), 2);
        assert_eq!(c_frames[1], Outbound::Message(viewer_ready("v")));

        let mut v_frames = Vec::new();
        while let Ok(frame) = v_rx.try_recv() {
            v_frames.push(frame);
        }
        assert_eq!(
            v_frames.last(),
            Some(&Outbound::Message(ServerMessage::CandidateLeft {
                from: String::from("c")
            }))
        );
    }
}
