//! Chat state: both registries and every membership operation
//!
//! `ChatState` is owned by the server actor and passed nowhere else, so
//! all mutation is serialized through a single task. It can also be
//! built directly in tests. The invariant kept by every operation here:
//! a username is in `room.members()` exactly when the room is in that
//! session's `joined_rooms()`.

use tracing::{debug, info};

use crate::config::ServerConfig;
use crate::error::ChatError;
use crate::message::{self, ServerMessage};
use crate::room::RoomRegistry;
use crate::session::{Connection, SessionRegistry};
use crate::types::MessageKind;

/// Sessions and rooms of one server
#[derive(Debug)]
pub struct ChatState {
    sessions: SessionRegistry,
    rooms: RoomRegistry,
}

impl ChatState {
    /// Create empty state with only the default room
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            sessions: SessionRegistry::new(),
            rooms: RoomRegistry::new(config),
        }
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn rooms(&self) -> &RoomRegistry {
        &self.rooms
    }

    pub fn rooms_mut(&mut self) -> &mut RoomRegistry {
        &mut self.rooms
    }

    /// Send a message to a logged-in user, if they are still here
    pub fn notify(&self, username: &str, msg: ServerMessage) {
        if let Some(session) = self.sessions.get(username) {
            session.send(msg);
        }
    }

    /// Bind a username to a connection and place the session in the
    /// default room
    pub fn login(&mut self, username: &str, connection: Connection) -> Result<(), ChatError> {
        let home = self.rooms.default_room_name().to_string();
        self.sessions.register(username, connection, &home)?;

        let room = self.rooms.lookup_mut(&home)?;
        room.add_member(username);
        room.broadcast(
            &self.sessions,
            username,
            &message::joined_body(username, &home),
            MessageKind::System,
        );

        info!("{} logged in", username);
        debug!("Total sessions: {}", self.sessions.len());

        self.notify(username, ServerMessage::ActiveRoomChanged { room: home });
        self.notify(username, ServerMessage::HelpHint);
        Ok(())
    }

    /// Remove a session from every room it joined, then from the registry
    pub fn logout(&mut self, username: &str) {
        let Some(session) = self.sessions.get(username) else {
            return;
        };
        let joined: Vec<String> = session.joined_rooms().iter().cloned().collect();
        let body = message::disconnected_body(username);

        for name in joined {
            let Ok(room) = self.rooms.lookup_mut(&name) else {
                continue;
            };
            room.broadcast(&self.sessions, username, &body, MessageKind::System);
            if let Some(owner) = room.remove_member(username) {
                if let Some(new_owner) = self.sessions.get(&owner) {
                    new_owner.send(ServerMessage::OwnershipTransferred { room: name.clone() });
                }
            }
        }

        self.sessions.unregister(username);
        info!("{} logged out", username);
        debug!("Total sessions: {}", self.sessions.len());
    }

    /// Join an existing room and make it active
    pub fn join(&mut self, username: &str, room_name: &str) -> Result<(), ChatError> {
        let room = self.rooms.lookup_mut(room_name)?;
        if room.contains(username) {
            return Err(ChatError::AlreadyMember(room_name.to_string()));
        }
        let Some(session) = self.sessions.get_mut(username) else {
            return Ok(());
        };

        session.enter(room_name);
        room.add_member(username);
        info!("{} joined {}", username, room_name);

        if let Some(session) = self.sessions.get(username) {
            let room_name = room_name.to_string();
            session.send(ServerMessage::Joined {
                room: room_name.clone(),
            });
            session.send(ServerMessage::ActiveRoomChanged {
                room: room_name.clone(),
            });
            session.send(ServerMessage::Topic {
                room: room_name,
                topic: room.topic().map(str::to_string),
            });
        }

        room.broadcast(
            &self.sessions,
            username,
            &message::joined_body(username, room_name),
            MessageKind::System,
        );
        Ok(())
    }

    /// Leave a room
    ///
    /// Parting the active room activates another joined room. Parting the
    /// last joined room rejoins the default room; the default room itself
    /// cannot be parted while it is the only one.
    pub fn part(&mut self, username: &str, room_name: &str) -> Result<(), ChatError> {
        let default_room = self.rooms.default_room_name().to_string();
        let room = self.rooms.lookup_mut(room_name)?;
        let Some(session) = self.sessions.get_mut(username) else {
            return Ok(());
        };

        if !session.is_in(room_name) {
            return Err(ChatError::NotMember(room_name.to_string()));
        }
        if room_name == default_room && session.joined_rooms().len() == 1 {
            return Err(ChatError::CannotLeaveLastRoom(room_name.to_string()));
        }

        let next_active = session.leave(room_name);
        let now_roomless = session.joined_rooms().is_empty();
        let new_owner = room.remove_member(username);
        info!("{} left {}", username, room_name);

        room.broadcast(
            &self.sessions,
            username,
            &message::left_body(username, room_name),
            MessageKind::System,
        );

        self.notify(
            username,
            ServerMessage::Left {
                room: room_name.to_string(),
            },
        );

        if let Some(owner) = new_owner {
            self.notify(
                &owner,
                ServerMessage::OwnershipTransferred {
                    room: room_name.to_string(),
                },
            );
        }

        if now_roomless {
            return self.join(username, &default_room);
        }
        if let Some(room) = next_active {
            self.notify(username, ServerMessage::ActiveRoomChanged { room });
        }
        Ok(())
    }

    /// Make a room active, joining it first if needed
    pub fn switch(&mut self, username: &str, room_name: &str) -> Result<(), ChatError> {
        let Some(session) = self.sessions.get_mut(username) else {
            return Ok(());
        };
        if !session.activate(room_name) {
            return self.join(username, room_name);
        }

        self.notify(
            username,
            ServerMessage::ActiveRoomChanged {
                room: room_name.to_string(),
            },
        );
        Ok(())
    }

    /// Create a room owned by `username` and make it active
    pub fn create_room(&mut self, username: &str, room_name: &str) -> Result<(), ChatError> {
        if !self.sessions.contains(username) {
            return Ok(());
        }
        self.rooms.create(room_name, username)?;
        if let Some(session) = self.sessions.get_mut(username) {
            session.enter(room_name);
        }

        let room = room_name.to_string();
        self.notify(username, ServerMessage::Created { room: room.clone() });
        self.notify(username, ServerMessage::ActiveRoomChanged { room });
        Ok(())
    }

    /// Change a room's topic
    ///
    /// Only the owner may do this, and only while the room is active.
    pub fn change_topic(
        &mut self,
        username: &str,
        room_name: &str,
        topic: &str,
    ) -> Result<(), ChatError> {
        let Some(session) = self.sessions.get(username) else {
            return Ok(());
        };
        if session.active_room() != room_name {
            return Err(ChatError::WrongRoom(room_name.to_string()));
        }

        let room = self.rooms.lookup_mut(room_name)?;
        room.set_topic(username, topic)?;
        info!("{} set the topic of {}", username, room_name);

        room.broadcast(
            &self.sessions,
            username,
            &message::topic_changed_body(username, topic),
            MessageKind::Chat,
        );

        self.notify(
            username,
            ServerMessage::Topic {
                room: room_name.to_string(),
                topic: Some(topic.to_string()),
            },
        );
        Ok(())
    }

    /// Send the active room's topic to the session
    pub fn read_topic(&self, username: &str) -> Result<(), ChatError> {
        let Some(session) = self.sessions.get(username) else {
            return Ok(());
        };
        let room = self.rooms.lookup(session.active_room())?;
        session.send(ServerMessage::Topic {
            room: room.name.clone(),
            topic: room.topic().map(str::to_string),
        });
        Ok(())
    }

    /// Send the active room's name to the session
    pub fn which_room(&self, username: &str) {
        if let Some(session) = self.sessions.get(username) {
            session.send(ServerMessage::CurrentRoom {
                room: session.active_room().to_string(),
            });
        }
    }

    /// Send every joined room to the session, active room marked
    pub fn list_rooms(&self, username: &str) {
        if let Some(session) = self.sessions.get(username) {
            session.send(ServerMessage::RoomList {
                rooms: session.joined_rooms().iter().cloned().collect(),
                active: session.active_room().to_string(),
            });
        }
    }

    /// Broadcast a chat line to the session's active room
    pub fn chat(&mut self, username: &str, text: &str) -> Result<(), ChatError> {
        if text.is_empty() {
            return Ok(());
        }
        let Some(session) = self.sessions.get(username) else {
            return Ok(());
        };
        let room = self.rooms.lookup_mut(session.active_room())?;
        room.broadcast(
            &self.sessions,
            username,
            &message::chat_body(username, text),
            MessageKind::Chat,
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::types::ConnectionId;

    fn state(dir: &Path) -> ChatState {
        ChatState::new(&ServerConfig {
            log_dir: dir.to_path_buf(),
            ..ServerConfig::default()
        })
    }

    fn login(state: &mut ChatState, username: &str) -> mpsc::Receiver<ServerMessage> {
        login_with_buffer(state, username, 64)
    }

    fn login_with_buffer(
        state: &mut ChatState,
        username: &str,
        buffer: usize,
    ) -> mpsc::Receiver<ServerMessage> {
        let (tx, rx) = mpsc::channel(buffer);
        state.login(username, connection(tx)).unwrap();
        rx
    }

    fn connection(tx: mpsc::Sender<ServerMessage>) -> Connection {
        Connection::new(ConnectionId::new(), tx, CancellationToken::new())
    }

    fn drain(rx: &mut mpsc::Receiver<ServerMessage>) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg.to_string());
        }
        out
    }

    /// Membership must look the same from both sides
    fn assert_membership_consistent(state: &ChatState) {
        for room in state.rooms().iter() {
            for member in room.members() {
                let session = state.sessions().get(member).unwrap();
                assert!(session.is_in(&room.name), "{} missing {}", member, room.name);
            }
            if let Some(owner) = room.owner() {
                assert!(room.contains(owner));
            }
        }
        for room in state.rooms().iter() {
            for name in ["alice", "bob", "carol"] {
                if let Some(session) = state.sessions().get(name) {
                    assert_eq!(session.is_in(&room.name), room.contains(name));
                    assert!(session.is_in(session.active_room()));
                }
            }
        }
    }

    #[tokio::test]
    async fn test_login_places_session_in_default_room() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state(dir.path());
        let mut rx = login(&mut state, "alice");

        assert_eq!(
            drain(&mut rx),
            vec![
                "You are now chatting in GeneralChat.\n".to_string(),
                "Type /help to see available commands\n".to_string(),
            ]
        );
        assert!(state.rooms().lookup("GeneralChat").unwrap().contains("alice"));
        assert_membership_consistent(&state);
    }

    #[tokio::test]
    async fn test_duplicate_login_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state(dir.path());
        let _rx = login(&mut state, "alice");

        let (tx, _rx2) = mpsc::channel(8);
        let result = state.login("alice", connection(tx));
        assert_eq!(result, Err(ChatError::NameTaken("alice".to_string())));
        assert_eq!(state.sessions().len(), 1);
        assert_eq!(
            state.rooms().lookup("GeneralChat").unwrap().members().len(),
            1
        );
    }

    #[tokio::test]
    async fn test_login_announced_to_default_room() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state(dir.path());
        let mut rx_alice = login(&mut state, "alice");
        drain(&mut rx_alice);

        let _rx_bob = login(&mut state, "bob");
        let seen = drain(&mut rx_alice);
        assert_eq!(seen.len(), 1);
        assert!(seen[0].ends_with("::GeneralChat] bob has joined GeneralChat!\n"));
    }

    #[tokio::test]
    async fn test_join_missing_room_leaves_state_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state(dir.path());
        let mut rx = login(&mut state, "alice");
        drain(&mut rx);

        let err = state.join("alice", "bar").unwrap_err();
        assert_eq!(
            ServerMessage::from(err).to_string(),
            "Sorry, no room by that name was found.\n"
        );
        let session = state.sessions().get("alice").unwrap();
        assert_eq!(session.joined_rooms().len(), 1);
        assert_eq!(session.active_room(), "GeneralChat");
    }

    #[tokio::test]
    async fn test_join_twice_is_already_member() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state(dir.path());
        let _rx = login(&mut state, "alice");

        assert_eq!(
            state.join("alice", "GeneralChat"),
            Err(ChatError::AlreadyMember("GeneralChat".to_string()))
        );
    }

    #[tokio::test]
    async fn test_join_sends_confirmation_topic_and_announcement() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state(dir.path());
        let mut rx_alice = login(&mut state, "alice");
        let mut rx_bob = login(&mut state, "bob");
        state.create_room("alice", "foo").unwrap();
        drain(&mut rx_alice);
        drain(&mut rx_bob);

        state.join("bob", "foo").unwrap();

        assert_eq!(
            drain(&mut rx_bob),
            vec![
                "Joined foo!\n".to_string(),
                "You are now chatting in foo.\n".to_string(),
                "foo has no topic set.\n".to_string(),
            ]
        );
        let seen = drain(&mut rx_alice);
        assert_eq!(seen.len(), 1);
        assert!(seen[0].ends_with("::foo] bob has joined foo!\n"));
        assert_eq!(
            state.sessions().get("bob").unwrap().active_room(),
            "foo"
        );
        assert_membership_consistent(&state);
    }

    #[tokio::test]
    async fn test_create_existing_room_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state(dir.path());
        let _rx_alice = login(&mut state, "alice");
        let _rx_bob = login(&mut state, "bob");
        state.create_room("alice", "foo").unwrap();

        let err = state.create_room("bob", "foo").unwrap_err();
        assert_eq!(err.to_string(), "A room named foo already exists!");
        assert!(!state.sessions().get("bob").unwrap().is_in("foo"));
        assert_membership_consistent(&state);
    }

    #[tokio::test]
    async fn test_topic_rules() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state(dir.path());
        let _rx_alice = login(&mut state, "alice");
        let _rx_bob = login(&mut state, "bob");
        state.create_room("alice", "foo").unwrap();
        state.join("bob", "foo").unwrap();

        // Not the owner
        assert_eq!(
            state.change_topic("bob", "foo", "mine"),
            Err(ChatError::NotOwner("foo".to_string()))
        );
        // Owner, but from another room
        state.switch("alice", "GeneralChat").unwrap();
        assert_eq!(
            state.change_topic("alice", "foo", "hello"),
            Err(ChatError::WrongRoom("foo".to_string()))
        );
        assert_eq!(state.rooms().lookup("foo").unwrap().topic(), None);

        // Nobody owns the default room
        assert_eq!(
            state.change_topic("alice", "GeneralChat", "hi"),
            Err(ChatError::NotOwner("GeneralChat".to_string()))
        );
        assert_eq!(
            state.rooms().lookup("GeneralChat").unwrap().topic(),
            Some("General Chat!")
        );

        state.switch("alice", "foo").unwrap();
        state.change_topic("alice", "foo", "hello").unwrap();
        assert_eq!(state.rooms().lookup("foo").unwrap().topic(), Some("hello"));
    }

    #[tokio::test]
    async fn test_read_topic_does_not_change_it() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state(dir.path());
        let mut rx = login(&mut state, "alice");
        drain(&mut rx);

        state.read_topic("alice").unwrap();
        assert_eq!(
            drain(&mut rx),
            vec!["Topic for GeneralChat: General Chat!\n".to_string()]
        );
        assert_eq!(
            state.rooms().lookup("GeneralChat").unwrap().topic(),
            Some("General Chat!")
        );
    }

    #[tokio::test]
    async fn test_owner_topic_then_part_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state(dir.path());
        let mut rx_alice = login(&mut state, "alice");
        let mut rx_bob = login(&mut state, "bob");

        state.create_room("alice", "foo").unwrap();
        state.join("bob", "foo").unwrap();
        drain(&mut rx_alice);
        drain(&mut rx_bob);

        state.change_topic("alice", "foo", "hello").unwrap();
        let seen = drain(&mut rx_bob);
        assert_eq!(seen.len(), 1);
        assert!(seen[0].ends_with("::foo] alice changed the topic to: hello\n"));
        assert_eq!(
            drain(&mut rx_alice),
            vec!["Topic for foo: hello\n".to_string()]
        );

        state.part("alice", "foo").unwrap();
        let seen = drain(&mut rx_bob);
        assert!(seen[0].ends_with("::foo] alice has left foo.\n"));
        assert_eq!(seen[1], "You are now the owner of foo.\n");

        let room = state.rooms().lookup("foo").unwrap();
        assert!(room.contains("bob"));
        assert!(!room.contains("alice"));
        assert_eq!(room.members().len(), 1);
        assert!(state.sessions().get("bob").unwrap().is_in("foo"));

        let alice_saw = drain(&mut rx_alice);
        assert_eq!(
            alice_saw,
            vec![
                "Left foo.\n".to_string(),
                "You are now chatting in GeneralChat.\n".to_string(),
            ]
        );
        assert_membership_consistent(&state);
    }

    #[tokio::test]
    async fn test_part_missing_or_foreign_room() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state(dir.path());
        let _rx_alice = login(&mut state, "alice");
        let _rx_bob = login(&mut state, "bob");
        state.create_room("alice", "foo").unwrap();

        assert_eq!(
            state.part("bob", ""),
            Err(ChatError::RoomNotFound(String::new()))
        );
        assert_eq!(
            state.part("bob", "foo"),
            Err(ChatError::NotMember("foo".to_string()))
        );
    }

    #[tokio::test]
    async fn test_part_last_room_rejoins_default() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state(dir.path());
        let mut rx = login(&mut state, "alice");
        state.create_room("alice", "foo").unwrap();
        state.part("alice", "GeneralChat").unwrap();
        drain(&mut rx);

        state.part("alice", "foo").unwrap();
        let session = state.sessions().get("alice").unwrap();
        assert_eq!(session.active_room(), "GeneralChat");
        assert_eq!(session.joined_rooms().len(), 1);
        assert!(drain(&mut rx).contains(&"Joined GeneralChat!\n".to_string()));
        // foo persists, now ownerless and empty
        let foo = state.rooms().lookup("foo").unwrap();
        assert!(foo.members().is_empty());
        assert!(foo.owner().is_none());
        assert_membership_consistent(&state);
    }

    #[tokio::test]
    async fn test_cannot_part_only_default_room() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state(dir.path());
        let _rx = login(&mut state, "alice");

        assert_eq!(
            state.part("alice", "GeneralChat"),
            Err(ChatError::CannotLeaveLastRoom("GeneralChat".to_string()))
        );
        assert!(state.sessions().get("alice").unwrap().is_in("GeneralChat"));
    }

    #[tokio::test]
    async fn test_switch_joins_when_not_member() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state(dir.path());
        let mut rx_alice = login(&mut state, "alice");
        let mut rx_bob = login(&mut state, "bob");
        state.create_room("alice", "foo").unwrap();
        drain(&mut rx_alice);
        drain(&mut rx_bob);

        state.switch("bob", "foo").unwrap();
        assert!(drain(&mut rx_bob).contains(&"Joined foo!\n".to_string()));
        assert_eq!(drain(&mut rx_alice).len(), 1);

        // Already a member: only the active room moves, nobody else hears it
        state.switch("bob", "GeneralChat").unwrap();
        assert_eq!(
            drain(&mut rx_bob),
            vec!["You are now chatting in GeneralChat.\n".to_string()]
        );
        assert!(drain(&mut rx_alice).is_empty());
        assert_membership_consistent(&state);
    }

    #[tokio::test]
    async fn test_list_rooms_marks_active() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state(dir.path());
        let mut rx = login(&mut state, "alice");
        state.create_room("alice", "foo").unwrap();
        drain(&mut rx);

        state.list_rooms("alice");
        state.which_room("alice");
        assert_eq!(
            drain(&mut rx),
            vec![
                "You are in the following rooms:\n\t- GeneralChat\n\t* foo (active)\n".to_string(),
                "Your active room is foo.\n".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_chat_goes_to_active_room_members() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state(dir.path());
        let mut rx_alice = login(&mut state, "alice");
        let mut rx_bob = login(&mut state, "bob");
        state.create_room("alice", "foo").unwrap();
        state.join("bob", "foo").unwrap();
        // bob watches GeneralChat but still receives chat from foo
        state.switch("bob", "GeneralChat").unwrap();
        drain(&mut rx_alice);
        drain(&mut rx_bob);

        state.chat("alice", "hi there").unwrap();
        state.chat("alice", "").unwrap();

        let seen = drain(&mut rx_bob);
        assert_eq!(seen.len(), 1);
        assert!(seen[0].ends_with("::foo] (alice): hi there\n"));
        assert!(drain(&mut rx_alice).is_empty());
    }

    #[tokio::test]
    async fn test_logout_cleans_up_memberships() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state(dir.path());
        let _rx_alice = login(&mut state, "alice");
        let mut rx_bob = login(&mut state, "bob");
        let mut rx_carol = login(&mut state, "carol");
        state.create_room("alice", "foo").unwrap();
        state.join("bob", "foo").unwrap();
        state.join("carol", "foo").unwrap();
        state.switch("carol", "GeneralChat").unwrap();
        drain(&mut rx_bob);
        drain(&mut rx_carol);

        state.logout("alice");

        assert!(!state.sessions().contains("alice"));
        for room in state.rooms().iter() {
            assert!(!room.contains("alice"));
        }
        assert_eq!(state.rooms().lookup("foo").unwrap().owner(), Some("bob"));

        // bob is active in foo and sees the foo announcement; carol only
        // sees the one for GeneralChat, where she is active
        let bob_saw = drain(&mut rx_bob);
        assert!(bob_saw
            .iter()
            .any(|l| l.ends_with("::foo] alice disconnected from the server.\n")));
        assert!(bob_saw.contains(&"You are now the owner of foo.\n".to_string()));
        let carol_saw = drain(&mut rx_carol);
        assert_eq!(carol_saw.len(), 1);
        assert!(carol_saw[0].ends_with("::GeneralChat] alice disconnected from the server.\n"));

        // The name is free again
        let _rx_again = login(&mut state, "alice");
        assert_membership_consistent(&state);
    }

    #[tokio::test]
    async fn test_topic_change_reaches_members_active_elsewhere() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state(dir.path());
        let mut rx_alice = login(&mut state, "alice");
        let mut rx_bob = login(&mut state, "bob");
        state.create_room("alice", "foo").unwrap();
        state.join("bob", "foo").unwrap();
        state.switch("bob", "GeneralChat").unwrap();
        drain(&mut rx_alice);
        drain(&mut rx_bob);

        state.change_topic("alice", "foo", "hello").unwrap();

        let seen = drain(&mut rx_bob);
        assert_eq!(seen.len(), 1);
        assert!(seen[0].ends_with("::foo] alice changed the topic to: hello\n"));
    }

    #[tokio::test]
    async fn test_full_queue_does_not_block_others() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state(dir.path());
        let mut rx_alice = login(&mut state, "alice");

        // bob never reads; his two login notices fill the queue
        let (tx, _rx_bob) = mpsc::channel(2);
        let bob_closer = CancellationToken::new();
        state
            .login("bob", Connection::new(ConnectionId::new(), tx, bob_closer.clone()))
            .unwrap();
        assert!(!bob_closer.is_cancelled());
        drain(&mut rx_alice);

        for i in 0..5 {
            state.chat("alice", &format!("m{}", i)).unwrap();
        }
        assert!(bob_closer.is_cancelled());

        // carol still gets everything after bob stalls
        let mut rx_carol = login(&mut state, "carol");
        drain(&mut rx_carol);
        state.chat("alice", "still here").unwrap();
        let seen = drain(&mut rx_carol);
        assert_eq!(seen.len(), 1);
        assert!(seen[0].ends_with("(alice): still here\n"));

        // Cleanup is the ordinary logout
        state.logout("bob");
        assert!(!state.sessions().contains("bob"));
        assert_membership_consistent(&state);
    }
}
