//! Game session: the composition point of registration, connection and roster.
//!
//! Lifecycle: `new` -> `enter` (register, attach roster, connect) -> `leave`
//! (disconnect). A session that left may `enter` again; the roster is
//! attached only once and keeps its contents across sessions.
//!
//! The lifecycle actions `start_game`, `player_click` and `end_game` only
//! change the status message shown to the player.

use std::sync::Arc;

use crate::{
    connection::{ConnectionManager, ConnectionState},
    error::SessionError,
    registration::RegistrationApi,
    roster::{Roster, RosterSynchronizer},
};

/// One player's session in the game view.
pub struct GameSession {
    player_name: String,
    registration: Arc<dyn RegistrationApi>,
    connection: Arc<ConnectionManager>,
    roster: RosterSynchronizer,
    status: String,
    entered: bool,
    attached: bool,
}

impl GameSession {
    pub fn new(
        player_name: impl Into<String>,
        registration: Arc<dyn RegistrationApi>,
        connection: Arc<ConnectionManager>,
    ) -> Self {
        Self {
            player_name: player_name.into().trim().to_string(),
            registration,
            connection,
            roster: RosterSynchronizer::new(),
            status: String::new(),
            entered: false,
            attached: false,
        }
    }

    /// Register the player, then start following the roster.
    ///
    /// On registration failure nothing is connected and the error is
    /// returned for the caller to show to the user.
    pub async fn enter(&mut self) -> Result<(), SessionError> {
        if self.entered {
            return Err(SessionError::AlreadyEntered(self.player_name.clone()));
        }

        self.registration.register(&self.player_name).await?;
        tracing::info!("Player '{}' entering the game", self.player_name);

        if !self.attached {
            self.roster.attach(&self.connection);
            self.attached = true;
        }
        self.connection.connect();
        self.entered = true;
        Ok(())
    }

    /// Close the connection. The roster keeps its last known contents.
    pub async fn leave(&mut self) {
        self.connection.disconnect().await;
        self.entered = false;
        tracing::info!("Player '{}' left the game", self.player_name);
    }

    pub fn start_game(&mut self) {
        tracing::info!("Game started");
        self.status = "Game started!".to_string();
    }

    pub fn player_click(&mut self, player_id: u32) {
        tracing::info!("Player {} made a move", player_id);
        self.status = format!("Player {} made a move!", player_id);
    }

    pub fn end_game(&mut self) {
        tracing::info!("Game over");
        self.status = "Game over!".to_string();
    }

    pub fn player_name(&self) -> &str {
        &self.player_name
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn roster(&self) -> Roster {
        self.roster.roster()
    }

    pub fn synchronizer(&self) -> &RosterSynchronizer {
        &self.roster
    }

    pub fn connection(&self) -> &Arc<ConnectionManager> {
        &self.connection
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::ConnectionConfig,
        connection::MockConnector,
        error::{ConnectionError, RegistrationError},
        registration::MockRegistrationApi,
    };
    use lobby_shared::protocol::{PlayerRecord, events};
    use mockall::predicate::eq;

    async fn wait_until_failed(connection: &ConnectionManager) {
        let mut state = connection.watch_state();
        state
            .wait_for(|state| *state == ConnectionState::Failed)
            .await
            .unwrap();
    }

    fn refusing_connection(attempts: usize) -> Arc<ConnectionManager> {
        let mut connector = MockConnector::new();
        connector
            .expect_connect()
            .times(attempts)
            .returning(|_| Err(ConnectionError::Handshake("refused".to_string())));
        let config = ConnectionConfig::new("ws://lobby.test/ws").with_reconnection_attempts(1);
        Arc::new(ConnectionManager::new(config, Arc::new(connector)))
    }

    #[tokio::test]
    async fn test_enter_registers_then_connects() {
        // テスト項目: 登録成功後に名簿を購読して接続を開始する
        // given (前提条件):
        let mut registration = MockRegistrationApi::new();
        registration
            .expect_register()
            .with(eq("alice"))
            .times(1)
            .returning(|_| Ok(()));
        let connection = refusing_connection(1);
        let mut session = GameSession::new(" alice ", Arc::new(registration), connection.clone());

        // when (操作):
        let result = session.enter().await;

        // then (期待する結果):
        assert!(result.is_ok());
        assert_ne!(session.connection_state(), ConnectionState::Disconnected);
        assert_eq!(connection.subscriber_count(events::PLAYER_UPDATE), 1);
        wait_until_failed(&connection).await;
        session.leave().await;
        assert_eq!(session.connection_state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_enter_with_rejected_registration_does_not_connect() {
        // テスト項目: 登録が拒否された場合は接続しない
        // given (前提条件):
        let mut registration = MockRegistrationApi::new();
        registration
            .expect_register()
            .returning(|_| Err(RegistrationError::Rejected("name already taken".to_string())));
        let connection = refusing_connection(0);
        let mut session = GameSession::new("alice", Arc::new(registration), connection.clone());

        // when (操作):
        let result = session.enter().await;

        // then (期待する結果):
        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "name already taken");
        assert_eq!(session.connection_state(), ConnectionState::Disconnected);
        assert_eq!(connection.subscriber_count(events::PLAYER_UPDATE), 0);
    }

    #[tokio::test]
    async fn test_enter_twice_is_rejected() {
        // テスト項目: 2 回目の enter() はエラーになり購読が重複しない
        // given (前提条件):
        let mut registration = MockRegistrationApi::new();
        registration.expect_register().times(1).returning(|_| Ok(()));
        let connection = refusing_connection(1);
        let mut session = GameSession::new("alice", Arc::new(registration), connection.clone());
        session.enter().await.unwrap();

        // when (操作):
        let result = session.enter().await;

        // then (期待する結果):
        assert!(matches!(result, Err(SessionError::AlreadyEntered(name)) if name == "alice"));
        assert_eq!(connection.subscriber_count(events::PLAYER_UPDATE), 1);
        wait_until_failed(&connection).await;
        session.leave().await;
    }

    #[tokio::test]
    async fn test_enter_again_after_leave() {
        // テスト項目: leave() 後は再び enter() でき、名簿の購読は重複しない
        // given (前提条件):
        let mut registration = MockRegistrationApi::new();
        registration.expect_register().times(2).returning(|_| Ok(()));
        let connection = refusing_connection(2);
        let mut session = GameSession::new("alice", Arc::new(registration), connection.clone());
        session.enter().await.unwrap();
        wait_until_failed(&connection).await;
        session.leave().await;

        // when (操作):
        let result = session.enter().await;

        // then (期待する結果):
        assert!(result.is_ok());
        assert_eq!(connection.subscriber_count(events::PLAYER_UPDATE), 1);
        wait_until_failed(&connection).await;
        session.leave().await;
        assert_eq!(session.connection_state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_lifecycle_actions_only_change_status() {
        // テスト項目: start / click / end はステータスメッセージのみを変更する
        // given (前提条件):
        let connection = refusing_connection(0);
        let mut session = GameSession::new(
            "alice",
            Arc::new(MockRegistrationApi::new()),
            connection.clone(),
        );
        session
            .synchronizer()
            .on_player_update(PlayerRecord::new("a", "alice", 0, true));

        // when (操作) / then (期待する結果):
        session.start_game();
        assert_eq!(session.status(), "Game started!");
        session.player_click(2);
        assert_eq!(session.status(), "Player 2 made a move!");
        session.end_game();
        assert_eq!(session.status(), "Game over!");

        assert_eq!(session.roster().len(), 1);
        assert_eq!(session.connection_state(), ConnectionState::Disconnected);
        assert!(!session.is_connected());
    }
}
