//! Moderator commands, layered on the connection manager's request/ack
//! channel.
//!
//! Every command resolves to a [`CommandOutcome`] value; a rejected or
//! unroutable command is a result, not an error. Commands address the
//! currently joined session.

use colloquy_core::SessionId;
use colloquy_events::wire::{CommandOutcome, CommandRequest};

use crate::connection::{ConnectionManager, NOT_CONNECTED};

/// Error message for commands issued before any session was joined.
pub const NO_SESSION: &str = "No session joined";

impl ConnectionManager {
    /// Submit a participant intent for the current round.
    pub async fn submit_intent(&self, intent: &str) -> CommandOutcome {
        self.session_command(|sid| CommandRequest::submit_intent(sid, intent))
            .await
    }

    /// Call on a specific agent as moderator.
    pub async fn moderator_call(&self, agent_id: &str) -> CommandOutcome {
        self.session_command(|sid| CommandRequest::moderator_call(sid, agent_id))
            .await
    }

    /// Set the moderator intervention level.
    pub async fn set_intervention_level(&self, level: u8) -> CommandOutcome {
        self.session_command(|sid| CommandRequest::set_intervention_level(sid, level))
            .await
    }

    /// Ask the simulation for a discussion outline.
    pub async fn generate_outline(&self) -> CommandOutcome {
        self.session_command(CommandRequest::generate_outline).await
    }

    /// Trigger scoring of the discussion so far.
    pub async fn trigger_scoring(&self) -> CommandOutcome {
        self.session_command(CommandRequest::trigger_scoring).await
    }

    async fn session_command(
        &self,
        build: impl FnOnce(&SessionId) -> CommandRequest,
    ) -> CommandOutcome {
        let Some(session_id) = self.current_session() else {
            if !self.current_state().is_connected() {
                return CommandOutcome::failed(NOT_CONNECTED);
            }
            return CommandOutcome::failed(NO_SESSION);
        };
        self.request(build(&session_id)).await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use tokio::sync::{broadcast, mpsc};

    use colloquy_settings::types::ConnectionSettings;

    use super::*;
    use crate::testing::{ChannelTransport, ServerEnd};
    use crate::transport::Transport;

    fn manager() -> (ConnectionManager, mpsc::UnboundedReceiver<ServerEnd>) {
        let (transport, accepted) = ChannelTransport::new();
        let (frame_tx, _frames) = mpsc::channel(64);
        let (notice_tx, _notices) = broadcast::channel(16);
        let tokens = Arc::new(|| Some("tok".to_owned()));
        let manager = ConnectionManager::new(
            Arc::new(transport) as Arc<dyn Transport>,
            tokens,
            ConnectionSettings::default(),
            frame_tx,
            notice_tx,
        );
        (manager, accepted)
    }

    async fn connected_and_joined() -> (Arc<ConnectionManager>, ServerEnd) {
        let (manager, mut accepted) = manager();
        manager.connect().await.unwrap();
        let mut server = accepted.recv().await.unwrap();

        let manager = Arc::new(manager);
        let join_manager = Arc::clone(&manager);
        let join = tokio::spawn(async move {
            join_manager.join(colloquy_core::SessionId::from("sess_1")).await
        });
        let req = server.recv_json().await.unwrap();
        server
            .push_json(&json!({"type": "ack", "id": req["id"], "success": true}))
            .await;
        assert!(join.await.unwrap().success);
        (manager, server)
    }

    #[tokio::test(start_paused = true)]
    async fn submit_intent_while_disconnected_is_not_connected() {
        let (manager, _accepted) = manager();
        let outcome = manager.submit_intent("push back on claim 2").await;
        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some(NOT_CONNECTED));
    }

    #[tokio::test(start_paused = true)]
    async fn commands_without_a_session_report_it() {
        let (manager, mut accepted) = manager();
        manager.connect().await.unwrap();
        let _server = accepted.recv().await.unwrap();

        let outcome = manager.generate_outline().await;
        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some(NO_SESSION));
    }

    #[tokio::test(start_paused = true)]
    async fn submit_intent_sends_the_wire_shape() {
        let (manager, mut server) = connected_and_joined().await;

        let call_manager = Arc::clone(&manager);
        let call = tokio::spawn(async move {
            call_manager.submit_intent("challenge the premise").await
        });

        let req = server.recv_json().await.unwrap();
        assert_eq!(req["method"], "submit_intent");
        assert_eq!(req["params"]["sessionId"], "sess_1");
        assert_eq!(req["params"]["intent"], "challenge the premise");
        server
            .push_json(&json!({"type": "ack", "id": req["id"], "success": true}))
            .await;
        assert!(call.await.unwrap().success);
    }

    #[tokio::test(start_paused = true)]
    async fn each_moderator_command_uses_its_method_name() {
        let (manager, mut server) = connected_and_joined().await;

        // moderator_call
        let m = Arc::clone(&manager);
        let call = tokio::spawn(async move { m.moderator_call("a3").await });
        let req = server.recv_json().await.unwrap();
        assert_eq!(req["method"], "moderator_call");
        assert_eq!(req["params"]["agentId"], "a3");
        server
            .push_json(&json!({"type": "ack", "id": req["id"], "success": true}))
            .await;
        assert!(call.await.unwrap().success);

        // set_intervention_level
        let m = Arc::clone(&manager);
        let call = tokio::spawn(async move { m.set_intervention_level(2).await });
        let req = server.recv_json().await.unwrap();
        assert_eq!(req["method"], "set_intervention_level");
        assert_eq!(req["params"]["level"], 2);
        server
            .push_json(&json!({"type": "ack", "id": req["id"], "success": true}))
            .await;
        assert!(call.await.unwrap().success);

        // generate_outline
        let m = Arc::clone(&manager);
        let call = tokio::spawn(async move { m.generate_outline().await });
        let req = server.recv_json().await.unwrap();
        assert_eq!(req["method"], "generate_outline");
        server
            .push_json(&json!({"type": "ack", "id": req["id"], "success": true}))
            .await;
        assert!(call.await.unwrap().success);

        // trigger_scoring
        let m = Arc::clone(&manager);
        let call = tokio::spawn(async move { m.trigger_scoring().await });
        let req = server.recv_json().await.unwrap();
        assert_eq!(req["method"], "trigger_scoring");
        server
            .push_json(&json!({"type": "ack", "id": req["id"], "success": true}))
            .await;
        assert!(call.await.unwrap().success);
    }

    #[tokio::test(start_paused = true)]
    async fn command_failure_carries_server_error() {
        let (manager, mut server) = connected_and_joined().await;

        let m = Arc::clone(&manager);
        let call = tokio::spawn(async move { m.set_intervention_level(9).await });
        let req = server.recv_json().await.unwrap();
        server
            .push_json(&json!({
                "type": "ack", "id": req["id"], "success": false, "error": "level out of range"
            }))
            .await;
        let outcome = call.await.unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("level out of range"));
    }
}
