//! Event dispatch: the relay's per-event state mutations and fan-out rules.
//!
//! Dispatch runs while the session lock is held, so every handler is a plain
//! synchronous function over `&mut SessionState`. Channel sends never await.
//!
//! Note that "joined" is not a precondition for anything: events arriving
//! before `joinMeeting` are processed against whatever state exists, and the
//! task cache is lazily keyed by connection id on first write.

use serde_json::Value;

use crate::{
    domain::{Audience, ConnectionId, OnlineUser},
    error::RelayError,
    event::{
        ClientEvent, GetTasks, JoinMeeting, SendMessage, ServerEvent, ShareTask, TaskCompleted,
        TaskStatusUpdate, UpdatePosition, UpdateTasks, WebrtcSignal, as_text,
    },
    state::SessionState,
};

impl SessionState {
    /// Apply one validated inbound event from `sender`.
    ///
    /// Errors cover the lookup failures (`shareTask` recipient, `getTasks`
    /// target); the caller logs them and drops the event, same as a failed
    /// validation.
    pub fn dispatch(&mut self, sender: &ConnectionId, event: ClientEvent) -> Result<(), RelayError> {
        match event {
            ClientEvent::JoinMeeting(payload) => {
                self.handle_join_meeting(sender, payload);
                Ok(())
            }
            ClientEvent::TaskStatusUpdate(payload) => {
                self.handle_task_status_update(sender, payload);
                Ok(())
            }
            ClientEvent::TaskCompleted(payload) => {
                self.handle_task_completed(sender, payload);
                Ok(())
            }
            ClientEvent::ShareTask(payload) => self.handle_share_task(sender, payload),
            ClientEvent::UpdatePosition { payload, raw } => {
                self.handle_update_position(sender, payload, raw);
                Ok(())
            }
            ClientEvent::SendMessage(payload) => {
                self.handle_send_message(sender, payload);
                Ok(())
            }
            ClientEvent::WebrtcSignal(payload) => {
                self.handle_webrtc_signal(sender, payload);
                Ok(())
            }
            ClientEvent::UpdateTasks(payload) => {
                self.handle_update_tasks(sender, payload);
                Ok(())
            }
            ClientEvent::GetTasks(payload) => self.handle_get_tasks(sender, payload),
        }
    }

    /// Register the username claim, append the roster entry, make sure a
    /// task cache entry exists, then announce: full snapshot to the joiner,
    /// new-user notice to everyone else.
    fn handle_join_meeting(&mut self, sender: &ConnectionId, payload: JoinMeeting) {
        let JoinMeeting {
            username,
            position,
            character,
        } = payload;

        self.claim_username(&username, sender);
        self.task_cache.entry(sender.clone()).or_default();

        let user = OnlineUser {
            id: sender.clone(),
            username,
            position,
            character,
        };
        self.roster.push(user.clone());

        tracing::info!(
            "User joined: {}, Position: {}, Character: {}",
            user.username,
            user.position,
            user.character
        );

        self.emit(
            sender,
            &ServerEvent::UpdateUsers(self.roster.clone()),
            Audience::Single(sender.clone()),
        );
        self.emit(sender, &ServerEvent::UserJoined(user), Audience::AllExceptSender);
    }

    fn handle_task_status_update(&self, sender: &ConnectionId, payload: TaskStatusUpdate) {
        tracing::info!(
            "Task {} marked as {} by {}",
            payload.task_id,
            if payload.status { "done" } else { "not done" },
            payload.username
        );

        self.emit(
            sender,
            &ServerEvent::TaskStatusUpdated {
                task_id: payload.task_id,
                status: payload.status,
                username: payload.username,
            },
            Audience::All,
        );
    }

    fn handle_task_completed(&self, sender: &ConnectionId, payload: TaskCompleted) {
        // Template-literal coercion: string fields interpolate unquoted,
        // other truthy values use their JSON rendering.
        let username = as_text(&payload.username);
        let task = as_text(&payload.task);
        tracing::info!("Task completed by {}: {}", username, task);

        let message = format!("{} has completed the task: \"{}\"", username, task);
        self.emit(
            sender,
            &ServerEvent::TaskNotification {
                username: payload.username,
                task: payload.task,
                message,
            },
            Audience::All,
        );
    }

    /// Resolve the recipient through the username index and deliver to that
    /// one connection. An unknown recipient is an error for the log only.
    fn handle_share_task(&self, sender: &ConnectionId, payload: ShareTask) -> Result<(), RelayError> {
        let recipient = as_text(&payload.recipient);
        let recipient_id = self
            .resolve_username(&recipient)
            .ok_or_else(|| RelayError::RecipientNotFound(recipient.clone()))?;

        self.emit(
            sender,
            &ServerEvent::TaskShared {
                sender: payload.sender.clone(),
                task: payload.task,
            },
            Audience::Single(recipient_id),
        );
        tracing::info!(
            "Task shared from {} to {}",
            as_text(&payload.sender),
            recipient
        );
        Ok(())
    }

    /// Replace the position of every roster entry matching the payload `id`.
    ///
    /// The `id` is taken from the payload, not from the sender: any
    /// connection may move any avatar, and a payload whose id matches no
    /// roster entry still broadcasts. Both are contract, not accident.
    fn handle_update_position(&mut self, sender: &ConnectionId, payload: UpdatePosition, raw: Value) {
        tracing::debug!("Position update received: {}", raw);

        let id = ConnectionId::new(payload.id);
        for user in self.roster.iter_mut().filter(|user| user.id == id) {
            user.position = payload.position.clone();
        }

        self.emit(sender, &ServerEvent::UpdatePosition(raw), Audience::AllExceptSender);
    }

    fn handle_send_message(&self, sender: &ConnectionId, payload: SendMessage) {
        self.emit(
            sender,
            &ServerEvent::ChatMessage {
                id: payload.id,
                message: payload.message,
            },
            Audience::All,
        );
    }

    /// Relay the opaque signal to the target connection, rewriting `sender`
    /// to the sending connection's id.
    fn handle_webrtc_signal(&self, sender: &ConnectionId, payload: WebrtcSignal) {
        self.emit(
            sender,
            &ServerEvent::WebrtcSignal {
                sender: sender.clone(),
                signal: payload.signal,
            },
            Audience::Single(ConnectionId::new(payload.target)),
        );
    }

    /// Replace the sender's task cache entry wholesale, creating it if this
    /// connection never joined. No emission.
    fn handle_update_tasks(&mut self, sender: &ConnectionId, payload: UpdateTasks) {
        tracing::debug!("Tasks updated for user {}", sender);
        self.task_cache.insert(sender.clone(), payload.tasks);
    }

    /// Answer the sender with the target's cached task list. An empty entry
    /// answers with `[]`; only a missing entry is an error.
    fn handle_get_tasks(&self, sender: &ConnectionId, payload: GetTasks) -> Result<(), RelayError> {
        let target = ConnectionId::new(payload.target_id.clone());
        let tasks = self
            .task_cache
            .get(&target)
            .cloned()
            .ok_or(RelayError::TasksNotFound(target))?;

        self.emit(
            sender,
            &ServerEvent::ReceiveTasks {
                target_id: payload.target_id,
                tasks,
            },
            Audience::Single(sender.clone()),
        );
        Ok(())
    }
}
