use futures::StreamExt;
use parley_core::{
    encode_file, Attachment, ChatSession, ConversationStore, DictationEvent, Feedback, InputComposer,
    Message, MessageId, OutboundTurn, ReplyChunk, SessionId, SpeechCapture, StreamRequest,
};
use parley_llm::ModelStreamClient;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Prompts offered on an empty chat, bound to F1..F4
pub const SUGGESTIONS: [&str; 4] = ["Plan a trip", "Write code", "Analyze image", "Explain quantum physics"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    /// Typing a file path to attach
    AttachPath,
}

/// Work finished off the UI loop
#[derive(Debug)]
pub enum AppEvent {
    Reply {
        session_id: SessionId,
        message_id: MessageId,
        chunk: ReplyChunk,
    },
    ReplyFinished {
        session_id: SessionId,
        message_id: MessageId,
    },
    AttachmentEncoded(Result<Attachment, String>),
}

/// Anything the UI loop waits on besides the terminal
#[derive(Debug)]
pub enum Incoming {
    App(AppEvent),
    Dictation(DictationEvent),
}

/// The reply currently being streamed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InFlight {
    pub session_id: SessionId,
    pub message_id: MessageId,
}

pub struct App {
    pub store: ConversationStore,
    pub composer: InputComposer,
    client: Arc<dyn ModelStreamClient>,
    capture: Box<dyn SpeechCapture>,
    dictation_rx: mpsc::UnboundedReceiver<DictationEvent>,
    event_tx: mpsc::UnboundedSender<AppEvent>,
    event_rx: mpsc::UnboundedReceiver<AppEvent>,
    pub in_flight: Option<InFlight>,
    pub input_mode: InputMode,
    pub path_input: String,
    pub notice: Option<String>,
    pub scroll_offset: u16,
    pub tick: usize,
}

impl App {
    pub fn new(
        client: Arc<dyn ModelStreamClient>,
        capture: Box<dyn SpeechCapture>,
        dictation_rx: mpsc::UnboundedReceiver<DictationEvent>,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let mut store = ConversationStore::new();
        store.create_session();

        Self {
            store,
            composer: InputComposer::new(),
            client,
            capture,
            dictation_rx,
            event_tx,
            event_rx,
            in_flight: None,
            input_mode: InputMode::Normal,
            path_input: String::new(),
            notice: None,
            scroll_offset: 0,
            tick: 0,
        }
    }

    /// Start with search grounding on
    pub fn with_search(mut self, use_search: bool) -> Self {
        if use_search != self.composer.use_search() {
            self.composer.toggle_search();
        }
        self
    }

    pub fn input_mode(&self) -> InputMode {
        self.input_mode
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn provider_name(&self) -> &str {
        &self.client.metadata().name
    }

    pub fn dictation_supported(&self) -> bool {
        self.capture.is_supported()
    }

    pub fn current_session(&self) -> Option<&Arc<ChatSession>> {
        self.store.current()
    }

    /// Whether `message` is the reply still receiving chunks
    pub fn is_streaming(&self, session_id: SessionId, message: &Message) -> bool {
        self.in_flight
            .map(|f| f.session_id == session_id && f.message_id == message.id)
            .unwrap_or(false)
    }

    pub fn set_notice(&mut self, notice: impl Into<String>) {
        self.notice = Some(notice.into());
    }

    pub fn clear_notice(&mut self) {
        self.notice = None;
    }

    // Sessions

    pub fn new_chat(&mut self) {
        self.store.create_session();
        self.scroll_offset = 0;
    }

    pub fn delete_current_chat(&mut self) {
        if let Some(id) = self.store.current_id() {
            self.store.delete_session(id);
            self.scroll_offset = 0;
        }
    }

    /// Move the selection `step` places through the sidebar order, wrapping
    fn cycle_chat(&mut self, forward: bool) {
        let ids: Vec<SessionId> = self.store.sessions().map(|s| s.id).collect();
        if ids.is_empty() {
            return;
        }
        let position = self
            .store
            .current_id()
            .and_then(|current| ids.iter().position(|id| *id == current))
            .unwrap_or(0);
        let next = if forward {
            (position + 1) % ids.len()
        } else {
            (position + ids.len() - 1) % ids.len()
        };
        self.store.select_session(ids[next]);
        self.scroll_offset = 0;
    }

    pub fn next_chat(&mut self) {
        self.cycle_chat(true);
    }

    pub fn previous_chat(&mut self) {
        self.cycle_chat(false);
    }

    // Sending

    /// Send the draft. Returns whether a reply was started.
    pub fn send_message(&mut self) -> bool {
        if self.store.current_id().is_none() {
            self.set_notice("No chat selected. Press Ctrl+N to start one.");
            return false;
        }
        match self.composer.submit(self.is_loading()) {
            Some(turn) => self.send_turn(turn),
            None => false,
        }
    }

    /// Send one of the empty-chat suggestions, search off
    pub fn send_suggestion(&mut self, index: usize) -> bool {
        let Some(prompt) = SUGGESTIONS.get(index) else {
            return false;
        };
        let empty = self.current_session().map(|s| s.is_empty()).unwrap_or(false);
        if !empty || self.is_loading() {
            return false;
        }
        self.send_turn(OutboundTurn::text_only(*prompt))
    }

    fn send_turn(&mut self, turn: OutboundTurn) -> bool {
        let Some(session_id) = self.store.current_id() else {
            return false;
        };
        let history = self
            .store
            .session(session_id)
            .map(|s| s.messages.clone())
            .unwrap_or_default();

        if self
            .store
            .append_user_message(session_id, &turn.text, turn.attachments.clone())
            .is_none()
        {
            return false;
        }
        let Some(message_id) = self.store.begin_model_reply(session_id) else {
            return false;
        };

        let request = StreamRequest::new(turn.text)
            .with_history(history)
            .with_attachments(turn.attachments)
            .with_search(turn.use_search);
        self.spawn_reply(session_id, message_id, request);
        true
    }

    /// Ask the last question of the current chat again as a new turn
    pub fn regenerate(&mut self) -> bool {
        if self.is_loading() {
            return false;
        }
        let Some(session) = self.store.current() else {
            return false;
        };
        if !session.last_message().is_some_and(|m| m.actions_enabled()) {
            return false;
        }
        let Some(question) = session.messages.iter().rev().find(|m| m.is_user()) else {
            return false;
        };

        let turn = OutboundTurn {
            text: question.content.clone(),
            attachments: question.attachments.clone(),
            use_search: self.composer.use_search(),
        };
        info!(session_id = %session.id, "Regenerating reply");
        self.send_turn(turn)
    }

    fn spawn_reply(&mut self, session_id: SessionId, message_id: MessageId, request: StreamRequest) {
        self.in_flight = Some(InFlight { session_id, message_id });
        self.scroll_offset = 0;

        let mut stream = self.client.stream_reply(request);
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            while let Some(chunk) = stream.next().await {
                if tx
                    .send(AppEvent::Reply {
                        session_id,
                        message_id,
                        chunk,
                    })
                    .is_err()
                {
                    return;
                }
            }
            let _ = tx.send(AppEvent::ReplyFinished { session_id, message_id });
        });
    }

    // Response actions

    /// The newest reply of the current chat, if its actions are enabled
    pub fn last_finished_reply(&self) -> Option<(SessionId, Arc<Message>)> {
        let session = self.store.current()?;
        let message = session.last_message()?;
        message
            .actions_enabled()
            .then(|| (session.id, Arc::clone(message)))
    }

    pub fn copy_last_reply(&mut self) {
        let Some((_, message)) = self.last_finished_reply() else {
            return;
        };
        let result = arboard::Clipboard::new().and_then(|mut clipboard| clipboard.set_text(message.content.clone()));
        match result {
            Ok(()) => self.set_notice("Copied reply to clipboard"),
            Err(e) => {
                warn!("Clipboard unavailable: {}", e);
                self.set_notice(format!("Could not copy: {}", e));
            }
        }
    }

    pub fn give_feedback(&mut self, feedback: Feedback) -> bool {
        let Some((session_id, message)) = self.last_finished_reply() else {
            return false;
        };
        self.store.set_feedback(session_id, message.id, feedback)
    }

    // Composer

    pub fn toggle_search(&mut self) {
        let on = self.composer.toggle_search();
        self.set_notice(if on { "Search grounding on" } else { "Search grounding off" });
    }

    pub fn toggle_dictation(&mut self) {
        if let Err(e) = self.composer.toggle_listening(self.capture.as_mut()) {
            warn!("Dictation unavailable: {}", e);
            self.set_notice(e.to_string());
        }
    }

    pub fn begin_attach(&mut self) {
        self.input_mode = InputMode::AttachPath;
        self.path_input.clear();
    }

    pub fn cancel_attach(&mut self) {
        self.input_mode = InputMode::Normal;
        self.path_input.clear();
    }

    /// Encode the typed path on a background task
    pub fn confirm_attach(&mut self) {
        self.input_mode = InputMode::Normal;
        let path = std::mem::take(&mut self.path_input);
        let path = path.trim();
        if path.is_empty() {
            return;
        }
        let path = parley_config::expand_tilde(path).unwrap_or_else(|| path.into());

        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            let result = encode_file(&path).await.map_err(|e| e.to_string());
            let _ = tx.send(AppEvent::AttachmentEncoded(result));
        });
    }

    pub fn remove_last_attachment(&mut self) {
        let count = self.composer.attachments().len();
        if count > 0 {
            self.composer.remove_attachment(count - 1);
        }
    }

    pub fn push_input(&mut self, c: char) {
        match self.input_mode {
            InputMode::Normal => self.composer.push_char(c),
            InputMode::AttachPath => self.path_input.push(c),
        }
    }

    pub fn pop_input(&mut self) {
        match self.input_mode {
            InputMode::Normal => {
                self.composer.pop_char();
            }
            InputMode::AttachPath => {
                self.path_input.pop();
            }
        }
    }

    // Events

    /// Wait for the next background result
    pub async fn next_incoming(&mut self) -> Incoming {
        tokio::select! {
            Some(event) = self.event_rx.recv() => Incoming::App(event),
            Some(event) = self.dictation_rx.recv() => Incoming::Dictation(event),
            else => std::future::pending().await,
        }
    }

    pub fn handle_incoming(&mut self, incoming: Incoming) {
        match incoming {
            Incoming::App(event) => self.handle_app_event(event),
            Incoming::Dictation(event) => self.handle_dictation_event(event),
        }
    }

    /// Apply everything already queued without waiting
    pub fn process_events(&mut self) {
        while let Ok(event) = self.event_rx.try_recv() {
            self.handle_app_event(event);
        }
        while let Ok(event) = self.dictation_rx.try_recv() {
            self.handle_dictation_event(event);
        }
    }

    fn handle_app_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::Reply {
                session_id,
                message_id,
                chunk,
            } => {
                if !self.store.apply_chunk(session_id, message_id, chunk) {
                    debug!(session_id = %session_id, "Reply chunk dropped");
                }
            }
            AppEvent::ReplyFinished { session_id, message_id } => {
                self.store.finish_reply(session_id, message_id);
                if self.in_flight == Some(InFlight { session_id, message_id }) {
                    self.in_flight = None;
                }
            }
            AppEvent::AttachmentEncoded(Ok(attachment)) => {
                self.set_notice(format!("Attached {}", attachment.label()));
                self.composer.push_attachment(attachment);
            }
            AppEvent::AttachmentEncoded(Err(e)) => {
                warn!("Attachment rejected: {}", e);
                self.set_notice(e);
            }
        }
    }

    fn handle_dictation_event(&mut self, event: DictationEvent) {
        if let DictationEvent::Error(message) = &event {
            self.set_notice(format!("Dictation error: {}", message));
        }
        self.composer.apply_dictation(event);
    }

    pub fn on_tick(&mut self) {
        self.tick = self.tick.wrapping_add(1);
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.scroll_offset = self.scroll_offset.saturating_add(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.scroll_offset = self.scroll_offset.saturating_sub(lines);
    }
}
