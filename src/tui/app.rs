//! TUI application state and main event loop

use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use futures::StreamExt;
use ratatui::DefaultTerminal;

use super::compose::ComposeState;
use super::messages::MessagesState;
use super::picker::PickerState;
use super::sidebar::SidebarState;
use super::ui;
use crate::api::client::Backend;
use crate::api::list_users_data;
use crate::auth::session::fetch_user;
use crate::config::Config;
use crate::error::SendError;
use crate::models::{ChatUser, ConversationSummary};
use crate::store::{DocumentStore, SubscriptionEvent};
use crate::sync::echo::{self, EchoBot};
use crate::sync::{ConversationDirectory, DirectoryOrdering, LiveView, ThreadSync};

/// Redraw interval so relative ages in the sidebar stay current.
const TICK: Duration = Duration::from_secs(30);

/// Active pane in the TUI
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Pane {
    #[default]
    Sidebar,
    Messages,
    Compose,
}

impl Pane {
    pub fn as_str(&self) -> &'static str {
        match self {
            Pane::Sidebar => "chats",
            Pane::Messages => "messages",
            Pane::Compose => "compose",
        }
    }

    fn next(self) -> Self {
        match self {
            Pane::Sidebar => Pane::Messages,
            Pane::Messages => Pane::Compose,
            Pane::Compose => Pane::Sidebar,
        }
    }

    fn previous(self) -> Self {
        match self {
            Pane::Sidebar => Pane::Compose,
            Pane::Messages => Pane::Sidebar,
            Pane::Compose => Pane::Messages,
        }
    }
}

/// One thing the event loop woke up for.
enum Step {
    Input(Option<io::Result<Event>>),
    Directory(Option<SubscriptionEvent>),
    Thread(Option<SubscriptionEvent>),
    Tick,
}

/// Application state
pub struct App {
    store: Arc<dyn DocumentStore>,
    /// Signed-in user
    pub me: ChatUser,
    pub directory: ConversationDirectory,
    /// Open conversation, if any
    pub thread: Option<ThreadSync>,
    pub sidebar: SidebarState,
    pub messages: MessagesState,
    pub compose: ComposeState,
    pub picker: PickerState,
    pub show_help: bool,
    pub active_pane: Pane,
    /// Transient status line message
    pub status_message: Option<String>,
    pub status_is_error: bool,
    pub should_exit: bool,
    directory_live: bool,
}

impl App {
    pub fn new(store: Arc<dyn DocumentStore>, me: ChatUser, ordering: DirectoryOrdering) -> Self {
        let directory = ConversationDirectory::open(store.as_ref(), &me.uid, ordering);
        Self {
            store,
            me,
            directory,
            thread: None,
            sidebar: SidebarState::default(),
            messages: MessagesState::default(),
            compose: ComposeState::default(),
            picker: PickerState::default(),
            show_help: false,
            active_pane: Pane::default(),
            status_message: None,
            status_is_error: false,
            should_exit: false,
            directory_live: true,
        }
    }

    /// Username of the open conversation's counterparty.
    pub fn peer_name(&self) -> Option<&str> {
        self.thread.as_ref().map(|t| t.peer().username.as_str())
    }

    fn set_info(&mut self, msg: impl Into<String>) {
        self.status_message = Some(msg.into());
        self.status_is_error = false;
    }

    fn set_error(&mut self, msg: impl Into<String>) {
        self.status_message = Some(msg.into());
        self.status_is_error = true;
    }

    async fn handle_step(&mut self, step: Step) -> Result<()> {
        match step {
            Step::Input(None) => self.should_exit = true,
            Step::Input(Some(event)) => {
                if let Event::Key(key) = event.context("Failed to read terminal input")? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key(key).await;
                    }
                }
            }
            Step::Directory(Some(event)) => {
                let before = self.directory.revision();
                self.directory.handle_event(event);
                if self.directory.revision() != before {
                    self.sidebar.sync(self.directory.summaries());
                }
            }
            Step::Directory(None) => {
                self.directory_live = false;
                self.set_error("Conversation list stopped updating");
            }
            Step::Thread(Some(event)) => {
                let changed = match self.thread.as_mut() {
                    Some(thread) => {
                        let before = thread.revision();
                        thread.handle_event(event);
                        thread.revision() != before
                    }
                    None => false,
                };
                if changed && self.messages.scroll_offset > 0 {
                    self.set_info("New messages below (End to jump)");
                }
            }
            Step::Thread(None) => {
                self.thread = None;
                self.set_error("Conversation closed by the backend");
            }
            Step::Tick => {}
        }
        Ok(())
    }

    async fn handle_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_exit = true;
            return;
        }

        if self.show_help {
            self.show_help = false;
            return;
        }

        if self.picker.active {
            self.handle_picker_key(key).await;
            return;
        }

        self.status_message = None;

        match key.code {
            KeyCode::Tab => self.active_pane = self.active_pane.next(),
            KeyCode::BackTab => self.active_pane = self.active_pane.previous(),
            KeyCode::Esc => self.close_thread(),
            _ => match self.active_pane {
                Pane::Sidebar => self.handle_sidebar_key(key).await,
                Pane::Messages => self.handle_messages_key(key).await,
                Pane::Compose => self.handle_compose_key(key).await,
            },
        }
    }

    /// Keys shared by the two browsing panes. Returns true if handled.
    async fn handle_common_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Char('q') => self.should_exit = true,
            KeyCode::Char('?') => self.show_help = true,
            KeyCode::Char('n') => self.open_picker().await,
            KeyCode::Char('i') => self.active_pane = Pane::Compose,
            _ => return false,
        }
        true
    }

    async fn handle_sidebar_key(&mut self, key: KeyEvent) {
        if self.handle_common_key(key).await {
            return;
        }
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => self.sidebar.move_up(self.directory.summaries()),
            KeyCode::Down | KeyCode::Char('j') => {
                self.sidebar.move_down(self.directory.summaries())
            }
            KeyCode::Enter => {
                if let Some(summary) = self.sidebar.selected_summary(self.directory.summaries()) {
                    let summary = summary.clone();
                    self.open_summary(&summary).await;
                }
            }
            _ => {}
        }
    }

    async fn handle_messages_key(&mut self, key: KeyEvent) {
        if self.handle_common_key(key).await {
            return;
        }
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => self.messages.scroll_up(1),
            KeyCode::Down | KeyCode::Char('j') => self.messages.scroll_down(1),
            KeyCode::PageUp => self.messages.scroll_up(10),
            KeyCode::PageDown => self.messages.scroll_down(10),
            KeyCode::End | KeyCode::Char('G') => self.messages.reset(),
            _ => {}
        }
    }

    async fn handle_compose_key(&mut self, key: KeyEvent) {
        if self.thread.is_none() {
            if key.code == KeyCode::Char('q') {
                self.should_exit = true;
            } else {
                self.set_error("Open a conversation first (Enter on a chat, or n)");
            }
            return;
        }

        match key.code {
            KeyCode::Enter => self.send_draft().await,
            KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.compose.clear()
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.compose.insert_char(c)
            }
            KeyCode::Backspace => self.compose.backspace(),
            KeyCode::Delete => self.compose.delete(),
            KeyCode::Left => self.compose.move_left(),
            KeyCode::Right => self.compose.move_right(),
            KeyCode::Home => self.compose.move_home(),
            KeyCode::End => self.compose.move_end(),
            _ => {}
        }
    }

    async fn handle_picker_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => self.picker.deactivate(),
            KeyCode::Enter => {
                if let Some(user) = self.picker.selected_user().cloned() {
                    self.picker.deactivate();
                    self.open_conversation(user);
                }
            }
            KeyCode::Up => self.picker.select_previous(),
            KeyCode::Down => self.picker.select_next(),
            KeyCode::Backspace => self.picker.backspace(),
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.picker.insert_char(c)
            }
            _ => {}
        }
    }

    async fn open_picker(&mut self) {
        match list_users_data(self.store.as_ref(), &self.me.uid).await {
            Ok(users) => self.picker.activate(users),
            Err(e) => {
                tracing::warn!("Failed to list users: {}", e);
                self.set_error(format!("Failed to list users: {}", e));
            }
        }
    }

    /// Open the conversation a directory entry points at.
    async fn open_summary(&mut self, summary: &ConversationSummary) {
        let uid = summary.counterparty_id();
        let peer = match fetch_user(self.store.as_ref(), uid).await {
            Ok(user) => user,
            Err(e) => {
                // The summary carries enough to keep chatting.
                tracing::warn!("Using summary details for {}: {}", uid, e);
                ChatUser {
                    uid: uid.to_string(),
                    email: String::new(),
                    username: summary.username.clone(),
                    profile_image_url: summary.profile_image_url.clone(),
                }
            }
        };
        self.open_conversation(peer);
    }

    fn open_conversation(&mut self, peer: ChatUser) {
        let already_open = self
            .thread
            .as_ref()
            .is_some_and(|t| t.peer().uid == peer.uid);
        if !already_open {
            tracing::debug!("Opening conversation with {}", peer.uid);
            self.thread = Some(ThreadSync::open(self.store.clone(), self.me.clone(), peer));
            self.messages.reset();
            self.compose.clear();
        }
        self.active_pane = Pane::Compose;
    }

    fn close_thread(&mut self) {
        if self.thread.take().is_some() {
            self.compose.clear();
            self.messages.reset();
            self.active_pane = Pane::Sidebar;
        }
    }

    async fn send_draft(&mut self) {
        let Some(thread) = self.thread.as_mut() else {
            return;
        };
        thread.draft = self.compose.input.clone();
        match thread.send().await {
            Ok(delivery) => {
                self.compose.clear();
                self.messages.reset();
                if delivery.is_complete() {
                    tracing::debug!("Delivered {}", delivery.message_id);
                }
            }
            Err(SendError::EmptyBody) => self.set_info("Nothing to send"),
            // The thread keeps the error as its status.
            Err(e) => tracing::warn!("Send failed: {}", e),
        }
    }
}

/// Run the TUI for the signed-in user.
pub async fn run() -> Result<()> {
    let config = Config::load()?;
    let backend = Backend::open(&config)?;
    let me = backend.current_user().await?;

    echo::register(backend.store.as_ref())
        .await
        .context("Failed to register the echo bot")?;
    let bot = config
        .echo_bot
        .then(|| EchoBot::spawn(backend.documents()));

    let mut app = App::new(backend.documents(), me, config.ordering);

    // ratatui::init installs a panic hook that restores the terminal.
    let mut terminal = ratatui::init();
    let result = run_app(&mut terminal, &mut app).await;
    ratatui::restore();

    drop(bot);
    let saved = backend.save();
    result?;
    saved
}

async fn run_app(terminal: &mut DefaultTerminal, app: &mut App) -> Result<()> {
    let mut events = EventStream::new();
    let mut tick = tokio::time::interval(TICK);

    while !app.should_exit {
        terminal.draw(|frame| ui::render(frame, app))?;

        let step = tokio::select! {
            event = events.next() => Step::Input(event),
            event = app.directory.next_event(), if app.directory_live => Step::Directory(event),
            event = next_thread_event(app.thread.as_mut()) => Step::Thread(event),
            _ = tick.tick() => Step::Tick,
        };
        app.handle_step(step).await?;
    }

    Ok(())
}

async fn next_thread_event(thread: Option<&mut ThreadSync>) -> Option<SubscriptionEvent> {
    match thread {
        Some(thread) => thread.next_event().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use crate::store::{paths, to_fields};

    async fn setup() -> (Arc<MemoryStore>, ChatUser, ChatUser) {
        let store = Arc::new(MemoryStore::new());
        let ana = ChatUser::new("u1", "ana@example.com", "");
        let ben = ChatUser::new("u2", "ben@example.com", "");
        for user in [&ana, &ben] {
            store
                .set(paths::USERS, &user.uid, to_fields(user).unwrap())
                .await
                .unwrap();
        }
        (store, ana, ben)
    }

    async fn press(app: &mut App, code: KeyCode) {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE)).await;
    }

    async fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c)).await;
        }
    }

    fn pump(app: &mut App) {
        app.directory.drain_pending();
        app.sidebar.sync(app.directory.summaries());
        if let Some(thread) = app.thread.as_mut() {
            thread.drain_pending();
        }
    }

    #[tokio::test]
    async fn test_new_message_flow() {
        let (store, ana, _ben) = setup().await;
        let mut app = App::new(store.clone(), ana, DirectoryOrdering::Timestamp);
        pump(&mut app);
        assert!(app.directory.loaded());

        press(&mut app, KeyCode::Char('n')).await;
        assert!(app.picker.active);
        // The signed-in user is not offered.
        assert_eq!(app.picker.matches().count(), 1);

        press(&mut app, KeyCode::Enter).await;
        assert!(!app.picker.active);
        assert_eq!(app.peer_name(), Some("ben"));
        assert_eq!(app.active_pane, Pane::Compose);

        type_text(&mut app, "hi ben").await;
        press(&mut app, KeyCode::Enter).await;
        assert_eq!(app.compose.input, "");

        pump(&mut app);
        let thread = app.thread.as_ref().unwrap();
        assert_eq!(thread.messages().len(), 1);
        assert_eq!(thread.messages()[0].text, "hi ben");
        assert_eq!(app.directory.summaries().len(), 1);
        assert_eq!(app.directory.summaries()[0].counterparty_id(), "u2");
    }

    #[tokio::test]
    async fn test_empty_send_keeps_compose() {
        let (store, ana, ben) = setup().await;
        let mut app = App::new(store, ana, DirectoryOrdering::Timestamp);
        app.open_conversation(ben);

        type_text(&mut app, "   ").await;
        press(&mut app, KeyCode::Enter).await;
        assert_eq!(app.compose.input, "   ");
        assert_eq!(app.status_message.as_deref(), Some("Nothing to send"));
        assert!(!app.status_is_error);
    }

    #[tokio::test]
    async fn test_open_conversation_from_sidebar() {
        let (store, ana, ben) = setup().await;
        crate::sync::deliver(store.as_ref(), &ben, &ana, "hello ana")
            .await
            .unwrap();

        let mut app = App::new(store, ana, DirectoryOrdering::Timestamp);
        pump(&mut app);
        assert_eq!(app.directory.summaries().len(), 1);

        press(&mut app, KeyCode::Enter).await;
        assert_eq!(app.peer_name(), Some("ben"));
        pump(&mut app);
        assert_eq!(app.thread.as_ref().unwrap().messages()[0].text, "hello ana");

        press(&mut app, KeyCode::Esc).await;
        assert!(app.thread.is_none());
        assert_eq!(app.active_pane, Pane::Sidebar);
    }

    #[tokio::test]
    async fn test_new_message_while_scrolled_up() {
        let (store, ana, ben) = setup().await;
        let mut app = App::new(store.clone(), ana.clone(), DirectoryOrdering::Timestamp);
        app.open_conversation(ben.clone());
        pump(&mut app);

        app.active_pane = Pane::Messages;
        press(&mut app, KeyCode::Up).await;
        assert_eq!(app.messages.scroll_offset, 1);

        crate::sync::deliver(store.as_ref(), &ben, &ana, "you there?")
            .await
            .unwrap();
        let event = app.thread.as_mut().unwrap().next_event().await;
        app.handle_step(Step::Thread(event)).await.unwrap();

        assert_eq!(app.thread.as_ref().unwrap().messages().len(), 1);
        assert_eq!(
            app.status_message.as_deref(),
            Some("New messages below (End to jump)")
        );
        assert!(!app.status_is_error);
    }

    #[tokio::test]
    async fn test_directory_event_moves_selection_with_conversation() {
        let (store, ana, ben) = setup().await;
        let cy = ChatUser::new("u3", "cy@example.com", "");
        crate::sync::deliver(store.as_ref(), &ben, &ana, "first").await.unwrap();
        crate::sync::deliver(store.as_ref(), &cy, &ana, "second").await.unwrap();

        let mut app = App::new(store.clone(), ana.clone(), DirectoryOrdering::Timestamp);
        let event = app.directory.next_event().await;
        app.handle_step(Step::Directory(event)).await.unwrap();
        press(&mut app, KeyCode::Down).await;
        assert_eq!(
            app.sidebar
                .selected_summary(app.directory.summaries())
                .unwrap()
                .counterparty_id(),
            "u2"
        );

        // ben writes again and moves to the top; the selection follows him.
        crate::sync::deliver(store.as_ref(), &ben, &ana, "third").await.unwrap();
        let event = app.directory.next_event().await;
        app.handle_step(Step::Directory(event)).await.unwrap();
        assert_eq!(app.sidebar.selected, 0);
        assert_eq!(app.directory.revision(), 2);
    }

    #[tokio::test]
    async fn test_compose_without_thread() {
        let (store, ana, _ben) = setup().await;
        let mut app = App::new(store, ana, DirectoryOrdering::Timestamp);
        press(&mut app, KeyCode::Tab).await;
        press(&mut app, KeyCode::Tab).await;
        assert_eq!(app.active_pane, Pane::Compose);

        press(&mut app, KeyCode::Char('x')).await;
        assert_eq!(app.compose.input, "");
        assert!(app.status_is_error);
    }

    #[tokio::test]
    async fn test_help_and_quit() {
        let (store, ana, _ben) = setup().await;
        let mut app = App::new(store, ana, DirectoryOrdering::Timestamp);

        press(&mut app, KeyCode::Char('?')).await;
        assert!(app.show_help);
        // Any key closes help without acting.
        press(&mut app, KeyCode::Char('q')).await;
        assert!(!app.show_help);
        assert!(!app.should_exit);

        app.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL))
            .await;
        assert!(app.should_exit);
    }
}
