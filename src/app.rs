use pdfqa_core::{
    is_valid_pdf, submit_upload, ApiClient, ApiError, ConversationHistory, Document, DocumentId,
    DocumentService, ExchangeOutcome, ExchangeTicket, QuestionResponse, Session, UploadFile,
    UploadResponse,
};
use ratatui::layout::Rect;
use ratatui::widgets::ListState;
use std::path::PathBuf;
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Chat,
    History,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Documents,
    Conversation,
    Input,
}

impl FocusPane {
    pub fn next(self) -> Self {
        match self {
            FocusPane::Documents => FocusPane::Conversation,
            FocusPane::Conversation => FocusPane::Input,
            FocusPane::Input => FocusPane::Documents,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Error,
}

/// One-line message shown in the status bar until the next action replaces it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub text: String,
}

type Task<T> = JoinHandle<Result<T, ApiError>>;

pub struct App {
    // Core state
    pub should_quit: bool,
    pub screen: Screen,
    pub input_mode: InputMode,
    pub focus: FocusPane,

    // Session and service
    pub session: Session,
    pub client: ApiClient,

    // Document list (indexes into the processed documents)
    pub documents_state: ListState,
    pub confirm_delete: Option<DocumentId>,

    // Chat state
    pub query_input: String,
    pub query_cursor: usize, // cursor position in query_input, in chars
    pub query_scroll: u16,
    pub query_chat_height: u16,
    pub query_chat_width: u16,

    // Upload popup
    pub show_upload_input: bool,
    pub upload_input: String,
    pub upload_cursor: usize,

    // History screen
    pub history: Option<ConversationHistory>,
    pub history_scroll: u16,

    // Background requests
    pub answer_task: Option<(ExchangeTicket, Task<QuestionResponse>)>,
    pub refresh_task: Option<Task<Vec<Document>>>,
    pub upload_task: Option<Task<(UploadResponse, Vec<Document>)>>,
    pub delete_task: Option<(DocumentId, Task<Vec<Document>>)>,
    pub history_task: Option<Task<ConversationHistory>>,

    pub notice: Option<Notice>,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Panel areas for mouse hit-testing (updated during render)
    pub documents_area: Option<Rect>,
    pub chat_area: Option<Rect>,
}

impl App {
    pub fn new(client: ApiClient) -> Self {
        Self {
            should_quit: false,
            screen: Screen::Chat,
            input_mode: InputMode::Normal,
            focus: FocusPane::Input,

            session: Session::new(),
            client,

            documents_state: ListState::default(),
            confirm_delete: None,

            query_input: String::new(),
            query_cursor: 0,
            query_scroll: 0,
            query_chat_height: 0,
            query_chat_width: 0,

            show_upload_input: false,
            upload_input: String::new(),
            upload_cursor: 0,

            history: None,
            history_scroll: 0,

            answer_task: None,
            refresh_task: None,
            upload_task: None,
            delete_task: None,
            history_task: None,

            notice: None,
            animation_frame: 0,

            documents_area: None,
            chat_area: None,
        }
    }

    pub fn info(&mut self, text: impl Into<String>) {
        self.notice = Some(Notice {
            kind: NoticeKind::Info,
            text: text.into(),
        });
    }

    pub fn error(&mut self, text: impl Into<String>) {
        self.notice = Some(Notice {
            kind: NoticeKind::Error,
            text: text.into(),
        });
    }

    /// Documents that can be chosen as the chat target
    pub fn selectable_documents(&self) -> Vec<&Document> {
        self.session.registry().selectable().collect()
    }

    pub fn processing_documents(&self) -> Vec<&Document> {
        self.session
            .registry()
            .documents()
            .iter()
            .filter(|d| !d.is_selectable())
            .collect()
    }

    pub fn highlighted_document(&self) -> Option<&Document> {
        let index = self.documents_state.selected()?;
        self.session.registry().selectable().nth(index)
    }

    pub fn is_uploading(&self) -> bool {
        self.upload_task.is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.answer_task.is_some()
            || self.refresh_task.is_some()
            || self.upload_task.is_some()
            || self.delete_task.is_some()
            || self.history_task.is_some()
    }

    // Document list navigation
    pub fn documents_nav_down(&mut self) {
        let len = self.session.registry().selectable().count();
        if len > 0 {
            let i = self.documents_state.selected().unwrap_or(0);
            self.documents_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn documents_nav_up(&mut self) {
        let i = self.documents_state.selected().unwrap_or(0);
        self.documents_state.select(Some(i.saturating_sub(1)));
    }

    /// Point the list cursor at the active document
    fn sync_documents_cursor(&mut self) {
        let active = self.session.registry().active_id();
        let position = self
            .session
            .registry()
            .selectable()
            .position(|d| Some(d.id) == active);
        let len = self.session.registry().selectable().count();

        let index = position.or_else(|| {
            self.documents_state
                .selected()
                .filter(|_| len > 0)
                .map(|i| i.min(len - 1))
        });
        self.documents_state.select(index);
    }

    pub fn select_highlighted_document(&mut self) {
        let Some(id) = self.highlighted_document().map(|d| d.id) else {
            return;
        };
        match self.session.select(id) {
            Ok(()) => {
                self.query_scroll = 0;
                let name = self
                    .session
                    .active_document()
                    .map(|d| d.display_name().to_string())
                    .unwrap_or_default();
                self.info(format!("Now chatting about \"{}\"", name));
                if self.screen == Screen::History {
                    self.start_history();
                }
            }
            Err(e) => self.error(e.to_string()),
        }
    }

    // Background requests
    pub fn start_refresh(&mut self) {
        if self.refresh_task.is_some() {
            return;
        }
        let client = self.client.clone();
        self.refresh_task = Some(tokio::spawn(async move { client.list_documents().await }));
    }

    /// Upload the file at the path typed into the upload popup
    pub fn start_upload(&mut self) {
        let raw = self.upload_input.trim();
        if raw.is_empty() || self.upload_task.is_some() {
            return;
        }
        let path = PathBuf::from(raw);
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        self.show_upload_input = false;
        self.upload_input.clear();
        self.upload_cursor = 0;

        if !is_valid_pdf(&file_name, None) {
            self.error("Please select a PDF file.");
            return;
        }

        info!(path = %path.display(), "starting upload");
        self.info(format!("Uploading {}...", file_name));
        let client = self.client.clone();
        self.upload_task = Some(tokio::spawn(async move {
            let file = UploadFile::from_path(&path).await?;
            submit_upload(&client, &file).await
        }));
    }

    pub fn request_delete(&mut self) {
        if let Some(document) = self.highlighted_document() {
            let (id, name) = (document.id, document.display_name().to_string());
            self.confirm_delete = Some(id);
            self.info(format!("Delete \"{}\"? Press y to confirm", name));
        }
    }

    pub fn start_delete(&mut self) {
        let Some(id) = self.confirm_delete.take() else {
            return;
        };
        if self.delete_task.is_some() {
            return;
        }
        let client = self.client.clone();
        self.delete_task = Some((
            id,
            tokio::spawn(async move {
                client.delete_document(id).await?;
                client.list_documents().await
            }),
        ));
    }

    pub fn start_history(&mut self) {
        let Some(id) = self.session.registry().active_id() else {
            self.info("Select a document to see its history");
            return;
        };
        self.history = None;
        self.history_scroll = 0;
        let client = self.client.clone();
        self.history_task = Some(tokio::spawn(async move { client.history(id).await }));
    }

    /// Send the typed question. Ignored when blank, when no document is ready, or while an
    /// answer is still outstanding; the input is only cleared when the question was accepted.
    pub fn submit_question(&mut self) {
        let Some(ticket) = self.session.begin_exchange(&self.query_input) else {
            return;
        };
        self.query_input.clear();
        self.query_cursor = 0;
        self.scroll_query_to_bottom();

        let client = self.client.clone();
        let request = ticket.request();
        let handle = tokio::spawn(async move { client.ask(&request).await });
        self.answer_task = Some((ticket, handle));
    }

    /// Collect finished background requests and apply them to the session
    pub async fn poll_tasks(&mut self) {
        if self.answer_task.as_ref().is_some_and(|(_, h)| h.is_finished()) {
            if let Some((ticket, handle)) = self.answer_task.take() {
                let result = join(handle).await;
                if let Err(e) = &result {
                    warn!(error = %e, "question failed");
                }
                let outcome = self.session.finish_exchange(&ticket, result);
                if outcome != ExchangeOutcome::Dropped {
                    self.scroll_query_to_bottom();
                }
            }
        }

        if self.refresh_task.as_ref().is_some_and(|h| h.is_finished()) {
            if let Some(handle) = self.refresh_task.take() {
                match join(handle).await {
                    Ok(documents) => {
                        self.session.apply_refresh(documents);
                        self.sync_documents_cursor();
                    }
                    Err(e) => {
                        warn!(error = %e, "refresh failed");
                        self.error(format!("Could not load documents: {}", e));
                    }
                }
            }
        }

        if self.upload_task.as_ref().is_some_and(|h| h.is_finished()) {
            if let Some(handle) = self.upload_task.take() {
                match join(handle).await {
                    Ok((response, documents)) => {
                        match self.session.complete_upload(&response, documents) {
                            Some(document) if document.processed => {
                                self.query_scroll = 0;
                                self.info(format!("\"{}\" is ready", document.display_name()))
                            }
                            Some(document) => self.info(format!(
                                "\"{}\" uploaded, still processing",
                                document.display_name()
                            )),
                            None => self.info(response.message),
                        }
                        self.sync_documents_cursor();
                    }
                    Err(e) if e.is_input_rejected() => self.error(e.to_string()),
                    Err(e) => {
                        warn!(error = %e, "upload failed");
                        self.error("Error uploading document. Please try again.");
                    }
                }
            }
        }

        if self.delete_task.as_ref().is_some_and(|(_, h)| h.is_finished()) {
            if let Some((id, handle)) = self.delete_task.take() {
                match join(handle).await {
                    Ok(documents) => {
                        self.session.apply_refresh(documents);
                        self.sync_documents_cursor();
                        self.info(format!("Deleted document {}", id));
                    }
                    Err(e) => self.error(format!("Could not delete document: {}", e)),
                }
            }
        }

        if self.history_task.as_ref().is_some_and(|h| h.is_finished()) {
            if let Some(handle) = self.history_task.take() {
                match join(handle).await {
                    Ok(history) => self.history = Some(history),
                    Err(e) => self.error(format!("Could not load history: {}", e)),
                }
            }
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.is_loading() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    /// Scroll chat to bottom so the newest message is visible
    pub fn scroll_query_to_bottom(&mut self) {
        let wrap_width = if self.query_chat_width > 0 {
            self.query_chat_width as usize
        } else {
            50
        };

        let total_lines: usize = self
            .session
            .ledger()
            .messages()
            .iter()
            .map(|msg| 2 + wrapped_line_count(&msg.content, wrap_width))
            .sum();
        let total_lines = u16::try_from(total_lines).unwrap_or(u16::MAX);

        let visible_height = if self.query_chat_height > 0 {
            self.query_chat_height
        } else {
            20
        };

        self.query_scroll = total_lines.saturating_sub(visible_height);
    }
}

/// Lines `text` occupies when wrapped at `width` columns
fn wrapped_line_count(text: &str, width: usize) -> usize {
    let width = width.max(1);
    text.lines()
        .map(|line| line.chars().count().div_ceil(width).max(1))
        .sum::<usize>()
        .max(1)
}

async fn join<T>(handle: Task<T>) -> Result<T, ApiError> {
    handle
        .await
        .unwrap_or_else(|e| Err(ApiError::Interrupted(e.to_string())))
}
