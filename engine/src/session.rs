//! Conversation session and the tool-calling loop.
//!
//! A turn runs from one user submission until the backend answers without
//! requesting tools, the backend fails, or the round cap is hit:
//!
//! ```text
//! submit ─► USER ─► send ─┬─► MODEL text (if any)
//!                         ├─► no calls: done
//!                         └─► SYSTEM "Executing tools" ─► batch ─► TOOL ─► send ...
//! ```
//!
//! Every step lands in the transcript before the next one starts, so the
//! transcript alone is enough to render the conversation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use arkaios_providers::{FreshInput, GatewayRequest, ModelGateway, ToolContinuation, TurnInput};
use arkaios_tools::{ToolRegistry, Workspace};
use arkaios_types::{
    ImageAttachment, Message, MessageDraft, MessageId, ToolCall, ToolDefinition, ToolResult,
};
use tokio::sync::watch;

use crate::prompts::{
    DEFAULT_GREETING, DEFAULT_IMAGE_ONLY_PROMPT, EMPTY_RESPONSE_TEXT, GATEWAY_ERROR_PREFIX,
    TOOL_PAIRING_ERROR_TEXT, chain_depth_exceeded_text, executing_tools_text,
};
use crate::transcript::Transcript;

pub const DEFAULT_MAX_CHAIN_DEPTH: u32 = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    pub greeting: String,
    /// Tool rounds allowed per turn.
    pub max_chain_depth: u32,
    pub image_only_prompt: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            greeting: DEFAULT_GREETING.to_string(),
            max_chain_depth: DEFAULT_MAX_CHAIN_DEPTH,
            image_only_prompt: DEFAULT_IMAGE_ONLY_PROMPT.to_string(),
        }
    }
}

/// How a completed turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    Completed,
    GatewayFailed,
    ChainDepthExceeded,
    /// Tool results could not be paired with their calls.
    InternalError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnReport {
    /// Ids of every message this turn appended, in order.
    pub appended: Vec<MessageId>,
    /// Tool rounds executed.
    pub rounds: u32,
    pub outcome: TurnOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Another turn is still running; nothing was appended.
    Busy,
    /// No text and no pending image; nothing was appended.
    Empty,
    Completed(TurnReport),
}

/// Clears the processing flag when dropped.
struct ProcessingGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> ProcessingGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct SessionInner {
    transcript: Mutex<Transcript>,
    /// Transcript length after the latest append.
    changes: watch::Sender<usize>,
    processing: AtomicBool,
    workspace: Mutex<Option<Workspace>>,
    pending_image: Mutex<Option<ImageAttachment>>,
    gateway: Arc<dyn ModelGateway>,
    registry: ToolRegistry,
    tool_definitions: Vec<ToolDefinition>,
    settings: SessionSettings,
}

/// One conversation.
///
/// Cheap to clone; clones share state. Locks are never held across an await,
/// so a clone can mount or capture while another runs a turn.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("messages", &self.transcript_len())
            .field("processing", &self.is_processing())
            .field("workspace", &self.workspace().map(|w| w.display_path().to_string()))
            .field("registry", &self.inner.registry)
            .finish_non_exhaustive()
    }
}

impl Session {
    #[must_use]
    pub fn new(
        gateway: Arc<dyn ModelGateway>,
        registry: ToolRegistry,
        settings: SessionSettings,
    ) -> Self {
        let tool_definitions = registry.definitions();
        Self {
            inner: Arc::new(SessionInner {
                transcript: Mutex::new(Transcript::new()),
                changes: watch::Sender::new(0),
                processing: AtomicBool::new(false),
                workspace: Mutex::new(None),
                pending_image: Mutex::new(None),
                gateway,
                registry,
                tool_definitions,
                settings,
            }),
        }
    }

    #[must_use]
    pub fn settings(&self) -> &SessionSettings {
        &self.inner.settings
    }

    /// Append the greeting if the transcript is still empty.
    pub fn greet(&self) -> Option<MessageId> {
        let (id, len) = {
            let mut transcript = lock(&self.inner.transcript);
            if !transcript.is_empty() || self.inner.settings.greeting.trim().is_empty() {
                return None;
            }
            let id = transcript.append(MessageDraft::model(
                self.inner.settings.greeting.clone(),
                SystemTime::now(),
            ));
            (id, transcript.len())
        };
        self.inner.changes.send_replace(len);
        Some(id)
    }

    /// Receiver that is notified with the new transcript length after every
    /// append, including those made while a turn is still running.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<usize> {
        self.inner.changes.subscribe()
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<Message> {
        lock(&self.inner.transcript).snapshot()
    }

    #[must_use]
    pub fn transcript_len(&self) -> usize {
        lock(&self.inner.transcript).len()
    }

    #[must_use]
    pub fn messages_since(&self, index: usize) -> Vec<Message> {
        lock(&self.inner.transcript).since(index)
    }

    #[must_use]
    pub fn is_processing(&self) -> bool {
        self.inner.processing.load(Ordering::Acquire)
    }

    /// Replace the mounted workspace, returning the previous one.
    ///
    /// A batch that is already running keeps the handle it started with.
    pub fn mount(&self, workspace: Workspace) -> Option<Workspace> {
        tracing::info!(
            root = workspace.display_path(),
            access = %workspace.access(),
            "Workspace mounted"
        );
        lock(&self.inner.workspace).replace(workspace)
    }

    #[must_use]
    pub fn workspace(&self) -> Option<Workspace> {
        lock(&self.inner.workspace).clone()
    }

    /// Stage an image for the next submission, replacing any staged one.
    pub fn set_pending_image(&self, image: ImageAttachment) -> Option<ImageAttachment> {
        lock(&self.inner.pending_image).replace(image)
    }

    pub fn clear_pending_image(&self) -> Option<ImageAttachment> {
        lock(&self.inner.pending_image).take()
    }

    #[must_use]
    pub fn has_pending_image(&self) -> bool {
        lock(&self.inner.pending_image).is_some()
    }

    fn append(&self, draft: MessageDraft, appended: &mut Vec<MessageId>) {
        let len = {
            let mut transcript = lock(&self.inner.transcript);
            appended.push(transcript.append(draft));
            transcript.len()
        };
        self.inner.changes.send_replace(len);
    }

    /// Run one user turn to completion.
    ///
    /// Refused with `Busy` while another turn runs and with `Empty` when
    /// there is neither text nor a staged image.
    pub async fn submit(&self, text: &str) -> SubmitOutcome {
        let Some(_guard) = ProcessingGuard::acquire(&self.inner.processing) else {
            tracing::debug!("Submission refused: turn in progress");
            return SubmitOutcome::Busy;
        };

        let text = text.trim();
        let image = {
            let mut pending = lock(&self.inner.pending_image);
            if text.is_empty() && pending.is_none() {
                return SubmitOutcome::Empty;
            }
            pending.take()
        };
        let prompt = if text.is_empty() {
            self.inner.settings.image_only_prompt.clone()
        } else {
            text.to_string()
        };
        let Some(fresh) = FreshInput::new(prompt.clone(), image.clone()) else {
            return SubmitOutcome::Empty;
        };

        let history = self.snapshot();
        let mut appended = Vec::new();
        let mut draft = MessageDraft::user(prompt.clone(), SystemTime::now());
        if let Some(image) = image {
            draft = draft.with_attachment(image);
        }
        self.append(draft, &mut appended);

        tracing::info!(
            image = fresh.image().is_some(),
            history = history.len(),
            "Turn started"
        );
        let report = self
            .run_chain(&prompt, history, TurnInput::Fresh(fresh), appended)
            .await;
        tracing::info!(
            rounds = report.rounds,
            outcome = ?report.outcome,
            appended = report.appended.len(),
            "Turn finished"
        );
        SubmitOutcome::Completed(report)
    }

    async fn run_chain(
        &self,
        task: &str,
        mut history: Vec<Message>,
        mut input: TurnInput,
        mut appended: Vec<MessageId>,
    ) -> TurnReport {
        let max_rounds = self.inner.settings.max_chain_depth;
        let mut rounds = 0;

        let outcome = loop {
            let request = GatewayRequest {
                history: &history,
                input: &input,
                tools: &self.inner.tool_definitions,
            };
            let turn = match self.inner.gateway.send(request).await {
                Ok(turn) => turn,
                Err(err) => {
                    tracing::error!(error = %err, rounds, "Gateway call failed");
                    self.append(
                        MessageDraft::system(
                            format!("{GATEWAY_ERROR_PREFIX}{err}"),
                            SystemTime::now(),
                        ),
                        &mut appended,
                    );
                    break TurnOutcome::GatewayFailed;
                }
            };

            let visible = turn.visible_text().map(str::to_string);
            if let Some(visible) = &visible {
                self.append(
                    MessageDraft::model(visible.as_str(), SystemTime::now()),
                    &mut appended,
                );
            }

            if turn.is_terminal() {
                if visible.is_none() {
                    self.append(
                        MessageDraft::model(EMPTY_RESPONSE_TEXT, SystemTime::now()),
                        &mut appended,
                    );
                }
                break TurnOutcome::Completed;
            }

            if rounds >= max_rounds {
                tracing::warn!(
                    max_rounds,
                    dropped_calls = turn.tool_calls.len(),
                    "Tool chain depth exceeded"
                );
                self.append(
                    MessageDraft::system(chain_depth_exceeded_text(max_rounds), SystemTime::now()),
                    &mut appended,
                );
                break TurnOutcome::ChainDepthExceeded;
            }
            rounds += 1;

            history = self.snapshot();
            let results = self.run_round(&turn.tool_calls, &mut appended).await;
            let Some(continuation) = ToolContinuation::pair(task, turn.tool_calls, results) else {
                tracing::error!(rounds, "Tool results do not match the requested calls");
                self.append(
                    MessageDraft::system(TOOL_PAIRING_ERROR_TEXT, SystemTime::now()),
                    &mut appended,
                );
                break TurnOutcome::InternalError;
            };
            input = TurnInput::Continuation(continuation);
        };

        TurnReport {
            appended,
            rounds,
            outcome,
        }
    }

    /// Announce, execute and record one tool batch.
    async fn run_round(
        &self,
        calls: &[ToolCall],
        appended: &mut Vec<MessageId>,
    ) -> Vec<ToolResult> {
        let names: Vec<&str> = calls.iter().map(|call| call.name.as_str()).collect();
        self.append(
            MessageDraft::system(executing_tools_text(&names), SystemTime::now())
                .with_function_calls(calls.to_vec()),
            appended,
        );

        let workspace = self.workspace();
        let results = self
            .inner
            .registry
            .execute_batch(calls, workspace.as_ref())
            .await;

        let summary = results
            .iter()
            .map(|result| format!("[{}] {}", result.tool_name, result.content))
            .collect::<Vec<_>>()
            .join("\n");
        self.append(
            MessageDraft::tool(summary, SystemTime::now()).with_function_responses(results.clone()),
            appended,
        );
        results
    }
}
