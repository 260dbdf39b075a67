//! Productivity assistant contract.
//!
//! # Responsibility
//! - Describe assistant requests (mode, role-tagged turns, user id).
//! - Turn gateway responses into typed replies and typed failures.
//!
//! # Invariants
//! - Transport lives behind `AssistantGateway`; core never opens sockets.
//! - Chat content is never logged, only metadata.

pub mod payload;

pub use payload::{
    build_gateway_body, parse_gateway_response, AssistantReply, Decomposition, SubtaskDraft,
    TaskDraft,
};

use crate::model::activity::TaskRecord;
use crate::model::ledger::UserId;
use log::{debug, warn};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const DEFAULT_ASSISTANT_MODEL: &str = "google/gemini-2.5-flash";
const MAX_TURNS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssistantMode {
    Chat,
    CreateTask,
    Prioritize,
    Decompose,
}

impl AssistantMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::CreateTask => "create_task",
            Self::Prioritize => "prioritize",
            Self::Decompose => "decompose",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "chat" => Some(Self::Chat),
            "create_task" => Some(Self::CreateTask),
            "prioritize" => Some(Self::Prioritize),
            "decompose" => Some(Self::Decompose),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssistantRequest {
    pub user_id: UserId,
    pub mode: AssistantMode,
    pub messages: Vec<ChatTurn>,
    /// Task list shown to the model in `prioritize` mode.
    pub open_tasks: Vec<TaskRecord>,
}

impl AssistantRequest {
    pub fn new(user_id: UserId, mode: AssistantMode, messages: Vec<ChatTurn>) -> Self {
        Self {
            user_id,
            mode,
            messages,
            open_tasks: Vec::new(),
        }
    }

    pub fn with_open_tasks(mut self, tasks: Vec<TaskRecord>) -> Self {
        self.open_tasks = tasks;
        self
    }

    pub fn validate(&self) -> Result<(), AssistantError> {
        if self.messages.is_empty() {
            return Err(AssistantError::Validation(
                "request needs at least one turn".to_string(),
            ));
        }
        if self.messages.len() > MAX_TURNS {
            return Err(AssistantError::Validation(format!(
                "request exceeds {MAX_TURNS} turns"
            )));
        }
        match self.messages.last() {
            Some(turn) if turn.role == ChatRole::User && !turn.content.trim().is_empty() => Ok(()),
            _ => Err(AssistantError::Validation(
                "last turn must be a non-empty user message".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssistantError {
    RateLimited,
    PaymentRequired,
    UpstreamUnavailable(String),
    /// Bad request or malformed tool payload.
    Validation(String),
}

impl AssistantError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::RateLimited => "rate_limited",
            Self::PaymentRequired => "payment_required",
            Self::UpstreamUnavailable(_) => "upstream_unavailable",
            Self::Validation(_) => "validation",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::UpstreamUnavailable(_))
    }
}

impl Display for AssistantError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RateLimited => write!(f, "rate limit exceeded, try again later"),
            Self::PaymentRequired => write!(f, "assistant credits exhausted"),
            Self::UpstreamUnavailable(message) => write!(f, "assistant unavailable: {message}"),
            Self::Validation(message) => write!(f, "invalid assistant payload: {message}"),
        }
    }
}

impl Error for AssistantError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayResponse {
    pub status: u16,
    pub body: String,
}

/// Transport to a chat-completion endpoint.
pub trait AssistantGateway {
    /// Sends one request body. Transport failures map to `UpstreamUnavailable`.
    fn send(&self, body: &Value) -> Result<GatewayResponse, AssistantError>;
}

/// Assistant front door over a gateway.
pub struct AssistantClient<G: AssistantGateway> {
    gateway: G,
    model: String,
}

impl<G: AssistantGateway> AssistantClient<G> {
    pub fn new(gateway: G) -> Self {
        Self::with_model(gateway, DEFAULT_ASSISTANT_MODEL)
    }

    pub fn with_model(gateway: G, model: impl Into<String>) -> Self {
        Self {
            gateway,
            model: model.into(),
        }
    }

    pub fn ask(&self, request: &AssistantRequest) -> Result<AssistantReply, AssistantError> {
        let result = request.validate().and_then(|()| {
            let body = build_gateway_body(request, &self.model);
            let response = self.gateway.send(&body)?;
            parse_gateway_response(request.mode, response.status, &response.body)
        });
        match &result {
            Ok(_) => debug!(
                "event=assistant_reply module=assistant status=ok user_id={} mode={}",
                request.user_id,
                request.mode.as_str()
            ),
            Err(err) => warn!(
                "event=assistant_error module=assistant status=error user_id={} mode={} code={}",
                request.user_id,
                request.mode.as_str(),
                err.code()
            ),
        }
        result
    }
}
