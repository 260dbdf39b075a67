//! Gateway wire format: request bodies and tool-call payloads.
//!
//! # Responsibility
//! - Build chat-completion request bodies per assistant mode.
//! - Parse completion responses into typed replies.
//!
//! # Invariants
//! - Tool arguments are validated before they reach the task flow.
//! - Missing priorities default to `medium`.

use crate::assistant::{AssistantError, AssistantMode, AssistantRequest};
use crate::model::activity::{NewTask, TaskPriority, TaskRecord};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const CREATE_TASK_TOOL: &str = "create_task";
const DECOMPOSE_TOOL: &str = "decompose_task";
const CHAT_SYSTEM_PROMPT: &str = "You are a helpful productivity assistant. Help users with task management, time management, study techniques, and motivation. Keep responses concise and actionable.";

/// Task extracted from natural language by the `create_task` tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskDraft {
    pub title: String,
    pub description: Option<String>,
    pub priority: TaskPriority,
    pub category: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub estimated_time: Option<u32>,
}

impl From<TaskDraft> for NewTask {
    fn from(value: TaskDraft) -> Self {
        NewTask {
            title: value.title,
            description: value.description,
            priority: value.priority,
            category: value.category,
            due_date: value.due_date,
            estimated_time: value.estimated_time,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubtaskDraft {
    pub title: String,
    pub description: Option<String>,
    pub priority: TaskPriority,
    pub estimated_time: Option<u32>,
}

/// Output of the `decompose_task` tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decomposition {
    pub subtasks: Vec<SubtaskDraft>,
    pub explanation: String,
}

/// Typed assistant reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssistantReply {
    Message { content: String },
    TaskCreated { task: TaskDraft },
    Decomposed { decomposition: Decomposition },
}

#[derive(Debug, Deserialize)]
struct CompletionBody {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ToolCall>,
}

#[derive(Debug, Deserialize)]
struct ToolCall {
    function: FunctionCall,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    name: String,
    /// JSON-encoded argument object.
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct RawTaskArgs {
    title: String,
    description: Option<String>,
    priority: Option<String>,
    category: Option<String>,
    due_date: Option<String>,
    estimated_time: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawSubtask {
    title: String,
    description: Option<String>,
    priority: Option<String>,
    estimated_time: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawDecomposition {
    subtasks: Vec<RawSubtask>,
    explanation: Option<String>,
}

#[derive(Debug, Serialize)]
struct PromptTask<'a> {
    title: &'a str,
    priority: &'static str,
    category: Option<&'a str>,
    due_date: Option<NaiveDate>,
    estimated_time: Option<u32>,
}

/// Builds the chat-completion body sent to the gateway.
pub fn build_gateway_body(request: &AssistantRequest, model: &str) -> Value {
    let system_prompt = match request.mode {
        AssistantMode::Prioritize => prioritize_prompt(&request.open_tasks),
        _ => CHAT_SYSTEM_PROMPT.to_string(),
    };
    let mut messages = vec![json!({ "role": "system", "content": system_prompt })];
    messages.extend(
        request
            .messages
            .iter()
            .map(|turn| json!({ "role": turn.role.as_str(), "content": turn.content })),
    );

    let mut body = json!({ "model": model, "messages": messages });
    let tool = match request.mode {
        AssistantMode::CreateTask => Some(create_task_tool()),
        AssistantMode::Decompose => Some(decompose_tool()),
        AssistantMode::Chat | AssistantMode::Prioritize => None,
    };
    if let Some((name, definition)) = tool {
        body["tools"] = json!([definition]);
        body["tool_choice"] = json!({ "type": "function", "function": { "name": name } });
    }
    body
}

/// Maps a gateway response onto a reply or a typed failure.
pub fn parse_gateway_response(
    mode: AssistantMode,
    status: u16,
    body: &str,
) -> Result<AssistantReply, AssistantError> {
    match status {
        200..=299 => {}
        429 => return Err(AssistantError::RateLimited),
        402 => return Err(AssistantError::PaymentRequired),
        other => {
            return Err(AssistantError::UpstreamUnavailable(format!(
                "gateway returned status {other}"
            )))
        }
    }

    let completion: CompletionBody = serde_json::from_str(body)
        .map_err(|err| AssistantError::Validation(format!("unreadable completion: {err}")))?;
    let message = completion
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message)
        .ok_or_else(|| AssistantError::Validation("completion has no choices".to_string()))?;

    if let Some(call) = message.tool_calls.into_iter().next() {
        return parse_tool_call(mode, &call.function);
    }
    match message.content {
        Some(content) if !content.trim().is_empty() => Ok(AssistantReply::Message { content }),
        _ => Err(AssistantError::Validation(
            "completion has neither content nor tool call".to_string(),
        )),
    }
}

fn parse_tool_call(
    mode: AssistantMode,
    call: &FunctionCall,
) -> Result<AssistantReply, AssistantError> {
    match (mode, call.name.as_str()) {
        (AssistantMode::CreateTask, CREATE_TASK_TOOL) => {
            let raw: RawTaskArgs = parse_arguments(&call.arguments)?;
            Ok(AssistantReply::TaskCreated {
                task: task_draft(raw)?,
            })
        }
        (AssistantMode::Decompose, DECOMPOSE_TOOL) => {
            let raw: RawDecomposition = parse_arguments(&call.arguments)?;
            if raw.subtasks.is_empty() {
                return Err(AssistantError::Validation(
                    "decomposition returned no subtasks".to_string(),
                ));
            }
            let subtasks = raw
                .subtasks
                .into_iter()
                .map(subtask_draft)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(AssistantReply::Decomposed {
                decomposition: Decomposition {
                    subtasks,
                    explanation: raw.explanation.unwrap_or_default(),
                },
            })
        }
        (mode, name) => Err(AssistantError::Validation(format!(
            "unexpected tool `{name}` for mode `{}`",
            mode.as_str()
        ))),
    }
}

fn parse_arguments<T: for<'de> Deserialize<'de>>(arguments: &str) -> Result<T, AssistantError> {
    serde_json::from_str(arguments)
        .map_err(|err| AssistantError::Validation(format!("malformed tool arguments: {err}")))
}

fn task_draft(raw: RawTaskArgs) -> Result<TaskDraft, AssistantError> {
    let draft = TaskDraft {
        title: required_title(raw.title)?,
        description: raw.description,
        priority: parse_priority(raw.priority.as_deref())?,
        category: raw.category,
        due_date: raw.due_date.as_deref().map(parse_due_date).transpose()?,
        estimated_time: raw.estimated_time.map(minutes).transpose()?,
    };
    NewTask::from(draft.clone())
        .validate()
        .map_err(|err| AssistantError::Validation(err.to_string()))?;
    Ok(draft)
}

fn subtask_draft(raw: RawSubtask) -> Result<SubtaskDraft, AssistantError> {
    Ok(SubtaskDraft {
        title: required_title(raw.title)?,
        description: raw.description,
        priority: parse_priority(raw.priority.as_deref())?,
        estimated_time: raw.estimated_time.map(minutes).transpose()?,
    })
}

fn required_title(title: String) -> Result<String, AssistantError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(AssistantError::Validation("tool returned an empty title".to_string()));
    }
    Ok(trimmed.to_string())
}

fn parse_priority(value: Option<&str>) -> Result<TaskPriority, AssistantError> {
    match value {
        None => Ok(TaskPriority::default()),
        Some(text) => TaskPriority::parse(text)
            .ok_or_else(|| AssistantError::Validation(format!("unknown priority `{text}`"))),
    }
}

/// Accepts `YYYY-MM-DD` or an ISO datetime whose date part is used.
fn parse_due_date(value: &str) -> Result<NaiveDate, AssistantError> {
    let date_part = value.trim().get(..10).unwrap_or(value.trim());
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .map_err(|_| AssistantError::Validation(format!("invalid due date `{value}`")))
}

fn minutes(value: f64) -> Result<u32, AssistantError> {
    if !value.is_finite() || value < 1.0 || value > f64::from(u32::MAX) {
        return Err(AssistantError::Validation(format!(
            "invalid estimated time `{value}`"
        )));
    }
    Ok(value.round() as u32)
}

fn prioritize_prompt(open_tasks: &[TaskRecord]) -> String {
    let tasks: Vec<PromptTask<'_>> = open_tasks
        .iter()
        .filter(|task| !task.completed)
        .map(|task| PromptTask {
            title: task.title.as_str(),
            priority: task.priority.as_str(),
            category: task.category.as_deref(),
            due_date: task.due_date,
            estimated_time: task.estimated_time,
        })
        .collect();
    let listing = serde_json::to_string(&tasks).unwrap_or_else(|_| "[]".to_string());
    format!(
        "You are analyzing tasks for prioritization. Here are the user's current tasks: {listing}.\n\
         Analyze them based on deadlines and due dates, priority levels, estimated time and categories.\n\
         Suggest the top 3 most important tasks to work on now and explain why."
    )
}

fn create_task_tool() -> (&'static str, Value) {
    (
        CREATE_TASK_TOOL,
        json!({
            "type": "function",
            "function": {
                "name": CREATE_TASK_TOOL,
                "description": "Extract task details from natural language input",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "title": { "type": "string", "description": "The task title" },
                        "description": { "type": "string", "description": "Task description or details" },
                        "priority": { "type": "string", "enum": ["low", "medium", "high"] },
                        "category": { "type": "string", "description": "Task category or project" },
                        "due_date": { "type": "string", "description": "Due date in ISO format" },
                        "estimated_time": { "type": "number", "description": "Estimated time in minutes" }
                    },
                    "required": ["title"],
                    "additionalProperties": false
                }
            }
        }),
    )
}

fn decompose_tool() -> (&'static str, Value) {
    (
        DECOMPOSE_TOOL,
        json!({
            "type": "function",
            "function": {
                "name": DECOMPOSE_TOOL,
                "description": "Break down a large task into smaller subtasks",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "subtasks": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "title": { "type": "string" },
                                    "description": { "type": "string" },
                                    "priority": { "type": "string", "enum": ["low", "medium", "high"] },
                                    "estimated_time": { "type": "number" }
                                },
                                "required": ["title"],
                                "additionalProperties": false
                            }
                        },
                        "explanation": { "type": "string" }
                    },
                    "required": ["subtasks"],
                    "additionalProperties": false
                }
            }
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::{build_gateway_body, parse_gateway_response, AssistantReply};
    use crate::assistant::{AssistantError, AssistantMode, AssistantRequest, ChatTurn};
    use crate::model::activity::TaskPriority;
    use chrono::NaiveDate;
    use serde_json::json;
    use uuid::Uuid;

    fn tool_body(name: &str, arguments: serde_json::Value) -> String {
        json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "function": { "name": name, "arguments": arguments.to_string() }
                    }]
                }
            }]
        })
        .to_string()
    }

    #[test]
    fn status_codes_map_to_distinct_errors() {
        assert_eq!(
            parse_gateway_response(AssistantMode::Chat, 429, "{}"),
            Err(AssistantError::RateLimited)
        );
        assert_eq!(
            parse_gateway_response(AssistantMode::Chat, 402, "{}"),
            Err(AssistantError::PaymentRequired)
        );
        assert!(matches!(
            parse_gateway_response(AssistantMode::Chat, 503, "{}"),
            Err(AssistantError::UpstreamUnavailable(_))
        ));
    }

    #[test]
    fn plain_completion_becomes_message() {
        let body = json!({ "choices": [{ "message": { "content": "Try a 25 minute block." } }] });
        let reply = parse_gateway_response(AssistantMode::Chat, 200, &body.to_string()).unwrap();
        assert_eq!(
            reply,
            AssistantReply::Message {
                content: "Try a 25 minute block.".to_string()
            }
        );
    }

    #[test]
    fn create_task_tool_defaults_priority_and_parses_datetime() {
        let body = tool_body(
            "create_task",
            json!({ "title": " Submit lab ", "due_date": "2026-04-02T17:00:00", "estimated_time": 45 }),
        );
        let reply = parse_gateway_response(AssistantMode::CreateTask, 200, &body).unwrap();
        let AssistantReply::TaskCreated { task } = reply else {
            panic!("expected task draft");
        };
        assert_eq!(task.title, "Submit lab");
        assert_eq!(task.priority, TaskPriority::Medium);
        assert_eq!(task.due_date, NaiveDate::from_ymd_opt(2026, 4, 2));
        assert_eq!(task.estimated_time, Some(45));
    }

    #[test]
    fn decompose_tool_requires_subtasks() {
        let empty = tool_body("decompose_task", json!({ "subtasks": [] }));
        assert!(matches!(
            parse_gateway_response(AssistantMode::Decompose, 200, &empty),
            Err(AssistantError::Validation(_))
        ));

        let body = tool_body(
            "decompose_task",
            json!({
                "subtasks": [
                    { "title": "Outline", "priority": "high" },
                    { "title": "Draft", "estimated_time": 60 }
                ],
                "explanation": "Split by phase"
            }),
        );
        let AssistantReply::Decomposed { decomposition } =
            parse_gateway_response(AssistantMode::Decompose, 200, &body).unwrap()
        else {
            panic!("expected decomposition");
        };
        assert_eq!(decomposition.subtasks.len(), 2);
        assert_eq!(decomposition.subtasks[0].priority, TaskPriority::High);
        assert_eq!(decomposition.explanation, "Split by phase");
    }

    #[test]
    fn tool_for_wrong_mode_is_rejected() {
        let body = tool_body("create_task", json!({ "title": "x" }));
        assert!(matches!(
            parse_gateway_response(AssistantMode::Decompose, 200, &body),
            Err(AssistantError::Validation(_))
        ));
    }

    #[test]
    fn request_body_carries_tool_choice_for_tool_modes() {
        let request = AssistantRequest::new(
            Uuid::new_v4(),
            AssistantMode::CreateTask,
            vec![ChatTurn::user("remind me to call the lab tomorrow")],
        );
        let body = build_gateway_body(&request, "test-model");
        assert_eq!(body["model"], "test-model");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["tool_choice"]["function"]["name"], "create_task");

        let chat = AssistantRequest::new(
            Uuid::new_v4(),
            AssistantMode::Chat,
            vec![ChatTurn::user("hi")],
        );
        assert!(build_gateway_body(&chat, "m").get("tools").is_none());
    }
}
