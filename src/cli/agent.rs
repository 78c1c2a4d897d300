//! Chat loop that lets an OpenAI-compatible model call the server's tools.
use std::env;

use anyhow::{anyhow, bail, Context, Result};
use rmcp::model::Tool;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};

use super::{
    client::{self, ClientSession},
    AgentArgs,
};
use crate::server::config::AgentSection;

pub const SYSTEM_PROMPT: &str = "You are a helpful GIS assistant. \
    You have access to various GIS tools through the MCP server. \
    Use these tools to help users with geospatial operations. \
    Always provide clear and accurate responses based on the tool results.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    fn text(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    fn tool_result(call_id: &str, content: String) -> Self {
        Self {
            tool_call_id: Some(call_id.to_string()),
            ..Self::text("tool", content)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_kind")]
    pub kind: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded argument object.
    #[serde(default)]
    pub arguments: String,
}

fn function_kind() -> String {
    "function".to_string()
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// MCP tools as OpenAI-style function definitions.
pub fn function_definitions(tools: &[Tool]) -> Vec<Value> {
    tools
        .iter()
        .map(|tool| {
            json!({
                "type": "function",
                "function": {
                    "name": tool.name,
                    "description": tool.description.as_deref().unwrap_or_default(),
                    "parameters": Value::Object((*tool.input_schema).clone()),
                }
            })
        })
        .collect()
}

/// Key from the configured environment variable; missing keys fail before any request.
pub fn api_key(section: &AgentSection) -> Result<String> {
    env::var(&section.api_key_env)
        .ok()
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
        .ok_or_else(|| {
            anyhow!(
                "{} is not set; export an API key for the agent",
                section.api_key_env
            )
        })
}

struct ChatClient {
    http: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl ChatClient {
    fn new(section: &AgentSection, api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: format!("{}/chat/completions", section.base_url),
            api_key,
            model: section.model.clone(),
            temperature: section.temperature,
        }
    }

    async fn complete(&self, messages: &[ChatMessage], tools: &[Value]) -> Result<ChatMessage> {
        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
        });
        if !tools.is_empty() {
            body["tools"] = Value::Array(tools.to_vec());
        }
        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("chat request to {} failed", self.url))?;
        let status = response.status();
        let text = response.text().await.context("failed to read the chat response")?;
        if !status.is_success() {
            bail!("chat endpoint returned {status}: {text}");
        }
        let parsed: ChatResponse =
            serde_json::from_str(&text).context("failed to parse the chat response")?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| anyhow!("chat response contained no choices"))
    }
}

/// Run one tool call and render its outcome for the model.
async fn run_tool_call(session: &ClientSession, call: &ToolCall) -> String {
    let outcome = match client::parse_arguments(&call.function.arguments) {
        Ok(arguments) => client::call(session, &call.function.name, arguments).await,
        Err(err) => Err(err),
    };
    match outcome {
        Ok(value) => value.to_string(),
        Err(err) => {
            tracing::warn!(
                target: "gis_mcp::client",
                tool = %call.function.name,
                error = %err,
                "tool call from the model failed"
            );
            json!({ "error": format!("{err:#}") }).to_string()
        }
    }
}

/// Answer one user turn, executing tool calls until the model replies with text.
async fn answer(
    chat: &ChatClient,
    session: &ClientSession,
    tools: &[Value],
    history: &mut Vec<ChatMessage>,
    max_rounds: u8,
) -> Result<String> {
    for round in 0..max_rounds {
        let reply = chat.complete(history, tools).await?;
        history.push(reply.clone());
        if reply.tool_calls.is_empty() {
            return Ok(reply.content.unwrap_or_default());
        }
        tracing::debug!(
            target: "gis_mcp::client",
            round,
            calls = reply.tool_calls.len(),
            "model requested tool calls"
        );
        for call in &reply.tool_calls {
            let content = run_tool_call(session, call).await;
            history.push(ChatMessage::tool_result(&call.id, content));
        }
    }
    Ok(format!(
        "Stopped after {max_rounds} tool rounds without a final answer."
    ))
}

pub async fn run(args: AgentArgs, section: &AgentSection) -> Result<String> {
    let key = api_key(section)?;
    let session = client::connect(&args.addr).await?;
    let tools = session.list_all_tools().await.context("tools/list failed")?;
    let definitions = function_definitions(&tools);
    let chat = ChatClient::new(section, key);
    tracing::info!(
        target: "gis_mcp::client",
        model = %section.model,
        tools = definitions.len(),
        "agent ready"
    );

    let mut history = vec![ChatMessage::text("system", SYSTEM_PROMPT)];
    let outcome = match args.prompt {
        Some(prompt) => {
            history.push(ChatMessage::text("user", prompt));
            answer(&chat, &session, &definitions, &mut history, section.max_tool_rounds).await
        }
        None => interactive(&chat, &session, &definitions, &mut history, section.max_tool_rounds)
            .await
            .map(|_| String::new()),
    };
    session.cancel().await.context("failed to close the session")?;
    outcome
}

/// Next non-blank prompt; `None` at end of input or on `exit`/`quit`.
async fn next_prompt<R: AsyncBufRead + Unpin>(input: &mut R) -> io::Result<Option<String>> {
    let mut line = String::new();
    loop {
        line.clear();
        if input.read_line(&mut line).await? == 0 {
            return Ok(None);
        }
        match line.trim() {
            "" => continue,
            "exit" | "quit" => return Ok(None),
            prompt => return Ok(Some(prompt.to_string())),
        }
    }
}

async fn interactive(
    chat: &ChatClient,
    session: &ClientSession,
    tools: &[Value],
    history: &mut Vec<ChatMessage>,
    max_rounds: u8,
) -> Result<()> {
    let mut stdin = BufReader::new(io::stdin());
    let mut stdout = io::stdout();
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
        let Some(prompt) = next_prompt(&mut stdin).await? else {
            return Ok(());
        };
        history.push(ChatMessage::text("user", prompt));
        match answer(chat, session, tools, history, max_rounds).await {
            Ok(reply) => stdout.write_all(format!("{reply}\n").as_bytes()).await?,
            Err(err) => eprintln!("error: {err:#}"),
        }
    }
}
