//! The agent's reply cycle: one user turn in, one spoken reply out.

use crate::tools::AdvisorTools;
use anyhow::Result;
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestToolMessageArgs,
    ChatCompletionRequestUserMessageArgs,
};
use finbot_core::llm_client::{LLMAction, LLMClient, LLMStreamEvent};
use futures_util::StreamExt;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// What the LLM produced for a turn.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub text: String,
    /// Time from the start of the turn to the first reply text, including any
    /// tool round trips.
    pub ttft: Option<Duration>,
    pub tool_calls: usize,
}

/// The running chat transcript, opened by the system instructions.
pub struct Conversation {
    messages: Vec<ChatCompletionRequestMessage>,
}

impl Conversation {
    pub fn new(instructions: &str) -> Result<Self> {
        Ok(Self {
            messages: vec![
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(instructions)
                    .build()?
                    .into(),
            ],
        })
    }

    pub fn messages(&self) -> &[ChatCompletionRequestMessage] {
        &self.messages
    }

    fn push_user(&mut self, text: &str) -> Result<()> {
        self.messages.push(
            ChatCompletionRequestUserMessageArgs::default()
                .content(text)
                .build()?
                .into(),
        );
        Ok(())
    }

    fn push_assistant(&mut self, text: &str) -> Result<()> {
        self.messages.push(
            ChatCompletionRequestAssistantMessageArgs::default()
                .content(text)
                .build()?
                .into(),
        );
        Ok(())
    }
}

/// Generates a reply steered by one-off `instructions`, without tools.
///
/// The instructions are not kept in the transcript; the reply is.
pub async fn generate_reply(
    llm: &dyn LLMClient,
    conversation: &mut Conversation,
    instructions: &str,
) -> Result<Reply> {
    let mut messages = conversation.messages.clone();
    messages.push(
        ChatCompletionRequestSystemMessageArgs::default()
            .content(instructions)
            .build()?
            .into(),
    );

    let started = Instant::now();
    let text = match llm.decide_action(messages, vec![]).await? {
        LLMAction::TextResponse(text) => text,
        LLMAction::ToolCall(calls) => {
            warn!(count = calls.len(), "Ignoring tool calls on an instructed reply");
            String::new()
        }
    };
    let ttft = (!text.is_empty()).then(|| started.elapsed());

    if !text.is_empty() {
        conversation.push_assistant(&text)?;
    }
    Ok(Reply {
        text,
        ttft,
        tool_calls: 0,
    })
}

/// Answers a user turn, running any tools the LLM asks for.
///
/// 1. Append the transcript and ask the LLM to reply or call tools.
/// 2. If tools are chosen, execute them and stream the follow-up reply.
/// 3. Record the final reply in the conversation.
pub async fn handle_user_turn(
    llm: &dyn LLMClient,
    tools: &AdvisorTools,
    conversation: &mut Conversation,
    transcript: &str,
) -> Result<Reply> {
    let started = Instant::now();
    conversation.push_user(transcript)?;

    let action = llm
        .decide_action(conversation.messages.clone(), tools.definitions().to_vec())
        .await?;

    let reply = match action {
        LLMAction::TextResponse(text) => Reply {
            ttft: Some(started.elapsed()),
            text,
            tool_calls: 0,
        },
        LLMAction::ToolCall(tool_calls) => {
            let mut results = Vec::with_capacity(tool_calls.len());
            for call in &tool_calls {
                debug!(tool = %call.function.name, "Dispatching tool call");
                results.push(tools.call(call).await?);
            }

            conversation.messages.push(
                ChatCompletionRequestAssistantMessageArgs::default()
                    .tool_calls(tool_calls.clone())
                    .build()?
                    .into(),
            );
            for (call, result) in tool_calls.iter().zip(results) {
                conversation.messages.push(
                    ChatCompletionRequestToolMessageArgs::default()
                        .tool_call_id(call.id.clone())
                        .content(result)
                        .build()?
                        .into(),
                );
            }

            let mut stream = llm.stream_reply(conversation.messages.clone()).await?;
            let mut text = String::new();
            let mut ttft = None;
            while let Some(event) = stream.next().await {
                match event {
                    Ok(LLMStreamEvent::TextChunk(chunk)) => {
                        ttft.get_or_insert_with(|| started.elapsed());
                        text.push_str(&chunk);
                    }
                    Err(e) => {
                        warn!(error = %e, "LLM stream ended with an error");
                        break;
                    }
                }
            }
            Reply {
                text,
                ttft,
                tool_calls: tool_calls.len(),
            }
        }
    };

    if !reply.text.is_empty() {
        conversation.push_assistant(&reply.text)?;
    }
    Ok(reply)
}
