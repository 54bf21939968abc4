//! Agentic loop driver.
//!
//! Each run executes on its own task and reports progress through a bounded
//! channel, so events reach the caller as they happen. Dropping the stream
//! stops the run at its next emission; a tool call already dispatched is
//! allowed to finish.
//!
//! Loop state (remaining rounds and the internal conversation) is passed
//! into each step and handed back in [`Step::Continue`], never captured.

use std::sync::Arc;

use mcpchat_core::{
    ChatMessage, Conversation, FunctionCallRequest, FunctionDeclaration, LlmPort, LlmRequest,
    ToolExecutor, Turn, TurnPart, TurnRole,
};
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use crate::bridge::ToolBridge;
use crate::config::AgentConfig;
use crate::events::{AgentEvent, AvailableTool, DoneReason};
use crate::prompt::build_system_instruction;

const EVENT_BUFFER: usize = 32;

/// Events of one run, in emission order.
pub type AgentEventStream = ReceiverStream<AgentEvent>;

/// The receiver went away; the run stops.
#[derive(Debug)]
struct StreamClosed;

struct Emitter {
    tx: mpsc::Sender<AgentEvent>,
}

impl Emitter {
    async fn emit(&self, event: AgentEvent) -> Result<(), StreamClosed> {
        self.tx.send(event).await.map_err(|_| StreamClosed)
    }
}

struct LoopState {
    remaining: usize,
    round: usize,
    conversation: Conversation,
}

enum Step {
    Continue(LoopState),
    Finished,
}

/// Drives a model through tool calls until it answers.
#[derive(Clone)]
pub struct AgentLoop {
    llm: Arc<dyn LlmPort>,
    executor: Arc<dyn ToolExecutor>,
    config: AgentConfig,
}

impl AgentLoop {
    pub fn new(llm: Arc<dyn LlmPort>, executor: Arc<dyn ToolExecutor>, config: AgentConfig) -> Self {
        Self {
            llm,
            executor,
            config,
        }
    }

    /// Start a run over the external chat history.
    pub fn run(&self, messages: Vec<ChatMessage>) -> AgentEventStream {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let this = self.clone();
        tokio::spawn(async move {
            if this.drive(messages, Emitter { tx }).await.is_err() {
                debug!("Agent event stream closed by caller, stopping run");
            }
        });
        ReceiverStream::new(rx)
    }

    async fn drive(&self, messages: Vec<ChatMessage>, out: Emitter) -> Result<(), StreamClosed> {
        let bridge = ToolBridge::connect(Arc::clone(&self.executor), self.config.tool_timeout).await;
        let tools = bridge.router().tools();
        out.emit(AgentEvent::ToolsAvailable {
            tools: tools.iter().map(AvailableTool::from).collect(),
        })
        .await?;

        let mut conversation = Conversation::from_messages(&messages);

        if bridge.router().is_empty() {
            debug!("No tools connected, using a plain completion");
            return self.plain_completion(conversation, &out).await;
        }

        info!(tools = tools.len(), max_iterations = self.config.max_iterations, "Starting agent loop");
        conversation.inject_instruction(build_system_instruction(tools));
        let declarations = bridge.router().declarations();

        let mut state = LoopState {
            remaining: self.config.max_iterations,
            round: 0,
            conversation,
        };
        loop {
            match self.step(state, &bridge, &declarations, &out).await? {
                Step::Continue(next) => state = next,
                Step::Finished => return Ok(()),
            }
        }
    }

    async fn plain_completion(
        &self,
        conversation: Conversation,
        out: &Emitter,
    ) -> Result<(), StreamClosed> {
        let request = LlmRequest {
            contents: conversation.into_turns(),
            functions: Vec::new(),
        };
        match self.llm.generate(request).await {
            Ok(response) => {
                out.emit(AgentEvent::Text {
                    content: response.text.unwrap_or_default(),
                })
                .await?;
                out.emit(AgentEvent::Done {
                    reason: DoneReason::Completed,
                })
                .await
            }
            Err(e) => {
                warn!(error = %e, "Language model call failed");
                out.emit(AgentEvent::Error {
                    message: e.to_string(),
                })
                .await
            }
        }
    }

    /// One model round plus the tool calls it requested.
    async fn step(
        &self,
        mut state: LoopState,
        bridge: &ToolBridge,
        declarations: &[FunctionDeclaration],
        out: &Emitter,
    ) -> Result<Step, StreamClosed> {
        if state.remaining == 0 {
            warn!(rounds = state.round, "Agent loop hit its iteration limit");
            out.emit(AgentEvent::Done {
                reason: DoneReason::IterationLimit,
            })
            .await?;
            return Ok(Step::Finished);
        }

        let request = LlmRequest {
            contents: state.conversation.turns().to_vec(),
            functions: declarations.to_vec(),
        };
        let response = match self.llm.generate(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(round = state.round, error = %e, "Language model call failed");
                out.emit(AgentEvent::Error {
                    message: e.to_string(),
                })
                .await?;
                return Ok(Step::Finished);
            }
        };

        if response.function_calls.is_empty() {
            debug!(round = state.round, "Model answered without tool calls");
            out.emit(AgentEvent::Text {
                content: response.text.unwrap_or_default(),
            })
            .await?;
            out.emit(AgentEvent::Done {
                reason: DoneReason::Completed,
            })
            .await?;
            return Ok(Step::Finished);
        }

        debug!(round = state.round, calls = response.function_calls.len(), "Model requested tools");
        // Text the model sent alongside its calls rides in the first call's turn
        let mut preamble = response.text.filter(|text| !text.trim().is_empty());
        for (index, request) in response.function_calls.into_iter().enumerate() {
            let FunctionCallRequest { id, name, args } = request;
            let call_id = id
                .clone()
                .unwrap_or_else(|| format!("call-{}-{index}", state.round));

            let call = bridge.prepare(call_id, name, args);
            out.emit(AgentEvent::ToolCall(call.clone())).await?;

            let result = bridge.execute(&call).await;
            let response = if result.is_error {
                json!({ "error": result.result.clone() })
            } else {
                json!({ "result": result.result.clone() })
            };
            out.emit(AgentEvent::ToolResult(result)).await?;

            let mut parts: Vec<TurnPart> = preamble.take().map(TurnPart::Text).into_iter().collect();
            parts.push(TurnPart::FunctionCall {
                id,
                name: call.name.clone(),
                args: call.args,
            });
            state.conversation.push(Turn {
                role: TurnRole::Model,
                parts,
            });
            state.conversation.push_function_response(call.name, response);
        }

        Ok(Step::Continue(LoopState {
            remaining: state.remaining - 1,
            round: state.round + 1,
            conversation: state.conversation,
        }))
    }
}
