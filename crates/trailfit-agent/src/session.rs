//! Per-conversation state over a shared [`Orchestrator`].

use std::sync::Arc;

use trailfit_profile::FeedbackContext;

use crate::context::infer_category;
use crate::error::AgentError;
use crate::intent::classify;
use crate::llm::{self, ChatMessage, LlmReply};
use crate::messages;
use crate::orchestrator::{search_request, Notice, Orchestrator, Payload, Request, Response};
use crate::tools::{definitions, ToolInvocation};

/// Messages kept for the language model, oldest dropped first.
const TRANSCRIPT_LIMIT: usize = 20;

const SYSTEM_PROMPT: &str = "You are a helpful outdoor-apparel shopping assistant. Use the \
    tools to search the catalog, save the shopper's preferences, and record their feedback. \
    Only describe products returned by a tool.";

/// The most recent search, kept so feedback can refer back to it.
#[derive(Debug, Clone)]
struct LastSearch {
    request: Request,
    category: Option<String>,
    /// Mean price of the results shown.
    reference_price: Option<f64>,
}

/// One conversation. Not shared between tasks; create one per client.
pub struct Session {
    orchestrator: Arc<Orchestrator>,
    user_id: Option<String>,
    tracked: bool,
    last: Option<LastSearch>,
    transcript: Vec<ChatMessage>,
}

impl Session {
    pub fn new(orchestrator: Arc<Orchestrator>, user_id: Option<&str>) -> Self {
        Self {
            orchestrator,
            user_id: user_id.map(str::to_owned),
            tracked: false,
            last: None,
            transcript: Vec::new(),
        }
    }

    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Switch to another user. The previous search is forgotten.
    pub fn set_user(&mut self, user_id: Option<&str>) {
        self.user_id = user_id.map(str::to_owned);
        self.tracked = false;
        self.last = None;
    }

    /// End the conversation, dropping session-only preferences.
    pub fn end(self) {
        if let Some(user) = &self.user_id {
            self.orchestrator.store().clear_session(user);
        }
    }

    /// Handle one request with rule-based routing.
    ///
    /// Text that reads as feedback on the previous search is recorded and
    /// the previous search re-runs with the updated preferences.
    ///
    /// # Errors
    ///
    /// [`AgentError::InvalidInput`] for malformed requests; see
    /// [`Orchestrator::handle`].
    pub async fn handle(&mut self, request: Request) -> Result<Response, AgentError> {
        let mut notices = Vec::new();
        let greeting = self.track(&mut notices)?;
        let response = self.turn(&request, notices).await?;
        let response = self.orchestrator.phrase(response).await;
        Ok(self.finish(&request.query, response, greeting))
    }

    /// Handle free text, letting the language model pick a tool. Falls back
    /// to [`Session::handle`] routing when no model is configured, the model
    /// is unavailable, or its tool call does not decode.
    ///
    /// # Errors
    ///
    /// [`AgentError::InvalidInput`] for malformed requests.
    pub async fn converse(&mut self, text: &str) -> Result<Response, AgentError> {
        let Some(model) = self.orchestrator.language_model() else {
            return self.handle(Request::new(text)).await;
        };

        let mut notices = Vec::new();
        let greeting = self.track(&mut notices)?;

        let mut conversation = vec![ChatMessage::system(SYSTEM_PROMPT)];
        if let Some(user) = &self.user_id {
            conversation.push(ChatMessage::system(format!(
                "Shopper {user}: {}.",
                self.orchestrator.store().summary(user)
            )));
        }
        conversation.extend(self.transcript.iter().cloned());
        conversation.push(ChatMessage::user(text));

        let reply = llm::complete_with_retry(
            model.as_ref(),
            &conversation,
            &definitions(),
            self.orchestrator.llm_timeout(),
        )
        .await;

        let response = match reply {
            Ok(LlmReply::ToolCall { name, arguments }) => {
                match ToolInvocation::decode(&name, arguments) {
                    Ok(tool) => {
                        let response = self.run_tool(tool, notices).await?;
                        self.orchestrator.phrase(response).await
                    }
                    Err(e) => {
                        tracing::warn!(tool = %name, error = %e, "undecodable tool call, using rule-based routing");
                        self.turn(&Request::new(text), notices).await?
                    }
                }
            }
            Ok(LlmReply::Text(message)) => Response {
                intent: classify(text),
                payload: Payload::Reply,
                context: Default::default(),
                notices,
                message,
            },
            Err(e) => {
                tracing::warn!(error = %e, "language model unavailable, using rule-based routing");
                self.turn(&Request::new(text), notices).await?
            }
        };
        Ok(self.finish(text, response, greeting))
    }

    /// Identify the user on the first turn. Returns a greeting for a
    /// returning user with saved preferences.
    fn track(&mut self, notices: &mut Vec<Notice>) -> Result<Option<String>, AgentError> {
        if self.tracked {
            return Ok(None);
        }
        let Some(user) = self.user_id.clone() else {
            return Ok(None);
        };
        let (id, returning) = self.orchestrator.identify(&user, notices)?;
        self.tracked = true;
        self.user_id = Some(id.clone());

        if !returning {
            return Ok(None);
        }
        let read = self.orchestrator.store().get(&id);
        if read.warning.is_some() || !read.profile.has_preferences() {
            return Ok(None);
        }
        Ok(Some(messages::greeting(
            &id,
            &self.orchestrator.store().summary(&id),
        )))
    }

    async fn turn(&mut self, request: &Request, notices: Vec<Notice>) -> Result<Response, AgentError> {
        let last_category = self.last.as_ref().map(|l| l.category.as_deref());
        if let Some(last_category) = last_category {
            if self.user_id.is_some() && self.orchestrator.is_feedback(request, last_category) {
                return self.feedback(&request.query, None, notices).await;
            }
        }
        let response = self
            .orchestrator
            .respond(request, self.user_id.as_deref(), notices)
            .await?;
        self.remember(request, &response);
        Ok(response)
    }

    async fn run_tool(
        &mut self,
        tool: ToolInvocation,
        notices: Vec<Notice>,
    ) -> Result<Response, AgentError> {
        if let Some(request) = search_request(&tool)? {
            let response = self
                .orchestrator
                .respond(&request, self.user_id.as_deref(), notices)
                .await?;
            self.remember(&request, &response);
            return Ok(response);
        }
        if let ToolInvocation::RecordFeedback { text, category } = &tool {
            if self.user_id.is_some() {
                return self.feedback(text, category.clone(), notices).await;
            }
        }
        self.orchestrator
            .run_tool(tool, self.user_id.as_deref(), notices)
            .await
    }

    /// Record feedback against the previous search and re-run it.
    async fn feedback(
        &mut self,
        text: &str,
        category: Option<String>,
        mut notices: Vec<Notice>,
    ) -> Result<Response, AgentError> {
        let Some(user) = self.user_id.clone() else {
            return Err(AgentError::InvalidInput(
                "recording feedback requires a user id".to_owned(),
            ));
        };
        let last = self.last.clone();
        let context = FeedbackContext {
            category: category.or_else(|| last.as_ref().and_then(|l| l.category.clone())),
            reference_price: last.as_ref().and_then(|l| l.reference_price),
        };
        let signals = self
            .orchestrator
            .apply_feedback(&user, text, &context, &mut notices)?;
        let acknowledgement = messages::feedback(&signals);

        let Some(last) = last else {
            return Ok(Response {
                intent: classify(text),
                payload: Payload::Feedback {
                    signals,
                    result: None,
                },
                context: Default::default(),
                notices,
                message: acknowledgement,
            });
        };

        let rerun = self
            .orchestrator
            .respond(&last.request, Some(&user), notices)
            .await?;
        self.remember(&last.request, &rerun);
        Ok(Response {
            intent: rerun.intent,
            message: format!("{acknowledgement} {}", rerun.message),
            payload: Payload::Feedback {
                signals,
                result: rerun.result().cloned(),
            },
            context: rerun.context,
            notices: rerun.notices,
        })
    }

    #[allow(clippy::cast_precision_loss)]
    fn remember(&mut self, request: &Request, response: &Response) {
        let result = match &response.payload {
            Payload::Search { result } => result,
            // Outfits span categories, so feedback has nothing single to re-run.
            Payload::Outfit { .. } => {
                self.last = None;
                return;
            }
            _ => return,
        };
        let reference_price = (!result.is_empty()).then(|| {
            result.hits.iter().map(|h| h.product.price).sum::<f64>() / result.len() as f64
        });
        self.last = Some(LastSearch {
            request: request.clone(),
            category: infer_category(&request.query).map(str::to_owned),
            reference_price,
        });
    }

    fn finish(&mut self, text: &str, mut response: Response, greeting: Option<String>) -> Response {
        if let Some(greeting) = greeting {
            response.message = format!("{greeting} {}", response.message);
        }
        self.transcript.push(ChatMessage::user(text));
        self.transcript
            .push(ChatMessage::assistant(response.message.clone()));
        if self.transcript.len() > TRANSCRIPT_LIMIT {
            let excess = self.transcript.len() - TRANSCRIPT_LIMIT;
            self.transcript.drain(..excess);
        }
        response
    }
}
