//! The request state machine: classify, identify, fetch context, rewrite,
//! dispatch, emit.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use trailfit_core::{
    normalize_user_id, AppConfig, Attribute, CatalogSummary, FeedbackSignal, Product, UserProfile,
};
use trailfit_profile::{FeedbackContext, PreferenceStore, ProfileUpdate, StoreError};
use trailfit_retrieval::{
    Constraint, HybridEngine, Predicate, RetrievalError, SearchMode, SearchResult,
};

use crate::climate;
use crate::context::{self, infer_category, AppliedContext, PreferenceSnapshot};
use crate::error::AgentError;
use crate::intent::{classify, mentions, normalize, Intent};
use crate::llm::{self, ChatMessage, LanguageModel, LlmReply};
use crate::messages;
use crate::session::Session;
use crate::styling::{Activity, OutfitPiece, OutfitPlan, PIECES_PER_CATEGORY};
use crate::tools::{predicate_from_filters, ToolInvocation};

/// Comparison requests never return more candidates than this.
const COMPARISON_MAX_K: usize = 5;

const PHRASING_PROMPT: &str = "You are an outdoor-apparel shopping assistant. Rewrite the \
    summary below as a short, friendly reply to the shopper. Mention only the products listed; \
    never invent products, prices, or availability.";

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Result count when a request does not give one.
    pub default_k: usize,
    pub llm_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            default_k: 10,
            llm_timeout: Duration::from_millis(20_000),
        }
    }
}

impl OrchestratorConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            default_k: config.default_k,
            llm_timeout: Duration::from_millis(config.llm_timeout_ms),
        }
    }
}

/// One search request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Request {
    pub query: String,
    pub k: Option<usize>,
    /// Explicit structural filters from the caller.
    pub filters: Predicate,
    /// Caller-supplied preferences. When set, the store is not consulted.
    pub preferences: Option<PreferenceSnapshot>,
}

impl Request {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_k(mut self, k: usize) -> Self {
        self.k = Some(k);
        self
    }

    #[must_use]
    pub fn with_filters(mut self, filters: Predicate) -> Self {
        self.filters = filters;
        self
    }

    #[must_use]
    pub fn with_preferences(mut self, snapshot: PreferenceSnapshot) -> Self {
        self.preferences = Some(snapshot);
        self
    }
}

/// A degraded-but-successful outcome the caller should know about.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    /// Preferences could not be read; the request ran unpersonalized.
    PersonalizationUnavailable { reason: String },
    /// The similarity oracle stayed unavailable after the retry.
    SearchUnavailable { reason: String },
    /// A preference or feedback write failed and was rolled back.
    PreferencesNotSaved { reason: String },
    /// A hybrid predicate matched nothing and this constraint was dropped.
    PredicateRelaxed { dropped: Constraint },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    Search {
        result: SearchResult,
    },
    Catalog {
        summary: CatalogSummary,
    },
    Preferences {
        profile: UserProfile,
    },
    /// One search per outfit category. Categories with no match are left
    /// out.
    Outfit {
        plan: OutfitPlan,
        pieces: Vec<OutfitPiece>,
    },
    /// Feedback was recorded and, inside a session, the previous search was
    /// re-run with the updated preferences.
    Feedback {
        signals: Vec<FeedbackSignal>,
        result: Option<SearchResult>,
    },
    /// Conversational text with no data attached.
    Reply,
}

/// Everything the external formatter needs. Never formatted here.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub intent: Intent,
    pub payload: Payload,
    pub context: AppliedContext,
    pub notices: Vec<Notice>,
    pub message: String,
}

impl Response {
    /// The search result carried by the payload, if any.
    #[must_use]
    pub fn result(&self) -> Option<&SearchResult> {
        match &self.payload {
            Payload::Search { result } => Some(result),
            Payload::Feedback { result, .. } => result.as_ref(),
            _ => None,
        }
    }

    /// Every product the payload carries, outfit pieces included.
    #[must_use]
    pub fn products(&self) -> Vec<&Product> {
        match &self.payload {
            Payload::Outfit { pieces, .. } => pieces
                .iter()
                .flat_map(|p| p.result.hits.iter().map(|h| &h.product))
                .collect(),
            _ => self
                .result()
                .map(|r| r.hits.iter().map(|h| &h.product).collect())
                .unwrap_or_default(),
        }
    }
}

/// Shared, stateless request handling. Per-conversation state lives in
/// [`Session`].
pub struct Orchestrator {
    engine: HybridEngine,
    store: Arc<PreferenceStore>,
    llm: Option<Arc<dyn LanguageModel>>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    #[must_use]
    pub fn new(engine: HybridEngine, store: Arc<PreferenceStore>, config: OrchestratorConfig) -> Self {
        Self {
            engine,
            store,
            llm: None,
            config,
        }
    }

    #[must_use]
    pub fn with_language_model(mut self, model: Arc<dyn LanguageModel>) -> Self {
        self.llm = Some(model);
        self
    }

    #[must_use]
    pub fn engine(&self) -> &HybridEngine {
        &self.engine
    }

    #[must_use]
    pub fn store(&self) -> &PreferenceStore {
        &self.store
    }

    #[must_use]
    pub fn session(self: &Arc<Self>, user_id: Option<&str>) -> Session {
        Session::new(Arc::clone(self), user_id)
    }

    /// Handle one request outside any session.
    ///
    /// # Errors
    ///
    /// [`AgentError::InvalidInput`] for a zero `k`, a blank query with no
    /// filters, or a blank user id. Oracle and storage failures degrade into
    /// [`Notice`]s instead.
    pub async fn handle(&self, request: &Request, user_id: Option<&str>) -> Result<Response, AgentError> {
        let mut notices = Vec::new();
        let user = match user_id {
            Some(id) => Some(self.identify(id, &mut notices)?.0),
            None => None,
        };
        self.respond(request, user.as_deref(), notices).await
    }

    /// Run a decoded tool call on behalf of `user_id`.
    ///
    /// # Errors
    ///
    /// As [`Orchestrator::handle`], plus [`AgentError::InvalidInput`] for
    /// filters that do not parse and for preference tools without a user.
    pub async fn execute(
        &self,
        tool: ToolInvocation,
        user_id: Option<&str>,
    ) -> Result<Response, AgentError> {
        let mut notices = Vec::new();
        let user = match user_id {
            Some(id) => Some(self.identify(id, &mut notices)?.0),
            None => None,
        };
        self.run_tool(tool, user.as_deref(), notices).await
    }

    /// Products similar to `product_id`.
    ///
    /// # Errors
    ///
    /// [`AgentError::InvalidInput`] for an unknown id or zero `k`.
    pub async fn find_similar(&self, product_id: &str, k: Option<usize>) -> Result<Response, AgentError> {
        self.similar(product_id, k, Vec::new()).await
    }

    /// Merge preference sections for `user_id`.
    ///
    /// # Errors
    ///
    /// [`AgentError::InvalidInput`] for a blank user id. A failed write is a
    /// [`Notice::PreferencesNotSaved`], not an error.
    pub fn save_preferences(
        &self,
        user_id: &str,
        update: ProfileUpdate,
        permanent: bool,
    ) -> Result<Response, AgentError> {
        self.save(Some(user_id), update, permanent, Vec::new())
    }

    /// Record feedback for `user_id` outside a session.
    ///
    /// # Errors
    ///
    /// [`AgentError::InvalidInput`] for a blank user id.
    pub fn record_feedback(
        &self,
        user_id: &str,
        text: &str,
        category: Option<&str>,
    ) -> Result<Response, AgentError> {
        let mut notices = Vec::new();
        let context = FeedbackContext {
            category: category.map(str::to_owned),
            reference_price: None,
        };
        let signals = self.apply_feedback(user_id, text, &context, &mut notices)?;
        Ok(Response {
            intent: Intent::Unknown,
            message: messages::feedback(&signals),
            payload: Payload::Feedback {
                signals,
                result: None,
            },
            context: AppliedContext::default(),
            notices,
        })
    }

    #[must_use]
    pub fn catalog_info(&self) -> Response {
        self.catalog_response(Vec::new())
    }

    pub(crate) fn language_model(&self) -> Option<Arc<dyn LanguageModel>> {
        self.llm.clone()
    }

    pub(crate) fn llm_timeout(&self) -> Duration {
        self.config.llm_timeout
    }

    /// Mark `user_id` as seen. Returns the normalized id and whether the
    /// user was already known.
    ///
    /// A visit never overwrites an unreadable preference document; the user
    /// is served unpersonalized until an explicit save replaces it.
    pub(crate) fn identify(
        &self,
        user_id: &str,
        notices: &mut Vec<Notice>,
    ) -> Result<(String, bool), AgentError> {
        let id = normalize_user_id(user_id);
        if id.is_empty() {
            return Err(AgentError::InvalidInput(format!("invalid user id {user_id:?}")));
        }
        if let Some(warning) = self.store.get(&id).warning {
            push_unique(
                notices,
                Notice::PersonalizationUnavailable {
                    reason: warning.to_string(),
                },
            );
            let known = self.store.exists(&id);
            return Ok((id, known));
        }

        match self.store.identify(&id) {
            Ok(identified) => Ok((identified.user_id, !identified.is_new)),
            Err(StoreError::InvalidUserId(id)) => {
                Err(AgentError::InvalidInput(format!("invalid user id {id:?}")))
            }
            Err(e) => {
                tracing::warn!(user = %user_id, error = %e, "could not record user visit");
                notices.push(Notice::PreferencesNotSaved {
                    reason: e.to_string(),
                });
                let known = self.store.exists(&id);
                Ok((id, known))
            }
        }
    }

    /// Whether `request`, arriving after a search in `last_category`, is
    /// feedback on it rather than a new request. It must carry feedback
    /// signals, come with no explicit filters, and not be a comparison, info,
    /// or styling request. A query naming a different product category than
    /// the last search is a new search ("now a blue jacket" after boots).
    pub(crate) fn is_feedback(&self, request: &Request, last_category: Option<&str>) -> bool {
        if !request.filters.is_empty() {
            return false;
        }
        if !matches!(classify(&request.query), Intent::Unknown | Intent::ProductSearch) {
            return false;
        }
        if let Some(named) = infer_category(&request.query) {
            if last_category != Some(named) {
                return false;
            }
        }
        !self.store.extractor().extract(&request.query).is_empty()
    }

    /// Record feedback, degrading a failed write into a notice. The signals
    /// are returned either way.
    pub(crate) fn apply_feedback(
        &self,
        user_id: &str,
        text: &str,
        context: &FeedbackContext,
        notices: &mut Vec<Notice>,
    ) -> Result<Vec<FeedbackSignal>, AgentError> {
        match self.store.record_feedback(user_id, text, context) {
            Ok(signals) => Ok(signals),
            Err(StoreError::InvalidUserId(id)) => {
                Err(AgentError::InvalidInput(format!("invalid user id {id:?}")))
            }
            Err(e) => {
                tracing::warn!(user = %user_id, error = %e, "feedback could not be saved");
                notices.push(Notice::PreferencesNotSaved {
                    reason: e.to_string(),
                });
                Ok(self.store.extractor().extract(text))
            }
        }
    }

    /// Classify, fetch context, rewrite, dispatch, and emit. `user` must
    /// already be identified.
    pub(crate) async fn respond(
        &self,
        request: &Request,
        user: Option<&str>,
        mut notices: Vec<Notice>,
    ) -> Result<Response, AgentError> {
        let intent = classify(&request.query);
        if intent == Intent::Info && request.filters.is_empty() {
            return Ok(self.catalog_response(notices));
        }

        let category = infer_category(&request.query);
        if intent == Intent::Styling && category.is_none() {
            return self.outfit(request, user, notices).await;
        }
        let snapshot = self.resolve_context(request, user, category, &mut notices);
        let mut rewrite = context::rewrite(&request.query, &request.filters, snapshot.as_ref());
        rewrite.applied.user_id = user.map(str::to_owned);
        rewrite.applied.category = category.map(str::to_owned);

        if intent == Intent::Styling {
            let keywords = Activity::detect(&request.query).map_or(&[][..], Activity::keywords);
            append_terms(&mut rewrite.text, keywords, &mut rewrite.applied.lexical_terms);
        }

        let mut k = request.k.unwrap_or(self.config.default_k);
        if intent == Intent::Comparison {
            k = k.min(COMPARISON_MAX_K);
        }

        let result = self
            .dispatch(&rewrite.text, &rewrite.predicate, k, &mut notices)
            .await?;
        if let Some(dropped) = &result.relaxed {
            notices.push(Notice::PredicateRelaxed {
                dropped: dropped.clone(),
            });
        }

        let message = messages::search(intent, &result, &rewrite.applied, &notices);
        Ok(Response {
            intent,
            payload: Payload::Search { result },
            context: rewrite.applied,
            notices,
            message,
        })
    }

    pub(crate) async fn run_tool(
        &self,
        tool: ToolInvocation,
        user: Option<&str>,
        notices: Vec<Notice>,
    ) -> Result<Response, AgentError> {
        tracing::debug!(tool = tool.name(), "dispatching tool call");
        match tool {
            ToolInvocation::SearchProducts { .. }
            | ToolInvocation::FilterProducts { .. }
            | ToolInvocation::SearchWithFilters { .. } => {
                let request = search_request(&tool)?.unwrap_or_default();
                self.respond(&request, user, notices).await
            }
            ToolInvocation::FindSimilar { product_id, k } => {
                self.similar(&product_id, k, notices).await
            }
            ToolInvocation::SavePreferences {
                sizing,
                category_preferences,
                general,
                location,
                permanent,
            } => {
                let update = ProfileUpdate {
                    sizing,
                    category_preferences,
                    general,
                    location,
                };
                self.save(user, update, permanent, notices)
            }
            ToolInvocation::RecordFeedback { text, category } => {
                let user = require_user(user, "recording feedback")?;
                let mut notices = notices;
                let context = FeedbackContext {
                    category,
                    reference_price: None,
                };
                let signals = self.apply_feedback(user, &text, &context, &mut notices)?;
                Ok(Response {
                    intent: Intent::Unknown,
                    message: messages::feedback(&signals),
                    payload: Payload::Feedback {
                        signals,
                        result: None,
                    },
                    context: AppliedContext::default(),
                    notices,
                })
            }
            ToolInvocation::CatalogInfo {} => Ok(self.catalog_response(notices)),
        }
    }

    /// Replace the template message with the language model's phrasing when
    /// a model is configured and answers within the timeout.
    pub(crate) async fn phrase(&self, mut response: Response) -> Response {
        let Some(model) = &self.llm else {
            return response;
        };

        let products: Vec<serde_json::Value> = response
            .products()
            .into_iter()
            .take(8)
            .map(|p| {
                serde_json::json!({
                    "name": p.name,
                    "brand": p.brand,
                    "category": p.category,
                    "price": p.price,
                })
            })
            .collect();
        let summary = serde_json::json!({
            "summary": response.message,
            "products": products,
        });
        let messages = [
            ChatMessage::system(PHRASING_PROMPT),
            ChatMessage::user(summary.to_string()),
        ];

        match llm::complete_with_retry(model.as_ref(), &messages, &[], self.config.llm_timeout).await {
            Ok(LlmReply::Text(text)) => response.message = text,
            Ok(LlmReply::ToolCall { name, .. }) => {
                tracing::debug!(tool = %name, "ignoring tool call in phrasing reply");
            }
            Err(e) => {
                tracing::warn!(error = %e, "language model phrasing unavailable, keeping template");
            }
        }
        response
    }

    fn resolve_context(
        &self,
        request: &Request,
        user: Option<&str>,
        category: Option<&str>,
        notices: &mut Vec<Notice>,
    ) -> Option<PreferenceSnapshot> {
        if let Some(snapshot) = &request.preferences {
            return Some(snapshot.clone());
        }
        let user = user?;
        let read = self.store.get(user);
        if let Some(warning) = read.warning {
            push_unique(
                notices,
                Notice::PersonalizationUnavailable {
                    reason: warning.to_string(),
                },
            );
            return None;
        }
        if !read.profile.has_preferences() {
            return None;
        }
        Some(PreferenceSnapshot::from_profile(&read.profile, category))
    }

    /// Route to semantic, filtered, or hybrid search. Free text plus filters
    /// is hybrid.
    async fn dispatch(
        &self,
        text: &str,
        predicate: &Predicate,
        k: usize,
        notices: &mut Vec<Notice>,
    ) -> Result<SearchResult, AgentError> {
        let has_text = !text.trim().is_empty();
        let has_filters = !predicate.is_empty() || predicate.sort.is_some();
        let mode = match (has_text, has_filters) {
            (true, true) => SearchMode::Hybrid,
            (true, false) => SearchMode::Semantic,
            (false, true) => SearchMode::Filter,
            (false, false) => {
                return Err(AgentError::InvalidInput(
                    "a query or at least one filter is required".to_owned(),
                ))
            }
        };
        tracing::debug!(mode = %mode, k, predicate = %predicate, "dispatching search");

        let outcome = match mode {
            SearchMode::Hybrid => self.engine.search_hybrid(text, predicate, k).await,
            SearchMode::Semantic => self.engine.search_semantic(text, k, 0.0).await,
            SearchMode::Filter => self.engine.search_filtered(predicate, k).await,
        };
        let applied = (mode != SearchMode::Semantic).then_some(predicate);
        recover(outcome, mode, applied, notices)
    }

    /// Build an outfit: one hybrid search per category the activity needs,
    /// each restricted to that category and the plan's filters, then
    /// personalized with that category's preferences.
    async fn outfit(
        &self,
        request: &Request,
        user: Option<&str>,
        mut notices: Vec<Notice>,
    ) -> Result<Response, AgentError> {
        if request.k == Some(0) {
            return Err(AgentError::InvalidInput("k must be at least 1".to_owned()));
        }
        let k = request
            .k
            .map_or(PIECES_PER_CATEGORY, |k| k.min(PIECES_PER_CATEGORY));
        let plan = OutfitPlan::from_query(&request.query);
        let stocked = self.engine.catalog().summary().categories;
        let mut applied = AppliedContext {
            user_id: user.map(str::to_owned),
            ..AppliedContext::default()
        };
        let mut pieces = Vec::new();

        for (category, required) in plan.categories() {
            if !stocked.keys().any(|c| c.eq_ignore_ascii_case(category)) {
                continue;
            }
            let only_category = Constraint::equals(Attribute::Category, category);
            let mut filters = request.filters.clone();
            filters.push(only_category.clone());
            for constraint in plan.constraints(required) {
                filters.push(constraint);
            }

            let key = category.to_lowercase();
            let snapshot = self.resolve_context(request, user, Some(key.as_str()), &mut notices);
            let mut rewrite = context::rewrite(&request.query, &filters, snapshot.as_ref());
            let mut extra = Vec::new();
            append_terms(&mut rewrite.text, &plan.keywords(required), &mut extra);
            append_terms(&mut rewrite.text, &[key.as_str()], &mut extra);

            let mut outcome = Vec::new();
            let result = self
                .dispatch(&rewrite.text, &rewrite.predicate, k, &mut outcome)
                .await?;
            for notice in outcome {
                push_unique(&mut notices, notice);
            }
            match &result.relaxed {
                Some(dropped) if *dropped == only_category => continue,
                Some(dropped) => push_unique(
                    &mut notices,
                    Notice::PredicateRelaxed {
                        dropped: dropped.clone(),
                    },
                ),
                None => {}
            }
            if result.is_empty() {
                continue;
            }

            for term in rewrite.applied.lexical_terms {
                if !applied.lexical_terms.contains(&term) {
                    applied.lexical_terms.push(term);
                }
            }
            for constraint in rewrite.applied.constraints {
                if !applied.constraints.contains(&constraint) {
                    applied.constraints.push(constraint);
                }
            }
            pieces.push(OutfitPiece {
                category: category.to_owned(),
                required,
                result,
            });
        }

        tracing::debug!(
            activity = ?plan.activity,
            weather = ?plan.weather,
            pieces = pieces.len(),
            "outfit assembled"
        );
        let message = messages::outfit(&plan, &pieces, &applied, &notices);
        Ok(Response {
            intent: Intent::Styling,
            payload: Payload::Outfit { plan, pieces },
            context: applied,
            notices,
            message,
        })
    }

    async fn similar(
        &self,
        product_id: &str,
        k: Option<usize>,
        mut notices: Vec<Notice>,
    ) -> Result<Response, AgentError> {
        let k = k.unwrap_or(self.config.default_k);
        let name = self
            .engine
            .product(product_id.trim())
            .map_or_else(|| product_id.trim().to_owned(), |p| p.name.clone());
        let outcome = self.engine.find_similar(product_id, k).await;
        let result = recover(outcome, SearchMode::Semantic, None, &mut notices)?;
        Ok(Response {
            intent: Intent::ProductSearch,
            message: messages::similar(&name, &result, &notices),
            payload: Payload::Search { result },
            context: AppliedContext::default(),
            notices,
        })
    }

    fn save(
        &self,
        user: Option<&str>,
        mut update: ProfileUpdate,
        permanent: bool,
        mut notices: Vec<Notice>,
    ) -> Result<Response, AgentError> {
        let user = require_user(user, "saving preferences")?;
        if let Some(location) = &mut update.location {
            if location.climate.is_none() {
                location.climate =
                    climate::infer(location.city.as_deref(), location.region.as_deref());
            }
        }

        let (profile, message) = match self.store.save(user, &update, permanent) {
            Ok(profile) => (profile, messages::preferences_saved(permanent)),
            Err(StoreError::InvalidUserId(id)) => {
                return Err(AgentError::InvalidInput(format!("invalid user id {id:?}")))
            }
            Err(e) => {
                tracing::warn!(user = %user, error = %e, "preferences could not be saved");
                notices.push(Notice::PreferencesNotSaved {
                    reason: e.to_string(),
                });
                (
                    self.store.get(user).profile,
                    "Your preferences could not be saved right now.".to_owned(),
                )
            }
        };

        Ok(Response {
            intent: Intent::Unknown,
            payload: Payload::Preferences { profile },
            context: AppliedContext::default(),
            notices,
            message,
        })
    }

    fn catalog_response(&self, notices: Vec<Notice>) -> Response {
        let summary = self.engine.catalog().summary();
        Response {
            intent: Intent::Info,
            message: messages::catalog(&summary),
            payload: Payload::Catalog { summary },
            context: AppliedContext::default(),
            notices,
        }
    }
}

/// The search request a tool call stands for, if it is a search tool.
pub(crate) fn search_request(tool: &ToolInvocation) -> Result<Option<Request>, AgentError> {
    let request = match tool {
        ToolInvocation::SearchProducts { query, k } => Request {
            query: query.clone(),
            k: *k,
            ..Request::default()
        },
        ToolInvocation::FilterProducts { filters, k } => Request {
            k: *k,
            filters: predicate_from_filters(filters)?,
            ..Request::default()
        },
        ToolInvocation::SearchWithFilters { query, filters, k } => Request {
            query: query.clone(),
            k: *k,
            filters: predicate_from_filters(filters)?,
            ..Request::default()
        },
        _ => return Ok(None),
    };
    Ok(Some(request))
}

/// Append each of `terms` the text does not already mention, recording the
/// ones added.
fn append_terms(text: &mut String, terms: &[&str], added: &mut Vec<String>) {
    let normalized = normalize(text);
    for term in terms {
        if mentions(&normalized, term) || added.iter().any(|t| t == term) {
            continue;
        }
        if !text.is_empty() {
            text.push(' ');
        }
        text.push_str(term);
        added.push((*term).to_owned());
    }
}

fn push_unique(notices: &mut Vec<Notice>, notice: Notice) {
    if !notices.contains(&notice) {
        notices.push(notice);
    }
}

fn require_user<'a>(user: Option<&'a str>, action: &str) -> Result<&'a str, AgentError> {
    user.ok_or_else(|| AgentError::InvalidInput(format!("{action} requires a user id")))
}

/// Turn an oracle failure into an empty result plus a notice. Caller errors
/// still fail the request.
fn recover(
    outcome: Result<SearchResult, RetrievalError>,
    mode: SearchMode,
    predicate: Option<&Predicate>,
    notices: &mut Vec<Notice>,
) -> Result<SearchResult, AgentError> {
    match outcome {
        Ok(result) => Ok(result),
        Err(e) if e.is_external() => {
            tracing::warn!(mode = %mode, error = %e, "search unavailable, returning an empty result");
            notices.push(Notice::SearchUnavailable {
                reason: e.to_string(),
            });
            Ok(SearchResult::empty(mode, predicate.cloned()))
        }
        Err(RetrievalError::InvalidInput(reason)) => Err(AgentError::InvalidInput(reason)),
        Err(e) => Err(e.into()),
    }
}
