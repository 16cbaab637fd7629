//! ToG runner: compiles the reasoning graph once and runs queries against it.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;

use crate::cache::{cache_key, Cache};
use crate::config::{EngineOptions, ToGConfig};
use crate::embedding::Embedder;
use crate::error::RunError;
use crate::graph::{CompilationError, CompiledStateGraph, StateGraph, END, START};
use crate::kg::{KnowledgeGraph, ScopeFilter};
use crate::llm::LlmClient;

use super::explore_node::ExploreNode;
use super::pruning::PruningStrategy;
use super::resolve_node::ResolveNode;
use super::resolver::EntityResolver;
use super::state::{Phase, QueryResult, QueryStatus, ReasoningPath, Termination, ToGState};
use super::sufficiency::{CheckSufficiencyNode, SufficiencyChecker};
use super::synthesis::{AnswerSynthesizer, SynthesizeNode};
use super::{
    route_after_check, route_after_explore, route_after_resolve, CHECK_SUFFICIENCY, EXPLORE,
    RESOLVE, SYNTHESIZE,
};

/// External services a runner talks to. Only the model and the graph are required.
#[derive(Clone)]
pub struct Collaborators {
    pub llm: Arc<dyn LlmClient>,
    pub graph: Arc<dyn KnowledgeGraph>,
    pub embedder: Option<Arc<dyn Embedder>>,
    pub cache: Option<Arc<dyn Cache>>,
}

impl Collaborators {
    pub fn new(llm: Arc<dyn LlmClient>, graph: Arc<dyn KnowledgeGraph>) -> Self {
        Self {
            llm,
            graph,
            embedder: None,
            cache: None,
        }
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = Some(cache);
        self
    }
}

fn path_map(targets: &[&str]) -> HashMap<String, String> {
    targets
        .iter()
        .map(|t| (t.to_string(), t.to_string()))
        .collect()
}

/// ToG runner: holds the compiled graph and the collaborators shared by every query.
///
/// Queries are independent; one runner may serve many concurrent `run` calls.
pub struct ToGRunner {
    compiled: CompiledStateGraph<ToGState>,
    collaborators: Collaborators,
    options: EngineOptions,
}

impl ToGRunner {
    pub fn new(
        collaborators: Collaborators,
        options: EngineOptions,
    ) -> Result<Self, CompilationError> {
        let retry = options.retry_policy.clone();
        let resolve = ResolveNode::new(EntityResolver::new(
            Arc::clone(&collaborators.llm),
            Arc::clone(&collaborators.graph),
            retry.clone(),
        ));
        let explore = ExploreNode::new(
            Arc::clone(&collaborators.graph),
            collaborators.cache.clone(),
            options.cache_ttl,
            options.max_concurrency,
        );
        let check = CheckSufficiencyNode::new(SufficiencyChecker::new(
            Arc::clone(&collaborators.llm),
            retry.clone(),
        ));
        let synthesize = SynthesizeNode::new(AnswerSynthesizer::new(
            Arc::clone(&collaborators.llm),
            retry,
            options.synthesis_timeout,
        ));

        let mut graph = StateGraph::<ToGState>::new();
        graph
            .add_node(RESOLVE, Arc::new(resolve))
            .add_node(EXPLORE, Arc::new(explore))
            .add_node(CHECK_SUFFICIENCY, Arc::new(check))
            .add_node(SYNTHESIZE, Arc::new(synthesize))
            .add_edge(START, RESOLVE)
            .add_conditional_edges(
                RESOLVE,
                Arc::new(|s: &ToGState| route_after_resolve(s).to_string()),
                path_map(&[EXPLORE, SYNTHESIZE]),
            )
            .add_conditional_edges(
                EXPLORE,
                Arc::new(|s: &ToGState| route_after_explore(s).to_string()),
                path_map(&[EXPLORE, CHECK_SUFFICIENCY, SYNTHESIZE]),
            )
            .add_conditional_edges(
                CHECK_SUFFICIENCY,
                Arc::new(|s: &ToGState| route_after_check(s).to_string()),
                path_map(&[EXPLORE, SYNTHESIZE]),
            )
            .add_edge(SYNTHESIZE, END);

        // resolve + (explore, check) per hop + synthesize, with slack.
        let max_steps = 2 * crate::config::MAX_SEARCH_DEPTH + 8;
        let compiled = graph.with_max_steps(max_steps).compile()?;
        Ok(Self {
            compiled,
            collaborators,
            options,
        })
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Answers `question` by exploring the graph under `config`.
    ///
    /// Returns `Err` only for an invalid config or an unreachable graph store;
    /// all other failures show up as `status` and `degradations` on the result.
    pub async fn run(
        &self,
        question: &str,
        config: &ToGConfig,
        scope: Option<&ScopeFilter>,
    ) -> Result<QueryResult, RunError> {
        config.ensure_valid()?;

        let started = Instant::now();
        let deadline = tokio::time::Instant::now() + self.options.deadline;
        let normalized = question.trim().to_lowercase();
        let scope_repr = scope.map(ScopeFilter::fingerprint).unwrap_or_default();
        let fingerprint = config.fingerprint();
        let run_fingerprint = cache_key(&[&fingerprint, &normalized, &scope_repr]);

        let strategy = PruningStrategy::select(
            config.pruning_method,
            Arc::clone(&self.collaborators.llm),
            self.collaborators.embedder.clone(),
            self.options.retry_policy.clone(),
        );
        tracing::info!(
            question = %question,
            pruning = %config.pruning_method,
            width = config.search_width,
            depth = config.search_depth,
            retain = config.num_retain_entity,
            sufficiency = config.enable_sufficiency_check,
            "query started"
        );

        let state = ToGState {
            question: question.to_string(),
            config: config.clone(),
            scope: scope.cloned(),
            strategy,
            run_fingerprint,
            started,
            deadline,
            phase: Phase::Init,
            topic_entities: Vec::new(),
            frontier: Vec::new(),
            depth: 0,
            path: ReasoningPath::new(),
            assessed_depths: BTreeSet::new(),
            termination: None,
            degradations: Vec::new(),
            result: None,
        };

        let final_state = self.compiled.invoke(state).await?;
        Ok(match final_state.result {
            Some(result) => result,
            None => {
                tracing::warn!(phase = ?final_state.phase, "run ended without a result");
                QueryResult {
                    answer: String::new(),
                    confidence: 0.0,
                    triplets: final_state.path.triplets(),
                    path: final_state.path,
                    evidence: Vec::new(),
                    processing_time_ms: started.elapsed().as_millis() as u64,
                    status: QueryStatus::Failed,
                    topic_entities: final_state.topic_entities,
                    termination: final_state.termination.unwrap_or(Termination::Stalled),
                    degradations: final_state.degradations,
                }
            }
        })
    }
}
