//! ToG (Tree-of-Graphs) reasoning: iterative beam search over a knowledge graph.
//!
//! Graph: START → resolve → [has frontier] → explore ⟲ → [check_sufficiency] → synthesize → END.
//!
//! Each `explore` pass is one hop. With the sufficiency check enabled, every hop
//! is followed by `check_sufficiency`, which either sends the run back to
//! `explore` or on to `synthesize`. Without it the loop stops after
//! `search_depth` hops or when the frontier empties.

mod explore_node;
mod prompt;
pub mod pruning;
mod resolve_node;
mod resolver;
mod runner;
mod state;
mod sufficiency;
mod synthesis;
pub mod text;

pub use explore_node::{ExploreNode, MAX_CANDIDATES_PER_RELATION};
pub use prompt::format_triplets;
pub use pruning::{PruningStrategy, ScoreOutcome};
pub use resolve_node::ResolveNode;
pub use resolver::{EntityResolver, Resolution, RESOLVER_DEGRADED, SIMILARITY_FLOOR};
pub use runner::{Collaborators, ToGRunner};
pub use state::{
    CandidateEntity, CandidateRelation, ExploredEntity, FrontierEntity, Phase, QueryResult,
    QueryStatus, ReasoningPath, ReasoningStep, SufficiencyAssessment, SufficiencyStatus,
    Termination, ToGState, TopicEntity, Triplet,
};
pub use sufficiency::{CheckSufficiencyNode, SufficiencyChecker};
pub use synthesis::{AnswerSynthesizer, Synthesis, SynthesizeNode, FALLBACK_CONFIDENCE_CAP};

pub const RESOLVE: &str = "resolve";
pub const EXPLORE: &str = "explore";
pub const CHECK_SUFFICIENCY: &str = "check_sufficiency";
pub const SYNTHESIZE: &str = "synthesize";

/// After resolve: explore when topic entities were found.
pub fn route_after_resolve(state: &ToGState) -> &'static str {
    if state.frontier.is_empty() || state.phase == Phase::Stalled {
        SYNTHESIZE
    } else {
        EXPLORE
    }
}

/// After one hop: stop on stall or exhaustion, otherwise check or keep exploring.
pub fn route_after_explore(state: &ToGState) -> &'static str {
    match state.phase {
        Phase::Stalled | Phase::Exhausted => SYNTHESIZE,
        _ if state.config.enable_sufficiency_check => CHECK_SUFFICIENCY,
        _ => EXPLORE,
    }
}

/// After a sufficiency check: synthesize when answered or out of depth.
pub fn route_after_check(state: &ToGState) -> &'static str {
    match state.phase {
        Phase::Sufficient | Phase::Exhausted => SYNTHESIZE,
        _ => EXPLORE,
    }
}
