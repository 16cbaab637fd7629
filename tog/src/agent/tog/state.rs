//! ToG state and result types.
//!
//! [`ToGState`] is the single state type that flows through the ToG graph. The
//! [`ReasoningPath`] inside it is append-only and owned by one query execution.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::ToGConfig;
use crate::kg::ScopeFilter;

use super::pruning::PruningStrategy;

/// Graph entity the question is about, found by the resolver.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TopicEntity {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    /// Lexical similarity between the extracted phrase and `name`, in [0, 1].
    pub confidence: f32,
    pub degree: usize,
}

/// Entity in the current frontier, plus the entity it was reached from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrontierEntity {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    /// `None` for topic entities.
    pub parent: Option<String>,
}

impl From<&TopicEntity> for FrontierEntity {
    fn from(t: &TopicEntity) -> Self {
        Self {
            id: t.id.clone(),
            name: t.name.clone(),
            entity_type: t.entity_type.clone(),
            parent: None,
        }
    }
}

/// Relation type leaving a frontier entity, with its normalized score.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CandidateRelation {
    pub source_id: String,
    pub source_name: String,
    pub relation: String,
    pub score: f32,
}

/// Entity reached through a retained relation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CandidateEntity {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub source_id: String,
    pub source_name: String,
    pub relation: String,
    pub relation_score: f32,
    /// `0.5 * relation_score + 0.5 * relevance`; zero until scored.
    pub score: f32,
}

impl CandidateEntity {
    /// Text the scorers compare against the question.
    pub fn descriptor(&self) -> String {
        format!(
            "{} {} {} ({})",
            self.source_name,
            super::text::humanize_relation(&self.relation),
            self.name,
            self.entity_type
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SufficiencyStatus {
    Complete,
    Incomplete,
}

/// Verdict of the sufficiency checker for one depth.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SufficiencyAssessment {
    pub status: SufficiencyStatus,
    pub confidence: f32,
    pub rationale: String,
}

impl SufficiencyAssessment {
    pub fn incomplete(rationale: impl Into<String>) -> Self {
        Self {
            status: SufficiencyStatus::Incomplete,
            confidence: 0.0,
            rationale: rationale.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status == SufficiencyStatus::Complete
    }
}

/// Entity expanded during a hop.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExploredEntity {
    pub id: String,
    pub name: String,
}

/// One hop of exploration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReasoningStep {
    /// 1-based hop number.
    pub depth: usize,
    pub entities_explored: Vec<ExploredEntity>,
    /// Relations retained at this hop, highest score first.
    pub relations: Vec<CandidateRelation>,
    /// Entities retained at this hop (the next frontier), highest score first.
    pub entities: Vec<CandidateEntity>,
    pub sufficiency: Option<SufficiencyAssessment>,
    pub notes: Vec<String>,
}

/// Ordered, append-only sequence of reasoning steps for one query.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReasoningPath {
    steps: Vec<ReasoningStep>,
}

impl ReasoningPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, step: ReasoningStep) {
        self.steps.push(step);
    }

    /// Records the sufficiency verdict on the step at `depth` if it has none yet.
    /// Returns false when there is no such step or it already has a verdict.
    pub fn record_sufficiency(&mut self, depth: usize, assessment: SufficiencyAssessment) -> bool {
        match self.steps.iter_mut().rev().find(|s| s.depth == depth) {
            Some(step) if step.sufficiency.is_none() => {
                step.sufficiency = Some(assessment);
                true
            }
            _ => false,
        }
    }

    pub fn steps(&self) -> &[ReasoningStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn last(&self) -> Option<&ReasoningStep> {
        self.steps.last()
    }

    /// Every retained (source, relation, target) in path order.
    pub fn triplets(&self) -> Vec<Triplet> {
        self.steps
            .iter()
            .enumerate()
            .flat_map(|(index, step)| {
                step.entities.iter().map(move |e| Triplet {
                    subject: e.source_name.clone(),
                    relation: e.relation.clone(),
                    object: e.name.clone(),
                    confidence: Some(e.score),
                    step_depth: step.depth,
                    step_index: index,
                })
            })
            .collect()
    }
}

/// (subject, relation, object) fact with a pointer back into the path.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Triplet {
    pub subject: String,
    pub relation: String,
    pub object: String,
    pub confidence: Option<f32>,
    pub step_depth: usize,
    pub step_index: usize,
}

impl fmt::Display for Triplet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.subject, self.relation, self.object)
    }
}

/// Where the exploration state machine is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "phase")]
pub enum Phase {
    Init,
    Exploring { depth: usize },
    Sufficient,
    Exhausted,
    Stalled,
    Synthesizing,
    Done,
}

/// Why exploration stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// The sufficiency checker judged the evidence complete.
    Sufficient,
    /// `search_depth` hops were made.
    Exhausted,
    /// A hop produced an empty frontier.
    Stalled,
    /// The query deadline expired mid-exploration.
    TimedOut,
    /// The resolver found nothing to start from.
    NoTopicEntities,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStatus {
    /// Answered from the reasoning path.
    Completed,
    /// Answered from the question alone.
    Fallback,
    /// No answer could be produced.
    Failed,
}

/// Outcome of one query.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub answer: String,
    pub confidence: f32,
    pub path: ReasoningPath,
    pub triplets: Vec<Triplet>,
    /// Indices into `triplets` the answer cites.
    pub evidence: Vec<usize>,
    pub processing_time_ms: u64,
    pub status: QueryStatus,
    pub topic_entities: Vec<TopicEntity>,
    pub termination: Termination,
    pub degradations: Vec<String>,
}

/// State flowing through the ToG graph.
#[derive(Clone)]
pub struct ToGState {
    pub question: String,
    pub config: ToGConfig,
    pub scope: Option<ScopeFilter>,
    pub strategy: PruningStrategy,
    /// Hex digest of config, normalized question and scope; part of cache keys.
    pub run_fingerprint: String,
    pub started: std::time::Instant,
    pub deadline: tokio::time::Instant,
    pub phase: Phase,
    pub topic_entities: Vec<TopicEntity>,
    pub frontier: Vec<FrontierEntity>,
    /// Hops completed so far.
    pub depth: usize,
    pub path: ReasoningPath,
    pub assessed_depths: BTreeSet<usize>,
    pub termination: Option<Termination>,
    pub degradations: Vec<String>,
    pub result: Option<QueryResult>,
}

impl ToGState {
    /// Records a degradation note once.
    pub fn note_degradation(&mut self, note: impl Into<String>) {
        let note = note.into();
        if !self.degradations.contains(&note) {
            tracing::warn!(note = %note, "degraded");
            self.degradations.push(note);
        }
    }

    pub fn deadline_passed(&self) -> bool {
        tokio::time::Instant::now() >= self.deadline
    }
}

impl fmt::Debug for ToGState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToGState")
            .field("question", &self.question)
            .field("pruning", &self.strategy.method())
            .field("phase", &self.phase)
            .field("depth", &self.depth)
            .field("frontier", &self.frontier.len())
            .field("steps", &self.path.len())
            .field("termination", &self.termination)
            .finish()
    }
}
