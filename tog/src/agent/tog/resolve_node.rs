//! Resolve node: INIT → seed frontier from the question's topic entities.

use async_trait::async_trait;

use crate::error::RunError;
use crate::graph::{Next, Node};

use super::resolver::EntityResolver;
use super::state::{FrontierEntity, Phase, Termination, ToGState};

pub struct ResolveNode {
    resolver: EntityResolver,
}

impl ResolveNode {
    pub fn new(resolver: EntityResolver) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl Node<ToGState> for ResolveNode {
    fn id(&self) -> &str {
        super::RESOLVE
    }

    async fn run(&self, state: ToGState) -> Result<(ToGState, Next), RunError> {
        let mut state = state;
        state.phase = Phase::Init;

        let resolved = tokio::time::timeout_at(
            state.deadline,
            self.resolver.resolve(
                &state.question,
                state.config.exploration_temperature,
                state.config.num_retain_entity,
                state.scope.as_ref(),
            ),
        )
        .await;

        let resolution = match resolved {
            Ok(Ok(r)) => r,
            Ok(Err(e)) => match RunError::from_graph(&e) {
                Some(fatal) => return Err(fatal),
                None => Default::default(),
            },
            Err(_) => {
                tracing::warn!("deadline reached while resolving topic entities");
                state.phase = Phase::Stalled;
                state.termination = Some(Termination::TimedOut);
                return Ok((state, Next::Continue));
            }
        };

        if let Some(note) = resolution.note {
            state.note_degradation(note);
        }
        tracing::info!(
            topic_entities = ?resolution.entities.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
            "resolved"
        );
        state.frontier = resolution.entities.iter().map(FrontierEntity::from).collect();
        state.topic_entities = resolution.entities;
        if state.frontier.is_empty() {
            state.phase = Phase::Stalled;
            state.termination = Some(Termination::NoTopicEntities);
        }
        Ok((state, Next::Continue))
    }
}
