//! Compiled chain layout.
//!
//! Steps live in an arena. Each node links to the node after it, so an
//! interceptor's continuation is simply "run the arena from my successor".

use futures::future::BoxFuture;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::{
    component::Component,
    context::Context,
    event::Event,
    execution::execute_step,
    interceptor::{Continuation, Next},
    outcome::Outcome,
    strategy::StepDescriptor,
};

pub(crate) type NodeId = usize;

pub(crate) struct Node {
    pub(crate) component: Component,
    pub(crate) descriptor: StepDescriptor,
    next: Option<NodeId>,
}

pub(crate) struct Plan {
    name: Option<String>,
    nodes: Vec<Node>,
}

impl Plan {
    pub(crate) fn compile(name: Option<String>, components: Vec<Component>) -> Self {
        let len = components.len();
        let nodes = components
            .into_iter()
            .enumerate()
            .map(|(position, component)| Node {
                descriptor: StepDescriptor {
                    processor: component.info().clone(),
                    capabilities: component.capabilities(),
                    position,
                },
                component,
                next: (position + 1 < len).then_some(position + 1),
            })
            .collect();

        Self { name, nodes }
    }

    pub(crate) fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub(crate) fn components(&self) -> impl Iterator<Item = &Component> {
        self.nodes.iter().map(|node| &node.component)
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn head(&self) -> Option<NodeId> {
        (!self.nodes.is_empty()).then_some(0)
    }

    /// Runs from `start` to the end of the chain.
    ///
    /// An interceptor's outcome already covers every step after it, so the
    /// loop ends there.
    pub(crate) async fn run(self: &Arc<Self>, start: Option<NodeId>, event: Event, cx: &Context) -> Outcome {
        let mut current = event;
        let mut cursor = start;

        while let Some(id) = cursor {
            let node = &self.nodes[id];
            let next = match (&node.component, node.next) {
                (Component::Interceptor(_), Some(after)) => Next::new(Arc::new(Cursor {
                    plan: Arc::clone(self),
                    start: after,
                })),
                _ => Next::terminal(),
            };

            match execute_step(node, current.clone(), next, cx).await {
                Outcome::Value(event) => current = event,
                Outcome::Void => {
                    trace!(processor = %node.descriptor.processor, "void result, keeping current event");
                }
                Outcome::Empty => {
                    debug!(
                        chain = self.name().unwrap_or("anonymous"),
                        processor = %node.descriptor.processor,
                        "empty result, ending chain"
                    );
                    return Outcome::Empty;
                }
                failure @ Outcome::Failure(_) => return failure,
            }

            cursor = if node.component.is_intercepting() { None } else { node.next };
        }

        Outcome::Value(current)
    }
}

struct Cursor {
    plan: Arc<Plan>,
    start: NodeId,
}

impl Continuation for Cursor {
    fn proceed<'a>(&'a self, event: Event, cx: &'a Context) -> BoxFuture<'a, Outcome> {
        Box::pin(self.plan.run(Some(self.start), event, cx))
    }
}
