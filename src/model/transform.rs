use super::{Model, ModelError, PortId, PortRange};
use std::collections::HashMap;

#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("Refinement did not converge after {passes} passes")]
    RefinementDidNotConverge { passes: usize },
    #[error(transparent)]
    Model(#[from] ModelError),
}

#[derive(Debug, Clone)]
pub struct RefineOptions {
    /// Pass ceiling for `refine_to_fixed_point`. Values below 1 behave as 1.
    pub max_passes: usize,
}

impl Default for RefineOptions {
    fn default() -> Self {
        Self { max_passes: 10 }
    }
}

/// Outcome of `refine_to_fixed_point`. Hitting the pass ceiling while nodes
/// are still refining is reported here rather than raised, so the caller
/// decides whether a non-converged model is usable.
pub struct RefineResult {
    pub model: Model,
    pub passes: usize,
    pub converged: bool,
}

impl RefineResult {
    pub fn into_converged(self) -> Result<Model, TransformError> {
        if self.converged {
            Ok(self.model)
        } else {
            Err(TransformError::RefinementDidNotConverge {
                passes: self.passes,
            })
        }
    }
}

/// Drives one refinement pass: visits every source node in dependency order
/// and rebuilds the graph in a fresh destination model, letting each node
/// either substitute an equivalent subgraph (`Node::refine`) or be re-created
/// verbatim (`Node::copy`). Nodes reach the destination through
/// [`ModelTransformer::model`] and translate their old wiring through
/// [`ModelTransformer::mapped_range`]; whatever they add is re-validated by
/// the destination model, so a rewrite cannot smuggle in a cycle or a type
/// change.
pub struct ModelTransformer {
    dest: Model,
    port_map: HashMap<PortId, PortId>,
    refined_any: bool,
}

impl ModelTransformer {
    fn new() -> Self {
        Self {
            dest: Model::new(),
            port_map: HashMap::new(),
            refined_any: false,
        }
    }

    /// The destination model being built. Refining nodes add their
    /// replacement subgraph here.
    pub fn model(&mut self) -> &mut Model {
        &mut self.dest
    }

    /// Declares that `new` now produces the values `old` produced in the
    /// source model. Every node must register all of its output ports, either
    /// through this call or implicitly by `copy`.
    pub fn map_output(&mut self, old: PortId, new: PortId) {
        self.port_map.insert(old, new);
    }

    pub fn mapped_port(&self, old: PortId) -> Result<PortId, ModelError> {
        self.port_map
            .get(&old)
            .copied()
            .ok_or(ModelError::UnmappedPort(old))
    }

    /// Translates a source-model range into the destination model, keeping
    /// the element offsets.
    pub fn mapped_range(&self, range: &PortRange) -> Result<PortRange, ModelError> {
        Ok(PortRange::new(
            self.mapped_port(range.port)?,
            range.start,
            range.len,
        ))
    }

    pub fn mapped_ranges(&self, ranges: &[PortRange]) -> Result<Vec<PortRange>, ModelError> {
        ranges.iter().map(|r| self.mapped_range(r)).collect()
    }

    /// Runs a single bottom-up sweep over `source`, returning the rebuilt
    /// model and whether any node refined.
    pub fn refine_pass(source: &Model) -> Result<(Model, bool), TransformError> {
        let mut transformer = Self::new();
        let mut refined_nodes = 0usize;
        for node_id in source.topological_order() {
            let node = source.node(node_id)?;
            if node.refine(&mut transformer)? {
                transformer.refined_any = true;
                refined_nodes += 1;
            } else {
                node.copy(&mut transformer)?;
            }
            // Rewrites must keep every output port's type and size intact.
            for old_id in node.outputs() {
                let new_id = transformer.mapped_port(old_id)?;
                let old = source.port(old_id)?;
                let new = transformer.dest.port(new_id)?;
                if old.dtype != new.dtype {
                    return Err(TransformError::Model(ModelError::TypeMismatch {
                        expected: old.dtype,
                        found: new.dtype,
                        port_name: old.name.clone(),
                    }));
                }
                if old.size != new.size {
                    return Err(TransformError::Model(ModelError::SizeMismatch {
                        port_name: old.name.clone(),
                        expected: old.size,
                        found: new.size,
                    }));
                }
            }
        }
        log::debug!(
            "refine pass rewrote {} of {} nodes",
            refined_nodes,
            source.node_count()
        );
        Ok((transformer.dest, transformer.refined_any))
    }
}

/// Repeats refinement passes until a sweep refines nothing or the ceiling is
/// reached. The source model is left untouched.
pub fn refine_to_fixed_point(
    source: &Model,
    options: &RefineOptions,
) -> Result<RefineResult, TransformError> {
    let ceiling = options.max_passes.max(1);
    let (mut model, mut refined) = ModelTransformer::refine_pass(source)?;
    let mut passes = 1;
    loop {
        if !refined {
            return Ok(RefineResult {
                model,
                passes,
                converged: true,
            });
        }
        if passes >= ceiling {
            log::warn!("refinement did not converge after {} passes", passes);
            return Ok(RefineResult {
                model,
                passes,
                converged: false,
            });
        }
        let (next, next_refined) = ModelTransformer::refine_pass(&model)?;
        model = next;
        refined = next_refined;
        passes += 1;
    }
}
