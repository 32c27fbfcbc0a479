//! Textual selection of node-output elements. A selector is a semicolon
//! separated list of terms addressing one layer each: `"3"` takes a whole
//! layer, `"3,1"` one element, `"3,2:4"` an inclusive interval. Indices are
//! literals, `e` for the last valid index, or `e-k` counting back from it.
//! Layers are the model's nodes in insertion order; a layer's element space
//! is the concatenation of its node's output ports.

use crate::model::{Model, ModelError, NodeId, PortId, PortRange};

#[derive(Debug, thiserror::Error)]
pub enum SelectError {
    #[error("Unparseable selector term \"{0}\"")]
    InvalidSelector(String),
    #[error("Layer selection \"{term}\" out of range for a model of {layers} layers")]
    LayerOutOfRange { term: String, layers: usize },
    #[error("Element selection \"{term}\" out of range for layer {layer} of {size} elements")]
    ElementOutOfRange {
        term: String,
        layer: usize,
        size: usize,
    },
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// One element of one layer's output.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct Coordinate {
    pub layer: usize,
    pub element: usize,
}

/// An ordered selection over node outputs. Order is meaningful and repeats
/// are allowed.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct CoordinateList(Vec<Coordinate>);

impl CoordinateList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every element of `layer`, in order.
    pub fn for_layer(layer: usize, count: usize) -> Self {
        Self((0..count).map(|element| Coordinate { layer, element }).collect())
    }

    /// Elements `from..=to` of `layer`.
    pub fn interval(layer: usize, from: usize, to: usize) -> Self {
        Self(
            (from..=to)
                .map(|element| Coordinate { layer, element })
                .collect(),
        )
    }

    pub fn push(&mut self, coordinate: Coordinate) {
        self.0.push(coordinate);
    }

    pub fn coordinates(&self) -> &[Coordinate] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Resolves a selector string against `model`. Every term is validated
    /// against the model's actual layer and element counts, so the returned
    /// list is always addressable.
    pub fn parse(text: &str, model: &Model) -> Result<Self, SelectError> {
        let layers = model.node_ids();
        let mut list = CoordinateList::new();
        for term in text.split(';') {
            let term = term.trim();
            if term.is_empty() {
                continue;
            }
            let (layer_token, elements) = match term.split_once(',') {
                None => (term, None),
                Some((layer, rest)) => (layer.trim(), Some(rest.trim())),
            };
            let layer = parse_index_token(layer_token)
                .ok_or_else(|| SelectError::InvalidSelector(term.to_string()))?
                .resolve(layers.len())
                .ok_or_else(|| SelectError::LayerOutOfRange {
                    term: term.to_string(),
                    layers: layers.len(),
                })?;
            if layer >= layers.len() {
                return Err(SelectError::LayerOutOfRange {
                    term: term.to_string(),
                    layers: layers.len(),
                });
            }
            let size = layer_size(model, layers[layer])?;
            match elements {
                None => {
                    for element in 0..size {
                        list.push(Coordinate { layer, element });
                    }
                }
                Some(rest) => {
                    let (from, to) = match rest.split_once(':') {
                        None => {
                            let element = resolve_element(rest, size, term, layer)?;
                            (element, element)
                        }
                        Some((from, to)) => (
                            resolve_element(from.trim(), size, term, layer)?,
                            resolve_element(to.trim(), size, term, layer)?,
                        ),
                    };
                    if to < from {
                        return Err(SelectError::InvalidSelector(term.to_string()));
                    }
                    for element in from..=to {
                        list.push(Coordinate { layer, element });
                    }
                }
            }
        }
        Ok(list)
    }

    /// Converts the selection into port ranges against `model`, merging
    /// consecutive coordinates that are contiguous on the same port.
    pub fn ranges(&self, model: &Model) -> Result<Vec<PortRange>, SelectError> {
        let layers = model.node_ids();
        let mut out: Vec<PortRange> = Vec::new();
        for coordinate in &self.0 {
            let node_id =
                *layers
                    .get(coordinate.layer)
                    .ok_or_else(|| SelectError::LayerOutOfRange {
                        term: coordinate.layer.to_string(),
                        layers: layers.len(),
                    })?;
            let (port, offset) = locate(model, node_id, coordinate.layer, coordinate.element)?;
            match out.last_mut() {
                Some(last) if last.port == port && last.start + last.len == offset => {
                    last.len += 1;
                }
                _ => out.push(PortRange::new(port, offset, 1)),
            }
        }
        Ok(out)
    }
}

enum IndexToken {
    Literal(usize),
    FromEnd(usize),
}

impl IndexToken {
    fn resolve(self, count: usize) -> Option<usize> {
        match self {
            IndexToken::Literal(value) => Some(value),
            IndexToken::FromEnd(back) => count.checked_sub(1)?.checked_sub(back),
        }
    }
}

fn parse_index_token(token: &str) -> Option<IndexToken> {
    if let Some(rest) = token.strip_prefix('e') {
        let rest = rest.trim_start();
        if rest.is_empty() {
            return Some(IndexToken::FromEnd(0));
        }
        let rest = rest.strip_prefix('-')?;
        rest.trim().parse().ok().map(IndexToken::FromEnd)
    } else {
        token.parse().ok().map(IndexToken::Literal)
    }
}

fn resolve_element(
    token: &str,
    size: usize,
    term: &str,
    layer: usize,
) -> Result<usize, SelectError> {
    let element = parse_index_token(token)
        .ok_or_else(|| SelectError::InvalidSelector(term.to_string()))?
        .resolve(size)
        .ok_or_else(|| SelectError::ElementOutOfRange {
            term: term.to_string(),
            layer,
            size,
        })?;
    if element >= size {
        return Err(SelectError::ElementOutOfRange {
            term: term.to_string(),
            layer,
            size,
        });
    }
    Ok(element)
}

fn layer_size(model: &Model, node: NodeId) -> Result<usize, SelectError> {
    let mut size = 0;
    for port in model.node(node)?.outputs() {
        size += model.port(port)?.size;
    }
    Ok(size)
}

fn locate(
    model: &Model,
    node: NodeId,
    layer: usize,
    element: usize,
) -> Result<(PortId, usize), SelectError> {
    let mut remaining = element;
    for port in model.node(node)?.outputs() {
        let size = model.port(port)?.size;
        if remaining < size {
            return Ok((port, remaining));
        }
        remaining -= size;
    }
    Err(SelectError::ElementOutOfRange {
        term: element.to_string(),
        layer,
        size: layer_size(model, node)?,
    })
}
