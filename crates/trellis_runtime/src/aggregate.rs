//! Output aggregation.

use crate::store::RealizedStore;
use indexmap::IndexMap;
use trellis_core::{GraphError, GraphResult, Value};
use trellis_plan::Graph;

/// Flat record of output name to realized value
pub type OutputRecord = IndexMap<String, Value>;

/// Collect the requested outputs from realized values
///
/// # Errors
///
/// Returns `UnknownOutput` for a name the graph does not declare,
/// `UnresolvedOutput` if the source node was never realized and
/// `MissingAttribute` if it was realized without the source attribute
pub fn aggregate<S: AsRef<str>>(
    graph: &Graph,
    store: &RealizedStore,
    requested: &[S],
) -> GraphResult<OutputRecord> {
    let mut record = OutputRecord::with_capacity(requested.len());
    for output in requested {
        let output = output.as_ref();
        let source = graph.output(output).ok_or_else(|| GraphError::UnknownOutput {
            output: output.to_string(),
        })?;
        let realized = store
            .get(source.node.as_str())
            .ok_or_else(|| GraphError::UnresolvedOutput {
                output: output.to_string(),
                node: source.node.clone(),
            })?;
        let value = realized
            .get(&source.attribute)
            .ok_or_else(|| GraphError::MissingAttribute {
                node: source.node.clone(),
                attribute: source.attribute.clone(),
            })?;
        record.insert(output.to_string(), value.clone());
    }
    Ok(record)
}

/// Collect every output the graph declares, in declaration order
///
/// # Errors
///
/// Same as [`aggregate`]
pub fn aggregate_all(graph: &Graph, store: &RealizedStore) -> GraphResult<OutputRecord> {
    let names: Vec<&str> = graph.outputs().keys().map(String::as_str).collect();
    aggregate(graph, store, &names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::{Config, NodeName, NodeType, RealizedValue, Reference};
    use trellis_plan::Stack;

    fn graph() -> Graph {
        let mut stack = Stack::new("demo");
        stack.declare("pool", NodeType::UserPool, Config::new()).unwrap();
        stack.declare("api", NodeType::RestApi, Config::new()).unwrap();
        stack.output("poolArn", Reference::to("pool", "arn").unwrap()).unwrap();
        stack.output("apiId", Reference::to("api", "id").unwrap()).unwrap();
        stack.build().unwrap()
    }

    fn store_with_pool() -> RealizedStore {
        let mut store = RealizedStore::new();
        store
            .insert(
                NodeName::new("pool").unwrap(),
                RealizedValue::new().with("arn", "arn:pool"),
            )
            .unwrap();
        store
    }

    #[test]
    fn test_aggregate_requested() {
        let record = aggregate(&graph(), &store_with_pool(), &["poolArn"]).unwrap();
        assert_eq!(record.len(), 1);
        assert_eq!(record["poolArn"], Value::from("arn:pool"));
    }

    #[test]
    fn test_aggregate_unresolved_output() {
        let err = aggregate(&graph(), &store_with_pool(), &["poolArn", "apiId"]).unwrap_err();
        assert_eq!(
            err,
            GraphError::UnresolvedOutput {
                output: "apiId".to_string(),
                node: NodeName::new("api").unwrap(),
            }
        );
    }

    #[test]
    fn test_aggregate_unknown_output() {
        let err = aggregate(&graph(), &store_with_pool(), &["nope"]).unwrap_err();
        assert!(matches!(err, GraphError::UnknownOutput { .. }));
    }

    #[test]
    fn test_aggregate_missing_attribute() {
        let mut store = store_with_pool();
        store
            .insert(NodeName::new("api").unwrap(), RealizedValue::new())
            .unwrap();
        let err = aggregate_all(&graph(), &store).unwrap_err();
        assert!(matches!(err, GraphError::MissingAttribute { ref attribute, .. } if attribute == "id"));
    }

    #[test]
    fn test_aggregate_nothing_requested() {
        let empty: [&str; 0] = [];
        assert!(aggregate(&graph(), &RealizedStore::new(), &empty).unwrap().is_empty());
    }
}
