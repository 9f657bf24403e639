//! TRELLIS Planner
//!
//! Declaration surface and planning for resource graphs: callers declare
//! typed nodes whose attributes reference each other, the builder derives
//! dependency edges, and the planner produces a deterministic creation order.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod builder;
pub mod declare;
pub mod document;
pub mod graph;
pub mod pattern;
pub mod planner;
pub mod resolve;
pub mod resource;

pub use builder::GraphBuilder;
pub use declare::{Declaration, NodeHandle, Stack};
pub use document::{DocumentError, NodeDocument, StackDocument};
pub use graph::{Edge, Graph, Node};
pub use pattern::{
    AuthorizedLambdaApi, AuthorizedLambdaApiProps, AuthorizerProps, IntegrationProps, MethodProps,
    PathResourceProps,
};
pub use planner::{plan, Plan};
pub use resolve::resolve_references;
pub use resource::{
    AuthorizerSpec, FunctionSpec, IntegrationSpec, MethodSpec, PathResourceSpec, ResourceSpec,
    RestApiSpec, UserPoolSpec,
};
