//! Typed resource specs.
//!
//! Each spec covers one node type and knows how to lower itself into a
//! [`Config`]. Fields that usually come from another node are [`Value`]s so
//! they can hold either a literal or a reference.

use tracing::warn;
use trellis_core::{Config, NodeType, Value};

/// Authorization type for user-pool authorizers and methods
pub const COGNITO_USER_POOLS: &str = "COGNITO_USER_POOLS";

/// Integration type that proxies the whole request to a function
pub const AWS_PROXY: &str = "AWS_PROXY";

/// A typed description of one resource
pub trait ResourceSpec {
    /// Node type this spec declares
    const KIND: NodeType;

    /// Lower into an attribute map
    fn into_config(self) -> Config;
}

macro_rules! with_attribute {
    ($($spec:ty),+ $(,)?) => {
        $(
            impl $spec {
                /// Attach a free-form attribute; typed and wired attributes win over it
                #[must_use]
                pub fn with_attribute(mut self, attribute: impl Into<String>, value: impl Into<Value>) -> Self {
                    self.extra.insert(attribute, value);
                    self
                }
            }
        )+
    };
}

pub(crate) use with_attribute;

with_attribute!(
    FunctionSpec,
    RestApiSpec,
    UserPoolSpec,
    AuthorizerSpec,
    PathResourceSpec,
    MethodSpec,
    IntegrationSpec,
);

/// Free-form attributes fill in around the typed ones and never replace them
fn finish(mut config: Config, extra: Config) -> Config {
    for (attribute, value) in extra {
        if config.get(&attribute).is_some() {
            warn!(attribute = %attribute, "free-form attribute ignored; the typed field is set");
            continue;
        }
        config.insert(attribute, value);
    }
    config
}

/// Serverless function
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSpec {
    /// Function name
    pub function_name: String,
    /// Entry point, e.g. `index.handler`
    pub handler: String,
    /// Runtime identifier, e.g. `nodejs20.x`
    pub runtime: String,
    /// Execution role
    pub role: Value,
    /// Deployment package path
    pub filename: Option<String>,
    /// Package checksum, used by the provider to detect code changes
    pub source_code_hash: Option<Value>,
    /// Free-form attributes
    pub extra: Config,
}

impl FunctionSpec {
    /// Create a function spec
    #[must_use]
    pub fn new(
        function_name: impl Into<String>,
        handler: impl Into<String>,
        runtime: impl Into<String>,
        role: impl Into<Value>,
    ) -> Self {
        Self {
            function_name: function_name.into(),
            handler: handler.into(),
            runtime: runtime.into(),
            role: role.into(),
            filename: None,
            source_code_hash: None,
            extra: Config::new(),
        }
    }

    /// Set the deployment package path
    #[must_use]
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Set the package checksum
    #[must_use]
    pub fn with_source_code_hash(mut self, hash: impl Into<Value>) -> Self {
        self.source_code_hash = Some(hash.into());
        self
    }
}

impl ResourceSpec for FunctionSpec {
    const KIND: NodeType = NodeType::Function;

    fn into_config(self) -> Config {
        let mut config = Config::new()
            .with("function_name", self.function_name)
            .with("handler", self.handler)
            .with("runtime", self.runtime)
            .with("role", self.role);
        if let Some(filename) = self.filename {
            config.insert("filename", filename);
        }
        if let Some(hash) = self.source_code_hash {
            config.insert("source_code_hash", hash);
        }
        finish(config, self.extra)
    }
}

/// HTTP API gateway
#[derive(Debug, Clone, PartialEq)]
pub struct RestApiSpec {
    /// API name
    pub name: String,
    /// Optional description
    pub description: Option<String>,
    /// Free-form attributes
    pub extra: Config,
}

impl RestApiSpec {
    /// Create a REST API spec
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            extra: Config::new(),
        }
    }

    /// Set the description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

impl ResourceSpec for RestApiSpec {
    const KIND: NodeType = NodeType::RestApi;

    fn into_config(self) -> Config {
        let mut config = Config::new().with("name", self.name);
        if let Some(description) = self.description {
            config.insert("description", description);
        }
        finish(config, self.extra)
    }
}

/// Identity user pool
#[derive(Debug, Clone, PartialEq)]
pub struct UserPoolSpec {
    /// Pool name
    pub name: String,
    /// Free-form attributes
    pub extra: Config,
}

impl UserPoolSpec {
    /// Create a user pool spec
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extra: Config::new(),
        }
    }
}

impl ResourceSpec for UserPoolSpec {
    const KIND: NodeType = NodeType::UserPool;

    fn into_config(self) -> Config {
        finish(Config::new().with("name", self.name), self.extra)
    }
}

/// User-pool authorizer attached to an API
#[derive(Debug, Clone, PartialEq)]
pub struct AuthorizerSpec {
    /// Authorizer name
    pub name: String,
    /// Owning API id
    pub rest_api_id: Value,
    /// User pool ARNs the authorizer trusts
    pub provider_arns: Vec<Value>,
    /// Free-form attributes
    pub extra: Config,
}

impl AuthorizerSpec {
    /// Create an authorizer spec
    #[must_use]
    pub fn new(name: impl Into<String>, rest_api_id: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            rest_api_id: rest_api_id.into(),
            provider_arns: Vec::new(),
            extra: Config::new(),
        }
    }

    /// Trust an additional user pool
    #[must_use]
    pub fn with_provider_arn(mut self, arn: impl Into<Value>) -> Self {
        self.provider_arns.push(arn.into());
        self
    }
}

impl ResourceSpec for AuthorizerSpec {
    const KIND: NodeType = NodeType::Authorizer;

    fn into_config(self) -> Config {
        let config = Config::new()
            .with("name", self.name)
            .with("type", COGNITO_USER_POOLS)
            .with("rest_api_id", self.rest_api_id)
            .with("provider_arns", Value::List(self.provider_arns));
        finish(config, self.extra)
    }
}

/// Path segment under an API
#[derive(Debug, Clone, PartialEq)]
pub struct PathResourceSpec {
    /// Path segment
    pub path_part: String,
    /// Owning API id
    pub rest_api_id: Value,
    /// Parent resource id
    pub parent_id: Value,
    /// Free-form attributes
    pub extra: Config,
}

impl PathResourceSpec {
    /// Create a path resource spec
    #[must_use]
    pub fn new(
        path_part: impl Into<String>,
        rest_api_id: impl Into<Value>,
        parent_id: impl Into<Value>,
    ) -> Self {
        Self {
            path_part: path_part.into(),
            rest_api_id: rest_api_id.into(),
            parent_id: parent_id.into(),
            extra: Config::new(),
        }
    }
}

impl ResourceSpec for PathResourceSpec {
    const KIND: NodeType = NodeType::Resource;

    fn into_config(self) -> Config {
        let config = Config::new()
            .with("path_part", self.path_part)
            .with("rest_api_id", self.rest_api_id)
            .with("parent_id", self.parent_id);
        finish(config, self.extra)
    }
}

/// HTTP method on a path resource
#[derive(Debug, Clone, PartialEq)]
pub struct MethodSpec {
    /// HTTP verb
    pub http_method: String,
    /// Owning API id
    pub rest_api_id: Value,
    /// Path resource id
    pub resource_id: Value,
    /// Authorization type, `NONE` unless an authorizer is attached
    pub authorization: String,
    /// Authorizer id, when authorized
    pub authorizer_id: Option<Value>,
    /// Free-form attributes
    pub extra: Config,
}

impl MethodSpec {
    /// Create an unauthorized method spec
    #[must_use]
    pub fn new(
        http_method: impl Into<String>,
        rest_api_id: impl Into<Value>,
        resource_id: impl Into<Value>,
    ) -> Self {
        Self {
            http_method: http_method.into(),
            rest_api_id: rest_api_id.into(),
            resource_id: resource_id.into(),
            authorization: "NONE".to_string(),
            authorizer_id: None,
            extra: Config::new(),
        }
    }

    /// Guard the method with a user-pool authorizer
    #[must_use]
    pub fn with_user_pool_authorizer(mut self, authorizer_id: impl Into<Value>) -> Self {
        self.authorization = COGNITO_USER_POOLS.to_string();
        self.authorizer_id = Some(authorizer_id.into());
        self
    }
}

impl ResourceSpec for MethodSpec {
    const KIND: NodeType = NodeType::Method;

    fn into_config(self) -> Config {
        let mut config = Config::new()
            .with("http_method", self.http_method)
            .with("rest_api_id", self.rest_api_id)
            .with("resource_id", self.resource_id)
            .with("authorization", self.authorization);
        if let Some(authorizer_id) = self.authorizer_id {
            config.insert("authorizer_id", authorizer_id);
        }
        finish(config, self.extra)
    }
}

/// Backend integration for a method
#[derive(Debug, Clone, PartialEq)]
pub struct IntegrationSpec {
    /// Owning API id
    pub rest_api_id: Value,
    /// Path resource id
    pub resource_id: Value,
    /// Method verb being integrated
    pub http_method: Value,
    /// Integration type
    pub integration_type: String,
    /// Verb used to call the backend
    pub integration_http_method: String,
    /// Backend URI, e.g. a function's invoke ARN
    pub uri: Value,
    /// Free-form attributes
    pub extra: Config,
}

impl IntegrationSpec {
    /// Create a proxy integration spec
    #[must_use]
    pub fn proxy(
        rest_api_id: impl Into<Value>,
        resource_id: impl Into<Value>,
        http_method: impl Into<Value>,
        uri: impl Into<Value>,
    ) -> Self {
        Self {
            rest_api_id: rest_api_id.into(),
            resource_id: resource_id.into(),
            http_method: http_method.into(),
            integration_type: AWS_PROXY.to_string(),
            integration_http_method: "POST".to_string(),
            uri: uri.into(),
            extra: Config::new(),
        }
    }
}

impl ResourceSpec for IntegrationSpec {
    const KIND: NodeType = NodeType::Integration;

    fn into_config(self) -> Config {
        let config = Config::new()
            .with("rest_api_id", self.rest_api_id)
            .with("resource_id", self.resource_id)
            .with("http_method", self.http_method)
            .with("type", self.integration_type)
            .with("integration_http_method", self.integration_http_method)
            .with("uri", self.uri);
        finish(config, self.extra)
    }
}
