//! Authorized Lambda API composition.
//!
//! Declares a function behind a REST API whose single method is guarded by a
//! user-pool authorizer and proxied to the function.
//!
//! ```text
//! Authorizer         <- GatewayApi, UserPool
//! GatewayResource    <- GatewayApi
//! GatewayMethod      <- GatewayApi, GatewayResource, Authorizer
//! GatewayIntegration <- GatewayApi, GatewayResource, GatewayMethod, Lambda
//! ```

use crate::declare::{NodeHandle, Stack};
use crate::resource::{
    with_attribute, AuthorizerSpec, FunctionSpec, IntegrationSpec, MethodSpec, PathResourceSpec,
    RestApiSpec, UserPoolSpec,
};
use trellis_core::{Config, GraphResult, Reference, Value};

/// Authorizer settings; its type, API and trusted pool are wired
#[derive(Debug, Clone, PartialEq)]
pub struct AuthorizerProps {
    /// Authorizer name
    pub name: String,
    /// Free-form attributes, e.g. `identity_source`
    pub extra: Config,
}

impl AuthorizerProps {
    /// Authorizer settings with just a name
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extra: Config::new(),
        }
    }
}

/// Path resource settings; its API and parent are wired
#[derive(Debug, Clone, PartialEq)]
pub struct PathResourceProps {
    /// Path segment the method lives under
    pub path_part: String,
    /// Free-form attributes
    pub extra: Config,
}

impl PathResourceProps {
    /// Path resource settings for one segment
    #[must_use]
    pub fn new(path_part: impl Into<String>) -> Self {
        Self {
            path_part: path_part.into(),
            extra: Config::new(),
        }
    }
}

/// Method settings; its API, resource and authorization are wired
#[derive(Debug, Clone, PartialEq)]
pub struct MethodProps {
    /// HTTP verb
    pub http_method: String,
    /// Free-form attributes, e.g. `request_parameters`
    pub extra: Config,
}

impl MethodProps {
    /// Method settings for one verb
    #[must_use]
    pub fn new(http_method: impl Into<String>) -> Self {
        Self {
            http_method: http_method.into(),
            extra: Config::new(),
        }
    }
}

/// Integration settings; its API, resource, verb, type and URI are wired
#[derive(Debug, Clone, PartialEq)]
pub struct IntegrationProps {
    /// Verb used to call the function
    pub integration_http_method: String,
    /// Free-form attributes, e.g. `timeout_milliseconds`
    pub extra: Config,
}

impl Default for IntegrationProps {
    fn default() -> Self {
        Self {
            integration_http_method: "POST".to_string(),
            extra: Config::new(),
        }
    }
}

with_attribute!(AuthorizerProps, PathResourceProps, MethodProps, IntegrationProps);

/// Inputs for [`AuthorizedLambdaApi::declare`]
#[derive(Debug, Clone, PartialEq)]
pub struct AuthorizedLambdaApiProps {
    /// The backing function
    pub function: FunctionSpec,
    /// The API
    pub api: RestApiSpec,
    /// The user pool trusted by the authorizer
    pub user_pool: UserPoolSpec,
    /// The authorizer guarding the method
    pub authorizer: AuthorizerProps,
    /// The path resource holding the method
    pub resource: PathResourceProps,
    /// The guarded method
    pub method: MethodProps,
    /// The proxy integration to the function
    pub integration: IntegrationProps,
}

impl AuthorizedLambdaApiProps {
    /// Props that reuse one name for the API, pool, authorizer and path
    #[must_use]
    pub fn named(name: &str, function: FunctionSpec) -> Self {
        Self {
            function,
            api: RestApiSpec::new(name),
            user_pool: UserPoolSpec::new(name),
            authorizer: AuthorizerProps::new(name),
            resource: PathResourceProps::new(name),
            method: MethodProps::new("GET"),
            integration: IntegrationProps::default(),
        }
    }

    /// Override the HTTP verb
    #[must_use]
    pub fn with_http_method(mut self, http_method: impl Into<String>) -> Self {
        self.method.http_method = http_method.into();
        self
    }
}

/// Handles to the seven nodes of the composition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizedLambdaApi {
    /// `<prefix>Lambda`
    pub function: NodeHandle,
    /// `<prefix>GatewayApi`
    pub api: NodeHandle,
    /// `<prefix>UserPool`
    pub user_pool: NodeHandle,
    /// `<prefix>Authorizer`
    pub authorizer: NodeHandle,
    /// `<prefix>GatewayResource`
    pub resource: NodeHandle,
    /// `<prefix>GatewayMethod`
    pub method: NodeHandle,
    /// `<prefix>GatewayIntegration`
    pub integration: NodeHandle,
}

impl AuthorizedLambdaApi {
    /// Declare the composition into a stack
    ///
    /// # Errors
    ///
    /// Returns `InvalidName` if the prefix produces invalid node names and
    /// `DuplicateIdentity` if any of the names is already declared
    pub fn declare(stack: &mut Stack, prefix: &str, props: AuthorizedLambdaApiProps) -> GraphResult<Self> {
        let function = stack.resource(&format!("{}Lambda", prefix), props.function)?;
        let api = stack.resource(&format!("{}GatewayApi", prefix), props.api)?;
        let user_pool = stack.resource(&format!("{}UserPool", prefix), props.user_pool)?;

        let mut authorizer_spec = AuthorizerSpec::new(props.authorizer.name, api.attr("id")?)
            .with_provider_arn(user_pool.attr("arn")?);
        authorizer_spec.extra = props.authorizer.extra;
        let authorizer = stack.resource(&format!("{}Authorizer", prefix), authorizer_spec)?;

        let mut resource_spec =
            PathResourceSpec::new(props.resource.path_part, api.attr("id")?, api.attr("root_resource_id")?);
        resource_spec.extra = props.resource.extra;
        let resource = stack.resource(&format!("{}GatewayResource", prefix), resource_spec)?;

        let mut method_spec = MethodSpec::new(props.method.http_method, api.attr("id")?, resource.attr("id")?)
            .with_user_pool_authorizer(authorizer.attr("id")?);
        method_spec.extra = props.method.extra;
        let method = stack.resource(&format!("{}GatewayMethod", prefix), method_spec)?;

        let mut integration_spec = IntegrationSpec::proxy(
            api.attr("id")?,
            resource.attr("id")?,
            method.attr("http_method")?,
            function.attr("invoke_arn")?,
        );
        integration_spec.integration_http_method = props.integration.integration_http_method;
        integration_spec.extra = props.integration.extra;
        let integration = stack.resource(&format!("{}GatewayIntegration", prefix), integration_spec)?;

        Ok(Self {
            function,
            api,
            user_pool,
            authorizer,
            resource,
            method,
            integration,
        })
    }

    /// The flat output record this composition exposes
    ///
    /// # Errors
    ///
    /// Never fails for the fixed attribute names used here; the result type
    /// comes from reference construction
    pub fn outputs(&self) -> GraphResult<Vec<(&'static str, Reference)>> {
        Ok(vec![
            ("functionArn", self.function.reference("arn")?),
            ("apiGatewayApiArn", self.api.reference("arn")?),
            ("cognitoUserPoolArn", self.user_pool.reference("arn")?),
            ("apiGatewayAuthorizerId", self.authorizer.reference("id")?),
            ("apiGatewayResourceId", self.resource.reference("id")?),
            ("apiGatewayMethodId", self.method.reference("id")?),
        ])
    }

    /// Register [`AuthorizedLambdaApi::outputs`] on the stack
    ///
    /// # Errors
    ///
    /// Returns `DuplicateOutput` if an output name is already taken
    pub fn declare_outputs(&self, stack: &mut Stack) -> GraphResult<()> {
        for (name, source) in self.outputs()? {
            stack.output(name, source)?;
        }
        Ok(())
    }
}
