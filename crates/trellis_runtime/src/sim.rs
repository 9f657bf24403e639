//! Deterministic in-memory provider.
//!
//! Realizes nodes without touching any cloud API. Identifiers are derived
//! from the config digest, so the same declaration always realizes to the
//! same values.

use crate::provider::{AsyncProvider, Provider};
use async_trait::async_trait;
use indexmap::IndexSet;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use trellis_core::{ConfigDigest, NodeType, ProviderError, RealizedValue, ResolvedConfig};

/// One recorded provider call
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedCall {
    /// Requested node type
    pub kind: NodeType,
    /// Resolved config as received
    pub config: ResolvedConfig,
    /// Digest of the request
    pub digest: ConfigDigest,
}

/// Simulated capability provider
#[derive(Debug)]
pub struct SimulatedProvider {
    region: String,
    account: String,
    fail_on: IndexSet<NodeType>,
    latency: Duration,
    calls: Mutex<Vec<SimulatedCall>>,
}

impl SimulatedProvider {
    /// Default region
    pub const DEFAULT_REGION: &'static str = "us-east-1";
    /// Default account id
    pub const DEFAULT_ACCOUNT: &'static str = "123456789012";

    /// Create a provider for the default region and account
    #[must_use]
    pub fn new() -> Self {
        Self {
            region: Self::DEFAULT_REGION.to_string(),
            account: Self::DEFAULT_ACCOUNT.to_string(),
            fail_on: IndexSet::new(),
            latency: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Set the region used in ARNs
    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Set the account used in ARNs
    #[must_use]
    pub fn with_account(mut self, account: impl Into<String>) -> Self {
        self.account = account.into();
        self
    }

    /// Fail every call for this node type
    #[must_use]
    pub fn fail_on(mut self, kind: NodeType) -> Self {
        self.fail_on.insert(kind);
        self
    }

    /// Delay every async call
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Calls received so far, failed ones included
    #[must_use]
    pub fn calls(&self) -> Vec<SimulatedCall> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of calls received so far
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn realize(&self, kind: NodeType, config: &ResolvedConfig) -> Result<RealizedValue, ProviderError> {
        let digest = ConfigDigest::compute(kind, config);
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(SimulatedCall {
                kind,
                config: config.clone(),
                digest,
            });

        if self.fail_on.contains(&kind) {
            return Err(ProviderError::new(format!("simulated {} failure", kind)));
        }

        let short = digest.short();
        let id = format!("{}-{}", id_prefix(kind), short);
        let (region, account) = (&self.region, &self.account);
        let arn = match kind {
            NodeType::Function => format!(
                "arn:aws:lambda:{}:{}:function:{}",
                region,
                account,
                config.get_str("function_name").unwrap_or(&id)
            ),
            NodeType::UserPool => {
                format!("arn:aws:cognito-idp:{}:{}:userpool/{}_{}", region, account, region, short)
            }
            NodeType::RestApi => format!("arn:aws:apigateway:{}::/restapis/{}", region, id),
            other => format!("arn:aws:apigateway:{}::/{}/{}", region, other, id),
        };

        let mut value = RealizedValue::echo(config).with("id", id.clone());
        match kind {
            NodeType::Function => {
                value.insert(
                    "invoke_arn",
                    format!(
                        "arn:aws:apigateway:{}:lambda:path/2015-03-31/functions/{}/invocations",
                        region, arn
                    ),
                );
            }
            NodeType::RestApi => value.insert("root_resource_id", format!("root-{}", short)),
            _ => {}
        }
        value.insert("arn", arn);
        Ok(value)
    }
}

impl Default for SimulatedProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn id_prefix(kind: NodeType) -> &'static str {
    match kind {
        NodeType::Function => "fn",
        NodeType::RestApi => "api",
        NodeType::UserPool => "pool",
        NodeType::Authorizer => "auth",
        NodeType::Resource => "res",
        NodeType::Method => "method",
        NodeType::Integration => "integ",
    }
}

impl Provider for SimulatedProvider {
    fn materialize(
        &mut self,
        kind: NodeType,
        config: &ResolvedConfig,
    ) -> Result<RealizedValue, ProviderError> {
        self.realize(kind, config)
    }
}

#[async_trait]
impl AsyncProvider for SimulatedProvider {
    async fn materialize(
        &self,
        kind: NodeType,
        config: &ResolvedConfig,
    ) -> Result<RealizedValue, ProviderError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.realize(kind, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::{Config, Value};

    fn resolved(config: Config) -> ResolvedConfig {
        ResolvedConfig::try_new(config).unwrap()
    }

    #[test]
    fn test_function_attributes() {
        let mut provider = SimulatedProvider::new();
        let value = Provider::materialize(
            &mut provider,
            NodeType::Function,
            &resolved(Config::new().with("function_name", "helloWorld")),
        )
        .unwrap();

        assert_eq!(value.get("function_name"), Some(&Value::from("helloWorld")));
        assert_eq!(
            value.get("arn"),
            Some(&Value::from("arn:aws:lambda:us-east-1:123456789012:function:helloWorld"))
        );
        let invoke_arn = value.get("invoke_arn").and_then(Value::as_str).unwrap();
        assert!(invoke_arn.ends_with("function:helloWorld/invocations"));
        assert!(value.get("id").and_then(Value::as_str).unwrap().starts_with("fn-"));
    }

    #[test]
    fn test_rest_api_has_root_resource() {
        let mut provider = SimulatedProvider::new().with_region("eu-west-1");
        let value = Provider::materialize(&mut provider, NodeType::RestApi, &ResolvedConfig::default()).unwrap();
        assert!(value.get("root_resource_id").is_some());
        assert!(value.get("arn").and_then(Value::as_str).unwrap().contains("eu-west-1"));
    }

    #[test]
    fn test_deterministic_ids() {
        let config = resolved(Config::new().with("name", "pool"));
        let mut a = SimulatedProvider::new();
        let mut b = SimulatedProvider::new();
        assert_eq!(
            Provider::materialize(&mut a, NodeType::UserPool, &config).unwrap(),
            Provider::materialize(&mut b, NodeType::UserPool, &config).unwrap()
        );

        let other = resolved(Config::new().with("name", "other"));
        assert_ne!(
            Provider::materialize(&mut a, NodeType::UserPool, &config).unwrap().get("id"),
            Provider::materialize(&mut a, NodeType::UserPool, &other).unwrap().get("id")
        );
    }

    #[test]
    fn test_fail_on_records_call() {
        let mut provider = SimulatedProvider::new().fail_on(NodeType::Method);
        let err = Provider::materialize(&mut provider, NodeType::Method, &ResolvedConfig::default()).unwrap_err();
        assert_eq!(err.message, "simulated method failure");
        assert_eq!(provider.call_count(), 1);
        assert_eq!(provider.calls()[0].kind, NodeType::Method);
    }

    #[tokio::test]
    async fn test_async_materialize() {
        let provider = SimulatedProvider::new().with_latency(Duration::from_millis(1));
        let value = AsyncProvider::materialize(&provider, NodeType::Integration, &ResolvedConfig::default())
            .await
            .unwrap();
        assert!(value.get("arn").and_then(Value::as_str).unwrap().contains("/integration/"));
    }
}
