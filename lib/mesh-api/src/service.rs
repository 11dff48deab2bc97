use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Service is one entry of the catalog after port and hostname assignment
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Service {
    /// Service name, unique within a region
    pub name: String,

    /// Public hostname inside the shared mesh zone
    pub hostname: String,

    /// Region-local discovery name resolving to live workload endpoints
    pub discovery_name: String,

    /// Listener port (load balancer and container)
    pub port: u16,

    /// Desired number of workload replicas
    pub replicas: u32,
}

/// RoutingNode is the addressable backend of one service's live instances
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RoutingNode {
    pub name: String,
    pub service: String,
    pub listener: NodeListener,
    pub discovery: ServiceDiscovery,
    pub access_log_path: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct NodeListener {
    pub port: u16,
    pub protocol: Protocol,
    pub health_check: HealthProbe,
}

/// Application protocol spoken on a mesh listener
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Tcp,
}

/// How a routing node finds its endpoints
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ServiceDiscovery {
    Dns {
        hostname: String,
        response_type: DnsResponseType,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DnsResponseType {
    /// Every healthy endpoint is returned
    Endpoints,
    /// A single load balancer address is returned
    LoadBalancer,
}

/// Health probe configuration for a routing node listener
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct HealthProbe {
    /// HTTP path probed on the workload
    #[serde(default = "default_health_path")]
    pub path: String,

    /// Interval between probes (seconds)
    #[serde(default = "default_health_interval")]
    pub interval_seconds: u32,

    /// Timeout of a single probe (seconds)
    #[serde(default = "default_health_timeout")]
    pub timeout_seconds: u32,

    /// Consecutive failures before marking unhealthy
    #[serde(default = "default_unhealthy_threshold")]
    pub unhealthy_threshold: u32,

    /// Consecutive successes before marking healthy
    #[serde(default = "default_healthy_threshold")]
    pub healthy_threshold: u32,
}

impl Default for HealthProbe {
    fn default() -> Self {
        Self {
            path: default_health_path(),
            interval_seconds: default_health_interval(),
            timeout_seconds: default_health_timeout(),
            unhealthy_threshold: default_unhealthy_threshold(),
            healthy_threshold: default_healthy_threshold(),
        }
    }
}

/// Router is the policy layer in front of a service's routing node
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Router {
    pub name: String,
    pub service: String,
    pub port: u16,
    pub protocol: Protocol,
    /// Weighted targets, in order
    pub targets: Vec<WeightedTarget>,
    pub request_timeout_seconds: u32,
    pub retry_policy: RetryPolicy,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct WeightedTarget {
    /// Name of the routing node
    pub node: String,
    pub weight: u32,
}

/// Retry policy attached to a router
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RetryPolicy {
    /// HTTP-level events that trigger a retry
    #[serde(default = "default_http_retry_events")]
    pub http_retry_events: Vec<HttpRetryEvent>,

    /// Connection-level events that trigger a retry
    #[serde(default = "default_tcp_retry_events")]
    pub tcp_retry_events: Vec<TcpRetryEvent>,

    /// Maximum number of retries
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Timeout of each retry attempt (seconds)
    #[serde(default = "default_per_retry_timeout")]
    pub per_retry_timeout_seconds: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            http_retry_events: default_http_retry_events(),
            tcp_retry_events: default_tcp_retry_events(),
            max_retries: default_max_retries(),
            per_retry_timeout_seconds: default_per_retry_timeout(),
        }
    }
}

impl RetryPolicy {
    /// Whether any event class is configured at all
    pub fn is_empty(&self) -> bool {
        self.http_retry_events.is_empty() && self.tcp_retry_events.is_empty()
    }

    pub fn retries_on_http(&self, event: HttpRetryEvent) -> bool {
        self.http_retry_events.contains(&event)
    }

    pub fn retries_on_tcp(&self, event: TcpRetryEvent) -> bool {
        self.tcp_retry_events.contains(&event)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum HttpRetryEvent {
    ServerError,
    GatewayError,
    ClientError,
    StreamError,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum TcpRetryEvent {
    ConnectionError,
}

/// VirtualService is the name clients and gateway routes address;
/// it is provided by the service's router
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct VirtualService {
    pub name: String,
    pub router: String,
}

fn default_health_path() -> String {
    "/health".to_string()
}

fn default_health_interval() -> u32 {
    5
}

fn default_health_timeout() -> u32 {
    2
}

fn default_unhealthy_threshold() -> u32 {
    2
}

fn default_healthy_threshold() -> u32 {
    3
}

fn default_http_retry_events() -> Vec<HttpRetryEvent> {
    vec![HttpRetryEvent::StreamError, HttpRetryEvent::GatewayError]
}

fn default_tcp_retry_events() -> Vec<TcpRetryEvent> {
    vec![TcpRetryEvent::ConnectionError]
}

fn default_max_retries() -> u32 {
    5
}

fn default_per_retry_timeout() -> u32 {
    2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_health_probe() {
        let probe = HealthProbe::default();
        assert_eq!(probe.path, "/health");
        assert_eq!(probe.interval_seconds, 5);
        assert_eq!(probe.timeout_seconds, 2);
        assert_eq!(probe.unhealthy_threshold, 2);
        assert_eq!(probe.healthy_threshold, 3);
    }

    #[test]
    fn test_default_retry_policy() {
        let policy = RetryPolicy::default();
        assert!(policy.retries_on_tcp(TcpRetryEvent::ConnectionError));
        assert!(policy.retries_on_http(HttpRetryEvent::GatewayError));
        assert!(policy.retries_on_http(HttpRetryEvent::StreamError));
        assert!(!policy.retries_on_http(HttpRetryEvent::ClientError));
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.per_retry_timeout_seconds, 2);
    }

    #[test]
    fn test_retry_events_use_kebab_case() {
        let json = serde_json::to_string(&RetryPolicy::default()).unwrap();
        assert!(json.contains("\"gateway-error\""));
        assert!(json.contains("\"connection-error\""));
    }

    #[test]
    fn test_partial_probe_fills_defaults() {
        let probe: HealthProbe = serde_json::from_str(r#"{"path":"/ready"}"#).unwrap();
        assert_eq!(probe.path, "/ready");
        assert_eq!(probe.interval_seconds, 5);
    }
}
