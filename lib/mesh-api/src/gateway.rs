use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::service::Protocol;

/// Gateway is the region's single traffic entry point
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Gateway {
    pub name: String,
    pub region: String,
    pub listener: GatewayListener,
    pub access_log_path: String,
    /// Hostname routing rules, in catalog order
    pub routes: Vec<GatewayRoute>,
}

impl Gateway {
    /// Find the rule matching a hostname exactly
    pub fn route_for(&self, hostname: &str) -> Option<&GatewayRoute> {
        self.routes.iter().find(|route| route.hostname.matches(hostname))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct GatewayListener {
    pub port: u16,
    pub protocol: Protocol,
}

/// One hostname rule, targeting a virtual service
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct GatewayRoute {
    pub name: String,
    pub hostname: HostnameMatch,
    pub virtual_service: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum HostnameMatch {
    Exact(String),
}

impl HostnameMatch {
    pub fn matches(&self, hostname: &str) -> bool {
        match self {
            HostnameMatch::Exact(expected) => expected.eq_ignore_ascii_case(hostname),
        }
    }

    pub fn hostname(&self) -> &str {
        match self {
            HostnameMatch::Exact(hostname) => hostname,
        }
    }
}
