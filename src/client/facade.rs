use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cluster::protocol::{
    ClusterConfig, ClusterConfigRequest, GenericResponse, GetResponse, LeaderRequest,
    LeaderResponse, PutRequest, ENDPOINT_CLUSTER_CONFIG, ENDPOINT_GET, ENDPOINT_LEADER,
    ENDPOINT_PUT,
};
use crate::cluster::registry::Registry;
use crate::cluster::types::{NodeDescriptor, NO_LEADER};
use crate::config::NodesConfig;
use crate::error::Error;
use crate::ring::Ring;
use crate::server::handlers::Pair;

const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(1);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(3);
const WATCH_INTERVAL: Duration = Duration::from_secs(3);

/// Cache client with local routing state.
///
/// The registry and ring mirror the cluster's membership; the watcher task
/// keeps them fresh. Each instance has its own identity and its own pooled
/// HTTP connections.
pub struct CacheClient {
    registry: Registry,
    ring: Ring,
    http: reqwest::Client,
    caller_id: String,
}

impl CacheClient {
    /// Connect using the configured nodes as seeds.
    pub async fn connect(config: &NodesConfig, virtual_nodes: u32) -> Result<Arc<Self>> {
        Self::connect_seeds(&config.descriptors(), virtual_nodes).await
    }

    /// Connect by asking each seed for the cluster config; the first seed
    /// that answers defines the initial view.
    pub async fn connect_seeds(
        seeds: &[NodeDescriptor],
        virtual_nodes: u32,
    ) -> Result<Arc<Self>> {
        let client = Self {
            registry: Registry::new(),
            ring: Ring::new(virtual_nodes),
            http: reqwest::Client::new(),
            caller_id: format!("client-{}", Uuid::new_v4()),
        };

        for seed in seeds {
            let config: Result<ClusterConfig> = client
                .post_rpc(
                    &seed.rpc_base(),
                    ENDPOINT_CLUSTER_CONFIG,
                    &ClusterConfigRequest {
                        caller_node_id: client.caller_id.clone(),
                    },
                    DISCOVERY_TIMEOUT,
                )
                .await;

            match config {
                Ok(config) => {
                    for node in config.nodes {
                        client.ring.add(&node.id);
                        client.registry.insert(node);
                    }
                    info!(
                        seed = %seed.id,
                        nodes = client.registry.len(),
                        "cluster config loaded"
                    );
                    return Ok(Arc::new(client));
                }
                Err(e) => {
                    warn!(seed = %seed.id, "seed unreachable: {e:#}");
                }
            }
        }

        bail!("no configured seed node answered a cluster config request")
    }

    pub fn caller_id(&self) -> &str {
        &self.caller_id
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn ring(&self) -> &Ring {
        &self.ring
    }

    /// Resolve the node currently owning `key` in the local ring view.
    ///
    /// Keys are opaque strings but must be non-empty; an empty key cannot be
    /// expressed on the text endpoint's path.
    pub fn owner_of(&self, key: &str) -> Result<NodeDescriptor, Error> {
        if key.is_empty() {
            return Err(Error::InvalidRequest("empty key".to_string()));
        }
        let owner_id = self.ring.get(key)?;
        self.registry.get(&owner_id).ok_or(Error::NodeNotFound)
    }

    // ------------------------------------------------------------
    // Text endpoint
    // ------------------------------------------------------------

    /// Read through the owner's text endpoint. `None` is a miss.
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let owner = self.owner_of(key)?;
        let response = self
            .http
            .get(format!("{}/get/{}", owner.rest_base(), key))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .with_context(|| format!("get request to node {}", owner.id))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let pair: Pair = response.error_for_status()?.json().await?;
        Ok(Some(pair.value))
    }

    /// Write through the owner's text endpoint.
    pub async fn put(&self, key: &str, value: &str) -> Result<()> {
        let owner = self.owner_of(key)?;
        self.http
            .post(format!("{}/put", owner.rest_base()))
            .json(&Pair {
                key: key.to_string(),
                value: value.to_string(),
            })
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .with_context(|| format!("put request to node {}", owner.id))?
            .error_for_status()?;
        Ok(())
    }

    // ------------------------------------------------------------
    // RPC endpoint
    // ------------------------------------------------------------

    /// Read through the owner's RPC endpoint; a miss is the
    /// `"key not found"` sentinel, not an error.
    pub async fn get_rpc(&self, key: &str) -> Result<String> {
        let owner = self.owner_of(key)?;
        let response: GetResponse = self
            .http
            .get(format!("{}{}/{}", owner.rpc_base(), ENDPOINT_GET, key))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .with_context(|| format!("rpc get to node {}", owner.id))?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.data)
    }

    /// Write through the owner's RPC endpoint.
    pub async fn put_rpc(&self, key: &str, value: &str) -> Result<()> {
        let owner = self.owner_of(key)?;
        let _: GenericResponse = self
            .post_rpc(
                &owner.rpc_base(),
                ENDPOINT_PUT,
                &PutRequest {
                    key: key.to_string(),
                    value: value.to_string(),
                },
                REQUEST_TIMEOUT,
            )
            .await
            .with_context(|| format!("rpc put to node {}", owner.id))?;
        Ok(())
    }

    // ------------------------------------------------------------
    // Cluster discovery
    // ------------------------------------------------------------

    /// Keep the local membership view following the leader's.
    ///
    /// Infinite by contract: failures are logged and the next tick retries.
    pub fn start_cluster_config_watcher(self: &Arc<Self>) -> JoinHandle<()> {
        let client = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(WATCH_INTERVAL).await;
                if let Err(e) = client.refresh_cluster_config().await {
                    warn!("cluster config refresh failed: {e:#}");
                }
            }
        })
    }

    /// One watcher round: locate the leader, fetch its membership, and diff
    /// it against the local registry and ring.
    pub async fn refresh_cluster_config(&self) -> Result<()> {
        let leader = self.find_leader().await?;
        let config: ClusterConfig = self
            .post_rpc(
                &leader.rpc_base(),
                ENDPOINT_CLUSTER_CONFIG,
                &ClusterConfigRequest {
                    caller_node_id: self.caller_id.clone(),
                },
                DISCOVERY_TIMEOUT,
            )
            .await
            .with_context(|| format!("cluster config from leader {}", leader.id))?;

        let fresh: HashSet<&str> = config.nodes.iter().map(|n| n.id.as_str()).collect();
        for node in self.registry.descriptors() {
            if !fresh.contains(node.id.as_str()) {
                info!(node = %node.id, "removing node from ring");
                self.registry.remove(&node.id);
                let _ = self.ring.remove(&node.id);
            }
        }
        for node in config.nodes {
            if !self.registry.contains(&node.id) {
                info!(node = %node.id, "adding node to ring");
                self.ring.add(&node.id);
                self.registry.insert(node);
            }
        }
        Ok(())
    }

    /// Ask random known nodes for the leader until one answers, skipping
    /// nodes already attempted this round.
    async fn find_leader(&self) -> Result<NodeDescriptor> {
        let mut attempted: HashSet<String> = HashSet::new();

        while attempted.len() < self.registry.len() {
            let Some(node) = self.registry.get_random() else {
                break;
            };
            if !attempted.insert(node.id.clone()) {
                continue;
            }

            let response: Result<LeaderResponse> = self
                .post_rpc(
                    &node.rpc_base(),
                    ENDPOINT_LEADER,
                    &LeaderRequest {
                        caller: self.caller_id.clone(),
                    },
                    DISCOVERY_TIMEOUT,
                )
                .await;

            match response {
                Ok(leader) if leader.id != NO_LEADER => {
                    debug!(leader = %leader.id, "found leader");
                    if let Some(descriptor) = self.registry.get(&leader.id) {
                        return Ok(descriptor);
                    }
                    debug!(leader = %leader.id, "leader not in local registry yet");
                }
                Ok(_) => {}
                Err(e) => {
                    debug!(node = %node.id, "leader lookup failed: {e:#}");
                }
            }
        }

        Err(Error::NoLeader.into())
    }

    async fn post_rpc<Req, Resp>(
        &self,
        base: &str,
        endpoint: &str,
        payload: &Req,
        timeout: Duration,
    ) -> Result<Resp>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let response = self
            .http
            .post(format!("{}{}", base, endpoint))
            .json(payload)
            .timeout(timeout)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }
}
