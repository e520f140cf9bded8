use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{mpsc, watch, Mutex as AsyncMutex};
use tracing::{debug, info, warn};

use super::protocol::{
    ClusterConfig, ClusterConfigRequest, ElectionRequest, GenericResponse, LeaderRequest,
    LeaderResponse, NewLeaderAnnouncement, PidRequest, PidResponse, StatusRequest,
    ENDPOINT_CLUSTER_CONFIG, ENDPOINT_ELECTION, ENDPOINT_LEADER, ENDPOINT_PID, ENDPOINT_REGISTER,
    ENDPOINT_STATUS, ENDPOINT_UPDATE_CLUSTER_CONFIG, ENDPOINT_UPDATE_LEADER,
};
use super::registry::Registry;
use super::types::{outranks, ElectionState, NodeDescriptor, NO_LEADER};
use crate::ring::Ring;

const MONITOR_INTERVAL: Duration = Duration::from_secs(1);
const CONFIG_PUSH_TIMEOUT: Duration = Duration::from_secs(1);
const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(1);
const PEER_PROBE_TIMEOUT: Duration = Duration::from_secs(3);
const LEADER_PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const ELECTION_RPC_TIMEOUT: Duration = Duration::from_secs(5);
const DECISION_TIMEOUT: Duration = Duration::from_secs(5);
const ELECTION_RETRY_INTERVAL: Duration = Duration::from_secs(3);

/// Membership and election service for one cache node.
///
/// Owns the node registry and the server-side ring; both are mutated in
/// lockstep while the state lock is held, and only from this service.
/// Outbound calls carry bounded timeouts and are never retried inline: a
/// failed peer is either skipped (elections) or expelled (liveness monitor).
pub struct ClusterService {
    local: NodeDescriptor,
    pid: u32,
    registry: Registry,
    ring: Ring,
    state: Mutex<ElectionState>,
    // One-slot rendezvous for the announced winner; racing announcements
    // beyond the first are dropped by the sender.
    decision_tx: mpsc::Sender<String>,
    decision_rx: AsyncMutex<mpsc::Receiver<String>>,
    shutdown_tx: watch::Sender<bool>,
    http: reqwest::Client,
}

impl ClusterService {
    /// Create a service seeded with the configured membership.
    ///
    /// `pid` is the rank primary key; servers pass their process id.
    pub fn new(
        local: NodeDescriptor,
        seeds: Vec<NodeDescriptor>,
        virtual_nodes: u32,
        pid: u32,
    ) -> Arc<Self> {
        let registry = Registry::new();
        let ring = Ring::new(virtual_nodes);

        registry.insert(local.clone());
        ring.add(&local.id);
        for seed in seeds {
            if seed.id != local.id && !registry.contains(&seed.id) {
                ring.add(&seed.id);
                registry.insert(seed);
            }
        }

        let (decision_tx, decision_rx) = mpsc::channel(1);
        let (shutdown_tx, _) = watch::channel(false);

        Arc::new(Self {
            local,
            pid,
            registry,
            ring,
            state: Mutex::new(ElectionState::new()),
            decision_tx,
            decision_rx: AsyncMutex::new(decision_rx),
            shutdown_tx,
            http: reqwest::Client::new(),
        })
    }

    pub fn local(&self) -> &NodeDescriptor {
        &self.local
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn ring(&self) -> &Ring {
        &self.ring
    }

    pub fn leader_id(&self) -> String {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .leader_id
            .clone()
    }

    pub fn is_leader(&self) -> bool {
        self.leader_id() == self.local.id
    }

    pub fn in_election(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .in_election
    }

    /// Signal every background loop to exit.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    pub fn is_shut_down(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    // ------------------------------------------------------------
    // Election
    // ------------------------------------------------------------

    /// Run a Bully election.
    ///
    /// Queries every peer's rank once, challenges only the peers that
    /// outrank this node, then waits once for the announced winner. A
    /// decision timeout restarts the round; with no reachable higher-ranked
    /// peer this node declares itself leader and announces.
    pub async fn run_election(self: &Arc<Self>) {
        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if state.in_election {
                debug!("election already running");
                return;
            }
            state.in_election = true;
        }

        info!(pid = self.pid, node = %self.local.id, "starting election");

        loop {
            let peers = self.registry.peers(&self.local.id);
            let mut outranking = Vec::new();

            for peer in &peers {
                match self.fetch_pid(peer).await {
                    Ok(pid) => {
                        debug!(peer = %peer.id, pid, "peer rank collected");
                        if outranks(pid, &peer.id, self.pid, &self.local.id) {
                            outranking.push(peer.clone());
                        }
                    }
                    Err(e) => {
                        info!(peer = %peer.id, "skipping unreachable peer: {e:#}");
                    }
                }
            }

            if outranking.is_empty() {
                self.set_leader(&self.local.id);
                info!(node = %self.local.id, "no reachable peer outranks this node, assuming leadership");
                self.announce_leader().await;
                break;
            }

            for peer in &outranking {
                info!(peer = %peer.id, "requesting election from higher-ranked peer");
                if let Err(e) = self.send_election_request(peer).await {
                    info!(peer = %peer.id, "election request failed: {e:#}");
                }
            }

            let mut rx = self.decision_rx.lock().await;
            match tokio::time::timeout(DECISION_TIMEOUT, rx.recv()).await {
                Ok(Some(leader)) => {
                    self.set_leader(&leader);
                    info!(leader = %leader, "election decided");
                    break;
                }
                Ok(None) => break, // channel closed, shutting down
                Err(_) => {
                    info!("timed out waiting for election decision, restarting");
                }
            }
        }

        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .in_election = false;
    }

    /// Broadcast the local leader id to every peer, best-effort.
    pub async fn announce_leader(&self) {
        let leader_id = self.leader_id();
        let announcement = NewLeaderAnnouncement {
            leader_id: leader_id.clone(),
        };

        for peer in self.registry.peers(&self.local.id) {
            let result: Result<GenericResponse> = self
                .post_rpc(
                    &peer.rpc_base(),
                    ENDPOINT_UPDATE_LEADER,
                    &announcement,
                    ELECTION_RPC_TIMEOUT,
                )
                .await;
            if let Err(e) = result {
                info!(peer = %peer.id, "leader announcement failed: {e:#}");
            }
        }
    }

    /// Record an announced winner and wake any election waiting on it.
    pub fn record_leader(&self, leader_id: &str) {
        info!(leader = %leader_id, "received leader announcement");
        self.set_leader(leader_id);
        // Slot already occupied means a decision is already pending; drop.
        let _ = self.decision_tx.try_send(leader_id.to_string());
    }

    /// Return the known leader, electing one first if necessary.
    ///
    /// The election runs on its own task: this method is awaited inside RPC
    /// handlers, and a caller hanging up must not abandon an election with
    /// its in-progress flag still set.
    pub async fn ensure_leader(self: &Arc<Self>) -> String {
        loop {
            let leader = self.leader_id();
            if leader != NO_LEADER {
                return leader;
            }
            let service = Arc::clone(self);
            let _ = tokio::spawn(async move {
                service.run_election().await;
            })
            .await;

            let leader = self.leader_id();
            if leader != NO_LEADER {
                return leader;
            }
            info!("no leader elected, retrying shortly");
            tokio::time::sleep(ELECTION_RETRY_INTERVAL).await;
        }
    }

    /// Respond to a rank query; challenge back when the caller is outranked.
    pub fn on_pid_request(self: &Arc<Self>, caller_pid: u32, caller_node_id: &str) -> u32 {
        if outranks(self.pid, &self.local.id, caller_pid, caller_node_id) {
            let service = Arc::clone(self);
            tokio::spawn(async move {
                service.run_election().await;
            });
        }
        self.pid
    }

    /// Respond to an election challenge by starting a local election.
    pub fn on_election_request(self: &Arc<Self>, caller_node_id: &str) -> String {
        info!(caller = %caller_node_id, "received election request");
        if self.in_election() {
            return "Election already running".to_string();
        }
        let service = Arc::clone(self);
        tokio::spawn(async move {
            service.run_election().await;
        });
        super::types::OK.to_string()
    }

    fn set_leader(&self, leader_id: &str) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.leader_id = leader_id.to_string();
    }

    // ------------------------------------------------------------
    // Liveness monitoring
    // ------------------------------------------------------------

    /// Background loop: follower probes the leader, leader probes every peer.
    ///
    /// Infinite by contract; only the shutdown signal ends it.
    pub async fn monitor_liveness(self: Arc<Self>) {
        info!("liveness monitor starting");

        let mut shutdown = self.shutdown_signal();
        let mut ticker = tokio::time::interval(MONITOR_INTERVAL);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.is_leader() {
                        self.probe_peers().await;
                    } else if !self.is_leader_up().await {
                        info!("leader unreachable, running election");
                        self.run_election().await;
                    }
                }
                _ = shutdown.changed() => {
                    info!("liveness monitor shutting down");
                    return;
                }
            }
        }
    }

    async fn is_leader_up(&self) -> bool {
        let leader_id = self.leader_id();
        if leader_id == NO_LEADER {
            info!("no leader known");
            return false;
        }
        if leader_id == self.local.id {
            return true;
        }

        let Some(leader) = self.registry.get(&leader_id) else {
            info!(leader = %leader_id, "leader missing from registry");
            return false;
        };

        match self.probe_status(&leader, LEADER_PROBE_TIMEOUT).await {
            Ok(()) => true,
            Err(e) => {
                info!(leader = %leader_id, "leader probe failed: {e:#}");
                false
            }
        }
    }

    /// Leader-side sweep: expel unreachable peers and fan out the change.
    async fn probe_peers(self: &Arc<Self>) {
        let mut modified = false;

        for peer in self.registry.peers(&self.local.id) {
            debug!(peer = %peer.id, "checking peer status");
            if let Err(e) = self.probe_status(&peer, PEER_PROBE_TIMEOUT).await {
                warn!(peer = %peer.id, "peer unreachable, removing from cluster: {e:#}");
                {
                    let _state = self.state.lock().unwrap_or_else(|e| e.into_inner());
                    self.registry.remove(&peer.id);
                    let _ = self.ring.remove(&peer.id);
                }
                modified = true;
            }
        }

        if modified {
            info!("membership changed, broadcasting cluster config");
            let service = Arc::clone(self);
            tokio::spawn(async move {
                service.broadcast_cluster_config().await;
            });
        }
    }

    async fn probe_status(&self, peer: &NodeDescriptor, timeout: Duration) -> Result<()> {
        let _: GenericResponse = self
            .post_rpc(
                &peer.rpc_base(),
                ENDPOINT_STATUS,
                &StatusRequest {
                    caller_node_id: self.local.id.clone(),
                },
                timeout,
            )
            .await?;
        Ok(())
    }

    // ------------------------------------------------------------
    // Membership
    // ------------------------------------------------------------

    /// Announce this node to the cluster's leader, if one can be found.
    ///
    /// Walks the configured peers asking each for the leader; registering
    /// with it makes the leader insert this node and fan out the updated
    /// config. When nobody knows a leader the caller's own election will
    /// establish one.
    pub async fn register_with_cluster(self: &Arc<Self>) {
        for peer in self.registry.peers(&self.local.id) {
            let leader: Result<LeaderResponse> = self
                .post_rpc(
                    &peer.rpc_base(),
                    ENDPOINT_LEADER,
                    &LeaderRequest {
                        caller: self.local.id.clone(),
                    },
                    DISCOVERY_TIMEOUT,
                )
                .await;

            let leader_id = match leader {
                Ok(response) if response.id != NO_LEADER => response.id,
                Ok(_) => continue,
                Err(e) => {
                    debug!(peer = %peer.id, "leader discovery failed: {e:#}");
                    continue;
                }
            };

            self.set_leader(&leader_id);
            if leader_id == self.local.id {
                return;
            }

            let Some(leader) = self.registry.get(&leader_id) else {
                warn!(leader = %leader_id, "discovered leader is not in the configured node set");
                continue;
            };

            let result: Result<GenericResponse> = self
                .post_rpc(
                    &leader.rpc_base(),
                    ENDPOINT_REGISTER,
                    &self.local,
                    PEER_PROBE_TIMEOUT,
                )
                .await;
            match result {
                Ok(_) => {
                    info!(leader = %leader_id, "registered with cluster");
                    return;
                }
                Err(e) => {
                    warn!(leader = %leader_id, "registration failed: {e:#}");
                }
            }
        }

        info!("no leader discovered during registration");
    }

    /// Leader-side handling of a registration. Returns true when the node
    /// was new and the membership changed.
    pub fn register_node(&self, node: NodeDescriptor) -> bool {
        if self.registry.contains(&node.id) {
            info!(node = %node.id, "node already part of cluster");
            return false;
        }

        info!(node = %node.id, "registering node with cluster");
        let _state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        self.ring.add(&node.id);
        self.registry.insert(node);
        true
    }

    /// Current membership snapshot.
    pub fn cluster_config(&self) -> Vec<NodeDescriptor> {
        self.registry.descriptors()
    }

    /// Replace the local membership with a config pushed by the leader.
    ///
    /// A config that omits this node means it was expelled; the node stops
    /// participating and waits for shutdown.
    pub fn apply_cluster_config(&self, nodes: Vec<NodeDescriptor>) {
        let expelled = !nodes.iter().any(|n| n.id == self.local.id);

        info!(nodes = nodes.len(), "applying cluster config");
        {
            let _state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            self.ring.reset(nodes.iter().map(|n| n.id.clone()));
            self.registry.replace_all(nodes);
        }

        if expelled {
            warn!(node = %self.local.id, "absent from new cluster config, leaving cluster");
            self.shutdown();
        }
    }

    /// Push the current membership to every peer, best-effort.
    pub async fn broadcast_cluster_config(&self) {
        let config = ClusterConfig {
            nodes: self.cluster_config(),
        };

        for peer in self.registry.peers(&self.local.id) {
            let result: Result<GenericResponse> = self
                .post_rpc(
                    &peer.rpc_base(),
                    ENDPOINT_UPDATE_CLUSTER_CONFIG,
                    &config,
                    CONFIG_PUSH_TIMEOUT,
                )
                .await;
            if let Err(e) = result {
                info!(peer = %peer.id, "cluster config push failed: {e:#}");
            }
        }
    }

    /// Fetch the membership as seen by `peer`.
    pub async fn fetch_cluster_config(&self, peer: &NodeDescriptor) -> Result<Vec<NodeDescriptor>> {
        let config: ClusterConfig = self
            .post_rpc(
                &peer.rpc_base(),
                ENDPOINT_CLUSTER_CONFIG,
                &ClusterConfigRequest {
                    caller_node_id: self.local.id.clone(),
                },
                DISCOVERY_TIMEOUT,
            )
            .await?;
        Ok(config.nodes)
    }

    // ------------------------------------------------------------
    // Outbound RPC plumbing
    // ------------------------------------------------------------

    async fn fetch_pid(&self, peer: &NodeDescriptor) -> Result<u32> {
        let response: PidResponse = self
            .post_rpc(
                &peer.rpc_base(),
                ENDPOINT_PID,
                &PidRequest {
                    caller_pid: self.pid,
                    caller_node_id: self.local.id.clone(),
                },
                ELECTION_RPC_TIMEOUT,
            )
            .await?;
        Ok(response.pid)
    }

    async fn send_election_request(&self, peer: &NodeDescriptor) -> Result<()> {
        let _: GenericResponse = self
            .post_rpc(
                &peer.rpc_base(),
                ENDPOINT_ELECTION,
                &ElectionRequest {
                    caller_pid: self.pid,
                    caller_node_id: self.local.id.clone(),
                },
                ELECTION_RPC_TIMEOUT,
            )
            .await?;
        Ok(())
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
