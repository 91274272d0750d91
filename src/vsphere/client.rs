//! vCenter API client implementation.
//!
//! This module provides the HTTP client for the vCenter Automation API:
//! session-token authentication, inventory listings, VM detail reads and
//! submission of asynchronous work. Transport failures surface as
//! [`ApiError`]; the client performs no retries of its own, every failure
//! is terminal to the calling action.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, header};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

use crate::error::{ApiError, ConnectionError, Result};

use super::backend::GuestBackend;
use super::types::{
    CloneRequest, InventoryItem, ObjectKind, ObjectRef, ReconfigureRequest, RelocateRequest,
    ResourcePoolItem, TaskHandle, TaskStatus, VmDetail,
};

/// Header carrying the session token on authenticated requests.
const SESSION_HEADER: &str = "vmware-api-session-id";

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connection parameters for a vCenter server.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Hostname of the vCenter server.
    pub host: String,
    /// HTTPS port the API is served on.
    pub port: u16,
    /// Username to authenticate as.
    pub username: String,
    /// Password to authenticate with.
    pub password: String,
    /// Whether to accept invalid TLS certificates.
    pub insecure: bool,
}

/// vCenter Automation API client.
#[derive(Debug, Clone)]
pub struct VsphereClient {
    /// HTTP client.
    client: Client,
    /// Base URL of the API (scheme + authority).
    base_url: String,
    /// Server identity used in error messages.
    host: String,
    /// Session token obtained at login.
    session_id: String,
}

/// Response wrapper for endpoints that accept asynchronous work.
#[derive(Debug, serde::Deserialize)]
struct SubmittedTask {
    task: String,
}

impl VsphereClient {
    /// Connects to a vCenter server and establishes an API session.
    ///
    /// This is the entry handshake: a failure here is a
    /// [`ConnectionError`] and no operation is attempted afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or the login
    /// request fails or is rejected.
    pub async fn connect(options: &ConnectOptions) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .danger_accept_invalid_certs(options.insecure)
            .build()
            .map_err(|e| ApiError::network(format!("Failed to create HTTP client: {e}")))?;

        let base_url = format!("https://{}:{}", options.host, options.port);
        debug!("Establishing API session with {}", options.host);

        let response = client
            .post(format!("{base_url}/api/session"))
            .basic_auth(&options.username, Some(&options.password))
            .send()
            .await
            .map_err(|e| ConnectionError {
                host: options.host.clone(),
                username: options.username.clone(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ConnectionError {
                host: options.host.clone(),
                username: options.username.clone(),
                message: format!("login rejected with HTTP {status}"),
            }
            .into());
        }

        let session_id: String = response.json().await.map_err(|e| ConnectionError {
            host: options.host.clone(),
            username: options.username.clone(),
            message: format!("malformed session response: {e}"),
        })?;

        debug!("Session established with {}", options.host);

        Ok(Self {
            client,
            base_url,
            host: options.host.clone(),
            session_id,
        })
    }

    /// Creates a client against an already-established API session.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_session(
        base_url: impl Into<String>,
        host: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| ApiError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            host: host.into(),
            session_id: session_id.into(),
        })
    }

    /// API path segment for an object kind.
    const fn kind_path(kind: ObjectKind) -> &'static str {
        match kind {
            ObjectKind::VirtualMachine => "vm",
            ObjectKind::Datacenter => "datacenter",
            ObjectKind::Datastore => "datastore",
            ObjectKind::Folder => "folder",
            ObjectKind::ResourcePool => "resource-pool",
            ObjectKind::Cluster => "cluster",
        }
    }

    /// Performs an authenticated GET returning decoded JSON.
    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        trace!("GET {path}");
        let response = self
            .client
            .get(format!("{}{path}", self.base_url))
            .header(SESSION_HEADER, &self.session_id)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| ApiError::network(e.to_string()))?;

        Self::decode(response).await
    }

    /// Performs an authenticated action POST returning the accepted task.
    async fn post_action<B: Serialize + Sync>(
        &self,
        path: &str,
        action: &str,
        body: &B,
    ) -> Result<TaskHandle> {
        trace!("POST {path}?action={action}");
        let response = self
            .client
            .post(format!("{}{path}", self.base_url))
            .query(&[("action", action)])
            .header(SESSION_HEADER, &self.session_id)
            .json(body)
            .send()
            .await
            .map_err(|e| ApiError::network(e.to_string()))?;

        let submitted: SubmittedTask = Self::decode(response).await?;
        Ok(TaskHandle::new(submitted.task))
    }

    /// Decodes a response, mapping non-success statuses to API errors.
    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ApiError::request(status.as_u16(), message).into());
        }

        if status == StatusCode::NO_CONTENT {
            return Err(ApiError::invalid_response("unexpected empty body").into());
        }

        response
            .json()
            .await
            .map_err(|e| ApiError::invalid_response(e.to_string()).into())
    }

    /// Assembles hierarchical pool paths from a parent-linked listing.
    fn assemble_pool_paths(items: &[ResourcePoolItem]) -> Vec<(ObjectRef, String)> {
        let by_id: HashMap<&str, &ResourcePoolItem> = items
            .iter()
            .map(|item| (item.resource_pool.as_str(), item))
            .collect();

        items
            .iter()
            .map(|item| {
                let mut segments = vec![item.name.as_str()];
                let mut parent = item.parent_resource_pool.as_deref();
                while let Some(parent_id) = parent {
                    // Bail out of malformed parent cycles.
                    if segments.len() > items.len() {
                        break;
                    }
                    match by_id.get(parent_id) {
                        Some(p) => {
                            segments.push(p.name.as_str());
                            parent = p.parent_resource_pool.as_deref();
                        }
                        // Parent outside the cluster listing.
                        None => break,
                    }
                }
                segments.reverse();
                let path = format!("/{}", segments.join("/"));
                (
                    ObjectRef::new(ObjectKind::ResourcePool, item.resource_pool.clone()),
                    path,
                )
            })
            .collect()
    }
}

#[async_trait]
impl GuestBackend for VsphereClient {
    fn server(&self) -> &str {
        &self.host
    }

    async fn list_objects(&self, kind: ObjectKind) -> Result<Vec<(ObjectRef, String)>> {
        let items: Vec<InventoryItem> = self
            .get_json(&format!("/api/vcenter/{}", Self::kind_path(kind)))
            .await?;

        debug!("Listed {} objects of kind {kind}", items.len());

        Ok(items
            .into_iter()
            .map(|item| (ObjectRef::new(kind, item.id), item.name))
            .collect())
    }

    async fn resource_pool_paths(&self, cluster: &ObjectRef) -> Result<Vec<(ObjectRef, String)>> {
        let items: Vec<ResourcePoolItem> = self
            .get_json(&format!(
                "/api/vcenter/resource-pool?clusters={}",
                cluster.id
            ))
            .await?;

        debug!(
            "Listed {} resource pools under cluster {}",
            items.len(),
            cluster.id
        );

        Ok(Self::assemble_pool_paths(&items))
    }

    async fn fetch_vm(&self, vm: &ObjectRef) -> Result<VmDetail> {
        self.get_json(&format!("/api/vcenter/vm/{}", vm.id)).await
    }

    async fn submit_relocate(
        &self,
        vm: &ObjectRef,
        request: &RelocateRequest,
    ) -> Result<TaskHandle> {
        self.post_action(&format!("/api/vcenter/vm/{}", vm.id), "relocate", request)
            .await
    }

    async fn submit_reconfigure(
        &self,
        vm: &ObjectRef,
        request: &ReconfigureRequest,
    ) -> Result<TaskHandle> {
        self.post_action(&format!("/api/vcenter/vm/{}", vm.id), "reconfigure", request)
            .await
    }

    async fn submit_clone(
        &self,
        template: &ObjectRef,
        request: &CloneRequest,
    ) -> Result<TaskHandle> {
        self.post_action(&format!("/api/vcenter/vm/{}", template.id), "clone", request)
            .await
    }

    async fn submit_tools_upgrade(
        &self,
        vm: &ObjectRef,
        installer_options: &str,
    ) -> Result<TaskHandle> {
        let body = serde_json::json!({ "installer_options": installer_options });
        self.post_action(&format!("/api/vcenter/vm/{}/tools", vm.id), "upgrade", &body)
            .await
    }

    async fn poll_task(&self, task: &TaskHandle) -> Result<TaskStatus> {
        self.get_json(&format!("/api/tasks/{}", task.id())).await
    }
}
