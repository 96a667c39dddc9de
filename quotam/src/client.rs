use quota_api::LabelSelector;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::api::core::v1::ResourceQuota;
use k8s_openapi::apimachinery::pkg::version::Info as VersionInfo;
use kube::Api as KubeApi;
use kube::Client as KubeClient;
use kube::Error as KubeError;
use kube::api::PostParams as KubePostParams;
use kube::api::WatchEvent as KubeWatchEvent;
use kube::api::WatchParams as KubeWatchParams;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {

    #[error("not found: {0}")]
    NotFound(String),

    /* 409 from the API server, either a stale write or an AlreadyExists */
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("kube error: {0}")]
    Kube(#[source] KubeError),
}

impl ClientError {

    pub fn is_not_found(&self) -> bool {
	matches!(self, ClientError::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
	matches!(self, ClientError::Conflict(_))
    }
}

impl From<KubeError> for ClientError {
    fn from(err: KubeError) -> Self {
	match err {
	    KubeError::Api(ref resp) if resp.code == 404 => ClientError::NotFound(resp.message.clone()),
	    KubeError::Api(ref resp) if resp.code == 409 => ClientError::Conflict(resp.message.clone()),
	    err => ClientError::Kube(err),
	}
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    Added,
    Modified,
    Deleted,
    Error,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
	let name = match self {
	    EventType::Added => "ADDED",
	    EventType::Modified => "MODIFIED",
	    EventType::Deleted => "DELETED",
	    EventType::Error => "ERROR",
	};
	write!(f, "{}", name)
    }
}

/*
 * One notification from the namespace watch. Error events carry a message
 * instead of an object.
 */
#[derive(Debug, Clone)]
pub struct NamespaceEvent {
    pub event_type: EventType,
    pub object: Option<Namespace>,
    pub message: Option<String>,
}

impl NamespaceEvent {

    pub fn added(ns: Namespace) -> Self {
	Self::with_object(EventType::Added, ns)
    }

    pub fn modified(ns: Namespace) -> Self {
	Self::with_object(EventType::Modified, ns)
    }

    pub fn deleted(ns: Namespace) -> Self {
	Self::with_object(EventType::Deleted, ns)
    }

    pub fn error(message: &str) -> Self {
	Self{
	    event_type: EventType::Error,
	    object: None,
	    message: Some(message.to_string()),
	}
    }

    fn with_object(event_type: EventType, ns: Namespace) -> Self {
	Self{
	    event_type: event_type,
	    object: Some(ns),
	    message: None,
	}
    }
}

/*
 * Everything the quota manager needs from the cluster.
 *
 * The watch stream is not restarted by implementations: when the server
 * closes it (expired resource version, connection loss) the stream ends.
 */
#[async_trait]
pub trait QuotaClient: Send + Sync {

    async fn server_version(&self) -> Result<VersionInfo, ClientError>;

    async fn watch_namespaces(&self, selector: &LabelSelector) -> Result<BoxStream<'static, NamespaceEvent>, ClientError>;

    async fn get_quota(&self, namespace: &str, name: &str) -> Result<ResourceQuota, ClientError>;

    async fn create_quota(&self, namespace: &str, quota: &ResourceQuota) -> Result<ResourceQuota, ClientError>;
}

/*
 * KubeQuotaClient implements QuotaClient against a real API server.
 */
#[derive(Clone)]
pub struct KubeQuotaClient {
    kube_client: KubeClient,
    namespace_api: KubeApi<Namespace>,
}

impl KubeQuotaClient {

    pub fn new(kube_client: KubeClient) -> Self {
	Self{
	    kube_client: kube_client.clone(),
	    namespace_api: KubeApi::all(kube_client.clone()),
	}
    }

    fn quota_api(&self, namespace: &str) -> KubeApi<ResourceQuota> {
	KubeApi::namespaced(self.kube_client.clone(), namespace)
    }
}

/*
 * kube refuses watch timeouts of 295s and above and silently uses 290s when
 * none is given, so every watch ends after at most this long. The manager
 * re-establishes it.
 */
pub const WATCH_TIMEOUT_SECS: u32 = 290;

fn watch_params(selector: &LabelSelector) -> KubeWatchParams {
    let mut params = KubeWatchParams::default().timeout(WATCH_TIMEOUT_SECS);
    if !selector.is_empty() {
	params = params.labels(&selector.to_string());
    }
    params
}

fn from_watch_event(item: Result<KubeWatchEvent<Namespace>, KubeError>) -> Option<NamespaceEvent> {
    match item {
	Ok(KubeWatchEvent::Added(ns)) => Some(NamespaceEvent::added(ns)),
	Ok(KubeWatchEvent::Modified(ns)) => Some(NamespaceEvent::modified(ns)),
	Ok(KubeWatchEvent::Deleted(ns)) => Some(NamespaceEvent::deleted(ns)),

	// bookmarks only move the resource version forward
	Ok(KubeWatchEvent::Bookmark(_)) => None,

	Ok(KubeWatchEvent::Error(resp)) => {
	    let message = format!("{} ({}): {}", resp.reason, resp.code, resp.message);
	    Some(NamespaceEvent::error(&message))
	},
	Err(err) => Some(NamespaceEvent::error(&err.to_string())),
    }
}

#[async_trait]
impl QuotaClient for KubeQuotaClient {

    async fn server_version(&self) -> Result<VersionInfo, ClientError> {
	Ok(self.kube_client.apiserver_version().await?)
    }

    async fn watch_namespaces(&self, selector: &LabelSelector) -> Result<BoxStream<'static, NamespaceEvent>, ClientError> {
	// "0" makes the server replay the current namespaces as ADDED first
	let stream = self.namespace_api.watch(&watch_params(selector), "0").await?;
	Ok(stream.filter_map(|item| futures::future::ready(from_watch_event(item))).boxed())
    }

    async fn get_quota(&self, namespace: &str, name: &str) -> Result<ResourceQuota, ClientError> {
	Ok(self.quota_api(namespace).get(name).await?)
    }

    async fn create_quota(&self, namespace: &str, quota: &ResourceQuota) -> Result<ResourceQuota, ClientError> {
	let opts = KubePostParams::default();
	Ok(self.quota_api(namespace).create(&opts, quota).await?)
    }
}

/*
 * In-memory QuotaClient used by the tests: quotas live in a map, the watch
 * replays a scripted list of events and every call is recorded.
 */
