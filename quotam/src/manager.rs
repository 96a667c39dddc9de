use crate::client::EventType;
use crate::client::NamespaceEvent;
use crate::client::QuotaClient;
use crate::config::Config;
use crate::errors::Error;
use crate::retry::RetryPolicy;
use crate::retry::retry_on_conflict;
use crate::sink::EventSink;
use crate::sink::Record;
use quota_api::namespace;
use quota_api::quota;

use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;

/* why an event didn't lead to any quota work */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skip {
    EventType,
    NoObject,
    Excluded,
    SelectorMismatch,
    NotActive,
    ReadFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Skipped(Skip),

    /* the quota was already there */
    Converged,

    Created,

    /* somebody else kept winning the create race, their object stays */
    ConflictUnresolved,
}

/*
 * QuotaManager drains the namespace watch and makes sure every active,
 * selected and not excluded namespace has our ResourceQuota.
 *
 * Events are handled one at a time in delivery order. The only state is the
 * position in the watch stream.
 */
pub struct QuotaManager {
    client: Arc<dyn QuotaClient>,
    sink: Arc<dyn EventSink>,
    conf: Config,
    retry: RetryPolicy,
    rewatch_delay: Duration,
}

impl QuotaManager {

    pub fn new(client: Arc<dyn QuotaClient>, conf: Config, sink: Arc<dyn EventSink>) -> Self {
	Self{
	    client: client,
	    sink: sink,
	    conf: conf,
	    retry: RetryPolicy::default(),
	    rewatch_delay: Duration::from_secs(1),
	}
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
	self.retry = retry;
	self
    }

    /* pause between a watch closing and opening the next one */
    pub fn with_rewatch_delay(mut self, delay: Duration) -> Self {
	self.rewatch_delay = delay;
	self
    }

    /*
     * Checks the connection, opens the watch and handles events until the
     * watch ends (Ok) or something fatal happens (Err).
     */
    pub async fn run(&self) -> Result<(), Error> {
	self.startup().await?;
	self.watch().await
    }

    /*
     * Like run(), but opens a new watch every time the server closes the
     * current one (at the latest after WATCH_TIMEOUT_SECS). Only returns on a
     * fatal error.
     */
    pub async fn serve(&self) -> Result<(), Error> {
	self.startup().await?;

	loop {
	    self.watch().await?;

	    self.sink.emit(Record::info("re-establishing namespace watch")
			   .field("delay", format!("{:?}", self.rewatch_delay)));
	    tokio::time::sleep(self.rewatch_delay).await;
	}
    }

    async fn startup(&self) -> Result<(), Error> {
	let conf = serde_json::to_string(&self.conf)
	    .unwrap_or_else(|_| format!("{:?}", self.conf));
	self.sink.emit(Record::info("config").field("config", conf));

	let version = self.client.server_version().await?;
	self.sink.emit(Record::info("kubernetes version").field("version", &version.git_version));
	Ok(())
    }

    /* one watch session, Ok once the server closes it */
    async fn watch(&self) -> Result<(), Error> {
	let mut events = self.client.watch_namespaces(self.conf.namespace_selector()).await?;
	while let Some(event) = events.next().await {
	    self.handle(event).await?;
	}

	self.sink.emit(Record::info("namespace watch closed"));
	Ok(())
    }

    pub async fn handle(&self, event: NamespaceEvent) -> Result<Outcome, Error> {
	let name = event.object.as_ref().and_then(namespace::name).unwrap_or_default();
	self.sink.emit(Record::debug("got an event")
		       .field("type", event.event_type)
		       .field("namespace", name));

	match event.event_type {
	    EventType::Error => {
		let message = event.message.unwrap_or_else(|| String::from("unknown watch error"));
		return Err(Error::Watch(message));
	    },
	    EventType::Added | EventType::Modified => {},

	    // quotas of deleted namespaces go away with the namespace
	    EventType::Deleted => return Ok(Outcome::Skipped(Skip::EventType)),
	}

	let ns = match &event.object {
	    Some(ns) => ns,
	    None => return Ok(Outcome::Skipped(Skip::NoObject)),
	};
	let name = match namespace::name(ns) {
	    Some(name) => name,
	    None => return Ok(Outcome::Skipped(Skip::NoObject)),
	};

	if self.conf.is_excluded(name) {
	    return Ok(Outcome::Skipped(Skip::Excluded));
	}
	if !self.conf.namespace_selector().matches(namespace::labels(ns)) {
	    return Ok(Outcome::Skipped(Skip::SelectorMismatch));
	}
	if !namespace::is_active(ns) {
	    return Ok(Outcome::Skipped(Skip::NotActive));
	}

	self.ensure_quota(name).await
    }

    async fn ensure_quota(&self, namespace: &str) -> Result<Outcome, Error> {
	let quota_name = self.conf.quota_name();

	match self.client.get_quota(namespace, quota_name).await {
	    Ok(existing) => {
		if !quota::is_managed(&existing) {
		    self.sink.emit(Record::debug("resource quota exists but is not managed by us")
				   .field("namespace", namespace)
				   .field("quota", quota_name));
		}
		return Ok(Outcome::Converged);
	    },
	    Err(err) if err.is_not_found() => {},
	    Err(err) => {
		self.sink.emit(Record::error("get resource quota failed")
			       .field("namespace", namespace)
			       .field("error", err));
		return Ok(Outcome::Skipped(Skip::ReadFailed));
	    },
	}

	let intent = self.conf.intent_for(namespace);
	let new_quota = intent.to_resource_quota();
	let client = self.client.as_ref();

	match retry_on_conflict(&self.retry, || client.create_quota(namespace, &new_quota)).await {
	    Ok(_) => {
		let hard = serde_json::to_string(&intent.hard).unwrap_or_default();
		self.sink.emit(Record::info("create resource quota successfully")
			       .field("namespace", namespace)
			       .field("quota", quota_name)
			       .field("hard", hard));
		Ok(Outcome::Created)
	    },
	    Err(err) if err.is_conflict() => {
		self.sink.emit(Record::warn("resource quota kept conflicting, leaving it to the other writer")
			       .field("namespace", namespace)
			       .field("quota", quota_name)
			       .field("error", err));
		Ok(Outcome::ConflictUnresolved)
	    },
	    Err(err) => Err(err.into()),
	}
    }
}
