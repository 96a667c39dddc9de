use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::api::core::v1::NamespaceStatus;
use kube::api::ObjectMeta;
use std::collections::BTreeMap;

pub const PHASE_ACTIVE: &str = "Active";
pub const PHASE_TERMINATING: &str = "Terminating";

pub fn name(ns: &Namespace) -> Option<&str> {
    ns.metadata.name.as_deref()
}

/*
 * The namespace phase as reported by the API server, None while the server
 * hasn't filled the status in yet.
 */
pub fn phase(ns: &Namespace) -> Option<&str> {
    ns.status.as_ref().and_then(|status| status.phase.as_deref())
}

pub fn is_active(ns: &Namespace) -> bool {
    phase(ns) == Some(PHASE_ACTIVE)
}

pub fn labels(ns: &Namespace) -> Option<&BTreeMap<String, String>> {
    ns.metadata.labels.as_ref()
}

pub fn new(name: &str, phase: &str, labels: BTreeMap<String, String>) -> Namespace {
    let mut metadata = ObjectMeta::default();
    metadata.name = Some(name.to_string());
    if labels.len() > 0 {
	metadata.labels = Some(labels);
    }

    Namespace{
	metadata: metadata,
	spec: None,
	status: Some(NamespaceStatus{
	    phase: Some(phase.to_string()),
	    ..NamespaceStatus::default()
	}),
    }
}
