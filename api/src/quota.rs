use crate::quantity::Quantity;

use k8s_openapi::api::core::v1::ResourceQuota;
use k8s_openapi::api::core::v1::ResourceQuotaSpec;
use kube::api::ObjectMeta;
use std::collections::BTreeMap;

/* marks a ResourceQuota as created (and owned) by the quota manager */
pub const QUOTA_LABEL: &str = "resourcequota.kubesphere.io/enable";

pub const LIMITS_CPU: &str = "limits.cpu";
pub const LIMITS_MEMORY: &str = "limits.memory";
pub const REQUESTS_STORAGE: &str = "requests.storage";

/*
 * QuotaIntent describes the ResourceQuota we want to exist in a namespace.
 *
 * It is only ever turned into an object for a create call: once a quota with
 * this name exists in the namespace we never touch it again.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct QuotaIntent {
    pub namespace: String,
    pub name: String,
    pub hard: BTreeMap<String, Quantity>,
    pub labels: BTreeMap<String, String>,
}

impl QuotaIntent {

    pub fn new(namespace: &str, name: &str) -> Self {
	let mut labels = BTreeMap::new();
	labels.insert(String::from(QUOTA_LABEL), String::from("true"));

	Self{
	    namespace: namespace.to_string(),
	    name: name.to_string(),
	    hard: BTreeMap::new(),
	    labels: labels,
	}
    }

    pub fn limit(mut self, resource: &str, quantity: &Quantity) -> Self {
	self.hard.insert(resource.to_string(), quantity.clone());
	self
    }

    pub fn to_resource_quota(&self) -> ResourceQuota {
	let mut metadata = ObjectMeta::default();
	metadata.name = Some(self.name.clone());
	metadata.namespace = Some(self.namespace.clone());
	metadata.labels = Some(self.labels.clone());

	ResourceQuota{
	    metadata: metadata,
	    spec: Some(ResourceQuotaSpec{
		hard: Some(self.hard.clone()),
		..ResourceQuotaSpec::default()
	    }),
	    status: None,
	}
    }
}

/*
 * Whether the quota carries our marker label, i.e. we created it rather
 * than somebody else happening to use the same name.
 */
pub fn is_managed(quota: &ResourceQuota) -> bool {
    match &quota.metadata.labels {
	Some(labels) => labels.get(QUOTA_LABEL).map(String::as_str) == Some("true"),
	None => false,
    }
}

pub fn hard_limits(quota: &ResourceQuota) -> BTreeMap<String, Quantity> {
    quota.spec.as_ref()
	.and_then(|spec| spec.hard.clone())
	.unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intent() -> QuotaIntent {
	QuotaIntent::new("team-a", "default-quota")
	    .limit(LIMITS_CPU, &Quantity("1000".into()))
	    .limit(LIMITS_MEMORY, &Quantity("1000Gi".into()))
	    .limit(REQUESTS_STORAGE, &Quantity("1000Ti".into()))
    }

    #[test]
    fn builds_resource_quota() {
	let quota = intent().to_resource_quota();

	assert_eq!(quota.metadata.name.as_deref(), Some("default-quota"));
	assert_eq!(quota.metadata.namespace.as_deref(), Some("team-a"));
	assert!(is_managed(&quota));

	let hard = hard_limits(&quota);
	assert_eq!(hard.len(), 3);
	assert_eq!(hard[LIMITS_CPU], Quantity("1000".into()));
	assert_eq!(hard[LIMITS_MEMORY], Quantity("1000Gi".into()));
	assert_eq!(hard[REQUESTS_STORAGE], Quantity("1000Ti".into()));
    }

    #[test]
    fn serializes_with_type_meta() {
	let value = serde_json::to_value(intent().to_resource_quota()).unwrap();

	assert_eq!(value["apiVersion"], "v1");
	assert_eq!(value["kind"], "ResourceQuota");
	assert_eq!(value["metadata"]["labels"][QUOTA_LABEL], "true");
	assert_eq!(value["spec"]["hard"]["limits.memory"], "1000Gi");
    }

    #[test]
    fn foreign_quota_is_not_managed() {
	let mut quota = intent().to_resource_quota();
	quota.metadata.labels = None;

	assert!(!is_managed(&quota));
    }
}
