use quota_api::LabelSelector;
use quota_api::Quantity;
use quota_api::QuotaIntent;
use quota_api::parse_quantity;
use quota_api::quota;

use clap::Parser;
use serde::Serialize;
use std::collections::BTreeSet;

/*
 * Command line of the quota manager.
 */
#[derive(Parser, Debug, Clone)]
#[command(name = "quotam", version, about = "Makes sure every active namespace carries a default ResourceQuota")]
pub struct Args {

    /// namespace selector, empty selects every namespace
    #[arg(long = "namespace-selector", default_value = "")]
    pub namespace_selector: String,

    /// comma separated excluded namespaces
    #[arg(long = "exclude-namespace", default_value = "kube-system,kubesphere-system")]
    pub exclude_namespace: String,

    /// limits.cpu
    #[arg(long = "cpu-limit", default_value = "1000")]
    pub cpu_limit: String,

    /// limits.memory
    #[arg(long = "mem-limit", default_value = "1000Gi")]
    pub mem_limit: String,

    /// requests.storage
    #[arg(long = "storage-limit", default_value = "1000Ti")]
    pub storage_limit: String,

    /// resource quota name
    #[arg(long = "resource-quota-name", default_value = "default-quota")]
    pub quota_name: String,
}

/*
 * The validated, immutable configuration the manager runs with.
 */
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    namespace_selector: LabelSelector,
    exclude_namespaces: BTreeSet<String>,
    cpu_limit: Quantity,
    mem_limit: Quantity,
    storage_limit: Quantity,
    quota_name: String,
}

impl Config {

    pub fn namespace_selector(&self) -> &LabelSelector {
	&self.namespace_selector
    }

    pub fn is_excluded(&self, namespace: &str) -> bool {
	self.exclude_namespaces.contains(namespace)
    }

    pub fn quota_name(&self) -> &str {
	&self.quota_name
    }

    /* the quota we want to see in `namespace` */
    pub fn intent_for(&self, namespace: &str) -> QuotaIntent {
	QuotaIntent::new(namespace, &self.quota_name)
	    .limit(quota::LIMITS_CPU, &self.cpu_limit)
	    .limit(quota::LIMITS_MEMORY, &self.mem_limit)
	    .limit(quota::REQUESTS_STORAGE, &self.storage_limit)
    }
}

impl TryFrom<Args> for Config {
    type Error = quota_api::Error;

    fn try_from(args: Args) -> Result<Self, Self::Error> {
	let exclude_namespaces = args.exclude_namespace
	    .split(',')
	    .map(str::trim)
	    .filter(|ns| !ns.is_empty())
	    .map(String::from)
	    .collect();

	Ok(Self{
	    namespace_selector: LabelSelector::parse(&args.namespace_selector)?,
	    exclude_namespaces: exclude_namespaces,
	    cpu_limit: parse_quantity(&args.cpu_limit)?,
	    mem_limit: parse_quantity(&args.mem_limit)?,
	    storage_limit: parse_quantity(&args.storage_limit)?,
	    quota_name: args.quota_name,
	})
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(argv: &[&str]) -> Result<Config, quota_api::Error> {
	let mut full = vec!["quotam"];
	full.extend_from_slice(argv);

	Config::try_from(Args::try_parse_from(full).unwrap())
    }

    #[test]
    fn defaults() {
	let conf = config(&[]).unwrap();

	assert!(conf.namespace_selector().is_empty());
	assert!(conf.is_excluded("kube-system"));
	assert!(conf.is_excluded("kubesphere-system"));
	assert!(!conf.is_excluded("default"));
	assert_eq!(conf.quota_name(), "default-quota");

	let intent = conf.intent_for("team-a");
	assert_eq!(intent.namespace, "team-a");
	assert_eq!(intent.name, "default-quota");
	assert_eq!(intent.hard[quota::LIMITS_CPU], Quantity("1000".into()));
	assert_eq!(intent.hard[quota::LIMITS_MEMORY], Quantity("1000Gi".into()));
	assert_eq!(intent.hard[quota::REQUESTS_STORAGE], Quantity("1000Ti".into()));
    }

    #[test]
    fn flags_override_defaults() {
	let conf = config(&[
	    "--namespace-selector", "env=prod",
	    "--exclude-namespace", "a, b,,",
	    "--cpu-limit", "8",
	    "--mem-limit", "16Gi",
	    "--storage-limit", "100Gi",
	    "--resource-quota-name", "team-quota",
	]).unwrap();

	assert_eq!(conf.namespace_selector().to_string(), "env=prod");
	assert!(conf.is_excluded("a") && conf.is_excluded("b"));
	assert!(!conf.is_excluded("kube-system"));
	assert!(!conf.is_excluded(""));
	assert_eq!(conf.quota_name(), "team-quota");
	assert_eq!(conf.intent_for("x").hard[quota::LIMITS_MEMORY], Quantity("16Gi".into()));
    }

    #[test]
    fn rejects_bad_selector() {
	let err = config(&["--namespace-selector", "env in prod"]).unwrap_err();
	assert!(matches!(err, quota_api::Error::Selector { .. }));
    }

    #[test]
    fn rejects_bad_quantity() {
	let err = config(&["--mem-limit", "lots"]).unwrap_err();
	assert_eq!(err, quota_api::Error::Quantity(String::from("lots")));
    }

    #[test]
    fn serializes_for_the_startup_record() {
	let value = serde_json::to_value(config(&[]).unwrap()).unwrap();

	assert_eq!(value["namespaceSelector"], "");
	assert_eq!(value["excludeNamespaces"], serde_json::json!(["kube-system", "kubesphere-system"]));
	assert_eq!(value["memLimit"], "1000Gi");
	assert_eq!(value["quotaName"], "default-quota");
    }
}
