/*
 * quota/api - the vocabulary shared by the quota manager: label selectors,
 * resource quantities, the quota object we own and the namespaces we watch.
 */

pub mod errors;
pub use errors::Error;

pub mod namespace;

pub mod quantity;
pub use quantity::Quantity;
pub use quantity::parse_quantity;

pub mod quota;
pub use quota::QuotaIntent;
pub use quota::QUOTA_LABEL;

pub mod selector;
pub use selector::LabelSelector;
pub use selector::Requirement;
