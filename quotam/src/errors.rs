use crate::client::ClientError;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {

    /* encapsulate a kube-rust error */
    #[error("kube error: {0}")]
    Kube(#[from] kube::Error),

    #[error("{0}")]
    Client(#[from] ClientError),

    #[error("invalid configuration: {0}")]
    Config(#[from] quota_api::Error),

    /* the namespace watch reported an error, nothing after it can be trusted */
    #[error("watch namespace error: {0}")]
    Watch(String),
}
