use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {

    /* the selector could not be parsed, reason says where */
    #[error("invalid label selector `{selector}`: {reason}")]
    Selector { selector: String, reason: String },

    #[error("invalid quantity `{0}`")]
    Quantity(String),
}
