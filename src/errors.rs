use derive_more::Display;
use serde::Serialize;

#[derive(Serialize, Debug, Display, Clone, PartialEq, Eq)]
#[display(fmt = "{}", message)]
pub struct DefaultError {
    pub message: &'static str,
}

impl std::error::Error for DefaultError {}
