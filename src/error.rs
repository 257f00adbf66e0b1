use std::time::Duration;

use packed_struct::PackingError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("not connected to a unit")]
    NotConnected,

    #[error("no connect acknowledgement from the unit within {0:?}")]
    ConnectTimeout(Duration),

    #[error("no settings report from the unit within {0:?}")]
    SeedTimeout(Duration),

    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),

    #[error("packing error: {0}")]
    Packing(String),
}

impl From<PackingError> for Error {
    fn from(err: PackingError) -> Self {
        Error::Packing(format!("{err:?}"))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
