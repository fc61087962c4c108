use diesel::prelude::ConnectionError;
use diesel::result::Error as DieselError;
use diesel_async::pooled_connection::deadpool::PoolError;
use std::convert::From;
use std::fmt;

#[derive(Debug)]
pub enum Error {
    Connection(ConnectionError),
    Db(DieselError),
    Pool(PoolError),
    /// A referenced row (image, tag, mission) does not exist.
    NotFound(&'static str),
    /// A series token that matches none of the known forms.
    BadSeries(String),
    Other(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Connection(e) => write!(f, "Connection error: {e}"),
            Error::Db(e) => write!(f, "Database error: {e}"),
            Error::Pool(e) => write!(f, "Pool error: {e}"),
            Error::NotFound(what) => write!(f, "No such {what}"),
            Error::BadSeries(s) => write!(f, "Unknown series {s:?}"),
            Error::Other(s) => write!(f, "Error: {s}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<ConnectionError> for Error {
    fn from(e: ConnectionError) -> Self {
        Error::Connection(e)
    }
}

impl From<DieselError> for Error {
    fn from(e: DieselError) -> Self {
        Error::Db(e)
    }
}

impl From<PoolError> for Error {
    fn from(e: PoolError) -> Self {
        Error::Pool(e)
    }
}
