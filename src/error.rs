use std::io;

use rocket::{
    http::Status,
    request::Request,
    response::{self, Responder, Response},
};
use thiserror::Error;


pub type Result<T> = std::result::Result<T, Error>;


#[derive(Error, Debug)]
pub enum Error {
    #[error("Sign in to continue")]
    AuthenticationRequired,

    #[error("Not allowed")]
    Forbidden,

    #[error("{0}")]
    Validation(String),

    #[error("Not found")]
    NotFound,

    /// Store, storage, change feed or geocoder call failed.
    #[error("Remote failure: {0}")]
    Remote(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Error::Validation(msg.into())
    }

    pub fn remote<S: Into<String>>(msg: S) -> Self {
        Error::Remote(msg.into())
    }

    pub fn status(&self) -> Status {
        match self {
            Error::AuthenticationRequired => Status::Unauthorized,
            Error::Forbidden => Status::Forbidden,
            Error::Validation(_) => Status::BadRequest,
            Error::NotFound => Status::NotFound,
            Error::Remote(_) => Status::BadGateway,
            Error::Config(_) => Status::InternalServerError,
        }
    }
}

impl From<diesel::result::Error> for Error {
    fn from(err: diesel::result::Error) -> Self {
        match err {
            diesel::result::Error::NotFound => Error::NotFound,
            err => Error::Remote(err.to_string()),
        }
    }
}

impl From<diesel::ConnectionError> for Error {
    fn from(err: diesel::ConnectionError) -> Self {
        Error::Remote(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Remote(err.to_string())
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Remote(err.to_string())
    }
}

impl<'r> Responder<'r> for Error {
    fn respond_to(self, req: &Request) -> response::Result<'r> {
        let status = self.status();
        if status.code >= 500 {
            warn!("{} {}: {}", req.method(), req.uri(), self);
        }

        Response::build_from(self.to_string().respond_to(req)?)
            .status(status)
            .ok()
    }
}
