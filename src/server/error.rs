use super::Context;
use crate::adm::result::Error;
use crate::templates::{self, RenderError, RenderRucte};
use diesel_async::pooled_connection::deadpool::PoolError;
use tracing::{error, warn};
use warp::http::response::Builder;
use warp::http::status::StatusCode;
use warp::reply::Response;
use warp::{self, Rejection, Reply};

pub enum ViewError {
    /// 404
    NotFound(Option<Context>),
    /// 400
    BadRequest(&'static str),
    /// 401, no user (or an invalid token)
    PermissionDenied,
    /// 503
    ServiceUnavailable,
    /// 500
    Err(&'static str),
}

macro_rules! or_404 {
    ($obj:expr, $ctx:expr) => {{
        match $obj {
            Some(obj) => obj,
            None => return Err(ViewError::NotFound(Some($ctx))),
        }
    }};
    ($obj:expr) => {{
        match $obj {
            Some(obj) => obj,
            None => return Err(ViewError::NotFound(None)),
        }
    }};
}
macro_rules! or_404q {
    ($obj:expr, $ctx:expr) => {
        or_404!($obj.optional()?, $ctx)
    };
}

pub trait ViewResult<T> {
    fn ise(self) -> Result<T, ViewError>;
    fn req(self, msg: &'static str) -> Result<T, ViewError>;
}

impl<T, E> ViewResult<T> for Result<T, E>
where
    E: std::fmt::Debug,
{
    fn ise(self) -> Result<T, ViewError> {
        self.map_err(|e| {
            error!("Internal server error: {:?}", e);
            ViewError::Err("Something went wrong")
        })
    }
    fn req(self, msg: &'static str) -> Result<T, ViewError> {
        self.map_err(|e| {
            warn!("Bad request, {}: {:?}", msg, e);
            ViewError::BadRequest(msg)
        })
    }
}

impl Reply for ViewError {
    fn into_response(self) -> Response {
        match self {
            ViewError::NotFound(Some(context)) => Builder::new()
                .status(StatusCode::NOT_FOUND)
                .html(|o| {
                    templates::not_found_html(
                        o,
                        &context,
                        StatusCode::NOT_FOUND,
                        "The resource you requested could not be located",
                    )
                })
                .unwrap_or_else(|_| StatusCode::NOT_FOUND.into_response()),
            ViewError::NotFound(None) => error_response(
                StatusCode::NOT_FOUND,
                "Not found",
                "The resource you requested could not be located.",
            ),
            ViewError::BadRequest(msg) => {
                error_response(StatusCode::BAD_REQUEST, msg, "Sorry.")
            }
            ViewError::PermissionDenied => error_response(
                StatusCode::UNAUTHORIZED,
                "Please log in",
                "You need to be logged in to rate or tag images.",
            ),
            ViewError::ServiceUnavailable => error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "Server exhausted",
                "The server is exhausted and can't handle your request \
                 right now. Sorry. \
                 Please try again later.",
            ),
            ViewError::Err(msg) => error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                msg,
                "This is an error in the server code or configuration. \
                 Sorry. \
                 The error has been logged and will be looked into.",
            ),
        }
    }
}

fn error_response(code: StatusCode, message: &str, detail: &str) -> Response {
    Builder::new()
        .status(code)
        .html(|o| templates::error_html(o, code, message, detail))
        .unwrap_or_else(|_| code.into_response())
}

impl From<RenderError> for ViewError {
    fn from(e: RenderError) -> Self {
        error!("Rendering error: {}\n    {:?}", e, e);
        ViewError::Err("Rendering error")
    }
}

impl From<diesel::result::Error> for ViewError {
    fn from(e: diesel::result::Error) -> Self {
        error!("Database error: {}\n    {:?}", e, e);
        ViewError::Err("Database error")
    }
}

impl From<PoolError> for ViewError {
    fn from(e: PoolError) -> Self {
        error!("Pool error: {:?}", e);
        ViewError::ServiceUnavailable
    }
}

impl From<Error> for ViewError {
    fn from(e: Error) -> Self {
        match e {
            Error::NotFound(what) => {
                warn!("Not found: {}", what);
                ViewError::NotFound(None)
            }
            Error::BadSeries(series) => {
                warn!("Bad request, unknown series {:?}", series);
                ViewError::BadRequest("Unknown series")
            }
            Error::Db(e) => e.into(),
            Error::Pool(e) => e.into(),
            e => {
                error!("Internal server error: {}", e);
                ViewError::Err("Something went wrong")
            }
        }
    }
}

/// Create custom errors for warp rejections.
///
/// Currently only handles 404, as there is no way of getting any
/// details out of the other build-in rejections in warp.
pub async fn for_rejection(err: Rejection) -> Result<Response, Rejection> {
    if err.is_not_found() {
        Ok(ViewError::NotFound(None).into_response())
    } else {
        Err(err)
    }
}
