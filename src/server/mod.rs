#[macro_use]
mod error;
mod context;
mod gallery;
mod image;
mod leaderboard;
mod rate;
mod splitlist;
mod urlstring;

pub use self::context::Context;
pub use self::error::ViewError;
pub use self::gallery::GalleryPage;
pub use self::image::{ImageCard, Navigation};
pub use self::leaderboard::Sorting;
pub use self::rate::TagChoice;
pub use self::splitlist::Thumb;

use self::context::create_session_filter;
use self::error::ViewResult;
use crate::adm::result::Error;
use crate::dbopt::DbOpt;
use crate::templates;
use chrono::{Duration, Utc};
use regex::Regex;
use std::net::SocketAddr;
use std::sync::LazyLock;
use tracing::info;
use warp::filters::path::Tail;
use warp::http::header;
use warp::http::response::Builder;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{self, Filter, Reply};

#[derive(clap::Parser)]
pub struct Args {
    #[clap(flatten)]
    db: DbOpt,
    #[clap(flatten)]
    cache: CacheOpt,

    /// Base url of the image files, ending in a slash.
    #[clap(long, env = "IMAGE_BASE_URL")]
    image_base_url: String,

    /// Key for verifying jwt tokens from the identity provider.
    #[clap(long, env = "JWT_KEY", hide_env_values = true)]
    jwt_key: String,

    /// Socket addess for the server to listen on.
    #[clap(
        long,
        env = "SPACEGALLERY_LISTEN",
        default_value = "127.0.0.1:6767"
    )]
    listen: SocketAddr,
}

#[derive(clap::Parser)]
pub struct CacheOpt {
    /// How to connect to memcached.
    #[clap(
        long,
        env = "MEMCACHED_SERVER",
        default_value = "memcache://127.0.0.1:11211"
    )]
    memcached_url: String,
}

pub async fn run(args: &Args) -> Result<(), Error> {
    let session_filter = create_session_filter(args)?;
    let s = move || session_filter.clone();
    use warp::path::{path, tail};
    let static_routes = path("static")
        .and(warp::get())
        .and(tail())
        .then(static_file)
        .map(wrap);
    let routes = static_routes
        .or(gallery::routes(s()))
        .unify()
        .or(image::routes(s()))
        .unify()
        .or(rate::routes(s()))
        .unify()
        .or(leaderboard::routes(s()))
        .unify()
        .recover(error::for_rejection)
        .with(warp::log::custom(log_request));
    info!("Listening on {}", args.listen);
    warp::serve(routes).run(args.listen).await;
    Ok(())
}

fn log_request(req: warp::log::Info) {
    info!(
        "{} {} {} {:?}",
        req.method(),
        req.path(),
        req.status().as_u16(),
        req.elapsed(),
    );
}

type Result<T, E = ViewError> = std::result::Result<T, E>;

/// Create a reply from a view result.
fn wrap(result: Result<Response>) -> Response {
    match result {
        Ok(reply) => reply,
        Err(err) => err.into_response(),
    }
}

fn redirect(url: &str) -> Result<Response> {
    Builder::new()
        .status(StatusCode::FOUND)
        .header(header::LOCATION, url)
        .body(format!("Please refer to {url}").into())
        .ise()
}

/// Handler for static files.
/// Create a response from the file data with a correct content type
/// and a far expires header (or a 404 if the file does not exist).
async fn static_file(name: Tail) -> Result<Response> {
    use templates::statics::StaticFile;
    let data = or_404!(StaticFile::get(name.as_str()));
    Builder::new()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, data.mime.as_ref())
        .far_expires()
        .body(data.content.into())
        .ise()
}

trait BuilderExt {
    fn far_expires(self) -> Self;
}

impl BuilderExt for Builder {
    fn far_expires(self) -> Self {
        let far_expires = Utc::now() + Duration::days(180);
        self.header(header::EXPIRES, far_expires.to_rfc2822())
    }
}

/// A local url to go to after a post, or None if it does not look
/// like one.
fn sanitize_next(next: Option<&str>) -> Option<&str> {
    static LOCAL_URL: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^/([A-Za-z0-9._-]+/?)*(\?[A-Za-z0-9._=&%+-]*)?$")
            .unwrap()
    });
    next.filter(|next| LOCAL_URL.is_match(next))
}

#[test]
fn test_sanitize_bad_1() {
    assert_eq!(None, sanitize_next(Some("https://evil.org/")))
}

#[test]
fn test_sanitize_bad_2() {
    assert_eq!(None, sanitize_next(Some("//evil.org/")))
}
#[test]
fn test_sanitize_bad_3() {
    assert_eq!(None, sanitize_next(Some("/evil\"hack")))
}
#[test]
fn test_sanitize_bad_4() {
    assert_eq!(None, sanitize_next(Some("/evil'hack")))
}
#[test]
fn test_sanitize_bad_5() {
    assert_eq!(None, sanitize_next(Some("/rate/?x=<script>")))
}

#[test]
fn test_sanitize_good_1() {
    assert_eq!(Some("/rate/"), sanitize_next(Some("/rate/")))
}
#[test]
fn test_sanitize_good_2() {
    assert_eq!(
        Some("/image/AS11-40-5903/"),
        sanitize_next(Some("/image/AS11-40-5903/"))
    )
}
#[test]
fn test_sanitize_good_3() {
    assert_eq!(
        Some("/image/17/?series=m-as11&index=3"),
        sanitize_next(Some("/image/17/?series=m-as11&index=3"))
    )
}
#[test]
fn test_sanitize_missing() {
    assert_eq!(None, sanitize_next(None))
}
