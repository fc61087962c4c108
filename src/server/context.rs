use super::{Args, Result};
use crate::adm::result::Error;
use crate::dbopt::{PgPool, PooledPg};
use crate::models::ImageBase;
use medallion::{Header, Token};
use r2d2_memcache::{r2d2, MemcacheConnectionManager};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use warp::filters::{cookie, header, BoxedFilter};
use warp::path::{self, FullPath};
use warp::{self, Filter};

pub type ContextFilter = BoxedFilter<(Context,)>;
type MemcachePool = r2d2::Pool<MemcacheConnectionManager>;

pub fn create_session_filter(args: &Args) -> Result<ContextFilter, Error> {
    let global = Arc::new(GlobalContext::new(args)?);
    let g1 = global.clone();
    Ok(warp::any()
        .and(path::full())
        .and(
            cookie::cookie("EXAUTH")
                .or(header::header("Authorization"))
                .unify()
                .map(move |key: String| {
                    verify_key(&key, g1.jwt_secret.as_ref())
                        .map_err(|e| warn!("Auth failed: {}", e))
                        .ok()
                })
                .or(warp::any().map(|| None))
                .unify(),
        )
        .map(move |path, user| {
            let global = global.clone();
            Context { global, path, user }
        })
        .boxed())
}

// Does _not_ derive debug, copy or clone, since it contains the jwt
// secret and some connection pools.
struct GlobalContext {
    db_pool: PgPool,
    memcache_pool: MemcachePool,
    jwt_secret: String,
    image_base: ImageBase,
}

impl GlobalContext {
    fn new(args: &Args) -> Result<Self, Error> {
        let mc_manager =
            MemcacheConnectionManager::new(args.cache.memcached_url.as_ref());
        Ok(GlobalContext {
            db_pool: args.db.create_pool()?,
            // Memcache may come and go, so don't require it at startup.
            memcache_pool: r2d2::Pool::builder()
                .connection_timeout(Duration::from_secs(1))
                .build_unchecked(mc_manager),
            jwt_secret: args.jwt_key.clone(),
            image_base: ImageBase::new(&args.image_base_url),
        })
    }
}

/// Check a token issued by the identity provider, returning the
/// user name it vouches for.
fn verify_key(jwtstr: &str, jwt_secret: &[u8]) -> Result<String, String> {
    let jwtstr = jwtstr.strip_prefix("Bearer ").unwrap_or(jwtstr);
    let token = Token::<Header, ()>::parse(jwtstr)
        .map_err(|e| format!("Bad jwt token: {e:?}"))?;

    if !verify_token(&token, jwt_secret)? {
        return Err(format!("Invalid token {:?}", token.payload));
    }
    let claims = token.payload;
    debug!("Verified token for: {:?}", claims);
    let now = current_numeric_date();
    if let Some(nbf) = claims.nbf {
        if now < nbf {
            return Err(format!("Not-yet valid token, {now} < {nbf}"));
        }
    }
    if let Some(exp) = claims.exp {
        if now > exp {
            return Err(format!("Got an expired token: {now} > {exp}"));
        }
    }
    // the claimed sub is the username
    claims
        .sub
        .ok_or_else(|| "User missing in jwt claims".to_string())
}

fn verify_token(
    token: &Token<Header>,
    jwt_secret: &[u8],
) -> Result<bool, String> {
    token
        .verify(jwt_secret)
        .map_err(|e| format!("Failed to verify token {token:?}: {e}"))
}

/// The request context, providing database, memcache and authorized user.
pub struct Context {
    global: Arc<GlobalContext>,
    path: FullPath,
    user: Option<String>,
}

impl Context {
    pub async fn db(&self) -> Result<PooledPg> {
        Ok(self.global.db_pool.get().await?)
    }
    pub fn authorized_user(&self) -> Option<&str> {
        self.user.as_ref().map(AsRef::as_ref)
    }
    pub fn is_authorized(&self) -> bool {
        self.user.is_some()
    }
    pub fn path_without_query(&self) -> &str {
        self.path.as_str()
    }
    pub fn image_base(&self) -> &ImageBase {
        &self.global.image_base
    }
    /// Get data from memcache, or calculate and store it for `ttl`
    /// seconds.
    ///
    /// Memcache is best-effort, any problem with it is logged and the
    /// data is calculated.
    pub async fn cached_or<F, R, E>(
        &self,
        key: &str,
        ttl: u32,
        calculate: F,
    ) -> Result<Vec<u8>, E>
    where
        F: FnOnce() -> R,
        R: Future<Output = Result<Vec<u8>, E>>,
    {
        match self.global.memcache_pool.get() {
            Ok(client) => {
                match client.get(key) {
                    Ok(Some(data)) => {
                        debug!("Cache: {} found", key);
                        return Ok(data);
                    }
                    Ok(None) => {
                        debug!("Cache: {} not found", key);
                    }
                    Err(err) => {
                        warn!("Cache: get {} failed: {:?}", key, err);
                    }
                }
                let data = calculate().await?;
                match client.set(key, &data[..], ttl) {
                    Ok(()) => debug!("Cache: stored {}", key),
                    Err(err) => warn!("Cache: Error storing {}: {}", key, err),
                }
                Ok(data)
            }
            Err(err) => {
                warn!("Error connecting to memcache: {:?}", err);
                calculate().await
            }
        }
    }
    /// Remove data from memcache, so it is calculated on next use.
    pub fn clear_cache(&self, key: &str) {
        match self.global.memcache_pool.get() {
            Ok(client) => match client.delete(key) {
                Ok(flag) => debug!("Cache: deleted {}: {:?}", key, flag),
                Err(e) => warn!("Cache: Failed to delete {}: {}", key, e),
            },
            Err(err) => warn!("Error connecting to memcache: {:?}", err),
        }
    }
}

/// Get the current value for jwt NumericDate.
///
/// Defined in RFC 7519 section 2 to be equivalent to POSIX.1 "Seconds
/// Since the Epoch".  The RFC allows a NumericDate to be non-integer
/// (for sub-second resolution), but the jwt crate uses u64.
fn current_numeric_date() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod test {
    use super::{create_session_filter, current_numeric_date, verify_key};
    use crate::server::leaderboard::LEADERBOARD_KEY;
    use crate::server::Args;
    use clap::Parser;
    use medallion::{Header, Payload, Token};
    use std::cell::Cell;

    const SECRET: &[u8] = b"not so secret";

    fn token(sub: Option<&str>, exp: u64, secret: &[u8]) -> String {
        let claims = Payload::<()> {
            sub: sub.map(Into::into),
            exp: Some(exp),
            nbf: Some(current_numeric_date() - 10),
            ..Default::default()
        };
        Token::<(), ()>::new(Header::default(), claims).sign(secret).unwrap()
    }

    fn later() -> u64 {
        current_numeric_date() + 3600
    }

    #[test]
    fn valid_token() {
        let t = token(Some("kaj"), later(), SECRET);
        assert_eq!(verify_key(&t, SECRET), Ok("kaj".to_string()));
    }

    #[test]
    fn bearer_token() {
        let t = format!("Bearer {}", token(Some("kaj"), later(), SECRET));
        assert_eq!(verify_key(&t, SECRET), Ok("kaj".to_string()));
    }

    #[test]
    fn wrong_secret() {
        let t = token(Some("kaj"), later(), b"other secret");
        assert!(verify_key(&t, SECRET).is_err());
    }

    #[test]
    fn expired_token() {
        let t = token(Some("kaj"), current_numeric_date() - 5, SECRET);
        assert!(verify_key(&t, SECRET).is_err());
    }

    #[test]
    fn token_without_user() {
        let t = token(None, later(), SECRET);
        assert!(verify_key(&t, SECRET).is_err());
    }

    #[test]
    fn garbage_token() {
        assert!(verify_key("not.a.token", SECRET).is_err());
    }

    #[tokio::test]
    async fn cache_without_memcache() {
        let args = Args::try_parse_from([
            "runserver",
            "--db-url",
            "postgres://localhost/spacegallery",
            "--memcached-url",
            "memcache://127.0.0.1:1",
            "--image-base-url",
            "https://images.example.org/",
            "--jwt-key",
            "not so secret",
        ])
        .unwrap();
        let filter = create_session_filter(&args).unwrap();
        let context = warp::test::request()
            .path("/leaderboard/")
            .filter(&filter)
            .await
            .unwrap();
        assert_eq!(context.path_without_query(), "/leaderboard/");
        assert!(!context.is_authorized());
        let calculated = Cell::new(0);
        for _ in 0..2 {
            let data = context
                .cached_or(LEADERBOARD_KEY, 60, || async {
                    calculated.set(calculated.get() + 1);
                    Ok::<_, ()>(b"rows".to_vec())
                })
                .await;
            assert_eq!(data, Ok(b"rows".to_vec()));
            context.clear_cache(LEADERBOARD_KEY);
        }
        assert_eq!(calculated.get(), 2);
    }
}
