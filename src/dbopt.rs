use crate::adm::result::Error;
use diesel::ConnectionError;
use diesel_async::pooled_connection::deadpool::{Object, Pool};
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::{AsyncConnection, AsyncPgConnection};
use std::time::Instant;
use tracing::debug;

pub type PgPool = Pool<AsyncPgConnection>;
pub type PooledPg = Object<AsyncPgConnection>;

#[derive(clap::Parser)]
pub struct DbOpt {
    /// How to connect to the postgres database.
    #[clap(long, env = "DATABASE_URL", hide_env_values = true)]
    db_url: String,

    /// Max number of pooled database connections for the server.
    #[clap(long, env = "DB_POOL_SIZE", default_value_t = 8)]
    db_pool_size: usize,
}

impl DbOpt {
    pub async fn connect(&self) -> Result<AsyncPgConnection, ConnectionError> {
        let time = Instant::now();
        let db = AsyncPgConnection::establish(&self.db_url).await?;
        debug!("Got db connection in {:?}", time.elapsed());
        Ok(db)
    }
    pub fn create_pool(&self) -> Result<PgPool, Error> {
        let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(
            &self.db_url,
        );
        Pool::builder(manager)
            .max_size(self.db_pool_size)
            .build()
            .map_err(|e| Error::Other(format!("Failed to build pool: {e}")))
    }
}
