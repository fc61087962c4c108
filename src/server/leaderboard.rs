use super::error::ViewResult;
use super::urlstring::UrlString;
use super::{wrap, Context, Result};
use crate::leaderboard::{self, Column, Row};
use crate::templates::{self, RenderRucte};
use diesel_async::AsyncPgConnection;
use serde::Deserialize;
use warp::filters::BoxedFilter;
use warp::http::response::Builder;
use warp::reply::Response;
use warp::Filter;

/// Memcache key of the leaderboard rows.
pub const LEADERBOARD_KEY: &str = "leaderboard";

pub fn routes(s: BoxedFilter<(Context,)>) -> BoxedFilter<(Response,)> {
    use warp::filters::query::query;
    use warp::get;
    use warp::path::{end, path};
    path("leaderboard")
        .and(end())
        .and(get())
        .and(s)
        .and(query())
        .then(leaderboard)
        .map(wrap)
        .boxed()
}

#[derive(Debug, Default, Deserialize)]
pub struct SortQuery {
    sort: Option<String>,
    descending: Option<String>,
}

impl SortQuery {
    fn sorting(&self) -> Sorting {
        Sorting {
            key: self.sort.clone().unwrap_or_else(|| "total".into()),
            descending: self.descending.as_deref().map_or(true, |d| {
                d.trim().eq_ignore_ascii_case("true")
            }),
        }
    }
}

/// The current sort order of the leaderboard, as requested.
pub struct Sorting {
    pub key: String,
    pub descending: bool,
}

impl Sorting {
    fn column(&self) -> Option<Column> {
        self.key.parse().ok()
    }

    /// Link to sort by `key`, flipping the direction if already
    /// sorted by it.
    pub fn link(&self, key: &str) -> String {
        let descending = if key == self.key {
            !self.descending
        } else {
            true
        };
        let mut url = UrlString::new("/leaderboard/");
        url.query("sort", key);
        url.query("descending", descending);
        url.into()
    }

    pub fn marker(&self, key: &str) -> &'static str {
        match (key == self.key, self.descending) {
            (false, _) => "",
            (true, true) => "\u{25bc}",
            (true, false) => "\u{25b2}",
        }
    }
}

async fn leaderboard(context: Context, query: SortQuery) -> Result<Response> {
    let ctx = &context;
    let data = context
        .cached_or(LEADERBOARD_KEY, 60, || async move {
            let mut db = ctx.db().await?;
            let db: &mut AsyncPgConnection = &mut db;
            let rows = leaderboard::load(db).await?;
            serde_json::to_vec(&rows).ise()
        })
        .await?;
    let mut rows: Vec<Row> = serde_json::from_slice(&data).ise()?;
    let sorting = query.sorting();
    leaderboard::sort(&mut rows, sorting.column(), sorting.descending);
    Ok(Builder::new()
        .html(|o| templates::leaderboard_html(o, &context, &rows, &sorting))?)
}

#[cfg(test)]
mod test {
    use super::SortQuery;
    use crate::leaderboard::Column;

    fn query(q: &str) -> SortQuery {
        serde_urlencoded::from_str(q).unwrap()
    }

    #[test]
    fn default_sorting() {
        let s = query("").sorting();
        assert_eq!(s.column(), Some(Column::Total));
        assert!(s.descending);
    }

    #[test]
    fn descending_ignores_case() {
        assert!(query("descending=True").sorting().descending);
        assert!(query("descending=TRUE").sorting().descending);
        assert!(!query("descending=false").sorting().descending);
        assert!(!query("descending=1").sorting().descending);
    }

    #[test]
    fn unknown_column() {
        let s = query("sort=karma").sorting();
        assert_eq!(s.column(), None);
        assert_eq!(s.marker("total"), "");
    }

    #[test]
    fn links_flip_current() {
        let s = query("sort=good&descending=true").sorting();
        assert_eq!(s.link("good"), "/leaderboard/?sort=good&descending=false");
        assert_eq!(s.link("bad"), "/leaderboard/?sort=bad&descending=true");
        assert_eq!(s.marker("good"), "\u{25bc}");
        assert_eq!(s.marker("bad"), "");
    }
}
