//! Paged galleries of a series, best first or as a timeline.
use super::splitlist::{split_to_rows, Thumb};
use super::urlstring::UrlString;
use super::{wrap, Context, Result, ViewError};
use crate::series::Series;
use crate::templates::{self, RenderRucte};
use diesel_async::AsyncPgConnection;
use serde::Deserialize;
use tracing::debug;
use warp::filters::BoxedFilter;
use warp::http::response::Builder;
use warp::reply::Response;
use warp::Filter;

pub fn routes(s: BoxedFilter<(Context,)>) -> BoxedFilter<(Response,)> {
    use warp::filters::query::query;
    use warp::path::{end, param, path};
    use warp::get;
    let index = end().and(s.clone()).and(query()).then(index);
    let mission = path("mission")
        .and(param())
        .and(end())
        .and(s.clone())
        .and(query())
        .then(mission);
    let mission_timeline = path("mission")
        .and(param())
        .and(path("timeline"))
        .and(end())
        .and(s.clone())
        .and(query())
        .then(mission_timeline);
    let tag = path("tag")
        .and(param())
        .and(end())
        .and(s.clone())
        .and(query())
        .then(tag);
    let tag_timeline = path("tag")
        .and(param())
        .and(path("timeline"))
        .and(end())
        .and(s)
        .and(query())
        .then(tag_timeline);
    get()
        .and(
            index
                .or(mission)
                .unify()
                .or(mission_timeline)
                .unify()
                .or(tag)
                .unify()
                .or(tag_timeline)
                .unify(),
        )
        .map(wrap)
        .boxed()
}

/// How the images of a page are arranged.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Layout {
    /// Best first, in rows of varying width.
    Rated,
    /// By date, in even rows.
    Timeline,
}

impl Layout {
    pub fn page_size(self) -> i64 {
        match self {
            Layout::Rated => 23,
            Layout::Timeline => 20,
        }
    }
    pub fn row_pattern(self) -> &'static [usize] {
        match self {
            Layout::Rated => &[5, 4, 5, 5, 4],
            Layout::Timeline => &[4],
        }
    }
}

/// A kind of gallery page: the series it shows and how.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GalleryPage {
    pub series: Series,
    pub layout: Layout,
    /// Where the page lives, for "more" links and layout switches.
    pub path: String,
}

impl GalleryPage {
    pub fn index() -> Self {
        GalleryPage {
            series: Series::Index,
            layout: Layout::Rated,
            path: "/".into(),
        }
    }
    pub fn mission(code: String) -> Self {
        GalleryPage {
            path: format!("/mission/{code}/"),
            series: Series::Mission(code),
            layout: Layout::Rated,
        }
    }
    pub fn mission_timeline(code: String) -> Self {
        GalleryPage {
            path: format!("/mission/{code}/timeline/"),
            series: Series::MissionTimeline(code),
            layout: Layout::Timeline,
        }
    }
    pub fn tag(slug: String) -> Self {
        GalleryPage {
            path: format!("/tag/{slug}/"),
            series: Series::Tag(slug),
            layout: Layout::Rated,
        }
    }
    pub fn tag_timeline(slug: String) -> Self {
        GalleryPage {
            path: format!("/tag/{slug}/timeline/"),
            series: Series::TagTimeline(slug),
            layout: Layout::Timeline,
        }
    }

    /// The other layout of the same images, if there is one.
    pub fn switch_link(&self) -> Option<Link> {
        let (label, other) = match &self.series {
            Series::Index => return None,
            Series::Mission(code) => {
                ("Timeline", GalleryPage::mission_timeline(code.clone()))
            }
            Series::MissionTimeline(code) => {
                ("Best first", GalleryPage::mission(code.clone()))
            }
            Series::Tag(slug) => {
                ("Timeline", GalleryPage::tag_timeline(slug.clone()))
            }
            Series::TagTimeline(slug) => {
                ("Best first", GalleryPage::tag(slug.clone()))
            }
        };
        Some(Link {
            label,
            href: other.path,
        })
    }

    /// Url for the rows after the ones starting at `offset`.
    pub fn more_url(&self, offset: i64) -> String {
        let mut url = UrlString::new(&self.path);
        url.query("offset", offset + self.layout.page_size());
        url.into()
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct Link {
    pub label: &'static str,
    pub href: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct GalleryQuery {
    offset: Option<u32>,
}

async fn index(context: Context, query: GalleryQuery) -> Result<Response> {
    show(context, GalleryPage::index(), query).await
}

async fn mission(
    code: String,
    context: Context,
    query: GalleryQuery,
) -> Result<Response> {
    show(context, GalleryPage::mission(code), query).await
}

async fn mission_timeline(
    code: String,
    context: Context,
    query: GalleryQuery,
) -> Result<Response> {
    show(context, GalleryPage::mission_timeline(code), query).await
}

async fn tag(
    slug: String,
    context: Context,
    query: GalleryQuery,
) -> Result<Response> {
    show(context, GalleryPage::tag(slug), query).await
}

async fn tag_timeline(
    slug: String,
    context: Context,
    query: GalleryQuery,
) -> Result<Response> {
    show(context, GalleryPage::tag_timeline(slug), query).await
}

/// Show a page of a gallery.
///
/// With an offset, only the rows are rendered, to be appended to a
/// page already shown.
/// A page past the end of the series is not found.
async fn show(
    context: Context,
    page: GalleryPage,
    query: GalleryQuery,
) -> Result<Response> {
    let offset = i64::from(query.offset.unwrap_or(0));
    let mut db = context.db().await?;
    let db: &mut AsyncPgConnection = &mut db;
    let title = or_404!(page.series.title(db).await?, context);
    let images = page
        .series
        .slice(db, offset, page.layout.page_size())
        .await?;
    debug!("Got {} images in {} at {}", images.len(), page.series, offset);
    let thumbs =
        Thumb::load(db, context.image_base(), &page.series, offset, images)
            .await?;
    let rows = split_to_rows(thumbs, page.layout.row_pattern());
    if rows.is_empty() {
        return Err(ViewError::NotFound(Some(context)));
    }
    let more = page.more_url(offset);
    Ok(if query.offset.is_some() {
        Builder::new()
            .html(|o| templates::gallery_rows_html(o, &rows, &more))?
    } else {
        Builder::new().html(|o| {
            templates::gallery_html(o, &context, &title, &page, &rows, &more)
        })?
    })
}

#[cfg(test)]
mod test {
    use super::{GalleryPage, GalleryQuery, Layout, Link};
    use crate::series::Series;

    #[test]
    fn rated_layout() {
        assert_eq!(Layout::Rated.page_size(), 23);
        assert_eq!(Layout::Rated.row_pattern(), [5, 4, 5, 5, 4]);
        let full: usize = Layout::Rated.row_pattern().iter().sum();
        assert_eq!(full as i64, Layout::Rated.page_size());
    }

    #[test]
    fn timeline_layout() {
        assert_eq!(Layout::Timeline.page_size(), 20);
        assert_eq!(Layout::Timeline.row_pattern(), [4]);
    }

    #[test]
    fn pages_for_routes() {
        let page = GalleryPage::mission_timeline("AS11".into());
        assert_eq!(page.series, Series::MissionTimeline("AS11".into()));
        assert_eq!(page.layout, Layout::Timeline);
        assert_eq!(page.path, "/mission/AS11/timeline/");
        let page = GalleryPage::tag("moon".into());
        assert_eq!(page.series, Series::Tag("moon".into()));
        assert_eq!(page.layout, Layout::Rated);
        assert_eq!(GalleryPage::index().series, Series::Index);
    }

    #[test]
    fn more_url() {
        assert_eq!(GalleryPage::index().more_url(0), "/?offset=23");
        assert_eq!(
            GalleryPage::tag_timeline("moon".into()).more_url(40),
            "/tag/moon/timeline/?offset=60",
        );
    }

    #[test]
    fn switch_layout() {
        assert_eq!(GalleryPage::index().switch_link(), None);
        assert_eq!(
            GalleryPage::mission("AS11".into()).switch_link(),
            Some(Link {
                label: "Timeline",
                href: "/mission/AS11/timeline/".into(),
            }),
        );
        assert_eq!(
            GalleryPage::tag_timeline("moon".into()).switch_link(),
            Some(Link {
                label: "Best first",
                href: "/tag/moon/".into(),
            }),
        );
    }

    #[test]
    fn offset_query() {
        let q: GalleryQuery = serde_urlencoded::from_str("offset=46").unwrap();
        assert_eq!(q.offset, Some(46));
        let q: GalleryQuery = serde_urlencoded::from_str("").unwrap();
        assert_eq!(q.offset, None);
        assert!(serde_urlencoded::from_str::<GalleryQuery>("offset=-1")
            .is_err());
    }
}
