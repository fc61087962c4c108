//! The image detail page, and voting on it.
use super::error::ViewResult;
use super::leaderboard::LEADERBOARD_KEY;
use super::urlstring::UrlString;
use super::{redirect, sanitize_next, wrap, Context, Result, ViewError};
use crate::models::{Image, ImageBase, ImageLocation, ImageSize, Mission, User};
use crate::schema::images::dsl as i;
use crate::schema::missions::dsl as m;
use crate::series::Series;
use crate::templates::{self, RenderRucte};
use crate::voting::{self, Intent};
use diesel::prelude::*;
use diesel::result::Error as DbError;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::Deserialize;
use std::str::FromStr;
use tracing::info;
use warp::filters::BoxedFilter;
use warp::http::response::Builder;
use warp::reply::Response;
use warp::Filter;

pub fn routes(s: BoxedFilter<(Context,)>) -> BoxedFilter<(Response,)> {
    use warp::filters::query::query;
    use warp::path::{end, param, path};
    use warp::{body::form, get, post};
    let show = param()
        .and(end())
        .and(get())
        .and(s.clone())
        .and(query())
        .then(detail);
    let vote = param()
        .and(end())
        .and(post())
        .and(s)
        .and(form())
        .then(vote);
    path("image")
        .and(show.or(vote).unify())
        .map(wrap)
        .boxed()
}

/// An image, as referenced in an url: by database id or by catalogue
/// code.
#[derive(Debug, PartialEq, Eq)]
pub enum ImageRef {
    Id(i32),
    Code(String),
}

#[derive(Debug, PartialEq, Eq)]
pub struct BadImageRef;

impl FromStr for ImageRef {
    type Err = BadImageRef;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.is_empty() {
            Err(BadImageRef)
        } else if s.bytes().all(|b| b.is_ascii_digit()) {
            s.parse().map(ImageRef::Id).map_err(|_| BadImageRef)
        } else {
            Ok(ImageRef::Code(s.to_uppercase()))
        }
    }
}

impl ImageRef {
    async fn load(
        &self,
        db: &mut AsyncPgConnection,
    ) -> std::result::Result<Image, DbError> {
        match self {
            ImageRef::Id(id) => i::images.find(*id).first::<Image>(db).await,
            ImageRef::Code(code) => {
                i::images.filter(i::code.eq(code)).first::<Image>(db).await
            }
        }
    }
}

/// An image with what is needed to show it large.
pub struct ImageCard {
    pub image: Image,
    pub mission: Mission,
    pub name: String,
    pub place: String,
    pub large: String,
    pub original: String,
}

impl ImageCard {
    pub async fn load(
        db: &mut AsyncPgConnection,
        base: &ImageBase,
        image: Image,
    ) -> std::result::Result<Self, DbError> {
        let mission = m::missions
            .find(image.mission_id)
            .first::<Mission>(db)
            .await?;
        let location = ImageLocation::load_for(db, &[image.id])
            .await?
            .remove(&image.id);
        Ok(ImageCard {
            name: image.name(location.as_ref()),
            place: image.name_with_preposition(location.as_ref()),
            large: base.url(&mission, &image, ImageSize::Large),
            original: base.url(&mission, &image, ImageSize::Original),
            mission,
            image,
        })
    }

    pub fn vote_url(&self) -> String {
        format!("/image/{}/", self.image.id)
    }
}

/// A link to a neighbour in a series.
#[derive(Debug, PartialEq, Eq)]
pub struct NavLink {
    /// The full detail page.
    pub page: String,
    /// Just the large image part, for replacing in place.
    pub ajax: String,
}

impl NavLink {
    fn new(image_id: i32, series: &Series, index: i64) -> Self {
        let base = format!("/image/{image_id}/");
        let mut page = UrlString::new(&base);
        page.query("series", series);
        page.query("index", index);
        let mut ajax = UrlString::new(&base);
        ajax.query("ajax", 1);
        ajax.query("series", series);
        ajax.query("index", index);
        NavLink {
            page: page.into(),
            ajax: ajax.into(),
        }
    }
}

#[derive(Debug, Default)]
pub struct Navigation {
    pub previous: Option<NavLink>,
    pub next: Option<NavLink>,
}

impl Navigation {
    async fn load(
        db: &mut AsyncPgConnection,
        series: &Series,
        index: i64,
    ) -> std::result::Result<Self, DbError> {
        let count = series.count(db).await?;
        let (prev, next) = neighbours(index, count);
        Ok(Navigation {
            previous: link_to(db, series, prev).await?,
            next: link_to(db, series, next).await?,
        })
    }
}

async fn link_to(
    db: &mut AsyncPgConnection,
    series: &Series,
    index: Option<i64>,
) -> std::result::Result<Option<NavLink>, DbError> {
    Ok(match index {
        Some(index) => series
            .nth(db, index)
            .await?
            .map(|image| NavLink::new(image.id, series, index)),
        None => None,
    })
}

/// Positions of the previous and next image around `index` in a
/// series of `count` images.
pub fn neighbours(index: i64, count: i64) -> (Option<i64>, Option<i64>) {
    let prev = if index > 0 { Some(index - 1) } else { None };
    let next = if index < count - 1 {
        Some(index + 1)
    } else {
        None
    };
    (prev, next)
}

#[derive(Debug, Default, Deserialize)]
pub struct DetailQuery {
    series: Option<String>,
    index: Option<i64>,
    ajax: Option<String>,
}

impl DetailQuery {
    /// The series and index to navigate in, if both are given.
    ///
    /// A series that is given must be a known one, even without a
    /// usable index.
    fn position(&self) -> Result<Option<(Series, i64)>> {
        let series = match &self.series {
            Some(series) => series.parse::<Series>().req("Unknown series")?,
            None => return Ok(None),
        };
        Ok(self
            .index
            .filter(|index| *index >= 0)
            .map(|index| (series, index)))
    }
    fn is_ajax(&self) -> bool {
        self.ajax.as_deref().map_or(false, |a| !a.is_empty())
    }
}

async fn detail(
    img: ImageRef,
    context: Context,
    query: DetailQuery,
) -> Result<Response> {
    let position = query.position()?;
    let mut db = context.db().await?;
    let db: &mut AsyncPgConnection = &mut db;
    let image = or_404q!(ImageRef::load(&img, db).await, context);
    let card = ImageCard::load(db, context.image_base(), image).await?;
    let nav = match &position {
        Some((series, index)) => Navigation::load(db, series, *index).await?,
        None => Navigation::default(),
    };
    if query.is_ajax() {
        Ok(Builder::new().html(|o| {
            templates::large_image_html(o, &context, &card, &nav)
        })?)
    } else {
        Ok(Builder::new()
            .html(|o| templates::image_html(o, &context, &card, &nav))?)
    }
}

/// The posted vote form.
///
/// Which vote is cast is decided by which button was pressed, so only
/// the presence of the fields matter.
#[derive(Debug, Default, Deserialize)]
pub struct VoteForm {
    good: Option<String>,
    bad: Option<String>,
    awesome: Option<String>,
    group: Option<String>,
    next: Option<String>,
}

impl VoteForm {
    fn intent(&self) -> Intent {
        if self.good.is_some() {
            Intent::Good
        } else if self.bad.is_some() {
            Intent::Bad
        } else if self.awesome.is_some() {
            Intent::Awesome
        } else {
            Intent::Neutral
        }
    }
    fn in_group(&self) -> Option<bool> {
        self.group.as_ref().map(|g| g == "true")
    }
}

async fn vote(
    image_id: i32,
    context: Context,
    form: VoteForm,
) -> Result<Response> {
    let username = context
        .authorized_user()
        .ok_or(ViewError::PermissionDenied)?;
    let mut db = context.db().await?;
    let db: &mut AsyncPgConnection = &mut db;
    if let Some(in_group) = form.in_group() {
        voting::set_in_group(db, image_id, in_group).await?;
    } else {
        let user = User::get_or_create(db, username).await?;
        let change =
            voting::cast_vote(db, user.id, image_id, form.intent()).await?;
        info!(
            "{} voted {:?} on #{}, rating {:+}",
            user.username,
            form.intent(),
            image_id,
            change.rating,
        );
        context.clear_cache(LEADERBOARD_KEY);
    }
    let fallback = format!("/image/{image_id}/");
    redirect(sanitize_next(form.next.as_deref()).unwrap_or(&fallback))
}

#[cfg(test)]
mod test {
    use super::*;

    fn form(data: &str) -> VoteForm {
        serde_urlencoded::from_str(data).unwrap()
    }

    #[test]
    fn navigation_inside() {
        assert_eq!(neighbours(4, 10), (Some(3), Some(5)));
    }

    #[test]
    fn navigation_at_start() {
        assert_eq!(neighbours(0, 10), (None, Some(1)));
    }

    #[test]
    fn navigation_at_end() {
        assert_eq!(neighbours(9, 10), (Some(8), None));
    }

    #[test]
    fn navigation_alone() {
        assert_eq!(neighbours(0, 1), (None, None));
    }

    #[test]
    fn navigation_past_end() {
        assert_eq!(neighbours(12, 10), (Some(11), None));
        assert_eq!(neighbours(i64::MAX, 10), (Some(i64::MAX - 1), None));
        assert_eq!(neighbours(0, 0), (None, None));
    }

    #[test]
    fn nav_link_urls() {
        let series = Series::MissionTimeline("as11".into());
        let link = NavLink::new(17, &series, 3);
        assert_eq!(link.page, "/image/17/?series=mt-as11&index=3");
        assert_eq!(link.ajax, "/image/17/?ajax=1&series=mt-as11&index=3");
    }

    #[test]
    fn parse_ref() {
        assert_eq!("4711".parse(), Ok(ImageRef::Id(4711)));
        assert_eq!(
            "as11-40-5903".parse(),
            Ok(ImageRef::Code("AS11-40-5903".into())),
        );
        assert_eq!("".parse::<ImageRef>(), Err(BadImageRef));
        assert_eq!("99999999999".parse::<ImageRef>(), Err(BadImageRef));
    }

    #[test]
    fn vote_intent() {
        assert_eq!(form("good=1").intent(), Intent::Good);
        assert_eq!(form("bad=").intent(), Intent::Bad);
        assert_eq!(form("awesome=x&next=/").intent(), Intent::Awesome);
        assert_eq!(form("").intent(), Intent::Neutral);
        assert_eq!(form("awesome=1&good=1").intent(), Intent::Good);
        assert_eq!(form("awesome=1&bad=1").intent(), Intent::Bad);
    }

    #[test]
    fn group_toggle() {
        assert_eq!(form("group=true").in_group(), Some(true));
        assert_eq!(form("group=false").in_group(), Some(false));
        assert_eq!(form("group=yes").in_group(), Some(false));
        assert_eq!(form("good=1").in_group(), None);
    }

    #[test]
    fn detail_position() {
        let q: DetailQuery =
            serde_urlencoded::from_str("series=t-moon&index=2&ajax=1")
                .unwrap();
        assert!(q.is_ajax());
        assert!(matches!(
            q.position(),
            Ok(Some((Series::Tag(ref slug), 2))) if slug == "moon"
        ));
    }

    #[test]
    fn detail_without_position() {
        let q = DetailQuery::default();
        assert!(!q.is_ajax());
        assert!(matches!(q.position(), Ok(None)));
        let q: DetailQuery =
            serde_urlencoded::from_str("series=index&index=-1").unwrap();
        assert!(matches!(q.position(), Ok(None)));
    }

    #[test]
    fn detail_bad_series() {
        for query in ["series=bogus&index=1", "series=bogus", "series=x"] {
            let q: DetailQuery = serde_urlencoded::from_str(query).unwrap();
            assert!(
                matches!(q.position(), Err(ViewError::BadRequest(_))),
                "{query}",
            );
        }
        let q: DetailQuery =
            serde_urlencoded::from_str("series=x&index=-1").unwrap();
        assert!(matches!(q.position(), Err(ViewError::BadRequest(_))));
    }

    #[test]
    fn detail_series_without_index() {
        let q: DetailQuery =
            serde_urlencoded::from_str("series=m-as11").unwrap();
        assert!(matches!(q.position(), Ok(None)));
    }
}
