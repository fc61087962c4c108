//! Named, filtered and ordered views of the image collection.
use crate::adm::result::Error;
use crate::models::Image;
use crate::schema::images;
use crate::schema::images::dsl as i;
use crate::schema::missions::dsl as m;
use crate::schema::tags::dsl as t;
use crate::schema::user_tags::dsl as ut;
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::result::Error as DbError;
use diesel::sql_types::Text;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use std::fmt;
use std::str::FromStr;

diesel::define_sql_function!(fn lower(x: Text) -> Text);

/// A series of images, identified by a token like `m-as11` or `tt-moon`.
///
/// The token is carried in urls, so that an image page can find its
/// neighbours without storing anything on the server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Series {
    /// All images, best first.
    Index,
    /// Images from a mission, best first.
    Mission(String),
    /// Images from a mission, in the order they were taken.
    MissionTimeline(String),
    /// Images tagged by a tag slug, best first.
    Tag(String),
    /// Images tagged by a tag slug, in the order they were taken.
    TagTimeline(String),
}

impl Series {
    /// True for series sorted by time rather than by rating.
    pub fn is_timeline(&self) -> bool {
        matches!(self, Series::MissionTimeline(_) | Series::TagTimeline(_))
    }

    /// Images hidden by a better image in the same group are left out
    /// of the rated series, but not of the timelines.
    pub fn hides_grouped(&self) -> bool {
        !self.is_timeline()
    }

    /// The images in the series, without any ordering.
    pub fn filtered(&self) -> images::BoxedQuery<'static, Pg> {
        let query = i::images.into_boxed();
        let query = if self.hides_grouped() {
            query.filter(i::group_hides.eq(false))
        } else {
            query
        };
        match self {
            Series::Index => query,
            Series::Mission(code) | Series::MissionTimeline(code) => {
                query.filter(
                    i::mission_id.eq_any(
                        m::missions
                            .select(m::id)
                            .filter(lower(m::code).eq(code.to_lowercase())),
                    ),
                )
            }
            Series::Tag(slug) | Series::TagTimeline(slug) => {
                query.filter(
                    i::id.eq_any(
                        ut::user_tags.select(ut::image_id).filter(
                            ut::tag_id.eq_any(
                                t::tags
                                    .select(t::id)
                                    .filter(t::slug.eq(slug.clone())),
                            ),
                        ),
                    ),
                )
            }
        }
    }

    /// The images in the series, in series order.
    pub fn ordered(&self) -> images::BoxedQuery<'static, Pg> {
        let query = self.filtered();
        if self.is_timeline() {
            query.order((i::date.asc(), i::code.asc()))
        } else {
            query.order((i::rating.desc(), i::votes.desc(), i::id.asc()))
        }
    }

    pub async fn count(
        &self,
        db: &mut AsyncPgConnection,
    ) -> Result<i64, DbError> {
        self.filtered().count().get_result(db).await
    }

    /// Load `limit` images, starting at position `offset`.
    pub async fn slice(
        &self,
        db: &mut AsyncPgConnection,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Image>, DbError> {
        self.ordered().offset(offset).limit(limit).load(db).await
    }

    /// The name of the mission or tag the series is about.
    ///
    /// None if there is no such mission or tag.
    pub async fn title(
        &self,
        db: &mut AsyncPgConnection,
    ) -> Result<Option<String>, DbError> {
        match self {
            Series::Index => Ok(Some("Space Gallery".into())),
            Series::Mission(code) | Series::MissionTimeline(code) => {
                m::missions
                    .filter(lower(m::code).eq(code.to_lowercase()))
                    .select(m::name)
                    .first::<String>(db)
                    .await
                    .optional()
            }
            Series::Tag(slug) | Series::TagTimeline(slug) => t::tags
                .filter(t::slug.eq(slug))
                .select(t::name)
                .first::<String>(db)
                .await
                .optional(),
        }
    }

    /// The image at a specific position in the series, if any.
    pub async fn nth(
        &self,
        db: &mut AsyncPgConnection,
        index: i64,
    ) -> Result<Option<Image>, DbError> {
        self.ordered()
            .offset(index)
            .first::<Image>(db)
            .await
            .optional()
    }
}

impl FromStr for Series {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "index" {
            Ok(Series::Index)
        } else if let Some(code) = s.strip_prefix("m-") {
            Ok(Series::Mission(code.into()))
        } else if let Some(code) = s.strip_prefix("mt-") {
            Ok(Series::MissionTimeline(code.into()))
        } else if let Some(slug) = s.strip_prefix("t-") {
            Ok(Series::Tag(slug.into()))
        } else if let Some(slug) = s.strip_prefix("tt-") {
            Ok(Series::TagTimeline(slug.into()))
        } else {
            Err(Error::BadSeries(s.into()))
        }
    }
}

impl fmt::Display for Series {
    fn fmt(&self, out: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Series::Index => out.write_str("index"),
            Series::Mission(code) => write!(out, "m-{code}"),
            Series::MissionTimeline(code) => write!(out, "mt-{code}"),
            Series::Tag(slug) => write!(out, "t-{slug}"),
            Series::TagTimeline(slug) => write!(out, "tt-{slug}"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::Series;
    use diesel::debug_query;
    use diesel::pg::Pg;

    const BEST_FIRST: &str = "ORDER BY \"images\".\"rating\" DESC, \
                              \"images\".\"votes\" DESC, \
                              \"images\".\"id\" ASC";
    const BY_TIME: &str =
        "ORDER BY \"images\".\"date\" ASC, \"images\".\"code\" ASC";
    const HIDES: &str = "\"images\".\"group_hides\" = $1";

    fn sql(series: &Series) -> String {
        debug_query::<Pg, _>(&series.ordered()).to_string()
    }

    #[test]
    fn parse_index() {
        assert_eq!("index".parse::<Series>().ok(), Some(Series::Index));
    }

    #[test]
    fn parse_mission() {
        assert_eq!(
            "m-AS11".parse::<Series>().ok(),
            Some(Series::Mission("AS11".into())),
        );
        assert_eq!(
            "mt-AS11".parse::<Series>().ok(),
            Some(Series::MissionTimeline("AS11".into())),
        );
    }

    #[test]
    fn parse_tag() {
        assert_eq!(
            "t-moon".parse::<Series>().ok(),
            Some(Series::Tag("moon".into())),
        );
        assert_eq!(
            "tt-moon".parse::<Series>().ok(),
            Some(Series::TagTimeline("moon".into())),
        );
    }

    #[test]
    fn parse_bad() {
        assert!("".parse::<Series>().is_err());
        assert!("indexes".parse::<Series>().is_err());
        assert!("x-moon".parse::<Series>().is_err());
        assert!("m_as11".parse::<Series>().is_err());
    }

    #[test]
    fn token_survives_url() {
        for token in ["index", "m-as11", "mt-as11", "t-moon", "tt-moon"] {
            let series = token.parse::<Series>().unwrap();
            assert_eq!(series.to_string(), token);
        }
    }

    #[test]
    fn index_query() {
        let sql = sql(&Series::Index);
        assert!(sql.contains(HIDES), "{sql}");
        assert!(sql.contains(BEST_FIRST), "{sql}");
    }

    #[test]
    fn mission_query_ignores_case() {
        let sql = sql(&Series::Mission("AS11".into()));
        assert!(sql.contains(HIDES), "{sql}");
        assert!(sql.contains("lower(\"missions\".\"code\")"), "{sql}");
        assert!(sql.contains("\"as11\""), "{sql}");
        assert!(sql.contains(BEST_FIRST), "{sql}");
    }

    #[test]
    fn mission_timeline_query() {
        let sql = sql(&Series::MissionTimeline("as11".into()));
        assert!(!sql.contains("\"group_hides\" ="), "{sql}");
        assert!(sql.contains("lower(\"missions\".\"code\")"), "{sql}");
        assert!(sql.contains(BY_TIME), "{sql}");
    }

    #[test]
    fn tag_query() {
        let sql = sql(&Series::Tag("moon".into()));
        assert!(sql.contains(HIDES), "{sql}");
        assert!(sql.contains("\"tags\".\"slug\" ="), "{sql}");
        assert!(sql.contains(BEST_FIRST), "{sql}");
    }

    #[test]
    fn tag_timeline_query() {
        let sql = sql(&Series::TagTimeline("moon".into()));
        assert!(!sql.contains("\"group_hides\" ="), "{sql}");
        assert!(sql.contains("\"tags\".\"slug\" ="), "{sql}");
        assert!(sql.contains(BY_TIME), "{sql}");
    }
}
