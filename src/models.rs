use crate::schema::image_locations::dsl as il;
use crate::schema::missions::dsl as m;
use crate::schema::tags::dsl as t;
use crate::schema::users::dsl as u;
use chrono::naive::NaiveDateTime;
use diesel::prelude::*;
use diesel::result::Error as DbError;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use std::collections::HashMap;
use std::fmt;

/// A mission on which photos were taken.
#[derive(Debug, Clone, Queryable)]
pub struct Mission {
    pub id: i32,
    pub code: String,
    pub name: String,
}

impl Mission {
    /// Load the missions owning any of the given images, by id.
    pub async fn load_for(
        db: &mut AsyncPgConnection,
        images: &[Image],
    ) -> Result<HashMap<i32, Mission>, DbError> {
        let ids = images.iter().map(|i| i.mission_id).collect::<Vec<_>>();
        Ok(m::missions
            .filter(m::id.eq_any(ids))
            .load::<Mission>(db)
            .await?
            .into_iter()
            .map(|mission| (mission.id, mission))
            .collect())
    }
}

impl fmt::Display for Mission {
    fn fmt(&self, out: &mut fmt::Formatter) -> fmt::Result {
        write!(out, "{} ({})", self.name, self.code)
    }
}

/// A photo taken from orbit, with everything known about it.
///
/// The `rating` and `votes` fields are aggregates of the image_votes
/// table and must only be changed together with it, see
/// [`crate::voting`].
#[derive(Debug, Clone, Queryable)]
pub struct Image {
    pub id: i32,
    pub mission_id: i32,
    pub code: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub date: Option<NaiveDateTime>,
    pub date_start: Option<NaiveDateTime>,
    pub date_end: Option<NaiveDateTime>,
    pub geographic_name: Option<String>,
    pub features_text: Option<String>,
    pub tilt_text: Option<String>,
    pub focal_length_text: Option<String>,
    pub camera_model_text: Option<String>,
    pub camera_model_code: Option<String>,
    pub film_text: Option<String>,
    pub film_code: Option<String>,
    pub exposure_text: Option<String>,
    pub cloud_cover_text: Option<String>,
    pub date_text: Option<String>,
    pub caption_text: Option<String>,
    pub nadir_latitude: Option<f64>,
    pub nadir_longitude: Option<f64>,
    pub nadir_to_photo_text: Option<String>,
    pub sun_azimuth: Option<i32>,
    pub sun_elevation: Option<i32>,
    pub altitude: Option<i32>,
    pub rating: i32,
    pub votes: i32,
    pub in_group: bool,
    pub group_hides: bool,
}

impl Image {
    /// The dash-separated parts of the code, mission-roll-frame.
    pub fn code_parts(&self) -> Vec<&str> {
        self.code.split('-').collect()
    }
    pub fn roll(&self) -> Option<&str> {
        self.code_parts().get(1).copied()
    }
    pub fn frame(&self) -> Option<&str> {
        self.code_parts().get(2).copied()
    }

    pub fn absolute_url(&self) -> String {
        format!("/image/{}/", self.code.to_uppercase())
    }

    /// Human-readable place name.
    ///
    /// A geocoded location takes precedence over the name from the
    /// image catalogue.
    pub fn name(&self, location: Option<&ImageLocation>) -> String {
        match location {
            Some(loc) => loc.location.clone(),
            None => {
                self.catalogue_name().unwrap_or_else(|| "Unknown".into())
            }
        }
    }

    /// Like `name`, but prefixed with a preposition, "Over Italy".
    pub fn name_with_preposition(
        &self,
        location: Option<&ImageLocation>,
    ) -> String {
        match location {
            Some(loc) => {
                format!("{} {}", capitalize(&loc.preposition), loc.location)
            }
            None => match self.catalogue_name() {
                Some(name) => format!("Near {name}"),
                None => "Unknown".into(),
            },
        }
    }

    fn catalogue_name(&self) -> Option<String> {
        let name = self.geographic_name.as_deref()?;
        if name.is_empty() {
            return None;
        }
        let name = title_case(name).replace('-', " - ");
        Some(upcase_prefix(upcase_prefix(name, "Usa"), "Uk"))
    }

    pub fn descriptive_date(&self) -> Option<String> {
        if let (Some(start), Some(end)) = (self.date_start, self.date_end) {
            Some(format!("{} to {}", start, end))
        } else {
            self.date
                .map(|d| format!("{} UTC", d.format("%B %d %Y, %H:%M:%S")))
        }
    }
}

/// Capitalize each word, lowercase the rest (as in "NORTH-EAST ITALY"
/// to "North-East Italy").
fn title_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut in_word = false;
    for c in s.chars() {
        if in_word {
            result.extend(c.to_lowercase());
        } else {
            result.extend(c.to_uppercase());
        }
        in_word = c.is_alphabetic();
    }
    result
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Upcase an abbreviation if the name starts with it as a full word.
fn upcase_prefix(name: String, prefix: &str) -> String {
    match name.strip_prefix(prefix) {
        Some(rest) if !rest.starts_with(char::is_alphabetic) => {
            format!("{}{}", prefix.to_uppercase(), rest)
        }
        _ => name,
    }
}

/// Geocoded location of an image.
///
/// Kept apart from the image data for licensing reasons.
#[derive(Debug, Clone, Queryable)]
pub struct ImageLocation {
    pub id: i32,
    pub image_id: i32,
    pub preposition: String,
    pub location: String,
}

impl ImageLocation {
    pub async fn load_for(
        db: &mut AsyncPgConnection,
        image_ids: &[i32],
    ) -> Result<HashMap<i32, ImageLocation>, DbError> {
        Ok(il::image_locations
            .filter(il::image_id.eq_any(image_ids))
            .load::<ImageLocation>(db)
            .await?
            .into_iter()
            .map(|loc| (loc.image_id, loc))
            .collect())
    }
}

#[derive(Debug, Clone, Queryable)]
pub struct User {
    pub id: i32,
    pub username: String,
}

impl User {
    /// Find the local user row for a name vouched for by the identity
    /// provider, creating it on first interaction.
    pub async fn get_or_create(
        db: &mut AsyncPgConnection,
        name: &str,
    ) -> Result<User, DbError> {
        if let Some(user) = u::users
            .filter(u::username.eq(name))
            .first::<User>(db)
            .await
            .optional()?
        {
            return Ok(user);
        }
        diesel::insert_into(u::users)
            .values(u::username.eq(name))
            .on_conflict(u::username)
            .do_update()
            .set(u::username.eq(name))
            .get_result::<User>(db)
            .await
    }
}

#[derive(Debug, Clone, Queryable)]
pub struct ImageVote {
    pub id: i32,
    pub user_id: i32,
    pub image_id: i32,
    pub vote: i32,
    pub date: NaiveDateTime,
}

/// Classification of an image.
#[derive(Debug, Clone, Queryable)]
pub struct Tag {
    pub id: i32,
    pub name: String,
    pub slug: Option<String>,
    pub descriptive_image_id: Option<i32>,
}

impl Tag {
    pub async fn by_name(
        db: &mut AsyncPgConnection,
        name: &str,
    ) -> Result<Option<Tag>, DbError> {
        t::tags
            .filter(t::name.eq(name))
            .first::<Tag>(db)
            .await
            .optional()
    }

    /// All tags ordered by slug, with the "skip" pseudo-tag last.
    pub async fn all_for_tagger(
        db: &mut AsyncPgConnection,
    ) -> Result<Vec<Tag>, DbError> {
        let mut tags = t::tags.order(t::slug).load::<Tag>(db).await?;
        tags.sort_by_key(|tag| tag.is_skip());
        Ok(tags)
    }

    pub fn is_skip(&self) -> bool {
        self.slug.as_deref() == Some("skip")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageSize {
    Original,
    Square,
    Large,
}

impl ImageSize {
    pub fn tag(self) -> &'static str {
        match self {
            ImageSize::Original => "original",
            ImageSize::Square => "square",
            ImageSize::Large => "large",
        }
    }
}

/// Where the image files are served from, typically a cdn.
#[derive(Clone, Debug)]
pub struct ImageBase(String);

impl ImageBase {
    pub fn new(base: &str) -> Self {
        ImageBase(base.into())
    }

    /// The url of a specific size of an image.
    pub fn url(
        &self,
        mission: &Mission,
        image: &Image,
        size: ImageSize,
    ) -> String {
        let (base, code) = (&self.0, &image.code);
        format!("{base}{}/{}/{code}.jpg", mission.code, size.tag())
    }
}

#[cfg(test)]
pub mod test_support {
    use super::{Image, Mission};

    pub fn mission(code: &str) -> Mission {
        Mission {
            id: 1,
            code: code.into(),
            name: "Apollo 11".into(),
        }
    }

    pub fn image(id: i32, code: &str) -> Image {
        Image {
            id,
            mission_id: 1,
            code: code.into(),
            latitude: None,
            longitude: None,
            date: None,
            date_start: None,
            date_end: None,
            geographic_name: None,
            features_text: None,
            tilt_text: None,
            focal_length_text: None,
            camera_model_text: None,
            camera_model_code: None,
            film_text: None,
            film_code: None,
            exposure_text: None,
            cloud_cover_text: None,
            date_text: None,
            caption_text: None,
            nadir_latitude: None,
            nadir_longitude: None,
            nadir_to_photo_text: None,
            sun_azimuth: None,
            sun_elevation: None,
            altitude: None,
            rating: 0,
            votes: 0,
            in_group: false,
            group_hides: false,
        }
    }
}

#[cfg(test)]
mod test {
    use super::test_support::{image, mission};
    use super::*;
    use chrono::NaiveDate;

    fn named(name: &str) -> Image {
        Image {
            geographic_name: Some(name.into()),
            ..image(7, "AS11-40-5903")
        }
    }

    #[test]
    fn catalogue_name_is_title_cased() {
        assert_eq!(
            named("NORTH-EAST ITALY").name(None),
            "North - East Italy",
        );
    }

    #[test]
    fn usa_is_upcased() {
        assert_eq!(named("USA-FLORIDA").name(None), "USA - Florida");
    }

    #[test]
    fn uk_prefix_needs_full_word() {
        assert_eq!(named("UK").name(None), "UK");
        assert_eq!(named("UKRAINE").name(None), "Ukraine");
    }

    #[test]
    fn missing_name_is_unknown() {
        assert_eq!(image(1, "AS11-40-5903").name(None), "Unknown");
        assert_eq!(named("").name_with_preposition(None), "Unknown");
    }

    #[test]
    fn catalogue_name_gets_near() {
        assert_eq!(
            named("pacific ocean").name_with_preposition(None),
            "Near Pacific Ocean",
        );
    }

    #[test]
    fn location_takes_precedence() {
        let loc = ImageLocation {
            id: 1,
            image_id: 7,
            preposition: "over".into(),
            location: "Sardinia".into(),
        };
        let img = named("ITALY");
        assert_eq!(img.name(Some(&loc)), "Sardinia");
        assert_eq!(img.name_with_preposition(Some(&loc)), "Over Sardinia");
    }

    #[test]
    fn roll_and_frame() {
        let img = image(1, "AS11-40-5903");
        assert_eq!(img.code_parts(), ["AS11", "40", "5903"]);
        assert_eq!(img.roll(), Some("40"));
        assert_eq!(img.frame(), Some("5903"));
        assert_eq!(image(2, "ISS").frame(), None);
    }

    #[test]
    fn absolute_url_is_upper() {
        assert_eq!(
            image(1, "as11-40-5903").absolute_url(),
            "/image/AS11-40-5903/",
        );
    }

    #[test]
    fn descriptive_single_date() {
        let img = Image {
            date: NaiveDate::from_ymd_opt(1969, 7, 20)
                .and_then(|d| d.and_hms_opt(20, 17, 40)),
            ..image(1, "AS11-40-5903")
        };
        assert_eq!(
            img.descriptive_date().as_deref(),
            Some("July 20 1969, 20:17:40 UTC"),
        );
    }

    #[test]
    fn descriptive_date_range() {
        let day = |d| {
            NaiveDate::from_ymd_opt(1969, 7, d)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        };
        let img = Image {
            date: day(20),
            date_start: day(16),
            date_end: day(24),
            ..image(1, "AS11-40-5903")
        };
        assert_eq!(
            img.descriptive_date().as_deref(),
            Some("1969-07-16 00:00:00 to 1969-07-24 00:00:00"),
        );
        assert_eq!(image(2, "AS11-40-5904").descriptive_date(), None);
    }

    #[test]
    fn image_urls() {
        let base = ImageBase::new("https://cdn.example.org/");
        let (m, img) = (mission("AS11"), image(1, "AS11-40-5903"));
        assert_eq!(
            base.url(&m, &img, ImageSize::Square),
            "https://cdn.example.org/AS11/square/AS11-40-5903.jpg",
        );
        assert_eq!(
            base.url(&m, &img, ImageSize::Large),
            "https://cdn.example.org/AS11/large/AS11-40-5903.jpg",
        );
    }
}
