//! Pages for rating and tagging one image after another.
use super::image::ImageCard;
use super::leaderboard::LEADERBOARD_KEY;
use super::{redirect, sanitize_next, wrap, Context, Result, ViewError};
use crate::models::{Image, Tag, User};
use crate::schema::image_votes::dsl as iv;
use crate::schema::images::dsl as i;
use crate::schema::user_tags::dsl as ut;
use crate::tagging::{tag_image, tag_name_from_label};
use crate::templates::{self, RenderRucte};
use diesel::dsl::{count_star, sql};
use diesel::prelude::*;
use diesel::result::Error as DbError;
use diesel::sql_types::Integer;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::info;
use warp::filters::BoxedFilter;
use warp::http::response::Builder;
use warp::reply::Response;
use warp::Filter;

pub fn routes(s: BoxedFilter<(Context,)>) -> BoxedFilter<(Response,)> {
    use warp::filters::query::query;
    use warp::path::{end, path};
    use warp::{body::form, get, post};
    let rate = path("rate")
        .and(end())
        .and(get())
        .and(s.clone())
        .and(query())
        .then(rate);
    let tagger = path("tagger")
        .and(end())
        .and(get())
        .and(s.clone())
        .and(query())
        .then(tagger);
    let set_tag = path("rate")
        .or(path("tagger"))
        .unify()
        .and(end())
        .and(post())
        .and(s)
        .and(form())
        .then(set_tag);
    rate.or(tagger)
        .unify()
        .or(set_tag)
        .unify()
        .map(wrap)
        .boxed()
}

#[derive(Debug, Default, Deserialize)]
pub struct PickQuery {
    /// Show this image rather than picking one.
    image: Option<i32>,
    /// The image handled just before, if any.
    prev: Option<i32>,
}

/// Load an image, if there is an id.
async fn find_image(
    db: &mut AsyncPgConnection,
    id: Option<i32>,
) -> Result<Option<Image>, DbError> {
    match id {
        Some(id) => i::images.find(id).first::<Image>(db).await.optional(),
        None => Ok(None),
    }
}

async fn card(
    db: &mut AsyncPgConnection,
    context: &Context,
    image: Option<Image>,
) -> Result<Option<ImageCard>, DbError> {
    Ok(match image {
        Some(image) => {
            Some(ImageCard::load(db, context.image_base(), image).await?)
        }
        None => None,
    })
}

/// Show an image for the user to vote on.
///
/// Unless a specific image is requested, a random image the user has
/// not voted on yet is picked.
async fn rate(context: Context, query: PickQuery) -> Result<Response> {
    let user = context
        .authorized_user()
        .ok_or(ViewError::PermissionDenied)?;
    let mut db = context.db().await?;
    let db: &mut AsyncPgConnection = &mut db;
    let user = User::get_or_create(db, user).await?;
    let image = match query.image {
        Some(id) => find_image(db, Some(id)).await?,
        None => {
            i::images
                .filter(
                    i::id.ne_all(
                        iv::image_votes
                            .select(iv::image_id)
                            .filter(iv::user_id.eq(user.id)),
                    ),
                )
                .order(sql::<Integer>("random()"))
                .first::<Image>(db)
                .await
                .optional()?
        }
    };
    let image = card(db, &context, image).await?;
    let prev = find_image(db, query.prev).await?;
    let prev = card(db, &context, prev).await?;
    Ok(Builder::new().html(|o| {
        templates::rate_html(o, &context, image.as_ref(), prev.as_ref())
    })?)
}

/// A tag, as offered in the tagger.
pub struct TagChoice {
    pub label: String,
}

impl TagChoice {
    fn new(tag: &Tag, uses: i64) -> Self {
        TagChoice {
            label: format!("{} ({})", tag.name, uses),
        }
    }
}

/// Show an image for the user to tag.
///
/// Unless a specific image is requested, the best image the user has
/// not tagged yet is picked.
async fn tagger(context: Context, query: PickQuery) -> Result<Response> {
    let user = context
        .authorized_user()
        .ok_or(ViewError::PermissionDenied)?;
    let mut db = context.db().await?;
    let db: &mut AsyncPgConnection = &mut db;
    let user = User::get_or_create(db, user).await?;
    let image = match query.image {
        Some(id) => find_image(db, Some(id)).await?,
        None => {
            i::images
                .filter(
                    i::id.ne_all(
                        ut::user_tags
                            .select(ut::image_id)
                            .filter(ut::user_id.eq(user.id)),
                    ),
                )
                .order((i::rating.desc(), i::id.asc()))
                .first::<Image>(db)
                .await
                .optional()?
        }
    };
    let image = card(db, &context, image).await?;
    let prev = find_image(db, query.prev).await?;
    let prev = card(db, &context, prev).await?;
    let uses = ut::user_tags
        .group_by(ut::tag_id)
        .select((ut::tag_id, count_star()))
        .load::<(i32, i64)>(db)
        .await?
        .into_iter()
        .collect::<HashMap<_, _>>();
    let tags = Tag::all_for_tagger(db)
        .await?
        .iter()
        .map(|tag| {
            TagChoice::new(tag, uses.get(&tag.id).copied().unwrap_or(0))
        })
        .collect::<Vec<_>>();
    Ok(Builder::new().html(|o| {
        templates::tagger_html(
            o,
            &context,
            image.as_ref(),
            prev.as_ref(),
            &tags,
        )
    })?)
}

#[derive(Debug, Deserialize)]
pub struct TagForm {
    image: i32,
    /// The label of the chosen tag.
    tag: String,
    next: Option<String>,
}

/// Set the tag of an image for the current user.
async fn set_tag(context: Context, form: TagForm) -> Result<Response> {
    let user = context
        .authorized_user()
        .ok_or(ViewError::PermissionDenied)?;
    let mut db = context.db().await?;
    let db: &mut AsyncPgConnection = &mut db;
    let user = User::get_or_create(db, user).await?;
    let name = tag_name_from_label(&form.tag);
    let tag = tag_image(db, user.id, form.image, name).await?;
    info!("{} tagged #{} as {:?}", user.username, form.image, tag.name);
    context.clear_cache(LEADERBOARD_KEY);
    let fallback = format!("/tagger/?prev={}", form.image);
    redirect(sanitize_next(form.next.as_deref()).unwrap_or(&fallback))
}

#[cfg(test)]
mod test {
    use super::{PickQuery, TagChoice, TagForm};
    use crate::models::Tag;
    use crate::tagging::tag_name_from_label;

    #[test]
    fn choice_label_gives_tag_name() {
        let tag = Tag {
            id: 1,
            name: "City lights".into(),
            slug: Some("city-lights".into()),
            descriptive_image_id: None,
        };
        let choice = TagChoice::new(&tag, 42);
        assert_eq!(choice.label, "City lights (42)");
        assert_eq!(tag_name_from_label(&choice.label), tag.name);
    }

    #[test]
    fn tag_form() {
        let form: TagForm =
            serde_urlencoded::from_str("image=17&tag=Earth+%283%29").unwrap();
        assert_eq!(form.image, 17);
        assert_eq!(tag_name_from_label(&form.tag), "Earth");
        assert_eq!(form.next, None);
    }

    #[test]
    fn pick_query() {
        let q: PickQuery = serde_urlencoded::from_str("prev=4").unwrap();
        assert_eq!((q.image, q.prev), (None, Some(4)));
    }
}
