//! User classification of images.
use crate::adm::result::Error;
use crate::models::Tag;
use crate::schema::images::dsl as i;
use crate::schema::user_tags::dsl as ut;
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::query_builder::{QueryFragment, QueryId};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use tracing::info;

/// Get the tag name from a tag label as shown in the tagger.
///
/// Labels may carry a trailing annotation, like "Earth (42)".
pub fn tag_name_from_label(label: &str) -> &str {
    let label = label.trim();
    if label.ends_with(')') {
        if let Some(pos) = label.rfind('(') {
            return label[..pos].trim_end();
        }
    }
    label
}

/// Set the tag a user gives an image.
///
/// A user has at most one tag per image, so this replaces whatever
/// tag the user gave the image earlier.
pub async fn tag_image(
    db: &mut AsyncPgConnection,
    user_id: i32,
    image_id: i32,
    tag_name: &str,
) -> Result<Tag, Error> {
    let tag = Tag::by_name(db, tag_name)
        .await?
        .ok_or(Error::NotFound("tag"))?;
    i::images
        .find(image_id)
        .select(i::id)
        .first::<i32>(db)
        .await
        .optional()?
        .ok_or(Error::NotFound("image"))?;
    info!("Tag #{} as {:?} by #{}", image_id, tag.name, user_id);
    upsert_user_tag(user_id, image_id, tag.id).execute(db).await?;
    Ok(tag)
}

/// Insert the tag of a user on an image, or replace the existing one.
fn upsert_user_tag(
    user_id: i32,
    image_id: i32,
    tag_id: i32,
) -> impl QueryFragment<Pg> + QueryId + Send {
    diesel::insert_into(ut::user_tags)
        .values((
            ut::user_id.eq(user_id),
            ut::image_id.eq(image_id),
            ut::tag_id.eq(tag_id),
        ))
        .on_conflict((ut::user_id, ut::image_id))
        .do_update()
        .set(ut::tag_id.eq(tag_id))
}
