//! Votes on images, and the rating aggregates they feed.
use crate::adm::result::Error;
use crate::models::ImageVote;
use crate::schema::image_votes::dsl as iv;
use crate::schema::images::dsl as i;
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::query_builder::{QueryFragment, QueryId};
use diesel::result::{DatabaseErrorKind, Error as DbError};
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use tracing::{debug, info, warn};

/// What a user thinks of an image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Intent {
    Neutral,
    Bad,
    Good,
    Awesome,
}

impl Intent {
    pub fn value(self) -> i32 {
        match self {
            Intent::Neutral => 0,
            Intent::Bad => -1,
            Intent::Good => 1,
            Intent::Awesome => 3,
        }
    }
}

/// A change to the `rating` and `votes` aggregates of an image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Adjustment {
    pub rating: i32,
    pub votes: i32,
}

impl Adjustment {
    /// A first vote counts, a changed vote only moves the rating.
    pub fn for_vote(previous: Option<i32>, value: i32) -> Self {
        match previous {
            None => Adjustment {
                rating: value,
                votes: 1,
            },
            Some(old) => Adjustment {
                rating: value - old,
                votes: 0,
            },
        }
    }
}

/// Record the vote of a user on an image, replacing any earlier vote
/// by the same user.
///
/// The vote row and the image aggregates are written in the same
/// transaction, and the aggregates are updated in place, so concurrent
/// votes from different users never lose updates.
pub async fn cast_vote(
    db: &mut AsyncPgConnection,
    user_id: i32,
    image_id: i32,
    intent: Intent,
) -> Result<Adjustment, Error> {
    let value = intent.value();
    let mut attempt = 1;
    loop {
        let result = db
            .transaction::<_, Error, _>(|db| {
                record_vote(db, user_id, image_id, value).scope_boxed()
            })
            .await;
        match result {
            Err(Error::Db(DbError::DatabaseError(
                DatabaseErrorKind::UniqueViolation,
                _,
            ))) if attempt < 3 => {
                info!(
                    "Attempt #{} to vote on #{} by #{} raced, trying again",
                    attempt, image_id, user_id,
                );
                attempt += 1;
            }
            result => return result,
        }
    }
}

async fn record_vote(
    db: &mut AsyncPgConnection,
    user_id: i32,
    image_id: i32,
    value: i32,
) -> Result<Adjustment, Error> {
    let previous = iv::image_votes
        .filter(iv::user_id.eq(user_id))
        .filter(iv::image_id.eq(image_id))
        .for_update()
        .first::<ImageVote>(db)
        .await
        .optional()?;
    let adjustment =
        Adjustment::for_vote(previous.as_ref().map(|v| v.vote), value);
    let updated = adjust_counters(image_id, adjustment).execute(db).await?;
    match updated {
        1 => (),
        0 => return Err(Error::NotFound("image")),
        n => warn!("Strange, updated {} images with id {}", n, image_id),
    }
    if let Some(vote) = previous {
        debug!("Change vote #{} from {} to {}", vote.id, vote.vote, value);
        diesel::update(iv::image_votes.find(vote.id))
            .set(iv::vote.eq(value))
            .execute(db)
            .await?;
    } else {
        debug!("New vote {} on #{} by #{}", value, image_id, user_id);
        diesel::insert_into(iv::image_votes)
            .values((
                iv::user_id.eq(user_id),
                iv::image_id.eq(image_id),
                iv::vote.eq(value),
            ))
            .execute(db)
            .await?;
    }
    Ok(adjustment)
}

/// Apply an adjustment to the aggregates of an image, in place.
fn adjust_counters(
    image_id: i32,
    adjustment: Adjustment,
) -> impl QueryFragment<Pg> + QueryId + Send {
    diesel::update(i::images.find(image_id)).set((
        i::rating.eq(i::rating + adjustment.rating),
        i::votes.eq(i::votes + adjustment.votes),
    ))
}

/// Mark an image as part of a group of similar images (or not).
pub async fn set_in_group(
    db: &mut AsyncPgConnection,
    image_id: i32,
    in_group: bool,
) -> Result<(), Error> {
    let updated = diesel::update(i::images.find(image_id))
        .set(i::in_group.eq(in_group))
        .execute(db)
        .await?;
    if updated == 0 {
        return Err(Error::NotFound("image"));
    }
    info!("Image #{} in_group set to {}", image_id, in_group);
    Ok(())
}
