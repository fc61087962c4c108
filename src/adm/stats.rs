use super::result::Error;
use crate::schema::image_votes::dsl as iv;
use crate::schema::images::dsl as i;
use crate::schema::missions::dsl as m;
use crate::schema::tags::dsl as t;
use crate::schema::user_tags::dsl as ut;
use crate::schema::users::dsl as u;
use diesel::dsl::count_star;
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};

pub async fn show_stats(db: &mut AsyncPgConnection) -> Result<(), Error> {
    println!(
        "There are {} images from {} missions.",
        i::images.select(count_star()).first::<i64>(db).await?,
        m::missions.select(count_star()).first::<i64>(db).await?,
    );
    println!(
        "{} users have cast {} votes and tagged {} images with {} tags.",
        u::users.select(count_star()).first::<i64>(db).await?,
        iv::image_votes.select(count_star()).first::<i64>(db).await?,
        ut::user_tags.select(count_star()).first::<i64>(db).await?,
        t::tags.select(count_star()).first::<i64>(db).await?,
    );
    println!(
        "Images per mission: {}",
        i::images
            .inner_join(m::missions)
            .group_by(m::code)
            .select((m::code, count_star()))
            .order(m::code)
            .load::<(String, i64)>(db)
            .await?
            .iter()
            .map(|(code, n)| format!("{code}: {n}"))
            .collect::<Vec<_>>()
            .join(", "),
    );
    Ok(())
}
