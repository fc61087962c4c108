//! Maintaining the set of tags.
use super::result::Error;
use crate::dbopt::DbOpt;
use crate::schema::images::dsl as i;
use crate::schema::tags::dsl as t;
use crate::schema::user_tags::dsl as ut;
use diesel::dsl::count_star;
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use slug::slugify;
use std::collections::HashMap;

#[derive(clap::Parser)]
pub struct Tags {
    #[clap(flatten)]
    db: DbOpt,
    #[clap(subcommand)]
    cmd: TagCmd,
}

#[derive(clap::Subcommand)]
enum TagCmd {
    /// Add a tag that users can classify images with.
    Add {
        /// The name of the tag, as shown to users.
        name: String,
    },
    /// Set the image that best describes a tag.
    Describe {
        /// The slug of the tag.
        slug: String,
        /// The catalogue code of the image, like AS11-40-5903.
        image: String,
    },
    /// List all tags, with the number of images tagged by each.
    List,
}

impl Tags {
    pub async fn run(&self) -> Result<(), Error> {
        let mut db = self.db.connect().await?;
        match &self.cmd {
            TagCmd::Add { name } => add(&mut db, name).await,
            TagCmd::Describe { slug, image } => {
                describe(&mut db, slug, image).await
            }
            TagCmd::List => list(&mut db).await,
        }
    }
}

async fn add(db: &mut AsyncPgConnection, name: &str) -> Result<(), Error> {
    let name = name.trim();
    let slug = slugify(name);
    if slug.is_empty() {
        return Err(Error::Other(format!("Bad tag name {name:?}")));
    }
    let added = diesel::insert_into(t::tags)
        .values((t::name.eq(name), t::slug.eq(&slug)))
        .on_conflict(t::slug)
        .do_nothing()
        .execute(db)
        .await?;
    if added == 0 {
        println!("A tag with slug {slug:?} already exists");
    } else {
        println!("Added tag {name:?} ({slug})");
    }
    Ok(())
}

async fn describe(
    db: &mut AsyncPgConnection,
    slug: &str,
    code: &str,
) -> Result<(), Error> {
    let image = i::images
        .filter(i::code.eq(code.to_uppercase()))
        .select(i::id)
        .first::<i32>(db)
        .await
        .optional()?
        .ok_or(Error::NotFound("image"))?;
    let updated = diesel::update(t::tags.filter(t::slug.eq(slug)))
        .set(t::descriptive_image_id.eq(image))
        .execute(db)
        .await?;
    if updated == 0 {
        return Err(Error::NotFound("tag"));
    }
    println!("Tag {slug} is now described by #{image}");
    Ok(())
}

async fn list(db: &mut AsyncPgConnection) -> Result<(), Error> {
    let uses = ut::user_tags
        .group_by(ut::tag_id)
        .select((ut::tag_id, count_star()))
        .load::<(i32, i64)>(db)
        .await?
        .into_iter()
        .collect::<HashMap<_, _>>();
    let tags = t::tags
        .select((t::id, t::name, t::slug))
        .order(t::slug)
        .load::<(i32, String, Option<String>)>(db)
        .await?;
    for (id, name, slug) in tags {
        println!(
            "{:<20} {:<30} {:>6}",
            slug.as_deref().unwrap_or("-"),
            name,
            uses.get(&id).copied().unwrap_or(0),
        );
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::Tags;
    use clap::Parser;

    #[test]
    fn parse_describe() {
        let tags = Tags::try_parse_from([
            "tag",
            "--db-url",
            "postgres://localhost/space",
            "describe",
            "moon",
            "AS11-40-5903",
        ]);
        assert!(tags.is_ok());
    }

    #[test]
    fn add_needs_name() {
        let tags = Tags::try_parse_from([
            "tag",
            "--db-url",
            "postgres://localhost/space",
            "add",
        ]);
        assert!(tags.is_err());
    }
}
