//! Who votes, and how.
use crate::schema::image_votes::dsl as iv;
use crate::schema::user_tags::dsl as ut;
use crate::schema::users::dsl as u;
use diesel::dsl::count_star;
use diesel::prelude::*;
use diesel::result::Error as DbError;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::str::FromStr;

/// Voting statistics for one user.
///
/// The vote shares are percentages, rounded to two decimals.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub username: String,
    pub neutral: f64,
    pub good: f64,
    pub bad: f64,
    pub awesome: f64,
    pub total: i64,
    pub tags: i64,
}

/// Load the leaderboard, in user order.
///
/// Users who have not voted are not included.
pub async fn load(db: &mut AsyncPgConnection) -> Result<Vec<Row>, DbError> {
    let votes = iv::image_votes
        .inner_join(u::users)
        .group_by((u::id, u::username, iv::vote))
        .select((u::id, u::username, iv::vote, count_star()))
        .order(u::id)
        .load::<(i32, String, i32, i64)>(db)
        .await?;
    let tags = ut::user_tags
        .group_by(ut::user_id)
        .select((ut::user_id, count_star()))
        .load::<(i32, i64)>(db)
        .await?
        .into_iter()
        .collect::<HashMap<_, _>>();
    Ok(build(&votes, &tags))
}

/// Build leaderboard rows from vote counts per user and vote value,
/// ordered by user, and tag counts per user.
pub fn build(
    votes: &[(i32, String, i32, i64)],
    tags: &HashMap<i32, i64>,
) -> Vec<Row> {
    let mut result = Vec::new();
    for group in votes.chunk_by(|a, b| a.0 == b.0) {
        let (user_id, username) = (group[0].0, &group[0].1);
        let total = group.iter().map(|v| v.3).sum::<i64>();
        if total == 0 {
            continue;
        }
        let share = |value: i32| {
            let n = group
                .iter()
                .filter(|v| v.2 == value)
                .map(|v| v.3)
                .sum::<i64>();
            round2(n as f64 / total as f64 * 100.0)
        };
        result.push(Row {
            username: username.clone(),
            neutral: share(0),
            good: share(1),
            bad: share(-1),
            awesome: share(3),
            total,
            tags: tags.get(&user_id).copied().unwrap_or(0),
        });
    }
    result
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// A column the leaderboard can be sorted by.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Column {
    Username,
    Neutral,
    Good,
    Bad,
    Awesome,
    Total,
    Tags,
}

impl Column {
    fn compare(self, a: &Row, b: &Row) -> Ordering {
        match self {
            Column::Username => a.username.cmp(&b.username),
            Column::Neutral => a.neutral.total_cmp(&b.neutral),
            Column::Good => a.good.total_cmp(&b.good),
            Column::Bad => a.bad.total_cmp(&b.bad),
            Column::Awesome => a.awesome.total_cmp(&b.awesome),
            Column::Total => a.total.cmp(&b.total),
            Column::Tags => a.tags.cmp(&b.tags),
        }
    }
}

impl FromStr for Column {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "username" => Ok(Column::Username),
            "neutral" => Ok(Column::Neutral),
            "good" => Ok(Column::Good),
            "bad" => Ok(Column::Bad),
            "awesome" => Ok(Column::Awesome),
            "total" => Ok(Column::Total),
            "tags" => Ok(Column::Tags),
            _ => Err(()),
        }
    }
}

/// Sort rows by a column, keeping the order of equal rows.
///
/// Without a (known) column, the rows are left as they are.
pub fn sort(rows: &mut [Row], column: Option<Column>, descending: bool) {
    if let Some(column) = column {
        rows.sort_by(|a, b| {
            let order = column.compare(a, b);
            if descending {
                order.reverse()
            } else {
                order
            }
        });
    }
}
