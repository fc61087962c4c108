//! Laying out gallery pages in rows.
use super::urlstring::UrlString;
use crate::models::{Image, ImageBase, ImageLocation, ImageSize, Mission};
use crate::series::Series;
use diesel::result::Error as DbError;
use diesel_async::AsyncPgConnection;

/// Split items into rows, where row `k` holds `pattern[k % len]`
/// items, except that the last row may be shorter.
///
/// There are never any empty rows.
/// An empty pattern puts all items in one row.
pub fn split_to_rows<T>(
    items: impl IntoIterator<Item = T>,
    pattern: &[usize],
) -> Vec<Vec<T>> {
    let mut widths = pattern.iter().copied().cycle();
    let mut items = items.into_iter().peekable();
    let mut rows = Vec::new();
    while items.peek().is_some() {
        let width = widths.next().unwrap_or(usize::MAX).max(1);
        rows.push(items.by_ref().take(width).collect());
    }
    rows
}

/// An image as shown in a gallery, with its position in the series.
#[derive(Debug)]
pub struct Thumb {
    pub image: Image,
    pub index: i64,
    pub name: String,
    /// The detail page of the image, in the context of the series.
    pub href: String,
    pub src: String,
}

impl Thumb {
    /// Make thumbs for a slice of images starting at `offset` in
    /// `series`.
    pub async fn load(
        db: &mut AsyncPgConnection,
        base: &ImageBase,
        series: &Series,
        offset: i64,
        images: Vec<Image>,
    ) -> Result<Vec<Thumb>, DbError> {
        let missions = Mission::load_for(db, &images).await?;
        let ids = images.iter().map(|i| i.id).collect::<Vec<_>>();
        let locations = ImageLocation::load_for(db, &ids).await?;
        Ok(images
            .into_iter()
            .zip(offset..)
            .filter_map(|(image, index)| {
                let mission = missions.get(&image.mission_id)?;
                Some(Thumb {
                    name: image.name(locations.get(&image.id)),
                    href: detail_url(&image, series, index),
                    src: base.url(mission, &image, ImageSize::Square),
                    image,
                    index,
                })
            })
            .collect())
    }
}

fn detail_url(image: &Image, series: &Series, index: i64) -> String {
    let mut url = UrlString::new(&image.absolute_url());
    url.query("series", series);
    url.query("index", index);
    url.into()
}

#[cfg(test)]
mod test {
    use super::{detail_url, split_to_rows};
    use crate::models::test_support::image;
    use crate::series::Series;

    const BEST: &[usize] = &[5, 4, 5, 5, 4];

    fn widths(rows: &[Vec<usize>]) -> Vec<usize> {
        rows.iter().map(Vec::len).collect()
    }

    #[test]
    fn full_page() {
        let rows = split_to_rows(0..23, BEST);
        assert_eq!(widths(&rows), [5, 4, 5, 5, 4]);
        assert_eq!(rows[1], [5, 6, 7, 8]);
    }

    #[test]
    fn pattern_repeats() {
        let rows = split_to_rows(0..24, BEST);
        assert_eq!(widths(&rows), [5, 4, 5, 5, 4, 1]);
        assert_eq!(rows[5], [23]);
    }

    #[test]
    fn short_last_row() {
        assert_eq!(widths(&split_to_rows(0..7, BEST)), [5, 2]);
    }

    #[test]
    fn exact_rows_no_empty_tail() {
        assert_eq!(widths(&split_to_rows(0..8, &[4])), [4, 4]);
    }

    #[test]
    fn timeline_page() {
        assert_eq!(widths(&split_to_rows(0..20, &[4])), [4, 4, 4, 4, 4]);
    }

    #[test]
    fn nothing() {
        assert!(split_to_rows(0..0, BEST).is_empty());
    }

    #[test]
    fn empty_pattern() {
        assert_eq!(widths(&split_to_rows(0..3, &[])), [3]);
    }

    #[test]
    fn link_carries_series() {
        let img = image(17, "as11-40-5903");
        assert_eq!(
            detail_url(&img, &Series::Tag("moon".into()), 30),
            "/image/AS11-40-5903/?series=t-moon&index=30",
        );
    }
}
