//! Popularity ranking. Works purely through the storage traits, so both
//! backends share it, and always reads the live like ledger.

use crate::model::Film;
use crate::storage::{FilmStore, LikeLedger, Result};

/// At most `count` films, descending by like count. Ties break by
/// ascending film id so the order is deterministic.
pub fn find_popular(
    films: &dyn FilmStore,
    likes: &dyn LikeLedger,
    count: usize,
) -> Result<Vec<Film>> {
    let all = films.find_all()?;
    let mut ranked = Vec::with_capacity(all.len());
    for film in all {
        let like_count = likes.like_count(film.id)?;
        ranked.push((like_count, film));
    }
    ranked.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.id.cmp(&b.1.id)));
    ranked.truncate(count);
    Ok(ranked.into_iter().map(|(_, film)| film).collect())
}
