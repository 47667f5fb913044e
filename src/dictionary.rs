//! Closed genre and MPA rating reference sets. Read-only: films refer
//! into these by id and the guards reject ids that are not listed here.

use crate::model::{Genre, Mpa};

const GENRES: &[(u32, &str)] = &[
    (1, "Comedy"),
    (2, "Drama"),
    (3, "Cartoon"),
    (4, "Thriller"),
    (5, "Documentary"),
    (6, "Action"),
];

const MPA_RATINGS: &[(u32, &str)] = &[
    (1, "G"),
    (2, "PG"),
    (3, "PG-13"),
    (4, "R"),
    (5, "NC-17"),
];

pub fn all_genres() -> Vec<Genre> {
    GENRES
        .iter()
        .map(|&(id, name)| Genre {
            id,
            name: name.to_owned(),
        })
        .collect()
}

pub fn genre_by_id(id: u32) -> Option<Genre> {
    GENRES
        .iter()
        .find(|&&(genre_id, _)| genre_id == id)
        .map(|&(id, name)| Genre {
            id,
            name: name.to_owned(),
        })
}

pub fn all_mpa() -> Vec<Mpa> {
    MPA_RATINGS
        .iter()
        .map(|&(id, name)| Mpa {
            id,
            name: name.to_owned(),
        })
        .collect()
}

pub fn mpa_by_id(id: u32) -> Option<Mpa> {
    MPA_RATINGS
        .iter()
        .find(|&&(mpa_id, _)| mpa_id == id)
        .map(|&(id, name)| Mpa {
            id,
            name: name.to_owned(),
        })
}
