use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A film as stored and served. MPA rating and genres are kept fully
/// resolved (id plus name) so responses need no extra dictionary lookups.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Film {
    pub id: u64,
    pub name: String,
    pub description: Option<String>,
    pub release_date: Option<NaiveDate>,
    /// Duration in minutes, always positive.
    pub duration: u32,
    pub mpa: Option<Mpa>,
    pub genres: Vec<Genre>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct User {
    pub id: u64,
    pub email: String,
    pub login: String,
    pub name: String,
    pub birthday: NaiveDate,
}

/// Genre dictionary entry.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Genre {
    pub id: u32,
    pub name: String,
}

/// MPA rating dictionary entry.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Mpa {
    pub id: u32,
    pub name: String,
}

/// Reference to a dictionary entry by id, as it arrives in request bodies.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct IdRef {
    pub id: u32,
}

/// Incoming film body for create and update. Every field is optional so
/// that updates can leave out (or blank) fields to keep the stored value.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct FilmPayload {
    pub id: Option<u64>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub release_date: Option<NaiveDate>,
    pub duration: Option<u32>,
    pub mpa: Option<IdRef>,
    pub genres: Option<Vec<IdRef>>,
}

/// Incoming user body for create and update.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct UserPayload {
    pub id: Option<u64>,
    pub email: Option<String>,
    pub login: Option<String>,
    pub name: Option<String>,
    pub birthday: Option<NaiveDate>,
}
