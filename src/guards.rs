//! Consistency guards invoked at every mutation boundary: field rules,
//! dictionary referential checks, and the merge-on-blank update policy.
//! All checks run before any store mutation, so a rejected request never
//! leaves partial state behind.

use chrono::{NaiveDate, Utc};
use log::{error, warn};

use crate::dictionary;
use crate::error::Error;
use crate::model::{Film, FilmPayload, Genre, IdRef, Mpa, User, UserPayload};

const MAX_DESCRIPTION_CHARS: usize = 200;

/// No film was released before the first public screening.
fn film_birthday() -> NaiveDate {
    NaiveDate::from_ymd_opt(1895, 12, 28).unwrap()
}

fn is_blank(field: &Option<String>) -> bool {
    field.as_ref().map_or(true, |value| value.trim().is_empty())
}

/// Validates a create payload and builds the film to store. The caller
/// assigns the id.
pub fn prepare_film_create(payload: FilmPayload) -> Result<Film, Error> {
    let name = payload
        .name
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| {
            error!("film create rejected: blank name");
            Error::Validation("film name must not be blank".to_owned())
        })?;
    let duration = check_duration(payload.duration.ok_or_else(|| {
        Error::Validation("film duration is required".to_owned())
    })?)?;
    check_description(payload.description.as_deref())?;
    check_release_date(payload.release_date.as_ref())?;
    Ok(Film {
        id: 0,
        name,
        description: payload.description,
        release_date: payload.release_date,
        duration,
        mpa: resolve_mpa(payload.mpa)?,
        genres: resolve_genres(payload.genres.unwrap_or_default())?,
    })
}

/// Validates an update payload against the stored film and builds the
/// merged record. Blank or absent name, description, release date and
/// duration keep the stored value rather than clearing it.
pub fn prepare_film_update(payload: FilmPayload, old: Option<&Film>) -> Result<Film, Error> {
    let id = payload.id.ok_or_else(|| {
        error!("film update rejected: missing id");
        Error::Validation("film id is required for update".to_owned())
    })?;
    let old = old.ok_or_else(|| {
        error!("film update rejected: no film with id {}", id);
        Error::NotFound(format!("no film with id {} to update", id))
    })?;

    let name = match payload.name {
        Some(name) if !name.trim().is_empty() => name,
        _ => {
            warn!("film update for id {}: blank name, keeping stored value", id);
            old.name.clone()
        }
    };
    let description = if is_blank(&payload.description) {
        old.description.clone()
    } else {
        check_description(payload.description.as_deref())?;
        payload.description
    };
    let release_date = match payload.release_date {
        None => old.release_date,
        Some(date) => {
            check_release_date(Some(&date))?;
            Some(date)
        }
    };
    let duration = match payload.duration {
        None => old.duration,
        Some(duration) => check_duration(duration)?,
    };
    let mpa = match payload.mpa {
        None => old.mpa.clone(),
        Some(mpa_ref) => resolve_mpa(Some(mpa_ref))?,
    };
    let genres = match payload.genres {
        None => old.genres.clone(),
        Some(refs) => resolve_genres(refs)?,
    };
    Ok(Film {
        id,
        name,
        description,
        release_date,
        duration,
        mpa,
        genres,
    })
}

/// Validates a create payload and builds the user to store. A blank
/// display name falls back to the login.
pub fn prepare_user_create(payload: UserPayload) -> Result<User, Error> {
    let email = check_email(payload.email)?;
    let login = check_login(payload.login)?;
    let birthday = check_birthday(payload.birthday)?;
    let name = match payload.name {
        Some(name) if !name.trim().is_empty() => name,
        _ => {
            warn!("blank user name on create, defaulting to login {}", login);
            login.clone()
        }
    };
    Ok(User {
        id: 0,
        email,
        login,
        name,
        birthday,
    })
}

/// Validates an update payload against the stored user and builds the
/// merged record. Blank or absent login and name keep the stored values.
pub fn prepare_user_update(payload: UserPayload, old: Option<&User>) -> Result<User, Error> {
    let id = payload.id.ok_or_else(|| {
        error!("user update rejected: missing id");
        Error::Validation("user id is required for update".to_owned())
    })?;
    let old = old.ok_or_else(|| {
        error!("user update rejected: no user with id {}", id);
        Error::NotFound(format!("no user with id {} to update", id))
    })?;

    let email = check_email(payload.email)?;
    let birthday = check_birthday(payload.birthday)?;
    let login = if is_blank(&payload.login) {
        warn!("user update for id {}: blank login, keeping stored value", id);
        old.login.clone()
    } else {
        check_login(payload.login)?
    };
    let name = match payload.name {
        Some(name) if !name.trim().is_empty() => name,
        _ => {
            warn!("user update for id {}: blank name, keeping stored value", id);
            old.name.clone()
        }
    };
    Ok(User {
        id,
        email,
        login,
        name,
        birthday,
    })
}

fn check_duration(duration: u32) -> Result<u32, Error> {
    if duration == 0 {
        error!("film duration must be positive, got 0");
        return Err(Error::Validation(
            "film duration must be positive".to_owned(),
        ));
    }
    Ok(duration)
}

fn check_description(description: Option<&str>) -> Result<(), Error> {
    if let Some(text) = description {
        if text.chars().count() > MAX_DESCRIPTION_CHARS {
            error!("film description over {} chars", MAX_DESCRIPTION_CHARS);
            return Err(Error::Validation(format!(
                "film description must not exceed {} characters",
                MAX_DESCRIPTION_CHARS
            )));
        }
    }
    Ok(())
}

fn check_release_date(release_date: Option<&NaiveDate>) -> Result<(), Error> {
    if let Some(date) = release_date {
        if *date < film_birthday() {
            error!("film release date {} precedes 1895-12-28", date);
            return Err(Error::Validation(
                "film release date must not precede 1895-12-28".to_owned(),
            ));
        }
    }
    Ok(())
}

fn check_email(email: Option<String>) -> Result<String, Error> {
    email.filter(|value| value.contains('@')).ok_or_else(|| {
        error!("user payload rejected: missing or malformed email");
        Error::Validation("user email must contain '@'".to_owned())
    })
}

fn check_login(login: Option<String>) -> Result<String, Error> {
    login
        .filter(|value| !value.trim().is_empty() && !value.contains(char::is_whitespace))
        .ok_or_else(|| {
            error!("user payload rejected: blank login or login with whitespace");
            Error::Validation(
                "user login must not be blank or contain whitespace".to_owned(),
            )
        })
}

fn check_birthday(birthday: Option<NaiveDate>) -> Result<NaiveDate, Error> {
    let birthday = birthday.ok_or_else(|| {
        Error::Validation("user birthday is required".to_owned())
    })?;
    if birthday > Utc::now().date_naive() {
        error!("user birthday {} is in the future", birthday);
        return Err(Error::Validation(
            "user birthday must not be in the future".to_owned(),
        ));
    }
    Ok(birthday)
}

fn resolve_mpa(mpa: Option<IdRef>) -> Result<Option<Mpa>, Error> {
    match mpa {
        None => Ok(None),
        Some(mpa_ref) => dictionary::mpa_by_id(mpa_ref.id)
            .map(Some)
            .ok_or_else(|| {
                error!("unknown MPA rating id {}", mpa_ref.id);
                Error::Validation(format!("unknown MPA rating id {}", mpa_ref.id))
            }),
    }
}

/// Resolves genre references against the dictionary. Duplicate references
/// are logged and dropped, matching the tolerant create behavior.
fn resolve_genres(refs: Vec<IdRef>) -> Result<Vec<Genre>, Error> {
    let mut genres: Vec<Genre> = Vec::with_capacity(refs.len());
    for genre_ref in refs {
        let genre = dictionary::genre_by_id(genre_ref.id).ok_or_else(|| {
            error!("unknown genre id {}", genre_ref.id);
            Error::Validation(format!("unknown genre id {}", genre_ref.id))
        })?;
        if genres.iter().any(|existing| existing.id == genre.id) {
            warn!("duplicate genre id {} on film payload, ignoring", genre.id);
            continue;
        }
        genres.push(genre);
    }
    Ok(genres)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn film_payload(name: &str) -> FilmPayload {
        FilmPayload {
            name: Some(name.to_owned()),
            duration: Some(100),
            ..FilmPayload::default()
        }
    }

    fn user_payload(login: &str) -> UserPayload {
        UserPayload {
            email: Some(format!("{}@example.com", login)),
            login: Some(login.to_owned()),
            birthday: NaiveDate::from_ymd_opt(1990, 1, 1),
            ..UserPayload::default()
        }
    }

    #[test]
    fn film_create_requires_name_and_duration() {
        let film = prepare_film_create(film_payload("Matrix")).unwrap();
        assert_eq!(film.name, "Matrix");
        assert_eq!(film.duration, 100);

        assert!(matches!(
            prepare_film_create(film_payload("  ")),
            Err(Error::Validation(_))
        ));
        let mut zero = film_payload("Matrix");
        zero.duration = Some(0);
        assert!(matches!(
            prepare_film_create(zero),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn film_create_rejects_too_early_release_date() {
        let mut payload = film_payload("Lumiere");
        payload.release_date = NaiveDate::from_ymd_opt(1895, 12, 27);
        assert!(matches!(
            prepare_film_create(payload),
            Err(Error::Validation(_))
        ));
        let mut payload = film_payload("Lumiere");
        payload.release_date = NaiveDate::from_ymd_opt(1895, 12, 28);
        assert!(prepare_film_create(payload).is_ok());
    }

    #[test]
    fn film_create_rejects_long_description() {
        let mut payload = film_payload("Matrix");
        payload.description = Some("x".repeat(201));
        assert!(matches!(
            prepare_film_create(payload),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn film_create_resolves_dictionaries() {
        let mut payload = film_payload("Matrix");
        payload.mpa = Some(IdRef { id: 4 });
        payload.genres = Some(vec![IdRef { id: 6 }, IdRef { id: 6 }, IdRef { id: 4 }]);
        let film = prepare_film_create(payload).unwrap();
        assert_eq!(film.mpa.unwrap().name, "R");
        // duplicate genre is swallowed
        assert_eq!(
            film.genres.iter().map(|g| g.id).collect::<Vec<_>>(),
            vec![6, 4]
        );

        let mut bad_mpa = film_payload("Matrix");
        bad_mpa.mpa = Some(IdRef { id: 6 });
        assert!(matches!(
            prepare_film_create(bad_mpa),
            Err(Error::Validation(_))
        ));
        let mut bad_genre = film_payload("Matrix");
        bad_genre.genres = Some(vec![IdRef { id: 99 }]);
        assert!(matches!(
            prepare_film_create(bad_genre),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn film_update_merges_blank_fields() {
        let mut create = film_payload("Matrix");
        create.description = Some("neo".to_owned());
        create.release_date = NaiveDate::from_ymd_opt(1999, 3, 31);
        let mut old = prepare_film_create(create).unwrap();
        old.id = 1;

        let patch = FilmPayload {
            id: Some(1),
            name: Some("".to_owned()),
            ..FilmPayload::default()
        };
        let merged = prepare_film_update(patch, Some(&old)).unwrap();
        assert_eq!(merged.name, "Matrix");
        assert_eq!(merged.description.as_deref(), Some("neo"));
        assert_eq!(merged.release_date, old.release_date);
        assert_eq!(merged.duration, 100);

        // a present name replaces the stored one
        let patch = FilmPayload {
            id: Some(1),
            name: Some("Matrix Reloaded".to_owned()),
            ..FilmPayload::default()
        };
        let merged = prepare_film_update(patch, Some(&old)).unwrap();
        assert_eq!(merged.name, "Matrix Reloaded");
    }

    #[test]
    fn film_update_requires_id_and_existing_record() {
        assert!(matches!(
            prepare_film_update(FilmPayload::default(), None),
            Err(Error::Validation(_))
        ));
        let patch = FilmPayload {
            id: Some(7),
            ..FilmPayload::default()
        };
        assert!(matches!(
            prepare_film_update(patch, None),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn user_create_rules() {
        let user = prepare_user_create(user_payload("neo")).unwrap();
        assert_eq!(user.name, "neo"); // defaulted to login

        let named = prepare_user_create(UserPayload {
            name: Some("Thomas".to_owned()),
            ..user_payload("neo")
        })
        .unwrap();
        assert_eq!(named.name, "Thomas");

        let mut bad_email = user_payload("neo");
        bad_email.email = Some("not-an-email".to_owned());
        assert!(matches!(
            prepare_user_create(bad_email),
            Err(Error::Validation(_))
        ));
        let mut bad_login = user_payload("neo");
        bad_login.login = Some("two words".to_owned());
        assert!(matches!(
            prepare_user_create(bad_login),
            Err(Error::Validation(_))
        ));
        let mut future = user_payload("neo");
        future.birthday = Some(Utc::now().date_naive() + chrono::Duration::days(1));
        assert!(matches!(
            prepare_user_create(future),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn user_update_merges_blank_login_and_name() {
        let mut old = prepare_user_create(UserPayload {
            name: Some("Thomas".to_owned()),
            ..user_payload("neo")
        })
        .unwrap();
        old.id = 3;

        let patch = UserPayload {
            id: Some(3),
            email: Some("neo@matrix.org".to_owned()),
            login: Some("   ".to_owned()),
            birthday: NaiveDate::from_ymd_opt(1990, 1, 1),
            ..UserPayload::default()
        };
        let merged = prepare_user_update(patch, Some(&old)).unwrap();
        assert_eq!(merged.login, "neo");
        assert_eq!(merged.name, "Thomas");
        assert_eq!(merged.email, "neo@matrix.org");

        let patch = UserPayload {
            id: Some(3),
            name: Some("Anderson".to_owned()),
            ..user_payload("neo")
        };
        let merged = prepare_user_update(patch, Some(&old)).unwrap();
        assert_eq!(merged.name, "Anderson");
    }
}
