//! HTTP handlers, one per logical operation. Errors bubble up as
//! `Error` and are rendered by its `ResponseError` impl.

use actix_web::{web, HttpResponse};
use log::info;
use serde::Deserialize;

use crate::dictionary;
use crate::error::Error;
use crate::model::{FilmPayload, UserPayload};
use crate::service::{FilmService, UserService};

type Films = web::Data<FilmService>;
type Users = web::Data<UserService>;

pub fn configure(cfg: &mut web::ServiceConfig) {
    // malformed bodies get the same `{"error": ...}` shape as our own
    // validation failures instead of actix's plain-text 400
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        Error::Validation(format!("malformed request body: {}", err)).into()
    }))
    .route("/films", web::get().to(list_films))
        .route("/films", web::post().to(create_film))
        .route("/films", web::put().to(update_film))
        .route("/films/popular", web::get().to(popular_films))
        .route("/films/{id}", web::get().to(get_film))
        .route("/films/{id}", web::delete().to(delete_film))
        .route("/films/{id}/like/{user_id}", web::put().to(add_like))
        .route("/films/{id}/like/{user_id}", web::delete().to(remove_like))
        .route("/users", web::get().to(list_users))
        .route("/users", web::post().to(create_user))
        .route("/users", web::put().to(update_user))
        .route("/users/{id}", web::get().to(get_user))
        .route("/users/{id}", web::delete().to(delete_user))
        .route("/users/{id}/friends", web::get().to(list_friends))
        .route(
            "/users/{id}/friends/common/{other_id}",
            web::get().to(common_friends),
        )
        .route("/users/{id}/friends/{friend_id}", web::put().to(add_friend))
        .route(
            "/users/{id}/friends/{friend_id}",
            web::delete().to(remove_friend),
        )
        .route("/genres", web::get().to(list_genres))
        .route("/genres/{id}", web::get().to(get_genre))
        .route("/mpa", web::get().to(list_mpa))
        .route("/mpa/{id}", web::get().to(get_mpa));
}

async fn list_films(films: Films) -> Result<HttpResponse, Error> {
    Ok(HttpResponse::Ok().json(films.find_all()?))
}

async fn get_film(films: Films, path: web::Path<u64>) -> Result<HttpResponse, Error> {
    Ok(HttpResponse::Ok().json(films.find_by_id(path.into_inner())?))
}

async fn create_film(
    films: Films,
    payload: web::Json<FilmPayload>,
) -> Result<HttpResponse, Error> {
    let film = films.create(payload.into_inner())?;
    info!("created film {} with id {}", film.name, film.id);
    Ok(HttpResponse::Ok().json(film))
}

async fn update_film(
    films: Films,
    payload: web::Json<FilmPayload>,
) -> Result<HttpResponse, Error> {
    let film = films.update(payload.into_inner())?;
    info!("updated film with id {}", film.id);
    Ok(HttpResponse::Ok().json(film))
}

async fn delete_film(films: Films, path: web::Path<u64>) -> Result<HttpResponse, Error> {
    let film = films.delete(path.into_inner())?;
    info!("deleted film with id {}", film.id);
    Ok(HttpResponse::Ok().json(film))
}

#[derive(Deserialize)]
struct PopularQuery {
    count: Option<usize>,
}

async fn popular_films(
    films: Films,
    query: web::Query<PopularQuery>,
) -> Result<HttpResponse, Error> {
    Ok(HttpResponse::Ok().json(films.find_popular(query.count.unwrap_or(10))?))
}

async fn add_like(films: Films, path: web::Path<(u64, u64)>) -> Result<HttpResponse, Error> {
    let (film_id, user_id) = path.into_inner();
    films.add_like(film_id, user_id)?;
    info!("user {} liked film {}", user_id, film_id);
    Ok(HttpResponse::Ok().finish())
}

async fn remove_like(films: Films, path: web::Path<(u64, u64)>) -> Result<HttpResponse, Error> {
    let (film_id, user_id) = path.into_inner();
    films.remove_like(film_id, user_id)?;
    info!("user {} unliked film {}", user_id, film_id);
    Ok(HttpResponse::Ok().json(user_id))
}

async fn list_users(users: Users) -> Result<HttpResponse, Error> {
    Ok(HttpResponse::Ok().json(users.find_all()?))
}

async fn get_user(users: Users, path: web::Path<u64>) -> Result<HttpResponse, Error> {
    Ok(HttpResponse::Ok().json(users.find_by_id(path.into_inner())?))
}

async fn create_user(
    users: Users,
    payload: web::Json<UserPayload>,
) -> Result<HttpResponse, Error> {
    let user = users.create(payload.into_inner())?;
    info!("created user {} with id {}", user.login, user.id);
    Ok(HttpResponse::Ok().json(user))
}

async fn update_user(
    users: Users,
    payload: web::Json<UserPayload>,
) -> Result<HttpResponse, Error> {
    let user = users.update(payload.into_inner())?;
    info!("updated user with id {}", user.id);
    Ok(HttpResponse::Ok().json(user))
}

async fn delete_user(users: Users, path: web::Path<u64>) -> Result<HttpResponse, Error> {
    let user = users.delete(path.into_inner())?;
    info!("deleted user with id {}", user.id);
    Ok(HttpResponse::Ok().json(user))
}

async fn list_friends(users: Users, path: web::Path<u64>) -> Result<HttpResponse, Error> {
    Ok(HttpResponse::Ok().json(users.friends(path.into_inner())?))
}

async fn common_friends(
    users: Users,
    path: web::Path<(u64, u64)>,
) -> Result<HttpResponse, Error> {
    let (id, other_id) = path.into_inner();
    Ok(HttpResponse::Ok().json(users.common_friends(id, other_id)?))
}

async fn add_friend(users: Users, path: web::Path<(u64, u64)>) -> Result<HttpResponse, Error> {
    let (id, friend_id) = path.into_inner();
    users.add_friend(id, friend_id)?;
    info!("user {} added user {} as a friend", id, friend_id);
    Ok(HttpResponse::Ok().finish())
}

async fn remove_friend(
    users: Users,
    path: web::Path<(u64, u64)>,
) -> Result<HttpResponse, Error> {
    let (id, friend_id) = path.into_inner();
    let removed = users.remove_friend(id, friend_id)?;
    info!("user {} removed user {} from friends", id, friend_id);
    Ok(HttpResponse::Ok().json(removed))
}

async fn list_genres() -> Result<HttpResponse, Error> {
    Ok(HttpResponse::Ok().json(dictionary::all_genres()))
}

async fn get_genre(path: web::Path<u32>) -> Result<HttpResponse, Error> {
    let id = path.into_inner();
    let genre = dictionary::genre_by_id(id)
        .ok_or_else(|| Error::NotFound(format!("no genre with id {}", id)))?;
    Ok(HttpResponse::Ok().json(genre))
}

async fn list_mpa() -> Result<HttpResponse, Error> {
    Ok(HttpResponse::Ok().json(dictionary::all_mpa()))
}

async fn get_mpa(path: web::Path<u32>) -> Result<HttpResponse, Error> {
    let id = path.into_inner();
    let mpa = dictionary::mpa_by_id(id)
        .ok_or_else(|| Error::NotFound(format!("no MPA rating with id {}", id)))?;
    Ok(HttpResponse::Ok().json(mpa))
}
