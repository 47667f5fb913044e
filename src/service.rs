//! Service layer. Delegates to the storage traits and owns the
//! cross-entity call-site checks: a like is only recorded for an
//! existing user, and a popular-films request needs a positive count.

use std::sync::Arc;

use crate::error::Error;
use crate::model::{Film, FilmPayload, User, UserPayload};
use crate::ranking;
use crate::storage::{FilmStore, FriendGraph, LikeLedger, Result, UserStore};

pub struct FilmService {
    films: Arc<dyn FilmStore>,
    likes: Arc<dyn LikeLedger>,
    users: Arc<dyn UserStore>,
}

impl FilmService {
    pub fn new(
        films: Arc<dyn FilmStore>,
        likes: Arc<dyn LikeLedger>,
        users: Arc<dyn UserStore>,
    ) -> Self {
        FilmService {
            films,
            likes,
            users,
        }
    }

    pub fn find_all(&self) -> Result<Vec<Film>> {
        self.films.find_all()
    }

    pub fn find_by_id(&self, id: u64) -> Result<Film> {
        self.films.find_by_id(id)
    }

    pub fn create(&self, payload: FilmPayload) -> Result<Film> {
        self.films.create(payload)
    }

    pub fn update(&self, payload: FilmPayload) -> Result<Film> {
        self.films.update(payload)
    }

    pub fn delete(&self, id: u64) -> Result<Film> {
        self.films.delete(id)
    }

    pub fn find_popular(&self, count: usize) -> Result<Vec<Film>> {
        if count == 0 {
            return Err(Error::Validation("count must be positive".to_owned()));
        }
        ranking::find_popular(self.films.as_ref(), self.likes.as_ref(), count)
    }

    pub fn add_like(&self, film_id: u64, user_id: u64) -> Result<()> {
        self.users.exists(user_id)?;
        self.likes.add_like(film_id, user_id)
    }

    pub fn remove_like(&self, film_id: u64, user_id: u64) -> Result<()> {
        self.users.exists(user_id)?;
        self.likes.remove_like(film_id, user_id)
    }
}

pub struct UserService {
    users: Arc<dyn UserStore>,
    friends: Arc<dyn FriendGraph>,
}

impl UserService {
    pub fn new(users: Arc<dyn UserStore>, friends: Arc<dyn FriendGraph>) -> Self {
        UserService { users, friends }
    }

    pub fn find_all(&self) -> Result<Vec<User>> {
        self.users.find_all()
    }

    pub fn find_by_id(&self, id: u64) -> Result<User> {
        self.users.find_by_id(id)
    }

    pub fn create(&self, payload: UserPayload) -> Result<User> {
        self.users.create(payload)
    }

    pub fn update(&self, payload: UserPayload) -> Result<User> {
        self.users.update(payload)
    }

    pub fn delete(&self, id: u64) -> Result<User> {
        self.users.delete(id)
    }

    pub fn friends(&self, id: u64) -> Result<Vec<User>> {
        self.friends.friends(id)
    }

    pub fn common_friends(&self, id: u64, other_id: u64) -> Result<Vec<User>> {
        self.friends.common_friends(id, other_id)
    }

    pub fn add_friend(&self, id: u64, friend_id: u64) -> Result<()> {
        self.friends.add_friend(id, friend_id)
    }

    pub fn remove_friend(&self, id: u64, friend_id: u64) -> Result<Option<User>> {
        self.friends.remove_friend(id, friend_id)
    }
}

/// Wires both services over a single backend instance.
pub fn build<S>(store: Arc<S>) -> (FilmService, UserService)
where
    S: FilmStore + UserStore + LikeLedger + FriendGraph + 'static,
{
    let films = FilmService::new(store.clone(), store.clone(), store.clone());
    let users = UserService::new(store.clone(), store);
    (films, users)
}
