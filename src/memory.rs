//! In-memory backend. Each collection sits behind its own mutex; locks
//! are always taken in films, users, likes, friends order.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::error::Error;
use crate::guards;
use crate::model::{Film, FilmPayload, User, UserPayload};
use crate::storage::{FilmStore, FriendGraph, LikeLedger, Result, UserStore};

struct Table<T> {
    rows: HashMap<u64, T>,
    next_id: u64,
}

impl<T> Table<T> {
    fn new() -> Self {
        Table {
            rows: HashMap::new(),
            next_id: 1,
        }
    }

    /// Ids are monotonic within a run; deleting a row never frees its id.
    fn assign_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

pub struct MemoryStore {
    films: Mutex<Table<Film>>,
    users: Mutex<Table<User>>,
    likes: Mutex<HashMap<u64, HashSet<u64>>>,
    friends: Mutex<HashMap<u64, HashSet<u64>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            films: Mutex::new(Table::new()),
            users: Mutex::new(Table::new()),
            likes: Mutex::new(HashMap::new()),
            friends: Mutex::new(HashMap::new()),
        }
    }

    fn film_not_found(id: u64) -> Error {
        Error::NotFound(format!("no film with id {}", id))
    }

    fn user_not_found(id: u64) -> Error {
        Error::NotFound(format!("no user with id {}", id))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FilmStore for MemoryStore {
    fn find_all(&self) -> Result<Vec<Film>> {
        let films = self.films.lock().expect("poisoned films lock");
        let mut all: Vec<Film> = films.rows.values().cloned().collect();
        all.sort_by_key(|film| film.id);
        Ok(all)
    }

    fn find_by_id(&self, id: u64) -> Result<Film> {
        let films = self.films.lock().expect("poisoned films lock");
        films
            .rows
            .get(&id)
            .cloned()
            .ok_or_else(|| Self::film_not_found(id))
    }

    fn create(&self, payload: FilmPayload) -> Result<Film> {
        let mut film = guards::prepare_film_create(payload)?;
        let mut films = self.films.lock().expect("poisoned films lock");
        film.id = films.assign_id();
        films.rows.insert(film.id, film.clone());
        Ok(film)
    }

    fn update(&self, payload: FilmPayload) -> Result<Film> {
        let mut films = self.films.lock().expect("poisoned films lock");
        let old = payload.id.and_then(|id| films.rows.get(&id).cloned());
        let film = guards::prepare_film_update(payload, old.as_ref())?;
        films.rows.insert(film.id, film.clone());
        Ok(film)
    }

    fn delete(&self, id: u64) -> Result<Film> {
        let mut films = self.films.lock().expect("poisoned films lock");
        let film = films
            .rows
            .remove(&id)
            .ok_or_else(|| Self::film_not_found(id))?;
        let mut likes = self.likes.lock().expect("poisoned likes lock");
        likes.remove(&id);
        Ok(film)
    }
}

impl UserStore for MemoryStore {
    fn find_all(&self) -> Result<Vec<User>> {
        let users = self.users.lock().expect("poisoned users lock");
        let mut all: Vec<User> = users.rows.values().cloned().collect();
        all.sort_by_key(|user| user.id);
        Ok(all)
    }

    fn find_by_id(&self, id: u64) -> Result<User> {
        let users = self.users.lock().expect("poisoned users lock");
        users
            .rows
            .get(&id)
            .cloned()
            .ok_or_else(|| Self::user_not_found(id))
    }

    fn create(&self, payload: UserPayload) -> Result<User> {
        let mut user = guards::prepare_user_create(payload)?;
        let mut users = self.users.lock().expect("poisoned users lock");
        user.id = users.assign_id();
        users.rows.insert(user.id, user.clone());
        Ok(user)
    }

    fn update(&self, payload: UserPayload) -> Result<User> {
        let mut users = self.users.lock().expect("poisoned users lock");
        let old = payload.id.and_then(|id| users.rows.get(&id).cloned());
        let user = guards::prepare_user_update(payload, old.as_ref())?;
        users.rows.insert(user.id, user.clone());
        Ok(user)
    }

    fn delete(&self, id: u64) -> Result<User> {
        let mut users = self.users.lock().expect("poisoned users lock");
        let user = users
            .rows
            .remove(&id)
            .ok_or_else(|| Self::user_not_found(id))?;
        let mut likes = self.likes.lock().expect("poisoned likes lock");
        for set in likes.values_mut() {
            set.remove(&id);
        }
        let mut friends = self.friends.lock().expect("poisoned friends lock");
        friends.remove(&id);
        for set in friends.values_mut() {
            set.remove(&id);
        }
        Ok(user)
    }

    fn exists(&self, id: u64) -> Result<()> {
        let users = self.users.lock().expect("poisoned users lock");
        if users.rows.contains_key(&id) {
            Ok(())
        } else {
            Err(Self::user_not_found(id))
        }
    }
}

impl LikeLedger for MemoryStore {
    fn add_like(&self, film_id: u64, user_id: u64) -> Result<()> {
        let films = self.films.lock().expect("poisoned films lock");
        if !films.rows.contains_key(&film_id) {
            return Err(Self::film_not_found(film_id));
        }
        let mut likes = self.likes.lock().expect("poisoned likes lock");
        likes.entry(film_id).or_default().insert(user_id);
        Ok(())
    }

    fn remove_like(&self, film_id: u64, user_id: u64) -> Result<()> {
        let films = self.films.lock().expect("poisoned films lock");
        if !films.rows.contains_key(&film_id) {
            return Err(Self::film_not_found(film_id));
        }
        let mut likes = self.likes.lock().expect("poisoned likes lock");
        if let Some(set) = likes.get_mut(&film_id) {
            set.remove(&user_id);
        }
        Ok(())
    }

    fn like_count(&self, film_id: u64) -> Result<usize> {
        let films = self.films.lock().expect("poisoned films lock");
        if !films.rows.contains_key(&film_id) {
            return Err(Self::film_not_found(film_id));
        }
        let likes = self.likes.lock().expect("poisoned likes lock");
        Ok(likes.get(&film_id).map_or(0, HashSet::len))
    }
}

impl FriendGraph for MemoryStore {
    fn add_friend(&self, id: u64, friend_id: u64) -> Result<()> {
        {
            let users = self.users.lock().expect("poisoned users lock");
            if !users.rows.contains_key(&id) {
                return Err(Self::user_not_found(id));
            }
            if !users.rows.contains_key(&friend_id) {
                return Err(Self::user_not_found(friend_id));
            }
        }
        let mut friends = self.friends.lock().expect("poisoned friends lock");
        friends.entry(id).or_default().insert(friend_id);
        // Only the most recently asserted direction survives: a prior
        // friend_id→id edge is dropped. A self-edge cancels itself out.
        if let Some(reverse) = friends.get_mut(&friend_id) {
            reverse.remove(&id);
        }
        Ok(())
    }

    fn remove_friend(&self, id: u64, friend_id: u64) -> Result<Option<User>> {
        let friend = {
            let users = self.users.lock().expect("poisoned users lock");
            if !users.rows.contains_key(&id) {
                return Err(Self::user_not_found(id));
            }
            users
                .rows
                .get(&friend_id)
                .cloned()
                .ok_or_else(|| Self::user_not_found(friend_id))?
        };
        let mut friends = self.friends.lock().expect("poisoned friends lock");
        let removed = friends
            .get_mut(&id)
            .map_or(false, |set| set.remove(&friend_id));
        Ok(if removed { Some(friend) } else { None })
    }

    fn friends(&self, id: u64) -> Result<Vec<User>> {
        let users = self.users.lock().expect("poisoned users lock");
        if !users.rows.contains_key(&id) {
            return Err(Self::user_not_found(id));
        }
        let friends = self.friends.lock().expect("poisoned friends lock");
        let mut result: Vec<User> = friends
            .get(&id)
            .into_iter()
            .flatten()
            .filter_map(|friend_id| users.rows.get(friend_id).cloned())
            .collect();
        result.sort_by_key(|user| user.id);
        Ok(result)
    }

    fn common_friends(&self, id: u64, other_id: u64) -> Result<Vec<User>> {
        let users = self.users.lock().expect("poisoned users lock");
        if !users.rows.contains_key(&id) {
            return Err(Self::user_not_found(id));
        }
        if !users.rows.contains_key(&other_id) {
            return Err(Self::user_not_found(other_id));
        }
        let friends = self.friends.lock().expect("poisoned friends lock");
        let empty = HashSet::new();
        let mine = friends.get(&id).unwrap_or(&empty);
        let theirs = friends.get(&other_id).unwrap_or(&empty);
        let mut result: Vec<User> = mine
            .intersection(theirs)
            .filter_map(|friend_id| users.rows.get(friend_id).cloned())
            .collect();
        result.sort_by_key(|user| user.id);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn film(name: &str) -> FilmPayload {
        FilmPayload {
            name: Some(name.to_owned()),
            duration: Some(100),
            release_date: NaiveDate::from_ymd_opt(1998, 6, 23),
            ..FilmPayload::default()
        }
    }

    fn user(login: &str) -> UserPayload {
        UserPayload {
            email: Some(format!("{}@example.com", login)),
            login: Some(login.to_owned()),
            birthday: NaiveDate::from_ymd_opt(1990, 1, 1),
            ..UserPayload::default()
        }
    }

    #[test]
    fn ids_are_monotonic_and_never_reused() {
        let store = MemoryStore::new();
        let first = FilmStore::create(&store, film("one")).unwrap();
        let second = FilmStore::create(&store, film("two")).unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        FilmStore::delete(&store, second.id).unwrap();
        let third = FilmStore::create(&store, film("three")).unwrap();
        assert_eq!(third.id, 3);
    }

    #[test]
    fn deleted_film_fails_lookups() {
        let store = MemoryStore::new();
        let created = FilmStore::create(&store, film("gone")).unwrap();
        let removed = FilmStore::delete(&store, created.id).unwrap();
        assert_eq!(removed.name, "gone");
        assert!(matches!(
            FilmStore::find_by_id(&store, created.id),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            FilmStore::delete(&store, created.id),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn update_merges_and_checks_existence() {
        let store = MemoryStore::new();
        let created = FilmStore::create(&store, film("Matrix")).unwrap();
        let patch = FilmPayload {
            id: Some(created.id),
            name: Some(" ".to_owned()),
            duration: Some(136),
            ..FilmPayload::default()
        };
        let updated = FilmStore::update(&store, patch).unwrap();
        assert_eq!(updated.name, "Matrix");
        assert_eq!(updated.duration, 136);

        let missing = FilmPayload {
            id: Some(42),
            ..FilmPayload::default()
        };
        assert!(matches!(
            FilmStore::update(&store, missing),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn likes_are_idempotent_and_removable() {
        let store = MemoryStore::new();
        let matrix = FilmStore::create(&store, film("Matrix")).unwrap();
        store.add_like(matrix.id, 7).unwrap();
        store.add_like(matrix.id, 7).unwrap();
        assert_eq!(store.like_count(matrix.id).unwrap(), 1);
        store.remove_like(matrix.id, 7).unwrap();
        assert_eq!(store.like_count(matrix.id).unwrap(), 0);
        // removing an absent like is a no-op
        store.remove_like(matrix.id, 7).unwrap();
        assert_eq!(store.like_count(matrix.id).unwrap(), 0);
    }

    #[test]
    fn likes_require_an_existing_film() {
        let store = MemoryStore::new();
        assert!(matches!(store.add_like(1, 7), Err(Error::NotFound(_))));
        assert!(matches!(store.remove_like(1, 7), Err(Error::NotFound(_))));
        assert!(matches!(store.like_count(1), Err(Error::NotFound(_))));
    }

    #[test]
    fn friendship_is_one_directional() {
        let store = MemoryStore::new();
        let a = UserStore::create(&store, user("a")).unwrap();
        let b = UserStore::create(&store, user("b")).unwrap();
        store.add_friend(a.id, b.id).unwrap();
        assert_eq!(store.friends(a.id).unwrap(), vec![b.clone()]);
        assert!(store.friends(b.id).unwrap().is_empty());
    }

    #[test]
    fn add_friend_collapses_the_reverse_edge() {
        let store = MemoryStore::new();
        let a = UserStore::create(&store, user("a")).unwrap();
        let b = UserStore::create(&store, user("b")).unwrap();
        store.add_friend(b.id, a.id).unwrap();
        store.add_friend(a.id, b.id).unwrap();
        // only the most recent direction survives
        assert_eq!(store.friends(a.id).unwrap(), vec![b.clone()]);
        assert!(store.friends(b.id).unwrap().is_empty());
    }

    #[test]
    fn self_friendship_is_a_no_op() {
        let store = MemoryStore::new();
        let a = UserStore::create(&store, user("a")).unwrap();
        store.add_friend(a.id, a.id).unwrap();
        assert!(store.friends(a.id).unwrap().is_empty());
    }

    #[test]
    fn remove_friend_keeps_the_reverse_edge() {
        let store = MemoryStore::new();
        let a = UserStore::create(&store, user("a")).unwrap();
        let b = UserStore::create(&store, user("b")).unwrap();
        store.add_friend(a.id, b.id).unwrap();
        let removed = store.remove_friend(a.id, b.id).unwrap();
        assert_eq!(removed, Some(b.clone()));
        // no edge left in either direction now
        assert!(store.friends(a.id).unwrap().is_empty());
        // removing again reports that no edge existed
        assert_eq!(store.remove_friend(a.id, b.id).unwrap(), None);
    }

    #[test]
    fn common_friends_is_symmetric() {
        let store = MemoryStore::new();
        let a = UserStore::create(&store, user("a")).unwrap();
        let b = UserStore::create(&store, user("b")).unwrap();
        let c = UserStore::create(&store, user("c")).unwrap();
        store.add_friend(a.id, c.id).unwrap();
        store.add_friend(b.id, c.id).unwrap();
        let ab = store.common_friends(a.id, b.id).unwrap();
        let ba = store.common_friends(b.id, a.id).unwrap();
        assert_eq!(ab, vec![c.clone()]);
        assert_eq!(ab, ba);
    }

    #[test]
    fn friend_operations_require_existing_users() {
        let store = MemoryStore::new();
        let a = UserStore::create(&store, user("a")).unwrap();
        assert!(matches!(
            store.add_friend(a.id, 42),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            store.remove_friend(42, a.id),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(store.friends(42), Err(Error::NotFound(_))));
        assert!(matches!(
            store.common_friends(a.id, 42),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn deleting_a_user_drops_their_edges_and_likes() {
        let store = MemoryStore::new();
        let matrix = FilmStore::create(&store, film("Matrix")).unwrap();
        let a = UserStore::create(&store, user("a")).unwrap();
        let b = UserStore::create(&store, user("b")).unwrap();
        store.add_like(matrix.id, b.id).unwrap();
        store.add_friend(a.id, b.id).unwrap();
        UserStore::delete(&store, b.id).unwrap();
        assert_eq!(store.like_count(matrix.id).unwrap(), 0);
        assert!(store.friends(a.id).unwrap().is_empty());
        assert!(matches!(
            UserStore::find_by_id(&store, b.id),
            Err(Error::NotFound(_))
        ));
    }
}
