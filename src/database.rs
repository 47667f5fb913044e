//! Sled backend. Films and users are bincode-encoded records keyed by
//! id; likes and friend edges live in their own trees under composite
//! (from, to) keys so they can be mutated independently of their
//! subjects. Multi-step mutations (the friend-edge swap, cascading
//! deletes) run inside multi-tree transactions, and every mutation
//! additionally serializes behind a store-level write lock so that
//! check-then-act sequences from different workers cannot interleave.

use std::collections::HashSet;
use std::sync::Mutex;

use sled::transaction::{
    abort, ConflictableTransactionResult, TransactionError, Transactional,
};

use crate::error::Error;
use crate::guards;
use crate::model::{Film, FilmPayload, User, UserPayload};
use crate::storage::{FilmStore, FriendGraph, LikeLedger, Result, UserStore};

const FILMS: &[u8] = b"films";
const USERS: &[u8] = b"users";
const FILM_LIKES: &[u8] = b"film_likes";
const USER_FRIENDS: &[u8] = b"user_friends";
const META: &[u8] = b"meta";

const NEXT_FILM_ID: &[u8] = b"next_film_id";
const NEXT_USER_ID: &[u8] = b"next_user_id";

// Big-endian keys so byte order matches numeric order: scans and
// prefix scans come back in ascending-id order.
fn serialize_id(id: u64) -> [u8; 8] {
    id.to_be_bytes()
}

fn deserialize_id<V: AsRef<[u8]>>(id: V) -> u64 {
    u64::from_be_bytes(id.as_ref().try_into().unwrap())
}

fn edge_key(from: u64, to: u64) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&serialize_id(from));
    key[8..].copy_from_slice(&serialize_id(to));
    key
}

fn edge_target<V: AsRef<[u8]>>(key: V) -> u64 {
    deserialize_id(&key.as_ref()[8..])
}

fn unpack<T>(result: std::result::Result<T, TransactionError<Error>>) -> Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(TransactionError::Abort(err)) => Err(err),
        Err(TransactionError::Storage(err)) => Err(err.into()),
    }
}

fn film_not_found(id: u64) -> Error {
    Error::NotFound(format!("no film with id {}", id))
}

fn user_not_found(id: u64) -> Error {
    Error::NotFound(format!("no user with id {}", id))
}

pub struct SledStore {
    films: sled::Tree,
    users: sled::Tree,
    likes: sled::Tree,
    friends: sled::Tree,
    meta: sled::Tree,
    // taken by every mutation; reads stay lock-free
    write_lock: Mutex<()>,
}

impl SledStore {
    pub fn open(db: &sled::Db) -> Result<SledStore> {
        let store = SledStore {
            films: db.open_tree(FILMS)?,
            users: db.open_tree(USERS)?,
            likes: db.open_tree(FILM_LIKES)?,
            friends: db.open_tree(USER_FRIENDS)?,
            meta: db.open_tree(META)?,
            write_lock: Mutex::new(()),
        };
        store.seed_counter(NEXT_FILM_ID, &store.films)?;
        store.seed_counter(NEXT_USER_ID, &store.users)?;
        Ok(store)
    }

    /// First open against existing data starts the counter at max id + 1;
    /// afterwards it only ever moves forward, so deleted ids are never
    /// handed out again.
    fn seed_counter(&self, counter: &[u8], tree: &sled::Tree) -> Result<()> {
        if self.meta.get(counter)?.is_none() {
            let next = tree
                .last()?
                .map(|(key, _)| deserialize_id(key) + 1)
                .unwrap_or(1);
            self.meta.insert(counter, &serialize_id(next))?;
        }
        Ok(())
    }

    fn get_film(&self, id: u64) -> Result<Option<Film>> {
        Ok(self
            .films
            .get(serialize_id(id))?
            .map(|data| bincode::deserialize(&data).unwrap()))
    }

    fn get_user(&self, id: u64) -> Result<Option<User>> {
        Ok(self
            .users
            .get(serialize_id(id))?
            .map(|data| bincode::deserialize(&data).unwrap()))
    }

    /// Outgoing friend-edge targets of one user.
    fn friend_targets(&self, id: u64) -> Result<HashSet<u64>> {
        let mut targets = HashSet::new();
        for entry in self.friends.scan_prefix(serialize_id(id)) {
            let (key, _) = entry?;
            targets.insert(edge_target(key));
        }
        Ok(targets)
    }
}

impl FilmStore for SledStore {
    fn find_all(&self) -> Result<Vec<Film>> {
        let mut all = Vec::new();
        for entry in self.films.iter() {
            let (_, data) = entry?;
            all.push(bincode::deserialize(&data).unwrap());
        }
        Ok(all)
    }

    fn find_by_id(&self, id: u64) -> Result<Film> {
        self.get_film(id)?.ok_or_else(|| film_not_found(id))
    }

    fn create(&self, payload: FilmPayload) -> Result<Film> {
        let film = guards::prepare_film_create(payload)?;
        let _write = self.write_lock.lock().expect("poisoned write lock");
        unpack((&self.films, &self.meta).transaction(
            |(films, meta)| -> ConflictableTransactionResult<Film, Error> {
                let id = meta.get(NEXT_FILM_ID)?.map(deserialize_id).unwrap_or(1);
                meta.insert(NEXT_FILM_ID, &serialize_id(id + 1))?;
                let mut film = film.clone();
                film.id = id;
                films.insert(&serialize_id(id), bincode::serialize(&film).unwrap())?;
                Ok(film)
            },
        ))
    }

    fn update(&self, payload: FilmPayload) -> Result<Film> {
        let _write = self.write_lock.lock().expect("poisoned write lock");
        let old = match payload.id {
            Some(id) => self.get_film(id)?,
            None => None,
        };
        let film = guards::prepare_film_update(payload, old.as_ref())?;
        self.films
            .insert(serialize_id(film.id), bincode::serialize(&film).unwrap())?;
        Ok(film)
    }

    fn delete(&self, id: u64) -> Result<Film> {
        let _write = self.write_lock.lock().expect("poisoned write lock");
        let film = self.get_film(id)?.ok_or_else(|| film_not_found(id))?;
        let mut like_keys = Vec::new();
        for entry in self.likes.scan_prefix(serialize_id(id)) {
            let (key, _) = entry?;
            like_keys.push(key);
        }
        unpack((&self.films, &self.likes).transaction(
            |(films, likes)| -> ConflictableTransactionResult<(), Error> {
                films.remove(&serialize_id(id))?;
                for key in &like_keys {
                    likes.remove(key.clone())?;
                }
                Ok(())
            },
        ))?;
        Ok(film)
    }
}

impl UserStore for SledStore {
    fn find_all(&self) -> Result<Vec<User>> {
        let mut all = Vec::new();
        for entry in self.users.iter() {
            let (_, data) = entry?;
            all.push(bincode::deserialize(&data).unwrap());
        }
        Ok(all)
    }

    fn find_by_id(&self, id: u64) -> Result<User> {
        self.get_user(id)?.ok_or_else(|| user_not_found(id))
    }

    fn create(&self, payload: UserPayload) -> Result<User> {
        let user = guards::prepare_user_create(payload)?;
        let _write = self.write_lock.lock().expect("poisoned write lock");
        unpack((&self.users, &self.meta).transaction(
            |(users, meta)| -> ConflictableTransactionResult<User, Error> {
                let id = meta.get(NEXT_USER_ID)?.map(deserialize_id).unwrap_or(1);
                meta.insert(NEXT_USER_ID, &serialize_id(id + 1))?;
                let mut user = user.clone();
                user.id = id;
                users.insert(&serialize_id(id), bincode::serialize(&user).unwrap())?;
                Ok(user)
            },
        ))
    }

    fn update(&self, payload: UserPayload) -> Result<User> {
        let _write = self.write_lock.lock().expect("poisoned write lock");
        let old = match payload.id {
            Some(id) => self.get_user(id)?,
            None => None,
        };
        let user = guards::prepare_user_update(payload, old.as_ref())?;
        self.users
            .insert(serialize_id(user.id), bincode::serialize(&user).unwrap())?;
        Ok(user)
    }

    fn delete(&self, id: u64) -> Result<User> {
        let _write = self.write_lock.lock().expect("poisoned write lock");
        let user = self.get_user(id)?.ok_or_else(|| user_not_found(id))?;

        // Collect the user's likes and both directions of their friend
        // edges, then drop everything in one transaction.
        let mut like_keys = Vec::new();
        for entry in self.likes.iter() {
            let (key, _) = entry?;
            if edge_target(&key) == id {
                like_keys.push(key);
            }
        }
        let mut friend_keys = Vec::new();
        for entry in self.friends.scan_prefix(serialize_id(id)) {
            let (key, _) = entry?;
            friend_keys.push(key);
        }
        for entry in self.friends.iter() {
            let (key, _) = entry?;
            if edge_target(&key) == id {
                friend_keys.push(key);
            }
        }

        unpack((&self.users, &self.likes, &self.friends).transaction(
            |(users, likes, friends)| -> ConflictableTransactionResult<(), Error> {
                users.remove(&serialize_id(id))?;
                for key in &like_keys {
                    likes.remove(key.clone())?;
                }
                for key in &friend_keys {
                    friends.remove(key.clone())?;
                }
                Ok(())
            },
        ))?;
        Ok(user)
    }

    fn exists(&self, id: u64) -> Result<()> {
        if self.users.get(serialize_id(id))?.is_some() {
            Ok(())
        } else {
            Err(user_not_found(id))
        }
    }
}

impl LikeLedger for SledStore {
    fn add_like(&self, film_id: u64, user_id: u64) -> Result<()> {
        let _write = self.write_lock.lock().expect("poisoned write lock");
        unpack((&self.films, &self.likes).transaction(
            |(films, likes)| -> ConflictableTransactionResult<(), Error> {
                if films.get(&serialize_id(film_id))?.is_none() {
                    return abort(film_not_found(film_id));
                }
                // re-inserting the same key leaves the set unchanged
                likes.insert(edge_key(film_id, user_id).to_vec(), b"".to_vec())?;
                Ok(())
            },
        ))
    }

    fn remove_like(&self, film_id: u64, user_id: u64) -> Result<()> {
        let _write = self.write_lock.lock().expect("poisoned write lock");
        if self.films.get(serialize_id(film_id))?.is_none() {
            return Err(film_not_found(film_id));
        }
        self.likes.remove(edge_key(film_id, user_id))?;
        Ok(())
    }

    fn like_count(&self, film_id: u64) -> Result<usize> {
        if self.films.get(serialize_id(film_id))?.is_none() {
            return Err(film_not_found(film_id));
        }
        let mut count = 0;
        for entry in self.likes.scan_prefix(serialize_id(film_id)) {
            entry?;
            count += 1;
        }
        Ok(count)
    }
}

impl FriendGraph for SledStore {
    fn add_friend(&self, id: u64, friend_id: u64) -> Result<()> {
        let _write = self.write_lock.lock().expect("poisoned write lock");
        unpack((&self.users, &self.friends).transaction(
            |(users, friends)| -> ConflictableTransactionResult<(), Error> {
                if users.get(&serialize_id(id))?.is_none() {
                    return abort(user_not_found(id));
                }
                if users.get(&serialize_id(friend_id))?.is_none() {
                    return abort(user_not_found(friend_id));
                }
                friends.insert(edge_key(id, friend_id).to_vec(), b"".to_vec())?;
                // only the most recently asserted direction survives;
                // for a self-edge this removes the key just inserted
                friends.remove(edge_key(friend_id, id).to_vec())?;
                Ok(())
            },
        ))
    }

    fn remove_friend(&self, id: u64, friend_id: u64) -> Result<Option<User>> {
        let _write = self.write_lock.lock().expect("poisoned write lock");
        self.exists(id)?;
        let friend = self
            .get_user(friend_id)?
            .ok_or_else(|| user_not_found(friend_id))?;
        let removed = self.friends.remove(edge_key(id, friend_id))?;
        Ok(removed.map(|_| friend))
    }

    fn friends(&self, id: u64) -> Result<Vec<User>> {
        self.exists(id)?;
        let mut result = Vec::new();
        // prefix scan comes back in ascending friend-id order
        for entry in self.friends.scan_prefix(serialize_id(id)) {
            let (key, _) = entry?;
            if let Some(user) = self.get_user(edge_target(key))? {
                result.push(user);
            }
        }
        Ok(result)
    }

    fn common_friends(&self, id: u64, other_id: u64) -> Result<Vec<User>> {
        self.exists(id)?;
        self.exists(other_id)?;
        let mine = self.friend_targets(id)?;
        let theirs = self.friend_targets(other_id)?;
        let mut common: Vec<u64> = mine.intersection(&theirs).copied().collect();
        common.sort_unstable();
        let mut result = Vec::new();
        for friend_id in common {
            if let Some(user) = self.get_user(friend_id)? {
                result.push(user);
            }
        }
        Ok(result)
    }
}
