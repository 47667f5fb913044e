//! Capability traits over the entity collections. The ranking engine and
//! the service layer depend only on these, so the in-memory and sled
//! backends are interchangeable.

use crate::error::Error;
use crate::model::{Film, FilmPayload, User, UserPayload};

pub type Result<T> = std::result::Result<T, Error>;

pub trait FilmStore: Send + Sync {
    /// All films in ascending-id order.
    fn find_all(&self) -> Result<Vec<Film>>;
    fn find_by_id(&self, id: u64) -> Result<Film>;
    /// Assigns a fresh id (never reused within a run) and stores the film.
    fn create(&self, payload: FilmPayload) -> Result<Film>;
    fn update(&self, payload: FilmPayload) -> Result<Film>;
    /// Removes the film together with its like set, returning the removed
    /// record.
    fn delete(&self, id: u64) -> Result<Film>;
}

pub trait UserStore: Send + Sync {
    /// All users in ascending-id order.
    fn find_all(&self) -> Result<Vec<User>>;
    fn find_by_id(&self, id: u64) -> Result<User>;
    fn create(&self, payload: UserPayload) -> Result<User>;
    fn update(&self, payload: UserPayload) -> Result<User>;
    /// Removes the user together with their likes and friend edges in both
    /// directions, returning the removed record.
    fn delete(&self, id: u64) -> Result<User>;
    /// Fails with `NotFound` when no user has the given id.
    fn exists(&self, id: u64) -> Result<()>;
}

/// Per-film set of liking users.
pub trait LikeLedger: Send + Sync {
    /// Idempotent; fails with `NotFound` when the film is unknown.
    fn add_like(&self, film_id: u64, user_id: u64) -> Result<()>;
    /// Removing an absent like is a silent no-op; fails with `NotFound`
    /// when the film is unknown.
    fn remove_like(&self, film_id: u64, user_id: u64) -> Result<()>;
    fn like_count(&self, film_id: u64) -> Result<usize>;
}

/// Directed friend edges. At most one edge survives between any pair:
/// adding a→b removes a pre-existing b→a in the same atomic step.
pub trait FriendGraph: Send + Sync {
    fn add_friend(&self, id: u64, friend_id: u64) -> Result<()>;
    /// Removes only the edge id→friend_id. Returns the friend's record
    /// when an edge existed, `None` otherwise.
    fn remove_friend(&self, id: u64, friend_id: u64) -> Result<Option<User>>;
    /// Targets of the user's outgoing edges, ascending-id order.
    fn friends(&self, id: u64) -> Result<Vec<User>>;
    /// Intersection of both users' outgoing edge targets, ascending-id
    /// order. Symmetric in its arguments.
    fn common_friends(&self, id: u64, other_id: u64) -> Result<Vec<User>>;
}
