//! The friendship ledger: legal transitions over the edge store.
//!
//! ```text
//!  (none) --send_request--> pending --accept_request--> accepted
//!  pending  --cancel_request--> (none)
//!  accepted --remove_friend-->  (none)
//! ```
//!
//! Every operation takes the acting user explicitly and issues at most one
//! mutating store call, after all validation has passed.

use crate::edge::{Edge, EdgeStatus, NewEdge};
use crate::error::LedgerError;
use crate::query::{EdgePatch, EdgePredicate, ProfileQuery};
use crate::store::{EdgeStore, ProfileDirectory};
use crate::user::{PublicProfile, UserId};

#[derive(Debug, Clone)]
pub struct FriendshipLedger<S> {
    store: S,
}

impl<S> FriendshipLedger<S>
where
    S: EdgeStore + ProfileDirectory,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Identifiers of every accepted friend of `user`, in store order.
    pub fn friend_ids(&self, user: &UserId) -> Result<Vec<UserId>, LedgerError> {
        let user = acting(user)?;
        let edges = self
            .store
            .find(&EdgePredicate::involving(user).with_status(EdgeStatus::Accepted))?;
        Ok(edges
            .iter()
            .filter_map(|edge| edge.other_party(user).cloned())
            .collect())
    }

    /// Public profiles of every accepted friend of `user`.
    pub fn list_friends(&self, user: &UserId) -> Result<Vec<PublicProfile>, LedgerError> {
        let ids = self.friend_ids(user)?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let expected = ids.len();
        let profiles = self.store.profiles(&ProfileQuery::ids(ids))?;
        if profiles.len() < expected {
            log::debug!(
                "{} of {expected} friends of {user} have no profile",
                expected - profiles.len()
            );
        }
        Ok(profiles)
    }

    /// Accepted friends of `user` whose name or email contains `query`.
    pub fn search_friends(
        &self,
        user: &UserId,
        query: Option<&str>,
    ) -> Result<Vec<PublicProfile>, LedgerError> {
        let needle = match query.map(str::trim) {
            Some(needle) if !needle.is_empty() => needle,
            _ => {
                log::debug!("rejected search by {user}: empty query");
                return Err(LedgerError::InvalidArgument(
                    "search query is required".to_string(),
                ));
            }
        };

        let ids = self.friend_ids(user)?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let filter = ProfileQuery::ids(ids)
            .containing(needle)
            .map_err(|e| LedgerError::InvalidArgument(format!("unusable search query: {e}")))?;
        Ok(self.store.profiles(&filter)?)
    }

    /// Open a pending request from `sender` to `receiver`.
    pub fn send_request(
        &self,
        sender: &UserId,
        receiver: Option<&UserId>,
    ) -> Result<Edge, LedgerError> {
        let sender = acting(sender)?;
        let receiver = required(receiver, "receiver id is required")?;
        if sender == receiver {
            log::debug!("rejected self request by {sender}");
            return Err(LedgerError::InvalidArgument(
                "you cannot send a friend request to yourself".to_string(),
            ));
        }

        if let Some(existing) = self.store.find_one(&EdgePredicate::between(sender, receiver))? {
            log::debug!(
                "rejected request {sender} -> {receiver}: edge {} is {}",
                existing.id,
                existing.status
            );
            return Err(LedgerError::Conflict {
                existing: existing.status,
            });
        }

        // The store re-checks the pair atomically; a lost race surfaces as
        // Conflict through `From<StoreError>`.
        let edge = self
            .store
            .create(NewEdge::pending(sender.clone(), receiver.clone()))?;
        log::info!("friend request {} opened: {sender} -> {receiver}", edge.id);
        Ok(edge)
    }

    /// Withdraw or decline a pending request in either orientation.
    pub fn cancel_request(
        &self,
        sender: &UserId,
        receiver: Option<&UserId>,
    ) -> Result<Edge, LedgerError> {
        let sender = acting(sender)?;
        let not_found =
            || LedgerError::NotFound("no pending friend request found to cancel".to_string());
        let Some(receiver) = receiver.filter(|id| !id.is_blank()) else {
            return Err(not_found());
        };

        let removed = self.store.find_one_and_delete(
            &EdgePredicate::between(sender, receiver).with_status(EdgeStatus::Pending),
        )?;
        match removed {
            Some(edge) => {
                log::info!("friend request {} canceled by {sender}", edge.id);
                Ok(edge)
            }
            None => Err(not_found()),
        }
    }

    /// Accept a request that `sender` sent to `receiver`.
    ///
    /// Directional: a request the acting user sent themself never matches.
    pub fn accept_request(
        &self,
        receiver: &UserId,
        sender: Option<&UserId>,
    ) -> Result<Edge, LedgerError> {
        let receiver = acting(receiver)?;
        let sender = required(sender, "sender id is required")?;

        let updated = self.store.find_one_and_update(
            &EdgePredicate::exact(sender, receiver).with_status(EdgeStatus::Pending),
            EdgePatch::status(EdgeStatus::Accepted),
        )?;
        match updated {
            Some(edge) => {
                log::info!("friend request {} accepted: {sender} <-> {receiver}", edge.id);
                Ok(edge)
            }
            None => Err(LedgerError::NotFound(
                "no pending friend request found from this user".to_string(),
            )),
        }
    }

    /// End an accepted friendship from either side.
    pub fn remove_friend(
        &self,
        user: &UserId,
        friend: Option<&UserId>,
    ) -> Result<Edge, LedgerError> {
        let user = acting(user)?;
        let friend = required(friend, "friend id is required")?;

        let removed = self.store.find_one_and_delete(
            &EdgePredicate::between(user, friend).with_status(EdgeStatus::Accepted),
        )?;
        match removed {
            Some(edge) => {
                log::info!("friendship {} removed by {user}", edge.id);
                Ok(edge)
            }
            None => Err(LedgerError::NotFound(
                "no friendship found to remove".to_string(),
            )),
        }
    }

    /// Status of the edge between `user` and `friend`, any orientation.
    pub fn friendship_status(
        &self,
        user: &UserId,
        friend: Option<&UserId>,
    ) -> Result<EdgeStatus, LedgerError> {
        let user = acting(user)?;
        let friend = required(friend, "friend id is required")?;

        self.store
            .find_one(&EdgePredicate::between(user, friend))?
            .map(|edge| edge.status)
            .ok_or_else(|| LedgerError::NotFound("no friendship found".to_string()))
    }
}

fn acting(user: &UserId) -> Result<&UserId, LedgerError> {
    if user.is_blank() {
        return Err(LedgerError::InvalidArgument(
            "acting user id is required".to_string(),
        ));
    }
    Ok(user)
}

fn required<'a>(id: Option<&'a UserId>, message: &str) -> Result<&'a UserId, LedgerError> {
    id.filter(|id| !id.is_blank())
        .ok_or_else(|| LedgerError::InvalidArgument(message.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::SharedStore;
    use crate::store::StoreError;
    use crate::user::UserProfile;

    fn id(raw: &str) -> UserId {
        UserId::new(raw)
    }

    fn ledger() -> FriendshipLedger<SharedStore> {
        let store = SharedStore::default();
        for (user, name, email) in [
            ("u-a", "Amy March", "amy@example.com"),
            ("u-b", "Jo March", "writer@example.com"),
            ("u-c", "Laurie Laurence", "JOLLY@example.com"),
            ("u-d", "Meg March", "meg@example.com"),
        ] {
            let mut profile = UserProfile::new(user, name, email);
            profile.password = format!("hash-{user}");
            profile.refresh_token = Some(format!("refresh-{user}"));
            store
                .upsert_profile(profile)
                .expect("profile seed should succeed");
        }
        FriendshipLedger::new(store)
    }

    fn befriend(ledger: &FriendshipLedger<SharedStore>, sender: &str, receiver: &str) {
        ledger
            .send_request(&id(sender), Some(&id(receiver)))
            .expect("request should open");
        ledger
            .accept_request(&id(receiver), Some(&id(sender)))
            .expect("request should be accepted");
    }

    fn ids_of(profiles: &[PublicProfile]) -> Vec<String> {
        let mut ids: Vec<String> = profiles.iter().map(|p| p.id.to_string()).collect();
        ids.sort();
        ids
    }

    #[test]
    fn send_request_creates_pending_edge() {
        let ledger = ledger();
        let edge = ledger
            .send_request(&id("u-a"), Some(&id("u-b")))
            .expect("request should open");
        assert_eq!(edge.sender, id("u-a"));
        assert_eq!(edge.receiver, id("u-b"));
        assert_eq!(edge.status, EdgeStatus::Pending);
    }

    #[test]
    fn duplicate_requests_conflict_in_both_orientations() {
        let ledger = ledger();
        ledger
            .send_request(&id("u-a"), Some(&id("u-b")))
            .expect("request should open");

        for (sender, receiver) in [("u-a", "u-b"), ("u-b", "u-a")] {
            let err = ledger
                .send_request(&id(sender), Some(&id(receiver)))
                .expect_err("second request must conflict");
            assert!(matches!(
                err,
                LedgerError::Conflict {
                    existing: EdgeStatus::Pending
                }
            ));
        }
    }

    #[test]
    fn conflict_message_surfaces_accepted_status() {
        let ledger = ledger();
        befriend(&ledger, "u-a", "u-b");
        let err = ledger
            .send_request(&id("u-b"), Some(&id("u-a")))
            .expect_err("friends cannot re-request");
        assert_eq!(
            err.to_string(),
            "friend request already exists with status: accepted"
        );
    }

    #[test]
    fn self_request_is_invalid() {
        let ledger = ledger();
        let err = ledger
            .send_request(&id("u-a"), Some(&id("u-a")))
            .expect_err("self request must fail");
        assert!(matches!(err, LedgerError::InvalidArgument(_)));
    }

    #[test]
    fn missing_counterparts_are_invalid() {
        let ledger = ledger();
        let blank = id("  ");
        assert!(matches!(
            ledger.send_request(&id("u-a"), None),
            Err(LedgerError::InvalidArgument(_))
        ));
        assert!(matches!(
            ledger.send_request(&id("u-a"), Some(&blank)),
            Err(LedgerError::InvalidArgument(_))
        ));
        assert!(matches!(
            ledger.accept_request(&id("u-a"), None),
            Err(LedgerError::InvalidArgument(_))
        ));
        assert!(matches!(
            ledger.remove_friend(&id("u-a"), None),
            Err(LedgerError::InvalidArgument(_))
        ));
        assert!(matches!(
            ledger.friendship_status(&id("u-a"), None),
            Err(LedgerError::InvalidArgument(_))
        ));
    }

    #[test]
    fn accepted_status_is_visible_from_both_sides() {
        let ledger = ledger();
        befriend(&ledger, "u-a", "u-b");
        for (user, friend) in [("u-a", "u-b"), ("u-b", "u-a")] {
            let status = ledger
                .friendship_status(&id(user), Some(&id(friend)))
                .expect("status should resolve");
            assert_eq!(status, EdgeStatus::Accepted);
        }
    }

    #[test]
    fn sender_cannot_accept_own_request() {
        let ledger = ledger();
        ledger
            .send_request(&id("u-a"), Some(&id("u-b")))
            .expect("request should open");
        let err = ledger
            .accept_request(&id("u-a"), Some(&id("u-b")))
            .expect_err("wrong direction must fail");
        assert!(matches!(err, LedgerError::NotFound(_)));
        assert_eq!(
            ledger
                .friendship_status(&id("u-a"), Some(&id("u-b")))
                .expect("edge should remain"),
            EdgeStatus::Pending
        );
    }

    #[test]
    fn accepting_twice_is_not_found() {
        let ledger = ledger();
        befriend(&ledger, "u-a", "u-b");
        let err = ledger
            .accept_request(&id("u-b"), Some(&id("u-a")))
            .expect_err("already accepted must fail");
        assert!(matches!(err, LedgerError::NotFound(_)));
    }

    #[test]
    fn cancel_clears_pair_for_new_request() {
        let ledger = ledger();
        ledger
            .send_request(&id("u-a"), Some(&id("u-b")))
            .expect("request should open");
        ledger
            .cancel_request(&id("u-a"), Some(&id("u-b")))
            .expect("cancel should succeed");

        let err = ledger
            .friendship_status(&id("u-a"), Some(&id("u-b")))
            .expect_err("edge should be gone");
        assert!(matches!(err, LedgerError::NotFound(_)));

        ledger
            .send_request(&id("u-a"), Some(&id("u-b")))
            .expect("pair should accept a fresh request");
    }

    #[test]
    fn receiver_may_cancel_incoming_request() {
        let ledger = ledger();
        ledger
            .send_request(&id("u-a"), Some(&id("u-b")))
            .expect("request should open");
        ledger
            .cancel_request(&id("u-b"), Some(&id("u-a")))
            .expect("either orientation should cancel");
    }

    #[test]
    fn cancel_leaves_accepted_edges_alone() {
        let ledger = ledger();
        befriend(&ledger, "u-a", "u-b");
        let err = ledger
            .cancel_request(&id("u-a"), Some(&id("u-b")))
            .expect_err("accepted edge is not cancelable");
        assert!(matches!(err, LedgerError::NotFound(_)));
        assert!(matches!(
            ledger.cancel_request(&id("u-a"), None),
            Err(LedgerError::NotFound(_))
        ));
        assert_eq!(
            ledger
                .friendship_status(&id("u-b"), Some(&id("u-a")))
                .expect("friendship should survive"),
            EdgeStatus::Accepted
        );
    }

    #[test]
    fn remove_succeeds_once() {
        let ledger = ledger();
        befriend(&ledger, "u-a", "u-b");
        ledger
            .remove_friend(&id("u-b"), Some(&id("u-a")))
            .expect("either party may remove");
        let err = ledger
            .remove_friend(&id("u-a"), Some(&id("u-b")))
            .expect_err("second remove must fail");
        assert!(matches!(err, LedgerError::NotFound(_)));
    }

    #[test]
    fn remove_does_not_touch_pending_requests() {
        let ledger = ledger();
        ledger
            .send_request(&id("u-a"), Some(&id("u-b")))
            .expect("request should open");
        let err = ledger
            .remove_friend(&id("u-a"), Some(&id("u-b")))
            .expect_err("pending is not a friendship");
        assert!(matches!(err, LedgerError::NotFound(_)));
    }

    #[test]
    fn list_resolves_other_party_regardless_of_initiator() {
        let ledger = ledger();
        befriend(&ledger, "u-a", "u-b");
        befriend(&ledger, "u-c", "u-a");
        ledger
            .send_request(&id("u-a"), Some(&id("u-d")))
            .expect("pending request should open");

        let friends = ledger.list_friends(&id("u-a")).expect("list should succeed");
        assert_eq!(ids_of(&friends), vec!["u-b".to_string(), "u-c".to_string()]);

        let of_b = ledger.list_friends(&id("u-b")).expect("list should succeed");
        assert_eq!(ids_of(&of_b), vec!["u-a".to_string()]);
    }

    #[test]
    fn list_is_empty_without_friends() {
        let ledger = ledger();
        let friends = ledger.list_friends(&id("u-d")).expect("list should succeed");
        assert!(friends.is_empty());
    }

    #[test]
    fn search_requires_non_blank_query() {
        let ledger = ledger();
        for query in [None, Some(""), Some("   ")] {
            let err = ledger
                .search_friends(&id("u-a"), query)
                .expect_err("blank query must fail");
            assert!(matches!(err, LedgerError::InvalidArgument(_)));
        }
    }

    #[test]
    fn search_matches_name_or_email_among_friends_only() {
        let ledger = ledger();
        befriend(&ledger, "u-a", "u-b");
        befriend(&ledger, "u-c", "u-a");
        // u-d is not a friend of u-a; must never show up.
        befriend(&ledger, "u-b", "u-d");

        let hits = ledger
            .search_friends(&id("u-a"), Some("jo"))
            .expect("search should succeed");
        assert_eq!(ids_of(&hits), vec!["u-b".to_string(), "u-c".to_string()]);

        let hits = ledger
            .search_friends(&id("u-a"), Some("WRITER@"))
            .expect("search should succeed");
        assert_eq!(ids_of(&hits), vec!["u-b".to_string()]);

        let hits = ledger
            .search_friends(&id("u-a"), Some("meg"))
            .expect("search should succeed");
        assert!(hits.is_empty());
    }

    #[test]
    fn search_results_carry_no_credentials() {
        let ledger = ledger();
        befriend(&ledger, "u-a", "u-b");
        let hits = ledger
            .search_friends(&id("u-a"), Some("jo"))
            .expect("search should succeed");
        let value = serde_json::to_value(&hits).expect("profiles should serialize");
        let raw = value.to_string();
        assert!(!raw.contains("hash-u-b"));
        assert!(!raw.contains("refresh-u-b"));
    }

    #[test]
    fn store_conflict_from_lost_race_maps_to_conflict() {
        let err = LedgerError::from(StoreError::DuplicatePair {
            existing: EdgeStatus::Pending,
        });
        assert!(matches!(
            err,
            LedgerError::Conflict {
                existing: EdgeStatus::Pending
            }
        ));
        assert!(matches!(
            LedgerError::from(StoreError::Poisoned),
            LedgerError::StoreFailure(_)
        ));
    }

    #[test]
    fn concurrent_opposite_requests_leave_one_edge() {
        use std::sync::{Arc, Barrier};
        use std::thread;

        let ledger = Arc::new(ledger());
        let barrier = Arc::new(Barrier::new(2));
        let handles: Vec<_> = [("u-a", "u-b"), ("u-b", "u-a")]
            .into_iter()
            .map(|(sender, receiver)| {
                let ledger = Arc::clone(&ledger);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    ledger.send_request(&id(sender), Some(&id(receiver)))
                })
            })
            .collect();

        let outcomes: Vec<_> = handles
            .into_iter()
            .map(|handle| handle.join().expect("worker should join"))
            .collect();
        let wins = outcomes.iter().filter(|outcome| outcome.is_ok()).count();
        assert_eq!(wins, 1);
        assert!(outcomes.iter().any(|outcome| matches!(
            outcome,
            Err(LedgerError::Conflict { .. })
        )));
        assert_eq!(
            ledger
                .store()
                .find(&EdgePredicate::between(&id("u-a"), &id("u-b")))
                .expect("find should succeed")
                .len(),
            1
        );
    }
}
