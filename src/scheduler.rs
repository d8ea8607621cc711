use std::collections::BTreeMap;

use crate::clock::{Clock, Timestamp, MS_PER_DAY};
use crate::error::{Result, StorageError};
use crate::models::{
    Card, CardId, Rating, ReviewRecord, ReviewStats, DEFAULT_EASE_FACTOR, DEFAULT_INTERVAL,
    MIN_EASE_FACTOR,
};
use crate::store::Store;

/// Key holding the whole card-id to review-record map.
pub const REVIEWS_KEY: &str = "cardReviews";

/// Interval thresholds (days) that each add a fifth of card strength.
const STRENGTH_LEVELS: [u32; 5] = [1, 3, 7, 21, 60];

pub type Reviews = BTreeMap<CardId, ReviewRecord>;

/// The bookkeeping fields of a card that has never been reviewed.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Schedule {
    interval: u32,
    ease_factor: f64,
    review_count: u32,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            ease_factor: DEFAULT_EASE_FACTOR,
            review_count: 0,
        }
    }
}

impl From<&ReviewRecord> for Schedule {
    fn from(record: &ReviewRecord) -> Self {
        Self {
            interval: record.interval,
            ease_factor: record.ease_factor,
            review_count: record.review_count,
        }
    }
}

/// SM-2 step: the record a card gets after being rated at `now`.
pub fn next_record(
    previous: Option<&ReviewRecord>,
    rating: Rating,
    now: Timestamp,
) -> ReviewRecord {
    let prior = previous.map(Schedule::from).unwrap_or_default();
    let quality = rating.quality() as f64;

    let (interval, ease_factor) = if !rating.is_pass() {
        (1, prior.ease_factor)
    } else {
        let interval = match prior.review_count {
            0 => 1,
            1 => 6,
            _ => (prior.interval as f64 * prior.ease_factor).round() as u32,
        };
        let lapse = 5.0 - quality;
        let ease_factor =
            (prior.ease_factor + (0.1 - lapse * (0.08 + lapse * 0.02))).max(MIN_EASE_FACTOR);
        (interval.max(1), ease_factor)
    };

    ReviewRecord {
        interval,
        ease_factor,
        review_count: prior.review_count.saturating_add(1),
        last_review: now,
        next_review: now + interval as i64 * MS_PER_DAY,
    }
}

pub fn strength_of(record: Option<&ReviewRecord>) -> f64 {
    match record {
        None => 0.0,
        Some(record) => {
            let reached = STRENGTH_LEVELS
                .iter()
                .filter(|&&level| record.interval >= level)
                .count();
            (reached as f64 / STRENGTH_LEVELS.len() as f64) * 100.0
        }
    }
}

fn decode(raw: Option<&str>) -> Result<Reviews> {
    match raw {
        None => Ok(Reviews::new()),
        Some(raw) => serde_json::from_str(raw).map_err(|source| StorageError::Malformed {
            key: REVIEWS_KEY.to_string(),
            source,
        }),
    }
}

fn encode(reviews: &Reviews) -> Result<String> {
    serde_json::to_string(reviews).map_err(|source| StorageError::Encode {
        key: REVIEWS_KEY.to_string(),
        source,
    })
}

/// Per-card spaced-repetition state backed by a [`Store`].
///
/// Records are cached in memory after [`load`](Self::load). Every
/// [`record_review`](Self::record_review) rewrites the whole map under
/// [`REVIEWS_KEY`] inside a single `Store::update`, merging with whatever
/// another writer may have stored since the last load.
pub struct ReviewScheduler<S: Store, C: Clock> {
    store: S,
    clock: C,
    reviews: Reviews,
}

impl<S: Store, C: Clock> ReviewScheduler<S, C> {
    pub fn load(store: S, clock: C) -> Result<Self> {
        let reviews = decode(store.get(REVIEWS_KEY)?.as_deref())?;
        log::debug!("Loaded {} review records", reviews.len());
        Ok(Self {
            store,
            clock,
            reviews,
        })
    }

    /// Re-read the persisted map, discarding the cache.
    pub fn reload(&mut self) -> Result<()> {
        self.reviews = decode(self.store.get(REVIEWS_KEY)?.as_deref())?;
        Ok(())
    }

    /// Write the cached map back as-is.
    pub fn flush(&self) -> Result<()> {
        self.store.set(REVIEWS_KEY, &encode(&self.reviews)?)
    }

    pub fn record_review(&mut self, card_id: &str, rating: Rating) -> Result<ReviewRecord> {
        let now = self.clock.now();
        // Overwritten from the stored map once the update runs.
        let mut record = next_record(self.reviews.get(card_id), rating, now);
        let mut merged = None;

        self.store.update(REVIEWS_KEY, &mut |current| {
            let mut reviews = decode(current)?;
            record = next_record(reviews.get(card_id), rating, now);
            reviews.insert(card_id.to_string(), record.clone());
            let raw = encode(&reviews)?;
            merged = Some(reviews);
            Ok(raw)
        })?;

        if let Some(reviews) = merged {
            self.reviews = reviews;
        }
        log::debug!(
            "Card {} rated {}: interval {}d, ease {:.2}, review #{}",
            card_id,
            rating.as_str(),
            record.interval,
            record.ease_factor,
            record.review_count
        );
        Ok(record)
    }

    pub fn record(&self, card_id: &str) -> Option<&ReviewRecord> {
        self.reviews.get(card_id)
    }

    pub fn reviews(&self) -> &Reviews {
        &self.reviews
    }

    pub fn is_due(&self, card_id: &str) -> bool {
        match self.reviews.get(card_id) {
            None => true,
            Some(record) => record.next_review <= self.clock.now(),
        }
    }

    /// Cards with no record or whose next review has arrived, in input order.
    pub fn cards_due_for_review<'a>(&self, cards: &'a [Card]) -> Vec<&'a Card> {
        let now = self.clock.now();
        cards
            .iter()
            .filter(|card| match self.reviews.get(&card.id) {
                None => true,
                Some(record) => record.next_review <= now,
            })
            .collect()
    }

    /// A 0-100 score stepping up by 20 at each of 1, 3, 7, 21 and 60 days of interval.
    pub fn card_strength(&self, card_id: &str) -> f64 {
        strength_of(self.reviews.get(card_id))
    }

    pub fn stats(&self, cards: &[Card]) -> ReviewStats {
        let tracked = self.reviews.len();
        let total_reviews = self
            .reviews
            .values()
            .map(|r| r.review_count as u64)
            .sum();
        let mastered = self
            .reviews
            .values()
            .filter(|r| strength_of(Some(r)) >= 100.0)
            .count();
        let average_strength = if cards.is_empty() {
            0.0
        } else {
            cards
                .iter()
                .map(|card| self.card_strength(&card.id))
                .sum::<f64>()
                / cards.len() as f64
        };

        ReviewStats {
            tracked,
            total_reviews,
            due: self.cards_due_for_review(cards).len(),
            mastered,
            average_strength,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::models::Difficulty;
    use crate::store::{MemoryStore, SqliteStore};

    const T0: Timestamp = 1_700_000_000_000;

    fn card(id: &str) -> Card {
        Card {
            id: id.to_string(),
            category: "amortized".to_string(),
            front: "Q".to_string(),
            back: "A".to_string(),
            difficulty: Difficulty::Beginner,
            tags: vec![],
        }
    }

    fn record(interval: u32, ease_factor: f64, review_count: u32) -> ReviewRecord {
        ReviewRecord {
            interval,
            ease_factor,
            review_count,
            last_review: T0,
            next_review: T0 + interval as i64 * MS_PER_DAY,
        }
    }

    mod next_record_tests {
        use super::*;

        #[test]
        fn first_pass_is_one_day() {
            let r = next_record(None, Rating::Good, T0);
            assert_eq!(r.interval, 1);
            assert_eq!(r.review_count, 1);
            assert_eq!(r.last_review, T0);
            assert_eq!(r.next_review, T0 + MS_PER_DAY);
        }

        #[test]
        fn second_pass_is_six_days() {
            let r = next_record(Some(&record(1, 2.5, 1)), Rating::Hard, T0);
            assert_eq!(r.interval, 6);
            assert_eq!(r.review_count, 2);
        }

        #[test]
        fn later_pass_multiplies_by_prior_ease() {
            let r = next_record(Some(&record(6, 2.5, 2)), Rating::Good, T0);
            assert_eq!(r.interval, 15);
            let r = next_record(Some(&record(15, 2.5, 3)), Rating::Easy, T0);
            // 37.5 rounds away from zero
            assert_eq!(r.interval, 38);
        }

        #[test]
        fn again_resets_interval_and_keeps_ease() {
            for prior in [record(1, 2.5, 0), record(40, 1.7, 9), record(6, 1.3, 2)] {
                let r = next_record(Some(&prior), Rating::Again, T0);
                assert_eq!(r.interval, 1);
                assert_eq!(r.ease_factor, prior.ease_factor);
                assert_eq!(r.review_count, prior.review_count + 1);
            }
        }

        #[test]
        fn ease_changes_by_quality() {
            let easy = next_record(None, Rating::Easy, T0);
            assert!((easy.ease_factor - 2.6).abs() < 1e-9);
            let good = next_record(None, Rating::Good, T0);
            assert!((good.ease_factor - 2.5).abs() < 1e-9);
            let hard = next_record(None, Rating::Hard, T0);
            assert!((hard.ease_factor - 2.36).abs() < 1e-9);
        }

        #[test]
        fn ease_never_drops_below_floor() {
            let mut current: Option<ReviewRecord> = None;
            for _ in 0..50 {
                let r = next_record(current.as_ref(), Rating::Hard, T0);
                assert!(r.ease_factor >= MIN_EASE_FACTOR);
                current = Some(r);
            }
            assert_eq!(current.unwrap().ease_factor, MIN_EASE_FACTOR);
        }

        #[test]
        fn next_review_matches_interval() {
            let r = next_record(Some(&record(6, 2.5, 2)), Rating::Good, T0);
            assert_eq!(r.next_review - r.last_review, r.interval as i64 * MS_PER_DAY);
        }
    }

    mod strength_tests {
        use super::*;

        #[test]
        fn no_record_is_zero() {
            assert_eq!(strength_of(None), 0.0);
        }

        #[test]
        fn steps_at_thresholds() {
            let cases = [
                (1, 20.0),
                (2, 20.0),
                (3, 40.0),
                (6, 40.0),
                (7, 60.0),
                (21, 80.0),
                (59, 80.0),
                (60, 100.0),
                (365, 100.0),
            ];
            for (interval, expected) in cases {
                assert_eq!(
                    strength_of(Some(&record(interval, 2.5, 3))),
                    expected,
                    "interval {}",
                    interval
                );
            }
        }

        #[test]
        fn monotone_in_interval() {
            let mut last = 0.0;
            for interval in 1..=100 {
                let s = strength_of(Some(&record(interval, 2.5, 3)));
                assert!(s >= last);
                assert!([20.0, 40.0, 60.0, 80.0, 100.0].contains(&s));
                last = s;
            }
        }
    }

    mod scheduler_tests {
        use super::*;

        #[test]
        fn am1_scenario() {
            let store = MemoryStore::new();
            let clock = ManualClock::at(T0);
            let mut scheduler = ReviewScheduler::load(&store, &clock).unwrap();

            let first = scheduler.record_review("am-1", Rating::Good).unwrap();
            assert_eq!((first.interval, first.review_count), (1, 1));

            clock.advance_days(1);
            let second = scheduler.record_review("am-1", Rating::Good).unwrap();
            assert_eq!((second.interval, second.review_count), (6, 2));

            clock.advance_days(6);
            let third = scheduler.record_review("am-1", Rating::Again).unwrap();
            assert_eq!((third.interval, third.review_count), (1, 3));
            assert_eq!(third.ease_factor, second.ease_factor);
        }

        #[test]
        fn unknown_label_schedules_as_good() {
            let store = MemoryStore::new();
            let clock = ManualClock::at(T0);
            let mut scheduler = ReviewScheduler::load(&store, &clock).unwrap();
            let r = scheduler
                .record_review("am-2", Rating::from_label("whatever"))
                .unwrap();
            assert_eq!(r.ease_factor, DEFAULT_EASE_FACTOR);
        }

        #[test]
        fn reload_reproduces_returned_record() {
            let store = MemoryStore::new();
            let clock = ManualClock::at(T0);
            let returned = {
                let mut scheduler = ReviewScheduler::load(&store, &clock).unwrap();
                scheduler.record_review("lt-1", Rating::Easy).unwrap()
            };
            let scheduler = ReviewScheduler::load(&store, &clock).unwrap();
            assert_eq!(scheduler.record("lt-1"), Some(&returned));
        }

        #[test]
        fn every_review_rewrites_the_whole_map() {
            let store = MemoryStore::new();
            let clock = ManualClock::at(T0);
            let mut scheduler = ReviewScheduler::load(&store, &clock).unwrap();
            scheduler.record_review("a", Rating::Good).unwrap();
            scheduler.record_review("b", Rating::Good).unwrap();
            let raw = store.get(REVIEWS_KEY).unwrap().unwrap();
            let stored: Reviews = serde_json::from_str(&raw).unwrap();
            assert_eq!(stored.len(), 2);
            assert_eq!(&stored, scheduler.reviews());
        }

        #[test]
        fn concurrent_writers_do_not_lose_updates() {
            let store = MemoryStore::new();
            let clock = ManualClock::at(T0);
            let mut tab_one = ReviewScheduler::load(&store, &clock).unwrap();
            let mut tab_two = ReviewScheduler::load(&store, &clock).unwrap();

            tab_one.record_review("am-1", Rating::Good).unwrap();
            tab_two.record_review("lt-1", Rating::Good).unwrap();

            let fresh = ReviewScheduler::load(&store, &clock).unwrap();
            assert!(fresh.record("am-1").is_some());
            assert!(fresh.record("lt-1").is_some());
        }

        #[test]
        fn flush_writes_cache() {
            let source = MemoryStore::new();
            let clock = ManualClock::at(T0);
            let mut scheduler = ReviewScheduler::load(&source, &clock).unwrap();
            scheduler.record_review("am-1", Rating::Good).unwrap();

            let target = MemoryStore::new();
            let copy = ReviewScheduler {
                store: &target,
                clock: &clock,
                reviews: scheduler.reviews().clone(),
            };
            copy.flush().unwrap();
            assert_eq!(
                target.get(REVIEWS_KEY).unwrap(),
                source.get(REVIEWS_KEY).unwrap()
            );
        }

        #[test]
        fn malformed_store_is_an_error() {
            let store = MemoryStore::new();
            store.set(REVIEWS_KEY, "not json").unwrap();
            let result = ReviewScheduler::load(&store, ManualClock::at(T0));
            assert!(matches!(result, Err(StorageError::Malformed { .. })));
        }

        #[test]
        fn record_review_reports_malformed_store() {
            let store = MemoryStore::new();
            let clock = ManualClock::at(T0);
            let mut scheduler = ReviewScheduler::load(&store, &clock).unwrap();
            store.set(REVIEWS_KEY, "not json").unwrap();

            let result = scheduler.record_review("am-1", Rating::Good);
            assert!(matches!(result, Err(StorageError::Malformed { .. })));
            assert_eq!(
                store.get(REVIEWS_KEY).unwrap(),
                Some("not json".to_string())
            );
            assert!(scheduler.record("am-1").is_none());
        }

        #[test]
        fn record_review_reports_database_failure() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("progress.db");
            let store = SqliteStore::open(&path).unwrap();
            store.init().unwrap();
            let clock = ManualClock::at(T0);
            let mut scheduler = ReviewScheduler::load(&store, &clock).unwrap();

            let other = rusqlite::Connection::open(&path).unwrap();
            other.execute_batch("DROP TABLE kv").unwrap();

            let result = scheduler.record_review("am-1", Rating::Good);
            assert!(matches!(result, Err(StorageError::Database(_))));
            assert!(scheduler.record("am-1").is_none());
        }

        #[test]
        fn review_count_saturates() {
            let r = next_record(Some(&record(6, 2.5, u32::MAX)), Rating::Good, T0);
            assert_eq!(r.review_count, u32::MAX);
        }

        #[test]
        fn sqlite_round_trip() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("progress.db");
            let clock = ManualClock::at(T0);
            let returned = {
                let store = SqliteStore::open(&path).unwrap();
                store.init().unwrap();
                let mut scheduler = ReviewScheduler::load(store, &clock).unwrap();
                scheduler.record_review("bh-1", Rating::Good).unwrap();
                scheduler.record_review("bh-1", Rating::Good).unwrap()
            };
            let store = SqliteStore::open(&path).unwrap();
            let scheduler = ReviewScheduler::load(store, &clock).unwrap();
            assert_eq!(scheduler.record("bh-1"), Some(&returned));
            assert_eq!(returned.interval, 6);
        }
    }

    mod due_tests {
        use super::*;

        #[test]
        fn unseen_cards_are_due() {
            let store = MemoryStore::new();
            let scheduler = ReviewScheduler::load(&store, ManualClock::at(T0)).unwrap();
            let cards = vec![card("a"), card("b")];
            let due = scheduler.cards_due_for_review(&cards);
            assert_eq!(due.len(), 2);
        }

        #[test]
        fn empty_collection_yields_empty() {
            let store = MemoryStore::new();
            let scheduler = ReviewScheduler::load(&store, ManualClock::at(T0)).unwrap();
            assert!(scheduler.cards_due_for_review(&[]).is_empty());
        }

        #[test]
        fn reviewed_card_due_exactly_at_next_review() {
            let store = MemoryStore::new();
            let clock = ManualClock::at(T0);
            let mut scheduler = ReviewScheduler::load(&store, &clock).unwrap();
            scheduler.record_review("b", Rating::Good).unwrap();
            let cards = vec![card("a"), card("b"), card("c")];

            let ids: Vec<&str> = scheduler
                .cards_due_for_review(&cards)
                .iter()
                .map(|c| c.id.as_str())
                .collect();
            assert_eq!(ids, vec!["a", "c"]);
            assert!(!scheduler.is_due("b"));

            clock.set(T0 + MS_PER_DAY - 1);
            assert_eq!(scheduler.cards_due_for_review(&cards).len(), 2);

            clock.set(T0 + MS_PER_DAY);
            let ids: Vec<&str> = scheduler
                .cards_due_for_review(&cards)
                .iter()
                .map(|c| c.id.as_str())
                .collect();
            assert_eq!(ids, vec!["a", "b", "c"]);
        }
    }

    mod stats_tests {
        use super::*;

        #[test]
        fn stats_empty() {
            let store = MemoryStore::new();
            let scheduler = ReviewScheduler::load(&store, ManualClock::at(T0)).unwrap();
            let stats = scheduler.stats(&[]);
            assert_eq!(stats.tracked, 0);
            assert_eq!(stats.total_reviews, 0);
            assert_eq!(stats.due, 0);
            assert_eq!(stats.average_strength, 0.0);
        }

        #[test]
        fn stats_counts_reviews_and_mastery() {
            let store = MemoryStore::new();
            let mut reviews = Reviews::new();
            reviews.insert("a".to_string(), record(60, 2.5, 7));
            reviews.insert("b".to_string(), record(1, 2.5, 1));
            store
                .set(REVIEWS_KEY, &serde_json::to_string(&reviews).unwrap())
                .unwrap();
            let scheduler = ReviewScheduler::load(&store, ManualClock::at(T0)).unwrap();

            let cards = vec![card("a"), card("b"), card("c")];
            let stats = scheduler.stats(&cards);
            assert_eq!(stats.tracked, 2);
            assert_eq!(stats.total_reviews, 8);
            assert_eq!(stats.mastered, 1);
            assert_eq!(stats.due, 1);
            assert!((stats.average_strength - 40.0).abs() < 1e-9);
        }
    }
}
