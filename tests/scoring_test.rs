//! Tests for placements, Elo ratings and roster management.

use std::collections::BTreeMap;

use chrono::Utc;
use rand::SeedableRng;
use rand_pcg::Pcg64Mcg;

use turnstack::{
    EloEngine, EloRecord, GameId, Header, Pid, Placements, PlayerIdentity, Status, Uid,
    hash_secret,
};

fn player(uid: i64) -> PlayerIdentity {
    PlayerIdentity::new(Uid(uid), format!("user{}", uid), format!("u{}@example.com", uid))
}

fn header(num_players: usize, password: Option<&str>) -> Header {
    Header::new(GameId(1), "tally", "Scoring", num_players, player(1), password)
}

#[test]
fn test_placements_group_ties_and_skip_ranks() {
    let placements = Placements::resolve(&[(Uid(1), 10), (Uid(2), 10), (Uid(3), 5)]);
    assert_eq!(placements.ranks(), vec![1, 3]);
    assert_eq!(placements.at(1), &[Uid(1), Uid(2)]);
    assert_eq!(placements.at(3), &[Uid(3)]);
    assert!(placements.at(2).is_empty());
    assert_eq!(placements.len(), 3);
}

#[test]
fn test_placements_distinct_scores() {
    let placements =
        Placements::resolve(&[(Uid(4), 1), (Uid(3), 40), (Uid(2), 7), (Uid(1), 22)]);
    assert_eq!(placements.ranks(), vec![1, 2, 3, 4]);
    assert_eq!(placements.winners(), &[Uid(3)]);
    assert_eq!(placements.rank_of(Uid(1)), Some(2));
    assert_eq!(placements.rank_of(Uid(2)), Some(3));
    assert_eq!(placements.rank_of(Uid(4)), Some(4));
    assert_eq!(placements.rank_of(Uid(9)), None);
}

#[test]
fn test_placements_serialize_as_rank_map() {
    let placements = Placements::resolve(&[(Uid(1), 3), (Uid(2), 3)]);
    let json = serde_json::to_string(&placements).unwrap();
    assert_eq!(json, r#"{"1":[1,2]}"#);
}

#[test]
fn test_elo_winner_gains_what_loser_loses() {
    let engine = EloEngine::default();
    let placements = Placements::resolve(&[(Uid(1), 9), (Uid(2), 3)]);
    let deltas = engine.deltas(&placements, &BTreeMap::new());
    assert!((deltas[&Uid(1)] - 16.0).abs() < 1e-9);
    assert!((deltas[&Uid(2)] + 16.0).abs() < 1e-9);
}

#[test]
fn test_elo_is_zero_sum_for_many_players() {
    let engine = EloEngine::default();
    let placements = Placements::resolve(&[
        (Uid(1), 30),
        (Uid(2), 20),
        (Uid(3), 20),
        (Uid(4), 5),
    ]);
    let ratings = BTreeMap::from([
        (Uid(1), 1320.0),
        (Uid(2), 1710.0),
        (Uid(3), 1500.0),
        (Uid(4), 1604.0),
    ]);
    let deltas = engine.deltas(&placements, &ratings);
    let total: f64 = deltas.values().sum();
    assert!(total.abs() < 1e-9, "Elo deltas must sum to zero, got {}", total);
    assert!(deltas[&Uid(1)] > 0.0);
    assert!(deltas[&Uid(4)] < 0.0);
}

#[test]
fn test_elo_uses_pre_game_ratings_regardless_of_order() {
    let engine = EloEngine::default();
    let ratings = BTreeMap::from([(Uid(1), 1450.0), (Uid(2), 1550.0), (Uid(3), 1600.0)]);
    let forward = engine.deltas(
        &Placements::resolve(&[(Uid(1), 3), (Uid(2), 2), (Uid(3), 1)]),
        &ratings,
    );
    let shuffled = engine.deltas(
        &Placements::resolve(&[(Uid(3), 1), (Uid(1), 3), (Uid(2), 2)]),
        &ratings,
    );
    assert_eq!(forward, shuffled);
}

#[test]
fn test_elo_update_creates_missing_records() {
    let engine = EloEngine::new(20.0, 1200.0);
    let placements = Placements::resolve(&[(Uid(1), 1), (Uid(2), 0)]);
    let existing = BTreeMap::from([(Uid(2), EloRecord::starting(Uid(2), 1300.0))]);
    let (records, deltas) = engine.update(existing, &placements, GameId(8), Utc::now());

    assert_eq!(records.len(), 2);
    let newcomer = &records[&Uid(1)];
    assert!((newcomer.rating() - (1200.0 + deltas[&Uid(1)])).abs() < 1e-9);
    assert_eq!(newcomer.history().len(), 1);
    assert!(deltas[&Uid(1)] > 10.0);
}

#[test]
fn test_invitation_completes_roster() {
    let mut header = header(3, None);
    assert!(!header.accept_invitation(player(2), None).unwrap());
    assert!(header.accept_invitation(player(3), None).unwrap());

    let err = header.accept_invitation(player(4), None).unwrap_err();
    assert!(err.is_validation());
    assert_eq!(header.players().len(), 3);
}

#[test]
fn test_invitation_rejects_duplicate_join() {
    let mut header = header(3, None);
    let err = header.accept_invitation(player(1), None).unwrap_err();
    assert!(err.is_validation());
    assert_eq!(header.players().len(), 1);
}

#[test]
fn test_private_game_checks_password() {
    let mut header = header(2, Some("hunter2"));
    assert!(header.is_private());
    assert_eq!(header.password_hash().as_deref(), Some(hash_secret("hunter2").as_str()));

    assert!(header.accept_invitation(player(2), None).is_err());
    assert!(header.accept_invitation(player(2), Some("hunter3")).is_err());
    assert_eq!(header.players().len(), 1);
    assert!(header.accept_invitation(player(2), Some("hunter2")).unwrap());
}

#[test]
fn test_drop_user_only_while_recruiting() {
    let mut header = header(2, None);
    header.accept_invitation(player(2), None).unwrap();
    header.drop_user(Uid(2)).unwrap();
    assert!(!header.has_user(Uid(2)));
    assert!(header.drop_user(Uid(2)).is_err());

    header.accept_invitation(player(2), None).unwrap();
    header.start(&mut Pcg64Mcg::seed_from_u64(1)).unwrap();
    assert!(header.drop_user(Uid(2)).unwrap_err().is_validation());
}

#[test]
fn test_start_order_follows_injected_rng() {
    let started = |seed| {
        let mut header = header(4, None);
        for uid in 2..=4 {
            header.accept_invitation(player(uid), None).unwrap();
        }
        header.start(&mut Pcg64Mcg::seed_from_u64(seed)).unwrap();
        header
    };
    let a = started(99);
    let b = started(99);
    assert_eq!(a.uids(), b.uids());
    assert_eq!(*a.status(), Status::Running);
    assert_eq!(a.current_players(), &vec![Pid(1)]);
    assert_eq!((*a.turn(), *a.round()), (1, 1));
    assert!(a.started_at().is_some());
}

#[test]
fn test_start_requires_full_roster() {
    let mut header = header(3, None);
    header.accept_invitation(player(2), None).unwrap();
    let err = header.start(&mut Pcg64Mcg::seed_from_u64(1)).unwrap_err();
    assert!(err.is_validation());
    assert_eq!(*header.status(), Status::Recruiting);
}

#[test]
fn test_current_players_map_to_uids() {
    let mut header = header(2, None);
    header.accept_invitation(player(2), None).unwrap();
    header.start(&mut Pcg64Mcg::seed_from_u64(4)).unwrap();
    let second = header.uid_for(Pid(2)).unwrap();
    header.set_current_players(vec![Pid(2)]).unwrap();
    assert!(header.is_current_player(second));
    assert_eq!(header.current_uids(), vec![second]);
    assert!(header.set_current_players(vec![Pid(3)]).is_err());
}
