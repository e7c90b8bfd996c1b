//! End-of-game processing: placements, ratings, statistics, result log.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::store::{DocKey, DocumentStore, Txn, TxnExt};
use crate::{
    CommitCoordinator, Dispatcher, EloEngine, EloRecord, EngineError, Game, GameId, Notification,
    Placements, Scorecard, UStat, Uid,
};

/// Outcome of one finalization, also appended to the result log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters)]
pub struct GameResult {
    game_id: GameId,
    revision: u64,
    placements: Placements,
    elo_deltas: BTreeMap<Uid, f64>,
    ended_at: DateTime<Utc>,
}

/// Sequences end-of-game work as one logical unit.
#[derive(Debug, Clone)]
pub struct TurnFinalizer<'a, S> {
    store: &'a S,
    elo: EloEngine,
    dispatcher: &'a Dispatcher,
}

/// Loads, updates and writes every participant's Elo and lifetime stats.
fn record_results(
    txn: &mut dyn Txn,
    elo: &EloEngine,
    cards: &[Scorecard],
    placements: &Placements,
    game_id: GameId,
    num_players: usize,
    now: DateTime<Utc>,
) -> Result<BTreeMap<Uid, f64>, EngineError> {
    let mut records = BTreeMap::new();
    for card in cards {
        let uid = *card.uid();
        if let Some(record) = txn.read::<EloRecord>(&DocKey::elo(uid))? {
            records.insert(uid, record);
        }
    }
    let (records, deltas) = elo.update(records, placements, game_id, now);
    for (uid, record) in &records {
        txn.write(&DocKey::elo(*uid), record)?;
    }

    for card in cards {
        let uid = *card.uid();
        let mut stat = txn
            .read::<UStat>(&DocKey::ustat(uid))?
            .unwrap_or_else(|| UStat::new(uid));
        let won = placements.rank_of(uid) == Some(1);
        stat.record(num_players, card, won);
        txn.write(&DocKey::ustat(uid), &stat)?;
    }
    Ok(deltas)
}

impl<'a, S: DocumentStore> TurnFinalizer<'a, S> {
    /// Creates a finalizer writing to `store` and notifying through `dispatcher`.
    pub fn new(store: &'a S, elo: EloEngine, dispatcher: &'a Dispatcher) -> Self {
        Self {
            store,
            elo,
            dispatcher,
        }
    }

    /// Completes `state`: resolves placements, updates Elo and lifetime
    /// statistics, appends the result log entry and commits the terminal
    /// state, all in one transaction. Participants are then notified in the
    /// background.
    ///
    /// # Errors
    ///
    /// Fails, writing nothing, if any part of the transaction fails.
    /// Notification failures are never reported here.
    #[instrument(skip(self, state), fields(game_id = %state.head().id()))]
    pub fn finalize<G: Game>(&self, mut state: G, acting: Uid) -> Result<(G, GameResult), EngineError> {
        let game_id = *state.head().id();
        let cards = state.scorecards();
        let scores: Vec<(Uid, i64)> = cards.iter().map(|c| (*c.uid(), *c.score())).collect();
        let placements = Placements::resolve(&scores);
        let num_players = *state.head().num_players();
        let now = Utc::now();
        state.head_mut().complete(placements.clone(), now);

        let elo = self.elo;
        let (state, result) = CommitCoordinator::new(self.store).commit_with(
            state,
            acting,
            |txn, published| {
                let deltas =
                    record_results(txn, &elo, &cards, &placements, game_id, num_players, now)?;
                let result = GameResult {
                    game_id,
                    revision: published.head().revision(),
                    placements: placements.clone(),
                    elo_deltas: deltas,
                    ended_at: now,
                };
                txn.write(&DocKey::log(game_id, result.revision), &result)?;
                Ok(result)
            },
        )?;

        info!(
            game_id = %game_id,
            revision = result.revision,
            winners = ?result.placements.winners(),
            "Game finalized"
        );

        self.dispatcher.dispatch(
            state.head().uids(),
            Notification::GameOver {
                game_id,
                title: state.head().title().clone(),
                placements: result.placements.clone(),
            },
        );
        Ok((state, result))
    }
}
