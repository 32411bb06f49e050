//! Client-side roster of known players.
//!
//! The roster is folded from an unordered, at-least-once stream of
//! `player-update` events:
//!
//! - one entry per `connection_id`, in first-seen order;
//! - an update for a known id replaces that entry wholesale (last write wins);
//! - entries are never removed or reordered.
//!
//! Updates carry no sequence number, so a stale update delivered after a
//! fresher one (e.g. across a reconnect) overwrites it. `is_active` is
//! advisory: players who leave stay listed.

use std::sync::Arc;

use tokio::sync::watch;

use lobby_shared::protocol::PlayerRecord;

use crate::connection::ConnectionManager;

/// Effect of folding one update into the roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RosterChange {
    /// New player appended at this index
    Inserted(usize),
    /// Existing player at this index replaced
    Replaced(usize),
}

/// Ordered collection of player records keyed by connection id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roster {
    players: Vec<PlayerRecord>,
    latest: Option<PlayerRecord>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold `record` into the roster.
    pub fn upsert(&mut self, record: PlayerRecord) -> RosterChange {
        self.latest = Some(record.clone());

        match self
            .players
            .iter()
            .position(|player| player.connection_id == record.connection_id)
        {
            Some(index) => {
                self.players[index] = record;
                RosterChange::Replaced(index)
            }
            None => {
                self.players.push(record);
                RosterChange::Inserted(self.players.len() - 1)
            }
        }
    }

    pub fn players(&self) -> &[PlayerRecord] {
        &self.players
    }

    pub fn get(&self, connection_id: &str) -> Option<&PlayerRecord> {
        self.players
            .iter()
            .find(|player| player.connection_id == connection_id)
    }

    /// The most recently folded update.
    pub fn latest(&self) -> Option<&PlayerRecord> {
        self.latest.as_ref()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlayerRecord> {
        self.players.iter()
    }
}

/// Keeps a [`Roster`] in sync with the connection's `player-update` events
/// and pushes every fold to its watchers.
///
/// Cloning yields another handle on the same roster.
#[derive(Clone)]
pub struct RosterSynchronizer {
    roster: Arc<watch::Sender<Roster>>,
}

impl RosterSynchronizer {
    pub fn new() -> Self {
        let (roster, _) = watch::channel(Roster::new());
        Self {
            roster: Arc::new(roster),
        }
    }

    /// Subscribe the fold to `manager`'s `player-update` events.
    pub fn attach(&self, manager: &ConnectionManager) {
        let synchronizer = self.clone();
        manager.on_player_update(move |record| {
            synchronizer.on_player_update(record);
        });
    }

    /// Fold one update and notify watchers.
    pub fn on_player_update(&self, record: PlayerRecord) -> RosterChange {
        let mut change = RosterChange::Inserted(0);
        self.roster.send_modify(|roster| {
            change = roster.upsert(record);
        });

        match change {
            RosterChange::Inserted(index) => {
                tracing::info!("Player joined the roster at position {}", index + 1)
            }
            RosterChange::Replaced(index) => {
                tracing::debug!("Player at position {} updated", index + 1)
            }
        }
        change
    }

    /// Snapshot of the current roster.
    pub fn roster(&self) -> Roster {
        self.roster.borrow().clone()
    }

    pub fn latest_update(&self) -> Option<PlayerRecord> {
        self.roster.borrow().latest().cloned()
    }

    /// Receiver notified after every fold.
    pub fn subscribe(&self) -> watch::Receiver<Roster> {
        self.roster.subscribe()
    }
}

impl Default for RosterSynchronizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(id: &str, name: &str) -> PlayerRecord {
        PlayerRecord::new(id, name, 0, true)
    }

    #[test]
    fn test_fold_replaces_and_keeps_first_seen_order() {
        // テスト項目: {A,x}, {B,y}, {A,z} を畳み込むと [{A,z}, {B,y}] になる
        // given (前提条件):
        let mut roster = Roster::new();

        // when (操作):
        let changes = [
            roster.upsert(player("A", "x")),
            roster.upsert(player("B", "y")),
            roster.upsert(player("A", "z")),
        ];

        // then (期待する結果):
        assert_eq!(
            changes,
            [
                RosterChange::Inserted(0),
                RosterChange::Inserted(1),
                RosterChange::Replaced(0),
            ]
        );
        assert_eq!(roster.players(), &[player("A", "z"), player("B", "y")]);
        assert_eq!(roster.latest(), Some(&player("A", "z")));
    }

    #[test]
    fn test_fold_one_entry_per_id_equal_to_last_update() {
        // テスト項目: 任意の更新列で ID ごとに 1 件、値は最後の更新と一致する
        // given (前提条件):
        let updates = vec![
            PlayerRecord::new("c", "carol", 1, true),
            PlayerRecord::new("a", "alice", 1, true),
            PlayerRecord::new("c", "carol", 5, true),
            PlayerRecord::new("b", "bob", 2, true),
            PlayerRecord::new("a", "alice", 9, false),
            PlayerRecord::new("c", "carol", 3, false),
        ];
        let mut roster = Roster::new();

        // when (操作):
        for update in updates.iter().cloned() {
            roster.upsert(update);
        }

        // then (期待する結果):
        let ids: Vec<&str> = roster.iter().map(|p| p.connection_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
        for entry in roster.iter() {
            let last = updates
                .iter()
                .rev()
                .find(|u| u.connection_id == entry.connection_id)
                .unwrap();
            assert_eq!(entry, last);
        }
    }

    #[test]
    fn test_duplicate_delivery_is_harmless() {
        // テスト項目: 同じ更新が重複配送されてもエントリは増えない
        // given (前提条件):
        let mut roster = Roster::new();
        let update = PlayerRecord::new("a", "alice", 4, true);

        // when (操作):
        roster.upsert(update.clone());
        roster.upsert(update.clone());

        // then (期待する結果):
        assert_eq!(roster.len(), 1);
        assert_eq!(roster.get("a"), Some(&update));
    }

    #[test]
    fn test_stale_update_overwrites_fresher_one() {
        // テスト項目: 順序が入れ替わった古い更新は新しい値を上書きする（既知の整合性ギャップ）
        // given (前提条件):
        let mut roster = Roster::new();
        roster.upsert(PlayerRecord::new("a", "alice", 30, true));

        // when (操作):
        roster.upsert(PlayerRecord::new("a", "alice", 10, true));

        // then (期待する結果):
        assert_eq!(roster.get("a").unwrap().total_elapsed_time, 10);
    }

    #[test]
    fn test_inactive_player_stays_listed() {
        // テスト項目: isActive=false の更新でもプレイヤーは削除されない
        // given (前提条件):
        let mut roster = Roster::new();
        roster.upsert(PlayerRecord::new("a", "alice", 3, true));
        roster.upsert(PlayerRecord::new("b", "bob", 3, true));

        // when (操作):
        roster.upsert(PlayerRecord::new("a", "alice", 3, false));

        // then (期待する結果):
        assert_eq!(roster.len(), 2);
        assert_eq!(roster.players()[0].connection_id, "a");
        assert!(!roster.players()[0].is_active);
    }

    #[test]
    fn test_empty_roster() {
        // テスト項目: 初期状態の名簿は空で最新更新もない
        // given (前提条件):
        let synchronizer = RosterSynchronizer::new();

        // when (操作):
        let roster = synchronizer.roster();

        // then (期待する結果):
        assert!(roster.is_empty());
        assert_eq!(synchronizer.latest_update(), None);
    }

    #[tokio::test]
    async fn test_synchronizer_notifies_watchers() {
        // テスト項目: 畳み込みごとに購読者へ通知される
        // given (前提条件):
        let synchronizer = RosterSynchronizer::new();
        let mut watcher = synchronizer.subscribe();

        // when (操作):
        synchronizer.on_player_update(player("a", "alice"));

        // then (期待する結果):
        watcher.changed().await.unwrap();
        assert_eq!(watcher.borrow_and_update().players(), &[player("a", "alice")]);
        assert_eq!(synchronizer.latest_update(), Some(player("a", "alice")));
    }

    #[test]
    fn test_cloned_handles_share_roster() {
        // テスト項目: クローンしたハンドルは同じ名簿を共有する
        // given (前提条件):
        let synchronizer = RosterSynchronizer::new();
        let other = synchronizer.clone();

        // when (操作):
        other.on_player_update(player("a", "alice"));

        // then (期待する結果):
        assert_eq!(synchronizer.roster().len(), 1);
    }
}
