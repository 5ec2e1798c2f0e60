use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};
use thiserror::Error;

pub mod models;
use models::*;

/// Errors surfaced by the store layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("failed to encode signal patterns: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Thread-safe SQLite handle (single connection behind a mutex).
///
/// Serves as every collaborator store the pipeline consumes: matches and
/// standings, odds history, signals, pattern reliability and bankroll.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the SQLite database at the given path.
    /// `":memory:"` gives a throwaway database, used by the test suite.
    pub fn open(path: &str) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        let db = Database {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Run schema migrations (idempotent)
    fn run_migrations(&self) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    // ── Bankroll ─────────────────────────────────────────────────────────────

    /// Current balance = the latest bankroll ledger entry, if any.
    pub fn current_balance(&self) -> StoreResult<Option<f64>> {
        let conn = self.conn.lock().unwrap();
        let balance = conn
            .query_row(
                "SELECT balance FROM bankroll_history ORDER BY recorded_at DESC, id DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(balance)
    }

    /// Append a bankroll ledger entry.
    pub fn record_balance(&self, balance: f64, pnl: f64) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO bankroll_history (balance, pnl, recorded_at) VALUES (?1, ?2, ?3)",
            params![balance, pnl, Utc::now()],
        )?;
        Ok(())
    }

    // ── Teams ────────────────────────────────────────────────────────────────

    /// Insert a team, returning its row ID.
    pub fn insert_team(&self, external_id: i64, name: &str, short_name: Option<&str>) -> StoreResult<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO teams (external_id, name, short_name) VALUES (?1, ?2, ?3)",
            params![external_id, name, short_name],
        )?;
        Ok(conn.last_insert_rowid())
    }

    // ── Matches ──────────────────────────────────────────────────────────────

    /// Insert a fixture written by the data-fetch layer. The record's `id`
    /// field is ignored; the assigned row ID is returned.
    pub fn insert_match(&self, m: &MatchRecord) -> StoreResult<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO matches (
                external_id, utc_date, status, matchday,
                home_team_id, away_team_id,
                home_score, away_score, home_ht_score, away_ht_score
             ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
            params![
                m.external_id,
                m.utc_date,
                m.status.as_str(),
                m.matchday,
                m.home_team_id,
                m.away_team_id,
                m.home_score,
                m.away_score,
                m.home_ht_score,
                m.away_ht_score,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Matches still eligible for pre-match analysis: scheduled or timed,
    /// with a kick-off after `now`. Ordered by kick-off time.
    pub fn upcoming_matches(&self, now: DateTime<Utc>) -> StoreResult<Vec<MatchRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {MATCH_COLUMNS} FROM matches
             WHERE status IN ('SCHEDULED', 'TIMED') AND utc_date > ?1
             ORDER BY utc_date"
        ))?;
        let matches = stmt
            .query_map(params![now], map_match)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(matches)
    }

    /// Most recent finished home-venue matches for a team, newest first.
    pub fn home_history(&self, team_id: i64, limit: i64) -> StoreResult<Vec<MatchRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {MATCH_COLUMNS} FROM matches
             WHERE home_team_id = ?1 AND status = 'FINISHED'
             ORDER BY utc_date DESC LIMIT ?2"
        ))?;
        let matches = stmt
            .query_map(params![team_id, limit], map_match)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(matches)
    }

    /// Most recent finished away-venue matches for a team, newest first.
    pub fn away_history(&self, team_id: i64, limit: i64) -> StoreResult<Vec<MatchRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {MATCH_COLUMNS} FROM matches
             WHERE away_team_id = ?1 AND status = 'FINISHED'
             ORDER BY utc_date DESC LIMIT ?2"
        ))?;
        let matches = stmt
            .query_map(params![team_id, limit], map_match)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(matches)
    }

    // ── Standings ────────────────────────────────────────────────────────────

    /// Insert one row of a league table snapshot.
    pub fn insert_standing(&self, row: &StandingRow) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO standings (snapshot_date, team_id, position, points, goal_difference)
             VALUES (?1,?2,?3,?4,?5)",
            params![
                row.snapshot_date,
                row.team_id,
                row.position,
                row.points,
                row.goal_difference,
            ],
        )?;
        Ok(())
    }

    /// All rows of the most recent standings snapshot, ordered by position.
    pub fn latest_standings(&self) -> StoreResult<Vec<StandingRow>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT snapshot_date, team_id, position, points, goal_difference
             FROM standings
             WHERE snapshot_date = (SELECT MAX(snapshot_date) FROM standings)
             ORDER BY position",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(StandingRow {
                    snapshot_date: row.get(0)?,
                    team_id: row.get(1)?,
                    position: row.get(2)?,
                    points: row.get(3)?,
                    goal_difference: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    // ── Odds ─────────────────────────────────────────────────────────────────

    /// Insert an odds snapshot written by the data-fetch layer.
    pub fn insert_odds(&self, snap: &OddsSnapshot) -> StoreResult<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO odds_history (
                match_id, bookmaker, recorded_at,
                home_odds, draw_odds, away_odds,
                over_15_odds, under_15_odds, over_25_odds,
                under_25_odds, over_35_odds, under_35_odds
             ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12)",
            params![
                snap.match_id,
                snap.bookmaker,
                snap.recorded_at,
                snap.home_odds,
                snap.draw_odds,
                snap.away_odds,
                snap.over_15_odds,
                snap.under_15_odds,
                snap.over_25_odds,
                snap.under_25_odds,
                snap.over_35_odds,
                snap.under_35_odds,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Latest odds snapshot for a match, if the fetch layer has quoted it.
    pub fn latest_odds(&self, match_id: i64) -> StoreResult<Option<OddsSnapshot>> {
        let conn = self.conn.lock().unwrap();
        let snap = conn
            .query_row(
                &format!(
                    "SELECT {ODDS_COLUMNS} FROM odds_history
                     WHERE match_id = ?1 ORDER BY recorded_at DESC, id DESC LIMIT 1"
                ),
                params![match_id],
                map_odds,
            )
            .optional()?;
        Ok(snap)
    }

    /// Full chronological odds history for a match, oldest first.
    pub fn odds_history(&self, match_id: i64) -> StoreResult<Vec<OddsSnapshot>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {ODDS_COLUMNS} FROM odds_history
             WHERE match_id = ?1 ORDER BY recorded_at, id"
        ))?;
        let snaps = stmt
            .query_map(params![match_id], map_odds)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(snaps)
    }

    // ── Signals ──────────────────────────────────────────────────────────────

    /// All signals stored for a match, ordered by rank (legacy rows last).
    pub fn signals_for_match(&self, match_id: i64) -> StoreResult<Vec<SignalRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SIGNAL_COLUMNS} FROM signals
             WHERE match_id = ?1
             ORDER BY rank_in_match IS NULL, rank_in_match, id"
        ))?;
        let signals = stmt
            .query_map(params![match_id], map_signal)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(signals)
    }

    /// Win/loss outcomes of the most recently created settled signals,
    /// oldest first, for streak-based stake adjustment.
    pub fn recent_signal_results(&self, limit: i64) -> StoreResult<Vec<bool>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT result_won FROM signals
             WHERE result_won IS NOT NULL
             ORDER BY created_at DESC, id DESC LIMIT ?1",
        )?;
        let mut results = stmt
            .query_map(params![limit], |row| row.get::<_, bool>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        results.reverse();
        Ok(results)
    }

    /// Unsettled signals whose match has finished, paired with the match.
    pub fn unsettled_signals(&self) -> StoreResult<Vec<(SignalRecord, MatchRecord)>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT s.id, s.match_id, s.created_at, s.market_key, s.suggested_bet,
                    s.predicted_prob, s.implied_prob, s.value_edge, s.bookmaker_odds,
                    s.has_bookmaker_odds, s.confidence_score, s.market_confidence,
                    s.consistency_pct, s.recommended_stake, s.rank_in_match,
                    s.patterns_detected, s.explanation, s.is_published, s.result_won,
                    m.id, m.external_id, m.utc_date, m.status, m.matchday,
                    m.home_team_id, m.away_team_id,
                    m.home_score, m.away_score, m.home_ht_score, m.away_ht_score,
                    m.predicted_home_prob, m.predicted_draw_prob, m.predicted_away_prob
             FROM signals s
             JOIN matches m ON m.id = s.match_id
             WHERE s.result_won IS NULL AND m.status = 'FINISHED'
             ORDER BY s.id",
        )?;
        let pairs = stmt
            .query_map([], |row| {
                let signal = map_signal(row)?;
                let m = MatchRecord {
                    id: row.get(19)?,
                    external_id: row.get(20)?,
                    utc_date: row.get(21)?,
                    status: MatchStatus::parse(&row.get::<_, String>(22)?),
                    matchday: row.get(23)?,
                    home_team_id: row.get(24)?,
                    away_team_id: row.get(25)?,
                    home_score: row.get(26)?,
                    away_score: row.get(27)?,
                    home_ht_score: row.get(28)?,
                    away_ht_score: row.get(29)?,
                    predicted_home_prob: row.get(30)?,
                    predicted_draw_prob: row.get(31)?,
                    predicted_away_prob: row.get(32)?,
                };
                Ok((signal, m))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(pairs)
    }

    /// Mark a signal as settled.
    pub fn set_signal_result(&self, signal_id: i64, won: bool) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE signals SET result_won = ?1 WHERE id = ?2",
            params![won, signal_id],
        )?;
        Ok(())
    }

    // ── Pattern reliability ──────────────────────────────────────────────────

    /// Persisted reliability aggregate for a pattern name, if any.
    pub fn pattern_stat(&self, name: &str) -> StoreResult<Option<PatternStat>> {
        let conn = self.conn.lock().unwrap();
        let stat = conn
            .query_row(
                "SELECT pattern_name, occurrences, wins, losses, reliability_score
                 FROM pattern_stats WHERE pattern_name = ?1",
                params![name],
                map_pattern_stat,
            )
            .optional()?;
        Ok(stat)
    }

    /// Record one settled occurrence of a pattern, creating the aggregate
    /// on first sight and recomputing its reliability score.
    pub fn record_pattern_result(&self, name: &str, won: bool) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let (win_inc, loss_inc) = if won { (1, 0) } else { (0, 1) };
        conn.execute(
            "INSERT INTO pattern_stats (pattern_name, occurrences, wins, losses, reliability_score)
             VALUES (?1, 1, ?2, ?3, ?4)
             ON CONFLICT(pattern_name) DO UPDATE SET
                occurrences = occurrences + 1,
                wins = wins + ?2,
                losses = losses + ?3,
                reliability_score = CAST(wins + ?2 AS REAL) / (occurrences + 1)",
            params![name, win_inc, loss_inc, if won { 1.0 } else { 0.0 }],
        )?;
        Ok(())
    }

    // ── Run commit ───────────────────────────────────────────────────────────

    /// Commit one pipeline run atomically: purge legacy signal sets, insert
    /// the new signals (assigning their row IDs in place) and write cached
    /// match probabilities. Either everything lands or nothing does.
    pub fn commit_run(
        &self,
        purge_match_ids: &[i64],
        signals: &mut [SignalRecord],
        prob_cache: &[(i64, f64, f64, f64)],
    ) -> StoreResult<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        for match_id in purge_match_ids {
            tx.execute("DELETE FROM signals WHERE match_id = ?1", params![match_id])?;
        }
        for signal in signals.iter_mut() {
            let patterns_json = serde_json::to_string(&signal.patterns_detected)?;
            tx.execute(
                "INSERT INTO signals (
                    match_id, created_at, market_key, suggested_bet,
                    predicted_prob, implied_prob, value_edge, bookmaker_odds,
                    has_bookmaker_odds, confidence_score, market_confidence,
                    consistency_pct, recommended_stake, rank_in_match,
                    patterns_detected, explanation, is_published, result_won
                 ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18)",
                params![
                    signal.match_id,
                    signal.created_at,
                    signal.market_key,
                    signal.suggested_bet,
                    signal.predicted_prob,
                    signal.implied_prob,
                    signal.value_edge,
                    signal.bookmaker_odds,
                    signal.has_bookmaker_odds,
                    signal.confidence_score,
                    signal.market_confidence,
                    signal.consistency_pct,
                    signal.recommended_stake,
                    signal.rank_in_match,
                    patterns_json,
                    signal.explanation,
                    signal.is_published,
                    signal.result_won,
                ],
            )?;
            signal.id = Some(tx.last_insert_rowid());
        }
        for (match_id, home, draw, away) in prob_cache {
            tx.execute(
                "UPDATE matches SET predicted_home_prob = ?1, predicted_draw_prob = ?2,
                        predicted_away_prob = ?3 WHERE id = ?4",
                params![home, draw, away, match_id],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}

// ── SQL helpers ────────────────────────────────────────────────────────────────

const MATCH_COLUMNS: &str = "id, external_id, utc_date, status, matchday, \
     home_team_id, away_team_id, home_score, away_score, home_ht_score, away_ht_score, \
     predicted_home_prob, predicted_draw_prob, predicted_away_prob";

const ODDS_COLUMNS: &str = "id, match_id, bookmaker, recorded_at, \
     home_odds, draw_odds, away_odds, over_15_odds, under_15_odds, \
     over_25_odds, under_25_odds, over_35_odds, under_35_odds";

const SIGNAL_COLUMNS: &str = "id, match_id, created_at, market_key, suggested_bet, \
     predicted_prob, implied_prob, value_edge, bookmaker_odds, has_bookmaker_odds, \
     confidence_score, market_confidence, consistency_pct, recommended_stake, \
     rank_in_match, patterns_detected, explanation, is_published, result_won";

fn map_match(row: &rusqlite::Row) -> rusqlite::Result<MatchRecord> {
    Ok(MatchRecord {
        id: row.get(0)?,
        external_id: row.get(1)?,
        utc_date: row.get(2)?,
        status: MatchStatus::parse(&row.get::<_, String>(3)?),
        matchday: row.get(4)?,
        home_team_id: row.get(5)?,
        away_team_id: row.get(6)?,
        home_score: row.get(7)?,
        away_score: row.get(8)?,
        home_ht_score: row.get(9)?,
        away_ht_score: row.get(10)?,
        predicted_home_prob: row.get(11)?,
        predicted_draw_prob: row.get(12)?,
        predicted_away_prob: row.get(13)?,
    })
}

fn map_odds(row: &rusqlite::Row) -> rusqlite::Result<OddsSnapshot> {
    Ok(OddsSnapshot {
        id: row.get(0)?,
        match_id: row.get(1)?,
        bookmaker: row.get(2)?,
        recorded_at: row.get(3)?,
        home_odds: row.get(4)?,
        draw_odds: row.get(5)?,
        away_odds: row.get(6)?,
        over_15_odds: row.get(7)?,
        under_15_odds: row.get(8)?,
        over_25_odds: row.get(9)?,
        under_25_odds: row.get(10)?,
        over_35_odds: row.get(11)?,
        under_35_odds: row.get(12)?,
    })
}

fn map_signal(row: &rusqlite::Row) -> rusqlite::Result<SignalRecord> {
    let patterns_json: String = row.get(15)?;
    Ok(SignalRecord {
        id: row.get(0)?,
        match_id: row.get(1)?,
        created_at: row.get(2)?,
        market_key: row.get(3)?,
        suggested_bet: row.get(4)?,
        predicted_prob: row.get(5)?,
        implied_prob: row.get(6)?,
        value_edge: row.get(7)?,
        bookmaker_odds: row.get(8)?,
        has_bookmaker_odds: row.get(9)?,
        confidence_score: row.get(10)?,
        market_confidence: row.get(11)?,
        consistency_pct: row.get(12)?,
        recommended_stake: row.get(13)?,
        rank_in_match: row.get(14)?,
        patterns_detected: serde_json::from_str(&patterns_json).unwrap_or_default(),
        explanation: row.get(16)?,
        is_published: row.get(17)?,
        result_won: row.get(18)?,
    })
}

fn map_pattern_stat(row: &rusqlite::Row) -> rusqlite::Result<PatternStat> {
    Ok(PatternStat {
        pattern_name: row.get(0)?,
        occurrences: row.get(1)?,
        wins: row.get(2)?,
        losses: row.get(3)?,
        reliability_score: row.get(4)?,
    })
}

/// SQLite schema (idempotent CREATE IF NOT EXISTS)
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS teams (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    external_id INTEGER NOT NULL UNIQUE,
    name        TEXT    NOT NULL,
    short_name  TEXT
);

CREATE TABLE IF NOT EXISTS matches (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    external_id         INTEGER NOT NULL UNIQUE,
    utc_date            TEXT    NOT NULL,
    status              TEXT    NOT NULL DEFAULT 'SCHEDULED',
    matchday            INTEGER,
    home_team_id        INTEGER NOT NULL,
    away_team_id        INTEGER NOT NULL,
    home_score          INTEGER,
    away_score          INTEGER,
    home_ht_score       INTEGER,
    away_ht_score       INTEGER,
    predicted_home_prob REAL,
    predicted_draw_prob REAL,
    predicted_away_prob REAL,
    FOREIGN KEY (home_team_id) REFERENCES teams(id),
    FOREIGN KEY (away_team_id) REFERENCES teams(id)
);

CREATE TABLE IF NOT EXISTS standings (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    snapshot_date   TEXT    NOT NULL,
    team_id         INTEGER NOT NULL,
    position        INTEGER NOT NULL,
    points          INTEGER NOT NULL,
    goal_difference INTEGER NOT NULL,
    FOREIGN KEY (team_id) REFERENCES teams(id)
);

CREATE TABLE IF NOT EXISTS odds_history (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    match_id      INTEGER NOT NULL,
    bookmaker     TEXT    NOT NULL DEFAULT 'average',
    recorded_at   TEXT    NOT NULL,
    home_odds     REAL,
    draw_odds     REAL,
    away_odds     REAL,
    over_15_odds  REAL,
    under_15_odds REAL,
    over_25_odds  REAL,
    under_25_odds REAL,
    over_35_odds  REAL,
    under_35_odds REAL,
    FOREIGN KEY (match_id) REFERENCES matches(id)
);

CREATE TABLE IF NOT EXISTS signals (
    id                 INTEGER PRIMARY KEY AUTOINCREMENT,
    match_id           INTEGER NOT NULL,
    created_at         TEXT    NOT NULL,
    market_key         TEXT    NOT NULL DEFAULT '1x2',
    suggested_bet      TEXT    NOT NULL,
    predicted_prob     REAL    NOT NULL,
    implied_prob       REAL    NOT NULL,
    value_edge         REAL    NOT NULL,
    bookmaker_odds     REAL    NOT NULL,
    has_bookmaker_odds INTEGER NOT NULL DEFAULT 1,
    confidence_score   REAL    NOT NULL,
    market_confidence  REAL    NOT NULL,
    consistency_pct    REAL    NOT NULL,
    recommended_stake  REAL    NOT NULL,
    rank_in_match      INTEGER,
    patterns_detected  TEXT    NOT NULL DEFAULT '[]',
    explanation        TEXT    NOT NULL DEFAULT '',
    is_published       INTEGER NOT NULL DEFAULT 0,
    result_won         INTEGER,
    FOREIGN KEY (match_id) REFERENCES matches(id)
);

CREATE TABLE IF NOT EXISTS pattern_stats (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    pattern_name      TEXT    NOT NULL UNIQUE,
    occurrences       INTEGER NOT NULL DEFAULT 0,
    wins              INTEGER NOT NULL DEFAULT 0,
    losses            INTEGER NOT NULL DEFAULT 0,
    reliability_score REAL    NOT NULL DEFAULT 0.5
);

CREATE TABLE IF NOT EXISTS bankroll_history (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    balance     REAL    NOT NULL,
    pnl         REAL    NOT NULL DEFAULT 0,
    recorded_at TEXT    NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_matches_status_date ON matches(status, utc_date);
CREATE INDEX IF NOT EXISTS idx_matches_home ON matches(home_team_id);
CREATE INDEX IF NOT EXISTS idx_matches_away ON matches(away_team_id);
CREATE INDEX IF NOT EXISTS idx_odds_match ON odds_history(match_id);
CREATE INDEX IF NOT EXISTS idx_signals_match ON signals(match_id);
CREATE INDEX IF NOT EXISTS idx_standings_date ON standings(snapshot_date);
"#;
