use anyhow::{anyhow, Result};
use chrono::{DateTime, Datelike, NaiveDateTime, Timelike};
use serde::Serialize;
use std::collections::HashMap;

use super::dedup::{asc_nulls_last, desc_nulls_first, first_per_key};
use super::model::{Artist, Song, Songplay, StagingEvent, StagingSong, TimeRow, User};
use crate::sql_queries::Table;

/// `TIMESTAMP 'epoch' + ts/1000 * INTERVAL '1 second'`: whole seconds, integer division.
pub fn epoch_millis_to_timestamp(ts: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp(ts / 1000, 0).map(|dt| dt.naive_utc())
}

impl TimeRow {
    /// Calendar fields as `EXTRACT` reports them: ISO week, weekday 0 = Sunday.
    pub fn from_start_time(start_time: NaiveDateTime) -> Self {
        Self {
            start_time,
            hour: start_time.hour() as i32,
            day: start_time.day() as i32,
            week: start_time.iso_week().week() as i32,
            month: start_time.month() as i32,
            year: start_time.year(),
            weekday: start_time.weekday().num_days_from_sunday() as i32,
        }
    }
}

/// Contents of both staging tables.
#[derive(Debug, Clone, Default)]
pub struct Staging {
    pub events: Vec<StagingEvent>,
    pub songs: Vec<StagingSong>,
}

/// A songplay candidate before NOT NULL columns are enforced.
struct PlayCandidate<'a> {
    event: &'a StagingEvent,
    song: &'a StagingSong,
    start_time: Option<NaiveDateTime>,
}

/// Songplay rows to add on top of `existing`.
///
/// Joins NextSong events to songs on (title, artist name), keeps the latest event per
/// (user, session, song, artist), then at most one row per (start_time, user_id), and
/// drops any pair `existing` already holds.
pub fn songplays(
    events: &[StagingEvent],
    songs: &[StagingSong],
    existing: &[Songplay],
) -> Result<Vec<Songplay>> {
    let mut by_title_artist: HashMap<(&str, &str), Vec<&StagingSong>> = HashMap::new();
    for song in songs {
        if let (Some(title), Some(artist)) = (song.title.as_deref(), song.artist_name.as_deref()) {
            by_title_artist.entry((title, artist)).or_default().push(song);
        }
    }

    let mut candidates = Vec::new();
    for event in events.iter().filter(|e| e.is_song_play()) {
        let (Some(title), Some(artist)) = (event.song.as_deref(), event.artist.as_deref()) else {
            continue;
        };
        let Some(matches) = by_title_artist.get(&(title, artist)) else {
            continue;
        };
        for &song in matches {
            candidates.push(PlayCandidate {
                event,
                song,
                start_time: event.ts.and_then(epoch_millis_to_timestamp),
            });
        }
    }

    let per_play = first_per_key(
        candidates,
        |c| {
            (
                c.event.user_id,
                c.event.session_id,
                c.song.song_id.clone(),
                c.song.artist_id.clone(),
            )
        },
        |a, b| desc_nulls_first(&a.event.ts, &b.event.ts),
    );
    let per_slot = first_per_key(
        per_play,
        |c| (c.start_time, c.event.user_id),
        |a, b| {
            desc_nulls_first(&a.event.ts, &b.event.ts)
                .then_with(|| asc_nulls_last(&a.song.song_id, &b.song.song_id))
                .then_with(|| asc_nulls_last(&a.song.artist_id, &b.song.artist_id))
        },
    );

    let mut next_id = existing.iter().map(|s| s.songplay_id + 1).max().unwrap_or(0);
    let mut out = Vec::new();
    for c in per_slot {
        // NULL never equals anything, so a NULL key is never suppressed here.
        let already_present = existing.iter().any(|sp| {
            Some(sp.start_time) == c.start_time && Some(sp.user_id) == c.event.user_id
        });
        if already_present {
            continue;
        }
        out.push(Songplay {
            songplay_id: next_id,
            start_time: c.start_time.ok_or_else(|| not_null(Table::Songplays, "start_time"))?,
            user_id: c.event.user_id.ok_or_else(|| not_null(Table::Songplays, "user_id"))?,
            level: c.event.level.clone(),
            song_id: c
                .song
                .song_id
                .clone()
                .ok_or_else(|| not_null(Table::Songplays, "song_id"))?,
            artist_id: c
                .song
                .artist_id
                .clone()
                .ok_or_else(|| not_null(Table::Songplays, "artist_id"))?,
            session_id: c.event.session_id,
            location: c.event.location.clone(),
            user_agent: c.event.user_agent.clone(),
        });
        next_id += 1;
    }
    Ok(out)
}

/// Latest NextSong event per user.
pub fn users(events: &[StagingEvent]) -> Result<Vec<User>> {
    let latest = first_per_key(
        events
            .iter()
            .filter(|e| e.is_song_play() && e.user_id.is_some()),
        |e| e.user_id,
        |a, b| desc_nulls_first(&a.ts, &b.ts),
    );
    latest
        .into_iter()
        .map(|e| {
            Ok(User {
                user_id: e.user_id.ok_or_else(|| not_null(Table::Users, "user_id"))?,
                first_name: e.first_name.clone(),
                last_name: e.last_name.clone(),
                gender: e.gender.clone(),
                level: e.level.clone().ok_or_else(|| not_null(Table::Users, "level"))?,
            })
        })
        .collect()
}

/// First row seen per song_id.
pub fn songs(staged: &[StagingSong]) -> Result<Vec<Song>> {
    first_per_key(staged.iter(), |s| s.song_id.clone(), |_, _| std::cmp::Ordering::Equal)
        .into_iter()
        .map(|s| {
            Ok(Song {
                song_id: s.song_id.clone().ok_or_else(|| not_null(Table::Songs, "song_id"))?,
                title: s.title.clone(),
                artist_id: s
                    .artist_id
                    .clone()
                    .ok_or_else(|| not_null(Table::Songs, "artist_id"))?,
                year: s.year,
                duration: s.duration,
            })
        })
        .collect()
}

/// First row seen per artist_id.
pub fn artists(staged: &[StagingSong]) -> Result<Vec<Artist>> {
    first_per_key(staged.iter(), |s| s.artist_id.clone(), |_, _| std::cmp::Ordering::Equal)
        .into_iter()
        .map(|s| {
            Ok(Artist {
                artist_id: s
                    .artist_id
                    .clone()
                    .ok_or_else(|| not_null(Table::Artists, "artist_id"))?,
                name: s.artist_name.clone(),
                location: s.artist_location.clone(),
                latitude: s.artist_latitude,
                longitude: s.artist_longitude,
            })
        })
        .collect()
}

/// One row per distinct start_time in `plays`.
pub fn time(plays: &[Songplay]) -> Vec<TimeRow> {
    first_per_key(plays.iter(), |p| p.start_time, |_, _| std::cmp::Ordering::Equal)
        .into_iter()
        .map(|p| TimeRow::from_start_time(p.start_time))
        .collect()
}

fn not_null(table: Table, column: &str) -> anyhow::Error {
    anyhow!("insert {table} failed: NULL value in NOT NULL column {column}")
}

/// The five analytical tables, populated the way the warehouse inserts populate them.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StarSchema {
    pub songplays: Vec<Songplay>,
    pub users: Vec<User>,
    pub songs: Vec<Song>,
    pub artists: Vec<Artist>,
    pub time: Vec<TimeRow>,
}

impl StarSchema {
    pub fn build(staging: &Staging) -> Result<Self> {
        let mut schema = Self::default();
        schema.insert_all(staging)?;
        Ok(schema)
    }

    /// One pass of the insert step, appending to what is already there. Only
    /// songplays guards against rows from an earlier pass.
    pub fn insert_all(&mut self, staging: &Staging) -> Result<()> {
        let plays = songplays(&staging.events, &staging.songs, &self.songplays)?;
        self.songplays.extend(plays);
        self.users.extend(users(&staging.events)?);
        self.songs.extend(songs(&staging.songs)?);
        self.artists.extend(artists(&staging.songs)?);
        self.time.extend(time(&self.songplays));
        Ok(())
    }

    pub fn row_counts(&self) -> [(Table, usize); 5] {
        [
            (Table::Songplays, self.songplays.len()),
            (Table::Users, self.users.len()),
            (Table::Songs, self.songs.len()),
            (Table::Artists, self.artists.len()),
            (Table::Time, self.time.len()),
        ]
    }
}
