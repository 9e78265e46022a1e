//! Row shapes for the staging and star-schema tables.

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One activity-log record, keyed the way the event log writes it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StagingEvent {
    pub artist: Option<String>,
    pub auth: Option<String>,
    pub first_name: Option<String>,
    pub gender: Option<String>,
    #[serde(deserialize_with = "lenient_int")]
    pub item_in_session: Option<i32>,
    pub last_name: Option<String>,
    pub length: Option<f64>,
    pub level: Option<String>,
    pub location: Option<String>,
    pub method: Option<String>,
    pub page: Option<String>,
    #[serde(deserialize_with = "lenient_int")]
    pub registration: Option<i64>,
    #[serde(deserialize_with = "lenient_int")]
    pub session_id: Option<i32>,
    pub song: Option<String>,
    #[serde(deserialize_with = "lenient_int")]
    pub status: Option<i32>,
    /// Milliseconds since the Unix epoch.
    #[serde(deserialize_with = "lenient_int")]
    pub ts: Option<i64>,
    pub user_agent: Option<String>,
    #[serde(deserialize_with = "lenient_int")]
    pub user_id: Option<i32>,
}

impl StagingEvent {
    pub fn is_song_play(&self) -> bool {
        self.page.as_deref() == Some("NextSong")
    }
}

/// One song-catalog record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StagingSong {
    #[serde(deserialize_with = "lenient_int")]
    pub num_songs: Option<i32>,
    pub artist_id: Option<String>,
    pub artist_latitude: Option<f64>,
    pub artist_longitude: Option<f64>,
    pub artist_location: Option<String>,
    pub artist_name: Option<String>,
    pub song_id: Option<String>,
    pub title: Option<String>,
    pub duration: Option<f64>,
    #[serde(deserialize_with = "lenient_int")]
    pub year: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Songplay {
    pub songplay_id: i64,
    pub start_time: NaiveDateTime,
    pub user_id: i32,
    pub level: Option<String>,
    pub song_id: String,
    pub artist_id: String,
    pub session_id: Option<i32>,
    pub location: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub user_id: i32,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<String>,
    pub level: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Song {
    pub song_id: String,
    pub title: Option<String>,
    pub artist_id: String,
    pub year: Option<i32>,
    pub duration: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Artist {
    pub artist_id: String,
    pub name: Option<String>,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeRow {
    pub start_time: NaiveDateTime,
    pub hour: i32,
    pub day: i32,
    pub week: i32,
    pub month: i32,
    pub year: i32,
    pub weekday: i32,
}

/// Integer columns arrive as numbers, numeric strings, floats (`1540919166796.0`)
/// or empty strings depending on the producer. Empty and null both mean NULL.
fn lenient_int<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<i64>,
{
    use serde::de::Error;

    let raw = Option::<Value>::deserialize(deserializer)?;
    let as_i64 = match raw {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(v) => v,
            None => n
                .as_f64()
                .and_then(whole_number)
                .ok_or_else(|| D::Error::custom(format!("not an integer: {n}")))?,
        },
        Some(Value::String(s)) => {
            let s = s.trim();
            if s.is_empty() {
                return Ok(None);
            }
            match s.parse::<i64>() {
                Ok(v) => v,
                Err(_) => s
                    .parse::<f64>()
                    .ok()
                    .and_then(whole_number)
                    .ok_or_else(|| D::Error::custom(format!("not an integer: {s:?}")))?,
            }
        }
        Some(other) => return Err(D::Error::custom(format!("not an integer: {other}"))),
    };
    T::try_from(as_i64)
        .map(Some)
        .map_err(|_| D::Error::custom(format!("integer out of range: {as_i64}")))
}

/// `1540919166796.0` is accepted; fractions and values outside i64 are not.
fn whole_number(f: f64) -> Option<i64> {
    // i64::MAX as f64 rounds up to 2^63, which is already out of range.
    let in_range = f >= i64::MIN as f64 && f < i64::MAX as f64;
    (f.is_finite() && f.fract() == 0.0 && in_range).then(|| f as i64)
}
