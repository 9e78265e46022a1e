//! Query catalog shared by the schema manager and the load orchestrator.
//!
//! Every statement is plain SQL text accepted by Redshift. Staging tables are a raw
//! landing zone; the analytical tables form the star schema (one fact table, four
//! dimensions). Redshift does not enforce primary keys and has no "distinct rows,
//! keep newest" primitive, so every insert ranks candidate rows with `ROW_NUMBER()`
//! and keeps rank 1.

use anyhow::{anyhow, Result};

use crate::config::WarehouseConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    StagingEvents,
    StagingSongs,
    Songplays,
    Users,
    Songs,
    Artists,
    Time,
}

impl Table {
    /// Creation order. Drops run in the same order; nothing references anything else.
    pub const ALL: [Table; 7] = [
        Table::StagingEvents,
        Table::StagingSongs,
        Table::Songplays,
        Table::Users,
        Table::Songs,
        Table::Artists,
        Table::Time,
    ];

    pub const STAGING: [Table; 2] = [Table::StagingEvents, Table::StagingSongs];

    /// Insert order. `time` reads from `songplays`, so songplays must come first.
    pub const ANALYTICAL: [Table; 5] = [
        Table::Songplays,
        Table::Users,
        Table::Songs,
        Table::Artists,
        Table::Time,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Table::StagingEvents => "staging_events",
            Table::StagingSongs => "staging_songs",
            Table::Songplays => "songplays",
            Table::Users => "users",
            Table::Songs => "songs",
            Table::Artists => "artists",
            Table::Time => "time",
        }
    }

    pub fn from_name(name: &str) -> Option<Table> {
        let wanted = name.trim().to_ascii_lowercase();
        Table::ALL.into_iter().find(|t| t.name() == wanted)
    }

    pub fn drop_sql(self) -> String {
        format!("DROP TABLE IF EXISTS {};", self.name())
    }

    pub fn create_sql(self) -> &'static str {
        match self {
            Table::StagingEvents => STAGING_EVENTS_CREATE,
            Table::StagingSongs => STAGING_SONGS_CREATE,
            Table::Songplays => SONGPLAYS_CREATE,
            Table::Users => USERS_CREATE,
            Table::Songs => SONGS_CREATE,
            Table::Artists => ARTISTS_CREATE,
            Table::Time => TIME_CREATE,
        }
    }

    /// Only analytical tables have an insert; staging tables are filled by COPY.
    pub fn insert_sql(self) -> Option<&'static str> {
        match self {
            Table::Songplays => Some(SONGPLAYS_INSERT),
            Table::Users => Some(USERS_INSERT),
            Table::Songs => Some(SONGS_INSERT),
            Table::Artists => Some(ARTISTS_INSERT),
            Table::Time => Some(TIME_INSERT),
            Table::StagingEvents | Table::StagingSongs => None,
        }
    }
}

/// Resolve a user-supplied table filter; `None` selects all seven tables.
pub fn select_tables(filter: Option<&[String]>) -> Result<Vec<Table>> {
    match filter {
        None => Ok(Table::ALL.to_vec()),
        Some(names) => names
            .iter()
            .map(|n| Table::from_name(n).ok_or_else(|| anyhow!("unknown table {n:?}")))
            .collect(),
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.name())
    }
}

/// A statement plus the short label used in logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub label: String,
    pub table: Table,
    pub sql: String,
}

impl Statement {
    fn new(verb: &str, table: Table, sql: impl Into<String>) -> Self {
        Self {
            label: format!("{verb} {}", table.name()),
            table,
            sql: sql.into(),
        }
    }
}

pub fn drop_table_queries() -> Vec<Statement> {
    Table::ALL
        .into_iter()
        .map(|t| Statement::new("drop", t, t.drop_sql()))
        .collect()
}

pub fn create_table_queries() -> Vec<Statement> {
    Table::ALL
        .into_iter()
        .map(|t| Statement::new("create", t, t.create_sql()))
        .collect()
}

/// Bulk loads from S3. Event logs need the JSONPaths manifest because their keys do
/// not match the column names; song files map one-to-one and use `JSON 'auto'`.
pub fn copy_table_queries(cfg: &WarehouseConfig) -> Vec<Statement> {
    let role = quote_literal(&cfg.iam_role_arn);
    let region = quote_literal(&cfg.s3.region);
    let events = format!(
        "COPY staging_events\nFROM {}\nIAM_ROLE {role}\nREGION {region}\nTIMEFORMAT AS 'epochmillisecs'\nJSON {};",
        quote_literal(&cfg.s3.log_data),
        quote_literal(&cfg.s3.log_jsonpath),
    );
    let songs = format!(
        "COPY staging_songs\nFROM {}\nIAM_ROLE {role}\nREGION {region}\nTIMEFORMAT AS 'epochmillisecs'\nJSON 'auto';",
        quote_literal(&cfg.s3.song_data),
    );
    vec![
        Statement::new("copy", Table::StagingEvents, events),
        Statement::new("copy", Table::StagingSongs, songs),
    ]
}

pub fn insert_table_queries() -> Vec<Statement> {
    Table::ANALYTICAL
        .into_iter()
        .filter_map(|t| t.insert_sql().map(|sql| Statement::new("insert", t, sql)))
        .collect()
}

/// Catalog lookup used for existence checks.
pub fn table_exists_sql(table: &str) -> String {
    format!(
        "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = {}",
        quote_literal(table)
    )
}

/// Single-quote a value for embedding in SQL text, doubling any embedded quote.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

const STAGING_EVENTS_CREATE: &str = "
CREATE TABLE IF NOT EXISTS staging_events (
    artist VARCHAR,
    auth VARCHAR,
    firstName VARCHAR,
    gender CHAR(1),
    itemInSession INT,
    lastName VARCHAR,
    length FLOAT,
    level VARCHAR,
    location VARCHAR,
    method VARCHAR,
    page VARCHAR,
    registration BIGINT,
    sessionId INT,
    song VARCHAR,
    status INT,
    ts BIGINT,
    userAgent VARCHAR,
    userId INT
);";

const STAGING_SONGS_CREATE: &str = "
CREATE TABLE IF NOT EXISTS staging_songs (
    num_songs INT,
    artist_id VARCHAR,
    artist_latitude FLOAT,
    artist_longitude FLOAT,
    artist_location VARCHAR,
    artist_name VARCHAR,
    song_id VARCHAR,
    title VARCHAR,
    duration FLOAT,
    year INT
);";

const SONGPLAYS_CREATE: &str = "
CREATE TABLE IF NOT EXISTS songplays (
    songplay_id INT IDENTITY(0,1) PRIMARY KEY,
    start_time TIMESTAMP NOT NULL,
    user_id INT NOT NULL,
    level VARCHAR,
    song_id VARCHAR NOT NULL,
    artist_id VARCHAR NOT NULL,
    session_id INT,
    location VARCHAR,
    user_agent VARCHAR
);";

const USERS_CREATE: &str = "
CREATE TABLE IF NOT EXISTS users (
    user_id INT PRIMARY KEY,
    first_name VARCHAR,
    last_name VARCHAR,
    gender CHAR(1),
    level VARCHAR NOT NULL
);";

const SONGS_CREATE: &str = "
CREATE TABLE IF NOT EXISTS songs (
    song_id VARCHAR PRIMARY KEY,
    title VARCHAR,
    artist_id VARCHAR NOT NULL,
    year INT,
    duration FLOAT
);";

const ARTISTS_CREATE: &str = "
CREATE TABLE IF NOT EXISTS artists (
    artist_id VARCHAR PRIMARY KEY,
    name VARCHAR,
    location VARCHAR,
    latitude FLOAT,
    longitude FLOAT
);";

const TIME_CREATE: &str = "
CREATE TABLE IF NOT EXISTS time (
    start_time TIMESTAMP PRIMARY KEY,
    hour INT,
    day INT,
    week INT,
    month INT,
    year INT,
    weekday INT
);";

// Title/artist-name equality is the only link between the two sources. Several
// staging songs can share a title and artist, so the join can fan out; the
// per-play ranking below collapses that back to one row.
// `PRIMARY KEY` is informational on Redshift, hence the NOT EXISTS guard against
// rows already in the table and the second ranking on (start_time, user_id).
const SONGPLAYS_INSERT: &str = "
INSERT INTO songplays (start_time, user_id, level, song_id, artist_id, session_id, location, user_agent)
WITH matched_events AS (
    SELECT TIMESTAMP 'epoch' + e.ts/1000 * INTERVAL '1 second' AS start_time,
           e.userId AS user_id,
           e.level,
           s.song_id,
           s.artist_id,
           e.sessionId AS session_id,
           e.location,
           e.userAgent AS user_agent,
           e.ts,
           ROW_NUMBER() OVER (PARTITION BY e.userId, e.sessionId, s.song_id, s.artist_id ORDER BY e.ts DESC) AS play_rank
    FROM staging_events e
    JOIN staging_songs s ON (e.song = s.title AND e.artist = s.artist_name)
    WHERE e.page = 'NextSong'
),
uniq_plays AS (
    SELECT start_time, user_id, level, song_id, artist_id, session_id, location, user_agent,
           ROW_NUMBER() OVER (PARTITION BY start_time, user_id ORDER BY ts DESC, song_id, artist_id) AS slot_rank
    FROM matched_events
    WHERE play_rank = 1
)
SELECT start_time, user_id, level, song_id, artist_id, session_id, location, user_agent
FROM uniq_plays u
WHERE u.slot_rank = 1
AND NOT EXISTS (
    SELECT 1
    FROM songplays sp
    WHERE sp.start_time = u.start_time
    AND sp.user_id = u.user_id
);";

// Latest event per user wins so `level` reflects the current subscription.
const USERS_INSERT: &str = "
INSERT INTO users (user_id, first_name, last_name, gender, level)
WITH uniq_staging_events AS (
    SELECT userId AS user_id,
           firstName AS first_name,
           lastName AS last_name,
           gender,
           level,
           ROW_NUMBER() OVER (PARTITION BY userId ORDER BY ts DESC) AS rank
    FROM staging_events
    WHERE page = 'NextSong'
    AND userId IS NOT NULL
)
SELECT user_id, first_name, last_name, gender, level
FROM uniq_staging_events
WHERE rank = 1;";

// Song files carry no recency signal; any row per key is acceptable.
const SONGS_INSERT: &str = "
INSERT INTO songs (song_id, title, artist_id, year, duration)
WITH uniq_staging_songs AS (
    SELECT song_id,
           title,
           artist_id,
           year,
           duration,
           ROW_NUMBER() OVER (PARTITION BY song_id ORDER BY song_id) AS rank
    FROM staging_songs
)
SELECT song_id, title, artist_id, year, duration
FROM uniq_staging_songs
WHERE rank = 1;";

const ARTISTS_INSERT: &str = "
INSERT INTO artists (artist_id, name, location, latitude, longitude)
WITH uniq_staging_artists AS (
    SELECT artist_id,
           artist_name AS name,
           artist_location AS location,
           artist_latitude AS latitude,
           artist_longitude AS longitude,
           ROW_NUMBER() OVER (PARTITION BY artist_id ORDER BY artist_id) AS rank
    FROM staging_songs
)
SELECT artist_id, name, location, latitude, longitude
FROM uniq_staging_artists
WHERE rank = 1;";

const TIME_INSERT: &str = "
INSERT INTO time (start_time, hour, day, week, month, year, weekday)
WITH uniq_songplays AS (
    SELECT start_time,
           EXTRACT(hour FROM start_time) AS hour,
           EXTRACT(day FROM start_time) AS day,
           EXTRACT(week FROM start_time) AS week,
           EXTRACT(month FROM start_time) AS month,
           EXTRACT(year FROM start_time) AS year,
           EXTRACT(weekday FROM start_time) AS weekday,
           ROW_NUMBER() OVER (PARTITION BY start_time ORDER BY start_time DESC) AS rank
    FROM songplays
)
SELECT start_time, hour, day, week, month, year, weekday
FROM uniq_songplays
WHERE rank = 1;";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClusterConfig, S3Config};

    fn sample_config() -> WarehouseConfig {
        WarehouseConfig {
            cluster: ClusterConfig {
                host: "localhost".into(),
                db_name: "dev".into(),
                db_user: "awsuser".into(),
                db_password: "secret".into(),
                port: 5439,
            },
            iam_role_arn: "arn:aws:iam::123456789012:role/dwhRole".into(),
            s3: S3Config {
                log_data: "s3://udacity-dend/log_data".into(),
                log_jsonpath: "s3://udacity-dend/log_json_path.json".into(),
                song_data: "s3://udacity-dend/song_data".into(),
                region: "us-west-2".into(),
            },
        }
    }

    #[test]
    fn drop_and_create_cover_all_seven_tables_in_order() {
        let drops = drop_table_queries();
        let creates = create_table_queries();
        assert_eq!(drops.len(), 7);
        assert_eq!(creates.len(), 7);
        for (i, t) in Table::ALL.iter().enumerate() {
            assert_eq!(drops[i].sql, format!("DROP TABLE IF EXISTS {};", t.name()));
            assert_eq!(creates[i].table, *t);
            assert!(creates[i]
                .sql
                .contains(&format!("CREATE TABLE IF NOT EXISTS {} (", t.name())));
        }
    }

    #[test]
    fn copy_statements_carry_location_role_and_format() {
        let copies = copy_table_queries(&sample_config());
        assert_eq!(copies.len(), 2);
        let events = &copies[0].sql;
        assert!(events.starts_with("COPY staging_events"));
        assert!(events.contains("FROM 's3://udacity-dend/log_data'"));
        assert!(events.contains("IAM_ROLE 'arn:aws:iam::123456789012:role/dwhRole'"));
        assert!(events.contains("REGION 'us-west-2'"));
        assert!(events.contains("JSON 's3://udacity-dend/log_json_path.json'"));
        let songs = &copies[1].sql;
        assert!(songs.starts_with("COPY staging_songs"));
        assert!(songs.contains("JSON 'auto'"));
        assert_eq!(copies[1].label, "copy staging_songs");
    }

    #[test]
    fn copy_values_are_quoted() {
        let mut cfg = sample_config();
        cfg.s3.song_data = "s3://bucket/it's".into();
        let copies = copy_table_queries(&cfg);
        assert!(copies[1].sql.contains("FROM 's3://bucket/it''s'"));
    }

    #[test]
    fn inserts_run_songplays_first_and_time_last() {
        let inserts = insert_table_queries();
        let order: Vec<Table> = inserts.iter().map(|s| s.table).collect();
        assert_eq!(order, Table::ANALYTICAL.to_vec());
        assert!(inserts[0].sql.contains("WHERE e.page = 'NextSong'"));
        assert!(inserts[0].sql.contains("NOT EXISTS"));
        assert!(inserts[4].sql.contains("FROM songplays"));
    }

    #[test]
    fn every_insert_keeps_rank_one() {
        for stmt in insert_table_queries() {
            assert!(stmt.sql.contains("ROW_NUMBER() OVER (PARTITION BY"), "{}", stmt.label);
            assert!(
                stmt.sql.contains("WHERE rank = 1") || stmt.sql.contains("slot_rank = 1"),
                "{}",
                stmt.label
            );
        }
    }

    #[test]
    fn table_lookup_by_name() {
        assert_eq!(Table::from_name(" Songplays "), Some(Table::Songplays));
        assert_eq!(Table::from_name("nope"), None);
        let picked = select_tables(Some(&["time".to_string(), "USERS".to_string()])).unwrap();
        assert_eq!(picked, vec![Table::Time, Table::Users]);
        assert!(select_tables(Some(&["plays".to_string()])).is_err());
        assert_eq!(select_tables(None).unwrap().len(), 7);
        assert_eq!(
            table_exists_sql("time"),
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = 'time'"
        );
    }
}
