//! Integration tests for playlake

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{Array, Int32Array, Int64Array, RecordBatch, StringArray};
use bytes::Bytes;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::{Value, json};
use tempfile::TempDir;

use playlake::{Config, StoragePool, Table, run_pipeline};

mod config_tests {
    use super::*;

    #[test]
    fn test_config_yaml_parsing() {
        let yaml = r#"
input_root: s3a://udacity-dend
output_root: s3://my-output/star
storage_options:
  aws_region: us-west-2
time:
  utc_offset: "-05:00"
sink:
  compression: zstd
tables:
  time:
    partition_by: [year, month]
"#;
        let config = Config::parse(yaml).unwrap();

        assert_eq!(config.output_root, "s3://my-output/star");
        assert_eq!(config.storage_options.get("aws_region").unwrap(), "us-west-2");
        assert_eq!(config.time.offset().unwrap().local_minus_utc(), -5 * 3600);
        assert_eq!(config.layout(Table::Time).partition_by, vec!["year", "month"]);
        assert_eq!(
            config.table_url(&config.layout(Table::Song)),
            "s3://my-output/star/song/song.parquet"
        );
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::parse("").unwrap();

        assert_eq!(config.input_root, "s3a://udacity-dend");
        assert_eq!(config.output_root, "s3a://udacity-dend-project-output");
        assert_eq!(
            config.song_data_pattern(),
            "s3a://udacity-dend/song_data/*/*/*/*.json"
        );
        assert_eq!(
            config.log_data_pattern(),
            "s3a://udacity-dend/log_data/*/*/*.json"
        );
        assert!(config.layout(Table::User).partition_by.is_empty());
    }

    #[test]
    fn test_unknown_partition_column_is_rejected() {
        let yaml = r#"
tables:
  users:
    partition_by: [month]
"#;
        assert!(Config::parse(yaml).is_err());
    }
}

mod pipeline_tests {
    use super::*;

    fn write_json(path: PathBuf, values: &[Value]) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let lines: Vec<String> = values.iter().map(|v| v.to_string()).collect();
        std::fs::write(path, lines.join("\n")).unwrap();
    }

    fn song(id: &str, title: &str, artist: &str, year: i64, duration: f64) -> Value {
        json!({
            "num_songs": 1,
            "song_id": id,
            "title": title,
            "artist_id": artist,
            "artist_name": format!("{artist} name"),
            "artist_location": "",
            "artist_latitude": null,
            "artist_longitude": null,
            "year": year,
            "duration": duration,
        })
    }

    fn event(ts: Value, page: &str, song: Option<&str>, length: Option<f64>) -> Value {
        json!({
            "artist": null,
            "auth": "Logged In",
            "firstName": "Kaylee",
            "gender": "F",
            "lastName": "Summers",
            "length": length,
            "level": "free",
            "location": "Phoenix-Mesa-Scottsdale, AZ",
            "method": "PUT",
            "page": page,
            "sessionId": 139,
            "song": song,
            "ts": ts,
            "userAgent": "Mozilla/5.0",
            "userId": "8",
        })
    }

    /// Input tree with one plain match, one ambiguous match, one unmatched
    /// play, one play with a null timestamp and one non-play event.
    fn write_input(root: &Path) {
        let songs = root.join("song_data/A");
        write_json(
            songs.join("A/A/TRAAAAW128F429D538.json"),
            &[song("SOROKKO", "Rokkoo", "ARROKKO", 2001, 189.9)],
        );
        write_json(
            songs.join("A/B/TRAABJL12903CDCF1A.json"),
            &[song("SOINTRO1", "Intro", "AR/DC", 0, 60.0)],
        );
        write_json(
            songs.join("B/A/TRABAAA128F4234567.json"),
            &[song("SOINTRO2", "Intro", "ARTWO", 1999, 60.0)],
        );

        write_json(
            root.join("log_data/2018/11/2018-11-12-events.json"),
            &[
                event(json!(1541990258796i64), "NextSong", Some("Rokkoo"), Some(189.9)),
                event(json!(1541990264796i64), "Home", None, None),
                event(json!(1541990270796i64), "NextSong", Some("Unknown"), Some(200.0)),
                event(json!(1541990276796i64), "NextSong", Some("Intro"), Some(60.0)),
                event(Value::Null, "NextSong", Some("Rokkoo"), Some(189.9)),
            ],
        );
    }

    fn config(temp_dir: &TempDir) -> Config {
        Config {
            input_root: temp_dir.path().join("in").display().to_string(),
            output_root: temp_dir.path().join("out").display().to_string(),
            ..Default::default()
        }
    }

    fn pool() -> Arc<StoragePool> {
        Arc::new(StoragePool::new(Default::default()))
    }

    /// Every file below `root`, keyed by relative path.
    fn files_under(root: &Path) -> BTreeMap<String, Vec<u8>> {
        let mut out = BTreeMap::new();
        let mut stack = vec![root.to_path_buf()];
        while let Some(dir) = stack.pop() {
            let Ok(entries) = std::fs::read_dir(&dir) else {
                continue;
            };
            for entry in entries {
                let path = entry.unwrap().path();
                if path.is_dir() {
                    stack.push(path);
                } else {
                    let rel = path.strip_prefix(root).unwrap().to_string_lossy().to_string();
                    out.insert(rel, std::fs::read(&path).unwrap());
                }
            }
        }
        out
    }

    fn data_files(root: &Path) -> Vec<(String, RecordBatch)> {
        files_under(root)
            .into_iter()
            .filter(|(path, _)| path.ends_with(".parquet"))
            .flat_map(|(path, bytes)| {
                ParquetRecordBatchReaderBuilder::try_new(Bytes::from(bytes))
                    .unwrap()
                    .build()
                    .unwrap()
                    .map(move |batch| (path.clone(), batch.unwrap()))
            })
            .collect()
    }

    fn row_count(root: &Path) -> usize {
        data_files(root).iter().map(|(_, b)| b.num_rows()).sum()
    }

    #[tokio::test]
    async fn test_full_run() {
        let temp_dir = TempDir::new().unwrap();
        write_input(&temp_dir.path().join("in"));
        let out = temp_dir.path().join("out");

        let summary = run_pipeline(config(&temp_dir), pool()).await.unwrap();

        assert_eq!(summary.song.records, 3);
        assert_eq!(summary.log.events, 5);
        assert_eq!(summary.log.plays, 4);
        assert_eq!(summary.log.malformed_timestamps, 1);
        assert_eq!(summary.log.unmatched_plays, 1);
        assert_eq!(summary.log.ambiguous_plays, 1);
        assert_eq!(summary.log.extra_fact_rows, 1);

        // Song and artist: one row per catalog record.
        assert_eq!(row_count(&out.join("song/song.parquet")), 3);
        assert_eq!(row_count(&out.join("artist/artist.parquet")), 3);

        // Users: one row per play, timestamp or not.
        assert_eq!(row_count(&out.join("users/users_parquet")), 4);

        // Time: plays with a decodable timestamp.
        assert_eq!(row_count(&out.join("time/time.parquet")), 3);

        // Facts: Rokkoo once, Intro twice.
        assert_eq!(row_count(&out.join("songplay/songplay.parquet")), 3);
        assert_eq!(summary.table(Table::SongPlay).unwrap().rows, 3);
    }

    #[tokio::test]
    async fn test_partition_layout() {
        let temp_dir = TempDir::new().unwrap();
        write_input(&temp_dir.path().join("in"));
        let out = temp_dir.path().join("out");

        run_pipeline(config(&temp_dir), pool()).await.unwrap();

        let songs: Vec<String> = files_under(&out.join("song/song.parquet"))
            .into_keys()
            .collect();
        assert_eq!(
            songs,
            vec![
                "_SUCCESS",
                "year=0/artist_id=AR%2FDC/part-00000.snappy.parquet",
                "year=1999/artist_id=ARTWO/part-00000.snappy.parquet",
                "year=2001/artist_id=ARROKKO/part-00000.snappy.parquet",
            ]
        );

        let plays: Vec<String> = files_under(&out.join("songplay/songplay.parquet"))
            .into_keys()
            .collect();
        assert_eq!(
            plays,
            vec!["_SUCCESS", "year=2018/month=11/part-00000.snappy.parquet"]
        );

        let users: Vec<String> = files_under(&out.join("users/users_parquet"))
            .into_keys()
            .collect();
        assert_eq!(users, vec!["_SUCCESS", "part-00000.snappy.parquet"]);
    }

    #[tokio::test]
    async fn test_fact_and_time_columns() {
        let temp_dir = TempDir::new().unwrap();
        write_input(&temp_dir.path().join("in"));
        let out = temp_dir.path().join("out");

        run_pipeline(config(&temp_dir), pool()).await.unwrap();

        let facts = data_files(&out.join("songplay/songplay.parquet"));
        let (_, batch) = &facts[0];
        let names: Vec<_> = batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect();
        assert_eq!(
            names,
            vec![
                "start_time",
                "user_id",
                "level",
                "song_id",
                "artist_id",
                "session_id",
                "location",
                "user_agent"
            ]
        );

        let start = batch
            .column(0)
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        let song_ids = batch
            .column(3)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        let rokkoo = (0..batch.num_rows())
            .find(|&i| song_ids.value(i) == "SOROKKO")
            .unwrap();
        assert_eq!(start.value(rokkoo), 1541990258796);

        let artist_ids = batch
            .column(4)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(artist_ids.value(rokkoo), "ARROKKO");

        let times = data_files(&out.join("time/time.parquet"));
        let (_, time) = &times[0];
        let start_time = time
            .column_by_name("start_time")
            .unwrap()
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        let week = time
            .column_by_name("week")
            .unwrap()
            .as_any()
            .downcast_ref::<Int32Array>()
            .unwrap();
        let weekday = time
            .column_by_name("weekday")
            .unwrap()
            .as_any()
            .downcast_ref::<Int32Array>()
            .unwrap();
        assert_eq!(start_time.value(0), "02:37:38");
        assert_eq!(week.value(0), 46);
        assert_eq!(weekday.value(0), 1);
        assert_eq!(time.column_by_name("year").unwrap().null_count(), 0);
    }

    #[tokio::test]
    async fn test_rerun_is_byte_identical() {
        let temp_dir = TempDir::new().unwrap();
        write_input(&temp_dir.path().join("in"));
        let out = temp_dir.path().join("out");

        run_pipeline(config(&temp_dir), pool()).await.unwrap();
        let first = files_under(&out);
        let summary = run_pipeline(config(&temp_dir), pool()).await.unwrap();
        let second = files_under(&out);

        assert_eq!(first, second);
        assert!(summary.tables().all(|t| t.overwritten > 0));
    }

    #[tokio::test]
    async fn test_rerun_replaces_previous_rows() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("in");
        write_input(&input);
        let out = temp_dir.path().join("out");

        run_pipeline(config(&temp_dir), pool()).await.unwrap();

        std::fs::remove_file(input.join("song_data/A/B/A/TRABAAA128F4234567.json")).unwrap();
        std::fs::remove_file(input.join("song_data/A/A/B/TRAABJL12903CDCF1A.json")).unwrap();
        let summary = run_pipeline(config(&temp_dir), pool()).await.unwrap();

        assert_eq!(row_count(&out.join("song/song.parquet")), 1);
        assert_eq!(row_count(&out.join("artist/artist.parquet")), 1);
        assert_eq!(row_count(&out.join("songplay/songplay.parquet")), 1);
        assert_eq!(summary.log.unmatched_plays, 2);
        assert_eq!(summary.log.ambiguous_plays, 0);
    }

    #[tokio::test]
    async fn test_rerun_drops_stale_escaped_partitions() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("in");
        write_input(&input);
        let out = temp_dir.path().join("out");

        run_pipeline(config(&temp_dir), pool()).await.unwrap();

        write_json(
            input.join("song_data/A/A/B/TRAABJL12903CDCF1A.json"),
            &[song("SOINTRO1", "Intro", "AR:1", 0, 60.0)],
        );
        let summary = run_pipeline(config(&temp_dir), pool()).await.unwrap();

        let artists: Vec<String> = files_under(&out.join("artist/artist.parquet"))
            .into_keys()
            .filter(|path| path.ends_with(".parquet"))
            .collect();
        assert_eq!(
            artists,
            vec![
                "artist_id=AR%3A1/artist_name=AR%3A1 name/part-00000.snappy.parquet",
                "artist_id=ARROKKO/artist_name=ARROKKO name/part-00000.snappy.parquet",
                "artist_id=ARTWO/artist_name=ARTWO name/part-00000.snappy.parquet",
            ]
        );

        // The escaped artist id reads back intact and still joins.
        assert_eq!(summary.log.ambiguous_plays, 1);
        let facts = data_files(&out.join("songplay/songplay.parquet"));
        let mut artist_ids: Vec<String> = facts
            .iter()
            .flat_map(|(_, batch)| {
                let ids = batch
                    .column_by_name("artist_id")
                    .unwrap()
                    .as_any()
                    .downcast_ref::<StringArray>()
                    .unwrap()
                    .clone();
                (0..ids.len()).map(move |i| ids.value(i).to_string())
            })
            .collect();
        artist_ids.sort();
        assert_eq!(artist_ids, vec!["AR:1", "ARROKKO", "ARTWO"]);
    }

    #[tokio::test]
    async fn test_time_partitioning_override() {
        let temp_dir = TempDir::new().unwrap();
        write_input(&temp_dir.path().join("in"));
        let out = temp_dir.path().join("out");

        let mut config = config(&temp_dir);
        config.tables.time.partition_by = Some(vec!["year".to_string(), "month".to_string()]);
        run_pipeline(config, pool()).await.unwrap();

        let times: Vec<String> = files_under(&out.join("time/time.parquet"))
            .into_keys()
            .collect();
        assert_eq!(
            times,
            vec!["_SUCCESS", "year=2018/month=11/part-00000.snappy.parquet"]
        );
    }
}
