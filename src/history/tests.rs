use super::*;
use futures::stream;
use uuid::Uuid;

use crate::storage::InMemoryRepository;

fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 5, day).unwrap().and_hms_opt(h, m, 0).unwrap()
}

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, day).unwrap()
}

fn mbits(download: u64, upload: u64, timestamp: NaiveDateTime) -> Measurement {
    Measurement::new(Uuid::new_v4(), timestamp, download * 125_000, upload * 125_000)
}

/// Newest-first stream over the given records.
fn newest_first(mut records: Vec<Measurement>) -> impl Stream<Item = Result<Measurement, StorageError>> {
    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    stream::iter(records.into_iter().map(Ok))
}

#[test]
fn test_cutoff() {
    assert_eq!(History::cutoff(10, at(20, 11, 30)), Some(date(11)));
    assert_eq!(History::cutoff(1, at(20, 11, 30)), Some(date(20)));
    assert_eq!(History::cutoff(0, at(20, 11, 30)), None);
}

#[tokio::test]
async fn test_buckets_by_calendar_date() {
    let records = vec![
        mbits(90, 40, at(20, 0, 0)),
        mbits(80, 30, at(19, 23, 59)),
        mbits(85, 35, at(19, 0, 1)),
        mbits(70, 20, at(18, 12, 0)),
    ];
    let history = History::collect(newest_first(records), 10, at(20, 11, 30)).await.unwrap();

    assert_eq!(history.len(), 3);
    let dates: Vec<_> = history.iter().map(DayBucket::date).collect();
    assert_eq!(dates, vec![date(18), date(19), date(20)]);
    assert_eq!(history.get(date(19)).unwrap().len(), 2);
    for bucket in history.iter() {
        assert!(bucket.measurements().iter().all(|m| m.timestamp.date() == bucket.date()));
    }
}

#[tokio::test]
async fn test_excludes_days_before_window() {
    let records = vec![
        mbits(90, 40, at(20, 8, 0)),
        mbits(90, 40, at(11, 0, 0)),
        mbits(90, 40, at(10, 23, 59)),
        mbits(90, 40, at(1, 12, 0)),
    ];
    let history = History::collect(newest_first(records), 10, at(20, 11, 30)).await.unwrap();

    assert_eq!(history.len(), 2);
    assert!(history.get(date(11)).is_some());
    assert!(history.get(date(10)).is_none());
    assert!(history.get(date(1)).is_none());
}

#[tokio::test]
async fn test_stops_reading_at_first_old_record() {
    // An error placed after the first out-of-window record is never reached.
    let items = vec![
        Ok(mbits(90, 40, at(20, 8, 0))),
        Ok(mbits(90, 40, at(5, 8, 0))),
        Err(StorageError::corrupt_row("unreachable")),
    ];
    let history = History::collect(stream::iter(items), 10, at(20, 11, 30)).await.unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn test_read_error_inside_window_propagates() {
    let items = vec![
        Ok(mbits(90, 40, at(20, 8, 0))),
        Err(StorageError::corrupt_row("bad row")),
    ];
    let result = History::collect(stream::iter(items), 10, at(20, 11, 30)).await;
    assert!(matches!(result, Err(StorageError::CorruptRow(_))));
}

#[tokio::test]
async fn test_empty_stream_gives_empty_history() {
    let history = History::collect(newest_first(Vec::new()), 10, at(20, 11, 30)).await.unwrap();
    assert!(history.is_empty());
    assert!(!history.has_current_hour_entry(at(20, 11, 30)));
}

#[tokio::test]
async fn test_day_max_takes_each_direction_independently() {
    let records = vec![
        mbits(40, 70, at(20, 8, 0)),
        mbits(65, 20, at(20, 9, 0)),
        mbits(50, 50, at(20, 10, 0)),
    ];
    let history = History::collect(newest_first(records), 10, at(20, 11, 30)).await.unwrap();
    let max = history.get(date(20)).unwrap().max();
    assert_eq!(max.download, Mbits::from_hundredths(6_500));
    assert_eq!(max.upload, Mbits::from_hundredths(7_000));
}

#[test]
fn test_day_max_threshold_flag() {
    let low = DayMax {
        download: Mbits::from_hundredths(4_000),
        upload: Mbits::from_hundredths(9_000),
    };
    let ok = DayMax {
        download: Mbits::from_hundredths(6_000),
        upload: Mbits::from_hundredths(5_500),
    };
    assert!(low.is_below(50));
    assert!(!ok.is_below(50));
}

#[tokio::test]
async fn test_current_hour_detection() {
    let records = vec![mbits(90, 40, at(20, 10, 59)), mbits(90, 40, at(20, 11, 5))];
    let history = History::collect(newest_first(records), 10, at(20, 11, 30)).await.unwrap();
    assert!(history.has_current_hour_entry(at(20, 11, 30)));

    // At 10:30 only the earlier hour had been measured.
    let earlier = vec![mbits(90, 40, at(20, 9, 59))];
    let history = History::collect(newest_first(earlier), 10, at(20, 10, 30)).await.unwrap();
    assert!(!history.has_current_hour_entry(at(20, 10, 30)));
}

#[tokio::test]
async fn test_current_hour_ignores_other_days() {
    let records = vec![mbits(90, 40, at(19, 11, 45))];
    let history = History::collect(newest_first(records), 10, at(20, 11, 30)).await.unwrap();
    assert!(!history.has_current_hour_entry(at(20, 11, 30)));
}

#[tokio::test]
async fn test_load_from_repository() {
    let repo = InMemoryRepository::new();
    repo.write(&mbits(90, 40, at(20, 8, 0))).await.unwrap();
    repo.write(&mbits(90, 40, at(2, 8, 0))).await.unwrap();

    let history = History::load(&repo, DEFAULT_HISTORY_DAYS, at(20, 11, 30)).await.unwrap();
    assert_eq!(history.len(), 1);
}
