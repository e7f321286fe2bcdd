//! Persisted backfill watermark: a small file holding the last UTC date
//! historical backfill ran, so it runs at most once per day.

use std::path::Path;

use chrono::{NaiveDate, Utc};

pub fn read(path: &Path) -> Option<NaiveDate> {
    let raw = std::fs::read_to_string(path).ok()?;
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

pub fn write(path: &Path, date: NaiveDate) -> std::io::Result<()> {
    std::fs::write(path, date.format("%Y-%m-%d").to_string())
}

pub fn needs_backfill_today(path: &Path) -> bool {
    read(path).map(|d| d != Utc::now().date_naive()).unwrap_or(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_needs_backfill() {
        let dir = std::env::temp_dir().join(format!("watermark-test-{}", std::process::id()));
        assert!(needs_backfill_today(&dir));
    }

    #[test]
    fn todays_watermark_skips_backfill() {
        let path = std::env::temp_dir().join(format!("watermark-today-{}", std::process::id()));
        write(&path, Utc::now().date_naive()).unwrap();
        assert!(!needs_backfill_today(&path));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn stale_watermark_needs_backfill() {
        let path = std::env::temp_dir().join(format!("watermark-stale-{}", std::process::id()));
        write(&path, NaiveDate::from_ymd_opt(2000, 1, 1).unwrap()).unwrap();
        assert!(needs_backfill_today(&path));
        std::fs::remove_file(&path).ok();
    }
}
