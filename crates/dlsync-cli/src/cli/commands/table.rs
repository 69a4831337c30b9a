//! Plain-text download table shared by `status` and `watch`.

use chrono::{DateTime, Utc};
use dlsync_core::record::DownloadRecord;
use dlsync_core::relative_time;

pub fn render<'a>(records: impl Iterator<Item = &'a DownloadRecord>, now: DateTime<Utc>) -> String {
    let mut out = format!(
        "{:<12} {:<10} {:>4} {:<16} {}\n",
        "KEY", "STATUS", "PCT", "CREATED", "NAME"
    );
    for r in records {
        let created = r
            .created_at
            .map(|ts| relative_time::readable_period(ts, now))
            .unwrap_or_else(|| "-".to_string());
        let name = if r.display_name.is_empty() {
            r.filepath.as_str()
        } else {
            r.display_name.as_str()
        };
        out.push_str(&format!(
            "{:<12} {:<10} {:>3}% {:<16} {}\n",
            r.key,
            r.status().as_str(),
            r.percentage,
            created,
            name
        ));
        if let Some(err) = &r.error_message {
            out.push_str(&format!("{:<12} error: {}\n", "", err));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_record_shows_error_line() {
        let now = Utc::now();
        let records = vec![DownloadRecord {
            key: "d1".into(),
            display_name: "report.csv".into(),
            created_at: Some(now - chrono::Duration::seconds(120)),
            percentage: 30,
            complete: true,
            error_message: Some("disk full".into()),
            ..Default::default()
        }];
        let text = render(records.iter(), now);
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("d1"));
        assert!(lines[1].contains("failed"));
        assert!(lines[1].contains("2 minutes ago"));
        assert!(lines[2].ends_with("error: disk full"));
    }
}
