use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::descriptor::RequestDescriptor;
use crate::outcome::{FailureKind, Outcome, OutcomeRecord};

/// `VolleyReport_<date>.log` inside `dir`.
#[must_use]
pub fn default_report_path(dir: &Path, date: DateTime<Utc>) -> PathBuf {
    dir.join(format!("VolleyReport_{}.log", date.format("%Y-%m-%d")))
}

/// Writes one line per record, oldest attempt first:
///
/// `timestamp,id,elapsed_ms,status|NULL,METHOD,url[,body][,Failure:...][,correlation]`
///
/// Records that started at the same instant keep their scheduling order.
pub fn write_report<W: Write>(
    writer: &mut W,
    descriptor: &RequestDescriptor,
    records: &[OutcomeRecord],
) -> io::Result<()> {
    let mut ordered: Vec<&OutcomeRecord> = records.iter().collect();
    ordered.sort_by_key(|r| r.timestamp);
    for record in ordered {
        writeln!(writer, "{}", report_line(descriptor, record))?;
    }
    Ok(())
}

/// Appends to `path`, creating it if needed. Writes nothing for an empty run.
pub fn append_report(
    path: &Path,
    descriptor: &RequestDescriptor,
    records: &[OutcomeRecord],
) -> io::Result<()> {
    if records.is_empty() {
        return Ok(());
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = BufWriter::new(file);
    write_report(&mut writer, descriptor, records)?;
    writer.flush()
}

#[must_use]
pub fn report_line(descriptor: &RequestDescriptor, record: &OutcomeRecord) -> String {
    let status = match record.status() {
        Some(status) => status.as_u16().to_string(),
        None => "NULL".to_string(),
    };
    let mut line = format!(
        "{}.{:04},{},{},{},{},{}",
        record.timestamp.format("%Y-%m-%d %H:%M:%S"),
        record.timestamp.timestamp_subsec_micros() / 100,
        record.id,
        record.elapsed_millis,
        status,
        descriptor.method(),
        descriptor.endpoint(),
    );
    match &record.outcome {
        Outcome::Succeeded(resp) => {
            if let Some(body) = &resp.body {
                line.push(',');
                line.extend(
                    String::from_utf8_lossy(body)
                        .chars()
                        .filter(|c| !matches!(c, '\t' | '\n' | '\r')),
                );
            }
        }
        Outcome::Failed(failure) => match failure.kind {
            FailureKind::Timeout => line.push_str(",Failure:Timeout"),
            FailureKind::TransportError => {
                line.push_str(",Failure:TransportError:");
                line.push_str(&failure.message);
            }
        },
    }
    if let Some(correlation_id) = &record.correlation_id {
        line.push(',');
        line.push_str(correlation_id);
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::{Failure, ResponseSnapshot};
    use bytes::Bytes;
    use chrono::TimeZone;
    use http::{HeaderMap, StatusCode};
    use std::sync::Arc;
    use uuid::Uuid;

    fn at(millis: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_000 + millis).unwrap()
    }

    fn record(index: usize, timestamp: DateTime<Utc>, outcome: Outcome) -> OutcomeRecord {
        OutcomeRecord {
            id: Uuid::from_u128(index as u128),
            index,
            correlation_id: None,
            timestamp,
            elapsed_millis: 12,
            outcome,
        }
    }

    fn success(body: Option<&'static str>) -> Outcome {
        Outcome::Succeeded(ResponseSnapshot {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: body.map(|s| Bytes::from_static(s.as_bytes())),
        })
    }

    fn descriptor() -> RequestDescriptor {
        RequestDescriptor::get("https://reqres.in/api/users").unwrap()
    }

    #[test]
    fn success_line_with_flattened_body() {
        let line = report_line(
            &descriptor(),
            &record(0, at(0), success(Some("{\n\t\"page\": 1\r\n}"))),
        );
        assert_eq!(
            line,
            "2023-11-14 22:13:20.0000,00000000-0000-0000-0000-000000000000,12,200,GET,https://reqres.in/api/users,{\"page\": 1}"
        );
    }

    #[test]
    fn failure_lines_use_null_status() {
        let mut timed_out = record(
            1,
            at(0),
            Outcome::Failed(Failure {
                kind: FailureKind::Timeout,
                message: "no response within 30s".to_string(),
            }),
        );
        timed_out.elapsed_millis = 30_000;
        let line = report_line(&descriptor(), &timed_out);
        assert!(line.ends_with(",30000,NULL,GET,https://reqres.in/api/users,Failure:Timeout"));

        let mut errored = record(
            2,
            at(0),
            Outcome::Failed(Failure {
                kind: FailureKind::TransportError,
                message: "connection refused".to_string(),
            }),
        );
        errored.correlation_id = Some(Arc::from("run-7"));
        let line = report_line(&descriptor(), &errored);
        assert!(line.ends_with(",NULL,GET,https://reqres.in/api/users,Failure:TransportError:connection refused,run-7"));
    }

    #[test]
    fn lines_are_ordered_by_start_time() {
        let records = vec![
            record(0, at(500), success(None)),
            record(1, at(0), success(None)),
            record(2, at(0), success(None)),
        ];
        let mut out = Vec::new();
        write_report(&mut out, &descriptor(), &records).unwrap();
        let text = String::from_utf8(out).unwrap();
        let ids: Vec<&str> = text
            .lines()
            .map(|l| l.split(',').nth(1).unwrap())
            .collect();
        assert_eq!(
            ids,
            vec![
                Uuid::from_u128(1).to_string(),
                Uuid::from_u128(2).to_string(),
                Uuid::from_u128(0).to_string()
            ]
        );
    }

    #[test]
    fn append_accumulates_and_skips_empty_runs() {
        let dir = tempfile::tempdir().unwrap();
        let path = default_report_path(dir.path(), at(0));
        assert!(path.ends_with("VolleyReport_2023-11-14.log"));

        append_report(&path, &descriptor(), &[]).unwrap();
        assert!(!path.exists());

        let records = vec![record(0, at(0), success(None))];
        append_report(&path, &descriptor(), &records).unwrap();
        append_report(&path, &descriptor(), &records).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
    }
}
