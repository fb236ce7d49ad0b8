/*
Copyright 2024-2025 The Canonica Authors

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

     https://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

//! Timestamp parsing for time-travel rewriting (§4.6): a fixed list of
//! accepted formats, with empty/unparsable and future timestamps rejected.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

use crate::error::{self, Error};

const FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%SZ", "%Y-%m-%d %H:%M:%S"];

/// Parses `raw` against RFC 3339 first, then the fixed fallback list, then a
/// bare date. Rejects empty/unparsable input and timestamps strictly in the
/// future relative to wall-clock `now`.
pub fn parse(raw: &str) -> Result<DateTime<Utc>, Error> {
    parse_at(raw, Utc::now())
}

pub(crate) fn parse_at(raw: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, Error> {
    let trimmed = raw.trim().trim_matches('\'');
    if trimmed.is_empty() {
        return error::QueryRejectedSnafu {
            detail: "time travel timestamp is empty or unparsable".to_string(),
        }
        .fail();
    }

    let parsed = DateTime::parse_from_rfc3339(trimmed)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            FORMATS.iter().find_map(|fmt| {
                NaiveDateTime::parse_from_str(trimmed, fmt)
                    .ok()
                    .map(|naive| Utc.from_utc_datetime(&naive))
            })
            .ok_or(())
        })
        .or_else(|_| {
            NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                .map(|date| Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).expect("valid midnight")))
                .map_err(|_| ())
        });

    let timestamp = parsed.map_err(|_| Error::QueryRejected {
        detail: format!("time travel timestamp is empty or unparsable: '{trimmed}'"),
    })?;

    if timestamp > now {
        return error::QueryRejectedSnafu {
            detail: format!("time travel timestamp '{trimmed}' is in the future"),
        }
        .fail();
    }

    Ok(timestamp)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 7, 28, 0, 0, 0).unwrap()
    }

    #[test]
    fn parses_rfc3339() {
        parse_at("2024-01-01T00:00:00Z", fixed_now()).unwrap();
    }

    #[test]
    fn parses_space_separated() {
        parse_at("2024-01-01 00:00:00", fixed_now()).unwrap();
    }

    #[test]
    fn parses_bare_date() {
        parse_at("2024-01-01", fixed_now()).unwrap();
    }

    #[test]
    fn rejects_empty() {
        assert!(parse_at("", fixed_now()).is_err());
        assert!(parse_at("''", fixed_now()).is_err());
    }

    #[test]
    fn rejects_unparsable() {
        assert!(parse_at("not-a-date", fixed_now()).is_err());
    }

    #[test]
    fn rejects_future_timestamp() {
        assert!(parse_at("2099-01-01", fixed_now()).is_err());
    }
}
