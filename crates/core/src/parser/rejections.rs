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

//! Pre-parse rejections (§4.2), run before syntactic parsing so every
//! unsupported construct names the exact text the caller wrote and, where
//! possible, a supported alternative.

use regex::Regex;
use std::sync::OnceLock;

use crate::error::{self, Error};

fn window_fn_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)\b\w+\s*\([^()]*\)\s*OVER\s*\(").expect("valid regex"))
}

fn recursive_cte_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)\bWITH\s+RECURSIVE\b").expect("valid regex"))
}

fn vendor_hint_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)\b(USE|FORCE|IGNORE)\s+INDEX\b|/\*\+.*?\*/").expect("valid regex")
    })
}

/// Runs every pre-parse rejection in the order §4.2 specifies. Returns
/// `Ok(())` when the input may proceed to syntactic parsing.
pub fn check(sql: &str) -> Result<(), Error> {
    check_not_empty(sql)?;
    check_single_statement(sql)?;
    check_no_window_functions(sql)?;
    check_no_recursive_cte(sql)?;
    check_no_vendor_hints(sql)?;
    Ok(())
}

fn check_not_empty(sql: &str) -> Result<(), Error> {
    if sql.trim().is_empty() {
        return error::QueryRejectedSnafu { detail: "query rejected: empty or whitespace-only input".to_string() }.fail();
    }
    Ok(())
}

fn check_single_statement(sql: &str) -> Result<(), Error> {
    let statements: Vec<&str> = sql.split(';').map(str::trim).filter(|s| !s.is_empty()).collect();
    if statements.len() > 1 {
        return error::QueryRejectedSnafu {
            detail: "multiple statements not allowed: submit exactly one SQL statement".to_string(),
        }
        .fail();
    }
    Ok(())
}

fn check_no_window_functions(sql: &str) -> Result<(), Error> {
    if let Some(m) = window_fn_re().find(sql) {
        return error::UnsupportedSyntaxSnafu {
            construct: m.as_str().trim_end_matches('(').trim().to_string(),
            alternative: Some("aggregate the result in post-processing instead of a window function".to_string()),
        }
        .fail();
    }
    Ok(())
}

fn check_no_recursive_cte(sql: &str) -> Result<(), Error> {
    if recursive_cte_re().is_match(sql) {
        return error::UnsupportedSyntaxSnafu {
            construct: "WITH RECURSIVE".to_string(),
            alternative: Some("rewrite the recursive query as repeated non-recursive queries".to_string()),
        }
        .fail();
    }
    Ok(())
}

fn check_no_vendor_hints(sql: &str) -> Result<(), Error> {
    if let Some(m) = vendor_hint_re().find(sql) {
        return error::VendorHintSnafu { hint: m.as_str().trim().to_string() }.fail();
    }
    Ok(())
}

#[cfg(test)]
mod red_flag_tests {
    use super::*;

    #[test]
    fn empty_query_is_rejected() {
        assert!(matches!(check(""), Err(Error::QueryRejected { .. })));
        assert!(matches!(check("   \n\t"), Err(Error::QueryRejected { .. })));
    }

    #[test]
    fn semicolon_only_is_rejected() {
        assert!(matches!(check(";"), Err(Error::QueryRejected { .. })));
    }

    #[test]
    fn two_selects_are_rejected() {
        assert!(matches!(
            check("SELECT 1; SELECT 2;"),
            Err(Error::QueryRejected { .. })
        ));
    }

    #[test]
    fn window_function_is_rejected() {
        let err = check("SELECT ROW_NUMBER() OVER (ORDER BY id) FROM t.t").unwrap_err();
        assert!(matches!(err, Error::UnsupportedSyntax { .. }));
    }

    #[test]
    fn recursive_cte_is_rejected() {
        let err = check("WITH RECURSIVE r AS (SELECT 1) SELECT * FROM r").unwrap_err();
        assert!(matches!(err, Error::UnsupportedSyntax { .. }));
    }

    #[test]
    fn plain_cte_is_not_rejected_here() {
        check("WITH c AS (SELECT 1 AS x) SELECT * FROM c").unwrap();
    }

    #[test]
    fn vendor_hint_use_index_is_rejected() {
        let err = check("SELECT * FROM test.orders USE INDEX (idx_x)").unwrap_err();
        match err {
            Error::VendorHint { hint } => assert!(hint.to_uppercase().contains("USE INDEX")),
            other => panic!("expected VendorHint, got {other:?}"),
        }
    }

    #[test]
    fn oracle_style_hint_is_rejected() {
        assert!(matches!(
            check("SELECT /*+ INDEX(t idx) */ * FROM t.t"),
            Err(Error::VendorHint { .. })
        ));
    }

    #[test]
    fn unqualified_select_passes_pre_parse() {
        check("SELECT * FROM orders").unwrap();
    }
}
