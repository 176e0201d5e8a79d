use crate::error::StoreError;

/// Get a required column value from a row, returning CorruptRow on failure.
pub fn get<T: rusqlite::types::FromSql>(
    row: &rusqlite::Row<'_>,
    idx: usize,
    table: &'static str,
    column: &'static str,
) -> Result<T, StoreError> {
    row.get(idx).map_err(|e| StoreError::CorruptRow {
        table,
        column,
        detail: e.to_string(),
    })
}

/// Get an optional column value.
pub fn get_opt<T: rusqlite::types::FromSql>(
    row: &rusqlite::Row<'_>,
    idx: usize,
    table: &'static str,
    column: &'static str,
) -> Result<Option<T>, StoreError> {
    row.get(idx).map_err(|e| StoreError::CorruptRow {
        table,
        column,
        detail: e.to_string(),
    })
}

/// Parse a string into an enum, returning CorruptRow on failure.
pub fn parse_enum<T: std::str::FromStr>(
    raw: &str,
    table: &'static str,
    column: &'static str,
) -> Result<T, StoreError> {
    raw.parse().map_err(|_| StoreError::CorruptRow {
        table,
        column,
        detail: format!("unknown variant: {raw}"),
    })
}

/// Parse an optional enum column.
pub fn parse_enum_opt<T: std::str::FromStr>(
    raw: Option<String>,
    table: &'static str,
    column: &'static str,
) -> Result<Option<T>, StoreError> {
    match raw {
        Some(s) => parse_enum(&s, table, column).map(Some),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracker_core::task::{Priority, TaskStatus};

    #[test]
    fn parse_enum_success() {
        let result: Result<TaskStatus, _> = parse_enum("PENDING", "tasks", "status");
        assert!(result.is_ok());
    }

    #[test]
    fn parse_enum_failure() {
        let result: Result<TaskStatus, _> = parse_enum("DONE", "tasks", "status");
        assert!(matches!(
            result,
            Err(StoreError::CorruptRow { table: "tasks", column: "status", .. })
        ));
    }

    #[test]
    fn parse_enum_opt_none_passes_through() {
        let result: Option<Priority> =
            parse_enum_opt(None, "tasks", "suggested_priority").unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn parse_enum_opt_some_parses() {
        let result: Option<Priority> =
            parse_enum_opt(Some("HIGH".into()), "tasks", "suggested_priority").unwrap();
        assert_eq!(result, Some(Priority::High));
    }
}
