//! Source query construction.
//!
//! Sources are arbitrary SQL dialects reached through an external connector,
//! so the query is rendered as text. Identifiers and literals are escaped
//! here; nothing from configuration is spliced in raw except the table name.

use std::fmt::Write;

use chrono::NaiveDate;

use super::connector::ConnectionKind;
use crate::config::{FilterValue, KpiConfig};

/// Bounded, filtered `select *` over a KPI's source table.
#[derive(Debug, Clone)]
pub struct SourceQuery<'a> {
    kind: &'a ConnectionKind,
    table: &'a str,
    datetime_column: &'a str,
    base_date: NaiveDate,
    end_date: NaiveDate,
    filters: Vec<(&'a str, &'a [FilterValue])>,
}

impl<'a> SourceQuery<'a> {
    /// Rows with `base_date < datetime_column <= end_date`.
    pub fn new(
        kind: &'a ConnectionKind,
        table: &'a str,
        datetime_column: &'a str,
        base_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Self {
        Self {
            kind,
            table,
            datetime_column,
            base_date,
            end_date,
            filters: Vec::new(),
        }
    }

    /// Query for `kpi` with every non-empty configured filter applied.
    pub fn for_kpi(
        kind: &'a ConnectionKind,
        kpi: &'a KpiConfig,
        base_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Self {
        let mut query = Self::new(
            kind,
            &kpi.table_name,
            &kpi.datetime_column,
            base_date,
            end_date,
        );
        for (column, values) in &kpi.filters {
            query = query.filter_in(column, values);
        }
        query
    }

    /// Restrict `column` to `values`. An empty list adds no clause.
    pub fn filter_in(mut self, column: &'a str, values: &'a [FilterValue]) -> Self {
        if !values.is_empty() {
            self.filters.push((column, values));
        }
        self
    }

    pub fn render(&self) -> String {
        let dt = self.identifier(self.datetime_column);
        let mut sql = format!(
            "select * from {} where {dt} > {} and {dt} <= {}",
            self.table,
            self.string_literal(&self.base_date.to_string()),
            self.string_literal(&self.end_date.to_string()),
        );

        for (column, values) in &self.filters {
            let list = values
                .iter()
                .map(|v| self.literal(v))
                .collect::<Vec<_>>()
                .join(", ");
            // Writing to a String cannot fail.
            let _ = write!(sql, " and {} in ({list})", self.identifier(column));
        }

        sql
    }

    fn identifier(&self, name: &str) -> String {
        match self.kind.identifier_quote() {
            Some(q) => {
                let mut quoted = String::with_capacity(name.len() + 2);
                quoted.push(q);
                for c in name.chars() {
                    if c == q {
                        quoted.push(q);
                    }
                    quoted.push(c);
                }
                quoted.push(q);
                quoted
            }
            None => name.to_string(),
        }
    }

    fn literal(&self, value: &FilterValue) -> String {
        match value {
            FilterValue::Bool(b) => b.to_string(),
            FilterValue::Int(i) => i.to_string(),
            FilterValue::Float(f) if f.is_finite() => f.to_string(),
            FilterValue::Float(f) => self.string_literal(&f.to_string()),
            FilterValue::Text(s) => self.string_literal(s),
        }
    }

    fn string_literal(&self, value: &str) -> String {
        let mut escaped = String::with_capacity(value.len() + 2);
        escaped.push('\'');
        for c in value.chars() {
            match c {
                '\'' => escaped.push_str("''"),
                '\\' if self.kind.backslash_escapes() => escaped.push_str("\\\\"),
                _ => escaped.push(c),
            }
        }
        escaped.push('\'');
        escaped
    }
}

impl std::fmt::Display for SourceQuery<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 4, day).unwrap()
    }

    fn values(items: &[&str]) -> Vec<FilterValue> {
        items.iter().map(|&s| FilterValue::from(s)).collect()
    }

    #[test]
    fn test_mysql_multi_value_filter() {
        let kind = ConnectionKind::Mysql;
        let regions = values(&["us", "eu"]);
        let sql = SourceQuery::new(&kind, "orders", "created", date(1), date(30))
            .filter_in("region", &regions)
            .render();

        assert_eq!(
            sql,
            "select * from orders where `created` > '2023-04-01' and `created` <= '2023-04-30' \
             and `region` in ('us', 'eu')"
        );
    }

    #[test]
    fn test_single_value_filter_has_no_dangling_comma() {
        let kind = ConnectionKind::Mysql;
        let regions = values(&["us"]);
        let sql = SourceQuery::new(&kind, "orders", "created", date(1), date(30))
            .filter_in("region", &regions)
            .render();

        assert!(sql.ends_with("and `region` in ('us')"), "{sql}");
        assert!(!sql.contains(",)"), "{sql}");
    }

    #[test]
    fn test_postgres_quotes_and_escapes() {
        let kind = ConnectionKind::Postgresql;
        let names = values(&["o'brien", r"back\slash"]);
        let sql = SourceQuery::new(&kind, "public.people", "signup\"at", date(1), date(2))
            .filter_in("name", &names)
            .render();

        assert!(sql.contains(r#""signup""at" > '2023-04-01'"#), "{sql}");
        assert!(sql.contains(r#""name" in ('o''brien', 'back\slash')"#), "{sql}");
    }

    #[test]
    fn test_mysql_escapes_backslash() {
        let kind = ConnectionKind::Mysql;
        let paths = values(&[r"c:\tmp"]);
        let sql = SourceQuery::new(&kind, "t", "dt", date(1), date(2))
            .filter_in("path", &paths)
            .render();
        assert!(sql.contains(r"`path` in ('c:\\tmp')"), "{sql}");
    }

    #[test]
    fn test_other_kind_leaves_identifiers_bare() {
        let kind = ConnectionKind::from("druid");
        let sql = SourceQuery::new(&kind, "events", "ts", date(1), date(2)).render();
        assert_eq!(
            sql,
            "select * from events where ts > '2023-04-01' and ts <= '2023-04-02'"
        );
    }

    #[test]
    fn test_empty_and_numeric_filters() {
        let kind = ConnectionKind::Mysql;
        let mut kpi = KpiConfig::new(1, 1, "sales", "day", "amount", crate::config::AggregationFn::Sum);
        kpi.filters.insert("store".to_string(), vec![FilterValue::Int(4), FilterValue::Int(7)]);
        kpi.filters.insert("active".to_string(), vec![FilterValue::Bool(true)]);
        kpi.filters.insert("channel".to_string(), Vec::new());

        let sql = SourceQuery::for_kpi(&kind, &kpi, date(1), date(2)).render();
        assert!(sql.ends_with(" and `active` in (true) and `store` in (4, 7)"), "{sql}");
        assert!(!sql.contains("channel"), "{sql}");
    }
}
