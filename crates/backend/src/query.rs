use std::cmp::Ordering;

use serde_json::Value;

use crate::{BackendError, Result};

/// A raw row as returned by the backend: a JSON object keyed by column.
pub type Row = Value;

/// Sort direction for a query ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// A row filter.
///
/// Values are compared in their text form, the way the database compares a
/// column cast to text, so `3` and `"3"` are equal.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// `field = value`
    Eq { field: String, value: Value },
    /// `field in (values...)`
    In { field: String, values: Vec<Value> },
}

impl Filter {
    /// Returns the field this filter applies to.
    pub fn field(&self) -> &str {
        match self {
            Filter::Eq { field, .. } | Filter::In { field, .. } => field,
        }
    }

    /// Returns true if the row satisfies this filter.
    pub fn matches(&self, row: &Row) -> bool {
        let Some(actual) = row.get(self.field()).and_then(value_text) else {
            return false;
        };
        match self {
            Filter::Eq { value, .. } => value_text(value).as_deref() == Some(actual.as_str()),
            Filter::In { values, .. } => values
                .iter()
                .any(|v| value_text(v).as_deref() == Some(actual.as_str())),
        }
    }
}

/// Ordering applied to the result set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortOrder {
    pub field: String,
    pub direction: Direction,
}

/// A related row nested into each result row.
///
/// The row of table `relation` whose `id` equals the result row's
/// `local_key` is embedded under the key `relation` (null when missing).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Embed {
    pub relation: String,
    pub local_key: String,
}

/// Builder for backend selects.
///
/// Mirrors the hosted service's query chain:
/// `table.select(columns).eq(field, value).order(field, direction)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// Table to select from.
    pub table: String,

    /// Columns to return. `*` returns every column.
    pub columns: Vec<String>,

    /// Filters, all of which must hold.
    pub filters: Vec<Filter>,

    /// Optional result ordering.
    pub order: Option<SortOrder>,

    /// Related rows to nest into each result.
    pub embeds: Vec<Embed>,
}

impl Query {
    /// Creates a query returning every column of `table`.
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: vec!["*".to_string()],
            filters: Vec::new(),
            order: None,
            embeds: Vec::new(),
        }
    }

    /// Restricts the returned columns.
    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Filters to rows where `field` equals `value`.
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    /// Filters to rows where `field` is any of `values`.
    pub fn in_<I, V>(mut self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.filters.push(Filter::In {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Orders results by `field`.
    pub fn order(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order = Some(SortOrder {
            field: field.into(),
            direction,
        });
        self
    }

    /// Nests the related `relation` row referenced by `local_key`.
    pub fn embed(mut self, relation: impl Into<String>, local_key: impl Into<String>) -> Self {
        self.embeds.push(Embed {
            relation: relation.into(),
            local_key: local_key.into(),
        });
        self
    }

    /// Returns the filter on `field`, if any.
    pub fn filter_on(&self, field: &str) -> Option<&Filter> {
        self.filters.iter().find(|f| f.field() == field)
    }

    /// Checks every table and column name is a plain identifier.
    pub fn validate(&self) -> Result<()> {
        let names = std::iter::once(self.table.as_str())
            .chain(self.columns.iter().map(String::as_str).filter(|c| *c != "*"))
            .chain(self.filters.iter().map(Filter::field))
            .chain(self.order.iter().map(|o| o.field.as_str()))
            .chain(
                self.embeds
                    .iter()
                    .flat_map(|e| [e.relation.as_str(), e.local_key.as_str()]),
            );
        for name in names {
            if !is_identifier(name) {
                return Err(BackendError::InvalidIdentifier(name.to_string()));
            }
        }
        Ok(())
    }

    /// Returns true if the row satisfies every filter.
    pub fn matches(&self, row: &Row) -> bool {
        self.filters.iter().all(|f| f.matches(row))
    }

    /// Compares two rows under this query's ordering.
    pub fn compare(&self, a: &Row, b: &Row) -> Ordering {
        let Some(order) = &self.order else {
            return Ordering::Equal;
        };
        let ord = compare_values(a.get(&order.field), b.get(&order.field));
        match order.direction {
            Direction::Ascending => ord,
            Direction::Descending => ord.reverse(),
        }
    }

    /// Drops every column not requested. Embedded relations are always kept.
    pub fn project(&self, row: Row) -> Row {
        if self.columns.iter().any(|c| c == "*") {
            return row;
        }
        match row {
            Value::Object(map) => Value::Object(
                map.into_iter()
                    .filter(|(k, _)| {
                        self.columns.iter().any(|c| c == k)
                            || self.embeds.iter().any(|e| &e.relation == k)
                    })
                    .collect(),
            ),
            other => other,
        }
    }
}

/// Returns true if `name` is a plain SQL identifier.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Text form of a scalar value, as produced by casting a column to text.
pub(crate) fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), _) => Ordering::Less,
        (_, None | Some(Value::Null)) => Ordering::Greater,
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder_chain() {
        let query = Query::table("orders")
            .select(["id", "status"])
            .in_("status", ["accepted", "processing"])
            .order("created_at", Direction::Descending);

        assert_eq!(query.table, "orders");
        assert_eq!(query.columns, vec!["id", "status"]);
        assert_eq!(
            query.filter_on("status"),
            Some(&Filter::In {
                field: "status".to_string(),
                values: vec![json!("accepted"), json!("processing")],
            })
        );
        assert_eq!(query.order.unwrap().direction, Direction::Descending);
    }

    #[test]
    fn test_eq_compares_text_form() {
        let query = Query::table("orders").eq("floor", "3");
        assert!(query.matches(&json!({"floor": 3})));
        assert!(!query.matches(&json!({"floor": 4})));
        assert!(!query.matches(&json!({"floor": null})));
        assert!(!query.matches(&json!({})));
    }

    #[test]
    fn test_in_matches_any() {
        let query = Query::table("orders").in_("status", ["accepted", "processing"]);
        assert!(query.matches(&json!({"status": "processing"})));
        assert!(!query.matches(&json!({"status": "pending"})));
    }

    #[test]
    fn test_descending_order_puts_newest_first() {
        let query = Query::table("orders").order("created_at", Direction::Descending);
        let mut rows = vec![
            json!({"created_at": "2024-01-01T00:00:00Z"}),
            json!({"created_at": "2024-03-01T00:00:00Z"}),
            json!({"created_at": "2024-02-01T00:00:00Z"}),
        ];
        rows.sort_by(|a, b| query.compare(a, b));
        assert_eq!(rows[0]["created_at"], "2024-03-01T00:00:00Z");
        assert_eq!(rows[2]["created_at"], "2024-01-01T00:00:00Z");
    }

    #[test]
    fn test_project_keeps_embedded_relation() {
        let query = Query::table("order_items")
            .select(["id"])
            .embed("clothing_items", "clothing_item_id");
        let row = json!({"id": 1, "quantity": 2, "clothing_items": {"id": 9}});
        assert_eq!(
            query.project(row),
            json!({"id": 1, "clothing_items": {"id": 9}})
        );
    }

    #[test]
    fn test_validate_rejects_non_identifiers() {
        assert!(Query::table("orders").eq("status", "pending").validate().is_ok());
        assert!(matches!(
            Query::table("orders; drop table orders").validate(),
            Err(BackendError::InvalidIdentifier(_))
        ));
        assert!(Query::table("orders").eq("1status", "x").validate().is_err());
    }
}
