//! Statement builder that renders complete SQL statements.
//!
//! A [`Statement`] collects the table, column lists and WHERE/ORDER/GROUP/HAVING/
//! LIMIT/OFFSET clauses of one operation and renders SELECT, COUNT, INSERT,
//! UPDATE or DELETE with `?` placeholders. [`Placeholder`] converts the result
//! to the driver's parameter syntax.

use crate::error::{OrmError, OrmResult};
use crate::function::Fragment;
use crate::value::Value;

/// Parameter syntax understood by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Placeholder {
    /// `?`, left as is.
    Question,
    /// PostgreSQL `$1, $2, ...`.
    #[default]
    Dollar,
}

impl Placeholder {
    /// Rewrite `?` placeholders, leaving quoted literals and identifiers alone.
    pub fn rewrite(self, sql: &str) -> String {
        match self {
            Placeholder::Question => sql.to_string(),
            Placeholder::Dollar => {
                let mut out = String::with_capacity(sql.len() + 8);
                let mut n = 0;
                let mut quote: Option<char> = None;
                for ch in sql.chars() {
                    match (ch, quote) {
                        ('\'' | '"', None) => {
                            quote = Some(ch);
                            out.push(ch);
                        }
                        (c, Some(q)) if c == q => {
                            quote = None;
                            out.push(ch);
                        }
                        ('?', None) => {
                            n += 1;
                            out.push('$');
                            out.push_str(&n.to_string());
                        }
                        _ => out.push(ch),
                    }
                }
                out
            }
        }
    }
}

/// Rendered SQL with its positional arguments.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BuiltQuery {
    pub sql: String,
    pub args: Vec<Value>,
}

impl BuiltQuery {
    pub fn new(sql: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            args,
        }
    }

    /// Convert `?` placeholders to the given style.
    pub fn with_placeholder(mut self, style: Placeholder) -> Self {
        self.sql = style.rewrite(&self.sql);
        self
    }
}

/// Clauses of one statement against a single table.
#[derive(Debug, Clone, Default)]
pub struct Statement {
    table: String,
    distinct: Vec<String>,
    select: Vec<String>,
    omit: Vec<String>,
    wheres: Vec<Fragment>,
    order: Vec<String>,
    group: Vec<String>,
    having: Vec<Fragment>,
    limit: Option<i64>,
    offset: Option<i64>,
}

impl Statement {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn set_table(&mut self, table: impl Into<String>) -> &mut Self {
        self.table = table.into();
        self
    }

    pub fn select<I, S>(&mut self, columns: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn omit<I, S>(&mut self, columns: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.omit.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn distinct<I, S>(&mut self, columns: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.distinct.extend(columns.into_iter().map(Into::into));
        self
    }

    /// Drop the explicit select list. DISTINCT columns are kept so a count
    /// still matches the distinct row set.
    pub fn clear_select(&mut self) -> &mut Self {
        self.select.clear();
        self
    }

    pub fn clear_distinct(&mut self) -> &mut Self {
        self.distinct.clear();
        self
    }

    /// Add a WHERE fragment; multiple fragments are joined with `AND`.
    pub fn filter(&mut self, sql: impl Into<String>, args: Vec<Value>) -> &mut Self {
        self.wheres.push(Fragment {
            sql: sql.into(),
            args,
        });
        self
    }

    pub fn has_where(&self) -> bool {
        !self.wheres.is_empty()
    }

    pub fn order<I, S>(&mut self, clauses: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.order.extend(clauses.into_iter().map(Into::into));
        self
    }

    pub fn group<I, S>(&mut self, columns: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn having(&mut self, fragment: Fragment) -> &mut Self {
        self.having.push(fragment);
        self
    }

    pub fn limit(&mut self, limit: i64) -> &mut Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(&mut self, offset: i64) -> &mut Self {
        self.offset = Some(offset);
        self
    }

    /// Columns selected by this statement given the model's full column list.
    ///
    /// An explicit select list wins; otherwise an omit list expands the model
    /// columns; otherwise `*`.
    pub fn selected_columns(&self, model_columns: &[String]) -> Vec<String> {
        let keep = |c: &&String| !self.omit.contains(c);
        if !self.select.is_empty() {
            self.select.iter().filter(keep).cloned().collect()
        } else if !self.omit.is_empty() {
            model_columns.iter().filter(keep).cloned().collect()
        } else {
            Vec::new()
        }
    }

    fn push_where(&self, sql: &mut String, args: &mut Vec<Value>) {
        match self.wheres.as_slice() {
            [] => {}
            [only] => {
                sql.push_str(" WHERE ");
                sql.push_str(&only.sql);
                args.extend(only.args.iter().cloned());
            }
            many => {
                sql.push_str(" WHERE ");
                for (i, fragment) in many.iter().enumerate() {
                    if i > 0 {
                        sql.push_str(" AND ");
                    }
                    sql.push('(');
                    sql.push_str(&fragment.sql);
                    sql.push(')');
                    args.extend(fragment.args.iter().cloned());
                }
            }
        }
    }

    fn push_group_having(&self, sql: &mut String, args: &mut Vec<Value>) {
        if !self.group.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.group.join(", "));
        }
        if !self.having.is_empty() {
            sql.push_str(" HAVING ");
            for (i, fragment) in self.having.iter().enumerate() {
                if i > 0 {
                    sql.push_str(" AND ");
                }
                sql.push_str(&fragment.sql);
                args.extend(fragment.args.iter().cloned());
            }
        }
    }

    /// `SELECT ... FROM table [WHERE] [GROUP BY] [HAVING] [ORDER BY] [LIMIT] [OFFSET]`
    pub fn to_select(&self, model_columns: &[String]) -> BuiltQuery {
        let mut args = Vec::new();
        let projection = if !self.distinct.is_empty() {
            format!("DISTINCT {}", self.distinct.join(", "))
        } else {
            let columns = self.selected_columns(model_columns);
            if columns.is_empty() {
                "*".to_string()
            } else {
                columns.join(", ")
            }
        };

        let mut sql = format!("SELECT {projection} FROM {}", self.table);
        self.push_where(&mut sql, &mut args);
        self.push_group_having(&mut sql, &mut args);

        if !self.order.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order.join(", "));
        }
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }

        BuiltQuery { sql, args }
    }

    /// `SELECT COUNT(*)` over the same rows, ignoring ORDER BY, LIMIT and OFFSET.
    ///
    /// Grouped queries are counted through a subquery so the result is the
    /// number of groups.
    pub fn to_count(&self) -> BuiltQuery {
        let mut args = Vec::new();

        if !self.group.is_empty() || !self.having.is_empty() {
            let mut inner = format!("SELECT 1 FROM {}", self.table);
            self.push_where(&mut inner, &mut args);
            self.push_group_having(&mut inner, &mut args);
            return BuiltQuery {
                sql: format!("SELECT COUNT(*) FROM ({inner}) AS t"),
                args,
            };
        }

        let counted = match self.distinct.as_slice() {
            [] => "*".to_string(),
            [one] => format!("DISTINCT {one}"),
            many => format!("DISTINCT ({})", many.join(", ")),
        };
        let mut sql = format!("SELECT COUNT({counted}) FROM {}", self.table);
        self.push_where(&mut sql, &mut args);
        BuiltQuery { sql, args }
    }

    /// `DELETE FROM table WHERE ...`; a statement without WHERE is rejected.
    pub fn to_delete(&self) -> OrmResult<BuiltQuery> {
        if !self.has_where() {
            return Err(OrmError::validation(format!(
                "DELETE on {} requires a WHERE condition",
                self.table
            )));
        }
        let mut args = Vec::new();
        let mut sql = format!("DELETE FROM {}", self.table);
        self.push_where(&mut sql, &mut args);
        Ok(BuiltQuery { sql, args })
    }

    /// `UPDATE table SET a = ?, ... WHERE ...`; requires at least one
    /// assignment and a WHERE condition.
    pub fn to_update(&self, sets: &[(String, Value)]) -> OrmResult<BuiltQuery> {
        if sets.is_empty() {
            return Err(OrmError::validation(format!(
                "UPDATE on {} has no columns to set",
                self.table
            )));
        }
        if !self.has_where() {
            return Err(OrmError::validation(format!(
                "UPDATE on {} requires a WHERE condition",
                self.table
            )));
        }

        let mut args = Vec::new();
        let assignments: Vec<String> = sets
            .iter()
            .map(|(column, value)| format!("{column} = {}", placeholder(value, &mut args)))
            .collect();
        let mut sql = format!("UPDATE {} SET {}", self.table, assignments.join(", "));
        self.push_where(&mut sql, &mut args);
        Ok(BuiltQuery { sql, args })
    }

    /// Multi-row `INSERT INTO table (cols) VALUES (...), (...)`.
    pub fn to_insert(&self, columns: &[String], rows: &[Vec<Value>]) -> OrmResult<BuiltQuery> {
        if columns.is_empty() {
            return Err(OrmError::validation(format!(
                "INSERT into {} has no columns",
                self.table
            )));
        }
        if rows.is_empty() {
            return Err(OrmError::validation(format!(
                "INSERT into {} has no rows",
                self.table
            )));
        }

        let mut args = Vec::with_capacity(columns.len() * rows.len());
        let mut tuples = Vec::with_capacity(rows.len());
        for row in rows {
            if row.len() != columns.len() {
                return Err(OrmError::validation(format!(
                    "INSERT into {} expects {} values per row, got {}",
                    self.table,
                    columns.len(),
                    row.len()
                )));
            }
            let values: Vec<String> = row.iter().map(|v| placeholder(v, &mut args)).collect();
            tuples.push(format!("({})", values.join(", ")));
        }

        Ok(BuiltQuery {
            sql: format!(
                "INSERT INTO {} ({}) VALUES {}",
                self.table,
                columns.join(", "),
                tuples.join(", ")
            ),
            args,
        })
    }
}

fn placeholder(value: &Value, args: &mut Vec<Value>) -> String {
    match value {
        Value::Raw(sql) => sql.clone(),
        other => {
            args.push(other.clone());
            "?".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn dollar_rewrite_numbers_placeholders() {
        assert_eq!(
            Placeholder::Dollar.rewrite("a = ? AND b IN (?, ?)"),
            "a = $1 AND b IN ($2, $3)"
        );
        assert_eq!(Placeholder::Question.rewrite("a = ?"), "a = ?");
    }

    #[test]
    fn dollar_rewrite_skips_quoted_text() {
        assert_eq!(
            Placeholder::Dollar.rewrite("note = 'why?' AND \"odd?\" = ?"),
            "note = 'why?' AND \"odd?\" = $1"
        );
    }

    #[test]
    fn select_renders_all_clauses_in_order() {
        let mut stmt = Statement::new("users");
        stmt.select(["id", "name"])
            .filter("age > ?", vec![Value::Int(18)])
            .group(["name"])
            .having(Fragment::new("COUNT(*) > ?", [1]))
            .order(["name ASC"])
            .limit(10)
            .offset(20);

        let built = stmt.to_select(&[]);
        assert_eq!(
            built.sql,
            "SELECT id, name FROM users WHERE age > ? GROUP BY name HAVING COUNT(*) > ? ORDER BY name ASC LIMIT 10 OFFSET 20"
        );
        assert_eq!(built.args, vec![Value::Int(18), Value::Int(1)]);
    }

    #[test]
    fn omit_expands_model_columns() {
        let mut stmt = Statement::new("users");
        stmt.omit(["password"]);
        let built = stmt.to_select(&cols(&["id", "name", "password"]));
        assert_eq!(built.sql, "SELECT id, name FROM users");
    }

    #[test]
    fn count_ignores_projection_and_paging() {
        let mut stmt = Statement::new("users");
        stmt.select(["id"])
            .filter("age > ?", vec![Value::Int(1)])
            .order(["id DESC"])
            .limit(5);
        stmt.clear_select();
        let built = stmt.to_count();
        assert_eq!(built.sql, "SELECT COUNT(*) FROM users WHERE age > ?");
    }

    #[test]
    fn clear_select_keeps_distinct_for_count() {
        let mut stmt = Statement::new("users");
        stmt.select(["id"]).distinct(["age"]);
        stmt.clear_select();
        assert_eq!(stmt.to_count().sql, "SELECT COUNT(DISTINCT age) FROM users");

        stmt.clear_distinct();
        assert_eq!(stmt.to_count().sql, "SELECT COUNT(*) FROM users");
    }

    #[test]
    fn grouped_count_uses_subquery() {
        let mut stmt = Statement::new("orders");
        stmt.group(["user_id"])
            .having(Fragment::new("SUM(amount) > ?", [100]));
        let built = stmt.to_count();
        assert_eq!(
            built.sql,
            "SELECT COUNT(*) FROM (SELECT 1 FROM orders GROUP BY user_id HAVING SUM(amount) > ?) AS t"
        );
        assert_eq!(built.args.len(), 1);
    }

    #[test]
    fn distinct_count() {
        let mut stmt = Statement::new("users");
        stmt.distinct(["city"]);
        assert_eq!(stmt.to_count().sql, "SELECT COUNT(DISTINCT city) FROM users");
        stmt.distinct(["country"]);
        assert_eq!(
            stmt.to_count().sql,
            "SELECT COUNT(DISTINCT (city, country)) FROM users"
        );
    }

    #[test]
    fn multiple_where_fragments_are_parenthesized() {
        let mut stmt = Statement::new("users");
        stmt.filter("a = ? OR b = ?", vec![Value::Int(1), Value::Int(2)])
            .filter("id = ?", vec![Value::Int(3)]);
        let built = stmt.to_delete().unwrap();
        assert_eq!(built.sql, "DELETE FROM users WHERE (a = ? OR b = ?) AND (id = ?)");
        assert_eq!(built.args.len(), 3);
    }

    #[test]
    fn delete_and_update_require_where() {
        let stmt = Statement::new("users");
        assert!(matches!(stmt.to_delete(), Err(OrmError::Validation(_))));
        assert!(matches!(
            stmt.to_update(&[("name".into(), Value::from("x"))]),
            Err(OrmError::Validation(_))
        ));
    }

    #[test]
    fn update_binds_set_values_before_where() {
        let mut stmt = Statement::new("users");
        stmt.filter("id = ?", vec![Value::Int(9)]);
        let built = stmt
            .to_update(&[
                ("name".into(), Value::from("bob")),
                ("visits".into(), Value::raw("visits + 1")),
            ])
            .unwrap();
        assert_eq!(built.sql, "UPDATE users SET name = ?, visits = visits + 1 WHERE id = ?");
        assert_eq!(built.args, vec![Value::from("bob"), Value::Int(9)]);
    }

    #[test]
    fn multi_row_insert() {
        let stmt = Statement::new("users");
        let built = stmt
            .to_insert(
                &cols(&["name", "age"]),
                &[
                    vec![Value::from("a"), Value::Int(1)],
                    vec![Value::from("b"), Value::Int(2)],
                ],
            )
            .unwrap();
        assert_eq!(built.sql, "INSERT INTO users (name, age) VALUES (?, ?), (?, ?)");
        assert_eq!(built.args.len(), 4);

        let built = built.with_placeholder(Placeholder::Dollar);
        assert_eq!(built.sql, "INSERT INTO users (name, age) VALUES ($1, $2), ($3, $4)");
    }

    #[test]
    fn insert_rejects_ragged_rows() {
        let stmt = Statement::new("users");
        let err = stmt
            .to_insert(&cols(&["a", "b"]), &[vec![Value::Int(1)]])
            .unwrap_err();
        assert!(matches!(err, OrmError::Validation(_)));
    }
}
