//! Aggregate function expressions for HAVING clauses and select lists.
//!
//! ```ignore
//! let total = Function::sum("amount");
//! q.group(["user_id"]).having(total.gt(100));
//! // GROUP BY user_id HAVING SUM(amount) > ?
//! ```

use crate::cond::lower;
use crate::model::Column;
use crate::value::Value;
use std::fmt;

/// SQL text with its positional arguments.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Fragment {
    pub sql: String,
    pub args: Vec<Value>,
}

impl Fragment {
    pub fn new<I, V>(sql: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self {
            sql: sql.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Fragment without arguments.
    pub fn raw(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            args: Vec::new(),
        }
    }
}

impl From<&str> for Fragment {
    fn from(sql: &str) -> Self {
        Fragment::raw(sql)
    }
}

impl From<String> for Fragment {
    fn from(sql: String) -> Self {
        Fragment::raw(sql)
    }
}

impl From<(String, Value)> for Fragment {
    fn from((sql, arg): (String, Value)) -> Self {
        Fragment { sql, args: vec![arg] }
    }
}

impl From<(&str, Value)> for Fragment {
    fn from((sql, arg): (&str, Value)) -> Self {
        Fragment { sql: sql.to_string(), args: vec![arg] }
    }
}

impl From<(String, Vec<Value>)> for Fragment {
    fn from((sql, args): (String, Vec<Value>)) -> Self {
        Fragment { sql, args }
    }
}

impl From<(&str, Vec<Value>)> for Fragment {
    fn from((sql, args): (&str, Vec<Value>)) -> Self {
        Fragment { sql: sql.to_string(), args }
    }
}

impl From<(String, Value, Value)> for Fragment {
    fn from((sql, from, to): (String, Value, Value)) -> Self {
        Fragment { sql, args: vec![from, to] }
    }
}

/// An aggregate over one column, such as `SUM(amount)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    expr: String,
}

impl Function {
    fn wrap(name: &str, column: impl Into<Column>) -> Self {
        Self {
            expr: format!("{name}({})", column.into().resolve()),
        }
    }

    pub fn sum(column: impl Into<Column>) -> Self {
        Self::wrap("SUM", column)
    }

    pub fn avg(column: impl Into<Column>) -> Self {
        Self::wrap("AVG", column)
    }

    pub fn max(column: impl Into<Column>) -> Self {
        Self::wrap("MAX", column)
    }

    pub fn min(column: impl Into<Column>) -> Self {
        Self::wrap("MIN", column)
    }

    pub fn count(column: impl Into<Column>) -> Self {
        Self::wrap("COUNT", column)
    }

    /// The bare expression, e.g. `SUM(amount)`.
    pub fn expr(&self) -> &str {
        &self.expr
    }

    /// `SUM(amount) AS alias`
    pub fn as_(&self, alias: &str) -> String {
        format!("{} AS {alias}", self.expr)
    }

    fn compare(&self, op: &str, value: impl Into<Value>) -> (String, Value) {
        (format!("{} {op} ?", self.expr), value.into())
    }

    pub fn eq(&self, value: impl Into<Value>) -> (String, Value) {
        self.compare("=", value)
    }

    pub fn ne(&self, value: impl Into<Value>) -> (String, Value) {
        self.compare("<>", value)
    }

    pub fn gt(&self, value: impl Into<Value>) -> (String, Value) {
        self.compare(">", value)
    }

    pub fn ge(&self, value: impl Into<Value>) -> (String, Value) {
        self.compare(">=", value)
    }

    pub fn lt(&self, value: impl Into<Value>) -> (String, Value) {
        self.compare("<", value)
    }

    pub fn le(&self, value: impl Into<Value>) -> (String, Value) {
        self.compare("<=", value)
    }

    fn set<I, V>(&self, op: &str, values: I) -> (String, Vec<Value>)
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let mut args = Vec::new();
        let list = lower::bind(&Value::list(values), &mut args);
        (format!("{} {op} {list}", self.expr), args)
    }

    /// `SUM(amount) IN (?, ?, ...)`
    pub fn in_list<I, V>(&self, values: I) -> (String, Vec<Value>)
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.set("IN", values)
    }

    /// `SUM(amount) NOT IN (?, ?, ...)`
    pub fn not_in<I, V>(&self, values: I) -> (String, Vec<Value>)
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.set("NOT IN", values)
    }

    pub fn between(&self, from: impl Into<Value>, to: impl Into<Value>) -> (String, Value, Value) {
        (format!("{} BETWEEN ? AND ?", self.expr), from.into(), to.into())
    }

    pub fn not_between(&self, from: impl Into<Value>, to: impl Into<Value>) -> (String, Value, Value) {
        (format!("{} NOT BETWEEN ? AND ?", self.expr), from.into(), to.into())
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expr)
    }
}

/// `column AS alias`
pub fn as_(column: impl Into<Column>, alias: &str) -> String {
    format!("{} AS {alias}", column.into().resolve())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_column_in_function() {
        assert_eq!(Function::sum("amount").expr(), "SUM(amount)");
        assert_eq!(Function::avg("score").to_string(), "AVG(score)");
        assert_eq!(Function::max("age").as_("oldest"), "MAX(age) AS oldest");
        assert_eq!(Function::count("*").expr(), "COUNT(*)");
    }

    #[test]
    fn comparisons_return_fragment_and_arg() {
        let (sql, arg) = Function::sum("amount").ge(100);
        assert_eq!(sql, "SUM(amount) >= ?");
        assert_eq!(arg, Value::Int(100));

        let (sql, _) = Function::min("price").ne(0);
        assert_eq!(sql, "MIN(price) <> ?");
    }

    #[test]
    fn in_list_sizes_placeholders_to_args() {
        let (sql, args) = Function::count("id").in_list([1, 2, 3]);
        assert_eq!(sql, "COUNT(id) IN (?, ?, ?)");
        assert_eq!(args.len(), 3);

        let (sql, args) = Function::count("id").not_in(Vec::<i64>::new());
        assert_eq!(sql, "COUNT(id) NOT IN (NULL)");
        assert!(args.is_empty());
    }

    #[test]
    fn in_list_inlines_raw_and_flattens_nested_items() {
        let (sql, args) = Function::max("score").in_list([
            Value::Int(1),
            Value::raw("(SELECT MAX(score) FROM archive)"),
            Value::list([2, 3]),
        ]);
        assert_eq!(sql, "MAX(score) IN (?, (SELECT MAX(score) FROM archive), ?, ?)");
        assert_eq!(args, vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
    }

    #[test]
    fn between_binds_both_bounds() {
        let (sql, from, to) = Function::avg("age").between(18, 30);
        assert_eq!(sql, "AVG(age) BETWEEN ? AND ?");
        assert_eq!((from, to), (Value::Int(18), Value::Int(30)));

        let (sql, _, _) = Function::avg("age").not_between(1, 2);
        assert_eq!(sql, "AVG(age) NOT BETWEEN ? AND ?");
    }

    #[test]
    fn tuples_convert_into_fragments() {
        let fragment: Fragment = Function::sum("amount").gt(10).into();
        assert_eq!(fragment.sql, "SUM(amount) > ?");
        assert_eq!(fragment.args, vec![Value::Int(10)]);

        let fragment: Fragment = Function::sum("amount").between(1, 9).into();
        assert_eq!(fragment.args.len(), 2);
    }

    #[test]
    fn standalone_alias() {
        assert_eq!(as_("created_at", "ts"), "created_at AS ts");
    }
}
