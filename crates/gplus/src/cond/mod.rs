//! Typed condition builder.
//!
//! [`QueryCond`] accumulates a flat list of [`Segment`]s (columns, keywords,
//! values and bracketed groups) plus the SELECT/ORDER/GROUP/HAVING/LIMIT
//! clauses of one query. Logical keywords are normalized while building:
//!
//! - a predicate following another predicate gets an implicit `AND`
//! - a keyword with nothing before it is dropped
//! - a keyword repeated immediately is kept once
//! - a keyword following a different keyword replaces it (last write wins)
//!
//! ```ignore
//! let (mut q, u) = QueryCond::<User>::with_fields();
//! q.eq(u.id, 5).and_group(|q| {
//!     q.eq(u.name, "a").or().eq(u.name, "b");
//! });
//! // id = ? AND ( name = ? OR name = ? )   args: [5, "a", "b"]
//! ```

pub(crate) mod lower;


use crate::function::Fragment;
use crate::model::{Column, Model};
use crate::registry::ModelRegistry;
use crate::statement::Statement;
use crate::value::Value;
use std::fmt;
use std::marker::PhantomData;

/// Structural token of a condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Keyword {
    And,
    Or,
    /// Comparison operator such as `=` or `NOT BETWEEN`.
    Op(&'static str),
    /// Raw condition text injected by `add_and_str_cond` / `add_or_str_cond`.
    Raw(String),
}

impl Keyword {
    /// `AND` / `OR`.
    pub fn is_logical(&self) -> bool {
        matches!(self, Keyword::And | Keyword::Or)
    }

    pub fn as_sql(&self) -> &str {
        match self {
            Keyword::And => "AND",
            Keyword::Or => "OR",
            Keyword::Op(op) => op,
            Keyword::Raw(sql) => sql,
        }
    }
}

/// One unit of a flattened condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Column(Column),
    Keyword(Keyword),
    Value(Value),
    /// The `AND` between the bounds of `BETWEEN`, not a logical connective.
    RangeAnd,
    /// Nested condition rendered in brackets.
    Group(Vec<Segment>),
}

impl Segment {
    fn is_logical(&self) -> bool {
        matches!(self, Segment::Keyword(k) if k.is_logical())
    }

    /// Whether this segment renders any SQL on its own.
    fn has_content(&self) -> bool {
        match self {
            Segment::Keyword(k) => !k.is_logical(),
            Segment::Group(inner) => inner.iter().any(Segment::has_content),
            _ => true,
        }
    }
}

/// Sort direction for `ORDER BY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Condition and clause builder for queries over `T`.
pub struct QueryCond<T> {
    segments: Vec<Segment>,
    selects: Vec<Column>,
    omits: Vec<Column>,
    distinct: Vec<Column>,
    order: Vec<(Column, SortOrder)>,
    group: Vec<Column>,
    having: Vec<Fragment>,
    limit: Option<i64>,
    offset: Option<i64>,
    updates: Vec<(Column, Value)>,
    _model: PhantomData<fn() -> T>,
}

impl<T> Default for QueryCond<T> {
    fn default() -> Self {
        Self {
            segments: Vec::new(),
            selects: Vec::new(),
            omits: Vec::new(),
            distinct: Vec::new(),
            order: Vec::new(),
            group: Vec::new(),
            having: Vec::new(),
            limit: None,
            offset: None,
            updates: Vec::new(),
            _model: PhantomData,
        }
    }
}

impl<T> Clone for QueryCond<T> {
    fn clone(&self) -> Self {
        Self {
            segments: self.segments.clone(),
            selects: self.selects.clone(),
            omits: self.omits.clone(),
            distinct: self.distinct.clone(),
            order: self.order.clone(),
            group: self.group.clone(),
            having: self.having.clone(),
            limit: self.limit,
            offset: self.offset,
            updates: self.updates.clone(),
            _model: PhantomData,
        }
    }
}

impl<T> fmt::Debug for QueryCond<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryCond")
            .field("segments", &self.segments)
            .field("selects", &self.selects)
            .field("omits", &self.omits)
            .field("distinct", &self.distinct)
            .field("order", &self.order)
            .field("group", &self.group)
            .field("having", &self.having)
            .field("limit", &self.limit)
            .field("offset", &self.offset)
            .field("updates", &self.updates)
            .finish()
    }
}

impl<T: Model> QueryCond<T> {
    /// A fresh builder together with the typed field references of `T`.
    pub fn with_fields() -> (Self, T::Fields) {
        (Self::new(), T::fields())
    }
}

impl<T> QueryCond<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The accumulated condition segments.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Whether the condition renders no SQL.
    pub fn is_empty(&self) -> bool {
        !self.segments.iter().any(Segment::has_content)
    }

    /// Pending `set` assignments used by `Engine::update`.
    pub fn updates(&self) -> &[(Column, Value)] {
        &self.updates
    }

    /// Clear all state so the builder can be reused.
    pub fn reset(&mut self) -> &mut Self {
        self.segments.clear();
        self.selects.clear();
        self.omits.clear();
        self.distinct.clear();
        self.order.clear();
        self.group.clear();
        self.having.clear();
        self.limit = None;
        self.offset = None;
        self.updates.clear();
        self
    }

    fn push_implicit_and(&mut self) {
        match self.segments.last() {
            None => {}
            Some(last) if last.is_logical() => {}
            Some(_) => self.segments.push(Segment::Keyword(Keyword::And)),
        }
    }

    fn push_logical(&mut self, keyword: Keyword) {
        match self.segments.last_mut() {
            None => {}
            Some(last) if last.is_logical() => *last = Segment::Keyword(keyword),
            Some(_) => self.segments.push(Segment::Keyword(keyword)),
        }
    }

    fn push_predicate(&mut self, column: Column, op: &'static str, operands: Vec<Segment>) -> &mut Self {
        self.push_implicit_and();
        self.segments.push(Segment::Column(column));
        self.segments.push(Segment::Keyword(Keyword::Op(op)));
        self.segments.extend(operands);
        self
    }

    fn compare(&mut self, column: impl Into<Column>, op: &'static str, value: impl Into<Value>) -> &mut Self {
        self.push_predicate(column.into(), op, vec![Segment::Value(value.into())])
    }

    fn pattern(&mut self, column: impl Into<Column>, op: &'static str, value: Value, prefix: &str, suffix: &str) -> &mut Self {
        let pattern = Value::Text(format!("{prefix}{value}{suffix}"));
        self.push_predicate(column.into(), op, vec![Segment::Value(pattern)])
    }

    fn range(&mut self, column: impl Into<Column>, op: &'static str, from: Value, to: Value) -> &mut Self {
        self.push_predicate(
            column.into(),
            op,
            vec![Segment::Value(from), Segment::RangeAnd, Segment::Value(to)],
        )
    }

    /// `column = ?`
    pub fn eq(&mut self, column: impl Into<Column>, value: impl Into<Value>) -> &mut Self {
        self.compare(column, "=", value)
    }

    /// `column <> ?`
    pub fn ne(&mut self, column: impl Into<Column>, value: impl Into<Value>) -> &mut Self {
        self.compare(column, "<>", value)
    }

    /// `column > ?`
    pub fn gt(&mut self, column: impl Into<Column>, value: impl Into<Value>) -> &mut Self {
        self.compare(column, ">", value)
    }

    /// `column >= ?`
    pub fn ge(&mut self, column: impl Into<Column>, value: impl Into<Value>) -> &mut Self {
        self.compare(column, ">=", value)
    }

    /// `column < ?`
    pub fn lt(&mut self, column: impl Into<Column>, value: impl Into<Value>) -> &mut Self {
        self.compare(column, "<", value)
    }

    /// `column <= ?`
    pub fn le(&mut self, column: impl Into<Column>, value: impl Into<Value>) -> &mut Self {
        self.compare(column, "<=", value)
    }

    /// `column LIKE '%v%'`
    pub fn like(&mut self, column: impl Into<Column>, value: impl Into<Value>) -> &mut Self {
        self.pattern(column, "LIKE", value.into(), "%", "%")
    }

    /// `column NOT LIKE '%v%'`
    pub fn not_like(&mut self, column: impl Into<Column>, value: impl Into<Value>) -> &mut Self {
        self.pattern(column, "NOT LIKE", value.into(), "%", "%")
    }

    /// `column LIKE '%v'`
    pub fn like_left(&mut self, column: impl Into<Column>, value: impl Into<Value>) -> &mut Self {
        self.pattern(column, "LIKE", value.into(), "%", "")
    }

    /// `column NOT LIKE '%v'`
    pub fn not_like_left(&mut self, column: impl Into<Column>, value: impl Into<Value>) -> &mut Self {
        self.pattern(column, "NOT LIKE", value.into(), "%", "")
    }

    /// `column LIKE 'v%'`
    pub fn like_right(&mut self, column: impl Into<Column>, value: impl Into<Value>) -> &mut Self {
        self.pattern(column, "LIKE", value.into(), "", "%")
    }

    /// `column NOT LIKE 'v%'`
    pub fn not_like_right(&mut self, column: impl Into<Column>, value: impl Into<Value>) -> &mut Self {
        self.pattern(column, "NOT LIKE", value.into(), "", "%")
    }

    /// `column IS NULL`
    pub fn is_null(&mut self, column: impl Into<Column>) -> &mut Self {
        self.push_predicate(column.into(), "IS NULL", Vec::new())
    }

    /// `column IS NOT NULL`
    pub fn is_not_null(&mut self, column: impl Into<Column>) -> &mut Self {
        self.push_predicate(column.into(), "IS NOT NULL", Vec::new())
    }

    /// `column IN (?, ?, ...)`; an empty list renders `IN (NULL)`.
    pub fn in_list<I, V>(&mut self, column: impl Into<Column>, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.push_predicate(column.into(), "IN", vec![Segment::Value(Value::list(values))])
    }

    /// `column NOT IN (?, ?, ...)`
    pub fn not_in<I, V>(&mut self, column: impl Into<Column>, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.push_predicate(column.into(), "NOT IN", vec![Segment::Value(Value::list(values))])
    }

    /// `column BETWEEN ? AND ?`
    pub fn between(&mut self, column: impl Into<Column>, from: impl Into<Value>, to: impl Into<Value>) -> &mut Self {
        self.range(column, "BETWEEN", from.into(), to.into())
    }

    /// `column NOT BETWEEN ? AND ?`
    pub fn not_between(&mut self, column: impl Into<Column>, from: impl Into<Value>, to: impl Into<Value>) -> &mut Self {
        self.range(column, "NOT BETWEEN", from.into(), to.into())
    }

    /// Connect the next predicate with `AND`.
    pub fn and(&mut self) -> &mut Self {
        self.push_logical(Keyword::And);
        self
    }

    /// Connect the next predicate with `OR`.
    pub fn or(&mut self) -> &mut Self {
        self.push_logical(Keyword::Or);
        self
    }

    /// `AND ( ... )` built by `f` on a fresh nested builder.
    pub fn and_group(&mut self, f: impl FnOnce(&mut QueryCond<T>)) -> &mut Self {
        self.push_group(Keyword::And, f)
    }

    /// `OR ( ... )` built by `f` on a fresh nested builder.
    pub fn or_group(&mut self, f: impl FnOnce(&mut QueryCond<T>)) -> &mut Self {
        self.push_group(Keyword::Or, f)
    }

    fn push_group(&mut self, keyword: Keyword, f: impl FnOnce(&mut QueryCond<T>)) -> &mut Self {
        self.push_logical(keyword);
        let mut nested = QueryCond::new();
        f(&mut nested);
        self.segments.push(Segment::Group(nested.segments));
        self
    }

    /// Append a raw condition joined with `AND`. Empty input is ignored.
    pub fn add_and_str_cond(&mut self, sql: impl Into<String>) -> &mut Self {
        self.push_raw(Keyword::And, sql.into())
    }

    /// Append a raw condition joined with `OR`. Empty input is ignored.
    pub fn add_or_str_cond(&mut self, sql: impl Into<String>) -> &mut Self {
        self.push_raw(Keyword::Or, sql.into())
    }

    fn push_raw(&mut self, keyword: Keyword, sql: String) -> &mut Self {
        if sql.trim().is_empty() {
            return self;
        }
        self.push_logical(keyword);
        self.segments.push(Segment::Keyword(Keyword::Raw(sql)));
        self
    }

    /// Apply `f` only when `condition` holds.
    pub fn case(&mut self, condition: bool, f: impl FnOnce(&mut Self)) -> &mut Self {
        if condition {
            f(self);
        }
        self
    }

    /// Restrict the selected columns.
    pub fn select<I, C>(&mut self, columns: I) -> &mut Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Column>,
    {
        self.selects.extend(columns.into_iter().map(Into::into));
        self
    }

    /// Exclude columns from the selection.
    pub fn omit<I, C>(&mut self, columns: I) -> &mut Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Column>,
    {
        self.omits.extend(columns.into_iter().map(Into::into));
        self
    }

    /// `SELECT DISTINCT` over the given columns.
    pub fn distinct<I, C>(&mut self, columns: I) -> &mut Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Column>,
    {
        self.distinct.extend(columns.into_iter().map(Into::into));
        self
    }

    /// `GROUP BY`; repeated calls append.
    pub fn group<I, C>(&mut self, columns: I) -> &mut Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Column>,
    {
        self.group.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn order_by_asc<I, C>(&mut self, columns: I) -> &mut Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Column>,
    {
        self.order
            .extend(columns.into_iter().map(|c| (c.into(), SortOrder::Asc)));
        self
    }

    pub fn order_by_desc<I, C>(&mut self, columns: I) -> &mut Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Column>,
    {
        self.order
            .extend(columns.into_iter().map(|c| (c.into(), SortOrder::Desc)));
        self
    }

    /// `HAVING` fragment; repeated calls are joined with `AND`.
    ///
    /// Accepts raw text or the tuples produced by [`Function`](crate::Function).
    pub fn having(&mut self, fragment: impl Into<Fragment>) -> &mut Self {
        let fragment = fragment.into();
        if !fragment.sql.trim().is_empty() {
            self.having.push(fragment);
        }
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

    /// Record `column = value` for `Engine::update`; a later call on the
    /// same column replaces the earlier value.
    pub fn set(&mut self, column: impl Into<Column>, value: impl Into<Value>) -> &mut Self {
        let column = column.into();
        let value = value.into();
        match self.updates.iter_mut().find(|(c, _)| *c == column) {
            Some(entry) => entry.1 = value,
            None => self.updates.push((column, value)),
        }
        self
    }

    /// Lower the condition into WHERE text and its positional arguments.
    pub fn to_where(&self, registry: &ModelRegistry) -> (String, Vec<Value>) {
        let mut args = Vec::new();
        let sql = lower::lower(&self.segments, registry, &mut args);
        (sql, args)
    }

    /// Copy every clause of this builder onto a statement.
    pub fn apply_to(&self, stmt: &mut Statement, registry: &ModelRegistry) {
        let (where_sql, args) = self.to_where(registry);
        if !where_sql.is_empty() {
            stmt.filter(where_sql, args);
        }
        stmt.select(self.selects.iter().map(|c| registry.resolve_column(c)));
        stmt.omit(self.omits.iter().map(|c| registry.resolve_column(c)));
        stmt.distinct(self.distinct.iter().map(|c| registry.resolve_column(c)));
        stmt.group(self.group.iter().map(|c| registry.resolve_column(c)));
        stmt.order(
            self.order
                .iter()
                .map(|(c, dir)| format!("{} {}", registry.resolve_column(c), dir.as_sql())),
        );
        for fragment in &self.having {
            stmt.having(fragment.clone());
        }
        if let Some(limit) = self.limit {
            stmt.limit(limit);
        }
        if let Some(offset) = self.offset {
            stmt.offset(offset);
        }
    }
}
