//! Per-call options for engine operations.
//!
//! ```ignore
//! engine.select_list(&q, [options::table("users_archive"), options::omit(["password"])]).await?;
//! engine.insert(&user, [options::db(&tx)]).await?;
//! ```

use crate::driver::Driver;
use crate::model::Column;

/// Options resolved for one operation.
#[derive(Default)]
pub struct Options<'a> {
    pub table: Option<String>,
    pub db: Option<&'a dyn Driver>,
    pub selects: Vec<Column>,
    pub omits: Vec<Column>,
    pub ignore_total: bool,
}

impl std::fmt::Debug for Options<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Options")
            .field("table", &self.table)
            .field("db", &self.db.map(|_| "<driver>"))
            .field("selects", &self.selects)
            .field("omits", &self.omits)
            .field("ignore_total", &self.ignore_total)
            .finish()
    }
}

/// A mutator applied to a blank [`Options`].
pub type OptionFn<'a> = Box<dyn FnOnce(&mut Options<'a>) + Send + 'a>;

impl<'a> Options<'a> {
    /// Apply every mutator to a blank option set.
    pub fn resolve<I>(opts: I) -> Self
    where
        I: IntoIterator<Item = OptionFn<'a>>,
    {
        let mut options = Options::default();
        for opt in opts {
            opt(&mut options);
        }
        options
    }
}

/// Override the table name.
pub fn table<'a>(name: impl Into<String>) -> OptionFn<'a> {
    let name = name.into();
    Box::new(move |o| o.table = Some(name))
}

/// Run on the given connection or transaction instead of the engine's.
pub fn db<'a>(driver: &'a dyn Driver) -> OptionFn<'a> {
    Box::new(move |o| o.db = Some(driver))
}

/// Restrict the columns read or written.
pub fn select<'a, I, C>(columns: I) -> OptionFn<'a>
where
    I: IntoIterator<Item = C>,
    C: Into<Column>,
{
    let columns: Vec<Column> = columns.into_iter().map(Into::into).collect();
    Box::new(move |o| o.selects.extend(columns))
}

/// Exclude columns from reads and writes.
pub fn omit<'a, I, C>(columns: I) -> OptionFn<'a>
where
    I: IntoIterator<Item = C>,
    C: Into<Column>,
{
    let columns: Vec<Column> = columns.into_iter().map(Into::into).collect();
    Box::new(move |o| o.omits.extend(columns))
}

/// Skip the count query of `select_page`.
pub fn ignore_total<'a>() -> OptionFn<'a> {
    Box::new(|o| o.ignore_total = true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_applies_mutators_in_order() {
        let options = Options::resolve([
            table("a"),
            select(["id"]),
            select(["name"]),
            omit(["secret"]),
            table("b"),
        ]);
        assert_eq!(options.table.as_deref(), Some("b"));
        assert_eq!(options.selects, vec![Column::from("id"), Column::from("name")]);
        assert_eq!(options.omits, vec![Column::from("secret")]);
        assert!(!options.ignore_total);
        assert!(options.db.is_none());
    }

    #[test]
    fn empty_resolves_to_defaults() {
        let options = Options::resolve(Vec::new());
        assert!(options.table.is_none());
        assert!(options.selects.is_empty());
        assert!(Options::resolve([ignore_total()]).ignore_total);
    }
}
