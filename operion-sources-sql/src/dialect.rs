//! SQL dialect differences `sqlx::Any` itself does not paper over:
//! placeholder syntax and identifier quoting.

/// Which relational backend a persistence URL resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    MySql,
    Sqlite,
}

impl Dialect {
    pub fn from_url(url: &str) -> Option<Self> {
        match url.split("://").next()? {
            "postgres" | "postgresql" => Some(Dialect::Postgres),
            "mysql" => Some(Dialect::MySql),
            "sqlite" => Some(Dialect::Sqlite),
            _ => None,
        }
    }

    /// Render the `n`th (1-based) bind placeholder for this dialect.
    pub fn placeholder(&self, n: usize) -> String {
        match self {
            Dialect::Postgres => format!("${n}"),
            Dialect::MySql | Dialect::Sqlite => "?".to_string(),
        }
    }

    /// The `CREATE TABLE IF NOT EXISTS` autoincrement column type for a
    /// migration version counter, varies because MySQL has no `SERIAL`.
    pub fn autoincrement_int(&self) -> &'static str {
        match self {
            Dialect::Postgres => "BIGSERIAL",
            Dialect::MySql => "BIGINT AUTO_INCREMENT",
            Dialect::Sqlite => "INTEGER",
        }
    }

    /// Rewrite every `?` placeholder in `sql` (written MySQL/SQLite style)
    /// into this dialect's actual bind syntax, in left-to-right order.
    /// `sqlx::Any` dispatches straight to the underlying driver, so
    /// Postgres needs `$1, $2, ...` rather than positional `?`s.
    pub fn rewrite_placeholders(&self, sql: &str) -> String {
        match self {
            Dialect::MySql | Dialect::Sqlite => sql.to_string(),
            Dialect::Postgres => {
                let mut out = String::with_capacity(sql.len() + 8);
                let mut n = 0usize;
                for ch in sql.chars() {
                    if ch == '?' {
                        n += 1;
                        out.push_str(&self.placeholder(n));
                    } else {
                        out.push(ch);
                    }
                }
                out
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_schemes() {
        assert_eq!(Dialect::from_url("postgres://h/db"), Some(Dialect::Postgres));
        assert_eq!(Dialect::from_url("postgresql://h/db"), Some(Dialect::Postgres));
        assert_eq!(Dialect::from_url("mysql://h/db"), Some(Dialect::MySql));
        assert_eq!(Dialect::from_url("sqlite://data.db"), Some(Dialect::Sqlite));
        assert_eq!(Dialect::from_url("file:///tmp"), None);
    }

    #[test]
    fn placeholders_differ_by_dialect() {
        assert_eq!(Dialect::Postgres.placeholder(2), "$2");
        assert_eq!(Dialect::MySql.placeholder(2), "?");
        assert_eq!(Dialect::Sqlite.placeholder(2), "?");
    }

    #[test]
    fn rewrite_placeholders_numbers_postgres_binds_in_order() {
        let sql = "SELECT * FROM t WHERE a = ? AND b = ?";
        assert_eq!(
            Dialect::Postgres.rewrite_placeholders(sql),
            "SELECT * FROM t WHERE a = $1 AND b = $2"
        );
        assert_eq!(Dialect::MySql.rewrite_placeholders(sql), sql);
        assert_eq!(Dialect::Sqlite.rewrite_placeholders(sql), sql);
    }
}
