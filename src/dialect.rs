//! SQL dialect selection for rendered statements.

/// SQL dialect variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    /// MySQL
    #[default]
    MySql,
    /// PostgreSQL
    Postgres,
    /// SQLite
    Sqlite,
}

impl Dialect {
    /// Parse dialect from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "mysql" => Some(Self::MySql),
            "postgres" | "postgresql" => Some(Self::Postgres),
            "sqlite" => Some(Self::Sqlite),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::MySql => "mysql",
            Self::Postgres => "postgres",
            Self::Sqlite => "sqlite",
        }
    }
}

/// Render a sea-query statement with the builder matching `$dialect`.
macro_rules! render {
    ($stmt:expr, $dialect:expr) => {
        match $dialect {
            $crate::dialect::Dialect::MySql => $stmt.to_string(sea_query::MysqlQueryBuilder),
            $crate::dialect::Dialect::Postgres => $stmt.to_string(sea_query::PostgresQueryBuilder),
            $crate::dialect::Dialect::Sqlite => $stmt.to_string(sea_query::SqliteQueryBuilder),
        }
    };
}

pub(crate) use render;
