//! Command-line configuration for the migration binary.

use crate::dialect::Dialect;
use std::path::PathBuf;

pub const DEFAULT_EXCLUDES: [&str; 3] = [".git", "node_modules", "target"];

pub const USAGE: &str = "\
<root> [options]

Options:
  -x, --exclude <dir>     Directory name to skip, repeatable (default: .git, node_modules, target)
  -d, --dialect <name>    SQL dialect: mysql, postgres, sqlite (default: mysql)
  -o, --output <file>     Write the DDL script to a file (default: stdout)
      --drop              Drop every table, dependents first, before creating

Environment:
  RUST_LOG                Log filter (default: schemap=info)";

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("missing <root> argument")]
    MissingRoot,
    #[error("missing value for {0}")]
    MissingValue(String),
    #[error("invalid dialect: {0}")]
    InvalidDialect(String),
    #[error("unknown option: {0}")]
    UnknownOption(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MigrateConfig {
    /// Directory searched for `*.model.json` files.
    pub root: PathBuf,
    pub exclude: Vec<String>,
    pub dialect: Dialect,
    pub output: Option<PathBuf>,
    pub drop: bool,
}

impl MigrateConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            exclude: DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect(),
            dialect: Dialect::default(),
            output: None,
            drop: false,
        }
    }

    /// Parse arguments, program name excluded. `-x` adds to the default excludes.
    pub fn from_args<I>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        let mut root = None;
        let mut exclude = Vec::new();
        let mut dialect = Dialect::default();
        let mut output = None;
        let mut drop = false;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "-x" | "--exclude" => exclude.push(value(&mut args, &arg)?),
                "-d" | "--dialect" => {
                    let name = value(&mut args, &arg)?;
                    dialect = Dialect::from_str(&name).ok_or(ConfigError::InvalidDialect(name))?;
                }
                "-o" | "--output" => output = Some(PathBuf::from(value(&mut args, &arg)?)),
                "--drop" => drop = true,
                s if s.starts_with('-') => return Err(ConfigError::UnknownOption(s.to_string())),
                s if root.is_none() => root = Some(PathBuf::from(s)),
                s => return Err(ConfigError::UnknownOption(s.to_string())),
            }
        }

        let mut config = Self::new(root.ok_or(ConfigError::MissingRoot)?);
        config.exclude.extend(exclude);
        config.dialect = dialect;
        config.output = output;
        config.drop = drop;
        Ok(config)
    }
}

fn value(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<String, ConfigError> {
    args.next().ok_or_else(|| ConfigError::MissingValue(flag.to_string()))
}
