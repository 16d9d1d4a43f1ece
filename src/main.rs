use schemap::Error;
use schemap::config::{MigrateConfig, USAGE};
use schemap::discover::discover;
use schemap::order::{create_all_tables, drop_all_tables};
use schemap::registry::Registry;
use schemap::script::ScriptDatabase;
use std::env;
use std::fs;
use std::process;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let mut args = env::args();
    let program = args.next().unwrap_or_else(|| "schemap".to_string());

    let config = match MigrateConfig::from_args(args) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}", e);
            eprintln!();
            eprintln!("Usage: {} {}", program, USAGE);
            process::exit(1);
        }
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("schemap=info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(&config).await {
        eprintln!("Migration failed: {}", e);
        process::exit(1);
    }
}

async fn run(config: &MigrateConfig) -> Result<(), Error> {
    info!(root = %config.root.display(), dialect = config.dialect.name(), "discovering models");
    let models = discover(&config.root, &config.exclude)?;
    let registry = Registry::new(models)?;
    let db = ScriptDatabase::new(config.dialect);

    if config.drop {
        drop_all_tables(&registry, &db).await?;
    }
    let report = create_all_tables(&registry, &db).await?;
    for table in report.partial_failures() {
        for failure in &table.failures {
            warn!(table = %table.table, index = %failure.index, "{}", failure.error);
        }
    }

    let script = db.script();
    match &config.output {
        Some(path) => fs::write(path, &script).map_err(|source| Error::Write {
            path: path.display().to_string(),
            source,
        })?,
        None => print!("{}", script),
    }

    Ok(())
}
