//! Drops and recreates the database schema. Development only.

use anyhow::bail;
use clap::Parser;
use football_predictor::config::Settings;
use football_predictor::{db, logging};

#[derive(Parser, Debug)]
#[command(about = "Drop every table and recreate the schema from migrations")]
struct Args {
    /// Required: every row in the target database is lost.
    #[arg(long)]
    yes_drop_everything: bool,

    /// Overrides DATABASE_URL.
    #[arg(long)]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let mut settings = Settings::from_env()?;
    if let Some(url) = args.database_url {
        settings.database_url = url;
    }
    logging::init(&settings);

    if !args.yes_drop_everything {
        bail!("refusing to drop the schema without --yes-drop-everything");
    }
    if settings.uses_memory_store() {
        bail!("DATABASE_URL=memory has no schema to bootstrap");
    }

    let pool = db::connect(&settings).await?;
    db::reset_schema(&pool).await?;
    let report = db::describe(&pool).await?;

    println!("Tables:");
    for table in report.tables() {
        println!("  - {table}");
    }

    for table in report.tables() {
        println!("\n{}", table.to_uppercase());

        let columns: Vec<_> = report.columns.iter().filter(|c| c.table_name == table).collect();
        println!("  Columns: {}", columns.len());
        for c in columns {
            println!("    - {}: {}", c.column_name, c.data_type);
        }

        let indexes: Vec<_> = report.indexes.iter().filter(|i| i.table_name == table).collect();
        if !indexes.is_empty() {
            println!("  Indexes: {}", indexes.len());
            for i in indexes {
                println!("    - {}", i.index_name);
            }
        }

        let fks: Vec<_> = report
            .foreign_keys
            .iter()
            .filter(|f| f.table_name == table)
            .collect();
        if !fks.is_empty() {
            println!("  Foreign keys: {}", fks.len());
            for f in fks {
                println!(
                    "    - {} ({}) -> {}.{}",
                    f.constraint_name, f.column_name, f.referenced_table, f.referenced_column
                );
            }
        }
    }

    pool.close().await;
    Ok(())
}
