//! Command-line consumer of `clientdb_core`.
//!
//! # Responsibility
//! - Map one subcommand to one repository operation.
//! - Own presentation: plain text or JSON rows, `(none)` for absent phones.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use clientdb_core::{
    default_log_level, init_logging, open_db, ClientFilter, ClientRepository, ClientRow,
    ClientUpdate, NewClient, SqliteClientRepository,
};
use log::info;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "clientdb", version, about = "Client and phone book storage")]
struct Cli {
    /// SQLite database file
    #[arg(long, env = "CLIENTDB_PATH", default_value = "clients.db", global = true)]
    db: PathBuf,

    /// Directory for rolling log files; logging is off when unset
    #[arg(long, env = "CLIENTDB_LOG_DIR", global = true)]
    log_dir: Option<PathBuf>,

    /// trace|debug|info|warn|error
    #[arg(long, env = "CLIENTDB_LOG_LEVEL", global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the schema if missing
    Init,
    /// Add a client and print its id
    AddClient {
        first: String,
        last: String,
        email: String,
    },
    /// Attach a phone number to a client
    AddPhone { client_id: i64, phone: String },
    /// Change supplied fields, leaving the others untouched
    Update {
        client_id: i64,
        #[arg(long, default_value = "")]
        first: String,
        #[arg(long, default_value = "")]
        last: String,
        #[arg(long, default_value = "")]
        email: String,
    },
    /// Remove one phone number from a client
    DeletePhone { client_id: i64, phone: String },
    /// Remove a client together with its phones
    DeleteClient { client_id: i64 },
    /// Search by any combination of fields; no criteria lists everyone
    Find {
        #[arg(long, default_value = "")]
        first: String,
        #[arg(long, default_value = "")]
        last: String,
        #[arg(long, default_value = "")]
        email: String,
        #[arg(long, default_value = "")]
        phone: String,
        /// Print one JSON object per row
        #[arg(long)]
        json: bool,
    },
    /// Run a short scripted session against the database
    Demo,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(log_dir) = cli.log_dir.as_ref() {
        let level = cli.log_level.as_deref().unwrap_or(default_log_level());
        init_logging(level, log_dir).context("failed to initialize logging")?;
    }

    // `open_db` ensures the schema, so every subcommand starts from a ready store.
    let conn = open_db(&cli.db)
        .with_context(|| format!("failed to open database `{}`", cli.db.display()))?;
    let repo = SqliteClientRepository::try_new(&conn)?;

    match cli.command {
        Commands::Init => println!("schema ready at {}", cli.db.display()),
        Commands::AddClient { first, last, email } => {
            let id = repo.add_client(&NewClient::new(first, last, email))?;
            println!("{id}");
        }
        Commands::AddPhone { client_id, phone } => {
            let id = repo.add_phone(client_id, &phone)?;
            println!("{id}");
        }
        Commands::Update {
            client_id,
            first,
            last,
            email,
        } => {
            let changed =
                repo.update_client(client_id, &ClientUpdate::from_parts(&first, &last, &email))?;
            report_affected("updated", changed);
        }
        Commands::DeletePhone { client_id, phone } => {
            report_affected("deleted", repo.delete_phone(client_id, &phone)?);
        }
        Commands::DeleteClient { client_id } => {
            report_affected("deleted", repo.delete_client(client_id)?);
        }
        Commands::Find {
            first,
            last,
            email,
            phone,
            json,
        } => {
            let filter = ClientFilter::from_parts(&first, &last, &email, &phone);
            print_rows(&repo, &filter, json)?;
        }
        Commands::Demo => run_demo(&repo)?,
    }

    Ok(())
}

fn report_affected(verb: &str, rows: usize) {
    if rows == 0 {
        println!("nothing {verb}");
    } else {
        println!("{verb} {rows} row(s)");
    }
}

fn print_rows(repo: &impl ClientRepository, filter: &ClientFilter, json: bool) -> Result<()> {
    let mut write_error = None;
    repo.scan_clients(filter, &mut |row| {
        if json {
            match serde_json::to_string(&row) {
                Ok(line) => println!("{line}"),
                Err(err) => {
                    write_error = Some(err);
                    return std::ops::ControlFlow::Break(());
                }
            }
        } else {
            println!("{}", format_row(&row));
        }
        std::ops::ControlFlow::Continue(())
    })?;

    if let Some(err) = write_error {
        return Err(err.into());
    }
    Ok(())
}

fn format_row(row: &ClientRow) -> String {
    format!(
        "id={} {} {} email={} phone={}",
        row.client_id,
        row.first_name,
        row.last_name,
        row.email,
        row.phone.as_deref().unwrap_or("(none)")
    )
}

fn run_demo(repo: &impl ClientRepository) -> Result<()> {
    info!("event=demo module=cli status=start");

    let ivan = repo.add_client(&NewClient::new("Ivan", "Ivanov", "ivan@example.com"))?;
    let petr = repo.add_client(&NewClient::new("Petr", "Petrov", "petr@example.com"))?;
    let anna = repo.add_client(&NewClient::new("Anna", "Smirnova", "anna@example.com"))?;

    repo.add_phone(ivan, "+7-900-111-22-33")?;
    repo.add_phone(ivan, "+7-900-111-22-44")?;
    repo.add_phone(petr, "+7-900-222-33-44")?;

    repo.update_client(
        anna,
        &ClientUpdate::from_parts("", "", "anna.smirnova@example.com"),
    )?;

    println!("Search by email:");
    print_rows(repo, &ClientFilter::by_email("ivan@example.com"), false)?;

    println!("Search by phone:");
    print_rows(repo, &ClientFilter::by_phone("+7-900-222-33-44"), false)?;

    repo.delete_phone(ivan, "+7-900-111-22-44")?;
    repo.delete_client(petr)?;

    println!("After deletion:");
    print_rows(repo, &ClientFilter::default(), false)?;

    info!("event=demo module=cli status=ok");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{format_row, Cli};
    use clap::CommandFactory;
    use clientdb_core::ClientRow;

    fn row(phone: Option<&str>) -> ClientRow {
        ClientRow {
            client_id: 7,
            first_name: "Anna".to_string(),
            last_name: "Smirnova".to_string(),
            email: "anna@example.com".to_string(),
            phone: phone.map(str::to_string),
        }
    }

    #[test]
    fn absent_phone_renders_placeholder() {
        assert_eq!(
            format_row(&row(None)),
            "id=7 Anna Smirnova email=anna@example.com phone=(none)"
        );
        assert_eq!(
            format_row(&row(Some("+7-900"))),
            "id=7 Anna Smirnova email=anna@example.com phone=+7-900"
        );
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
