use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use std::io::{self, BufRead, Write};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use team_manager::config::{BackendKind, TeamConfig};
use team_manager::dashboard;
use team_manager::deletion::{DeletionFlow, DeletionTarget, EntityKind};
use team_manager::store::{self, PgStore};
use team_manager::utils::format_date;
use team_manager::{web, Team};

#[derive(Debug, Parser)]
#[command(author, version, about = "Players, practices and matches for one team", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the JSON API
    Serve,
    /// Apply SQL migrations to the Postgres backend
    Migrate,
    /// Print dashboard counts, upcoming practices, recent matches and top scorers
    Dashboard,
    /// List players with their health card status
    Players {
        /// Only players whose name contains this term
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Print a player's match statistics and monthly attendance
    Profile {
        player_id: Uuid,
    },
    /// Delete a player, practice or match
    Delete {
        #[arg(value_enum)]
        kind: EntityKind,
        id: Uuid,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("team_manager=info,tower_http=info")),
        )
        .init();
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

async fn ask(question: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || -> Result<bool> {
        print!("{} [y/N] ", question);
        io::stdout().flush()?;
        let mut answer = String::new();
        io::stdin().lock().read_line(&mut answer)?;
        Ok(is_yes(&answer))
    })
    .await?
}

async fn migrate(config: &TeamConfig) -> Result<()> {
    if config.backend != BackendKind::Postgres {
        anyhow::bail!("migrate only applies to the postgres backend");
    }
    let url = config
        .postgres
        .database_url
        .as_deref()
        .context("DATABASE_URL is not set")?;
    let store = PgStore::connect(
        url,
        config.postgres.max_connections,
        Duration::from_secs(config.request_timeout_secs),
    )
    .await?;
    store.migrate().await?;
    info!("Migrations applied");
    Ok(())
}

async fn print_dashboard(team: &Team) -> Result<()> {
    let board = dashboard::dashboard(team, Utc::now()).await?;
    let counts = &board.counts;
    println!("Players:               {}", counts.total_players);
    println!("Practices:             {}", counts.total_practices);
    println!("Matches:               {}", counts.total_matches);
    println!("Expiring health cards: {}", counts.expiring_health_cards);

    println!("\nUpcoming practices");
    for practice in &board.upcoming_practices {
        println!(
            "  {}  {} attending  {}",
            format_date(practice.date),
            practice.attendee_count,
            practice.notes.as_deref().unwrap_or("")
        );
    }

    println!("\nRecent matches");
    for game in &board.recent_matches {
        println!("  {}  vs {}  {}", format_date(game.date), game.rival, game.result);
    }

    println!("\nTop scorers");
    for bar in &board.top_scorers {
        println!("  {:<16} {}", bar.name, bar.goals);
    }
    Ok(())
}

async fn print_players(team: &Team, search: Option<String>) -> Result<()> {
    let players = match search {
        Some(term) => team.players().search(&term).await?,
        None => team.players().get_all().await?,
    };
    for entry in dashboard::player_list(players, Utc::now()) {
        println!(
            "{}  {:<28} {:>3} goals  {} ({})",
            entry.player.id,
            entry.player.full_name,
            entry.player.goals_scored,
            entry.health_card.status.label(),
            entry.health_card.description
        );
    }
    Ok(())
}

async fn print_profile(team: &Team, player_id: Uuid) -> Result<()> {
    let profile = dashboard::player_profile(team, player_id, Utc::now()).await?;
    let stats = &profile.match_statistics;
    println!("{}", profile.player.full_name);
    println!(
        "Health card: {} ({})",
        profile.health_card.status.label(),
        profile.health_card.description
    );
    println!(
        "Matches: {}  Minutes: {}  Average: {}  Substitutions: {}",
        stats.total_matches, stats.total_minutes, stats.average_minutes, stats.substitutions
    );
    println!(
        "Practices attended: {} ({:.0}%)",
        profile.statistics.practices_attended, profile.statistics.attendance_rate
    );
    println!("\nAttendance by month");
    for month in &profile.practice_attendance {
        println!("  {:<8} {:.0}%", month.month, month.attendance);
    }
    Ok(())
}

async fn delete(team: &Team, target: DeletionTarget, yes: bool) -> Result<()> {
    let mut flow = DeletionFlow::new();
    flow.request(target);
    let confirmed = match flow.prompt() {
        Some(_) if yes => true,
        Some(question) => ask(question).await?,
        None => false,
    };
    if !confirmed {
        flow.cancel();
        println!("Cancelled");
        return Ok(());
    }
    flow.confirm();
    flow.execute(team).await?;
    println!("Deleted {} {}", target.kind, target.id);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = TeamConfig::from_env();

    if let Commands::Migrate = cli.command {
        return migrate(&config).await;
    }

    let backend = store::connect(&config).await?;
    let team = Team::new(backend, config);

    match cli.command {
        Commands::Serve => web::serve(team).await?,
        Commands::Migrate => {}
        Commands::Dashboard => print_dashboard(&team).await?,
        Commands::Players { search } => print_players(&team, search).await?,
        Commands::Profile { player_id } => print_profile(&team, player_id).await?,
        Commands::Delete { kind, id, yes } => {
            delete(&team, DeletionTarget::new(kind, id), yes).await?
        }
    }

    Ok(())
}
