pub mod config;
pub mod constants;
pub mod db;
pub mod domain;
pub mod entities;
pub mod models;
pub mod normalize;
pub mod providers;
pub mod services;

pub use config::Config;
use db::Store;
use domain::events::ImportEvent;
use domain::{JobStatus, LeagueId, UserId};
use providers::{Credentials, PROVIDER_NAMES};
use services::{
    HealthService, ImportRequest, ImportService, SeaOrmHealthService, SeaOrmImportService,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

pub async fn run() -> anyhow::Result<()> {
    let config = Config::load()?;
    config.validate()?;

    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_help();
        return Ok(());
    }

    match args[1].as_str() {
        "import" | "i" => {
            if args.len() < 4 {
                println!("Usage: leaguevault import <provider> <league_ref> [OPTIONS]");
                println!("Providers: {}", PROVIDER_NAMES.join(", "));
                return Ok(());
            }
            cmd_import(&config, &args[2], &args[3], &args[4..]).await
        }

        "jobs" | "j" => cmd_jobs(&config, args.get(2).map(String::as_str)).await,

        "health" | "h" => {
            if args.len() < 3 {
                println!("Usage: leaguevault health <league_id>");
                println!("Use 'leaguevault leagues' to see IDs");
                return Ok(());
            }
            cmd_health(&config, &args[2]).await
        }

        "leagues" | "ls" | "l" => cmd_leagues(&config).await,

        "aliases" | "a" => {
            if args.len() < 4 {
                println!("Usage: leaguevault aliases <league_id> <user_id> [name1,name2,...]");
                println!("With names: replace that user's alias set. Without: list it.");
                return Ok(());
            }
            cmd_aliases(&config, &args[2], &args[3], args.get(4).map(String::as_str)).await
        }

        "init" => {
            if Config::create_default_if_missing()? {
                println!("Created default config.toml");
            } else {
                println!("config.toml already exists");
            }
            Ok(())
        }

        "help" | "--help" | "-h" => {
            print_help();
            Ok(())
        }

        other => {
            println!("Unknown command: {other}");
            print_help();
            Ok(())
        }
    }
}

fn print_help() {
    println!("LeagueVault - Fantasy League History Importer");
    println!("Pulls every season a league has ever played into one local vault");
    println!();
    println!("USAGE:");
    println!("  leaguevault <COMMAND> [OPTIONS]");
    println!();
    println!("COMMANDS:");
    println!("  import <provider> <ref>  Scan and import a league's full history");
    println!("  jobs [job_id]            List recent import jobs, or show one");
    println!("  health <league_id>       Score an imported league's data quality");
    println!("  leagues, ls              List imported leagues");
    println!("  aliases <league> <user> [names]");
    println!("                           Show or replace a user's owner aliases");
    println!("  init                     Create default config file");
    println!("  help                     Show this help message");
    println!();
    println!("IMPORT OPTIONS:");
    println!("  --user <id>        Importing user id (default from config)");
    println!("  --as <name>        Your display name on league rosters");
    println!("  --league <id>      Merge into an existing league");
    println!("  --seasons <years>  Comma-separated years to import");
    println!("  --csv <path>       Season export file (csv provider only)");
    println!();
    println!("PROVIDERS:");
    println!("  {}", PROVIDER_NAMES.join(", "));
}

struct ImportFlags {
    user_id: Option<i64>,
    display_name: Option<String>,
    target_league_id: Option<i32>,
    selected_seasons: Option<Vec<i32>>,
    csv_path: Option<String>,
}

fn parse_import_flags(args: &[String]) -> anyhow::Result<ImportFlags> {
    let mut flags = ImportFlags {
        user_id: None,
        display_name: None,
        target_league_id: None,
        selected_seasons: None,
        csv_path: None,
    };

    let mut iter = args.iter();
    while let Some(flag) = iter.next() {
        let mut value = || {
            iter.next()
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("{flag} requires a value"))
        };
        match flag.as_str() {
            "--user" => flags.user_id = Some(value()?.parse()?),
            "--as" => flags.display_name = Some(value()?),
            "--league" => flags.target_league_id = Some(value()?.parse()?),
            "--seasons" => {
                let years = value()?
                    .split(',')
                    .map(|y| y.trim().parse::<i32>())
                    .collect::<Result<Vec<_>, _>>()?;
                flags.selected_seasons = Some(years);
            }
            "--csv" => flags.csv_path = Some(value()?),
            other => anyhow::bail!("unknown import option: {other}"),
        }
    }
    Ok(flags)
}

async fn cmd_import(
    config: &Config,
    provider: &str,
    league_ref: &str,
    extra: &[String],
) -> anyhow::Result<()> {
    let flags = parse_import_flags(extra)?;

    let credentials = if provider == "csv" {
        let path = flags
            .csv_path
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("the csv provider needs --csv <path>"))?;
        Credentials::CsvText(std::fs::read_to_string(path)?)
    } else {
        config.credentials_for(provider)
    };

    let store = Store::with_pool_options(
        &config.general.database_path,
        config.general.max_db_connections,
        config.general.min_db_connections,
    )
    .await?;

    let (events, receiver) = tokio::sync::broadcast::channel(config.general.event_bus_buffer_size);
    let printer = tokio::spawn(print_events(receiver));

    let service = SeaOrmImportService::new(store, events).archive_raw(config.import.archive_raw);
    let request = ImportRequest {
        provider: provider.to_string(),
        league_ref: league_ref.to_string(),
        user_id: UserId::new(flags.user_id.unwrap_or(config.import.user_id)),
        credentials,
        display_name: flags.display_name.or_else(|| config.import.display_name.clone()),
        target_league_id: flags.target_league_id.map(LeagueId::new),
        selected_seasons: flags.selected_seasons,
    };

    let result = service.run_full_import(request).await;
    printer.abort();

    match result {
        Ok(outcome) => {
            println!();
            println!(
                "Imported \"{}\" ({} of {} seasons)",
                outcome.league_name,
                outcome.seasons_imported.len(),
                outcome.total_seasons
            );
            if !outcome.repaired_seasons.is_empty() {
                println!(
                    "Repaired partially-saved seasons: {}",
                    join_years(&outcome.repaired_seasons)
                );
            }
            println!("League id: {} | Job id: {}", outcome.league_id, outcome.import_id);
            println!("Run 'leaguevault health {}' to check data quality.", outcome.league_id);
            Ok(())
        }
        Err(e) => {
            println!();
            println!("Import failed: {e}");
            Ok(())
        }
    }
}

async fn print_events(mut receiver: tokio::sync::broadcast::Receiver<ImportEvent>) {
    while let Ok(event) = receiver.recv().await {
        match event {
            ImportEvent::ScanStarted { provider, .. } => {
                println!("Scanning {provider} for seasons...");
            }
            ImportEvent::ScanFinished { seasons_found, .. } => {
                println!("Found {seasons_found} seasons");
            }
            ImportEvent::SeasonImported { year, teams, .. } => {
                println!("  {year}: imported {teams} teams");
            }
            ImportEvent::SeasonFailed { year, message, .. } => {
                println!("  {year}: failed ({message})");
            }
            ImportEvent::SeasonRepaired { year, .. } => {
                println!("  {year}: re-imported after partial save");
            }
            ImportEvent::ImportFinished { .. } | ImportEvent::ImportFailed { .. } => break,
        }
    }
}

async fn cmd_jobs(config: &Config, job_id: Option<&str>) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;

    if let Some(id) = job_id {
        let Some(job) = store.get_job(id).await? else {
            println!("No job with id {id}");
            return Ok(());
        };
        println!("Job {}", job.id);
        println!("  Provider: {} | League ref: {}", job.provider, job.league_ref);
        println!("  Status: {} ({}%)", job.status, job.progress_pct);
        println!("  Seasons found: {}", job.seasons_found);
        if let Some(years) = &job.seasons_imported {
            println!("  Seasons imported: {years}");
        }
        if let Some(years) = &job.repaired_seasons {
            println!("  Repaired: {years}");
        }
        if let Some(log) = &job.error_log {
            println!("  Errors: {log}");
        }
        if JobStatus::parse(&job.status).is_some_and(|s| !s.is_terminal()) {
            println!("  Job never reached a terminal status; the importing process likely died.");
        }
        return Ok(());
    }

    let jobs = store.list_jobs(20).await?;
    if jobs.is_empty() {
        println!("No import jobs yet.");
        return Ok(());
    }
    println!("Recent import jobs");
    println!("{:-<70}", "");
    for job in jobs {
        println!(
            "{} [{}] {} {} ({}%)",
            job.created_at.as_deref().unwrap_or("-"),
            job.status,
            job.provider,
            job.league_ref,
            job.progress_pct
        );
        println!("  id: {}", job.id);
    }
    Ok(())
}

async fn cmd_health(config: &Config, league_id: &str) -> anyhow::Result<()> {
    let league_id = LeagueId::new(league_id.parse()?);
    let store = Store::new(&config.general.database_path).await?;
    let service = SeaOrmHealthService::new(store);

    let report = service.analyze_league(league_id).await?;

    println!(
        "League {league_id} health: {}/100 ({:?})",
        report.overall_score, report.overall_status
    );
    if let Some((min, max)) = report.year_range {
        println!("  {} seasons across {min}-{max}", report.season_count);
    }
    if !report.missing_years.is_empty() {
        println!("  Missing years: {}", join_years(&report.missing_years));
    }
    if report.issues.is_empty() {
        println!("  No issues found.");
        return Ok(());
    }
    println!();
    println!("Issues:");
    for issue in &report.issues {
        println!("  [{:?}] {}", issue.severity, issue.message);
    }
    println!();
    println!("Per-season scores:");
    for (year, season) in &report.per_season {
        println!("  {year}: {}/100 ({:?})", season.score, season.status);
    }
    Ok(())
}

async fn cmd_leagues(config: &Config) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;
    let leagues = store.list_leagues().await?;

    if leagues.is_empty() {
        println!("No leagues imported yet.");
        println!();
        println!("Import one with: leaguevault import sleeper <league_id>");
        return Ok(());
    }

    println!("Imported leagues ({} total)", leagues.len());
    println!("{:-<70}", "");
    for league in leagues {
        let rows = store.team_seasons_for_league(league.id).await?;
        let mut years: Vec<i32> = rows.iter().map(|r| r.season_year).collect();
        years.dedup();
        println!("{} [{}]", league.name, league.sport);
        println!("  ID: {} | Seasons: {}", league.id, years.len());
    }
    Ok(())
}

async fn cmd_aliases(
    config: &Config,
    league_id: &str,
    user_id: &str,
    names: Option<&str>,
) -> anyhow::Result<()> {
    let league_id: i32 = league_id.parse()?;
    let user_id: i64 = user_id.parse()?;
    let store = Store::new(&config.general.database_path).await?;

    if let Some(names) = names {
        let aliases: Vec<String> = names
            .split(',')
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .collect();
        store
            .replace_owner_aliases(league_id, user_id, &aliases)
            .await?;
        info!(league_id, user_id, count = aliases.len(), "alias set replaced");
        println!("Saved {} aliases for user {user_id}.", aliases.len());
        return Ok(());
    }

    let aliases = store.owner_aliases_for(league_id, user_id).await?;
    if aliases.is_empty() {
        println!("No aliases saved for user {user_id} in league {league_id}.");
    } else {
        for alias in aliases {
            println!("{alias}");
        }
    }
    Ok(())
}

fn join_years(years: &[i32]) -> String {
    years
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
