use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use clap::{CommandFactory, Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod render;

use daytrip_core::*;
use daytrip_provider::{GeminiProvider, LlmProvider};
use daytrip_schema::{Category, Coordinates, Lodging, ManualStop, StopId, Transport};
use render::{print_candidates, print_itinerary, print_trips};

#[derive(Parser)]
#[command(name = "daytrip", version, about = "Plan, edit and revisit one-day city itineraries")]
struct Cli {
    #[arg(
        long,
        default_value = "~/.daytrip",
        help = "Config root directory (contains config.yaml, data/ and logs/)"
    )]
    config_root: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Generate a day plan for a city and save it")]
    Plan {
        #[arg(help = "City to plan the day in")]
        city: String,
        #[arg(long, help = "Lodging address; the day starts and ends there")]
        lodging: Option<String>,
        #[arg(long, help = "Trip name (defaults to \"<city> Trip\")")]
        name: Option<String>,
        #[arg(long, help = "Print the plan without saving it")]
        dry_run: bool,
    },
    #[command(subcommand, about = "Saved trips")]
    Trips(TripCommands),
    #[command(subcommand, about = "Edit the stops of a saved trip")]
    Stop(StopCommands),
    #[command(subcommand, about = "Places already visited, per city")]
    Visited(VisitedCommands),
    #[command(about = "Look up places; reads queries from stdin when none is given")]
    Search {
        query: Option<String>,
        #[arg(long, help = "City appended to the query for context")]
        city: Option<String>,
    },
    #[command(about = "Validate config.yaml")]
    Validate,
}

#[derive(Subcommand)]
enum TripCommands {
    #[command(about = "List saved trips")]
    List,
    #[command(about = "Show a trip's itinerary")]
    Show {
        #[arg(help = "Trip id or id prefix")]
        trip: String,
        #[arg(long, help = "Print the stored JSON")]
        json: bool,
    },
    #[command(about = "Rename a trip")]
    Rename { trip: String, name: String },
    #[command(about = "Delete a trip")]
    Delete { trip: String },
}

#[derive(Subcommand)]
enum StopCommands {
    #[command(about = "Add a stop; it is placed by time")]
    Add {
        trip: String,
        #[arg(long)]
        name: String,
        #[arg(long, help = "24-hour time, e.g. 13:30")]
        time: String,
        #[arg(long, allow_hyphen_values = true, requires = "lng")]
        lat: Option<f64>,
        #[arg(long, allow_hyphen_values = true, requires = "lat")]
        lng: Option<f64>,
        #[arg(long, help = "Address to look up instead of --lat/--lng")]
        address: Option<String>,
        #[arg(long, default_value = "activity", value_parser = parse_category)]
        category: Category,
        #[arg(long, default_value = "")]
        description: String,
    },
    #[command(about = "Move a stop before another one")]
    Move {
        trip: String,
        stop: String,
        #[arg(long)]
        before: String,
    },
    #[command(about = "Change fields of a stop")]
    Edit {
        trip: String,
        stop: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        time: Option<String>,
        #[arg(long, value_parser = parse_transport)]
        transport: Option<Transport>,
        #[arg(long, value_parser = parse_category)]
        category: Option<Category>,
        #[arg(long)]
        travel_time: Option<String>,
    },
    #[command(about = "Remove a stop")]
    Remove { trip: String, stop: String },
    #[command(about = "Replace a stop with a suggested alternative")]
    Replace { trip: String, stop: String },
    #[command(about = "Mark a stop as visited")]
    Visit { trip: String, stop: String },
}

#[derive(Subcommand)]
enum VisitedCommands {
    #[command(about = "List visited places, for one city or all")]
    List { city: Option<String> },
    #[command(about = "Forget one visited place")]
    Forget { city: String, place: String },
    #[command(about = "Forget every visited place in a city")]
    Clear { city: String },
    #[command(about = "Add a visited place back into a trip")]
    AddTo { trip: String, place: String },
}

fn parse_category(raw: &str) -> Result<Category, String> {
    Category::parse(raw).ok_or_else(|| {
        let known: Vec<&str> = Category::ALL.iter().map(|c| c.as_str()).collect();
        format!("unknown category '{raw}' (expected one of: {})", known.join(", "))
    })
}

fn parse_transport(raw: &str) -> Result<Transport, String> {
    Transport::parse(raw).ok_or_else(|| {
        let known: Vec<&str> = Transport::ALL.iter().map(|t| t.as_str()).collect();
        format!("unknown transport '{raw}' (expected one of: {})", known.join(", "))
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli = Cli::parse();

    // Expand ~ to home directory
    if cli.config_root.starts_with("~") {
        if let Some(home) = std::env::var_os("HOME") {
            cli.config_root = PathBuf::from(home).join(
                cli.config_root
                    .strip_prefix("~")
                    .unwrap_or(&cli.config_root),
            );
        }
    }

    let log_dir = cli.config_root.join("logs");
    std::fs::create_dir_all(&log_dir)?;
    let file_appender = tracing_appender::rolling::daily(&log_dir, "daytrip.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking),
        )
        .init();

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let config = load_config(&cli.config_root)?;
    tracing::debug!(config_root = %cli.config_root.display(), model = %config.provider.model, "config loaded");
    match command {
        Commands::Validate => {
            validate_config(&config)?;
            println!(
                "Config valid. model={}, search={}, data dir={}, api key {}.",
                config.provider.model,
                config.search.base_url,
                config.data_dir(&cli.config_root).display(),
                if config.require_api_key().is_ok() { "set" } else { "missing" },
            );
        }
        Commands::Search { query, city } => {
            validate_config(&config)?;
            run_search(&config, query, city).await?;
        }
        command => {
            validate_config(&config)?;
            let app = App::open(&cli.config_root, config).await?;
            if let Err(err) = app.run(command).await {
                if let Some(hint) = retry_hint(&err) {
                    eprintln!("{hint}");
                }
                return Err(err);
            }
        }
    }
    Ok(())
}

fn retry_hint(err: &anyhow::Error) -> Option<&'static str> {
    let transient = err
        .chain()
        .filter_map(|cause| cause.downcast_ref::<PlannerError>())
        .any(PlannerError::is_retryable);
    transient.then_some(
        "hint: the planning service is temporarily unavailable; run the command again shortly",
    )
}

fn build_gateway(config: &DaytripConfig) -> Arc<dyn PlannerGateway> {
    let key = match config.require_api_key() {
        Ok(key) => key.to_string(),
        Err(err) => return Arc::new(UnavailableGateway::new(err.to_string())),
    };
    let provider: Arc<dyn LlmProvider> = match &config.provider.base_url {
        Some(base_url) => Arc::new(GeminiProvider::with_base_url(key, base_url)),
        None => Arc::new(GeminiProvider::new(key)),
    };
    Arc::new(LlmPlanner::new(provider, config.provider.model.clone()))
}

struct App {
    planner: TripPlanner,
    search: NominatimClient,
}

impl App {
    async fn open(root: &Path, config: DaytripConfig) -> Result<Self> {
        let store = Arc::new(JsonFileStore::new(config.data_dir(root)));
        let planner = TripPlanner::open(build_gateway(&config), store)?;
        for warning in planner.take_load_warnings().await {
            eprintln!("warning: {warning}");
        }
        Ok(Self {
            planner,
            search: NominatimClient::new(&config.search),
        })
    }

    async fn run(&self, command: Commands) -> Result<()> {
        match command {
            Commands::Plan {
                city,
                lodging,
                name,
                dry_run,
            } => self.plan(&city, lodging.as_deref(), name.as_deref(), dry_run).await,
            Commands::Trips(cmd) => self.trips(cmd).await,
            Commands::Stop(cmd) => self.stop(cmd).await,
            Commands::Visited(cmd) => self.visited(cmd).await,
            Commands::Search { .. } | Commands::Validate => Ok(()),
        }
    }

    async fn plan(
        &self,
        city: &str,
        lodging: Option<&str>,
        name: Option<&str>,
        dry_run: bool,
    ) -> Result<()> {
        let lodging = match lodging {
            Some(address) => Some(self.find_lodging(city, address).await?),
            None => None,
        };
        let count = self.planner.plan_day(city, lodging).await?;
        if let Some(name) = name {
            self.planner.rename_session(name).await?;
        }
        if !dry_run {
            let id = self.planner.save().await?;
            println!("Saved {count} stops as trip {id}.");
        }
        self.show_session().await;
        Ok(())
    }

    /// Resolves a lodging address inside the city's bounds.
    async fn find_lodging(&self, city: &str, address: &str) -> Result<Lodging> {
        let city_match = self
            .search
            .search(&SearchQuery::new(city))
            .await?
            .into_iter()
            .next();
        let viewbox = city_match.as_ref().and_then(|c| c.bounding_box);
        let city_name = city_match
            .as_ref()
            .map(|c| c.city_name().to_string())
            .unwrap_or_else(|| city.trim().to_string());

        let query = SearchQuery::new(address).within(viewbox).in_city(city_name);
        let found = self.search.search(&query).await?;
        let first = found
            .first()
            .ok_or_else(|| anyhow!("no location found for lodging '{address}'"))?;
        Ok(first.to_lodging())
    }

    async fn trips(&self, cmd: TripCommands) -> Result<()> {
        match cmd {
            TripCommands::List => print_trips(self.planner.catalog().await.list()),
            TripCommands::Show { trip, json } => {
                let trip = self.planner.load(&trip).await?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&trip)?);
                } else {
                    self.show_session().await;
                }
            }
            TripCommands::Rename { trip, name } => {
                if !self.planner.rename_trip(&trip, &name).await? {
                    bail!("trip name must not be empty");
                }
                println!("Trip renamed to '{}'.", name.trim());
            }
            TripCommands::Delete { trip } => {
                let removed = self.planner.delete_trip(&trip).await?;
                println!("Deleted trip '{}' ({}).", removed.name, removed.id);
            }
        }
        Ok(())
    }

    /// Every stop command loads the trip, applies one action and saves it back.
    async fn stop(&self, cmd: StopCommands) -> Result<()> {
        match cmd {
            StopCommands::Add {
                trip,
                name,
                time,
                lat,
                lng,
                address,
                category,
                description,
            } => {
                self.planner.load(&trip).await?;
                let coordinates = match (lat, lng, address) {
                    (Some(lat), Some(lng), _) => Coordinates::new(lat, lng),
                    (_, _, Some(address)) => self.locate_in_session_city(&address).await?,
                    _ => bail!("give either --lat/--lng or --address"),
                };
                let id = self
                    .planner
                    .add_stop(ManualStop {
                        name,
                        description,
                        time,
                        lat: coordinates.lat,
                        lng: coordinates.lng,
                        category,
                    })
                    .await?;
                println!("Added stop {id}.");
            }
            StopCommands::Move {
                trip,
                stop,
                before,
            } => {
                self.planner.load(&trip).await?;
                let moved = self.resolve_stop(&stop).await?;
                let target = self.resolve_stop(&before).await?;
                if !self.planner.reorder(&moved, &target).await {
                    println!("Order unchanged.");
                }
            }
            StopCommands::Edit {
                trip,
                stop,
                name,
                description,
                time,
                transport,
                category,
                travel_time,
            } => {
                self.planner.load(&trip).await?;
                let id = self.resolve_stop(&stop).await?;
                let patch = StopPatch {
                    name,
                    description,
                    time,
                    coordinates: None,
                    transport,
                    category,
                    travel_time,
                };
                self.planner.update_stop(&id, patch).await?;
            }
            StopCommands::Remove { trip, stop } => {
                self.planner.load(&trip).await?;
                let id = self.resolve_stop(&stop).await?;
                let removed = self.planner.remove_stop(&id).await?;
                println!("Removed '{}'.", removed.name);
            }
            StopCommands::Replace { trip, stop } => {
                self.planner.load(&trip).await?;
                let id = self.resolve_stop(&stop).await?;
                self.planner.suggest_alternative(&id).await?;
            }
            StopCommands::Visit { trip, stop } => {
                self.planner.load(&trip).await?;
                let id = self.resolve_stop(&stop).await?;
                if !self.planner.mark_visited(&id).await? {
                    println!("Already marked as visited.");
                }
            }
        }
        self.save_if_needed().await?;
        self.show_session().await;
        Ok(())
    }

    async fn visited(&self, cmd: VisitedCommands) -> Result<()> {
        match cmd {
            VisitedCommands::List { city: Some(city) } => {
                let places = self.planner.visited_for(&city).await;
                if places.is_empty() {
                    println!("No visited places recorded for {}.", city.trim());
                }
                for place in places {
                    println!("{place}");
                }
            }
            VisitedCommands::List { city: None } => {
                let ledger = self.planner.ledger().await;
                if ledger.is_empty() {
                    println!("No visited places recorded.");
                }
                for (city, places) in ledger.cities() {
                    println!("{city}:");
                    for place in places {
                        println!("  {place}");
                    }
                }
            }
            VisitedCommands::Forget { city, place } => {
                if !self.planner.forget_visited(&city, &place).await? {
                    bail!("'{}' is not recorded for {}", place.trim(), city.trim());
                }
                println!("Forgot '{}'.", place.trim());
            }
            VisitedCommands::Clear { city } => {
                if self.planner.clear_visited(&city).await? {
                    println!("Cleared visited places for {}.", city.trim());
                } else {
                    println!("Nothing recorded for {}.", city.trim());
                }
            }
            VisitedCommands::AddTo { trip, place } => {
                self.planner.load(&trip).await?;
                self.planner.add_visited_place(&place).await?;
                self.save_if_needed().await?;
                self.show_session().await;
            }
        }
        Ok(())
    }

    async fn resolve_stop(&self, reference: &str) -> Result<StopId> {
        self.planner
            .session()
            .await
            .find_stop(reference)
            .map(|item| item.id.clone())
            .ok_or_else(|| anyhow!("no stop matches '{reference}'"))
    }

    async fn locate_in_session_city(&self, address: &str) -> Result<Coordinates> {
        let city = self.planner.session().await.city().to_string();
        let found = self
            .search
            .search(&SearchQuery::new(address).in_city(city))
            .await?;
        found
            .first()
            .map(|candidate| candidate.coordinates())
            .ok_or_else(|| anyhow!("no location found for '{address}'"))
    }

    async fn save_if_needed(&self) -> Result<()> {
        if self.planner.session().await.needs_save() {
            self.planner.save().await?;
        }
        Ok(())
    }

    async fn show_session(&self) {
        let session = self.planner.session().await;
        let visited = self.planner.visited_for(session.city()).await;
        print_itinerary(&session, &visited);
    }
}

async fn run_search(config: &DaytripConfig, query: Option<String>, city: Option<String>) -> Result<()> {
    let client = NominatimClient::new(&config.search);
    let build = |text: String| {
        let query = SearchQuery::new(text);
        match &city {
            Some(city) => query.in_city(city.clone()),
            None => query,
        }
    };

    if let Some(text) = query {
        let query = build(text);
        if !query.is_searchable() {
            bail!("queries need at least {MIN_QUERY_CHARS} characters");
        }
        print_candidates(&client.search(&query).await?);
        return Ok(());
    }

    let debounced = Arc::new(DebouncedSearch::new(
        Arc::new(client),
        Duration::from_millis(config.search.debounce_ms),
    ));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut tasks = Vec::new();
    while let Some(line) = lines.next_line().await? {
        let debounced = debounced.clone();
        let query = build(line);
        tasks.push(tokio::spawn(async move {
            let text = query.full_text();
            match debounced.search(query).await {
                Ok(Some(results)) if !results.is_empty() => {
                    println!("{text}:");
                    print_candidates(&results);
                }
                Ok(_) => {}
                Err(err) => eprintln!("search failed: {err:#}"),
            }
        }));
    }
    for task in tasks {
        task.await?;
    }
    Ok(())
}
