use std::path::PathBuf;

use clap::{Parser, Subcommand};

use cms_router::config::loader::{load_config, load_routes};
use cms_router::config::schema::RouterConfig;
use cms_router::observability::logging::init_logging;
use cms_router::routing::cache::{load_cache, write_cache};
use cms_router::routing::collection::RouteSource;
use cms_router::signing::signer::SigningSecret;

const DEFAULT_CACHE_PATH: &str = "routes.cache.json";

#[derive(Parser)]
#[command(name = "route-cache")]
#[command(about = "Compile, verify and inspect the route cache", long_about = None)]
struct Cli {
    /// Router configuration (TOML). Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a route definition file into a cache artifact
    Build {
        /// Route definition file (TOML)
        #[arg(short, long)]
        routes: PathBuf,

        /// Output path; defaults to `cache.path` from config
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Hydrate every entry of a cache artifact and report corruption
    Verify {
        path: Option<PathBuf>,
    },
    /// Print the routes of a definition file or cache artifact
    List {
        #[arg(short, long, conflicts_with = "cache")]
        routes: Option<PathBuf>,

        #[arg(long)]
        cache: Option<PathBuf>,
    },
    /// Generate a random signing secret (hex)
    Secret,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => RouterConfig::default(),
    };
    init_logging(&config.logging);

    let cache_path = |explicit: Option<PathBuf>| {
        explicit
            .or_else(|| config.cache.path.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_PATH))
    };

    match cli.command {
        Commands::Build { routes, output } => {
            let collection = load_routes(&routes)?.into_collection()?;
            let output = cache_path(output);
            write_cache(&output, &collection)?;
            println!("Wrote {} routes to {}", collection.count(), output.display());
        }
        Commands::Verify { path } => {
            let path = cache_path(path);
            let cached = load_cache(&path)?;
            let routes = cached.all()?;
            println!("{}: {} routes OK", path.display(), routes.len());
        }
        Commands::List { routes, cache } => {
            let source: Box<dyn RouteSource> = match routes {
                Some(routes) => Box::new(load_routes(&routes)?.into_collection()?),
                None => Box::new(load_cache(&cache_path(cache))?),
            };
            print_routes(source.as_ref())?;
        }
        Commands::Secret => {
            println!("{}", SigningSecret::generate().to_hex());
        }
    }

    Ok(())
}

fn print_routes(source: &dyn RouteSource) -> Result<(), Box<dyn std::error::Error>> {
    println!("{:<32} {:<20} {:<40} {:<28} MIDDLEWARE", "NAME", "METHODS", "PATTERN", "CONTROLLER");
    for route in source.iter() {
        let route = route?;
        let methods: Vec<&str> = route.methods().iter().map(String::as_str).collect();
        let middleware: Vec<String> = route.middleware_list().iter().map(ToString::to_string).collect();
        println!(
            "{:<32} {:<20} {:<40} {:<28} {}",
            route.name().unwrap_or("-"),
            methods.join("|"),
            route.pattern().as_str(),
            route.controller().to_string(),
            middleware.join(" ")
        );
    }
    Ok(())
}
