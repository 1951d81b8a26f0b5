use clap::{Parser, Subcommand};
use nuget_assembly::package::PackageIdentity;
use nuget_assembly::{App, Config, commands};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// CLI for nuget-assembly: crawl the package catalog and extract assemblies.
#[derive(Parser)]
#[clap(
    name = "nuget-assembly",
    version,
    about = "Crawl the NuGet catalog and extract package assemblies into a content-addressed store"
)]
struct Cli {
    /// Path to a JSON config file (defaults are used when omitted)
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[clap(short, long, global = true)]
    verbose: bool,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download one package and store its assemblies under an output directory
    Extract {
        /// Package id
        id: String,
        /// Package version
        version: String,
        /// Output directory; assemblies land in `<output>/SHA512/<key>`
        #[clap(long, short, default_value = "assemblies")]
        output: PathBuf,
    },
    /// Publish the download URL of one package to the queue
    Queue {
        /// Package id
        id: String,
        /// Package version
        version: String,
    },
    /// Crawl the catalog from the saved cursor and publish changed packages
    Crawl,
    /// Extract packages by URL into the configured content store
    Process {
        /// Package download URLs
        #[clap(required = true)]
        urls: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cancel = CancellationToken::new();
    nuget_assembly::cancel_on_shutdown(cancel.clone());

    match run(cli, &cancel).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, code = e.error_code(), "Command failed");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_directive = if verbose {
        "info,nuget_assembly=debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run(cli: Cli, cancel: &CancellationToken) -> nuget_assembly::Result<()> {
    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    let app = App::new(config)?;

    match cli.command {
        Commands::Extract {
            id,
            version,
            output,
        } => {
            let identity = PackageIdentity::new(&id, &version)?;
            let source = app.package_source()?;
            let extractor = app.extractor_into(&output);

            match commands::extract_package(&source, &extractor, &identity, cancel).await? {
                Some(summary) => println!(
                    "{identity}: {} assemblies ({} new, {} already stored) in {}",
                    summary.matched,
                    summary.created,
                    summary.already_present,
                    output.display()
                ),
                None => println!("{identity}: package not found"),
            }
        }
        Commands::Queue { id, version } => {
            let identity = PackageIdentity::new(&id, &version)?;
            let mut publisher = app.publisher()?;
            commands::queue_package(
                &mut publisher,
                &app.config().catalog.package_base_url,
                &identity,
                cancel,
            )
            .await?;
            println!("{identity}: queued");
        }
        Commands::Crawl => {
            let db = app.database().await?;
            let crawler = app.crawler(db.clone())?;
            let mut publisher = app.publisher()?;

            let summary = commands::crawl(&crawler, &mut publisher, cancel).await?;
            println!(
                "{} packages published in {} batches; cursor now {}",
                summary.packages, summary.publish.batches, summary.cursor
            );
        }
        Commands::Process { urls } => {
            let store = app.content_store()?;
            let source = Arc::new(app.package_source()?);
            let extractor = Arc::new(app.extractor(store));

            let summary =
                commands::extract_packages(app.pool(), source, extractor, urls, cancel).await?;
            println!(
                "{} packages extracted ({} not found): {} new assemblies, {} already stored",
                summary.packages, summary.missing, summary.created, summary.already_present
            );
        }
    }

    Ok(())
}
