use anyhow::Context;
use clap::{Parser, Subcommand};
use daftar::{
    config::Config,
    intake::{walker::FileWalker, IncomingFile},
    library::{Library, ListParams},
    search::SearchFilters,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "daftar")]
#[command(about = "दफ़्तर - Keeps your paperwork categorized and searchable", long_about = None)]
struct Cli {
    /// Data directory (default: ~/.daftar)
    #[arg(long, global = true, env = "DAFTAR_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Config file (default: <data dir>/config.json)
    #[arg(long, global = true, env = "DAFTAR_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API
    Serve {
        /// Port to listen on
        #[arg(long, short, default_value = "3000", env = "DAFTAR_PORT")]
        port: u16,
    },

    /// Show which category files would be sorted into
    Categorize {
        /// Filenames to categorize
        #[arg(required = true)]
        filenames: Vec<String>,
    },

    /// Import every document in a folder for one owner
    Import {
        /// Folder to import
        path: PathBuf,

        /// Owner the documents belong to
        #[arg(long, short)]
        owner: String,

        /// Show each imported file
        #[arg(long, short)]
        verbose: bool,
    },

    /// Search an owner's documents
    Search {
        /// Free text query (empty lists everything)
        #[arg(default_value = "")]
        query: String,

        #[arg(long, short)]
        owner: String,

        /// Only documents in this category
        #[arg(long, short)]
        category: Option<String>,

        /// Only documents with any of these tags
        #[arg(long = "tag", short)]
        tags: Vec<String>,

        /// Number of results to return
        #[arg(long, short, default_value = "20")]
        limit: usize,

        #[arg(long, default_value = "0")]
        offset: usize,
    },

    /// Show statistics about an owner's documents
    Stats {
        #[arg(long, short)]
        owner: String,
    },

    /// List the category taxonomy
    Categories,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "daftar=info,tower_http=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(cli.data_dir, cli.config)?;
    let library = Library::open(config).await.context("failed to open library")?;

    match cli.command {
        Commands::Serve { port } => {
            daftar::web::serve(Arc::new(library), port).await?;
        }
        Commands::Categorize { filenames } => {
            categorize_files(&library, &filenames);
        }
        Commands::Import { path, owner, verbose } => {
            import_folder(&library, &path, &owner, verbose).await?;
        }
        Commands::Search {
            query,
            owner,
            category,
            tags,
            limit,
            offset,
        } => {
            let params = ListParams {
                query,
                filters: SearchFilters {
                    category,
                    tags: if tags.is_empty() { None } else { Some(tags) },
                },
                offset,
                limit: Some(limit),
            };
            search_documents(&library, &owner, &params).await;
        }
        Commands::Stats { owner } => {
            show_stats(&library, &owner).await;
        }
        Commands::Categories => {
            list_categories(&library);
        }
    }

    Ok(())
}

fn load_config(data_dir: Option<PathBuf>, config_path: Option<PathBuf>) -> anyhow::Result<Config> {
    let default_dir = Config::default().storage.data_dir;
    let dir = data_dir.clone().unwrap_or(default_dir);
    let config_path = config_path.unwrap_or_else(|| dir.join("config.json"));

    let mut config = Config::load(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    if let Some(data_dir) = data_dir {
        config.storage.data_dir = data_dir;
    }

    std::fs::create_dir_all(&config.storage.data_dir)
        .with_context(|| format!("failed to create {}", config.storage.data_dir.display()))?;
    Ok(config)
}

fn categorize_files(library: &Library, filenames: &[String]) {
    use colored::Colorize;

    let taxonomy = library.taxonomy();
    for filename in filenames {
        let mime_type = mime_guess::from_path(filename).first_or_octet_stream();
        let result = library.categorizer().categorize(filename, mime_type.as_ref());
        println!(
            "{}  {} {}",
            filename,
            taxonomy.display_name(&result.category_id).green().bold(),
            format!("({:.0}%)", result.confidence * 100.0).dimmed()
        );
    }
}

async fn import_folder(
    library: &Library,
    path: &PathBuf,
    owner: &str,
    verbose: bool,
) -> anyhow::Result<()> {
    use colored::Colorize;
    use indicatif::{ProgressBar, ProgressStyle};

    if !path.exists() {
        anyhow::bail!("Path does not exist: {}", path.display());
    }

    println!("{} {}", "Importing:".cyan().bold(), path.display());
    println!("{} {}", "Owner:".cyan(), owner);
    println!();

    let walker = FileWalker::new(library.config().import.clone());
    let discovered = walker.walk(path)?;

    println!("{} {} files", "Discovered:".green(), discovered.len());
    println!();

    let pb = ProgressBar::new(discovered.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    let mut imported_count = 0;
    let mut skipped_count = 0;

    for disc_file in discovered {
        let filename = disc_file
            .path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();

        pb.set_message(filename.clone());

        let bytes = match tokio::fs::read(&disc_file.path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                if verbose {
                    pb.println(format!("  {} {} [{}]", "✗".red(), filename, e));
                }
                skipped_count += 1;
                pb.inc(1);
                continue;
            }
        };

        // Extension guesses are only a hint, content sniffing gets the final say
        let declared = Some(disc_file.mime_type).filter(|m| m != "application/octet-stream");
        let file = IncomingFile::new(filename.clone(), declared, bytes);

        match library.ingest(owner, file).await {
            Ok(doc) => {
                if verbose {
                    let category = library.taxonomy().display_name(&doc.category).to_string();
                    pb.println(format!("  {} {} [{}]", "✓".green(), filename, category));
                }
                imported_count += 1;
            }
            Err(e) => {
                if verbose {
                    pb.println(format!("  {} {} [{}]", "✗".red(), filename, e));
                }
                skipped_count += 1;
            }
        }

        pb.inc(1);
    }

    pb.finish_with_message("Done!");
    println!();

    library.persist().await?;

    println!("{}", "Import complete!".green().bold());
    println!("  {} {} files imported", "✓".green(), imported_count);
    if skipped_count > 0 {
        println!("  {} {} files skipped", "⚠".yellow(), skipped_count);
    }
    println!();

    Ok(())
}

async fn search_documents(library: &Library, owner: &str, params: &ListParams) {
    use colored::Colorize;

    let page = library.list(owner, params).await;
    let taxonomy = library.taxonomy();

    println!();
    if params.query.is_empty() {
        println!("{} {}", "Documents of".cyan().bold(), owner);
    } else {
        println!("{} \"{}\"", "Results for:".cyan().bold(), params.query);
    }
    println!();

    if page.items.is_empty() {
        println!("{}", "No results found.".yellow());
        return;
    }

    for (i, doc) in page.items.iter().enumerate() {
        println!("{}", format!("{}. {}", page.offset + i + 1, doc.name).green());
        println!(
            "   {}: {} ({:.0}%)",
            "Category".dimmed(),
            taxonomy.display_name(&doc.category),
            doc.confidence * 100.0
        );
        if !doc.tags.is_empty() {
            println!("   {}: {}", "Tags".dimmed(), doc.tags.join(", "));
        }
        println!("   {}: {}", "Id".dimmed(), doc.id);
        println!();
    }

    println!(
        "Showing {}-{} of {}{}",
        page.offset + 1,
        page.offset + page.items.len(),
        page.total,
        if page.has_more { " (more available)" } else { "" }
    );
}

async fn show_stats(library: &Library, owner: &str) {
    use colored::Colorize;

    let stats = library.stats(owner).await;

    println!();
    println!("{}", "Collection Statistics".cyan().bold());
    println!("─────────────────────");
    println!("  {}: {}", "Total documents".green(), stats.total_documents);
    println!("  {}: {}", "Categorized".green(), stats.categorized_documents);
    println!("  {}: {}", "Added this week".green(), stats.recent_uploads);
    println!("  {}: {}", "Categories used".green(), stats.categories_used);
    println!("  {}: {}%", "Organization score".green(), stats.organization_score);
    println!();

    for entry in stats.category_breakdown.iter().filter(|c| c.count > 0) {
        println!("  {:<22} {}", entry.display_name, entry.count);
    }
    println!();
}

fn list_categories(library: &Library) {
    use colored::Colorize;

    println!();
    for category in library.taxonomy().categories() {
        let keywords = if category.is_fallback() {
            "(fallback)".dimmed().to_string()
        } else {
            category.keywords.join(", ")
        };
        println!("  {:<15} {:<22} {}", category.id.cyan(), category.display_name, keywords);
    }
    println!();
}
