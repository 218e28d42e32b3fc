use std::env;
use std::sync::Arc;

use anyhow::{Context, Result};
use satchel::cache::AssetCache;
use satchel::config::Config;
use satchel::entities::ContentKind;
use satchel::fetcher::{Fetcher, default_chain};
use satchel::ingest::{IngestError, SavePipeline};
use satchel::store::{LocalStore, PgRemoteStore, UnifiedStore};
use url::Url;
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;
    let args: Vec<String> = env::args().skip(1).collect();
    let Some(command) = args.first().map(String::as_str) else {
        print_usage();
        return Ok(());
    };

    std::fs::create_dir_all(config.data_dir())?;
    let local = Arc::new(LocalStore::open(config.local_db_path())?);

    // With SATCHEL_USER_ID set, everything runs against the hosted store
    // with the local mirror behind it; unset, the library is purely local.
    let store = Arc::new(match env::var("SATCHEL_USER_ID").ok() {
        Some(raw) => {
            let user_id: Uuid = raw.parse().context("SATCHEL_USER_ID must be a UUID")?;
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(5)
                .connect(config.database_url())
                .await?;
            UnifiedStore::authenticated(user_id, local, Arc::new(PgRemoteStore::new(pool)))
        }
        None => UnifiedStore::anonymous(local),
    });

    match command {
        "save" => {
            let url = args.get(1).context("usage: satchel save <url> [tag...]")?;
            let tags = args[2..].to_vec();

            let cache =
                Arc::new(AssetCache::new(config.cache_dir()).with_timeout(config.fetch_timeout()));
            cache.activate()?;

            let pipeline = SavePipeline::new(
                Fetcher::new(default_chain(), config.fetch_timeout()),
                store.clone(),
            )
            .with_cache(cache);

            let item = match pipeline.save_url(url, tags).await {
                Ok(item) => item,
                Err(err @ IngestError::FetchUnavailable(_)) => {
                    eprintln!("fetch failed; paste the content with `satchel add` instead");
                    return Err(err.into());
                }
                Err(err) => return Err(err.into()),
            };
            println!("saved \"{}\" [{}] as {}", item.title, item.kind, item.id);
        }
        "add" => {
            let usage = "usage: satchel add <title> <file> [tag...]";
            let title = args.get(1).context(usage)?;
            let path = args.get(2).context(usage)?;
            let tags = args[3..].to_vec();

            let content = std::fs::read_to_string(path)?;
            let kind = std::fs::canonicalize(path)
                .ok()
                .and_then(|abs| Url::from_file_path(abs).ok())
                .map(|url| ContentKind::detect(&url))
                .unwrap_or(ContentKind::Text);

            let pipeline = SavePipeline::new(
                Fetcher::new(default_chain(), config.fetch_timeout()),
                store.clone(),
            );
            let item = pipeline.save_manual(title, &content, kind, tags).await?;
            println!("saved \"{}\" [{}] as {}", item.title, item.kind, item.id);
        }
        "list" => {
            for item in store.get_all_items().await {
                let state = if item.is_read { "read" } else { "unread" };
                println!("{}  {:8}  {:6}  {}", item.id, item.kind, state, item.title);
            }
        }
        "stats" => {
            let stats = store.get_stats().await;
            println!("items:     {}", stats.total_items);
            println!("articles:  {}", stats.articles);
            println!("pdfs:      {}", stats.pdfs);
            println!("favorites: {}", stats.favorites);
            println!("read:      {}", stats.read_items);
            println!("archived:  {}", stats.archived);
        }
        "export" => {
            let json = store.export_data().await.context("export failed")?;
            println!("{json}");
        }
        "import" => {
            let path = args.get(1).context("usage: satchel import <file>")?;
            let json = std::fs::read_to_string(path)?;
            if !store.import_data(&json).await {
                anyhow::bail!("import rejected, library left untouched");
            }
            println!("import complete");
        }
        "sync" => {
            if !store.sync_to_remote().await {
                anyhow::bail!("sync needs a signed-in session (set SATCHEL_USER_ID)");
            }
            println!("anonymous items promoted");
        }
        other => {
            eprintln!("unknown command: {other}");
            print_usage();
        }
    }

    Ok(())
}

fn print_usage() {
    eprintln!("usage: satchel <command>");
    eprintln!();
    eprintln!("  save <url> [tag...]          fetch a document and store it");
    eprintln!("  add <title> <file> [tag...]  store pasted content without fetching");
    eprintln!("  list                         list saved items, newest first");
    eprintln!("  stats                        library counts");
    eprintln!("  export                       print a backup envelope as JSON");
    eprintln!("  import <file>                restore a backup envelope");
    eprintln!("  sync                         promote anonymous items (needs SATCHEL_USER_ID)");
}
