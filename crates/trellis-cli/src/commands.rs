use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use colored::Colorize;
use futures::StreamExt;
use serde_json::json;
use tracing::debug;
use trellis_retrieve::{frame_stream, ByteStream, Framing, Retriever};
use trellis_serialize::{node_from_json, Decomposer, SerializerConfig};
use trellis_server::{ServerConfig, TrellisServer};
use trellis_store::{
    BatchWriter, InMemoryObjectStore, JournalConfig, ObjectStore, StoreConfig, WriteSummary,
};
use trellis_transport::{BatchingTransport, StoreSink, TransportConfig};
use trellis_types::{GraphId, ObjectId};

use crate::cli::*;

const JOURNAL_FILE: &str = "store.journal";

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let format = cli.format;
    match cli.command {
        Command::Push(args) => cmd_push(args, format).await,
        Command::Fetch(args) => cmd_fetch(args).await,
        Command::Show(args) => cmd_show(args).await,
        Command::Has(args) => cmd_has(args, format).await,
        Command::Serve(args) => cmd_serve(args).await,
    }
}

/// Outcome of a `push`.
#[derive(Debug)]
pub struct PushReport {
    pub root_id: ObjectId,
    pub nodes_written: usize,
    pub closure_len: usize,
    pub stored: WriteSummary,
}

fn open_store(dir: &Path) -> anyhow::Result<Arc<InMemoryObjectStore>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating store directory {}", dir.display()))?;
    let store = InMemoryObjectStore::open(
        &dir.join(JOURNAL_FILE),
        StoreConfig::default(),
        JournalConfig::default(),
    )
    .with_context(|| format!("opening store in {}", dir.display()))?;
    debug!(path = %dir.display(), nodes = store.len(), "store opened");
    Ok(Arc::new(store))
}

fn parse_graph(raw: &str) -> anyhow::Result<GraphId> {
    GraphId::new(raw).with_context(|| format!("invalid graph id {raw:?}"))
}

fn parse_id(raw: &str) -> anyhow::Result<ObjectId> {
    ObjectId::from_hex(raw).with_context(|| format!("invalid object id {raw:?}"))
}

pub async fn push(args: &PushArgs) -> anyhow::Result<PushReport> {
    let text = std::fs::read_to_string(&args.file)
        .with_context(|| format!("reading {}", args.file.display()))?;
    let document: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("parsing {}", args.file.display()))?;
    let node = node_from_json(&document)?;

    let graph = parse_graph(&args.target.graph)?;
    let store = open_store(&args.target.store)?;
    let writer = BatchWriter::new(store, StoreConfig::default());
    let mut transport =
        BatchingTransport::new(StoreSink::new(writer, graph), TransportConfig::default());

    let config = match args.chunk_size {
        Some(chunk_size) => SerializerConfig { chunk_size },
        None => SerializerConfig::default(),
    };
    let outcome = Decomposer::new(&mut transport, config).write(&node).await?;
    Ok(PushReport {
        root_id: outcome.root_id,
        nodes_written: outcome.nodes_written,
        closure_len: outcome.closure.len(),
        stored: transport.sink().totals(),
    })
}

async fn cmd_push(args: PushArgs, format: OutputFormat) -> anyhow::Result<()> {
    let report = push(&args).await?;
    match format {
        OutputFormat::Json => println!(
            "{}",
            json!({
                "root": report.root_id.to_hex(),
                "nodes_written": report.nodes_written,
                "closure": report.closure_len,
                "nodes_inserted": report.stored.nodes_inserted,
                "closures_inserted": report.stored.closures_inserted,
            })
        ),
        OutputFormat::Text => {
            println!("{} Stored {}", "✓".green().bold(), args.file.display());
            println!("  Root: {}", report.root_id.to_hex().yellow());
            println!("  Graph: {}", args.target.graph.cyan());
            println!(
                "  Nodes: {} written, {} new",
                report.nodes_written,
                report.stored.nodes_inserted.to_string().bold()
            );
            println!(
                "  Closure: {} descendants, {} new edges",
                report.closure_len, report.stored.closures_inserted
            );
        }
    }
    Ok(())
}

/// Framed closure of the requested root, or `None` if it is not stored.
pub async fn fetch(args: &FetchArgs) -> anyhow::Result<Option<ByteStream>> {
    let graph = parse_graph(&args.target.graph)?;
    let id = parse_id(&args.id)?;
    let store: Arc<dyn ObjectStore> = open_store(&args.target.store)?;
    let framing = if args.lines {
        Framing::Lines
    } else {
        Framing::JsonArray
    };
    let retriever = Retriever::new(store, Default::default());
    Ok(retriever
        .stream_closure(&graph, &id, args.depth)
        .await?
        .map(|rows| frame_stream(rows, framing)))
}

async fn cmd_fetch(args: FetchArgs) -> anyhow::Result<()> {
    let mut stream = fetch(&args)
        .await?
        .with_context(|| format!("node {} not found in {}", args.id, args.target.graph))?;
    while let Some(chunk) = stream.next().await {
        std::io::stdout().write_all(&chunk?)?;
    }
    if !args.lines {
        println!();
    }
    Ok(())
}

pub async fn show(args: &ShowArgs) -> anyhow::Result<Option<String>> {
    let graph = parse_graph(&args.target.graph)?;
    let id = parse_id(&args.id)?;
    let retriever = Retriever::new(open_store(&args.target.store)?, Default::default());
    Ok(retriever.get_single(&graph, &id).await?)
}

async fn cmd_show(args: ShowArgs) -> anyhow::Result<()> {
    let body = show(&args)
        .await?
        .with_context(|| format!("node {} not found in {}", args.id, args.target.graph))?;
    let value: serde_json::Value = serde_json::from_str(&body)?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

async fn cmd_has(args: HasArgs, format: OutputFormat) -> anyhow::Result<()> {
    let graph = parse_graph(&args.target.graph)?;
    let ids = args
        .ids
        .iter()
        .map(|raw| parse_id(raw))
        .collect::<anyhow::Result<Vec<_>>>()?;
    let store = open_store(&args.target.store)?;
    let present = store.has_nodes(&graph, &ids).await?;
    match format {
        OutputFormat::Json => {
            let map: serde_json::Map<_, _> = present
                .iter()
                .map(|(id, has)| (id.to_hex(), json!(has)))
                .collect();
            println!("{}", serde_json::Value::Object(map));
        }
        OutputFormat::Text => {
            for (id, has) in &present {
                let mark = if *has { "✓".green() } else { "✗".red() };
                println!("{} {}", mark, id.to_hex());
            }
        }
    }
    Ok(())
}

async fn cmd_serve(args: ServeArgs) -> anyhow::Result<()> {
    let mut config = match &args.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = &args.bind {
        config.bind_addr = bind
            .parse()
            .with_context(|| format!("invalid bind address {bind:?}"))?;
    }
    if let Some(store) = args.store {
        config.store_path = Some(store);
    }
    println!("Trellis server on {}", config.bind_addr.to_string().bold());
    TrellisServer::open(config)?.serve().await?;
    Ok(())
}
