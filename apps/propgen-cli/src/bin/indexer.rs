use std::env;
use std::path::PathBuf;

use propgen_core::config::{resolve_with_base, Settings};
use propgen_rag::ProposalPipeline;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: {} <corpus_dir> <index_path>", args[0]);
        eprintln!("Example: {} ./corpus ./indexes/proposals", args[0]);
        std::process::exit(1);
    }
    let cwd = env::current_dir()?;
    let corpus_dir: PathBuf = resolve_with_base(&cwd, &args[1]);
    let index_path: PathBuf = resolve_with_base(&cwd, &args[2]);

    println!("Proposal corpus indexer\n=======================");
    println!("Corpus directory: {}", corpus_dir.display());
    println!("Index path: {}", index_path.display());

    let settings = Settings::load()?;
    let pipeline = ProposalPipeline::from_settings(settings)?;
    let indexed = pipeline.rebuild_index(&corpus_dir, &index_path).await?;

    println!("\n✅ Indexing completed successfully!");
    println!("📊 Indexed {} chunks", indexed);
    println!("\n💡 To draft a proposal: cargo run --bin propgen-propose '<client brief>' {}", args[2]);
    Ok(())
}
