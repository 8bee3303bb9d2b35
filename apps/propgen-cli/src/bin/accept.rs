use std::env;
use std::fs;
use std::path::PathBuf;

use propgen_core::config::{resolve_with_base, Settings};
use propgen_rag::ProposalPipeline;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 4 {
        eprintln!("Usage: {} <client_brief> <proposal_file> <index_path>", args[0]);
        eprintln!("Example: {} 'AI security audit' ./accepted/draft.txt ./indexes/proposals", args[0]);
        std::process::exit(1);
    }
    let brief = &args[1];
    let cwd = env::current_dir()?;
    let proposal_file: PathBuf = resolve_with_base(&cwd, &args[2]);
    let index_path: PathBuf = resolve_with_base(&cwd, &args[3]);

    println!("propgen-accept\n==============");
    println!("Brief: {}", brief);
    println!("Proposal file: {}", proposal_file.display());
    println!("Index path: {}", index_path.display());

    let proposal_text = fs::read_to_string(&proposal_file)?;
    let settings = Settings::load()?;
    let pipeline = ProposalPipeline::from_settings(settings)?;
    let doc_id = pipeline.accept_proposal(brief, &proposal_text, &index_path).await?;

    println!("\n✅ Proposal accepted into the index");
    println!("📄 Document id: {}", doc_id);
    Ok(())
}
