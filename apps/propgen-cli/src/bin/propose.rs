use std::env;
use std::path::PathBuf;
use std::time::Duration;

use propgen_core::config::{resolve_with_base, Settings};
use propgen_rag::ProposalPipeline;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: {} <client_brief> <index_path> [--timeout SECS]", args[0]);
        eprintln!("Example: {} 'AI security audit for a public bank' ./indexes/proposals", args[0]);
        std::process::exit(1);
    }
    let brief = &args[1];
    let cwd = env::current_dir()?;
    let index_path: PathBuf = resolve_with_base(&cwd, &args[2]);
    let mut timeout_secs: Option<u64> = None;
    let mut i = 3;
    while i < args.len() {
        if args[i] == "--timeout" {
            if let Some(v) = args.get(i + 1).and_then(|v| v.parse().ok()) {
                timeout_secs = Some(v);
                i += 1;
            } else {
                eprintln!("Error: --timeout requires a number of seconds");
                std::process::exit(1);
            }
        }
        i += 1;
    }

    println!("🔍 propgen-propose\n==================");
    println!("Brief: {}", brief);
    println!("Index path: {}", index_path.display());

    let settings = Settings::load()?;
    let pipeline = ProposalPipeline::from_settings(settings)?;
    let outcome = match timeout_secs {
        Some(secs) => {
            pipeline
                .run_with_timeout(brief, &index_path, Duration::from_secs(secs))
                .await?
        }
        None => pipeline.run(brief, &index_path).await?,
    };

    println!("\n📄 Draft proposal\n-----------------\n{}", outcome.text);
    println!("\n📚 Grounded on {} chunks:", outcome.sources.len());
    for (i, r) in outcome.sources.iter().enumerate() {
        println!("  {}. score={:.4}  source={}  chunk={}", i + 1, r.score, r.chunk.source, r.chunk.id);
    }
    let coverage = propgen_rag::evaluate::chunk_coverage(&outcome.text, &outcome.sources);
    println!("\n📊 Grounding reuse: {:.1}% of retrieved material", coverage * 100.0);
    Ok(())
}
