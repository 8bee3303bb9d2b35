use std::env;
use std::path::PathBuf;

use propgen_core::config::{resolve_with_base, Settings};
use propgen_rag::evaluate;
use propgen_rag::ProposalPipeline;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <client_brief> [index_path]", args[0]);
        eprintln!("Example: {} 'AI security audit for a public bank'", args[0]);
        eprintln!("With an index path, a grounded draft is produced too and compared.");
        std::process::exit(1);
    }
    let brief = &args[1];
    let index_path: Option<PathBuf> = args.get(2).map(|p| {
        let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        resolve_with_base(&cwd, p)
    });

    println!("propgen-baseline (no retrieval)\n===============================");
    println!("Brief: {}", brief);

    let settings = Settings::load()?;
    let pipeline = ProposalPipeline::from_settings(settings)?;
    let baseline = pipeline.generate_without_retrieval(brief).await?;

    println!("\n📄 Baseline draft\n-----------------\n{}", baseline);

    if let Some(index_path) = index_path {
        println!("\nComparing against a grounded draft from {}", index_path.display());
        let grounded = pipeline.run(brief, &index_path).await?;
        let similarity =
            evaluate::draft_similarity(pipeline.embedder().as_ref(), &grounded.text, &baseline)?;
        let coverage = evaluate::chunk_coverage(&grounded.text, &grounded.sources);

        println!("\n📄 Grounded draft\n-----------------\n{}", grounded.text);
        println!("\n📊 Draft similarity (grounded vs baseline): {:.3}", similarity);
        println!("📊 Grounding reuse in the grounded draft: {:.1}%", coverage * 100.0);
    } else {
        println!("\n⚠️  Drafted without grounding; prefer an indexed run when possible.");
    }
    Ok(())
}
