use std::io::{self, BufRead, Write};

use anyhow::Result;
use clap::Parser;
use pagecite::chat::{ChatAnswer, ChatSession, PreparedPrompt, DEFAULT_TOP_K};
use pagecite::settings::{LlmArgs, LogArgs, OpenAiArgs, QdrantArgs};
use pagecite::{logging, CollectionName};

#[derive(Parser, Debug)]
#[command(
    name = "pagecite-chat",
    about = "Ask questions about an ingested PDF and get answers with citations"
)]
struct ChatCli {
    /// Answer this question and exit instead of starting the prompt loop
    #[arg(long)]
    query: Option<String>,

    /// Collection holding the ingested chunks
    #[arg(long, env = "PAGECITE_COLLECTION", default_value = "blitzscaling")]
    collection_name: String,

    /// Number of chunks retrieved per question
    #[arg(long, default_value_t = DEFAULT_TOP_K)]
    top_k: usize,

    /// Only print the rendered prompt (skip LLM call)
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    #[command(flatten)]
    openai: OpenAiArgs,

    #[command(flatten)]
    qdrant: QdrantArgs,

    #[command(flatten)]
    llm: LlmArgs,

    #[command(flatten)]
    log: LogArgs,
}

fn main() -> Result<()> {
    let cli = ChatCli::parse();
    logging::init(&cli.log.log_level);

    let embedder = cli.openai.build_embedder(1)?;
    let provider = cli.llm.build_provider(cli.openai.openai_api_key.as_deref())?;
    let session = ChatSession::new(
        Box::new(embedder),
        cli.qdrant.build_store()?,
        CollectionName::new(cli.collection_name.clone())?,
        provider,
        cli.top_k,
    );

    if let Some(question) = &cli.query {
        return answer(&session, question, cli.dry_run);
    }

    println!(
        "Ask questions about `{}`; answers come from {}. Type /quit to leave.",
        cli.collection_name,
        session.provider_label()
    );
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        io::stdout().flush()?;
        let Some(line) = lines.next() else {
            println!();
            break;
        };
        let line = line?;
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if question == "/quit" || question == "/exit" {
            break;
        }
        if let Err(err) = answer(&session, question, cli.dry_run) {
            eprintln!("Error! {err:#}");
        }
    }
    Ok(())
}

fn answer(session: &ChatSession, question: &str, dry_run: bool) -> Result<()> {
    println!("Loading data points");
    let prepared = session.prepare(question)?;
    println!(
        "Loaded data points in {:.2} seconds",
        prepared.retrieval_secs
    );
    if dry_run {
        print_prompt(&prepared);
        println!("dry-run enabled; skipping LLM call.");
        return Ok(());
    }

    println!("Calling {}", session.provider_label());
    let answer = session.complete(prepared)?;
    println!("Called LLM in {:.2} seconds", answer.llm_secs);
    print_answer(&answer);
    Ok(())
}

fn print_prompt(prepared: &PreparedPrompt) {
    for message in &prepared.messages {
        println!("--- {:?} ---\n{}\n", message.role, message.content);
    }
}

fn print_answer(answer: &ChatAnswer) {
    println!("--- Answer ---\n{}\n", answer.response.trim());
    println!("--- Citations ---");
    for (idx, point) in answer.data_points.iter().enumerate() {
        let payload = &point.payload;
        println!(
            "[{}] {} page {} chunk {} (score {:.4})",
            idx, payload.doc, payload.page_no, payload.chunk, point.score
        );
    }
}
