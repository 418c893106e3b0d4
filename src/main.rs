use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

use besselchu::cli::{BestsellersArgs, Cli, Command, GenerateArgs, ImageArgs};
use besselchu::config::Config;
use besselchu::model::{BestsellerResult, Book, BookId};
use besselchu::services::{Services, today as local_today};

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    besselchu::logging::init("info").context("init logging")?;

    let cli = Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    let config = Config::from_env().context("load config")?;
    let services = Services::from_config(&config, Path::new(&cli.cache_dir))?;

    match cli.command {
        Command::Bestsellers(args) => bestsellers(&services, args).await.context("bestsellers"),
        Command::Generate(args) => generate(&services, args).await.context("generate"),
        Command::Image(args) => image(&services, args).await.context("image"),
    }
}

async fn bestsellers(services: &Services, args: BestsellersArgs) -> anyhow::Result<()> {
    let today = args.today.unwrap_or_else(local_today);
    let result = services.bestsellers(today).await;

    let mut stdout = std::io::stdout().lock();
    if args.json {
        serde_json::to_writer_pretty(&mut stdout, &result).context("write json")?;
        writeln!(stdout)?;
        return Ok(());
    }

    for book in &result.books {
        writeln!(
            stdout,
            "{:>2}. {} - {} [{}] ({})",
            book.rank,
            book.title,
            book.author,
            book.keyword,
            book.id()
        )?;
    }
    for url in &result.source_urls {
        writeln!(stdout, "source: {url}")?;
    }
    Ok(())
}

async fn generate(services: &Services, args: GenerateArgs) -> anyhow::Result<()> {
    let today = args.today.unwrap_or_else(local_today);
    let list = services.bestsellers(today).await;
    let book = resolve_book(&list, &args.book)?.clone();

    let mut content = services
        .content
        .generate(&book, args.content_type)
        .await?;

    if !args.no_images {
        content = services.attach_images(&book, content).await;
    }

    if let Some(out_dir) = args.out_dir.as_deref() {
        let written = besselchu::export::write_generated(&PathBuf::from(out_dir), &content)
            .context("write output")?;
        for path in written {
            tracing::info!(path = %path.display(), "wrote");
        }
    }

    let mut stdout = std::io::stdout().lock();
    if args.json {
        serde_json::to_writer_pretty(&mut stdout, &content).context("write json")?;
        writeln!(stdout)?;
    } else {
        writeln!(stdout, "{}", content.content)?;
    }
    Ok(())
}

async fn image(services: &Services, args: ImageArgs) -> anyhow::Result<()> {
    let Some(url) = services
        .images
        .generate(
            &args.prompt,
            args.reference_url.as_deref(),
            args.aspect,
            args.subject.as_deref(),
        )
        .await
    else {
        anyhow::bail!("no image generated");
    };

    let out = PathBuf::from(&args.out);
    let dir = out
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let stem = out
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| anyhow::anyhow!("invalid output path: {}", out.display()))?;
    let path = besselchu::export::write_data_uri(dir, stem, &url)?;
    println!("{}", path.display());
    Ok(())
}

fn resolve_book<'a>(list: &'a BestsellerResult, selector: &str) -> anyhow::Result<&'a Book> {
    let selector = selector.trim();
    if let Ok(rank) = selector.parse::<u32>() {
        return list
            .find_by_rank(rank)
            .ok_or_else(|| anyhow::anyhow!("no book at rank {rank}"));
    }
    let id = BookId::parse(selector)
        .ok_or_else(|| anyhow::anyhow!("--book must be a rank or a book id: {selector}"))?;
    list.find(&id)
        .ok_or_else(|| anyhow::anyhow!("unknown book id: {id}"))
}
