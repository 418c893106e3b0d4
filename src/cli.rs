use clap::{Args, Parser, Subcommand};

use crate::model::{AspectRatio, ContentType};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// Directory holding the daily bestseller cache.
    #[arg(long, global = true, default_value = ".besselchu")]
    pub cache_dir: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List today's bestsellers.
    Bestsellers(BestsellersArgs),
    /// Generate a post caption or reels storyboard for one book.
    Generate(GenerateArgs),
    /// Generate a single image from a prompt.
    Image(ImageArgs),
}

#[derive(Debug, Args)]
pub struct BestsellersArgs {
    /// Print the raw JSON result.
    #[arg(long)]
    pub json: bool,

    /// Calendar date used for the cache (YYYY-MM-DD, default: local today).
    #[arg(long)]
    pub today: Option<chrono::NaiveDate>,
}

#[derive(Debug, Args)]
pub struct GenerateArgs {
    /// Book rank (1-based) or book id as printed by `bestsellers`.
    #[arg(long)]
    pub book: String,

    #[arg(long = "type", value_enum)]
    pub content_type: ContentType,

    /// Skip image generation.
    #[arg(long)]
    pub no_images: bool,

    /// Write `content.json` and generated images into this directory.
    #[arg(long)]
    pub out_dir: Option<String>,

    /// Print the result as JSON instead of text.
    #[arg(long)]
    pub json: bool,

    /// Calendar date used for the cache (YYYY-MM-DD, default: local today).
    #[arg(long)]
    pub today: Option<chrono::NaiveDate>,
}

#[derive(Debug, Args)]
pub struct ImageArgs {
    #[arg(long)]
    pub prompt: String,

    /// Image to use as visual reference (e.g. a book cover).
    #[arg(long)]
    pub reference_url: Option<String>,

    /// Book title named in the reference instructions.
    #[arg(long)]
    pub subject: Option<String>,

    #[arg(long, value_enum, default_value_t = AspectRatio::Square)]
    pub aspect: AspectRatio,

    /// Output file path; the extension follows the image type.
    #[arg(long)]
    pub out: String,
}
