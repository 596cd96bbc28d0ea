use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "storyreel", version, about = "Turn text stories into narrated vertical videos")]
pub struct Args {
    /// TOML config; every key is optional.
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Render stories from the story store into narrated clips.
    Render(RenderArgs),
    /// Fetch stories from reddit into the story store.
    Fetch(FetchArgs),
    /// Cut the background pool into 9:16 clips in parallel.
    Backgrounds(BackgroundsArgs),
}

#[derive(clap::Args, Debug)]
pub struct RenderArgs {
    #[clap(long, default_value = "./config/stories.json")]
    pub stories: PathBuf,

    #[clap(long, default_value = "./res/backgrounds")]
    pub backgrounds: PathBuf,

    #[clap(long, default_value = "./out")]
    pub out: PathBuf,

    /// Skip stories listed here and record the ones rendered.
    #[clap(long)]
    pub used: Option<PathBuf>,

    #[clap(long)]
    pub piper_model: Option<PathBuf>,

    #[clap(long, default_value_t = usize::MAX)]
    pub limit: usize,
}

#[derive(clap::Args, Debug)]
pub struct FetchArgs {
    #[clap(long, value_delimiter = ',', default_value = "relationships,relationship_advice,AmItheAsshole")]
    pub subreddits: Vec<String>,

    #[clap(
        long,
        value_delimiter = ',',
        default_value = "crazy ex,toxic,cheating,breakup,revenge,betrayal,drama"
    )]
    pub tags: Vec<String>,

    #[clap(long, default_value = "top")]
    pub sort: String,

    #[clap(long, default_value = "week")]
    pub timeframe: String,

    #[clap(long, default_value_t = 5)]
    pub limit_per_sub: usize,

    #[clap(long, default_value_t = 100)]
    pub min_score: i64,

    /// Top comments to store with each story (0 skips the extra requests).
    #[clap(long, default_value_t = 3)]
    pub top_comments: usize,

    #[clap(long, default_value = "./config/stories.json")]
    pub out: PathBuf,
}

#[derive(clap::Args, Debug)]
pub struct BackgroundsArgs {
    #[clap(long, default_value = "./res/raw")]
    pub input: PathBuf,

    #[clap(long, default_value = "./res/backgrounds")]
    pub out: PathBuf,

    #[clap(long, default_value_t = 10)]
    pub count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_render_with_global_config() {
        let args = Args::parse_from([
            "storyreel",
            "render",
            "--stories",
            "s.json",
            "--config",
            "c.toml",
            "--limit",
            "2",
        ]);
        assert_eq!(args.config, Some(PathBuf::from("c.toml")));
        match args.command {
            Command::Render(r) => {
                assert_eq!(r.stories, PathBuf::from("s.json"));
                assert_eq!(r.limit, 2);
                assert!(r.used.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn fetch_lists_split_on_commas() {
        let args = Args::parse_from(["storyreel", "fetch", "--subreddits", "TIFU,AskReddit"]);
        match args.command {
            Command::Fetch(f) => {
                assert_eq!(f.subreddits, vec!["TIFU", "AskReddit"]);
                assert_eq!(f.tags.len(), 7);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
