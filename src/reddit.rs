use crate::story::{StoryComment, StoryRecord};
use reqwest::header::USER_AGENT;
use serde::Deserialize;
use tracing::{debug, info, warn};

const UA: &str = "storyreel/0.1 (story video generator)";

const QUESTION_OPENERS: &[&str] = &[
    "what", "do you", "does", "did", "how", "why", "have you", "has anyone", "can you", "is", "are",
    "who", "when", "where", "will", "should", "could",
];

#[derive(Debug, Deserialize)]
pub struct RedditListing<T> {
    pub data: RedditListingData<T>,
}

#[derive(Debug, Deserialize)]
pub struct RedditListingData<T> {
    pub children: Vec<RedditChild<T>>,
}

#[derive(Debug, Deserialize)]
pub struct RedditChild<T> {
    pub data: T,
}

#[derive(Debug, Deserialize)]
pub struct RedditPost {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub selftext: String,
    pub is_self: Option<bool>,
    pub over_18: Option<bool>,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub permalink: String,
    #[serde(default)]
    pub created_utc: f64,
}

#[derive(Debug, Deserialize)]
pub struct RedditComment {
    pub author: Option<String>,
    pub score: Option<i64>,
    pub body: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub subreddits: Vec<String>,
    pub tags: Vec<String>,
    pub sort: String,
    pub timeframe: String,
    pub limit_per_sub: usize,
    pub min_score: i64,
    pub top_comments: usize,
}

/// Titles phrased as questions are prompts, not stories.
pub fn is_story_post(title: &str) -> bool {
    let t = title.trim().to_lowercase();
    if t.ends_with('?') {
        return false;
    }
    !QUESTION_OPENERS.iter().any(|q| {
        t.strip_prefix(q)
            .is_some_and(|rest| rest.is_empty() || !rest.starts_with(|c: char| c.is_alphanumeric()))
    })
}

pub fn matches_tags(title: &str, tags: &[String]) -> bool {
    let t = title.to_lowercase();
    tags.is_empty() || tags.iter().any(|tag| t.contains(&tag.to_lowercase()))
}

/// Keep the posts that make a narratable story, in listing order.
pub fn select_stories(subreddit: &str, posts: Vec<RedditPost>, opts: &FetchOptions) -> Vec<StoryRecord> {
    let mut stories = Vec::new();
    for post in posts {
        if stories.len() >= opts.limit_per_sub {
            break;
        }
        let nsfw = post.over_18.unwrap_or(false);
        let is_self = post.is_self.unwrap_or(true);
        if nsfw || !is_self || post.selftext.trim().is_empty() {
            debug!("Skipping post (NSFW, link or empty): {}", post.title);
            continue;
        }
        if post.score < opts.min_score || !matches_tags(&post.title, &opts.tags) || !is_story_post(&post.title) {
            debug!("Skipping post (filters): {}", post.title);
            continue;
        }
        info!("Selected post: {:.60} ({} chars)", post.title, post.selftext.len());
        stories.push(StoryRecord {
            title: post.title.trim().to_string(),
            full_story: post.selftext.trim().to_string(),
            score: post.score,
            author: post.author.unwrap_or_else(|| "[deleted]".to_string()),
            subreddit: subreddit.to_string(),
            created_utc: post.created_utc,
            permalink: if post.permalink.is_empty() {
                format!("/r/{}/comments/{}", subreddit, post.id)
            } else {
                post.permalink
            },
            top_comments: Vec::new(),
        });
    }
    stories
}

/// Fetch every configured subreddit and return matching stories, highest
/// score first. A subreddit that fails to load is logged and skipped.
pub async fn fetch_stories(opts: &FetchOptions) -> anyhow::Result<Vec<StoryRecord>> {
    let client = reqwest::Client::builder().user_agent(UA).gzip(true).build()?;
    let mut stories = Vec::new();
    for sub in &opts.subreddits {
        info!("Fetching r/{}...", sub);
        match fetch_listing(&client, sub, opts).await {
            Ok(posts) => {
                let mut picked = select_stories(sub, posts, opts);
                if opts.top_comments > 0 {
                    for story in &mut picked {
                        match fetch_top_comments(&client, &story.permalink, opts.top_comments).await {
                            Ok(comments) => story.top_comments = comments,
                            Err(e) => warn!("Comments for {} unavailable: {:#}", story.permalink, e),
                        }
                    }
                }
                stories.extend(picked);
            }
            Err(e) => warn!("Error fetching r/{}: {:#}", sub, e),
        }
    }
    stories.sort_by(|a, b| b.score.cmp(&a.score));
    info!("Total stories fetched: {}", stories.len());
    Ok(stories)
}

async fn fetch_listing(
    client: &reqwest::Client,
    subreddit: &str,
    opts: &FetchOptions,
) -> anyhow::Result<Vec<RedditPost>> {
    // over-fetch, the filters drop most posts
    let limit = (opts.limit_per_sub * 2).clamp(1, 100);
    let url = match opts.sort.as_str() {
        "hot" | "new" => format!("https://www.reddit.com/r/{}/{}.json?limit={}", subreddit, opts.sort, limit),
        _ => format!(
            "https://www.reddit.com/r/{}/top.json?t={}&limit={}",
            subreddit, opts.timeframe, limit
        ),
    };
    let res = client
        .get(&url)
        .header(USER_AGENT, UA)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    let parsed: RedditListing<RedditPost> = serde_json::from_str(&res)?;
    Ok(parsed.data.children.into_iter().map(|c| c.data).collect())
}

async fn fetch_top_comments(
    client: &reqwest::Client,
    permalink: &str,
    n: usize,
) -> anyhow::Result<Vec<StoryComment>> {
    let url = format!(
        "https://www.reddit.com{}.json?sort=top&limit={}",
        permalink.trim_end_matches('/'),
        n
    );
    let res = client.get(&url).send().await?.error_for_status()?.text().await?;
    parse_comments(&res, n)
}

/// A thread is `[post listing, comment listing]`; take the first `n` real
/// comments from the second.
pub fn parse_comments(json: &str, n: usize) -> anyhow::Result<Vec<StoryComment>> {
    let (_, comments): (serde_json::Value, RedditListing<RedditComment>) = serde_json::from_str(json)?;
    Ok(comments
        .data
        .children
        .into_iter()
        .filter_map(|c| {
            let body = c.data.body?;
            Some(StoryComment {
                author: c.data.author.unwrap_or_else(|| "[deleted]".to_string()),
                score: c.data.score.unwrap_or(0),
                body,
            })
        })
        .take(n)
        .collect())
}
