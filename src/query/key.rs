use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Listing families reachable from the home screen and the category route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    NowPlaying,
    Popular,
    TopRated,
    Upcoming,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::NowPlaying,
        Category::Popular,
        Category::TopRated,
        Category::Upcoming,
    ];

    pub fn slug(&self) -> &'static str {
        match self {
            Category::NowPlaying => "now-playing",
            Category::Popular => "popular",
            Category::TopRated => "top-rated",
            Category::Upcoming => "upcoming",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Category::NowPlaying => "Now Playing",
            Category::Popular => "Popular",
            Category::TopRated => "Top Rated",
            Category::Upcoming => "Upcoming",
        }
    }

    /// Background refresh period for this row on the home feed.
    pub fn refresh_interval(&self) -> Duration {
        match self {
            Category::NowPlaying | Category::Popular => super::FAST_REFRESH,
            Category::TopRated | Category::Upcoming => super::SLOW_REFRESH,
        }
    }
}

impl FromStr for Category {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.slug() == s)
            .ok_or_else(|| anyhow::anyhow!("unknown category '{}'", s))
    }
}

/// Identity of one cached, independently refreshable query.
///
/// Each variant is a distinct query family, so two keys can only be equal
/// when they name the same family with the same parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    Trending,
    /// First page of a category as shown on the home feed.
    HomeRow(Category),
    Category { category: Category, page: u32 },
    Genre { genre_id: i32, page: u32 },
    Search(String),
    Movie(i32),
    Genres,
    Favorites,
}

impl QueryKey {
    /// The key as an ordered tuple of scope segments.
    pub fn segments(&self) -> Vec<Value> {
        match self {
            QueryKey::Trending => vec![json!("movies"), json!("trending")],
            QueryKey::HomeRow(category) => vec![json!("movies"), json!(category.slug())],
            QueryKey::Category { category, page } => {
                vec![json!("category"), json!(category.slug()), json!(page)]
            }
            QueryKey::Genre { genre_id, page } => {
                vec![json!("genre"), json!(genre_id.to_string()), json!(page)]
            }
            QueryKey::Search(query) => vec![json!("search"), json!(query)],
            QueryKey::Movie(id) => vec![json!("movie"), json!(id.to_string())],
            QueryKey::Genres => vec![json!("genres")],
            QueryKey::Favorites => vec![json!("favorites")],
        }
    }

    pub fn is_home_feed(&self) -> bool {
        matches!(self, QueryKey::Trending | QueryKey::HomeRow(_))
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Value::Array(self.segments()))
    }
}
