use serde::{Deserialize, Serialize};

pub const TMDB_IMAGE_BASE: &str = "https://image.tmdb.org/t/p";

/// Upstream listings stop being addressable past this page.
pub const MAX_PAGES: u32 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSize {
    Small,
    Medium,
    Large,
    Original,
}

impl ImageSize {
    fn poster_segment(&self) -> &'static str {
        match self {
            ImageSize::Small => "w185",
            ImageSize::Medium => "w342",
            ImageSize::Large => "w500",
            ImageSize::Original => "original",
        }
    }

    fn backdrop_segment(&self) -> &'static str {
        match self {
            ImageSize::Small => "w300",
            ImageSize::Medium => "w780",
            ImageSize::Large => "w1280",
            ImageSize::Original => "original",
        }
    }
}

fn image_url(segment: &str, path: Option<&str>) -> Option<String> {
    path.filter(|p| !p.is_empty())
        .map(|p| format!("{TMDB_IMAGE_BASE}/{segment}{p}"))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Genre {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenreList {
    #[serde(default)]
    pub genres: Vec<Genre>,
}

/// Movie summary as returned by listings and search, and as stored in favorites.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    pub id: i32,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub overview: String,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub backdrop_path: Option<String>,
    #[serde(default)]
    pub release_date: String,
    #[serde(default)]
    pub vote_average: f64,
    #[serde(default)]
    pub vote_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre_ids: Option<Vec<i32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genres: Option<Vec<Genre>>,
    #[serde(default)]
    pub popularity: f64,
    #[serde(default)]
    pub original_language: String,
    #[serde(default)]
    pub adult: bool,
}

impl Movie {
    pub fn poster_url(&self, size: ImageSize) -> Option<String> {
        image_url(size.poster_segment(), self.poster_path.as_deref())
    }

    pub fn backdrop_url(&self, size: ImageSize) -> Option<String> {
        image_url(size.backdrop_segment(), self.backdrop_path.as_deref())
    }

    pub fn year(&self) -> Option<&str> {
        self.release_date
            .split('-')
            .next()
            .filter(|y| y.len() == 4 && y.chars().all(|c| c.is_ascii_digit()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CastMember {
    pub id: i32,
    pub name: String,
    #[serde(default)]
    pub character: String,
    #[serde(default)]
    pub profile_path: Option<String>,
    #[serde(default)]
    pub order: u32,
}

impl CastMember {
    pub fn profile_url(&self, size: ImageSize) -> Option<String> {
        image_url(size.poster_segment(), self.profile_path.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrewMember {
    pub id: i32,
    pub name: String,
    #[serde(default)]
    pub job: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub profile_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Video {
    pub id: String,
    pub key: String,
    #[serde(default)]
    pub name: String,
    pub site: String,
    #[serde(rename = "type")]
    pub video_type: String,
}

impl Video {
    pub fn youtube_url(&self) -> Option<String> {
        self.site
            .eq_ignore_ascii_case("YouTube")
            .then(|| format!("https://www.youtube.com/watch?v={}", self.key))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Credits {
    #[serde(default)]
    pub cast: Vec<CastMember>,
    #[serde(default)]
    pub crew: Vec<CrewMember>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Results<T> {
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
}

impl<T> Default for Results<T> {
    fn default() -> Self {
        Self {
            results: Vec::new(),
        }
    }
}

/// Single-movie fetch with credits, similar titles and videos appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieDetail {
    #[serde(flatten)]
    pub movie: Movie,
    #[serde(default)]
    pub runtime: Option<u32>,
    #[serde(default)]
    pub budget: u64,
    #[serde(default)]
    pub revenue: u64,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub tagline: String,
    #[serde(default)]
    pub credits: Credits,
    #[serde(default)]
    pub similar: Results<Movie>,
    #[serde(default)]
    pub videos: Results<Video>,
}

impl MovieDetail {
    pub fn director(&self) -> Option<&CrewMember> {
        self.credits.crew.iter().find(|c| c.job == "Director")
    }

    pub fn top_cast(&self, max: usize) -> Vec<&CastMember> {
        let mut cast: Vec<&CastMember> = self.credits.cast.iter().collect();
        cast.sort_by_key(|c| c.order);
        cast.truncate(max);
        cast
    }

    pub fn trailer(&self) -> Option<&Video> {
        let youtube = |kind: &str| {
            self.videos
                .results
                .iter()
                .find(|v| v.site.eq_ignore_ascii_case("YouTube") && v.video_type == kind)
        };
        youtube("Trailer").or_else(|| youtube("Teaser"))
    }

    /// The summary stored when this movie is favorited.
    pub fn snapshot(&self) -> Movie {
        self.movie.clone()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MoviesResponse {
    #[serde(default = "first_page")]
    pub page: u32,
    #[serde(default)]
    pub results: Vec<Movie>,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub total_results: u64,
}

fn first_page() -> u32 {
    1
}

impl MoviesResponse {
    /// Page count handed to pagination controls.
    pub fn page_count(&self) -> u32 {
        self.total_pages.clamp(1, MAX_PAGES)
    }

    pub fn pagination(&self, page: u32) -> Pagination {
        Pagination::new(page, self.page_count())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub total_pages: u32,
}

impl Pagination {
    pub fn new(page: u32, total_pages: u32) -> Self {
        let total_pages = total_pages.clamp(1, MAX_PAGES);
        Self {
            page: page.clamp(1, total_pages),
            total_pages,
        }
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn prev(&self) -> Self {
        Self::new(self.page.saturating_sub(1), self.total_pages)
    }

    pub fn next(&self) -> Self {
        Self::new(self.page.saturating_add(1), self.total_pages)
    }
}

pub fn genre_name(id: i32) -> Option<&'static str> {
    let name = match id {
        28 => "Action",
        12 => "Adventure",
        16 => "Animation",
        35 => "Comedy",
        80 => "Crime",
        99 => "Documentary",
        18 => "Drama",
        10751 => "Family",
        14 => "Fantasy",
        36 => "History",
        27 => "Horror",
        10402 => "Music",
        9648 => "Mystery",
        10749 => "Romance",
        878 => "Sci-Fi",
        10770 => "TV Movie",
        53 => "Thriller",
        10752 => "War",
        37 => "Western",
        _ => return None,
    };
    Some(name)
}
