//! Load the home feed through a running proxy and print each row.
//! Usage:
//!   cargo run --bin home_feed
//!   cargo run --bin home_feed -- genre <genre_id> [page]
//!   cargo run --bin home_feed -- movie <tmdb_id>
//!   cargo run --bin home_feed -- favorites
//!   cargo run --bin home_feed -- favorite <tmdb_id>
//!   cargo run --bin home_feed -- unfavorite <tmdb_id>
//! Reads CINEVAULT_API_URL from the environment (.env supported). Favorites
//! live in the platform data directory.

use anyhow::{Context, Result};
use cinevault::client::ApiClient;
use cinevault::favorites::FavoritesStore;
use cinevault::models::{genre_name, ImageSize, MovieDetail, MoviesResponse};
use cinevault::queries::Queries;
use cinevault::query::{Category, QueryCache, QueryKey, QueryState};
use cinevault::storage::FileStore;
use dotenvy::dotenv;
use std::env;
use std::sync::Arc;

fn print_row(title: &str, page: u32, state: &QueryState<MoviesResponse>) {
    println!("== {} ==", title);
    if let Some(err) = &state.error {
        println!("  error: {}", err);
    }
    let Some(data) = &state.data else {
        return;
    };
    let pagination = data.pagination(page);
    println!(
        "  page {}/{} ({} results, prev: {}, next: {})",
        pagination.page,
        pagination.total_pages,
        data.total_results,
        pagination.has_prev(),
        pagination.has_next()
    );
    for movie in data.results.iter().take(5) {
        let genres: Vec<&str> = movie
            .genre_ids
            .iter()
            .flatten()
            .filter_map(|id| genre_name(*id))
            .collect();
        println!(
            "  [{}] {} ({}) {:.1} {}",
            movie.id,
            movie.title,
            movie.year().unwrap_or("----"),
            movie.vote_average,
            genres.join(", ")
        );
    }
}

async fn home(queries: &Queries) {
    print_row("Trending", 1, &queries.trending().await);
    for category in Category::ALL {
        print_row(category.title(), 1, &queries.home_row(category).await);
    }
}

async fn genre(queries: &Queries, args: &[String]) -> Result<()> {
    let genre_id: i32 = args
        .first()
        .context("genre id required")?
        .parse()
        .context("genre id must be a number")?;
    let page: u32 = match args.get(1) {
        Some(p) => p.parse().context("page must be a number")?,
        None => 1,
    };
    let title = genre_name(genre_id).unwrap_or("Unknown genre");
    print_row(title, page, &queries.genre(genre_id, page).await);
    Ok(())
}

fn movie_id(args: &[String]) -> Result<i32> {
    args.first()
        .context("movie id required")?
        .parse()
        .context("movie id must be a number")
}

async fn load_detail(queries: &Queries, id: i32) -> Result<Arc<MovieDetail>> {
    let state = queries.movie(id).await;
    match (state.data, state.error) {
        (Some(detail), _) => Ok(detail),
        (None, Some(err)) => anyhow::bail!("movie {} failed: {}", id, err),
        (None, None) => anyhow::bail!("movie {} returned nothing", id),
    }
}

async fn favorites(queries: &Queries) -> Result<()> {
    let state = queries.favorites().await;
    let favorites = state.data.context("favorites did not load")?;
    println!("== Favorites ({}) ==", favorites.len());
    for movie in favorites.iter() {
        println!(
            "  [{}] {} ({})",
            movie.id,
            movie.title,
            movie.year().unwrap_or("----")
        );
    }
    Ok(())
}

async fn favorite(queries: &Queries, args: &[String]) -> Result<()> {
    let id = movie_id(args)?;
    let detail = load_detail(queries, id).await?;
    queries.favorites_store().add(detail.snapshot()).await?;
    queries.cache().invalidate(&QueryKey::Favorites);
    favorites(queries).await
}

async fn unfavorite(queries: &Queries, args: &[String]) -> Result<()> {
    let id = movie_id(args)?;
    queries.favorites_store().remove(id).await?;
    queries.cache().invalidate(&QueryKey::Favorites);
    favorites(queries).await
}

async fn movie(queries: &Queries, args: &[String]) -> Result<()> {
    let id = movie_id(args)?;
    let detail = load_detail(queries, id).await?;

    println!("{} ({})", detail.movie.title, detail.movie.year().unwrap_or("----"));
    if !detail.tagline.is_empty() {
        println!("  \"{}\"", detail.tagline);
    }
    if let Some(runtime) = detail.runtime {
        println!("  runtime: {} min", runtime);
    }
    if let Some(director) = detail.director() {
        println!("  director: {}", director.name);
    }
    let cast: Vec<&str> = detail.top_cast(5).iter().map(|c| c.name.as_str()).collect();
    println!("  cast: {}", cast.join(", "));
    if let Some(trailer) = detail.trailer().and_then(|v| v.youtube_url()) {
        println!("  trailer: {}", trailer);
    }
    if let Some(poster) = detail.movie.poster_url(ImageSize::Large) {
        println!("  poster: {}", poster);
    }
    println!("  similar: {} titles", detail.similar.results.len());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenv();
    let args: Vec<String> = env::args().skip(1).collect();

    let api = ApiClient::from_env()?;
    println!("Using proxy at {}", api.base_url());
    let store = FileStore::open_default()?;
    println!("Favorites stored in {}", store.dir().display());
    let queries = Queries::new(
        QueryCache::new(),
        Arc::new(api),
        FavoritesStore::new(Arc::new(store)),
    );

    match args.first().map(String::as_str) {
        None => home(&queries).await,
        Some("genre") => genre(&queries, &args[1..]).await?,
        Some("movie") => movie(&queries, &args[1..]).await?,
        Some("favorites") => favorites(&queries).await?,
        Some("favorite") => favorite(&queries, &args[1..]).await?,
        Some("unfavorite") => unfavorite(&queries, &args[1..]).await?,
        Some(other) => anyhow::bail!(
            "unknown command '{}' (expected genre, movie, favorites, favorite or unfavorite)",
            other
        ),
    }
    Ok(())
}
