//! Tag browsing handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
};

use super::stores::{StoreCard, cards};
use crate::db::StoreRepository;
use crate::error::Result;
use crate::filters;
use crate::middleware::PageContext;
use crate::models::TagCount;
use crate::state::AppState;

/// A tag in the tag bar.
#[derive(Debug, Clone)]
pub struct TagLink {
    pub tag: String,
    pub count: i64,
    pub active: bool,
}

/// Tags page template.
#[derive(Template, WebTemplate)]
#[template(path = "tags.html")]
pub struct TagsTemplate {
    pub ctx: PageContext,
    pub title: String,
    pub tags: Vec<TagLink>,
    pub cards: Vec<StoreCard>,
}

fn tag_links(counts: Vec<TagCount>, selected: Option<&str>) -> Vec<TagLink> {
    counts
        .into_iter()
        .map(|c| TagLink {
            active: selected == Some(c.tag.as_str()),
            tag: c.tag,
            count: c.count,
        })
        .collect()
}

async fn render(state: &AppState, ctx: PageContext, selected: Option<String>) -> Result<TagsTemplate> {
    let repo = StoreRepository::new(state.pool());
    let counts = repo.tags_list().await?;
    let stores = repo.list_by_tag(selected.as_deref()).await?;
    let cards = cards(state, ctx.current_user.as_ref().map(|u| u.id), stores).await?;

    Ok(TagsTemplate {
        ctx,
        title: selected.clone().unwrap_or_else(|| "Tags".to_string()),
        tags: tag_links(counts, selected.as_deref()),
        cards,
    })
}

/// Every tag, with the stores carrying any tag.
pub async fn index(State(state): State<AppState>, ctx: PageContext) -> Result<impl IntoResponse> {
    render(&state, ctx, None).await
}

/// Every tag, with the stores carrying `tag`.
pub async fn by_tag(
    State(state): State<AppState>,
    ctx: PageContext,
    Path(tag): Path<String>,
) -> Result<impl IntoResponse> {
    render(&state, ctx, Some(tag)).await
}
