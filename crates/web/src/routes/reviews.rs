//! Review submission handler.

use axum::{
    Form,
    extract::{Path, State},
    http::HeaderMap,
    response::Response,
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use delicious_core::{Rating, StoreId};

use super::flash_redirect;
use crate::db::ReviewRepository;
use crate::error::Result;
use crate::middleware::{FlashLevel, RequireAuth, back_path};
use crate::models::NewReview;
use crate::state::AppState;

/// Review form data. `rating` arrives as the value of the checked radio.
#[derive(Debug, Deserialize)]
pub struct ReviewForm {
    pub text: String,
    #[serde(default)]
    pub rating: String,
}

impl ReviewForm {
    /// The review to store, or the message to flash.
    fn validate(self) -> std::result::Result<(String, Rating), &'static str> {
        let text = self.text.trim().to_string();
        if text.is_empty() {
            return Err("Your review must have text!");
        }
        let rating = self
            .rating
            .trim()
            .parse::<i64>()
            .ok()
            .and_then(|r| Rating::new(r).ok())
            .ok_or("Pick a rating from 1 to 5 stars!")?;
        Ok((text, rating))
    }
}

/// Save a review for a store and go back to where it was written.
#[instrument(skip_all, fields(user_id = %user.id, store_id = %store))]
pub async fn add(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Path(store): Path<StoreId>,
    Form(form): Form<ReviewForm>,
) -> Result<Response> {
    let back = back_path(&headers);
    let (text, rating) = match form.validate() {
        Ok(valid) => valid,
        Err(message) => return flash_redirect(&session, FlashLevel::Error, message, &back).await,
    };

    ReviewRepository::new(state.pool())
        .create(&NewReview {
            store,
            author: user.id,
            text,
            rating,
        })
        .await?;

    flash_redirect(&session, FlashLevel::Success, "Review Saved!", &back).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(text: &str, rating: &str) -> ReviewForm {
        ReviewForm {
            text: text.to_string(),
            rating: rating.to_string(),
        }
    }

    #[test]
    fn test_validate_review() {
        let (text, rating) = form("  Great falafel ", "4").validate().unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(text, "Great falafel");
        assert_eq!(rating.stars(), 4);

        assert_eq!(form(" ", "4").validate().err(), Some("Your review must have text!"));
        assert_eq!(
            form("ok", "6").validate().err(),
            Some("Pick a rating from 1 to 5 stars!")
        );
        assert_eq!(
            form("ok", "").validate().err(),
            Some("Pick a rating from 1 to 5 stars!")
        );
    }
}
