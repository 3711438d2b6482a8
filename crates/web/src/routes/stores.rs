//! Store listing, detail, and editor handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    body::Bytes,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tower_sessions::Session;
use tracing::instrument;

use delicious_core::{GeoPoint, StoreId, UserId};

use super::flash_redirect;
use crate::db::{HeartRepository, StoreRepository};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::filters;
use crate::middleware::{FlashLevel, FlashMessage, PageContext, RequireAuth};
use crate::models::{
    Location, Pagination, ReviewInclusion, Store, StoreFields, TAG_CHOICES, TopStore,
};
use crate::services::uploads::UploadError;
use crate::state::AppState;

/// Shown to anyone but the author on the edit form.
pub const NOT_OWNER_MESSAGE: &str = "You must own a store in order to edit it!";

/// A store as shown in a card grid.
#[derive(Debug, Clone)]
pub struct StoreCard {
    pub store: Store,
    /// Whether the current user has hearted it.
    pub hearted: bool,
}

/// One tag checkbox on the editor.
#[derive(Debug, Clone)]
pub struct TagChoice {
    pub name: &'static str,
    pub checked: bool,
}

/// Values shown in the editor's inputs.
#[derive(Debug, Clone, Default)]
pub struct EditorValues {
    pub name: String,
    pub description: String,
    pub address: String,
    pub lng: String,
    pub lat: String,
    pub photo: Option<String>,
}

/// Store grid page template (listing and hearts).
#[derive(Template, WebTemplate)]
#[template(path = "stores/index.html")]
pub struct StoresTemplate {
    pub ctx: PageContext,
    pub title: String,
    pub cards: Vec<StoreCard>,
    pub pagination: Option<Pagination>,
}

/// Store detail template.
#[derive(Template, WebTemplate)]
#[template(path = "stores/show.html")]
pub struct StoreTemplate {
    pub ctx: PageContext,
    pub store: Store,
    pub hearted: bool,
}

/// Add/edit form template.
#[derive(Template, WebTemplate)]
#[template(path = "stores/editor.html")]
pub struct EditorTemplate {
    pub ctx: PageContext,
    pub title: String,
    pub action: String,
    pub values: EditorValues,
    pub tags: Vec<TagChoice>,
}

/// Top stores template.
#[derive(Template, WebTemplate)]
#[template(path = "stores/top.html")]
pub struct TopTemplate {
    pub ctx: PageContext,
    pub stores: Vec<TopStore>,
}

/// Forbidden page, shown when editing someone else's store.
#[derive(Template, WebTemplate)]
#[template(path = "errors/forbidden.html")]
pub struct ForbiddenTemplate {
    pub ctx: PageContext,
}

/// Uploaded photo awaiting storage.
#[derive(Debug)]
struct PhotoUpload {
    content_type: String,
    bytes: Bytes,
}

/// Raw multipart fields of the store editor.
#[derive(Debug, Default)]
struct StoreForm {
    name: String,
    description: String,
    tags: Vec<String>,
    address: String,
    lng: String,
    lat: String,
    photo: Option<PhotoUpload>,
}

impl StoreForm {
    async fn read(mut multipart: Multipart) -> std::result::Result<Self, UploadError> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };
            match name.as_str() {
                "photo" => {
                    let has_file = field.file_name().is_some_and(|f| !f.is_empty());
                    let content_type = field.content_type().unwrap_or_default().to_string();
                    let bytes = field.bytes().await?;
                    if has_file && !bytes.is_empty() {
                        form.photo = Some(PhotoUpload {
                            content_type,
                            bytes,
                        });
                    }
                }
                "tags" => form.tags.push(field.text().await?),
                "name" => form.name = field.text().await?,
                "description" => form.description = field.text().await?,
                "address" => form.address = field.text().await?,
                "lng" => form.lng = field.text().await?,
                "lat" => form.lat = field.text().await?,
                _ => {}
            }
        }

        Ok(form)
    }

    /// Validated fields, or the message to flash.
    fn fields(&self) -> std::result::Result<StoreFields, &'static str> {
        if self.name.trim().is_empty() {
            return Err("You must supply a store name!");
        }
        if self.address.trim().is_empty() {
            return Err("You must supply an address!");
        }
        let (Ok(lng), Ok(lat)) = (self.lng.trim().parse(), self.lat.trim().parse()) else {
            return Err("You must supply coordinates!");
        };
        let point = GeoPoint::new(lng, lat).map_err(|_| "Those coordinates are not on Earth!")?;

        Ok(StoreFields {
            name: self.name.clone(),
            description: self.description.clone(),
            tags: self.tags.clone(),
            location: Location {
                point,
                address: self.address.clone(),
            },
            photo: None,
        }
        .normalized())
    }
}

fn tag_choices(selected: &[String]) -> Vec<TagChoice> {
    TAG_CHOICES
        .iter()
        .map(|&name| TagChoice {
            name,
            checked: selected.iter().any(|t| t == name),
        })
        .collect()
}

/// Attach heart state for the current user to each store.
pub(crate) async fn cards(
    state: &AppState,
    user: Option<UserId>,
    stores: Vec<Store>,
) -> Result<Vec<StoreCard>> {
    let hearts = match user {
        Some(user) => HeartRepository::new(state.pool()).list_for_user(user).await?,
        None => Vec::new(),
    };

    Ok(stores
        .into_iter()
        .map(|store| StoreCard {
            hearted: hearts.contains(&store.id),
            store,
        })
        .collect())
}

async fn listing(state: &AppState, session: &Session, requested: u32, path: String) -> Result<Response> {
    let repo = StoreRepository::new(state.pool());
    let pagination = Pagination::new(requested, repo.count().await?);

    if let Some(last) = pagination.overflow_redirect() {
        return flash_redirect(
            session,
            FlashLevel::Info,
            format!(
                "Hey! You asked for page {requested}. But that doesn't exist. So I put you on page {last}"
            ),
            &format!("/stores/page/{last}"),
        )
        .await;
    }

    let stores = repo.list_page(&pagination).await?;
    let ctx = PageContext::load(Some(session), path).await;
    let cards = cards(state, ctx.current_user.as_ref().map(|u| u.id), stores).await?;

    Ok(StoresTemplate {
        ctx,
        title: "Stores".to_string(),
        cards,
        pagination: Some(pagination),
    }
    .into_response())
}

/// First page of the store listing.
pub async fn index(State(state): State<AppState>, session: Session) -> Result<Response> {
    listing(&state, &session, 1, "/stores".to_string()).await
}

/// A page of the store listing; past the end redirects to the last page.
pub async fn page(
    State(state): State<AppState>,
    session: Session,
    Path(page): Path<u32>,
) -> Result<Response> {
    listing(&state, &session, page, format!("/stores/page/{page}")).await
}

/// Store detail with its reviews.
pub async fn show(
    State(state): State<AppState>,
    ctx: PageContext,
    Path(slug): Path<String>,
) -> Result<Response> {
    let store = StoreRepository::new(state.pool())
        .get_by_slug(&slug, ReviewInclusion::Include)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No store called {slug}")))?;

    let hearted = match &ctx.current_user {
        Some(user) => HeartRepository::new(state.pool())
            .list_for_user(user.id)
            .await?
            .contains(&store.id),
        None => false,
    };

    Ok(StoreTemplate {
        ctx,
        store,
        hearted,
    }
    .into_response())
}

/// Empty add-store form.
pub async fn add_page(RequireAuth(_user): RequireAuth, ctx: PageContext) -> impl IntoResponse {
    EditorTemplate {
        ctx,
        title: "Add Store".to_string(),
        action: "/add".to_string(),
        values: EditorValues::default(),
        tags: tag_choices(&[]),
    }
}

/// Edit form, for the store's author only.
pub async fn edit_page(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    ctx: PageContext,
    Path(id): Path<StoreId>,
) -> Result<Response> {
    let Some(store) = owned_store(&state, id, user.id).await? else {
        return Ok(forbidden(ctx));
    };

    Ok(EditorTemplate {
        ctx,
        title: format!("Edit {}", store.name),
        action: format!("/add/{}", store.id),
        tags: tag_choices(&store.tags),
        values: EditorValues {
            name: store.name,
            description: store.description,
            address: store.location.address,
            lng: store.location.point.lng().to_string(),
            lat: store.location.point.lat().to_string(),
            photo: store.photo,
        },
    }
    .into_response())
}

/// Create a store from the multipart editor form.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn create(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    session: Session,
    multipart: Multipart,
) -> Result<Response> {
    let form = StoreForm::read(multipart).await?;
    let mut fields = match form.fields() {
        Ok(fields) => fields,
        Err(text) => return flash_redirect(&session, FlashLevel::Error, text, "/add").await,
    };
    match store_photo(&state, form.photo).await {
        Ok(photo) => fields.photo = photo,
        Err(UploadError::UnsupportedType(_)) => {
            return flash_redirect(&session, FlashLevel::Error, "That filetype isn't allowed!", "/add")
                .await;
        }
        Err(e) => return Err(e.into()),
    }

    let store = StoreRepository::new(state.pool())
        .create(user.id, &fields)
        .await?;
    add_breadcrumb("store", "Created store", Some(&[("slug", store.slug.as_str())]));

    flash_redirect(
        &session,
        FlashLevel::Success,
        format!("Successfully Created {}. Care to leave a review?", store.name),
        &format!("/store/{}", store.slug),
    )
    .await
}

/// Update a store from the multipart editor form; the author only.
#[instrument(skip_all, fields(user_id = %user.id, store_id = %id))]
pub async fn update(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<StoreId>,
    multipart: Multipart,
) -> Result<Response> {
    if owned_store(&state, id, user.id).await?.is_none() {
        let ctx = PageContext::load(Some(&session), format!("/add/{id}")).await;
        return Ok(forbidden(ctx));
    }

    let back = format!("/stores/{id}/edit");
    let form = StoreForm::read(multipart).await?;
    let mut fields = match form.fields() {
        Ok(fields) => fields,
        Err(text) => return flash_redirect(&session, FlashLevel::Error, text, &back).await,
    };
    match store_photo(&state, form.photo).await {
        Ok(photo) => fields.photo = photo,
        Err(UploadError::UnsupportedType(_)) => {
            return flash_redirect(&session, FlashLevel::Error, "That filetype isn't allowed!", &back)
                .await;
        }
        Err(e) => return Err(e.into()),
    }

    let store = StoreRepository::new(state.pool()).update(id, &fields).await?;

    flash_redirect(
        &session,
        FlashLevel::Success,
        format!("Successfully updated {}.", store.name),
        &back,
    )
    .await
}

/// Top-rated stores.
pub async fn top(State(state): State<AppState>, ctx: PageContext) -> Result<impl IntoResponse> {
    let stores = StoreRepository::new(state.pool()).top_stores().await?;
    Ok(TopTemplate { ctx, stores })
}

/// Stores the current user has hearted.
pub async fn hearts(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    ctx: PageContext,
) -> Result<impl IntoResponse> {
    let stores = StoreRepository::new(state.pool()).hearted_by(user.id).await?;
    let cards = stores
        .into_iter()
        .map(|store| StoreCard {
            store,
            hearted: true,
        })
        .collect();

    Ok(StoresTemplate {
        ctx,
        title: "Hearted Stores".to_string(),
        cards,
        pagination: None,
    })
}

/// The store if `user` wrote it, `None` if someone else did.
async fn owned_store(state: &AppState, id: StoreId, user: UserId) -> Result<Option<Store>> {
    let store = StoreRepository::new(state.pool())
        .get_by_id(id, ReviewInclusion::Exclude)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No store with id {id}")))?;

    if store.is_owned_by(&user) {
        Ok(Some(store))
    } else {
        tracing::warn!(store_id = %id, user_id = %user, "Edit attempt by non-author");
        Ok(None)
    }
}

fn forbidden(mut ctx: PageContext) -> Response {
    ctx.flashes.push(FlashMessage {
        level: FlashLevel::Error,
        text: NOT_OWNER_MESSAGE.to_string(),
    });
    (StatusCode::FORBIDDEN, ForbiddenTemplate { ctx }).into_response()
}

async fn store_photo(
    state: &AppState,
    photo: Option<PhotoUpload>,
) -> std::result::Result<Option<String>, UploadError> {
    match photo {
        Some(photo) => Ok(Some(
            state.photos().save(&photo.content_type, &photo.bytes).await?,
        )),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> StoreForm {
        StoreForm {
            name: " Omar's ".to_string(),
            description: "Falafel".to_string(),
            tags: vec!["Wifi".to_string(), "Wifi".to_string()],
            address: "1 King St".to_string(),
            lng: "-79.38".to_string(),
            lat: " 43.65".to_string(),
            photo: None,
        }
    }

    #[test]
    fn test_fields_are_validated_and_normalized() {
        let fields = form().fields().unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(fields.name, "Omar's");
        assert_eq!(fields.tags, ["Wifi"]);
        assert!((fields.location.point.lat() - 43.65).abs() < f64::EPSILON);
    }

    #[test]
    fn test_fields_reject_missing_values() {
        let mut blank_name = form();
        blank_name.name = "  ".to_string();
        assert_eq!(blank_name.fields().err(), Some("You must supply a store name!"));

        let mut bad_lat = form();
        bad_lat.lat = "north".to_string();
        assert_eq!(bad_lat.fields().err(), Some("You must supply coordinates!"));

        let mut off_earth = form();
        off_earth.lat = "123".to_string();
        assert_eq!(
            off_earth.fields().err(),
            Some("Those coordinates are not on Earth!")
        );
    }

    #[test]
    fn test_tag_choices_mark_selected() {
        let choices = tag_choices(&["Licensed".to_string()]);
        assert_eq!(choices.len(), TAG_CHOICES.len());
        assert!(choices.iter().any(|c| c.name == "Licensed" && c.checked));
        assert_eq!(choices.iter().filter(|c| c.checked).count(), 1);
    }

    fn listing_as(viewer: i32) -> String {
        let store = Store {
            id: StoreId::new(1),
            name: "Omar".to_string(),
            slug: delicious_core::Slug::from_name("Omar"),
            description: "Falafel".to_string(),
            tags: vec![],
            created: chrono::Utc::now(),
            location: Location {
                point: GeoPoint::new(-79.38, 43.65).unwrap_or_else(|e| panic!("{e}")),
                address: "1 King St".to_string(),
            },
            photo: None,
            author: UserId::new(2),
            reviews: None,
        };
        let ctx = PageContext {
            current_user: Some(crate::models::CurrentUser {
                id: UserId::new(viewer),
                name: "Wes".to_string(),
                email: delicious_core::Email::parse("wes@example.com")
                    .unwrap_or_else(|e| panic!("{e}")),
            }),
            flashes: vec![],
            path: "/stores".to_string(),
        };
        StoresTemplate {
            ctx,
            title: "Stores".to_string(),
            cards: vec![StoreCard {
                store,
                hearted: false,
            }],
            pagination: None,
        }
        .render()
        .unwrap_or_else(|e| panic!("{e}"))
    }

    #[test]
    fn test_card_edit_link_only_for_author() {
        assert!(listing_as(2).contains("/stores/1/edit"));
        assert!(!listing_as(3).contains("/stores/1/edit"));
    }
}
