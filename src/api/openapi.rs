//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{
    accounts, blog, control_panel, external_forms, health, items, library, members, reservations, tags,
};

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Phylactery API",
        version = "1.0.0",
        description = "Club membership, library and blog REST API",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html"),
        contact(name = "Unigames Webkeepers", email = "webkeepers@unigames.asn.au")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    modifiers(&BearerAuth),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Account
        accounts::signup,
        accounts::activate,
        accounts::login,
        accounts::me,
        accounts::change_password,
        accounts::request_password_reset,
        accounts::confirm_password_reset,
        // Members
        members::list_members,
        members::create_member,
        members::get_member,
        members::update_member,
        members::renew_membership,
        members::request_email_preferences,
        members::update_email_preferences,
        // Items
        items::list_items,
        items::get_item,
        items::get_item_by_slug,
        items::create_item,
        items::update_item,
        items::delete_item,
        items::set_item_tags,
        items::random_item,
        items::all_items,
        // Tags
        tags::list_tags,
        tags::set_tag_parents,
        tags::refresh_tags,
        // Library
        library::borrow,
        library::return_items,
        library::verify_return,
        library::overdue,
        library::member_borrows,
        // External forms
        external_forms::submit_form,
        external_forms::list_forms,
        external_forms::get_form,
        external_forms::approve_form,
        external_forms::deny_form,
        external_forms::mark_borrowed,
        external_forms::mark_returned,
        // Reservations
        reservations::submit_reservation,
        reservations::list_reservations,
        reservations::get_reservation,
        reservations::approve_reservation,
        reservations::deny_reservation,
        reservations::activate_reservation,
        reservations::complete_reservation,
        // Blog
        blog::list_posts,
        blog::get_post,
        blog::get_post_by_slug,
        blog::create_post,
        blog::update_post,
        blog::delete_post,
        blog::create_email_order,
        blog::list_email_orders,
        // Control panel
        control_panel::list_operations,
        control_panel::purge_gatekeepers,
        control_panel::expire_memberships,
        control_panel::committee_transfer,
        control_panel::assign_rank,
        control_panel::expire_rank,
    ),
    components(
        schemas(
            // Shared
            crate::api::AffectedResponse,
            crate::api::MessageResponse,
            crate::error::ErrorResponse,
            health::HealthResponse,
            // Enums
            crate::models::enums::RankName,
            crate::models::enums::ItemType,
            crate::models::enums::FormStatus,
            crate::models::enums::ApprovalStatus,
            crate::models::enums::EmailAudience,
            // Account
            accounts::LoginResponse,
            crate::models::account::SignupRequest,
            crate::models::account::LoginRequest,
            crate::models::account::TokenRequest,
            crate::models::account::PasswordChangeRequest,
            crate::models::account::PasswordResetRequest,
            crate::models::account::PasswordResetConfirm,
            crate::models::account::AccountInfo,
            // Members
            members::NewMemberResponse,
            crate::models::member::Member,
            crate::models::member::MemberShort,
            crate::models::member::Membership,
            crate::models::member::MemberStatus,
            crate::models::member::MemberProfile,
            crate::models::member::CreateMember,
            crate::models::member::CreateMembership,
            crate::models::member::UpdateMember,
            crate::models::member::EmailPreferencesRequest,
            crate::models::member::UpdateEmailPreferences,
            crate::models::rank::Rank,
            crate::models::rank::RankAssignment,
            crate::models::rank::ActiveRanks,
            crate::models::rank::Tier,
            // Items and tags
            crate::models::item::Item,
            crate::models::item::ItemSummary,
            crate::models::item::ItemListEntry,
            crate::models::item::ItemDetails,
            crate::models::item::AvailabilityInfo,
            crate::models::item::CreateItem,
            crate::models::item::UpdateItem,
            crate::models::tag::Tag,
            crate::models::tag::TagWithParents,
            crate::models::tag::SetBaseTags,
            crate::models::tag::SetTagParents,
            crate::models::tag::TagRefreshReport,
            // Library
            crate::models::borrow::BorrowRecord,
            crate::models::borrow::BorrowRecordDetails,
            crate::models::borrow::BorrowRequest,
            crate::models::borrow::ReturnRequest,
            crate::models::external::ExternalBorrowingForm,
            crate::models::external::ExternalBorrowingItemRecord,
            crate::models::external::ExternalFormDetails,
            crate::models::external::CreateExternalForm,
            crate::models::external::ApproveExternalForm,
            crate::models::external::DenyRequest,
            crate::models::external::ExternalItemsAction,
            crate::models::reservation::Reservation,
            crate::models::reservation::ReservationDetails,
            crate::models::reservation::CreateReservation,
            crate::models::reservation::ReservationDecision,
            crate::models::reservation::ActivateReservation,
            // Blog
            blog::CreatedPostResponse,
            crate::models::blog::BlogPost,
            crate::models::blog::EmailOrder,
            crate::models::blog::CreateBlogPost,
            crate::models::blog::UpdateBlogPost,
            crate::models::blog::CreateEmailOrder,
            // Control panel
            crate::models::rank::AssignRankRequest,
            crate::models::rank::ExpireRankRequest,
            crate::models::rank::CommitteeTransferRequest,
            crate::models::rank::TransferPlan,
            crate::models::rank::NewAssignment,
            crate::models::rank::PositionChange,
            crate::services::control_panel::ControlPanelOperation,
            crate::services::control_panel::BulkRankResult,
            crate::services::accounts::PermissionSyncReport,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "account", description = "Gatekeeper accounts and sessions"),
        (name = "members", description = "Members and memberships"),
        (name = "items", description = "Library items"),
        (name = "tags", description = "Item tags and their hierarchy"),
        (name = "library", description = "Borrowing and returns"),
        (name = "external_forms", description = "External borrowing forms"),
        (name = "reservations", description = "Item reservations"),
        (name = "blog", description = "Club news"),
        (name = "control_panel", description = "Committee operations")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new().merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_every_area() {
        let doc = ApiDoc::openapi();
        for path in ["/items/{id}", "/blog/slug/{slug}", "/control-panel/committee-transfer", "/account/login"] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
