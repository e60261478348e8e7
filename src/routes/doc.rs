use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        addresses::CreateAddressRequest,
        admin::{CreateImportRequest, ImportLogEntry, LowStockQuery, UpdateUserRoleRequest},
        auth::{
            AuthResponse, ForgotPasswordRequest, LoginRequest, RegisterRequest, ResetCodeIssued,
            ResetPasswordRequest, VerifyResetRequest,
        },
        cart::{AddToCartRequest, CartLine, CartList, UpdateCartRequest},
        consultations::{AdminConsultation, CreateConsultationRequest, UpdateConsultationStatusRequest},
        diagnose::{DiagnoseForm, DiagnoseUnavailable},
        orders::{
            CheckoutItem, CheckoutRequest, DeliveryInfo, InstallationChoice, OrderList,
            OrderWithItems, UpdateOrderStatusRequest,
        },
        products::{ProductDetail, ProductFacets, ProductForm, ProductList},
        reviews::{AdminReview, CreateReviewRequest},
        stats::{DailyOrders, Overview, TopProduct},
    },
    models::{
        Address, CartItem, Consultation, ConsultationStatus, ImportLog, InstallationMethod, Order,
        OrderItem, OrderLine, OrderStatus, PaymentMethod, Product, Review, Role, User,
    },
    response::{ApiResponse, Meta},
    routes::{
        addresses, admin, auth, cart, consultations, diagnose, health, orders, params, products,
        reviews, stats,
    },
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
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

#[derive(OpenApi)]
#[openapi(
    info(title = "Autoparts API", description = "Storefront and back office for an auto parts shop"),
    paths(
        health::health_check,
        auth::register,
        auth::login,
        auth::forgot_password,
        auth::verify_reset,
        auth::reset_password,
        auth::me,
        products::list_products,
        products::product_facets,
        products::get_product,
        products::create_product,
        products::update_product,
        products::delete_product,
        cart::cart_list,
        cart::add_to_cart,
        cart::update_cart_item,
        cart::remove_from_cart,
        cart::clear_cart,
        orders::place_order,
        orders::my_orders,
        orders::get_order,
        orders::confirm_received,
        addresses::list_addresses,
        addresses::create_address,
        addresses::set_default_address,
        addresses::delete_address,
        reviews::list_reviews,
        reviews::create_review,
        consultations::create_consultation,
        admin::list_users,
        admin::update_user_role,
        admin::delete_user,
        admin::list_all_orders,
        admin::get_order_admin,
        admin::update_order_status,
        admin::list_reviews,
        admin::delete_review,
        admin::list_consultations,
        admin::update_consultation_status,
        admin::list_imports,
        admin::create_import,
        admin::list_low_stock,
        stats::overview,
        stats::traffic,
        stats::ping,
        diagnose::diagnose
    ),
    components(
        schemas(
            User,
            Role,
            Product,
            CartItem,
            Order,
            OrderItem,
            OrderLine,
            OrderStatus,
            InstallationMethod,
            PaymentMethod,
            Review,
            Consultation,
            ConsultationStatus,
            ImportLog,
            Address,
            RegisterRequest,
            LoginRequest,
            ForgotPasswordRequest,
            VerifyResetRequest,
            ResetPasswordRequest,
            AuthResponse,
            ResetCodeIssued,
            ProductForm,
            ProductList,
            ProductDetail,
            ProductFacets,
            AddToCartRequest,
            UpdateCartRequest,
            CartLine,
            CartList,
            CheckoutItem,
            DeliveryInfo,
            InstallationChoice,
            CheckoutRequest,
            UpdateOrderStatusRequest,
            OrderWithItems,
            OrderList,
            CreateAddressRequest,
            CreateReviewRequest,
            AdminReview,
            CreateConsultationRequest,
            UpdateConsultationStatusRequest,
            AdminConsultation,
            UpdateUserRoleRequest,
            CreateImportRequest,
            ImportLogEntry,
            LowStockQuery,
            TopProduct,
            Overview,
            DailyOrders,
            DiagnoseForm,
            DiagnoseUnavailable,
            params::Pagination,
            params::ProductQuery,
            params::OrderListQuery,
            health::HealthData,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>,
            ApiResponse<AuthResponse>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Registration, login and password reset"),
        (name = "Products", description = "Catalog endpoints"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Orders", description = "Checkout and order history"),
        (name = "Addresses", description = "Saved delivery addresses"),
        (name = "Reviews", description = "Product reviews"),
        (name = "Consultations", description = "Consultation requests"),
        (name = "Admin", description = "Back office endpoints"),
        (name = "Stats", description = "Dashboard statistics"),
        (name = "Diagnose", description = "Photo based damage detection"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
