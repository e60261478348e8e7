mod common;

use autoparts_api::{
    dto::{
        auth::{
            ForgotPasswordRequest, LoginRequest, RegisterRequest, ResetPasswordRequest,
            VerifyResetRequest,
        },
        consultations::CreateConsultationRequest,
        reviews::CreateReviewRequest,
    },
    error::AppError,
    models::Role,
    services::{auth_service, consultation_service, review_service},
};
use uuid::Uuid;

use common::{create_product, create_user, setup_state};

#[tokio::test]
async fn password_reset_flow() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let email = format!("reset-{}@example.com", Uuid::new_v4().simple());

    let registered = auth_service::register_user(
        &state,
        RegisterRequest {
            name: None,
            email: email.clone(),
            password: "First@123".into(),
        },
    )
    .await?
    .data
    .expect("auth");
    assert_eq!(registered.user.role, "user");

    let err = auth_service::request_password_reset(
        &state,
        ForgotPasswordRequest {
            email: format!("missing-{}@example.com", Uuid::new_v4().simple()),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::NotFound));

    let issued = auth_service::request_password_reset(
        &state,
        ForgotPasswordRequest {
            email: email.to_uppercase(),
        },
    )
    .await?
    .data
    .expect("code");
    let code = issued.code.expect("codes are echoed by default");
    assert_eq!(code.len(), 6);

    let wrong = if code == "000000" { "111111" } else { "000000" };
    let err = auth_service::verify_reset_code(
        &state,
        VerifyResetRequest {
            email: email.clone(),
            code: wrong.into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    auth_service::verify_reset_code(
        &state,
        VerifyResetRequest {
            email: email.clone(),
            code: code.clone(),
        },
    )
    .await?;

    let reset = auth_service::reset_password(
        &state,
        ResetPasswordRequest {
            email: email.clone(),
            code: code.clone(),
            new_password: "Second@456".into(),
        },
    )
    .await?
    .data
    .expect("auth");
    assert_eq!(reset.user.id, registered.user.id);

    // The code is single use.
    let err = auth_service::verify_reset_code(
        &state,
        VerifyResetRequest {
            email: email.clone(),
            code,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let err = auth_service::login_user(
        &state,
        LoginRequest {
            email: email.clone(),
            password: "First@123".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)));

    let login = auth_service::login_user(
        &state,
        LoginRequest {
            email,
            password: "Second@456".into(),
        },
    )
    .await?
    .data
    .expect("auth");
    assert_eq!(login.user.id, registered.user.id);
    Ok(())
}

#[tokio::test]
async fn duplicate_registration_conflicts() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let email = format!("dup-{}@example.com", Uuid::new_v4().simple());
    let request = |email: String| RegisterRequest {
        name: Some("Dup".into()),
        email,
        password: "Strong@1".into(),
    };

    auth_service::register_user(&state, request(email.clone())).await?;
    let err = auth_service::register_user(&state, request(email.to_uppercase()))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
    Ok(())
}

#[tokio::test]
async fn reviews_snapshot_the_author_name() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let mut author = create_user(&state, Role::User).await?;
    let product = create_product(&state, 90_000, 2).await?;
    // The stored name wins over whatever the token carries.
    author.name = "Name from token".into();

    let err = review_service::create_review(
        &state,
        &author,
        CreateReviewRequest {
            product_id: Uuid::new_v4(),
            rating: 5,
            comment: String::new(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::NotFound));

    let review = review_service::create_review(
        &state,
        &author,
        CreateReviewRequest {
            product_id: product,
            rating: 5,
            comment: "  Quiet and strong  ".into(),
        },
    )
    .await?
    .data
    .expect("review");
    assert_eq!(review.user_name, "Test user");
    assert_eq!(review.comment, "Quiet and strong");

    sqlx::query("UPDATE users SET name = 'Renamed' WHERE id = $1")
        .bind(author.user_id)
        .execute(&state.pool)
        .await?;
    let listed = review_service::list_reviews(&state, product).await?.data.expect("reviews");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].user_name, "Test user");

    let err = review_service::create_review(
        &state,
        &author,
        CreateReviewRequest {
            product_id: product,
            rating: 6,
            comment: String::new(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    Ok(())
}

#[tokio::test]
async fn consultations_check_the_product() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let product = create_product(&state, 10_000, 1).await?;

    let err = consultation_service::create_consultation(
        &state,
        CreateConsultationRequest {
            product_id: Some(Uuid::new_v4()),
            name: "Le C".into(),
            phone: "0944444444".into(),
            content: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::NotFound));

    let saved = consultation_service::create_consultation(
        &state,
        CreateConsultationRequest {
            product_id: Some(product),
            name: " Le C ".into(),
            phone: "0944444444".into(),
            content: Some("   ".into()),
        },
    )
    .await?
    .data
    .expect("consultation");
    assert_eq!(saved.status, "pending");
    assert_eq!(saved.name, "Le C");
    assert_eq!(saved.content, None);

    let err = consultation_service::create_consultation(
        &state,
        CreateConsultationRequest {
            product_id: None,
            name: "Le C".into(),
            phone: String::new(),
            content: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    Ok(())
}
