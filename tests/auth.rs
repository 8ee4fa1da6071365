use actix_web::{dev::Payload, test::TestRequest, FromRequest};
use discuss::auth::{create_jwt, Auth, Claims, Role};
use std::env;

// Helper that guarantees a sufficiently long secret for tests.
fn set_secret() {
    env::set_var("JWT_SECRET", "test-secret-must-be-32-bytes-long!!");
}

fn claims(sub: &str, roles: Vec<Role>) -> Claims {
    Claims { sub: sub.into(), exp: usize::MAX, roles }
}

#[actix_web::test]
async fn jwt_roundtrip_ok() {
    set_secret();
    let token = create_jwt("learner-42", vec![Role::User]).expect("token");
    let req = TestRequest::default()
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .to_http_request();
    let mut pl = Payload::None;
    let auth = Auth::from_request(&req, &mut pl).await.expect("extract");
    assert_eq!(auth.0.viewer_id(), "learner-42");
    assert!(auth.0.roles.contains(&Role::User));
}

#[actix_web::test]
async fn extractor_rejects_invalid_token() {
    set_secret();
    let req = TestRequest::default()
        .insert_header(("Authorization", "Bearer notatoken"))
        .to_http_request();
    let mut pl = Payload::None;
    let err = Auth::from_request(&req, &mut pl).await.err().expect("rejected");
    assert_eq!(err.to_string(), "invalid token");
}

#[actix_web::test]
async fn optional_extractor_lets_anonymous_through() {
    let req = TestRequest::default().to_http_request();
    let mut pl = Payload::None;
    let auth = Option::<Auth>::from_request(&req, &mut pl).await.expect("extract");
    assert!(auth.is_none());
}

#[test]
fn privilege_and_ownership_rules() {
    let learner = claims("ana", vec![Role::User]);
    let instructor = claims("ivo", vec![Role::Instructor]);
    let admin = claims("root", vec![Role::Admin]);

    assert!(!learner.is_privileged());
    assert!(instructor.is_privileged());
    assert!(admin.is_privileged());

    assert!(learner.may_modify("ana"));
    assert!(!learner.may_modify("bo"));
    assert!(!instructor.may_modify("ana"));
    assert!(admin.may_modify("ana"));
}
