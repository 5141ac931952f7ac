use boutique_api::routes::health::health_check;

#[tokio::test]
async fn health_check_returns_healthy() {
    let response = health_check().await;
    assert_eq!(response.0.message, "Ecommerce API is running");

    let data = response.0.data.expect("health data");
    assert_eq!(data.status, "healthy");
}
