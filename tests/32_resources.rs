mod common;

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde_json::{json, Value};

use common::{tour_body, TestServer};

#[tokio::test]
async fn tours_are_public_to_read_and_gated_to_write() -> Result<()> {
    let server = TestServer::spawn().await?;
    let user = server.signup("Plain User", "plain@example.io").await?;
    let lead = server.account_with_role("lead@example.io", "lead-guide").await?;

    let res = server.client.post(server.url("/api/v1/tours")).json(&tour_body("The Forest Hiker", 397.0)).send().await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = server
        .client
        .post(server.url("/api/v1/tours"))
        .bearer_auth(&user.token)
        .json(&tour_body("The Forest Hiker", 397.0))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(res.json::<Value>().await?["message"], "You do not have permission to perform this action.");

    let id = server.create_tour(&lead.token, "The Forest Hiker", 397.0).await?;

    let res = server.client.get(server.url(&format!("/api/v1/tours/{}", id))).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let tour = res.json::<Value>().await?["data"]["document"].clone();
    assert_eq!(tour["slug"], "the-forest-hiker");
    assert_eq!(tour["ratingsAverage"], json!(4.5));
    assert_eq!(tour["reviews"], json!([]));
    assert!(tour.get("__v").is_none());

    let res = server
        .client
        .patch(server.url(&format!("/api/v1/tours/{}", id)))
        .bearer_auth(&lead.token)
        .json(&json!({ "price": 450, "priceDiscount": 500 }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        res.json::<Value>().await?["message"],
        "Invalid input data. Discount price (500) should be below regular price"
    );

    let res = server
        .client
        .patch(server.url(&format!("/api/v1/tours/{}", id)))
        .bearer_auth(&lead.token)
        .json(&json!({ "price": 450 }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await?["data"]["document"]["price"], json!(450));

    let res = server
        .client
        .delete(server.url(&format!("/api/v1/tours/{}", id)))
        .bearer_auth(&lead.token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = server.client.get(server.url(&format!("/api/v1/tours/{}", id))).send().await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(res.json::<Value>().await?["message"], "No document found with that ID");
    Ok(())
}

#[tokio::test]
async fn invalid_ids_are_client_errors() -> Result<()> {
    let server = TestServer::spawn().await?;

    let res = server.client.get(server.url("/api/v1/tours/not-an-id")).send().await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(res.json::<Value>().await?["message"], "Invalid id: not-an-id.");
    Ok(())
}

#[tokio::test]
async fn reviews_drive_tour_ratings() -> Result<()> {
    let server = TestServer::spawn().await?;
    let admin = server.account_with_role("admin@example.io", "admin").await?;
    let alice = server.signup("Alice", "alice@example.io").await?;
    let bob = server.signup("Bob", "bob@example.io").await?;
    let tour = server.create_tour(&admin.token, "The Sea Explorer", 497.0).await?;
    let nested = server.url(&format!("/api/v1/tours/{}/reviews", tour));

    let res = server
        .client
        .post(&nested)
        .bearer_auth(&alice.token)
        .json(&json!({ "review": "Loved it", "rating": 5 }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let review = res.json::<Value>().await?["data"]["document"].clone();
    assert_eq!(review["tour"], json!(tour));
    assert_eq!(review["user"], json!(alice.id));

    server
        .client
        .post(&nested)
        .bearer_auth(&bob.token)
        .json(&json!({ "review": "Good", "rating": 4 }))
        .send()
        .await?;

    // One review per user and tour
    let res = server
        .client
        .post(&nested)
        .bearer_auth(&alice.token)
        .json(&json!({ "review": "Again", "rating": 1 }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let message = res.json::<Value>().await?["message"].as_str().unwrap_or_default().to_string();
    assert!(message.starts_with("Duplicate field value: "), "{}", message);

    // Admins may not write reviews
    let res = server
        .client
        .post(&nested)
        .bearer_auth(&admin.token)
        .json(&json!({ "review": "As admin", "rating": 3 }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let tour_doc = server
        .client
        .get(server.url(&format!("/api/v1/tours/{}", tour)))
        .send()
        .await?
        .json::<Value>()
        .await?["data"]["document"]
        .clone();
    assert_eq!(tour_doc["ratingsQuantity"], json!(2));
    assert_eq!(tour_doc["ratingsAverage"], json!(4.5));
    let reviews = tour_doc["reviews"].as_array().context("reviews")?;
    let authors: Vec<&str> = reviews.iter().filter_map(|r| r["user"]["name"].as_str()).collect();
    assert_eq!(authors.len(), 2);
    assert!(authors.contains(&"Alice") && authors.contains(&"Bob"));

    let review_id = review["id"].as_str().context("review id")?;
    let res = server
        .client
        .patch(server.url(&format!("/api/v1/reviews/{}", review_id)))
        .bearer_auth(&alice.token)
        .json(&json!({ "rating": 2 }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let res = server
        .client
        .delete(server.url(&format!("/api/v1/reviews/{}", review_id)))
        .bearer_auth(&admin.token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let tour_doc = server
        .client
        .get(server.url(&format!("/api/v1/tours/{}", tour)))
        .send()
        .await?
        .json::<Value>()
        .await?["data"]["document"]
        .clone();
    assert_eq!(tour_doc["ratingsQuantity"], json!(1));
    assert_eq!(tour_doc["ratingsAverage"], json!(4.0));

    let res = server.client.get(&nested).bearer_auth(&bob.token).send().await?;
    let body = res.json::<Value>().await?;
    assert_eq!(body["results"], json!(1));
    assert_eq!(body["data"]["documents"][0]["user"]["name"], "Bob");
    Ok(())
}

#[tokio::test]
async fn user_administration_is_admin_only() -> Result<()> {
    let server = TestServer::spawn().await?;
    let admin = server.account_with_role("root@example.io", "admin").await?;
    let user = server.signup("Regular", "regular@example.io").await?;
    let leaving = server.signup("Leaving", "gone@example.io").await?;

    let res = server.client.get(server.url("/api/v1/users")).bearer_auth(&user.token).send().await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = server.client.post(server.url("/api/v1/users")).bearer_auth(&admin.token).json(&json!({})).send().await?;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        res.json::<Value>().await?["message"],
        "This route is not defined! Please use /signup instead"
    );

    server
        .client
        .delete(server.url("/api/v1/users/deleteMe"))
        .bearer_auth(&leaving.token)
        .send()
        .await?;

    let body = server
        .client
        .get(server.url("/api/v1/users"))
        .bearer_auth(&admin.token)
        .send()
        .await?
        .json::<Value>()
        .await?;
    assert_eq!(body["results"], json!(2), "soft-deleted users are hidden");
    let emails: Vec<&str> = body["data"]["documents"]
        .as_array()
        .context("documents")?
        .iter()
        .filter_map(|u| u["email"].as_str())
        .collect();
    assert!(!emails.contains(&"gone@example.io"));

    let res = server
        .client
        .get(server.url(&format!("/api/v1/users/{}", leaving.id)))
        .bearer_auth(&admin.token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    // Passwords never change through the generic update
    let res = server
        .client
        .patch(server.url(&format!("/api/v1/users/{}", user.id)))
        .bearer_auth(&admin.token)
        .json(&json!({ "role": "guide", "password": "hijacked-pass" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await?["data"]["document"]["role"], "guide");

    let res = server
        .client
        .post(server.url("/api/v1/users/login"))
        .json(&json!({ "email": "regular@example.io", "password": "pass1234" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn bookings_expand_their_references() -> Result<()> {
    let server = TestServer::spawn().await?;
    let lead = server.account_with_role("books@example.io", "lead-guide").await?;
    let customer = server.signup("Customer", "customer@example.io").await?;
    let tour = server.create_tour(&lead.token, "The Snow Adventurer", 997.0).await?;

    let res = server.client.get(server.url("/api/v1/bookings")).bearer_auth(&customer.token).send().await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = server
        .client
        .post(server.url("/api/v1/bookings"))
        .bearer_auth(&lead.token)
        .json(&json!({ "tour": tour, "user": customer.id, "price": 997 }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    assert_eq!(res.json::<Value>().await?["data"]["document"]["paid"], json!(true));

    let body = server
        .client
        .get(server.url("/api/v1/bookings"))
        .bearer_auth(&lead.token)
        .send()
        .await?
        .json::<Value>()
        .await?;
    let booking = &body["data"]["documents"][0];
    assert_eq!(booking["tour"]["name"], "The Snow Adventurer");
    assert_eq!(booking["user"]["email"], "customer@example.io");
    assert!(booking["user"].get("password").is_none());
    Ok(())
}

#[tokio::test]
async fn nested_reviews_stay_scoped_to_their_tour() -> Result<()> {
    let server = TestServer::spawn().await?;
    let admin = server.account_with_role("scope-admin@example.io", "admin").await?;
    let carol = server.signup("Carol", "carol@example.io").await?;
    let first = server.create_tour(&admin.token, "The Quiet Valley", 300.0).await?;
    let second = server.create_tour(&admin.token, "The Windy Ridge", 350.0).await?;

    let res = server
        .client
        .post(server.url(&format!("/api/v1/tours/{}/reviews", second)))
        .bearer_auth(&carol.token)
        .json(&json!({ "review": "Breezy", "rating": 4 }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);

    for query in [format!("?tour={}", second), format!("?tour[ne]={}", first)] {
        let res = server
            .client
            .get(server.url(&format!("/api/v1/tours/{}/reviews{}", first, query)))
            .bearer_auth(&carol.token)
            .send()
            .await?;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.json::<Value>().await?["results"], json!(0), "{}", query);
    }

    let res = server
        .client
        .get(server.url(&format!("/api/v1/tours/{}/reviews", second)))
        .bearer_auth(&carol.token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await?["results"], json!(1));
    Ok(())
}
