pub mod common;

use reqwest::StatusCode;

#[tokio::test]
#[ignore = "needs a running server and a seeded database"]
async fn everyone_sees_active_categories() {
    let categories = common::Client::new()
        .auth("alice", "password")
        .await
        .get_categories()
        .await
        .unwrap();

    assert!(!categories.is_empty());
    assert!(categories.iter().all(|c| c.active));
}

#[tokio::test]
#[ignore = "needs a running server and a seeded database"]
async fn admin_manages_categories() {
    let carol = common::Client::new().auth("carol", "password").await;

    let category = carol
        .save_category("Licensing", "Software licenses", true)
        .await
        .unwrap();
    assert_eq!(category.name, "Licensing");
    assert_eq!(category.ticket_count, 0);

    carol.delete_category(category.id).await.unwrap();
    let categories = carol.get_categories().await.unwrap();
    assert!(categories.iter().all(|c| c.id != category.id));
}

#[tokio::test]
#[ignore = "needs a running server and a seeded database"]
async fn techs_cant_manage_the_catalog() {
    let bob = common::Client::new().auth("bob", "password").await;

    let status = bob
        .save_category("Sneaky", "Not allowed", true)
        .await
        .unwrap_err();
    assert_eq!(status, StatusCode::FORBIDDEN);

    let status = bob.save_area("Sneaky", "Not allowed", true).await.unwrap_err();
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore = "needs a running server and a seeded database"]
async fn rejects_nameless_categories() {
    let carol = common::Client::new().auth("carol", "password").await;

    let status = carol.save_category("  ", "No name", true).await.unwrap_err();
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "needs a running server and a seeded database"]
async fn admin_manages_areas() {
    let carol = common::Client::new().auth("carol", "password").await;

    let area = carol
        .save_area("Warehouse", "The loading dock offices", true)
        .await
        .unwrap();
    assert_eq!(area.name, "Warehouse");
    assert!(area.active);
}

#[tokio::test]
#[ignore = "needs a running server and a seeded database"]
async fn faqs_are_readable_by_everyone_and_managed_by_admins() {
    let carol = common::Client::new().auth("carol", "password").await;
    let faq = carol
        .save_faq("How do I reset my password?", "Call the help desk.")
        .await
        .unwrap();

    let alice = common::Client::new().auth("alice", "password").await;
    let faqs = alice.get_faqs().await.unwrap();
    assert!(faqs.iter().any(|f| f.id == faq.id));

    let status = alice
        .save_faq("Can I add FAQs?", "No.")
        .await
        .unwrap_err();
    assert_eq!(status, StatusCode::FORBIDDEN);

    carol.delete_faq(faq.id).await.unwrap();
    let faqs = alice.get_faqs().await.unwrap();
    assert!(faqs.iter().all(|f| f.id != faq.id));
}
